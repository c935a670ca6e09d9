//! Fixed-point coordinates and the bearing math used around junctions.

use geo::HaversineDistance;
use geo::Point;
use serde::{Deserialize, Serialize};

/// Fixed-point scale: 1e-7 degrees per unit.
pub const COORDINATE_PRECISION: f64 = 1e7;

const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A WGS84 position stored as 1e-7 degree fixed-point integers.
///
/// Longitude comes first throughout the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coordinate {
    pub lon: i32,
    pub lat: i32,
}

impl Coordinate {
    pub fn new(lon: i32, lat: i32) -> Self {
        Coordinate { lon, lat }
    }

    pub fn from_degrees(lon: f64, lat: f64) -> Self {
        Coordinate {
            lon: (lon * COORDINATE_PRECISION).round() as i32,
            lat: (lat * COORDINATE_PRECISION).round() as i32,
        }
    }

    pub fn lon_degrees(&self) -> f64 {
        self.lon as f64 / COORDINATE_PRECISION
    }

    pub fn lat_degrees(&self) -> f64 {
        self.lat as f64 / COORDINATE_PRECISION
    }
}

/// Haversine distance between two coordinates in meters.
pub fn haversine_distance(from: Coordinate, to: Coordinate) -> f64 {
    let p1 = Point::new(from.lon_degrees(), from.lat_degrees());
    let p2 = Point::new(to.lon_degrees(), to.lat_degrees());
    p1.haversine_distance(&p2)
}

/// Sum of haversine distances between adjacent polyline coordinates, in meters.
pub fn polyline_length(coordinates: &[Coordinate]) -> f64 {
    coordinates
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum()
}

/// Initial bearing from `from` to `to` in degrees, normalized to [0, 360).
/// 0 is north, angles grow clockwise.
pub fn bearing(from: Coordinate, to: Coordinate) -> f64 {
    let lat1 = from.lat_degrees().to_radians();
    let lat2 = to.lat_degrees().to_radians();
    let delta_lon = (to.lon_degrees() - from.lon_degrees()).to_radians();

    let y = delta_lon.sin() * lat2.cos();
    let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lon.cos();
    let degrees = y.atan2(x).to_degrees();
    (degrees + 360.0) % 360.0
}

/// The opposite compass direction: `(bearing + 180) mod 360`.
pub fn reverse_bearing(bearing: f64) -> f64 {
    (bearing + 180.0).rem_euclid(360.0)
}

/// Angle between two bearings on the turn circle, in [0, 360).
///
/// The base is the reverse of the entry bearing, so driving straight
/// through a junction yields 180, a U-turn yields 0, and exits to the left
/// land below 180:
///
/// ```text
///     bearings              angles
///        0                    180
///   270     90           90        270
///       180                   0/360
/// ```
pub fn angle_between_bearings(base: f64, bearing: f64) -> f64 {
    let angle = (bearing - base + 180.0).rem_euclid(360.0);
    // Rounding can leave a perfect u-turn a hair below 360; fold it back so
    // the u-turn slot sorts first.
    if 360.0 - angle < 1e-9 {
        0.0
    } else {
        angle
    }
}

/// Smallest rotation between two bearings, in [0, 180].
pub fn angular_deviation(a: f64, b: f64) -> f64 {
    let difference = (a - b).abs().rem_euclid(360.0);
    difference.min(360.0 - difference)
}

/// Linear interpolation between two coordinates. `fraction` 0 yields `from`,
/// 1 yields `to`. Good enough at road-segment scale.
pub fn interpolate(from: Coordinate, to: Coordinate, fraction: f64) -> Coordinate {
    Coordinate {
        lon: (from.lon as f64 + (to.lon - from.lon) as f64 * fraction).round() as i32,
        lat: (from.lat as f64 + (to.lat - from.lat) as f64 * fraction).round() as i32,
    }
}

/// Perpendicular distance in meters from `point` to the line through
/// `start` and `end`, using a local equirectangular projection.
pub fn cross_track_deviation(start: Coordinate, end: Coordinate, point: Coordinate) -> f64 {
    let meters_per_degree = EARTH_RADIUS_M * std::f64::consts::PI / 180.0;
    let lat_scale = start.lat_degrees().to_radians().cos();

    let ex = (end.lon_degrees() - start.lon_degrees()) * lat_scale * meters_per_degree;
    let ey = (end.lat_degrees() - start.lat_degrees()) * meters_per_degree;
    let px = (point.lon_degrees() - start.lon_degrees()) * lat_scale * meters_per_degree;
    let py = (point.lat_degrees() - start.lat_degrees()) * meters_per_degree;

    let segment_length = (ex * ex + ey * ey).sqrt();
    if segment_length < f64::EPSILON {
        return haversine_distance(start, point);
    }
    (ex * py - ey * px).abs() / segment_length
}

/// Least-squares regression through a coordinate sequence, returning two
/// points on the fitted line `lat = slope * lon + intercept`.
///
/// The regression smooths out initial and final digitization kinks and is
/// used to characterize the axis of a road. The returned endpoints are
/// evaluated one degree beyond the longitude extent of the input; if the
/// input is degenerate in longitude the first and last input coordinates
/// are returned verbatim.
pub fn least_squares_regression(coordinates: &[Coordinate]) -> (Coordinate, Coordinate) {
    debug_assert!(coordinates.len() >= 2);
    let mut sum_lon = 0.0;
    let mut sum_lat = 0.0;
    let mut sum_lon_lat = 0.0;
    let mut sum_lon_lon = 0.0;
    let mut min_lon = coordinates[0].lon_degrees();
    let mut max_lon = coordinates[0].lon_degrees();

    for coordinate in coordinates {
        let lon = coordinate.lon_degrees();
        let lat = coordinate.lat_degrees();
        min_lon = min_lon.min(lon);
        max_lon = max_lon.max(lon);
        sum_lon += lon;
        sum_lat += lat;
        sum_lon_lat += lon * lat;
        sum_lon_lon += lon * lon;
    }

    let n = coordinates.len() as f64;
    let dividend = n * sum_lon_lat - sum_lon * sum_lat;
    let divisor = n * sum_lon_lon - sum_lon * sum_lon;
    if divisor.abs() < f64::EPSILON {
        return (coordinates[0], *coordinates.last().unwrap());
    }

    let slope = dividend / divisor;
    let intercept = (sum_lat - slope * sum_lon) / n;
    let lat_at = |lon: f64| intercept + slope * lon;

    let regression_first = Coordinate::from_degrees(min_lon - 1.0, lat_at(min_lon - 1.0));
    let regression_last = Coordinate::from_degrees(max_lon + 1.0, lat_at(max_lon + 1.0));
    (regression_first, regression_last)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearing_cardinal_directions() {
        let origin = Coordinate::from_degrees(0.0, 0.0);
        let north = Coordinate::from_degrees(0.0, 0.001);
        let east = Coordinate::from_degrees(0.001, 0.0);
        let south = Coordinate::from_degrees(0.0, -0.001);
        let west = Coordinate::from_degrees(-0.001, 0.0);

        assert!((bearing(origin, north) - 0.0).abs() < 1e-6);
        assert!((bearing(origin, east) - 90.0).abs() < 1e-6);
        assert!((bearing(origin, south) - 180.0).abs() < 1e-6);
        assert!((bearing(origin, west) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_reverse_bearing_wraps() {
        assert!((reverse_bearing(0.0) - 180.0).abs() < 1e-9);
        assert!((reverse_bearing(270.0) - 90.0).abs() < 1e-9);
        assert!(reverse_bearing(180.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_between_bearings_turn_circle() {
        // Equal bearings sit opposite the base on the turn circle.
        assert!((angle_between_bearings(45.0, 45.0) - 180.0).abs() < 1e-9);
        // The reverse of the base is the U-turn slot.
        assert!(angle_between_bearings(0.0, 180.0).abs() < 1e-9);
        // Entering northbound (base 0): west exit is a left turn at 90.
        assert!((angle_between_bearings(0.0, 270.0) - 90.0).abs() < 1e-9);
        assert!((angle_between_bearings(0.0, 90.0) - 270.0).abs() < 1e-9);
    }

    #[test]
    fn test_angular_deviation_wraparound() {
        assert!((angular_deviation(359.0, 1.0) - 2.0).abs() < 1e-9);
        assert!((angular_deviation(1.0, 359.0) - 2.0).abs() < 1e-9);
        assert!((angular_deviation(90.0, 270.0) - 180.0).abs() < 1e-9);
        assert!(angular_deviation(42.0, 42.0).abs() < 1e-9);
    }

    #[test]
    fn test_polyline_length_one_degree_latitude() {
        let line = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.0, 0.5),
            Coordinate::from_degrees(0.0, 1.0),
        ];
        // One degree of latitude is roughly 111.2 km.
        let length = polyline_length(&line);
        assert!((length - 111_195.0).abs() < 200.0, "length = {}", length);
    }

    #[test]
    fn test_interpolate_midpoint() {
        let a = Coordinate::from_degrees(10.0, 50.0);
        let b = Coordinate::from_degrees(10.001, 50.001);
        let mid = interpolate(a, b, 0.5);
        assert_eq!(mid.lon, (a.lon + b.lon) / 2);
        assert_eq!(mid.lat, (a.lat + b.lat) / 2);
    }

    #[test]
    fn test_cross_track_deviation_perpendicular_offset() {
        let start = Coordinate::from_degrees(0.0, 0.0);
        let end = Coordinate::from_degrees(0.01, 0.0);
        // ~111 m north of the west-east segment.
        let point = Coordinate::from_degrees(0.005, 0.001);
        let deviation = cross_track_deviation(start, end, point);
        assert!((deviation - 111.2).abs() < 1.0, "deviation = {}", deviation);

        let on_line = Coordinate::from_degrees(0.003, 0.0);
        assert!(cross_track_deviation(start, end, on_line) < 1e-6);
    }

    #[test]
    fn test_least_squares_collinear_points() {
        let line = vec![
            Coordinate::from_degrees(1.0, 2.0),
            Coordinate::from_degrees(2.0, 3.0),
            Coordinate::from_degrees(3.0, 4.0),
        ];
        let (first, last) = least_squares_regression(&line);
        // Endpoints extend one degree beyond the input on the fitted line
        // lat = lon + 1.
        assert!((first.lon_degrees() - 0.0).abs() < 1e-6);
        assert!((first.lat_degrees() - 1.0).abs() < 1e-6);
        assert!((last.lon_degrees() - 4.0).abs() < 1e-6);
        assert!((last.lat_degrees() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_least_squares_degenerate_longitude() {
        // A road running due north has no longitude spread; the fit falls
        // back to the raw endpoints.
        let vertical = vec![
            Coordinate::from_degrees(7.0, 1.0),
            Coordinate::from_degrees(7.0, 2.0),
            Coordinate::from_degrees(7.0, 3.0),
        ];
        let (first, last) = least_squares_regression(&vertical);
        assert_eq!(first, vertical[0]);
        assert_eq!(last, vertical[2]);
    }
}
