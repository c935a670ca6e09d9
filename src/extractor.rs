//! Picks the coordinate used to measure an edge's bearing at a junction.
//!
//! The first shape point of a road often sits inside the junction area
//! (stop lines, lane fans, dual-carriageway merges), so measuring the
//! bearing against it misstates the turn. The extractor offers two
//! samples: a cheap near point for low-risk junctions and a lane-aware
//! lookahead point, stabilized by a least-squares road axis, for wide
//! junctions where the approach geometry wobbles.

use crate::compressed::CompressedGeometry;
use crate::geo::{
    self, angular_deviation, cross_track_deviation, interpolate, least_squares_regression,
    polyline_length, Coordinate,
};
use crate::graph::{EdgeId, NodeBasedGraph, NodeId};

/// Assumed width of a single lane in meters.
pub const ASSUMED_LANE_WIDTH: f64 = 3.25;

/// How far down the road the near sample sits.
const CLOSE_TO_TURN_DISTANCE: f64 = 2.0;

/// Base lookahead for the representative sample; junction-area geometry
/// closer than this is considered unreliable.
const SKIPPING_INACCURACIES_DISTANCE: f64 = 10.0;

pub struct CoordinateExtractor<'a> {
    graph: &'a NodeBasedGraph,
    geometry: &'a CompressedGeometry,
    node_coordinates: &'a [Coordinate],
}

impl<'a> CoordinateExtractor<'a> {
    pub fn new(
        graph: &'a NodeBasedGraph,
        geometry: &'a CompressedGeometry,
        node_coordinates: &'a [Coordinate],
    ) -> Self {
        CoordinateExtractor {
            graph,
            geometry,
            node_coordinates,
        }
    }

    /// The ordered coordinates along `via`, starting at `from`'s junction
    /// center and ending at `to`.
    pub fn coordinates_along_road(
        &self,
        from: NodeId,
        via: EdgeId,
        traversed_in_reverse: bool,
        to: NodeId,
    ) -> Vec<Coordinate> {
        debug_assert_eq!(self.graph.get_target(via), if traversed_in_reverse { from } else { to });
        let coordinates = self.geometry.coordinates_along_road(via, traversed_in_reverse);
        debug_assert_eq!(coordinates.first(), Some(&self.node_coordinates[from as usize]));
        debug_assert_eq!(coordinates.last(), Some(&self.node_coordinates[to as usize]));
        coordinates
    }

    /// A sample right behind the junction, for junctions where curvature
    /// cannot distort the bearing much.
    pub fn coordinate_close_to_turn(
        &self,
        from: NodeId,
        via: EdgeId,
        traversed_in_reverse: bool,
        to: NodeId,
    ) -> Coordinate {
        let coordinates = self.coordinates_along_road(from, via, traversed_in_reverse, to);
        coordinate_at_length(&coordinates, CLOSE_TO_TURN_DISTANCE)
    }

    /// A geometry-robust sample far enough out to clear the junction area.
    ///
    /// `intersection_lanes` widens the lookahead: the more lanes meet at
    /// the junction, the farther its internal geometry reaches. On a
    /// straight approach the sample is taken on the least-squares axis of
    /// the road so that digitization noise near the junction cancels out;
    /// on a genuinely curved approach the polyline itself is sampled at
    /// the lookahead arc length.
    pub fn representative_coordinate(
        &self,
        from: NodeId,
        via: EdgeId,
        traversed_in_reverse: bool,
        to: NodeId,
        intersection_lanes: u8,
        coordinates: Vec<Coordinate>,
    ) -> Coordinate {
        debug_assert_eq!(self.graph.get_target(via), if traversed_in_reverse { from } else { to });
        debug_assert_eq!(coordinates.first(), Some(&self.node_coordinates[from as usize]));
        debug_assert!(coordinates.len() >= 2);
        let lookahead =
            SKIPPING_INACCURACIES_DISTANCE + 0.5 * intersection_lanes as f64 * ASSUMED_LANE_WIDTH;

        if polyline_length(&coordinates) <= lookahead {
            return *coordinates.last().unwrap();
        }
        if coordinates.len() == 2 {
            return coordinate_at_length(&coordinates, lookahead);
        }

        let prefix = trim_to_length(&coordinates, 2.0 * lookahead);
        if max_chord_deviation(&prefix) <= ASSUMED_LANE_WIDTH {
            let far = *prefix.last().unwrap();
            let origin = prefix[0];
            let (axis_start, axis_end) = least_squares_regression(&prefix);
            // The regression endpoints are ordered by longitude; return the
            // one pointing down the road rather than back over the junction.
            let toward_road = geo::bearing(origin, far);
            if angular_deviation(geo::bearing(origin, axis_end), toward_road)
                <= angular_deviation(geo::bearing(origin, axis_start), toward_road)
            {
                return axis_end;
            }
            return axis_start;
        }

        coordinate_at_length(&coordinates, lookahead)
    }
}

/// Point at `target` meters of arc length along the polyline, interpolated
/// within its segments; the final coordinate if the polyline is shorter.
fn coordinate_at_length(coordinates: &[Coordinate], target: f64) -> Coordinate {
    debug_assert!(!coordinates.is_empty());
    let mut walked = 0.0;
    for pair in coordinates.windows(2) {
        let segment = geo::haversine_distance(pair[0], pair[1]);
        if walked + segment >= target && segment > 0.0 {
            return interpolate(pair[0], pair[1], (target - walked) / segment);
        }
        walked += segment;
    }
    *coordinates.last().unwrap()
}

/// Polyline prefix of at most `target` meters, ending on an interpolated
/// coordinate when the cut falls inside a segment.
fn trim_to_length(coordinates: &[Coordinate], target: f64) -> Vec<Coordinate> {
    let mut prefix = vec![coordinates[0]];
    let mut walked = 0.0;
    for pair in coordinates.windows(2) {
        let segment = geo::haversine_distance(pair[0], pair[1]);
        if walked + segment >= target {
            if segment > 0.0 {
                prefix.push(interpolate(pair[0], pair[1], (target - walked) / segment));
            }
            break;
        }
        walked += segment;
        prefix.push(pair[1]);
    }
    prefix
}

/// Largest perpendicular offset of any interior point from the straight
/// line between the polyline's endpoints, in meters.
fn max_chord_deviation(coordinates: &[Coordinate]) -> f64 {
    if coordinates.len() <= 2 {
        return 0.0;
    }
    let start = coordinates[0];
    let end = *coordinates.last().unwrap();
    coordinates[1..coordinates.len() - 1]
        .iter()
        .map(|&point| cross_track_deviation(start, end, point))
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeData, InputEdge, RoadClassification};

    fn plain_edge(source: NodeId, target: NodeId) -> InputEdge {
        InputEdge {
            source,
            target,
            data: EdgeData {
                reversed: false,
                name_id: 0,
                classification: RoadClassification::default(),
            },
        }
    }

    /// Two nodes joined by a single road with the given polyline.
    fn fixture(
        polyline: Vec<Coordinate>,
    ) -> (NodeBasedGraph, CompressedGeometry, Vec<Coordinate>) {
        let nodes = vec![polyline[0], *polyline.last().unwrap()];
        let graph =
            NodeBasedGraph::from_edges(2, vec![plain_edge(0, 1), plain_edge(1, 0)]).unwrap();
        let geometry =
            CompressedGeometry::from_parts(vec![polyline], vec![(0, true), (0, false)]).unwrap();
        (graph, geometry, nodes)
    }

    #[test]
    fn test_close_to_turn_interpolates_near_point() {
        // 100 m due east in one segment.
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.0009, 0.0),
        ];
        let (graph, geometry, nodes) = fixture(polyline);
        let extractor = CoordinateExtractor::new(&graph, &geometry, &nodes);

        let sample = extractor.coordinate_close_to_turn(0, 0, false, 1);
        let distance = geo::haversine_distance(nodes[0], sample);
        assert!((distance - CLOSE_TO_TURN_DISTANCE).abs() < 0.1, "{}", distance);
    }

    #[test]
    fn test_representative_short_road_returns_far_end() {
        // 5 m stub, well below any lookahead.
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.00005, 0.0),
        ];
        let (graph, geometry, nodes) = fixture(polyline);
        let extractor = CoordinateExtractor::new(&graph, &geometry, &nodes);

        let coordinates = extractor.coordinates_along_road(0, 0, false, 1);
        let sample = extractor.representative_coordinate(0, 0, false, 1, 2, coordinates);
        assert_eq!(sample, nodes[1]);
    }

    #[test]
    fn test_representative_straight_road_uses_regression_axis() {
        // Eastbound road whose first shape point kinks ~40 degrees north
        // inside the junction area. The near sample would report the kink;
        // the regression axis irons it out to roughly due east.
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.00002, 0.000018),
            Coordinate::from_degrees(0.0002, 0.0),
            Coordinate::from_degrees(0.0006, 0.0),
        ];
        let (graph, geometry, nodes) = fixture(polyline);
        let extractor = CoordinateExtractor::new(&graph, &geometry, &nodes);

        let coordinates = extractor.coordinates_along_road(0, 0, false, 1);
        let sample = extractor.representative_coordinate(0, 0, false, 1, 0, coordinates);
        let bearing = geo::bearing(nodes[0], sample);
        assert!(angular_deviation(bearing, 90.0) < 5.0, "bearing = {}", bearing);
    }

    #[test]
    fn test_representative_curved_road_samples_lookahead() {
        // Road leaves east then bends hard north within the trimmed
        // prefix, so the axis is unusable; the sample falls back to the
        // polyline point at the lookahead arc length, still eastbound.
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.0001, 0.0),
            Coordinate::from_degrees(0.0002, 0.0002),
            Coordinate::from_degrees(0.0002, 0.0008),
        ];
        let (graph, geometry, nodes) = fixture(polyline);
        let extractor = CoordinateExtractor::new(&graph, &geometry, &nodes);

        let coordinates = extractor.coordinates_along_road(0, 0, false, 1);
        let sample = extractor.representative_coordinate(0, 0, false, 1, 0, coordinates);
        let bearing = geo::bearing(nodes[0], sample);
        // 10 m lookahead lands on the first, due-east segment.
        assert!(angular_deviation(bearing, 90.0) < 1.0, "bearing = {}", bearing);
    }

    #[test]
    fn test_coordinate_at_length_beyond_polyline() {
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.0001, 0.0),
        ];
        assert_eq!(coordinate_at_length(&polyline, 1e9), polyline[1]);
    }

    #[test]
    fn test_trim_to_length_cuts_inside_segment() {
        let polyline = vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.001, 0.0),
            Coordinate::from_degrees(0.002, 0.0),
        ];
        let trimmed = trim_to_length(&polyline, 130.0);
        assert_eq!(trimmed.len(), 3);
        let length = polyline_length(&trimmed);
        assert!((length - 130.0).abs() < 0.5, "length = {}", length);
    }
}
