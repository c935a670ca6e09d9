//! Compressed edge geometry container.
//!
//! The node-based graph abbreviates whole roads into single edges; the
//! polyline a road follows between its two junctions lives here. Both
//! directed edges of a road share one pooled polyline and differ only in a
//! direction flag, so geometry is stored once per road.

use anyhow::{bail, Result};

use crate::geo::Coordinate;
use crate::graph::EdgeId;

/// Reference from a directed edge into the polyline pool.
#[derive(Debug, Clone, Copy)]
struct GeometryRef {
    geometry: u32,
    /// Whether the pooled polyline already runs in this edge's
    /// source-to-target direction.
    forward: bool,
}

#[derive(Debug)]
pub struct CompressedGeometry {
    geometries: Vec<Vec<Coordinate>>,
    edge_refs: Vec<GeometryRef>,
}

impl CompressedGeometry {
    /// Build the container from a polyline pool and one `(geometry index,
    /// forward)` pair per directed edge, indexed by edge id.
    pub fn from_parts(
        geometries: Vec<Vec<Coordinate>>,
        edge_refs: Vec<(u32, bool)>,
    ) -> Result<Self> {
        for (index, geometry) in geometries.iter().enumerate() {
            if geometry.len() < 2 {
                bail!(
                    "geometry {} has {} coordinates, polylines need at least 2",
                    index,
                    geometry.len()
                );
            }
        }
        for &(geometry, _) in &edge_refs {
            if geometry as usize >= geometries.len() {
                bail!(
                    "edge references geometry {} but the pool holds {}",
                    geometry,
                    geometries.len()
                );
            }
        }
        let edge_refs = edge_refs
            .into_iter()
            .map(|(geometry, forward)| GeometryRef { geometry, forward })
            .collect();
        Ok(CompressedGeometry {
            geometries,
            edge_refs,
        })
    }

    pub fn num_edges(&self) -> u32 {
        self.edge_refs.len() as u32
    }

    /// The full polyline along `edge`, junction center first.
    ///
    /// With `traversed_in_reverse` the sequence is flipped so it starts at
    /// the far end, as seen by a vehicle arriving over this edge.
    pub fn coordinates_along_road(
        &self,
        edge: EdgeId,
        traversed_in_reverse: bool,
    ) -> Vec<Coordinate> {
        let reference = self.edge_refs[edge as usize];
        let mut coordinates = self.geometries[reference.geometry as usize].clone();
        if reference.forward == traversed_in_reverse {
            coordinates.reverse();
        }
        coordinates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line() -> Vec<Coordinate> {
        vec![
            Coordinate::from_degrees(0.0, 0.0),
            Coordinate::from_degrees(0.001, 0.0),
            Coordinate::from_degrees(0.002, 0.0),
        ]
    }

    #[test]
    fn test_shared_geometry_orientation() {
        // Edge 0 runs with the stored polyline, edge 1 against it.
        let container =
            CompressedGeometry::from_parts(vec![line()], vec![(0, true), (0, false)]).unwrap();

        let forward = container.coordinates_along_road(0, false);
        assert_eq!(forward, line());

        let backward = container.coordinates_along_road(1, false);
        let mut expected = line();
        expected.reverse();
        assert_eq!(backward, expected);

        // Traversed in reverse flips again.
        assert_eq!(container.coordinates_along_road(1, true), line());
    }

    #[test]
    fn test_rejects_short_polylines() {
        let result =
            CompressedGeometry::from_parts(vec![vec![Coordinate::new(0, 0)]], vec![(0, true)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_rejects_dangling_geometry_reference() {
        let result = CompressedGeometry::from_parts(vec![line()], vec![(3, true)]);
        assert!(result.is_err());
    }
}
