//! Compressed node-based road graph.
//!
//! Every road between two junctions is stored as a pair of directed edges,
//! one per traversal direction. A one-way road keeps both edges so that the
//! full junction shape is visible to the analyzer; the non-traversable
//! direction carries `reversed = true`. Adjacency is a CSR layout: edge ids
//! of a node form one contiguous, (source, target)-sorted range, which makes
//! parallel edges adjacent and gives `find_edge` minimal-id semantics.

use anyhow::{bail, Result};
use serde::Serialize;
use std::ops::Range;

pub type NodeId = u32;
pub type EdgeId = u32;

pub const INVALID_NODE_ID: NodeId = NodeId::MAX;
pub const INVALID_EDGE_ID: EdgeId = EdgeId::MAX;

/// Functional road class. Smaller `priority` means more important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoadClassification {
    pub priority: u8,
    pub num_lanes: u8,
    pub low_priority: bool,
}

impl Default for RoadClassification {
    fn default() -> Self {
        RoadClassification {
            priority: 4,
            num_lanes: 1,
            low_priority: false,
        }
    }
}

/// Per-directed-edge metadata consumed by the analyzer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EdgeData {
    /// The edge only points into its source junction; it exists so the
    /// junction shape includes incoming one-ways, but may not be entered.
    pub reversed: bool,
    /// Identifier of the road name/ref; equal ids mean "the same road".
    pub name_id: u32,
    pub classification: RoadClassification,
}

impl EdgeData {
    /// Whether two consecutive segments belong to the same road, i.e. a
    /// degree-two node between them needs no guidance decision.
    pub fn is_compatible_to(&self, other: &EdgeData) -> bool {
        self.reversed == other.reversed
            && self.name_id == other.name_id
            && self.classification == other.classification
    }
}

/// Edge as fed into [`NodeBasedGraph::from_edges`].
#[derive(Debug, Clone, Copy)]
pub struct InputEdge {
    pub source: NodeId,
    pub target: NodeId,
    pub data: EdgeData,
}

#[derive(Debug)]
pub struct NodeBasedGraph {
    /// CSR offsets, length `num_nodes + 1`.
    first_edge: Vec<u32>,
    targets: Vec<NodeId>,
    edge_data: Vec<EdgeData>,
}

impl NodeBasedGraph {
    /// Assemble the CSR layout from an unsorted edge list.
    ///
    /// Edges are stably sorted by (source, target), so parallel edges keep
    /// their input order and the lowest edge id of a bundle is the first
    /// one encountered when scanning a node's range.
    pub fn from_edges(num_nodes: u32, mut edges: Vec<InputEdge>) -> Result<Self> {
        for edge in &edges {
            if edge.source >= num_nodes || edge.target >= num_nodes {
                bail!(
                    "edge {} -> {} references a node outside 0..{}",
                    edge.source,
                    edge.target,
                    num_nodes
                );
            }
        }
        edges.sort_by_key(|edge| (edge.source, edge.target));

        let mut first_edge = Vec::with_capacity(num_nodes as usize + 1);
        let mut targets = Vec::with_capacity(edges.len());
        let mut edge_data = Vec::with_capacity(edges.len());

        let mut next = 0usize;
        for node in 0..num_nodes {
            first_edge.push(targets.len() as u32);
            while next < edges.len() && edges[next].source == node {
                targets.push(edges[next].target);
                edge_data.push(edges[next].data);
                next += 1;
            }
        }
        first_edge.push(targets.len() as u32);

        Ok(NodeBasedGraph {
            first_edge,
            targets,
            edge_data,
        })
    }

    pub fn num_nodes(&self) -> u32 {
        (self.first_edge.len() - 1) as u32
    }

    pub fn num_edges(&self) -> u32 {
        self.targets.len() as u32
    }

    #[inline]
    pub fn get_target(&self, edge: EdgeId) -> NodeId {
        self.targets[edge as usize]
    }

    #[inline]
    pub fn get_edge_data(&self, edge: EdgeId) -> &EdgeData {
        &self.edge_data[edge as usize]
    }

    #[inline]
    pub fn get_out_degree(&self, node: NodeId) -> u32 {
        self.first_edge[node as usize + 1] - self.first_edge[node as usize]
    }

    /// First edge id of the node's adjacency range.
    #[inline]
    pub fn begin_edges(&self, node: NodeId) -> EdgeId {
        self.first_edge[node as usize]
    }

    /// The contiguous edge-id range leaving `node`.
    #[inline]
    pub fn get_adjacent_edge_range(&self, node: NodeId) -> Range<EdgeId> {
        self.first_edge[node as usize]..self.first_edge[node as usize + 1]
    }

    /// Lowest-id edge from `from` to `to`, if any.
    pub fn find_edge(&self, from: NodeId, to: NodeId) -> Option<EdgeId> {
        self.get_adjacent_edge_range(from)
            .find(|&edge| self.get_target(edge) == to)
    }
}

/// Maximum lane count over all edges meeting at a junction. Wide junctions
/// need bearing samples farther down the road to escape the junction area.
pub fn lane_count_at_intersection(node: NodeId, graph: &NodeBasedGraph) -> u8 {
    graph
        .get_adjacent_edge_range(node)
        .map(|edge| graph.get_edge_data(edge).classification.num_lanes)
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(source: NodeId, target: NodeId) -> InputEdge {
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

    #[test]
    fn test_csr_layout() {
        let graph = NodeBasedGraph::from_edges(
            4,
            vec![edge(2, 0), edge(0, 1), edge(0, 2), edge(1, 0), edge(2, 1)],
        )
        .unwrap();

        assert_eq!(graph.num_nodes(), 4);
        assert_eq!(graph.num_edges(), 5);
        assert_eq!(graph.get_out_degree(0), 2);
        assert_eq!(graph.get_out_degree(1), 1);
        assert_eq!(graph.get_out_degree(2), 2);
        assert_eq!(graph.get_out_degree(3), 0);

        // Ranges are contiguous and sorted by target.
        let range: Vec<EdgeId> = graph.get_adjacent_edge_range(2).collect();
        assert_eq!(range, vec![3, 4]);
        assert_eq!(graph.get_target(3), 0);
        assert_eq!(graph.get_target(4), 1);
        assert_eq!(graph.begin_edges(2), 3);
    }

    #[test]
    fn test_find_edge_prefers_minimal_id_among_parallels() {
        let graph = NodeBasedGraph::from_edges(
            2,
            vec![edge(0, 1), edge(0, 1), edge(1, 0)],
        )
        .unwrap();

        assert_eq!(graph.find_edge(0, 1), Some(0));
        assert_eq!(graph.find_edge(1, 0), Some(2));
        assert_eq!(graph.find_edge(1, 1), None);
    }

    #[test]
    fn test_from_edges_rejects_out_of_range_nodes() {
        let result = NodeBasedGraph::from_edges(2, vec![edge(0, 5)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_compatibility_requires_same_road() {
        let a = EdgeData {
            reversed: false,
            name_id: 7,
            classification: RoadClassification::default(),
        };
        let mut b = a;
        assert!(a.is_compatible_to(&b));

        b.name_id = 8;
        assert!(!a.is_compatible_to(&b));

        b = a;
        b.reversed = true;
        assert!(!a.is_compatible_to(&b));
    }

    #[test]
    fn test_lane_count_at_intersection() {
        let mut wide = edge(0, 1);
        wide.data.classification.num_lanes = 4;
        let graph = NodeBasedGraph::from_edges(2, vec![wide, edge(0, 1), edge(1, 0)]).unwrap();
        assert_eq!(lane_count_at_intersection(0, &graph), 4);
        assert_eq!(lane_count_at_intersection(1, &graph), 1);
    }
}
