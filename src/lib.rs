//! Guidepost: intersection analysis for road-network preprocessing
//!
//! Pipeline position: after the compressed node-based graph is built and
//! before turn handling / hierarchy contraction. For every junction this
//! crate answers the question a downstream turn handler asks: coming from
//! `previous_node` over `via_edge`, which roads leave the junction, at what
//! bearing, at what turn angle, and which of them may legally be entered?
//!
//! - Shape: per-edge bearings and polyline lengths around a junction,
//!   sampled with adaptive precision and sorted clockwise around a base.
//! - View: the shape re-expressed relative to the driver's entry, with
//!   turn restrictions, barriers, one-way flags, merged parallel roads and
//!   the dead-end U-turn policy applied.
//! - Skip walker: degree-two chains are traversed without emitting
//!   intersections, so guidance decisions land on real forks only.
//!
//! Key principle: the analyzer borrows every collaborator (graph,
//! geometry, restrictions, barriers, node table) immutably and returns
//! owned values. No interior mutability, no I/O; callers may fan queries
//! out across threads.

pub mod compressed;
pub mod extractor;
pub mod geo;
pub mod graph;
pub mod intersection;
pub mod restrictions;

pub use compressed::CompressedGeometry;
pub use extractor::CoordinateExtractor;
pub use geo::Coordinate;
pub use graph::{EdgeData, EdgeId, NodeBasedGraph, NodeId, RoadClassification};
pub use intersection::analyzer::IntersectionAnalyzer;
pub use intersection::{
    ConnectedRoad, Intersection, IntersectionShape, IntersectionShapeData, IntersectionView,
    IntersectionViewData,
};
pub use restrictions::{BarrierNodes, RestrictionIndex};
