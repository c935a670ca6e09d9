//! Builds driver-facing junction views from the compressed road graph.
//!
//! For an entry `from_node --via_edge--> turn_node` the analyzer reports
//! _all_ roads at `turn_node` as if the graph were undirected; roads that
//! may not be entered (one-ways pointing in, restricted or barred turns)
//! are kept in the view with `entry_allowed = false` so the turn handler
//! can still classify the junction's full shape.

use std::collections::HashSet;

use crate::compressed::CompressedGeometry;
use crate::extractor::CoordinateExtractor;
use crate::geo::{self, angle_between_bearings, reverse_bearing, Coordinate};
use crate::graph::{lane_count_at_intersection, EdgeId, NodeBasedGraph, NodeId};
use crate::intersection::{
    IntersectionShape, IntersectionShapeData, IntersectionView, IntersectionViewData,
    ANGLE_EPSILON,
};
use crate::restrictions::{BarrierNodes, RestrictionIndex};

pub struct IntersectionAnalyzer<'a> {
    graph: &'a NodeBasedGraph,
    restrictions: &'a RestrictionIndex,
    barrier_nodes: &'a BarrierNodes,
    node_coordinates: &'a [Coordinate],
    coordinate_extractor: CoordinateExtractor<'a>,
}

impl<'a> IntersectionAnalyzer<'a> {
    pub fn new(
        graph: &'a NodeBasedGraph,
        restrictions: &'a RestrictionIndex,
        barrier_nodes: &'a BarrierNodes,
        node_coordinates: &'a [Coordinate],
        geometry: &'a CompressedGeometry,
    ) -> Self {
        IntersectionAnalyzer {
            graph,
            restrictions,
            barrier_nodes,
            node_coordinates,
            coordinate_extractor: CoordinateExtractor::new(graph, geometry, node_coordinates),
        }
    }

    pub fn coordinate_extractor(&self) -> &CoordinateExtractor<'a> {
        &self.coordinate_extractor
    }

    /// The driver-facing view when entering over `via`, high precision.
    pub fn get_connected_roads(&self, from: NodeId, via: EdgeId) -> IntersectionView {
        self.connected_roads(from, via, false)
    }

    /// Same view with the cheap bearing sample, for callers that only need
    /// coarse topology (e.g. classification prepasses).
    pub fn get_connected_roads_low_precision(&self, from: NodeId, via: EdgeId) -> IntersectionView {
        self.connected_roads(from, via, true)
    }

    fn connected_roads(&self, from: NodeId, via: EdgeId, low_precision: bool) -> IntersectionView {
        debug_assert!(self.graph.get_adjacent_edge_range(from).contains(&via));
        let shape =
            self.compute_intersection_shape(self.graph.get_target(via), None, low_precision);
        let original = shape.clone();
        self.transform_shape_to_view(from, via, shape, &original, &[])
    }

    /// The raw shape of a junction: every adjacent edge with its bearing
    /// and road length, sorted clockwise around a base bearing.
    ///
    /// With a `sorting_base` the shape is aligned so that the entry whose
    /// target is the base leads the list; otherwise it self-aligns to its
    /// first entry. Low precision (requested, or any junction of degree at
    /// most two, where mis-sampling cannot flip a decision) samples the
    /// bearing right behind the junction instead of the representative
    /// point.
    pub fn compute_intersection_shape(
        &self,
        node_at_center: NodeId,
        sorting_base: Option<NodeId>,
        use_low_precision: bool,
    ) -> IntersectionShape {
        let degree = self.graph.get_out_degree(node_at_center);
        let mut shape = IntersectionShape::with_capacity(degree as usize);
        let turn_coordinate = self.node_coordinates[node_at_center as usize];
        let low_precision = use_low_precision || degree <= 2;

        // Lanes widen the junction area; sampling scales with them.
        let intersection_lanes = lane_count_at_intersection(node_at_center, self.graph);

        for edge in self.graph.get_adjacent_edge_range(node_at_center) {
            let to_node = self.graph.get_target(edge);
            let coordinates =
                self.coordinate_extractor
                    .coordinates_along_road(node_at_center, edge, false, to_node);
            let segment_length = geo::polyline_length(&coordinates);

            let coordinate_along_edge = if low_precision {
                self.coordinate_extractor
                    .coordinate_close_to_turn(node_at_center, edge, false, to_node)
            } else {
                self.coordinate_extractor.representative_coordinate(
                    node_at_center,
                    edge,
                    false,
                    to_node,
                    intersection_lanes,
                    coordinates,
                )
            };

            shape.push(IntersectionShapeData {
                edge,
                bearing: geo::bearing(turn_coordinate, coordinate_along_edge),
                segment_length,
            });
        }

        if !shape.is_empty() {
            let base_bearing = sorting_base
                .and_then(|base| {
                    shape
                        .iter()
                        .find(|road| self.graph.get_target(road.edge) == base)
                })
                .map(|road| reverse_bearing(road.bearing))
                .unwrap_or_else(|| reverse_bearing(shape[0].bearing));
            shape.sort_by(|lhs, rhs| {
                angle_between_bearings(base_bearing, lhs.bearing)
                    .partial_cmp(&angle_between_bearings(base_bearing, rhs.bearing))
                    .unwrap()
            });
        }
        shape
    }

    /// Follow a chain of trivial degree-two nodes to the next real
    /// junction and return its view together with the resolved entry.
    ///
    /// A node is skipped while the junction ahead has out-degree exactly
    /// two and the continuation carries compatible edge data; a chain
    /// looping back to `starting_node` and revisited nodes both stop the
    /// walk.
    pub fn get_actual_next_intersection(
        &self,
        starting_node: NodeId,
        via_edge: EdgeId,
    ) -> (IntersectionView, NodeId, EdgeId) {
        let mut query_node = starting_node;
        let mut query_edge = via_edge;

        // On a degree-two node the continuation is the one adjacent edge
        // that does not point back where we came from.
        let next_edge_on_chain = |from: NodeId, via: EdgeId| {
            let chain_node = self.graph.get_target(via);
            debug_assert_eq!(self.graph.get_out_degree(chain_node), 2);
            let begin = self.graph.begin_edges(chain_node);
            if self.graph.get_target(begin) == from {
                begin + 1
            } else {
                begin
            }
        };

        let mut visited_nodes = HashSet::new();
        while !visited_nodes.contains(&query_node)
            && self.graph.get_out_degree(self.graph.get_target(query_edge)) == 2
        {
            visited_nodes.insert(query_node);
            let next_node = self.graph.get_target(query_edge);
            let next_edge = next_edge_on_chain(query_node, query_edge);
            if !self
                .graph
                .get_edge_data(query_edge)
                .is_compatible_to(self.graph.get_edge_data(next_edge))
                || self.graph.get_target(next_edge) == starting_node
            {
                break;
            }
            query_node = next_node;
            query_edge = next_edge;
        }

        let view = self.get_connected_roads(query_node, query_edge);
        (view, query_node, query_edge)
    }

    /// Turn a junction shape into the view seen when entering from
    /// `previous_node` over `entering_via_edge`.
    ///
    /// `normalized` is the shape after any upstream parallel-edge merging,
    /// `original` the pre-merge shape, and `performed_merges` maps each
    /// merged-away edge to its survivor. Callers without merges pass the
    /// same shape twice and an empty slice.
    ///
    /// Panics if `original` lacks an edge back to `previous_node`; such
    /// input breaks the caller contract.
    pub fn transform_shape_to_view(
        &self,
        previous_node: NodeId,
        entering_via_edge: EdgeId,
        normalized: IntersectionShape,
        original: &IntersectionShape,
        performed_merges: &[(EdgeId, EdgeId)],
    ) -> IntersectionView {
        let node_at_intersection = self.graph.get_target(entering_via_edge);

        // A single permitted continuation, if an only-turn rule names one.
        let only_valid_turn = self.only_allowed_turn(previous_node, node_at_intersection);

        // Barriers flip the u-turn policy.
        let is_barrier_node = self.barrier_nodes.contains(&node_at_intersection);

        let connects_to_previous =
            |road: &IntersectionShapeData| self.graph.get_target(road.edge) == previous_node;

        // The u-turn edge in the pre-merge shape. Parallel edges share
        // their coordinates, so the first (minimal-id) one stands for all.
        let uturn_edge = original
            .iter()
            .find(|road| connects_to_previous(road))
            .map(|road| road.edge)
            .expect("intersection lacks an edge back to the previous node");

        let is_restricted = |destination: NodeId| {
            if let Some(only_valid) = only_valid_turn {
                if only_valid != destination {
                    return true;
                }
            }
            self.restrictions
                .is_turn_restricted(previous_node, node_at_intersection, destination)
        };

        let is_allowed_turn = |road: &IntersectionShapeData| {
            let road_data = self.graph.get_edge_data(road.edge);
            let destination = self.graph.get_target(road.edge);
            // Reverse edges only exist to capture incoming one-ways in the
            // shape; entering one would mean driving against the flow.
            !road_data.reversed
                && (!is_barrier_node || destination == previous_node)
                && !is_restricted(destination)
        };

        // Merging may have removed the physical u-turn edge from the
        // normalized shape; its survivor carries the bearing then.
        let merge_entry = performed_merges.iter().find(|entry| entry.0 == uturn_edge);
        let uturn_bearing = match merge_entry {
            Some(entry) => {
                let survivor = normalized
                    .iter()
                    .find(|road| road.edge == entry.1)
                    .expect("merge map points at an edge missing from the normalized shape");
                reverse_bearing(survivor.bearing)
            }
            None => {
                let entry = normalized
                    .iter()
                    .find(|road| connects_to_previous(road))
                    .expect("normalized intersection lacks an edge back to the previous node");
                reverse_bearing(entry.bearing)
            }
        };

        let mut view = IntersectionView(
            normalized
                .iter()
                .map(|road| {
                    IntersectionViewData::new(
                        *road,
                        is_allowed_turn(road),
                        angle_between_bearings(uturn_bearing, road.bearing),
                    )
                })
                .collect(),
        );

        let uturn_slot = view
            .iter()
            .position(|road| self.graph.get_target(road.edge) == previous_node);
        let valid_count = view.valid_entry_count();

        // U-turns are a last resort: keep them only at true dead ends or
        // when the junction is otherwise impassable. Barriers already had
        // everything but the u-turn rejected above.
        if let Some(slot) = uturn_slot {
            if (view[slot].entry_allowed && !is_barrier_node && valid_count != 1)
                || valid_count == 0
            {
                let allow_uturn_at_dead_end = {
                    let uturn_data = self.graph.get_edge_data(uturn_edge);
                    if uturn_data.reversed {
                        // No turning back onto a oneway.
                        false
                    } else if is_restricted(previous_node) {
                        false
                    } else {
                        // A road counts as enterable from elsewhere if its
                        // far side can drive toward this junction.
                        let bidirectional_edges = self
                            .graph
                            .get_adjacent_edge_range(node_at_intersection)
                            .filter(|&edge| {
                                let to_node = self.graph.get_target(edge);
                                self.graph
                                    .find_edge(to_node, node_at_intersection)
                                    .map(|reverse_edge| {
                                        !self.graph.get_edge_data(reverse_edge).reversed
                                    })
                                    .unwrap_or(false)
                            })
                            .count();
                        bidirectional_edges <= 1
                    }
                };
                tracing::trace!(
                    node = node_at_intersection,
                    allowed = allow_uturn_at_dead_end,
                    "re-deciding u-turn entry under dead-end policy"
                );
                view.0[slot].entry_allowed = allow_uturn_at_dead_end;
            }
        }

        view.0.sort_by(|lhs, rhs| lhs.angle.partial_cmp(&rhs.angle).unwrap());
        debug_assert!(
            view.0[0].angle >= 0.0 && view.0[0].angle < ANGLE_EPSILON,
            "u-turn slot must lead the view, got angle {}",
            view.0[0].angle
        );
        view
    }

    /// The target named by an only-turn rule for this approach, dropped if
    /// it no longer matches any adjacent road. Honoring a stale rule would
    /// make the junction impassable, which is worse than ignoring it.
    fn only_allowed_turn(
        &self,
        coming_from_node: NodeId,
        node_at_intersection: NodeId,
    ) -> Option<NodeId> {
        let target = self
            .restrictions
            .only_turn_target(coming_from_node, node_at_intersection)?;
        for onto_edge in self.graph.get_adjacent_edge_range(node_at_intersection) {
            if self.graph.get_target(onto_edge) == target {
                return Some(target);
            }
        }
        tracing::debug!(
            from = coming_from_node,
            via = node_at_intersection,
            to = target,
            "ignoring broken only-turn restriction, target no longer adjacent"
        );
        None
    }
}
