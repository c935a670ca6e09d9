//! Intersection data model.
//!
//! A junction is described at three levels of refinement:
//!
//! 1. [`IntersectionShape`] - the raw geometry: every adjacent edge with
//!    its bearing and road length, sorted clockwise around a base bearing.
//! 2. [`IntersectionView`] - the shape as seen by a driver entering over a
//!    specific edge: turn angles relative to the entry and a legal-entry
//!    flag per road. Sorted by angle, the U-turn slot leads.
//! 3. [`Intersection`] - the view plus assigned turn instructions and lane
//!    data, produced by the downstream turn handler.

pub mod analyzer;

use std::fmt;
use std::ops::{Deref, DerefMut};

use serde::Serialize;

use crate::geo::angular_deviation;
use crate::graph::{EdgeId, RoadClassification};

/// Tolerance for "this angle is zero" tests. Sorting keeps the U-turn slot
/// in front only because its angle is constructed strictly below this.
pub const ANGLE_EPSILON: f64 = 1e-6;

/// Road-class priority gap beyond which a turn is obvious.
pub const PRIORITY_DISTINCTION_FACTOR: f64 = 2.0;

pub type LaneDataId = u16;
pub const INVALID_LANE_DATA_ID: LaneDataId = LaneDataId::MAX;

/// Direction part of a turn instruction, in turn-circle order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[repr(u8)]
pub enum DirectionModifier {
    UTurn = 0,
    SharpRight,
    Right,
    SlightRight,
    Straight,
    SlightLeft,
    Left,
    SharpLeft,
}

impl DirectionModifier {
    pub const COUNT: usize = 8;

    /// Classify a turn angle (U-turn at 0/360, left side below 180,
    /// straight around 180).
    pub fn from_angle(angle: f64) -> Self {
        if !(23.0..=337.0).contains(&angle) {
            DirectionModifier::UTurn
        } else if angle < 67.0 {
            DirectionModifier::SharpLeft
        } else if angle < 113.0 {
            DirectionModifier::Left
        } else if angle < 170.0 {
            DirectionModifier::SlightLeft
        } else if angle <= 190.0 {
            DirectionModifier::Straight
        } else if angle < 247.0 {
            DirectionModifier::SlightRight
        } else if angle < 293.0 {
            DirectionModifier::Right
        } else {
            DirectionModifier::SharpRight
        }
    }

    /// The modifier as seen in a mirror (left/right swapped).
    pub fn mirrored(self) -> Self {
        MIRRORED_MODIFIERS[self as usize]
    }
}

const MIRRORED_MODIFIERS: [DirectionModifier; 8] = [
    DirectionModifier::UTurn,
    DirectionModifier::SharpLeft,
    DirectionModifier::Left,
    DirectionModifier::SlightLeft,
    DirectionModifier::Straight,
    DirectionModifier::SlightRight,
    DirectionModifier::Right,
    DirectionModifier::SharpRight,
];

const _: () = assert!(MIRRORED_MODIFIERS.len() == DirectionModifier::COUNT);

/// Kind part of a turn instruction, assigned by the turn handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TurnType {
    Invalid,
    NoTurn,
    NewName,
    Continue,
    Turn,
    Merge,
    Fork,
    EndOfRoad,
    Notification,
    EnterRoundabout,
    ExitRoundabout,
    Suppressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TurnInstruction {
    pub turn_type: TurnType,
    pub direction_modifier: DirectionModifier,
}

impl TurnInstruction {
    pub const NO_TURN: TurnInstruction = TurnInstruction {
        turn_type: TurnType::Invalid,
        direction_modifier: DirectionModifier::UTurn,
    };
}

/// One adjacent edge of a junction: raw geometry only.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntersectionShapeData {
    pub edge: EdgeId,
    /// Initial bearing leaving the junction center along this edge, [0, 360).
    pub bearing: f64,
    /// Haversine length of the road polyline, in meters.
    pub segment_length: f64,
}

/// The unsorted or base-sorted collection of a junction's adjacent edges.
pub type IntersectionShape = Vec<IntersectionShapeData>;

/// Shape data annotated for a specific entry edge.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct IntersectionViewData {
    pub edge: EdgeId,
    pub bearing: f64,
    pub segment_length: f64,
    /// Whether entering this road is a legal turn.
    pub entry_allowed: bool,
    /// Turn-circle angle from the entry: U-turn 0, straight 180, [0, 360).
    pub angle: f64,
}

impl IntersectionViewData {
    pub fn new(road: IntersectionShapeData, entry_allowed: bool, angle: f64) -> Self {
        IntersectionViewData {
            edge: road.edge,
            bearing: road.bearing,
            segment_length: road.segment_length,
            entry_allowed,
            angle,
        }
    }
}

/// View data plus the assigned instruction and lane data.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ConnectedRoad {
    pub edge: EdgeId,
    pub bearing: f64,
    pub segment_length: f64,
    pub entry_allowed: bool,
    pub angle: f64,
    pub instruction: TurnInstruction,
    pub lane_data_id: LaneDataId,
}

impl ConnectedRoad {
    pub fn from_view(road: IntersectionViewData) -> Self {
        ConnectedRoad {
            edge: road.edge,
            bearing: road.bearing,
            segment_length: road.segment_length,
            entry_allowed: road.entry_allowed,
            angle: road.angle,
            instruction: TurnInstruction::NO_TURN,
            lane_data_id: INVALID_LANE_DATA_ID,
        }
    }

    /// Reflect the road across the entry axis: the angle flips to
    /// `360 - angle` and left/right modifiers swap. The U-turn slot is a
    /// fixpoint so the leading-U-turn invariant survives mirroring.
    pub fn mirror(&mut self) {
        if angular_deviation(self.angle, 0.0) > ANGLE_EPSILON {
            self.angle = (360.0 - self.angle).rem_euclid(360.0);
            self.instruction.direction_modifier = self.instruction.direction_modifier.mirrored();
        }
    }

    pub fn mirrored(mut self) -> Self {
        self.mirror();
        self
    }
}

impl fmt::Display for ConnectedRoad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[connection] {} allows entry: {} angle: {:.1} bearing: {:.1} instruction: {:?} {:?} lanes: {}",
            self.edge,
            self.entry_allowed,
            self.angle,
            self.bearing,
            self.instruction.turn_type,
            self.instruction.direction_modifier,
            self.lane_data_id
        )
    }
}

fn closest_turn_index<T>(roads: &[T], angle: f64, road_angle: impl Fn(&T) -> f64) -> Option<usize> {
    roads
        .iter()
        .enumerate()
        .min_by(|&(_, lhs), &(_, rhs)| {
            angular_deviation(road_angle(lhs), angle)
                .partial_cmp(&angular_deviation(road_angle(rhs), angle))
                .unwrap()
        })
        .map(|(index, _)| index)
}

fn leading_uturn_order<T>(roads: &[T], road_angle: impl Fn(&T) -> f64) -> bool {
    !roads.is_empty()
        && roads
            .windows(2)
            .all(|pair| road_angle(&pair[0]) <= road_angle(&pair[1]))
        && road_angle(&roads[0]) < ANGLE_EPSILON
}

/// Driver-facing view of a junction, sorted by angle with the U-turn first.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IntersectionView(pub Vec<IntersectionViewData>);

impl IntersectionView {
    /// The road minimizing angular deviation from `angle`; ties go to the
    /// first occurrence. Deviation wraps, so 359 is closer to 1 than 5 is.
    pub fn find_closest_turn(&self, angle: f64) -> Option<&IntersectionViewData> {
        closest_turn_index(&self.0, angle, |road| road.angle).map(|index| &self.0[index])
    }

    pub fn is_valid(&self) -> bool {
        leading_uturn_order(&self.0, |road| road.angle)
    }

    pub fn valid_entry_count(&self) -> usize {
        self.0.iter().filter(|road| road.entry_allowed).count()
    }
}

impl Deref for IntersectionView {
    type Target = Vec<IntersectionViewData>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for IntersectionView {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// A fully annotated junction, ready for instruction assignment passes.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Intersection(pub Vec<ConnectedRoad>);

impl Intersection {
    pub fn from_view(view: IntersectionView) -> Self {
        Intersection(view.0.into_iter().map(ConnectedRoad::from_view).collect())
    }

    pub fn find_closest_turn(&self, angle: f64) -> Option<&ConnectedRoad> {
        closest_turn_index(&self.0, angle, |road| road.angle).map(|index| &self.0[index])
    }

    pub fn is_valid(&self) -> bool {
        leading_uturn_order(&self.0, |road| road.angle)
    }
}

impl Deref for Intersection {
    type Target = Vec<ConnectedRoad>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for Intersection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

/// Whether continuing onto `obvious_candidate` is the obvious move based on
/// road class alone: it either clearly outranks the alternative while
/// keeping the incoming class, or it is the only non-minor road around.
pub fn obvious_by_road_class(
    incoming: RoadClassification,
    obvious_candidate: RoadClassification,
    compare_candidate: RoadClassification,
) -> bool {
    // Lower priority values rank higher.
    let has_high_priority = PRIORITY_DISTINCTION_FACTOR * (obvious_candidate.priority as f64)
        < (compare_candidate.priority as f64);
    let continues_on_same_class = incoming == obvious_candidate;
    (has_high_priority && continues_on_same_class)
        || (!obvious_candidate.low_priority && !incoming.low_priority && compare_candidate.low_priority)
}
