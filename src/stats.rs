use std::collections::HashSet;

use crate::geo::{self, Coordinate};
use crate::lines::WaypointLine;
use crate::mission::{
    MavCmd, MAV_CMD_NAV_LAND, MAV_CMD_NAV_LOITER_TIME, MAV_CMD_NAV_LOITER_TO_ALT,
    MAV_CMD_NAV_LOITER_TURNS, MAV_CMD_NAV_LOITER_UNLIM, MAV_CMD_NAV_TAKEOFF,
    MAV_CMD_NAV_VTOL_LAND, MAV_CMD_NAV_VTOL_TAKEOFF,
};

pub const DEFAULT_HOVER_COMMANDS: [MavCmd; 8] = [
    MAV_CMD_NAV_LAND,
    MAV_CMD_NAV_TAKEOFF,
    MAV_CMD_NAV_VTOL_TAKEOFF,
    MAV_CMD_NAV_VTOL_LAND,
    MAV_CMD_NAV_LOITER_UNLIM,
    MAV_CMD_NAV_LOITER_TURNS,
    MAV_CMD_NAV_LOITER_TIME,
    MAV_CMD_NAV_LOITER_TO_ALT,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentKind {
    Cruise,
    Hover,
}

/// Command table deciding whether a leg counts as cruise or hover.
///
/// A leg is classified by the command of the item it flies *to*.
#[derive(Clone, Debug, PartialEq)]
pub struct SegmentClassifier {
    hover_commands: HashSet<MavCmd>,
}

impl Default for SegmentClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_HOVER_COMMANDS)
    }
}

impl SegmentClassifier {
    pub fn new(hover_commands: impl IntoIterator<Item = MavCmd>) -> Self {
        Self {
            hover_commands: hover_commands.into_iter().collect(),
        }
    }

    pub fn classify(&self, destination: MavCmd) -> SegmentKind {
        if self.hover_commands.contains(&destination) {
            SegmentKind::Hover
        } else {
            SegmentKind::Cruise
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MissionStatistics {
    pub total_distance: f64,
    pub cruise_distance: f64,
    pub hover_distance: f64,
    /// Largest horizontal distance from home to any point on the path.
    pub max_telemetry_distance: f64,
}

/// One leg of the path with the command of its destination item.
#[derive(Clone, Copy, Debug)]
pub struct Leg {
    pub line: WaypointLine,
    pub destination: MavCmd,
}

/// Recomputes all statistics from scratch.
///
/// `points` are the coordinates of every path entry after home; their order does not matter.
pub fn aggregate<I>(
    home: Coordinate,
    legs: &[Leg],
    points: I,
    classifier: &SegmentClassifier,
) -> MissionStatistics
where
    I: IntoIterator<Item = Coordinate>,
{
    let mut cruise = 0.0;
    let mut hover = 0.0;
    for leg in legs {
        match classifier.classify(leg.destination) {
            SegmentKind::Cruise => cruise += leg.line.distance,
            SegmentKind::Hover => hover += leg.line.distance,
        }
    }

    let max_telemetry = points
        .into_iter()
        .map(|point| geo::distance(home, point))
        .fold(0.0, f64::max);

    MissionStatistics {
        total_distance: cruise + hover,
        cruise_distance: cruise,
        hover_distance: hover,
        max_telemetry_distance: max_telemetry,
    }
}
