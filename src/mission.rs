use crate::geo::Coordinate;

pub type MavCmd = u16;
pub type MavFrame = u8;

pub const MAV_CMD_NAV_WAYPOINT: MavCmd = 16;
pub const MAV_CMD_NAV_LOITER_UNLIM: MavCmd = 17;
pub const MAV_CMD_NAV_LOITER_TURNS: MavCmd = 18;
pub const MAV_CMD_NAV_LOITER_TIME: MavCmd = 19;
pub const MAV_CMD_NAV_RETURN_TO_LAUNCH: MavCmd = 20;
pub const MAV_CMD_NAV_LAND: MavCmd = 21;
pub const MAV_CMD_NAV_TAKEOFF: MavCmd = 22;
pub const MAV_CMD_NAV_LOITER_TO_ALT: MavCmd = 31;
pub const MAV_CMD_NAV_SPLINE_WAYPOINT: MavCmd = 82;
pub const MAV_CMD_NAV_VTOL_TAKEOFF: MavCmd = 84;
pub const MAV_CMD_NAV_VTOL_LAND: MavCmd = 85;
pub const MAV_CMD_NAV_DELAY: MavCmd = 93;
pub const MAV_CMD_CONDITION_DELAY: MavCmd = 112;
pub const MAV_CMD_DO_JUMP: MavCmd = 177;
pub const MAV_CMD_DO_CHANGE_SPEED: MavCmd = 178;
pub const MAV_CMD_DO_SET_ROI: MavCmd = 201;
pub const MAV_CMD_DO_SET_CAM_TRIGG_DIST: MavCmd = 206;
pub const MAV_CMD_DO_VTOL_TRANSITION: MavCmd = 3000;

pub const MAV_FRAME_GLOBAL: MavFrame = 0;
pub const MAV_FRAME_MISSION: MavFrame = 2;
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT: MavFrame = 3;
pub const MAV_FRAME_GLOBAL_INT: MavFrame = 5;
pub const MAV_FRAME_GLOBAL_RELATIVE_ALT_INT: MavFrame = 6;
pub const MAV_FRAME_GLOBAL_TERRAIN_ALT: MavFrame = 10;
pub const MAV_FRAME_GLOBAL_TERRAIN_ALT_INT: MavFrame = 11;

/// Commands whose lat/lon/alt params carry a position.
pub fn specifies_coordinate(command: MavCmd) -> bool {
    matches!(
        command,
        MAV_CMD_NAV_WAYPOINT
            | MAV_CMD_NAV_LOITER_UNLIM
            | MAV_CMD_NAV_LOITER_TURNS
            | MAV_CMD_NAV_LOITER_TIME
            | MAV_CMD_NAV_LAND
            | MAV_CMD_NAV_TAKEOFF
            | MAV_CMD_NAV_LOITER_TO_ALT
            | MAV_CMD_NAV_SPLINE_WAYPOINT
            | MAV_CMD_NAV_VTOL_TAKEOFF
            | MAV_CMD_NAV_VTOL_LAND
            | MAV_CMD_DO_SET_ROI
    )
}

/// Positioned commands that are not part of the flight path (e.g. a region of interest).
pub fn is_standalone_coordinate(command: MavCmd) -> bool {
    command == MAV_CMD_DO_SET_ROI
}

/// Altitude is measured from home rather than from mean sea level.
pub fn is_relative_frame(frame: MavFrame) -> bool {
    matches!(
        frame,
        MAV_FRAME_GLOBAL_RELATIVE_ALT
            | MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
            | MAV_FRAME_GLOBAL_TERRAIN_ALT
            | MAV_FRAME_GLOBAL_TERRAIN_ALT_INT
    )
}

pub fn command_label(command: MavCmd) -> &'static str {
    match command {
        MAV_CMD_NAV_WAYPOINT => "WAYPOINT",
        MAV_CMD_NAV_LOITER_UNLIM => "LOITER_UNLIM",
        MAV_CMD_NAV_LOITER_TURNS => "LOITER_TURNS",
        MAV_CMD_NAV_LOITER_TIME => "LOITER_TIME",
        MAV_CMD_NAV_RETURN_TO_LAUNCH => "RTL",
        MAV_CMD_NAV_LAND => "LAND",
        MAV_CMD_NAV_TAKEOFF => "TAKEOFF",
        MAV_CMD_NAV_LOITER_TO_ALT => "LOITER_TO_ALT",
        MAV_CMD_NAV_SPLINE_WAYPOINT => "SPLINE_WAYPOINT",
        MAV_CMD_NAV_VTOL_TAKEOFF => "VTOL_TAKEOFF",
        MAV_CMD_NAV_VTOL_LAND => "VTOL_LAND",
        MAV_CMD_NAV_DELAY => "DELAY",
        MAV_CMD_CONDITION_DELAY => "CONDITION_DELAY",
        MAV_CMD_DO_JUMP => "DO_JUMP",
        MAV_CMD_DO_CHANGE_SPEED => "CHANGE_SPEED",
        MAV_CMD_DO_SET_ROI => "ROI",
        MAV_CMD_DO_SET_CAM_TRIGG_DIST => "CAM_TRIGG_DIST",
        MAV_CMD_DO_VTOL_TRANSITION => "VTOL_TRANSITION",
        _ => "OTHER",
    }
}

/// A raw mission item as exchanged with the vehicle and the legacy text format.
///
/// `params` holds param1..param4 followed by latitude, longitude and altitude.
#[derive(Clone, Debug, PartialEq)]
pub struct MissionItem {
    pub seq: u16,
    pub is_current: bool,
    pub frame: MavFrame,
    pub command: MavCmd,
    pub params: [f64; 7],
    pub autocontinue: bool,
}

impl MissionItem {
    pub fn waypoint(seq: u16, coordinate: Coordinate) -> Self {
        Self {
            seq,
            is_current: false,
            frame: MAV_FRAME_GLOBAL_RELATIVE_ALT,
            command: MAV_CMD_NAV_WAYPOINT,
            params: [
                0.0,
                0.0,
                0.0,
                0.0,
                coordinate.lat,
                coordinate.lon,
                coordinate.alt,
            ],
            autocontinue: true,
        }
    }

    pub fn command_params(&self) -> [f64; 4] {
        [self.params[0], self.params[1], self.params[2], self.params[3]]
    }

    pub fn coordinate(&self) -> Coordinate {
        Coordinate::new(self.params[4], self.params[5], self.params[6])
    }

    pub fn set_coordinate(&mut self, coordinate: Coordinate) {
        self.params[4] = coordinate.lat;
        self.params[5] = coordinate.lon;
        self.params[6] = coordinate.alt;
    }

    pub fn set_command_params(&mut self, values: [f64; 4]) {
        self.params[..4].copy_from_slice(&values);
    }

    pub fn specifies_coordinate(&self) -> bool {
        specifies_coordinate(self.command)
    }

    pub fn is_standalone_coordinate(&self) -> bool {
        is_standalone_coordinate(self.command)
    }

    pub fn on_flight_path(&self) -> bool {
        self.specifies_coordinate() && !self.is_standalone_coordinate()
    }

    pub fn relative_altitude(&self) -> bool {
        is_relative_frame(self.frame)
    }
}
