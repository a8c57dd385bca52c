use mv_mission_core::{Attitude, GlobalPositionInt, LocalPositionNed, Velocity};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// A telemetry value together with when it was last received.
///
/// `is_fresh` is set by every write and cleared by the next read through
/// the owning store, so a caller can tell whether it has seen this sample.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Timestamped<T> {
    value: T,
    last_update: Option<Instant>,
    is_fresh: bool,
}

impl<T: Clone> Timestamped<T> {
    pub fn value(&self) -> &T {
        &self.value
    }

    pub fn into_value(self) -> T {
        self.value
    }

    pub fn last_update(&self) -> Option<Instant> {
        self.last_update
    }

    pub fn is_initialized(&self) -> bool {
        self.last_update.is_some()
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh
    }

    pub(crate) fn set(&mut self, value: T, now: Instant) {
        self.value = value;
        self.last_update = Some(now);
        self.is_fresh = true;
    }

    /// Value as of `last_update`, if there ever was one.
    pub(crate) fn known(&self) -> Option<&T> {
        self.last_update.map(|_| &self.value)
    }

    pub(crate) fn read(&mut self) -> Timestamped<T> {
        let snapshot = self.clone();
        self.is_fresh = false;
        snapshot
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Standby,
    Active,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Guided,
    Auto,
    Brake,
    Takeoff,
    #[default]
    Other,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Mode::Guided => "GUIDED",
            Mode::Auto => "AUTO",
            Mode::Brake => "BRAKE",
            Mode::Takeoff => "TAKEOFF",
            Mode::Other => "OTHER",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArmStatus {
    Armed,
    #[default]
    NotArmed,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GpsStatus {
    #[default]
    NoFix,
    Fix2dPlus,
}

impl GpsStatus {
    pub(crate) fn from_raw(fix_type: u8) -> Self {
        if fix_type >= 2 {
            GpsStatus::Fix2dPlus
        } else {
            GpsStatus::NoFix
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotType {
    #[default]
    Unknown,
    Generic,
    ArduPilotMega,
    Px4,
}

impl AutopilotType {
    /// Any autopilot other than ArduPilot and PX4 is detected as `Generic`.
    pub(crate) fn from_mav(autopilot: mavlink::common::MavAutopilot) -> Self {
        use mavlink::common::MavAutopilot;
        match autopilot {
            MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA => AutopilotType::ArduPilotMega,
            MavAutopilot::MAV_AUTOPILOT_PX4 => AutopilotType::Px4,
            _ => AutopilotType::Generic,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissionStatus {
    #[default]
    Normal,
    Braking,
    Detouring,
    Rotating,
}

/// Everything learned about the vehicle from its own frames.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    pub(crate) attitude: Timestamped<Attitude>,
    pub(crate) local_position: Timestamped<LocalPositionNed>,
    pub(crate) speed: Timestamped<Velocity>,
    pub(crate) global_position: Timestamped<GlobalPositionInt>,
    pub(crate) home_position: Timestamped<GlobalPositionInt>,
    pub(crate) mission_waypoints: Timestamped<Vec<GlobalPositionInt>>,
    pub(crate) current_waypoint: Timestamped<GlobalPositionInt>,
    pub(crate) last_heartbeat: Option<Instant>,
    pub(crate) custom_mode: Option<u32>,
    pub(crate) mode: Mode,
    pub(crate) arm_status: ArmStatus,
    pub(crate) gps_status: GpsStatus,
    pub(crate) autopilot: AutopilotType,
}

impl TelemetryStore {
    pub fn attitude(&mut self) -> Timestamped<Attitude> {
        self.attitude.read()
    }

    pub fn local_position(&mut self) -> Timestamped<LocalPositionNed> {
        self.local_position.read()
    }

    pub fn speed(&mut self) -> Timestamped<Velocity> {
        self.speed.read()
    }

    pub fn global_position(&mut self) -> Timestamped<GlobalPositionInt> {
        self.global_position.read()
    }

    pub fn home_position(&mut self) -> Timestamped<GlobalPositionInt> {
        self.home_position.read()
    }

    pub fn mission_waypoints(&mut self) -> Timestamped<Vec<GlobalPositionInt>> {
        self.mission_waypoints.read()
    }

    pub fn current_waypoint(&mut self) -> Timestamped<GlobalPositionInt> {
        self.current_waypoint.read()
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn custom_mode(&self) -> Option<u32> {
        self.custom_mode
    }

    pub fn arm_status(&self) -> ArmStatus {
        self.arm_status
    }

    pub fn gps_status(&self) -> GpsStatus {
        self.gps_status
    }

    pub fn autopilot(&self) -> AutopilotType {
        self.autopilot
    }

    pub fn status(&self, now: Instant, liveness_timeout: Duration) -> Status {
        match self.last_heartbeat {
            Some(at) if now.saturating_duration_since(at) < liveness_timeout => Status::Active,
            _ => Status::Standby,
        }
    }
}
