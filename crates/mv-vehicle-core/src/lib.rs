//! Client-side MAVLink session for a single vehicle.
//!
//! [`Vehicle`] owns an open connection, folds incoming frames into a
//! timestamped telemetry store and turns high-level requests (missions,
//! detours, rotations, braking) into retried command traffic. Everything is
//! driven by [`Vehicle::update`]; there are no threads or async runtime.

pub mod clock;
pub mod command;
pub mod config;
pub mod error;
pub mod modes;
pub mod state;
pub mod vehicle;

mod interpreter;
mod maneuver;
mod wire;

#[cfg(test)]
mod test_support;

pub use clock::{Clock, ManualClock, SystemClock};
pub use command::{CommandKind, CustomCommand};
pub use config::{ManeuverLimits, RetryPolicy, VehicleConfig};
pub use error::VehicleError;
pub use state::{
    ArmStatus, AutopilotType, GpsStatus, MissionStatus, Mode, Status, TelemetryStore, Timestamped,
};
pub use vehicle::Vehicle;

pub use mv_mission_core::{
    math, Attitude, GlobalPositionInt, LocalPositionNed, TransferDirection, TransferPhase,
    TransferProgress, Velocity,
};
