use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Resend cadence for unacknowledged commands and mission frames.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retry_interval_ms: u64,
    pub command_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retry_interval_ms: 1000,
            command_timeout_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

/// Thresholds that end a brake, detour or rotation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ManeuverLimits {
    pub detour_arrival_radius_m: f64,
    pub rotation_tolerance_rad: f64,
    pub stop_speed_mps: f32,
    pub stop_hold_ms: u64,
}

impl Default for ManeuverLimits {
    fn default() -> Self {
        Self {
            detour_arrival_radius_m: 1.0,
            rotation_tolerance_rad: 0.1,
            stop_speed_mps: 0.2,
            stop_hold_ms: 500,
        }
    }
}

impl ManeuverLimits {
    pub fn stop_hold(&self) -> Duration {
        Duration::from_millis(self.stop_hold_ms)
    }
}

#[derive(Debug, Clone)]
pub struct VehicleConfig {
    pub gcs_system_id: u8,
    pub gcs_component_id: u8,
    /// Only talk to this system. `None` locks onto the first vehicle heartbeat.
    pub target_system_id: Option<u8>,
    pub retry_policy: RetryPolicy,
    pub liveness_timeout: Duration,
    /// Abandon a mission transfer after this long without a peer frame.
    pub transfer_timeout: Option<Duration>,
    pub auto_heartbeat: bool,
    pub auto_request_home: bool,
    pub takeoff_altitude_m: f32,
    pub limits: ManeuverLimits,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        Self {
            gcs_system_id: 255,
            gcs_component_id: 190,
            target_system_id: None,
            retry_policy: RetryPolicy::default(),
            liveness_timeout: Duration::from_secs(3),
            transfer_timeout: None,
            auto_heartbeat: true,
            auto_request_home: true,
            takeoff_altitude_m: 10.0,
            limits: ManeuverLimits::default(),
        }
    }
}
