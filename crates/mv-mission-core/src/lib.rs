use serde::{Deserialize, Serialize};

pub mod math;
pub mod transfer;

pub use math::{
    deg2rad, dist, get_waypoint_rel_angle, global_to_local_ned, ground_dist, local_ned_to_global,
    rad2deg, wrap_pi, GroundDistance,
};
pub use transfer::{
    MissionTransferMachine, TransferAction, TransferDirection, TransferOutcome, TransferPhase,
    TransferProgress,
};

/// Upper bound on the number of waypoints a single transfer may carry.
pub const MAX_MISSION_ITEMS: usize = 4096;

/// Geodetic position in MAVLink fixed point.
///
/// `lat`/`lon` are degrees * 1e7, `alt` is millimetres above mean sea level.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct GlobalPositionInt {
    pub lat: i32,
    pub lon: i32,
    pub alt: i32,
}

impl GlobalPositionInt {
    pub const fn new(lat: i32, lon: i32, alt: i32) -> Self {
        Self { lat, lon, alt }
    }

    pub fn from_degrees(latitude_deg: f64, longitude_deg: f64, altitude_m: f64) -> Self {
        Self {
            lat: (latitude_deg * 1e7).round() as i32,
            lon: (longitude_deg * 1e7).round() as i32,
            alt: (altitude_m * 1e3).round() as i32,
        }
    }

    pub fn latitude_deg(&self) -> f64 {
        self.lat as f64 / 1e7
    }

    pub fn longitude_deg(&self) -> f64 {
        self.lon as f64 / 1e7
    }

    pub fn altitude_m(&self) -> f64 {
        self.alt as f64 / 1e3
    }
}

impl From<(f64, f64, f64)> for GlobalPositionInt {
    fn from((latitude_deg, longitude_deg, altitude_m): (f64, f64, f64)) -> Self {
        Self::from_degrees(latitude_deg, longitude_deg, altitude_m)
    }
}

/// Position in a North-East-Down frame, metres.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct LocalPositionNed {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl LocalPositionNed {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

/// NED velocity, metres per second.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Velocity {
    pub vx: f32,
    pub vy: f32,
    pub vz: f32,
}

impl Velocity {
    pub fn ground_speed(&self) -> f32 {
        (self.vx * self.vx + self.vy * self.vy).sqrt()
    }
}

/// Euler angles in radians.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Attitude {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MissionIssue {
    pub code: String,
    pub message: String,
    pub seq: Option<u16>,
    pub severity: IssueSeverity,
}

pub fn validate_waypoints(waypoints: &[GlobalPositionInt]) -> Vec<MissionIssue> {
    let mut issues = Vec::new();

    if waypoints.len() > MAX_MISSION_ITEMS {
        issues.push(MissionIssue {
            code: "plan.too_many_items".to_string(),
            message: format!("Mission exceeds maximum supported item count ({MAX_MISSION_ITEMS})"),
            seq: None,
            severity: IssueSeverity::Error,
        });
    }

    for (seq, waypoint) in waypoints.iter().enumerate() {
        let seq = u16::try_from(seq).ok();
        let latitude = waypoint.latitude_deg();
        let longitude = waypoint.longitude_deg();

        if !(-90.0..=90.0).contains(&latitude) {
            issues.push(MissionIssue {
                code: "item.latitude_out_of_range".to_string(),
                message: format!("Latitude {latitude} is outside [-90, 90]"),
                seq,
                severity: IssueSeverity::Error,
            });
        }

        if !(-180.0..=180.0).contains(&longitude) {
            issues.push(MissionIssue {
                code: "item.longitude_out_of_range".to_string(),
                message: format!("Longitude {longitude} is outside [-180, 180]"),
                seq,
                severity: IssueSeverity::Error,
            });
        }
    }

    if waypoints.is_empty() {
        issues.push(MissionIssue {
            code: "plan.empty".to_string(),
            message: "Mission contains no waypoints".to_string(),
            seq: None,
            severity: IssueSeverity::Warning,
        });
    }

    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_degrees_rounds_to_fixed_point() {
        let position = GlobalPositionInt::from_degrees(47.397742, 8.545594, 488.0004);
        assert_eq!(position.lat, 473_977_420);
        assert_eq!(position.lon, 85_455_940);
        assert_eq!(position.alt, 488_000);

        let from_tuple: GlobalPositionInt = (47.397742, 8.545594, 488.0004).into();
        assert_eq!(from_tuple, position);
    }

    #[test]
    fn fixed_point_accessors_scale_back() {
        let position = GlobalPositionInt::new(-335_000_000, 1_510_000_000, -12_500);
        assert!((position.latitude_deg() + 33.5).abs() < 1e-9);
        assert!((position.longitude_deg() - 151.0).abs() < 1e-9);
        assert!((position.altitude_m() + 12.5).abs() < 1e-9);
    }

    #[test]
    fn ground_speed_ignores_vertical_component() {
        let velocity = Velocity {
            vx: 3.0,
            vy: 4.0,
            vz: -10.0,
        };
        assert!((velocity.ground_speed() - 5.0).abs() < 1e-6);
    }

    #[test]
    fn detects_invalid_coordinates() {
        let issues = validate_waypoints(&[
            GlobalPositionInt::new(473_977_420, 85_455_970, 10_000),
            GlobalPositionInt::new(999_000_000, 85_455_970, 10_000),
            GlobalPositionInt::new(0, -1_900_000_000, 0),
        ]);

        assert!(issues
            .iter()
            .any(|issue| issue.code == "item.latitude_out_of_range" && issue.seq == Some(1)));
        assert!(issues
            .iter()
            .any(|issue| issue.code == "item.longitude_out_of_range" && issue.seq == Some(2)));
        assert!(issues.iter().all(|issue| issue.seq != Some(0)));
    }

    #[test]
    fn rejects_oversized_mission() {
        let waypoints = vec![GlobalPositionInt::default(); MAX_MISSION_ITEMS + 1];
        let issues = validate_waypoints(&waypoints);
        assert!(issues
            .iter()
            .any(|issue| issue.code == "plan.too_many_items" && issue.severity == IssueSeverity::Error));
    }

    #[test]
    fn empty_mission_is_only_a_warning() {
        let issues = validate_waypoints(&[]);
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, IssueSeverity::Warning);
    }
}
