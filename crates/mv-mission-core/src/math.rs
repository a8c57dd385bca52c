//! Geodetic helpers for fixed-point MAVLink positions.
//!
//! Local conversions use an equirectangular projection around the reference
//! point, which stays within a centimetre over the few-kilometre spans a
//! single vehicle session works with.

use crate::{Attitude, GlobalPositionInt, LocalPositionNed};
use std::f64::consts::PI;

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

const E7: f64 = 1e7;
const FULL_TURN_E7: i64 = 3_600_000_000;
const HALF_TURN_E7: i64 = 1_800_000_000;
const QUARTER_TURN_E7: i64 = 900_000_000;

#[inline]
pub fn rad2deg(x: f64) -> f64 {
    x * 180.0 / PI
}

#[inline]
pub fn deg2rad(x: f64) -> f64 {
    x * PI / 180.0
}

/// Normalize an angle into (-pi, pi].
pub fn wrap_pi(angle: f64) -> f64 {
    let two_pi = 2.0 * PI;
    let mut wrapped = angle % two_pi;
    if wrapped > PI {
        wrapped -= two_pi;
    } else if wrapped <= -PI {
        wrapped += two_pi;
    }
    wrapped
}

fn wrap_lon_e7(delta: i64) -> i64 {
    let mut wrapped = delta % FULL_TURN_E7;
    if wrapped > HALF_TURN_E7 {
        wrapped -= FULL_TURN_E7;
    } else if wrapped < -HALF_TURN_E7 {
        wrapped += FULL_TURN_E7;
    }
    wrapped
}

fn e7_to_rad(value: i64) -> f64 {
    deg2rad(value as f64 / E7)
}

/// Horizontal distance between two points of the same frame.
pub trait GroundDistance {
    fn ground_distance_to(&self, other: &Self) -> f64;
}

impl GroundDistance for GlobalPositionInt {
    /// Haversine great-circle distance in metres.
    fn ground_distance_to(&self, other: &Self) -> f64 {
        let lat1 = e7_to_rad(i64::from(self.lat));
        let lat2 = e7_to_rad(i64::from(other.lat));
        let dlat = e7_to_rad(i64::from(other.lat) - i64::from(self.lat));
        let dlon = e7_to_rad(wrap_lon_e7(i64::from(other.lon) - i64::from(self.lon)));

        let half_dlat = (dlat / 2.0).sin();
        let half_dlon = (dlon / 2.0).sin();
        let a = half_dlat * half_dlat + lat1.cos() * lat2.cos() * half_dlon * half_dlon;
        let c = 2.0 * a.sqrt().atan2((1.0 - a).max(0.0).sqrt());
        EARTH_RADIUS_M * c
    }
}

impl GroundDistance for LocalPositionNed {
    fn ground_distance_to(&self, other: &Self) -> f64 {
        let dx = f64::from(self.x) - f64::from(other.x);
        let dy = f64::from(self.y) - f64::from(other.y);
        (dx * dx + dy * dy).sqrt()
    }
}

pub fn ground_dist<P: GroundDistance>(p1: &P, p2: &P) -> f64 {
    p1.ground_distance_to(p2)
}

/// Ground distance combined with the altitude difference, metres.
pub fn dist(p1: &GlobalPositionInt, p2: &GlobalPositionInt) -> f64 {
    let ground = ground_dist(p1, p2);
    let dz = (i64::from(p1.alt) - i64::from(p2.alt)) as f64 / 1e3;
    (ground * ground + dz * dz).sqrt()
}

/// North, east and down offsets of `point` from `reference`, metres.
fn ned_offset(point: &GlobalPositionInt, reference: &GlobalPositionInt) -> (f64, f64, f64) {
    let dlat = e7_to_rad(i64::from(point.lat) - i64::from(reference.lat));
    let dlon = e7_to_rad(wrap_lon_e7(i64::from(point.lon) - i64::from(reference.lon)));
    let ref_lat = e7_to_rad(i64::from(reference.lat));

    let north = dlat * EARTH_RADIUS_M;
    let east = dlon * EARTH_RADIUS_M * ref_lat.cos();
    let down = -((i64::from(point.alt) - i64::from(reference.alt)) as f64) / 1e3;
    (north, east, down)
}

pub fn global_to_local_ned(
    point: &GlobalPositionInt,
    reference: &GlobalPositionInt,
) -> LocalPositionNed {
    let (north, east, down) = ned_offset(point, reference);
    LocalPositionNed {
        x: north as f32,
        y: east as f32,
        z: down as f32,
    }
}

pub fn local_ned_to_global(
    point: &LocalPositionNed,
    reference: &GlobalPositionInt,
) -> GlobalPositionInt {
    let ref_lat = e7_to_rad(i64::from(reference.lat));

    let dlat_e7 = (rad2deg(f64::from(point.x) / EARTH_RADIUS_M) * E7).round() as i64;
    let cos_lat = ref_lat.cos();
    let dlon_e7 = if cos_lat.abs() < f64::EPSILON {
        0
    } else {
        (rad2deg(f64::from(point.y) / (EARTH_RADIUS_M * cos_lat)) * E7).round() as i64
    };
    let dalt_mm = (f64::from(point.z) * 1e3).round() as i64;

    let lat = (i64::from(reference.lat) + dlat_e7).clamp(-QUARTER_TURN_E7, QUARTER_TURN_E7);
    let lon = wrap_lon_e7(i64::from(reference.lon) + dlon_e7);
    let alt = (i64::from(reference.alt) - dalt_mm).clamp(i64::from(i32::MIN), i64::from(i32::MAX));

    GlobalPositionInt {
        lat: lat as i32,
        lon: lon as i32,
        alt: alt as i32,
    }
}

/// Angle the vehicle at `ref_pos` heading `ref_att.yaw` must turn to face
/// `wp_pos`, in (-pi, pi]. Positive is clockwise seen from above.
pub fn get_waypoint_rel_angle(
    wp_pos: &GlobalPositionInt,
    ref_pos: &GlobalPositionInt,
    ref_att: &Attitude,
) -> f64 {
    let (north, east, _) = ned_offset(wp_pos, ref_pos);
    let bearing = if north == 0.0 && east == 0.0 {
        0.0
    } else {
        east.atan2(north)
    };
    wrap_pi(bearing - f64::from(ref_att.yaw))
}
