//! Folds decoded vehicle frames into the [`TelemetryStore`].
//!
//! Telemetry frames are absorbed here. Mission and command handshake frames
//! come back as [`ProtocolEvent`]s for the session to route to the transfer
//! machine and the command tracker.

use crate::modes;
use crate::state::{ArmStatus, AutopilotType, GpsStatus, TelemetryStore};
use mavlink::common::{self, MavAutopilot, MavCmd, MavModeFlag, MavResult};
use mv_mission_core::{Attitude, GlobalPositionInt, LocalPositionNed, Velocity};
use std::time::Instant;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum ProtocolEvent {
    MissionCount(u16),
    MissionRequest(u16),
    MissionItem { seq: u16, position: GlobalPositionInt },
    MissionAck { accepted: bool },
    MissionCurrent(u16),
    CommandAck { command: MavCmd, result: MavResult },
}

pub(crate) fn is_vehicle_heartbeat(message: &common::MavMessage) -> bool {
    matches!(
        message,
        common::MavMessage::HEARTBEAT(hb) if hb.autopilot != MavAutopilot::MAV_AUTOPILOT_INVALID
    )
}

fn is_mission_type(mission_type: common::MavMissionType) -> bool {
    mission_type == common::MavMissionType::MAV_MISSION_TYPE_MISSION
}

#[allow(deprecated)]
fn is_relative_frame(frame: common::MavFrame) -> bool {
    matches!(
        frame,
        common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT
            | common::MavFrame::MAV_FRAME_GLOBAL_RELATIVE_ALT_INT
    )
}

/// Waypoint altitude in mm AMSL. Relative frames are lifted by the home
/// altitude once it is known.
fn waypoint_altitude_mm(store: &TelemetryStore, frame: common::MavFrame, z: f32) -> i32 {
    let alt = (f64::from(z) * 1e3).round() as i32;
    match store.home_position.known() {
        Some(home) if is_relative_frame(frame) => alt.saturating_add(home.alt),
        _ => alt,
    }
}

#[allow(deprecated)]
pub(crate) fn interpret(
    store: &mut TelemetryStore,
    message: &common::MavMessage,
    now: Instant,
) -> Option<ProtocolEvent> {
    match message {
        common::MavMessage::HEARTBEAT(hb) => {
            if hb.autopilot == MavAutopilot::MAV_AUTOPILOT_INVALID {
                trace!("ignoring non-autopilot heartbeat");
                return None;
            }
            store.last_heartbeat = Some(now);
            store.arm_status = if hb.base_mode.contains(MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED) {
                ArmStatus::Armed
            } else {
                ArmStatus::NotArmed
            };
            if store.autopilot == AutopilotType::Unknown {
                store.autopilot = AutopilotType::from_mav(hb.autopilot);
                debug!("autopilot detected: {:?}", store.autopilot);
            }
            store.custom_mode = Some(hb.custom_mode);
            store.mode = modes::decode(store.autopilot, hb.custom_mode);
            None
        }
        common::MavMessage::ATTITUDE(data) => {
            store.attitude.set(
                Attitude {
                    roll: data.roll,
                    pitch: data.pitch,
                    yaw: data.yaw,
                },
                now,
            );
            None
        }
        common::MavMessage::GLOBAL_POSITION_INT(data) => {
            store
                .global_position
                .set(GlobalPositionInt::new(data.lat, data.lon, data.alt), now);
            store.speed.set(
                Velocity {
                    vx: f32::from(data.vx) / 100.0,
                    vy: f32::from(data.vy) / 100.0,
                    vz: f32::from(data.vz) / 100.0,
                },
                now,
            );
            None
        }
        common::MavMessage::LOCAL_POSITION_NED(data) => {
            store
                .local_position
                .set(LocalPositionNed::new(data.x, data.y, data.z), now);
            store.speed.set(
                Velocity {
                    vx: data.vx,
                    vy: data.vy,
                    vz: data.vz,
                },
                now,
            );
            None
        }
        common::MavMessage::HOME_POSITION(data) => {
            store.home_position.set(
                GlobalPositionInt::new(data.latitude, data.longitude, data.altitude),
                now,
            );
            None
        }
        common::MavMessage::GPS_RAW_INT(data) => {
            store.gps_status = GpsStatus::from_raw(data.fix_type as u8);
            None
        }
        common::MavMessage::MISSION_COUNT(data) if is_mission_type(data.mission_type) => {
            Some(ProtocolEvent::MissionCount(data.count))
        }
        common::MavMessage::MISSION_REQUEST_INT(data) if is_mission_type(data.mission_type) => {
            Some(ProtocolEvent::MissionRequest(data.seq))
        }
        common::MavMessage::MISSION_REQUEST(data) if is_mission_type(data.mission_type) => {
            Some(ProtocolEvent::MissionRequest(data.seq))
        }
        common::MavMessage::MISSION_ITEM_INT(data) if is_mission_type(data.mission_type) => {
            Some(ProtocolEvent::MissionItem {
                seq: data.seq,
                position: GlobalPositionInt::new(
                    data.x,
                    data.y,
                    waypoint_altitude_mm(store, data.frame, data.z),
                ),
            })
        }
        common::MavMessage::MISSION_ITEM(data) if is_mission_type(data.mission_type) => {
            let mut position =
                GlobalPositionInt::from_degrees(f64::from(data.x), f64::from(data.y), 0.0);
            position.alt = waypoint_altitude_mm(store, data.frame, data.z);
            Some(ProtocolEvent::MissionItem {
                seq: data.seq,
                position,
            })
        }
        common::MavMessage::MISSION_ACK(data) if is_mission_type(data.mission_type) => {
            Some(ProtocolEvent::MissionAck {
                accepted: data.mavtype == common::MavMissionResult::MAV_MISSION_ACCEPTED,
            })
        }
        common::MavMessage::MISSION_CURRENT(data) => Some(ProtocolEvent::MissionCurrent(data.seq)),
        common::MavMessage::COMMAND_ACK(data) => Some(ProtocolEvent::CommandAck {
            command: data.command,
            result: data.result,
        }),
        _ => {
            trace!("unhandled message type");
            None
        }
    }
}
