//! Builders for the frames the session sends.

use mavlink::common::{self, MavCmd};
use mv_mission_core::{math, GlobalPositionInt};

const HOME_POSITION_MESSAGE_ID: f32 = 242.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct VehicleTarget {
    pub system_id: u8,
    pub component_id: u8,
}

pub(crate) fn heartbeat() -> common::MavMessage {
    common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
        custom_mode: 0,
        mavtype: common::MavType::MAV_TYPE_GCS,
        autopilot: common::MavAutopilot::MAV_AUTOPILOT_INVALID,
        base_mode: common::MavModeFlag::empty(),
        system_status: common::MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

pub(crate) fn command_long(
    target: VehicleTarget,
    command: MavCmd,
    params: [f32; 7],
) -> common::MavMessage {
    common::MavMessage::COMMAND_LONG(common::COMMAND_LONG_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        command,
        confirmation: 0,
        param1: params[0],
        param2: params[1],
        param3: params[2],
        param4: params[3],
        param5: params[4],
        param6: params[5],
        param7: params[6],
    })
}

pub(crate) fn request_home_position(target: VehicleTarget) -> common::MavMessage {
    command_long(
        target,
        MavCmd::MAV_CMD_REQUEST_MESSAGE,
        [HOME_POSITION_MESSAGE_ID, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
    )
}

/// Absolute heading `goal` (radians), turning whichever way is shorter from `yaw`.
pub(crate) fn condition_yaw(target: VehicleTarget, goal: f64, yaw: f64) -> common::MavMessage {
    let heading_deg = math::rad2deg(goal).rem_euclid(360.0);
    let direction = if math::wrap_pi(goal - yaw) >= 0.0 { 1.0 } else { -1.0 };
    command_long(
        target,
        MavCmd::MAV_CMD_CONDITION_YAW,
        [heading_deg as f32, 0.0, direction, 0.0, 0.0, 0.0, 0.0],
    )
}

pub(crate) fn position_target(
    target: VehicleTarget,
    position: GlobalPositionInt,
) -> common::MavMessage {
    // Position only: ignore velocity, acceleration and yaw fields.
    let type_mask = common::PositionTargetTypemask::from_bits_truncate(0x0DF8);

    common::MavMessage::SET_POSITION_TARGET_GLOBAL_INT(common::SET_POSITION_TARGET_GLOBAL_INT_DATA {
        time_boot_ms: 0,
        target_system: target.system_id,
        target_component: target.component_id,
        coordinate_frame: common::MavFrame::MAV_FRAME_GLOBAL,
        type_mask,
        lat_int: position.lat,
        lon_int: position.lon,
        alt: position.alt as f32 / 1000.0,
        vx: 0.0,
        vy: 0.0,
        vz: 0.0,
        afx: 0.0,
        afy: 0.0,
        afz: 0.0,
        yaw: 0.0,
        yaw_rate: 0.0,
    })
}

pub(crate) fn mission_count(target: VehicleTarget, count: u16) -> common::MavMessage {
    common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
        count,
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}

pub(crate) fn mission_item(
    target: VehicleTarget,
    seq: u16,
    position: GlobalPositionInt,
) -> common::MavMessage {
    common::MavMessage::MISSION_ITEM_INT(common::MISSION_ITEM_INT_DATA {
        param1: 0.0,
        param2: 0.0,
        param3: 0.0,
        param4: 0.0,
        x: position.lat,
        y: position.lon,
        z: position.alt as f32 / 1000.0,
        seq,
        command: MavCmd::MAV_CMD_NAV_WAYPOINT,
        target_system: target.system_id,
        target_component: target.component_id,
        frame: common::MavFrame::MAV_FRAME_GLOBAL,
        current: u8::from(seq == 0),
        autocontinue: 1,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub(crate) fn mission_request_list(target: VehicleTarget) -> common::MavMessage {
    common::MavMessage::MISSION_REQUEST_LIST(common::MISSION_REQUEST_LIST_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub(crate) fn mission_request_item(target: VehicleTarget, seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_REQUEST_INT(common::MISSION_REQUEST_INT_DATA {
        seq,
        target_system: target.system_id,
        target_component: target.component_id,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub(crate) fn mission_ack(target: VehicleTarget) -> common::MavMessage {
    common::MavMessage::MISSION_ACK(common::MISSION_ACK_DATA {
        target_system: target.system_id,
        target_component: target.component_id,
        mavtype: common::MavMissionResult::MAV_MISSION_ACCEPTED,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}
