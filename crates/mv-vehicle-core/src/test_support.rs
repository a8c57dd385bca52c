use mavlink::common::{self, MavAutopilot, MavModeFlag};
use mavlink::error::{MessageReadError, MessageWriteError};
use mavlink::{MAVLinkMessageRaw, MavConnection, MavFrame, MavHeader, MavlinkVersion};
use mv_mission_core::GlobalPositionInt;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

pub const VEHICLE_HEADER: MavHeader = MavHeader {
    sequence: 1,
    system_id: 1,
    component_id: 1,
};

enum Inbound {
    Frame(MavHeader, common::MavMessage),
    Error(std::io::ErrorKind),
}

#[derive(Clone, Default)]
struct Shared {
    incoming: Arc<Mutex<VecDeque<Inbound>>>,
    sent: Arc<Mutex<Vec<common::MavMessage>>>,
}

pub struct MockConnection {
    protocol_version: Mutex<MavlinkVersion>,
    allow_any: Mutex<bool>,
    shared: Shared,
}

/// Test-side view of a [`MockConnection`] that was handed to a `Vehicle`.
#[derive(Clone)]
pub struct MockHandle {
    shared: Shared,
}

impl MockConnection {
    pub fn new() -> (Self, MockHandle) {
        let shared = Shared::default();
        let connection = Self {
            protocol_version: Mutex::new(MavlinkVersion::V2),
            allow_any: Mutex::new(true),
            shared: shared.clone(),
        };
        (connection, MockHandle { shared })
    }
}

impl MockHandle {
    pub fn push(&self, message: common::MavMessage) {
        self.push_from(VEHICLE_HEADER, message);
    }

    pub fn push_from(&self, header: MavHeader, message: common::MavMessage) {
        self.shared
            .incoming
            .lock()
            .expect("incoming lock")
            .push_back(Inbound::Frame(header, message));
    }

    pub fn push_read_error(&self, kind: std::io::ErrorKind) {
        self.shared
            .incoming
            .lock()
            .expect("incoming lock")
            .push_back(Inbound::Error(kind));
    }

    pub fn take_sent(&self) -> Vec<common::MavMessage> {
        std::mem::take(&mut *self.shared.sent.lock().expect("sent lock"))
    }
}

impl MavConnection<common::MavMessage> for MockConnection {
    fn recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        self.try_recv()
    }

    fn recv_raw(&self) -> Result<MAVLinkMessageRaw, MessageReadError> {
        Err(MessageReadError::Io(std::io::ErrorKind::WouldBlock.into()))
    }

    fn try_recv(&self) -> Result<(MavHeader, common::MavMessage), MessageReadError> {
        match self.shared.incoming.lock().expect("incoming lock").pop_front() {
            Some(Inbound::Frame(header, message)) => Ok((header, message)),
            Some(Inbound::Error(kind)) => Err(MessageReadError::Io(kind.into())),
            None => Err(MessageReadError::Io(std::io::ErrorKind::WouldBlock.into())),
        }
    }

    fn send(
        &self,
        _header: &MavHeader,
        data: &common::MavMessage,
    ) -> Result<usize, MessageWriteError> {
        self.shared.sent.lock().expect("sent lock").push(data.clone());
        Ok(1)
    }

    fn set_protocol_version(&mut self, version: MavlinkVersion) {
        *self.protocol_version.lock().expect("protocol lock") = version;
    }

    fn protocol_version(&self) -> MavlinkVersion {
        *self.protocol_version.lock().expect("protocol lock")
    }

    fn set_allow_recv_any_version(&mut self, allow: bool) {
        *self.allow_any.lock().expect("allow lock") = allow;
    }

    fn allow_recv_any_version(&self) -> bool {
        *self.allow_any.lock().expect("allow lock")
    }

    fn send_frame(&self, frame: &MavFrame<common::MavMessage>) -> Result<usize, MessageWriteError> {
        self.send(&frame.header, &frame.msg)
    }
}

// ----------------------------------------------------------------------------
// Frames a vehicle would send
// ----------------------------------------------------------------------------

pub fn heartbeat(autopilot: MavAutopilot, custom_mode: u32, armed: bool) -> common::MavMessage {
    let mut base_mode = MavModeFlag::MAV_MODE_FLAG_CUSTOM_MODE_ENABLED;
    if armed {
        base_mode |= MavModeFlag::MAV_MODE_FLAG_SAFETY_ARMED;
    }
    common::MavMessage::HEARTBEAT(common::HEARTBEAT_DATA {
        custom_mode,
        mavtype: common::MavType::MAV_TYPE_QUADROTOR,
        autopilot,
        base_mode,
        system_status: common::MavState::MAV_STATE_ACTIVE,
        mavlink_version: 3,
    })
}

pub fn apm_heartbeat(custom_mode: u32) -> common::MavMessage {
    heartbeat(MavAutopilot::MAV_AUTOPILOT_ARDUPILOTMEGA, custom_mode, true)
}

pub fn attitude(yaw: f32) -> common::MavMessage {
    common::MavMessage::ATTITUDE(common::ATTITUDE_DATA {
        yaw,
        ..Default::default()
    })
}

/// Position with horizontal speed in cm/s.
pub fn global_position(position: GlobalPositionInt, vx: i16, vy: i16) -> common::MavMessage {
    common::MavMessage::GLOBAL_POSITION_INT(common::GLOBAL_POSITION_INT_DATA {
        lat: position.lat,
        lon: position.lon,
        alt: position.alt,
        vx,
        vy,
        ..Default::default()
    })
}

pub fn home_position(position: GlobalPositionInt) -> common::MavMessage {
    common::MavMessage::HOME_POSITION(common::HOME_POSITION_DATA {
        latitude: position.lat,
        longitude: position.lon,
        altitude: position.alt,
        ..Default::default()
    })
}

pub fn mission_request(seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_REQUEST_INT(common::MISSION_REQUEST_INT_DATA {
        seq,
        target_system: 255,
        target_component: 190,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
    })
}

pub fn mission_count(count: u16) -> common::MavMessage {
    common::MavMessage::MISSION_COUNT(common::MISSION_COUNT_DATA {
        count,
        target_system: 255,
        target_component: 190,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}

pub fn mission_item(seq: u16, position: GlobalPositionInt) -> common::MavMessage {
    common::MavMessage::MISSION_ITEM_INT(common::MISSION_ITEM_INT_DATA {
        x: position.lat,
        y: position.lon,
        z: position.alt as f32 / 1000.0,
        seq,
        command: common::MavCmd::MAV_CMD_NAV_WAYPOINT,
        target_system: 255,
        target_component: 190,
        frame: common::MavFrame::MAV_FRAME_GLOBAL_INT,
        autocontinue: 1,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        ..Default::default()
    })
}

pub fn mission_ack(result: common::MavMissionResult) -> common::MavMessage {
    common::MavMessage::MISSION_ACK(common::MISSION_ACK_DATA {
        target_system: 255,
        target_component: 190,
        mavtype: result,
        mission_type: common::MavMissionType::MAV_MISSION_TYPE_MISSION,
        opaque_id: 0,
    })
}

pub fn mission_current(seq: u16) -> common::MavMessage {
    common::MavMessage::MISSION_CURRENT(common::MISSION_CURRENT_DATA {
        seq,
        ..Default::default()
    })
}

pub fn command_ack(command: common::MavCmd, result: common::MavResult) -> common::MavMessage {
    common::MavMessage::COMMAND_ACK(common::COMMAND_ACK_DATA {
        command,
        result,
        ..Default::default()
    })
}
