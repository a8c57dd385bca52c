//! Throttled, retried command transmission.
//!
//! Every outbound command kind remembers when it was last put on the wire and
//! is not sent again before the retry interval passes. Commands that need a
//! confirmation stay outstanding and are re-sent on that cadence until the
//! vehicle confirms them, rejects them, or their deadline passes.

use crate::state::{ArmStatus, Mode, TelemetryStore};
use mavlink::common::{self, MavCmd, MavResult};
use num_traits::FromPrimitive;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Session-level commands that share the retry throttle with COMMAND_LONGs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CustomCommand {
    Heartbeat,
    SetMode(Mode),
    RequestHome,
    RequestMissionItem,
    RequestMissionList,
    MissionCount,
    Rotate,
    Detour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Long(u16),
    Custom(CustomCommand),
}

impl CommandKind {
    pub fn long(command: MavCmd) -> Self {
        CommandKind::Long(command as u16)
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandKind::Long(id) => match MavCmd::from_u16(*id) {
                Some(command) => write!(f, "{command:?}"),
                None => write!(f, "MAV_CMD {id}"),
            },
            CommandKind::Custom(command) => write!(f, "{command:?}"),
        }
    }
}

/// What retires an outstanding command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Completion {
    Ack,
    /// Heartbeat reports this raw `custom_mode`.
    Mode(u32),
    Arm(ArmStatus),
}

#[derive(Debug, Clone)]
struct Outstanding {
    kind: CommandKind,
    message: common::MavMessage,
    completion: Completion,
    deadline: Instant,
}

impl Outstanding {
    fn command(&self) -> Option<MavCmd> {
        match &self.message {
            common::MavMessage::COMMAND_LONG(data) => Some(data.command),
            _ => None,
        }
    }

    fn is_satisfied(&self, store: &TelemetryStore) -> bool {
        match self.completion {
            Completion::Ack => false,
            Completion::Mode(code) => store.custom_mode == Some(code),
            Completion::Arm(status) => store.last_heartbeat.is_some() && store.arm_status == status,
        }
    }
}

#[derive(Debug)]
pub(crate) struct CommandTracker {
    interval: Duration,
    last_sent: HashMap<CommandKind, Instant>,
    outstanding: Vec<Outstanding>,
}

impl CommandTracker {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: HashMap::new(),
            outstanding: Vec::new(),
        }
    }

    pub fn is_due(&self, kind: CommandKind, now: Instant) -> bool {
        match self.last_sent.get(&kind) {
            Some(&at) => now.saturating_duration_since(at) >= self.interval,
            None => true,
        }
    }

    /// Record a transmission. Only called once the frame actually went out.
    pub fn mark_sent(&mut self, kind: CommandKind, now: Instant) {
        self.last_sent.insert(kind, now);
    }

    /// Let the next request of `kind` go out immediately.
    pub fn reset(&mut self, kind: CommandKind) {
        self.last_sent.remove(&kind);
    }

    pub fn track(
        &mut self,
        kind: CommandKind,
        message: common::MavMessage,
        completion: Completion,
        deadline: Instant,
    ) {
        self.outstanding.retain(|entry| entry.kind != kind);
        self.outstanding.push(Outstanding {
            kind,
            message,
            completion,
            deadline,
        });
    }

    pub fn is_outstanding(&self, kind: CommandKind) -> bool {
        self.outstanding.iter().any(|entry| entry.kind == kind)
    }

    pub fn forget<F>(&mut self, mut predicate: F)
    where
        F: FnMut(CommandKind) -> bool,
    {
        self.outstanding.retain(|entry| !predicate(entry.kind));
    }

    pub fn on_ack(&mut self, command: MavCmd, result: MavResult) {
        self.outstanding.retain(|entry| {
            if entry.command() != Some(command) {
                return true;
            }
            match result {
                MavResult::MAV_RESULT_ACCEPTED => entry.completion != Completion::Ack,
                MavResult::MAV_RESULT_TEMPORARILY_REJECTED | MavResult::MAV_RESULT_IN_PROGRESS => {
                    true
                }
                _ => {
                    warn!("{command:?} rejected by vehicle: {result:?}");
                    false
                }
            }
        });
    }

    /// Outstanding commands due for another transmission. Satisfied and
    /// expired entries are dropped on the way.
    pub fn due_resends(
        &mut self,
        now: Instant,
        store: &TelemetryStore,
    ) -> Vec<(CommandKind, common::MavMessage)> {
        self.outstanding.retain(|entry| {
            if entry.is_satisfied(store) {
                debug!("{} confirmed", entry.kind);
                return false;
            }
            if now >= entry.deadline {
                warn!("{} not confirmed before its deadline, giving up", entry.kind);
                return false;
            }
            true
        });

        self.outstanding
            .iter()
            .filter(|entry| self.is_due(entry.kind, now))
            .map(|entry| (entry.kind, entry.message.clone()))
            .collect()
    }
}
