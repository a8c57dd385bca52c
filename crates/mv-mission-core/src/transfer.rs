use crate::GlobalPositionInt;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferDirection {
    Upload,
    Download,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TransferPhase {
    Idle,
    RequestCount,
    TransferItems,
    AwaitAck,
    Completed,
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransferProgress {
    pub direction: TransferDirection,
    pub phase: TransferPhase,
    pub completed_items: u16,
    pub total_items: u16,
}

/// Frame the session has to put on the wire for the transfer to progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    SendCount(u16),
    SendItem { seq: u16, position: GlobalPositionInt },
    RequestList,
    RequestItem(u16),
    /// Accept the downloaded list.
    Ack,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded(Vec<GlobalPositionInt>),
    Downloaded(Vec<GlobalPositionInt>),
    Failed {
        direction: TransferDirection,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TransferState {
    Idle,
    Uploading {
        items: Vec<GlobalPositionInt>,
        cursor: u16,
        requested: bool,
        last_activity: Instant,
    },
    Downloading {
        total: Option<u16>,
        received: Vec<GlobalPositionInt>,
        last_activity: Instant,
    },
}

/// Mission upload/download handshake, driven by peer frames and `poll`.
///
/// At most one direction is active. Partially received lists never leave the
/// machine; they surface only through a `Downloaded` outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissionTransferMachine {
    state: TransferState,
    finished: Option<TransferProgress>,
    outcome: Option<TransferOutcome>,
    timeout: Option<Duration>,
}

impl Default for MissionTransferMachine {
    fn default() -> Self {
        Self::new(None)
    }
}

impl MissionTransferMachine {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self {
            state: TransferState::Idle,
            finished: None,
            outcome: None,
            timeout,
        }
    }

    /// Start sending `items`, replacing any running transfer. Returns `None`
    /// and leaves the machine alone when the list does not fit a mission
    /// count.
    pub fn start_upload(
        &mut self,
        items: Vec<GlobalPositionInt>,
        now: Instant,
    ) -> Option<TransferAction> {
        let count = u16::try_from(items.len()).ok()?;
        self.cancel();
        self.state = TransferState::Uploading {
            items,
            cursor: 0,
            requested: false,
            last_activity: now,
        };
        Some(TransferAction::SendCount(count))
    }

    pub fn start_download(&mut self, now: Instant) -> TransferAction {
        self.cancel();
        self.state = TransferState::Downloading {
            total: None,
            received: Vec::new(),
            last_activity: now,
        };
        TransferAction::RequestList
    }

    /// Abort whatever transfer is running. No outcome is produced.
    pub fn cancel(&mut self) {
        if let Some(mut progress) = self.active_progress() {
            progress.phase = TransferPhase::Cancelled;
            self.finished = Some(progress);
        }
        self.state = TransferState::Idle;
    }

    /// MISSION_REQUEST / MISSION_REQUEST_INT from the vehicle.
    pub fn on_request(&mut self, seq: u16, now: Instant) -> Option<TransferAction> {
        let TransferState::Uploading {
            items,
            cursor,
            requested,
            last_activity,
        } = &mut self.state
        else {
            return None;
        };

        let position = *items.get(usize::from(seq))?;
        *requested = true;
        *cursor = (*cursor).max(seq + 1);
        *last_activity = now;
        Some(TransferAction::SendItem { seq, position })
    }

    /// MISSION_COUNT from the vehicle.
    pub fn on_count(&mut self, count: u16, now: Instant) -> Option<TransferAction> {
        let TransferState::Downloading {
            total,
            last_activity,
            ..
        } = &mut self.state
        else {
            return None;
        };

        // A late answer to a re-sent list request.
        if total.is_some() {
            return None;
        }

        *total = Some(count);
        *last_activity = now;
        if count == 0 {
            self.finish(TransferOutcome::Downloaded(Vec::new()));
            return Some(TransferAction::Ack);
        }
        Some(TransferAction::RequestItem(0))
    }

    /// MISSION_ITEM / MISSION_ITEM_INT from the vehicle.
    pub fn on_item(
        &mut self,
        seq: u16,
        position: GlobalPositionInt,
        now: Instant,
    ) -> Option<TransferAction> {
        let TransferState::Downloading {
            total: Some(total),
            received,
            last_activity,
        } = &mut self.state
        else {
            return None;
        };

        if usize::from(seq) != received.len() {
            return None;
        }

        received.push(position);
        *last_activity = now;
        if received.len() < usize::from(*total) {
            return Some(TransferAction::RequestItem(seq + 1));
        }

        let list = std::mem::take(received);
        self.finish(TransferOutcome::Downloaded(list));
        Some(TransferAction::Ack)
    }

    /// MISSION_ACK from the vehicle.
    pub fn on_ack(&mut self, accepted: bool) {
        match &mut self.state {
            TransferState::Uploading { items, cursor, .. } => {
                if !accepted {
                    self.fail(TransferDirection::Upload, "vehicle rejected the mission");
                } else if usize::from(*cursor) >= items.len() {
                    let uploaded = std::mem::take(items);
                    self.finish(TransferOutcome::Uploaded(uploaded));
                }
            }
            TransferState::Downloading { .. } if !accepted => {
                self.fail(TransferDirection::Download, "vehicle aborted the download");
            }
            _ => {}
        }
    }

    /// Frame to re-issue while waiting on the vehicle, if any. Abandons the
    /// transfer once the configured timeout passes without peer activity.
    pub fn poll(&mut self, now: Instant) -> Option<TransferAction> {
        let last_activity = match &self.state {
            TransferState::Idle => return None,
            TransferState::Uploading { last_activity, .. }
            | TransferState::Downloading { last_activity, .. } => *last_activity,
        };

        if let Some(timeout) = self.timeout {
            if now.saturating_duration_since(last_activity) >= timeout {
                let direction = match self.state {
                    TransferState::Uploading { .. } => TransferDirection::Upload,
                    _ => TransferDirection::Download,
                };
                self.fail(direction, "no response from vehicle");
                return None;
            }
        }

        match &self.state {
            TransferState::Uploading {
                items,
                requested: false,
                ..
            } => Some(TransferAction::SendCount(items.len() as u16)),
            TransferState::Downloading { total: None, .. } => Some(TransferAction::RequestList),
            TransferState::Downloading {
                total: Some(_),
                received,
                ..
            } => Some(TransferAction::RequestItem(received.len() as u16)),
            _ => None,
        }
    }

    pub fn take_outcome(&mut self) -> Option<TransferOutcome> {
        self.outcome.take()
    }

    pub fn is_sending(&self) -> bool {
        matches!(self.state, TransferState::Uploading { .. })
    }

    pub fn is_receiving(&self) -> bool {
        matches!(self.state, TransferState::Downloading { .. })
    }

    /// List of the upload in progress.
    pub fn pending_upload(&self) -> Option<&[GlobalPositionInt]> {
        match &self.state {
            TransferState::Uploading { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Progress of the running transfer, or the final state of the last one.
    pub fn progress(&self) -> Option<TransferProgress> {
        self.active_progress().or(self.finished)
    }

    fn active_progress(&self) -> Option<TransferProgress> {
        match &self.state {
            TransferState::Idle => None,
            TransferState::Uploading {
                items,
                cursor,
                requested,
                ..
            } => {
                let total_items = items.len() as u16;
                let phase = if !requested {
                    TransferPhase::RequestCount
                } else if *cursor < total_items {
                    TransferPhase::TransferItems
                } else {
                    TransferPhase::AwaitAck
                };
                Some(TransferProgress {
                    direction: TransferDirection::Upload,
                    phase,
                    completed_items: *cursor,
                    total_items,
                })
            }
            TransferState::Downloading {
                total, received, ..
            } => Some(TransferProgress {
                direction: TransferDirection::Download,
                phase: if total.is_some() {
                    TransferPhase::TransferItems
                } else {
                    TransferPhase::RequestCount
                },
                completed_items: received.len() as u16,
                total_items: total.unwrap_or(0),
            }),
        }
    }

    fn finish(&mut self, outcome: TransferOutcome) {
        let (direction, count) = match &outcome {
            TransferOutcome::Uploaded(items) => (TransferDirection::Upload, items.len() as u16),
            TransferOutcome::Downloaded(items) => (TransferDirection::Download, items.len() as u16),
            TransferOutcome::Failed { direction, .. } => (*direction, 0),
        };
        self.finished = Some(TransferProgress {
            direction,
            phase: TransferPhase::Completed,
            completed_items: count,
            total_items: count,
        });
        self.state = TransferState::Idle;
        self.outcome = Some(outcome);
    }

    fn fail(&mut self, direction: TransferDirection, reason: &str) {
        let mut progress = self.active_progress().unwrap_or(TransferProgress {
            direction,
            phase: TransferPhase::Failed,
            completed_items: 0,
            total_items: 0,
        });
        progress.phase = TransferPhase::Failed;
        self.finished = Some(progress);
        self.state = TransferState::Idle;
        self.outcome = Some(TransferOutcome::Failed {
            direction,
            reason: reason.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn waypoints(count: usize) -> Vec<GlobalPositionInt> {
        (0..count)
            .map(|i| GlobalPositionInt::new(473_977_420 + i as i32 * 1_000, 85_455_970, 10_000))
            .collect()
    }

    #[test]
    fn upload_flow_reaches_completed_state() {
        let now = Instant::now();
        let items = waypoints(2);
        let mut machine = MissionTransferMachine::default();

        assert_eq!(
            machine.start_upload(items.clone(), now),
            Some(TransferAction::SendCount(2))
        );
        assert!(machine.is_sending());
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::RequestCount));

        assert_eq!(
            machine.on_request(0, now),
            Some(TransferAction::SendItem {
                seq: 0,
                position: items[0]
            })
        );
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::TransferItems));
        assert_eq!(
            machine.on_request(1, now),
            Some(TransferAction::SendItem {
                seq: 1,
                position: items[1]
            })
        );
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::AwaitAck));

        machine.on_ack(true);
        assert!(!machine.is_sending());
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::Completed));
        assert_eq!(machine.take_outcome(), Some(TransferOutcome::Uploaded(items)));
        assert_eq!(machine.take_outcome(), None);
    }

    #[test]
    fn upload_too_long_for_mission_count_is_refused() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_download(now);

        let items = vec![GlobalPositionInt::default(); usize::from(u16::MAX) + 1];
        assert_eq!(machine.start_upload(items, now), None);
        assert!(!machine.is_sending());
        assert!(machine.is_receiving());

        let items = vec![GlobalPositionInt::default(); usize::from(u16::MAX)];
        assert_eq!(
            machine.start_upload(items, now),
            Some(TransferAction::SendCount(u16::MAX))
        );
        assert_eq!(
            machine.on_request(u16::MAX - 1, now),
            Some(TransferAction::SendItem {
                seq: u16::MAX - 1,
                position: GlobalPositionInt::default()
            })
        );
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::AwaitAck));
    }

    #[test]
    fn upload_answers_repeated_requests_and_ignores_out_of_range() {
        let now = Instant::now();
        let items = waypoints(2);
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(items.clone(), now);

        assert!(machine.on_request(0, now).is_some());
        assert_eq!(
            machine.on_request(0, now),
            Some(TransferAction::SendItem {
                seq: 0,
                position: items[0]
            })
        );
        assert_eq!(machine.on_request(7, now), None);
        assert_eq!(machine.progress().map(|p| p.completed_items), Some(1));
    }

    #[test]
    fn accepted_ack_before_last_item_is_ignored() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(waypoints(3), now);
        machine.on_request(0, now);

        machine.on_ack(true);
        assert!(machine.is_sending());
        assert_eq!(machine.take_outcome(), None);
    }

    #[test]
    fn rejected_ack_fails_upload() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(waypoints(3), now);
        machine.on_request(0, now);

        machine.on_ack(false);
        assert!(!machine.is_sending());
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::Failed));
        assert!(matches!(
            machine.take_outcome(),
            Some(TransferOutcome::Failed {
                direction: TransferDirection::Upload,
                ..
            })
        ));
    }

    #[test]
    fn poll_reissues_count_until_first_request() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(waypoints(1), now);

        assert_eq!(machine.poll(now), Some(TransferAction::SendCount(1)));
        machine.on_request(0, now);
        assert_eq!(machine.poll(now), None);
    }

    #[test]
    fn download_flow_requests_each_item_in_order() {
        let now = Instant::now();
        let items = waypoints(3);
        let mut machine = MissionTransferMachine::default();

        assert_eq!(machine.start_download(now), TransferAction::RequestList);
        assert_eq!(machine.poll(now), Some(TransferAction::RequestList));
        assert_eq!(machine.on_count(3, now), Some(TransferAction::RequestItem(0)));
        assert_eq!(machine.on_count(3, now), None);

        assert_eq!(machine.on_item(0, items[0], now), Some(TransferAction::RequestItem(1)));
        assert_eq!(machine.on_item(2, items[2], now), None);
        assert_eq!(machine.poll(now), Some(TransferAction::RequestItem(1)));
        assert_eq!(machine.on_item(1, items[1], now), Some(TransferAction::RequestItem(2)));
        assert!(machine.is_receiving());
        assert_eq!(machine.take_outcome(), None);

        assert_eq!(machine.on_item(2, items[2], now), Some(TransferAction::Ack));
        assert!(!machine.is_receiving());
        assert_eq!(machine.take_outcome(), Some(TransferOutcome::Downloaded(items)));
    }

    #[test]
    fn empty_download_completes_on_count() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_download(now);

        assert_eq!(machine.on_count(0, now), Some(TransferAction::Ack));
        assert!(!machine.is_receiving());
        assert_eq!(machine.take_outcome(), Some(TransferOutcome::Downloaded(Vec::new())));
    }

    #[test]
    fn starting_download_cancels_upload() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(waypoints(2), now);
        machine.start_download(now);

        assert!(!machine.is_sending());
        assert!(machine.is_receiving());
        assert_eq!(machine.on_request(0, now), None);

        machine.cancel();
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::Cancelled));
        assert_eq!(machine.take_outcome(), None);
    }

    #[test]
    fn frames_while_idle_are_ignored() {
        let now = Instant::now();
        let mut machine = MissionTransferMachine::default();
        assert_eq!(machine.on_request(0, now), None);
        assert_eq!(machine.on_count(2, now), None);
        assert_eq!(machine.on_item(0, GlobalPositionInt::default(), now), None);
        machine.on_ack(false);
        assert_eq!(machine.poll(now), None);
        assert_eq!(machine.progress(), None);
        assert_eq!(machine.take_outcome(), None);
    }

    #[test]
    fn timeout_abandons_silent_transfer() {
        let start = Instant::now();
        let mut machine = MissionTransferMachine::new(Some(Duration::from_secs(5)));
        machine.start_download(start);

        assert_eq!(
            machine.poll(start + Duration::from_secs(4)),
            Some(TransferAction::RequestList)
        );
        assert_eq!(
            machine.on_count(2, start + Duration::from_secs(4)),
            Some(TransferAction::RequestItem(0))
        );
        assert!(machine.poll(start + Duration::from_secs(8)).is_some());

        assert_eq!(machine.poll(start + Duration::from_secs(9)), None);
        assert!(!machine.is_receiving());
        assert_eq!(machine.progress().map(|p| p.phase), Some(TransferPhase::Failed));
        assert!(matches!(
            machine.take_outcome(),
            Some(TransferOutcome::Failed {
                direction: TransferDirection::Download,
                ..
            })
        ));
    }

    #[test]
    fn without_timeout_transfer_waits_indefinitely() {
        let start = Instant::now();
        let mut machine = MissionTransferMachine::default();
        machine.start_upload(waypoints(1), start);
        assert_eq!(
            machine.poll(start + Duration::from_secs(3600)),
            Some(TransferAction::SendCount(1))
        );
        assert!(machine.is_sending());
    }
}
