use crate::clock::{Clock, SystemClock};
use crate::command::{CommandKind, CommandTracker, Completion, CustomCommand};
use crate::config::VehicleConfig;
use crate::error::VehicleError;
use crate::interpreter::{self, ProtocolEvent};
use crate::maneuver::{Directive, MotionControl, Observation};
use crate::modes;
use crate::state::{
    ArmStatus, AutopilotType, GpsStatus, MissionStatus, Mode, Status, TelemetryStore, Timestamped,
};
use crate::wire::{self, VehicleTarget};
use mavlink::common::{self, MavCmd};
use mavlink::error::MessageReadError;
use mavlink::{MavConnection, MavHeader};
use mv_mission_core::{
    math, validate_waypoints, Attitude, GlobalPositionInt, IssueSeverity, LocalPositionNed,
    MissionTransferMachine, TransferAction, TransferOutcome, TransferProgress, Velocity,
};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

type Connection = Box<dyn MavConnection<common::MavMessage> + Send + Sync>;

/// Client-side session with one MAVLink vehicle.
///
/// Nothing happens in the background: call [`Vehicle::update`] regularly to
/// take in the vehicle's frames and to let retries, mission transfers and
/// maneuvers make progress.
pub struct Vehicle {
    connection: Connection,
    clock: Box<dyn Clock>,
    // Clock sample of the latest update cycle.
    last_update: Instant,
    config: VehicleConfig,
    target: Option<VehicleTarget>,
    sequence: u8,
    store: TelemetryStore,
    commands: CommandTracker,
    transfer: MissionTransferMachine,
    motion: MotionControl,
    pending_mission_start: bool,
    current_seq: Option<u16>,
    current_outdated: bool,
    // The fetched current waypoint has not been autorotated toward yet.
    autorotate_pending: bool,
}

impl Vehicle {
    pub fn new(
        connection: impl MavConnection<common::MavMessage> + Send + Sync + 'static,
    ) -> Self {
        Self::with_config(connection, VehicleConfig::default())
    }

    pub fn with_config(
        connection: impl MavConnection<common::MavMessage> + Send + Sync + 'static,
        config: VehicleConfig,
    ) -> Self {
        Self::with_clock(connection, config, SystemClock)
    }

    pub fn with_clock(
        connection: impl MavConnection<common::MavMessage> + Send + Sync + 'static,
        config: VehicleConfig,
        clock: impl Clock + 'static,
    ) -> Self {
        let last_update = clock.now();
        Self {
            connection: Box::new(connection),
            clock: Box::new(clock),
            last_update,
            commands: CommandTracker::new(config.retry_policy.retry_interval()),
            transfer: MissionTransferMachine::new(config.transfer_timeout),
            config,
            target: None,
            sequence: 0,
            store: TelemetryStore::default(),
            motion: MotionControl::default(),
            pending_mission_start: false,
            current_seq: None,
            current_outdated: false,
            autorotate_pending: false,
        }
    }

    /// Process every frame waiting on the connection, then send whatever
    /// is due: heartbeat, home request, transfer frames, maneuver commands
    /// and command retries.
    ///
    /// A transport error ends the cycle early. The session stays usable and
    /// the next call carries on.
    pub fn update(&mut self) -> Result<(), VehicleError> {
        let now = self.clock.now();
        self.last_update = now;

        loop {
            match self.connection.try_recv() {
                Ok((header, message)) => self.handle_frame(header, &message, now)?,
                Err(err) if is_non_fatal_read_error(&err) => break,
                Err(MessageReadError::Io(err)) => {
                    warn!("MAVLink read failed: {err}");
                    return Err(err.into());
                }
                Err(err) => trace!("skipping undecodable frame: {err:?}"),
            }
        }

        self.drive_outbound(now)
    }

    // ------------------------------------------------------------------
    // Telemetry
    // ------------------------------------------------------------------

    /// True once both the vehicle position and its home are known.
    pub fn is_ready(&self) -> bool {
        self.store.global_position.is_initialized() && self.store.home_position.is_initialized()
    }

    pub fn get_mode(&self) -> Mode {
        self.store.mode()
    }

    pub fn get_status(&self) -> Status {
        self.store
            .status(self.last_update, self.config.liveness_timeout)
    }

    pub fn get_gps_status(&self) -> GpsStatus {
        self.store.gps_status()
    }

    pub fn get_arm_status(&self) -> ArmStatus {
        self.store.arm_status()
    }

    pub fn get_autopilot(&self) -> AutopilotType {
        self.store.autopilot()
    }

    /// Modes [`Vehicle::set_mode`] can select for the detected autopilot.
    pub fn available_modes(&self) -> Vec<Mode> {
        modes::available_modes(self.store.autopilot)
    }

    pub fn get_attitude(&mut self) -> Timestamped<Attitude> {
        self.store.attitude()
    }

    pub fn get_local_position_ned(&mut self) -> Timestamped<LocalPositionNed> {
        self.store.local_position()
    }

    pub fn get_speed(&mut self) -> Timestamped<Velocity> {
        self.store.speed()
    }

    pub fn get_home_position_int(&mut self) -> Timestamped<GlobalPositionInt> {
        self.store.home_position()
    }

    pub fn get_global_position_int(&mut self) -> Timestamped<GlobalPositionInt> {
        self.store.global_position()
    }

    /// Mission as last uploaded or downloaded in full.
    pub fn get_mission_waypoint(&mut self) -> Timestamped<Vec<GlobalPositionInt>> {
        self.store.mission_waypoints()
    }

    /// Waypoint the vehicle is currently flying to.
    pub fn get_current_mission_waypoint(&mut self) -> Timestamped<GlobalPositionInt> {
        self.store.current_waypoint()
    }

    pub fn get_detour_waypoint(&self) -> Option<GlobalPositionInt> {
        self.motion.detour_waypoint()
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub fn takeoff(&mut self) -> Result<(), VehicleError> {
        match self.store.autopilot {
            AutopilotType::Unknown => Err(VehicleError::IdentityUnknown),
            AutopilotType::Px4 => self.set_mode(Mode::Takeoff),
            AutopilotType::ArduPilotMega | AutopilotType::Generic => {
                let altitude = self.config.takeoff_altitude_m;
                let timeout = self.config.retry_policy.command_timeout();
                self.send_tracked_command(
                    MavCmd::MAV_CMD_NAV_TAKEOFF,
                    [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, altitude],
                    Completion::Ack,
                    timeout,
                )
            }
        }
    }

    /// Arm (or disarm) and keep asking until the heartbeat reports it.
    pub fn arm_throttle(&mut self, arm: bool) -> Result<(), VehicleError> {
        let status = if arm {
            ArmStatus::Armed
        } else {
            ArmStatus::NotArmed
        };
        let timeout = self.config.retry_policy.command_timeout();
        self.send_tracked_command(
            MavCmd::MAV_CMD_COMPONENT_ARM_DISARM,
            [f32::from(u8::from(arm)), 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            Completion::Arm(status),
            timeout,
        )
    }

    pub fn send_heartbeat(&mut self) -> Result<(), VehicleError> {
        let now = self.clock.now();
        self.send_throttled(
            CommandKind::Custom(CustomCommand::Heartbeat),
            &wire::heartbeat(),
            now,
        )?;
        Ok(())
    }

    /// Switch flight mode. Cancels any active maneuver.
    pub fn set_mode(&mut self, mode: Mode) -> Result<(), VehicleError> {
        let now = self.clock.now();
        self.motion.reset();
        self.pending_mission_start = false;
        self.request_mode(mode, now)
    }

    /// Send a COMMAND_LONG, re-sent on the retry cadence until the vehicle
    /// accepts it or `timeout` passes.
    pub fn send_cmd_long(
        &mut self,
        command: MavCmd,
        params: [f32; 7],
        timeout: Duration,
    ) -> Result<(), VehicleError> {
        self.send_tracked_command(command, params, Completion::Ack, timeout)
    }

    /// Download the vehicle's mission. The result shows up in
    /// [`Vehicle::get_mission_waypoint`] once every item has arrived.
    pub fn request_mission_list(&mut self) -> Result<(), VehicleError> {
        if self.target.is_none() {
            return Err(VehicleError::IdentityUnknown);
        }
        if self.transfer.is_receiving() {
            return Ok(());
        }

        let now = self.clock.now();
        self.pending_mission_start = false;
        debug!("mission download started");
        let action = self.transfer.start_download(now);
        self.send_transfer_action(action, now, false)
    }

    /// Upload `waypoints` as the vehicle's mission.
    pub fn send_mission(&mut self, waypoints: Vec<GlobalPositionInt>) -> Result<(), VehicleError> {
        self.start_upload(waypoints)?;
        self.pending_mission_start = false;
        Ok(())
    }

    /// Replace the mission by a single waypoint and fly to it in AUTO once
    /// the vehicle has accepted it.
    pub fn send_mission_waypoint(
        &mut self,
        waypoint: impl Into<GlobalPositionInt>,
        autorotate: bool,
    ) -> Result<(), VehicleError> {
        let waypoint = waypoint.into();
        self.motion.set_autorotate_mission(autorotate);

        // ArduPilot keeps the home position in slot 0.
        let waypoints = match self.store.autopilot {
            AutopilotType::ArduPilotMega => {
                let home = self.store.home_position.known().copied().unwrap_or(waypoint);
                vec![home, waypoint]
            }
            _ => vec![waypoint],
        };

        self.start_upload(waypoints)?;
        self.pending_mission_start = true;
        Ok(())
    }

    pub fn is_sending_mission(&self) -> bool {
        self.transfer.is_sending()
    }

    pub fn is_receiving_mission(&self) -> bool {
        self.transfer.is_receiving()
    }

    pub fn mission_progress(&self) -> Option<TransferProgress> {
        self.transfer.progress()
    }

    // ------------------------------------------------------------------
    // Maneuvers
    // ------------------------------------------------------------------

    /// Stop in place. With `autocontinue` the interrupted mission or detour
    /// is resumed once the vehicle has stood still.
    pub fn brake(&mut self, autocontinue: bool) -> Result<(), VehicleError> {
        let now = self.clock.now();
        self.motion.brake(autocontinue);
        self.start_maneuver(now)
    }

    pub fn is_brake_active(&self) -> bool {
        self.motion.is_braking()
    }

    /// Turn by `angle` radians relative to the current heading. Ignored
    /// until an attitude has been received.
    pub fn rotate(&mut self, angle: f64, autocontinue: bool) -> Result<(), VehicleError> {
        let Some(attitude) = self.store.attitude.known() else {
            debug!("rotation ignored: no attitude received yet");
            return Ok(());
        };

        let now = self.clock.now();
        let goal = math::wrap_pi(f64::from(attitude.yaw) + angle);
        self.motion.rotate(goal, autocontinue);
        self.start_maneuver(now)
    }

    pub fn is_rotation_active(&self) -> bool {
        self.motion.is_rotating()
    }

    pub fn set_autorotate_during_mission(&mut self, autorotate: bool) {
        self.motion.set_autorotate_mission(autorotate);
    }

    pub fn set_autorotate_during_detour(&mut self, autorotate: bool) {
        self.motion.set_autorotate_detour(autorotate);
    }

    /// Fly through `waypoint` in GUIDED before carrying on with the mission.
    pub fn send_detour_waypoint(
        &mut self,
        waypoint: impl Into<GlobalPositionInt>,
        autocontinue: bool,
        autorotate: bool,
    ) -> Result<(), VehicleError> {
        let waypoint = waypoint.into();
        let now = self.clock.now();
        self.motion.set_autorotate_detour(autorotate);

        let rotate_goal = if self.motion.should_autorotate_detour() {
            self.heading_to(&waypoint)
        } else {
            None
        };
        self.motion.detour(waypoint, autocontinue, rotate_goal);
        self.start_maneuver(now)
    }

    pub fn is_detour_active(&self) -> bool {
        self.motion.is_detouring()
    }

    /// Let the session turn the vehicle on its own (autorotation) and resume
    /// the mission after detours and rotations.
    pub fn take_control(&mut self, take_control: bool) {
        self.motion.set_control(take_control);
    }

    pub fn mission_status(&self) -> MissionStatus {
        self.motion.status()
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    fn accept_frame(&mut self, header: &MavHeader, message: &common::MavMessage) -> bool {
        if header.system_id == 0 {
            return false;
        }

        if let Some(target) = self.target {
            return header.system_id == target.system_id
                && header.component_id == target.component_id;
        }

        if self
            .config
            .target_system_id
            .is_some_and(|id| id != header.system_id)
        {
            return false;
        }

        if !interpreter::is_vehicle_heartbeat(message) {
            return false;
        }

        debug!(
            "locked onto vehicle {}:{}",
            header.system_id, header.component_id
        );
        self.target = Some(VehicleTarget {
            system_id: header.system_id,
            component_id: header.component_id,
        });
        true
    }

    fn handle_frame(
        &mut self,
        header: MavHeader,
        message: &common::MavMessage,
        now: Instant,
    ) -> Result<(), VehicleError> {
        if !self.accept_frame(&header, message) {
            trace!(
                "dropping frame from {}:{}",
                header.system_id,
                header.component_id
            );
            return Ok(());
        }

        let Some(event) = interpreter::interpret(&mut self.store, message, now) else {
            return Ok(());
        };

        match event {
            ProtocolEvent::MissionCount(count) => {
                if let Some(action) = self.transfer.on_count(count, now) {
                    self.send_transfer_action(action, now, false)?;
                }
            }
            ProtocolEvent::MissionRequest(seq) => {
                if let Some(action) = self.transfer.on_request(seq, now) {
                    self.send_transfer_action(action, now, false)?;
                }
            }
            ProtocolEvent::MissionItem { seq, position } => {
                if self.transfer.is_receiving() {
                    if let Some(action) = self.transfer.on_item(seq, position, now) {
                        self.send_transfer_action(action, now, false)?;
                    }
                } else {
                    self.on_current_item(seq, position, now)?;
                }
            }
            ProtocolEvent::MissionAck { accepted } => self.transfer.on_ack(accepted),
            ProtocolEvent::MissionCurrent(seq) => self.on_mission_current(seq),
            ProtocolEvent::CommandAck { command, result } => self.commands.on_ack(command, result),
        }

        self.collect_transfer_outcome(now)
    }

    fn on_mission_current(&mut self, seq: u16) {
        if self.current_seq == Some(seq) {
            return;
        }
        debug!("current mission item is now {seq}");
        self.current_seq = Some(seq);
        self.current_outdated = true;
        self.autorotate_pending = false;
        self.commands
            .reset(CommandKind::Custom(CustomCommand::RequestMissionItem));
    }

    fn on_current_item(
        &mut self,
        seq: u16,
        position: GlobalPositionInt,
        now: Instant,
    ) -> Result<(), VehicleError> {
        if !self.current_outdated || self.current_seq != Some(seq) {
            trace!("ignoring unsolicited mission item {seq}");
            return Ok(());
        }

        self.current_outdated = false;
        self.store.current_waypoint.set(position, now);
        self.autorotate_pending = true;
        self.autorotate_toward_current(now)
    }

    /// Turn toward the current mission waypoint once the vehicle flies the
    /// mission in AUTO. The item often arrives before the heartbeat that
    /// reports AUTO, so this is checked again on every cycle.
    fn autorotate_toward_current(&mut self, now: Instant) -> Result<(), VehicleError> {
        if !self.autorotate_pending
            || self.store.mode != Mode::Auto
            || self.motion.status() != MissionStatus::Normal
        {
            return Ok(());
        }
        if !self.motion.should_autorotate_mission() {
            self.autorotate_pending = false;
            return Ok(());
        }
        let Some(position) = self.store.current_waypoint.known().copied() else {
            return Ok(());
        };
        let Some(goal) = self.heading_to(&position) else {
            return Ok(());
        };

        self.autorotate_pending = false;
        self.motion.rotate_toward_mission(goal);
        self.start_maneuver(now)
    }

    fn collect_transfer_outcome(&mut self, now: Instant) -> Result<(), VehicleError> {
        match self.transfer.take_outcome() {
            Some(TransferOutcome::Uploaded(waypoints)) => {
                debug!("mission upload finished ({} items)", waypoints.len());
                self.store.mission_waypoints.set(waypoints, now);
                self.current_outdated = self.current_seq.is_some();
                if std::mem::take(&mut self.pending_mission_start)
                    && self.motion.status() == MissionStatus::Normal
                {
                    self.drive_mode(Mode::Auto, now)?;
                }
            }
            Some(TransferOutcome::Downloaded(waypoints)) => {
                debug!("mission download finished ({} items)", waypoints.len());
                self.store.mission_waypoints.set(waypoints, now);
            }
            Some(TransferOutcome::Failed { direction, reason }) => {
                warn!("mission {direction:?} failed: {reason}");
                self.pending_mission_start = false;
            }
            None => {}
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn drive_outbound(&mut self, now: Instant) -> Result<(), VehicleError> {
        if self.config.auto_heartbeat {
            self.send_throttled(
                CommandKind::Custom(CustomCommand::Heartbeat),
                &wire::heartbeat(),
                now,
            )?;
        }

        if let Some(target) = self.target {
            if self.config.auto_request_home && !self.store.home_position.is_initialized() {
                self.send_throttled(
                    CommandKind::Custom(CustomCommand::RequestHome),
                    &wire::request_home_position(target),
                    now,
                )?;
            }
        }

        if let Some(action) = self.transfer.poll(now) {
            self.send_transfer_action(action, now, true)?;
        }
        self.collect_transfer_outcome(now)?;

        self.request_current_item(now)?;
        self.autorotate_toward_current(now)?;
        self.drive_motion(now)?;

        for (kind, message) in self.commands.due_resends(now, &self.store) {
            self.send_message(&message)?;
            self.commands.mark_sent(kind, now);
        }
        Ok(())
    }

    fn request_current_item(&mut self, now: Instant) -> Result<(), VehicleError> {
        if !self.current_outdated || self.transfer.is_sending() || self.transfer.is_receiving() {
            return Ok(());
        }
        let (Some(target), Some(seq)) = (self.target, self.current_seq) else {
            return Ok(());
        };
        self.send_throttled(
            CommandKind::Custom(CustomCommand::RequestMissionItem),
            &wire::mission_request_item(target, seq),
            now,
        )?;
        Ok(())
    }

    /// A maneuver was just entered: mode requests of the previous one are
    /// void and its commands go out without waiting.
    fn start_maneuver(&mut self, now: Instant) -> Result<(), VehicleError> {
        self.reset_maneuver_throttles();
        self.forget_mode_requests();
        self.drive_motion(now)
    }

    fn forget_mode_requests(&mut self) {
        self.commands
            .forget(|kind| matches!(kind, CommandKind::Custom(CustomCommand::SetMode(_))));
    }

    fn reset_maneuver_throttles(&mut self) {
        self.commands
            .reset(CommandKind::Custom(CustomCommand::Rotate));
        self.commands
            .reset(CommandKind::Custom(CustomCommand::Detour));
    }

    fn drive_motion(&mut self, now: Instant) -> Result<(), VehicleError> {
        let before = self.motion.status();
        let observation = Observation {
            now,
            yaw: self.store.attitude.known().map(|attitude| attitude.yaw),
            position: self.store.global_position.known().copied(),
            ground_speed: self.store.speed.known().map(Velocity::ground_speed),
        };
        let directives = self.motion.step(&observation, &self.config.limits);

        if self.motion.status() != before {
            self.reset_maneuver_throttles();
            self.forget_mode_requests();
        }

        let Some(target) = self.target else {
            return Ok(());
        };

        for directive in directives {
            match directive {
                Directive::EnsureMode(mode) => self.ensure_mode(mode, now)?,
                Directive::Goto(position) => {
                    self.send_throttled(
                        CommandKind::Custom(CustomCommand::Detour),
                        &wire::position_target(target, position),
                        now,
                    )?;
                }
                Directive::Yaw { goal } => {
                    let yaw = self
                        .store
                        .attitude
                        .known()
                        .map_or(goal, |attitude| f64::from(attitude.yaw));
                    self.send_throttled(
                        CommandKind::Custom(CustomCommand::Rotate),
                        &wire::condition_yaw(target, goal, yaw),
                        now,
                    )?;
                }
                Directive::ResumeMission => self.drive_mode(Mode::Auto, now)?,
            }
        }
        Ok(())
    }

    /// Keep the vehicle in `mode` while a maneuver needs it.
    fn ensure_mode(&mut self, mode: Mode, now: Instant) -> Result<(), VehicleError> {
        let Some(code) = modes::custom_mode(self.store.autopilot, mode) else {
            return Ok(());
        };
        if self.store.custom_mode == Some(code)
            || self
                .commands
                .is_outstanding(CommandKind::Custom(CustomCommand::SetMode(mode)))
        {
            return Ok(());
        }
        self.drive_mode(mode, now)
    }

    /// Mode change on behalf of the session. Only transport errors surface.
    fn drive_mode(&mut self, mode: Mode, now: Instant) -> Result<(), VehicleError> {
        match self.request_mode(mode, now) {
            Err(VehicleError::Io(err)) => Err(VehicleError::Io(err)),
            Err(err) => {
                debug!("not switching to {mode}: {err}");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    fn request_mode(&mut self, mode: Mode, now: Instant) -> Result<(), VehicleError> {
        let autopilot = self.store.autopilot;
        let target = match (autopilot, self.target) {
            (AutopilotType::Unknown, _) | (_, None) => return Err(VehicleError::IdentityUnknown),
            (_, Some(target)) => target,
        };
        let (Some(code), Some(params)) = (
            modes::custom_mode(autopilot, mode),
            modes::set_mode_params(autopilot, mode),
        ) else {
            return Err(VehicleError::ModeNotAvailable(mode.to_string()));
        };

        let kind = CommandKind::Custom(CustomCommand::SetMode(mode));
        self.commands.forget(|other| {
            matches!(other, CommandKind::Custom(CustomCommand::SetMode(m)) if m != mode)
        });

        let message = wire::command_long(target, MavCmd::MAV_CMD_DO_SET_MODE, params);
        let deadline = now + self.config.retry_policy.command_timeout();
        self.commands
            .track(kind, message.clone(), Completion::Mode(code), deadline);
        self.send_throttled(kind, &message, now)?;
        Ok(())
    }

    fn send_tracked_command(
        &mut self,
        command: MavCmd,
        params: [f32; 7],
        completion: Completion,
        timeout: Duration,
    ) -> Result<(), VehicleError> {
        let target = self.target.ok_or(VehicleError::IdentityUnknown)?;
        let now = self.clock.now();
        let kind = CommandKind::long(command);
        let message = wire::command_long(target, command, params);
        self.commands
            .track(kind, message.clone(), completion, now + timeout);
        self.send_throttled(kind, &message, now)?;
        Ok(())
    }

    fn start_upload(&mut self, waypoints: Vec<GlobalPositionInt>) -> Result<(), VehicleError> {
        if let Some(issue) = validate_waypoints(&waypoints)
            .into_iter()
            .find(|issue| issue.severity == IssueSeverity::Error)
        {
            return Err(VehicleError::MissionValidation(format!(
                "{}: {}",
                issue.code, issue.message
            )));
        }
        if self.target.is_none() {
            return Err(VehicleError::IdentityUnknown);
        }
        if self.transfer.pending_upload() == Some(waypoints.as_slice()) {
            return Ok(());
        }

        let now = self.clock.now();
        debug!("mission upload started ({} items)", waypoints.len());
        let count = waypoints.len();
        let action = self.transfer.start_upload(waypoints, now).ok_or_else(|| {
            VehicleError::MissionValidation(format!("{count} items do not fit a mission count"))
        })?;
        self.send_transfer_action(action, now, false)
    }

    /// Put a transfer frame on the wire. Re-issued frames (`throttled`) wait
    /// for the retry interval, replies to the vehicle go out at once.
    fn send_transfer_action(
        &mut self,
        action: TransferAction,
        now: Instant,
        throttled: bool,
    ) -> Result<(), VehicleError> {
        let Some(target) = self.target else {
            return Ok(());
        };

        let (kind, message) = match action {
            TransferAction::SendCount(count) => (
                Some(CommandKind::Custom(CustomCommand::MissionCount)),
                wire::mission_count(target, count),
            ),
            TransferAction::SendItem { seq, position } => {
                (None, wire::mission_item(target, seq, position))
            }
            TransferAction::RequestList => (
                Some(CommandKind::Custom(CustomCommand::RequestMissionList)),
                wire::mission_request_list(target),
            ),
            TransferAction::RequestItem(seq) => (
                Some(CommandKind::Custom(CustomCommand::RequestMissionItem)),
                wire::mission_request_item(target, seq),
            ),
            TransferAction::Ack => (None, wire::mission_ack(target)),
        };

        match kind {
            Some(kind) if throttled => {
                self.send_throttled(kind, &message, now)?;
            }
            Some(kind) => {
                self.send_message(&message)?;
                self.commands.mark_sent(kind, now);
            }
            None => self.send_message(&message)?,
        }
        Ok(())
    }

    /// Send unless `kind` went out less than a retry interval ago. Returns
    /// whether the frame was sent.
    fn send_throttled(
        &mut self,
        kind: CommandKind,
        message: &common::MavMessage,
        now: Instant,
    ) -> Result<bool, VehicleError> {
        if !self.commands.is_due(kind, now) {
            return Ok(false);
        }
        self.send_message(message)?;
        self.commands.mark_sent(kind, now);
        Ok(true)
    }

    fn send_message(&mut self, message: &common::MavMessage) -> Result<(), VehicleError> {
        let header = MavHeader {
            system_id: self.config.gcs_system_id,
            component_id: self.config.gcs_component_id,
            sequence: self.sequence,
        };
        self.sequence = self.sequence.wrapping_add(1);

        self.connection
            .send(&header, message)
            .map(|_| ())
            .map_err(|err| {
                warn!("MAVLink send failed: {err}");
                VehicleError::from(err)
            })
    }

    /// Absolute heading from the vehicle to `waypoint`, if position and
    /// attitude are known.
    fn heading_to(&self, waypoint: &GlobalPositionInt) -> Option<f64> {
        let position = self.store.global_position.known()?;
        let attitude = self.store.attitude.known()?;
        let relative = math::get_waypoint_rel_angle(waypoint, position, attitude);
        Some(math::wrap_pi(f64::from(attitude.yaw) + relative))
    }
}

fn is_non_fatal_read_error(error: &MessageReadError) -> bool {
    match error {
        MessageReadError::Io(io_error) => {
            io_error.kind() == std::io::ErrorKind::WouldBlock
                || io_error.kind() == std::io::ErrorKind::TimedOut
        }
        _ => false,
    }
}
