//! Arbitration between mission flight and caller-triggered maneuvers.
//!
//! At most one maneuver (brake, detour, rotation) is active. A new one always
//! preempts the current one and inherits what should be resumed once it is
//! over. [`MotionControl::step`] checks the exit condition of the active
//! maneuver and returns what the session has to keep sending for it.

use crate::config::ManeuverLimits;
use crate::state::{MissionStatus, Mode};
use mv_mission_core::{math, GlobalPositionInt};
use std::time::Instant;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Resume {
    Mission,
    Detour,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Maneuver {
    Normal,
    Braking {
        resume: Option<Resume>,
        stopped_since: Option<Instant>,
    },
    Detouring,
    Rotating {
        goal: f64,
        resume: Option<Resume>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Detour {
    target: GlobalPositionInt,
    autocontinue: bool,
}

/// Latest telemetry the exit conditions look at.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Observation {
    pub now: Instant,
    pub yaw: Option<f32>,
    pub position: Option<GlobalPositionInt>,
    pub ground_speed: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Directive {
    EnsureMode(Mode),
    Goto(GlobalPositionInt),
    Yaw { goal: f64 },
    ResumeMission,
}

struct Finished {
    resume: Option<Resume>,
    // Resuming requires the session to be in control of the vehicle.
    needs_control: bool,
}

#[derive(Debug)]
pub(crate) struct MotionControl {
    maneuver: Maneuver,
    detour: Option<Detour>,
    autorotate_mission: bool,
    autorotate_detour: bool,
    our_control: bool,
}

impl Default for MotionControl {
    fn default() -> Self {
        Self {
            maneuver: Maneuver::Normal,
            detour: None,
            autorotate_mission: false,
            autorotate_detour: false,
            our_control: false,
        }
    }
}

impl MotionControl {
    pub fn status(&self) -> MissionStatus {
        match self.maneuver {
            Maneuver::Normal => MissionStatus::Normal,
            Maneuver::Braking { .. } => MissionStatus::Braking,
            Maneuver::Detouring => MissionStatus::Detouring,
            Maneuver::Rotating { .. } => MissionStatus::Rotating,
        }
    }

    pub fn is_braking(&self) -> bool {
        matches!(self.maneuver, Maneuver::Braking { .. })
    }

    pub fn is_detouring(&self) -> bool {
        matches!(self.maneuver, Maneuver::Detouring)
    }

    pub fn is_rotating(&self) -> bool {
        matches!(self.maneuver, Maneuver::Rotating { .. })
    }

    /// Target of the most recent detour, reached or not.
    pub fn detour_waypoint(&self) -> Option<GlobalPositionInt> {
        self.detour.map(|detour| detour.target)
    }

    pub fn set_control(&mut self, take_control: bool) {
        self.our_control = take_control;
    }

    pub fn set_autorotate_mission(&mut self, autorotate: bool) {
        self.autorotate_mission = autorotate;
    }

    pub fn set_autorotate_detour(&mut self, autorotate: bool) {
        self.autorotate_detour = autorotate;
    }

    pub fn should_autorotate_mission(&self) -> bool {
        self.our_control && self.autorotate_mission
    }

    pub fn should_autorotate_detour(&self) -> bool {
        self.our_control && self.autorotate_detour
    }

    /// Drop any active maneuver without resuming anything.
    pub fn reset(&mut self) {
        if self.maneuver != Maneuver::Normal {
            debug!("{:?} cancelled", self.status());
        }
        self.maneuver = Maneuver::Normal;
    }

    pub fn brake(&mut self, autocontinue: bool) {
        let resume = autocontinue.then(|| self.resume_target());
        self.enter(Maneuver::Braking {
            resume,
            stopped_since: None,
        });
    }

    /// Turn to the absolute heading `goal` (radians).
    pub fn rotate(&mut self, goal: f64, autocontinue: bool) {
        let resume = autocontinue.then(|| self.resume_target());
        self.enter(Maneuver::Rotating { goal, resume });
    }

    /// Fly through `target`. With `rotate_goal` the vehicle first turns to
    /// face it and then continues into the detour.
    pub fn detour(
        &mut self,
        target: GlobalPositionInt,
        autocontinue: bool,
        rotate_goal: Option<f64>,
    ) {
        self.detour = Some(Detour {
            target,
            autocontinue,
        });
        match rotate_goal {
            Some(goal) => self.enter(Maneuver::Rotating {
                goal,
                resume: Some(Resume::Detour),
            }),
            None => self.enter(Maneuver::Detouring),
        }
    }

    pub fn rotate_toward_mission(&mut self, goal: f64) {
        self.enter(Maneuver::Rotating {
            goal,
            resume: Some(Resume::Mission),
        });
    }

    fn resume_target(&self) -> Resume {
        match self.maneuver {
            Maneuver::Detouring
            | Maneuver::Braking {
                resume: Some(Resume::Detour),
                ..
            }
            | Maneuver::Rotating {
                resume: Some(Resume::Detour),
                ..
            } => Resume::Detour,
            _ => Resume::Mission,
        }
    }

    fn enter(&mut self, maneuver: Maneuver) {
        debug!("maneuver {:?} -> {:?}", self.maneuver, maneuver);
        self.maneuver = maneuver;
    }

    pub fn step(&mut self, observation: &Observation, limits: &ManeuverLimits) -> Vec<Directive> {
        let mut directives = Vec::new();

        if let Some(finished) = self.check_exit(observation, limits) {
            self.finish(finished, &mut directives);
        }

        match self.maneuver {
            Maneuver::Normal => {}
            Maneuver::Braking { .. } => directives.push(Directive::EnsureMode(Mode::Brake)),
            Maneuver::Detouring => match self.detour {
                Some(detour) => {
                    directives.push(Directive::EnsureMode(Mode::Guided));
                    directives.push(Directive::Goto(detour.target));
                }
                None => self.maneuver = Maneuver::Normal,
            },
            Maneuver::Rotating { goal, .. } => {
                directives.push(Directive::EnsureMode(Mode::Guided));
                directives.push(Directive::Yaw { goal });
            }
        }

        directives
    }

    fn check_exit(
        &mut self,
        observation: &Observation,
        limits: &ManeuverLimits,
    ) -> Option<Finished> {
        match &mut self.maneuver {
            Maneuver::Normal => None,
            Maneuver::Braking {
                resume,
                stopped_since,
            } => match observation.ground_speed {
                Some(speed) if speed < limits.stop_speed_mps => {
                    let since = *stopped_since.get_or_insert(observation.now);
                    (observation.now.saturating_duration_since(since) >= limits.stop_hold()).then(
                        || Finished {
                            resume: *resume,
                            needs_control: false,
                        },
                    )
                }
                _ => {
                    *stopped_since = None;
                    None
                }
            },
            Maneuver::Rotating { goal, resume } => {
                let yaw = f64::from(observation.yaw?);
                (math::wrap_pi(yaw - *goal).abs() < limits.rotation_tolerance_rad).then(|| {
                    Finished {
                        resume: *resume,
                        needs_control: true,
                    }
                })
            }
            Maneuver::Detouring => {
                let position = observation.position?;
                let detour = self.detour?;
                (math::dist(&position, &detour.target) < limits.detour_arrival_radius_m).then(
                    || Finished {
                        resume: detour.autocontinue.then_some(Resume::Mission),
                        needs_control: true,
                    },
                )
            }
        }
    }

    fn finish(&mut self, finished: Finished, directives: &mut Vec<Directive>) {
        debug!("{:?} finished", self.status());
        self.maneuver = Maneuver::Normal;

        let resume = if finished.needs_control && !self.our_control {
            None
        } else {
            finished.resume
        };
        match resume {
            Some(Resume::Mission) => directives.push(Directive::ResumeMission),
            Some(Resume::Detour) if self.detour.is_some() => self.enter(Maneuver::Detouring),
            _ => {}
        }
    }
}
