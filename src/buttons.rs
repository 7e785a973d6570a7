//! # Virtual cruise control buttons
//!
//! A single GRA_ACC_01 frame can be lost, so a discrete press is modelled as
//! a held button: the pressed state is sent on `gra_vbp_count` consecutive
//! button frames, then released. Presses start at most once every
//! `gra_vbp_step` ticks and only one is ever in flight.

use crate::params::ControlParams;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Cruise control stalk buttons the controller can press.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CruiseButton {
    Accel,
    Decel,
    Cancel,
    Set,
    Resume,
    GapAdjust,
}

/// Button states carried by one button frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ButtonStates {
    pub accel_cruise: bool,
    pub decel_cruise: bool,
    pub cancel: bool,
    pub set_cruise: bool,
    pub resume_cruise: bool,
    pub gap_adjust_cruise: bool,
}

impl ButtonStates {
    /// Every button released.
    pub const RELEASED: ButtonStates = ButtonStates {
        accel_cruise: false,
        decel_cruise: false,
        cancel: false,
        set_cruise: false,
        resume_cruise: false,
        gap_adjust_cruise: false,
    };

    /// Only `button` held.
    pub fn pressed(button: CruiseButton) -> Self {
        let mut states = Self::RELEASED;
        match button {
            CruiseButton::Accel => states.accel_cruise = true,
            CruiseButton::Decel => states.decel_cruise = true,
            CruiseButton::Cancel => states.cancel = true,
            CruiseButton::Set => states.set_cruise = true,
            CruiseButton::Resume => states.resume_cruise = true,
            CruiseButton::GapAdjust => states.gap_adjust_cruise = true,
        }
        states
    }

    pub fn is_released(&self) -> bool {
        *self == Self::RELEASED
    }
}

/// What happens to a request that arrives while a press is in flight or
/// already waiting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonConflictPolicy {
    /// Keep one pending request; the newest pending request wins and starts
    /// once the in-flight press completes.
    #[default]
    Queue,
    /// Abort the in-flight press; the new request starts as soon as the
    /// press spacing allows.
    Replace,
    /// Drop the new request.
    Ignore,
}

/// Press state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PressState {
    Idle,
    Pressing {
        button: CruiseButton,
        remaining: u32,
    },
}

/// Owns the one press that may be in flight.
#[derive(Debug, Clone)]
pub struct VirtualButton {
    policy: ButtonConflictPolicy,
    state: PressState,
    pending: Option<CruiseButton>,
    last_press_start: Option<u64>,
}

impl VirtualButton {
    pub fn new(policy: ButtonConflictPolicy) -> Self {
        Self {
            policy,
            state: PressState::Idle,
            pending: None,
            last_press_start: None,
        }
    }

    /// Request a press of `button`.
    pub fn request(&mut self, button: CruiseButton) {
        let busy = self.pending.is_some() || matches!(self.state, PressState::Pressing { .. });
        if !busy {
            debug!(?button, "button press requested");
            self.pending = Some(button);
            return;
        }

        match self.policy {
            ButtonConflictPolicy::Queue => {
                if let Some(dropped) = self.pending.replace(button) {
                    debug!(?dropped, ?button, "pending button request superseded");
                }
            }
            ButtonConflictPolicy::Replace => {
                if let PressState::Pressing { button: aborted, .. } = self.state {
                    debug!(?aborted, ?button, "in-flight button press aborted");
                }
                self.state = PressState::Idle;
                self.pending = Some(button);
            }
            ButtonConflictPolicy::Ignore => {
                warn!(?button, "button request dropped, a press is already in flight");
            }
        }
    }

    /// Advance on a button frame tick. Returns the states to send, or `None`
    /// when no press is in flight.
    pub fn on_button_tick(&mut self, frame: u64, params: &ControlParams) -> Option<ButtonStates> {
        if self.state == PressState::Idle {
            self.try_start(frame, params);
        }

        match self.state {
            PressState::Idle => None,
            PressState::Pressing { button, remaining } => {
                let remaining = remaining.saturating_sub(1);
                self.state = if remaining == 0 {
                    debug!(?button, frame, "button press complete");
                    PressState::Idle
                } else {
                    PressState::Pressing { button, remaining }
                };
                Some(ButtonStates::pressed(button))
            }
        }
    }

    fn try_start(&mut self, frame: u64, params: &ControlParams) {
        let Some(button) = self.pending else {
            return;
        };
        let spaced = match self.last_press_start {
            Some(start) => frame >= start + u64::from(params.gra_vbp_step),
            None => true,
        };
        if spaced {
            self.pending = None;
            self.last_press_start = Some(frame);
            self.state = PressState::Pressing {
                button,
                remaining: params.gra_vbp_count,
            };
        }
    }

    pub fn state(&self) -> PressState {
        self.state
    }

    pub fn pending(&self) -> Option<CruiseButton> {
        self.pending
    }

    /// States currently held; released when idle.
    pub fn current_states(&self) -> ButtonStates {
        match self.state {
            PressState::Idle => ButtonStates::RELEASED,
            PressState::Pressing { button, .. } => ButtonStates::pressed(button),
        }
    }
}
