//! # Steering controller
//!
//! Runs once per base tick (100 Hz). Each periodic message class has its own
//! cadence measured in base ticks:
//!
//! - HCA_01 steering command every `hca_step` ticks
//! - LDW_02 lane departure warning every `ldw_step` ticks
//! - GRA_ACC_01 cruise buttons every `gra_acc_step` ticks while a virtual
//!   press is in flight
//!
//! The controller is only constructed from a confirmed identification, or
//! from an explicit opt-in to the generic parameter set.

use crate::buttons::{ButtonConflictPolicy, ButtonStates, CruiseButton, VirtualButton};
use crate::ldw::{LdwMessage, LdwWarning};
use crate::limiter::{apply_steer_torque_limits, decay_toward_zero, driver_override_active};
use crate::matcher::MatchResult;
use crate::params::{ControlParams, ParamTable};
use crate::{ControlError, ControlResult, VehicleVariant};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Whether the controller may start without a confirmed variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Refuse to start unless the variant was confirmed.
    #[default]
    Refuse,
    /// Start with [`ControlParams::generic`] when identification is
    /// ambiguous or still unresolved. Never used for `NoMatch`.
    Generic,
}

/// Inputs sampled for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickInput {
    /// Torque requested by the planner; `None` when absent this tick
    pub desired_torque: Option<i32>,
    /// Measured driver torque
    pub driver_torque: i32,
    pub assist_enabled: bool,
    pub ldw_warning: LdwWarning,
    pub left_lane_visible: bool,
    pub right_lane_visible: bool,
    /// New virtual button press requested this tick
    pub button_request: Option<CruiseButton>,
}

/// Values for one HCA_01 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SteeringCommand {
    pub torque: i32,
    /// Heading control requested from the EPS
    pub active: bool,
}

/// Everything decided on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TickOutput {
    pub frame: u64,
    pub steering: Option<SteeringCommand>,
    pub ldw: Option<LdwMessage>,
    pub buttons: Option<ButtonStates>,
}

impl TickOutput {
    pub fn is_empty(&self) -> bool {
        self.steering.is_none() && self.ldw.is_none() && self.buttons.is_none()
    }
}

/// Mutable tick-to-tick record, owned by exactly one controller.
#[derive(Debug, Clone)]
pub struct ActuationState {
    frame: u64,
    last_torque: i32,
    active_frames: u32,
    same_torque_frames: u32,
    button: VirtualButton,
}

impl ActuationState {
    fn new(policy: ButtonConflictPolicy) -> Self {
        Self {
            frame: 0,
            last_torque: 0,
            active_frames: 0,
            same_torque_frames: 0,
            button: VirtualButton::new(policy),
        }
    }

    /// Base tick about to be processed.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Torque sent on the most recent steering frame.
    pub fn last_torque(&self) -> i32 {
        self.last_torque
    }

    pub fn button(&self) -> &VirtualButton {
        &self.button
    }
}

/// Per-session lateral controller.
#[derive(Debug, Clone)]
pub struct SteeringController {
    params: ControlParams,
    variant: Option<VehicleVariant>,
    state: ActuationState,
}

impl SteeringController {
    /// Create a controller for explicit parameters.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` if `params` is
    /// inconsistent.
    pub fn new(params: ControlParams, buttons: ButtonConflictPolicy) -> ControlResult<Self> {
        params.validate()?;
        Ok(Self {
            params,
            variant: None,
            state: ActuationState::new(buttons),
        })
    }

    /// Create a controller from an identification result.
    ///
    /// # Errors
    /// - `NoMatch` when no variant matched; control never engages.
    /// - `Ambiguous` / `NotIdentified` for ambiguous or unresolved
    ///   identification unless `fallback` is `Generic`.
    /// - `UnknownVariant` when the confirmed variant has no parameters.
    pub fn start(
        identification: &MatchResult,
        table: &ParamTable,
        fallback: FallbackPolicy,
        buttons: ButtonConflictPolicy,
    ) -> ControlResult<Self> {
        match identification {
            MatchResult::Confirmed(variant) => {
                let params = table.resolve(*variant)?;
                info!(%variant, "starting steering control");
                let mut controller = Self::new(params, buttons)?;
                controller.variant = Some(*variant);
                Ok(controller)
            }
            MatchResult::NoMatch => Err(ControlError::NoMatch),
            MatchResult::Ambiguous(candidates) => match fallback {
                FallbackPolicy::Generic => {
                    warn!(?candidates, "identification ambiguous, using generic parameters");
                    Self::new(ControlParams::generic(), buttons)
                }
                FallbackPolicy::Refuse => Err(ControlError::Ambiguous(candidates.clone())),
            },
            MatchResult::Unresolved => match fallback {
                FallbackPolicy::Generic => {
                    warn!("identification incomplete, using generic parameters");
                    Self::new(ControlParams::generic(), buttons)
                }
                FallbackPolicy::Refuse => Err(ControlError::NotIdentified),
            },
        }
    }

    /// Process one base tick.
    pub fn tick(&mut self, input: &TickInput) -> TickOutput {
        let frame = self.state.frame;
        let p = self.params;

        if let Some(button) = input.button_request {
            self.state.button.request(button);
        }

        let steering = (frame % u64::from(p.hca_step) == 0).then(|| self.update_steering(input));

        let ldw = (frame % u64::from(p.ldw_step) == 0).then(|| LdwMessage {
            warning: input.ldw_warning,
            assist_active: input.assist_enabled,
            driver_steering: driver_override_active(input.driver_torque, &p),
            left_lane_visible: input.left_lane_visible,
            right_lane_visible: input.right_lane_visible,
        });

        let buttons = if frame % u64::from(p.gra_acc_step) == 0 {
            self.state.button.on_button_tick(frame, &p)
        } else {
            None
        };

        self.state.frame += 1;

        TickOutput {
            frame,
            steering,
            ldw,
            buttons,
        }
    }

    fn update_steering(&mut self, input: &TickInput) -> SteeringCommand {
        let p = &self.params;
        let state = &mut self.state;
        let last = state.last_torque;

        let mut torque = match input.desired_torque {
            Some(desired) if input.assist_enabled => {
                apply_steer_torque_limits(desired, last, input.driver_torque, p)
            }
            _ => decay_toward_zero(last, p),
        };
        let mut active = torque != 0;

        // The EPS faults on long uninterrupted heading control and on a
        // torque value that does not change for too long.
        if active {
            state.active_frames += 1;
            if state.active_frames >= p.hca_max_active_ticks {
                debug!(frame = state.frame, "cycling heading control off for one frame");
                active = false;
                state.active_frames = 0;
            } else if torque == last {
                state.same_torque_frames += 1;
                if state.same_torque_frames > p.hca_same_torque_ticks {
                    torque -= torque.signum();
                    state.same_torque_frames = 0;
                }
            } else {
                state.same_torque_frames = 0;
            }
        } else {
            state.active_frames = 0;
            state.same_torque_frames = 0;
        }

        state.last_torque = torque;
        SteeringCommand { torque, active }
    }

    pub fn params(&self) -> &ControlParams {
        &self.params
    }

    /// Confirmed variant, `None` when running on generic parameters.
    pub fn variant(&self) -> Option<VehicleVariant> {
        self.variant
    }

    pub fn state(&self) -> &ActuationState {
        &self.state
    }
}
