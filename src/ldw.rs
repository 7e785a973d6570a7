//! # Lane departure warning
//!
//! Warning detection happens elsewhere. This module only names the warning
//! states the instrument cluster understands and the content of the LDW_02
//! frame the controller sends every `ldw_step` ticks.

use crate::{ControlError, ControlResult};
use serde::{Deserialize, Serialize};

/// Warning shown by the instrument cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[repr(u8)]
pub enum LdwWarning {
    /// Nothing to display
    #[default]
    None = 0,
    /// "Lane Assist currently not available." with chime
    LaneAssistUnavailChime = 1,
    /// "Lane Assist not available. No sensor view." with chime
    LaneAssistUnavailNoSensorChime = 3,
    /// "Lane Assist: Please Take Over Steering" with urgent beep
    LaneAssistTakeOverUrgent = 4,
    /// "Emergency Assist: Please Take Over Steering" with urgent beep
    EmergencyAssistUrgent = 6,
    /// "Lane Assist: Please Take Over Steering" with chime
    LaneAssistTakeOverChime = 7,
    /// "Lane Assist: Please Take Over Steering" silent
    LaneAssistTakeOverSilent = 8,
    /// "Emergency Assist: Changing lanes..." with urgent beep
    EmergencyAssistChangingLanes = 9,
    /// "Lane Assist deactivated." silent with persistent icon afterward
    LaneAssistDeactivated = 10,
}

impl LdwWarning {
    /// Code placed in the LDW_02 frame.
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for LdwWarning {
    type Error = ControlError;

    fn try_from(code: u8) -> ControlResult<Self> {
        match code {
            0 => Ok(LdwWarning::None),
            1 => Ok(LdwWarning::LaneAssistUnavailChime),
            3 => Ok(LdwWarning::LaneAssistUnavailNoSensorChime),
            4 => Ok(LdwWarning::LaneAssistTakeOverUrgent),
            6 => Ok(LdwWarning::EmergencyAssistUrgent),
            7 => Ok(LdwWarning::LaneAssistTakeOverChime),
            8 => Ok(LdwWarning::LaneAssistTakeOverSilent),
            9 => Ok(LdwWarning::EmergencyAssistChangingLanes),
            10 => Ok(LdwWarning::LaneAssistDeactivated),
            other => Err(ControlError::InvalidDataFormat(format!(
                "Unknown LDW warning code {}",
                other
            ))),
        }
    }
}

/// Content of one LDW_02 frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LdwMessage {
    pub warning: LdwWarning,
    /// Heading control is engaged
    pub assist_active: bool,
    /// Driver torque exceeds the override allowance
    pub driver_steering: bool,
    pub left_lane_visible: bool,
    pub right_lane_visible: bool,
}
