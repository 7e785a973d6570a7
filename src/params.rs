//! # Control parameters
//!
//! Tuning constants that bound steering actuation for a confirmed variant.
//!
//! Observed documented MQB limits are 3.00 Nm of heading control torque and
//! a rate of change of 5.00 Nm/s. The rate limits below are tighter, chosen
//! from real-world testing and the minimum time to lane departure.
//!
//! Unknown variants are an error. The generic set is only used when a caller
//! explicitly asks for it.

use crate::{ControlError, ControlResult, VehicleVariant};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Immutable per-session actuation limits. Cadences are in base ticks
/// (100 Hz).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlParams {
    /// HCA_01 steering frame cadence (50 Hz)
    pub hca_step: u32,
    /// LDW_02 lane departure warning cadence (10 Hz)
    pub ldw_step: u32,
    /// GRA_ACC_01 cruise button cadence (33 Hz)
    pub gra_acc_step: u32,
    /// Minimum spacing between the starts of two virtual button presses
    pub gra_vbp_step: u32,
    /// Button frames sent per virtual press (~0.5 s at `gra_acc_step`)
    pub gra_vbp_count: u32,
    /// Max heading control assist torque, 3.00 Nm
    pub steer_max: i32,
    /// Max reached in 1.50 s (steer_max / (50 Hz * 1.50))
    pub steer_delta_up: i32,
    /// Min reached in 0.60 s (steer_max / (50 Hz * 0.60))
    pub steer_delta_down: i32,
    pub steer_driver_allowance: i32,
    /// Weight driver torque heavily
    pub steer_driver_multiplier: i32,
    /// Scale of the driver torque signal
    pub steer_driver_factor: i32,
    /// Steering frames HCA may stay active before it is cycled off once
    /// (118 s at 50 Hz)
    pub hca_max_active_ticks: u32,
    /// Steering frames the same torque may repeat before it is nudged
    /// (1.9 s at 50 Hz)
    pub hca_same_torque_ticks: u32,
}

impl ControlParams {
    /// Limits shared by every MQB platform.
    pub const MQB: ControlParams = ControlParams {
        hca_step: 2,
        ldw_step: 10,
        gra_acc_step: 3,
        gra_vbp_step: 100,
        gra_vbp_count: 16,
        steer_max: 300,
        steer_delta_up: 4,
        steer_delta_down: 10,
        steer_driver_allowance: 80,
        steer_driver_multiplier: 3,
        steer_driver_factor: 1,
        hca_max_active_ticks: 5900,
        hca_same_torque_ticks: 95,
    };

    /// Parameters used when a caller opts into running without a confirmed
    /// variant.
    pub fn generic() -> Self {
        Self::MQB
    }

    /// Check internal consistency.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` on a zero cadence, a
    /// non-positive limit, or a release rate slower than the apply rate.
    pub fn validate(&self) -> ControlResult<()> {
        let cadences = [
            ("hca_step", self.hca_step),
            ("ldw_step", self.ldw_step),
            ("gra_acc_step", self.gra_acc_step),
            ("gra_vbp_step", self.gra_vbp_step),
            ("gra_vbp_count", self.gra_vbp_count),
            ("hca_max_active_ticks", self.hca_max_active_ticks),
            ("hca_same_torque_ticks", self.hca_same_torque_ticks),
        ];
        for (name, value) in cadences {
            if value == 0 {
                return Err(ControlError::InvalidConfiguration(format!(
                    "{} must be at least 1",
                    name
                )));
            }
        }

        let limits = [
            ("steer_max", self.steer_max),
            ("steer_delta_up", self.steer_delta_up),
            ("steer_delta_down", self.steer_delta_down),
            ("steer_driver_factor", self.steer_driver_factor),
        ];
        for (name, value) in limits {
            if value <= 0 {
                return Err(ControlError::InvalidConfiguration(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        if self.steer_driver_allowance < 0 || self.steer_driver_multiplier < 0 {
            return Err(ControlError::InvalidConfiguration(
                "Driver allowance and multiplier must not be negative".into(),
            ));
        }
        if self.steer_delta_up > self.steer_max || self.steer_delta_down > self.steer_max {
            return Err(ControlError::InvalidConfiguration(format!(
                "Torque deltas must not exceed steer_max ({})",
                self.steer_max
            )));
        }
        if self.steer_delta_down < self.steer_delta_up {
            return Err(ControlError::InvalidConfiguration(format!(
                "steer_delta_down ({}) must be at least steer_delta_up ({})",
                self.steer_delta_down, self.steer_delta_up
            )));
        }
        Ok(())
    }
}

impl Default for ControlParams {
    fn default() -> Self {
        Self::MQB
    }
}

/// Read-only variant → parameter mapping.
#[derive(Debug, Clone, Default)]
pub struct ParamTable {
    entries: BTreeMap<VehicleVariant, ControlParams>,
}

impl ParamTable {
    /// Every supported variant mapped to the MQB limits.
    pub fn builtin() -> &'static ParamTable {
        static BUILTIN: OnceLock<ParamTable> = OnceLock::new();
        BUILTIN.get_or_init(|| ParamTable::uniform(ControlParams::MQB))
    }

    /// Every supported variant mapped to `params`.
    pub fn uniform(params: ControlParams) -> Self {
        Self {
            entries: VehicleVariant::ALL.iter().map(|v| (*v, params)).collect(),
        }
    }

    /// Register `params` for `variant`, replacing any earlier entry.
    pub fn with(mut self, variant: VehicleVariant, params: ControlParams) -> Self {
        self.entries.insert(variant, params);
        self
    }

    /// Resolve the parameters of `variant`.
    ///
    /// # Errors
    /// Returns `ControlError::UnknownVariant` if no parameter set is
    /// registered, or `ControlError::InvalidConfiguration` if the registered
    /// set is inconsistent.
    pub fn resolve(&self, variant: VehicleVariant) -> ControlResult<ControlParams> {
        let params = self
            .entries
            .get(&variant)
            .copied()
            .ok_or_else(|| ControlError::UnknownVariant(variant.id().to_string()))?;
        params.validate()?;
        Ok(params)
    }
}

/// Resolve `variant` against the built-in table.
pub fn resolve(variant: VehicleVariant) -> ControlResult<ControlParams> {
    ParamTable::builtin().resolve(variant)
}
