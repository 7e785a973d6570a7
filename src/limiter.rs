//! # Steering torque limits
//!
//! Pure functions moving the previous commanded torque toward a desired
//! torque without leaving the envelope described by [`ControlParams`].
//!
//! - Magnitude grows by at most `steer_delta_up` per steering frame.
//! - Magnitude shrinks by at most `steer_delta_down` per steering frame.
//! - A sign reversal stops at zero first, so no frame both crosses zero and
//!   grows the magnitude.
//! - Driver effort above `steer_driver_allowance` freezes growth and releases
//!   at least as fast as `steer_delta_down`, faster the harder the driver
//!   pushes.
//!
//! Out-of-range inputs are clamped, never reported as errors.

use crate::params::ControlParams;

/// Driver effort in command units.
pub fn driver_effort(driver_torque: i32, params: &ControlParams) -> i32 {
    driver_torque
        .saturating_abs()
        .saturating_mul(params.steer_driver_factor)
}

/// Whether the driver is pushing hard enough to take over.
pub fn driver_override_active(driver_torque: i32, params: &ControlParams) -> bool {
    driver_effort(driver_torque, params) > params.steer_driver_allowance
}

/// Largest magnitude the command may keep while the driver pushes with
/// `driver_torque`.
pub fn driver_torque_cap(driver_torque: i32, params: &ControlParams) -> i32 {
    let excess = (driver_effort(driver_torque, params) - params.steer_driver_allowance).max(0);
    params
        .steer_max
        .saturating_sub(excess.saturating_mul(params.steer_driver_multiplier))
        .clamp(0, params.steer_max)
}

/// One release step toward zero, never overshooting.
pub fn decay_toward_zero(last: i32, params: &ControlParams) -> i32 {
    let last = last.clamp(-params.steer_max, params.steer_max);
    last - last.signum() * last.abs().min(params.steer_delta_down)
}

/// Next commanded torque for an engaged steering frame.
pub fn apply_steer_torque_limits(
    desired: i32,
    last: i32,
    driver_torque: i32,
    params: &ControlParams,
) -> i32 {
    let max = params.steer_max;
    let desired = desired.clamp(-max, max);
    let last = last.clamp(-max, max);

    let next = if driver_override_active(driver_torque, params) {
        let released = (last.abs() - params.steer_delta_down).max(0);
        last.signum() * released.min(driver_torque_cap(driver_torque, params))
    } else {
        rate_limit(desired, last, params)
    };

    next.clamp(-max, max)
}

fn rate_limit(target: i32, last: i32, params: &ControlParams) -> i32 {
    if last != 0 && target.signum() != last.signum() {
        // Release toward zero, including reversals.
        return decay_toward_zero(last, params);
    }

    if target.abs() > last.abs() {
        let step = (target.abs() - last.abs()).min(params.steer_delta_up);
        last + target.signum() * step
    } else {
        let step = (last.abs() - target.abs()).min(params.steer_delta_down);
        last - last.signum() * step
    }
}
