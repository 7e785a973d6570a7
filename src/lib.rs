//! # MQB Lateral Control
//!
//! This library identifies which MQB vehicle it is connected to from passively
//! observed CAN traffic and then generates rate-limited steering commands for
//! that vehicle at fixed cadences.
//!
//! ## Overview
//!
//! - [`fingerprint`] holds the known traffic shapes (message ID → payload
//!   length) of each variant
//! - [`matcher`] narrows the candidate variants while traffic is observed
//! - [`params`] maps a confirmed variant to its actuation limits
//! - [`controller`] computes the HCA_01 steering command, the LDW_02 warning
//!   and virtual cruise button presses on every 100 Hz tick
//! - [`protect`] seals outgoing frames with the MQB counter and CRC
//! - [`runtime`] drives the controller against a clock and a frame sink
//!
//! ## Example
//!
//! ```rust
//! use mqb_lateral::{ControlResult, VehicleVariant};
//! use mqb_lateral::buttons::ButtonConflictPolicy;
//! use mqb_lateral::controller::{FallbackPolicy, SteeringController, TickInput};
//! use mqb_lateral::fingerprint::FingerprintDatabase;
//! use mqb_lateral::matcher::{FingerprintMatcher, MatchResult, MatcherConfig};
//! use mqb_lateral::params::ParamTable;
//!
//! # fn main() -> ControlResult<()> {
//! let db = FingerprintDatabase::builtin();
//! let mut matcher = FingerprintMatcher::new(db, MatcherConfig::default());
//!
//! // Replay the traffic of a Superb
//! for (id, len) in db.signatures(VehicleVariant::SkodaSuperbMk3)[0].iter() {
//!     matcher.observe(id, len);
//! }
//! let identification = matcher.finish();
//! assert_eq!(identification, MatchResult::Confirmed(VehicleVariant::SkodaSuperbMk3));
//!
//! let mut controller = SteeringController::start(
//!     &identification,
//!     ParamTable::builtin(),
//!     FallbackPolicy::Refuse,
//!     ButtonConflictPolicy::Queue,
//! )?;
//!
//! let output = controller.tick(&TickInput {
//!     desired_torque: Some(500),
//!     assist_enabled: true,
//!     ..Default::default()
//! });
//! assert_eq!(output.steering.map(|s| s.torque), Some(4));
//! # Ok(())
//! # }
//! ```

use thiserror::Error;

pub mod buttons;
pub mod candump;
pub mod config;
pub mod controller;
pub mod fingerprint;
pub mod ldw;
pub mod limiter;
pub mod matcher;
pub mod params;
pub mod protect;
pub mod runtime;
mod variant;

pub use variant::VehicleVariant;

/// Result type for control operations
pub type ControlResult<T> = Result<T, ControlError>;

/// Control error types
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ControlError {
    /// Observed traffic is consistent with no known variant
    #[error("No known vehicle matches the observed traffic")]
    NoMatch,

    /// Identification closed with several candidates left
    #[error("Identification ambiguous between {0:?}")]
    Ambiguous(Vec<VehicleVariant>),

    /// Variant without a parameter set, or an unparseable variant name
    #[error("Unknown vehicle variant: {0}")]
    UnknownVariant(String),

    /// Control requested before identification finished
    #[error("Vehicle not identified")]
    NotIdentified,

    /// Tick work finished after the next tick boundary
    #[error("Missed tick {frame}: overran by {overrun_us} us")]
    MissedTick { frame: u64, overrun_us: u64 },

    /// Invalid configuration provided
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Invalid data format
    #[error("Invalid data format: {0}")]
    InvalidDataFormat(String),

    /// Frame could not be handed to the bus
    #[error("Transmit failed: {0}")]
    Transmit(String),
}
