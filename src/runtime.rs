//! # Periodic control loop
//!
//! Drives a [`SteeringController`] at a fixed base period. Every tick waits
//! for its boundary on a [`Clock`], samples the inputs, computes one decision
//! and hands the resulting frames to a [`FrameSink`] after packing them with a
//! [`PayloadEncoder`] and sealing them with a [`FrameProtector`].
//!
//! A tick that finishes after the next boundary, or a frame that cannot be
//! sent, faults the loop. The controller is dropped and every later tick
//! returns the same error.

use crate::buttons::ButtonStates;
use crate::controller::{SteeringCommand, SteeringController, TickInput, TickOutput};
use crate::ldw::LdwMessage;
use crate::protect::{FrameProtector, ProtectionTable, GRA_ACC_01_ID, HCA_01_ID, LDW_02_ID};
use crate::{ControlError, ControlResult};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, error};

/// Base tick of the MQB lateral messages (100 Hz).
pub const DEFAULT_TICK_PERIOD: Duration = Duration::from_millis(10);

/// Monotonic time source measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;

    /// Block until `deadline`. Returns immediately once it has passed.
    fn sleep_until(&mut self, deadline: Duration);
}

/// Wall clock backed by [`Instant`] and a sleeping thread.
#[derive(Debug, Clone, Copy)]
pub struct StdClock {
    origin: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&mut self, deadline: Duration) {
        if let Some(remaining) = deadline.checked_sub(self.now()) {
            std::thread::sleep(remaining);
        }
    }
}

/// Packs decided values into payload bytes. Bytes 0 and 1 of protected
/// messages are overwritten with CRC and counter after encoding.
pub trait PayloadEncoder {
    fn encode_steering(&self, command: &SteeringCommand) -> ControlResult<Vec<u8>>;
    fn encode_ldw(&self, message: &LdwMessage) -> ControlResult<Vec<u8>>;
    fn encode_buttons(&self, states: &ButtonStates) -> ControlResult<Vec<u8>>;
}

/// A frame ready for the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundFrame {
    pub id: u32,
    pub data: Vec<u8>,
}

/// Bus transmit side.
pub trait FrameSink {
    /// # Errors
    /// Implementations report bus failures as `ControlError::Transmit`.
    fn send(&mut self, frame: OutboundFrame) -> ControlResult<()>;
}

/// Collects frames in memory.
impl FrameSink for Vec<OutboundFrame> {
    fn send(&mut self, frame: OutboundFrame) -> ControlResult<()> {
        self.push(frame);
        Ok(())
    }
}

/// Provides the inputs of a tick.
pub trait InputSource {
    fn sample(&mut self, frame: u64) -> TickInput;
}

impl<F> InputSource for F
where
    F: FnMut(u64) -> TickInput,
{
    fn sample(&mut self, frame: u64) -> TickInput {
        self(frame)
    }
}

/// Encodes, seals and sends the frames of one tick.
#[derive(Debug)]
pub struct Transmitter<E, S> {
    encoder: E,
    sink: S,
    protectors: BTreeMap<u32, FrameProtector>,
}

impl<E: PayloadEncoder, S: FrameSink> Transmitter<E, S> {
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` for an invalid entry in
    /// `protection`.
    pub fn new(encoder: E, sink: S, protection: &ProtectionTable) -> ControlResult<Self> {
        Ok(Self {
            encoder,
            sink,
            protectors: protection.protectors()?,
        })
    }

    /// Send every frame decided in `output`. Returns how many were sent.
    pub fn emit(&mut self, output: &TickOutput) -> ControlResult<usize> {
        let mut sent = 0;
        if let Some(command) = &output.steering {
            let data = self.encoder.encode_steering(command)?;
            self.send(HCA_01_ID, data)?;
            sent += 1;
        }
        if let Some(message) = &output.ldw {
            let data = self.encoder.encode_ldw(message)?;
            self.send(LDW_02_ID, data)?;
            sent += 1;
        }
        if let Some(states) = &output.buttons {
            let data = self.encoder.encode_buttons(states)?;
            self.send(GRA_ACC_01_ID, data)?;
            sent += 1;
        }
        Ok(sent)
    }

    fn send(&mut self, id: u32, mut data: Vec<u8>) -> ControlResult<()> {
        if let Some(protector) = self.protectors.get_mut(&id) {
            protector.protect(&mut data)?;
        }
        debug!(id, len = data.len(), "sending frame");
        self.sink.send(OutboundFrame { id, data })
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }
}

/// Single periodic control loop.
#[derive(Debug)]
pub struct ControlLoop<C, E, S> {
    clock: C,
    transmitter: Transmitter<E, S>,
    controller: Option<SteeringController>,
    period: Duration,
    next_boundary: Duration,
    fault: Option<ControlError>,
}

impl<C, E, S> ControlLoop<C, E, S>
where
    C: Clock,
    E: PayloadEncoder,
    S: FrameSink,
{
    /// The first tick boundary is the moment of construction.
    ///
    /// # Errors
    /// Returns `ControlError::InvalidConfiguration` for a zero period.
    pub fn new(
        controller: SteeringController,
        clock: C,
        transmitter: Transmitter<E, S>,
        period: Duration,
    ) -> ControlResult<Self> {
        if period.is_zero() {
            return Err(ControlError::InvalidConfiguration(
                "Tick period must be non-zero".into(),
            ));
        }
        let next_boundary = clock.now();
        Ok(Self {
            clock,
            transmitter,
            controller: Some(controller),
            period,
            next_boundary,
            fault: None,
        })
    }

    /// Run one tick.
    ///
    /// # Errors
    /// - `MissedTick` when the work finished after the next boundary.
    /// - Encoder, protection and sink errors.
    ///
    /// Either faults the loop; a faulted loop returns the fault again.
    pub fn run_tick<I: InputSource + ?Sized>(
        &mut self,
        inputs: &mut I,
    ) -> ControlResult<TickOutput> {
        if let Some(fault) = &self.fault {
            return Err(fault.clone());
        }
        let Some(controller) = self.controller.as_mut() else {
            return Err(ControlError::NotIdentified);
        };

        let boundary = self.next_boundary;
        self.clock.sleep_until(boundary);

        let frame = controller.state().frame();
        let input = inputs.sample(frame);
        let output = controller.tick(&input);

        if let Err(err) = self.transmitter.emit(&output) {
            return Err(self.enter_fault(err));
        }

        let deadline = boundary.saturating_add(self.period);
        let now = self.clock.now();
        if now > deadline {
            let overrun_us = u64::try_from((now - deadline).as_micros()).unwrap_or(u64::MAX);
            return Err(self.enter_fault(ControlError::MissedTick { frame, overrun_us }));
        }

        self.next_boundary = deadline;
        Ok(output)
    }

    /// Run `ticks` ticks, stopping at the first error.
    pub fn run<I: InputSource + ?Sized>(
        &mut self,
        ticks: u64,
        inputs: &mut I,
    ) -> ControlResult<()> {
        for _ in 0..ticks {
            self.run_tick(inputs)?;
        }
        Ok(())
    }

    fn enter_fault(&mut self, err: ControlError) -> ControlError {
        error!(%err, "control loop faulted, dropping actuation state");
        self.controller = None;
        self.fault = Some(err.clone());
        err
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_some()
    }

    pub fn fault(&self) -> Option<&ControlError> {
        self.fault.as_ref()
    }

    /// `None` once the loop faulted.
    pub fn controller(&self) -> Option<&SteeringController> {
        self.controller.as_ref()
    }

    pub fn transmitter(&self) -> &Transmitter<E, S> {
        &self.transmitter
    }

    pub fn period(&self) -> Duration {
        self.period
    }
}
