use std::time::Duration;

use mqb_lateral::buttons::{ButtonStates, CruiseButton};
use mqb_lateral::candump::parse_candump;
use mqb_lateral::config::SessionConfig;
use mqb_lateral::controller::{SteeringCommand, SteeringController, TickInput};
use mqb_lateral::fingerprint::FingerprintDatabase;
use mqb_lateral::ldw::LdwMessage;
use mqb_lateral::matcher::{FingerprintMatcher, MatchResult};
use mqb_lateral::protect::{
    FrameProtector, ProtectionConfig, ProtectionStatus, ProtectionTable, GRA_ACC_01_ID, HCA_01_ID,
    LDW_02_ID,
};
use mqb_lateral::runtime::{Clock, ControlLoop, OutboundFrame, PayloadEncoder, Transmitter};
use mqb_lateral::{ControlError, ControlResult, VehicleVariant};

/// Simulated clock where every tick costs `work`.
struct SimClock {
    now: Duration,
    work: Duration,
}

impl Clock for SimClock {
    fn now(&self) -> Duration {
        self.now
    }

    fn sleep_until(&mut self, deadline: Duration) {
        self.now = self.now.max(deadline) + self.work;
    }
}

struct TestEncoder;

impl PayloadEncoder for TestEncoder {
    fn encode_steering(&self, command: &SteeringCommand) -> ControlResult<Vec<u8>> {
        let magnitude = command.torque.unsigned_abs() as u16;
        Ok(vec![
            0,
            0x30,
            (magnitude & 0xFF) as u8,
            (magnitude >> 8) as u8 | if command.torque < 0 { 0x80 } else { 0 },
            if command.active { 5 } else { 3 },
            0xFE,
            0x07,
            0,
        ])
    }

    fn encode_ldw(&self, message: &LdwMessage) -> ControlResult<Vec<u8>> {
        Ok(vec![0, 0, message.warning.code(), 0, 0, 0, 0, 0])
    }

    fn encode_buttons(&self, states: &ButtonStates) -> ControlResult<Vec<u8>> {
        Ok(vec![0, 0, states.cancel as u8, states.resume_cruise as u8, 0, 0, 0, 0])
    }
}

fn superb_log() -> String {
    let db = FingerprintDatabase::builtin();
    db.signatures(VehicleVariant::SkodaSuperbMk3)[0]
        .iter()
        .enumerate()
        .map(|(i, (id, len))| {
            let data = "00".repeat(len as usize);
            format!("({}.{:06}) can0 {:X}#{}\n", 1_700_000_000, i * 1000, id, data)
        })
        .collect()
}

fn identify(log: &str) -> MatchResult {
    let config = SessionConfig::default();
    let db = config.fingerprint_database().unwrap();
    let mut matcher = FingerprintMatcher::new(&db, config.matcher_config());
    let frames = parse_candump(log).unwrap();
    let origin = frames[0].timestamp;
    for frame in frames {
        matcher.observe_at(frame.id, frame.len(), frame.timestamp - origin);
    }
    matcher.finish()
}

fn start_loop(work: Duration) -> ControlLoop<SimClock, TestEncoder, Vec<OutboundFrame>> {
    let config = SessionConfig::default();
    let identification = identify(&superb_log());
    let controller = SteeringController::start(
        &identification,
        &config.param_table(),
        config.fallback,
        config.buttons,
    )
    .unwrap();
    let transmitter =
        Transmitter::new(TestEncoder, Vec::new(), &ProtectionTable::default()).unwrap();
    let clock = SimClock {
        now: Duration::ZERO,
        work,
    };
    ControlLoop::new(controller, clock, transmitter, config.tick_period()).unwrap()
}

#[test]
fn superb_log_is_confirmed() {
    assert_eq!(
        identify(&superb_log()),
        MatchResult::Confirmed(VehicleVariant::SkodaSuperbMk3)
    );
}

#[test]
fn shared_id_with_foreign_length_is_no_match() {
    // 0x3C0 is declared by both variants with length 4.
    let log = "(0.000000) can0 3C0#0000000000000000\n";
    assert_eq!(identify(log), MatchResult::NoMatch);

    let err = SteeringController::start(
        &MatchResult::NoMatch,
        &SessionConfig::default().param_table(),
        SessionConfig::default().fallback,
        SessionConfig::default().buttons,
    )
    .unwrap_err();
    assert_eq!(err, ControlError::NoMatch);
}

#[test]
fn session_sends_sealed_steering_frames() {
    let mut control = start_loop(Duration::from_millis(1));
    let mut inputs = |frame: u64| TickInput {
        desired_torque: Some(-1000),
        assist_enabled: true,
        button_request: (frame == 10).then_some(CruiseButton::Resume),
        ..Default::default()
    };
    control.run(200, &mut inputs).unwrap();
    assert!(!control.is_faulted());

    let frames = control.transmitter().sink();
    let mut rx = FrameProtector::new(ProtectionConfig::default()).unwrap();
    let mut last_magnitude = 0;
    let mut hca = 0;
    for frame in frames.iter().filter(|f| f.id == HCA_01_ID) {
        assert_eq!(rx.check(&frame.data).unwrap(), ProtectionStatus::Ok);
        assert_eq!(frame.data[1] & 0xF0, 0x30);
        let magnitude = i32::from(frame.data[2]) | (i32::from(frame.data[3] & 0x7F) << 8);
        assert!(magnitude - last_magnitude <= 4);
        assert!(magnitude <= 300);
        last_magnitude = magnitude;
        hca += 1;
    }
    assert_eq!(hca, 100);
    assert_eq!(last_magnitude, 300);

    assert_eq!(frames.iter().filter(|f| f.id == LDW_02_ID).count(), 20);
    let resume = frames
        .iter()
        .filter(|f| f.id == GRA_ACC_01_ID && f.data[3] == 1)
        .count();
    assert_eq!(resume, 16);
}

#[test]
fn overrun_faults_the_session() {
    let mut control = start_loop(Duration::from_millis(11));
    let mut inputs = |_frame: u64| TickInput {
        desired_torque: Some(100),
        assist_enabled: true,
        ..Default::default()
    };

    let err = control.run(10, &mut inputs).unwrap_err();
    assert!(matches!(err, ControlError::MissedTick { frame: 0, .. }));
    assert!(control.is_faulted());
    assert!(control.controller().is_none());
    assert_eq!(control.run_tick(&mut inputs).unwrap_err(), err);
}
