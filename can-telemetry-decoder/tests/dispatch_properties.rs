//! End-to-end behaviour of the frame dispatcher through the public API

use can_telemetry_decoder::formats::CandumpReader;
use can_telemetry_decoder::{
    catalog, DecoderConfig, DispatchOutcome, DispatchTable, FrameDispatcher, LengthPolicy,
    MessageDefinition, RecordingSink, SignalDefinition, UnpackError,
};
use std::io::Cursor;

const EPSILON: f64 = 1e-9;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn motor_table() -> DispatchTable {
    DispatchTable::from_messages(vec![MessageDefinition::new(0x101, "MotorStatus", 8)
        .with_signal(SignalDefinition::new("MOTOR_SPEED", 0, 16).with_scaling(0.1, 0.0))])
    .unwrap()
}

/// Write `raw` into an Intel-order field, one bit at a time
fn pack_le(data: &mut [u8], start_bit: usize, length: usize, raw: u64) {
    for i in 0..length {
        let pos = start_bit + i;
        let bit = ((raw >> i) & 1) as u8;
        data[pos / 8] = (data[pos / 8] & !(1 << (pos % 8))) | (bit << (pos % 8));
    }
}

/// Physical value -> raw field bits, two's complement for negatives
fn encode_physical(value: f64, factor: f64, offset: f64, length: usize) -> u64 {
    let raw = ((value - offset) / factor).round() as i64;
    let mask = if length == 64 { u64::MAX } else { (1u64 << length) - 1 };
    (raw as u64) & mask
}

#[test]
fn motor_speed_example() {
    init_logging();
    let mut dispatcher = FrameDispatcher::new(motor_table());

    dispatcher.decode(0x101, &[0x10, 0x27, 0, 0, 0, 0, 0, 0], 8);

    let speed = dispatcher.state().value("MOTOR_SPEED").unwrap();
    assert!((speed - 1000.0).abs() < EPSILON);
}

#[test]
fn short_payload_keeps_previous_value() {
    init_logging();
    let mut dispatcher =
        FrameDispatcher::with_sink(motor_table(), DecoderConfig::new(), RecordingSink::new());

    // Never decoded: stays unset
    dispatcher.decode(0x101, &[0x10, 0x27, 0, 0, 0, 0], 6);
    assert!(dispatcher.state().value("MOTOR_SPEED").is_none());
    assert!(!dispatcher.state().has_been_decoded("MOTOR_SPEED"));

    // Decoded once: keeps that value
    dispatcher.decode(0x101, &[0x10, 0x27, 0, 0, 0, 0, 0, 0], 8);
    let before = dispatcher.state().clone();
    dispatcher.decode(0x101, &[0xFF, 0xFF, 0, 0, 0, 0], 6);
    assert_eq!(dispatcher.state(), &before);

    let sink = dispatcher.sink();
    assert_eq!(sink.failure_count(), 2);
    assert_eq!(
        sink.last_failure(),
        Some((
            0x101,
            UnpackError::LengthMismatch {
                expected: 8,
                actual: 6
            }
        ))
    );
}

#[test]
fn every_truncation_is_rejected() {
    let table = catalog::dispatch_table().unwrap();
    let mut dispatcher = FrameDispatcher::new(table);
    let payload = [0xA5u8; 8];

    for id in [0x615, 0x616, 0x617] {
        for len in 0..8u8 {
            let before = dispatcher.state().clone();
            let outcome = dispatcher.decode(id, &payload, len);
            assert!(matches!(outcome, DispatchOutcome::Rejected(_)));
            assert_eq!(dispatcher.state(), &before);
        }
    }
}

#[test]
fn unknown_identifiers_are_noops() {
    let mut dispatcher = FrameDispatcher::with_sink(
        catalog::dispatch_table().unwrap(),
        DecoderConfig::new(),
        RecordingSink::new(),
    );
    let before = dispatcher.state().clone();

    for id in [0x000, 0x101, 0x614, 0x618, 0x7FF, 0x1FFF_FFFF] {
        assert_eq!(dispatcher.decode(id, &[0xFF; 8], 8), DispatchOutcome::Ignored);
    }

    assert_eq!(dispatcher.state(), &before);
    assert_eq!(dispatcher.sink().failure_count(), 0);
    assert_eq!(dispatcher.stats().ignored, 6);
}

#[test]
fn decoding_is_idempotent() {
    let payload = [0x10, 0x27, 0x55, 0x02, 0x80, 0xF5, 0x20, 0x7F];

    let mut once = FrameDispatcher::new(catalog::dispatch_table().unwrap());
    once.decode(catalog::DRIVE_FRAME_ID, &payload, 8);

    let mut twice = FrameDispatcher::new(catalog::dispatch_table().unwrap());
    twice.decode(catalog::DRIVE_FRAME_ID, &payload, 8);
    twice.decode(catalog::DRIVE_FRAME_ID, &payload, 8);

    for (a, b) in once.state().iter().zip(twice.state().iter()) {
        assert_eq!(a.name, b.name);
        assert_eq!(a.value, b.value);
        assert_eq!(a.raw_value, b.raw_value);
        assert_eq!(a.range, b.range);
    }
}

#[test]
fn decoded_value_is_raw_times_scale_plus_offset() {
    let table = catalog::dispatch_table().unwrap();
    let drive = table.get_message(catalog::DRIVE_FRAME_ID).unwrap().clone();
    let mut dispatcher = FrameDispatcher::new(table);

    let patterns: [[u8; 8]; 4] = [
        [0; 8],
        [0xFF; 8],
        [0x12, 0x34, 0x56, 0x78, 0x9A, 0xBC, 0xDE, 0xF0],
        [0x5A, 0xA5, 0x5A, 0xA5, 0x5A, 0xA5, 0x5A, 0xA5],
    ];

    for payload in patterns {
        dispatcher.decode(drive.id, &payload, 8);
        let word = u64::from_le_bytes(payload);

        for signal in &drive.signals {
            let raw = (word >> signal.start_bit) & ((1u64 << signal.length) - 1);
            let expected = raw as f64 * signal.factor + signal.offset;
            let state = dispatcher.state().get(&signal.name).unwrap();
            assert_eq!(state.raw_value, Some(i128::from(raw)));
            assert!((state.value.unwrap() - expected).abs() < EPSILON);
        }
    }
}

#[test]
fn signed_signal_round_trip() {
    let table = DispatchTable::from_messages(vec![MessageDefinition::new(0x300, "Torque", 4)
        .with_signal(
            SignalDefinition::new("MOTOR_TORQUE", 4, 12)
                .signed()
                .with_scaling(0.5, 0.0),
        )
        .with_signal(
            SignalDefinition::new("REGEN_CURRENT", 16, 16)
                .signed()
                .with_scaling(0.1, -10.0),
        )])
    .unwrap();
    let mut dispatcher = FrameDispatcher::new(table);

    for (torque, regen) in [(-42.5, -250.7), (-1024.0, -3286.8), (-0.5, -10.1), (100.0, 50.0)] {
        let mut payload = [0u8; 4];
        pack_le(&mut payload, 4, 12, encode_physical(torque, 0.5, 0.0, 12));
        pack_le(&mut payload, 16, 16, encode_physical(regen, 0.1, -10.0, 16));

        dispatcher.decode(0x300, &payload, 4);

        let state = dispatcher.state();
        assert!((state.value("MOTOR_TORQUE").unwrap() - torque).abs() < 1e-6);
        assert!((state.value("REGEN_CURRENT").unwrap() - regen).abs() < 1e-6);
    }
}

#[test]
fn exact_policy_rejects_long_payloads() {
    let mut dispatcher = FrameDispatcher::with_sink(
        motor_table(),
        DecoderConfig::new().with_length_policy(LengthPolicy::Exact),
        RecordingSink::new(),
    );
    let outcome = dispatcher.decode(0x101, &[0u8; 12], 12);
    assert_eq!(
        outcome,
        DispatchOutcome::Rejected(UnpackError::LengthMismatch {
            expected: 8,
            actual: 12
        })
    );

    let mut permissive = FrameDispatcher::new(motor_table());
    let outcome = permissive.decode(0x101, &[0x10, 0x27, 0, 0, 0, 0, 0, 0, 0xFF, 0xFF], 10);
    assert!(matches!(outcome, DispatchOutcome::Decoded { .. }));
    assert!((permissive.state().value("MOTOR_SPEED").unwrap() - 1000.0).abs() < EPSILON);
}

#[test]
fn out_of_range_does_not_blind_the_message() {
    let mut dispatcher = FrameDispatcher::with_sink(
        catalog::dispatch_table().unwrap(),
        DecoderConfig::new(),
        RecordingSink::new(),
    );

    let outcome = dispatcher.decode(catalog::DRIVE_FRAME_ID, &[0xFF; 8], 8);
    assert_eq!(
        outcome,
        DispatchOutcome::Decoded {
            signals: 5,
            out_of_range: 3
        }
    );

    let state = dispatcher.state();
    assert!(state.get("AC_CURRENT").unwrap().is_out_of_range());
    assert!(!state.get("DC_CURRENT").unwrap().is_out_of_range());
    assert!((state.value("THROTTLE_VOLT").unwrap() - 10.23).abs() < 1e-6);

    let flagged: Vec<&str> = dispatcher
        .sink()
        .out_of_range_records()
        .iter()
        .map(|r| r.signal.as_str())
        .collect();
    assert_eq!(flagged, vec!["AC_CURRENT", "DC_BUS_VOLT", "MOTOR_SPEED"]);
}

#[test]
fn long_replay_keeps_diagnostics_bounded() {
    let mut dispatcher = FrameDispatcher::with_sink(
        catalog::dispatch_table().unwrap(),
        DecoderConfig::new(),
        RecordingSink::new(),
    );

    for _ in 0..10_000 {
        dispatcher.decode(catalog::DRIVE_FRAME_ID, &[0xFF; 8], 8);
        dispatcher.decode(catalog::DRIVE_FRAME_ID, &[0xFF; 8], 4);
    }

    let sink = dispatcher.sink();
    assert_eq!(sink.out_of_range_records().len(), 3);
    assert_eq!(sink.failure_records().len(), 1);
    assert_eq!(sink.out_of_range_count(), 30_000);
    assert_eq!(sink.failure_count(), 10_000);
    assert_eq!(sink.decoded, 10_000);
    assert_eq!(dispatcher.stats().out_of_range_signals, 30_000);
}

#[test]
fn candump_replay_updates_snapshot() {
    init_logging();
    let log = "\
(1436509052.000000) vcan0 615#0800000000000000
(1436509052.100000) vcan0 616#E2040000000000
(1436509052.200000) vcan0 617#102700008 0F52000
(1436509052.300000) vcan0 617#1027000080F52000
(1436509052.400000) vcan0 123#DEADBEEF
";
    let mut dispatcher = FrameDispatcher::with_sink(
        catalog::dispatch_table().unwrap(),
        DecoderConfig::new(),
        RecordingSink::new(),
    );

    let mut parse_errors = 0;
    for frame in CandumpReader::new(Cursor::new(log)) {
        match frame {
            Ok(frame) => {
                dispatcher.decode_frame(&frame);
            }
            Err(_) => parse_errors += 1,
        }
    }

    // Line 3 is garbled, line 2 is one byte short of the temperature frame
    assert_eq!(parse_errors, 1);
    let stats = dispatcher.stats();
    assert_eq!(stats.frames_seen, 4);
    assert_eq!(stats.decoded, 2);
    assert_eq!(stats.rejected, 1);
    assert_eq!(stats.ignored, 1);

    let state = dispatcher.state();
    assert_eq!(state.value("BRAKE"), Some(1.0));
    assert_eq!(state.value("FORWARD"), Some(0.0));
    assert!(!state.has_been_decoded("MOTOR_TEMP"));
    assert!((state.value("MOTOR_SPEED").unwrap() - 1500.0).abs() < 1e-6);

    let speed = state.get("MOTOR_SPEED").unwrap();
    assert_eq!(speed.timestamp.unwrap().timestamp_subsec_millis(), 300);
    assert_eq!(speed.update_count, 1);
}
