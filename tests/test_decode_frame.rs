mod common;
use common::*;

use lxp_telemetry::lxp::decode_frame;
use lxp_telemetry::lxp::layout::{RawValue, SECTION1, SECTION2, SECTION3};
use lxp_telemetry::lxp::scaling::ScaledValue;
use lxp_telemetry::prelude::*;

fn loaded(record: &Record) -> [bool; 3] {
    [
        record.section1.is_loaded(),
        record.section2.is_loaded(),
        record.section3.is_loaded(),
    ]
}

#[test]
fn section1_frame() {
    let frame = FrameBuilder::section1()
        .s1("PV1_Voltage", 3650)
        .s1("SOC", 100)
        .build();
    assert_eq!(frame.len(), 117);

    let record = decode_frame(&frame).unwrap();

    assert_eq!(record.section1.scaled().float("PV1_Voltage"), Some(365.0));
    assert_eq!(record.section1.scaled().float("SOC"), Some(100.0));
    assert_eq!(record.section1.raw().soc, 100);
    assert_eq!(loaded(&record), [true, false, false]);
    assert_eq!(record.serial_number, SERIAL);
    assert_eq!(record.datalog, DATALOG);
}

#[test]
fn section2_frame_preserves_fault_code() {
    let frame = FrameBuilder::section2().s2("FaultCode", 0x10).build();

    let record = decode_frame(&frame).unwrap();

    assert_eq!(
        record.section2.scaled().get("FaultCode"),
        Some(&ScaledValue::Raw(RawValue::U32(16)))
    );
    assert_eq!(record.section2.raw().fault_code, 16);
    assert_eq!(loaded(&record), [false, true, false]);
}

#[test]
fn section3_frame() {
    let frame = FrameBuilder::section3()
        .s3("BMS_Max_Charge_Current", 15000)
        .s3("MaxCell_Voltage", 335)
        .s3("Cycle_Count", 42)
        .put_words(&SECTION3, 0, "BMS_Status", &[1, 2, 3, 4, 5, 6, 7, 8, 9, 10])
        .build();

    let record = decode_frame(&frame).unwrap();
    let scaled = record.section3.scaled();

    assert_eq!(loaded(&record), [false, false, true]);
    assert_eq!(scaled.float("BMS_Max_Charge_Current"), Some(150.0));
    assert_eq!(scaled.float("MaxCell_Voltage"), Some(33.5));
    assert_eq!(
        scaled.get("Cycle_Count"),
        Some(&ScaledValue::Raw(RawValue::I16(42)))
    );
    assert_eq!(record.section3.raw().bms_status, [1, 2, 3, 4, 5, 6, 7, 8, 9, 10]);
}

#[test]
fn full_frame_loads_everything() {
    let frame = FrameBuilder::all()
        .put(&SECTION1, 0, "Battery_Voltage", 532)
        .put(&SECTION1, 0, "Frequency_Grid", 5001)
        .put(&SECTION1, 0, "Grid_Power_Factor", 998)
        .put(&SECTION1, 0, "Status", 0x10)
        .put(&SECTION2, 80, "PV1_Energy_Total", 123_456)
        .put(&SECTION2, 80, "Inner_Temperature", 41)
        .put(&SECTION2, 80, "Runtime", 7_654_321)
        .put(&SECTION3, 160, "Battery_Current", -1234)
        .put(&SECTION3, 160, "BMS_Discharge_Cutoff", 480)
        .build();
    assert_eq!(frame.len(), 291);

    let record = decode_frame(&frame).unwrap();
    assert_eq!(loaded(&record), [true, true, true]);

    let s1 = record.section1.scaled();
    assert_eq!(s1.float("Battery_Voltage"), Some(53.2));
    assert_eq!(s1.float("Frequency_Grid"), Some(50.01));
    assert_eq!(s1.float("Grid_Power_Factor"), Some(0.998));
    assert_eq!(s1.get("Status"), Some(&ScaledValue::Raw(RawValue::U16(0x10))));

    let s2 = record.section2.scaled();
    assert_eq!(s2.float("PV1_Energy_Total"), Some(12345.6));
    assert_eq!(s2.float("Inner_Temperature"), Some(41.0));
    assert_eq!(s2.get("Runtime"), Some(&ScaledValue::Raw(RawValue::U32(7_654_321))));

    let s3 = record.section3.scaled();
    assert_eq!(s3.float("Battery_Current"), Some(-12.34));
    assert_eq!(s3.float("BMS_Discharge_Cutoff"), Some(48.0));
}

#[test]
fn every_route_sets_only_its_flags() {
    let cases = [
        (0, 254, [true, true, true]),
        (0, 80, [true, false, false]),
        (40, 80, [false, true, false]),
        (80, 80, [false, false, true]),
    ];

    for (register, len, expected) in cases {
        let record = decode_frame(&FrameBuilder::new(register, len).build()).unwrap();
        assert_eq!(loaded(&record), expected, "register {}", register);
        assert_eq!(record.loaded_sections().len(), expected.iter().filter(|l| **l).count());
    }
}

#[test]
fn unknown_register_length_pairs_are_rejected() {
    // (register, bytes of values) -> packet_length = values + 31
    for (register, len) in [(40, 254), (80, 254), (120, 80), (0, 79), (0, 160), (1, 80)] {
        let frame = FrameBuilder::new(register, len).build();
        let packet_length = (len + 31) as u16;

        assert_eq!(
            decode_frame(&frame),
            Err(DecodeError::UnrecognizedFrame {
                register,
                packet_length
            })
        );
    }
}

#[test]
fn prefix_mismatch() {
    for prefix in [0x0000, 0x1AA0, 0xA11A, 0xFFFF, 0x1AA2] {
        let frame = FrameBuilder::section1().prefix(prefix).build();
        assert_eq!(
            decode_frame(&frame),
            Err(DecodeError::HeaderPrefixMismatch(prefix))
        );
    }
}

#[test]
fn length_mismatch() {
    for declared in [0, 110, 112, 285, u16::MAX] {
        let frame = FrameBuilder::section1().packet_length(declared).build();
        assert_eq!(
            decode_frame(&frame),
            Err(DecodeError::LengthMismatch {
                declared,
                received: 117
            })
        );
    }
}

#[test]
fn fifty_byte_frame_with_wrong_length() {
    let mut frame = FrameBuilder::section1().packet_length(111).build();
    frame.truncate(50);

    assert_eq!(
        decode_frame(&frame),
        Err(DecodeError::LengthMismatch {
            declared: 111,
            received: 50
        })
    );
}

#[test]
fn other_functions_are_unhandled() {
    for function in [0xC1, 0xC3, 0xC4, 0x00] {
        let err = decode_frame(&FrameBuilder::section1().function(function).build()).unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedFunction(function));
        assert!(err.is_unhandled());
    }
}

#[test]
fn other_device_functions_are_rejected() {
    for device_function in [0x03, 0x06, 0x10] {
        let err = decode_frame(
            &FrameBuilder::section1()
                .device_function(device_function)
                .build(),
        )
        .unwrap_err();
        assert_eq!(err, DecodeError::UnsupportedDeviceFunction(device_function));
        assert!(!err.is_unhandled());
    }
}

#[test]
fn truncated_frames() {
    assert_eq!(
        decode_frame(&[0xA1, 0x1A]),
        Err(DecodeError::TruncatedFrame {
            needed: 20,
            available: 2
        })
    );

    // header only, length consistent
    let frame = FrameBuilder::section1().build();
    let mut short = frame[..26].to_vec();
    short[4..6].copy_from_slice(&20u16.to_le_bytes());
    assert_eq!(
        decode_frame(&short),
        Err(DecodeError::TruncatedFrame {
            needed: 15,
            available: 6
        })
    );
}

#[test]
fn decoding_is_idempotent() {
    let frame = FrameBuilder::all()
        .put(&SECTION1, 0, "PV2_Voltage", 2999)
        .put(&SECTION2, 80, "WarningCode", 0x0001_0000)
        .put(&SECTION3, 160, "Battery_Capacity", 280)
        .build();

    let a = decode_frame(&frame).unwrap();
    let b = decode_frame(&frame).unwrap();

    assert_eq!(a, b);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn checksum_is_not_part_of_decoding() {
    let frame = FrameBuilder::section1().bad_checksum().build();
    assert!(!lxp_telemetry::lxp::packet::checksum_valid(&frame));
    assert!(decode_frame(&frame).is_ok());
}
