//! Built-in message catalog for the motor controller
//!
//! Compiled definitions for the controller's status, temperature, drive and
//! alert frames. All fields are Intel (little-endian) and bit numbers are
//! LSB-first positions in the payload.

use crate::dispatch::DispatchTable;
use crate::signals::database::{MessageDefinition, SignalDefinition};
use crate::types::Result;

/// Status flags frame
pub const STATUS_FRAME_ID: u32 = 0x615;
/// Controller and motor temperatures
pub const TEMPERATURE_FRAME_ID: u32 = 0x616;
/// Currents, bus voltage, motor speed and throttle
pub const DRIVE_FRAME_ID: u32 = 0x617;
/// Fault and warning bitmap
pub const SYSTEM_ALERTS_FRAME_ID: u32 = 0x003;

const SOURCE: &str = "builtin";

/// Status flags, in bit order starting at bit 0
const STATUS_FLAGS: &[&str] = &[
    "THROTTLE_FLAG",
    "ECO_BOOST",
    "LHM",
    "BRAKE",
    "FORWARD",
    "REVERSE",
    "NEUTRAL",
    "HILLHOLD_FLAG",
    "REGEN_FLAG",
    "DCU_MODE",
    "ASC_FLAG",
    "SHS",
    "SHS_DC_BUS",
    "SHS_12V",
    "SHS_5V",
    "SHS_B_PH",
    "SHS_C_PH",
    "SHS_THROTTLE1",
    "SHS_THROTTLE2",
    "SHS_ENCODER",
    "SHS_MOTOR_TEMP",
    "SHS_CONTROLLER_TEMP1",
    "SHS_CONTROLLER_TEMP2",
    "PC_MODE",
    "START_STOP",
    "IDLE_SHUTDOWN",
];

/// Fault codes, in bit order starting at bit 0 of byte 0
const ALERT_CODES: &[&str] = &[
    // Byte 0
    "CanErr",
    "CtrlrTempCutbackLmtErr",
    "CtrlrTempCutoffLmtErr",
    "CtrlrTempSnsrOcFlt",
    "CtrlrTempSnsrScFlt",
    "DcBusOvErr",
    "DcBusSnsrOcFlt",
    "DcBusSnsrScFlt",
    // Byte 1
    "DcBusUvErr",
    "MtrTempCutbackLmtErr",
    "MtrTempCutoffLmtErr",
    "MtrTempSnsrOcFlt",
    "MtrTempSnsrScFlt",
    "PhBCurrSnsrOcFlt",
    "PhBCurrSnsrOverCurrFlt",
    "PhBCurrSnsrScCurrFlt",
    // Byte 2
    "PhBCurrSnsrScFlt",
    "PhCCurrSnsrOcFlt",
    "PhCCurrSnsrOverCurrFlt",
    "PhCCurrSnsrScCurrFlt",
    "PhCCurrSnsrScFlt",
    "QepFlt",
    "SocLowLmtErr",
    "ThrotLowLmtErr",
    // Byte 3
    "ThrotRedunErr",
    "ThrotStuckErr",
    "ThrotUpLmtErr",
    "UnexpectedParkSenseHighErr",
    "UnintendedAccelerationErr",
    "UnintendedDecelerationErr",
    "DcBusLvErr",
    "ThrotSnsrOcFlt",
    // Byte 4
    "ThrotSnsrScFlt",
    "FnrErr",
    "FnrWarn",
    "Supply12SnsrOcFlt",
    "Supply5SnsrOcFlt",
    "Supply12UvErr",
    "Supply5UvErr",
    "HwOverCurrFlt",
    // Byte 5
    "Type_0_Err",
    "Type_1_Err",
    "Type_2_Err",
    "Type_3_Err",
    "Type_4_Err",
    "QepFlt_2",
    "PhACurrSnsrOverCurrFlt",
    "PhACurrSnsrScCurrFlt",
];

fn flag(name: &str, bit: usize) -> SignalDefinition {
    SignalDefinition::new(name, bit as u16, 1).with_range(0.0, 1.0)
}

fn temperature(name: &str, start_bit: u16) -> SignalDefinition {
    SignalDefinition::new(name, start_bit, 12)
        .with_scaling(0.1, -100.0)
        .with_unit("degC")
}

/// DT007_B001_Status: 26 single-bit mode and sensor health flags
pub fn status_message() -> MessageDefinition {
    STATUS_FLAGS.iter().enumerate().fold(
        MessageDefinition::new(STATUS_FRAME_ID, "DT007_B001_Status", 8).with_source(SOURCE),
        |msg, (bit, name)| msg.with_signal(flag(name, bit)),
    )
}

/// DT008_B002: four 12-bit temperatures
pub fn temperature_message() -> MessageDefinition {
    MessageDefinition::new(TEMPERATURE_FRAME_ID, "DT008_B002", 8)
        .with_source(SOURCE)
        .with_signal(temperature("CONTROLLER_TEMP1", 0))
        .with_signal(temperature("CONTROLLER_TEMP2", 12))
        .with_signal(temperature("CONTROLLER_TEMP", 24))
        .with_signal(temperature("MOTOR_TEMP", 36))
}

/// DT009_B003: drive currents, bus voltage, motor speed, throttle voltage
pub fn drive_message() -> MessageDefinition {
    MessageDefinition::new(DRIVE_FRAME_ID, "DT009_B003", 8)
        .with_source(SOURCE)
        .with_signal(
            SignalDefinition::new("AC_CURRENT", 0, 13)
                .with_scaling(0.1, 0.0)
                .with_range(0.0, 400.0)
                .with_unit("A"),
        )
        .with_signal(
            SignalDefinition::new("DC_CURRENT", 13, 13)
                .with_scaling(0.1, -300.0)
                .with_unit("A"),
        )
        .with_signal(
            SignalDefinition::new("DC_BUS_VOLT", 26, 10)
                .with_scaling(0.1, 0.0)
                .with_range(0.0, 100.0)
                .with_unit("V"),
        )
        .with_signal(
            SignalDefinition::new("MOTOR_SPEED", 36, 18)
                .with_scaling(0.1, -12000.0)
                .with_range(-12000.0, 12000.0)
                .with_unit("rpm"),
        )
        .with_signal(
            SignalDefinition::new("THROTTLE_VOLT", 54, 10)
                .with_scaling(0.01, 0.0)
                .with_unit("V"),
        )
}

/// System alerts: 48 fault and warning bits over 6 bytes
pub fn system_alerts_message() -> MessageDefinition {
    ALERT_CODES.iter().enumerate().fold(
        MessageDefinition::new(SYSTEM_ALERTS_FRAME_ID, "System_Alerts", 6).with_source(SOURCE),
        |msg, (bit, name)| msg.with_signal(flag(name, bit)),
    )
}

/// Every built-in message definition
pub fn messages() -> Vec<MessageDefinition> {
    vec![
        system_alerts_message(),
        status_message(),
        temperature_message(),
        drive_message(),
    ]
}

/// Dispatch table holding only the built-in catalog
pub fn dispatch_table() -> Result<DispatchTable> {
    DispatchTable::from_messages(messages())
}
