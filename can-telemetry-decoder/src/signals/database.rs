//! Message and signal definitions
//!
//! Static metadata describing where each signal lives in a payload and how
//! its raw bits scale to engineering units. Definitions come from a
//! definition source (the built-in catalog or a DBC file) and are validated
//! once, when they enter the dispatch table.

use crate::bitfield;
use crate::types::{DecoderError, RangeStatus, Result, MAX_PAYLOAD_LEN};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A complete CAN message definition
#[derive(Debug, Clone, PartialEq)]
pub struct MessageDefinition {
    /// CAN message ID
    pub id: u32,
    /// Message name
    pub name: String,
    /// Expected payload size in bytes
    pub size: usize,
    /// Sender ECU name (optional)
    pub sender: Option<String>,
    /// All signals in this message, in payload order
    pub signals: Vec<SignalDefinition>,
    /// Where the definition came from (catalog name or DBC filename)
    pub source: String,
}

/// A CAN signal definition
#[derive(Debug, Clone, PartialEq)]
pub struct SignalDefinition {
    /// Signal name, unique within its message
    pub name: String,
    /// Start bit in the CAN frame (LSB for Intel, MSB for Motorola)
    pub start_bit: u16,
    /// Length in bits (1-64)
    pub length: u16,
    /// Byte order of the field
    pub byte_order: ByteOrder,
    /// Value type (signed/unsigned)
    pub value_type: ValueType,
    /// Scale factor to convert raw value to physical value
    pub factor: f64,
    /// Offset to add after scaling
    pub offset: f64,
    /// Valid physical range, if the source declares one
    pub range: Option<ValueRange>,
    /// Engineering unit (e.g., "rpm", "°C", "V")
    pub unit: Option<String>,
}

/// Byte order for signal extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Little-endian (Intel format)
    LittleEndian,
    /// Big-endian (Motorola format)
    BigEndian,
}

/// Value type for signal interpretation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueType {
    /// Signed integer (two's complement)
    Signed,
    /// Unsigned integer
    Unsigned,
}

/// Inclusive physical range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Classify a physical value against this range
    pub fn check(&self, value: f64) -> RangeStatus {
        if value < self.min {
            RangeStatus::BelowMin
        } else if value > self.max {
            RangeStatus::AboveMax
        } else {
            RangeStatus::InRange
        }
    }
}

impl SignalDefinition {
    /// Unsigned little-endian signal with unit scaling and no range
    pub fn new(name: impl Into<String>, start_bit: u16, length: u16) -> Self {
        Self {
            name: name.into(),
            start_bit,
            length,
            byte_order: ByteOrder::LittleEndian,
            value_type: ValueType::Unsigned,
            factor: 1.0,
            offset: 0.0,
            range: None,
            unit: None,
        }
    }

    /// Builder method: set byte order
    pub fn with_byte_order(mut self, byte_order: ByteOrder) -> Self {
        self.byte_order = byte_order;
        self
    }

    /// Builder method: mark the signal as two's complement signed
    pub fn signed(mut self) -> Self {
        self.value_type = ValueType::Signed;
        self
    }

    /// Builder method: set factor and offset
    pub fn with_scaling(mut self, factor: f64, offset: f64) -> Self {
        self.factor = factor;
        self.offset = offset;
        self
    }

    /// Builder method: declare a valid physical range
    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.range = Some(ValueRange::new(min, max));
        self
    }

    /// Builder method: set the engineering unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Bytes of payload this signal reaches into
    pub fn required_bytes(&self) -> usize {
        bitfield::required_bytes(self.start_bit, self.length, self.byte_order)
    }

    /// Convert a raw value to engineering units
    pub fn to_physical(&self, raw: i128) -> f64 {
        raw as f64 * self.factor + self.offset
    }

    /// Check a physical value against the declared range
    pub fn range_status(&self, value: f64) -> RangeStatus {
        self.range
            .map(|range| range.check(value))
            .unwrap_or(RangeStatus::InRange)
    }

    /// Reject definitions the decoder cannot honour
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(DecoderError::InvalidSignalDefinition(
                "signal name is empty".to_string(),
            ));
        }
        if !(1..=64).contains(&self.length) {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "signal '{}' has length {}, expected 1-64 bits",
                self.name, self.length
            )));
        }
        if !self.factor.is_finite() || !self.offset.is_finite() {
            return Err(DecoderError::InvalidSignalDefinition(format!(
                "signal '{}' has a non-finite factor or offset",
                self.name
            )));
        }
        if let Some(range) = self.range {
            if range.min.is_nan() || range.max.is_nan() || range.min > range.max {
                return Err(DecoderError::InvalidSignalDefinition(format!(
                    "signal '{}' has an empty range [{}, {}]",
                    self.name, range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

impl MessageDefinition {
    /// Create a message with no signals
    pub fn new(id: u32, name: impl Into<String>, size: usize) -> Self {
        Self {
            id,
            name: name.into(),
            size,
            sender: None,
            signals: Vec::new(),
            source: String::new(),
        }
    }

    /// Builder method: append a signal
    pub fn with_signal(mut self, signal: SignalDefinition) -> Self {
        self.signals.push(signal);
        self
    }

    /// Builder method: record where this definition came from
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Builder method: set the sender node
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }

    /// Find a signal by name
    pub fn signal(&self, name: &str) -> Option<&SignalDefinition> {
        self.signals.iter().find(|s| s.name == name)
    }

    /// Check every signal and confirm all of them fit inside the payload
    pub fn validate(&self) -> Result<()> {
        if self.size > MAX_PAYLOAD_LEN {
            return Err(DecoderError::InvalidMessageDefinition(format!(
                "message '{}' (0x{:X}) declares {} bytes, maximum is {}",
                self.name, self.id, self.size, MAX_PAYLOAD_LEN
            )));
        }

        let mut seen = HashSet::with_capacity(self.signals.len());
        for signal in &self.signals {
            signal.validate()?;

            if !seen.insert(signal.name.as_str()) {
                return Err(DecoderError::DuplicateSignalName {
                    can_id: self.id,
                    signal: signal.name.clone(),
                });
            }

            let required = signal.required_bytes();
            if required > self.size {
                return Err(DecoderError::SignalOutOfBounds {
                    can_id: self.id,
                    signal: signal.name.clone(),
                    required,
                    declared: self.size,
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn motor_speed_message() -> MessageDefinition {
        MessageDefinition::new(0x101, "MotorStatus", 8).with_signal(
            SignalDefinition::new("MOTOR_SPEED", 0, 16)
                .with_scaling(0.1, 0.0)
                .with_unit("rpm"),
        )
    }

    #[test]
    fn test_valid_message() {
        let msg = motor_speed_message();
        assert!(msg.validate().is_ok());
        assert_eq!(msg.signal("MOTOR_SPEED").unwrap().length, 16);
        assert!(msg.signal("MISSING").is_none());
    }

    #[test]
    fn test_signal_past_payload_end() {
        let msg = MessageDefinition::new(0x101, "Short", 2)
            .with_signal(SignalDefinition::new("WIDE", 8, 16));
        match msg.validate() {
            Err(DecoderError::SignalOutOfBounds {
                required, declared, ..
            }) => {
                assert_eq!(required, 3);
                assert_eq!(declared, 2);
            }
            other => panic!("expected SignalOutOfBounds, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_signal_name() {
        let msg = motor_speed_message().with_signal(SignalDefinition::new("MOTOR_SPEED", 16, 8));
        assert!(matches!(
            msg.validate(),
            Err(DecoderError::DuplicateSignalName { .. })
        ));
    }

    #[test]
    fn test_invalid_signal_length() {
        let zero = SignalDefinition::new("ZERO", 0, 0);
        assert!(zero.validate().is_err());

        let too_wide = SignalDefinition::new("WIDE", 0, 65);
        assert!(too_wide.validate().is_err());
    }

    #[test]
    fn test_inverted_range_rejected() {
        let signal = SignalDefinition::new("BAD", 0, 8).with_range(10.0, 0.0);
        assert!(signal.validate().is_err());
    }

    #[test]
    fn test_oversized_message_rejected() {
        let msg = MessageDefinition::new(0x1, "Huge", 65);
        assert!(matches!(
            msg.validate(),
            Err(DecoderError::InvalidMessageDefinition(_))
        ));
    }

    #[test]
    fn test_physical_conversion_and_range() {
        let signal = SignalDefinition::new("TEMP", 0, 12)
            .with_scaling(0.1, -100.0)
            .with_range(-40.0, 150.0);
        assert!((signal.to_physical(0) - -100.0).abs() < 1e-9);
        assert!((signal.to_physical(4095) - 309.5).abs() < 1e-9);
        assert_eq!(signal.range_status(-100.0), RangeStatus::BelowMin);
        assert_eq!(signal.range_status(25.0), RangeStatus::InRange);
        assert_eq!(signal.range_status(309.5), RangeStatus::AboveMax);

        // Bounds are inclusive
        assert_eq!(signal.range_status(-40.0), RangeStatus::InRange);
        assert_eq!(signal.range_status(150.0), RangeStatus::InRange);
        assert_eq!(signal.range_status(-40.000001), RangeStatus::BelowMin);
        assert_eq!(signal.range_status(150.000001), RangeStatus::AboveMax);

        let unbounded = SignalDefinition::new("RAW", 0, 8);
        assert_eq!(unbounded.range_status(1e12), RangeStatus::InRange);
    }
}
