//! Core types for the telemetry decoder library
//!
//! This module defines the frame type handed to the dispatcher, the decoded
//! signal type produced by the unpacker, and the two error families: startup
//! errors (bad definitions, unreadable sources) and decode-time errors (bad
//! payloads).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Timestamp type used throughout the decoder
pub type Timestamp = DateTime<Utc>;

/// Result type for decoder operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Largest payload accepted anywhere in the decoder (CAN FD)
pub const MAX_PAYLOAD_LEN: usize = 64;

/// A received CAN frame
///
/// The payload is stored inline so frames can be passed around without
/// touching the heap. Length and data are only set through
/// [`CanFrame::new`], so the valid length never exceeds the buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct CanFrame {
    /// Reception time, when the source provides one
    pub timestamp: Option<Timestamp>,
    /// CAN message ID (11-bit or 29-bit)
    pub can_id: u32,
    /// Number of valid bytes in `data`
    len: u8,
    /// Frame data bytes, only the first `len` are meaningful
    data: [u8; MAX_PAYLOAD_LEN],
    /// True if this is a CAN-FD frame
    pub is_fd: bool,
}

impl CanFrame {
    /// Build a frame from an ID and payload slice
    ///
    /// Payloads longer than [`MAX_PAYLOAD_LEN`] are rejected.
    pub fn new(can_id: u32, payload: &[u8]) -> Result<Self> {
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(DecoderError::InvalidData(format!(
                "payload of {} bytes exceeds the {} byte maximum",
                payload.len(),
                MAX_PAYLOAD_LEN
            )));
        }

        let mut data = [0u8; MAX_PAYLOAD_LEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            timestamp: None,
            can_id,
            len: payload.len() as u8,
            data,
            is_fd: payload.len() > 8,
        })
    }

    /// Attach a reception timestamp
    pub fn with_timestamp(mut self, timestamp: Timestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// The valid payload bytes
    pub fn payload(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Get the data length code (DLC) - number of data bytes
    pub fn dlc(&self) -> usize {
        self.len as usize
    }
}

/// Errors raised while loading definitions or building the dispatch table
///
/// All of these are startup conditions: once a dispatcher exists, decoding
/// never produces a `DecoderError`.
#[derive(Debug, thiserror::Error)]
pub enum DecoderError {
    #[error("Failed to parse log file: {0}")]
    LogParseError(String),

    #[error("Failed to parse DBC file: {0}")]
    DbcParseError(String),

    #[error("Invalid signal definition: {0}")]
    InvalidSignalDefinition(String),

    #[error("Invalid message definition: {0}")]
    InvalidMessageDefinition(String),

    #[error(
        "Signal '{signal}' in message 0x{can_id:X} needs {required} bytes but the message declares {declared}"
    )]
    SignalOutOfBounds {
        can_id: u32,
        signal: String,
        required: usize,
        declared: usize,
    },

    #[error("Duplicate message definition: CAN ID 0x{0:X}")]
    DuplicateMessageId(u32),

    #[error("Duplicate signal '{signal}' in message 0x{can_id:X}")]
    DuplicateSignalName { can_id: u32, signal: String },

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Errors raised while unpacking a single frame
///
/// These are local to one frame: the snapshot is left untouched and the
/// dispatcher carries on with the next frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UnpackError {
    #[error("payload length {actual} does not match expected length {expected}")]
    LengthMismatch { expected: usize, actual: usize },

    #[error("declared length {declared} exceeds the {available} bytes supplied")]
    TruncatedBuffer { declared: usize, available: usize },
}

/// Whether a decoded physical value lies inside its declared range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RangeStatus {
    /// Inside the range, or the signal declares no range
    InRange,
    /// Below the declared minimum
    BelowMin,
    /// Above the declared maximum
    AboveMax,
}

impl RangeStatus {
    pub fn is_out_of_range(self) -> bool {
        !matches!(self, RangeStatus::InRange)
    }
}

impl fmt::Display for RangeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeStatus::InRange => write!(f, "ok"),
            RangeStatus::BelowMin => write!(f, "below min"),
            RangeStatus::AboveMax => write!(f, "above max"),
        }
    }
}

/// One signal decoded out of a payload
///
/// Carries the index of its definition within the owning message instead of
/// the name, so producing one never allocates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodedSignal {
    /// Position of the signal definition within its message
    pub index: usize,
    /// Raw value after sign extension, before scaling
    ///
    /// Wide enough for both signed fields and unsigned 64-bit fields.
    pub raw_value: i128,
    /// Physical value in engineering units
    pub value: f64,
    /// Range check result
    pub range: RangeStatus,
}

impl DecodedSignal {
    pub fn is_out_of_range(&self) -> bool {
        self.range.is_out_of_range()
    }
}
