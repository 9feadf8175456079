//! Message Decoding Engine
//!
//! Extracts signal values from raw payloads based on message definitions.
//! A message is unpacked as a unit: the payload length is checked first and,
//! if it fails, nothing is extracted. Out-of-range signals are flagged on the
//! decoded value but never fail the message.

use crate::bitfield;
use crate::config::LengthPolicy;
use crate::signals::database::{MessageDefinition, SignalDefinition, ValueType};
use crate::types::{DecodedSignal, UnpackError};

/// Message decoder - extracts signals from payloads
pub struct MessageDecoder;

impl MessageDecoder {
    /// Unpack every signal of `message_def` into `out`
    ///
    /// `out` is cleared first. On error it stays empty, so a caller can never
    /// see a partially unpacked message. When `out` already has capacity for
    /// the message's signals this does not allocate.
    pub fn unpack_into(
        message_def: &MessageDefinition,
        payload: &[u8],
        policy: LengthPolicy,
        out: &mut Vec<DecodedSignal>,
    ) -> Result<(), UnpackError> {
        out.clear();
        Self::check_length(message_def, payload, policy)?;

        out.extend(
            message_def
                .signals
                .iter()
                .enumerate()
                .map(|(index, signal)| Self::decode_signal(payload, index, signal)),
        );
        Ok(())
    }

    /// Allocating convenience wrapper around [`MessageDecoder::unpack_into`]
    pub fn unpack(
        message_def: &MessageDefinition,
        payload: &[u8],
        policy: LengthPolicy,
    ) -> Result<Vec<DecodedSignal>, UnpackError> {
        let mut out = Vec::with_capacity(message_def.signals.len());
        Self::unpack_into(message_def, payload, policy, &mut out)?;
        Ok(out)
    }

    /// Verify the payload length against the definition
    pub fn check_length(
        message_def: &MessageDefinition,
        payload: &[u8],
        policy: LengthPolicy,
    ) -> Result<(), UnpackError> {
        let accepted = match policy {
            LengthPolicy::Exact => payload.len() == message_def.size,
            LengthPolicy::AtLeast => payload.len() >= message_def.size,
        };

        if accepted {
            Ok(())
        } else {
            Err(UnpackError::LengthMismatch {
                expected: message_def.size,
                actual: payload.len(),
            })
        }
    }

    /// Decode a single signal: extract, sign-extend, scale, range-check
    ///
    /// The payload must already be known to cover the signal.
    pub fn decode_signal(data: &[u8], index: usize, signal: &SignalDefinition) -> DecodedSignal {
        let raw = bitfield::extract(data, signal.start_bit, signal.length, signal.byte_order);

        let raw_value = match signal.value_type {
            ValueType::Unsigned => i128::from(raw),
            ValueType::Signed => i128::from(bitfield::sign_extend(raw, signal.length)),
        };
        let value = signal.to_physical(raw_value);

        DecodedSignal {
            index,
            raw_value,
            value,
            range: signal.range_status(value),
        }
    }
}
