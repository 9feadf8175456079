//! DBC file parser
//!
//! Parses Vector DBC files and converts them into message definitions.
//! Multiplexed signals are skipped: the dispatcher decodes every signal of a
//! message on every frame, which does not hold for multiplexed layouts.

use crate::signals::database::{
    ByteOrder, MessageDefinition, SignalDefinition, ValueRange, ValueType,
};
use crate::types::{DecoderError, Result};
use std::path::Path;

/// Extended-frame flag DBC files set on 29-bit identifiers
const EXTENDED_ID_FLAG: u32 = 0x8000_0000;

/// Parse a DBC file and return message definitions
pub fn parse_dbc_file(path: &Path) -> Result<Vec<MessageDefinition>> {
    log::info!("Parsing DBC file: {:?}", path);

    let bytes = std::fs::read(path).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to read file {:?}: {}", path, e))
    })?;

    // Try UTF-8 first, then fall back to Latin-1 (compatible with Windows-1252)
    let content = match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => {
            log::warn!("DBC file is not UTF-8, trying Latin-1 encoding");
            err.into_bytes().iter().map(|&b| b as char).collect()
        }
    };

    let source = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown.dbc");

    let messages = parse_dbc_str(&content, source)?;
    log::info!("Parsed {} messages from {:?}", messages.len(), path);
    Ok(messages)
}

/// Parse DBC text; `source` is recorded on every definition
pub fn parse_dbc_str(content: &str, source: &str) -> Result<Vec<MessageDefinition>> {
    let dbc = can_dbc::DBC::from_slice(content.as_bytes()).map_err(|e| {
        DecoderError::DbcParseError(format!("Failed to parse DBC {}: {:?}", source, e))
    })?;

    dbc.messages()
        .iter()
        .map(|dbc_msg| convert_message(dbc_msg, source))
        .collect()
}

/// Convert a can-dbc message to our MessageDefinition
fn convert_message(dbc_msg: &can_dbc::Message, source: &str) -> Result<MessageDefinition> {
    let mut signals = Vec::new();

    for dbc_sig in dbc_msg.signals() {
        match *dbc_sig.multiplexer_indicator() {
            can_dbc::MultiplexIndicator::MultiplexedSignal(_)
            | can_dbc::MultiplexIndicator::MultiplexorAndMultiplexedSignal(_) => {
                log::warn!(
                    "Skipping multiplexed signal '{}' in message '{}'",
                    dbc_sig.name(),
                    dbc_msg.message_name()
                );
            }
            _ => signals.push(convert_signal(dbc_sig)?),
        }
    }

    Ok(MessageDefinition {
        id: dbc_msg.message_id().0 & !EXTENDED_ID_FLAG,
        name: dbc_msg.message_name().to_string(),
        size: *dbc_msg.message_size() as usize,
        sender: match dbc_msg.transmitter() {
            can_dbc::Transmitter::NodeName(name) => Some(name.to_string()),
            _ => None,
        },
        signals,
        source: source.to_string(),
    })
}

/// Convert a can-dbc signal to our SignalDefinition
fn convert_signal(dbc_sig: &can_dbc::Signal) -> Result<SignalDefinition> {
    let byte_order = match *dbc_sig.byte_order() {
        can_dbc::ByteOrder::LittleEndian => ByteOrder::LittleEndian,
        can_dbc::ByteOrder::BigEndian => ByteOrder::BigEndian,
    };

    let value_type = match *dbc_sig.value_type() {
        can_dbc::ValueType::Signed => ValueType::Signed,
        can_dbc::ValueType::Unsigned => ValueType::Unsigned,
    };

    let to_u16 = |value: u64, what: &str| {
        u16::try_from(value).map_err(|_| {
            DecoderError::InvalidSignalDefinition(format!(
                "signal '{}' has {} {} out of range",
                dbc_sig.name(),
                what,
                value
            ))
        })
    };

    // [0|0] is how DBC spells "no range"
    let (min, max) = (*dbc_sig.min(), *dbc_sig.max());
    let range = if min == 0.0 && max == 0.0 {
        None
    } else {
        Some(ValueRange::new(min, max))
    };

    Ok(SignalDefinition {
        name: dbc_sig.name().to_string(),
        start_bit: to_u16(*dbc_sig.start_bit(), "start bit")?,
        length: to_u16(*dbc_sig.signal_size(), "size")?,
        byte_order,
        value_type,
        factor: *dbc_sig.factor(),
        offset: *dbc_sig.offset(),
        range,
        unit: if dbc_sig.unit().is_empty() {
            None
        } else {
            Some(dbc_sig.unit().to_string())
        },
    })
}
