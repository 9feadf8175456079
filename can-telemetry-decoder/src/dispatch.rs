//! Dispatch table
//!
//! Maps frame identifiers to message definitions. Every definition is
//! validated on the way in, so a table that exists only holds messages whose
//! signals fit their payloads. Once handed to a
//! [`FrameDispatcher`](crate::FrameDispatcher) the table is read-only.

use crate::signals::database::{MessageDefinition, SignalDefinition};
use crate::types::{DecoderError, Result};
use std::collections::HashMap;

/// Lookup from CAN ID to message definition
#[derive(Debug, Clone, Default)]
pub struct DispatchTable {
    /// All message definitions by CAN ID
    messages: HashMap<u32, MessageDefinition>,

    /// Signal name lookup for quick access
    /// Key: Signal name, Value: List of (CAN ID, signal index) tuples
    signal_lookup: HashMap<String, Vec<(u32, usize)>>,
}

impl DispatchTable {
    /// Create a new empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from a set of definitions, stopping at the first invalid one
    pub fn from_messages<I>(messages: I) -> Result<Self>
    where
        I: IntoIterator<Item = MessageDefinition>,
    {
        let mut table = Self::new();
        for message in messages {
            table.add_message(message)?;
        }
        Ok(table)
    }

    /// Validate a message definition and add it to the table
    ///
    /// Fails on malformed signals and on identifiers that are already taken.
    pub fn add_message(&mut self, message: MessageDefinition) -> Result<()> {
        message.validate()?;

        if self.messages.contains_key(&message.id) {
            return Err(DecoderError::DuplicateMessageId(message.id));
        }

        let can_id = message.id;
        for (sig_idx, signal) in message.signals.iter().enumerate() {
            let locations = self.signal_lookup.entry(signal.name.clone()).or_default();
            if !locations.is_empty() {
                log::warn!(
                    "Signal '{}' defined by several messages; 0x{:X} shares its snapshot slot",
                    signal.name,
                    can_id
                );
            }
            locations.push((can_id, sig_idx));
        }

        log::debug!(
            "Registered message {} (ID 0x{:X}, {} bytes, {} signals)",
            message.name,
            can_id,
            message.size,
            message.signals.len()
        );
        self.messages.insert(can_id, message);
        Ok(())
    }

    /// Get the message definition for a CAN ID
    pub fn get_message(&self, can_id: u32) -> Option<&MessageDefinition> {
        self.messages.get(&can_id)
    }

    /// Find all messages containing a specific signal name
    pub fn find_signal(&self, signal_name: &str) -> Vec<(u32, &SignalDefinition)> {
        self.signal_lookup
            .get(signal_name)
            .map(|locations| {
                locations
                    .iter()
                    .filter_map(|(can_id, sig_idx)| {
                        self.get_message(*can_id)
                            .and_then(|msg| msg.signals.get(*sig_idx))
                            .map(|sig| (*can_id, sig))
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Messages in ascending CAN ID order
    pub fn messages(&self) -> Vec<&MessageDefinition> {
        let mut messages: Vec<&MessageDefinition> = self.messages.values().collect();
        messages.sort_unstable_by_key(|msg| msg.id);
        messages
    }

    /// Get all CAN IDs in the table, sorted
    pub fn get_all_can_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.messages.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Signal count of the widest message; sizes the unpack scratch buffer
    pub fn max_signal_count(&self) -> usize {
        self.messages
            .values()
            .map(|msg| msg.signals.len())
            .max()
            .unwrap_or(0)
    }

    /// Get table statistics
    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            num_messages: self.messages.len(),
            num_signals: self.messages.values().map(|msg| msg.signals.len()).sum(),
            num_unique_signals: self.signal_lookup.len(),
        }
    }
}

/// Table statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseStats {
    /// Total number of message definitions
    pub num_messages: usize,
    /// Total number of signal definitions
    pub num_signals: usize,
    /// Distinct signal names (snapshot slots)
    pub num_unique_signals: usize,
}
