//! Vehicle state snapshot
//!
//! Holds the latest physical value of every signal the dispatch table knows
//! about. Slots are laid out once from the table; after that the only writer
//! is the frame dispatcher, which commits all signals of one message in a
//! single call. Readers get `&VehicleState` and therefore can never observe a
//! message half-way through a commit.

use crate::dispatch::DispatchTable;
use crate::types::{DecodedSignal, RangeStatus, Timestamp};
use serde::Serialize;
use std::collections::HashMap;

/// Latest state of one named signal
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SignalState {
    /// Signal name
    pub name: String,
    /// Engineering unit, if the definition declares one
    pub unit: Option<String>,
    /// Latest physical value; `None` until the first successful decode
    pub value: Option<f64>,
    /// Raw value behind `value`
    pub raw_value: Option<i128>,
    /// Range check of the latest value
    pub range: RangeStatus,
    /// CAN ID of the message that last wrote this slot
    pub last_can_id: Option<u32>,
    /// How many commits have written this slot
    pub update_count: u64,
    /// Snapshot generation of the last write
    pub generation: u64,
    /// Frame timestamp of the last write, when the frame had one
    pub timestamp: Option<Timestamp>,
}

impl SignalState {
    fn empty(name: &str, unit: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            unit,
            value: None,
            raw_value: None,
            range: RangeStatus::InRange,
            last_can_id: None,
            update_count: 0,
            generation: 0,
            timestamp: None,
        }
    }

    /// True once any message carrying this signal has been decoded
    pub fn has_been_decoded(&self) -> bool {
        self.update_count > 0
    }

    pub fn is_out_of_range(&self) -> bool {
        self.range.is_out_of_range()
    }
}

/// Snapshot of every known signal
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleState {
    /// Slots in table order (ascending CAN ID, then payload order)
    signals: Vec<SignalState>,
    /// Signal name -> slot index
    by_name: HashMap<String, usize>,
    /// CAN ID -> slot index for each signal of that message, in signal order
    message_slots: HashMap<u32, Vec<usize>>,
    /// Incremented on every commit
    generation: u64,
}

impl VehicleState {
    /// Lay out one slot per distinct signal name in the table
    pub fn new(table: &DispatchTable) -> Self {
        let mut signals = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut message_slots = HashMap::new();

        for message in table.messages() {
            let slots: Vec<usize> = message
                .signals
                .iter()
                .map(|signal| {
                    *by_name.entry(signal.name.clone()).or_insert_with(|| {
                        signals.push(SignalState::empty(&signal.name, signal.unit.clone()));
                        signals.len() - 1
                    })
                })
                .collect();
            message_slots.insert(message.id, slots);
        }

        Self {
            signals,
            by_name,
            message_slots,
            generation: 0,
        }
    }

    /// Latest physical value of a signal, `None` if unknown or never decoded
    pub fn value(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(|state| state.value)
    }

    /// Full state of a signal
    pub fn get(&self, name: &str) -> Option<&SignalState> {
        self.by_name.get(name).map(|&idx| &self.signals[idx])
    }

    /// Whether a signal has been decoded at least once
    pub fn has_been_decoded(&self, name: &str) -> bool {
        self.get(name).is_some_and(SignalState::has_been_decoded)
    }

    /// All signal slots in table order
    pub fn iter(&self) -> impl Iterator<Item = &SignalState> {
        self.signals.iter()
    }

    /// Number of commits applied so far
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    /// Write every decoded signal of one message
    ///
    /// `decoded` must be the complete unpack result for `can_id`; each entry's
    /// `index` selects the slot through the message's slot map.
    pub(crate) fn commit(
        &mut self,
        can_id: u32,
        decoded: &[DecodedSignal],
        timestamp: Option<Timestamp>,
    ) {
        let Some(slots) = self.message_slots.get(&can_id) else {
            log::warn!("Commit for unknown message 0x{:X} dropped", can_id);
            return;
        };

        self.generation += 1;
        for signal in decoded {
            let Some(&slot) = slots.get(signal.index) else {
                continue;
            };
            let state = &mut self.signals[slot];
            state.value = Some(signal.value);
            state.raw_value = Some(signal.raw_value);
            state.range = signal.range;
            state.last_can_id = Some(can_id);
            state.update_count += 1;
            state.generation = self.generation;
            state.timestamp = timestamp;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signals::database::{MessageDefinition, SignalDefinition};

    fn table() -> DispatchTable {
        DispatchTable::from_messages(vec![
            MessageDefinition::new(0x617, "Drive", 8)
                .with_signal(SignalDefinition::new("AC_CURRENT", 0, 13).with_unit("A"))
                .with_signal(SignalDefinition::new("MOTOR_SPEED", 36, 18)),
            MessageDefinition::new(0x616, "Temps", 8)
                .with_signal(SignalDefinition::new("MOTOR_TEMP", 36, 12)),
        ])
        .unwrap()
    }

    fn decoded(index: usize, value: f64) -> DecodedSignal {
        DecodedSignal {
            index,
            raw_value: value as i128,
            value,
            range: RangeStatus::InRange,
        }
    }

    #[test]
    fn test_slots_start_unset() {
        let state = VehicleState::new(&table());
        assert_eq!(state.len(), 3);
        assert_eq!(state.generation(), 0);
        assert!(!state.has_been_decoded("MOTOR_SPEED"));
        assert_eq!(state.value("MOTOR_SPEED"), None);
        assert_eq!(state.get("AC_CURRENT").unwrap().unit.as_deref(), Some("A"));
        assert!(state.get("UNKNOWN").is_none());

        // Table order: 0x616 first
        let names: Vec<&str> = state.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["MOTOR_TEMP", "AC_CURRENT", "MOTOR_SPEED"]);
    }

    #[test]
    fn test_commit_updates_whole_message() {
        let mut state = VehicleState::new(&table());
        state.commit(0x617, &[decoded(0, 12.0), decoded(1, 1500.0)], None);

        assert_eq!(state.generation(), 1);
        assert_eq!(state.value("AC_CURRENT"), Some(12.0));
        assert_eq!(state.value("MOTOR_SPEED"), Some(1500.0));
        assert_eq!(state.get("MOTOR_SPEED").unwrap().last_can_id, Some(0x617));
        assert_eq!(state.get("MOTOR_SPEED").unwrap().generation, 1);
        assert!(!state.has_been_decoded("MOTOR_TEMP"));
    }

    #[test]
    fn test_commit_for_unknown_message_ignored() {
        let mut state = VehicleState::new(&table());
        let before = state.clone();
        state.commit(0x999, &[decoded(0, 1.0)], None);
        assert_eq!(state, before);
    }
}
