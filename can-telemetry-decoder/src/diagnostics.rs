//! Diagnostic sinks
//!
//! The dispatcher reports what happened to each recognised frame through a
//! [`DiagnosticSink`]. Sinks decide where reports go; the dispatcher never
//! writes to a console itself. Unrecognised frames are not reported.

use crate::config::DecoderConfig;
use crate::signals::database::MessageDefinition;
use crate::types::{DecodedSignal, UnpackError};
use std::collections::HashMap;

/// Receiver for decode reports
///
/// All callbacks default to doing nothing, so a sink only implements what it
/// cares about. Callbacks run inside the frame handling path and should be
/// quick.
pub trait DiagnosticSink {
    /// A message was unpacked and committed to the snapshot
    fn decoded(&mut self, _message: &MessageDefinition, _signals: &[DecodedSignal]) {}

    /// A committed signal fell outside its declared range
    fn out_of_range(&mut self, _message: &MessageDefinition, _signal: &DecodedSignal) {}

    /// A message was rejected; the snapshot was not touched
    fn unpack_failed(&mut self, _message: &MessageDefinition, _error: &UnpackError) {}
}

impl<S: DiagnosticSink + ?Sized> DiagnosticSink for &mut S {
    fn decoded(&mut self, message: &MessageDefinition, signals: &[DecodedSignal]) {
        (**self).decoded(message, signals)
    }

    fn out_of_range(&mut self, message: &MessageDefinition, signal: &DecodedSignal) {
        (**self).out_of_range(message, signal)
    }

    fn unpack_failed(&mut self, message: &MessageDefinition, error: &UnpackError) {
        (**self).unpack_failed(message, error)
    }
}

/// Discards every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl DiagnosticSink for NullSink {}

/// Reports through the `log` facade
#[derive(Debug, Clone, Default)]
pub struct LogSink {
    /// Decides which signals are printed on success
    config: DecoderConfig,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the signal selection from a decoder configuration
    pub fn from_config(config: &DecoderConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }
}

impl DiagnosticSink for LogSink {
    fn decoded(&mut self, message: &MessageDefinition, signals: &[DecodedSignal]) {
        if !log::log_enabled!(log::Level::Debug) {
            return;
        }
        for decoded in signals {
            let Some(signal) = message.signals.get(decoded.index) else {
                continue;
            };
            if self.config.should_log_signal(&signal.name) {
                log::debug!(
                    "{}: {} = {}{}",
                    message.name,
                    signal.name,
                    decoded.value,
                    signal.unit.as_deref().map(|u| format!(" {}", u)).unwrap_or_default()
                );
            }
        }
    }

    fn out_of_range(&mut self, message: &MessageDefinition, decoded: &DecodedSignal) {
        let name = message
            .signals
            .get(decoded.index)
            .map(|s| s.name.as_str())
            .unwrap_or("?");
        log::warn!(
            "{} (0x{:X}): signal {} = {} is {}",
            message.name,
            message.id,
            name,
            decoded.value,
            decoded.range
        );
    }

    fn unpack_failed(&mut self, message: &MessageDefinition, error: &UnpackError) {
        log::warn!(
            "{} (0x{:X}) rejected: {}",
            message.name,
            message.id,
            error
        );
    }
}

/// Out-of-range tally for one signal of one message
#[derive(Debug, Clone, PartialEq)]
pub struct OutOfRangeRecord {
    pub can_id: u32,
    /// Position of the signal within its message
    pub signal_index: usize,
    pub signal: String,
    /// Out-of-range commits seen so far
    pub count: u64,
    /// Value of the most recent one
    pub last_value: f64,
}

/// Rejection tally for one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailureRecord {
    pub can_id: u32,
    /// Rejected frames so far
    pub count: u64,
    /// Error of the most recent rejection
    pub last_error: UnpackError,
}

/// Keeps counters per message and per signal
///
/// Entries are keyed by identifier and signal position, so memory is bounded
/// by the dispatch table no matter how long a replay runs. Useful for tests
/// and for end-of-run summaries.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    /// Messages decoded and committed
    pub decoded: u64,
    out_of_range: HashMap<(u32, usize), OutOfRangeRecord>,
    failures: HashMap<u32, FailureRecord>,
    last_failure: Option<(u32, UnpackError)>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recent rejection, if any
    pub fn last_failure(&self) -> Option<(u32, UnpackError)> {
        self.last_failure
    }

    /// Total rejected frames
    pub fn failure_count(&self) -> u64 {
        self.failures.values().map(|f| f.count).sum()
    }

    /// Total out-of-range signal commits
    pub fn out_of_range_count(&self) -> u64 {
        self.out_of_range.values().map(|r| r.count).sum()
    }

    /// One entry per rejected message, ascending CAN ID
    pub fn failure_records(&self) -> Vec<&FailureRecord> {
        let mut records: Vec<&FailureRecord> = self.failures.values().collect();
        records.sort_unstable_by_key(|r| r.can_id);
        records
    }

    /// One entry per flagged signal, by CAN ID then payload order
    pub fn out_of_range_records(&self) -> Vec<&OutOfRangeRecord> {
        let mut records: Vec<&OutOfRangeRecord> = self.out_of_range.values().collect();
        records.sort_unstable_by_key(|r| (r.can_id, r.signal_index));
        records
    }
}

impl DiagnosticSink for RecordingSink {
    fn decoded(&mut self, _message: &MessageDefinition, _signals: &[DecodedSignal]) {
        self.decoded += 1;
    }

    fn out_of_range(&mut self, message: &MessageDefinition, signal: &DecodedSignal) {
        let record = self
            .out_of_range
            .entry((message.id, signal.index))
            .or_insert_with(|| OutOfRangeRecord {
                can_id: message.id,
                signal_index: signal.index,
                signal: message
                    .signals
                    .get(signal.index)
                    .map(|s| s.name.clone())
                    .unwrap_or_default(),
                count: 0,
                last_value: signal.value,
            });
        record.count += 1;
        record.last_value = signal.value;
    }

    fn unpack_failed(&mut self, message: &MessageDefinition, error: &UnpackError) {
        let record = self.failures.entry(message.id).or_insert(FailureRecord {
            can_id: message.id,
            count: 0,
            last_error: *error,
        });
        record.count += 1;
        record.last_error = *error;
        self.last_failure = Some((message.id, *error));
    }
}
