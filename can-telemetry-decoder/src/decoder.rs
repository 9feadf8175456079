//! Frame dispatcher
//!
//! The entry point of the library. A [`FrameDispatcher`] owns the dispatch
//! table, the vehicle state snapshot and a diagnostic sink. Each call to
//! [`FrameDispatcher::decode`] handles one frame to completion:
//!
//! 1. Look up the frame identifier; unknown identifiers are ignored.
//! 2. Unpack the payload into a scratch buffer sized when the dispatcher was
//!    built, so the hot path never allocates.
//! 3. On success, commit every signal of the message to the snapshot in one
//!    step and report to the sink. On failure, report and leave the snapshot
//!    alone.
//!
//! The dispatcher is the only writer of its snapshot. Readers borrow it
//! through [`FrameDispatcher::state`].

use crate::config::DecoderConfig;
use crate::diagnostics::{DiagnosticSink, NullSink};
use crate::dispatch::DispatchTable;
use crate::message_decoder::MessageDecoder;
use crate::state::VehicleState;
use crate::types::{CanFrame, DecodedSignal, Timestamp, UnpackError};
use serde::Serialize;

/// What happened to one frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Identifier not in the table (or filtered out); nothing happened
    Ignored,
    /// Message committed to the snapshot
    Decoded {
        /// Signals written
        signals: usize,
        /// How many of them were outside their declared range
        out_of_range: usize,
    },
    /// Message rejected; snapshot unchanged
    Rejected(UnpackError),
}

/// Running counters kept by the dispatcher
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    /// Frames handed to the dispatcher
    pub frames_seen: u64,
    /// Frames with no matching definition
    pub ignored: u64,
    /// Frames decoded and committed
    pub decoded: u64,
    /// Frames rejected by the unpacker
    pub rejected: u64,
    /// Signals committed with out-of-range values
    pub out_of_range_signals: u64,
}

/// The main decoder struct - entry point for all decoding operations
pub struct FrameDispatcher<S = NullSink> {
    table: DispatchTable,
    state: VehicleState,
    config: DecoderConfig,
    sink: S,
    /// Unpack result set, reused for every frame
    scratch: Vec<DecodedSignal>,
    stats: DispatchStats,
}

impl FrameDispatcher<NullSink> {
    /// Dispatcher with default configuration and no diagnostics
    pub fn new(table: DispatchTable) -> Self {
        Self::with_sink(table, DecoderConfig::default(), NullSink)
    }
}

impl<S: DiagnosticSink> FrameDispatcher<S> {
    /// Create a dispatcher that reports to `sink`
    ///
    /// Takes ownership of the table; it cannot change after this point.
    pub fn with_sink(table: DispatchTable, config: DecoderConfig, sink: S) -> Self {
        let state = VehicleState::new(&table);
        let scratch = Vec::with_capacity(table.max_signal_count());

        log::info!(
            "Frame dispatcher ready: {} messages, {} signals",
            table.stats().num_messages,
            state.len()
        );

        Self {
            table,
            state,
            config,
            sink,
            scratch,
            stats: DispatchStats::default(),
        }
    }

    /// Decode one received frame
    ///
    /// `length` is the number of valid bytes at the start of `payload`. The
    /// returned outcome is informational; callers that only care about the
    /// snapshot can drop it.
    pub fn decode(&mut self, can_id: u32, payload: &[u8], length: u8) -> DispatchOutcome {
        let length = length as usize;
        match payload.get(..length) {
            Some(valid) => self.dispatch(can_id, Ok(valid), None),
            None => self.dispatch(
                can_id,
                Err(UnpackError::TruncatedBuffer {
                    declared: length,
                    available: payload.len(),
                }),
                None,
            ),
        }
    }

    /// Decode a frame, stamping committed signals with its timestamp
    pub fn decode_frame(&mut self, frame: &CanFrame) -> DispatchOutcome {
        self.dispatch(frame.can_id, Ok(frame.payload()), frame.timestamp)
    }

    fn dispatch(
        &mut self,
        can_id: u32,
        payload: Result<&[u8], UnpackError>,
        timestamp: Option<Timestamp>,
    ) -> DispatchOutcome {
        self.stats.frames_seen += 1;

        let message_def = match self.table.get_message(can_id) {
            Some(def) if self.config.should_process_message(can_id) => def,
            _ => {
                log::trace!("Unknown CAN ID: 0x{:X}, ignoring", can_id);
                self.stats.ignored += 1;
                return DispatchOutcome::Ignored;
            }
        };

        let unpacked = payload.and_then(|data| {
            MessageDecoder::unpack_into(message_def, data, self.config.length_policy, &mut self.scratch)
        });

        if let Err(error) = unpacked {
            log::debug!(
                "Rejected message: {} (ID 0x{:X}): {}",
                message_def.name,
                can_id,
                error
            );
            self.stats.rejected += 1;
            self.sink.unpack_failed(message_def, &error);
            return DispatchOutcome::Rejected(error);
        }

        self.state.commit(can_id, &self.scratch, timestamp);

        let mut out_of_range = 0;
        for signal in self.scratch.iter().filter(|s| s.is_out_of_range()) {
            out_of_range += 1;
            self.sink.out_of_range(message_def, signal);
        }
        if self.config.report_decoded {
            self.sink.decoded(message_def, &self.scratch);
        }

        log::debug!(
            "Decoded message: {} (ID 0x{:X}), {} signals",
            message_def.name,
            can_id,
            self.scratch.len()
        );
        self.stats.decoded += 1;
        self.stats.out_of_range_signals += out_of_range as u64;

        DispatchOutcome::Decoded {
            signals: self.scratch.len(),
            out_of_range,
        }
    }

    /// Read access to the snapshot
    pub fn state(&self) -> &VehicleState {
        &self.state
    }

    /// The dispatch table in use
    pub fn table(&self) -> &DispatchTable {
        &self.table
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Counters since construction
    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Tear down, keeping the final snapshot and the sink
    pub fn into_parts(self) -> (VehicleState, S) {
        (self.state, self.sink)
    }
}
