//! CAN Telemetry Decoder Library
//!
//! Decodes bus frames from a vehicle/motor controller into named
//! engineering-unit values and keeps the latest value of every signal in a
//! snapshot that downstream consumers read.
//!
//! # Architecture
//!
//! Decoding is data driven. Message and signal layouts are plain definitions
//! (from the built-in catalog or a DBC file) collected into a
//! [`DispatchTable`]. The [`FrameDispatcher`] looks each incoming frame up in
//! that table, unpacks the whole message and commits it to the
//! [`VehicleState`] snapshot in one step:
//!
//! - Unknown identifiers are ignored
//! - Payloads of the wrong length are rejected without touching the snapshot
//! - Out-of-range signals are committed and reported, never dropped
//! - Malformed definitions are caught when the table is built
//!
//! Reports go to an injected [`DiagnosticSink`]; the library only logs
//! through the `log` facade and never installs a logger.
//!
//! # Example Usage
//!
//! ```no_run
//! use can_telemetry_decoder::{catalog, DecoderConfig, FrameDispatcher, LogSink};
//!
//! let table = catalog::dispatch_table().unwrap();
//! let config = DecoderConfig::new();
//! let sink = LogSink::from_config(&config);
//! let mut dispatcher = FrameDispatcher::with_sink(table, config, sink);
//!
//! // Called from the bus driver for every received frame
//! dispatcher.decode(0x617, &[0x10, 0x27, 0, 0, 0x80, 0xF5, 0x20, 0], 8);
//!
//! if let Some(speed) = dispatcher.state().value("MOTOR_SPEED") {
//!     println!("Motor speed: {speed} rpm");
//! }
//! ```

// Public modules
pub mod bitfield;
pub mod config;
pub mod decoder;
pub mod diagnostics;
pub mod dispatch;
pub mod formats;
pub mod message_decoder;
pub mod signals;
pub mod state;
pub mod types;

// Re-export main types for convenience
pub use config::{DecoderConfig, LengthPolicy};
pub use decoder::{DispatchOutcome, DispatchStats, FrameDispatcher};
pub use diagnostics::{DiagnosticSink, LogSink, NullSink, RecordingSink};
pub use dispatch::{DatabaseStats, DispatchTable};
pub use signals::{catalog, ByteOrder, MessageDefinition, SignalDefinition, ValueRange, ValueType};
pub use state::{SignalState, VehicleState};
pub use types::{
    CanFrame, DecodedSignal, DecoderError, RangeStatus, Result, Timestamp, UnpackError,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
