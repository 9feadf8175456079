//! Log file format parsers
//!
//! Replay sources for recorded bus traffic. Each parser yields `CanFrame`s
//! that can be fed straight into the frame dispatcher.

pub mod candump;

pub use candump::CandumpReader;
