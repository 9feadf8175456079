//! Signal definitions and definition sources
//!
//! This module contains the definition types, the built-in controller
//! catalog and the DBC loader.

pub mod catalog;
pub mod database;
pub mod dbc;

// Re-export key types for convenience
pub use database::{ByteOrder, MessageDefinition, SignalDefinition, ValueRange, ValueType};
