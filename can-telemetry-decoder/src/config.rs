//! Decoder configuration types
//!
//! The knobs the frame dispatcher honours at runtime. Everything here is
//! plain data so the application can load it from a config file.

use serde::{Deserialize, Serialize};

/// How strictly payload length is matched against a message definition
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthPolicy {
    /// Payload must be exactly the declared length
    Exact,
    /// Payload must be at least the declared length; trailing bytes are ignored
    #[default]
    AtLeast,
}

/// Configuration for the frame dispatcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    /// Length matching rule applied before any signal is extracted
    #[serde(default)]
    pub length_policy: LengthPolicy,

    /// Optional: only decode these specific CAN message IDs
    #[serde(default)]
    pub message_filter: Option<Vec<u32>>,

    /// Whether successful decodes are reported to the diagnostic sink
    #[serde(default = "default_true")]
    pub report_decoded: bool,

    /// Optional: signals the log sink prints on a successful decode
    #[serde(default)]
    pub logged_signals: Option<Vec<String>>,
}

fn default_true() -> bool {
    true
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            length_policy: LengthPolicy::default(),
            message_filter: None,
            report_decoded: true,
            logged_signals: None,
        }
    }
}

impl DecoderConfig {
    /// Create a new decoder configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the length policy
    pub fn with_length_policy(mut self, policy: LengthPolicy) -> Self {
        self.length_policy = policy;
        self
    }

    /// Builder method: set message filter
    pub fn with_message_filter(mut self, messages: Vec<u32>) -> Self {
        self.message_filter = Some(messages);
        self
    }

    /// Builder method: enable or disable success reports
    pub fn with_decoded_reports(mut self, enabled: bool) -> Self {
        self.report_decoded = enabled;
        self
    }

    /// Builder method: restrict which signals the log sink prints
    pub fn with_logged_signals(mut self, signals: Vec<String>) -> Self {
        self.logged_signals = Some(signals);
        self
    }

    /// Check if a message ID should be processed
    pub fn should_process_message(&self, can_id: u32) -> bool {
        match &self.message_filter {
            Some(messages) => messages.contains(&can_id),
            None => true,
        }
    }

    /// Check if a signal should be written to the log
    pub fn should_log_signal(&self, name: &str) -> bool {
        match &self.logged_signals {
            Some(signals) => signals.iter().any(|s| s == name),
            None => true,
        }
    }
}
