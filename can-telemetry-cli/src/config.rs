//! Configuration loading and parsing

use anyhow::{Context, Result};
use can_telemetry_decoder::DecoderConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main application configuration (loaded from config.toml)
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct InputConfig {
    /// candump logs to replay, in order
    #[serde(default)]
    pub logs: Vec<PathBuf>,
    /// DBC files adding message definitions
    #[serde(default)]
    pub dbc_files: Vec<PathBuf>,
    /// Include the built-in controller catalog
    #[serde(default = "default_true")]
    pub builtin_catalog: bool,
    /// Stop after this many frames (across all logs)
    #[serde(default)]
    pub max_frames: Option<usize>,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            logs: Vec::new(),
            dbc_files: Vec::new(),
            builtin_catalog: true,
            max_frames: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
    /// Write the report here instead of stdout
    pub file: Option<PathBuf>,
    /// Also list signals that were never decoded
    #[serde(default)]
    pub show_unset: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

fn default_true() -> bool {
    true
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}
