//! Logging configuration types.

use serde::{Deserialize, Serialize};

use super::defaults::{default_log_dir, default_log_filename};

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// How often the log file rolls over. Daily keeps the file count low for a
/// server whose log volume is a handful of lines per game.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Structured logging configuration.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Explicit level; when absent the `RUST_LOG` env var applies, falling
    /// back to `info`.
    #[serde(default)]
    pub level: Option<LogLevel>,
    #[serde(default)]
    pub format: LogFormat,
    /// Also write logs to a rolling file under `dir`.
    #[serde(default)]
    pub enable_file_logging: bool,
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_filename")]
    pub filename: String,
    #[serde(default)]
    pub rotation: LogRotation,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: None,
            format: LogFormat::default(),
            enable_file_logging: false,
            dir: default_log_dir(),
            filename: default_log_filename(),
            rotation: LogRotation::default(),
        }
    }
}
