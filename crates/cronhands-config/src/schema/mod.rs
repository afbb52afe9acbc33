//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod schema_scheduler;

pub use schema_scheduler::*;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// Native-command jobs registered at startup.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

/// Execution history backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Backend name: "memory" or "sqlite".
    #[serde(default = "default_history_backend")]
    pub backend: String,

    /// Database path for the sqlite backend.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_history_backend() -> String {
    "memory".to_string()
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            backend: default_history_backend(),
            path: None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rotated log files. Console only when unset.
    #[serde(default)]
    pub dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: None,
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
