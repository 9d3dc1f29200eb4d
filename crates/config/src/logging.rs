//! Logging configuration

use serde::Deserialize;

/// Logging configuration
///
/// `level` accepts the usual tracing directives ("info",
/// "ferry_router=debug,info", ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level filter directive
    pub level: String,

    /// Emit JSON lines instead of the human-readable format
    pub json: bool,

    /// Include target module paths in log lines
    pub show_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            show_target: false,
        }
    }
}
