//! Configuration error types

use thiserror::Error;

/// Errors from loading or validating configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid TOML syntax or structure
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value failed cross-field validation
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
