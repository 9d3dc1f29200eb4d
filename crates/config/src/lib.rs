//! Ferry Configuration
//!
//! TOML-based configuration loading with sensible defaults.
//! Minimal config should just work - only specify what you need to change.
//!
//! # Example Minimal Config
//!
//! ```toml
//! [[sources]]
//! id = "src-1"
//! workspace_id = "ws-1"
//!
//! [[sources.destinations]]
//! id = "dst-1"
//! name = "main webhook"
//!
//! [sources.destinations.definition]
//! type = "webhook"
//! endpoint = "https://events.example.com/v1/batch"
//! ```
//!
//! # Environment
//!
//! A small set of environment variables override file values:
//! `INSTANCE_ID`, `WORKSPACE_NAMESPACE`, `STATSD_SERVER_URL`,
//! `JOBS_BACKUP_STORAGE_PROVIDER`, `JOBS_BACKUP_BUCKET`.

mod destinations;
mod error;
mod logging;
mod router;
mod stash;
mod store;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use destinations::{
    BrokerSettings, DestinationConfig, DestinationDefinition, FunctionSettings,
    ObjectStoreSettings, SourceConfig, WarehouseSettings, WebhookSettings,
};
pub use error::{ConfigError, Result};
pub use logging::LogConfig;
pub use router::{RouterConfig, TransformerConfig};
pub use stash::{BackupConfig, StashConfig};
pub use store::StoreConfig;

/// Main configuration structure
///
/// All sections are optional with sensible defaults, except `sources`,
/// which describes the enabled source → destination topology.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Instance identifier, part of stash file names
    pub instance_id: String,

    /// Optional namespace prefixing workspace ids in reports
    pub workspace_namespace: String,

    /// StatsD endpoint for the stats sink, if any
    pub statsd_server_url: String,

    /// Logging configuration
    pub log: LogConfig,

    /// Job store call tuning
    pub store: StoreConfig,

    /// Router tuning knobs shared by all destination routers
    pub router: RouterConfig,

    /// Error stash configuration
    pub stash: StashConfig,

    /// Source → destination topology
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Load configuration from a TOML file and apply env overrides
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut config: Config = contents.parse()?;
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Overlay recognized environment variables onto the parsed config
    pub fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("INSTANCE_ID") {
            self.instance_id = v;
        }
        if let Ok(v) = std::env::var("WORKSPACE_NAMESPACE") {
            self.workspace_namespace = v;
        }
        if let Ok(v) = std::env::var("STATSD_SERVER_URL") {
            self.statsd_server_url = v;
        }
        if let Ok(v) = std::env::var("JOBS_BACKUP_STORAGE_PROVIDER") {
            self.stash.backup.provider = v;
        }
        if let Ok(v) = std::env::var("JOBS_BACKUP_BUCKET") {
            self.stash.backup.bucket = v;
        }
        if self.instance_id.is_empty() {
            self.instance_id = "1".to_string();
        }
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate(self)
    }

    /// All enabled destinations across enabled sources
    pub fn enabled_destinations(&self) -> impl Iterator<Item = (&SourceConfig, &DestinationConfig)> {
        self.sources
            .iter()
            .filter(|s| s.enabled)
            .flat_map(|s| s.destinations.iter().filter(|d| d.enabled).map(move |d| (s, d)))
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}
