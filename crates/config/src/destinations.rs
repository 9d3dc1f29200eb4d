//! Source → destination topology configuration
//!
//! Mirrors the backend-config shape: sources own destinations, each
//! destination binds a definition (an adapter kind plus its settings).
//! Destination-definition settings are plain records; the adapter
//! constructors validate them and fail fast at router startup.

use serde::Deserialize;
use std::collections::HashMap;

/// A configured event source
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub id: String,

    #[serde(default)]
    pub workspace_id: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Transient sources are never backed up by the error stash
    #[serde(default)]
    pub transient: bool,

    #[serde(default)]
    pub destinations: Vec<DestinationConfig>,
}

/// A configured destination bound to one definition
#[derive(Debug, Clone, Deserialize)]
pub struct DestinationConfig {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Remote transform applied before dispatch: "router" (1:N rewrite),
    /// "batch" (N:1 aggregation) or absent for raw dispatch
    #[serde(default)]
    pub transform_mode: Option<String>,

    pub definition: DestinationDefinition,
}

impl DestinationConfig {
    /// Definition name keying the adapter registry and the job
    /// `custom_val` filter
    pub fn definition_name(&self) -> &'static str {
        self.definition.name()
    }
}

/// Destination definition: adapter kind plus its settings
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationDefinition {
    /// Plain HTTP/REST delivery
    Webhook(WebhookSettings),

    /// Streaming broker producer (length-prefixed TCP framing)
    Broker(BrokerSettings),

    /// Serverless function invocation over HTTP
    Function(FunctionSettings),

    /// Object-store upload, used by the batch flavor
    ObjectStore(ObjectStoreSettings),

    /// Warehouse destinations are owned by the warehouse engine
    Warehouse(WarehouseSettings),
}

impl DestinationDefinition {
    /// Stable definition name, also used as the job custom-val tag
    pub fn name(&self) -> &'static str {
        match self {
            Self::Webhook(_) => "WEBHOOK",
            Self::Broker(_) => "BROKER",
            Self::Function(_) => "FUNCTION",
            Self::ObjectStore(_) => "OBJECT_STORE",
            Self::Warehouse(_) => "WAREHOUSE",
        }
    }
}

/// HTTP/REST destination settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WebhookSettings {
    pub endpoint: String,
    pub method: Option<String>,
    pub headers: HashMap<String, String>,
    /// Bearer token or api key sent as Authorization
    pub auth_token: Option<String>,
}

/// Streaming broker destination settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    /// host:port of the broker frontend
    pub address: String,
    pub topic: String,
    pub connection_timeout_secs: Option<u64>,
    pub tcp_keepalive: Option<bool>,
}

/// Function-invoke destination settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FunctionSettings {
    pub url: String,
    pub function_name: String,
    /// Invoke many events per call instead of one
    pub batched: bool,
}

/// Object-store destination settings
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ObjectStoreSettings {
    /// "local" or "http"
    pub provider: String,
    pub bucket: String,
    pub prefix: String,
    /// Filesystem root (local) or base URL (http)
    pub endpoint: String,
}

/// Warehouse settings are opaque to the router
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WarehouseSettings {
    pub warehouse: String,
}

fn default_true() -> bool {
    true
}
