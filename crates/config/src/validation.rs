//! Cross-field configuration validation
//!
//! Validation that spans sections lives here; single-value parsing errors
//! are caught by serde during deserialization.

use std::collections::HashSet;

use crate::{Config, ConfigError, DestinationDefinition, Result};

pub(crate) fn validate(config: &Config) -> Result<()> {
    if config.router.num_workers == 0 {
        return Err(ConfigError::Invalid("router.num_workers must be > 0".into()));
    }
    if config.router.worker_queue_size == 0 {
        return Err(ConfigError::Invalid(
            "router.worker_queue_size must be > 0".into(),
        ));
    }
    if config.router.batch_size == 0 {
        return Err(ConfigError::Invalid("router.batch_size must be > 0".into()));
    }
    if config.router.payload_limit_bytes <= 0 {
        return Err(ConfigError::Invalid(
            "router.payload_limit_bytes must be > 0".into(),
        ));
    }
    if config.router.db_read_batch_size == 0 {
        return Err(ConfigError::Invalid(
            "router.db_read_batch_size must be > 0".into(),
        ));
    }
    if !(0.0..=1.0).contains(&config.router.throttle_factor) {
        return Err(ConfigError::Invalid(
            "router.throttle_factor must be within [0, 1]".into(),
        ));
    }
    if config.stash.num_workers == 0 {
        return Err(ConfigError::Invalid("stash.num_workers must be > 0".into()));
    }

    let mut seen = HashSet::new();
    for source in &config.sources {
        if source.id.is_empty() {
            return Err(ConfigError::Invalid("source id must not be empty".into()));
        }
        for dest in &source.destinations {
            if dest.id.is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "destination of source {} has an empty id",
                    source.id
                )));
            }
            if !seen.insert(dest.id.clone()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate destination id: {}",
                    dest.id
                )));
            }
            validate_definition(dest.id.as_str(), &dest.definition)?;
        }
    }

    Ok(())
}

fn validate_definition(dest_id: &str, definition: &DestinationDefinition) -> Result<()> {
    let missing = |field: &str| {
        ConfigError::Invalid(format!("destination {dest_id}: {field} must not be empty"))
    };
    match definition {
        DestinationDefinition::Webhook(s) => {
            if s.endpoint.is_empty() {
                return Err(missing("webhook endpoint"));
            }
        }
        DestinationDefinition::Broker(s) => {
            if s.address.is_empty() {
                return Err(missing("broker address"));
            }
            if s.topic.is_empty() {
                return Err(missing("broker topic"));
            }
        }
        DestinationDefinition::Function(s) => {
            if s.url.is_empty() {
                return Err(missing("function url"));
            }
        }
        DestinationDefinition::ObjectStore(s) => {
            if s.bucket.is_empty() {
                return Err(missing("object-store bucket"));
            }
        }
        DestinationDefinition::Warehouse(_) => {}
    }
    Ok(())
}
