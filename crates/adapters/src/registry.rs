//! Adapter registry - definition name → factory
//!
//! The manager resolves each destination definition through the registry
//! when it starts a router. Unknown names fail there, at startup, never
//! mid-loop.

use std::collections::HashMap;

use ferry_config::{DestinationConfig, DestinationDefinition};

use crate::broker::BrokerAdapter;
use crate::error::AdapterError;
use crate::function::FunctionAdapter;
use crate::objectstore::ObjectStorePutAdapter;
use crate::webhook::WebhookAdapter;
use crate::{Result, SharedAdapter};

/// Factory building an adapter from a destination definition
pub type AdapterFactory = fn(&DestinationDefinition) -> Result<SharedAdapter>;

/// Maps definition names to adapter factories
#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<&'static str, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory under a definition name
    pub fn register(&mut self, name: &'static str, factory: AdapterFactory) {
        self.factories.insert(name, factory);
    }

    /// Whether a definition name is known
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered definition names
    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.factories.keys().copied()
    }

    /// Build the adapter for a destination, validating its settings
    pub fn create(&self, destination: &DestinationConfig) -> Result<SharedAdapter> {
        let name = destination.definition_name();
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| AdapterError::UnknownDefinition(name.to_string()))?;
        factory(&destination.definition)
    }
}

fn webhook_factory(definition: &DestinationDefinition) -> Result<SharedAdapter> {
    match definition {
        DestinationDefinition::Webhook(settings) => {
            Ok(std::sync::Arc::new(WebhookAdapter::new(settings)?))
        }
        _ => Err(AdapterError::config("definition is not a webhook")),
    }
}

fn broker_factory(definition: &DestinationDefinition) -> Result<SharedAdapter> {
    match definition {
        DestinationDefinition::Broker(settings) => {
            Ok(std::sync::Arc::new(BrokerAdapter::new(settings)?))
        }
        _ => Err(AdapterError::config("definition is not a broker")),
    }
}

fn function_factory(definition: &DestinationDefinition) -> Result<SharedAdapter> {
    match definition {
        DestinationDefinition::Function(settings) => {
            Ok(std::sync::Arc::new(FunctionAdapter::new(settings)?))
        }
        _ => Err(AdapterError::config("definition is not a function")),
    }
}

fn object_store_factory(definition: &DestinationDefinition) -> Result<SharedAdapter> {
    match definition {
        DestinationDefinition::ObjectStore(settings) => {
            Ok(std::sync::Arc::new(ObjectStorePutAdapter::new(settings)?))
        }
        _ => Err(AdapterError::config("definition is not an object store")),
    }
}

/// Registry with all built-in adapter kinds
///
/// Warehouse definitions are deliberately absent: the warehouse engine
/// owns them, and the manager routes them away before adapter resolution.
pub fn default_registry() -> AdapterRegistry {
    let mut registry = AdapterRegistry::new();
    registry.register("WEBHOOK", webhook_factory);
    registry.register("BROKER", broker_factory);
    registry.register("FUNCTION", function_factory);
    registry.register("OBJECT_STORE", object_store_factory);
    registry
}

#[cfg(test)]
#[path = "registry_test.rs"]
mod registry_test;
