//! Registry tests

use ferry_config::{
    BrokerSettings, DestinationConfig, DestinationDefinition, WebhookSettings,
};

use crate::error::AdapterError;
use crate::registry::default_registry;

fn webhook_destination(endpoint: &str) -> DestinationConfig {
    DestinationConfig {
        id: "dst-1".to_string(),
        name: "webhook".to_string(),
        enabled: true,
        transform_mode: None,
        definition: DestinationDefinition::Webhook(WebhookSettings {
            endpoint: endpoint.to_string(),
            ..Default::default()
        }),
    }
}

#[test]
fn test_default_registry_knows_builtin_kinds() {
    let registry = default_registry();
    for name in ["WEBHOOK", "BROKER", "FUNCTION", "OBJECT_STORE"] {
        assert!(registry.contains(name), "missing {name}");
    }
    assert!(!registry.contains("WAREHOUSE"));
}

#[test]
fn test_create_webhook_adapter() {
    let registry = default_registry();
    let adapter = registry.create(&webhook_destination("https://events.example.com")).unwrap();
    assert_eq!(adapter.name(), "webhook");
}

#[test]
fn test_create_fails_fast_on_bad_settings() {
    let registry = default_registry();
    let result = registry.create(&webhook_destination("not a url"));
    assert!(matches!(result, Err(AdapterError::Config(_))));
}

#[test]
fn test_create_broker_adapter() {
    let registry = default_registry();
    let destination = DestinationConfig {
        id: "dst-2".to_string(),
        name: String::new(),
        enabled: true,
        transform_mode: None,
        definition: DestinationDefinition::Broker(BrokerSettings {
            address: "broker:9092".to_string(),
            topic: "events".to_string(),
            ..Default::default()
        }),
    };
    let adapter = registry.create(&destination).unwrap();
    assert_eq!(adapter.name(), "broker");
}

#[test]
fn test_unknown_definition_is_reported_by_name() {
    let registry = crate::registry::AdapterRegistry::new();
    let result = registry.create(&webhook_destination("https://events.example.com"));
    match result {
        Err(AdapterError::UnknownDefinition(name)) => assert_eq!(name, "WEBHOOK"),
        other => panic!("unexpected: {other:?}"),
    }
}
