//! Tests for configuration validation

use std::collections::HashMap;
use std::time::Duration;

use prometheus_resource_guard::config::{GuardConfig, ProtectorConfig};

#[test]
fn test_protector_config_defaults_validate() {
    let config = ProtectorConfig::new();
    assert!(config.validate().is_ok());
    assert_eq!(config.max_tokens, 1);
    assert_eq!(config.delay_between(), Duration::ZERO);
    assert_eq!(config.release_timeout(), Duration::from_secs(60));
}

#[test]
fn test_protector_config_invalid_max_tokens() {
    let config = ProtectorConfig::new().with_max_tokens(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_protector_config_invalid_release_timeout() {
    let config = ProtectorConfig::new().with_release_timeout_ms(0);
    assert!(config.validate().is_err());
}

#[test]
fn test_protector_config_builder_round_trip() {
    let config = ProtectorConfig::new()
        .with_max_tokens(16)
        .with_delay_between_ms(250)
        .with_release_timeout_ms(30_000);

    assert_eq!(config.max_tokens, 16);
    assert_eq!(config.delay_between(), Duration::from_millis(250));
    assert_eq!(config.release_timeout(), Duration::from_secs(30));
}

#[test]
fn test_guard_config_requires_at_least_one_protector() {
    let config = GuardConfig {
        protectors: HashMap::new(),
    };
    assert!(config.validate().is_err());
}

#[test]
fn test_guard_config_reports_the_invalid_entry() {
    let mut protectors = HashMap::new();
    protectors.insert("db".to_string(), ProtectorConfig::new().with_max_tokens(0));
    let config = GuardConfig { protectors };

    let err = config.validate().unwrap_err();
    assert!(err.contains("db"));
}

#[test]
fn test_guard_config_from_json() {
    let json = r#"{
        "protectors": {
            "storage": {
                "max_tokens": 8,
                "delay_between_ms": 100,
                "release_timeout_ms": 30000
            },
            "api": {}
        }
    }"#;

    let config = GuardConfig::from_json_str(json).unwrap();
    assert_eq!(config.protectors.len(), 2);
    assert_eq!(config.protectors["storage"].max_tokens, 8);
    assert_eq!(config.protectors["api"].max_tokens, 1);
}

#[test]
fn test_guard_config_from_json_rejects_invalid_entries() {
    let json = r#"{
        "protectors": {
            "storage": { "max_tokens": 0 }
        }
    }"#;

    assert!(GuardConfig::from_json_str(json).is_err());
}
