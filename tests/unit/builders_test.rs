//! Tests for building protectors from configuration

use std::collections::HashMap;

use prometheus_resource_guard::builders::build_protectors;
use prometheus_resource_guard::config::{GuardConfig, ProtectorConfig};
use prometheus_resource_guard::{ProtectorError, TokioSpawner};

#[tokio::test]
async fn test_builds_one_protector_per_entry() {
    let mut protectors = HashMap::new();
    protectors.insert("db".to_string(), ProtectorConfig::new().with_max_tokens(4));
    protectors.insert("api".to_string(), ProtectorConfig::new());
    let config = GuardConfig { protectors };

    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let built = build_protectors(&config, spawner).unwrap();

    assert_eq!(built.len(), 2);
    assert_eq!(built["db"].name(), "db");
    assert_eq!(built["db"].stats().max_tokens, 4);
    assert_eq!(built["api"].stats().max_tokens, 1);
}

#[tokio::test]
async fn test_built_protectors_grant_tokens() {
    let mut protectors = HashMap::new();
    protectors.insert("db".to_string(), ProtectorConfig::new().with_max_tokens(4));
    let config = GuardConfig { protectors };

    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let built = build_protectors(&config, spawner).unwrap();

    let receipt = built["db"].submit(2).unwrap();
    assert!(built["db"].wait_until_granted(&receipt).await);
    assert_eq!(built["db"].stats().used_tokens, 2);
}

#[tokio::test]
async fn test_rejects_invalid_configuration() {
    let mut protectors = HashMap::new();
    protectors.insert("db".to_string(), ProtectorConfig::new().with_max_tokens(0));
    let config = GuardConfig { protectors };

    let spawner = TokioSpawner::new(tokio::runtime::Handle::current());
    let result = build_protectors(&config, spawner);
    assert!(matches!(result, Err(ProtectorError::InvalidConfig(_))));
}
