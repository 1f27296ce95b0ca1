//! Tests for error display formatting

use prometheus_resource_guard::ProtectorError;

#[test]
fn test_over_maximum_tokens_display() {
    let err = ProtectorError::OverMaximumTokens {
        requested: 12,
        max: 8,
    };
    assert_eq!(err.to_string(), "requested 12 tokens but the maximum is 8");
}

#[test]
fn test_zero_tokens_display() {
    let err = ProtectorError::ZeroTokens;
    assert_eq!(err.to_string(), "a request must ask for at least one token");
}

#[test]
fn test_invalid_config_display() {
    let err = ProtectorError::InvalidConfig("max_simultaneous must be greater than 0".into());
    assert_eq!(
        err.to_string(),
        "invalid configuration: max_simultaneous must be greater than 0"
    );
}

#[test]
fn test_runtime_error_display() {
    let err = ProtectorError::Runtime("no reactor running".into());
    assert_eq!(
        err.to_string(),
        "no tokio runtime available: no reactor running"
    );
}
