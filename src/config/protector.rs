//! Protector configuration structures.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default hard ceiling on concurrently granted tokens.
fn default_max_tokens() -> u32 {
    1
}

/// Default idle watchdog window in milliseconds: one minute.
fn default_release_timeout_ms() -> u64 {
    60_000
}

/// Configuration for a single [`Protector`](crate::core::protector::Protector).
///
/// # Example
///
/// ```rust
/// use prometheus_resource_guard::config::ProtectorConfig;
///
/// let config = ProtectorConfig::new()
///     .with_max_tokens(8)
///     .with_delay_between_ms(250)
///     .with_release_timeout_ms(30_000);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtectorConfig {
    /// Maximum number of tokens that can be granted concurrently.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Minimum delay between two successive grants, in milliseconds.
    #[serde(default)]
    pub delay_between_ms: u64,

    /// Idle watchdog window in milliseconds: a granted request that is
    /// neither touched nor released within this window is force-released.
    #[serde(default = "default_release_timeout_ms")]
    pub release_timeout_ms: u64,
}

impl Default for ProtectorConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            delay_between_ms: 0,
            release_timeout_ms: default_release_timeout_ms(),
        }
    }
}

impl ProtectorConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum number of concurrently granted tokens.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the minimum delay between grants in milliseconds.
    #[must_use]
    pub fn with_delay_between_ms(mut self, delay_ms: u64) -> Self {
        self.delay_between_ms = delay_ms;
        self
    }

    /// Set the idle watchdog window in milliseconds.
    #[must_use]
    pub fn with_release_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.release_timeout_ms = timeout_ms;
        self
    }

    /// Get the inter-grant delay as a `Duration`.
    #[must_use]
    pub fn delay_between(&self) -> Duration {
        Duration::from_millis(self.delay_between_ms)
    }

    /// Get the idle watchdog window as a `Duration`.
    #[must_use]
    pub fn release_timeout(&self) -> Duration {
        Duration::from_millis(self.release_timeout_ms)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid field.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_tokens == 0 {
            return Err("max_tokens must be greater than 0".into());
        }
        if self.release_timeout_ms == 0 {
            return Err("release_timeout_ms must be greater than 0".into());
        }
        Ok(())
    }
}

/// Root configuration: a set of named protectors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    /// Map of protector name to configuration.
    pub protectors: HashMap<String, ProtectorConfig>,
}

impl GuardConfig {
    /// Validate all protectors and ensure at least one is defined.
    ///
    /// # Errors
    ///
    /// Returns a description of the first invalid entry.
    pub fn validate(&self) -> Result<(), String> {
        if self.protectors.is_empty() {
            return Err("at least one protector must be defined".into());
        }
        for (name, protector) in &self.protectors {
            protector
                .validate()
                .map_err(|e| format!("protector `{name}` invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse guard configuration from a JSON string and validate.
    ///
    /// # Errors
    ///
    /// Returns a description of the parse or validation failure.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }
}
