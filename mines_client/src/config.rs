use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::service::RetryPolicy;
use crate::types::{BALANCE_EPSILON, CURRENCY, MAX_TRANSACTIONS};

/// Client tuning knobs. Every field has a default, so `{}` is a valid config.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClientConfig {
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
    pub balance_epsilon: f64,
    pub currency: String,
    pub max_transactions: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 5_000,
            request_timeout_ms: 10_000,
            max_attempts: 3,
            retry_backoff_ms: 250,
            balance_epsilon: BALANCE_EPSILON,
            currency: CURRENCY.to_string(),
            max_transactions: MAX_TRANSACTIONS,
        }
    }
}

impl ClientConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be positive".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::Invalid("max_attempts must be at least 1".into()));
        }
        if !self.balance_epsilon.is_finite() || self.balance_epsilon < 0.0 {
            return Err(ConfigError::Invalid("balance_epsilon must be a non-negative number".into()));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_millis(self.request_timeout_ms),
            max_attempts: self.max_attempts,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}
