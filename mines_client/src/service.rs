//! Remote balance/profile API consumed by the client.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::ServiceError;
use crate::types::{BalanceKind, BalanceUpdate, BanStatus, Transaction, UserProfile};

/// Backend that owns the authoritative balance.
#[async_trait]
pub trait BalanceService: Send + Sync {
    async fn get_profile(&self) -> Result<UserProfile, ServiceError>;

    /// Transactions, newest first.
    async fn get_transactions(&self) -> Result<Vec<Transaction>, ServiceError>;

    /// Apply an unsigned `amount` of the given kind and return the resulting balance.
    async fn update_balance(
        &self,
        amount: f64,
        kind: BalanceKind,
    ) -> Result<BalanceUpdate, ServiceError>;

    async fn check_ban_status(&self) -> Result<BanStatus, ServiceError>;
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

/// Run `call` with a per-attempt timeout, retrying transport failures and timeouts.
///
/// `Rejected` errors are returned immediately; the server has already answered.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, what: &str, mut call: F) -> Result<T, ServiceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ServiceError>>,
{
    let attempts = policy.max_attempts.max(1);
    let mut last_err = ServiceError::Transport("no attempt made".to_string());

    for attempt in 1..=attempts {
        let result = match tokio::time::timeout(policy.timeout, call()).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(policy.timeout.as_millis() as u64)),
        };

        match result {
            Ok(value) => return Ok(value),
            Err(err @ ServiceError::Rejected(_)) => return Err(err),
            Err(err) => {
                tracing::debug!(what, attempt, attempts, error = %err, "request failed");
                last_err = err;
            }
        }

        if attempt < attempts {
            tokio::time::sleep(policy.backoff).await;
        }
    }

    Err(last_err)
}
