//! In-memory balance backend for integration tests.
//!
//! State lives behind `Arc`s so a test can keep a clone of the service after
//! handing one to the client, and steer balances, delays and failures from there.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use mines_client::{
    BalanceKind, BalanceService, BalanceUpdate, BanStatus, ClientConfig, HostUser, ServiceError,
    Transaction, TransactionKind, UserProfile,
};

pub const USER_ID: u64 = 777;

pub fn host() -> HostUser {
    HostUser {
        id: USER_ID,
        username: Some("tester".to_string()),
        first_name: Some("Test".to_string()),
        last_name: None,
    }
}

/// Route client logs to the test harness output. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_config() -> ClientConfig {
    ClientConfig {
        request_timeout_ms: 100,
        max_attempts: 2,
        retry_backoff_ms: 1,
        ..ClientConfig::default()
    }
}

#[derive(Clone)]
pub struct MockBalanceService {
    balance: Arc<Mutex<f64>>,
    transactions: Arc<Mutex<Vec<Transaction>>>,
    ban: Arc<Mutex<BanStatus>>,
    /// If set, every call fails with this transport error.
    force_error: Arc<Mutex<Option<String>>>,
    /// Per-call delays for `update_balance`, consumed in call order.
    update_delays: Arc<Mutex<VecDeque<Duration>>>,
    pub profile_calls: Arc<AtomicU32>,
    pub update_calls: Arc<AtomicU32>,
}

impl MockBalanceService {
    pub fn new(initial_balance: f64) -> Self {
        Self {
            balance: Arc::new(Mutex::new(initial_balance)),
            transactions: Arc::new(Mutex::new(vec![Transaction::completed(
                1,
                TransactionKind::Deposit,
                initial_balance,
            )])),
            ban: Arc::new(Mutex::new(BanStatus::default())),
            force_error: Arc::new(Mutex::new(None)),
            update_delays: Arc::new(Mutex::new(VecDeque::new())),
            profile_calls: Arc::new(AtomicU32::new(0)),
            update_calls: Arc::new(AtomicU32::new(0)),
        }
    }

    pub fn server_balance(&self) -> f64 {
        *self.balance.lock().unwrap()
    }

    /// Change the authoritative balance behind the client's back (e.g. an external top-up).
    pub fn set_server_balance(&self, balance: f64) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_ban(&self, ban: BanStatus) {
        *self.ban.lock().unwrap() = ban;
    }

    pub fn set_error(&self, msg: &str) {
        *self.force_error.lock().unwrap() = Some(msg.to_string());
    }

    pub fn clear_error(&self) {
        *self.force_error.lock().unwrap() = None;
    }

    pub fn push_update_delay(&self, delay: Duration) {
        self.update_delays.lock().unwrap().push_back(delay);
    }

    fn check_error(&self) -> Result<(), ServiceError> {
        match self.force_error.lock().unwrap().as_ref() {
            Some(msg) => Err(ServiceError::Transport(msg.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl BalanceService for MockBalanceService {
    async fn get_profile(&self) -> Result<UserProfile, ServiceError> {
        self.profile_calls.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        let mut profile = UserProfile::from_host(&host());
        profile.balance = self.server_balance();
        Ok(profile)
    }

    async fn get_transactions(&self) -> Result<Vec<Transaction>, ServiceError> {
        self.check_error()?;
        Ok(self.transactions.lock().unwrap().clone())
    }

    async fn update_balance(
        &self,
        amount: f64,
        kind: BalanceKind,
    ) -> Result<BalanceUpdate, ServiceError> {
        self.update_calls.fetch_add(1, Ordering::SeqCst);
        self.check_error()?;
        let delay = self.update_delays.lock().unwrap().pop_front();

        let new_balance = {
            let mut balance = self.balance.lock().unwrap();
            *balance += kind.signed(amount);
            *balance
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(BalanceUpdate { new_balance })
    }

    async fn check_ban_status(&self) -> Result<BanStatus, ServiceError> {
        self.check_error()?;
        Ok(self.ban.lock().unwrap().clone())
    }
}
