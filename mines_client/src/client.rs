//! Async front end: runs round operations against the session and keeps the balance
//! in step with the backend.
//!
//! Balance requests are fire-and-forget from the caller's point of view. Each one is
//! spawned onto the runtime and reconciled with its [`SyncTicket`] when it returns;
//! [`MinesClient::flush`] waits for whatever is still outstanding.

use std::sync::{Arc, Mutex, MutexGuard};

use rand::rngs::OsRng;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::balance::{BalanceSnapshot, Reconciliation, SyncTicket};
use crate::cache::{load_json, save_json, LocalStore};
use crate::config::ClientConfig;
use crate::error::{RoundError, WalletError};
use crate::mines::{self, CashOut, RevealOutcome, RoundStarted};
use crate::service::{with_retry, BalanceService, RetryPolicy};
use crate::session::{SessionContext, TransactionLog};
use crate::types::{
    ActiveView, AutoCashout, BalanceKind, BanStatus, HostUser, Transaction, TransactionKind,
    UserProfile, TRANSACTIONS_CACHE_KEY, USER_CACHE_KEY,
};

/// Where a refresh got its data from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncSource {
    Remote,
    Cache,
    /// Remote failed and nothing usable was cached; local state unchanged.
    Unavailable,
}

pub struct MinesClient<S, C> {
    service: Arc<S>,
    store: Arc<C>,
    session: Arc<Mutex<SessionContext>>,
    config: ClientConfig,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

fn lock(session: &Mutex<SessionContext>) -> MutexGuard<'_, SessionContext> {
    session.lock().unwrap_or_else(|e| e.into_inner())
}

fn persist(store: &dyn LocalStore, session: &SessionContext) {
    if let Err(e) = save_json(store, USER_CACHE_KEY, &session.profile()) {
        tracing::warn!(error = %e, "failed to cache profile");
    }
    if let Err(e) = save_json(store, TRANSACTIONS_CACHE_KEY, &session.transactions.entries()) {
        tracing::warn!(error = %e, "failed to cache transactions");
    }
}

fn log_reconciliation(what: &str, outcome: Reconciliation, server_balance: f64) {
    match outcome {
        Reconciliation::Kept => tracing::debug!(what, server_balance, "balance in sync"),
        Reconciliation::Overwritten { previous } => {
            tracing::info!(what, previous, server_balance, "balance corrected from server")
        }
        Reconciliation::Stale => tracing::debug!(what, server_balance, "stale balance response dropped"),
    }
}

impl<S, C> MinesClient<S, C>
where
    S: BalanceService + 'static,
    C: LocalStore + 'static,
{
    pub fn new(service: S, store: C, host: &HostUser, config: ClientConfig) -> Self {
        let mut session = SessionContext::new(UserProfile::from_host(host));
        session.balance = BalanceSnapshot::with_epsilon(0.0, config.balance_epsilon);
        session.transactions = TransactionLog::with_capacity(config.max_transactions);

        Self {
            service: Arc::new(service),
            store: Arc::new(store),
            session: Arc::new(Mutex::new(session)),
            config,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn policy(&self) -> RetryPolicy {
        self.config.retry_policy()
    }

    /// Copy of the current session for rendering.
    pub fn snapshot(&self) -> SessionContext {
        lock(&self.session).clone()
    }

    pub fn balance(&self) -> f64 {
        lock(&self.session).balance.balance()
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        lock(&self.session).transactions.entries().to_vec()
    }

    pub fn next_click_survival_chance(&self) -> f64 {
        lock(&self.session)
            .round
            .as_ref()
            .map(|r| r.next_click_survival_chance())
            .unwrap_or(0.0)
    }

    // =========================================================================
    // STARTUP
    // =========================================================================

    /// Check the ban status, then load profile and history unless the account is banned.
    pub async fn initialize(&self) -> BanStatus {
        let ban = match with_retry(self.policy(), "check_ban_status", || self.service.check_ban_status()).await {
            Ok(ban) => ban,
            Err(e) => {
                tracing::warn!(error = %e, "ban check failed, continuing");
                BanStatus::default()
            }
        };
        lock(&self.session).ban = ban.clone();

        if ban.is_banned {
            tracing::info!(reason = ?ban.reason, until = ?ban.until, "account is banned");
            return ban;
        }

        self.sync_profile().await;
        self.load_transactions().await;
        ban
    }

    // =========================================================================
    // ROUNDS
    // =========================================================================

    pub fn start_round(&self, bet_amount: f64, mine_count: u8) -> Result<RoundStarted, RoundError> {
        let started = {
            let mut session = lock(&self.session);
            let started = mines::start_round(&mut session, bet_amount, mine_count, &mut OsRng)?;
            persist(&*self.store, &session);
            started
        };
        self.spawn_balance_sync(started.ticket, bet_amount, BalanceKind::Bet);
        Ok(started)
    }

    pub fn reveal_cell(&self, index: usize) -> RevealOutcome {
        let outcome = {
            let mut session = lock(&self.session);
            let outcome = mines::reveal_cell(&mut session, index);
            if outcome != RevealOutcome::Ignored {
                persist(&*self.store, &session);
            }
            outcome
        };
        if let RevealOutcome::Settled(cash_out) = &outcome {
            self.spawn_balance_sync(cash_out.ticket, cash_out.payout, BalanceKind::Win);
        }
        outcome
    }

    pub fn cash_out(&self) -> Option<CashOut> {
        let cash_out = {
            let mut session = lock(&self.session);
            let cash_out = mines::cash_out(&mut session)?;
            persist(&*self.store, &session);
            cash_out
        };
        self.spawn_balance_sync(cash_out.ticket, cash_out.payout, BalanceKind::Win);
        Some(cash_out)
    }

    pub fn set_auto_cashout(&self, auto: AutoCashout) {
        lock(&self.session).auto_cashout = auto;
    }

    /// Switch views. Leaving the crash game pulls a fresh profile right away.
    pub fn set_active_view(self: &Arc<Self>, view: ActiveView) {
        let previous = {
            let mut session = lock(&self.session);
            std::mem::replace(&mut session.active_view, view)
        };
        if previous == ActiveView::Crash && view != ActiveView::Crash {
            let client = Arc::clone(self);
            let handle = tokio::spawn(async move {
                client.sync_profile().await;
            });
            self.track(handle);
        }
    }

    fn spawn_balance_sync(&self, ticket: SyncTicket, amount: f64, kind: BalanceKind) {
        let service = Arc::clone(&self.service);
        let store = Arc::clone(&self.store);
        let session = Arc::clone(&self.session);
        let policy = self.policy();

        let handle = tokio::spawn(async move {
            let result = with_retry(policy, "update_balance", || service.update_balance(amount, kind)).await;
            let mut session = lock(&session);
            match result {
                Ok(update) => {
                    let outcome = session.balance.reconcile(ticket, update.new_balance);
                    log_reconciliation("update_balance", outcome, update.new_balance);
                    persist(&*store, &session);
                }
                Err(e) => {
                    session.balance.abandon(ticket);
                    tracing::warn!(?kind, amount, error = %e, "balance sync failed, keeping local value");
                }
            }
        });
        self.track(handle);
    }

    fn track(&self, handle: JoinHandle<()>) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
    }

    /// Wait for every outstanding background sync.
    pub async fn flush(&self) {
        loop {
            let handles: Vec<JoinHandle<()>> = {
                let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.drain(..).collect()
            };
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    tracing::warn!(error = %e, "background sync task failed");
                }
            }
        }
    }

    // =========================================================================
    // WALLET
    // =========================================================================

    pub async fn deposit(&self, amount: f64, method: &str) -> Result<f64, WalletError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let balance = self
            .move_funds(amount, BalanceKind::Deposit, TransactionKind::Deposit, Some(method))
            .await?;
        tracing::info!(amount, method, balance, "deposit completed");
        Ok(balance)
    }

    pub async fn withdraw(&self, amount: f64) -> Result<f64, WalletError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(WalletError::InvalidAmount(amount));
        }
        let available = self.balance();
        if amount > available {
            return Err(WalletError::InsufficientBalance {
                needed: amount,
                available,
            });
        }
        let balance = self
            .move_funds(amount, BalanceKind::Withdraw, TransactionKind::Withdrawal, None)
            .await?;
        tracing::info!(amount, balance, "withdrawal requested");
        Ok(balance)
    }

    /// Optimistic deposit/withdraw. A failed request takes the local delta back out.
    async fn move_funds(
        &self,
        amount: f64,
        kind: BalanceKind,
        tx_kind: TransactionKind,
        method: Option<&str>,
    ) -> Result<f64, WalletError> {
        let delta = kind.signed(amount);
        let ticket = lock(&self.session).balance.apply(delta);

        let result = with_retry(self.policy(), "update_balance", || self.service.update_balance(amount, kind)).await;

        let mut session = lock(&self.session);
        match result {
            Ok(update) => {
                let outcome = session.balance.reconcile(ticket, update.new_balance);
                log_reconciliation("update_balance", outcome, update.new_balance);

                let mut tx = Transaction::completed(session.transactions.next_id(), tx_kind, delta);
                tx.payment_method = method.map(str::to_string);
                session.transactions.prepend(tx);
                persist(&*self.store, &session);
                Ok(session.balance.balance())
            }
            Err(e) => {
                session.balance.revert(ticket, delta);
                tracing::warn!(?kind, amount, error = %e, "wallet operation failed");
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // REFRESH & POLLING
    // =========================================================================

    /// Pull the full profile. Falls back to the cached profile when the backend is down.
    pub async fn sync_profile(&self) -> SyncSource {
        let ticket = lock(&self.session).balance.issue();
        let result = with_retry(self.policy(), "get_profile", || self.service.get_profile()).await;

        let mut session = lock(&self.session);
        match result {
            Ok(profile) => {
                let server_balance = profile.balance;
                let before = session.balance.balance();
                session.merge_profile(profile);
                let outcome = session.balance.reconcile(ticket, server_balance);
                log_reconciliation("get_profile", outcome, server_balance);
                if matches!(outcome, Reconciliation::Overwritten { .. }) && server_balance > before {
                    tracing::info!(credited = server_balance - before, balance = server_balance, "balance topped up");
                }
                persist(&*self.store, &session);
                SyncSource::Remote
            }
            Err(e) => {
                session.balance.abandon(ticket);
                tracing::warn!(error = %e, "profile fetch failed, trying local cache");
                self.restore_profile(&mut session)
            }
        }
    }

    fn restore_profile(&self, session: &mut SessionContext) -> SyncSource {
        match load_json::<UserProfile>(&*self.store, USER_CACHE_KEY) {
            Ok(Some(cached)) if cached.id == session.user.id => {
                let balance = cached.balance;
                session.merge_profile(cached);
                // A live round owns the balance; only a quiet session takes the cached value
                if !session.round_in_progress() && session.balance.is_settled() {
                    session.balance.restore(balance);
                }
                SyncSource::Cache
            }
            Ok(_) => SyncSource::Unavailable,
            Err(e) => {
                tracing::warn!(error = %e, "cached profile unreadable");
                SyncSource::Unavailable
            }
        }
    }

    pub async fn load_transactions(&self) -> SyncSource {
        let result = with_retry(self.policy(), "get_transactions", || self.service.get_transactions()).await;

        let mut session = lock(&self.session);
        match result {
            Ok(transactions) => {
                session.transactions.replace(transactions);
                persist(&*self.store, &session);
                SyncSource::Remote
            }
            Err(e) => {
                tracing::warn!(error = %e, "transaction fetch failed, trying local cache");
                match load_json::<Vec<Transaction>>(&*self.store, TRANSACTIONS_CACHE_KEY) {
                    Ok(Some(cached)) => {
                        if session.transactions.is_empty() {
                            session.transactions.replace(cached);
                        }
                        SyncSource::Cache
                    }
                    Ok(None) => SyncSource::Unavailable,
                    Err(e) => {
                        tracing::warn!(error = %e, "cached transactions unreadable");
                        SyncSource::Unavailable
                    }
                }
            }
        }
    }

    /// One polling pass. Skipped (returns false) during a round, in views with their
    /// own balance cadence, or while a balance request is still in flight.
    pub async fn poll_once(&self) -> bool {
        {
            let session = lock(&self.session);
            if session.round_in_progress()
                || session.active_view.pauses_polling()
                || !session.balance.is_settled()
            {
                return false;
            }
        }
        self.sync_profile().await;
        self.load_transactions().await;
        true
    }

    pub fn spawn_polling(self: &Arc<Self>) -> JoinHandle<()> {
        let client = Arc::clone(self);
        let period = self.config.poll_interval();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // First tick fires immediately; initialize() already did that load
            interval.tick().await;
            loop {
                interval.tick().await;
                if !client.poll_once().await {
                    tracing::trace!("poll skipped");
                }
            }
        })
    }
}
