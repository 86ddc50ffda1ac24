//! Explicit per-user session state shared by the round engine and the sync layer.

use crate::balance::BalanceSnapshot;
use crate::mines::MinesRound;
use crate::types::{
    ActiveView, AutoCashout, BanStatus, Transaction, TransactionKind, UserProfile, MAX_TRANSACTIONS,
};

/// Newest-first transaction history with a fixed capacity.
#[derive(Debug, Clone)]
pub struct TransactionLog {
    entries: Vec<Transaction>,
    capacity: usize,
    last_id: u64,
}

impl Default for TransactionLog {
    fn default() -> Self {
        Self::with_capacity(MAX_TRANSACTIONS)
    }
}

impl TransactionLog {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity: capacity.max(1),
            last_id: 0,
        }
    }

    pub fn entries(&self) -> &[Transaction] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn prepend(&mut self, tx: Transaction) {
        self.last_id = self.last_id.max(tx.id);
        self.entries.insert(0, tx);
        self.entries.truncate(self.capacity);
    }

    /// Replace the whole history with a server or cache snapshot (already newest-first).
    pub fn replace(&mut self, mut entries: Vec<Transaction>) {
        entries.truncate(self.capacity);
        self.last_id = entries.iter().map(|t| t.id).max().unwrap_or(0).max(self.last_id);
        self.entries = entries;
    }

    /// Millisecond timestamp id, bumped when two entries land in the same millisecond.
    pub fn next_id(&mut self) -> u64 {
        let now = chrono::Utc::now().timestamp_millis().max(0) as u64;
        self.last_id = now.max(self.last_id + 1);
        self.last_id
    }

    /// Create a completed local entry and put it at the head of the log.
    pub fn record(&mut self, kind: TransactionKind, amount: f64) -> Transaction {
        let tx = Transaction::completed(self.next_id(), kind, amount);
        self.prepend(tx.clone());
        tx
    }
}

#[derive(Debug, Clone)]
pub struct SessionContext {
    pub user: UserProfile,
    pub balance: BalanceSnapshot,
    pub transactions: TransactionLog,
    pub ban: BanStatus,
    pub active_view: ActiveView,
    pub auto_cashout: AutoCashout,
    pub round: Option<MinesRound>,
    next_round_id: u64,
}

impl SessionContext {
    pub fn new(user: UserProfile) -> Self {
        let balance = BalanceSnapshot::new(user.balance);
        Self {
            user,
            balance,
            transactions: TransactionLog::default(),
            ban: BanStatus::default(),
            active_view: ActiveView::default(),
            auto_cashout: AutoCashout::default(),
            round: None,
            next_round_id: 1,
        }
    }

    pub fn round_in_progress(&self) -> bool {
        self.round.as_ref().is_some_and(|r| r.is_active())
    }

    pub fn next_round_id(&mut self) -> u64 {
        let id = self.next_round_id;
        self.next_round_id += 1;
        id
    }

    /// Profile with the live balance filled in, as mirrored to the local cache.
    pub fn profile(&self) -> UserProfile {
        UserProfile {
            balance: self.balance.balance(),
            ..self.user.clone()
        }
    }

    /// Merge non-balance profile fields from the server. Balance goes through reconciliation.
    pub fn merge_profile(&mut self, profile: UserProfile) {
        let balance = self.user.balance;
        self.user = UserProfile { balance, ..profile };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::HostUser;

    fn host() -> HostUser {
        HostUser {
            id: 42,
            username: Some("alice".into()),
            first_name: None,
            last_name: None,
        }
    }

    #[test]
    fn test_log_prepends_newest_first() {
        let mut log = TransactionLog::default();
        let first = log.record(TransactionKind::Deposit, 10.0);
        let second = log.record(TransactionKind::GameWin, 3.92);
        assert_eq!(log.entries()[0], second);
        assert_eq!(log.entries()[1], first);
        assert!(second.id > first.id);
    }

    #[test]
    fn test_log_capacity() {
        let mut log = TransactionLog::with_capacity(3);
        for i in 0..5 {
            log.record(TransactionKind::Deposit, i as f64);
        }
        assert_eq!(log.len(), 3);
        assert_eq!(log.entries()[0].amount, 4.0);
        assert_eq!(log.entries()[2].amount, 2.0);
    }

    #[test]
    fn test_ids_stay_unique_after_replace() {
        let mut log = TransactionLog::default();
        let future = Transaction::completed(u64::MAX / 2, TransactionKind::Deposit, 1.0);
        log.replace(vec![future]);
        let next = log.record(TransactionKind::GameWin, 1.0);
        assert_eq!(next.id, u64::MAX / 2 + 1);
    }

    #[test]
    fn test_merge_profile_keeps_local_balance() {
        let mut session = SessionContext::new(UserProfile::from_host(&host()));
        session.balance.restore(12.5);
        let mut remote = UserProfile::from_host(&host());
        remote.username = "alice_remote".into();
        remote.balance = 99.0;
        session.merge_profile(remote);
        assert_eq!(session.user.username, "alice_remote");
        assert_eq!(session.profile().balance, 12.5);
    }

    #[test]
    fn test_round_ids_increase() {
        let mut session = SessionContext::new(UserProfile::from_host(&host()));
        assert_eq!(session.next_round_id(), 1);
        assert_eq!(session.next_round_id(), 2);
        assert!(!session.round_in_progress());
    }
}
