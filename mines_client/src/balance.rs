//! Optimistic local balance with sequenced server reconciliation.
//!
//! Every balance-affecting operation applies its delta locally and takes a
//! [`SyncTicket`]. When the server answers, the response is only applied if
//! its ticket is still the most recently issued one; anything older was issued
//! before a later local change and would roll that change back.

use crate::types::BALANCE_EPSILON;

/// Logical clock value attached to an outstanding balance request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct SyncTicket {
    pub seq: u64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    /// Server value within epsilon of the local one; local value untouched.
    Kept,
    /// Local value replaced by the server's.
    Overwritten { previous: f64 },
    /// A newer request was issued after this one; response discarded.
    Stale,
}

#[derive(Debug, Clone)]
pub struct BalanceSnapshot {
    balance: f64,
    epsilon: f64,
    issued: u64,
    applied: u64,
    in_flight: u64,
}

impl Default for BalanceSnapshot {
    fn default() -> Self {
        Self::new(0.0)
    }
}

impl BalanceSnapshot {
    pub fn new(balance: f64) -> Self {
        Self::with_epsilon(balance, BALANCE_EPSILON)
    }

    pub fn with_epsilon(balance: f64, epsilon: f64) -> Self {
        Self {
            balance,
            epsilon,
            issued: 0,
            applied: 0,
            in_flight: 0,
        }
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    /// True when no request is awaiting a response.
    pub fn is_settled(&self) -> bool {
        self.in_flight == 0
    }

    /// Apply a signed delta locally and open a request for it.
    pub fn apply(&mut self, delta: f64) -> SyncTicket {
        self.balance += delta;
        self.issue()
    }

    /// Open a request that carries no local delta (full profile refresh).
    pub fn issue(&mut self) -> SyncTicket {
        self.issued += 1;
        self.in_flight += 1;
        SyncTicket { seq: self.issued }
    }

    /// Fold a server-reported balance in for `ticket`.
    pub fn reconcile(&mut self, ticket: SyncTicket, server_balance: f64) -> Reconciliation {
        self.close(ticket);

        if ticket.seq != self.issued || ticket.seq <= self.applied || !server_balance.is_finite() {
            return Reconciliation::Stale;
        }
        self.applied = ticket.seq;

        if (self.balance - server_balance).abs() > self.epsilon {
            let previous = self.balance;
            self.balance = server_balance;
            Reconciliation::Overwritten { previous }
        } else {
            Reconciliation::Kept
        }
    }

    /// Give up on `ticket` after a failed request. The local value stays.
    pub fn abandon(&mut self, ticket: SyncTicket) {
        self.close(ticket);
    }

    /// Take back the local delta of a request the server never accepted.
    pub fn revert(&mut self, ticket: SyncTicket, delta: f64) {
        self.balance -= delta;
        self.close(ticket);
    }

    /// Replace the balance outright, e.g. from a cached snapshot. Does not touch the clock.
    pub fn restore(&mut self, balance: f64) {
        self.balance = balance;
    }

    fn close(&mut self, ticket: SyncTicket) {
        if ticket.seq <= self.issued {
            self.in_flight = self.in_flight.saturating_sub(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_within_epsilon_keeps_local() {
        let mut snapshot = BalanceSnapshot::new(100.0);
        let ticket = snapshot.issue();
        assert_eq!(snapshot.reconcile(ticket, 100.009), Reconciliation::Kept);
        assert_eq!(snapshot.balance(), 100.0);
    }

    #[test]
    fn test_beyond_epsilon_overwrites() {
        let mut snapshot = BalanceSnapshot::new(100.0);
        let ticket = snapshot.issue();
        assert_eq!(
            snapshot.reconcile(ticket, 105.0),
            Reconciliation::Overwritten { previous: 100.0 }
        );
        assert_eq!(snapshot.balance(), 105.0);
    }

    #[test]
    fn test_optimistic_apply() {
        let mut snapshot = BalanceSnapshot::new(50.0);
        snapshot.apply(-10.0);
        assert_eq!(snapshot.balance(), 40.0);
        assert!(!snapshot.is_settled());
    }

    #[test]
    fn test_stale_response_discarded() {
        let mut snapshot = BalanceSnapshot::new(100.0);
        let bet = snapshot.apply(-10.0); // 90
        let win = snapshot.apply(25.0); // 115

        // Win answer arrives first
        assert_eq!(snapshot.reconcile(win, 115.0), Reconciliation::Kept);
        // Slow bet answer must not roll the win back
        assert_eq!(snapshot.reconcile(bet, 90.0), Reconciliation::Stale);
        assert_eq!(snapshot.balance(), 115.0);
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_older_response_superseded_by_pending_request() {
        let mut snapshot = BalanceSnapshot::new(100.0);
        let bet = snapshot.apply(-10.0);
        let _win = snapshot.apply(5.0);

        assert_eq!(snapshot.reconcile(bet, 90.0), Reconciliation::Stale);
        assert_eq!(snapshot.balance(), 95.0);
        assert!(!snapshot.is_settled());
    }

    #[test]
    fn test_duplicate_response_ignored() {
        let mut snapshot = BalanceSnapshot::new(100.0);
        let ticket = snapshot.issue();
        assert_eq!(snapshot.reconcile(ticket, 100.0), Reconciliation::Kept);
        assert_eq!(snapshot.reconcile(ticket, 42.0), Reconciliation::Stale);
        assert_eq!(snapshot.balance(), 100.0);
    }

    #[test]
    fn test_abandon_leaves_optimistic_value() {
        let mut snapshot = BalanceSnapshot::new(20.0);
        let ticket = snapshot.apply(-5.0);
        snapshot.abandon(ticket);
        assert_eq!(snapshot.balance(), 15.0);
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_revert_takes_delta_back() {
        let mut snapshot = BalanceSnapshot::new(20.0);
        let ticket = snapshot.apply(25.0);
        snapshot.revert(ticket, 25.0);
        assert_eq!(snapshot.balance(), 20.0);
        assert!(snapshot.is_settled());
    }

    #[test]
    fn test_non_finite_server_value_rejected() {
        let mut snapshot = BalanceSnapshot::new(20.0);
        let ticket = snapshot.issue();
        assert_eq!(snapshot.reconcile(ticket, f64::NAN), Reconciliation::Stale);
        assert_eq!(snapshot.balance(), 20.0);
    }
}
