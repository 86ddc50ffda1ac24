//! Client-side Mines round engine with optimistic balance reconciliation.
//!
//! Rounds run against an explicit [`SessionContext`]; balance changes are applied
//! locally first and reconciled against a [`BalanceService`] in the background.

pub mod balance;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod mines;
pub mod service;
pub mod session;
pub mod tables;
pub mod types;

pub use balance::{BalanceSnapshot, Reconciliation, SyncTicket};
pub use cache::{FileStore, LocalStore, MemoryStore};
pub use client::{MinesClient, SyncSource};
pub use config::ClientConfig;
pub use error::{CacheError, ConfigError, RoundError, ServiceError, WalletError};
pub use mines::{
    cash_out, generate_mine_positions, payout, reveal_cell, start_round, verify_commitment,
    CashOut, MinesRound, RevealOutcome, RoundStarted, RoundVerification,
};
pub use service::{with_retry, BalanceService, RetryPolicy};
pub use session::{SessionContext, TransactionLog};
pub use tables::{multiplier, next_click_survival_chance};
pub use types::*;
