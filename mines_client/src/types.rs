use candid::{CandidType, Deserialize};
use serde::Serialize;

// =============================================================================
// CONSTANTS
// =============================================================================

pub const GRID_SIZE: usize = 25; // 5x5
pub const MIN_MINES: u8 = 5;
pub const MAX_MINES: u8 = 10;
pub const BALANCE_EPSILON: f64 = 0.01; // Server/local drift tolerated before overwriting
pub const CURRENCY: &str = "TON";
pub const MAX_TRANSACTIONS: usize = 500;

// Local cache keys
pub const USER_CACHE_KEY: &str = "mines-user";
pub const TRANSACTIONS_CACHE_KEY: &str = "mines-transactions";

// =============================================================================
// ROUND TYPES
// =============================================================================

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundStatus {
    #[serde(rename = "active")]
    Active,
    #[serde(rename = "won")]
    Won,
    #[serde(rename = "lost")]
    Lost,
    #[serde(rename = "cashed_out")]
    CashedOut,
}

impl RoundStatus {
    pub fn is_terminal(self) -> bool {
        self != RoundStatus::Active
    }
}

/// Player-configured triggers that cash out automatically after a safe reveal.
#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, Default, PartialEq)]
pub struct AutoCashout {
    pub target_multiplier: Option<f64>,
    pub target_clicks: Option<u32>,
}

impl AutoCashout {
    pub fn is_triggered(&self, multiplier: f64, revealed: usize) -> bool {
        let by_multiplier = self.target_multiplier.is_some_and(|t| multiplier >= t);
        let by_clicks = self.target_clicks.is_some_and(|t| revealed >= t as usize);
        by_multiplier || by_clicks
    }
}

// =============================================================================
// ACCOUNT TYPES
// =============================================================================

/// Identity handed over by the host mini-app runtime.
#[derive(CandidType, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct HostUser {
    pub id: u64,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct UserProfile {
    pub id: u64,
    pub telegram_id: u64,
    pub username: String,
    pub first_name: String,
    #[serde(default)]
    pub last_name: Option<String>,
    pub balance: f64,
    #[serde(default)]
    pub total_deposited: f64,
    #[serde(default)]
    pub total_withdrawn: f64,
    #[serde(default)]
    pub is_premium: bool,
    pub created_at: String,
}

impl UserProfile {
    /// Fresh zero-balance profile for a host identity, before the first sync.
    pub fn from_host(host: &HostUser) -> Self {
        Self {
            id: host.id,
            telegram_id: host.id,
            username: host.username.clone().unwrap_or_else(|| "player".to_string()),
            first_name: host.first_name.clone().unwrap_or_else(|| "Player".to_string()),
            last_name: host.last_name.clone(),
            balance: 0.0,
            total_deposited: 0.0,
            total_withdrawn: 0.0,
            is_premium: false,
            created_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
pub struct BanStatus {
    pub is_banned: bool,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub until: Option<String>,
    #[serde(default)]
    pub original_balance: Option<f64>,
    #[serde(default)]
    pub is_demo: bool,
}

// =============================================================================
// BALANCE & TRANSACTION TYPES
// =============================================================================

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BalanceKind {
    #[serde(rename = "bet")]
    Bet,
    #[serde(rename = "win")]
    Win,
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "withdraw")]
    Withdraw,
}

impl BalanceKind {
    /// Signed local delta for an unsigned request amount.
    pub fn signed(self, amount: f64) -> f64 {
        match self {
            BalanceKind::Bet | BalanceKind::Withdraw => -amount,
            BalanceKind::Win | BalanceKind::Deposit => amount,
        }
    }
}

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq)]
pub struct BalanceUpdate {
    pub new_balance: f64,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionKind {
    #[serde(rename = "deposit")]
    Deposit,
    #[serde(rename = "withdrawal")]
    Withdrawal,
    #[serde(rename = "game_win")]
    GameWin,
    #[serde(rename = "game_loss")]
    GameLoss,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransactionStatus {
    #[serde(rename = "pending")]
    Pending,
    #[serde(rename = "completed")]
    Completed,
    #[serde(rename = "failed")]
    Failed,
    #[serde(rename = "cancelled")]
    Cancelled,
}

#[derive(CandidType, Deserialize, Serialize, Clone, Debug, PartialEq)]
pub struct Transaction {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    pub currency: String,
    pub status: TransactionStatus,
    pub created_at: String,
    #[serde(default)]
    pub payment_method: Option<String>,
    #[serde(default)]
    pub external_id: Option<String>,
}

impl Transaction {
    /// Locally originated, already-completed entry stamped with the current time.
    pub fn completed(id: u64, kind: TransactionKind, amount: f64) -> Self {
        Self {
            id,
            kind,
            amount,
            currency: CURRENCY.to_string(),
            status: TransactionStatus::Completed,
            created_at: chrono::Utc::now().to_rfc3339(),
            payment_method: None,
            external_id: None,
        }
    }
}

// =============================================================================
// VIEW STATE
// =============================================================================

#[derive(CandidType, Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ActiveView {
    #[default]
    #[serde(rename = "mines")]
    Mines,
    #[serde(rename = "crash")]
    Crash,
    #[serde(rename = "cases")]
    Cases,
}

impl ActiveView {
    /// Views that run their own balance cadence; background polling stays off.
    pub fn pauses_polling(self) -> bool {
        matches!(self, ActiveView::Crash | ActiveView::Cases)
    }
}
