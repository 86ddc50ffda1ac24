use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;
use sha2::{Digest, Sha256};

use crate::balance::SyncTicket;
use crate::error::RoundError;
use crate::session::SessionContext;
use crate::tables;
use crate::types::{RoundStatus, TransactionKind, GRID_SIZE};

// ============ CORE GAME LOGIC ============

/// Choose `mine_count` distinct cells uniformly at random.
pub fn generate_mine_positions<R: Rng + ?Sized>(mine_count: u8, rng: &mut R) -> [bool; GRID_SIZE] {
    let mut positions: Vec<u8> = (0..GRID_SIZE as u8).collect();
    let count = (mine_count as usize).min(GRID_SIZE);
    let (chosen, _) = positions.partial_shuffle(rng, count);

    let mut mines = [false; GRID_SIZE];
    for &pos in chosen.iter() {
        mines[pos as usize] = true;
    }
    mines
}

/// Truncate `bet * multiplier` to two decimals. Never rounds up.
pub fn payout(bet_amount: f64, multiplier: f64) -> f64 {
    if !multiplier.is_finite() || multiplier <= 0.0 || !bet_amount.is_finite() || bet_amount <= 0.0 {
        return 0.0;
    }
    // 1e-9 absorbs representation error so 2 * 1.96 stays 3.92 rather than 3.91
    ((bet_amount * multiplier * 100.0) + 1e-9).floor() / 100.0
}

/// SHA256 over the round seed and mine layout, published when the round starts.
pub fn layout_commitment(seed: &[u8; 32], mines: &[bool; GRID_SIZE]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(seed);
    for (i, &is_mine) in mines.iter().enumerate() {
        if is_mine {
            hasher.update([i as u8]);
        }
    }
    format!("{:x}", hasher.finalize())
}

/// Check a finished round's revealed seed against the commitment shown at start.
pub fn verify_commitment(commitment: &str, seed: &[u8; 32], mine_count: u8) -> bool {
    let mines = generate_mine_positions(mine_count, &mut ChaCha20Rng::from_seed(*seed));
    layout_commitment(seed, &mines) == commitment
}

/// Data a player needs to audit a finished round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundVerification {
    pub seed: [u8; 32],
    pub mine_cells: Vec<u8>,
    pub commitment: String,
}

#[derive(Debug, Clone, PartialEq)]
enum CellOutcome {
    Ignored,
    Mine,
    Safe { multiplier: f64, revealed: usize, cleared: bool },
}

#[derive(Debug, Clone)]
pub struct MinesRound {
    pub id: u64,
    pub bet_amount: f64,
    pub mine_count: u8,
    pub current_multiplier: f64,
    pub status: RoundStatus,
    mines: [bool; GRID_SIZE],
    revealed: [bool; GRID_SIZE],
    seed: [u8; 32],
    commitment: String,
}

impl MinesRound {
    fn new(id: u64, bet_amount: f64, mine_count: u8, seed: [u8; 32]) -> Self {
        let mines = generate_mine_positions(mine_count, &mut ChaCha20Rng::from_seed(seed));
        let commitment = layout_commitment(&seed, &mines);
        Self {
            id,
            bet_amount,
            mine_count,
            current_multiplier: 1.0,
            status: RoundStatus::Active,
            mines,
            revealed: [false; GRID_SIZE],
            seed,
            commitment,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == RoundStatus::Active
    }

    pub fn revealed_count(&self) -> usize {
        self.revealed.iter().filter(|&&r| r).count()
    }

    pub fn is_revealed(&self, index: usize) -> bool {
        self.revealed.get(index).copied().unwrap_or(false)
    }

    pub fn revealed_cells(&self) -> Vec<u8> {
        cells(&self.revealed)
    }

    pub fn commitment(&self) -> &str {
        &self.commitment
    }

    /// Mine layout, hidden until the round is over.
    pub fn mine_cells(&self) -> Option<Vec<u8>> {
        self.status.is_terminal().then(|| cells(&self.mines))
    }

    pub fn verification(&self) -> Option<RoundVerification> {
        self.mine_cells().map(|mine_cells| RoundVerification {
            seed: self.seed,
            mine_cells,
            commitment: self.commitment.clone(),
        })
    }

    pub fn next_click_survival_chance(&self) -> f64 {
        if !self.is_active() {
            return 0.0;
        }
        tables::next_click_survival_chance(self.mine_count, self.revealed_count())
    }

    fn reveal(&mut self, index: usize) -> CellOutcome {
        if !self.is_active() || index >= GRID_SIZE || self.revealed[index] {
            return CellOutcome::Ignored;
        }

        if self.mines[index] {
            self.status = RoundStatus::Lost;
            return CellOutcome::Mine;
        }

        self.revealed[index] = true;
        let revealed = self.revealed_count();
        self.current_multiplier = tables::multiplier(self.mine_count, revealed);
        let cleared = revealed + self.mine_count as usize >= GRID_SIZE;

        CellOutcome::Safe {
            multiplier: self.current_multiplier,
            revealed,
            cleared,
        }
    }

    #[cfg(test)]
    pub(crate) fn with_mines(id: u64, bet_amount: f64, mine_cells: &[u8]) -> Self {
        let mut round = Self::new(id, bet_amount, mine_cells.len() as u8, [0u8; 32]);
        round.mines = [false; GRID_SIZE];
        for &cell in mine_cells {
            round.mines[cell as usize] = true;
        }
        round.commitment = layout_commitment(&round.seed, &round.mines);
        round
    }
}

fn cells(flags: &[bool; GRID_SIZE]) -> Vec<u8> {
    flags
        .iter()
        .enumerate()
        .filter(|&(_, &set)| set)
        .map(|(i, _)| i as u8)
        .collect()
}

// ============ END CORE LOGIC ============

#[derive(Debug, Clone, PartialEq)]
pub struct RoundStarted {
    pub round_id: u64,
    pub bet_amount: f64,
    pub commitment: String,
    pub ticket: SyncTicket,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CashOut {
    pub round_id: u64,
    pub payout: f64,
    pub multiplier: f64,
    pub status: RoundStatus,
    pub ticket: SyncTicket,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RevealOutcome {
    /// No active round, out-of-range cell, or cell already revealed. Nothing changed.
    Ignored,
    Mine,
    Safe { multiplier: f64 },
    /// Round settled right after this reveal (auto cash-out or every safe cell found).
    Settled(CashOut),
}

/// Validate, debit the bet locally and open a new round.
///
/// The layout comes from a fresh 32-byte seed drawn from `rng`. Errors leave the
/// session untouched.
pub fn start_round<R: Rng + ?Sized>(
    session: &mut SessionContext,
    bet_amount: f64,
    mine_count: u8,
    rng: &mut R,
) -> Result<RoundStarted, RoundError> {
    if session.ban.is_banned {
        return Err(RoundError::Banned {
            reason: session.ban.reason.clone(),
        });
    }
    if !tables::is_supported_mine_count(mine_count) {
        return Err(RoundError::InvalidMineCount(mine_count));
    }
    if !bet_amount.is_finite() || bet_amount <= 0.0 {
        return Err(RoundError::InvalidBet(bet_amount));
    }
    let available = session.balance.balance();
    if bet_amount > available {
        return Err(RoundError::InsufficientBalance {
            needed: bet_amount,
            available,
        });
    }
    if session.round_in_progress() {
        return Err(RoundError::RoundInProgress);
    }

    let seed: [u8; 32] = rng.gen();
    let round_id = session.next_round_id();
    let round = MinesRound::new(round_id, bet_amount, mine_count, seed);
    let commitment = round.commitment.clone();

    let ticket = session.balance.apply(-bet_amount);
    session.round = Some(round);

    tracing::info!(round_id, bet_amount, mine_count, %commitment, "round started");

    Ok(RoundStarted {
        round_id,
        bet_amount,
        commitment,
        ticket,
    })
}

/// Reveal one cell of the active round, then run auto cash-out checks.
pub fn reveal_cell(session: &mut SessionContext, index: usize) -> RevealOutcome {
    let auto = session.auto_cashout;
    let Some(round) = session.round.as_mut() else {
        return RevealOutcome::Ignored;
    };
    let round_id = round.id;
    let bet_amount = round.bet_amount;

    match round.reveal(index) {
        CellOutcome::Ignored => RevealOutcome::Ignored,
        CellOutcome::Mine => {
            session.transactions.record(TransactionKind::GameLoss, -bet_amount);
            tracing::info!(round_id, cell = index, "mine hit, round lost");
            RevealOutcome::Mine
        }
        CellOutcome::Safe {
            multiplier,
            revealed,
            cleared,
        } => {
            tracing::debug!(round_id, cell = index, multiplier, revealed, "safe cell");
            let status = if cleared {
                Some(RoundStatus::Won)
            } else if auto.is_triggered(multiplier, revealed) {
                Some(RoundStatus::CashedOut)
            } else {
                None
            };
            match status.and_then(|s| settle(session, s)) {
                Some(cash_out) => RevealOutcome::Settled(cash_out),
                None => RevealOutcome::Safe { multiplier },
            }
        }
    }
}

/// Lock in the current multiplier. `None` when there is no active round.
pub fn cash_out(session: &mut SessionContext) -> Option<CashOut> {
    settle(session, RoundStatus::CashedOut)
}

fn settle(session: &mut SessionContext, status: RoundStatus) -> Option<CashOut> {
    let round = session.round.as_mut().filter(|r| r.is_active())?;
    let amount = payout(round.bet_amount, round.current_multiplier);
    round.status = status;
    let round_id = round.id;
    let multiplier = round.current_multiplier;

    let ticket = session.balance.apply(amount);
    session.transactions.record(TransactionKind::GameWin, amount);

    tracing::info!(round_id, multiplier, payout = amount, ?status, "round settled");

    Some(CashOut {
        round_id,
        payout: amount,
        multiplier,
        status,
        ticket,
    })
}

// ============ UNIT TESTS ============
