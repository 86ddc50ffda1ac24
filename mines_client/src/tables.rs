use crate::types::{GRID_SIZE, MAX_MINES, MIN_MINES};

/// Payout multipliers indexed by `[mines - MIN_MINES][revealed - 1]`.
const MULTIPLIER_TABLE: [[f64; 10]; 6] = [
    [1.21, 1.53, 1.96, 2.53, 3.32, 4.43, 6.01, 8.33, 11.80, 17.16],
    [1.28, 1.70, 2.30, 3.17, 4.43, 6.33, 9.25, 13.88, 21.45, 34.32],
    [1.35, 1.90, 2.73, 4.01, 6.01, 9.25, 14.65, 23.98, 40.76, 72.46],
    [1.43, 2.14, 3.28, 5.16, 8.33, 13.88, 23.98, 43.16, 81.52, 163.03],
    [1.52, 2.42, 3.98, 6.74, 11.80, 21.45, 40.76, 81.52, 173.22, 395.94],
    [1.62, 2.77, 4.90, 8.99, 17.16, 34.32, 72.46, 163.03, 395.94, 1055.84],
];

/// Number of clicks the tables cover.
pub const TABLE_DEPTH: usize = 10;

pub fn is_supported_mine_count(mine_count: u8) -> bool {
    (MIN_MINES..=MAX_MINES).contains(&mine_count)
}

fn row(mine_count: u8) -> Option<&'static [f64; TABLE_DEPTH]> {
    if !is_supported_mine_count(mine_count) {
        return None;
    }
    MULTIPLIER_TABLE.get((mine_count - MIN_MINES) as usize)
}

/// Multiplier after `revealed` safe cells. Counts past the table reuse the last entry.
pub fn multiplier(mine_count: u8, revealed: usize) -> f64 {
    if revealed == 0 {
        return 1.0;
    }
    match row(mine_count) {
        Some(values) => values[(revealed - 1).min(TABLE_DEPTH - 1)],
        None => 0.0,
    }
}

/// Chance, in percent, that the next click is safe given `revealed` safe cells so far.
///
/// Exact odds for a uniformly placed grid: safe cells left over cells left. Display-only,
/// never used for payouts. Returns 0 outside the supported mine range or past the
/// table depth.
pub fn next_click_survival_chance(mine_count: u8, revealed: usize) -> f64 {
    if !is_supported_mine_count(mine_count) || revealed >= TABLE_DEPTH {
        return 0.0;
    }
    let remaining = GRID_SIZE - revealed;
    let safe_remaining = remaining.saturating_sub(mine_count as usize);
    safe_remaining as f64 / remaining as f64 * 100.0
}
