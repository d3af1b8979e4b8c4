//! Per-user aggregate statistics.

use plotline_types::{TokenMap, UserId, BPS_DENOMINATOR};
use serde::{Deserialize, Serialize};

/// Running totals denormalised for leaderboard reads.
///
/// Written only inside the same transaction as the ledger change that
/// causes them (placement or resolution).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStats {
    pub user: UserId,
    /// Gross stakes per token.
    pub total_wagered: TokenMap,
    /// Payouts credited per token.
    pub total_won: TokenMap,
    pub bets_placed: u64,
    pub bets_won: u64,
    pub bets_lost: u64,
    /// Consecutive chapters won.
    pub current_streak: u32,
    pub best_streak: u32,
}

impl UserStats {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            total_wagered: TokenMap::new(),
            total_won: TokenMap::new(),
            bets_placed: 0,
            bets_won: 0,
            bets_lost: 0,
            current_streak: 0,
            best_streak: 0,
        }
    }

    pub fn resolved_bets(&self) -> u64 {
        self.bets_won + self.bets_lost
    }

    /// Win rate in basis points over resolved bets; zero when none resolved.
    pub fn win_rate_bps(&self) -> u32 {
        let resolved = self.resolved_bets();
        if resolved == 0 {
            return 0;
        }
        (self.bets_won as u128 * BPS_DENOMINATOR as u128 / resolved as u128) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn win_rate_handles_no_history() {
        let stats = UserStats::new(UserId::new("alice"));
        assert_eq!(stats.win_rate_bps(), 0);
    }

    #[test]
    fn win_rate_in_basis_points() {
        let mut stats = UserStats::new(UserId::new("alice"));
        stats.bets_won = 1;
        stats.bets_lost = 2;
        assert_eq!(stats.resolved_bets(), 3);
        assert_eq!(stats.win_rate_bps(), 3_333);
    }
}
