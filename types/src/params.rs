//! Market parameters.
//!
//! Rates are basis points (1 bps = 0.01%) so every split is exact integer
//! arithmetic on raw token units.

use serde::{Deserialize, Serialize};

use crate::error::TypesError;

/// 100% in basis points.
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Tunable settlement parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    /// Fee taken from every gross stake at placement. Default: 2%.
    #[serde(default = "default_fee_bps")]
    pub fee_bps: u32,

    /// Share of a resolved pot distributed to winners. Default: 85%.
    #[serde(default = "default_winner_bps")]
    pub winner_bps: u32,

    /// Share of a resolved pot retained by the treasury. Default: 15%.
    /// `winner_bps + treasury_bps` must equal [`BPS_DENOMINATOR`].
    #[serde(default = "default_treasury_bps")]
    pub treasury_bps: u32,

    /// Minimum number of resolved bets before a user appears on the leaderboard.
    #[serde(default = "default_leaderboard_min_resolved_bets")]
    pub leaderboard_min_resolved_bets: u64,
}

fn default_fee_bps() -> u32 {
    200
}

fn default_winner_bps() -> u32 {
    8_500
}

fn default_treasury_bps() -> u32 {
    1_500
}

fn default_leaderboard_min_resolved_bets() -> u64 {
    10
}

impl MarketParams {
    /// Reject parameter sets that would leave a silent remainder or consume
    /// an entire stake as fee.
    pub fn validate(&self) -> Result<(), TypesError> {
        let split = self.winner_bps as u64 + self.treasury_bps as u64;
        if split != BPS_DENOMINATOR as u64 {
            return Err(TypesError::InvalidParams(format!(
                "winner_bps ({}) + treasury_bps ({}) must equal {}",
                self.winner_bps, self.treasury_bps, BPS_DENOMINATOR
            )));
        }
        if self.fee_bps >= BPS_DENOMINATOR {
            return Err(TypesError::InvalidParams(format!(
                "fee_bps ({}) must be below {}",
                self.fee_bps, BPS_DENOMINATOR
            )));
        }
        Ok(())
    }
}

impl Default for MarketParams {
    fn default() -> Self {
        Self {
            fee_bps: default_fee_bps(),
            winner_bps: default_winner_bps(),
            treasury_bps: default_treasury_bps(),
            leaderboard_min_resolved_bets: default_leaderboard_min_resolved_bets(),
        }
    }
}
