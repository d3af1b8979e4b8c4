//! Lifecycle states for pools, bets and payouts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of an outcome's stake pool.
///
/// All pools of one chapter move together:
/// `Open -> Closed -> Resolved` or `Open -> Closed -> CarriedOver`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Accepting bets.
    Open,
    /// Betting closed; awaiting the winning outcome.
    Closed,
    /// Winner known; payouts created.
    Resolved,
    /// Nobody backed the winner; totals roll into the next chapter.
    CarriedOver,
}

impl PoolStatus {
    pub fn accepts_bets(&self) -> bool {
        matches!(self, Self::Open)
    }

    /// Resolved or carried over. No further transition is possible.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Resolved | Self::CarriedOver)
    }
}

impl fmt::Display for PoolStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Resolved => "resolved",
            Self::CarriedOver => "carried_over",
        };
        f.write_str(s)
    }
}

/// The state of a single stake.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetStatus {
    Confirmed,
    Won,
    Lost,
    /// A won bet whose payout has been claimed.
    Claimed,
}

impl BetStatus {
    /// Won, whether or not the payout has been claimed yet.
    pub fn is_win(&self) -> bool {
        matches!(self, Self::Won | Self::Claimed)
    }
}

/// The state of a payout owed to a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayoutStatus {
    Pending,
    Completed,
}

/// Why value was retained by the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TreasurySource {
    /// Per-bet placement fee.
    Fee,
    /// Platform share of a resolved pot, including rounding dust.
    TreasuryCut,
}
