//! Pool records.

use plotline_types::{ChapterId, OutcomeId, PoolId, PoolStatus, Timestamp, TokenMap};
use serde::{Deserialize, Serialize};

/// Aggregated stake for one outcome.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRecord {
    pub id: PoolId,
    pub chapter_id: ChapterId,
    pub outcome_id: OutcomeId,
    pub status: PoolStatus,
    /// Running total of net (post-fee) stakes per token.
    pub totals: TokenMap,
    /// Value inherited from a previous no-winner cycle.
    pub carryover: TokenMap,
    /// Number of bets booked against this pool.
    pub voter_count: u64,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
}
