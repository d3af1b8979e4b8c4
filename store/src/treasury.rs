//! Treasury audit entries.

use plotline_types::{
    BetId, ChapterId, PoolId, Timestamp, TokenAmount, TokenType, TreasuryEntryId, TreasurySource,
};
use serde::{Deserialize, Serialize};

/// Value retained by the platform. Append-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreasuryEntry {
    pub id: TreasuryEntryId,
    pub source: TreasurySource,
    pub token: TokenType,
    pub amount: TokenAmount,
    pub chapter_id: ChapterId,
    /// The pool a fee was paid into; `None` for chapter-level cuts.
    pub pool_id: Option<PoolId>,
    /// The bet a fee was taken from.
    pub bet_id: Option<BetId>,
    pub created_at: Timestamp,
}
