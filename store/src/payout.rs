//! Payout records.

use plotline_types::{
    ChapterId, PayoutId, PayoutStatus, PoolId, Timestamp, TokenAmount, TokenType, UserId,
};
use serde::{Deserialize, Serialize};

/// A credit owed to a user from a resolved pool.
///
/// At most one per (user, pool, token). Moves `Pending -> Completed` exactly once.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: PayoutId,
    pub user: UserId,
    pub pool_id: PoolId,
    pub chapter_id: ChapterId,
    pub token: TokenType,
    pub amount: TokenAmount,
    pub status: PayoutStatus,
    pub created_at: Timestamp,
    pub completed_at: Option<Timestamp>,
}
