//! Bet records.

use plotline_types::{
    BetId, BetStatus, ChapterId, OutcomeId, PoolId, Timestamp, TokenAmount, TokenType, UserId,
};
use serde::{Deserialize, Serialize};

/// A single user's stake on one outcome.
///
/// `token` and `outcome_id` never change after creation; only `status`,
/// `payout` and `settled_at` are written again.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetRecord {
    pub id: BetId,
    pub user: UserId,
    pub pool_id: PoolId,
    pub outcome_id: OutcomeId,
    pub chapter_id: ChapterId,
    pub token: TokenType,
    /// Stake as deposited.
    pub gross_amount: TokenAmount,
    pub fee_paid: TokenAmount,
    /// `gross_amount - fee_paid`, the amount credited to the pool.
    pub amount: TokenAmount,
    /// Opaque external transaction reference, unique across all bets.
    pub tx_ref: String,
    pub status: BetStatus,
    pub placed_at: Timestamp,
    /// This bet's share of the winner pot, set when it is marked won.
    pub payout: Option<TokenAmount>,
    /// When the bet was marked won/lost, or claimed.
    pub settled_at: Option<Timestamp>,
}
