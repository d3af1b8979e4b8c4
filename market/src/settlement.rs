//! Claim settlement: PENDING payouts become COMPLETED exactly once.

use plotline_store::{LedgerRead, LedgerStore, LedgerWrite};
use plotline_types::{BetStatus, Clock, PayoutStatus, PoolId, TokenMap, UserId};

use crate::engine::{check_user, MarketEngine};
use crate::MarketError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClaimReceipt {
    pub user: UserId,
    pub pool_id: PoolId,
    /// Total claimed per token.
    pub claimed: TokenMap,
    pub payouts_claimed: usize,
    /// WON bets moved to CLAIMED.
    pub bets_claimed: usize,
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    /// Complete every pending payout a user holds on a pool.
    ///
    /// Value transfer happens outside the engine; this only records it. A
    /// second claim finds nothing PENDING and fails with
    /// [`MarketError::NoPendingPayouts`].
    pub fn claim_winnings(&self, user: UserId, pool_id: PoolId) -> Result<ClaimReceipt, MarketError> {
        check_user(&user)?;
        let now = self.now();
        let mut txn = self.store.write_txn()?;

        if txn.get_pool(pool_id)?.is_none() {
            return Err(MarketError::PoolNotFound(pool_id));
        }

        let pending: Vec<_> = txn
            .user_pool_payouts(&user, pool_id)?
            .into_iter()
            .filter(|p| p.status == PayoutStatus::Pending)
            .collect();
        if pending.is_empty() {
            return Err(MarketError::NoPendingPayouts {
                user,
                pool: pool_id,
            });
        }

        let mut claimed = TokenMap::new();
        let payouts_claimed = pending.len();
        for mut payout in pending {
            claimed
                .checked_add(payout.token, payout.amount)
                .ok_or(MarketError::Overflow)?;
            payout.status = PayoutStatus::Completed;
            payout.completed_at = Some(now);
            txn.put_payout(&payout)?;
        }

        let mut bets_claimed = 0;
        for mut bet in txn.user_bets(&user)? {
            if bet.pool_id == pool_id && bet.status == BetStatus::Won {
                bet.status = BetStatus::Claimed;
                txn.put_bet(&bet)?;
                bets_claimed += 1;
            }
        }

        txn.commit()?;

        self.metrics.claims_completed.inc();
        tracing::info!(
            user = %user,
            pool = %pool_id,
            payouts = payouts_claimed,
            claimed = ?claimed,
            "winnings claimed"
        );

        Ok(ClaimReceipt {
            user,
            pool_id,
            claimed,
            payouts_claimed,
            bets_claimed,
        })
    }
}
