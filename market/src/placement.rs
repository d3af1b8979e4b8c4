//! Bet placement.

use plotline_store::{BetRecord, LedgerRead, LedgerStore, LedgerWrite, Sequence, TreasuryEntry};
use plotline_types::{
    BetId, BetStatus, Clock, OutcomeId, PoolId, TokenAmount, TokenType, TreasuryEntryId,
    TreasurySource, UserId,
};

use crate::engine::{check_user, load_stats, MarketEngine};
use crate::split::fee_split;
use crate::MarketError;

/// Longest external transaction reference accepted, in bytes. The reference
/// is a ledger index key, and LMDB keys stop at 511 bytes.
pub const MAX_TX_REF_LEN: usize = 256;

/// Inbound command: book an already-verified deposit as a stake.
#[derive(Clone, Debug)]
pub struct PlaceBet {
    pub user: UserId,
    pub outcome_id: OutcomeId,
    pub gross_amount: TokenAmount,
    pub token: TokenType,
    /// Opaque deposit reference, used for audit and to refuse double booking.
    pub tx_ref: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BetReceipt {
    pub bet_id: BetId,
    pub pool_id: PoolId,
    pub token: TokenType,
    /// Amount credited to the pool.
    pub net_amount: TokenAmount,
    pub fee: TokenAmount,
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    /// Validate and record a single stake against an outcome.
    ///
    /// The bet row, the pool total and voter count, the user's wagered total
    /// and the fee's treasury entry are written in one transaction. Every
    /// rejection happens before the first write.
    pub fn place_bet(&self, cmd: PlaceBet) -> Result<BetReceipt, MarketError> {
        match self.book_bet(&cmd) {
            Ok(receipt) => {
                self.metrics.bets_placed.inc();
                tracing::info!(
                    bet = %receipt.bet_id,
                    pool = %receipt.pool_id,
                    user = %cmd.user,
                    token = %receipt.token,
                    net = %receipt.net_amount,
                    fee = %receipt.fee,
                    "bet placed"
                );
                Ok(receipt)
            }
            Err(e) => {
                self.metrics.bets_rejected.inc();
                tracing::warn!(
                    user = %cmd.user,
                    outcome = %cmd.outcome_id,
                    tx_ref = %cmd.tx_ref,
                    error = %e,
                    "bet rejected"
                );
                Err(e)
            }
        }
    }

    fn book_bet(&self, cmd: &PlaceBet) -> Result<BetReceipt, MarketError> {
        if cmd.gross_amount.is_zero() {
            return Err(MarketError::NonPositiveStake);
        }
        check_user(&cmd.user)?;
        if cmd.tx_ref.trim().is_empty() {
            return Err(MarketError::EmptyTxRef);
        }
        if cmd.tx_ref.len() > MAX_TX_REF_LEN {
            return Err(MarketError::TxRefTooLong {
                len: cmd.tx_ref.len(),
                max: MAX_TX_REF_LEN,
            });
        }
        let (fee, net) = fee_split(cmd.gross_amount, self.params.fee_bps)?;
        if net.is_zero() {
            return Err(MarketError::StakeBelowFee {
                gross: cmd.gross_amount.raw(),
            });
        }

        let now = self.now();
        let mut txn = self.store.write_txn()?;

        let mut pool = txn
            .pool_for_outcome(cmd.outcome_id)?
            .ok_or(MarketError::OutcomeHasNoPool(cmd.outcome_id))?;
        if !pool.status.accepts_bets() {
            return Err(MarketError::BettingClosed {
                pool: pool.id,
                status: pool.status,
            });
        }
        let chapter = txn
            .get_chapter(pool.chapter_id)?
            .ok_or(MarketError::ChapterNotFound(pool.chapter_id))?;
        if chapter.deadline.is_past(now) {
            return Err(MarketError::DeadlinePassed {
                chapter: chapter.id,
                deadline: chapter.deadline,
            });
        }
        if txn.bet_by_tx_ref(&cmd.tx_ref)?.is_some() {
            return Err(MarketError::DuplicateTxRef(cmd.tx_ref.clone()));
        }

        let bet_id = BetId::new(txn.next_id(Sequence::Bet)?);
        txn.put_bet(&BetRecord {
            id: bet_id,
            user: cmd.user.clone(),
            pool_id: pool.id,
            outcome_id: cmd.outcome_id,
            chapter_id: pool.chapter_id,
            token: cmd.token,
            gross_amount: cmd.gross_amount,
            fee_paid: fee,
            amount: net,
            tx_ref: cmd.tx_ref.clone(),
            status: BetStatus::Confirmed,
            placed_at: now,
            payout: None,
            settled_at: None,
        })?;

        pool.totals
            .checked_add(cmd.token, net)
            .ok_or(MarketError::Overflow)?;
        pool.voter_count += 1;
        txn.put_pool(&pool)?;

        let mut stats = load_stats(&txn, &cmd.user)?;
        stats
            .total_wagered
            .checked_add(cmd.token, cmd.gross_amount)
            .ok_or(MarketError::Overflow)?;
        stats.bets_placed += 1;
        txn.put_user_stats(&stats)?;

        if !fee.is_zero() {
            let entry_id = TreasuryEntryId::new(txn.next_id(Sequence::Treasury)?);
            txn.append_treasury(&TreasuryEntry {
                id: entry_id,
                source: TreasurySource::Fee,
                token: cmd.token,
                amount: fee,
                chapter_id: pool.chapter_id,
                pool_id: Some(pool.id),
                bet_id: Some(bet_id),
                created_at: now,
            })?;
        }

        txn.commit()?;

        Ok(BetReceipt {
            bet_id,
            pool_id: pool.id,
            token: cmd.token,
            net_amount: net,
            fee,
        })
    }
}
