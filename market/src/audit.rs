//! Conservation audit for a single chapter.
//!
//! Recomputes every flow of value in and out of a chapter from the stored
//! rows and checks that nothing was created or lost:
//!
//! * Σ net bet amounts == Σ pool totals, per token
//! * Σ fees charged on bets == Σ `Fee` treasury entries, per token
//! * once settled: payouts + treasury cut + rollover == pool totals + carryover

use plotline_store::{LedgerRead, LedgerStore};
use plotline_types::{ChapterId, Clock, TokenMap, TreasurySource};
use serde::Serialize;

use crate::engine::MarketEngine;
use crate::MarketError;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChapterAudit {
    pub chapter_id: Option<ChapterId>,
    /// Net stake of every bet, whatever its status.
    pub stakes: TokenMap,
    pub pool_totals: TokenMap,
    pub carryover_in: TokenMap,
    /// Fees recorded on the bet rows.
    pub bet_fees: TokenMap,
    /// Fees recorded in the treasury.
    pub fees: TokenMap,
    pub payouts: TokenMap,
    pub treasury_cut: TokenMap,
    pub rollover: TokenMap,
    /// Every pool of the chapter is resolved or carried over.
    pub settled: bool,
}

impl ChapterAudit {
    pub fn is_balanced(&self) -> bool {
        if self.stakes != self.pool_totals || self.bet_fees != self.fees {
            return false;
        }
        if !self.settled {
            return true;
        }
        let mut out = self.payouts.clone();
        let mut into = self.pool_totals.clone();
        match (
            out.checked_merge(&self.treasury_cut)
                .and_then(|_| out.checked_merge(&self.rollover)),
            into.checked_merge(&self.carryover_in),
        ) {
            (Some(()), Some(())) => out == into,
            _ => false,
        }
    }
}

pub fn chapter_audit(reader: &impl LedgerRead, chapter_id: ChapterId) -> Result<ChapterAudit, MarketError> {
    let chapter = reader
        .get_chapter(chapter_id)?
        .ok_or(MarketError::ChapterNotFound(chapter_id))?;
    let pools = reader.chapter_pools(chapter_id)?;

    let mut audit = ChapterAudit {
        chapter_id: Some(chapter_id),
        rollover: chapter.rollover.clone(),
        settled: !pools.is_empty() && pools.iter().all(|p| p.status.is_final()),
        ..ChapterAudit::default()
    };

    for pool in &pools {
        audit
            .pool_totals
            .checked_merge(&pool.totals)
            .ok_or(MarketError::Overflow)?;
        audit
            .carryover_in
            .checked_merge(&pool.carryover)
            .ok_or(MarketError::Overflow)?;

        for bet in reader.pool_bets(pool.id)? {
            audit
                .stakes
                .checked_add(bet.token, bet.amount)
                .ok_or(MarketError::Overflow)?;
            audit
                .bet_fees
                .checked_add(bet.token, bet.fee_paid)
                .ok_or(MarketError::Overflow)?;
        }
        for payout in reader.pool_payouts(pool.id)? {
            audit
                .payouts
                .checked_add(payout.token, payout.amount)
                .ok_or(MarketError::Overflow)?;
        }
    }

    for entry in reader.chapter_treasury(chapter_id)? {
        let bucket = match entry.source {
            TreasurySource::Fee => &mut audit.fees,
            TreasurySource::TreasuryCut => &mut audit.treasury_cut,
        };
        bucket
            .checked_add(entry.token, entry.amount)
            .ok_or(MarketError::Overflow)?;
    }

    Ok(audit)
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    pub fn chapter_audit(&self, chapter_id: ChapterId) -> Result<ChapterAudit, MarketError> {
        let reader = self.store.read_txn()?;
        let audit = chapter_audit(&reader, chapter_id)?;
        if !audit.is_balanced() {
            tracing::error!(chapter = %chapter_id, ?audit, "chapter ledger does not balance");
        }
        Ok(audit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{OpenChapter, OutcomeSpec};
    use crate::placement::PlaceBet;
    use plotline_nullables::{NullClock, NullLedgerStore};
    use plotline_store::LedgerWrite;
    use plotline_types::{
        MarketParams, OutcomeId, Timestamp, TokenAmount, TokenType, TreasuryEntryId, UserId,
    };

    type Engine = MarketEngine<NullLedgerStore, NullClock>;

    fn engine() -> Engine {
        let engine =
            Engine::new(NullLedgerStore::new(), NullClock::new(0), MarketParams::default()).unwrap();
        engine
            .open_chapter(OpenChapter {
                chapter_id: ChapterId::new(7),
                deadline: Timestamp::new(50),
                outcomes: vec![
                    OutcomeSpec {
                        id: OutcomeId::new(71),
                        label: "forgive".into(),
                    },
                    OutcomeSpec {
                        id: OutcomeId::new(72),
                        label: "avenge".into(),
                    },
                ],
                carryover_from: None,
            })
            .unwrap();
        engine
    }

    fn place(engine: &Engine, user: &str, outcome: u64, token: TokenType, gross: u128, tx: &str) {
        engine
            .place_bet(PlaceBet {
                user: UserId::new(user),
                outcome_id: OutcomeId::new(outcome),
                gross_amount: TokenAmount::new(gross),
                token,
                tx_ref: tx.into(),
            })
            .unwrap();
    }

    #[test]
    fn balanced_through_the_lifecycle() {
        let engine = engine();
        place(&engine, "a", 71, TokenType::Usdc, 3_333_333, "t1");
        place(&engine, "b", 71, TokenType::Usdc, 1_000_001, "t2");
        place(&engine, "c", 72, TokenType::Usdc, 7_777_777, "t3");
        place(&engine, "c", 72, TokenType::Usdt, 5_000_000, "t4");

        let open = engine.chapter_audit(ChapterId::new(7)).unwrap();
        assert!(!open.settled);
        assert!(open.is_balanced());

        engine.clock().set(51);
        engine.close_betting_for_chapter(ChapterId::new(7)).unwrap();
        engine
            .resolve_pool(ChapterId::new(7), OutcomeId::new(71))
            .unwrap();

        let settled = engine.chapter_audit(ChapterId::new(7)).unwrap();
        assert!(settled.settled);
        assert!(settled.is_balanced());
        // Nobody backed the winner in USDT, so it rolls over whole.
        assert_eq!(settled.rollover.get(TokenType::Usdt), TokenAmount::new(4_900_000));
        assert!(settled.payouts.get(TokenType::Usdt).is_zero());
    }

    #[test]
    fn detects_an_unbacked_fee_entry() {
        let engine = engine();
        place(&engine, "a", 71, TokenType::Usdc, 1_000_000, "t1");
        {
            let mut txn = engine.store().write_txn().unwrap();
            let id = TreasuryEntryId::new(txn.next_id(plotline_store::Sequence::Treasury).unwrap());
            txn.append_treasury(&plotline_store::TreasuryEntry {
                id,
                source: TreasurySource::Fee,
                token: TokenType::Usdc,
                amount: TokenAmount::new(1),
                chapter_id: ChapterId::new(7),
                pool_id: None,
                bet_id: None,
                created_at: Timestamp::new(0),
            })
            .unwrap();
            txn.commit().unwrap();
        }
        let audit = engine.chapter_audit(ChapterId::new(7)).unwrap();
        assert!(!audit.is_balanced());
    }

    #[test]
    fn unknown_chapter() {
        let engine = engine();
        assert!(matches!(
            engine.chapter_audit(ChapterId::new(8)),
            Err(MarketError::ChapterNotFound(_))
        ));
    }
}
