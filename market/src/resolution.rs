//! Chapter resolution: the one-shot transition from CLOSED to RESOLVED or
//! CARRIED_OVER.
//!
//! Resolution reads every sibling pool and its CONFIRMED bets inside the
//! write transaction, so a concurrent second attempt waits for the writer
//! lock and then sees the final statuses left by the first.

use std::collections::BTreeMap;

use plotline_store::{
    BetRecord, LedgerRead, LedgerStore, LedgerWrite, PayoutRecord, PoolRecord, Sequence,
    TreasuryEntry,
};
use plotline_types::{
    BetStatus, ChapterId, Clock, OutcomeId, PayoutId, PayoutStatus, PoolId, PoolStatus, Timestamp,
    TokenAmount, TokenMap, TokenType, TreasuryEntryId, TreasurySource, UserId,
};

use crate::engine::{load_stats, MarketEngine};
use crate::split::{plan_distribution, DistributionPlan, WinningStake};
use crate::streak::record_chapter_win;
use crate::MarketError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolutionSummary {
    pub chapter_id: ChapterId,
    pub winning_outcome: OutcomeId,
    pub winning_pool: PoolId,
    /// Whether the winning pool held at least one CONFIRMED bet.
    pub has_winners: bool,
    /// Distinct users with a winning bet.
    pub winner_count: usize,
    /// Stakes plus inherited carryover across every pool, per token.
    pub pot: TokenMap,
    pub distributed: TokenMap,
    /// Treasury share plus flooring dust.
    pub treasury_cut: TokenMap,
    /// The part of `treasury_cut` that is flooring dust.
    pub dust: TokenMap,
    /// Value left for the next chapter.
    pub rolled_over: TokenMap,
    pub payouts_created: usize,
}

#[derive(Default)]
struct UserTally {
    won: TokenMap,
    bets_won: u64,
    bets_lost: u64,
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    /// Settle a chapter once its winning outcome is known.
    ///
    /// Requires every pool of the chapter to be CLOSED. If nobody backed the
    /// winner the pools move to CARRIED_OVER, their totals stay untouched and
    /// the whole pot is recorded as the chapter's rollover. Otherwise bets
    /// are marked WON or LOST, one payout row is created per (user, token)
    /// and the treasury cut is appended per token.
    pub fn resolve_pool(
        &self,
        chapter_id: ChapterId,
        winning_outcome: OutcomeId,
    ) -> Result<ResolutionSummary, MarketError> {
        let now = self.now();
        let mut txn = self.store.write_txn()?;

        let pools = txn.chapter_pools(chapter_id)?;
        if pools.is_empty() {
            return Err(MarketError::ChapterHasNoPools(chapter_id));
        }
        let winning_pool_id = pools
            .iter()
            .find(|p| p.outcome_id == winning_outcome)
            .map(|p| p.id)
            .ok_or(MarketError::WinningOutcomeNotFound {
                chapter: chapter_id,
                outcome: winning_outcome,
            })?;
        if pools.iter().any(|p| p.status.is_final()) {
            return Err(MarketError::AlreadyResolved(chapter_id));
        }
        if pools.iter().any(|p| p.status == PoolStatus::Open) {
            return Err(MarketError::BettingStillOpen(chapter_id));
        }
        let mut chapter = txn
            .get_chapter(chapter_id)?
            .ok_or(MarketError::ChapterNotFound(chapter_id))?;

        let mut pot = TokenMap::new();
        for pool in &pools {
            pot.checked_merge(&pool.totals).ok_or(MarketError::Overflow)?;
            pot.checked_merge(&pool.carryover)
                .ok_or(MarketError::Overflow)?;
        }

        let mut confirmed: Vec<(PoolRecord, Vec<BetRecord>)> = Vec::with_capacity(pools.len());
        for pool in pools {
            let bets = txn
                .pool_bets(pool.id)?
                .into_iter()
                .filter(|b| b.status == BetStatus::Confirmed)
                .collect();
            confirmed.push((pool, bets));
        }
        let has_winners = confirmed
            .iter()
            .any(|(pool, bets)| pool.id == winning_pool_id && !bets.is_empty());

        let mut summary = ResolutionSummary {
            chapter_id,
            winning_outcome,
            winning_pool: winning_pool_id,
            has_winners,
            winner_count: 0,
            pot: pot.clone(),
            distributed: TokenMap::new(),
            treasury_cut: TokenMap::new(),
            dust: TokenMap::new(),
            rolled_over: TokenMap::new(),
            payouts_created: 0,
        };

        if has_winners {
            let stakes: Vec<WinningStake> = confirmed
                .iter()
                .filter(|(pool, _)| pool.id == winning_pool_id)
                .flat_map(|(_, bets)| bets)
                .map(|b| WinningStake {
                    bet_id: b.id,
                    token: b.token,
                    amount: b.amount,
                })
                .collect();
            let plan = plan_distribution(&pot, &stakes, self.params.winner_bps)?;
            self.apply_winners(
                &mut txn,
                chapter_id,
                winning_pool_id,
                confirmed,
                &plan,
                now,
                &mut summary,
            )?;
            summary.distributed = plan.distributed;
            summary.treasury_cut = plan.treasury_cut;
            summary.dust = plan.dust;
            summary.rolled_over = plan.rolled_over;
        } else {
            for (mut pool, _) in confirmed {
                pool.status = PoolStatus::CarriedOver;
                pool.resolved_at = Some(now);
                txn.put_pool(&pool)?;
            }
            summary.rolled_over = pot;
        }

        if let Some(mut outcome) = txn.get_outcome(winning_outcome)? {
            outcome.selected = true;
            txn.put_outcome(&outcome)?;
        }
        chapter.closed_at.get_or_insert(now);
        chapter.resolved_at = Some(now);
        chapter.winning_outcome = Some(winning_outcome);
        chapter.rollover = summary.rolled_over.clone();
        txn.put_chapter(&chapter)?;

        txn.commit()?;

        if has_winners {
            self.metrics.chapters_resolved.inc();
            self.metrics
                .payouts_created
                .inc_by(summary.payouts_created as u64);
        } else {
            self.metrics.chapters_carried_over.inc();
        }
        tracing::info!(
            chapter = %chapter_id,
            winning_outcome = %winning_outcome,
            has_winners,
            winners = summary.winner_count,
            payouts = summary.payouts_created,
            pot = ?summary.pot,
            rolled_over = ?summary.rolled_over,
            "chapter resolved"
        );

        Ok(summary)
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_winners(
        &self,
        txn: &mut impl LedgerWrite,
        chapter_id: ChapterId,
        winning_pool_id: PoolId,
        confirmed: Vec<(PoolRecord, Vec<BetRecord>)>,
        plan: &DistributionPlan,
        now: Timestamp,
        summary: &mut ResolutionSummary,
    ) -> Result<(), MarketError> {
        let mut tallies: BTreeMap<UserId, UserTally> = BTreeMap::new();
        let mut owed: BTreeMap<(UserId, TokenType), TokenAmount> = BTreeMap::new();

        for (mut pool, bets) in confirmed {
            let won = pool.id == winning_pool_id;
            for mut bet in bets {
                let tally = tallies.entry(bet.user.clone()).or_default();
                if won {
                    let payout = plan
                        .payouts
                        .get(&bet.id)
                        .copied()
                        .unwrap_or(TokenAmount::ZERO);
                    bet.status = BetStatus::Won;
                    bet.payout = Some(payout);
                    tally.bets_won += 1;
                    tally
                        .won
                        .checked_add(bet.token, payout)
                        .ok_or(MarketError::Overflow)?;
                    let entry = owed
                        .entry((bet.user.clone(), bet.token))
                        .or_insert(TokenAmount::ZERO);
                    *entry = entry.checked_add(payout).ok_or(MarketError::Overflow)?;
                } else {
                    bet.status = BetStatus::Lost;
                    tally.bets_lost += 1;
                }
                bet.settled_at = Some(now);
                txn.put_bet(&bet)?;
            }
            pool.status = PoolStatus::Resolved;
            pool.resolved_at = Some(now);
            txn.put_pool(&pool)?;
        }

        for ((user, token), amount) in owed {
            if amount.is_zero() {
                continue;
            }
            let payout_id = PayoutId::new(txn.next_id(Sequence::Payout)?);
            txn.put_payout(&PayoutRecord {
                id: payout_id,
                user,
                pool_id: winning_pool_id,
                chapter_id,
                token,
                amount,
                status: PayoutStatus::Pending,
                created_at: now,
                completed_at: None,
            })?;
            summary.payouts_created += 1;
        }

        for (token, cut) in plan.treasury_cut.iter() {
            let entry_id = TreasuryEntryId::new(txn.next_id(Sequence::Treasury)?);
            txn.append_treasury(&TreasuryEntry {
                id: entry_id,
                source: TreasurySource::TreasuryCut,
                token,
                amount: cut,
                chapter_id,
                pool_id: Some(winning_pool_id),
                bet_id: None,
                created_at: now,
            })?;
        }

        for (user, tally) in tallies {
            let mut stats = load_stats(&*txn, &user)?;
            stats
                .total_won
                .checked_merge(&tally.won)
                .ok_or(MarketError::Overflow)?;
            stats.bets_won += tally.bets_won;
            stats.bets_lost += tally.bets_lost;
            if tally.bets_won > 0 {
                record_chapter_win(&mut stats);
                summary.winner_count += 1;
            }
            txn.put_user_stats(&stats)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{OpenChapter, OutcomeSpec};
    use crate::placement::PlaceBet;
    use plotline_nullables::{NullClock, NullLedgerStore};
    use plotline_types::MarketParams;

    const USDC: u128 = 1_000_000;

    type Engine = MarketEngine<NullLedgerStore, NullClock>;

    fn open(engine: &Engine, chapter: u64, outcomes: &[u64]) {
        engine
            .open_chapter(OpenChapter {
                chapter_id: ChapterId::new(chapter),
                deadline: Timestamp::new(500),
                outcomes: outcomes
                    .iter()
                    .map(|&id| OutcomeSpec {
                        id: OutcomeId::new(id),
                        label: format!("o{id}"),
                    })
                    .collect(),
                carryover_from: None,
            })
            .unwrap();
    }

    fn place(engine: &Engine, user: &str, outcome: u64, gross: u128, tx_ref: &str) {
        engine
            .place_bet(PlaceBet {
                user: UserId::new(user),
                outcome_id: OutcomeId::new(outcome),
                gross_amount: TokenAmount::new(gross),
                token: TokenType::Usdc,
                tx_ref: tx_ref.into(),
            })
            .unwrap();
    }

    fn fee_free_engine() -> Engine {
        let params = MarketParams {
            fee_bps: 0,
            ..MarketParams::default()
        };
        MarketEngine::new(NullLedgerStore::new(), NullClock::new(100), params).unwrap()
    }

    #[test]
    fn worked_example_pays_153_and_102() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        place(&engine, "x", 1, 60 * USDC, "a");
        place(&engine, "y", 1, 40 * USDC, "b");
        place(&engine, "z", 2, 200 * USDC, "c");
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();

        let summary = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap();
        assert!(summary.has_winners);
        assert_eq!(summary.winner_count, 2);
        assert_eq!(summary.payouts_created, 2);
        assert_eq!(summary.pot.get(TokenType::Usdc).raw(), 300 * USDC);
        assert_eq!(summary.distributed.get(TokenType::Usdc).raw(), 255 * USDC);
        assert_eq!(summary.treasury_cut.get(TokenType::Usdc).raw(), 45 * USDC);

        let reader = engine.store().read_txn().unwrap();
        let pool = reader.pool_for_outcome(OutcomeId::new(1)).unwrap().unwrap();
        let payouts = reader.pool_payouts(pool.id).unwrap();
        let amounts: Vec<(String, u128)> = payouts
            .iter()
            .map(|p| (p.user.to_string(), p.amount.raw()))
            .collect();
        assert_eq!(
            amounts,
            vec![("x".to_string(), 153 * USDC), ("y".to_string(), 102 * USDC)]
        );

        let z = reader.user_bets(&UserId::new("z")).unwrap();
        assert_eq!(z[0].status, BetStatus::Lost);
        let x_stats = reader.get_user_stats(&UserId::new("x")).unwrap().unwrap();
        assert_eq!(x_stats.total_won.get(TokenType::Usdc).raw(), 153 * USDC);
        assert_eq!(x_stats.current_streak, 1);
        assert_eq!(x_stats.best_streak, 1);
        let z_stats = reader.get_user_stats(&UserId::new("z")).unwrap().unwrap();
        assert_eq!(z_stats.bets_lost, 1);
        assert!(reader
            .get_outcome(OutcomeId::new(1))
            .unwrap()
            .unwrap()
            .selected);
    }

    #[test]
    fn no_winner_rolls_whole_pot() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        place(&engine, "x", 2, 50 * USDC, "a");
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();

        let summary = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap();
        assert!(!summary.has_winners);
        assert_eq!(summary.payouts_created, 0);
        assert_eq!(summary.rolled_over, summary.pot);

        let reader = engine.store().read_txn().unwrap();
        let pools = reader.chapter_pools(ChapterId::new(1)).unwrap();
        assert!(pools.iter().all(|p| p.status == PoolStatus::CarriedOver));
        assert_eq!(
            pools[1].totals.get(TokenType::Usdc),
            TokenAmount::new(50 * USDC)
        );
        let bets = reader.pool_bets(pools[1].id).unwrap();
        assert_eq!(bets[0].status, BetStatus::Confirmed);
        assert!(reader.chapter_treasury(ChapterId::new(1)).unwrap().is_empty());
        let chapter = reader.get_chapter(ChapterId::new(1)).unwrap().unwrap();
        assert_eq!(chapter.pending_rollover(), Some(&summary.pot));
    }

    #[test]
    fn second_resolution_is_refused_and_writes_nothing() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        place(&engine, "x", 1, 10 * USDC, "a");
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();
        engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap();

        let err = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap_err();
        assert!(matches!(err, MarketError::AlreadyResolved(_)));

        let reader = engine.store().read_txn().unwrap();
        let pool = reader.pool_for_outcome(OutcomeId::new(1)).unwrap().unwrap();
        assert_eq!(reader.pool_payouts(pool.id).unwrap().len(), 1);
        assert_eq!(reader.chapter_treasury(ChapterId::new(1)).unwrap().len(), 1);
    }

    #[test]
    fn failed_commit_leaves_chapter_unresolved() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        place(&engine, "x", 1, 10 * USDC, "a");
        place(&engine, "y", 2, 10 * USDC, "b");
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();

        engine.store().fail_next_commit();
        let err = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap_err();
        assert!(matches!(err, MarketError::Store(_)));

        {
            let reader = engine.store().read_txn().unwrap();
            let pools = reader.chapter_pools(ChapterId::new(1)).unwrap();
            assert!(pools.iter().all(|p| p.status == PoolStatus::Closed));
            assert!(pools
                .iter()
                .all(|p| reader.pool_payouts(p.id).unwrap().is_empty()));
            assert!(reader.chapter_treasury(ChapterId::new(1)).unwrap().is_empty());
            let bets = reader.user_bets(&UserId::new("x")).unwrap();
            assert_eq!(bets[0].status, BetStatus::Confirmed);
            let stats = reader.get_user_stats(&UserId::new("x")).unwrap().unwrap();
            assert_eq!(stats.bets_won, 0);
            assert_eq!(stats.current_streak, 0);
        }

        let summary = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap();
        assert_eq!(summary.payouts_created, 1);
    }

    #[test]
    fn refuses_open_pools_and_unknown_outcomes() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        assert!(matches!(
            engine.resolve_pool(ChapterId::new(1), OutcomeId::new(1)),
            Err(MarketError::BettingStillOpen(_))
        ));
        assert!(matches!(
            engine.resolve_pool(ChapterId::new(1), OutcomeId::new(7)),
            Err(MarketError::WinningOutcomeNotFound { .. })
        ));
        assert!(matches!(
            engine.resolve_pool(ChapterId::new(2), OutcomeId::new(1)),
            Err(MarketError::ChapterHasNoPools(_))
        ));
    }

    #[test]
    fn streak_counts_once_per_chapter() {
        let engine = fee_free_engine();
        open(&engine, 1, &[1, 2]);
        place(&engine, "x", 1, 10 * USDC, "a");
        place(&engine, "x", 1, 20 * USDC, "b");
        place(&engine, "x", 2, 5 * USDC, "c");
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();
        let summary = engine
            .resolve_pool(ChapterId::new(1), OutcomeId::new(1))
            .unwrap();
        // Two winning bets in one token collapse into one payout row.
        assert_eq!(summary.payouts_created, 1);
        assert_eq!(summary.winner_count, 1);

        let reader = engine.store().read_txn().unwrap();
        let stats = reader.get_user_stats(&UserId::new("x")).unwrap().unwrap();
        assert_eq!(stats.current_streak, 1);
        assert_eq!(stats.bets_won, 2);
        assert_eq!(stats.bets_lost, 1);
    }
}
