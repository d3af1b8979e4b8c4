//! Opening and closing a chapter's market.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use plotline_store::{
    ChapterRecord, LedgerRead, LedgerStore, LedgerWrite, OutcomeRecord, PoolRecord, Sequence,
};
use plotline_types::{ChapterId, Clock, OutcomeId, PoolId, PoolStatus, Timestamp, TokenMap};

use crate::engine::MarketEngine;
use crate::split::spread_evenly;
use crate::MarketError;

/// A candidate outcome supplied by the narrative subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSpec {
    pub id: OutcomeId,
    pub label: String,
}

/// Inbound command: open betting on a new chapter.
#[derive(Clone, Debug)]
pub struct OpenChapter {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    pub outcomes: Vec<OutcomeSpec>,
    /// Seed the new pools with this resolved chapter's rollover.
    pub carryover_from: Option<ChapterId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterOpened {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    /// One OPEN pool per outcome, in outcome order.
    pub pools: Vec<PoolRecord>,
    /// Total carryover spread across the new pools.
    pub carryover: TokenMap,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChapterClosed {
    pub chapter_id: ChapterId,
    /// Pools flipped from OPEN to CLOSED by this call.
    pub pools_closed: usize,
}

fn validate_outcomes(outcomes: &[OutcomeSpec]) -> Result<(), MarketError> {
    if outcomes.len() < 2 {
        return Err(MarketError::TooFewOutcomes(outcomes.len()));
    }
    let mut seen = BTreeSet::new();
    for outcome in outcomes {
        if !seen.insert(outcome.id) {
            return Err(MarketError::DuplicateOutcome(outcome.id));
        }
    }
    Ok(())
}

/// Claim the unused rollover of `source` for `target`, marking it consumed.
fn take_rollover(
    txn: &mut impl LedgerWrite,
    source: ChapterId,
    target: ChapterId,
) -> Result<TokenMap, MarketError> {
    let mut chapter = txn
        .get_chapter(source)?
        .ok_or(MarketError::ChapterNotFound(source))?;
    if let Some(into) = chapter.carried_into {
        return Err(MarketError::RolloverAlreadyUsed {
            chapter: source,
            into,
        });
    }
    let rollover = chapter
        .pending_rollover()
        .cloned()
        .ok_or(MarketError::NothingToCarry(source))?;
    chapter.carried_into = Some(target);
    txn.put_chapter(&chapter)?;
    Ok(rollover)
}

/// Per-pool carryover: every token split evenly, remainder units to the
/// first pools.
fn carryover_shares(total: &TokenMap, pools: usize) -> Vec<TokenMap> {
    let mut shares = vec![TokenMap::new(); pools];
    for (token, amount) in total.iter() {
        for (share, part) in shares.iter_mut().zip(spread_evenly(amount, pools)) {
            share.set(token, part);
        }
    }
    shares
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    /// Register a chapter with its outcomes and open one pool per outcome.
    pub fn open_chapter(&self, cmd: OpenChapter) -> Result<ChapterOpened, MarketError> {
        let now = self.now();
        validate_outcomes(&cmd.outcomes)?;
        if cmd.deadline <= now {
            return Err(MarketError::DeadlineNotInFuture {
                deadline: cmd.deadline,
                now,
            });
        }

        let mut txn = self.store.write_txn()?;

        if txn.get_chapter(cmd.chapter_id)?.is_some() {
            return Err(MarketError::ChapterExists(cmd.chapter_id));
        }
        for outcome in &cmd.outcomes {
            if txn.get_outcome(outcome.id)?.is_some() {
                return Err(MarketError::OutcomeExists(outcome.id));
            }
        }

        let carryover = match cmd.carryover_from {
            Some(source) => take_rollover(&mut txn, source, cmd.chapter_id)?,
            None => TokenMap::new(),
        };
        let shares = carryover_shares(&carryover, cmd.outcomes.len());

        let mut pools = Vec::with_capacity(cmd.outcomes.len());
        for (outcome, share) in cmd.outcomes.iter().zip(shares) {
            txn.put_outcome(&OutcomeRecord {
                id: outcome.id,
                chapter_id: cmd.chapter_id,
                label: outcome.label.clone(),
                selected: false,
            })?;
            let pool = PoolRecord {
                id: PoolId::new(txn.next_id(Sequence::Pool)?),
                chapter_id: cmd.chapter_id,
                outcome_id: outcome.id,
                status: PoolStatus::Open,
                totals: TokenMap::new(),
                carryover: share,
                voter_count: 0,
                created_at: now,
                closed_at: None,
                resolved_at: None,
            };
            txn.put_pool(&pool)?;
            pools.push(pool);
        }

        txn.put_chapter(&ChapterRecord {
            id: cmd.chapter_id,
            deadline: cmd.deadline,
            outcomes: cmd.outcomes.iter().map(|o| o.id).collect(),
            opened_at: now,
            closed_at: None,
            resolved_at: None,
            winning_outcome: None,
            rollover: TokenMap::new(),
            carried_from: cmd.carryover_from,
            carried_into: None,
        })?;
        txn.commit()?;

        self.metrics.chapters_opened.inc();
        tracing::info!(
            chapter = %cmd.chapter_id,
            outcomes = pools.len(),
            deadline = %cmd.deadline,
            carried_from = ?cmd.carryover_from,
            "chapter opened"
        );

        Ok(ChapterOpened {
            chapter_id: cmd.chapter_id,
            deadline: cmd.deadline,
            pools,
            carryover,
        })
    }

    /// Flip every OPEN pool of the chapter to CLOSED.
    ///
    /// Pools that are already CLOSED are left alone, so a retried call is
    /// harmless and reports zero pools closed.
    pub fn close_betting_for_chapter(
        &self,
        chapter_id: ChapterId,
    ) -> Result<ChapterClosed, MarketError> {
        let now = self.now();
        let mut txn = self.store.write_txn()?;

        let pools = txn.chapter_pools(chapter_id)?;
        if pools.is_empty() {
            return Err(MarketError::ChapterHasNoPools(chapter_id));
        }
        if pools.iter().any(|p| p.status.is_final()) {
            return Err(MarketError::AlreadyResolved(chapter_id));
        }

        let mut pools_closed = 0;
        for mut pool in pools {
            if pool.status == PoolStatus::Open {
                pool.status = PoolStatus::Closed;
                pool.closed_at = Some(now);
                txn.put_pool(&pool)?;
                pools_closed += 1;
            }
        }

        if pools_closed == 0 {
            tracing::debug!(chapter = %chapter_id, "betting already closed");
            return Ok(ChapterClosed {
                chapter_id,
                pools_closed,
            });
        }

        if let Some(mut chapter) = txn.get_chapter(chapter_id)? {
            chapter.closed_at.get_or_insert(now);
            txn.put_chapter(&chapter)?;
        }
        txn.commit()?;

        self.metrics.chapters_closed.inc();
        tracing::info!(chapter = %chapter_id, pools = pools_closed, "betting closed");

        Ok(ChapterClosed {
            chapter_id,
            pools_closed,
        })
    }
}
