//! Win-streak policy.
//!
//! A chapter win adds exactly one to the streak however many winning bets
//! or tokens the user held in it. Resetting on a loss is a separate command
//! because a user may hold bets on several chapters at once and only the
//! caller knows the order in which chapters should count.

use std::collections::BTreeSet;

use plotline_store::{LedgerRead, LedgerStore, LedgerWrite, UserStats};
use plotline_types::{BetStatus, ChapterId, Clock};

use crate::engine::MarketEngine;
use crate::MarketError;

pub(crate) fn record_chapter_win(stats: &mut UserStats) {
    stats.current_streak = stats.current_streak.saturating_add(1);
    stats.best_streak = stats.best_streak.max(stats.current_streak);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreakReset {
    pub chapter_id: ChapterId,
    /// Users whose non-zero streak was set back to zero.
    pub users_reset: usize,
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    /// Zero the current streak of every user who lost in a settled chapter
    /// without also winning in it.
    ///
    /// Safe to repeat: a second call finds the streaks already at zero.
    pub fn reset_losing_streaks(&self, chapter_id: ChapterId) -> Result<StreakReset, MarketError> {
        let mut txn = self.store.write_txn()?;

        let pools = txn.chapter_pools(chapter_id)?;
        if pools.is_empty() {
            return Err(MarketError::ChapterHasNoPools(chapter_id));
        }
        if !pools.iter().all(|p| p.status.is_final()) {
            return Err(MarketError::ChapterNotResolved(chapter_id));
        }

        let mut winners = BTreeSet::new();
        let mut losers = BTreeSet::new();
        for pool in &pools {
            for bet in txn.pool_bets(pool.id)? {
                if bet.status.is_win() {
                    winners.insert(bet.user);
                } else if bet.status == BetStatus::Lost {
                    losers.insert(bet.user);
                }
            }
        }

        let mut users_reset = 0;
        for user in losers.difference(&winners) {
            if let Some(mut stats) = txn.get_user_stats(user)? {
                if stats.current_streak > 0 {
                    stats.current_streak = 0;
                    txn.put_user_stats(&stats)?;
                    users_reset += 1;
                }
            }
        }

        if users_reset > 0 {
            txn.commit()?;
        }
        tracing::info!(chapter = %chapter_id, users = users_reset, "losing streaks reset");

        Ok(StreakReset {
            chapter_id,
            users_reset,
        })
    }
}
