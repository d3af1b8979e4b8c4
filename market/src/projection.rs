//! Read-side projections.
//!
//! Each projection runs against a single read snapshot, so it never blocks
//! and is never blocked by a command in flight. The free functions take any
//! [`LedgerRead`]; the engine methods open a fresh snapshot and delegate.

use std::cmp::Reverse;
use std::fmt;

use plotline_store::{BetRecord, LedgerRead, LedgerStore, PoolRecord, UserStats};
use plotline_types::{
    ChapterId, Clock, OutcomeId, PoolId, PoolStatus, Timestamp, TokenAmount, TokenType, UserId,
    BPS_DENOMINATOR,
};

use crate::engine::MarketEngine;
use crate::MarketError;

/// Fixed-point scale of [`ImpliedOdds::Finite`]: 25 000 means 2.5×.
pub const ODDS_SCALE: u128 = 10_000;

/// Pari-mutuel odds of one outcome: the whole pot over the outcome's pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImpliedOdds {
    /// Odds scaled by [`ODDS_SCALE`], rounded down.
    Finite(u128),
    /// Nobody has backed the outcome yet.
    Unbounded,
}

impl ImpliedOdds {
    fn compute(total: TokenAmount, pool: TokenAmount) -> Self {
        if pool.is_zero() {
            return ImpliedOdds::Unbounded;
        }
        match total.raw().checked_mul(ODDS_SCALE) {
            Some(scaled) => ImpliedOdds::Finite(scaled / pool.raw()),
            None => ImpliedOdds::Finite(total.raw() / pool.raw() * ODDS_SCALE),
        }
    }
}

impl fmt::Display for ImpliedOdds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImpliedOdds::Finite(scaled) => {
                write!(f, "{}.{:04}", scaled / ODDS_SCALE, scaled % ODDS_SCALE)
            }
            ImpliedOdds::Unbounded => f.write_str("unbounded"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActivePool {
    pub pool: PoolRecord,
    pub label: String,
    pub deadline: Timestamp,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PoolBreakdown {
    pub pool: PoolRecord,
    pub bets: Vec<BetRecord>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenOdds {
    pub token: TokenType,
    /// Stake plus carryover held by this outcome's pool.
    pub pool_amount: TokenAmount,
    /// The same across every outcome of the chapter.
    pub total: TokenAmount,
    pub implied_odds: ImpliedOdds,
    /// `pool_amount / total` in basis points; zero while the pot is empty.
    pub share_bps: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutcomeOdds {
    pub outcome_id: OutcomeId,
    pub pool_id: PoolId,
    pub label: String,
    pub status: PoolStatus,
    pub tokens: Vec<TokenOdds>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChapterOdds {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    pub outcomes: Vec<OutcomeOdds>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LeaderboardOrder {
    /// Most won in one token first.
    Winnings { token: TokenType },
    /// Highest share of resolved bets won first.
    WinRate,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeaderboardEntry {
    /// 1-based position.
    pub rank: usize,
    pub stats: UserStats,
    pub win_rate_bps: u32,
}

fn label_of(reader: &impl LedgerRead, outcome: OutcomeId) -> Result<String, MarketError> {
    Ok(reader
        .get_outcome(outcome)?
        .map(|o| o.label)
        .unwrap_or_default())
}

/// Every OPEN pool with its chapter deadline.
pub fn active_pools(reader: &impl LedgerRead) -> Result<Vec<ActivePool>, MarketError> {
    let mut active = Vec::new();
    for pool in reader.iter_pools()? {
        if pool.status != PoolStatus::Open {
            continue;
        }
        let deadline = reader
            .get_chapter(pool.chapter_id)?
            .ok_or(MarketError::ChapterNotFound(pool.chapter_id))?
            .deadline;
        let label = label_of(reader, pool.outcome_id)?;
        active.push(ActivePool {
            pool,
            label,
            deadline,
        });
    }
    Ok(active)
}

pub fn pool_breakdown(reader: &impl LedgerRead, pool_id: PoolId) -> Result<PoolBreakdown, MarketError> {
    let pool = reader
        .get_pool(pool_id)?
        .ok_or(MarketError::PoolNotFound(pool_id))?;
    let bets = reader.pool_bets(pool_id)?;
    Ok(PoolBreakdown { pool, bets })
}

/// Implied odds and pot share of every outcome of a chapter, per token.
pub fn chapter_odds(reader: &impl LedgerRead, chapter_id: ChapterId) -> Result<ChapterOdds, MarketError> {
    let chapter = reader
        .get_chapter(chapter_id)?
        .ok_or(MarketError::ChapterNotFound(chapter_id))?;
    let pools = reader.chapter_pools(chapter_id)?;

    let pool_amount = |pool: &PoolRecord, token: TokenType| {
        pool.totals
            .get(token)
            .checked_add(pool.carryover.get(token))
            .ok_or(MarketError::Overflow)
    };

    let mut totals = Vec::with_capacity(TokenType::ALL.len());
    for token in TokenType::ALL {
        let mut total = TokenAmount::ZERO;
        for pool in &pools {
            total = total
                .checked_add(pool_amount(pool, token)?)
                .ok_or(MarketError::Overflow)?;
        }
        totals.push((token, total));
    }

    let mut outcomes = Vec::with_capacity(pools.len());
    for pool in &pools {
        let mut tokens = Vec::with_capacity(totals.len());
        for &(token, total) in &totals {
            let amount = pool_amount(pool, token)?;
            let share_bps = if total.is_zero() {
                0
            } else {
                amount
                    .mul_div_floor(TokenAmount::new(BPS_DENOMINATOR as u128), total)
                    .ok_or(MarketError::Overflow)?
                    .raw() as u32
            };
            tokens.push(TokenOdds {
                token,
                pool_amount: amount,
                total,
                implied_odds: ImpliedOdds::compute(total, amount),
                share_bps,
            });
        }
        outcomes.push(OutcomeOdds {
            outcome_id: pool.outcome_id,
            pool_id: pool.id,
            label: label_of(reader, pool.outcome_id)?,
            status: pool.status,
            tokens,
        });
    }

    Ok(ChapterOdds {
        chapter_id,
        deadline: chapter.deadline,
        outcomes,
    })
}

/// A user's bets, newest first.
pub fn user_bets(reader: &impl LedgerRead, user: &UserId) -> Result<Vec<BetRecord>, MarketError> {
    let mut bets = reader.user_bets(user)?;
    bets.reverse();
    Ok(bets)
}

pub fn user_stats(reader: &impl LedgerRead, user: &UserId) -> Result<UserStats, MarketError> {
    reader
        .get_user_stats(user)?
        .ok_or_else(|| MarketError::UserNotFound(user.clone()))
}

/// Users with at least `min_resolved_bets` resolved bets, best first.
/// Ties fall back to user id order.
pub fn leaderboard(
    reader: &impl LedgerRead,
    order: LeaderboardOrder,
    min_resolved_bets: u64,
    limit: usize,
) -> Result<Vec<LeaderboardEntry>, MarketError> {
    let mut eligible: Vec<UserStats> = reader
        .iter_user_stats()?
        .into_iter()
        .filter(|s| s.resolved_bets() >= min_resolved_bets)
        .collect();

    match order {
        LeaderboardOrder::Winnings { token } => eligible
            .sort_by(|a, b| {
                (Reverse(a.total_won.get(token)), &a.user).cmp(&(Reverse(b.total_won.get(token)), &b.user))
            }),
        LeaderboardOrder::WinRate => eligible.sort_by(|a, b| {
            (Reverse(a.win_rate_bps()), &a.user).cmp(&(Reverse(b.win_rate_bps()), &b.user))
        }),
    }

    Ok(eligible
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, stats)| LeaderboardEntry {
            rank: i + 1,
            win_rate_bps: stats.win_rate_bps(),
            stats,
        })
        .collect())
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    pub fn active_pools(&self) -> Result<Vec<ActivePool>, MarketError> {
        let reader = self.store.read_txn()?;
        active_pools(&reader)
    }

    pub fn pool_breakdown(&self, pool_id: PoolId) -> Result<PoolBreakdown, MarketError> {
        let reader = self.store.read_txn()?;
        pool_breakdown(&reader, pool_id)
    }

    pub fn chapter_odds(&self, chapter_id: ChapterId) -> Result<ChapterOdds, MarketError> {
        let reader = self.store.read_txn()?;
        chapter_odds(&reader, chapter_id)
    }

    pub fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, MarketError> {
        let reader = self.store.read_txn()?;
        user_bets(&reader, user)
    }

    pub fn user_stats(&self, user: &UserId) -> Result<UserStats, MarketError> {
        let reader = self.store.read_txn()?;
        user_stats(&reader, user)
    }

    /// Leaderboard using the configured minimum resolved-bet threshold.
    pub fn leaderboard(
        &self,
        order: LeaderboardOrder,
        limit: usize,
    ) -> Result<Vec<LeaderboardEntry>, MarketError> {
        let reader = self.store.read_txn()?;
        tracing::debug!(?order, limit, "building leaderboard");
        leaderboard(
            &reader,
            order,
            self.params.leaderboard_min_resolved_bets,
            limit,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chapter::{OpenChapter, OutcomeSpec};
    use crate::placement::PlaceBet;
    use plotline_nullables::{NullClock, NullLedgerStore};
    use plotline_store::LedgerWrite;
    use plotline_types::MarketParams;

    type Engine = MarketEngine<NullLedgerStore, NullClock>;

    fn engine() -> Engine {
        let params = MarketParams {
            fee_bps: 0,
            ..MarketParams::default()
        };
        let engine = Engine::new(NullLedgerStore::new(), NullClock::new(0), params).unwrap();
        engine
            .open_chapter(OpenChapter {
                chapter_id: ChapterId::new(1),
                deadline: Timestamp::new(100),
                outcomes: (1..=3)
                    .map(|id| OutcomeSpec {
                        id: OutcomeId::new(id),
                        label: format!("path {id}"),
                    })
                    .collect(),
                carryover_from: None,
            })
            .unwrap();
        engine
    }

    fn place(engine: &Engine, user: &str, outcome: u64, gross: u128, tx: &str) {
        engine
            .place_bet(PlaceBet {
                user: UserId::new(user),
                outcome_id: OutcomeId::new(outcome),
                gross_amount: TokenAmount::new(gross),
                token: TokenType::Usdc,
                tx_ref: tx.into(),
            })
            .unwrap();
    }

    #[test]
    fn odds_and_shares() {
        let engine = engine();
        place(&engine, "a", 1, 300, "t1");
        place(&engine, "b", 2, 100, "t2");

        let odds = engine.chapter_odds(ChapterId::new(1)).unwrap();
        assert_eq!(odds.outcomes.len(), 3);
        let usdc = |i: usize| {
            odds.outcomes[i]
                .tokens
                .iter()
                .find(|t| t.token == TokenType::Usdc)
                .cloned()
                .unwrap()
        };
        assert_eq!(usdc(0).implied_odds, ImpliedOdds::Finite(13_333));
        assert_eq!(usdc(0).share_bps, 7_500);
        assert_eq!(usdc(1).implied_odds, ImpliedOdds::Finite(40_000));
        assert_eq!(usdc(1).implied_odds.to_string(), "4.0000");
        assert_eq!(usdc(2).implied_odds, ImpliedOdds::Unbounded);
        assert_eq!(usdc(2).share_bps, 0);
        assert_eq!(odds.outcomes[2].label, "path 3");
    }

    #[test]
    fn empty_pot_is_all_sentinels() {
        let engine = engine();
        let odds = engine.chapter_odds(ChapterId::new(1)).unwrap();
        assert!(odds
            .outcomes
            .iter()
            .flat_map(|o| &o.tokens)
            .all(|t| t.implied_odds == ImpliedOdds::Unbounded && t.share_bps == 0));
    }

    #[test]
    fn active_pools_drop_after_close() {
        let engine = engine();
        let active = engine.active_pools().unwrap();
        assert_eq!(active.len(), 3);
        assert_eq!(active[0].deadline, Timestamp::new(100));
        engine.close_betting_for_chapter(ChapterId::new(1)).unwrap();
        assert!(engine.active_pools().unwrap().is_empty());
    }

    #[test]
    fn breakdown_and_history() {
        let engine = engine();
        place(&engine, "a", 1, 10, "t1");
        place(&engine, "a", 2, 20, "t2");
        place(&engine, "b", 1, 30, "t3");

        let pool = engine.active_pools().unwrap()[0].pool.id;
        let breakdown = engine.pool_breakdown(pool).unwrap();
        assert_eq!(breakdown.bets.len(), 2);
        assert!(matches!(
            engine.pool_breakdown(PoolId::new(99)),
            Err(MarketError::PoolNotFound(_))
        ));

        let history = engine.user_bets(&UserId::new("a")).unwrap();
        assert_eq!(history[0].tx_ref, "t2");
        assert_eq!(history[1].tx_ref, "t1");
        assert_eq!(engine.user_stats(&UserId::new("a")).unwrap().bets_placed, 2);
        assert!(matches!(
            engine.user_stats(&UserId::new("nobody")),
            Err(MarketError::UserNotFound(_))
        ));
    }

    #[test]
    fn leaderboard_filters_and_orders() {
        let store = NullLedgerStore::new();
        {
            let mut txn = store.write_txn().unwrap();
            for (name, won, lost, usdc) in [
                ("carol", 6, 4, 500),
                ("alice", 8, 2, 500),
                ("bob", 1, 1, 9_000),
                ("dave", 3, 7, 900),
            ] {
                let mut stats = UserStats::new(UserId::new(name));
                stats.bets_won = won;
                stats.bets_lost = lost;
                stats.total_won.set(TokenType::Usdc, TokenAmount::new(usdc));
                txn.put_user_stats(&stats).unwrap();
            }
            txn.commit().unwrap();
        }
        let reader = store.read_txn().unwrap();

        let by_usdc = leaderboard(
            &reader,
            LeaderboardOrder::Winnings {
                token: TokenType::Usdc,
            },
            10,
            10,
        )
        .unwrap();
        let names: Vec<&str> = by_usdc.iter().map(|e| e.stats.user.as_str()).collect();
        // bob has too few resolved bets; alice and carol tie on winnings.
        assert_eq!(names, vec!["dave", "alice", "carol"]);
        assert_eq!(by_usdc[0].rank, 1);

        let by_rate = leaderboard(&reader, LeaderboardOrder::WinRate, 10, 2).unwrap();
        let names: Vec<&str> = by_rate.iter().map(|e| e.stats.user.as_str()).collect();
        assert_eq!(names, vec!["alice", "carol"]);
        assert_eq!(by_rate[0].win_rate_bps, 8_000);
    }
}
