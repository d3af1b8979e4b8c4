//! Request handlers and their wire types.
//!
//! Amounts cross the wire as decimal strings in the token's whole units
//! (`"100.5"` USDC is 100 500 000 raw). Every handler that touches the
//! ledger runs the engine call on the blocking pool.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use plotline_market::{
    ActivePool, BetReceipt, ChapterAudit, ChapterClosed, ChapterOdds, ChapterOpened,
    ClaimReceipt, LeaderboardEntry, LeaderboardOrder, MarketEngine, MarketError, OpenChapter,
    OutcomeSpec, PlaceBet, PoolBreakdown, ResolutionSummary, StreakReset,
};
use plotline_store::{BetRecord, LedgerStore, PoolRecord, UserStats};
use plotline_types::{
    BetId, BetStatus, ChapterId, Clock, OutcomeId, PoolId, PoolStatus, Timestamp, TokenMap,
    TokenType, UserId,
};
use plotline_utils::format_duration;

use crate::error::RpcError;
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::pagination::{paginate, PaginationMeta, PaginationParams};

pub type SharedEngine<S, C> = Arc<MarketEngine<S, C>>;

/// Default number of leaderboard rows.
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 50;
pub const MAX_LEADERBOARD_LIMIT: usize = 500;

/// Run an engine call on the blocking pool.
async fn run<S, C, T, F>(engine: &SharedEngine<S, C>, op: F) -> Result<T, RpcError>
where
    S: LedgerStore + 'static,
    C: Clock + 'static,
    T: Send + 'static,
    F: FnOnce(&MarketEngine<S, C>) -> Result<T, MarketError> + Send + 'static,
{
    let engine = Arc::clone(engine);
    tokio::task::spawn_blocking(move || op(&engine))
        .await
        .map_err(|e| RpcError::Server(format!("ledger task failed: {e}")))?
        .map_err(RpcError::from)
}

type Amounts = BTreeMap<TokenType, String>;

fn amounts(map: &TokenMap) -> Amounts {
    map.iter()
        .map(|(token, amount)| (token, token.format_amount(amount)))
        .collect()
}

// ── Views ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PoolView {
    pub id: PoolId,
    pub chapter_id: ChapterId,
    pub outcome_id: OutcomeId,
    pub status: PoolStatus,
    pub totals: Amounts,
    pub carryover: Amounts,
    pub voter_count: u64,
    pub created_at: Timestamp,
    pub closed_at: Option<Timestamp>,
    pub resolved_at: Option<Timestamp>,
}

impl From<&PoolRecord> for PoolView {
    fn from(pool: &PoolRecord) -> Self {
        Self {
            id: pool.id,
            chapter_id: pool.chapter_id,
            outcome_id: pool.outcome_id,
            status: pool.status,
            totals: amounts(&pool.totals),
            carryover: amounts(&pool.carryover),
            voter_count: pool.voter_count,
            created_at: pool.created_at,
            closed_at: pool.closed_at,
            resolved_at: pool.resolved_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BetView {
    pub id: BetId,
    pub user: UserId,
    pub pool_id: PoolId,
    pub outcome_id: OutcomeId,
    pub chapter_id: ChapterId,
    pub token: TokenType,
    pub gross_amount: String,
    pub fee_paid: String,
    pub amount: String,
    pub tx_ref: String,
    pub status: BetStatus,
    pub placed_at: Timestamp,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<Timestamp>,
}

impl From<&BetRecord> for BetView {
    fn from(bet: &BetRecord) -> Self {
        let fmt = |amount| bet.token.format_amount(amount);
        Self {
            id: bet.id,
            user: bet.user.clone(),
            pool_id: bet.pool_id,
            outcome_id: bet.outcome_id,
            chapter_id: bet.chapter_id,
            token: bet.token,
            gross_amount: fmt(bet.gross_amount),
            fee_paid: fmt(bet.fee_paid),
            amount: fmt(bet.amount),
            tx_ref: bet.tx_ref.clone(),
            status: bet.status,
            placed_at: bet.placed_at,
            payout: bet.payout.map(fmt),
            settled_at: bet.settled_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct UserStatsView {
    pub user: UserId,
    pub total_wagered: Amounts,
    pub total_won: Amounts,
    pub bets_placed: u64,
    pub bets_won: u64,
    pub bets_lost: u64,
    pub win_rate_bps: u32,
    pub current_streak: u32,
    pub best_streak: u32,
}

impl From<&UserStats> for UserStatsView {
    fn from(stats: &UserStats) -> Self {
        Self {
            user: stats.user.clone(),
            total_wagered: amounts(&stats.total_wagered),
            total_won: amounts(&stats.total_won),
            bets_placed: stats.bets_placed,
            bets_won: stats.bets_won,
            bets_lost: stats.bets_lost,
            win_rate_bps: stats.win_rate_bps(),
            current_streak: stats.current_streak,
            best_streak: stats.best_streak,
        }
    }
}

// ── Chapters ─────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct OpenChapterRequest {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    pub outcomes: Vec<OutcomeSpec>,
    #[serde(default)]
    pub carryover_from: Option<ChapterId>,
}

#[derive(Debug, Serialize)]
pub struct ChapterOpenedResponse {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    pub pools: Vec<PoolView>,
    pub carryover: Amounts,
}

impl From<ChapterOpened> for ChapterOpenedResponse {
    fn from(opened: ChapterOpened) -> Self {
        Self {
            chapter_id: opened.chapter_id,
            deadline: opened.deadline,
            pools: opened.pools.iter().map(PoolView::from).collect(),
            carryover: amounts(&opened.carryover),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChapterClosedResponse {
    pub chapter_id: ChapterId,
    pub pools_closed: usize,
}

impl From<ChapterClosed> for ChapterClosedResponse {
    fn from(closed: ChapterClosed) -> Self {
        Self {
            chapter_id: closed.chapter_id,
            pools_closed: closed.pools_closed,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ResolveRequest {
    pub winning_outcome: OutcomeId,
}

#[derive(Debug, Serialize)]
pub struct ResolutionResponse {
    pub chapter_id: ChapterId,
    pub winning_outcome: OutcomeId,
    pub winning_pool: PoolId,
    pub has_winners: bool,
    pub winner_count: usize,
    pub pot: Amounts,
    pub distributed: Amounts,
    pub treasury_cut: Amounts,
    pub dust: Amounts,
    pub rolled_over: Amounts,
    pub payouts_created: usize,
}

impl From<ResolutionSummary> for ResolutionResponse {
    fn from(s: ResolutionSummary) -> Self {
        Self {
            chapter_id: s.chapter_id,
            winning_outcome: s.winning_outcome,
            winning_pool: s.winning_pool,
            has_winners: s.has_winners,
            winner_count: s.winner_count,
            pot: amounts(&s.pot),
            distributed: amounts(&s.distributed),
            treasury_cut: amounts(&s.treasury_cut),
            dust: amounts(&s.dust),
            rolled_over: amounts(&s.rolled_over),
            payouts_created: s.payouts_created,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StreakResetResponse {
    pub chapter_id: ChapterId,
    pub users_reset: usize,
}

impl From<StreakReset> for StreakResetResponse {
    fn from(reset: StreakReset) -> Self {
        Self {
            chapter_id: reset.chapter_id,
            users_reset: reset.users_reset,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenOddsView {
    pub token: TokenType,
    pub pool_amount: String,
    pub total: String,
    /// Decimal multiplier such as `"2.5000"`, or `"unbounded"`.
    pub implied_odds: String,
    pub share_bps: u32,
}

#[derive(Debug, Serialize)]
pub struct OutcomeOddsView {
    pub outcome_id: OutcomeId,
    pub pool_id: PoolId,
    pub label: String,
    pub status: PoolStatus,
    pub tokens: Vec<TokenOddsView>,
}

#[derive(Debug, Serialize)]
pub struct OddsResponse {
    pub chapter_id: ChapterId,
    pub deadline: Timestamp,
    pub outcomes: Vec<OutcomeOddsView>,
}

impl From<ChapterOdds> for OddsResponse {
    fn from(odds: ChapterOdds) -> Self {
        let outcomes = odds
            .outcomes
            .into_iter()
            .map(|o| OutcomeOddsView {
                outcome_id: o.outcome_id,
                pool_id: o.pool_id,
                label: o.label,
                status: o.status,
                tokens: o
                    .tokens
                    .into_iter()
                    .map(|t| TokenOddsView {
                        token: t.token,
                        pool_amount: t.token.format_amount(t.pool_amount),
                        total: t.token.format_amount(t.total),
                        implied_odds: t.implied_odds.to_string(),
                        share_bps: t.share_bps,
                    })
                    .collect(),
            })
            .collect();
        Self {
            chapter_id: odds.chapter_id,
            deadline: odds.deadline,
            outcomes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AuditResponse {
    pub chapter_id: ChapterId,
    pub stakes: Amounts,
    pub pool_totals: Amounts,
    pub carryover_in: Amounts,
    pub fees: Amounts,
    pub payouts: Amounts,
    pub treasury_cut: Amounts,
    pub rollover: Amounts,
    pub settled: bool,
    pub balanced: bool,
}

impl AuditResponse {
    fn new(chapter_id: ChapterId, audit: &ChapterAudit) -> Self {
        Self {
            chapter_id,
            stakes: amounts(&audit.stakes),
            pool_totals: amounts(&audit.pool_totals),
            carryover_in: amounts(&audit.carryover_in),
            fees: amounts(&audit.fees),
            payouts: amounts(&audit.payouts),
            treasury_cut: amounts(&audit.treasury_cut),
            rollover: amounts(&audit.rollover),
            settled: audit.settled,
            balanced: audit.is_balanced(),
        }
    }
}

pub async fn open_chapter<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiJson(req): ApiJson<OpenChapterRequest>,
) -> Result<(StatusCode, Json<ChapterOpenedResponse>), RpcError> {
    let cmd = OpenChapter {
        chapter_id: req.chapter_id,
        deadline: req.deadline,
        outcomes: req.outcomes,
        carryover_from: req.carryover_from,
    };
    let opened = run(&engine, move |e| e.open_chapter(cmd)).await?;
    Ok((StatusCode::CREATED, Json(opened.into())))
}

pub async fn close_chapter<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<ChapterClosedResponse>, RpcError> {
    let closed = run(&engine, move |e| e.close_betting_for_chapter(ChapterId::new(id))).await?;
    Ok(Json(closed.into()))
}

pub async fn resolve_chapter<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
    ApiJson(req): ApiJson<ResolveRequest>,
) -> Result<Json<ResolutionResponse>, RpcError> {
    let summary = run(&engine, move |e| {
        e.resolve_pool(ChapterId::new(id), req.winning_outcome)
    })
    .await?;
    Ok(Json(summary.into()))
}

pub async fn reset_streaks<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<StreakResetResponse>, RpcError> {
    let reset = run(&engine, move |e| e.reset_losing_streaks(ChapterId::new(id))).await?;
    Ok(Json(reset.into()))
}

pub async fn chapter_odds<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<OddsResponse>, RpcError> {
    let odds = run(&engine, move |e| e.chapter_odds(ChapterId::new(id))).await?;
    Ok(Json(odds.into()))
}

pub async fn chapter_audit<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<AuditResponse>, RpcError> {
    let chapter_id = ChapterId::new(id);
    let audit = run(&engine, move |e| e.chapter_audit(chapter_id)).await?;
    Ok(Json(AuditResponse::new(chapter_id, &audit)))
}

// ── Bets and claims ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlaceBetRequest {
    pub user: String,
    pub outcome_id: OutcomeId,
    /// Gross stake in whole token units.
    pub amount: String,
    pub token: TokenType,
    pub tx_ref: String,
}

#[derive(Debug, Serialize)]
pub struct BetReceiptResponse {
    pub bet_id: BetId,
    pub pool_id: PoolId,
    pub token: TokenType,
    pub net_amount: String,
    pub fee: String,
}

impl From<BetReceipt> for BetReceiptResponse {
    fn from(r: BetReceipt) -> Self {
        Self {
            bet_id: r.bet_id,
            pool_id: r.pool_id,
            token: r.token,
            net_amount: r.token.format_amount(r.net_amount),
            fee: r.token.format_amount(r.fee),
        }
    }
}

pub async fn place_bet<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiJson(req): ApiJson<PlaceBetRequest>,
) -> Result<(StatusCode, Json<BetReceiptResponse>), RpcError> {
    let cmd = PlaceBet {
        gross_amount: req.token.parse_amount(&req.amount)?,
        user: UserId::new(req.user),
        outcome_id: req.outcome_id,
        token: req.token,
        tx_ref: req.tx_ref,
    };
    let receipt = run(&engine, move |e| e.place_bet(cmd)).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}

#[derive(Debug, Deserialize)]
pub struct ClaimRequest {
    pub user: String,
    pub pool_id: PoolId,
}

#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub user: UserId,
    pub pool_id: PoolId,
    pub claimed: Amounts,
    pub payouts_claimed: usize,
    pub bets_claimed: usize,
}

impl From<ClaimReceipt> for ClaimResponse {
    fn from(r: ClaimReceipt) -> Self {
        Self {
            claimed: amounts(&r.claimed),
            user: r.user,
            pool_id: r.pool_id,
            payouts_claimed: r.payouts_claimed,
            bets_claimed: r.bets_claimed,
        }
    }
}

pub async fn claim<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiJson(req): ApiJson<ClaimRequest>,
) -> Result<Json<ClaimResponse>, RpcError> {
    let user = UserId::new(req.user);
    let receipt = run(&engine, move |e| e.claim_winnings(user, req.pool_id)).await?;
    Ok(Json(receipt.into()))
}

// ── Pools ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct ActivePoolView {
    #[serde(flatten)]
    pub pool: PoolView,
    pub label: String,
    pub deadline: Timestamp,
    /// Time left before betting closes, e.g. `"2h 5m"`.
    pub closes_in: String,
}

#[derive(Debug, Serialize)]
pub struct ActivePoolsResponse {
    pub pools: Vec<ActivePoolView>,
}

pub async fn active_pools<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
) -> Result<Json<ActivePoolsResponse>, RpcError> {
    let (pools, now): (Vec<ActivePool>, Timestamp) =
        run(&engine, |e| Ok((e.active_pools()?, e.clock().now()))).await?;
    let pools = pools
        .iter()
        .map(|active| ActivePoolView {
            pool: PoolView::from(&active.pool),
            label: active.label.clone(),
            deadline: active.deadline,
            closes_in: format_duration(active.deadline.secs_until(now)),
        })
        .collect();
    Ok(Json(ActivePoolsResponse { pools }))
}

#[derive(Debug, Serialize)]
pub struct PoolBreakdownResponse {
    pub pool: PoolView,
    pub bets: Vec<BetView>,
}

impl From<PoolBreakdown> for PoolBreakdownResponse {
    fn from(b: PoolBreakdown) -> Self {
        Self {
            pool: PoolView::from(&b.pool),
            bets: b.bets.iter().map(BetView::from).collect(),
        }
    }
}

pub async fn pool_breakdown<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(id): ApiPath<u64>,
) -> Result<Json<PoolBreakdownResponse>, RpcError> {
    let breakdown = run(&engine, move |e| e.pool_breakdown(PoolId::new(id))).await?;
    Ok(Json(breakdown.into()))
}

// ── Users ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct UserBetsResponse {
    pub bets: Vec<BetView>,
    #[serde(flatten)]
    pub pagination: PaginationMeta,
}

pub async fn user_bets<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(user): ApiPath<String>,
    ApiQuery(page): ApiQuery<PaginationParams>,
) -> Result<Json<UserBetsResponse>, RpcError> {
    page.decode_cursor()?;
    let user = UserId::new(user);
    let bets = run(&engine, move |e| e.user_bets(&user)).await?;
    let (bets, pagination) = paginate(bets, &page, |bet| bet.id.get())?;
    Ok(Json(UserBetsResponse {
        bets: bets.iter().map(BetView::from).collect(),
        pagination,
    }))
}

pub async fn user_stats<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiPath(user): ApiPath<String>,
) -> Result<Json<UserStatsView>, RpcError> {
    let user = UserId::new(user);
    let stats = run(&engine, move |e| e.user_stats(&user)).await?;
    Ok(Json(UserStatsView::from(&stats)))
}

#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    /// `winnings` (default) or `win_rate`.
    pub order: Option<String>,
    /// Token ranked by `winnings`; defaults to USDC.
    pub token: Option<TokenType>,
    pub limit: Option<usize>,
}

impl LeaderboardQuery {
    fn order(&self) -> Result<LeaderboardOrder, RpcError> {
        match self.order.as_deref().unwrap_or("winnings") {
            "winnings" => Ok(LeaderboardOrder::Winnings {
                token: self.token.unwrap_or(TokenType::Usdc),
            }),
            "win_rate" => Ok(LeaderboardOrder::WinRate),
            other => Err(RpcError::InvalidRequest(format!(
                "unknown leaderboard order '{other}' (expected 'winnings' or 'win_rate')"
            ))),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LeaderboardEntryView {
    pub rank: usize,
    #[serde(flatten)]
    pub stats: UserStatsView,
}

#[derive(Debug, Serialize)]
pub struct LeaderboardResponse {
    pub entries: Vec<LeaderboardEntryView>,
}

pub async fn leaderboard<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
    ApiQuery(query): ApiQuery<LeaderboardQuery>,
) -> Result<Json<LeaderboardResponse>, RpcError> {
    let order = query.order()?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LEADERBOARD_LIMIT)
        .clamp(1, MAX_LEADERBOARD_LIMIT);
    let entries: Vec<LeaderboardEntry> = run(&engine, move |e| e.leaderboard(order, limit)).await?;
    Ok(Json(LeaderboardResponse {
        entries: entries
            .iter()
            .map(|entry| LeaderboardEntryView {
                rank: entry.rank,
                stats: UserStatsView::from(&entry.stats),
            })
            .collect(),
    }))
}

// ── Service ──────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
}

pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { ok: true })
}

pub async fn metrics<S: LedgerStore + 'static, C: Clock + 'static>(
    State(engine): State<SharedEngine<S, C>>,
) -> Response {
    match engine.metrics().encode() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => RpcError::Server(format!("metrics encoding failed: {e}")).into_response(),
    }
}
