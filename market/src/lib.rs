//! Pari-mutuel settlement engine for the Plotline chapter markets.
//!
//! The [`MarketEngine`] accepts four commands from its collaborators
//! (open/close a chapter's betting, place a bet, resolve a chapter with its
//! winning outcome, claim a payout) and answers read-side projections over
//! the same ledger. Every command runs in exactly one ledger write
//! transaction and either commits in full or leaves no trace.

pub mod audit;
pub mod chapter;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod placement;
pub mod projection;
pub mod resolution;
pub mod settlement;
pub mod split;
pub mod streak;

pub use audit::ChapterAudit;
pub use chapter::{ChapterClosed, ChapterOpened, OpenChapter, OutcomeSpec};
pub use engine::MarketEngine;
pub use error::{ErrorKind, MarketError};
pub use metrics::MarketMetrics;
pub use placement::{BetReceipt, PlaceBet, MAX_TX_REF_LEN};
pub use projection::{
    ActivePool, ChapterOdds, ImpliedOdds, LeaderboardEntry, LeaderboardOrder, OutcomeOdds,
    PoolBreakdown, TokenOdds,
};
pub use resolution::ResolutionSummary;
pub use settlement::ClaimReceipt;
pub use streak::StreakReset;
