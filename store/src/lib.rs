//! Ledger storage traits and record types for the Plotline settlement engine.
//!
//! Every storage backend (LMDB, in-memory for testing) implements these
//! traits. The engine depends only on the traits.

pub mod bet;
pub mod chapter;
pub mod error;
pub mod ledger;
pub mod meta;
pub mod payout;
pub mod pool;
pub mod treasury;
pub mod user;

pub use bet::BetRecord;
pub use chapter::{ChapterRecord, OutcomeRecord};
pub use error::StoreError;
pub use ledger::{LedgerRead, LedgerStore, LedgerWrite};
pub use meta::{MetaStore, Sequence};
pub use payout::PayoutRecord;
pub use pool::PoolRecord;
pub use treasury::TreasuryEntry;
pub use user::UserStats;
