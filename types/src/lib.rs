//! Fundamental types for the Plotline settlement engine.
//!
//! This crate defines the core types shared across every other crate in the workspace:
//! identifiers, token types, fixed-point amounts, timestamps, market parameters,
//! and lifecycle state enums.

pub mod amount;
pub mod error;
pub mod id;
pub mod params;
pub mod state;
pub mod time;
pub mod token;

pub use amount::TokenAmount;
pub use error::TypesError;
pub use id::{BetId, ChapterId, OutcomeId, PayoutId, PoolId, TreasuryEntryId, UserId};
pub use params::{MarketParams, BPS_DENOMINATOR};
pub use state::{BetStatus, PayoutStatus, PoolStatus, TreasurySource};
pub use time::{Clock, SystemClock, Timestamp};
pub use token::{TokenMap, TokenType};
