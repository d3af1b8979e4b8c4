//! JSON HTTP surface for the Plotline settlement engine.
//!
//! Exposes the engine's commands (open/close/resolve a chapter, place a bet,
//! claim a payout, reset streaks) and its read-side projections (odds,
//! active pools, user history, leaderboard, audit), plus `/metrics` and
//! `/health`.

pub mod error;
pub mod extract;
pub mod handlers;
pub mod pagination;
pub mod server;

pub use error::RpcError;
pub use handlers::SharedEngine;
pub use server::{router, RpcServer};
