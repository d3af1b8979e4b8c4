//! The settlement engine and its shared plumbing.
//!
//! Commands live in their own modules (`chapter`, `placement`, `resolution`,
//! `settlement`, `streak`) as further `impl` blocks on [`MarketEngine`].

use plotline_store::{LedgerRead, LedgerStore, UserStats};
use plotline_types::{Clock, MarketParams, Timestamp, UserId};

use crate::metrics::MarketMetrics;
use crate::MarketError;

/// Pari-mutuel settlement engine over a transactional ledger.
///
/// The engine keeps no state of its own between commands: every figure that
/// feeds a financial decision is re-read inside the command's transaction.
pub struct MarketEngine<S, C> {
    pub(crate) store: S,
    pub(crate) clock: C,
    pub(crate) params: MarketParams,
    pub(crate) metrics: MarketMetrics,
}

impl<S: LedgerStore, C: Clock> MarketEngine<S, C> {
    pub fn new(store: S, clock: C, params: MarketParams) -> Result<Self, MarketError> {
        params
            .validate()
            .map_err(|e| MarketError::InvalidParams(e.to_string()))?;
        Ok(Self {
            store,
            clock,
            params,
            metrics: MarketMetrics::new(),
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn params(&self) -> &MarketParams {
        &self.params
    }

    pub fn metrics(&self) -> &MarketMetrics {
        &self.metrics
    }

    pub(crate) fn now(&self) -> Timestamp {
        self.clock.now()
    }
}

pub(crate) fn check_user(user: &UserId) -> Result<(), MarketError> {
    if user.is_valid() {
        Ok(())
    } else {
        Err(MarketError::InvalidUser(user.as_str().to_string()))
    }
}

/// Load a user's stats row, or a zeroed one if the user has none yet.
pub(crate) fn load_stats(txn: &impl LedgerRead, user: &UserId) -> Result<UserStats, MarketError> {
    Ok(txn
        .get_user_stats(user)?
        .unwrap_or_else(|| UserStats::new(user.clone())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotline_nullables::{NullClock, NullLedgerStore};

    #[test]
    fn rejects_params_with_remainder() {
        let params = MarketParams {
            winner_bps: 8_000,
            treasury_bps: 1_500,
            ..MarketParams::default()
        };
        let result = MarketEngine::new(NullLedgerStore::new(), NullClock::new(0), params);
        assert!(matches!(result, Err(MarketError::InvalidParams(_))));
    }

    #[test]
    fn reads_time_through_clock() {
        let engine =
            MarketEngine::new(NullLedgerStore::new(), NullClock::new(50), MarketParams::default())
                .unwrap();
        engine.clock().advance(10);
        assert_eq!(engine.now(), Timestamp::new(60));
    }

    #[test]
    fn rejects_control_characters_in_user() {
        assert!(check_user(&UserId::new("alice")).is_ok());
        assert!(matches!(
            check_user(&UserId::new("bad\nuser")),
            Err(MarketError::InvalidUser(_))
        ));
    }
}
