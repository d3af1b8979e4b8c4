//! Settlement engine errors.

use plotline_store::StoreError;
use plotline_types::{ChapterId, OutcomeId, PoolId, PoolStatus, Timestamp, UserId};
use thiserror::Error;

/// How a caller should treat a failed command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed input, rejected before any transaction begins.
    Validation,
    /// The referenced chapter, outcome, pool, payout or user does not exist.
    NotFound,
    /// The target exists but is in the wrong state for this command.
    State,
    /// Storage failure or arithmetic overflow. Nothing was committed.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::State => "state",
            ErrorKind::Internal => "internal",
        }
    }
}

#[derive(Debug, Error)]
pub enum MarketError {
    // Validation
    #[error("stake must be positive")]
    NonPositiveStake,

    #[error("stake of {gross} raw units leaves nothing after the fee")]
    StakeBelowFee { gross: u128 },

    #[error("invalid user reference: {0:?}")]
    InvalidUser(String),

    #[error("external transaction reference must not be empty")]
    EmptyTxRef,

    #[error("external transaction reference is {len} bytes, the limit is {max}")]
    TxRefTooLong { len: usize, max: usize },

    #[error("a chapter needs at least two outcomes, got {0}")]
    TooFewOutcomes(usize),

    #[error("{0} is listed more than once")]
    DuplicateOutcome(OutcomeId),

    #[error("deadline {deadline} is not after the current time {now}")]
    DeadlineNotInFuture { deadline: Timestamp, now: Timestamp },

    #[error("invalid market parameters: {0}")]
    InvalidParams(String),

    // Not found
    #[error("outcome has no pool: {0}")]
    OutcomeHasNoPool(OutcomeId),

    #[error("{0} not found")]
    ChapterNotFound(ChapterId),

    #[error("{0} has no pools")]
    ChapterHasNoPools(ChapterId),

    #[error("{outcome} is not an outcome of {chapter}")]
    WinningOutcomeNotFound {
        chapter: ChapterId,
        outcome: OutcomeId,
    },

    #[error("{0} not found")]
    PoolNotFound(PoolId),

    #[error("no pending payouts for {user} on {pool}")]
    NoPendingPayouts { user: UserId, pool: PoolId },

    #[error("no stats recorded for {0}")]
    UserNotFound(UserId),

    // State
    #[error("betting closed: {pool} is {status}")]
    BettingClosed { pool: PoolId, status: PoolStatus },

    #[error("betting period has ended for {chapter} (deadline {deadline})")]
    DeadlinePassed {
        chapter: ChapterId,
        deadline: Timestamp,
    },

    #[error("betting is still open on {0}")]
    BettingStillOpen(ChapterId),

    #[error("{0} has already been resolved")]
    AlreadyResolved(ChapterId),

    #[error("{0} has not been resolved")]
    ChapterNotResolved(ChapterId),

    #[error("{0} already exists")]
    ChapterExists(ChapterId),

    #[error("{0} already exists")]
    OutcomeExists(OutcomeId),

    #[error("transaction reference {0:?} has already been booked")]
    DuplicateTxRef(String),

    #[error("rollover of {chapter} was already carried into {into}")]
    RolloverAlreadyUsed { chapter: ChapterId, into: ChapterId },

    #[error("{0} has no rollover to carry")]
    NothingToCarry(ChapterId),

    // Internal
    #[error("arithmetic overflow in settlement computation")]
    Overflow,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl MarketError {
    pub fn kind(&self) -> ErrorKind {
        use MarketError::*;
        match self {
            NonPositiveStake
            | StakeBelowFee { .. }
            | InvalidUser(_)
            | EmptyTxRef
            | TxRefTooLong { .. }
            | TooFewOutcomes(_)
            | DuplicateOutcome(_)
            | DeadlineNotInFuture { .. }
            | InvalidParams(_) => ErrorKind::Validation,

            OutcomeHasNoPool(_)
            | ChapterNotFound(_)
            | ChapterHasNoPools(_)
            | WinningOutcomeNotFound { .. }
            | PoolNotFound(_)
            | NoPendingPayouts { .. }
            | UserNotFound(_) => ErrorKind::NotFound,

            BettingClosed { .. }
            | DeadlinePassed { .. }
            | BettingStillOpen(_)
            | AlreadyResolved(_)
            | ChapterNotResolved(_)
            | ChapterExists(_)
            | OutcomeExists(_)
            | DuplicateTxRef(_)
            | RolloverAlreadyUsed { .. }
            | NothingToCarry(_) => ErrorKind::State,

            Overflow | Store(_) => ErrorKind::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_distinct_from_state() {
        assert_eq!(
            MarketError::PoolNotFound(PoolId::new(1)).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            MarketError::AlreadyResolved(ChapterId::new(1)).kind(),
            ErrorKind::State
        );
        assert_eq!(MarketError::NonPositiveStake.kind(), ErrorKind::Validation);
        assert_eq!(
            MarketError::Store(StoreError::Backend("down".into())).kind(),
            ErrorKind::Internal
        );
    }

    #[test]
    fn messages_name_the_reason() {
        let err = MarketError::OutcomeHasNoPool(OutcomeId::new(3));
        assert!(err.to_string().starts_with("outcome has no pool"));
        let err = MarketError::DeadlinePassed {
            chapter: ChapterId::new(1),
            deadline: Timestamp::new(10),
        };
        assert!(err.to_string().starts_with("betting period has ended"));
    }
}
