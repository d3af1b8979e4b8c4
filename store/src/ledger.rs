//! Transactional access to the settlement ledger.
//!
//! Every engine command runs inside exactly one [`LedgerWrite`] transaction:
//! all of its reads and writes commit together or not at all. Dropping a
//! write transaction without calling [`LedgerWrite::commit`] aborts it.
//!
//! Backends must admit at most one write transaction at a time, so commands
//! are serialised against each other, and read transactions must observe a
//! consistent snapshot without blocking the writer.

use plotline_types::{BetId, ChapterId, OutcomeId, PoolId, UserId};

use crate::bet::BetRecord;
use crate::chapter::{ChapterRecord, OutcomeRecord};
use crate::meta::Sequence;
use crate::payout::PayoutRecord;
use crate::pool::PoolRecord;
use crate::treasury::TreasuryEntry;
use crate::user::UserStats;
use crate::StoreError;

/// Read access to one consistent ledger snapshot.
///
/// List methods return rows ordered by id.
pub trait LedgerRead {
    fn get_chapter(&self, id: ChapterId) -> Result<Option<ChapterRecord>, StoreError>;

    fn get_outcome(&self, id: OutcomeId) -> Result<Option<OutcomeRecord>, StoreError>;

    fn get_pool(&self, id: PoolId) -> Result<Option<PoolRecord>, StoreError>;

    /// The pool attached to an outcome.
    fn pool_for_outcome(&self, outcome: OutcomeId) -> Result<Option<PoolRecord>, StoreError>;

    /// Every pool of a chapter.
    fn chapter_pools(&self, chapter: ChapterId) -> Result<Vec<PoolRecord>, StoreError>;

    /// Every pool in the ledger.
    fn iter_pools(&self) -> Result<Vec<PoolRecord>, StoreError>;

    fn get_bet(&self, id: BetId) -> Result<Option<BetRecord>, StoreError>;

    fn pool_bets(&self, pool: PoolId) -> Result<Vec<BetRecord>, StoreError>;

    fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, StoreError>;

    /// The bet booked under an external transaction reference, if any.
    fn bet_by_tx_ref(&self, tx_ref: &str) -> Result<Option<BetId>, StoreError>;

    fn pool_payouts(&self, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError>;

    fn user_pool_payouts(
        &self,
        user: &UserId,
        pool: PoolId,
    ) -> Result<Vec<PayoutRecord>, StoreError>;

    fn chapter_treasury(&self, chapter: ChapterId) -> Result<Vec<TreasuryEntry>, StoreError>;

    fn get_user_stats(&self, user: &UserId) -> Result<Option<UserStats>, StoreError>;

    fn iter_user_stats(&self) -> Result<Vec<UserStats>, StoreError>;
}

/// A write transaction. Reads inside it observe its own uncommitted writes.
///
/// `put_*` methods insert or overwrite by id and keep the secondary indexes
/// (outcome → pool, chapter → pools, pool/user → bets, tx ref → bet,
/// pool/user → payouts, chapter → treasury) in step.
pub trait LedgerWrite: LedgerRead {
    /// Advance a sequence and return the new id (sequences start at 1).
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError>;

    fn put_chapter(&mut self, chapter: &ChapterRecord) -> Result<(), StoreError>;

    fn put_outcome(&mut self, outcome: &OutcomeRecord) -> Result<(), StoreError>;

    fn put_pool(&mut self, pool: &PoolRecord) -> Result<(), StoreError>;

    fn put_bet(&mut self, bet: &BetRecord) -> Result<(), StoreError>;

    fn put_payout(&mut self, payout: &PayoutRecord) -> Result<(), StoreError>;

    /// Append a treasury entry. Entries are never rewritten.
    fn append_treasury(&mut self, entry: &TreasuryEntry) -> Result<(), StoreError>;

    fn put_user_stats(&mut self, stats: &UserStats) -> Result<(), StoreError>;

    /// Atomically publish every write made in this transaction.
    fn commit(self) -> Result<(), StoreError>;
}

/// A ledger backend that hands out snapshot readers and a single writer.
pub trait LedgerStore: Send + Sync {
    type Reader<'a>: LedgerRead
    where
        Self: 'a;
    type Writer<'a>: LedgerWrite
    where
        Self: 'a;

    fn read_txn(&self) -> Result<Self::Reader<'_>, StoreError>;

    /// Begin a write transaction, waiting for any other writer to finish.
    fn write_txn(&self) -> Result<Self::Writer<'_>, StoreError>;
}
