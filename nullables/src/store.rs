//! Nullable ledger store: thread-safe in-memory storage for testing.
//!
//! Mirrors the LMDB backend's transaction model: readers get an immutable
//! snapshot, a single writer works on a private copy, and commit publishes
//! the copy atomically. Dropping a writer discards its copy.

use plotline_store::{
    BetRecord, ChapterRecord, LedgerRead, LedgerStore, LedgerWrite, OutcomeRecord, PayoutRecord,
    PoolRecord, Sequence, StoreError, TreasuryEntry, UserStats,
};
use plotline_types::{
    BetId, ChapterId, OutcomeId, PayoutId, PoolId, TreasuryEntryId, UserId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

#[derive(Clone, Default)]
struct Tables {
    chapters: BTreeMap<ChapterId, ChapterRecord>,
    outcomes: BTreeMap<OutcomeId, OutcomeRecord>,
    pools: BTreeMap<PoolId, PoolRecord>,
    bets: BTreeMap<BetId, BetRecord>,
    payouts: BTreeMap<PayoutId, PayoutRecord>,
    treasury: BTreeMap<TreasuryEntryId, TreasuryEntry>,
    users: BTreeMap<UserId, UserStats>,
    tx_refs: HashMap<String, BetId>,
    sequences: HashMap<Sequence, u64>,
}

impl LedgerRead for Tables {
    fn get_chapter(&self, id: ChapterId) -> Result<Option<ChapterRecord>, StoreError> {
        Ok(self.chapters.get(&id).cloned())
    }

    fn get_outcome(&self, id: OutcomeId) -> Result<Option<OutcomeRecord>, StoreError> {
        Ok(self.outcomes.get(&id).cloned())
    }

    fn get_pool(&self, id: PoolId) -> Result<Option<PoolRecord>, StoreError> {
        Ok(self.pools.get(&id).cloned())
    }

    fn pool_for_outcome(&self, outcome: OutcomeId) -> Result<Option<PoolRecord>, StoreError> {
        Ok(self
            .pools
            .values()
            .find(|p| p.outcome_id == outcome)
            .cloned())
    }

    fn chapter_pools(&self, chapter: ChapterId) -> Result<Vec<PoolRecord>, StoreError> {
        Ok(self
            .pools
            .values()
            .filter(|p| p.chapter_id == chapter)
            .cloned()
            .collect())
    }

    fn iter_pools(&self) -> Result<Vec<PoolRecord>, StoreError> {
        Ok(self.pools.values().cloned().collect())
    }

    fn get_bet(&self, id: BetId) -> Result<Option<BetRecord>, StoreError> {
        Ok(self.bets.get(&id).cloned())
    }

    fn pool_bets(&self, pool: PoolId) -> Result<Vec<BetRecord>, StoreError> {
        Ok(self
            .bets
            .values()
            .filter(|b| b.pool_id == pool)
            .cloned()
            .collect())
    }

    fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, StoreError> {
        Ok(self
            .bets
            .values()
            .filter(|b| &b.user == user)
            .cloned()
            .collect())
    }

    fn bet_by_tx_ref(&self, tx_ref: &str) -> Result<Option<BetId>, StoreError> {
        Ok(self.tx_refs.get(tx_ref).copied())
    }

    fn pool_payouts(&self, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
        Ok(self
            .payouts
            .values()
            .filter(|p| p.pool_id == pool)
            .cloned()
            .collect())
    }

    fn user_pool_payouts(
        &self,
        user: &UserId,
        pool: PoolId,
    ) -> Result<Vec<PayoutRecord>, StoreError> {
        Ok(self
            .payouts
            .values()
            .filter(|p| &p.user == user && p.pool_id == pool)
            .cloned()
            .collect())
    }

    fn chapter_treasury(&self, chapter: ChapterId) -> Result<Vec<TreasuryEntry>, StoreError> {
        Ok(self
            .treasury
            .values()
            .filter(|e| e.chapter_id == chapter)
            .cloned()
            .collect())
    }

    fn get_user_stats(&self, user: &UserId) -> Result<Option<UserStats>, StoreError> {
        Ok(self.users.get(user).cloned())
    }

    fn iter_user_stats(&self) -> Result<Vec<UserStats>, StoreError> {
        Ok(self.users.values().cloned().collect())
    }
}

/// Forwards every [`LedgerRead`] method to a `Tables` reachable through `$field`.
macro_rules! forward_ledger_read {
    ($ty:ty, $field:ident) => {
        impl LedgerRead for $ty {
            fn get_chapter(&self, id: ChapterId) -> Result<Option<ChapterRecord>, StoreError> {
                self.$field.get_chapter(id)
            }
            fn get_outcome(&self, id: OutcomeId) -> Result<Option<OutcomeRecord>, StoreError> {
                self.$field.get_outcome(id)
            }
            fn get_pool(&self, id: PoolId) -> Result<Option<PoolRecord>, StoreError> {
                self.$field.get_pool(id)
            }
            fn pool_for_outcome(&self, outcome: OutcomeId) -> Result<Option<PoolRecord>, StoreError> {
                self.$field.pool_for_outcome(outcome)
            }
            fn chapter_pools(&self, chapter: ChapterId) -> Result<Vec<PoolRecord>, StoreError> {
                self.$field.chapter_pools(chapter)
            }
            fn iter_pools(&self) -> Result<Vec<PoolRecord>, StoreError> {
                self.$field.iter_pools()
            }
            fn get_bet(&self, id: BetId) -> Result<Option<BetRecord>, StoreError> {
                self.$field.get_bet(id)
            }
            fn pool_bets(&self, pool: PoolId) -> Result<Vec<BetRecord>, StoreError> {
                self.$field.pool_bets(pool)
            }
            fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, StoreError> {
                self.$field.user_bets(user)
            }
            fn bet_by_tx_ref(&self, tx_ref: &str) -> Result<Option<BetId>, StoreError> {
                self.$field.bet_by_tx_ref(tx_ref)
            }
            fn pool_payouts(&self, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
                self.$field.pool_payouts(pool)
            }
            fn user_pool_payouts(&self, user: &UserId, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
                self.$field.user_pool_payouts(user, pool)
            }
            fn chapter_treasury(&self, chapter: ChapterId) -> Result<Vec<TreasuryEntry>, StoreError> {
                self.$field.chapter_treasury(chapter)
            }
            fn get_user_stats(&self, user: &UserId) -> Result<Option<UserStats>, StoreError> {
                self.$field.get_user_stats(user)
            }
            fn iter_user_stats(&self) -> Result<Vec<UserStats>, StoreError> {
                self.$field.iter_user_stats()
            }
        }
    };
}

/// An in-memory ledger for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
pub struct NullLedgerStore {
    current: RwLock<Arc<Tables>>,
    writer: Mutex<()>,
    fail_commit: AtomicBool,
}

impl NullLedgerStore {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(Tables::default())),
            writer: Mutex::new(()),
            fail_commit: AtomicBool::new(false),
        }
    }

    /// Make the next commit fail with a backend error, discarding its writes.
    pub fn fail_next_commit(&self) {
        self.fail_commit.store(true, Ordering::SeqCst);
    }

    fn snapshot(&self) -> Arc<Tables> {
        Arc::clone(&self.current.read().unwrap())
    }
}

impl Default for NullLedgerStore {
    fn default() -> Self {
        Self::new()
    }
}

/// A read snapshot of a [`NullLedgerStore`].
pub struct NullReadTxn {
    tables: Arc<Tables>,
}

forward_ledger_read!(NullReadTxn, tables);

/// The single writer of a [`NullLedgerStore`].
pub struct NullWriteTxn<'a> {
    store: &'a NullLedgerStore,
    _guard: MutexGuard<'a, ()>,
    tables: Tables,
}

forward_ledger_read!(NullWriteTxn<'_>, tables);

impl LedgerWrite for NullWriteTxn<'_> {
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError> {
        let next = self.tables.sequences.get(&seq).copied().unwrap_or(0) + 1;
        self.tables.sequences.insert(seq, next);
        Ok(next)
    }

    fn put_chapter(&mut self, chapter: &ChapterRecord) -> Result<(), StoreError> {
        self.tables.chapters.insert(chapter.id, chapter.clone());
        Ok(())
    }

    fn put_outcome(&mut self, outcome: &OutcomeRecord) -> Result<(), StoreError> {
        self.tables.outcomes.insert(outcome.id, outcome.clone());
        Ok(())
    }

    fn put_pool(&mut self, pool: &PoolRecord) -> Result<(), StoreError> {
        self.tables.pools.insert(pool.id, pool.clone());
        Ok(())
    }

    fn put_bet(&mut self, bet: &BetRecord) -> Result<(), StoreError> {
        if let Some(existing) = self.tables.tx_refs.get(&bet.tx_ref) {
            if *existing != bet.id {
                return Err(StoreError::Duplicate(format!("tx ref {}", bet.tx_ref)));
            }
        }
        self.tables.tx_refs.insert(bet.tx_ref.clone(), bet.id);
        self.tables.bets.insert(bet.id, bet.clone());
        Ok(())
    }

    fn put_payout(&mut self, payout: &PayoutRecord) -> Result<(), StoreError> {
        self.tables.payouts.insert(payout.id, payout.clone());
        Ok(())
    }

    fn append_treasury(&mut self, entry: &TreasuryEntry) -> Result<(), StoreError> {
        if self.tables.treasury.contains_key(&entry.id) {
            return Err(StoreError::Duplicate(entry.id.to_string()));
        }
        self.tables.treasury.insert(entry.id, entry.clone());
        Ok(())
    }

    fn put_user_stats(&mut self, stats: &UserStats) -> Result<(), StoreError> {
        self.tables.users.insert(stats.user.clone(), stats.clone());
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        if self.store.fail_commit.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Backend("injected commit failure".to_string()));
        }
        *self.store.current.write().unwrap() = Arc::new(self.tables);
        Ok(())
    }
}

impl LedgerStore for NullLedgerStore {
    type Reader<'a> = NullReadTxn;
    type Writer<'a> = NullWriteTxn<'a>;

    fn read_txn(&self) -> Result<NullReadTxn, StoreError> {
        Ok(NullReadTxn {
            tables: self.snapshot(),
        })
    }

    fn write_txn(&self) -> Result<NullWriteTxn<'_>, StoreError> {
        let guard = self.writer.lock().unwrap();
        let tables = (*self.snapshot()).clone();
        Ok(NullWriteTxn {
            store: self,
            _guard: guard,
            tables,
        })
    }
}
