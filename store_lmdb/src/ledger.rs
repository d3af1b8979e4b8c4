//! LMDB implementation of the ledger traits.
//!
//! Records are bincode-encoded under big-endian id keys. Secondary indexes
//! store composite keys with empty values (or the target id as value for
//! one-to-one lookups), so every list query is a single prefix range scan
//! followed by primary-key fetches.
//!
//! LMDB itself provides the transaction guarantees: one writer at a time,
//! MVCC snapshots for readers, and abort on drop for uncommitted writes.

use std::ops::Bound;

use heed::{RoTxn, RwTxn};
use serde::de::DeserializeOwned;
use serde::Serialize;

use plotline_store::{
    BetRecord, ChapterRecord, LedgerRead, LedgerStore, LedgerWrite, OutcomeRecord, PayoutRecord,
    PoolRecord, Sequence, StoreError, TreasuryEntry, UserStats,
};
use plotline_types::{BetId, ChapterId, OutcomeId, PoolId, UserId};

use crate::environment::{LmdbEnvironment, RawDb};
use crate::keys::{composite, id_key, id_suffix, increment_prefix, user_prefix};
use crate::LmdbError;

fn get_value<T: DeserializeOwned>(
    db: &RawDb,
    txn: &RoTxn<'_>,
    key: &[u8],
) -> Result<Option<T>, LmdbError> {
    match db.get(txn, key)? {
        Some(bytes) => Ok(Some(bincode::deserialize(bytes)?)),
        None => Ok(None),
    }
}

fn put_value<T: Serialize>(
    db: &RawDb,
    txn: &mut RwTxn<'_>,
    key: &[u8],
    value: &T,
) -> Result<(), LmdbError> {
    let bytes = bincode::serialize(value)?;
    db.put(txn, key, &bytes)?;
    Ok(())
}

/// Collect the ids encoded in the trailing eight bytes of every key under `prefix`.
fn scan_ids(db: &RawDb, txn: &RoTxn<'_>, prefix: &[u8]) -> Result<Vec<u64>, LmdbError> {
    let mut upper = prefix.to_vec();
    let upper_bound = if increment_prefix(&mut upper) {
        Bound::Excluded(upper.as_slice())
    } else {
        Bound::Unbounded
    };
    let bounds = (Bound::Included(prefix), upper_bound);
    let mut ids = Vec::new();
    for result in db.range(txn, &bounds)? {
        let (key, _val) = result?;
        ids.push(id_suffix(key)?);
    }
    Ok(ids)
}

/// Fetch the primary records an index points at. A dangling index entry is corruption.
fn load_all<T: DeserializeOwned>(
    db: &RawDb,
    txn: &RoTxn<'_>,
    ids: Vec<u64>,
    what: &str,
) -> Result<Vec<T>, LmdbError> {
    ids.into_iter()
        .map(|id| {
            get_value(db, txn, &id_key(id))?
                .ok_or_else(|| LmdbError::Corruption(format!("index points at missing {what} {id}")))
        })
        .collect()
}

fn load_every<T: DeserializeOwned>(db: &RawDb, txn: &RoTxn<'_>) -> Result<Vec<T>, LmdbError> {
    let mut out = Vec::new();
    for result in db.iter(txn)? {
        let (_key, val) = result?;
        out.push(bincode::deserialize(val)?);
    }
    Ok(out)
}

/// Read view shared by read and write transactions.
struct Snapshot<'t, 'e> {
    env: &'t LmdbEnvironment,
    txn: &'t RoTxn<'e>,
}

impl LedgerRead for Snapshot<'_, '_> {
    fn get_chapter(&self, id: ChapterId) -> Result<Option<ChapterRecord>, StoreError> {
        Ok(get_value(&self.env.chapters_db, self.txn, &id_key(id.get()))?)
    }

    fn get_outcome(&self, id: OutcomeId) -> Result<Option<OutcomeRecord>, StoreError> {
        Ok(get_value(&self.env.outcomes_db, self.txn, &id_key(id.get()))?)
    }

    fn get_pool(&self, id: PoolId) -> Result<Option<PoolRecord>, StoreError> {
        Ok(get_value(&self.env.pools_db, self.txn, &id_key(id.get()))?)
    }

    fn pool_for_outcome(&self, outcome: OutcomeId) -> Result<Option<PoolRecord>, StoreError> {
        let pool_id = self
            .env
            .outcome_pool_db
            .get(self.txn, &id_key(outcome.get()))
            .map_err(LmdbError::from)?
            .map(id_suffix)
            .transpose()?;
        match pool_id {
            Some(id) => self.get_pool(PoolId::new(id)),
            None => Ok(None),
        }
    }

    fn chapter_pools(&self, chapter: ChapterId) -> Result<Vec<PoolRecord>, StoreError> {
        let ids = scan_ids(&self.env.chapter_pools_db, self.txn, &id_key(chapter.get()))?;
        Ok(load_all(&self.env.pools_db, self.txn, ids, "pool")?)
    }

    fn iter_pools(&self) -> Result<Vec<PoolRecord>, StoreError> {
        Ok(load_every(&self.env.pools_db, self.txn)?)
    }

    fn get_bet(&self, id: BetId) -> Result<Option<BetRecord>, StoreError> {
        Ok(get_value(&self.env.bets_db, self.txn, &id_key(id.get()))?)
    }

    fn pool_bets(&self, pool: PoolId) -> Result<Vec<BetRecord>, StoreError> {
        let ids = scan_ids(&self.env.pool_bets_db, self.txn, &id_key(pool.get()))?;
        Ok(load_all(&self.env.bets_db, self.txn, ids, "bet")?)
    }

    fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, StoreError> {
        let ids = scan_ids(&self.env.user_bets_db, self.txn, &user_prefix(user))?;
        Ok(load_all(&self.env.bets_db, self.txn, ids, "bet")?)
    }

    fn bet_by_tx_ref(&self, tx_ref: &str) -> Result<Option<BetId>, StoreError> {
        let id = self
            .env
            .bet_tx_refs_db
            .get(self.txn, tx_ref.as_bytes())
            .map_err(LmdbError::from)?
            .map(id_suffix)
            .transpose()?;
        Ok(id.map(BetId::new))
    }

    fn pool_payouts(&self, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
        let ids = scan_ids(&self.env.pool_payouts_db, self.txn, &id_key(pool.get()))?;
        Ok(load_all(&self.env.payouts_db, self.txn, ids, "payout")?)
    }

    fn user_pool_payouts(
        &self,
        user: &UserId,
        pool: PoolId,
    ) -> Result<Vec<PayoutRecord>, StoreError> {
        let prefix = composite(&user_prefix(user), pool.get());
        let ids = scan_ids(&self.env.user_payouts_db, self.txn, &prefix)?;
        Ok(load_all(&self.env.payouts_db, self.txn, ids, "payout")?)
    }

    fn chapter_treasury(&self, chapter: ChapterId) -> Result<Vec<TreasuryEntry>, StoreError> {
        let ids = scan_ids(
            &self.env.chapter_treasury_db,
            self.txn,
            &id_key(chapter.get()),
        )?;
        Ok(load_all(&self.env.treasury_db, self.txn, ids, "treasury entry")?)
    }

    fn get_user_stats(&self, user: &UserId) -> Result<Option<UserStats>, StoreError> {
        Ok(get_value(
            &self.env.users_db,
            self.txn,
            user.as_str().as_bytes(),
        )?)
    }

    fn iter_user_stats(&self) -> Result<Vec<UserStats>, StoreError> {
        Ok(load_every(&self.env.users_db, self.txn)?)
    }
}

macro_rules! forward_ledger_read {
    ($ty:ty) => {
        impl LedgerRead for $ty {
            fn get_chapter(&self, id: ChapterId) -> Result<Option<ChapterRecord>, StoreError> {
                self.snapshot().get_chapter(id)
            }
            fn get_outcome(&self, id: OutcomeId) -> Result<Option<OutcomeRecord>, StoreError> {
                self.snapshot().get_outcome(id)
            }
            fn get_pool(&self, id: PoolId) -> Result<Option<PoolRecord>, StoreError> {
                self.snapshot().get_pool(id)
            }
            fn pool_for_outcome(&self, outcome: OutcomeId) -> Result<Option<PoolRecord>, StoreError> {
                self.snapshot().pool_for_outcome(outcome)
            }
            fn chapter_pools(&self, chapter: ChapterId) -> Result<Vec<PoolRecord>, StoreError> {
                self.snapshot().chapter_pools(chapter)
            }
            fn iter_pools(&self) -> Result<Vec<PoolRecord>, StoreError> {
                self.snapshot().iter_pools()
            }
            fn get_bet(&self, id: BetId) -> Result<Option<BetRecord>, StoreError> {
                self.snapshot().get_bet(id)
            }
            fn pool_bets(&self, pool: PoolId) -> Result<Vec<BetRecord>, StoreError> {
                self.snapshot().pool_bets(pool)
            }
            fn user_bets(&self, user: &UserId) -> Result<Vec<BetRecord>, StoreError> {
                self.snapshot().user_bets(user)
            }
            fn bet_by_tx_ref(&self, tx_ref: &str) -> Result<Option<BetId>, StoreError> {
                self.snapshot().bet_by_tx_ref(tx_ref)
            }
            fn pool_payouts(&self, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
                self.snapshot().pool_payouts(pool)
            }
            fn user_pool_payouts(&self, user: &UserId, pool: PoolId) -> Result<Vec<PayoutRecord>, StoreError> {
                self.snapshot().user_pool_payouts(user, pool)
            }
            fn chapter_treasury(&self, chapter: ChapterId) -> Result<Vec<TreasuryEntry>, StoreError> {
                self.snapshot().chapter_treasury(chapter)
            }
            fn get_user_stats(&self, user: &UserId) -> Result<Option<UserStats>, StoreError> {
                self.snapshot().get_user_stats(user)
            }
            fn iter_user_stats(&self) -> Result<Vec<UserStats>, StoreError> {
                self.snapshot().iter_user_stats()
            }
        }
    };
}

/// A read-only snapshot of the ledger.
pub struct LmdbReadTxn<'a> {
    env: &'a LmdbEnvironment,
    txn: RoTxn<'a>,
}

impl<'a> LmdbReadTxn<'a> {
    fn snapshot(&self) -> Snapshot<'_, 'a> {
        Snapshot {
            env: self.env,
            txn: &self.txn,
        }
    }
}

forward_ledger_read!(LmdbReadTxn<'_>);

/// A ledger write transaction. Dropping it without [`LedgerWrite::commit`]
/// aborts every write it made.
pub struct LmdbWriteTxn<'a> {
    env: &'a LmdbEnvironment,
    txn: RwTxn<'a>,
}

impl<'a> LmdbWriteTxn<'a> {
    fn snapshot(&self) -> Snapshot<'_, 'a> {
        Snapshot {
            env: self.env,
            txn: &self.txn,
        }
    }

    fn put_index(&mut self, db: RawDb, key: &[u8], value: &[u8]) -> Result<(), LmdbError> {
        db.put(&mut self.txn, key, value)?;
        Ok(())
    }
}

forward_ledger_read!(LmdbWriteTxn<'_>);

impl LedgerWrite for LmdbWriteTxn<'_> {
    fn next_id(&mut self, seq: Sequence) -> Result<u64, StoreError> {
        let key = seq.meta_key().as_bytes();
        let current = self
            .env
            .meta_db
            .get(&self.txn, key)
            .map_err(LmdbError::from)?
            .map(id_suffix)
            .transpose()?
            .unwrap_or(0);
        let next = current
            .checked_add(1)
            .ok_or_else(|| StoreError::Corruption(format!("sequence {} exhausted", seq.meta_key())))?;
        self.put_index(self.env.meta_db, key, &next.to_be_bytes())?;
        Ok(next)
    }

    fn put_chapter(&mut self, chapter: &ChapterRecord) -> Result<(), StoreError> {
        put_value(
            &self.env.chapters_db,
            &mut self.txn,
            &id_key(chapter.id.get()),
            chapter,
        )?;
        Ok(())
    }

    fn put_outcome(&mut self, outcome: &OutcomeRecord) -> Result<(), StoreError> {
        put_value(
            &self.env.outcomes_db,
            &mut self.txn,
            &id_key(outcome.id.get()),
            outcome,
        )?;
        Ok(())
    }

    fn put_pool(&mut self, pool: &PoolRecord) -> Result<(), StoreError> {
        let pool_key = id_key(pool.id.get());
        put_value(&self.env.pools_db, &mut self.txn, &pool_key, pool)?;
        self.put_index(
            self.env.outcome_pool_db,
            &id_key(pool.outcome_id.get()),
            &pool_key,
        )?;
        self.put_index(
            self.env.chapter_pools_db,
            &composite(&id_key(pool.chapter_id.get()), pool.id.get()),
            &[],
        )?;
        Ok(())
    }

    fn put_bet(&mut self, bet: &BetRecord) -> Result<(), StoreError> {
        let holder = self.bet_by_tx_ref(&bet.tx_ref)?;
        if let Some(existing) = holder {
            if existing != bet.id {
                return Err(StoreError::Duplicate(format!(
                    "tx ref '{}' already booked as {}",
                    bet.tx_ref, existing
                )));
            }
        }

        let bet_key = id_key(bet.id.get());
        put_value(&self.env.bets_db, &mut self.txn, &bet_key, bet)?;
        self.put_index(
            self.env.pool_bets_db,
            &composite(&id_key(bet.pool_id.get()), bet.id.get()),
            &[],
        )?;
        self.put_index(
            self.env.user_bets_db,
            &composite(&user_prefix(&bet.user), bet.id.get()),
            &[],
        )?;
        self.put_index(self.env.bet_tx_refs_db, bet.tx_ref.as_bytes(), &bet_key)?;
        Ok(())
    }

    fn put_payout(&mut self, payout: &PayoutRecord) -> Result<(), StoreError> {
        put_value(
            &self.env.payouts_db,
            &mut self.txn,
            &id_key(payout.id.get()),
            payout,
        )?;
        self.put_index(
            self.env.pool_payouts_db,
            &composite(&id_key(payout.pool_id.get()), payout.id.get()),
            &[],
        )?;
        let user_pool = composite(&user_prefix(&payout.user), payout.pool_id.get());
        self.put_index(
            self.env.user_payouts_db,
            &composite(&user_pool, payout.id.get()),
            &[],
        )?;
        Ok(())
    }

    fn append_treasury(&mut self, entry: &TreasuryEntry) -> Result<(), StoreError> {
        let key = id_key(entry.id.get());
        let exists = self
            .env
            .treasury_db
            .get(&self.txn, &key)
            .map_err(LmdbError::from)?
            .is_some();
        if exists {
            return Err(StoreError::Duplicate(format!(
                "treasury entry {}",
                entry.id
            )));
        }
        put_value(&self.env.treasury_db, &mut self.txn, &key, entry)?;
        self.put_index(
            self.env.chapter_treasury_db,
            &composite(&id_key(entry.chapter_id.get()), entry.id.get()),
            &[],
        )?;
        Ok(())
    }

    fn put_user_stats(&mut self, stats: &UserStats) -> Result<(), StoreError> {
        put_value(
            &self.env.users_db,
            &mut self.txn,
            stats.user.as_str().as_bytes(),
            stats,
        )?;
        Ok(())
    }

    fn commit(self) -> Result<(), StoreError> {
        self.txn.commit().map_err(LmdbError::from)?;
        Ok(())
    }
}

impl LedgerStore for LmdbEnvironment {
    type Reader<'a> = LmdbReadTxn<'a>;
    type Writer<'a> = LmdbWriteTxn<'a>;

    fn read_txn(&self) -> Result<LmdbReadTxn<'_>, StoreError> {
        let txn = self.env().read_txn().map_err(LmdbError::from)?;
        Ok(LmdbReadTxn { env: self, txn })
    }

    fn write_txn(&self) -> Result<LmdbWriteTxn<'_>, StoreError> {
        let txn = self.env().write_txn().map_err(LmdbError::from)?;
        Ok(LmdbWriteTxn { env: self, txn })
    }
}
