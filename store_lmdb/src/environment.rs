//! LMDB environment setup.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, RwTxn};

use crate::meta::LmdbMetaStore;
use crate::LmdbError;

pub(crate) type RawDb = Database<Bytes, Bytes>;

/// Default map size: 1 GiB.
pub const DEFAULT_MAP_SIZE: usize = 1 << 30;

/// Every named database the ledger uses.
pub const DATABASE_NAMES: &[&str] = &[
    "chapters",
    "outcomes",
    "pools",
    "bets",
    "payouts",
    "treasury",
    "users",
    "meta",
    "outcome_pool",
    "chapter_pools",
    "pool_bets",
    "user_bets",
    "bet_tx_refs",
    "pool_payouts",
    "user_payouts",
    "chapter_treasury",
];

/// Wraps the LMDB environment and all database handles.
pub struct LmdbEnvironment {
    env: Arc<Env>,
    path: PathBuf,
    pub(crate) chapters_db: RawDb,
    pub(crate) outcomes_db: RawDb,
    pub(crate) pools_db: RawDb,
    pub(crate) bets_db: RawDb,
    pub(crate) payouts_db: RawDb,
    pub(crate) treasury_db: RawDb,
    pub(crate) users_db: RawDb,
    pub(crate) meta_db: RawDb,
    /// outcome_be -> pool_be
    pub(crate) outcome_pool_db: RawDb,
    /// chapter_be ++ pool_be
    pub(crate) chapter_pools_db: RawDb,
    /// pool_be ++ bet_be
    pub(crate) pool_bets_db: RawDb,
    /// user ++ 0x00 ++ bet_be
    pub(crate) user_bets_db: RawDb,
    /// tx_ref -> bet_be
    pub(crate) bet_tx_refs_db: RawDb,
    /// pool_be ++ payout_be
    pub(crate) pool_payouts_db: RawDb,
    /// user ++ 0x00 ++ pool_be ++ payout_be
    pub(crate) user_payouts_db: RawDb,
    /// chapter_be ++ entry_be
    pub(crate) chapter_treasury_db: RawDb,
}

fn create(env: &Env, wtxn: &mut RwTxn<'_>, name: &str) -> Result<RawDb, LmdbError> {
    Ok(env.create_database::<Bytes, Bytes>(wtxn, Some(name))?)
}

impl LmdbEnvironment {
    /// Open or create an LMDB environment at the given path.
    ///
    /// The directory is created if missing and every ledger database is
    /// created inside one write transaction.
    pub fn open(path: &Path, map_size: usize) -> Result<Self, LmdbError> {
        std::fs::create_dir_all(path)?;

        // SAFETY: the environment is opened once per process and the data
        // files are not modified by anything outside LMDB while it is open.
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(DATABASE_NAMES.len() as u32)
                .open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let chapters_db = create(&env, &mut wtxn, "chapters")?;
        let outcomes_db = create(&env, &mut wtxn, "outcomes")?;
        let pools_db = create(&env, &mut wtxn, "pools")?;
        let bets_db = create(&env, &mut wtxn, "bets")?;
        let payouts_db = create(&env, &mut wtxn, "payouts")?;
        let treasury_db = create(&env, &mut wtxn, "treasury")?;
        let users_db = create(&env, &mut wtxn, "users")?;
        let meta_db = create(&env, &mut wtxn, "meta")?;
        let outcome_pool_db = create(&env, &mut wtxn, "outcome_pool")?;
        let chapter_pools_db = create(&env, &mut wtxn, "chapter_pools")?;
        let pool_bets_db = create(&env, &mut wtxn, "pool_bets")?;
        let user_bets_db = create(&env, &mut wtxn, "user_bets")?;
        let bet_tx_refs_db = create(&env, &mut wtxn, "bet_tx_refs")?;
        let pool_payouts_db = create(&env, &mut wtxn, "pool_payouts")?;
        let user_payouts_db = create(&env, &mut wtxn, "user_payouts")?;
        let chapter_treasury_db = create(&env, &mut wtxn, "chapter_treasury")?;
        wtxn.commit()?;

        tracing::info!(path = %path.display(), map_size, "opened LMDB environment");

        Ok(Self {
            env: Arc::new(env),
            path: path.to_path_buf(),
            chapters_db,
            outcomes_db,
            pools_db,
            bets_db,
            payouts_db,
            treasury_db,
            users_db,
            meta_db,
            outcome_pool_db,
            chapter_pools_db,
            pool_bets_db,
            user_bets_db,
            bet_tx_refs_db,
            pool_payouts_db,
            user_payouts_db,
            chapter_treasury_db,
        })
    }

    pub fn env(&self) -> &Arc<Env> {
        &self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta_store(&self) -> LmdbMetaStore {
        LmdbMetaStore {
            env: Arc::clone(&self.env),
            meta_db: self.meta_db,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_directory_and_databases() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger");
        let env = LmdbEnvironment::open(&path, DEFAULT_MAP_SIZE).unwrap();
        assert!(path.join("data.mdb").exists());

        let rtxn = env.env().read_txn().unwrap();
        for name in DATABASE_NAMES {
            let db = env
                .env()
                .open_database::<Bytes, Bytes>(&rtxn, Some(name))
                .unwrap();
            assert!(db.is_some(), "database {name} missing");
        }
    }

    #[test]
    fn reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        drop(LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap());
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        assert_eq!(env.path(), dir.path());
    }
}
