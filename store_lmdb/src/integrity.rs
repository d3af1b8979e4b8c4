//! LMDB database integrity checks.
//!
//! Run on startup to detect corruption early, before the engine accepts
//! commands.

use std::path::Path;

use heed::types::Bytes;

use crate::environment::{LmdbEnvironment, DATABASE_NAMES};
use crate::LmdbError;

/// Summary of an integrity check run.
#[derive(Debug)]
pub struct IntegrityReport {
    pub databases_checked: u32,
    pub total_entries: u64,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    /// Returns `true` if no errors were detected.
    pub fn is_healthy(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check LMDB database integrity on startup.
///
/// Opens each expected database and counts its entries, then checks that
/// the one-entry-per-record indexes agree with their primary tables. Read
/// failures and mismatches are recorded in the report rather than causing
/// a hard error.
pub fn check_integrity(env: &LmdbEnvironment) -> Result<IntegrityReport, LmdbError> {
    let mut report = IntegrityReport {
        databases_checked: 0,
        total_entries: 0,
        errors: Vec::new(),
    };

    let rtxn = env.env().read_txn()?;

    for &db_name in DATABASE_NAMES {
        match env
            .env()
            .open_database::<Bytes, Bytes>(&rtxn, Some(db_name))
        {
            Ok(Some(db)) => {
                report.databases_checked += 1;
                match db.len(&rtxn) {
                    Ok(count) => report.total_entries += count,
                    Err(e) => report
                        .errors
                        .push(format!("failed to read database '{}': {}", db_name, e)),
                }
            }
            Ok(None) => report
                .errors
                .push(format!("database '{}' is missing", db_name)),
            Err(e) => report
                .errors
                .push(format!("failed to open database '{}': {}", db_name, e)),
        }
    }

    let pairs = [
        ("pools", env.pools_db, "outcome_pool", env.outcome_pool_db),
        ("pools", env.pools_db, "chapter_pools", env.chapter_pools_db),
        ("bets", env.bets_db, "pool_bets", env.pool_bets_db),
        ("bets", env.bets_db, "user_bets", env.user_bets_db),
        ("bets", env.bets_db, "bet_tx_refs", env.bet_tx_refs_db),
        ("payouts", env.payouts_db, "pool_payouts", env.pool_payouts_db),
        ("payouts", env.payouts_db, "user_payouts", env.user_payouts_db),
        ("treasury", env.treasury_db, "chapter_treasury", env.chapter_treasury_db),
    ];
    for (primary_name, primary, index_name, index) in pairs {
        let records = primary.len(&rtxn)?;
        let entries = index.len(&rtxn)?;
        if records != entries {
            report.errors.push(format!(
                "index '{}' has {} entries but '{}' has {} records",
                index_name, entries, primary_name, records
            ));
        }
    }

    if !report.is_healthy() {
        tracing::warn!(errors = report.errors.len(), "integrity check found problems");
    }

    Ok(report)
}

/// Check if the LMDB data directory looks valid before opening.
///
/// Returns `Ok(())` for a fresh (nonexistent) directory. Returns an error
/// if the directory exists but `data.mdb` is missing, which suggests
/// corruption or misconfiguration.
pub fn check_data_dir(path: &Path) -> Result<(), String> {
    if !path.exists() {
        return Ok(());
    }
    let data_file = path.join("data.mdb");
    if !data_file.exists() {
        return Err(format!(
            "LMDB directory exists but data.mdb is missing at {}",
            path.display()
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::DEFAULT_MAP_SIZE;
    use plotline_store::{LedgerStore, LedgerWrite, PayoutRecord, PoolRecord};
    use plotline_types::{
        ChapterId, OutcomeId, PayoutId, PayoutStatus, PoolId, PoolStatus, Timestamp, TokenAmount,
        TokenMap, TokenType, UserId,
    };

    #[test]
    fn check_data_dir_fresh_path() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(&dir.path().join("nope")).is_ok());
    }

    #[test]
    fn check_data_dir_without_data_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(check_data_dir(dir.path()).is_err());
    }

    #[test]
    fn fresh_environment_is_healthy() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        let report = check_integrity(&env).unwrap();
        assert!(report.is_healthy(), "{:?}", report.errors);
        assert_eq!(report.databases_checked, DATABASE_NAMES.len() as u32);
        assert_eq!(report.total_entries, 0);
    }

    #[test]
    fn detects_index_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        let mut w = env.write_txn().unwrap();
        w.put_pool(&PoolRecord {
            id: PoolId::new(1),
            chapter_id: ChapterId::new(1),
            outcome_id: OutcomeId::new(1),
            status: PoolStatus::Open,
            totals: TokenMap::new(),
            carryover: TokenMap::new(),
            voter_count: 0,
            created_at: Timestamp::new(0),
            closed_at: None,
            resolved_at: None,
        })
        .unwrap();
        w.commit().unwrap();
        assert!(check_integrity(&env).unwrap().is_healthy());

        let mut wtxn = env.env().write_txn().unwrap();
        env.outcome_pool_db.clear(&mut wtxn).unwrap();
        wtxn.commit().unwrap();
        assert!(!check_integrity(&env).unwrap().is_healthy());
    }

    #[test]
    fn detects_missing_user_payout_index() {
        let dir = tempfile::tempdir().unwrap();
        let env = LmdbEnvironment::open(dir.path(), DEFAULT_MAP_SIZE).unwrap();
        let mut w = env.write_txn().unwrap();
        w.put_payout(&PayoutRecord {
            id: PayoutId::new(1),
            user: UserId::new("alice"),
            pool_id: PoolId::new(1),
            chapter_id: ChapterId::new(1),
            token: TokenType::Usdc,
            amount: TokenAmount::new(5),
            status: PayoutStatus::Pending,
            created_at: Timestamp::new(0),
            completed_at: None,
        })
        .unwrap();
        w.commit().unwrap();
        assert!(check_integrity(&env).unwrap().is_healthy());

        let mut wtxn = env.env().write_txn().unwrap();
        env.user_payouts_db.clear(&mut wtxn).unwrap();
        wtxn.commit().unwrap();
        let report = check_integrity(&env).unwrap();
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].contains("user_payouts"));
    }
}
