//! LMDB storage backend for the Plotline settlement engine.
//!
//! Implements the ledger traits from `plotline-store` using the `heed` LMDB
//! bindings. Every record table and secondary index is a named database
//! inside a single environment, so one LMDB write transaction covers a
//! whole engine command.

pub mod environment;
pub mod error;
pub mod integrity;
mod keys;
pub mod ledger;
pub mod meta;
pub mod migration;

pub use environment::LmdbEnvironment;
pub use error::LmdbError;
pub use integrity::{check_data_dir, check_integrity, IntegrityReport};
pub use ledger::{LmdbReadTxn, LmdbWriteTxn};
pub use meta::LmdbMetaStore;
pub use migration::{Migrator, CURRENT_SCHEMA_VERSION};
