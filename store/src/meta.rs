//! Metadata storage trait.

use crate::StoreError;

/// Trait for storing database metadata (schema version, configuration, etc.).
///
/// This is a generic key-value store for internal bookkeeping that doesn't
/// belong in any domain-specific table.
pub trait MetaStore {
    /// Store a metadata value.
    fn put_meta(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Retrieve a metadata value.
    fn get_meta(&self, key: &str) -> Result<Vec<u8>, StoreError>;

    /// Get the current database schema version (0 for a fresh database).
    fn get_schema_version(&self) -> Result<u32, StoreError>;

    /// Set the database schema version.
    fn set_schema_version(&self, version: u32) -> Result<(), StoreError>;
}

/// Store-allocated id sequences.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Sequence {
    Pool,
    Bet,
    Payout,
    Treasury,
}

impl Sequence {
    /// Meta key holding the last id handed out.
    pub fn meta_key(&self) -> &'static str {
        match self {
            Sequence::Pool => "seq_pool",
            Sequence::Bet => "seq_bet",
            Sequence::Payout => "seq_payout",
            Sequence::Treasury => "seq_treasury",
        }
    }
}
