//! Identifier types for ledger rows.
//!
//! Chapter and outcome ids are assigned by the narrative subsystem; pool,
//! bet, payout and treasury ids are allocated by the ledger store. Numeric
//! ids encode big-endian so byte order matches numeric order in key scans.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TypesError;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            pub fn get(&self) -> u64 {
                self.0
            }

            /// Big-endian key bytes.
            pub fn to_be_bytes(&self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}#{}", $label, self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.parse::<u64>()
                    .map(Self)
                    .map_err(|_| TypesError::InvalidId {
                        kind: $label,
                        value: s.to_string(),
                    })
            }
        }
    };
}

numeric_id!(
    /// A narrative chapter with one set of candidate outcomes.
    ChapterId,
    "chapter"
);
numeric_id!(
    /// One mutually exclusive outcome of a chapter.
    OutcomeId,
    "outcome"
);
numeric_id!(
    /// The stake pool attached to one outcome.
    PoolId,
    "pool"
);
numeric_id!(BetId, "bet");
numeric_id!(PayoutId, "payout");
numeric_id!(TreasuryEntryId, "treasury");

/// Opaque user reference (wallet address or account handle).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Longest accepted user reference, in bytes.
    pub const MAX_LEN: usize = 128;

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Non-empty, bounded, and free of control characters.
    pub fn is_valid(&self) -> bool {
        !self.0.is_empty()
            && self.0.len() <= Self::MAX_LEN
            && !self.0.chars().any(char::is_control)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
