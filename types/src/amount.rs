//! Fixed-point token amounts.
//!
//! Amounts are represented as integers (u128) in the smallest unit of their
//! token to avoid floating-point drift. A token with 6 decimals stores
//! `100.50` as `100_500_000` raw units.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::TypesError;
use crate::params::BPS_DENOMINATOR;

/// An amount of a single token, in raw (smallest) units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    /// `self * bps / 10_000`, rounded down.
    pub fn mul_bps_floor(self, bps: u32) -> Option<Self> {
        self.0
            .checked_mul(bps as u128)
            .map(|v| Self(v / BPS_DENOMINATOR as u128))
    }

    /// `self * bps / 10_000`, rounded half-up to the nearest raw unit.
    pub fn mul_bps_round(self, bps: u32) -> Option<Self> {
        let denom = BPS_DENOMINATOR as u128;
        self.0
            .checked_mul(bps as u128)
            .and_then(|v| v.checked_add(denom / 2))
            .map(|v| Self(v / denom))
    }

    /// `self * numerator / denominator`, rounded down. `None` on overflow or
    /// a zero denominator.
    pub fn mul_div_floor(self, numerator: Self, denominator: Self) -> Option<Self> {
        if denominator.0 == 0 {
            return None;
        }
        self.0
            .checked_mul(numerator.0)
            .map(|v| Self(v / denominator.0))
    }

    /// Parse a decimal string such as `"100.5"` into raw units for a token
    /// with `decimals` fractional digits.
    pub fn parse_decimal(s: &str, decimals: u32) -> Result<Self, TypesError> {
        let invalid = || TypesError::InvalidAmount(s.to_string());
        let s = s.trim();
        if s.is_empty() || s.starts_with('-') || s.starts_with('+') {
            return Err(invalid());
        }

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid());
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }
        if frac.len() > decimals as usize {
            return Err(TypesError::TooManyDecimals {
                value: s.to_string(),
                decimals,
            });
        }

        let scale = 10u128.checked_pow(decimals).ok_or_else(invalid)?;
        let whole_raw = if whole.is_empty() {
            0
        } else {
            whole.parse::<u128>().map_err(|_| invalid())?
        };
        let frac_raw = if frac.is_empty() {
            0
        } else {
            let padded = format!("{frac:0<width$}", width = decimals as usize);
            padded.parse::<u128>().map_err(|_| invalid())?
        };

        whole_raw
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_raw))
            .map(Self)
            .ok_or_else(invalid)
    }

    /// Render as a decimal string with exactly `decimals` fractional digits.
    pub fn to_decimal_string(&self, decimals: u32) -> String {
        if decimals == 0 {
            return self.0.to_string();
        }
        let scale = 10u128.pow(decimals);
        format!(
            "{}.{:0width$}",
            self.0 / scale,
            self.0 % scale,
            width = decimals as usize
        )
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} raw", self.0)
    }
}
