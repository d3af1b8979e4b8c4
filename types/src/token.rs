//! Supported token types and per-token amount maps.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::amount::TokenAmount;
use crate::error::TypesError;

/// The closed set of stake denominations.
///
/// Amounts of different token types are never commingled: every pool total,
/// payout and treasury entry is kept per token.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Usdc,
    Usdt,
}

impl TokenType {
    pub const ALL: [TokenType; 2] = [TokenType::Usdc, TokenType::Usdt];

    /// Number of fractional digits in one whole token.
    pub fn decimals(&self) -> u32 {
        match self {
            TokenType::Usdc | TokenType::Usdt => 6,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Usdc => "usdc",
            TokenType::Usdt => "usdt",
        }
    }

    /// Parse a decimal string in this token's whole units.
    pub fn parse_amount(&self, s: &str) -> Result<TokenAmount, TypesError> {
        TokenAmount::parse_decimal(s, self.decimals())
    }

    /// Render a raw amount in this token's whole units.
    pub fn format_amount(&self, amount: TokenAmount) -> String {
        amount.to_decimal_string(self.decimals())
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TokenType {
    type Err = TypesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "usdc" => Ok(TokenType::Usdc),
            "usdt" => Ok(TokenType::Usdt),
            other => Err(TypesError::UnknownToken(other.to_string())),
        }
    }
}

/// Amounts keyed by token type.
///
/// Zero entries are never stored, so two maps holding the same non-zero
/// amounts compare equal regardless of how they were built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenMap(BTreeMap<TokenType, TokenAmount>);

impl TokenMap {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn single(token: TokenType, amount: TokenAmount) -> Self {
        let mut map = Self::new();
        map.set(token, amount);
        map
    }

    /// Amount for `token`, zero if absent.
    pub fn get(&self, token: TokenType) -> TokenAmount {
        self.0.get(&token).copied().unwrap_or(TokenAmount::ZERO)
    }

    pub fn set(&mut self, token: TokenType, amount: TokenAmount) {
        if amount.is_zero() {
            self.0.remove(&token);
        } else {
            self.0.insert(token, amount);
        }
    }

    /// Add `amount` to the entry for `token`. Returns `None` on overflow,
    /// leaving the map unchanged.
    pub fn checked_add(&mut self, token: TokenType, amount: TokenAmount) -> Option<()> {
        let sum = self.get(token).checked_add(amount)?;
        self.set(token, sum);
        Some(())
    }

    /// Add every entry of `other` into `self`.
    pub fn checked_merge(&mut self, other: &TokenMap) -> Option<()> {
        for (token, amount) in other.iter() {
            self.checked_add(token, amount)?;
        }
        Some(())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenType, TokenAmount)> + '_ {
        self.0.iter().map(|(t, a)| (*t, *a))
    }

    pub fn tokens(&self) -> impl Iterator<Item = TokenType> + '_ {
        self.0.keys().copied()
    }
}
