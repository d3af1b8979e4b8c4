//! Errors raised while parsing or validating core types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TypesError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("amount {value} has more than {decimals} decimal places")]
    TooManyDecimals { value: String, decimals: u32 },

    #[error("unknown token type: {0}")]
    UnknownToken(String),

    #[error("invalid {kind} id: {value}")]
    InvalidId { kind: &'static str, value: String },

    #[error("invalid market parameters: {0}")]
    InvalidParams(String),
}
