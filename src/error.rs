use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

/// Errors that abort a bubblemap request.
///
/// Row-level problems never show up here; they are absorbed by the normalizer
/// and reported through [`MalformedRecord`] counters instead.
#[derive(Debug, Error)]
pub enum BubblemapError {
    #[error("invalid configuration for `{field}`: {reason}")]
    InvalidConfiguration { field: &'static str, reason: String },

    #[error("upstream query failed: {0}")]
    Upstream(#[from] UpstreamError),
}

impl BubblemapError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        BubblemapError::InvalidConfiguration {
            field,
            reason: reason.into(),
        }
    }

    /// Field name for configuration errors, `None` otherwise
    pub fn field(&self) -> Option<&'static str> {
        match self {
            BubblemapError::InvalidConfiguration { field, .. } => Some(field),
            BubblemapError::Upstream(_) => None,
        }
    }
}

/// Failures of the warehouse collaborator
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected by warehouse ({status})")]
    Unauthorized { status: u16 },

    #[error("warehouse rate limit hit")]
    RateLimited,

    #[error("warehouse API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("warehouse RPC error: {0}")]
    Rpc(String),

    #[error("query run ended in state {state}: {message}")]
    QueryFailed { state: String, message: String },

    #[error("query did not finish within {0:?}")]
    Timeout(Duration),

    #[error("could not decode warehouse response: {0}")]
    Decode(String),
}

/// Why a raw row was dropped during normalization
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MalformedRecord {
    #[error("row does not match the expected column types")]
    Undecodable,

    #[error("missing trader address")]
    MissingTrader,

    #[error("missing USD amount")]
    MissingAmount,

    #[error("USD amount is not numeric")]
    NonNumericAmount,

    #[error("USD amount is negative")]
    NegativeAmount,

    #[error("USD amount exceeds the plausible per-trade maximum")]
    ImplausibleAmount,

    #[error("missing or unparseable timestamp")]
    InvalidTimestamp,

    #[error("timestamp outside requested date range")]
    OutOfRange,

    #[error("row belongs to a different token")]
    TokenMismatch,
}
