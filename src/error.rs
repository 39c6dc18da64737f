//! Error kinds for the collection pipeline.
//!
//! Adapter and chain-client failures are classified into a small,
//! matchable set so the collector can decide retry vs. skip vs. abort
//! without string-matching error messages.

use thiserror::Error;

/// Error surfaced by a chain-client call or a protocol adapter.
#[derive(Debug, Error)]
pub enum CollectError {
    /// Network timeout, RPC 5xx, connection reset — retry-eligible.
    #[error("transient chain error: {0}")]
    Transient(String),

    /// Pool reserves or liquidity are zero; not a failure, just nothing to price.
    #[error("no liquidity in pool")]
    NoLiquidity,

    /// Zero pool address returned by a factory, or entity absent from storage.
    #[error("not found: {0}")]
    NotFound(String),

    /// Return data did not match the expected ABI shape.
    #[error("decode error: {0}")]
    Decode(String),

    /// No adapter registered for this protocol tag.
    #[error("unsupported protocol: {0}")]
    UnsupportedProtocol(String),

    /// sqrtPriceX96 or tick is outside the representable range.
    #[error("invalid price data: {0}")]
    InvalidPrice(String),

    /// A write conflicted with a concurrent transaction, or the batch write failed.
    #[error("write conflict: {0}")]
    WriteConflict(String),

    /// Operation was cancelled via shutdown; must not be logged as an error.
    #[error("cancelled")]
    Cancelled,
}

impl CollectError {
    /// Whether this error is eligible for the adapter-level retry loop (§4.6).
    pub fn is_retryable(&self) -> bool {
        matches!(self, CollectError::Transient(_))
    }
}

impl From<sqlx::Error> for CollectError {
    fn from(e: sqlx::Error) -> Self {
        CollectError::WriteConflict(e.to_string())
    }
}

impl From<alloy::transports::RpcError<alloy::transports::TransportErrorKind>> for CollectError {
    fn from(e: alloy::transports::RpcError<alloy::transports::TransportErrorKind>) -> Self {
        CollectError::Transient(e.to_string())
    }
}
