use thiserror::Error;

/// Errors surfaced by the ledger and the node service.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// A core invariant was broken. Indicates a bug, never user input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("invalid node address {address:?}: {reason}")]
    InvalidAddress { address: String, reason: String },

    /// The blocking proof search could not be joined.
    #[error("mining task failed: {0}")]
    Mining(String),
}

/// Why a peer's chain could not be obtained. Never escapes consensus
/// resolution; the peer is skipped.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out")]
    Timeout,

    #[error("peer answered with status {0}")]
    Status(u16),

    #[error("malformed chain response: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, LedgerError>;
