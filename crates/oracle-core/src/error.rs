use thiserror::Error;

use crate::validation::ValidationError;

/// The error taxonomy shared by every pipeline component.
///
/// Only [`OracleError::Fatal`] is allowed to cross a component boundary
/// unhandled; every other variant is recovered where it is meaningful,
/// counted on the metrics bus, and surfaced through a health snapshot.
#[derive(Debug, Error)]
pub enum OracleError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("transient adapter error: {0}")]
    TransientAdapter(String),

    #[error("reading rejected: {0}")]
    InvalidReading(String),

    #[error("insufficient contributors: {participants} < {min_nodes}")]
    InsufficientContributors { participants: usize, min_nodes: usize },

    #[error("no consensus: ratio {ratio:.3} < threshold {threshold:.3}")]
    NoConsensus { ratio: f64, threshold: f64 },

    #[error("transient ledger error: {0}")]
    TransientLedger(String),

    #[error("overloaded: {0}")]
    Overloaded(String),

    #[error("stake insufficient: have {have}, need {need}")]
    StakeInsufficient { have: u64, need: u64 },

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("fatal error: {0}")]
    Fatal(String),
}

impl OracleError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn transient_adapter(msg: impl Into<String>) -> Self {
        Self::TransientAdapter(msg.into())
    }

    pub fn invalid_reading(msg: impl Into<String>) -> Self {
        Self::InvalidReading(msg.into())
    }

    pub fn transient_ledger(msg: impl Into<String>) -> Self {
        Self::TransientLedger(msg.into())
    }

    pub fn overloaded(msg: impl Into<String>) -> Self {
        Self::Overloaded(msg.into())
    }

    pub fn crypto(msg: impl Into<String>) -> Self {
        Self::Crypto(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn fatal(msg: impl Into<String>) -> Self {
        Self::Fatal(msg.into())
    }

    /// Whether this error represents a soft, non-fatal window-level failure
    /// that should be counted rather than propagated.
    pub fn is_soft(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }
}

pub type Result<T> = std::result::Result<T, OracleError>;
