//! Error types for all optidyn operations.

use std::fmt;

use thiserror::Error;

/// Top-level error type for optidyn operations.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Transaction(#[from] TxnError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Filter(#[from] FilterError),

    #[error("transport error: {0}")]
    Transport(String),
}

impl Error {
    /// True for any optimistic-concurrency conflict: a single-item condition
    /// failure or a transaction aborted by one.
    pub fn is_conditional_check_failed(&self) -> bool {
        matches!(
            self,
            Error::Write(WriteError::ConditionalCheckFailed { .. })
                | Error::Transaction(TxnError::TransactionAborted { .. })
        )
    }
}

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unexpected response: {reason}")]
    UnexpectedResponse { reason: String },
}

impl CodecError {
    pub(crate) fn unexpected(reason: impl Into<String>) -> Self {
        CodecError::UnexpectedResponse {
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("conditional check failed for key ({partition_key}, {sort_key})")]
    ConditionalCheckFailed {
        partition_key: String,
        sort_key: String,
    },
}

#[derive(Debug, Error)]
pub enum TxnError {
    #[error("transaction already holds the maximum of {max} operations")]
    TransactionFull { max: usize },

    #[error("transaction aborted{}: {reason}", .index.map(|i| format!(" at operation {i}")).unwrap_or_default())]
    TransactionAborted { index: Option<usize>, reason: String },
}

/// A single index table that failed to apply its projected mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexFailure {
    pub index: String,
    pub reason: String,
}

impl fmt::Display for IndexFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("index projection failed: {}", .failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("; "))]
    ProjectionFailed { failures: Vec<IndexFailure> },
}

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid exclusive start key: {0}")]
    InvalidCursor(String),

    #[error("query limit must be at least 1")]
    InvalidLimit,
}

#[derive(Debug, Error)]
pub enum FilterError {
    #[error("invalid expression: {0}")]
    InvalidExpression(String),
}

pub type Result<T> = std::result::Result<T, Error>;
