//! Error taxonomy for the memory engine.
//!
//! Not-found is never an error here: lookups return `Option`, deletes return
//! `bool`. Everything that reaches [`MemoryError`] is either bad input, a store
//! fault, or a setup failure.

use thiserror::Error;

use crate::db::DbError;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, MemoryError>;

#[derive(Error, Debug)]
pub enum MemoryError {
    /// Bad input: empty content, unknown type, contradictory scope.
    #[error("{0}")]
    Validation(String),

    /// The underlying store failed mid-operation.
    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    /// Schema creation or migration failed; the store is unusable.
    #[error("database setup failed: {0}")]
    Setup(String),

    /// A bearer credential did not resolve to any database.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The external vector-generation call failed.
    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl MemoryError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// `true` for caller mistakes that must never be retried automatically.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}
