//! Ledger Store Errors
//!
//! Error types for ledger store operations.

use crate::domain::DomainError;

/// Errors that can occur in the ledger store
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No entry with this id (in the requested scope)
    #[error("Entry not found: {0}")]
    NotFound(i64),

    /// Input rejected before any write
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Underlying storage failure; the enclosing transaction was rolled back
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Entry changed between read and write
    #[error("Concurrency conflict for entry {id}")]
    ConcurrencyConflict { id: i64 },

    /// Maximum retries exceeded
    #[error("Maximum retries exceeded for entry update")]
    MaxRetriesExceeded,

    /// A stored row could not be decoded
    #[error("Invalid stored row: {0}")]
    InvalidRow(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Check if this error is a concurrency conflict
    pub fn is_concurrency_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}
