//! Store error types and result alias.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the store substrate.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases; downstream match
/// expressions must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StoreError {
    /// The underlying database failed. Covers I/O errors, corruption
    /// detected by the substrate, and transaction bookkeeping failures.
    #[error("store backend failure")]
    Backend(#[source] Box<redb::Error>),

    /// The store has been signalled to shut down; no new transactions
    /// are started and uncommitted writes are aborted.
    #[error("store is shutting down")]
    ShuttingDown,
}

impl StoreError {
    pub(crate) fn backend(err: impl Into<redb::Error>) -> Self {
        Self::Backend(Box::new(err.into()))
    }
}

impl From<redb::DatabaseError> for StoreError {
    fn from(err: redb::DatabaseError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::TransactionError> for StoreError {
    fn from(err: redb::TransactionError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::TableError> for StoreError {
    fn from(err: redb::TableError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::StorageError> for StoreError {
    fn from(err: redb::StorageError) -> Self {
        Self::backend(err)
    }
}

impl From<redb::CommitError> for StoreError {
    fn from(err: redb::CommitError) -> Self {
        Self::backend(err)
    }
}
