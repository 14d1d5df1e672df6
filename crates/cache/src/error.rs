//! Cache error types and result alias.

use identityd_store::StoreError;
use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Errors surfaced by the identity cache.
///
/// Absence of data ([`CacheError::NoDataFound`]) is an ordinary outcome
/// for lookups and is never logged as an error by the cache itself.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases; downstream match
/// expressions must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The queried user, group, or broker pin is not in the cache.
    #[error("no data found")]
    NoDataFound,

    /// The update would rebind a UID that already belongs to a
    /// different user. Surfaced to callers as "UID already in use by a
    /// different user".
    #[error("UID {uid} for user {incoming:?} already in use by user {existing:?}")]
    UidConflict {
        /// The contested UID.
        uid: u32,
        /// Name of the user currently holding the UID.
        existing: String,
        /// Name the update tried to bind the UID to.
        incoming: String,
    },

    /// The update would rebind a GID that already belongs to a
    /// different group.
    #[error("GID {gid} for group {incoming:?} already in use by group {existing:?}")]
    GidConflict {
        /// The contested GID.
        gid: u32,
        /// Name of the group currently holding the GID.
        existing: String,
        /// Name the update tried to bind the GID to.
        incoming: String,
    },

    /// The caller handed the write path an entry that violates its
    /// preconditions (empty name, zero id, misplaced primary group).
    #[error("invalid entry: {0}")]
    InvalidEntry(String),

    /// A stored value failed to decode. The indexes no longer agree
    /// with each other or with their serialized form; administrative
    /// repair of the database file is required.
    #[error("corrupted cache content: {0}")]
    Corrupted(String),

    /// The store substrate failed; the surrounding transaction was
    /// rolled back.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Returns `true` for plain key-absence, which callers usually
    /// translate into their own not-found responses.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NoDataFound)
    }
}
