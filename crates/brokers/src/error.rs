//! Broker and session error types.

use std::{path::PathBuf, sync::Arc};

use thiserror::Error;

/// Error type broker transports report through [`crate::BrokerClient`].
///
/// [`Arc`] rather than `Box` so the error can carry a `source` chain
/// (`Arc<dyn Error>` implements [`std::error::Error`], `Box<dyn Error>`
/// does not) and be cloned into logs.
pub type TransportError = Arc<dyn std::error::Error + Send + Sync>;

/// Result type alias for broker operations.
pub type BrokerResult<T> = Result<T, BrokerError>;

/// Errors surfaced by the broker registry, session index, and manager.
///
/// # Non-exhaustive
///
/// New variants may be added in future minor releases; downstream match
/// expressions must include a wildcard arm.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BrokerError {
    /// The caller named a broker id the registry does not know.
    #[error("no broker found matching {id:?}")]
    UnknownBroker {
        /// The unknown broker id.
        id: String,
    },

    /// No broker is recorded for the given session id.
    #[error("no broker found for session {session_id:?}")]
    NoBrokerForSession {
        /// The unknown session id.
        session_id: String,
    },

    /// A broker transport call failed; no session state was changed.
    #[error("broker {broker_id:?} call failed")]
    Session {
        /// The broker whose transport failed.
        broker_id: String,
        /// The underlying transport error.
        #[source]
        source: TransportError,
    },

    /// A broker configuration file could not be read or parsed. Used
    /// on the skip-with-warning path during registry construction and
    /// never fatal there.
    #[error("invalid broker configuration {}: {reason}", path.display())]
    Config {
        /// Path of the offending configuration file.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// The broker configuration directory could not be enumerated (it
    /// exists but is unreadable).
    #[error("could not read broker configuration directory {}", path.display())]
    ConfigDir {
        /// The directory that failed to enumerate.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}
