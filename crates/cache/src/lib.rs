//! Persistent identity cache for the identityd daemon.
//!
//! The cache holds every user and group a broker has ever resolved on
//! this host, so NSS lookups can be answered locally without a broker
//! round-trip. It stores users, groups, the bidirectional user↔group
//! membership edges, and the user→broker pin, and keeps them mutually
//! consistent across its indexes:
//!
//! ```text
//!  PAM (successful authentication)
//!      │ update_user_entry / update_broker_for_user
//!      ▼
//!  ┌───────────────────────────────────────────────┐
//!  │                IdentityCache                  │
//!  │  user_by_id ──┐            ┌── group_by_id    │
//!  │  user_by_name ┤ one write  ├── group_by_name  │
//!  │  user_to_groups ┤ txn each ├── group_to_users │
//!  │  user_to_broker ┘          │                  │
//!  └───────────────┬───────────────────────────────┘
//!                  │ user_by_name / group_by_id / all_users ...
//!                  ▼
//!  NSS (read-only projection)
//! ```
//!
//! # Consistency
//!
//! Every write path runs in a single store write transaction, so the
//! invariants hold after every commit:
//!
//! 1. the ID-keyed and name-keyed indexes agree for users and groups;
//! 2. membership is bidirectional: a gid listed for a uid implies the
//!    uid is listed for the gid, and conversely;
//! 3. a UID never silently rebinds to a different user name (nor a GID
//!    to a different group name); such updates abort;
//! 4. a cached non-empty home directory is sticky and survives updates
//!    that try to change it.
//!
//! Entries have no TTL: a record lives until the next successful
//! authentication overwrites it.

#![deny(unsafe_code)]

mod cache;
mod error;
mod types;
mod update;

pub use cache::{CacheOptions, GroupMembershipSink, IdentityCache, SinkError};
pub use error::{CacheError, CacheResult};
pub use types::{Group, GroupEntry, UserEntry, UserPasswdShadow};
