//! Transactional bucket store for the identityd daemon.
//!
//! This crate provides [`Store`], the single-file persistence substrate
//! underneath the identity cache. It exposes named buckets over an
//! embedded [`redb`] database and guarantees exactly what the cache
//! layer depends on:
//!
//! - **Snapshot isolation for readers**: a [`ReadTxn`] observes the
//!   state as of the last committed write, regardless of concurrent
//!   writers.
//! - **Serialized writers**: at most one [`WriteTxn`] is in flight at
//!   any time; a second `begin_write` blocks until the first commits or
//!   aborts.
//! - **Atomic multi-bucket commit**: all mutations buffered in a
//!   [`WriteTxn`] become visible together on [`WriteTxn::commit`], or
//!   not at all. Dropping the transaction without committing aborts it.
//!
//! Keys are strings (base-10 ASCII renderings of UIDs/GIDs, or names
//! used verbatim); values are opaque bytes. Serialization policy lives
//! in the cache layer, not here.
//!
//! # Shutdown
//!
//! A store can be constructed with a
//! [`CancellationToken`](tokio_util::sync::CancellationToken). Once the
//! token is cancelled (directly or via [`Store::shutdown`]), new
//! transactions fail with [`StoreError::ShuttingDown`] and a pending
//! write refuses to commit. A commit that has already been issued runs
//! to completion; the underlying database keeps its own crash
//! atomicity either way.

#![deny(unsafe_code)]

mod bucket;
mod error;
mod store;

pub use bucket::Bucket;
pub use error::{StoreError, StoreResult};
pub use store::{BucketRead, ReadTxn, Store, WriteTxn};
