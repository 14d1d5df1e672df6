//! The on-disk store and its transaction handles.

use std::path::Path;

use bytes::Bytes;
use redb::{Database, ReadableTable};
use tokio_util::sync::CancellationToken;

use crate::{
    bucket::Bucket,
    error::{StoreError, StoreResult},
};

/// Read access to buckets, shared by read and write transactions.
///
/// A [`WriteTxn`] reads through its own uncommitted mutations; a
/// [`ReadTxn`] reads the snapshot taken when it began.
pub trait BucketRead {
    /// Reads a single key from a bucket.
    ///
    /// Returns `Ok(None)` when the key is absent; absence is not an
    /// error at this layer.
    fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>>;
}

/// Single-file transactional bucket store.
///
/// All buckets in [`Bucket::ALL`] are created when the store is opened,
/// so transactions never have to handle a missing bucket.
///
/// The store is `Send + Sync`; transaction handles are meant to be
/// short-lived and stay on the thread that opened them.
pub struct Store {
    db: Database,
    shutdown: CancellationToken,
}

impl Store {
    /// Opens (creating if necessary) the database file at `path` and
    /// ensures all buckets exist.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Self::open_with_shutdown(path, CancellationToken::new())
    }

    /// Like [`Store::open`], with an externally owned shutdown token.
    ///
    /// Cancelling the token has the same effect as calling
    /// [`Store::shutdown`].
    pub fn open_with_shutdown(
        path: impl AsRef<Path>,
        shutdown: CancellationToken,
    ) -> StoreResult<Self> {
        tracing::debug!(path = %path.as_ref().display(), "opening store");
        let db = Database::create(path)?;
        let store = Self { db, shutdown };

        let txn = store.db.begin_write()?;
        for bucket in Bucket::ALL {
            txn.open_table(bucket.table())?;
        }
        txn.commit()?;

        Ok(store)
    }

    /// Begins a snapshot read transaction.
    ///
    /// Multiple read transactions may be open concurrently; each sees
    /// the state as of the last commit before it began.
    pub fn begin_read(&self) -> StoreResult<ReadTxn> {
        self.check_cancelled()?;
        Ok(ReadTxn { txn: self.db.begin_read()? })
    }

    /// Begins the exclusive write transaction.
    ///
    /// Blocks until any in-flight write transaction finishes. Mutations
    /// are buffered until [`WriteTxn::commit`]; dropping the handle
    /// aborts them.
    pub fn begin_write(&self) -> StoreResult<WriteTxn> {
        self.check_cancelled()?;
        Ok(WriteTxn { txn: self.db.begin_write()?, shutdown: self.shutdown.clone() })
    }

    /// Signals the store to shut down.
    ///
    /// New transactions fail with [`StoreError::ShuttingDown`] and
    /// pending write transactions refuse to commit. Idempotent.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Returns `true` once [`Store::shutdown`] has been called or the
    /// external token was cancelled.
    #[must_use]
    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    fn check_cancelled(&self) -> StoreResult<()> {
        if self.shutdown.is_cancelled() {
            return Err(StoreError::ShuttingDown);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").field("shutting_down", &self.is_shutting_down()).finish()
    }
}

/// Snapshot read transaction over all buckets.
pub struct ReadTxn {
    txn: redb::ReadTransaction,
}

impl ReadTxn {
    /// Returns every `(key, value)` pair of a bucket in ascending key
    /// order.
    pub fn scan(&self, bucket: Bucket) -> StoreResult<Vec<(String, Bytes)>> {
        let table = self.txn.open_table(bucket.table())?;
        let mut entries = Vec::new();
        for item in table.iter()? {
            let (key, value) = item?;
            entries.push((key.value().to_owned(), Bytes::copy_from_slice(value.value())));
        }
        Ok(entries)
    }
}

impl BucketRead for ReadTxn {
    fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>> {
        let table = self.txn.open_table(bucket.table())?;
        Ok(table.get(key)?.map(|guard| Bytes::copy_from_slice(guard.value())))
    }
}

/// Exclusive write transaction.
///
/// All mutations land atomically on [`WriteTxn::commit`]; a dropped
/// transaction leaves no trace.
pub struct WriteTxn {
    txn: redb::WriteTransaction,
    shutdown: CancellationToken,
}

impl WriteTxn {
    /// Buffers a write of `value` under `key` in `bucket`.
    pub fn put(&self, bucket: Bucket, key: &str, value: &[u8]) -> StoreResult<()> {
        let mut table = self.txn.open_table(bucket.table())?;
        table.insert(key, value)?;
        Ok(())
    }

    /// Buffers a deletion of `key` from `bucket`. Deleting an absent
    /// key is a no-op.
    pub fn delete(&self, bucket: Bucket, key: &str) -> StoreResult<()> {
        let mut table = self.txn.open_table(bucket.table())?;
        table.remove(key)?;
        Ok(())
    }

    /// Commits all buffered mutations atomically.
    ///
    /// A shutdown observed here aborts the transaction instead; a
    /// commit that has already reached the substrate is not
    /// interruptible.
    pub fn commit(self) -> StoreResult<()> {
        if self.shutdown.is_cancelled() {
            // Dropping self.txn aborts the transaction.
            return Err(StoreError::ShuttingDown);
        }
        self.txn.commit()?;
        Ok(())
    }
}

impl BucketRead for WriteTxn {
    fn get(&self, bucket: Bucket, key: &str) -> StoreResult<Option<Bytes>> {
        let table = self.txn.open_table(bucket.table())?;
        Ok(table.get(key)?.map(|guard| Bytes::copy_from_slice(guard.value())))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn open_store(dir: &TempDir) -> Store {
        Store::open(dir.path().join("store.db")).expect("open store")
    }

    #[test]
    fn put_get_delete_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserByName, "alice", b"payload").unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.get(Bucket::UserByName, "alice").unwrap(), Some(Bytes::from("payload")));
        assert_eq!(txn.get(Bucket::UserByName, "bob").unwrap(), None);
        drop(txn);

        let txn = store.begin_write().unwrap();
        txn.delete(Bucket::UserByName, "alice").unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.get(Bucket::UserByName, "alice").unwrap(), None);
    }

    #[test]
    fn buckets_exist_after_open() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_read().unwrap();
        for bucket in Bucket::ALL {
            assert_eq!(txn.get(bucket, "missing").unwrap(), None, "bucket {bucket} must exist");
        }
    }

    #[test]
    fn multi_bucket_commit_is_atomic() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserById, "1000", b"u").unwrap();
        txn.put(Bucket::GroupById, "100", b"g").unwrap();
        txn.put(Bucket::UserToGroups, "1000", b"edge").unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        assert!(txn.get(Bucket::UserById, "1000").unwrap().is_some());
        assert!(txn.get(Bucket::GroupById, "100").unwrap().is_some());
        assert!(txn.get(Bucket::UserToGroups, "1000").unwrap().is_some());
    }

    #[test]
    fn dropped_write_txn_leaves_no_trace() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserById, "1000", b"u").unwrap();
        drop(txn);

        let txn = store.begin_read().unwrap();
        assert_eq!(txn.get(Bucket::UserById, "1000").unwrap(), None);
    }

    #[test]
    fn write_txn_reads_its_own_writes() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::GroupByName, "dev", b"g").unwrap();
        assert_eq!(txn.get(Bucket::GroupByName, "dev").unwrap(), Some(Bytes::from("g")));
        drop(txn);
    }

    #[test]
    fn readers_see_a_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserByName, "alice", b"v1").unwrap();
        txn.commit().unwrap();

        let reader = store.begin_read().unwrap();

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserByName, "alice", b"v2").unwrap();
        txn.commit().unwrap();

        // The reader began before the second commit and keeps seeing v1.
        assert_eq!(reader.get(Bucket::UserByName, "alice").unwrap(), Some(Bytes::from("v1")));

        let fresh = store.begin_read().unwrap();
        assert_eq!(fresh.get(Bucket::UserByName, "alice").unwrap(), Some(Bytes::from("v2")));
    }

    #[test]
    fn scan_returns_entries_in_key_order() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserByName, "carol", b"3").unwrap();
        txn.put(Bucket::UserByName, "alice", b"1").unwrap();
        txn.put(Bucket::UserByName, "bob", b"2").unwrap();
        txn.commit().unwrap();

        let txn = store.begin_read().unwrap();
        let entries = txn.scan(Bucket::UserByName).unwrap();
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["alice", "bob", "carol"]);
    }

    #[test]
    fn shutdown_blocks_new_transactions() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        store.shutdown();
        assert!(store.is_shutting_down());
        assert!(matches!(store.begin_read(), Err(StoreError::ShuttingDown)));
        assert!(matches!(store.begin_write(), Err(StoreError::ShuttingDown)));
    }

    #[test]
    fn shutdown_aborts_pending_commit() {
        let dir = TempDir::new().unwrap();
        let store = open_store(&dir);

        let txn = store.begin_write().unwrap();
        txn.put(Bucket::UserById, "1000", b"u").unwrap();
        store.shutdown();
        assert!(matches!(txn.commit(), Err(StoreError::ShuttingDown)));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = Store::open(&path).unwrap();
            let txn = store.begin_write().unwrap();
            txn.put(Bucket::UserToBroker, "1000", b"\"broker\"").unwrap();
            txn.commit().unwrap();
        }

        let store = Store::open(&path).unwrap();
        let txn = store.begin_read().unwrap();
        assert_eq!(
            txn.get(Bucket::UserToBroker, "1000").unwrap(),
            Some(Bytes::from("\"broker\""))
        );
    }
}
