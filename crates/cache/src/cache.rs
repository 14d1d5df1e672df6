//! Cache handle, lifecycle, and read-only lookups.

use std::{
    path::{Path, PathBuf},
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use identityd_store::{Bucket, BucketRead, Store, StoreError};
use parking_lot::RwLock;
use serde::{Serialize, de::DeserializeOwned};
use tokio_util::sync::CancellationToken;

use crate::{
    error::{CacheError, CacheResult},
    types::{Group, GroupEntry, GroupToUsers, UserPasswdShadow},
};

/// Name of the database file inside the cache directory.
const DB_FILENAME: &str = "identity.db";

/// Error type collaborators may return from
/// [`GroupMembershipSink::sync_membership`].
pub type SinkError = Box<dyn std::error::Error + Send + Sync>;

/// Collaborator notified after each committed user update so system
/// group files can be kept in step with the cache.
///
/// Sink failures are logged and swallowed: membership in the cache is
/// authoritative, the system files are a best-effort mirror.
pub trait GroupMembershipSink: Send + Sync {
    /// Receives the user name and the full group-name list of the
    /// update that just committed.
    fn sync_membership(&self, username: &str, groups: &[String]) -> Result<(), SinkError>;
}

/// Construction options for [`IdentityCache`].
pub struct CacheOptions {
    dir: PathBuf,
    sink: Option<Arc<dyn GroupMembershipSink>>,
    shutdown: CancellationToken,
}

impl CacheOptions {
    /// Options opening the cache database inside `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), sink: None, shutdown: CancellationToken::new() }
    }

    /// Registers the collaborator that mirrors membership into system
    /// group files.
    #[must_use]
    pub fn with_membership_sink(mut self, sink: Arc<dyn GroupMembershipSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Ties the cache to an externally owned shutdown token.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: CancellationToken) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Opens the cache.
    pub fn open(self) -> CacheResult<IdentityCache> {
        IdentityCache::open_with(self)
    }
}

/// The persistent identity cache.
///
/// Cheap to share behind an [`Arc`]; all operations take `&self`.
pub struct IdentityCache {
    store: Store,

    /// Deliberately inverted guard. The store already serializes
    /// writers, so write-path operations only take the READ side here;
    /// the WRITE side is reserved for administrative paths (`close`)
    /// that must not overlap any in-flight transaction.
    op_guard: RwLock<()>,

    closed: AtomicBool,
    sink: Option<Arc<dyn GroupMembershipSink>>,
}

impl IdentityCache {
    /// Opens (creating if necessary) the cache database in `dir` with
    /// default options.
    pub fn open(dir: impl AsRef<Path>) -> CacheResult<Self> {
        CacheOptions::new(dir.as_ref()).open()
    }

    fn open_with(options: CacheOptions) -> CacheResult<Self> {
        let path = options.dir.join(DB_FILENAME);
        tracing::debug!(path = %path.display(), "opening identity cache");

        let store = Store::open_with_shutdown(&path, options.shutdown)?;
        restrict_permissions(&path);

        Ok(Self {
            store,
            op_guard: RwLock::new(()),
            closed: AtomicBool::new(false),
            sink: options.sink,
        })
    }

    /// Closes the cache.
    ///
    /// Takes the write side of the operation guard, so it blocks until
    /// every in-flight operation has drained, then fails all later ones
    /// with [`StoreError::ShuttingDown`]. Idempotent.
    pub fn close(&self) {
        let _exclusive = self.op_guard.write();
        self.closed.store(true, Ordering::SeqCst);
        self.store.shutdown();
    }

    /// Returns the user with the given name.
    pub fn user_by_name(&self, name: &str) -> CacheResult<UserPasswdShadow> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        get_json(&txn, Bucket::UserByName, name)?.ok_or(CacheError::NoDataFound)
    }

    /// Returns the user with the given UID.
    pub fn user_by_id(&self, uid: u32) -> CacheResult<UserPasswdShadow> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        get_json(&txn, Bucket::UserById, &uid.to_string())?.ok_or(CacheError::NoDataFound)
    }

    /// Returns every cached user.
    pub fn all_users(&self) -> CacheResult<Vec<UserPasswdShadow>> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        txn.scan(Bucket::UserById)?
            .into_iter()
            .map(|(_, raw)| decode(Bucket::UserById, &raw))
            .collect()
    }

    /// Returns the group with the given name, including its member
    /// user names.
    pub fn group_by_name(&self, name: &str) -> CacheResult<Group> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        let record: GroupEntry =
            get_json(&txn, Bucket::GroupByName, name)?.ok_or(CacheError::NoDataFound)?;
        group_with_members(&txn, record)
    }

    /// Returns the group with the given GID, including its member user
    /// names.
    pub fn group_by_id(&self, gid: u32) -> CacheResult<Group> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        let record: GroupEntry =
            get_json(&txn, Bucket::GroupById, &gid.to_string())?.ok_or(CacheError::NoDataFound)?;
        group_with_members(&txn, record)
    }

    /// Returns every cached group with its members.
    pub fn all_groups(&self) -> CacheResult<Vec<Group>> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        txn.scan(Bucket::GroupById)?
            .into_iter()
            .map(|(_, raw)| {
                let record: GroupEntry = decode(Bucket::GroupById, &raw)?;
                group_with_members(&txn, record)
            })
            .collect()
    }

    /// Returns the id of the broker that last authenticated the user.
    pub fn broker_for_user(&self, uid: u32) -> CacheResult<String> {
        let _op = self.op_guard.read();
        self.ensure_open()?;

        let txn = self.store.begin_read()?;
        get_json(&txn, Bucket::UserToBroker, &uid.to_string())?.ok_or(CacheError::NoDataFound)
    }

    pub(crate) fn ensure_open(&self) -> CacheResult<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CacheError::Store(StoreError::ShuttingDown));
        }
        Ok(())
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    pub(crate) fn op_guard(&self) -> &RwLock<()> {
        &self.op_guard
    }

    pub(crate) fn sink(&self) -> Option<&Arc<dyn GroupMembershipSink>> {
        self.sink.as_ref()
    }
}

impl std::fmt::Debug for IdentityCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdentityCache")
            .field("closed", &self.closed.load(Ordering::SeqCst))
            .field("has_sink", &self.sink.is_some())
            .finish()
    }
}

/// Joins a stored group record with the member names behind its reverse
/// edge. A uid listed in the edge but missing from `user_by_id` means
/// the indexes disagree.
fn group_with_members(txn: &impl BucketRead, record: GroupEntry) -> CacheResult<Group> {
    let edge: GroupToUsers =
        get_json(txn, Bucket::GroupToUsers, &record.gid.to_string())?.unwrap_or_default();

    let mut members = Vec::with_capacity(edge.uids.len());
    for uid in &edge.uids {
        let user: UserPasswdShadow =
            get_json(txn, Bucket::UserById, &uid.to_string())?.ok_or_else(|| {
                CacheError::Corrupted(format!(
                    "group {} lists uid {uid} but user_by_id has no such user",
                    record.gid
                ))
            })?;
        members.push(user.name);
    }

    Ok(Group { name: record.name, gid: record.gid, members })
}

/// Decodes a JSON bucket value, reporting decode failures as cache
/// corruption.
pub(crate) fn decode<T: DeserializeOwned>(bucket: Bucket, raw: &[u8]) -> CacheResult<T> {
    serde_json::from_slice(raw)
        .map_err(|err| CacheError::Corrupted(format!("bucket {bucket}: {err}")))
}

/// Reads and decodes one key; `Ok(None)` when absent.
pub(crate) fn get_json<T: DeserializeOwned>(
    txn: &impl BucketRead,
    bucket: Bucket,
    key: &str,
) -> CacheResult<Option<T>> {
    match txn.get(bucket, key)? {
        Some(raw) => decode(bucket, &raw).map(Some),
        None => Ok(None),
    }
}

/// Encodes and writes one value.
///
/// # Panics
///
/// Panics if the value cannot be encoded: every stored type serializes
/// unconditionally, so a failure here is a schema bug, not a runtime
/// condition.
pub(crate) fn put_json<T: Serialize>(
    txn: &identityd_store::WriteTxn,
    bucket: Bucket,
    key: &str,
    value: &T,
) -> CacheResult<()> {
    let raw = match serde_json::to_vec(value) {
        Ok(raw) => raw,
        Err(err) => panic!("programming error: value for bucket {bucket} is not encodable: {err}"),
    };
    txn.put(bucket, key, &raw)?;
    Ok(())
}

/// Restricts the database file to its owner: it stores shadow fields.
fn restrict_permissions(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        if let Err(err) = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)) {
            tracing::warn!(path = %path.display(), error = %err,
                "could not restrict cache file permissions");
        }
    }
    #[cfg(not(unix))]
    let _ = path;
}
