//! The transactional write path: user updates, membership
//! reconciliation, and the broker pin.

use chrono::Utc;
use identityd_store::{Bucket, WriteTxn};

use crate::{
    cache::{IdentityCache, get_json, put_json},
    error::{CacheError, CacheResult},
    types::{GroupEntry, GroupToUsers, UserEntry, UserPasswdShadow, UserToGroups},
};

impl IdentityCache {
    /// Inserts or updates a user together with its full group set.
    ///
    /// This is the single write path fed by PAM after a successful
    /// authentication. Everything happens inside one store write
    /// transaction:
    ///
    /// 1. the user is checked against `user_by_id`; a UID held by a
    ///    different name aborts with [`CacheError::UidConflict`];
    /// 2. a cached non-empty home directory overrides the incoming one
    ///    (with a warning) rather than being replaced;
    /// 3. each group is checked against `group_by_id` symmetrically;
    /// 4. membership edges are reconciled: the user is added to every
    ///    group in `groups` (repairing drift, not just additions), the
    ///    forward edge is overwritten in the supplied order, and the
    ///    user is removed from groups no longer listed. A group
    ///    emptied this way keeps its records: nothing here collects
    ///    orphan groups.
    ///
    /// `last_login` is stamped with the current time on every call.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidEntry`] when a precondition fails (empty
    /// name, zero id, primary group not first),
    /// [`CacheError::UidConflict`]/[`CacheError::GidConflict`] on
    /// identity conflicts, [`CacheError::Store`] when the substrate
    /// fails. On any error the transaction is rolled back and nothing
    /// is visible to readers.
    pub fn update_user_entry(&self, user: UserEntry, groups: &[GroupEntry]) -> CacheResult<()> {
        validate_entry(&user, groups)?;

        let _op = self.op_guard().read();
        self.ensure_open()?;

        let record = UserPasswdShadow::from_entry(user, Utc::now());

        let txn = self.store().begin_write()?;

        // No previous edge is valid: it means this is the first insertion.
        let previous: UserToGroups =
            get_json(&txn, Bucket::UserToGroups, &record.uid.to_string())?.unwrap_or_default();

        let record = update_user(&txn, record)?;
        update_groups(&txn, groups)?;
        reconcile_membership(&txn, record.uid, groups, &previous.gids)?;

        txn.commit()?;

        if let Some(sink) = self.sink() {
            let names: Vec<String> = groups.iter().map(|g| g.name.clone()).collect();
            if let Err(err) = sink.sync_membership(&record.name, &names) {
                tracing::warn!(user = %record.name, error = %err,
                    "failed to mirror membership into system group files");
            }
        }

        Ok(())
    }

    /// Records the broker that last authenticated `username`, so later
    /// logins default to it.
    ///
    /// # Errors
    ///
    /// [`CacheError::NoDataFound`] when the user is not cached,
    /// [`CacheError::Store`] when the substrate fails.
    pub fn update_broker_for_user(&self, username: &str, broker_id: &str) -> CacheResult<()> {
        let _op = self.op_guard().read();
        self.ensure_open()?;

        let uid = {
            let txn = self.store().begin_read()?;
            let user: UserPasswdShadow =
                get_json(&txn, Bucket::UserByName, username)?.ok_or(CacheError::NoDataFound)?;
            user.uid
        };

        let txn = self.store().begin_write()?;
        put_json(&txn, Bucket::UserToBroker, &uid.to_string(), &broker_id)?;
        txn.commit()?;

        Ok(())
    }
}

/// Rejects entries the write path must never store.
fn validate_entry(user: &UserEntry, groups: &[GroupEntry]) -> CacheResult<()> {
    if user.name.is_empty() {
        return Err(CacheError::InvalidEntry("user name is empty".into()));
    }
    if user.uid == 0 {
        return Err(CacheError::InvalidEntry(format!("user {:?} has UID 0", user.name)));
    }
    for group in groups {
        if group.name.is_empty() {
            return Err(CacheError::InvalidEntry(format!(
                "group with GID {} has an empty name",
                group.gid
            )));
        }
        if group.gid == 0 {
            return Err(CacheError::InvalidEntry(format!("group {:?} has GID 0", group.name)));
        }
    }
    if let Some(first) = groups.first()
        && first.gid != user.gid
    {
        return Err(CacheError::InvalidEntry(format!(
            "primary group (GID {}) of user {:?} must be first in the group list",
            user.gid, user.name
        )));
    }
    Ok(())
}

/// Writes both user buckets, enforcing UID stability and home-directory
/// stickiness against the existing record.
fn update_user(txn: &WriteTxn, mut record: UserPasswdShadow) -> CacheResult<UserPasswdShadow> {
    let key = record.uid.to_string();

    if let Some(existing) = get_json::<UserPasswdShadow>(txn, Bucket::UserById, &key)? {
        if existing.name != record.name {
            tracing::error!(uid = record.uid, user = %record.name, existing = %existing.name,
                "UID already in use by another user");
            return Err(CacheError::UidConflict {
                uid: record.uid,
                existing: existing.name,
                incoming: record.name,
            });
        }

        // Keep the home directory we already know about.
        if !existing.home_dir.is_empty() && existing.home_dir != record.home_dir {
            tracing::warn!(user = %record.name, kept = %existing.home_dir,
                discarded = %record.home_dir,
                "user already has a home directory; keeping the cached one");
            record.home_dir = existing.home_dir;
        }
    }

    tracing::debug!(user = %record.name, uid = record.uid, "updating user entry");
    put_json(txn, Bucket::UserById, &key, &record)?;
    put_json(txn, Bucket::UserByName, &record.name, &record)?;

    Ok(record)
}

/// Writes both group buckets for every supplied group, enforcing GID
/// stability.
fn update_groups(txn: &WriteTxn, groups: &[GroupEntry]) -> CacheResult<()> {
    for group in groups {
        let key = group.gid.to_string();

        if let Some(existing) = get_json::<GroupEntry>(txn, Bucket::GroupById, &key)?
            && existing.name != group.name
        {
            tracing::error!(gid = group.gid, group = %group.name, existing = %existing.name,
                "GID already in use by another group");
            return Err(CacheError::GidConflict {
                gid: group.gid,
                existing: existing.name,
                incoming: group.name.clone(),
            });
        }

        put_json(txn, Bucket::GroupById, &key, group)?;
        put_json(txn, Bucket::GroupByName, &group.name, group)?;
    }

    Ok(())
}

/// Reconciles both membership edges for `uid` against the new group
/// set.
///
/// The user is added to the reverse edge of every listed group (not
/// just the newly added ones, which also repairs any drift), then the
/// forward edge is overwritten, then the user is removed from every
/// group it left.
fn reconcile_membership(
    txn: &WriteTxn,
    uid: u32,
    groups: &[GroupEntry],
    previous_gids: &[u32],
) -> CacheResult<()> {
    let mut current_gids = Vec::with_capacity(groups.len());

    for group in groups {
        current_gids.push(group.gid);

        let key = group.gid.to_string();
        let mut edge: GroupToUsers =
            get_json(txn, Bucket::GroupToUsers, &key)?.unwrap_or_default();
        edge.gid = group.gid;
        if !edge.uids.contains(&uid) {
            edge.uids.push(uid);
        }
        put_json(txn, Bucket::GroupToUsers, &key, &edge)?;
    }

    put_json(
        txn,
        Bucket::UserToGroups,
        &uid.to_string(),
        &UserToGroups { uid, gids: current_gids.clone() },
    )?;

    // Remove the user from any group it is no longer part of.
    for previous in previous_gids {
        if current_gids.contains(previous) {
            continue;
        }
        remove_user_from_group(txn, uid, *previous)?;
    }

    Ok(())
}

/// Drops `uid` from a group's reverse edge. The edge is written back
/// even when it ends up empty: emptied groups are retained, not
/// collected.
fn remove_user_from_group(txn: &WriteTxn, uid: u32, gid: u32) -> CacheResult<()> {
    let key = gid.to_string();
    let Some(mut edge) = get_json::<GroupToUsers>(txn, Bucket::GroupToUsers, &key)? else {
        return Ok(());
    };

    edge.uids.retain(|member| *member != uid);
    put_json(txn, Bucket::GroupToUsers, &key, &edge)?;

    Ok(())
}
