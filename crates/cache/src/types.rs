//! Record types stored in, and served from, the cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity record supplied by a broker after a successful
/// authentication. This is the input to
/// [`update_user_entry`](crate::IdentityCache::update_user_entry); the
/// cache adds the bookkeeping fields itself.
///
/// The shadow fields carry password-aging metadata in days since the
/// epoch, `-1` meaning "unset", exactly as NSS expects them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    pub name: String,
    pub uid: u32,
    /// Primary group id.
    pub gid: u32,
    pub gecos: String,
    pub home_dir: String,
    pub shell: String,
    pub last_pwd_change: i32,
    pub min_pwd_age: i32,
    pub max_pwd_age: i32,
    pub pwd_warn_period: i32,
    pub pwd_inactivity: i32,
    pub expiration_date: i32,
}

/// A cached user row: passwd and shadow fields plus the last successful
/// login. This is what the NSS projection reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPasswdShadow {
    pub name: String,
    pub uid: u32,
    pub gid: u32,
    pub gecos: String,
    pub home_dir: String,
    pub shell: String,
    pub last_pwd_change: i32,
    pub min_pwd_age: i32,
    pub max_pwd_age: i32,
    pub pwd_warn_period: i32,
    pub pwd_inactivity: i32,
    pub expiration_date: i32,
    /// Stamped by the cache on every successful update.
    pub last_login: DateTime<Utc>,
}

impl UserPasswdShadow {
    pub(crate) fn from_entry(entry: UserEntry, last_login: DateTime<Utc>) -> Self {
        Self {
            name: entry.name,
            uid: entry.uid,
            gid: entry.gid,
            gecos: entry.gecos,
            home_dir: entry.home_dir,
            shell: entry.shell,
            last_pwd_change: entry.last_pwd_change,
            min_pwd_age: entry.min_pwd_age,
            max_pwd_age: entry.max_pwd_age,
            pwd_warn_period: entry.pwd_warn_period,
            pwd_inactivity: entry.pwd_inactivity,
            expiration_date: entry.expiration_date,
            last_login,
        }
    }
}

/// A group as supplied on the write path and as stored in both group
/// buckets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    pub name: String,
    pub gid: u32,
}

/// A group as served to readers: the stored record joined with its
/// member user names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Group {
    pub name: String,
    pub gid: u32,
    /// Names of the member users, resolved through `user_by_id`.
    pub members: Vec<String>,
}

/// Forward membership edge: the groups a user belongs to, in the order
/// supplied at the last update.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct UserToGroups {
    pub uid: u32,
    pub gids: Vec<u32>,
}

/// Reverse membership edge: the users belonging to a group. Insertion
/// order carries no meaning; only membership does.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct GroupToUsers {
    pub gid: u32,
    pub uids: Vec<u32>,
}
