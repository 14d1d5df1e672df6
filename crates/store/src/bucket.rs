//! Bucket names and their redb table definitions.

use redb::TableDefinition;

/// The named buckets of the identity store.
///
/// Buckets partition the key space: ID-keyed buckets use base-10 ASCII
/// renderings of UIDs/GIDs, name-keyed buckets use the raw name. All of
/// them are created when the store is opened, so transactions never
/// observe a missing bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bucket {
    /// `uid -> user record`
    UserById,
    /// `username -> user record`
    UserByName,
    /// `gid -> group record`
    GroupById,
    /// `group name -> group record`
    GroupByName,
    /// `uid -> ordered list of gids` (forward membership edge)
    UserToGroups,
    /// `gid -> set of uids` (reverse membership edge)
    GroupToUsers,
    /// `uid -> broker id` (last broker that authenticated the user)
    UserToBroker,
}

impl Bucket {
    /// Every bucket, in creation order.
    pub const ALL: [Bucket; 7] = [
        Bucket::UserById,
        Bucket::UserByName,
        Bucket::GroupById,
        Bucket::GroupByName,
        Bucket::UserToGroups,
        Bucket::GroupToUsers,
        Bucket::UserToBroker,
    ];

    /// The bucket's on-disk table name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Bucket::UserById => "user_by_id",
            Bucket::UserByName => "user_by_name",
            Bucket::GroupById => "group_by_id",
            Bucket::GroupByName => "group_by_name",
            Bucket::UserToGroups => "user_to_groups",
            Bucket::GroupToUsers => "group_to_users",
            Bucket::UserToBroker => "user_to_broker",
        }
    }

    pub(crate) const fn table(self) -> TableDefinition<'static, &'static str, &'static [u8]> {
        TableDefinition::new(self.name())
    }
}

impl std::fmt::Display for Bucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
