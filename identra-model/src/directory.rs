//! The collaborator seam between the engine and its persistence layer.
//!
//! The engine consumes exactly three capabilities: lookup (by key and by
//! predicate), membership listing, and persistence of group/membership state.
//! Lookups are assumed reliable and consistent within one engine call; they
//! are never retried.

use crate::entity::Entity;
use crate::group::Group;
use crate::membership::{DynSlot, Membership, MembershipOrigin};
use identra_types::{AnyTypeKey, EntityKey, EntityKind, RealmPath};
use std::collections::BTreeSet;
use thiserror::Error;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors that can occur in directory operations.
#[derive(Debug, Error)]
pub enum DirectoryError {
    /// Underlying database error.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A referenced row is missing.
    #[error("not found: {0}")]
    NotFound(String),

    /// A persisted row does not fit the model.
    #[error("invalid data: {0}")]
    InvalidData(String),
}

/// Lookup and persistence capabilities consumed by the engine.
///
/// Implementations must be safe to share across threads; the engine
/// serializes mutations per group but issues reads concurrently.
pub trait Directory: Send + Sync {
    /// Looks up a user or any-object by key.
    fn entity(&self, key: &EntityKey) -> DirectoryResult<Option<Entity>>;

    /// Looks up a group by key.
    fn group(&self, key: &EntityKey) -> DirectoryResult<Option<Group>>;

    /// True when the realm path is known.
    fn has_realm(&self, realm: &RealmPath) -> DirectoryResult<bool>;

    /// Bulk lookup: keys of all entities of the given kind (and any-object
    /// type, when given) satisfying the filter. Must be consistent with
    /// iterating the filter over the full candidate set.
    fn select(
        &self,
        kind: EntityKind,
        any_type: Option<&AnyTypeKey>,
        filter: &dyn Fn(&Entity) -> bool,
    ) -> DirectoryResult<BTreeSet<EntityKey>>;

    /// All memberships held by one member entity.
    fn memberships_of(&self, member: &EntityKey) -> DirectoryResult<Vec<Membership>>;

    /// All memberships of one group.
    fn members_of(&self, group: &EntityKey) -> DirectoryResult<Vec<Membership>>;

    /// Registers a realm path.
    fn add_realm(&self, realm: &RealmPath) -> DirectoryResult<()>;

    /// Creates or replaces an entity.
    fn save_entity(&self, entity: &Entity) -> DirectoryResult<()>;

    /// Creates or replaces a group.
    fn save_group(&self, group: &Group) -> DirectoryResult<()>;

    /// Removes a group and all of its memberships.
    fn delete_group(&self, key: &EntityKey) -> DirectoryResult<()>;

    /// Adds one membership row. Replacing an existing row with the same
    /// (member, group, origin) is a no-op.
    fn add_membership(&self, membership: &Membership) -> DirectoryResult<()>;

    /// Removes one membership row, matching the origin exactly.
    fn remove_membership(
        &self,
        member: &EntityKey,
        group: &EntityKey,
        origin: &MembershipOrigin,
    ) -> DirectoryResult<()>;

    /// Rewrites the materialized dynamic relation for one (group, slot) pair
    /// wholesale: existing dynamic rows for the slot are dropped and replaced
    /// by the given member set. Static rows are untouched.
    fn replace_dynamic_members(
        &self,
        group: &EntityKey,
        slot: &DynSlot,
        members: &BTreeSet<EntityKey>,
    ) -> DirectoryResult<()>;

    /// Drops every dynamic row of one (group, slot) pair.
    fn clear_dynamic_members(&self, group: &EntityKey, slot: &DynSlot) -> DirectoryResult<()>;
}
