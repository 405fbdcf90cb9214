//! Resource reachability: the external resources an entity is entitled to,
//! directly or through any static or dynamic membership.

use crate::error::{EngineError, EngineResult};
use identra_model::Directory;
use identra_types::{EntityKey, ResourceKey};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Per-entity resource-reachability snapshot, as consumed by the diff engine.
pub type Snapshot = BTreeMap<EntityKey, BTreeSet<ResourceKey>>;

/// Computes resource reachability over the entity graph.
pub struct ReachabilityCalculator {
    dir: Arc<dyn Directory>,
}

impl ReachabilityCalculator {
    pub fn new(dir: Arc<dyn Directory>) -> Self {
        Self { dir }
    }

    /// All resource keys reachable by the entity:
    /// `direct(e) ∪ ⋃ resources(g)` over every membership right end.
    ///
    /// A group key's own reachability is its direct resource set. An unknown
    /// key yields the empty set (the entity may have just been deleted).
    pub fn reachable(&self, key: &EntityKey) -> EngineResult<BTreeSet<ResourceKey>> {
        self.collect(key, None)
    }

    /// Reachability with one group's own resource set excluded, while still
    /// counting any other membership that independently grants the same
    /// resource. This is the "still justified without this group" test
    /// backing safe transitive deletion.
    pub fn reachable_excluding(
        &self,
        key: &EntityKey,
        excluded_group: &EntityKey,
    ) -> EngineResult<BTreeSet<ResourceKey>> {
        self.collect(key, Some(excluded_group))
    }

    /// Bulk form: one reachability set per requested key.
    pub fn snapshot<'a>(
        &self,
        keys: impl IntoIterator<Item = &'a EntityKey>,
    ) -> EngineResult<Snapshot> {
        let mut snapshot = Snapshot::new();
        for key in keys {
            snapshot.insert(*key, self.reachable(key)?);
        }
        Ok(snapshot)
    }

    fn collect(
        &self,
        key: &EntityKey,
        excluded_group: Option<&EntityKey>,
    ) -> EngineResult<BTreeSet<ResourceKey>> {
        if let Some(group) = self.dir.group(key)? {
            return Ok(group.resources);
        }

        let mut reachable = match self.dir.entity(key)? {
            Some(entity) => entity.resources,
            None => BTreeSet::new(),
        };

        for membership in self.dir.memberships_of(key)? {
            if Some(&membership.group) == excluded_group {
                continue;
            }
            let group = self.dir.group(&membership.group)?.ok_or_else(|| {
                EngineError::InvariantViolation(format!(
                    "membership of {key} references unknown group {}",
                    membership.group
                ))
            })?;
            // The data model forbids group-in-group membership; a group that
            // itself holds memberships would make this walk cyclic, so fail
            // fast instead of looping.
            if !self.dir.memberships_of(&group.key)?.is_empty() {
                return Err(EngineError::InvariantViolation(format!(
                    "group {} holds memberships of its own; cyclic membership graph",
                    group.key
                )));
            }
            reachable.extend(group.resources);
        }
        Ok(reachable)
    }
}
