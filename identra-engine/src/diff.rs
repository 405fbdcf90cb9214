//! Propagation plans and the snapshot diff that produces them.

use crate::reachability::Snapshot;
use identra_types::{EntityKey, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A required change to an entity's provisioned state on one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceOp {
    Add,
    Update,
    Delete,
}

impl fmt::Display for ResourceOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceOp::Add => "add",
            ResourceOp::Update => "update",
            ResourceOp::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One propagation operation, keyed by resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropagationAction {
    pub resource: ResourceKey,
    pub op: ResourceOp,
}

/// The computed set of propagation operations, grouped per entity key.
///
/// Ephemeral: produced by one diff computation, handed to the provisioning
/// transport, never persisted. At most one operation exists per
/// (entity, resource) pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropagationPlan {
    entries: BTreeMap<EntityKey, Vec<PropagationAction>>,
}

impl PropagationPlan {
    /// Creates an empty plan.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no operation is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entities with at least one planned operation.
    pub fn entities(&self) -> impl Iterator<Item = &EntityKey> {
        self.entries.keys()
    }

    /// Planned operations for one entity, empty when none.
    pub fn actions_for(&self, entity: &EntityKey) -> &[PropagationAction] {
        self.entries.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Looks up the operation planned for one (entity, resource) pair.
    pub fn op_for(&self, entity: &EntityKey, resource: &ResourceKey) -> Option<ResourceOp> {
        self.actions_for(entity)
            .iter()
            .find(|a| &a.resource == resource)
            .map(|a| a.op)
    }

    /// Records an operation for a pair not yet present in the plan.
    pub fn push(&mut self, entity: EntityKey, resource: ResourceKey, op: ResourceOp) {
        let actions = self.entries.entry(entity).or_default();
        if !actions.iter().any(|a| a.resource == resource) {
            actions.push(PropagationAction { resource, op });
        }
    }

    /// Folds another plan in. An operation already present for a pair wins
    /// over the merged one: adds and deletes computed by the diff supersede
    /// the blanket updates merged in for ownership changes.
    pub fn merge(&mut self, other: PropagationPlan) {
        for (entity, actions) in other.entries {
            for action in actions {
                self.push(entity, action.resource, action.op);
            }
        }
    }
}

/// Compares two reachability snapshots and emits the operations required per
/// entity: resources present only after become adds, present only before
/// become deletes, and — when the entity's assignment changed at all —
/// retained resources become updates (resource mappings may depend on changed
/// attributes). An entity whose before and after sets are equal contributes
/// nothing.
///
/// Total over its inputs: entity keys unknown to the store are still diffed,
/// since the entity may have just been deleted.
#[must_use]
pub fn diff(before: &Snapshot, after: &Snapshot) -> PropagationPlan {
    let mut plan = PropagationPlan::new();
    let empty = std::collections::BTreeSet::new();

    let entities: std::collections::BTreeSet<&EntityKey> =
        before.keys().chain(after.keys()).collect();
    for entity in entities {
        let b = before.get(entity).unwrap_or(&empty);
        let a = after.get(entity).unwrap_or(&empty);
        if a == b {
            continue;
        }
        for resource in a.difference(b) {
            plan.push(*entity, resource.clone(), ResourceOp::Add);
        }
        for resource in b.difference(a) {
            plan.push(*entity, resource.clone(), ResourceOp::Delete);
        }
        for resource in a.intersection(b) {
            plan.push(*entity, resource.clone(), ResourceOp::Update);
        }
    }
    plan
}
