//! Orchestration of group create, update and delete.
//!
//! The coordinator owns the order of operations that keeps before/after
//! reachability snapshots meaningful: snapshot, apply structural changes,
//! persist, reconcile dynamic memberships and type extensions, snapshot
//! again, diff. Validation failures are accumulated through the whole pass
//! and raised as one composite error; a failed pass persists nothing.
//!
//! Mutations serialize per group behind an exclusive section; read-only
//! projections run unsynchronized and tolerate eventually-consistent reads of
//! in-flight refreshes.

use crate::diff::{diff, PropagationPlan, ResourceOp};
use crate::dynmember::{DynMembershipManager, MembershipDelta};
use crate::error::{EngineError, EngineResult, ValidationReport, ViolationKind};
use crate::reachability::ReachabilityCalculator;
use identra_model::{
    Directory, DynSlot, Group, GroupSpec, GroupView, SchemaRegistry, TypeExtension,
};
use identra_types::{AuxClassKey, EntityKey, EntityKind, RealmPath};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Coordinates group composition changes and produces propagation plans.
pub struct GroupCoordinator {
    dir: Arc<dyn Directory>,
    schemas: Arc<SchemaRegistry>,
    dynmember: DynMembershipManager,
    reachability: ReachabilityCalculator,
    locks: Mutex<HashMap<EntityKey, Arc<Mutex<()>>>>,
}

impl GroupCoordinator {
    pub fn new(dir: Arc<dyn Directory>, schemas: Arc<SchemaRegistry>) -> Self {
        Self {
            dynmember: DynMembershipManager::new(dir.clone(), schemas.clone()),
            reachability: ReachabilityCalculator::new(dir.clone()),
            dir,
            schemas,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// The per-group exclusive section serializing mutations.
    ///
    /// Entries nobody currently holds (strong count 1, only the map's own
    /// `Arc`) are reaped on each acquisition, so the map stays bounded by the
    /// number of in-flight mutations rather than every group ever touched.
    fn group_lock(&self, key: &EntityKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap();
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks
            .entry(*key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Creates a group from the spec.
    ///
    /// Every violation found during the pass is accumulated; one composite
    /// [`EngineError::Validation`] is raised if at least one was recorded,
    /// and nothing is persisted in that case. Unresolved owner, any-type and
    /// aux-class references degrade to ignored-with-warning.
    pub fn create(&self, spec: &GroupSpec) -> EngineResult<Group> {
        let mut report = ValidationReport::new();

        let name = match &spec.name {
            Some(n) if !n.trim().is_empty() => n.clone(),
            _ => {
                report.record(ViolationKind::InvalidGroup, "no name specified for this group");
                String::new()
            }
        };
        let realm = match &spec.realm {
            Some(r) if self.dir.has_realm(r)? => r.clone(),
            Some(r) => {
                report.record(
                    ViolationKind::InvalidRealm,
                    format!("invalid realm specified: {r}"),
                );
                RealmPath::from("/")
            }
            None => {
                report.record(ViolationKind::InvalidRealm, "no realm specified");
                RealmPath::from("/")
            }
        };

        let mut group = Group::new(name, realm);
        group.attrs = spec.attrs.clone();
        group.resources = spec.resources.clone();
        group.user_owner = self.resolve_user_owner(spec.user_owner.as_ref())?;
        group.group_owner = self.resolve_group_owner(spec.group_owner.as_ref())?;

        self.apply_conditions(&mut group, spec, &mut report)?;
        self.apply_type_extensions(&mut group, spec);

        report.into_result()?;

        self.dir.save_group(&group)?;
        let delta = self.dynmember.refresh(&group)?;
        debug!(group = %group.key, members = delta.added.len(), "group created");
        Ok(group)
    }

    /// Updates a group towards the desired state described by the spec and
    /// returns the propagation plan for the resulting reachability changes.
    pub fn update(&self, key: &EntityKey, spec: &GroupSpec) -> EngineResult<PropagationPlan> {
        let lock = self.group_lock(key);
        let _guard = lock.lock().unwrap();

        let current = self
            .dir
            .group(key)?
            .ok_or(EngineError::GroupNotFound(*key))?;

        // (1) snapshot reachability of everyone currently affected, using
        // pre-change state: current members plus the group itself.
        let mut affected: BTreeSet<EntityKey> =
            self.dir.members_of(key)?.iter().map(|m| m.member).collect();
        affected.insert(*key);
        let before = self.reachability.snapshot(affected.iter())?;

        let mut report = ValidationReport::new();
        let mut staged = current.clone();

        // (2) name, realm, attributes, resources.
        if let Some(name) = &spec.name {
            if name.trim().is_empty() {
                report.record(ViolationKind::InvalidGroup, "blank name specified for this group");
            } else {
                staged.name = name.clone();
            }
        }
        if let Some(realm) = &spec.realm {
            if self.dir.has_realm(realm)? {
                staged.realm = realm.clone();
            } else {
                report.record(
                    ViolationKind::InvalidRealm,
                    format!("invalid realm specified: {realm}"),
                );
            }
        }
        staged.attrs = spec.attrs.clone();
        staged.resources = spec.resources.clone();

        // Ownership: a change alone forces an update of the group's own
        // resources, independent of membership diffing.
        let mut owner_changed = false;
        let user_owner = self.resolve_user_owner(spec.user_owner.as_ref())?;
        if user_owner != staged.user_owner {
            staged.user_owner = user_owner;
            owner_changed = true;
        }
        let group_owner = self.resolve_group_owner(spec.group_owner.as_ref())?;
        if group_owner != staged.group_owner {
            staged.group_owner = group_owner;
            owner_changed = true;
        }

        // (4) reconcile dynamic-membership conditions on the staged copy.
        // Slots no longer configured lose their condition now and their
        // materialized members after persistence.
        let desired_slots = self.desired_slots(spec);
        let stale_slots: Vec<DynSlot> = staged
            .dyn_conditions
            .keys()
            .filter(|slot| !desired_slots.contains(slot))
            .cloned()
            .collect();
        for slot in &stale_slots {
            staged.dyn_conditions.remove(slot);
        }
        self.apply_conditions(&mut staged, spec, &mut report)?;

        // (5) reconcile type extensions, pruning empty ones.
        self.apply_type_extensions(&mut staged, spec);

        // A composite failure aborts the whole update: nothing was persisted.
        report.into_result()?;

        // (3)/(6) persist, then bring the materialized relation in step.
        self.dir.save_group(&staged)?;
        for slot in &stale_slots {
            self.dir.clear_dynamic_members(key, slot)?;
        }
        self.dynmember.refresh(&staged)?;

        // (7) post-change snapshot over previously and newly affected
        // entities; entities only present on one side diff against empty.
        for membership in self.dir.members_of(key)? {
            affected.insert(membership.member);
        }
        let after = self.reachability.snapshot(affected.iter())?;

        // (8) diff, then (9) ownership-triggered propagation.
        let mut plan = diff(&before, &after);
        if owner_changed {
            let mut owner_plan = PropagationPlan::new();
            for resource in &staged.resources {
                owner_plan.push(*key, resource.clone(), ResourceOp::Update);
            }
            plan.merge(owner_plan);
        }
        Ok(plan)
    }

    /// Deletes a group, returning transitive-guarded deletes for its members
    /// and deletes for the group's own resources.
    pub fn delete(&self, key: &EntityKey) -> EngineResult<PropagationPlan> {
        let lock = self.group_lock(key);
        let _guard = lock.lock().unwrap();

        let group = self
            .dir
            .group(key)?
            .ok_or(EngineError::GroupNotFound(*key))?;

        let mut plan = PropagationPlan::new();
        for membership in self.dir.members_of(key)? {
            // exclude resources the member still reaches through a direct
            // assignment or some other membership
            let still_reachable = self
                .reachability
                .reachable_excluding(&membership.member, key)?;
            for resource in &group.resources {
                if !still_reachable.contains(resource) {
                    plan.push(membership.member, resource.clone(), ResourceOp::Delete);
                }
            }
        }
        for resource in &group.resources {
            plan.push(*key, resource.clone(), ResourceOp::Delete);
        }

        self.dir.delete_group(key)?;
        debug!(group = %key, "group deleted");
        Ok(plan)
    }

    /// Re-runs dynamic-membership reconciliation for one group, serialized
    /// with concurrent mutations of the same group. Safe to call repeatedly:
    /// with no intervening entity change the second delta is empty.
    pub fn refresh(&self, key: &EntityKey) -> EngineResult<MembershipDelta> {
        let lock = self.group_lock(key);
        let _guard = lock.lock().unwrap();

        let group = self
            .dir
            .group(key)?
            .ok_or(EngineError::GroupNotFound(*key))?;
        self.dynmember.refresh(&group)
    }

    /// Read-only projection of a group including membership counts. Runs
    /// without the per-group lock.
    pub fn group_view(&self, key: &EntityKey) -> EngineResult<GroupView> {
        let group = self
            .dir
            .group(key)?
            .ok_or(EngineError::GroupNotFound(*key))?;

        let mut static_user_members = 0;
        let mut dynamic_user_members = 0;
        let mut static_any_object_members = 0;
        let mut dynamic_any_object_members = 0;
        for membership in self.dir.members_of(key)? {
            let kind = self.dir.entity(&membership.member)?.map(|e| e.kind);
            match (kind, membership.is_dynamic()) {
                (Some(EntityKind::User), false) => static_user_members += 1,
                (Some(EntityKind::User), true) => dynamic_user_members += 1,
                (Some(EntityKind::AnyObject), false) => static_any_object_members += 1,
                (Some(EntityKind::AnyObject), true) => dynamic_any_object_members += 1,
                _ => {}
            }
        }

        let udyn_condition = group
            .dyn_conditions
            .get(&DynSlot::Users)
            .map(|c| c.text.clone());
        let mut adyn_conditions = BTreeMap::new();
        for (slot, condition) in &group.dyn_conditions {
            if let DynSlot::AnyObjects(any_type) = slot {
                adyn_conditions.insert(any_type.clone(), condition.text.clone());
            }
        }

        Ok(GroupView {
            key: group.key,
            name: group.name,
            realm: group.realm,
            resources: group.resources,
            user_owner: group.user_owner,
            group_owner: group.group_owner,
            udyn_condition,
            adyn_conditions,
            type_extensions: group.type_extensions,
            static_user_members,
            dynamic_user_members,
            static_any_object_members,
            dynamic_any_object_members,
        })
    }

    // ── Helpers ──────────────────────────────────────────────────

    fn resolve_user_owner(&self, owner: Option<&EntityKey>) -> EngineResult<Option<EntityKey>> {
        match owner {
            None => Ok(None),
            Some(key) => match self.dir.entity(key)? {
                Some(entity) if entity.kind == EntityKind::User => Ok(Some(*key)),
                _ => {
                    warn!(owner = %key, "ignoring invalid user specified as owner");
                    Ok(None)
                }
            },
        }
    }

    fn resolve_group_owner(&self, owner: Option<&EntityKey>) -> EngineResult<Option<EntityKey>> {
        match owner {
            None => Ok(None),
            Some(key) => match self.dir.group(key)? {
                Some(_) => Ok(Some(*key)),
                None => {
                    warn!(owner = %key, "ignoring invalid group specified as owner");
                    Ok(None)
                }
            },
        }
    }

    /// Condition slots the spec configures, skipping unknown any-types.
    fn desired_slots(&self, spec: &GroupSpec) -> BTreeSet<DynSlot> {
        let mut slots = BTreeSet::new();
        if spec.udyn_condition.is_some() {
            slots.insert(DynSlot::Users);
        }
        for any_type in spec.adyn_conditions.keys() {
            if self.schemas.has_any_type(any_type) {
                slots.insert(DynSlot::AnyObjects(any_type.clone()));
            }
        }
        slots
    }

    fn apply_conditions(
        &self,
        group: &mut Group,
        spec: &GroupSpec,
        report: &mut ValidationReport,
    ) -> EngineResult<()> {
        if let Some(text) = &spec.udyn_condition {
            if let Err(err) = self
                .dynmember
                .set_condition(group, EntityKind::User, None, text)
            {
                record_condition_failure(report, err)?;
            }
        }
        for (any_type, text) in &spec.adyn_conditions {
            if !self.schemas.has_any_type(any_type) {
                warn!(%any_type, "ignoring condition for unknown any-object type");
                continue;
            }
            if let Err(err) =
                self.dynmember
                    .set_condition(group, EntityKind::AnyObject, Some(any_type), text)
            {
                record_condition_failure(report, err)?;
            }
        }
        Ok(())
    }

    /// Rebuilds the extension list from the spec: unknown any-types and aux
    /// classes are ignored with a warning, extensions left empty by that
    /// filtering are pruned, and extensions absent from the spec disappear.
    fn apply_type_extensions(&self, group: &mut Group, spec: &GroupSpec) {
        let mut extensions = Vec::new();
        for ext in &spec.type_extensions {
            if !self.schemas.has_any_type(&ext.any_type) {
                warn!(any_type = %ext.any_type, "ignoring type extension for unknown any-object type");
                continue;
            }
            let mut aux_classes: BTreeSet<AuxClassKey> = BTreeSet::new();
            for class in &ext.aux_classes {
                if self.schemas.has_aux_class(class) {
                    aux_classes.insert(class.clone());
                } else {
                    warn!(aux_class = %class, "ignoring unknown auxiliary class");
                }
            }
            if !aux_classes.is_empty() {
                extensions.push(TypeExtension {
                    any_type: ext.any_type.clone(),
                    aux_classes,
                });
            }
        }
        group.type_extensions = extensions;
    }
}

/// Folds a per-slot condition failure into the accumulated report; other
/// condition slots in the same pass are still processed.
fn record_condition_failure(
    report: &mut ValidationReport,
    err: EngineError,
) -> EngineResult<()> {
    match err {
        EngineError::InvalidSearchParameters(detail) => {
            report.record(ViolationKind::InvalidSearchParameters, detail);
            Ok(())
        }
        EngineError::InvalidAnyType(detail) => {
            report.record(ViolationKind::InvalidAnyType, detail);
            Ok(())
        }
        other => Err(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use identra_store::SqliteDirectory;

    #[test]
    fn idle_group_locks_are_reaped() {
        let dir = Arc::new(SqliteDirectory::open_in_memory().unwrap());
        let coordinator = GroupCoordinator::new(dir, Arc::new(SchemaRegistry::new()));

        let first = EntityKey::new();
        let second = EntityKey::new();
        let held = coordinator.group_lock(&first);
        drop(held);

        // acquiring another group's lock sweeps the idle entry
        let held = coordinator.group_lock(&second);
        assert_eq!(coordinator.locks.lock().unwrap().len(), 1);
        drop(held);
    }

    #[test]
    fn held_group_locks_survive_the_sweep() {
        let dir = Arc::new(SqliteDirectory::open_in_memory().unwrap());
        let coordinator = GroupCoordinator::new(dir, Arc::new(SchemaRegistry::new()));

        let first = EntityKey::new();
        let second = EntityKey::new();
        let held = coordinator.group_lock(&first);
        coordinator.group_lock(&second);

        let locks = coordinator.locks.lock().unwrap();
        assert!(locks.contains_key(&first));
        drop(locks);
        drop(held);
    }
}
