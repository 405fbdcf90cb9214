//! Dynamic-membership conditions and the materialized relation they produce.
//!
//! Each group owns at most one condition per slot (one for users, one per
//! any-object type). `refresh` recomputes the dynamic relation for a group
//! wholesale from its conditions — never patched incrementally — which keeps
//! the operation idempotent: refreshing twice without an intervening entity
//! change yields an empty delta the second time.

use crate::error::{EngineError, EngineResult};
use crate::predicate::Predicate;
use identra_model::{
    Directory, DynCondition, DynSlot, Group, Membership, SchemaRegistry,
};
use identra_types::{AnyTypeKey, EntityKind};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// The memberships added and removed by one refresh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MembershipDelta {
    pub added: Vec<Membership>,
    pub removed: Vec<Membership>,
}

impl MembershipDelta {
    /// True when the refresh changed nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Owns dynamic-membership conditions and keeps the materialized relation in
/// step with them.
pub struct DynMembershipManager {
    dir: Arc<dyn Directory>,
    schemas: Arc<SchemaRegistry>,
}

impl DynMembershipManager {
    pub fn new(dir: Arc<dyn Directory>, schemas: Arc<SchemaRegistry>) -> Self {
        Self { dir, schemas }
    }

    fn slot_for(
        &self,
        kind: EntityKind,
        any_type: Option<&AnyTypeKey>,
    ) -> EngineResult<DynSlot> {
        match (kind, any_type) {
            (EntityKind::Group, _) => Err(EngineError::InvalidAnyType(
                "dynamic membership conditions must not target kind 'group'".into(),
            )),
            (EntityKind::User, _) => Ok(DynSlot::Users),
            (EntityKind::AnyObject, Some(t)) if self.schemas.has_any_type(t) => {
                Ok(DynSlot::AnyObjects(t.clone()))
            }
            (EntityKind::AnyObject, Some(t)) => Err(EngineError::InvalidAnyType(format!(
                "unknown any-object type: {t}"
            ))),
            (EntityKind::AnyObject, None) => Err(EngineError::InvalidAnyType(
                "any-object condition requires an any-object type".into(),
            )),
        }
    }

    fn compile_slot(&self, slot: &DynSlot, text: &str) -> EngineResult<Predicate> {
        let schema = match slot {
            DynSlot::Users => self.schemas.user_schema().ok_or_else(|| {
                EngineError::InvalidSearchParameters("no user schema registered".into())
            })?,
            DynSlot::AnyObjects(t) => self.schemas.any_object_schema(t).ok_or_else(|| {
                EngineError::InvalidAnyType(format!("unknown any-object type: {t}"))
            })?,
        };
        match Predicate::compile(schema, text) {
            Ok(p) => Ok(p),
            // A condition that does not compile is invalid input, not a
            // grammar diagnostic, from the caller's point of view.
            Err(EngineError::Syntax(detail)) => Err(EngineError::InvalidSearchParameters(
                format!("{text}: {detail}"),
            )),
            Err(other) => Err(other),
        }
    }

    /// Sets (or replaces) the condition for one (group, slot) pair.
    ///
    /// The group keeps referencing the same slot: setting a condition twice
    /// results in one active condition, the latest. Fails with
    /// [`EngineError::InvalidSearchParameters`] when the text does not
    /// compile and [`EngineError::InvalidAnyType`] for a `group`-kind or
    /// unknown any-object target. The caller persists the group afterwards.
    pub fn set_condition(
        &self,
        group: &mut Group,
        kind: EntityKind,
        any_type: Option<&AnyTypeKey>,
        text: &str,
    ) -> EngineResult<()> {
        let slot = self.slot_for(kind, any_type)?;
        self.compile_slot(&slot, text)?;
        group.dyn_conditions.insert(slot, DynCondition::new(text));
        Ok(())
    }

    /// Recomputes the dynamic relation for every condition slot of the group
    /// and reconciles the store: newly matching entities gain a dynamic
    /// membership, previously dynamic members that no longer match lose
    /// theirs. Static memberships are never touched.
    pub fn refresh(&self, group: &Group) -> EngineResult<MembershipDelta> {
        let mut delta = MembershipDelta::default();
        let current: Vec<Membership> = self.dir.members_of(&group.key)?;

        for (slot, condition) in &group.dyn_conditions {
            if !condition.valid {
                warn!(group = %group.key, ?slot, "skipping invalid dynamic membership condition");
                continue;
            }
            let predicate = self.compile_slot(slot, &condition.text)?;
            let matched = predicate.select(self.dir.as_ref())?;

            let existing: BTreeSet<_> = current
                .iter()
                .filter(|m| m.dyn_slot() == Some(slot))
                .map(|m| m.member)
                .collect();

            for member in matched.difference(&existing) {
                delta
                    .added
                    .push(Membership::new_dynamic(*member, group.key, slot.clone()));
            }
            for member in existing.difference(&matched) {
                delta
                    .removed
                    .push(Membership::new_dynamic(*member, group.key, slot.clone()));
            }

            self.dir.replace_dynamic_members(&group.key, slot, &matched)?;
        }

        if !delta.is_empty() {
            debug!(
                group = %group.key,
                added = delta.added.len(),
                removed = delta.removed.len(),
                "dynamic membership refreshed"
            );
        }
        Ok(delta)
    }

    /// Removes the condition slot and every dynamic membership it produced,
    /// regardless of current match state. The caller persists the group
    /// afterwards.
    pub fn clear(
        &self,
        group: &mut Group,
        kind: EntityKind,
        any_type: Option<&AnyTypeKey>,
    ) -> EngineResult<()> {
        let slot = self.slot_for(kind, any_type)?;
        group.dyn_conditions.remove(&slot);
        self.dir.clear_dynamic_members(&group.key, &slot)?;
        Ok(())
    }
}
