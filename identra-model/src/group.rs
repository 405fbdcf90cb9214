use crate::entity::AttrValue;
use crate::membership::DynSlot;
use identra_types::{AnyTypeKey, AuxClassKey, EntityKey, RealmPath, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A dynamic-membership condition owned by one (group, slot) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynCondition {
    /// Raw predicate text, as accepted by the predicate evaluator.
    pub text: String,
    /// Cleared only when a persisted condition no longer compiles against the
    /// current schema; refresh skips invalid conditions.
    pub valid: bool,
}

impl DynCondition {
    /// Creates a valid condition from raw predicate text.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            valid: true,
        }
    }
}

/// A group-scoped, any-type-scoped set of auxiliary attribute classes.
///
/// Persisted only while the class set is non-empty; an extension that becomes
/// empty is removed, never stored empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeExtension {
    pub any_type: AnyTypeKey,
    pub aux_classes: BTreeSet<AuxClassKey>,
}

/// A group in the entity graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub key: EntityKey,
    pub name: String,
    pub realm: RealmPath,
    #[serde(default)]
    pub attrs: BTreeMap<String, Vec<AttrValue>>,
    /// External resources assigned to this group; members reach them through
    /// their membership.
    #[serde(default)]
    pub resources: BTreeSet<ResourceKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_owner: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_owner: Option<EntityKey>,
    /// At most one condition per slot; the map key enforces the cardinality.
    #[serde(default)]
    pub dyn_conditions: BTreeMap<DynSlot, DynCondition>,
    #[serde(default)]
    pub type_extensions: Vec<TypeExtension>,
}

impl Group {
    /// Creates an empty group with a fresh key.
    #[must_use]
    pub fn new(name: impl Into<String>, realm: impl Into<RealmPath>) -> Self {
        Self {
            key: EntityKey::new(),
            name: name.into(),
            realm: realm.into(),
            attrs: BTreeMap::new(),
            resources: BTreeSet::new(),
            user_owner: None,
            group_owner: None,
            dyn_conditions: BTreeMap::new(),
            type_extensions: Vec::new(),
        }
    }

    /// Looks up the type extension for one any-object type.
    pub fn type_extension(&self, any_type: &AnyTypeKey) -> Option<&TypeExtension> {
        self.type_extensions.iter().find(|te| &te.any_type == any_type)
    }
}

/// Requested auxiliary classes for one any-object type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeExtensionSpec {
    pub any_type: AnyTypeKey,
    pub aux_classes: Vec<AuxClassKey>,
}

/// The input record for group create and update.
///
/// Describes the desired state: on update, condition slots and type
/// extensions absent from the spec are removed from the group.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GroupSpec {
    pub name: Option<String>,
    pub realm: Option<RealmPath>,
    #[serde(default)]
    pub attrs: BTreeMap<String, Vec<AttrValue>>,
    #[serde(default)]
    pub resources: BTreeSet<ResourceKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_owner: Option<EntityKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_owner: Option<EntityKey>,
    /// Dynamic-membership condition for users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udyn_condition: Option<String>,
    /// Dynamic-membership conditions per any-object type.
    #[serde(default)]
    pub adyn_conditions: BTreeMap<AnyTypeKey, String>,
    #[serde(default)]
    pub type_extensions: Vec<TypeExtensionSpec>,
}

/// Read-only projection of a group, including membership counts.
///
/// Served without synchronization; counts may lag an in-flight refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupView {
    pub key: EntityKey,
    pub name: String,
    pub realm: RealmPath,
    pub resources: BTreeSet<ResourceKey>,
    pub user_owner: Option<EntityKey>,
    pub group_owner: Option<EntityKey>,
    pub udyn_condition: Option<String>,
    pub adyn_conditions: BTreeMap<AnyTypeKey, String>,
    pub type_extensions: Vec<TypeExtension>,
    pub static_user_members: usize,
    pub dynamic_user_members: usize,
    pub static_any_object_members: usize,
    pub dynamic_any_object_members: usize,
}
