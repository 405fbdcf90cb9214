use identra_types::{AnyTypeKey, EntityKey, EntityKind, RealmPath, ResourceKey};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single plain-attribute value.
///
/// Dates carry ISO-8601 date strings (`"2024-01-31"`); the fixed format makes
/// lexicographic comparison equivalent to chronological comparison, which is
/// all the predicate evaluator needs.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum AttrValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Date(String),
}

impl AttrValue {
    /// Returns the text content, if this is a `Text` value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            AttrValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the integer content, if this is an `Int` value.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            AttrValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the boolean content, if this is a `Bool` value.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Returns the ISO-8601 date string, if this is a `Date` value.
    pub fn as_date(&self) -> Option<&str> {
        match self {
            AttrValue::Date(s) => Some(s),
            _ => None,
        }
    }
}

/// A user or any-object in the entity graph.
///
/// The engine only reads and relates entities; creating, updating and
/// deleting them is a collaborator concern. Attributes are multi-valued, so a
/// predicate comparison holds when any value satisfies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub key: EntityKey,
    pub kind: EntityKind,
    /// Set for `AnyObject` entities only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_type: Option<AnyTypeKey>,
    pub realm: RealmPath,
    #[serde(default)]
    pub attrs: BTreeMap<String, Vec<AttrValue>>,
    /// External resources assigned directly to this entity.
    #[serde(default)]
    pub resources: BTreeSet<ResourceKey>,
}

impl Entity {
    /// Creates an empty user entity in the given realm.
    #[must_use]
    pub fn user(realm: impl Into<RealmPath>) -> Self {
        Self {
            key: EntityKey::new(),
            kind: EntityKind::User,
            any_type: None,
            realm: realm.into(),
            attrs: BTreeMap::new(),
            resources: BTreeSet::new(),
        }
    }

    /// Creates an empty any-object entity of the given type.
    #[must_use]
    pub fn any_object(any_type: impl Into<AnyTypeKey>, realm: impl Into<RealmPath>) -> Self {
        Self {
            key: EntityKey::new(),
            kind: EntityKind::AnyObject,
            any_type: Some(any_type.into()),
            realm: realm.into(),
            attrs: BTreeMap::new(),
            resources: BTreeSet::new(),
        }
    }

    /// Replaces the values of one attribute.
    pub fn set_attr(&mut self, name: impl Into<String>, values: Vec<AttrValue>) {
        self.attrs.insert(name.into(), values);
    }

    /// Returns all values of an attribute, or an empty slice when unset.
    pub fn attr_values(&self, name: &str) -> &[AttrValue] {
        self.attrs.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Returns the first text value of an attribute.
    pub fn attr_str(&self, name: &str) -> Option<&str> {
        self.attr_values(name).iter().find_map(AttrValue::as_text)
    }

    /// Returns the first integer value of an attribute.
    pub fn attr_int(&self, name: &str) -> Option<i64> {
        self.attr_values(name).iter().find_map(AttrValue::as_int)
    }

    /// True when the attribute is present with at least one value.
    pub fn has_attr(&self, name: &str) -> bool {
        !self.attr_values(name).is_empty()
    }
}
