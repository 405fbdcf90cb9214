use identra_types::{AnyTypeKey, EntityKey};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// The condition slot a dynamic membership was derived from.
///
/// A group holds at most one dynamic-membership condition for users and at
/// most one per distinct any-object type.
///
/// Serialized as a plain string (`"users"`, `"any_objects:<type>"`) so slots
/// can key JSON maps in persisted group documents.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DynSlot {
    Users,
    AnyObjects(AnyTypeKey),
}

impl Serialize for DynSlot {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            DynSlot::Users => serializer.serialize_str("users"),
            DynSlot::AnyObjects(t) => serializer.serialize_str(&format!("any_objects:{t}")),
        }
    }
}

impl<'de> Deserialize<'de> for DynSlot {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        if raw == "users" {
            return Ok(DynSlot::Users);
        }
        match raw.strip_prefix("any_objects:") {
            Some(t) if !t.is_empty() => Ok(DynSlot::AnyObjects(AnyTypeKey::from(t))),
            _ => Err(<D::Error as serde::de::Error>::custom(format!(
                "unknown dynamic slot: {raw}"
            ))),
        }
    }
}

/// How a membership came to exist.
///
/// Static and dynamic memberships to the same group coexist and are tracked
/// separately: removing the dynamic reason never removes a still-valid static
/// one.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MembershipOrigin {
    /// Explicitly created, persisted join.
    Static,
    /// Derived by matching the slot's condition; recomputed, never hand-edited.
    Dynamic(DynSlot),
}

/// Relates a member entity (user or any-object) to a group.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Membership {
    pub member: EntityKey,
    pub group: EntityKey,
    pub origin: MembershipOrigin,
}

impl Membership {
    /// Creates a static membership.
    #[must_use]
    pub fn new_static(member: EntityKey, group: EntityKey) -> Self {
        Self {
            member,
            group,
            origin: MembershipOrigin::Static,
        }
    }

    /// Creates a dynamic membership derived from the given slot.
    #[must_use]
    pub fn new_dynamic(member: EntityKey, group: EntityKey, slot: DynSlot) -> Self {
        Self {
            member,
            group,
            origin: MembershipOrigin::Dynamic(slot),
        }
    }

    /// True for derived (condition-produced) memberships.
    #[must_use]
    pub fn is_dynamic(&self) -> bool {
        matches!(self.origin, MembershipOrigin::Dynamic(_))
    }

    /// Returns the dynamic slot, if this membership is dynamic.
    pub fn dyn_slot(&self) -> Option<&DynSlot> {
        match &self.origin {
            MembershipOrigin::Dynamic(slot) => Some(slot),
            MembershipOrigin::Static => None,
        }
    }
}
