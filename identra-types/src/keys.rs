//! Identifier types used throughout the Identra core.
//!
//! Entities and groups are keyed by UUID v7 (time-ordered, globally unique).
//! External resources, any-object types, auxiliary attribute classes and
//! realms carry stable, human-assigned string keys.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for an entity (user, group or any-object).
/// Uses UUID v7 which embeds a timestamp for natural ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityKey(Uuid);

impl EntityKey {
    /// Creates a new entity key with the current timestamp.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Creates an entity key from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses an entity key from a string.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for EntityKey {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityKey {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

macro_rules! string_key {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps a raw key string.
            #[must_use]
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Returns the key as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }
    };
}

string_key! {
    /// Stable key of an external provisioned system (resource), e.g. `"ldap"`.
    ResourceKey
}

string_key! {
    /// Key of an any-object type, e.g. `"printer"`.
    AnyTypeKey
}

string_key! {
    /// Key of an auxiliary attribute class granted through a type extension.
    AuxClassKey
}

string_key! {
    /// Full path of a realm, e.g. `"/"` or `"/corp/emea"`.
    RealmPath
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entity_key_roundtrips_through_display() {
        let key = EntityKey::new();
        let parsed = EntityKey::parse(&key.to_string()).unwrap();
        assert_eq!(key, parsed);
    }

    #[test]
    fn entity_key_rejects_garbage() {
        assert!(EntityKey::parse("not-a-uuid").is_err());
    }

    #[test]
    fn entity_keys_are_time_ordered() {
        let a = EntityKey::new();
        let b = EntityKey::new();
        assert!(a <= b);
    }

    #[test]
    fn string_keys_serialize_transparently() {
        let key = ResourceKey::from("ldap");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"ldap\"");
    }

    #[test]
    fn realm_path_compares_by_content() {
        assert_eq!(RealmPath::from("/corp"), RealmPath::new("/corp"));
        assert_ne!(RealmPath::from("/corp"), RealmPath::from("/"));
    }
}
