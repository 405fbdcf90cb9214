use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of entity kinds known to the engine.
///
/// Dynamic-membership conditions may target `User` or `AnyObject` but never
/// `Group`: group-in-group predicates are rejected to keep the membership
/// graph acyclic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    User,
    Group,
    AnyObject,
}

impl EntityKind {
    /// Returns the lowercase name used in persisted rows and log output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EntityKind::User => "user",
            EntityKind::Group => "group",
            EntityKind::AnyObject => "any_object",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
