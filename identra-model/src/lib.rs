//! Entity model for Identra.
//!
//! Defines the structures the membership and propagation engine operates on:
//! - [`Entity`] — a user or any-object with multi-valued plain attributes and
//!   directly-assigned resources
//! - [`Group`] — name, realm, resources, owners, dynamic-membership
//!   conditions and type extensions
//! - [`Membership`] — the static or dynamic relation between an entity and a
//!   group
//! - [`KindSchema`] / [`SchemaRegistry`] — per-kind attribute schemas plus
//!   the known any-object types and auxiliary classes
//! - [`GroupSpec`] — the input record for group create/update
//! - [`Directory`] — the collaborator seam through which the engine looks up
//!   and persists entity-graph state
//!
//! These types form the contract between the engine and whatever persistence
//! layer backs it; the engine itself never touches a database directly.

mod directory;
mod entity;
mod group;
mod membership;
mod schema;

pub use directory::{Directory, DirectoryError, DirectoryResult};
pub use entity::{AttrValue, Entity};
pub use group::{DynCondition, Group, GroupSpec, GroupView, TypeExtension, TypeExtensionSpec};
pub use membership::{DynSlot, Membership, MembershipOrigin};
pub use schema::{AttrField, FieldType, KindSchema, SchemaRegistry};
