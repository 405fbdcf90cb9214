//! Core type definitions for Identra.
//!
//! This crate defines the fundamental, store-agnostic types used throughout
//! the engine:
//! - Entity and group keys (UUID v7)
//! - Stable string keys for external resources, any-object types, auxiliary
//!   attribute classes and realms
//! - The closed [`EntityKind`] tag
//!
//! All domain-specific structures (entities, groups, memberships, schemas)
//! belong in `identra-model`, not here.

mod keys;
mod kind;

pub use keys::{AnyTypeKey, AuxClassKey, EntityKey, RealmPath, ResourceKey};
pub use kind::EntityKind;
