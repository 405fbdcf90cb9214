//! Group membership and resource propagation engine.
//!
//! Given an entity graph behind the [`identra_model::Directory`] seam, this
//! crate answers one question: after a change to group composition, ownership
//! or resource assignment, what is the minimal set of per-resource operations
//! that keeps provisioned accounts consistent — without duplicating or
//! prematurely deleting access still justified through another membership
//! path?
//!
//! Components, leaves first:
//! - [`Predicate`] — compiles textual conditions over entity attributes and
//!   matches them against the store
//! - [`DynMembershipManager`] — owns per-(group, slot) conditions and keeps
//!   the materialized dynamic-membership relation refreshed
//! - [`ReachabilityCalculator`] — the resources an entity is entitled to,
//!   directly or via any group
//! - [`diff`] — compares reachability snapshots into typed
//!   [`PropagationPlan`]s
//! - [`GroupCoordinator`] — orchestrates group create/update/delete in the
//!   order that keeps before/after snapshots meaningful
//!
//! The engine performs no network I/O; pushing the computed plan to external
//! systems is a downstream concern.

mod coordinator;
mod diff;
mod dynmember;
mod error;
mod predicate;
mod reachability;

pub use coordinator::GroupCoordinator;
pub use diff::{diff, PropagationAction, PropagationPlan, ResourceOp};
pub use dynmember::{DynMembershipManager, MembershipDelta};
pub use error::{EngineError, EngineResult, ValidationReport, Violation, ViolationKind};
pub use predicate::Predicate;
pub use reachability::{ReachabilityCalculator, Snapshot};
