//! Error types for the engine.

use identra_model::DirectoryError;
use identra_types::EntityKey;
use std::fmt;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Category of an accumulated validation violation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ViolationKind {
    /// Structural group problem (e.g. missing name).
    InvalidGroup,
    /// Unresolved or missing realm.
    InvalidRealm,
    /// Dynamic-membership condition that does not compile or is structurally
    /// invalid.
    InvalidSearchParameters,
    /// Condition or extension targeting a kind/type the schema disallows.
    InvalidAnyType,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ViolationKind::InvalidGroup => "invalid group",
            ViolationKind::InvalidRealm => "invalid realm",
            ViolationKind::InvalidSearchParameters => "invalid search parameters",
            ViolationKind::InvalidAnyType => "invalid any type",
        };
        f.write_str(name)
    }
}

/// One validation violation found during a create/update pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.detail)
    }
}

/// Accumulator for validation violations.
///
/// Success is the empty case: violations are collected through a whole
/// create/update pass and raised as one composite [`EngineError::Validation`]
/// only if at least one was recorded, so a caller can fix every problem in
/// one round-trip.
#[derive(Debug, Default)]
pub struct ValidationReport {
    violations: Vec<Violation>,
}

impl ValidationReport {
    /// Creates an empty report.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one violation.
    pub fn record(&mut self, kind: ViolationKind, detail: impl Into<String>) {
        self.violations.push(Violation {
            kind,
            detail: detail.into(),
        });
    }

    /// True when no violation has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.violations.is_empty()
    }

    /// Converts the report into a result: `Ok` when empty, the composite
    /// validation error otherwise.
    pub fn into_result(self) -> EngineResult<()> {
        if self.violations.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Validation(self.violations))
        }
    }
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed predicate text; never retried.
    #[error("syntax error: {0}")]
    Syntax(String),

    /// Semantically invalid dynamic-membership condition.
    #[error("invalid search parameters: {0}")]
    InvalidSearchParameters(String),

    /// Condition targeting kind `group`, an unknown any-object type, or an
    /// attribute the targeted schema does not define.
    #[error("invalid any type: {0}")]
    InvalidAnyType(String),

    /// Topology the data model disallows (e.g. cyclic group membership);
    /// signals a modeling bug upstream, not bad input.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    /// The group to mutate does not exist.
    #[error("group not found: {0}")]
    GroupNotFound(EntityKey),

    /// Composite validation failure carrying every accumulated violation.
    #[error("validation failed with {} violation(s)", .0.len())]
    Validation(Vec<Violation>),

    /// Directory (store) failure.
    #[error("directory error: {0}")]
    Store(#[from] DirectoryError),
}

impl EngineError {
    /// Returns the accumulated violations of a composite validation failure.
    pub fn violations(&self) -> &[Violation] {
        match self {
            EngineError::Validation(v) => v,
            _ => &[],
        }
    }
}
