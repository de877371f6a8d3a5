//! Error types shared across the Loam crates.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, LoamError>;

/// The closed set of failures the engine distinguishes.
///
/// Propagation policy: the scanner absorbs per-note failures into
/// warnings, the planner absorbs per-goal failures into unplanned-goal
/// entries, and the executor absorbs per-action failures into the
/// execution result. Only invariant violations escape as panics.
#[derive(Debug, Error)]
pub enum LoamError {
    /// A single note could not be parsed. The scan continues without it.
    #[error("malformed note {path:?}: {detail}")]
    MalformedFile { path: PathBuf, detail: String },

    /// Filesystem failure. The write path aborts before touching the
    /// original file (backup-then-write is the contract).
    #[error("io error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The external service could not be reached at all.
    #[error("service unavailable: {service}")]
    ServiceUnavailable { service: String },

    /// The external call exceeded its configured timeout.
    #[error("service timeout: {service}")]
    ServiceTimeout { service: String },

    /// The external service answered with an error.
    #[error("service error from {service} (code {code}): {message}")]
    ServiceError {
        service: String,
        code: i64,
        message: String,
    },

    /// A proposal's stored diff no longer applies to the current file.
    #[error("stale proposal {id}: stored diff no longer applies")]
    StaleProposal { id: String },

    /// Proposal creation was attempted where a Pending one already exists.
    #[error("duplicate proposal for note {note_id} and action {action}")]
    DuplicateProposal { note_id: String, action: String },

    /// Planner-internal: chaining exceeded the depth bound for a goal.
    /// Downgraded to an unplanned-goal entry, never raised to callers.
    #[error("plan depth exhausted while chaining goal {goal}")]
    PlanDepthExhausted { goal: String },

    /// Executor-level: an action's preconditions did not hold at run time.
    #[error("precondition failed for {action}: {predicate}")]
    PreconditionFailed { action: String, predicate: String },

    /// Embedding cache failure (corrupt row, storage error).
    #[error("embedding cache error: {0}")]
    Cache(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl LoamError {
    /// Wrap an io error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the service-side failure kinds.
    pub fn is_service_failure(&self) -> bool {
        matches!(
            self,
            Self::ServiceUnavailable { .. }
                | Self::ServiceTimeout { .. }
                | Self::ServiceError { .. }
        )
    }
}
