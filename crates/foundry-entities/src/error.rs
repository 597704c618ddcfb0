//! Entity-lifecycle and job-transition violations. Kept as two small
//! per-concern enums (lifecycle vs. job) rather than one crate-wide error
//! type, matching this workspace's one-error-enum-per-concern convention.

use thiserror::Error;

/// A rejected state change on a Foundation/Structure/Dependency/Complex.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("another active job ({0}) already references this entity")]
    EntityLocked(String),

    #[error("{entity} must be in state {expected:?} to {action}, found {found}")]
    WrongState {
        entity: &'static str,
        action: &'static str,
        expected: &'static str,
        found: String,
    },

    #[error("{0}")]
    InvariantViolation(String),

    #[error("cannot delete {entity}: {reason}")]
    NotDeletable { entity: &'static str, reason: String },
}

/// A rejected job RPC action, carrying the `(code, message)` pair 
/// requires every management action to raise on failure.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct JobError {
    pub code: JobErrorCode,
    pub message: String,
}

impl JobError {
    pub fn new(code: JobErrorCode, message: impl Into<String>) -> Self {
        JobError {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobErrorCode {
    NotPauseable,
    NotPaused,
    NotErrored,
}

impl std::fmt::Display for JobErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobErrorCode::NotPauseable => "NOT_PAUSEABLE",
            JobErrorCode::NotPaused => "NOT_PAUSED",
            JobErrorCode::NotErrored => "NOT_ERRORED",
        };
        f.write_str(s)
    }
}
