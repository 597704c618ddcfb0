//! Scheduler-level errors. Distinct from [`foundry_entities::LifecycleError`]
//! and [`foundry_entities::JobError`], which this enum wraps rather than
//! re-derives, following this workspace's one-error-enum-per-crate
//! convention.

use foundry_core::JobId;
use foundry_entities::{JobError, LifecycleError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("job {0} not found")]
    JobNotFound(JobId),

    #[error("referenced entity not found")]
    MissingEntity,

    #[error("no script named {0:?} is registered with this coordinator")]
    UnknownScript(String),

    #[error("corrupt job blob: {0}")]
    Blob(String),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("dispatch rejected: {0}")]
    Dispatch(String),
}
