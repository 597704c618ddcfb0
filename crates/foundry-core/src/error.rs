//! Narrow, shared error kinds. Each higher-level crate (script parsing, the
//! interpreter, the entity graph, the job state machine) defines its own
//! error enum for its own concern; this one is only for identifier and value
//! handling shared by all of them.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    #[error("value of type {found} cannot be used where {expected} was required")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;
