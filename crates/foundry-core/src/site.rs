//! Scoping namespace for entities. Non-core: a bare opaque token carried on
//! every entity, with no managed lifecycle of its own.

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Opaque scoping identifier. Two entities in different sites are never
/// considered for cross-entity readiness checks against each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display("{_0}")]
pub struct SiteId(String);

impl SiteId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for SiteId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}
