//! The derived lifecycle state shared by every entity kind. Foundation is
//! the only entity that ever reports `Located`; Structure, Dependency, and
//! Complex only ever derive `Planned` or `Built`, but share the same enum so
//! callers (readiness predicates, job `done()` hooks) don't need a
//! per-entity state type.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityState {
    Planned,
    Located,
    Built,
}

impl EntityState {
    pub fn is_planned(self) -> bool {
        matches!(self, EntityState::Planned)
    }

    pub fn is_built(self) -> bool {
        matches!(self, EntityState::Built)
    }
}
