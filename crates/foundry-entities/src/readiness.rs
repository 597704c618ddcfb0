//! `can_start`: the cross-entity readiness predicate the scheduler
//! asks before advancing a queued job. Implemented as pure functions over a
//! caller-resolved snapshot of the target entity and whatever it directly
//! references — never over state cached by the scheduler itself, to avoid
//! the TOCTOU gap the design notes call out.

use serde::{Deserialize, Serialize};

use crate::state::EntityState;

/// Which of the three readiness rules applies. Any script name other
/// than the two reserved ones falls through to `Other`, which imposes no
/// constraint beyond the job existing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Create,
    Destroy,
    Other,
}

impl ScriptKind {
    pub fn classify(script_name: &str) -> Self {
        match script_name {
            "create" => ScriptKind::Create,
            "destroy" => ScriptKind::Destroy,
            _ => ScriptKind::Other,
        }
    }
}

/// The minimal facts `can_start` needs about an entity it does not own
/// directly: its derived state, and whether some job currently holds its
/// exclusive lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub state: EntityState,
    pub has_active_job: bool,
}

impl EntitySnapshot {
    pub fn new(state: EntityState, has_active_job: bool) -> Self {
        EntitySnapshot { state, has_active_job }
    }
}

/// Foundation rows.
pub fn can_start_foundation(
    foundation_state: EntityState,
    script: ScriptKind,
    dependency: Option<EntitySnapshot>,
    structure: Option<EntitySnapshot>,
) -> bool {
    match script {
        ScriptKind::Create => {
            foundation_state == EntityState::Located && dependency.is_none_or(|d| d.state == EntityState::Built)
        }
        ScriptKind::Destroy => {
            foundation_state == EntityState::Built
                && structure.is_none_or(|s| s.state == EntityState::Planned && !s.has_active_job)
        }
        ScriptKind::Other => true,
    }
}

/// Structure rows.
pub fn can_start_structure(
    structure_state: EntityState,
    script: ScriptKind,
    foundation: EntitySnapshot,
    dependent_dependencies: &[EntitySnapshot],
) -> bool {
    match script {
        ScriptKind::Create => structure_state == EntityState::Planned && foundation.state == EntityState::Built,
        ScriptKind::Destroy => {
            structure_state == EntityState::Built
                && dependent_dependencies.iter().all(|d| d.state == EntityState::Planned && !d.has_active_job)
        }
        ScriptKind::Other => true,
    }
}

/// Dependency rows.
pub fn can_start_dependency(
    dependency_state: EntityState,
    script: ScriptKind,
    source: EntitySnapshot,
    foundation: Option<EntitySnapshot>,
    child_dependencies: &[EntitySnapshot],
) -> bool {
    match script {
        ScriptKind::Create => dependency_state == EntityState::Planned && source.state == EntityState::Built,
        ScriptKind::Destroy => {
            dependency_state == EntityState::Built
                && foundation.is_none_or(|f| f.state == EntityState::Planned && !f.has_active_job)
                && child_dependencies.iter().all(|d| d.state != EntityState::Built)
        }
        ScriptKind::Other => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Foundation `located` with dependency `planned` can't
    /// start a create job; once the dependency is `built`, it can.
    #[test]
    fn foundation_create_gated_on_its_dependency() {
        let dependency_planned = EntitySnapshot::new(EntityState::Planned, false);
        assert!(!can_start_foundation(EntityState::Located, ScriptKind::Create, Some(dependency_planned), None));

        let dependency_built = EntitySnapshot::new(EntityState::Built, false);
        assert!(can_start_foundation(EntityState::Located, ScriptKind::Create, Some(dependency_built), None));
    }

    #[test]
    fn foundation_create_with_no_dependency_only_needs_located() {
        assert!(can_start_foundation(EntityState::Located, ScriptKind::Create, None, None));
        assert!(!can_start_foundation(EntityState::Planned, ScriptKind::Create, None, None));
    }

    #[test]
    fn foundation_destroy_blocked_by_active_structure_job() {
        let structure_busy = EntitySnapshot::new(EntityState::Planned, true);
        assert!(!can_start_foundation(EntityState::Built, ScriptKind::Destroy, None, Some(structure_busy)));
    }

    #[test]
    fn structure_create_needs_built_foundation() {
        let foundation = EntitySnapshot::new(EntityState::Built, false);
        assert!(can_start_structure(EntityState::Planned, ScriptKind::Create, foundation, &[]));

        let foundation_not_built = EntitySnapshot::new(EntityState::Located, false);
        assert!(!can_start_structure(EntityState::Planned, ScriptKind::Create, foundation_not_built, &[]));
    }

    #[test]
    fn structure_destroy_blocked_by_built_dependency() {
        let foundation = EntitySnapshot::new(EntityState::Built, false);
        let dep_built = EntitySnapshot::new(EntityState::Built, false);
        assert!(!can_start_structure(EntityState::Built, ScriptKind::Destroy, foundation, &[dep_built]));
    }

    #[test]
    fn dependency_destroy_blocked_by_built_child() {
        let source = EntitySnapshot::new(EntityState::Built, false);
        let child_built = EntitySnapshot::new(EntityState::Built, false);
        assert!(!can_start_dependency(EntityState::Built, ScriptKind::Destroy, source, None, &[child_built]));
    }

    #[test]
    fn other_script_always_ready() {
        assert!(can_start_foundation(EntityState::Planned, ScriptKind::Other, None, None));
    }
}
