//! Foundation: the physical or virtual substrate a Structure is placed on.
//!
//! Foundation never stores a back-reference to its attached Structure or the
//! Dependency bound to it — those are forward references owned by the
//! *other* side (`Structure::foundation`, `Dependency::foundation`). Every
//! lifecycle setter below that needs to know about an attached entity takes
//! it as an explicit, caller-resolved argument instead, per the design
//! note's "pure function over freshly read entity rows" rule — this also
//! sidesteps the cyclic-reference problem the design notes call out.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foundry_core::{FoundationId, JobId, SiteId};

use crate::blueprint::{Blueprint, BlueprintId};
use crate::error::LifecycleError;
use crate::state::EntityState;

/// One physical network interface, kept in physical-location order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interface {
    pub location: u32,
    pub mac: Option<String>,
    pub pxe: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Foundation {
    pub id: FoundationId,
    /// Short, unique human-facing name.
    pub locator: String,
    pub site: SiteId,
    pub blueprint: BlueprintId,
    /// Opaque mapping describing hardware identifiers (serial numbers, BMC
    /// addresses, ...). Never interpreted by this crate beyond "present or
    /// not".
    pub id_map: Option<serde_json::Value>,
    pub located_at: Option<DateTime<Utc>>,
    pub built_at: Option<DateTime<Utc>>,
    pub interfaces: Vec<Interface>,
    /// The job currently holding this entity's exclusive lease, if any.
    pub active_job: Option<JobId>,
}

impl Foundation {
    pub fn new(locator: impl Into<String>, site: SiteId, blueprint: BlueprintId) -> Self {
        Foundation {
            id: FoundationId::new(),
            locator: locator.into(),
            site,
            blueprint,
            id_map: None,
            located_at: None,
            built_at: None,
            interfaces: Vec::new(),
            active_job: None,
        }
    }

    /// `planned` (neither timestamp) → `located` (only `located_at`) →
    /// `built` (both).
    pub fn state(&self) -> EntityState {
        match (self.located_at, self.built_at) {
            (None, _) => EntityState::Planned,
            (Some(_), None) => EntityState::Located,
            (Some(_), Some(_)) => EntityState::Built,
        }
    }

    fn guard_exclusive(&self, caller: JobId) -> Result<(), LifecycleError> {
        match self.active_job {
            Some(job) if job != caller => Err(LifecycleError::EntityLocked(job.to_string())),
            _ => Ok(()),
        }
    }

    /// Allowed iff: no cartographer bound (modeled here as "no other active job"
    /// since the cartographer/site-address-book is an out-of-scope
    /// collaborator that would otherwise independently lease this row),
    /// the attached job (if any) is the caller's own `create` job, the
    /// attached structure (if any) is `planned`, and `id_map` is present
    /// whenever the blueprint declares a validation template.
    pub fn set_located(
        &mut self,
        job: JobId,
        blueprint: &Blueprint,
        attached_structure_state: Option<EntityState>,
    ) -> Result<(), LifecycleError> {
        self.guard_exclusive(job)?;
        if let Some(state) = attached_structure_state {
            if !state.is_planned() {
                return Err(LifecycleError::WrongState {
                    entity: "structure attached to foundation",
                    action: "set foundation located",
                    expected: "planned",
                    found: format!("{state:?}"),
                });
            }
        }
        if blueprint.has_validation_template && self.id_map.is_none() {
            return Err(LifecycleError::InvariantViolation(
                "id_map must be present before a foundation can be located when its blueprint declares a validation template".into(),
            ));
        }
        self.located_at = Some(Utc::now());
        Ok(())
    }

    /// Allowed iff: no other active job; if not already located and the blueprint
    /// has a validation template, reject (a validated foundation must pass
    /// through `located` first); otherwise backfill `located_at` if absent.
    pub fn set_built(&mut self, job: JobId, blueprint: &Blueprint) -> Result<(), LifecycleError> {
        self.guard_exclusive(job)?;
        if self.located_at.is_none() {
            if blueprint.has_validation_template {
                return Err(LifecycleError::WrongState {
                    entity: "foundation",
                    action: "set built",
                    expected: "located",
                    found: "planned (blueprint requires validation before build)".to_string(),
                });
            }
            self.located_at = Some(Utc::now());
        }
        self.built_at = Some(Utc::now());
        Ok(())
    }

    /// Clears both timestamps and `id_map`, clears interface MACs and
    /// PXE records. Cascading the destroy to an attached structure is the
    /// caller's responsibility (it owns the structure row), following the
    /// two-phase "collect ids then apply" cascade pattern used throughout
    /// this crate.
    pub fn set_destroyed(&mut self, job: JobId) -> Result<(), LifecycleError> {
        self.guard_exclusive(job)?;
        self.id_map = None;
        self.located_at = None;
        self.built_at = None;
        for iface in &mut self.interfaces {
            iface.mac = None;
            iface.pxe = None;
        }
        self.active_job = None;
        Ok(())
    }

    /// Deletion (as opposed to destroy-to-planned) requires state in
    /// {planned, located}, no attached structure, and no active job.
    pub fn can_delete(&self, attached_structure: bool) -> Result<(), LifecycleError> {
        if self.active_job.is_some() {
            return Err(LifecycleError::NotDeletable {
                entity: "foundation",
                reason: "has an active job".into(),
            });
        }
        if attached_structure {
            return Err(LifecycleError::NotDeletable {
                entity: "foundation",
                reason: "has an attached structure".into(),
            });
        }
        if self.state() == EntityState::Built {
            return Err(LifecycleError::NotDeletable {
                entity: "foundation",
                reason: "state is built".into(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteId {
        SiteId::new("dc1")
    }

    #[test]
    fn state_progresses_planned_located_built() {
        let f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        assert_eq!(f.state(), EntityState::Planned);
    }

    #[test]
    fn set_located_requires_id_map_when_blueprint_validates() {
        let mut f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let job = JobId::new();
        let bp = Blueprint::new("bp").with_validation_template();
        let err = f.set_located(job, &bp, None).unwrap_err();
        assert!(matches!(err, LifecycleError::InvariantViolation(_)));

        f.id_map = Some(serde_json::json!({"serial": "abc"}));
        f.set_located(job, &bp, None).unwrap();
        assert_eq!(f.state(), EntityState::Located);
    }

    #[test]
    fn set_built_rejects_unlocated_validated_foundation() {
        let mut f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let job = JobId::new();
        let bp = Blueprint::new("bp").with_validation_template();
        let err = f.set_built(job, &bp).unwrap_err();
        assert!(matches!(err, LifecycleError::WrongState { .. }));
    }

    #[test]
    fn set_built_backfills_located_at_without_validation_template() {
        let mut f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let job = JobId::new();
        let bp = Blueprint::new("bp");
        f.set_built(job, &bp).unwrap();
        assert!(f.located_at.is_some());
        assert_eq!(f.state(), EntityState::Built);
    }

    #[test]
    fn another_active_job_blocks_transition() {
        let mut f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let other = JobId::new();
        f.active_job = Some(other);
        let bp = Blueprint::new("bp");
        let err = f.set_built(JobId::new(), &bp).unwrap_err();
        assert!(matches!(err, LifecycleError::EntityLocked(_)));
    }

    #[test]
    fn set_destroyed_clears_timestamps_and_interfaces() {
        let mut f = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let job = JobId::new();
        let bp = Blueprint::new("bp");
        f.set_built(job, &bp).unwrap();
        f.interfaces.push(Interface {
            location: 0,
            mac: Some("aa:bb".into()),
            pxe: Some("boot.ipxe".into()),
        });
        f.set_destroyed(job).unwrap();
        assert_eq!(f.state(), EntityState::Planned);
        assert!(f.interfaces[0].mac.is_none());
        assert!(f.interfaces[0].pxe.is_none());
    }
}
