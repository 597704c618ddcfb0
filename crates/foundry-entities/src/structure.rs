//! Structure: an instance of a blueprint placed onto a Foundation.
//!
//! Structure owns its Foundation binding (a plain forward `FoundationId`,
//! never a back-reference the other way). Cascading the destroy to
//! dependencies that reference this structure is the caller's
//! responsibility, since Structure does not enumerate dependencies itself.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use foundry_core::{FoundationId, JobId, SiteId, StructureId};

use crate::blueprint::{Blueprint, BlueprintId};
use crate::error::LifecycleError;
use crate::foundation::Foundation;
use crate::state::EntityState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Structure {
    pub id: StructureId,
    pub site: SiteId,
    pub hostname: String,
    pub blueprint: BlueprintId,
    pub foundation: FoundationId,
    /// Rotated to a fresh UUID on every destroy, so stale config
    /// renders from a previous life of the hostname can be detected.
    pub config_uuid: Uuid,
    pub config_values: BTreeMap<String, serde_json::Value>,
    pub built_at: Option<chrono::DateTime<chrono::Utc>>,
    pub active_job: Option<JobId>,
}

impl Structure {
    /// The invariant that the foundation's blueprint must lie in the
    /// structure blueprint's allowed set is enforced here at construction,
    /// since this is the only point a structure's foundation binding is
    /// established.
    pub fn new(
        hostname: impl Into<String>,
        site: SiteId,
        structure_blueprint: &Blueprint,
        foundation: &Foundation,
    ) -> Result<Self, LifecycleError> {
        if !structure_blueprint.allows_foundation(&foundation.blueprint) {
            return Err(LifecycleError::InvariantViolation(format!(
                "structure blueprint {} does not allow foundation blueprint {}",
                structure_blueprint.id, foundation.blueprint
            )));
        }
        Ok(Structure {
            id: StructureId::new(),
            site,
            hostname: hostname.into(),
            blueprint: structure_blueprint.id.clone(),
            foundation: foundation.id,
            config_uuid: Uuid::now_v7(),
            config_values: BTreeMap::new(),
            built_at: None,
            active_job: None,
        })
    }

    pub fn state(&self) -> EntityState {
        if self.built_at.is_some() {
            EntityState::Built
        } else {
            EntityState::Planned
        }
    }

    fn guard_exclusive(&self, caller: JobId) -> Result<(), LifecycleError> {
        match self.active_job {
            Some(job) if job != caller => Err(LifecycleError::EntityLocked(job.to_string())),
            _ => Ok(()),
        }
    }

    pub fn set_built(&mut self, job: JobId) -> Result<(), LifecycleError> {
        self.guard_exclusive(job)?;
        self.built_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// cascading the destroy to dependencies where `structure == self`
    /// is the caller's job (two-phase: collect those dependency ids, then
    /// call `Dependency::set_destroyed` on each). Here we only rotate the
    /// structure's own `config_uuid` and clear its built timestamp.
    pub fn set_destroyed(&mut self, job: JobId) -> Result<(), LifecycleError> {
        self.guard_exclusive(job)?;
        self.built_at = None;
        self.config_uuid = Uuid::now_v7();
        self.active_job = None;
        Ok(())
    }
}
