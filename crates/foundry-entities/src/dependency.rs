//! Dependency: an ordering/script edge between entities.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use foundry_core::{DependencyId, FoundationId, JobId, StructureId};

use crate::error::LifecycleError;
use crate::state::EntityState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Link {
    Soft,
    Hard,
}

/// Exactly one of these is the dependency's source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Source {
    Structure(StructureId),
    Parent(DependencyId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dependency {
    pub id: DependencyId,
    pub source: Source,
    /// The 1:1 dependent foundation, if any.
    pub foundation: Option<FoundationId>,
    /// Where the create/destroy script runs, if not `source`'s own
    /// structure.
    pub script_structure: Option<StructureId>,
    pub link: Link,
    pub create_script_name: Option<String>,
    pub destroy_script_name: Option<String>,
    pub built_at: Option<DateTime<Utc>>,
    pub active_job: Option<JobId>,
}

impl Dependency {
    pub fn new(source: Source, link: Link) -> Self {
        Dependency {
            id: DependencyId::new(),
            source,
            foundation: None,
            script_structure: None,
            link,
            create_script_name: None,
            destroy_script_name: None,
            built_at: None,
            active_job: None,
        }
    }

    /// Invariants: create/destroy script names must differ; a script
    /// (either name set) requires a structure to run against, either via
    /// `source` directly (if it's a Structure) or `script_structure`.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        if self.create_script_name.is_some() && self.create_script_name == self.destroy_script_name {
            return Err(LifecycleError::InvariantViolation(
                "create_script_name and destroy_script_name must differ".into(),
            ));
        }
        let has_script = self.create_script_name.is_some() || self.destroy_script_name.is_some();
        let has_runnable_structure = self.script_structure.is_some() || matches!(self.source, Source::Structure(_));
        if has_script && !has_runnable_structure {
            return Err(LifecycleError::InvariantViolation(
                "a scripted dependency requires either a structure source or script_structure".into(),
            ));
        }
        Ok(())
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
        self.built_at = Some(Utc::now());
        Ok(())
    }

    /// Cascades to child dependencies whose `source` is
    /// `Source::Parent(self.id)` — collected and applied by the caller in
    /// two phases. If `link == Hard` and `foundation` is set, the
    /// caller must also destroy that foundation; we report whether that
    /// cascade is required so the caller doesn't have to re-derive it.
    pub fn set_destroyed(&mut self, job: JobId) -> Result<DestroyCascade, LifecycleError> {
        self.guard_exclusive(job)?;
        self.built_at = None;
        self.active_job = None;
        Ok(DestroyCascade {
            destroy_foundation: matches!(self.link, Link::Hard) && self.foundation.is_some(),
            foundation: self.foundation,
        })
    }
}

/// What the caller must still do after `Dependency::set_destroyed` returns,
/// since a Dependency does not own the Foundation row it may cascade to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DestroyCascade {
    pub destroy_foundation: bool,
    pub foundation: Option<FoundationId>,
}
