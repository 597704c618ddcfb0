//! Resolves `can_start` pure predicates (`foundry_entities::readiness`)
//! against a caller-held `EntityStore` lease. Kept separate from the pure
//! functions themselves so that crate stays free of any store/async
//! dependency — this module is the only place those two meet, per the
//! design note's "pure function over freshly read entity rows under a
//! lease, to avoid TOCTOU" guidance.

use foundry_entities::{can_start_dependency, can_start_foundation, can_start_structure, EntitySnapshot, ScriptKind, Source};

use crate::error::SchedulerError;
use crate::job::AnyJob;
use crate::store::EntityStore;

pub async fn can_start(job: &AnyJob, entities: &dyn EntityStore) -> Result<bool, SchedulerError> {
    let script = ScriptKind::classify(&job.base().script_name);
    match job {
        AnyJob::Foundation(j) => {
            let foundation = entities.foundation(j.foundation).await.ok_or(SchedulerError::MissingEntity)?;
            let dependency = entities
                .dependency_on_foundation(foundation.id)
                .await
                .map(|d| EntitySnapshot::new(d.state(), d.active_job.is_some()));
            let structure = entities
                .structure_on_foundation(foundation.id)
                .await
                .map(|s| EntitySnapshot::new(s.state(), s.active_job.is_some()));
            Ok(can_start_foundation(foundation.state(), script, dependency, structure))
        }
        AnyJob::Structure(j) => {
            let structure = entities.structure(j.structure).await.ok_or(SchedulerError::MissingEntity)?;
            let foundation = entities.foundation(structure.foundation).await.ok_or(SchedulerError::MissingEntity)?;
            let foundation_snapshot = EntitySnapshot::new(foundation.state(), foundation.active_job.is_some());
            let dependents: Vec<EntitySnapshot> = entities
                .dependencies_sourced_from(structure.id)
                .await
                .iter()
                .map(|d| EntitySnapshot::new(d.state(), d.active_job.is_some()))
                .collect();
            Ok(can_start_structure(structure.state(), script, foundation_snapshot, &dependents))
        }
        AnyJob::Dependency(j) => {
            let dependency = entities.dependency(j.dependency).await.ok_or(SchedulerError::MissingEntity)?;
            let source_snapshot = match dependency.source {
                Source::Structure(id) => {
                    let s = entities.structure(id).await.ok_or(SchedulerError::MissingEntity)?;
                    EntitySnapshot::new(s.state(), s.active_job.is_some())
                }
                Source::Parent(id) => {
                    let d = entities.dependency(id).await.ok_or(SchedulerError::MissingEntity)?;
                    EntitySnapshot::new(d.state(), d.active_job.is_some())
                }
            };
            let foundation_snapshot = match dependency.foundation {
                Some(id) => {
                    let f = entities.foundation(id).await.ok_or(SchedulerError::MissingEntity)?;
                    Some(EntitySnapshot::new(f.state(), f.active_job.is_some()))
                }
                None => None,
            };
            let children: Vec<EntitySnapshot> = entities
                .child_dependencies(dependency.id)
                .await
                .iter()
                .map(|d| EntitySnapshot::new(d.state(), d.active_job.is_some()))
                .collect();
            Ok(can_start_dependency(dependency.state(), script, source_snapshot, foundation_snapshot, &children))
        }
    }
}
