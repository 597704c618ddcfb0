//! Applies a job's terminal `done()` hook and, where the hook's outcome
//! calls for it, the two-phase "collect ids, then apply" destroy cascades:
//! Foundation → Structure, Structure → Dependency, Dependency → child
//! Dependency (→ hard-linked Foundation).
//!
//! Every cascade step re-reads its target from the store rather than
//! threading an in-memory reference through, so a cascade that spans
//! multiple rows never holds more than one row's lock at a time.

use foundry_core::JobId;
use foundry_entities::{DependencyDoneOutcome, ScriptKind};

use crate::error::SchedulerError;
use crate::job::AnyJob;
use crate::store::EntityStore;

pub async fn apply_done(entities: &dyn EntityStore, job: &mut AnyJob) -> Result<(), SchedulerError> {
    match job {
        AnyJob::Foundation(j) => {
            let mut foundation = entities.foundation(j.foundation).await.ok_or(SchedulerError::MissingEntity)?;
            let blueprint = entities.blueprint(&foundation.blueprint).await.ok_or(SchedulerError::MissingEntity)?;
            j.apply_done(&mut foundation, &blueprint)?;
            let is_destroy = matches!(ScriptKind::classify(&j.base.script_name), ScriptKind::Destroy);
            let attached_structure = if is_destroy { entities.structure_on_foundation(foundation.id).await } else { None };
            entities.put_foundation(foundation).await;
            if let Some(structure) = attached_structure {
                cascade_structure_destroy(entities, j.base.id, structure.id).await?;
            }
            Ok(())
        }
        AnyJob::Structure(j) => {
            let mut structure = entities.structure(j.structure).await.ok_or(SchedulerError::MissingEntity)?;
            j.apply_done(&mut structure)?;
            let is_destroy = matches!(ScriptKind::classify(&j.base.script_name), ScriptKind::Destroy);
            let dependents = if is_destroy { entities.dependencies_sourced_from(structure.id).await } else { Vec::new() };
            entities.put_structure(structure).await;
            for dependency in dependents {
                cascade_dependency_destroy(entities, j.base.id, dependency.id).await?;
            }
            Ok(())
        }
        AnyJob::Dependency(j) => {
            let mut dependency = entities.dependency(j.dependency).await.ok_or(SchedulerError::MissingEntity)?;
            let outcome = j.apply_done(&mut dependency)?;
            entities.put_dependency(dependency).await;
            if let DependencyDoneOutcome::Destroyed(cascade) = outcome {
                finish_dependency_cascade(entities, j.base.id, j.dependency, cascade).await?;
            }
            Ok(())
        }
    }
}

/// Foundation cascade: destroy the attached Structure, which recurses into
/// its own dependency cascade.
async fn cascade_structure_destroy(entities: &dyn EntityStore, job: JobId, structure_id: foundry_core::StructureId) -> Result<(), SchedulerError> {
    let Some(mut structure) = entities.structure(structure_id).await else {
        return Ok(());
    };
    structure.set_destroyed(job)?;
    let dependents = entities.dependencies_sourced_from(structure_id).await;
    entities.put_structure(structure).await;
    for dependency in dependents {
        cascade_dependency_destroy(entities, job, dependency.id).await?;
    }
    Ok(())
}

/// Structure/Dependency cascade: destroy one dependency, then recurse into
/// its children and, if it was a hard link with a bound foundation, destroy
/// that foundation too.
fn cascade_dependency_destroy<'a>(
    entities: &'a dyn EntityStore,
    job: JobId,
    dependency_id: foundry_core::DependencyId,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), SchedulerError>> + Send + 'a>> {
    Box::pin(async move {
        let Some(mut dependency) = entities.dependency(dependency_id).await else {
            return Ok(());
        };
        let cascade = dependency.set_destroyed(job)?;
        entities.put_dependency(dependency).await;
        finish_dependency_cascade(entities, job, dependency_id, cascade).await
    })
}

async fn finish_dependency_cascade(
    entities: &dyn EntityStore,
    job: JobId,
    dependency_id: foundry_core::DependencyId,
    cascade: foundry_entities::DestroyCascade,
) -> Result<(), SchedulerError> {
    let children = entities.child_dependencies(dependency_id).await;
    for child in children {
        cascade_dependency_destroy(entities, job, child.id).await?;
    }
    if cascade.destroy_foundation {
        if let Some(foundation_id) = cascade.foundation {
            if let Some(mut foundation) = entities.foundation(foundation_id).await {
                foundation.set_destroyed(job)?;
                entities.put_foundation(foundation).await;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::SiteId;
    use foundry_entities::{Blueprint, BlueprintId, Dependency, DependencyJob, Foundation, FoundationJob, Link, Source, Structure, StructureJob};

    use crate::store::InMemoryEntityStore;

    fn site() -> SiteId {
        SiteId::new("dc1")
    }

    #[tokio::test]
    async fn structure_destroy_cascades_to_its_dependencies() {
        let store = InMemoryEntityStore::new();
        let bp = Blueprint::new("bp").allowing_foundation("bp");
        let foundation = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let mut structure = Structure::new("web01", site(), &bp, &foundation).unwrap();
        let job_id = foundry_core::JobId::new();
        structure.active_job = Some(job_id);
        structure.set_built(job_id).unwrap();

        let mut dependency = Dependency::new(Source::Structure(structure.id), Link::Soft);
        dependency.create_script_name = Some("create".into());
        dependency.destroy_script_name = Some("destroy".into());
        dependency.set_built(foundry_core::JobId::new()).unwrap();

        store.put_blueprint(bp).await;
        store.put_foundation(foundation).await;
        store.put_structure(structure.clone()).await;
        store.put_dependency(dependency.clone()).await;

        let mut job = StructureJob::new(structure.id, site(), "destroy");
        job.base.id = job_id;
        let mut any = AnyJob::Structure(job);
        apply_done(&store, &mut any).await.unwrap();

        let reloaded_dependency = store.dependency(dependency.id).await.unwrap();
        assert_eq!(reloaded_dependency.state(), foundry_entities::EntityState::Planned);
    }

    #[tokio::test]
    async fn hard_dependency_destroy_cascades_to_its_foundation() {
        let store = InMemoryEntityStore::new();
        let dependent_foundation = Foundation::new("f2", site(), BlueprintId::new("bp"));
        let foundation_id = dependent_foundation.id;
        store.put_foundation(dependent_foundation).await;

        let mut dependency = Dependency::new(Source::Structure(foundry_core::StructureId::new()), Link::Hard);
        dependency.foundation = Some(foundation_id);
        dependency.create_script_name = Some("create".into());
        dependency.destroy_script_name = Some("destroy".into());
        let job_id = foundry_core::JobId::new();
        dependency.set_built(job_id).unwrap();
        store.put_dependency(dependency.clone()).await;

        let mut job = DependencyJob::new(dependency.id, site(), "destroy");
        job.base.id = job_id;
        let mut any = AnyJob::Dependency(job);
        apply_done(&store, &mut any).await.unwrap();

        let reloaded_foundation = store.foundation(foundation_id).await.unwrap();
        assert_eq!(reloaded_foundation.state(), foundry_entities::EntityState::Planned);
    }

    #[tokio::test]
    async fn foundation_destroy_cascades_through_structure_to_dependency() {
        let store = InMemoryEntityStore::new();
        let bp = Blueprint::new("bp").allowing_foundation("bp");
        let foundation = Foundation::new("f1", site(), BlueprintId::new("bp"));
        let job_id = foundry_core::JobId::new();
        let mut foundation = foundation;
        foundation.set_built(job_id, &bp).unwrap();
        let foundation_id = foundation.id;

        let mut structure = Structure::new("web01", site(), &bp, &foundation).unwrap();
        structure.set_built(foundry_core::JobId::new()).unwrap();
        let structure_id = structure.id;

        let mut dependency = Dependency::new(Source::Structure(structure_id), Link::Soft);
        dependency.create_script_name = Some("create".into());
        dependency.destroy_script_name = Some("destroy".into());
        dependency.set_built(foundry_core::JobId::new()).unwrap();
        let dependency_id = dependency.id;

        store.put_blueprint(bp).await;
        store.put_foundation(foundation).await;
        store.put_structure(structure).await;
        store.put_dependency(dependency).await;

        let mut job = FoundationJob::new(foundation_id, site(), "destroy");
        job.base.id = job_id;
        let mut any = AnyJob::Foundation(job);
        apply_done(&store, &mut any).await.unwrap();

        assert_eq!(store.structure(structure_id).await.unwrap().state(), foundry_entities::EntityState::Planned);
        assert_eq!(store.dependency(dependency_id).await.unwrap().state(), foundry_entities::EntityState::Planned);
    }
}
