//! `JobStore`/`EntityStore`: the only seam toward the out-of-scope
//! persistence backend ("Shared resources"). This crate ships the
//! trait contract plus an in-memory reference implementation used by its
//! own tests and by `foundry-coordinator`'s binary — not a SQL-backed one.
//!
//! Both stores model row-level locking as `tokio::sync::RwLock` guarding a
//! `HashMap`, standing in for the "all transitions serialize through
//! row-level locking keyed by entity primary key" requirement without
//! committing this crate to a particular database.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use foundry_core::{DependencyId, FoundationId, JobId, StructureId};
use foundry_entities::{Blueprint, BlueprintId, Dependency, Foundation, Structure};

use crate::job::AnyJob;

#[async_trait]
pub trait JobStore: Send + Sync {
    /// Every job currently in the `queued` state, in no particular order
    /// ("across jobs no ordering is guaranteed except the cross-entity
    /// readiness predicate").
    async fn queued(&self) -> Vec<JobId>;
    async fn load(&self, id: JobId) -> Option<AnyJob>;
    async fn save(&self, job: AnyJob);
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn foundation(&self, id: FoundationId) -> Option<Foundation>;
    async fn put_foundation(&self, foundation: Foundation);
    async fn structure(&self, id: StructureId) -> Option<Structure>;
    async fn put_structure(&self, structure: Structure);
    async fn dependency(&self, id: DependencyId) -> Option<Dependency>;
    async fn put_dependency(&self, dependency: Dependency);
    async fn blueprint(&self, id: &BlueprintId) -> Option<Blueprint>;
    async fn put_blueprint(&self, blueprint: Blueprint);

    /// The Structure placed on this Foundation (1:1), if any.
    async fn structure_on_foundation(&self, foundation: FoundationId) -> Option<Structure>;
    /// The Dependency whose `foundation` field is this id (1:1).
    async fn dependency_on_foundation(&self, foundation: FoundationId) -> Option<Dependency>;
    /// Dependencies whose `source` is `Source::Structure(structure)`.
    async fn dependencies_sourced_from(&self, structure: StructureId) -> Vec<Dependency>;
    /// Dependencies whose `source` is `Source::Parent(parent)`.
    async fn child_dependencies(&self, parent: DependencyId) -> Vec<Dependency>;
}

#[derive(Default)]
pub struct InMemoryJobStore {
    jobs: RwLock<HashMap<JobId, AnyJob>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for InMemoryJobStore {
    async fn queued(&self) -> Vec<JobId> {
        self.jobs
            .read()
            .await
            .values()
            .filter(|j| j.base().state == foundry_entities::JobState::Queued)
            .map(|j| j.id())
            .collect()
    }

    async fn load(&self, id: JobId) -> Option<AnyJob> {
        self.jobs.read().await.get(&id).cloned()
    }

    async fn save(&self, job: AnyJob) {
        self.jobs.write().await.insert(job.id(), job);
    }
}

#[derive(Default)]
pub struct InMemoryEntityStore {
    foundations: RwLock<HashMap<FoundationId, Foundation>>,
    structures: RwLock<HashMap<StructureId, Structure>>,
    dependencies: RwLock<HashMap<DependencyId, Dependency>>,
    blueprints: RwLock<HashMap<BlueprintId, Blueprint>>,
}

impl InMemoryEntityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn foundation(&self, id: FoundationId) -> Option<Foundation> {
        self.foundations.read().await.get(&id).cloned()
    }

    async fn put_foundation(&self, foundation: Foundation) {
        self.foundations.write().await.insert(foundation.id, foundation);
    }

    async fn structure(&self, id: StructureId) -> Option<Structure> {
        self.structures.read().await.get(&id).cloned()
    }

    async fn put_structure(&self, structure: Structure) {
        self.structures.write().await.insert(structure.id, structure);
    }

    async fn dependency(&self, id: DependencyId) -> Option<Dependency> {
        self.dependencies.read().await.get(&id).cloned()
    }

    async fn put_dependency(&self, dependency: Dependency) {
        self.dependencies.write().await.insert(dependency.id, dependency);
    }

    async fn blueprint(&self, id: &BlueprintId) -> Option<Blueprint> {
        self.blueprints.read().await.get(id).cloned()
    }

    async fn put_blueprint(&self, blueprint: Blueprint) {
        self.blueprints.write().await.insert(blueprint.id.clone(), blueprint);
    }

    async fn structure_on_foundation(&self, foundation: FoundationId) -> Option<Structure> {
        self.structures.read().await.values().find(|s| s.foundation == foundation).cloned()
    }

    async fn dependency_on_foundation(&self, foundation: FoundationId) -> Option<Dependency> {
        self.dependencies.read().await.values().find(|d| d.foundation == Some(foundation)).cloned()
    }

    async fn dependencies_sourced_from(&self, structure: StructureId) -> Vec<Dependency> {
        self.dependencies
            .read()
            .await
            .values()
            .filter(|d| matches!(d.source, foundry_entities::Source::Structure(s) if s == structure))
            .cloned()
            .collect()
    }

    async fn child_dependencies(&self, parent: DependencyId) -> Vec<Dependency> {
        self.dependencies
            .read()
            .await
            .values()
            .filter(|d| matches!(d.source, foundry_entities::Source::Parent(p) if p == parent))
            .cloned()
            .collect()
    }
}
