//! [`AnyJob`]: the scheduler's uniform handle over the three target-typed
//! job wrappers (`foundry_entities::{FoundationJob, StructureJob,
//! DependencyJob}`). The tick loop, the job store, and the RPC surface all
//! want to treat a job generically ("is it queued", "advance its blob",
//! "what's its audit log") without caring which entity kind it targets
//! until the terminal-effect cascade (`crate::cascade`) actually needs to
//! know.

use foundry_core::JobId;
use foundry_entities::{BaseJob, DependencyJob, FoundationJob, StructureJob};

#[derive(Debug, Clone)]
pub enum AnyJob {
    Foundation(FoundationJob),
    Structure(StructureJob),
    Dependency(DependencyJob),
}

impl AnyJob {
    pub fn id(&self) -> JobId {
        self.base().id
    }

    pub fn base(&self) -> &BaseJob {
        match self {
            AnyJob::Foundation(j) => &j.base,
            AnyJob::Structure(j) => &j.base,
            AnyJob::Dependency(j) => &j.base,
        }
    }

    pub fn base_mut(&mut self) -> &mut BaseJob {
        match self {
            AnyJob::Foundation(j) => &mut j.base,
            AnyJob::Structure(j) => &mut j.base,
            AnyJob::Dependency(j) => &mut j.base,
        }
    }
}

impl From<FoundationJob> for AnyJob {
    fn from(job: FoundationJob) -> Self {
        AnyJob::Foundation(job)
    }
}

impl From<StructureJob> for AnyJob {
    fn from(job: StructureJob) -> Self {
        AnyJob::Structure(job)
    }
}

impl From<DependencyJob> for AnyJob {
    fn from(job: DependencyJob) -> Self {
        AnyJob::Dependency(job)
    }
}
