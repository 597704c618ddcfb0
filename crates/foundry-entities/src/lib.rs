//! The entity graph (foundation → structure → dependency → complex, C7) and
//! the job state machine that drives scripts against it (C8/C9/C10).

pub mod blueprint;
pub mod complex;
pub mod dependency;
pub mod error;
pub mod foundation;
pub mod job;
pub mod readiness;
pub mod state;
pub mod structure;

pub use blueprint::{Blueprint, BlueprintId};
pub use complex::{Complex, MembershipObserved};
pub use dependency::{Dependency, DestroyCascade, Link, Source};
pub use error::{JobError, JobErrorCode, LifecycleError};
pub use foundation::{Foundation, Interface};
pub use job::{BaseJob, DependencyDoneOutcome, DependencyJob, FoundationJob, JobState, LogEntry, StructureJob};
pub use readiness::{can_start_dependency, can_start_foundation, can_start_structure, EntitySnapshot, ScriptKind};
pub use state::EntityState;
pub use structure::Structure;
