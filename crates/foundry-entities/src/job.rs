//! The job state machine (C8): `BaseJob` plus one wrapper per target kind
//! (`FoundationJob`/`StructureJob`/`DependencyJob`), modeled as composition
//! rather than inheritance. `BaseJob` owns the state machine, the message
//! text, and the append-only audit log (C9); each wrapper adds only the
//! typed FK to its target entity and the `done()` hook that mutates it.
//!
//! This crate never holds a live [`foundry_runtime::Runner`] — `script_runner`
//! is the opaque, versioned blob the runtime crate serializes. Actions that
//! need interpreter-level effects (`rollback`, `clearDispatched`) take the
//! outcome of that effect as an argument instead of driving the interpreter
//! themselves, keeping the entity graph decoupled from the evaluator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use foundry_core::{DependencyId, FoundationId, JobId, SiteId, StructureId};
use foundry_runtime::{status_ladder, Frame, JobStatus};

use crate::dependency::{Dependency, DestroyCascade};
use crate::error::{JobError, JobErrorCode, LifecycleError};
use crate::foundation::Foundation;
use crate::readiness::ScriptKind;
use crate::structure::Structure;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobState {
    Queued,
    Done,
    Paused,
    Error,
    Aborted,
}

/// One row of the append-only history kept alongside a job. Never
/// consulted by any transition rule — purely operator-facing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub at: DateTime<Utc>,
    pub state: JobState,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseJob {
    pub id: JobId,
    pub site: SiteId,
    pub state: JobState,
    pub message: String,
    pub script_name: String,
    /// Opaque, versioned `Runner` checkpoint (see `foundry_runtime::BLOB_VERSION`).
    pub script_runner: Vec<u8>,
    pub log: Vec<LogEntry>,
}

impl BaseJob {
    pub fn new(site: SiteId, script_name: impl Into<String>) -> Self {
        let mut job = BaseJob {
            id: JobId::new(),
            site,
            state: JobState::Queued,
            message: String::new(),
            script_name: script_name.into(),
            script_runner: Vec::new(),
            log: Vec::new(),
        };
        job.transition(JobState::Queued, "created".to_string());
        job
    }

    /// The status ladder is recomputed fresh from the caller's frames on
    /// every call, never cached on the job record itself.
    pub fn status(&self, frames: &[Frame]) -> JobStatus {
        status_ladder(frames)
    }

    fn transition(&mut self, new_state: JobState, message: String) {
        info!(job_id = %self.id, from = ?self.state, to = ?new_state, %message, "job state transition");
        self.state = new_state;
        let message = truncate_chars(message, 1024);
        self.message = message.clone();
        self.log.push(LogEntry {
            at: Utc::now(),
            state: new_state,
            message,
        });
    }

    /// Operator-facing `pause` action.
    pub fn pause(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Queued {
            return Err(JobError::new(JobErrorCode::NotPauseable, format!("job is {:?}, not queued", self.state)));
        }
        self.transition(JobState::Paused, "paused by operator".to_string());
        Ok(())
    }

    /// Operator-facing `resume` action.
    pub fn resume(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Paused {
            return Err(JobError::new(JobErrorCode::NotPaused, format!("job is {:?}, not paused", self.state)));
        }
        self.transition(JobState::Queued, "resumed by operator".to_string());
        Ok(())
    }

    /// Operator-facing `reset` action: precondition is `error`. A
    /// `queued → queued` no-op reset is deliberately not accepted here;
    /// only an errored job can be reset.
    pub fn reset(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Error {
            return Err(JobError::new(JobErrorCode::NotErrored, format!("job is {:?}, not error", self.state)));
        }
        self.transition(JobState::Queued, "reset by operator".to_string());
        Ok(())
    }

    /// Operator-facing `rollback` action. The caller has already driven the runner-level
    /// rollback (`Runner::rollback`, which rotates the cookie) and passes
    /// its result string here; anything other than `"Done"` aborts the job
    /// rather than recovering it.
    pub fn rollback(&mut self, handler_rollback_result: &str) -> Result<(), JobError> {
        if self.state != JobState::Error {
            return Err(JobError::new(JobErrorCode::NotErrored, format!("job is {:?}, not error", self.state)));
        }
        if handler_rollback_result == "Done" {
            self.transition(JobState::Queued, "rolled back by operator".to_string());
        } else {
            self.transition(JobState::Aborted, format!("rollback did not return Done: {handler_rollback_result}"));
        }
        Ok(())
    }

    /// Operator-facing `clearDispatched` action: the dispatch flag itself lives inside the
    /// interpreter's `FrameState::Function` binding (part of
    /// `script_runner`); the caller is expected to have already called
    /// `Runner::clear_dispatched` and reserialized the blob. This records
    /// the action in the audit log without touching `state`.
    pub fn clear_dispatched(&mut self) -> Result<(), JobError> {
        if self.state != JobState::Queued {
            return Err(JobError::new(JobErrorCode::NotErrored, format!("job is {:?}, not queued", self.state)));
        }
        self.log.push(LogEntry {
            at: Utc::now(),
            state: self.state,
            message: "cleared stuck dispatch".to_string(),
        });
        Ok(())
    }

    /// Operator-facing `signalAlert` action: truncates and records the message unconditionally;
    /// only moves `queued`/`paused` jobs to `error` (a job already `done`,
    /// `error`, or `aborted` keeps its terminal/parked state).
    pub fn signal_alert(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        if matches!(self.state, JobState::Queued | JobState::Paused) {
            self.transition(JobState::Error, msg);
        } else {
            self.message = truncate_chars(msg, 1024);
        }
    }

    /// The interpreter reached a terminal `Done` state on its own frame
    /// stack; record it. The actual entity mutation is performed by the
    /// wrapper's `apply_done`, since only it knows which entity setter to
    /// call.
    fn mark_done(&mut self) {
        self.transition(JobState::Done, "completed".to_string());
    }

    /// The interpreter raised a recoverable `ExecutionError`.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.transition(JobState::Error, message.into());
    }

    /// The interpreter raised an unrecoverable kind, or a non-"Done"
    /// rollback result was already reported via `rollback` above.
    pub fn mark_aborted(&mut self, message: impl Into<String>) {
        self.transition(JobState::Aborted, message.into());
    }

    /// A `Pause` control effect (explicit `pause()` builtin or a scope
    /// `max_time` deadline), as opposed to the operator-driven `pause()`
    /// RPC above — same target state, different trigger.
    pub fn mark_paused(&mut self, message: impl Into<String>) {
        self.transition(JobState::Paused, message.into());
    }

    /// A suspension that keeps the job `queued` but updates its surfaced
    /// message (e.g. `Interrupt` from a pending external-function tick,
    /// `delay`'s "waiting for N more seconds", or a TTL `Timeout`) so the
    /// next scheduler tick picks it back up via `JobStore::queued`.
    pub fn mark_queued(&mut self, message: impl Into<String>) {
        self.transition(JobState::Queued, message.into());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoundationJob {
    pub base: BaseJob,
    pub foundation: FoundationId,
}

impl FoundationJob {
    pub fn new(foundation: FoundationId, site: SiteId, script_name: impl Into<String>) -> Self {
        FoundationJob {
            base: BaseJob::new(site, script_name),
            foundation,
        }
    }

    /// The job's terminal `done()` hook. Call once the interpreter's own
    /// frame stack reports terminal completion.
    pub fn apply_done(&mut self, foundation: &mut Foundation, blueprint: &crate::blueprint::Blueprint) -> Result<(), LifecycleError> {
        match ScriptKind::classify(&self.base.script_name) {
            ScriptKind::Destroy => foundation.set_destroyed(self.base.id)?,
            ScriptKind::Create => foundation.set_built(self.base.id, blueprint)?,
            ScriptKind::Other => {}
        }
        self.base.mark_done();
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureJob {
    pub base: BaseJob,
    pub structure: StructureId,
}

impl StructureJob {
    pub fn new(structure: StructureId, site: SiteId, script_name: impl Into<String>) -> Self {
        StructureJob {
            base: BaseJob::new(site, script_name),
            structure,
        }
    }

    /// Symmetric with `FoundationJob::apply_done`.
    pub fn apply_done(&mut self, structure: &mut Structure) -> Result<(), LifecycleError> {
        match ScriptKind::classify(&self.base.script_name) {
            ScriptKind::Destroy => structure.set_destroyed(self.base.id)?,
            ScriptKind::Create => structure.set_built(self.base.id)?,
            ScriptKind::Other => {}
        }
        self.base.mark_done();
        Ok(())
    }
}

/// What `DependencyJob::apply_done` actually did, so the caller can run
/// whatever cascade `Dependency::set_destroyed` reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyDoneOutcome {
    Built,
    Destroyed(DestroyCascade),
    /// The script was neither the dependency's create nor destroy script
    /// ("dependency jobs forbid utility scripts") — the job is marked
    /// `aborted` rather than `done`.
    Rejected,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyJob {
    pub base: BaseJob,
    pub dependency: DependencyId,
}

impl DependencyJob {
    pub fn new(dependency: DependencyId, site: SiteId, script_name: impl Into<String>) -> Self {
        DependencyJob {
            base: BaseJob::new(site, script_name),
            dependency,
        }
    }

    /// The script name must equal `dependency.create_script_name` or
    /// `dependency.destroy_script_name`; otherwise this is rejected —
    /// dependency jobs forbid utility scripts.
    pub fn apply_done(&mut self, dependency: &mut Dependency) -> Result<DependencyDoneOutcome, LifecycleError> {
        let script = &self.base.script_name;
        let is_create = dependency.create_script_name.as_deref() == Some(script.as_str());
        let is_destroy = dependency.destroy_script_name.as_deref() == Some(script.as_str());

        if !is_create && !is_destroy {
            self.base.mark_aborted(format!("{script} matches neither the dependency's create nor destroy script"));
            return Ok(DependencyDoneOutcome::Rejected);
        }

        let outcome = if is_destroy {
            DependencyDoneOutcome::Destroyed(dependency.set_destroyed(self.base.id)?)
        } else {
            dependency.set_built(self.base.id)?;
            DependencyDoneOutcome::Built
        };
        self.base.mark_done();
        Ok(outcome)
    }
}

/// Truncates to at most `max_chars` **characters**, not bytes —
/// `String::truncate` indexes by byte offset and panics if that offset
/// isn't a UTF-8 char boundary, which a multibyte message over the byte
/// limit but under the char limit would hit.
fn truncate_chars(mut s: String, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        s = s.chars().take(max_chars).collect();
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> SiteId {
        SiteId::new("dc1")
    }

    #[test]
    fn pause_resume_round_trip() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        job.base.pause().unwrap();
        assert_eq!(job.base.state, JobState::Paused);
        job.base.resume().unwrap();
        assert_eq!(job.base.state, JobState::Queued);
    }

    #[test]
    fn pause_rejected_unless_queued() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        job.base.pause().unwrap();
        let err = job.base.pause().unwrap_err();
        assert_eq!(err.code, JobErrorCode::NotPauseable);
    }

    #[test]
    fn reset_requires_error_state() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        let err = job.base.reset().unwrap_err();
        assert_eq!(err.code, JobErrorCode::NotErrored);

        job.base.mark_error("boom");
        job.base.reset().unwrap();
        assert_eq!(job.base.state, JobState::Queued);
    }

    #[test]
    fn rollback_non_done_result_aborts() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        job.base.mark_error("boom");
        job.base.rollback("still-running").unwrap();
        assert_eq!(job.base.state, JobState::Aborted);
    }

    #[test]
    fn rollback_done_result_requeues() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        job.base.mark_error("boom");
        job.base.rollback("Done").unwrap();
        assert_eq!(job.base.state, JobState::Queued);
    }

    #[test]
    fn signal_alert_errors_a_queued_job_but_not_a_done_one() {
        let mut job = FoundationJob::new(FoundationId::new(), site(), "create");
        job.base.signal_alert("smoke detected");
        assert_eq!(job.base.state, JobState::Error);
        assert_eq!(job.base.message, "smoke detected");

        let mut done_job = FoundationJob::new(FoundationId::new(), site(), "create");
        done_job.base.mark_done();
        done_job.base.signal_alert("ignored");
        assert_eq!(done_job.base.state, JobState::Done);
        assert_eq!(done_job.base.message, "ignored");
    }

    #[test]
    fn foundation_job_done_hook_builds_foundation() {
        let foundation_id = FoundationId::new();
        let mut job = FoundationJob::new(foundation_id, site(), "create");
        let mut foundation = Foundation::new("f1", site(), crate::blueprint::BlueprintId::new("bp"));
        foundation.active_job = Some(job.base.id);
        let bp = crate::blueprint::Blueprint::new("bp");
        job.apply_done(&mut foundation, &bp).unwrap();
        assert_eq!(foundation.state(), crate::state::EntityState::Built);
        assert_eq!(job.base.state, JobState::Done);
    }

    #[test]
    fn dependency_job_rejects_utility_script() {
        use crate::dependency::{Dependency, Link, Source};
        let mut dependency = Dependency::new(Source::Structure(StructureId::new()), Link::Soft);
        dependency.create_script_name = Some("provision".to_string());
        dependency.destroy_script_name = Some("deprovision".to_string());
        let mut job = DependencyJob::new(dependency.id, site(), "some_utility");
        let outcome = job.apply_done(&mut dependency).unwrap();
        assert_eq!(outcome, DependencyDoneOutcome::Rejected);
        assert_eq!(job.base.state, JobState::Aborted);
    }

    #[test]
    fn dependency_job_destroy_reports_cascade() {
        use crate::dependency::{Dependency, Link, Source};
        let mut dependency = Dependency::new(Source::Structure(StructureId::new()), Link::Hard);
        dependency.create_script_name = Some("provision".to_string());
        dependency.destroy_script_name = Some("deprovision".to_string());
        let foundation = FoundationId::new();
        dependency.foundation = Some(foundation);
        dependency.set_built(JobId::new()).unwrap();

        let mut job = DependencyJob::new(dependency.id, site(), "deprovision");
        let outcome = job.apply_done(&mut dependency).unwrap();
        assert_eq!(outcome, DependencyDoneOutcome::Destroyed(DestroyCascade { destroy_foundation: true, foundation: Some(foundation) }));
    }

    #[test]
    fn signal_alert_truncates_multibyte_message_on_a_char_boundary() {
        let mut job = BaseJob::new(site(), "create");
        let msg: String = std::iter::repeat('\u{1F980}').take(1200).collect();
        job.signal_alert(msg);
        assert_eq!(job.message.chars().count(), 1024);
    }

    #[test]
    fn transition_message_truncates_multibyte_message_on_a_char_boundary() {
        let mut job = BaseJob::new(site(), "create");
        let msg: String = std::iter::repeat('\u{1F980}').take(1200).collect();
        job.mark_error(msg);
        assert_eq!(job.message.chars().count(), 1024);
    }
}
