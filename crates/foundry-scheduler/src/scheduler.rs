//! The coordinator's tick loop: bounded-concurrency readiness gating,
//! interpreter advancement, terminal-effect cascades, and the thin RPC
//! wrappers around the job action table. A `tokio::time::sleep`-backed
//! poll with `tracing` spans around each tick, driving this crate's
//! job/entity graph rather than a generic pipeline-stage queue.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use foundry_core::{Cookie, JobId, Value};
use foundry_config::CoordinatorConfig;
use foundry_entities::BaseJob;
use foundry_runtime::{Registry, RunOutcome, Runner, ScriptEffect};
use foundry_script::Node;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::cascade;
use crate::dispatch::{self, WorkOrder};
use crate::error::SchedulerError;
use crate::job::AnyJob;
use crate::readiness;
use crate::store::{EntityStore, JobStore};

/// Owns the immutable parts a `Runner` needs to borrow (the script AST
/// catalog and the module registry) plus the two store seams, and drives
/// jobs across them. Cheap to clone: everything it holds is itself an
/// `Arc` or otherwise shareable, so a handle can be passed into as many
/// concurrent tick tasks as `max_concurrent_jobs` allows.
pub struct Scheduler {
    jobs: Arc<dyn JobStore>,
    entities: Arc<dyn EntityStore>,
    scripts: HashMap<String, Node>,
    registry: Registry,
    config: CoordinatorConfig,
}

impl Scheduler {
    pub fn new(jobs: Arc<dyn JobStore>, entities: Arc<dyn EntityStore>, scripts: HashMap<String, Node>, registry: Registry, config: CoordinatorConfig) -> Self {
        Scheduler {
            jobs,
            entities,
            scripts,
            registry,
            config,
        }
    }

    /// One pass: pull every queued job, drop the ones `can_start` still
    /// says no to, and advance the rest concurrently, bounded by
    /// `max_concurrent_jobs` ("`tokio::task` fan-out bounded by a
    /// semaphore" — `buffer_unordered` gives the same bound without
    /// requiring `Runner`'s borrowed AST/registry to be `'static`, which a
    /// raw `tokio::spawn` per job would).
    pub async fn tick(&self) -> Vec<(JobId, Result<(), SchedulerError>)> {
        let queued = self.jobs.queued().await;
        info!(count = queued.len(), "tick: queued jobs");

        let ready = stream::iter(queued)
            .filter_map(|id| async move {
                match self.jobs.load(id).await {
                    Some(job) => match readiness::can_start(&job, self.entities.as_ref()).await {
                        Ok(true) => Some(id),
                        Ok(false) => None,
                        Err(err) => {
                            warn!(job_id = %id, %err, "readiness check failed");
                            None
                        }
                    },
                    None => None,
                }
            })
            .collect::<Vec<_>>()
            .await;

        stream::iter(ready)
            .map(|id| async move { (id, self.advance_one(id).await) })
            .buffer_unordered(self.config.max_concurrent_jobs)
            .collect()
            .await
    }

    /// Run `tick` on `poll_interval` forever. Intended for the coordinator
    /// binary's `main`; tests call `tick` directly instead.
    pub async fn run_forever(&self) -> ! {
        loop {
            let results = self.tick().await;
            for (id, result) in results {
                if let Err(err) = result {
                    warn!(job_id = %id, %err, "job advancement failed");
                }
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Advance one job by a single tick's worth of `ttl` steps, translate
    /// whatever the interpreter yielded into a state transition, persist
    /// the blob, and — on terminal completion — apply the entity-lifecycle
    /// cascade (`crate::cascade`).
    pub async fn advance_one(&self, job_id: JobId) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        let ast = self.scripts.get(&job.base().script_name).ok_or_else(|| SchedulerError::UnknownScript(job.base().script_name.clone()))?;

        let mut runner = self.restore_or_new(ast, &job)?;
        runner.set_ttl(self.config.default_ttl);
        let outcome = runner.run();

        match outcome {
            RunOutcome::Done => {
                job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
                cascade::apply_done(self.entities.as_ref(), &mut job).await?;
            }
            RunOutcome::Suspended(effect) => {
                apply_effect(job.base_mut(), effect);
                job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
            }
        }

        self.jobs.save(job).await;
        Ok(())
    }

    fn restore_or_new<'a>(&'a self, ast: &'a Node, job: &AnyJob) -> Result<Runner<'a>, SchedulerError> {
        if job.base().script_runner.is_empty() {
            Ok(Runner::new(ast, &self.registry, BTreeMap::new()))
        } else {
            let state = Runner::state_from_blob(&job.base().script_runner).map_err(|e| SchedulerError::Blob(e.to_string()))?;
            Ok(Runner::restore(ast, &self.registry, state))
        }
    }

    /// Operator-facing `pause` action.
    pub async fn pause(&self, job_id: JobId) -> Result<(), SchedulerError> {
        self.mutate_base(job_id, |base| base.pause().map_err(Into::into)).await
    }

    /// Operator-facing `resume` action.
    pub async fn resume(&self, job_id: JobId) -> Result<(), SchedulerError> {
        self.mutate_base(job_id, |base| base.resume().map_err(Into::into)).await
    }

    /// Operator-facing `reset` action.
    pub async fn reset(&self, job_id: JobId) -> Result<(), SchedulerError> {
        self.mutate_base(job_id, |base| base.reset().map_err(Into::into)).await
    }

    /// Operator-facing `clearDispatched` action: clears both the audit-log-visible flag
    /// (`BaseJob::clear_dispatched`) and the interpreter-level single-flight
    /// bit living inside the blob.
    pub async fn clear_dispatched(&self, job_id: JobId) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        let ast = self.scripts.get(&job.base().script_name).ok_or_else(|| SchedulerError::UnknownScript(job.base().script_name.clone()))?;
        let mut runner = self.restore_or_new(ast, &job)?;
        runner.clear_dispatched();
        job.base_mut().clear_dispatched()?;
        job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
        self.jobs.save(job).await;
        Ok(())
    }

    /// Operator-facing `rollback` action: drive the interpreter-level rollback (which rotates
    /// the cookie regardless of outcome) and feed its result into
    /// `BaseJob::rollback`'s `"Done"`-or-abort guard.
    pub async fn rollback(&self, job_id: JobId) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        let ast = self.scripts.get(&job.base().script_name).ok_or_else(|| SchedulerError::UnknownScript(job.base().script_name.clone()))?;
        let mut runner = self.restore_or_new(ast, &job)?;
        let result = match runner.rollback() {
            Ok(()) => "Done".to_string(),
            Err(err) => err.to_string(),
        };
        job.base_mut().rollback(&result)?;
        job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
        self.jobs.save(job).await;
        Ok(())
    }

    /// Operator-facing `signalAlert(msg)` action.
    pub async fn signal_alert(&self, job_id: JobId, msg: impl Into<String>) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        job.base_mut().signal_alert(msg);
        self.jobs.save(job).await;
        Ok(())
    }

    async fn mutate_base(&self, job_id: JobId, f: impl FnOnce(&mut BaseJob) -> Result<(), SchedulerError>) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        f(job.base_mut())?;
        self.jobs.save(job).await;
        Ok(())
    }

    /// `toSubcontractor`: hand the next outstanding worker request, if any,
    /// to the caller and flip the single-flight bit.
    pub async fn to_subcontractor(&self, job_id: JobId) -> Result<Option<WorkOrder>, SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        let ast = self.scripts.get(&job.base().script_name).ok_or_else(|| SchedulerError::UnknownScript(job.base().script_name.clone()))?;
        let mut runner = self.restore_or_new(ast, &job)?;
        let order = dispatch::to_subcontractor(job_id, &mut runner);
        if order.is_some() {
            job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
            self.jobs.save(job).await;
        }
        Ok(order)
    }

    /// `fromSubcontractor` / the `signalComplete(cookie)` action.
    pub async fn from_subcontractor(&self, job_id: JobId, cookie: Cookie, data: Value) -> Result<(), SchedulerError> {
        let mut job = self.jobs.load(job_id).await.ok_or(SchedulerError::JobNotFound(job_id))?;
        let ast = self.scripts.get(&job.base().script_name).ok_or_else(|| SchedulerError::UnknownScript(job.base().script_name.clone()))?;
        let mut runner = self.restore_or_new(ast, &job)?;
        dispatch::from_subcontractor(cookie, data, &mut runner)?;
        job.base_mut().script_runner = runner.to_blob().map_err(|e| SchedulerError::Blob(e.to_string()))?;
        self.jobs.save(job).await;
        Ok(())
    }
}

/// Translate a suspension into the corresponding job-state transition.
/// `Goto` never escapes `Runner::run`, so it is not matched here.
fn apply_effect(base: &mut BaseJob, effect: ScriptEffect) {
    match effect {
        ScriptEffect::Pause(msg) => base.mark_paused(msg),
        ScriptEffect::Interrupt(msg) => base.mark_queued(msg),
        ScriptEffect::ExecutionError(msg) => base.mark_error(msg),
        ScriptEffect::Timeout { line_no } => base.mark_queued(format!("tick budget exhausted at line {line_no}, rescheduling")),
        ScriptEffect::ScriptError { msg, line_no } => base.mark_aborted(format!("script error on line {line_no}: {msg}")),
        ScriptEffect::UnrecoverableError { msg, line_no } => {
            base.mark_aborted(format!("unrecoverable error{}: {msg}", line_no.map(|l| format!(" on line {l}")).unwrap_or_default()))
        }
        ScriptEffect::ParameterError { name, msg, line_no } => {
            base.mark_aborted(format!("parameter error \"{name}\"{}: {msg}", line_no.map(|l| format!(" line {l}")).unwrap_or_default()))
        }
        ScriptEffect::NotDefinedError { name, line_no } => {
            base.mark_aborted(format!("not defined \"{name}\"{}", line_no.map(|l| format!(" line {l}")).unwrap_or_default()))
        }
        ScriptEffect::Goto { .. } => unreachable!("Runner::run resolves Goto internally"),
    }
}
