//! The worker (subcontractor) protocol, `toSubcontractor` hands a
//! queued-but-blocked `FUNCTION` frame's request to the operator's worker
//! pool; `fromSubcontractor` delivers the reply back, gated by the cookie
//! the runner handed out at dispatch time.

use foundry_core::{Cookie, JobId, Value};
use foundry_runtime::Runner;

use crate::error::SchedulerError;

/// One outstanding request for a worker to execute, shaped after wire
/// table: `{job, module, function, cookie, parameters}`.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkOrder {
    pub job: JobId,
    pub module: String,
    pub function: String,
    pub cookie: Cookie,
    pub parameters: Value,
}

/// `toSubcontractor`: surface the pending dispatch, if any, and flip the
/// single-flight `dispatched` bit so a second call before a reply arrives
/// returns `None` rather than handing the same work out twice.
pub fn to_subcontractor(job_id: JobId, runner: &mut Runner<'_>) -> Option<WorkOrder> {
    let module = runner.pending_dispatch_module()?;
    let (function, parameters) = runner.pending_dispatch()?;
    runner.mark_dispatched();
    Some(WorkOrder {
        job: job_id,
        module,
        function,
        cookie: runner.cookie(),
        parameters,
    })
}

/// `fromSubcontractor`: deliver `data` to the frame awaiting it, rejecting
/// on cookie mismatch without mutating anything ("Bad Cookie"
/// scenario).
pub fn from_subcontractor(cookie: Cookie, data: Value, runner: &mut Runner<'_>) -> Result<(), SchedulerError> {
    runner.deliver_worker_reply(cookie, data).map_err(SchedulerError::Dispatch)
}
