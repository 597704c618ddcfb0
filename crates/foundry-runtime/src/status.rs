//! Operator-facing job status, derived read-only from the frame stack.
//!
//! `status_ladder` never touches the AST: it is meant to be callable against
//! a job's persisted frames alone (e.g. from a read lease while the job is
//! mid-tick elsewhere), so every figure it needs — a scope's child count,
//! its `description`, its `expected_time` — is denormalized onto
//! `ScopeWork` at push time rather than looked up from the script.

use serde::{Deserialize, Serialize};

use crate::frame::{Frame, FrameState};

/// `(percent_complete, scope_kind, scope_metadata)`, computed fresh on every
/// call. Never cached: a job's frames can change between two calls to this
/// function, and a stale percentage is worse than a cheap recompute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// 0.0..=100.0. `0.0` for a job with no scope frames on its stack yet
    /// (not started) or `100.0` once every outer scope has walked off its
    /// last child.
    pub percent_complete: f64,
    /// The innermost active scope's `description`, if the script gave it
    /// one via `begin(description=...)`.
    pub scope_kind: Option<String>,
    /// The innermost active scope's `expected_time` in seconds, if given.
    pub scope_metadata: Option<i64>,
}

impl Default for JobStatus {
    fn default() -> Self {
        JobStatus {
            percent_complete: 0.0,
            scope_kind: None,
            scope_metadata: None,
        }
    }
}

/// Walk the frame stack outermost-first, narrowing a `0.0..100.0` window at
/// each nested `Scope` frame by that scope's `(index, child_count)`. A scope
/// at `index` of `child_count` children occupies `[index/child_count,
/// (index+1)/child_count)` of its parent's window; frames between two scope
/// frames (line, expression, function work) don't change the window, since
/// they are all evaluating that same child and carry no count of their own.
pub fn status_ladder(frames: &[Frame]) -> JobStatus {
    let mut low = 0.0_f64;
    let mut high = 100.0_f64;
    let mut scope_kind = None;
    let mut scope_metadata = None;

    for frame in frames {
        let FrameState::Scope(work) = &frame.state else {
            continue;
        };
        scope_kind = work.description.clone();
        scope_metadata = work.expected_time;

        if work.child_count == 0 {
            // An empty `begin()...end` block: treat as fully spanning
            // whatever window it was given.
            continue;
        }
        let span = high - low;
        let step = span / work.child_count as f64;
        let index = work.index.min(work.child_count) as f64;
        high = low + step * (index + 1.0);
        low += step * index;
    }

    JobStatus {
        percent_complete: low,
        scope_kind,
        scope_metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ScopeWork;
    use chrono::Utc;

    fn scope_frame(index: usize, child_count: usize, description: Option<&str>) -> Frame {
        Frame::new(FrameState::Scope(ScopeWork {
            index,
            started_at: Utc::now(),
            deadline: None,
            description: description.map(str::to_string),
            expected_time: None,
            child_count,
        }))
    }

    #[test]
    fn empty_stack_reports_zero_percent() {
        let status = status_ladder(&[]);
        assert_eq!(status.percent_complete, 0.0);
        assert_eq!(status.scope_kind, None);
    }

    #[test]
    fn single_scope_halfway_through_its_children() {
        // 2 of 4 children already evaluated (index has already advanced past
        // the child currently running), so we're a quarter into child index 2.
        let status = status_ladder(&[scope_frame(2, 4, Some("build"))]);
        assert_eq!(status.percent_complete, 50.0);
        assert_eq!(status.scope_kind.as_deref(), Some("build"));
    }

    #[test]
    fn nested_scope_narrows_the_outer_window() {
        // Outer scope: 1 of 2 children done (window [50, 100)).
        // Inner scope (the child currently running): 1 of 2 of its own
        // children done, i.e. halfway through [50, 100) => 75.
        let frames = vec![scope_frame(1, 2, Some("phase")), scope_frame(1, 2, Some("step"))];
        let status = status_ladder(&frames);
        assert_eq!(status.percent_complete, 75.0);
        assert_eq!(status.scope_kind.as_deref(), Some("step"));
    }

    #[test]
    fn non_scope_frames_are_skipped_without_changing_the_window() {
        use crate::frame::LineWork;
        let frames = vec![scope_frame(0, 2, Some("phase")), Frame::new(FrameState::Line(LineWork::default()))];
        let status = status_ladder(&frames);
        assert_eq!(status.percent_complete, 0.0);
        assert_eq!(status.scope_kind.as_deref(), Some("phase"));
    }

    #[test]
    fn completed_scope_reports_full_window() {
        let status = status_ladder(&[scope_frame(4, 4, Some("build"))]);
        assert_eq!(status.percent_complete, 100.0);
    }
}
