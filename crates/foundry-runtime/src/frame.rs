//! The execution stack as data. No host recursion holds live state between
//! scheduler ticks: every AST level currently being evaluated has exactly one
//! `Frame` here, and the whole vector is what gets checkpointed.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use foundry_core::Value;
use serde::{Deserialize, Serialize};

/// Which half of a two-phase construct (`while`, `if`/`elif`/`else`) is
/// currently being evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvalStage {
    Condition,
    Expression,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeWork {
    /// Index of the next child to evaluate.
    pub index: usize,
    pub started_at: DateTime<Utc>,
    /// `None` when the scope has no `max_time`. `Some(None)` means `max_time`
    /// is configured but the deadline was just reset (armed to trigger a
    /// `Pause` again on the next check); `Some(Some(t))` is a live deadline.
    pub deadline: Option<Option<DateTime<Utc>>>,
    /// Denormalized from the `begin(...)` options at push time so the
    /// status ladder (`status::status_ladder`) can read progress straight
    /// off the frame stack without the AST in hand — it runs against a
    /// restored job's frames alone.
    pub description: Option<String>,
    pub expected_time: Option<i64>,
    pub child_count: usize,
}

/// `Line` is a genuine stack frame like everything else (no in-place
/// unwrapping): `entered = false` means its child has not been pushed yet;
/// once pushed and re-entered with the child's result, the `Line` frame
/// pops bare (it produces no value of its own).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct LineWork {
    pub entered: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WhileWork {
    pub doing: EvalStage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct IfElseWork {
    pub index: usize,
    pub doing: EvalStage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InfixWork {
    pub left: Option<Value>,
    pub right: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AssignmentWork {
    /// Evaluated subscript index, only used when the target is an
    /// `ArrayMapItem`.
    pub index: Option<Value>,
    pub value: Option<Value>,
}

/// A resolved external-function handler's persisted identity and snapshot.
/// The live `Box<dyn ExternalFunction>` itself is never serialized — only
/// enough to look it up again in the module registry and hand it its own
/// `state` bytes back via `set_state`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HandlerBinding {
    /// `"<builtin>"` for builtins backed by an external function (`delay`),
    /// otherwise the registered module name (post factory-override).
    pub module: String,
    /// At most one outstanding worker dispatch per job; gates `to_worker`.
    pub dispatched: bool,
    /// Last snapshot taken via `ExternalFunction::get_state`.
    pub state: Vec<u8>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FunctionWork {
    /// Evaluated `(name, value)` pairs, in declaration order — a `Vec`
    /// rather than a map so the "next parameter to evaluate" index
    /// (`parameters.len()`) is unambiguous even if two parameters shared a
    /// name, which a map-based accumulator could silently collapse.
    pub parameters: Vec<(String, Value)>,
    pub handler: Option<HandlerBinding>,
}

/// Per-kind partial-evaluation payload. Kinds with no meaningful partial
/// state (`Line`, `JumpPoint`, `Goto`, `Constant`, `Variable`, `Exists`,
/// `Other`) carry none.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum FrameState {
    Line(LineWork),
    Scope(ScopeWork),
    JumpPoint,
    Goto,
    Constant,
    Variable,
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    ArrayMapItem(AssignmentWork),
    Assignment(AssignmentWork),
    Infix(InfixWork),
    Function(FunctionWork),
    While(WhileWork),
    IfElse(IfElseWork),
    Exists,
    Other,
}

/// One level of the checkpointable execution stack. `result` is the return
/// slot read by the parent frame once this one completes; kinds that don't
/// produce a value for their parent (`Line`, `Scope`, `Assignment`, `While`,
/// `IfElse`, `JumpPoint`, `Goto`, `Other`) leave it `None` and are popped
/// without a trace once done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub state: FrameState,
    pub result: Option<Value>,
}

impl Frame {
    pub fn new(state: FrameState) -> Self {
        Frame { state, result: None }
    }

    /// Whether this frame's kind is one of the value-producing kinds that
    /// keeps its slot on the stack (with `result` set) rather than being
    /// popped bare once evaluated.
    pub fn produces_value(&self) -> bool {
        matches!(
            self.state,
            FrameState::Constant
                | FrameState::Variable
                | FrameState::Array(_)
                | FrameState::Map(_)
                | FrameState::ArrayMapItem(_)
                | FrameState::Infix(_)
                | FrameState::Function(_)
                | FrameState::Exists
        )
    }
}
