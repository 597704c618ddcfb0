//! The resumable, serializable interpreter (Runner). No host call stack
//! represents script progress: the evaluator decomposes the AST into an
//! explicit, checkpointable [`Frame`] stack and drives it one step at a
//! time, yielding a [`ScriptEffect`] whenever it cannot make further
//! progress without outside input.

pub mod builtins;
pub mod effect;
pub mod external;
pub mod frame;
pub mod operators;
pub mod registry;
pub mod status;

use std::collections::{BTreeMap, HashMap};

use foundry_core::{Cookie, Value};
use foundry_script::{Node, OtherKind};
use serde::{Deserialize, Serialize};

pub use effect::{HandlerPanic, ScriptEffect};
pub use external::{ExternalFunction, RollbackError};
pub use frame::{AssignmentWork, EvalStage, Frame, FrameState, FunctionWork, HandlerBinding, IfElseWork, InfixWork, LineWork, ScopeWork, WhileWork};
pub use registry::{ModuleRegistry, Registry, StaticModule};
pub use status::{status_ladder, JobStatus};

/// Current byte-tag of the persisted blob format ("versioned by a
/// leading tag so the coordinator can refuse unknown versions").
pub const BLOB_VERSION: u8 = 1;

const DEFAULT_TTL: u32 = 1000;

/// What a completed `Runner::run` invocation settled on.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The outermost scope completed; the script ran to completion.
    Done,
    /// A control effect suspended the run — see [`ScriptEffect`] for which.
    Suspended(ScriptEffect),
}

/// The serializable, checkpointable state of one interpreter instance:
/// module names, the frame stack, the variable map, the current line, and
/// the dispatch cookie. The jump-point index and the live node stack are
/// reconstructed on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerState {
    pub module_names: Vec<String>,
    pub frames: Vec<Frame>,
    pub variables: BTreeMap<String, Value>,
    pub cur_line: u32,
    pub cookie: Cookie,
    /// Top-level collapse sentinel once the script finishes or dies
    /// unrecoverably. `None` while still running.
    pub terminal: Option<Terminal>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terminal {
    Done,
    Aborted,
}

/// A tree-walking evaluator whose checkpointable progress lives entirely in
/// [`RunnerState`]. `node_stack` mirrors `state.frames` 1:1 (`node_stack[i]`
/// is the AST node `state.frames[i]` is evaluating) but is never
/// serialized — it is recomputed from `ast` on `restore`, since it is fully
/// determined by the frame stack's own positional fields (`Scope::index`,
/// `IfElse::index`/`doing`, ...).
pub struct Runner<'a> {
    ast: &'a Node,
    registry: &'a Registry,
    state: RunnerState,
    node_stack: Vec<&'a Node>,
    ttl: u32,
    jump_points: HashMap<String, usize>,
}

impl<'a> Runner<'a> {
    /// Start a fresh run of `ast` against `registry`, preloading `variables`.
    pub fn new(ast: &'a Node, registry: &'a Registry, variables: BTreeMap<String, Value>) -> Self {
        let jump_points = index_jump_points(ast);
        Runner {
            ast,
            registry,
            state: RunnerState {
                module_names: registry.module_names(),
                frames: vec![Frame::new(initial_frame_state(ast))],
                variables,
                cur_line: 0,
                cookie: Cookie::new(),
                terminal: None,
            },
            node_stack: vec![ast],
            ttl: DEFAULT_TTL,
            jump_points,
        }
    }

    /// Re-attach a previously serialized state to `ast`/`registry`.
    pub fn restore(ast: &'a Node, registry: &'a Registry, state: RunnerState) -> Self {
        let jump_points = index_jump_points(ast);
        let node_stack = rebuild_node_stack(ast, &state.frames);
        Runner {
            ast,
            registry,
            state,
            node_stack,
            ttl: DEFAULT_TTL,
            jump_points,
        }
    }

    pub fn set_ttl(&mut self, ttl: u32) {
        self.ttl = ttl;
    }

    pub fn cookie(&self) -> Cookie {
        self.state.cookie
    }

    pub fn variables(&self) -> &BTreeMap<String, Value> {
        &self.state.variables
    }

    pub fn cur_line(&self) -> u32 {
        self.state.cur_line
    }

    pub fn frames(&self) -> &[Frame] {
        &self.state.frames
    }

    pub fn is_terminal(&self) -> bool {
        self.state.terminal.is_some()
    }

    pub fn into_state(self) -> RunnerState {
        self.state
    }

    pub fn state(&self) -> &RunnerState {
        &self.state
    }

    /// Serialize to the versioned blob format: a single leading version
    /// byte followed by a `bincode`-encoded [`RunnerState`].
    pub fn to_blob(&self) -> Result<Vec<u8>, bincode::Error> {
        let mut out = vec![BLOB_VERSION];
        out.extend(bincode::serialize(&self.state)?);
        Ok(out)
    }

    /// Deserialize a versioned blob. An unknown leading tag is refused
    /// outright rather than attempting to decode it.
    pub fn state_from_blob(blob: &[u8]) -> Result<RunnerState, BlobError> {
        let Some((&tag, body)) = blob.split_first() else {
            return Err(BlobError::Empty);
        };
        if tag != BLOB_VERSION {
            return Err(BlobError::UnknownVersion(tag));
        }
        bincode::deserialize(body).map_err(BlobError::Decode)
    }

    /// Advance the interpreter until it either completes or hits a
    /// suspension point. Each internal step decrements the TTL; exhaustion
    /// surfaces as `ScriptEffect::Timeout` so the scheduler can reschedule.
    pub fn run(&mut self) -> RunOutcome {
        if self.state.terminal == Some(Terminal::Done) {
            return RunOutcome::Done;
        }
        if self.state.terminal == Some(Terminal::Aborted) {
            return RunOutcome::Suspended(ScriptEffect::ScriptError {
                msg: "run() called after the job already aborted".into(),
                line_no: self.state.cur_line,
            });
        }

        let mut budget = self.ttl;
        loop {
            if budget == 0 {
                return RunOutcome::Suspended(ScriptEffect::Timeout { line_no: self.state.cur_line });
            }
            budget -= 1;

            match self.step() {
                Ok(Some(())) => {
                    self.state.terminal = Some(Terminal::Done);
                    return RunOutcome::Done;
                }
                Ok(None) => continue,
                Err(ScriptEffect::Goto { label, line_no }) => match self.jump_points.get(&label).copied() {
                    Some(index) => {
                        self.goto_index(index);
                        continue;
                    }
                    None => {
                        self.state.terminal = Some(Terminal::Aborted);
                        return RunOutcome::Suspended(ScriptEffect::NotDefinedError {
                            name: label,
                            line_no: Some(line_no),
                        });
                    }
                },
                Err(ScriptEffect::NotDefinedError { name, line_no }) => {
                    if self.catch_in_exists() {
                        continue;
                    }
                    self.state.terminal = Some(Terminal::Aborted);
                    return RunOutcome::Suspended(ScriptEffect::NotDefinedError { name, line_no });
                }
                Err(effect) => {
                    if !effect.is_recoverable() {
                        self.state.terminal = Some(Terminal::Aborted);
                    }
                    return RunOutcome::Suspended(effect);
                }
            }
        }
    }

    /// Rewrite the frame/node stack to the top-level scope starting at
    /// `child_index`, per `GOTO` handling.
    fn goto_index(&mut self, child_index: usize) {
        let Node::Scope(scope) = self.ast else {
            unreachable!("program root is always a Scope node");
        };
        self.state.frames = vec![Frame::new(FrameState::Scope(ScopeWork {
            index: child_index,
            started_at: chrono::Utc::now(),
            deadline: None,
            description: scope.options.description.clone(),
            expected_time: scope.options.expected_time,
            child_count: scope.children.len(),
        }))];
        self.node_stack = vec![self.ast];
    }

    /// `EXISTS` must convert a `NotDefinedError` raised anywhere while
    /// evaluating its child subtree (arbitrarily many frames deep) into
    /// `false`. Search the stack from the top down for the nearest `Exists`
    /// frame; if found, collapse everything above and including it to a
    /// single `Bool(false)` result on its parent and resume. Returns
    /// `false` (propagate as a real error) if no enclosing `Exists` exists.
    fn catch_in_exists(&mut self) -> bool {
        let Some(k) = self.state.frames.iter().rposition(|f| matches!(f.state, FrameState::Exists)) else {
            return false;
        };
        self.state.frames.truncate(k);
        self.node_stack.truncate(k);
        if let Some(parent) = self.state.frames.last_mut() {
            parent.result = Some(Value::Bool(false));
        } else {
            // `exists(...)` was itself the outermost node; nothing to
            // resume into but the script body, which is empty here.
            self.state.frames.push(Frame::new(FrameState::Other));
            self.node_stack.push(self.ast);
        }
        true
    }

    /// Deliver a matched worker reply to the function frame awaiting it.
    /// Rejects a reply whose cookie does not match the runner's current
    /// cookie without mutating any state, preserving the cookie-freshness
    /// invariant.
    pub fn deliver_worker_reply(&mut self, cookie: Cookie, data: Value) -> Result<(), String> {
        if cookie != self.state.cookie {
            return Err("Bad Cookie".to_string());
        }
        let Some((frame_idx, node)) = self
            .state
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| matches!(f.state, FrameState::Function(_)))
            .map(|(i, _)| (i, self.node_stack[i]))
        else {
            return Err("No outstanding dispatch".to_string());
        };
        let Node::Function { module, name, .. } = node else {
            return Err("No outstanding dispatch".to_string());
        };
        let module_name = module.clone().unwrap_or_else(|| registry::BUILTIN_MODULE.to_string());
        let name = name.clone();

        let FrameState::Function(work) = &mut self.state.frames[frame_idx].state else {
            unreachable!()
        };
        let binding = work.handler.as_mut().ok_or("No outstanding dispatch")?;
        if !binding.dispatched {
            return Err("No outstanding dispatch".to_string());
        }

        let module_reg = self.registry.module(&module_name).ok_or("module no longer registered")?;
        let mut handler = module_reg.call_external(&name).ok_or("handler no longer registered")?;
        handler.set_state(&binding.state);
        handler.from_worker(data)?;
        binding.state = handler.get_state();
        binding.dispatched = false;
        Ok(())
    }

    /// Perform exactly one unit of evaluator work.
    fn step(&mut self) -> Result<Option<()>, ScriptEffect> {
        let node = *self.node_stack.last().unwrap();
        let state = self.state.frames.last().unwrap().state.clone();
        match state {
            FrameState::Line(work) => self.step_line(node, work),
            FrameState::Scope(work) => self.step_scope(node, work),
            FrameState::JumpPoint => self.pop_bare(),
            FrameState::Goto => self.step_goto(node),
            FrameState::Constant => self.step_constant(node),
            FrameState::Variable => self.step_variable(node),
            FrameState::Array(collected) => self.step_array(node, collected),
            FrameState::Map(collected) => self.step_map(node, collected),
            FrameState::ArrayMapItem(work) => self.step_array_map_item(node, work),
            FrameState::Assignment(work) => self.step_assignment(node, work),
            FrameState::Infix(work) => self.step_infix(node, work),
            FrameState::Function(work) => self.step_function(node, work),
            FrameState::While(work) => self.step_while(node, work),
            FrameState::IfElse(work) => self.step_ifelse(node, work),
            FrameState::Exists => self.step_exists(node),
            FrameState::Other => self.step_other(node),
        }
    }

    fn push(&mut self, node: &'a Node, state: FrameState) {
        self.state.frames.push(Frame::new(state));
        self.node_stack.push(node);
    }

    fn pop_bare(&mut self) -> Result<Option<()>, ScriptEffect> {
        self.state.frames.pop();
        self.node_stack.pop();
        if self.state.frames.is_empty() {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }

    fn pop_with_result(&mut self, value: Value) -> Result<Option<()>, ScriptEffect> {
        self.state.frames.pop();
        self.node_stack.pop();
        if let Some(parent) = self.state.frames.last_mut() {
            parent.result = Some(value);
        }
        if self.state.frames.is_empty() {
            Ok(Some(()))
        } else {
            Ok(None)
        }
    }

    /// Harvest a just-finished child's result once it has been popped and
    /// folded into the now-top frame's `result` slot.
    fn take_pending_result(&mut self) -> Option<Value> {
        self.state.frames.last_mut().unwrap().result.take()
    }

    fn update_top(&mut self, state: FrameState) {
        self.state.frames.last_mut().unwrap().state = state;
    }

    fn step_line(&mut self, node: &'a Node, work: LineWork) -> Result<Option<()>, ScriptEffect> {
        let Node::Line { line_no, child } = node else {
            return script_error("expected Line node", self.state.cur_line);
        };
        if !work.entered {
            self.state.cur_line = *line_no;
            self.update_top(FrameState::Line(LineWork { entered: true }));
            self.push(child, initial_frame_state(child));
            Ok(None)
        } else {
            let _ = self.take_pending_result();
            self.pop_bare()
        }
    }

    fn step_scope(&mut self, node: &'a Node, mut work: ScopeWork) -> Result<Option<()>, ScriptEffect> {
        let Node::Scope(scope) = node else {
            return script_error("expected Scope node", self.state.cur_line);
        };
        let _ = self.take_pending_result();

        if let Some(max_time) = scope.options.max_time {
            let deadline = *work.deadline.get_or_insert_with(|| Some(work.started_at + chrono::Duration::seconds(max_time)));
            if let Some(deadline) = deadline {
                if chrono::Utc::now() >= deadline {
                    work.deadline = Some(None);
                    self.update_top(FrameState::Scope(work));
                    return Err(ScriptEffect::Pause("Max Time Elapsed".to_string()));
                }
            }
        }

        if work.index >= scope.children.len() {
            self.update_top(FrameState::Scope(work));
            return self.pop_bare();
        }

        let child_index = work.index;
        work.index += 1;
        self.update_top(FrameState::Scope(work));
        self.push(&scope.children[child_index], initial_frame_state(&scope.children[child_index]));
        Ok(None)
    }

    fn step_goto(&mut self, node: &'a Node) -> Result<Option<()>, ScriptEffect> {
        let Node::Goto { label, line_no } = node else {
            return script_error("expected Goto node", self.state.cur_line);
        };
        Err(ScriptEffect::Goto {
            label: label.clone(),
            line_no: *line_no,
        })
    }

    fn step_constant(&mut self, node: &'a Node) -> Result<Option<()>, ScriptEffect> {
        let Node::Constant(v) = node else {
            return script_error("expected Constant node", self.state.cur_line);
        };
        self.pop_with_result(v.clone())
    }

    fn step_variable(&mut self, node: &'a Node) -> Result<Option<()>, ScriptEffect> {
        let Node::Variable { module, name } = node else {
            return script_error("expected Variable node", self.state.cur_line);
        };
        let value = self.read_binding(module.as_deref(), name)?;
        self.pop_with_result(value)
    }

    fn read_binding(&self, module: Option<&str>, name: &str) -> Result<Value, ScriptEffect> {
        match module {
            None => self.state.variables.get(name).cloned().ok_or_else(|| ScriptEffect::NotDefinedError {
                name: name.to_string(),
                line_no: Some(self.state.cur_line),
            }),
            Some(m) => {
                let module_reg = self.registry.module(m).ok_or_else(|| ScriptEffect::NotDefinedError {
                    name: m.to_string(),
                    line_no: Some(self.state.cur_line),
                })?;
                let getter = module_reg.getter(name).ok_or_else(|| ScriptEffect::ParameterError {
                    name: name.to_string(),
                    msg: format!("{m}.{name} is not gettable"),
                    line_no: Some(self.state.cur_line),
                })?;
                getter()
            }
        }
    }

    fn write_binding(&mut self, module: Option<&str>, name: &str, value: Value) -> Result<(), ScriptEffect> {
        match module {
            None => {
                self.state.variables.insert(name.to_string(), value);
                Ok(())
            }
            Some(m) => {
                let module_reg = self.registry.module(m).ok_or_else(|| ScriptEffect::NotDefinedError {
                    name: m.to_string(),
                    line_no: Some(self.state.cur_line),
                })?;
                let setter = module_reg.setter(name).ok_or_else(|| ScriptEffect::ParameterError {
                    name: name.to_string(),
                    msg: format!("{m}.{name} is not settable"),
                    line_no: Some(self.state.cur_line),
                })?;
                setter(&value)
            }
        }
    }

    fn step_array(&mut self, node: &'a Node, mut collected: Vec<Value>) -> Result<Option<()>, ScriptEffect> {
        let Node::Array(items) = node else {
            return script_error("expected Array node", self.state.cur_line);
        };
        if let Some(v) = self.take_pending_result() {
            collected.push(v);
        }
        let idx = collected.len();
        if idx >= items.len() {
            return self.pop_with_result(Value::Array(collected));
        }
        self.update_top(FrameState::Array(collected));
        self.push(&items[idx], initial_frame_state(&items[idx]));
        Ok(None)
    }

    fn step_map(&mut self, node: &'a Node, mut collected: BTreeMap<String, Value>) -> Result<Option<()>, ScriptEffect> {
        let Node::Map(entries) = node else {
            return script_error("expected Map node", self.state.cur_line);
        };
        if let Some(v) = self.take_pending_result() {
            let key = &entries[collected.len()].0;
            collected.insert(key.clone(), v);
        }
        let idx = collected.len();
        if idx >= entries.len() {
            return self.pop_with_result(Value::Map(collected));
        }
        self.update_top(FrameState::Map(collected));
        self.push(&entries[idx].1, initial_frame_state(&entries[idx].1));
        Ok(None)
    }

    fn step_array_map_item(&mut self, node: &'a Node, mut work: AssignmentWork) -> Result<Option<()>, ScriptEffect> {
        let Node::ArrayMapItem { module, name, index } = node else {
            return script_error("expected ArrayMapItem node", self.state.cur_line);
        };
        if work.index.is_none() {
            if let Some(v) = self.take_pending_result() {
                work.index = Some(v);
            } else {
                self.update_top(FrameState::ArrayMapItem(work));
                self.push(index, initial_frame_state(index));
                return Ok(None);
            }
        }
        let index_value = work.index.clone().unwrap();
        let container = self.read_binding(module.as_deref(), name)?;
        let result = index_into(&container, &index_value, self.state.cur_line)?;
        self.pop_with_result(result)
    }

    fn step_assignment(&mut self, node: &'a Node, mut work: AssignmentWork) -> Result<Option<()>, ScriptEffect> {
        let Node::Assignment { target, value } = node else {
            return script_error("expected Assignment node", self.state.cur_line);
        };

        if let Node::ArrayMapItem { index, .. } = &**target {
            if work.index.is_none() {
                if let Some(v) = self.take_pending_result() {
                    work.index = Some(v);
                } else {
                    self.update_top(FrameState::Assignment(work));
                    self.push(index, initial_frame_state(index));
                    return Ok(None);
                }
            }
        }

        if work.value.is_none() {
            if let Some(v) = self.take_pending_result() {
                work.value = Some(v);
            } else {
                self.update_top(FrameState::Assignment(work));
                self.push(value, initial_frame_state(value));
                return Ok(None);
            }
        }

        let value = work.value.clone().unwrap();
        match &**target {
            Node::Variable { module, name } => {
                self.write_binding(module.as_deref(), name, value)?;
            }
            Node::ArrayMapItem { module, name, .. } => {
                if module.is_some() {
                    return Err(ScriptEffect::ScriptError {
                        msg: "subscript assignment target must not have a module prefix".into(),
                        line_no: self.state.cur_line,
                    });
                }
                let mut container = self.state.variables.get(name).cloned().ok_or_else(|| ScriptEffect::NotDefinedError {
                    name: name.clone(),
                    line_no: Some(self.state.cur_line),
                })?;
                assign_into(&mut container, work.index.clone().unwrap(), value, self.state.cur_line)?;
                self.state.variables.insert(name.clone(), container);
            }
            _ => {
                return Err(ScriptEffect::ScriptError {
                    msg: "assignment target must be a variable or subscript".into(),
                    line_no: self.state.cur_line,
                });
            }
        }
        self.pop_bare()
    }

    fn step_infix(&mut self, node: &'a Node, mut work: InfixWork) -> Result<Option<()>, ScriptEffect> {
        let Node::Infix { operator, left, right } = node else {
            return script_error("expected Infix node", self.state.cur_line);
        };
        if work.left.is_none() {
            if let Some(v) = self.take_pending_result() {
                work.left = Some(v);
            } else {
                self.update_top(FrameState::Infix(work));
                self.push(left, initial_frame_state(left));
                return Ok(None);
            }
        }
        if work.right.is_none() {
            if let Some(v) = self.take_pending_result() {
                work.right = Some(v);
            } else {
                self.update_top(FrameState::Infix(work));
                self.push(right, initial_frame_state(right));
                return Ok(None);
            }
        }
        let result = operators::apply(*operator, work.left.as_ref().unwrap(), work.right.as_ref().unwrap(), self.state.cur_line)?;
        self.pop_with_result(result)
    }

    fn step_while(&mut self, node: &'a Node, work: WhileWork) -> Result<Option<()>, ScriptEffect> {
        let Node::While { condition, expression } = node else {
            return script_error("expected While node", self.state.cur_line);
        };
        match work.doing {
            EvalStage::Condition => {
                if let Some(v) = self.take_pending_result() {
                    if v.is_truthy() {
                        self.update_top(FrameState::While(WhileWork { doing: EvalStage::Expression }));
                        self.push(expression, initial_frame_state(expression));
                    } else {
                        return self.pop_bare();
                    }
                } else {
                    self.update_top(FrameState::While(work));
                    self.push(condition, initial_frame_state(condition));
                }
                Ok(None)
            }
            EvalStage::Expression => {
                let _ = self.take_pending_result();
                self.update_top(FrameState::While(WhileWork { doing: EvalStage::Condition }));
                self.push(condition, initial_frame_state(condition));
                Ok(None)
            }
        }
    }

    fn step_ifelse(&mut self, node: &'a Node, work: IfElseWork) -> Result<Option<()>, ScriptEffect> {
        let Node::IfElse(branches) = node else {
            return script_error("expected IfElse node", self.state.cur_line);
        };
        if work.index >= branches.len() {
            let _ = self.take_pending_result();
            return self.pop_bare();
        }
        let branch = &branches[work.index];
        match work.doing {
            EvalStage::Condition => match &branch.condition {
                None => {
                    self.update_top(FrameState::IfElse(IfElseWork {
                        index: work.index,
                        doing: EvalStage::Expression,
                    }));
                    self.push(&branch.expression, initial_frame_state(&branch.expression));
                    Ok(None)
                }
                Some(cond) => {
                    if let Some(v) = self.take_pending_result() {
                        if v.is_truthy() {
                            self.update_top(FrameState::IfElse(IfElseWork {
                                index: work.index,
                                doing: EvalStage::Expression,
                            }));
                            self.push(&branch.expression, initial_frame_state(&branch.expression));
                        } else {
                            self.update_top(FrameState::IfElse(IfElseWork {
                                index: work.index + 1,
                                doing: EvalStage::Condition,
                            }));
                        }
                        Ok(None)
                    } else {
                        self.update_top(FrameState::IfElse(work));
                        self.push(cond, initial_frame_state(cond));
                        Ok(None)
                    }
                }
            },
            EvalStage::Expression => {
                let _ = self.take_pending_result();
                self.pop_bare()
            }
        }
    }

    fn step_exists(&mut self, node: &'a Node) -> Result<Option<()>, ScriptEffect> {
        let Node::Exists(child) = node else {
            return script_error("expected Exists node", self.state.cur_line);
        };
        if self.take_pending_result().is_some() {
            // Reaching here at all means the child evaluated without a
            // `NotDefinedError` bubbling past it (that case is caught in
            // `run()`'s loop via `catch_in_exists` before `step` resumes).
            return self.pop_with_result(Value::Bool(true));
        }
        self.push(child, initial_frame_state(child));
        Ok(None)
    }

    fn step_other(&mut self, node: &'a Node) -> Result<Option<()>, ScriptEffect> {
        let Node::Other(kind) = node else {
            return script_error("expected Other node", self.state.cur_line);
        };
        match kind {
            OtherKind::Pass | OtherKind::Continue | OtherKind::Break => self.pop_bare(),
        }
    }

    fn step_function(&mut self, node: &'a Node, mut work: FunctionWork) -> Result<Option<()>, ScriptEffect> {
        let Node::Function { module, name, parameters } = node else {
            return script_error("expected Function node", self.state.cur_line);
        };

        if let Some(v) = self.take_pending_result() {
            let idx = work.parameters.len();
            work.parameters.push((parameters[idx].0.clone(), v));
        }
        let idx = work.parameters.len();
        if idx < parameters.len() {
            self.update_top(FrameState::Function(work));
            self.push(&parameters[idx].1, initial_frame_state(&parameters[idx].1));
            return Ok(None);
        }

        if module.is_none() {
            if let Some(outcome) = self.try_mutating_builtin(name, parameters, &work.parameters) {
                return outcome;
            }
        }

        let params_map: BTreeMap<String, Value> = work.parameters.iter().cloned().collect();

        if work.handler.is_none() {
            self.update_top(FrameState::Function(work));
            return self.setup_function(module.as_deref(), name, params_map);
        }

        self.update_top(FrameState::Function(work));
        self.drive_handler(module.as_deref(), name)
    }

    /// `append`/`pop` mutate a live variable slot rather than computing a
    /// pure value (see `builtins::MUTATING_BUILTINS`); the interpreter
    /// resolves them against `self.state.variables` directly instead of
    /// going through the registry.
    fn try_mutating_builtin(&mut self, name: &str, ast_params: &[(String, Node)], values: &[(String, Value)]) -> Option<Result<Option<()>, ScriptEffect>> {
        if !builtins::MUTATING_BUILTINS.contains(&name) {
            return None;
        }
        let array_node = ast_params.iter().find(|(k, _)| k == "array").map(|(_, v)| v);
        let Some(Node::Variable { module: None, name: var_name }) = array_node else {
            return Some(Err(ScriptEffect::ParameterError {
                name: "array".to_string(),
                msg: format!("{name}() target must be a plain local variable"),
                line_no: Some(self.state.cur_line),
            }));
        };
        let var_name = var_name.clone();
        let Some(mut target) = self.state.variables.remove(&var_name) else {
            return Some(Err(ScriptEffect::NotDefinedError {
                name: var_name,
                line_no: Some(self.state.cur_line),
            }));
        };

        let result = match name {
            "append" => {
                let value = values.iter().find(|(k, _)| k == "value").map(|(_, v)| v.clone()).unwrap_or(Value::None);
                builtins::append_into(&mut target, value)
            }
            "pop" => {
                let index = values
                    .iter()
                    .find(|(k, _)| k == "index")
                    .and_then(|(_, v)| match v {
                        Value::Int(i) => Some(*i),
                        Value::Bool(b) => Some(*b as i64),
                        _ => None,
                    })
                    .unwrap_or(-1);
                builtins::pop_from(&mut target, index)
            }
            _ => unreachable!("MUTATING_BUILTINS only lists append/pop"),
        };
        self.state.variables.insert(var_name, target);
        Some(match result {
            Ok(v) => self.pop_with_result(v),
            Err(e) => Err(annotate_line(e, self.state.cur_line)),
        })
    }

    fn setup_function(&mut self, module: Option<&str>, name: &str, params_map: BTreeMap<String, Value>) -> Result<Option<()>, ScriptEffect> {
        let module_name = module.unwrap_or(registry::BUILTIN_MODULE);
        let module_reg = self.registry.module(module_name).ok_or_else(|| ScriptEffect::NotDefinedError {
            name: module_name.to_string(),
            line_no: Some(self.state.cur_line),
        })?;

        if !module_reg.is_external(name) {
            let hash_params: HashMap<String, Value> = params_map.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let result = module_reg.call_value(name, &hash_params).ok_or_else(|| ScriptEffect::NotDefinedError {
                name: name.to_string(),
                line_no: Some(self.state.cur_line),
            })?;
            return match result {
                Ok(v) => self.pop_with_result(v),
                Err(e) => Err(annotate_line(e, self.state.cur_line)),
            };
        }

        let mut handler = module_reg.call_external(name).ok_or_else(|| ScriptEffect::NotDefinedError {
            name: name.to_string(),
            line_no: Some(self.state.cur_line),
        })?;
        handler.setup(&params_map).map_err(|e| annotate_line(e, self.state.cur_line))?;
        self.state.cookie = Cookie::new();

        let FrameState::Function(work) = &mut self.state.frames.last_mut().unwrap().state else {
            unreachable!()
        };
        work.handler = Some(HandlerBinding {
            module: module_name.to_string(),
            dispatched: false,
            state: handler.get_state(),
        });
        self.drive_handler_instance(&mut *handler)
    }

    fn drive_handler(&mut self, module: Option<&str>, name: &str) -> Result<Option<()>, ScriptEffect> {
        let module_name = module.unwrap_or(registry::BUILTIN_MODULE);
        let module_reg = self.registry.module(module_name).ok_or_else(|| ScriptEffect::NotDefinedError {
            name: module_name.to_string(),
            line_no: Some(self.state.cur_line),
        })?;
        let mut handler = module_reg.call_external(name).ok_or_else(|| ScriptEffect::NotDefinedError {
            name: name.to_string(),
            line_no: Some(self.state.cur_line),
        })?;
        let FrameState::Function(work) = &self.state.frames.last().unwrap().state else {
            unreachable!()
        };
        let binding = work.handler.as_ref().unwrap();
        handler.set_state(&binding.state);
        self.drive_handler_instance(&mut *handler)
    }

    /// Shared tail of `setup_function`/`drive_handler`: poll `done`, either
    /// yield an `Interrupt` after ticking `run()` or read+pop `value()`.
    fn drive_handler_instance(&mut self, handler: &mut dyn ExternalFunction) -> Result<Option<()>, ScriptEffect> {
        if !handler.done() {
            handler.run().map_err(|e| annotate_line(e, self.state.cur_line))?;
            self.save_handler_state(handler);
            return Err(ScriptEffect::Interrupt(handler.message()));
        }
        let value = handler.value().map_err(|e| annotate_line(e, self.state.cur_line))?;
        self.save_handler_state(handler);
        self.pop_with_result(value)
    }

    fn save_handler_state(&mut self, handler: &dyn ExternalFunction) {
        if let FrameState::Function(work) = &mut self.state.frames.last_mut().unwrap().state {
            if let Some(binding) = work.handler.as_mut() {
                binding.state = handler.get_state();
            }
        }
    }

    /// Produce the `(func_name, params)` a `FUNCTION` frame's handler wants
    /// dispatched to a worker, if any, gating on the single-flight
    /// `dispatched` flag. Used by the scheduler's `toSubcontractor`.
    pub fn pending_dispatch(&self) -> Option<(String, Value)> {
        let (frame_idx, node) = self
            .state
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| matches!(f.state, FrameState::Function(_)))
            .map(|(i, _)| (i, self.node_stack[i]))?;
        let FrameState::Function(work) = &self.state.frames[frame_idx].state else {
            unreachable!()
        };
        let binding = work.handler.as_ref()?;
        if binding.dispatched {
            return None;
        }
        let Node::Function { module, name, .. } = node else { return None };
        let module_name = module.clone().unwrap_or_else(|| registry::BUILTIN_MODULE.to_string());
        let module_reg = self.registry.module(&module_name)?;
        let mut handler = module_reg.call_external(name)?;
        handler.set_state(&binding.state);
        handler.to_worker()
    }

    /// Companion to `pending_dispatch`: the module name the handler was
    /// resolved from, for the worker-protocol request's `module` field.
    /// `None` under the same conditions `pending_dispatch` returns
    /// `None`.
    pub fn pending_dispatch_module(&self) -> Option<String> {
        let (frame_idx, node) = self
            .state
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| matches!(f.state, FrameState::Function(_)))
            .map(|(i, _)| (i, self.node_stack[i]))?;
        let FrameState::Function(work) = &self.state.frames[frame_idx].state else {
            unreachable!()
        };
        let binding = work.handler.as_ref()?;
        if binding.dispatched {
            return None;
        }
        let Node::Function { module, .. } = node else { return None };
        Some(module.clone().unwrap_or_else(|| registry::BUILTIN_MODULE.to_string()))
    }

    /// Mark the pending dispatch as sent, so a second call before a reply
    /// arrives yields `None` (the single-flight invariant).
    pub fn mark_dispatched(&mut self) {
        if let Some(frame) = self.state.frames.iter_mut().rev().find(|f| matches!(f.state, FrameState::Function(_))) {
            if let FrameState::Function(work) = &mut frame.state {
                if let Some(binding) = work.handler.as_mut() {
                    binding.dispatched = true;
                }
            }
        }
    }

    /// Clear a stuck dispatch without advancing state — the operator-facing
    /// `clearDispatched` recovery path for "worker lost the task".
    pub fn clear_dispatched(&mut self) {
        if let Some(frame) = self.state.frames.iter_mut().rev().find(|f| matches!(f.state, FrameState::Function(_))) {
            if let FrameState::Function(work) = &mut frame.state {
                if let Some(binding) = work.handler.as_mut() {
                    binding.dispatched = false;
                }
            }
        }
    }

    /// Roll back the innermost outstanding function frame's handler.
    /// Rotates the cookie unconditionally, per the dispatcher's single-flight
    /// invariant.
    pub fn rollback(&mut self) -> Result<(), RollbackError> {
        self.state.cookie = Cookie::new();
        let Some((frame_idx, node)) = self
            .state
            .frames
            .iter()
            .enumerate()
            .rev()
            .find(|(_, f)| matches!(f.state, FrameState::Function(_)))
            .map(|(i, _)| (i, self.node_stack[i]))
        else {
            return Err(RollbackError::NotPossible);
        };
        let Node::Function { module, name, .. } = node else {
            return Err(RollbackError::NotPossible);
        };
        let module_name = module.clone().unwrap_or_else(|| registry::BUILTIN_MODULE.to_string());
        let module_reg = self.registry.module(&module_name).ok_or(RollbackError::NotPossible)?;
        let mut handler = module_reg.call_external(name).ok_or(RollbackError::NotPossible)?;

        let FrameState::Function(work) = &mut self.state.frames[frame_idx].state else {
            unreachable!()
        };
        let binding = work.handler.as_mut().ok_or(RollbackError::NotPossible)?;
        handler.set_state(&binding.state);
        handler.rollback()?;
        binding.state = handler.get_state();
        binding.dispatched = false;
        Ok(())
    }
}

fn annotate_line(effect: ScriptEffect, line_no: u32) -> ScriptEffect {
    match effect {
        ScriptEffect::ParameterError { name, msg, line_no: None } => ScriptEffect::ParameterError {
            name,
            msg,
            line_no: Some(line_no),
        },
        ScriptEffect::NotDefinedError { name, line_no: None } => ScriptEffect::NotDefinedError { name, line_no: Some(line_no) },
        ScriptEffect::UnrecoverableError { msg, line_no: None } => ScriptEffect::UnrecoverableError { msg, line_no: Some(line_no) },
        other => other,
    }
}

fn script_error<T>(msg: &str, line_no: u32) -> Result<T, ScriptEffect> {
    Err(ScriptEffect::ScriptError { msg: msg.to_string(), line_no })
}

fn initial_frame_state(node: &Node) -> FrameState {
    match node {
        Node::Line { .. } => FrameState::Line(LineWork::default()),
        Node::Scope(scope) => FrameState::Scope(ScopeWork {
            index: 0,
            started_at: chrono::Utc::now(),
            deadline: None,
            description: scope.options.description.clone(),
            expected_time: scope.options.expected_time,
            child_count: scope.children.len(),
        }),
        Node::JumpPoint { .. } => FrameState::JumpPoint,
        Node::Goto { .. } => FrameState::Goto,
        Node::Constant(_) => FrameState::Constant,
        Node::Variable { .. } => FrameState::Variable,
        Node::ArrayMapItem { .. } => FrameState::ArrayMapItem(AssignmentWork::default()),
        Node::Array(_) => FrameState::Array(Vec::new()),
        Node::Map(_) => FrameState::Map(BTreeMap::new()),
        Node::Function { .. } => FrameState::Function(FunctionWork::default()),
        Node::Assignment { .. } => FrameState::Assignment(AssignmentWork::default()),
        Node::Infix { .. } => FrameState::Infix(InfixWork::default()),
        Node::While { .. } => FrameState::While(WhileWork { doing: EvalStage::Condition }),
        Node::IfElse(_) => FrameState::IfElse(IfElseWork {
            index: 0,
            doing: EvalStage::Condition,
        }),
        Node::Exists(_) => FrameState::Exists,
        Node::Other(_) => FrameState::Other,
    }
}

/// Given `node` and the `FrameState` the *next* (child) frame was pushed
/// with from within `node`'s own step function, resolve the child AST node.
/// Mirrors every `push(...)` call site above exactly, so `restore` can
/// recompute the node stack instead of serializing it. Only called with
/// structural frame kinds that do push a child (anything mid-evaluation);
/// a leaf kind paired with a deeper frame indicates a corrupted blob.
fn child_node_of<'a>(node: &'a Node, state: &FrameState) -> Option<&'a Node> {
    match (node, state) {
        (Node::Line { child, .. }, FrameState::Line(_)) => Some(child),
        (Node::Scope(scope), FrameState::Scope(work)) => scope.children.get(work.index.checked_sub(1)?),
        (Node::While { condition, expression }, FrameState::While(work)) => Some(match work.doing {
            EvalStage::Condition => condition,
            EvalStage::Expression => expression,
        }),
        (Node::IfElse(branches), FrameState::IfElse(work)) => {
            let branch = branches.get(work.index)?;
            Some(match (work.doing, &branch.condition) {
                (EvalStage::Condition, Some(c)) => c,
                _ => &branch.expression,
            })
        }
        (Node::Array(items), FrameState::Array(collected)) => items.get(collected.len()),
        (Node::Map(entries), FrameState::Map(collected)) => entries.get(collected.len()).map(|(_, v)| v),
        (Node::ArrayMapItem { index, .. }, FrameState::ArrayMapItem(work)) if work.index.is_none() => Some(index),
        (Node::Assignment { target, value }, FrameState::Assignment(work)) => {
            if let Node::ArrayMapItem { index, .. } = &**target {
                if work.index.is_none() {
                    return Some(index);
                }
            }
            if work.value.is_none() {
                return Some(value);
            }
            None
        }
        (Node::Exists(child), FrameState::Exists) => Some(child),
        (Node::Function { parameters, .. }, FrameState::Function(work)) => parameters.get(work.parameters.len()).map(|(_, v)| v),
        _ => None,
    }
}

/// Walk the top-level scope's children, recording each jump label's child
/// index so `GOTO` can rewrite the frame stack directly to that position.
fn index_jump_points(ast: &Node) -> HashMap<String, usize> {
    let mut map = HashMap::new();
    if let Node::Scope(scope) = ast {
        for (i, line) in scope.children.iter().enumerate() {
            if let Node::Line { child, .. } = line {
                if let Node::JumpPoint { label } = &**child {
                    map.insert(label.clone(), i);
                }
            }
        }
    }
    map
}

/// Reconstruct `node_stack` from `ast` and a restored frame stack, by
/// replaying `child_node_of` down from the root. See [`Runner::node_stack`].
fn rebuild_node_stack<'a>(ast: &'a Node, frames: &[Frame]) -> Vec<&'a Node> {
    let mut stack = Vec::with_capacity(frames.len());
    let mut current = ast;
    stack.push(current);
    for frame in &frames[..frames.len().saturating_sub(1)] {
        current = child_node_of(current, &frame.state).expect("frame stack inconsistent with AST during restore");
        stack.push(current);
    }
    stack
}

fn index_into(container: &Value, index: &Value, line_no: u32) -> Result<Value, ScriptEffect> {
    match (container, index) {
        (Value::Array(a), Value::Int(i)) => {
            let idx = if *i < 0 { a.len() as i64 + i } else { *i };
            if idx < 0 || idx as usize >= a.len() {
                return Err(ScriptEffect::NotDefinedError {
                    name: "Index/Key does not exist".into(),
                    line_no: Some(line_no),
                });
            }
            Ok(a[idx as usize].clone())
        }
        (Value::Map(m), Value::Str(k)) => m.get(k).cloned().ok_or_else(|| ScriptEffect::NotDefinedError {
            name: k.clone(),
            line_no: Some(line_no),
        }),
        _ => Err(ScriptEffect::ParameterError {
            name: "index".into(),
            msg: "container/index type mismatch".into(),
            line_no: Some(line_no),
        }),
    }
}

fn assign_into(container: &mut Value, index: Value, value: Value, line_no: u32) -> Result<(), ScriptEffect> {
    match (container, index) {
        (Value::Array(a), Value::Int(i)) => {
            let idx = if i < 0 { a.len() as i64 + i } else { i };
            if idx < 0 || idx as usize >= a.len() {
                return Err(ScriptEffect::NotDefinedError {
                    name: "Index/Key does not exist".into(),
                    line_no: Some(line_no),
                });
            }
            a[idx as usize] = value;
            Ok(())
        }
        (Value::Map(m), Value::Str(k)) => {
            m.insert(k, value);
            Ok(())
        }
        _ => Err(ScriptEffect::ParameterError {
            name: "index".into(),
            msg: "container/index type mismatch".into(),
            line_no: Some(line_no),
        }),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("empty blob")]
    Empty,
    #[error("unknown blob version tag {0}")]
    UnknownVersion(u8),
    #[error("failed to decode blob body: {0}")]
    Decode(#[source] bincode::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_script::{parse, Scope, ScopeOptions};

    fn run_to_completion(script: &str, registry: &Registry, vars: BTreeMap<String, Value>) -> (RunOutcome, BTreeMap<String, Value>) {
        let ast = parse(script).unwrap();
        let mut runner = Runner::new(&ast, registry, vars);
        let outcome = runner.run();
        (outcome, runner.variables().clone())
    }

    #[test]
    fn arithmetic_and_assignment() {
        let registry = Registry::new();
        let (outcome, vars) = run_to_completion("x = ( 2 + ( 3 * 4 ) )\n", &registry, BTreeMap::new());
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(vars.get("x"), Some(&Value::Int(14)));
    }

    #[test]
    fn ifelse_takes_true_branch() {
        let registry = Registry::new();
        let mut vars = BTreeMap::new();
        vars.insert("x".to_string(), Value::Int(10));
        let (outcome, vars) = run_to_completion("y = 0\nif ( x > 5 ) then y = 1\nelse y = 2\n", &registry, vars);
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(vars.get("y"), Some(&Value::Int(1)));
    }

    #[test]
    fn ifelse_takes_else_branch() {
        let registry = Registry::new();
        let mut vars = BTreeMap::new();
        vars.insert("x".to_string(), Value::Int(3));
        let (outcome, vars) = run_to_completion("y = 0\nif ( x > 5 ) then y = 1\nelse y = 2\n", &registry, vars);
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(vars.get("y"), Some(&Value::Int(2)));
    }

    #[test]
    fn goto_loops_until_condition_false() {
        let registry = Registry::new();
        let mut vars = BTreeMap::new();
        vars.insert("x".to_string(), Value::Int(0));
        let (outcome, vars) = run_to_completion(":top\nx = ( x + 1 )\nif ( x < 3 ) then goto top\n", &registry, vars);
        assert_eq!(outcome, RunOutcome::Done);
        assert_eq!(vars.get("x"), Some(&Value::Int(3)));
    }

    /// `exists(...)` has no surface syntax — the grammar never produces
    /// `Node::Exists`; callers that need the "resolves without
    /// NotDefinedError" check (module/registry lookups) build it directly.
    /// These tests exercise the Runner against a hand-built AST instead of
    /// parsed script text.
    fn exists_assignment_ast(target_name: &str, checked_name: &str) -> Node {
        Node::Scope(Scope {
            options: ScopeOptions::default(),
            children: vec![Node::Line {
                line_no: 1,
                child: Box::new(Node::Assignment {
                    target: Box::new(Node::Variable {
                        module: None,
                        name: target_name.to_string(),
                    }),
                    value: Box::new(Node::Exists(Box::new(Node::Variable {
                        module: None,
                        name: checked_name.to_string(),
                    }))),
                }),
            }],
        })
    }

    #[test]
    fn exists_converts_not_defined_to_false() {
        let registry = Registry::new();
        let ast = exists_assignment_ast("y", "never_defined");
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        assert_eq!(runner.run(), RunOutcome::Done);
        assert_eq!(runner.variables().get("y"), Some(&Value::Bool(false)));
    }

    #[test]
    fn exists_true_for_defined_variable() {
        let registry = Registry::new();
        let ast = exists_assignment_ast("y", "x");
        let mut vars = BTreeMap::new();
        vars.insert("x".to_string(), Value::Int(1));
        let mut runner = Runner::new(&ast, &registry, vars);
        assert_eq!(runner.run(), RunOutcome::Done);
        assert_eq!(runner.variables().get("y"), Some(&Value::Bool(true)));
    }

    #[test]
    fn undefined_variable_aborts() {
        let registry = Registry::new();
        let ast = parse("x = never_defined\n").unwrap();
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        match runner.run() {
            RunOutcome::Suspended(ScriptEffect::NotDefinedError { .. }) => {}
            other => panic!("expected NotDefinedError, got {other:?}"),
        }
        assert!(runner.is_terminal());
    }

    #[test]
    fn delay_suspends_then_completes() {
        let registry = Registry::new();
        let ast = parse("delay(seconds=0)\nz = 1\n").unwrap();
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        // seconds=0 is rejected by Delay::setup as a ParameterError.
        match runner.run() {
            RunOutcome::Suspended(ScriptEffect::ParameterError { .. }) => {}
            other => panic!("expected ParameterError for zero delay, got {other:?}"),
        }
    }

    #[test]
    fn checkpoint_round_trip_resumes_identically() {
        let registry = Registry::new();
        let ast = parse("x = 1\ndelay(seconds=5)\nx = 2\n").unwrap();
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        let outcome = runner.run();
        assert!(matches!(outcome, RunOutcome::Suspended(ScriptEffect::Interrupt(_))));
        assert_eq!(runner.variables().get("x"), Some(&Value::Int(1)));

        let blob = runner.to_blob().unwrap();
        let restored_state = Runner::state_from_blob(&blob).unwrap();
        let mut restored = Runner::restore(&ast, &registry, restored_state);
        assert_eq!(restored.variables(), runner.variables());
        assert_eq!(restored.cookie(), runner.cookie());

        // Still not done (delay(seconds=5) hasn't elapsed).
        let outcome2 = restored.run();
        assert!(matches!(outcome2, RunOutcome::Suspended(ScriptEffect::Interrupt(_))));
    }

    #[test]
    fn single_flight_dispatch_rejects_second_send_before_reply() {
        let mut registry = Registry::new();
        registry.register(
            "foo",
            StaticModule::new().with_external_fn("bar", || Box::new(SingleShotWorkerCall::default())),
        );
        let ast = parse("foo.bar(n=1)\n").unwrap();
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        let outcome = runner.run();
        assert!(matches!(outcome, RunOutcome::Suspended(ScriptEffect::Interrupt(_))));

        let first = runner.pending_dispatch();
        assert!(first.is_some());
        runner.mark_dispatched();
        let second = runner.pending_dispatch();
        assert!(second.is_none(), "a second dispatch must not be offered before a reply lands");
    }

    #[test]
    fn cookie_mismatch_rejected_without_mutating_state() {
        let mut registry = Registry::new();
        registry.register(
            "foo",
            StaticModule::new().with_external_fn("bar", || Box::new(SingleShotWorkerCall::default())),
        );
        let ast = parse("foo.bar(n=1)\n").unwrap();
        let mut runner = Runner::new(&ast, &registry, BTreeMap::new());
        runner.run();
        runner.mark_dispatched();

        let stale_cookie = Cookie::new();
        let err = runner.deliver_worker_reply(stale_cookie, Value::Int(1)).unwrap_err();
        assert_eq!(err, "Bad Cookie");
        // state unchanged: still dispatched, variables untouched.
        assert!(runner.variables().is_empty());
    }

    /// A handler that issues one worker dispatch and completes once a reply
    /// lands. Grounds the single-flight and cookie tests above without
    /// depending on `Delay`'s wall-clock behavior.
    #[derive(Default)]
    struct SingleShotWorkerCall {
        replied: bool,
    }

    impl ExternalFunction for SingleShotWorkerCall {
        fn setup(&mut self, _params: &BTreeMap<String, Value>) -> Result<(), ScriptEffect> {
            Ok(())
        }

        fn done(&self) -> bool {
            self.replied
        }

        fn to_worker(&mut self) -> Option<(String, Value)> {
            if self.replied {
                None
            } else {
                Some(("do".to_string(), Value::Int(1)))
            }
        }

        fn from_worker(&mut self, _data: Value) -> Result<(), String> {
            self.replied = true;
            Ok(())
        }

        fn get_state(&self) -> Vec<u8> {
            bincode::serialize(&self.replied).unwrap_or_default()
        }

        fn set_state(&mut self, state: &[u8]) {
            if let Ok(replied) = bincode::deserialize(state) {
                self.replied = replied;
            }
        }
    }
}
