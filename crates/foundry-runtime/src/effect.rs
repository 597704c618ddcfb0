//! Control-flow effects the interpreter's step function returns instead of
//! raising host exceptions. Most of these are expected and resumable; only
//! `HandlerPanic` represents a genuine host-side failure.

use thiserror::Error;

/// Everything a single interpreter step can hand back instead of progress.
/// Several of these are not failures in the usual sense — `Pause`, `Interrupt`,
/// and `Timeout` are routine suspension points the scheduler reschedules
/// around.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScriptEffect {
    /// Explicit `pause()` builtin or a scope's `max_time` deadline. Resumable;
    /// the job surfaces `msg` and moves to `paused`.
    #[error("{0}")]
    Pause(String),

    /// Handler-signalled recoverable failure. Resumable; the job moves to
    /// `error` and an operator may `reset` or `rollback`.
    #[error("{0}")]
    ExecutionError(String),

    /// Internal yield after `handler.run()` when the handler is not yet
    /// `done`. Never surfaces past the interpreter's own `run` loop.
    #[error("{0}")]
    Interrupt(String),

    /// An AST kind the interpreter cannot handle. Indicates a bug, not a
    /// user error. Terminal.
    #[error("script error on line {line_no}: {msg}")]
    ScriptError { msg: String, line_no: u32 },

    /// The `fatal_error()` builtin, or any other handler-signalled failure
    /// that the script itself marks non-recoverable. Distinct from
    /// `ScriptError`, which is an interpreter bug, not a script-level
    /// signal. Terminal; the job's state becomes `aborted`.
    #[error("unrecoverable error{}: {msg}", line_no.map(|l| format!(" on line {l}")).unwrap_or_default())]
    UnrecoverableError { msg: String, line_no: Option<u32> },

    /// Wrong name/type/range in a function call's named parameters, or a
    /// non-gettable/non-settable module binding. Terminal.
    #[error("parameter error \"{name}\"{}: {msg}", line_no.map(|l| format!(" line {l}")).unwrap_or_default())]
    ParameterError {
        name: String,
        msg: String,
        line_no: Option<u32>,
    },

    /// Unknown variable, module, key, or jump label. Terminal.
    #[error("not defined \"{name}\"{}", line_no.map(|l| format!(" line {l}")).unwrap_or_default())]
    NotDefinedError { name: String, line_no: Option<u32> },

    /// Step budget exhausted on the current tick. Not user-visible as a
    /// failure; the scheduler simply reschedules.
    #[error("timeout on line {line_no}")]
    Timeout { line_no: u32 },

    /// Internal control flow only, caught by the outermost run loop which
    /// rewrites the frame stack to the jump point's position.
    #[error("goto \"{label}\" line {line_no}")]
    Goto { label: String, line_no: u32 },
}

impl ScriptEffect {
    /// Kinds 5–8 in the error taxonomy: resumable, as opposed to the
    /// terminal kinds that abort the job outright.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ScriptEffect::Pause(_)
                | ScriptEffect::ExecutionError(_)
                | ScriptEffect::Interrupt(_)
                | ScriptEffect::Timeout { .. }
                | ScriptEffect::Goto { .. }
        )
    }
}

/// An uncaught failure from a handler method. Rust has no ambient exception
/// channel, so "uncaught host exception" becomes "a handler trait method
/// returned an error its caller wasn't prepared to treat as recoverable."
/// Terminal; the job's state becomes `aborted`.
#[derive(Debug, Error)]
#[error("handler \"{handler}\" in module \"{module}\" failed on line {line_no}: {source}")]
pub struct HandlerPanic {
    pub handler: String,
    pub module: String,
    pub line_no: u32,
    #[source]
    pub source: Box<dyn std::error::Error + Send + Sync>,
}
