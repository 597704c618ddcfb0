//! Parse-time errors.

use thiserror::Error;

/// Raised on incomplete parse or malformed tokens. Carries the 1-based line
/// and column of the offending token so operators can locate it in the
/// source without re-running the lexer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("ParseError, line: {line}, column: {column}, \"{msg}\"")]
pub struct ParseError {
    pub line: u32,
    pub column: u32,
    pub msg: String,
}

impl ParseError {
    pub fn new(line: u32, column: u32, msg: impl Into<String>) -> Self {
        Self {
            line,
            column,
            msg: msg.into(),
        }
    }
}

/// Parse a script purely to validate it; returns the first error, if any, as
/// a human-readable string. Callers use this to validate a script before it
/// is ever attached to a job.
pub fn lint(script: &str) -> Option<String> {
    match crate::parser::parse(script) {
        Ok(_) => None,
        Err(e) => Some(e.to_string()),
    }
}
