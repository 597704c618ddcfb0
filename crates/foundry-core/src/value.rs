//! The runtime value type shared by the script interpreter, its variable map,
//! and the external-function protocol.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A value flowing through the interpreter: a constant, a variable binding, a
/// function parameter, or a worker dispatch payload all use this type.
///
/// `Map` uses a `BTreeMap` rather than a hash map so that map-value iteration
/// order (needed for deterministic evaluation order, see the concurrency
/// model's ordering rules) is the key's natural order rather than insertion
/// order or hash order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Total seconds of a `d:h:m:s` / `h:m:s` / `m:s` literal.
    TimeDelta(i64),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::None => "none",
            Value::Bool(_) => "boolean",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::TimeDelta(_) => "timedelta",
            Value::Array(_) => "array",
            Value::Map(_) => "map",
        }
    }

    /// Truthiness used by `if`/`while` conditions and `not`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::None => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::TimeDelta(s) => *s != 0,
            Value::Array(a) => !a.is_empty(),
            Value::Map(m) => !m.is_empty(),
        }
    }

    /// Render as its string form, used by the `.` concatenation operator and
    /// by `message`/error text interpolation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::None => "none".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Str(s) => s.clone(),
            Value::TimeDelta(s) => format_timedelta(*s),
            Value::Array(a) => {
                let parts: Vec<String> = a.iter().map(Value::to_display_string).collect();
                format!("[{}]", parts.join(", "))
            }
            Value::Map(m) => {
                let parts: Vec<String> = m
                    .iter()
                    .map(|(k, v)| format!("{}: {}", k, v.to_display_string()))
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
        }
    }

    /// Numeric coercion used by the numeric infix operator group. Both `Int`
    /// and `Bool` are acceptable numeric operands per the grammar's infix
    /// rules; anything else is not a number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::TimeDelta(s) => Some(*s as f64),
            _ => None,
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_) | Value::Bool(_))
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display_string())
    }
}

fn format_timedelta(total_seconds: i64) -> String {
    let sign = if total_seconds < 0 { "-" } else { "" };
    let mut s = total_seconds.abs();
    let days = s / 86_400;
    s %= 86_400;
    let hours = s / 3_600;
    s %= 3_600;
    let minutes = s / 60;
    let seconds = s % 60;
    format!("{sign}{days}:{hours:02}:{minutes:02}:{seconds:02}")
}

/// Parse a `d:h:m:s`, `h:m:s`, or `m:s` literal into total seconds.
pub fn parse_timedelta(literal: &str) -> Option<i64> {
    let parts: Vec<&str> = literal.split(':').collect();
    let nums: Option<Vec<i64>> = parts.iter().map(|p| p.parse::<i64>().ok()).collect();
    let nums = nums?;
    match nums.as_slice() {
        [d, h, m, s] => Some(d * 86_400 + h * 3_600 + m * 60 + s),
        [h, m, s] => Some(h * 3_600 + m * 60 + s),
        [m, s] => Some(m * 60 + s),
        _ => None,
    }
}
