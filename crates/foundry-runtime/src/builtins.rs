//! The builtin function catalogue: arithmetic/logic live in `operators`, this
//! module covers everything callable by name with no `module.` prefix.
//!
//! `append` and `pop` mutate their first argument in place rather than
//! returning a new value, which the generic value-function shape below
//! can't express — the interpreter special-cases those two names before
//! consulting the registry and calls the mutation helpers here directly
//! against the live variable slot.

use std::collections::HashMap;

use foundry_core::Value;

use crate::effect::ScriptEffect;
use crate::external::Delay;
use crate::registry::StaticModule;

/// Builtins that mutate their first argument rather than computing a pure
/// value from already-evaluated parameters. The interpreter must resolve
/// these against a live variable slot instead of dispatching through the
/// registry's `call_value`.
pub const MUTATING_BUILTINS: &[&str] = &["append", "pop"];

pub fn builtin_module() -> StaticModule {
    StaticModule::new()
        .with_value_fn("len", len)
        .with_value_fn("slice", slice)
        .with_value_fn("index", index_of)
        .with_value_fn("pause", |p| Err(ScriptEffect::Pause(message_param(p))))
        .with_value_fn("error", |p| Err(ScriptEffect::ExecutionError(message_param(p))))
        .with_value_fn("fatal_error", |p| {
            Err(ScriptEffect::UnrecoverableError {
                msg: message_param(p),
                line_no: None,
            })
        })
        .with_value_fn("message", |p| Err(ScriptEffect::Interrupt(message_param(p))))
        .with_external_fn("delay", || Box::new(Delay::new()))
}

fn message_param(params: &HashMap<String, Value>) -> String {
    params.get("msg").map(Value::to_display_string).unwrap_or_default()
}

fn param_error(name: &str, msg: &str) -> ScriptEffect {
    ScriptEffect::ParameterError {
        name: name.to_string(),
        msg: msg.to_string(),
        line_no: None,
    }
}

fn require_array<'a>(params: &'a HashMap<String, Value>, name: &str) -> Result<&'a [Value], ScriptEffect> {
    match params.get(name) {
        Some(Value::Array(a)) => Ok(a),
        Some(Value::Str(_)) => Err(param_error(name, "len/slice/index do not support strings yet")),
        _ => Err(param_error(name, "must be an array")),
    }
}

fn require_int(params: &HashMap<String, Value>, name: &str, default: Option<i64>) -> Result<i64, ScriptEffect> {
    match params.get(name) {
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Bool(b)) => Ok(*b as i64),
        None if default.is_some() => Ok(default.unwrap()),
        _ => Err(param_error(name, "must be an integer")),
    }
}

fn len(params: &HashMap<String, Value>) -> Result<Value, ScriptEffect> {
    match params.get("array") {
        Some(Value::Array(a)) => Ok(Value::Int(a.len() as i64)),
        Some(Value::Str(s)) => Ok(Value::Int(s.chars().count() as i64)),
        _ => Err(param_error("array", "must be an array or string")),
    }
}

/// Python-style half-open slice; negative bounds index from the end.
fn slice(params: &HashMap<String, Value>) -> Result<Value, ScriptEffect> {
    let array = require_array(params, "array")?;
    let len = array.len() as i64;
    let start = resolve_bound(require_int(params, "start", Some(0))?, len);
    let end = resolve_bound(require_int(params, "end", Some(len))?, len);
    if start >= end {
        return Ok(Value::Array(Vec::new()));
    }
    Ok(Value::Array(array[start as usize..end as usize].to_vec()))
}

fn resolve_bound(bound: i64, len: i64) -> i64 {
    let b = if bound < 0 { (len + bound).max(0) } else { bound };
    b.min(len)
}

fn index_of(params: &HashMap<String, Value>) -> Result<Value, ScriptEffect> {
    let array = require_array(params, "array")?;
    let needle = params.get("value").cloned().unwrap_or(Value::None);
    array
        .iter()
        .position(|v| *v == needle)
        .map(|i| Value::Int(i as i64))
        .ok_or_else(|| param_error("value", "not found in array"))
}

/// `append(array=<var>, value=v)`: mutates `target` in place, returns
/// `Value::None` (Python's `list.append` return value).
pub fn append_into(target: &mut Value, value: Value) -> Result<Value, ScriptEffect> {
    match target {
        Value::Array(a) => {
            a.push(value);
            Ok(Value::None)
        }
        _ => Err(param_error("array", "must be an array")),
    }
}

/// `pop(array=<var>, index=-1)`: mutates `target` in place, returns the
/// removed element.
pub fn pop_from(target: &mut Value, index: i64) -> Result<Value, ScriptEffect> {
    match target {
        Value::Array(a) => {
            let len = a.len() as i64;
            let idx = if index < 0 { len + index } else { index };
            if idx < 0 || idx >= len {
                return Err(ScriptEffect::NotDefinedError {
                    name: "Index/Key does not exist".into(),
                    line_no: None,
                });
            }
            Ok(a.remove(idx as usize))
        }
        _ => Err(param_error("array", "must be an array")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arr(values: Vec<Value>) -> Value {
        Value::Array(values)
    }

    #[test]
    fn len_counts_array_elements() {
        let mut p = HashMap::new();
        p.insert("array".to_string(), arr(vec![Value::Int(1), Value::Int(2)]));
        assert_eq!(len(&p).unwrap(), Value::Int(2));
    }

    #[test]
    fn slice_is_half_open_and_handles_negative_end() {
        let mut p = HashMap::new();
        p.insert("array".to_string(), arr(vec![Value::Int(0), Value::Int(1), Value::Int(2), Value::Int(3)]));
        p.insert("start".to_string(), Value::Int(1));
        p.insert("end".to_string(), Value::Int(-1));
        assert_eq!(slice(&p).unwrap(), arr(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn append_mutates_target_array() {
        let mut target = arr(vec![Value::Int(1)]);
        let result = append_into(&mut target, Value::Int(2)).unwrap();
        assert_eq!(result, Value::None);
        assert_eq!(target, arr(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn pop_removes_and_returns_last_by_default() {
        let mut target = arr(vec![Value::Int(1), Value::Int(2), Value::Int(3)]);
        let removed = pop_from(&mut target, -1).unwrap();
        assert_eq!(removed, Value::Int(3));
        assert_eq!(target, arr(vec![Value::Int(1), Value::Int(2)]));
    }

    #[test]
    fn pause_builtin_resolves_to_pause_effect() {
        let module = builtin_module();
        let params = HashMap::new();
        let result = module.call_value("pause", &params).unwrap();
        assert!(matches!(result, Err(ScriptEffect::Pause(_))));
    }

    #[test]
    fn fatal_error_builtin_resolves_to_unrecoverable_error_not_script_error() {
        let module = builtin_module();
        let mut params = HashMap::new();
        params.insert("msg".to_string(), Value::Str("disk gone".to_string()));
        let result = module.call_value("fatal_error", &params).unwrap();
        match result {
            Err(ScriptEffect::UnrecoverableError { msg, line_no: None }) => assert_eq!(msg, "disk gone"),
            other => panic!("expected UnrecoverableError with no line yet, got {other:?}"),
        }
    }
}
