//! The external-function ("subcontractor") lifecycle contract and the one
//! concrete handler (`Delay`) shipped as the reference implementation other
//! modules are modeled after.
//!
//! None of these methods may block, sleep, or poll — they are called on
//! every scheduler tick for every job with an outstanding function frame, so
//! blocking here would stall the whole coordinator.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use foundry_core::Value;

use crate::effect::ScriptEffect;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollbackError {
    /// The handler has nothing to roll back to.
    NotPossible,
    Failed(String),
}

/// A stateful external function. A fresh instance is created per `FUNCTION`
/// frame entry — handlers are never reused across frames.
pub trait ExternalFunction: Send {
    /// Called exactly once when the frame is first entered. `params` are the
    /// script's named arguments, already evaluated. Raising anything other
    /// than a `ParameterError` aborts the job; returning `Err` here is
    /// expected for bad input, so validate strictly.
    fn setup(&mut self, params: &BTreeMap<String, Value>) -> Result<(), ScriptEffect>;

    /// `true` once there is nothing left to do. Polled every tick; must
    /// never flip back to `false` after returning `true`.
    fn done(&self) -> bool {
        true
    }

    /// Status text surfaced as the job's message while not done, and again
    /// once a worker reply has just been processed.
    fn message(&self) -> String {
        String::new()
    }

    /// Read exactly once after `done()` first returns `true`.
    fn value(&mut self) -> Result<Value, ScriptEffect> {
        Ok(Value::None)
    }

    /// Called on ticks where `done()` is still `false` and no worker reply
    /// is pending. Returning `Err(ScriptEffect::Pause(_))` is an accepted
    /// way to yield back to the scheduler.
    fn run(&mut self) -> Result<(), ScriptEffect> {
        Ok(())
    }

    /// At most one outstanding dispatch per job. Returning `None` means
    /// nothing to send this tick.
    fn to_worker(&mut self) -> Option<(String, Value)> {
        None
    }

    /// Delivers a matched worker reply.
    fn from_worker(&mut self, _data: Value) -> Result<(), String> {
        Ok(())
    }

    /// Arm the handler to re-drive from an earlier point, or refuse.
    fn rollback(&mut self) -> Result<(), RollbackError> {
        Err(RollbackError::NotPossible)
    }

    /// Snapshot for the job blob.
    fn get_state(&self) -> Vec<u8> {
        Vec::new()
    }

    /// Restore from a snapshot produced by `get_state`.
    fn set_state(&mut self, _state: &[u8]) {}
}

/// The reference external function: suspends until a wall-clock deadline.
/// Every other subcontractor handler is grounded on this shape.
#[derive(Debug, Default)]
pub struct Delay {
    end_at: Option<DateTime<Utc>>,
}

impl Delay {
    pub fn new() -> Self {
        Delay::default()
    }
}

fn parse_param(params: &BTreeMap<String, Value>, name: &str) -> Result<i64, ScriptEffect> {
    match params.get(name) {
        None => Ok(0),
        Some(Value::Int(i)) => Ok(*i),
        Some(Value::Bool(b)) => Ok(*b as i64),
        Some(Value::Float(f)) => Ok(*f as i64),
        _ => Err(ScriptEffect::ParameterError {
            name: name.to_string(),
            msg: "must be an integer".into(),
            line_no: None,
        }),
    }
}

impl ExternalFunction for Delay {
    fn setup(&mut self, params: &BTreeMap<String, Value>) -> Result<(), ScriptEffect> {
        let seconds = parse_param(params, "seconds")?;
        let minutes = parse_param(params, "minutes")?;
        let hours = parse_param(params, "hours")?;

        if seconds == 0 && minutes == 0 && hours == 0 {
            return Err(ScriptEffect::ParameterError {
                name: "<unknown>".into(),
                msg: "specified 0 delay, set one or more of \"seconds\", \"minutes\", \"hours\"".into(),
                line_no: None,
            });
        }

        self.end_at = Some(Utc::now() + Duration::seconds(seconds) + Duration::minutes(minutes) + Duration::hours(hours));
        Ok(())
    }

    fn done(&self) -> bool {
        self.end_at.is_some_and(|end| Utc::now() >= end)
    }

    fn message(&self) -> String {
        match self.end_at {
            Some(end) => {
                let remaining = (end - Utc::now()).num_seconds().max(0);
                format!("Waiting for {remaining} more seconds")
            }
            None => String::new(),
        }
    }

    fn get_state(&self) -> Vec<u8> {
        bincode::serialize(&self.end_at).unwrap_or_default()
    }

    fn set_state(&mut self, state: &[u8]) {
        if let Ok(end_at) = bincode::deserialize(state) {
            self.end_at = end_at;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_zero_delay() {
        let mut d = Delay::new();
        let err = d.setup(&BTreeMap::new()).unwrap_err();
        assert!(matches!(err, ScriptEffect::ParameterError { .. }));
    }

    #[test]
    fn not_done_immediately_after_setup() {
        let mut d = Delay::new();
        let mut params = BTreeMap::new();
        params.insert("seconds".to_string(), Value::Int(5));
        d.setup(&params).unwrap();
        assert!(!d.done());
        assert!(d.message().starts_with("Waiting for"));
    }

    #[test]
    fn state_round_trips() {
        let mut d = Delay::new();
        let mut params = BTreeMap::new();
        params.insert("seconds".to_string(), Value::Int(5));
        d.setup(&params).unwrap();
        let snapshot = d.get_state();

        let mut restored = Delay::new();
        restored.set_state(&snapshot);
        assert_eq!(restored.end_at, d.end_at);
    }
}
