//! Infix operator evaluation, dispatched by the coercion group each
//! `Operator` is tagged with.

use foundry_core::Value;
use foundry_script::{OperandGroup, Operator};

use crate::effect::ScriptEffect;

/// Apply `operator` to already-evaluated operands. `line_no` is only used to
/// annotate a `ParameterError` if a numeric operator gets a non-numeric
/// operand.
pub fn apply(operator: Operator, left: &Value, right: &Value, line_no: u32) -> Result<Value, ScriptEffect> {
    match operator.group() {
        OperandGroup::String => Ok(string_op(operator, left, right)),
        OperandGroup::Numeric => numeric_op(operator, left, right, line_no),
        OperandGroup::Logical => Ok(logical_op(operator, left, right)),
    }
}

fn string_op(operator: Operator, left: &Value, right: &Value) -> Value {
    let l = left.to_display_string();
    let r = right.to_display_string();
    match operator {
        Operator::Concat => Value::Str(l + &r),
        _ => unreachable!("string_op called with non-string operator"),
    }
}

fn numeric_op(operator: Operator, left: &Value, right: &Value, line_no: u32) -> Result<Value, ScriptEffect> {
    let l = left.as_f64().ok_or_else(|| ScriptEffect::ParameterError {
        name: "left of operator".into(),
        msg: "must be numeric".into(),
        line_no: Some(line_no),
    })?;
    let r = right.as_f64().ok_or_else(|| ScriptEffect::ParameterError {
        name: "right of operator".into(),
        msg: "must be numeric".into(),
        line_no: Some(line_no),
    })?;

    // Preserve integer results when both operands were integral (int op int
    // stays int unless division or the operator itself produces a float).
    let both_int = matches!(left, Value::Int(_) | Value::Bool(_)) && matches!(right, Value::Int(_) | Value::Bool(_));

    let value = match operator {
        Operator::Add => l + r,
        Operator::Sub => l - r,
        Operator::Mul => l * r,
        Operator::Div => l / r,
        Operator::Mod => l % r,
        Operator::Pow => l.powf(r),
        Operator::BitAnd => return Ok(bitwise(left, right, line_no, |a, b| a & b)),
        Operator::BitOr => return Ok(bitwise(left, right, line_no, |a, b| a | b)),
        _ => unreachable!("numeric_op called with non-numeric operator"),
    };

    if both_int && matches!(operator, Operator::Add | Operator::Sub | Operator::Mul | Operator::Mod) {
        Ok(Value::Int(value as i64))
    } else {
        Ok(Value::Float(value))
    }
}

fn bitwise(left: &Value, right: &Value, _line_no: u32, f: impl Fn(i64, i64) -> i64) -> Value {
    let l = left.as_f64().unwrap_or_default() as i64;
    let r = right.as_f64().unwrap_or_default() as i64;
    Value::Int(f(l, r))
}

fn logical_op(operator: Operator, left: &Value, right: &Value) -> Value {
    match operator {
        Operator::And => {
            if left.is_truthy() {
                right.clone()
            } else {
                left.clone()
            }
        }
        Operator::Or => {
            if left.is_truthy() {
                left.clone()
            } else {
                right.clone()
            }
        }
        Operator::Eq => Value::Bool(left == right),
        Operator::NotEq => Value::Bool(left != right),
        Operator::Lte | Operator::Gte | Operator::Lt | Operator::Gt => compare(operator, left, right),
        Operator::Not => Value::Bool(!left.is_truthy()),
        _ => unreachable!("logical_op called with non-logical operator"),
    }
}

fn compare(operator: Operator, left: &Value, right: &Value) -> Value {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
        _ => left.as_f64().and_then(|a| right.as_f64().map(|b| (a, b))).and_then(|(a, b)| a.partial_cmp(&b)),
    };
    let Some(ordering) = ordering else {
        return Value::Bool(false);
    };
    let result = match operator {
        Operator::Lte => ordering.is_le(),
        Operator::Gte => ordering.is_ge(),
        Operator::Lt => ordering.is_lt(),
        Operator::Gt => ordering.is_gt(),
        _ => unreachable!(),
    };
    Value::Bool(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adds_integers_and_keeps_int_type() {
        let v = apply(Operator::Add, &Value::Int(2), &Value::Int(3), 1).unwrap();
        assert_eq!(v, Value::Int(5));
    }

    #[test]
    fn division_always_floats() {
        let v = apply(Operator::Div, &Value::Int(7), &Value::Int(2), 1).unwrap();
        assert_eq!(v, Value::Float(3.5));
    }

    #[test]
    fn rejects_non_numeric_operand() {
        let err = apply(Operator::Add, &Value::Str("x".into()), &Value::Int(1), 4).unwrap_err();
        assert!(matches!(err, ScriptEffect::ParameterError { line_no: Some(4), .. }));
    }

    #[test]
    fn concat_coerces_both_sides_to_string() {
        let v = apply(Operator::Concat, &Value::Int(1), &Value::Str("x".into()), 1).unwrap();
        assert_eq!(v, Value::Str("1x".into()));
    }

    #[test]
    fn logical_and_short_circuits_on_falsy_left() {
        let v = apply(Operator::And, &Value::Int(0), &Value::Int(9), 1).unwrap();
        assert_eq!(v, Value::Int(0));
    }

    #[test]
    fn ordering_compares_strings_lexically() {
        let v = apply(Operator::Lt, &Value::Str("a".into()), &Value::Str("b".into()), 1).unwrap();
        assert_eq!(v, Value::Bool(true));
    }
}
