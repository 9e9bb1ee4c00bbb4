//! Operator application over [`Value`]s.
//!
//! The result tag always comes from [`resulting_operation_type`]; this module
//! only computes payloads. Integer arithmetic is checked, double arithmetic
//! follows IEEE 754 (so `1.0 / 0.0` is infinity, not an error).

use std::cmp::Ordering;

use crate::lang::operator::Operator;
use crate::lang::types::{ValueType, resulting_operation_type};
use crate::lang::value::Value;
use crate::runtime::runtime_error::{RuntimeError, RuntimeErrorKind};

/// Tolerance for double `==`.
pub const DOUBLE_EPSILON: f64 = f64::EPSILON;

/// `|a - b| <= ε` or `|a - b| <= max(|a|, |b|) * ε`.
pub fn approx_eq(a: f64, b: f64) -> bool {
    let diff = (a - b).abs();
    diff <= DOUBLE_EPSILON || diff <= a.abs().max(b.abs()) * DOUBLE_EPSILON
}

pub fn apply_unary(op: Operator, value: Value) -> Result<Value, RuntimeError> {
    if resulting_operation_type(op, value.value_type(), None).is_none() {
        return Err(RuntimeError::incompatible(op, value.value_type(), None));
    }

    match (op, value) {
        (Operator::Neg, Value::Int(n)) => {
            n.checked_neg().map(Value::Int).ok_or_else(|| overflow(op))
        }
        (Operator::Neg, Value::Double(x)) => Ok(Value::Double(-x)),
        (Operator::Pos, value) => Ok(value),
        (Operator::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (op, value) => Err(RuntimeError::incompatible(op, value.value_type(), None)),
    }
}

pub fn apply_binary(op: Operator, lhs: Value, rhs: Value) -> Result<Value, RuntimeError> {
    let (lhs_type, rhs_type) = (lhs.value_type(), rhs.value_type());
    let Some(result_type) = resulting_operation_type(op, lhs_type, Some(rhs_type)) else {
        return Err(RuntimeError::incompatible(op, lhs_type, Some(rhs_type)));
    };

    if op.is_comparison() {
        return compare(op, &lhs, &rhs).map(Value::Bool);
    }

    match (op, result_type) {
        // both sides are already evaluated; there is no short-circuit
        (Operator::And, _) => Ok(Value::Bool(lhs.as_bool()? && rhs.as_bool()?)),
        (Operator::Or, _) => Ok(Value::Bool(lhs.as_bool()? || rhs.as_bool()?)),

        (Operator::Add, ValueType::Str) => {
            let mut s = lhs.as_str()?.to_string();
            s.push_str(rhs.as_str()?);
            Ok(Value::Str(s))
        }

        (_, ValueType::Int) => int_arith(op, lhs.as_int()?, rhs.as_int()?).map(Value::Int),
        (_, ValueType::Double) => {
            double_arith(op, lhs.to_double()?, rhs.to_double()?).map(Value::Double)
        }

        _ => Err(RuntimeError::internal(format!(
            "no evaluation rule for {} on {} and {}",
            op, lhs_type, rhs_type
        ))),
    }
}

fn int_arith(op: Operator, a: i64, b: i64) -> Result<i64, RuntimeError> {
    let result = match op {
        Operator::Add => a.checked_add(b),
        Operator::Sub => a.checked_sub(b),
        Operator::Mul => a.checked_mul(b),
        Operator::Div | Operator::Mod if b == 0 => {
            return Err(RuntimeError::new(RuntimeErrorKind::DivisionByZero));
        }
        // truncates toward zero
        Operator::Div => a.checked_div(b),
        Operator::Mod => a.checked_rem(b),
        _ => {
            return Err(RuntimeError::internal(format!(
                "'{}' is not an int operation",
                op
            )));
        }
    };
    result.ok_or_else(|| overflow(op))
}

fn double_arith(op: Operator, a: f64, b: f64) -> Result<f64, RuntimeError> {
    match op {
        Operator::Add => Ok(a + b),
        Operator::Sub => Ok(a - b),
        Operator::Mul => Ok(a * b),
        Operator::Div => Ok(a / b),
        _ => Err(RuntimeError::internal(format!(
            "'{}' is not a double operation",
            op
        ))),
    }
}

/// `==` on doubles is approximate; every other double comparison is exact.
/// Strings compare ordinally, `false < true`.
fn compare(op: Operator, lhs: &Value, rhs: &Value) -> Result<bool, RuntimeError> {
    let ordering = match (lhs, rhs) {
        (Value::Int(a), Value::Int(b)) => a.cmp(b),
        (Value::Str(a), Value::Str(b)) => a.cmp(b),
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => {
            let (a, b) = (lhs.to_double()?, rhs.to_double()?);
            return match op {
                Operator::Eq => Ok(approx_eq(a, b)),
                Operator::Ne => Ok(a != b),
                Operator::Lt => Ok(a < b),
                Operator::Le => Ok(a <= b),
                Operator::Gt => Ok(a > b),
                Operator::Ge => Ok(a >= b),
                _ => Err(not_a_comparison(op)),
            };
        }
    };

    match op {
        Operator::Eq => Ok(ordering == Ordering::Equal),
        Operator::Ne => Ok(ordering != Ordering::Equal),
        Operator::Lt => Ok(ordering == Ordering::Less),
        Operator::Le => Ok(ordering != Ordering::Greater),
        Operator::Gt => Ok(ordering == Ordering::Greater),
        Operator::Ge => Ok(ordering != Ordering::Less),
        _ => Err(not_a_comparison(op)),
    }
}

fn not_a_comparison(op: Operator) -> RuntimeError {
    RuntimeError::internal(format!("'{}' is not a comparison", op))
}

fn overflow(op: Operator) -> RuntimeError {
    RuntimeError::new(RuntimeErrorKind::IntegerOverflow(op))
}
