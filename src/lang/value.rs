use serde::{Deserialize, Serialize};

use super::types::ValueType;
use crate::runtime::runtime_error::RuntimeError;

/// Runtime value of the Cinder language.
///
/// Values are copied on assignment, never shared.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// Declared but never assigned, or the result of a bare `return;`.
    #[default]
    Undefined,

    /// 64-bit signed integer.
    Int(i64),

    /// 64-bit floating-point number.
    Double(f64),

    /// UTF-8 string value.
    Str(String),

    /// Boolean value.
    Bool(bool),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Undefined => ValueType::Undefined,
            Value::Int(_) => ValueType::Int,
            Value::Double(_) => ValueType::Double,
            Value::Str(_) => ValueType::Str,
            Value::Bool(_) => ValueType::Bool,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.value_type().name()
    }

    /// Reads the int payload; fails on any other tag.
    pub fn as_int(&self) -> Result<i64, RuntimeError> {
        match self {
            Value::Int(n) => Ok(*n),
            other => Err(RuntimeError::type_mismatch(ValueType::Int, other.value_type())),
        }
    }

    /// Reads the double payload; fails on any other tag, including int.
    pub fn as_double(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Double(n) => Ok(*n),
            other => Err(RuntimeError::type_mismatch(
                ValueType::Double,
                other.value_type(),
            )),
        }
    }

    pub fn as_str(&self) -> Result<&str, RuntimeError> {
        match self {
            Value::Str(s) => Ok(s),
            other => Err(RuntimeError::type_mismatch(ValueType::Str, other.value_type())),
        }
    }

    pub fn as_bool(&self) -> Result<bool, RuntimeError> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(RuntimeError::type_mismatch(ValueType::Bool, other.value_type())),
        }
    }

    /// Numeric payload widened to double (int → double promotion).
    pub fn to_double(&self) -> Result<f64, RuntimeError> {
        match self {
            Value::Int(n) => Ok(*n as f64),
            Value::Double(n) => Ok(*n),
            other => Err(RuntimeError::type_mismatch(
                ValueType::Double,
                other.value_type(),
            )),
        }
    }
}

impl std::fmt::Display for Value {
    /// Format a value using Cinder surface syntax.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Int(n) => write!(f, "{}", n),
            Value::Double(n) => write!(f, "{:?}", n),
            Value::Str(s) => write!(f, "{}", s),
            Value::Bool(b) => write!(f, "{}", b),
        }
    }
}
