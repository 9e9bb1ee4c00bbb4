use serde::{Deserialize, Serialize};

use super::operator::Operator;

/// Tag of a [`Value`](super::value::Value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    Undefined,
    Int,
    Double,
    Str,
    Bool,
}

impl ValueType {
    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Double)
    }

    pub fn name(self) -> &'static str {
        match self {
            ValueType::Undefined => "undefined",
            ValueType::Int => "int",
            ValueType::Double => "double",
            ValueType::Str => "string",
            ValueType::Bool => "bool",
        }
    }
}

impl std::fmt::Display for ValueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Result type of applying `op` to operands tagged `lhs` and `rhs`.
///
/// `rhs` is `None` for unary operators. Returns `None` when the combination is
/// incompatible; the caller treats that as a fatal runtime error.
///
/// Rules, first match wins:
/// 1. `Unary-` / `Unary+` on a number keep its type; `!` on a bool is bool.
/// 2. An int paired with a double is promoted to double.
/// 3. Equal types under a comparison give bool.
/// 4. Equal types under `+` keep the type (numeric add or string concat).
/// 5. Two numbers under `+ - * /` give double if either is double, else int;
///    `%` needs two ints.
/// 6. Two bools under `&&` / `||` give bool.
///
/// `Undefined` is never a valid operand.
pub fn resulting_operation_type(
    op: Operator,
    lhs: ValueType,
    rhs: Option<ValueType>,
) -> Option<ValueType> {
    use ValueType::*;

    if op.is_unary() {
        return match (op, lhs) {
            (Operator::Neg | Operator::Pos, Int | Double) => Some(lhs),
            (Operator::Not, Bool) => Some(Bool),
            _ => None,
        };
    }

    let rhs = rhs?;
    if lhs == Undefined || rhs == Undefined {
        return None;
    }

    let (left, right) = match (lhs, rhs) {
        (Int, Double) | (Double, Int) => (Double, Double),
        other => other,
    };

    if left == right {
        if op.is_comparison() {
            return Some(Bool);
        }
        if op == Operator::Add && left != Bool {
            return Some(left);
        }
    }

    if lhs.is_numeric() && rhs.is_numeric() {
        match op {
            Operator::Add | Operator::Sub | Operator::Mul | Operator::Div => {
                return Some(if lhs == Double || rhs == Double {
                    Double
                } else {
                    Int
                });
            }
            Operator::Mod if lhs == Int && rhs == Int => return Some(Int),
            _ => {}
        }
    }

    if lhs == Bool && rhs == Bool && matches!(op, Operator::And | Operator::Or) {
        return Some(Bool);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use ValueType::*;

    fn binary(op: Operator, lhs: ValueType, rhs: ValueType) -> Option<ValueType> {
        resulting_operation_type(op, lhs, Some(rhs))
    }

    #[test]
    fn test_unary_keeps_numeric_type() {
        assert_eq!(resulting_operation_type(Operator::Neg, Int, None), Some(Int));
        assert_eq!(
            resulting_operation_type(Operator::Pos, Double, None),
            Some(Double)
        );
        assert_eq!(resulting_operation_type(Operator::Neg, Str, None), None);
        assert_eq!(resulting_operation_type(Operator::Not, Bool, None), Some(Bool));
        assert_eq!(resulting_operation_type(Operator::Not, Int, None), None);
    }

    #[test]
    fn test_int_double_promotion() {
        assert_eq!(binary(Operator::Add, Int, Double), Some(Double));
        assert_eq!(binary(Operator::Add, Double, Int), Some(Double));
        assert_eq!(binary(Operator::Div, Int, Int), Some(Int));
        assert_eq!(binary(Operator::Mul, Double, Double), Some(Double));
    }

    #[test]
    fn test_comparisons_give_bool() {
        assert_eq!(binary(Operator::Lt, Int, Double), Some(Bool));
        assert_eq!(binary(Operator::Eq, Str, Str), Some(Bool));
        assert_eq!(binary(Operator::Ne, Bool, Bool), Some(Bool));
        assert_eq!(binary(Operator::Eq, Str, Int), None);
    }

    #[test]
    fn test_string_concat_only_with_plus() {
        assert_eq!(binary(Operator::Add, Str, Str), Some(Str));
        assert_eq!(binary(Operator::Sub, Str, Str), None);
        assert_eq!(binary(Operator::Add, Str, Int), None);
    }

    #[test]
    fn test_modulo_requires_ints() {
        assert_eq!(binary(Operator::Mod, Int, Int), Some(Int));
        assert_eq!(binary(Operator::Mod, Double, Int), None);
        assert_eq!(binary(Operator::Mod, Int, Double), None);
    }

    #[test]
    fn test_logic_requires_bools() {
        assert_eq!(binary(Operator::And, Bool, Bool), Some(Bool));
        assert_eq!(binary(Operator::Or, Bool, Int), None);
        assert_eq!(binary(Operator::Add, Bool, Bool), None);
    }

    #[test]
    fn test_undefined_is_incompatible() {
        assert_eq!(binary(Operator::Eq, Undefined, Undefined), None);
        assert_eq!(binary(Operator::Add, Undefined, Int), None);
    }

    #[test]
    fn test_sentinels_are_not_operations() {
        assert_eq!(binary(Operator::EndOfExpression, Int, Int), None);
        assert_eq!(binary(Operator::LParen, Int, Int), None);
    }
}
