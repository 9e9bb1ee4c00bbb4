use crate::lang::{operator::Operator, types::ValueType};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeErrorKind {
    #[error("incompatible types: {op} {operands}")]
    IncompatibleTypes { op: Operator, operands: String },

    #[error("division by zero")]
    DivisionByZero,

    #[error("integer overflow in '{0}'")]
    IntegerOverflow(Operator),

    /// A checked accessor was used on a value with a different tag.
    #[error("type error: expected {expected}, got {found}")]
    TypeMismatch {
        expected: ValueType,
        found: ValueType,
    },

    #[error("condition must be bool, got {0}")]
    ConditionNotBool(ValueType),

    #[error("stack size limit exceeded ({0})")]
    StackOverflow(usize),

    #[error("call depth limit exceeded ({0}) - possible infinite recursion")]
    CallDepthExceeded(usize),

    #[error("execution step limit exceeded ({0})")]
    StepLimitExceeded(usize),

    #[error("invalid bytecode: {0}")]
    InvalidBytecode(String),

    /// Stack-discipline violations; these indicate a compiler bug, not a user error.
    #[error("internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    /// Instruction being executed when the error was raised.
    pub ip: Option<usize>,
    /// Active functions, outermost first.
    pub call_stack: Vec<String>,
}

impl std::fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "runtime error: {}", self.kind)?;

        if let Some(ip) = self.ip {
            write!(f, " (at instruction {:04})", ip)?;
        }

        if !self.call_stack.is_empty() {
            write!(f, "\n  call stack:")?;

            for (i, frame) in self.call_stack.iter().rev().enumerate() {
                write!(f, "\n    {}: {}", i, frame)?;
            }
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeError {}

impl From<RuntimeErrorKind> for RuntimeError {
    fn from(kind: RuntimeErrorKind) -> Self {
        RuntimeError::new(kind)
    }
}

impl RuntimeError {
    pub fn new(kind: RuntimeErrorKind) -> Self {
        RuntimeError {
            kind,
            ip: None,
            call_stack: Vec::new(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        RuntimeError::new(RuntimeErrorKind::Internal(msg.into()))
    }

    pub fn type_mismatch(expected: ValueType, found: ValueType) -> Self {
        RuntimeError::new(RuntimeErrorKind::TypeMismatch { expected, found })
    }

    pub fn incompatible(op: Operator, lhs: ValueType, rhs: Option<ValueType>) -> Self {
        let operands = match rhs {
            Some(rhs) => format!("{} {}", lhs, rhs),
            None => lhs.to_string(),
        };
        RuntimeError::new(RuntimeErrorKind::IncompatibleTypes { op, operands })
    }

    /// Attaches the failing instruction index unless one is already recorded.
    pub fn at(mut self, ip: usize) -> Self {
        self.ip.get_or_insert(ip);
        self
    }

    pub fn with_call_stack(mut self, call_stack: &[String]) -> Self {
        if self.call_stack.is_empty() {
            self.call_stack = call_stack.to_vec();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_plain() {
        let err = RuntimeError::new(RuntimeErrorKind::DivisionByZero);
        assert_eq!(err.to_string(), "runtime error: division by zero");
    }

    #[test]
    fn test_display_with_ip_and_call_stack() {
        let err = RuntimeError::new(RuntimeErrorKind::DivisionByZero)
            .at(12)
            .with_call_stack(&["outer".to_string(), "inner".to_string()]);

        let msg = err.to_string();
        assert!(msg.contains("at instruction 0012"), "msg was: {}", msg);
        assert!(msg.contains("0: inner"), "msg was: {}", msg);
        assert!(msg.contains("1: outer"), "msg was: {}", msg);
    }

    #[test]
    fn test_first_ip_wins() {
        let err = RuntimeError::internal("boom").at(3).at(9);
        assert_eq!(err.ip, Some(3));
    }

    #[test]
    fn test_incompatible_message() {
        let err = RuntimeError::incompatible(Operator::Add, ValueType::Int, Some(ValueType::Str));
        assert_eq!(err.to_string(), "runtime error: incompatible types: + int string");

        let err = RuntimeError::incompatible(Operator::Not, ValueType::Int, None);
        assert_eq!(err.to_string(), "runtime error: incompatible types: ! int");
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = RuntimeError::internal("test");
        let _: &dyn std::error::Error = &err;
    }
}
