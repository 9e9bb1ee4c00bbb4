use serde::{Deserialize, Serialize};

use crate::lang::{operator::Operator, value::Value};

/// Target stored by a jump that has not been back-patched yet.
pub const UNPATCHED: usize = usize::MAX;

// =============================================================================
// OP - instructions of the linear program
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Op {
    // literals
    Push(Value),

    // variables
    GetGlobal(usize),
    SetGlobal(usize),
    /// Frame-relative stack index: parameters are positive, locals count down from -1.
    GetLocal(i32),
    SetLocal(i32),
    /// Reserve one Undefined slot for a function local.
    DeclareLocal,

    // control flow (absolute targets)
    Jump(usize),
    /// Pop a bool, jump if false.
    JumpIfFalse(usize),

    // calls
    Call(usize),
    Return {
        params: usize,
        locals: usize,
    },

    /// Feed one operator symbol to the runtime precedence reducer.
    Operator(Operator),

    /// Drop the top operand (unused call result).
    Pop,
}

impl Op {
    /// Jump target, for the two jump instructions.
    pub fn jump_target(&self) -> Option<usize> {
        match self {
            Op::Jump(target) | Op::JumpIfFalse(target) => Some(*target),
            _ => None,
        }
    }
}
