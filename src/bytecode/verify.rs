use crate::bytecode::{Op, ProgramBc};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("verify error at {index:04}: {message}")]
pub struct VerifyError {
    pub index: usize,
    pub message: String,
}

impl VerifyError {
    fn new(index: usize, message: impl Into<String>) -> Self {
        Self {
            index,
            message: message.into(),
        }
    }
}

/// Static checks over a program before it is run.
///
/// This is a linear scan of operands, not a control-flow analysis: it makes
/// sure every instruction can be dispatched without indexing out of bounds,
/// which matters for images decoded from disk.
pub fn verify(program: &ProgramBc) -> Result<(), VerifyError> {
    let ops = &program.code.ops;

    match ops.last() {
        None => return Err(VerifyError::new(0, "empty instruction stream")),
        Some(Op::Return { .. }) => {}
        Some(other) => {
            return Err(VerifyError::new(
                ops.len() - 1,
                format!("stream must end in a return, found {:?}", other),
            ));
        }
    }

    for func in &program.functions {
        if func.code_index >= ops.len() {
            return Err(VerifyError::new(
                func.code_index,
                format!("function '{}' starts outside the stream", func.name),
            ));
        }
    }

    for (index, op) in ops.iter().enumerate() {
        match op {
            Op::Jump(target) | Op::JumpIfFalse(target) if *target >= ops.len() => {
                return Err(VerifyError::new(
                    index,
                    format!("jump target {} out of range", target),
                ));
            }
            Op::Call(target) if program.function_at(*target).is_none() => {
                return Err(VerifyError::new(
                    index,
                    format!("call target {} is not a function entry", target),
                ));
            }
            Op::GetGlobal(slot) | Op::SetGlobal(slot) if *slot >= program.globals.len() => {
                return Err(VerifyError::new(
                    index,
                    format!("global slot {} out of range", slot),
                ));
            }
            _ => {}
        }
    }

    Ok(())
}
