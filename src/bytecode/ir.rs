use serde::{Deserialize, Serialize};

use crate::bytecode::Op;
use crate::bytecode::op::UNPATCHED;
use crate::lang::{operator::Operator, value::Value};

/// A compiled program: one linear instruction stream plus the tables the
/// runtime needs to size globals and name call frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramBc {
    pub code: CompiledCode,

    /// Global variable names, indexed by slot.
    pub globals: Vec<String>,

    /// Function table, ordered by entry index.
    pub functions: Vec<FuncInfo>,
}

impl ProgramBc {
    /// Encode as a postcard image.
    pub fn to_bytes(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Decode a postcard image produced by [`ProgramBc::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }

    /// The function whose body starts at `code_index`.
    pub fn function_at(&self, code_index: usize) -> Option<&FuncInfo> {
        self.functions.iter().find(|f| f.code_index == code_index)
    }
}

/// Runtime view of a compiled function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfo {
    pub name: String,
    pub code_index: usize,
    pub param_count: usize,
    pub local_count: usize,
}

/// Append-only, index-addressed instruction stream.
///
/// Instructions are never removed or reordered; the only mutation after an
/// append is patching a placeholder operand once its value is known.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledCode {
    pub ops: Vec<Op>,
}

impl CompiledCode {
    pub fn new() -> Self {
        Self { ops: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Index the next appended instruction will get ("one past the last").
    pub fn next_index(&self) -> usize {
        self.ops.len()
    }

    pub fn push(&mut self, op: Op) -> usize {
        self.ops.push(op);
        self.ops.len() - 1
    }

    pub fn push_value(&mut self, value: Value) -> usize {
        self.push(Op::Push(value))
    }

    pub fn push_operator(&mut self, op: Operator) -> usize {
        self.push(Op::Operator(op))
    }

    pub fn end_of_expression(&mut self) -> usize {
        self.push_operator(Operator::EndOfExpression)
    }

    /// Emit an unconditional jump with a placeholder target.
    pub fn reserve_jump(&mut self) -> usize {
        self.push(Op::Jump(UNPATCHED))
    }

    /// Emit a conditional jump with a placeholder target.
    pub fn reserve_jump_if_false(&mut self) -> usize {
        self.push(Op::JumpIfFalse(UNPATCHED))
    }

    pub fn patch_jump(&mut self, index: usize, target: usize) -> Result<(), String> {
        match self.ops.get_mut(index) {
            Some(Op::Jump(t)) | Some(Op::JumpIfFalse(t)) => {
                *t = target;
                Ok(())
            }
            other => Err(format!("instruction {} is not a jump: {:?}", index, other)),
        }
    }

    /// Patch the jump at `index` to land one past the last emitted instruction.
    pub fn patch_jump_here(&mut self, index: usize) -> Result<(), String> {
        let target = self.next_index();
        self.patch_jump(index, target)
    }

    /// Resolve a provisional local access to its final frame offset.
    pub fn patch_local(&mut self, index: usize, stack_index: i32) -> Result<(), String> {
        match self.ops.get_mut(index) {
            Some(Op::GetLocal(s)) | Some(Op::SetLocal(s)) => {
                *s = stack_index;
                Ok(())
            }
            other => Err(format!(
                "instruction {} is not a local access: {:?}",
                index, other
            )),
        }
    }

    pub fn patch_return(
        &mut self,
        index: usize,
        param_count: usize,
        local_count: usize,
    ) -> Result<(), String> {
        match self.ops.get_mut(index) {
            Some(Op::Return { params, locals }) => {
                *params = param_count;
                *locals = local_count;
                Ok(())
            }
            other => Err(format!("instruction {} is not a return: {:?}", index, other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_index() {
        let mut code = CompiledCode::new();
        assert_eq!(code.push_value(Value::Int(1)), 0);
        assert_eq!(code.push_value(Value::Int(2)), 1);
        assert_eq!(code.next_index(), 2);
    }

    #[test]
    fn test_reserve_and_patch_here() {
        let mut code = CompiledCode::new();
        let jump = code.reserve_jump_if_false();
        code.push_value(Value::Int(1));
        code.push(Op::Pop);
        code.patch_jump_here(jump).unwrap();

        assert_eq!(code.ops[jump], Op::JumpIfFalse(3));
    }

    #[test]
    fn test_patch_jump_backwards() {
        let mut code = CompiledCode::new();
        code.push_value(Value::Bool(true));
        let jump = code.reserve_jump();
        code.patch_jump(jump, 0).unwrap();
        assert_eq!(code.ops[jump], Op::Jump(0));
    }

    #[test]
    fn test_patch_non_jump_is_error() {
        let mut code = CompiledCode::new();
        let push = code.push_value(Value::Int(1));
        assert!(code.patch_jump(push, 0).is_err());
        assert!(code.patch_jump(99, 0).is_err());
    }

    #[test]
    fn test_patch_local_and_return() {
        let mut code = CompiledCode::new();
        let get = code.push(Op::GetLocal(0));
        let ret = code.push(Op::Return {
            params: 0,
            locals: 0,
        });

        code.patch_local(get, -2).unwrap();
        code.patch_return(ret, 2, 1).unwrap();

        assert_eq!(code.ops[get], Op::GetLocal(-2));
        assert_eq!(
            code.ops[ret],
            Op::Return {
                params: 2,
                locals: 1
            }
        );
        assert!(code.patch_local(ret, 1).is_err());
    }

    #[test]
    fn test_image_roundtrip() {
        let mut code = CompiledCode::new();
        code.push_value(Value::Str("hi".to_string()));
        code.end_of_expression();
        code.push(Op::Return {
            params: 0,
            locals: 0,
        });
        let program = ProgramBc {
            code,
            globals: vec!["x".to_string()],
            functions: vec![FuncInfo {
                name: "f".to_string(),
                code_index: 1,
                param_count: 0,
                local_count: 0,
            }],
        };

        let bytes = program.to_bytes().unwrap();
        assert_eq!(ProgramBc::from_bytes(&bytes).unwrap(), program);
        assert_eq!(program.function_at(1).map(|f| f.name.as_str()), Some("f"));
        assert!(program.function_at(0).is_none());
    }

    #[test]
    fn test_truncated_image_is_rejected() {
        let program = ProgramBc {
            code: CompiledCode::new(),
            globals: vec!["a_long_global_name".to_string()],
            functions: Vec::new(),
        };
        let bytes = program.to_bytes().unwrap();
        assert!(ProgramBc::from_bytes(&bytes[..bytes.len() / 2]).is_err());
    }
}
