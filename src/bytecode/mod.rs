pub mod compile;
pub mod compile_error;
pub mod disasm;
pub mod ir;
pub mod op;
pub mod symbols;
pub mod verify;

pub use ir::{CompiledCode, FuncInfo, ProgramBc};
pub use op::Op;
