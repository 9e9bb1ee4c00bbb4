use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use crate::bytecode::op::UNPATCHED;
use crate::bytecode::{FuncInfo, Op, ProgramBc};
use crate::lang::value::Value;

const RULE: &str = "════════════════════════════════════════";

/// Print disassembly of a compiled program
pub fn print_bc(bc: &ProgramBc) {
    print!("{}", disassemble(bc));
}

/// Render the instruction stream: one line per instruction, `►` on jump
/// targets and a label where each function body begins.
pub fn disassemble(bc: &ProgramBc) -> String {
    let mut out = String::new();
    let ops = &bc.code.ops;

    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, " program: {} instructions", ops.len());
    if !bc.globals.is_empty() {
        let _ = writeln!(out, " globals: {}", bc.globals.join(", "));
    }
    let _ = writeln!(out, "{}", RULE);

    let jump_targets: HashSet<usize> = ops.iter().filter_map(Op::jump_target).collect();
    let entries: HashMap<usize, &FuncInfo> =
        bc.functions.iter().map(|f| (f.code_index, f)).collect();

    for (ip, op) in ops.iter().enumerate() {
        if let Some(func) = entries.get(&ip) {
            let _ = writeln!(
                out,
                "\n{}/{}  ; {} local(s)",
                func.name, func.param_count, func.local_count
            );
        }

        let marker = if jump_targets.contains(&ip) { "►" } else { " " };
        let _ = writeln!(out, "{:04} {} {}", ip, marker, format_op(op, bc));
    }

    out
}

fn format_op(op: &Op, bc: &ProgramBc) -> String {
    match op {
        Op::Push(v) => format!("PUSH        {}", format_value(v)),

        Op::GetGlobal(slot) => format!("GET_GLOBAL  {} ({})", slot, global_name(bc, *slot)),
        Op::SetGlobal(slot) => format!("SET_GLOBAL  {} ({})", slot, global_name(bc, *slot)),
        Op::GetLocal(index) => format!("GET_LOCAL   {:+}", index),
        Op::SetLocal(index) => format!("SET_LOCAL   {:+}", index),
        Op::DeclareLocal => "DECL_LOCAL".to_string(),

        Op::Jump(target) => format!("JUMP        {}", format_target(*target)),
        Op::JumpIfFalse(target) => format!("JUMP_FALSE  {}", format_target(*target)),

        Op::Call(target) => {
            let name = bc.function_at(*target).map_or("?", |f| f.name.as_str());
            format!("CALL        {} (→ {:04})", name, target)
        }
        Op::Return { params, locals } => {
            format!("RETURN      ; params={} locals={}", params, locals)
        }

        Op::Operator(operator) => format!("OP          {}", operator),
        Op::Pop => "POP".to_string(),
    }
}

fn format_target(target: usize) -> String {
    if target == UNPATCHED {
        "→ ????".to_string()
    } else {
        format!("→ {:04}", target)
    }
}

fn global_name(bc: &ProgramBc, slot: usize) -> &str {
    bc.globals.get(slot).map_or("?", String::as_str)
}

/// Format a literal the way it would be written in source
fn format_value(v: &Value) -> String {
    match v {
        Value::Str(s) => format!("{:?}", s),
        other => other.to_string(),
    }
}
