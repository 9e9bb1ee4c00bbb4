use tracing::{debug, trace};

use crate::bytecode::ProgramBc;
use crate::bytecode::op::Op;
use crate::bytecode::verify::verify;
use crate::lang::{operator::Operator, value::Value};
use crate::runtime::arith::{apply_binary, apply_unary};
use crate::runtime::runtime_error::{RuntimeError, RuntimeErrorKind};

#[derive(Debug, Clone)]
pub struct VmBcConfig {
    pub max_call_depth: usize,
    pub max_steps: Option<usize>,
    pub max_stack_size: usize,
}

impl Default for VmBcConfig {
    fn default() -> Self {
        VmBcConfig {
            max_call_depth: 1000,
            max_steps: None,
            max_stack_size: 10_000,
        }
    }
}

/// One cell of the unified stack.
///
/// Expression temporaries, call arguments, frame links and locals all live on
/// the same stack; the link cells are typed so a discipline violation shows
/// up as an error instead of a value silently read as an address.
#[derive(Debug, Clone, PartialEq)]
enum Slot {
    Value(Value),
    ReturnAddress(usize),
    SavedBp(usize),
}

/// Stack machine for compiled programs.
///
/// A call frame on the unified stack looks like
///
/// ```text
/// [arg0 .. argN-1] [return address] [saved bp] <bp> [local0 .. localM-1] [temporaries]
/// ```
///
/// and a frame-relative stack index `i` addresses `bp - 1 - i`. Operators
/// arrive in infix order and are reduced on a separate operator stack by
/// priority; `(` and `PrepareCall` act as barriers.
pub struct VmBc {
    stack: Vec<Slot>,
    operators: Vec<Operator>,
    globals: Vec<Value>,
    ip: usize,
    bp: usize,
    // Safety limits
    config: VmBcConfig,
    call_stack: Vec<String>,
    steps: usize,
}

impl Default for VmBc {
    fn default() -> Self {
        Self::new()
    }
}

impl VmBc {
    pub fn new() -> Self {
        Self::with_config(VmBcConfig::default())
    }

    pub fn with_config(config: VmBcConfig) -> Self {
        Self {
            stack: Vec::new(),
            operators: Vec::new(),
            globals: Vec::new(),
            ip: 0,
            bp: 0,
            config,
            call_stack: Vec::new(),
            steps: 0,
        }
    }

    /// Global values after the last run, indexed by slot.
    pub fn globals(&self) -> &[Value] {
        &self.globals
    }

    /// Instructions dispatched by the last run.
    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn reset_execution_state(&mut self) {
        self.stack.clear();
        self.operators.clear();
        self.globals.clear();
        self.ip = 0;
        self.bp = 0;
        self.steps = 0;
        self.call_stack.clear();
    }

    /// Verify and execute `prog` until its top-level return.
    pub fn run(&mut self, prog: &ProgramBc) -> Result<Value, RuntimeError> {
        verify(prog)
            .map_err(|e| RuntimeError::new(RuntimeErrorKind::InvalidBytecode(e.to_string())))?;

        self.reset_execution_state();
        self.globals = vec![Value::Undefined; prog.globals.len()];

        let value = self
            .exec(prog)
            .map_err(|e| e.with_call_stack(&self.call_stack))?;

        debug!(
            steps = self.steps,
            result = value.type_name(),
            "execution finished"
        );
        Ok(value)
    }

    // Execution

    fn check_limits(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;

        if let Some(max) = self.config.max_steps {
            if self.steps > max {
                return Err(RuntimeErrorKind::StepLimitExceeded(max).into());
            }
        }

        Ok(())
    }

    fn exec(&mut self, prog: &ProgramBc) -> Result<Value, RuntimeError> {
        loop {
            let ip = self.ip;
            self.check_limits().map_err(|e| e.at(ip))?;

            let op = prog
                .code
                .ops
                .get(ip)
                .ok_or_else(|| RuntimeError::internal("instruction pointer out of range"))?;

            trace!(ip, op = ?op, height = self.stack.len(), "exec");

            self.ip = ip + 1;
            if let Some(result) = self.step(prog, op).map_err(|e| e.at(ip))? {
                return Ok(result);
            }
        }
    }

    /// Execute one instruction; `Some` is the program result.
    fn step(&mut self, prog: &ProgramBc, op: &Op) -> Result<Option<Value>, RuntimeError> {
        match op {
            Op::Push(v) => self.push(v.clone())?,

            Op::GetGlobal(slot) => {
                let value = self
                    .globals
                    .get(*slot)
                    .cloned()
                    .ok_or_else(|| RuntimeError::internal(format!("no global slot {}", slot)))?;
                self.push(value)?;
            }
            Op::SetGlobal(slot) => {
                let value = self.pop_value()?;
                let cell = self
                    .globals
                    .get_mut(*slot)
                    .ok_or_else(|| RuntimeError::internal(format!("no global slot {}", slot)))?;
                *cell = value;
            }

            Op::GetLocal(index) => {
                let address = self.local_address(*index)?;
                let value = match &self.stack[address] {
                    Slot::Value(v) => v.clone(),
                    other => {
                        return Err(RuntimeError::internal(format!(
                            "local {} resolves to {:?}",
                            index, other
                        )));
                    }
                };
                self.push(value)?;
            }
            Op::SetLocal(index) => {
                let value = self.pop_value()?;
                let address = self.local_address(*index)?;
                match &mut self.stack[address] {
                    Slot::Value(cell) => *cell = value,
                    other => {
                        return Err(RuntimeError::internal(format!(
                            "local {} resolves to {:?}",
                            index, other
                        )));
                    }
                }
            }
            Op::DeclareLocal => self.push(Value::Undefined)?,

            Op::Jump(target) => self.ip = *target,
            Op::JumpIfFalse(target) => match self.pop_value()? {
                Value::Bool(true) => {}
                Value::Bool(false) => self.ip = *target,
                other => {
                    return Err(RuntimeErrorKind::ConditionNotBool(other.value_type()).into());
                }
            },

            Op::Call(target) => self.call(prog, *target)?,
            Op::Return { params, locals } => return self.ret(*params, *locals),

            Op::Operator(operator) => self.operator(*operator)?,

            Op::Pop => {
                self.pop_value()?;
            }
        }

        Ok(None)
    }

    fn call(&mut self, prog: &ProgramBc, target: usize) -> Result<(), RuntimeError> {
        if self.call_stack.len() >= self.config.max_call_depth {
            return Err(RuntimeErrorKind::CallDepthExceeded(self.config.max_call_depth).into());
        }

        let name = prog
            .function_at(target)
            .map_or_else(|| format!("<{:04}>", target), |f| f.name.clone());

        self.push_slot(Slot::ReturnAddress(self.ip))?;
        self.push_slot(Slot::SavedBp(self.bp))?;
        self.bp = self.stack.len();
        self.ip = target;

        trace!(function = %name, bp = self.bp, depth = self.call_stack.len() + 1, "call");
        self.call_stack.push(name);
        Ok(())
    }

    /// A `Return` under a pending `PrepareCall` unwinds one frame; otherwise it
    /// is the end of the program and the stacks must hold exactly the result.
    fn ret(&mut self, params: usize, locals: usize) -> Result<Option<Value>, RuntimeError> {
        if self.operators.last() != Some(&Operator::PrepareCall) {
            let result = self.pop_value()?;
            if !self.stack.is_empty() || !self.operators.is_empty() {
                return Err(RuntimeError::internal(format!(
                    "{} value(s) and {} operator(s) left at program end",
                    self.stack.len(),
                    self.operators.len()
                )));
            }
            return Ok(Some(result));
        }
        self.operators.pop();

        let result = self.pop_value()?;
        if self.stack.len() != self.bp + locals {
            return Err(RuntimeError::internal(format!(
                "frame holds {} slot(s) above bp, expected {} local(s)",
                self.stack.len().saturating_sub(self.bp),
                locals
            )));
        }
        for _ in 0..locals {
            self.pop_value()?;
        }

        match self.pop_slot()? {
            Slot::SavedBp(bp) => self.bp = bp,
            other => {
                return Err(RuntimeError::internal(format!(
                    "expected saved bp, found {:?}",
                    other
                )));
            }
        }
        match self.pop_slot()? {
            Slot::ReturnAddress(ip) => self.ip = ip,
            other => {
                return Err(RuntimeError::internal(format!(
                    "expected return address, found {:?}",
                    other
                )));
            }
        }
        for _ in 0..params {
            self.pop_value()?;
        }

        let name = self.call_stack.pop().unwrap_or_default();
        trace!(function = %name, bp = self.bp, "return");

        self.push(result)?;
        Ok(None)
    }

    // Operator reduction

    fn operator(&mut self, op: Operator) -> Result<(), RuntimeError> {
        match op {
            Operator::LParen | Operator::PrepareCall => self.operators.push(op),

            Operator::RParen => loop {
                match self.operators.pop() {
                    Some(Operator::LParen) => break,
                    Some(Operator::PrepareCall) | None => {
                        return Err(RuntimeError::internal("')' without matching '('"));
                    }
                    Some(pending) => self.reduce(pending)?,
                }
            },

            _ => {
                // prefix operators are right-associative: they never reduce
                if !op.is_unary() {
                    while let Some(&top) = self.operators.last() {
                        if top.is_barrier() || top.priority() < op.priority() {
                            break;
                        }
                        self.operators.pop();
                        self.reduce(top)?;
                    }
                }
                if op != Operator::EndOfExpression {
                    self.operators.push(op);
                }
            }
        }
        Ok(())
    }

    fn reduce(&mut self, op: Operator) -> Result<(), RuntimeError> {
        let result = if op.is_unary() {
            let value = self.pop_value()?;
            apply_unary(op, value)?
        } else {
            let rhs = self.pop_value()?;
            let lhs = self.pop_value()?;
            apply_binary(op, lhs, rhs)?
        };
        self.push(result)
    }

    // Stack operations

    fn local_address(&self, stack_index: i32) -> Result<usize, RuntimeError> {
        let address = self.bp as i64 - 1 - i64::from(stack_index);
        usize::try_from(address)
            .ok()
            .filter(|a| *a < self.stack.len())
            .ok_or_else(|| {
                RuntimeError::internal(format!(
                    "local {} is outside the frame (bp {})",
                    stack_index, self.bp
                ))
            })
    }

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        self.push_slot(Slot::Value(value))
    }

    fn push_slot(&mut self, slot: Slot) -> Result<(), RuntimeError> {
        if self.stack.len() >= self.config.max_stack_size {
            return Err(RuntimeErrorKind::StackOverflow(self.config.max_stack_size).into());
        }
        self.stack.push(slot);
        Ok(())
    }

    fn pop_slot(&mut self) -> Result<Slot, RuntimeError> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("stack underflow"))
    }

    fn pop_value(&mut self) -> Result<Value, RuntimeError> {
        match self.pop_slot()? {
            Slot::Value(v) => Ok(v),
            other => Err(RuntimeError::internal(format!(
                "expected a value, found {:?}",
                other
            ))),
        }
    }
}
