use std::collections::HashMap;

use tracing::debug;

use crate::bytecode::compile_error::{CompileError, CompileErrorKind};
use crate::bytecode::symbols::{FuncDef, GlobalTable};
use crate::bytecode::{CompiledCode, FuncInfo, Op, ProgramBc};
use crate::frontend::scanner::{Scanner, is_keyword};
use crate::lang::{operator::Operator, value::Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerConfig {
    /// Reject assignment to names that were never declared with `var`.
    ///
    /// When off, a top-level assignment to an unknown name declares a global
    /// once its right-hand side has been compiled. Function bodies are always
    /// strict.
    pub strict: bool,

    /// Deepest allowed nesting of parentheses, call arguments and statement
    /// bodies. Deeper input fails with [`CompileErrorKind::NestingTooDeep`].
    pub max_nesting: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: true,
            max_nesting: 256,
        }
    }
}

/// The function whose body is being compiled.
struct FunctionScope {
    def: FuncDef,
    /// Local accesses emitted with a provisional offset, by variable name.
    local_fixups: Vec<(usize, String)>,
    /// `Return` instructions waiting for the final parameter and local counts.
    return_fixups: Vec<usize>,
}

enum VarRef {
    Local,
    Global(usize),
}

/// Single-pass compiler: recursive descent over the source text, emitting
/// instructions as each rule completes. No syntax tree is built.
///
/// Expressions are emitted in infix order, operators included; precedence is
/// resolved by the VM's operator stack at run time. Every expression is closed
/// by an `EndOfExpression` operator that flushes the pending operators.
pub struct Compiler<'a> {
    scanner: Scanner<'a>,
    config: CompilerConfig,

    /// Output instruction stream
    code: CompiledCode,

    globals: GlobalTable,

    /// Functions whose bodies are complete
    functions: HashMap<String, FuncDef>,

    /// Function table in entry order
    infos: Vec<FuncInfo>,

    current: Option<FunctionScope>,

    /// Open expressions and statement bodies
    depth: usize,
}

impl<'a> Compiler<'a> {
    pub fn new(source: &'a str) -> Self {
        Self::with_config(source, CompilerConfig::default())
    }

    pub fn with_config(source: &'a str, config: CompilerConfig) -> Self {
        Self {
            scanner: Scanner::new(source),
            config,
            code: CompiledCode::new(),
            globals: GlobalTable::new(),
            functions: HashMap::new(),
            infos: Vec::new(),
            current: None,
            depth: 0,
        }
    }

    /// Compile a whole program:
    ///
    /// ```text
    /// {var} <jump> {function} <patch> {var} {statement} EOF
    /// ```
    ///
    /// Function bodies sit between the leading declarations and the
    /// top-level statements, skipped over by a single forward jump.
    pub fn compile_program(mut self) -> Result<ProgramBc, CompileError> {
        self.var_declarations()?;

        let skip_functions = self.code.reserve_jump();
        while self.scanner.parse_keyword("function") {
            self.function()?;
        }
        self.code
            .patch_jump_here(skip_functions)
            .map_err(|msg| self.internal(msg))?;

        self.var_declarations()?;
        while !self.scanner.at_end() {
            self.statement()?;
        }

        // falling off the end yields 0
        self.code.push_value(Value::Int(0));
        self.code.end_of_expression();
        self.code.push(Op::Return {
            params: 0,
            locals: 0,
        });

        Ok(self.finish())
    }

    /// Compile a single expression (expression mode). The resulting program
    /// evaluates the expression and returns its value.
    pub fn compile_expression(mut self) -> Result<ProgramBc, CompileError> {
        self.expression()?;
        if !self.scanner.at_end() {
            return Err(self.scanner.error(CompileErrorKind::ExpectedEnd));
        }

        self.code.end_of_expression();
        self.code.push(Op::Return {
            params: 0,
            locals: 0,
        });

        Ok(self.finish())
    }

    fn finish(self) -> ProgramBc {
        debug!(
            ops = self.code.len(),
            globals = self.globals.len(),
            functions = self.infos.len(),
            "compiled program"
        );

        ProgramBc {
            code: self.code,
            globals: self.globals.into_names(),
            functions: self.infos,
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    /// `var name [= expr] {, name [= expr]} ;`, repeated.
    ///
    /// Inside a function each name becomes a frame local (one `DeclareLocal`
    /// each); at top level it becomes a global slot.
    fn var_declarations(&mut self) -> Result<(), CompileError> {
        while self.scanner.parse_keyword("var") {
            loop {
                let (name, pos) = self.name("variable name")?;

                if let Some(scope) = self.current.as_mut() {
                    if scope.def.add_local(name).is_none() {
                        let function = scope.def.name.clone();
                        return Err(self.scanner.error_at(
                            CompileErrorKind::DuplicateLocal {
                                function,
                                name: name.to_string(),
                            },
                            pos,
                        ));
                    }
                    self.code.push(Op::DeclareLocal);
                } else {
                    self.globals.declare(name);
                }

                if self.scanner.parse_char('=') {
                    self.expression()?;
                    self.code.end_of_expression();
                    self.emit_store(name, pos)?;
                }

                if !self.scanner.parse_char(',') {
                    break;
                }
            }
            self.expect_char(';')?;
        }
        Ok(())
    }

    /// `function name ( [param {, param}] ) { {var} {statement} }`
    ///
    /// The `function` keyword has already been consumed.
    fn function(&mut self) -> Result<(), CompileError> {
        let (name, pos) = self.name("function name")?;
        if self.functions.contains_key(name) {
            return Err(self
                .scanner
                .error_at(CompileErrorKind::DuplicateFunction(name.to_string()), pos));
        }

        // No code is emitted by the header, so the entry is the next index.
        let mut def = FuncDef::new(name, self.code.next_index());

        self.expect_char('(')?;
        if !self.scanner.parse_char(')') {
            loop {
                let (param, param_pos) = self.name("parameter name")?;
                if def.add_parameter(param).is_none() {
                    return Err(self.scanner.error_at(
                        CompileErrorKind::DuplicateParameter {
                            function: name.to_string(),
                            name: param.to_string(),
                        },
                        param_pos,
                    ));
                }
                if self.scanner.parse_char(')') {
                    break;
                }
                self.expect_char(',')?;
            }
        }

        self.current = Some(FunctionScope {
            def,
            local_fixups: Vec::new(),
            return_fixups: Vec::new(),
        });

        self.expect_char('{')?;
        self.var_declarations()?;
        self.statements_until_brace()?;

        // default `return 0`
        self.code.push_value(Value::Int(0));
        self.code.end_of_expression();
        self.emit_return();

        self.finish_function()
    }

    /// Assign final frame offsets and patch every provisional access and
    /// return of the function just compiled.
    fn finish_function(&mut self) -> Result<(), CompileError> {
        let Some(mut scope) = self.current.take() else {
            return Err(self.internal("no function is being compiled".to_string()));
        };

        scope.def.set_stack_index_for_local_vars();

        for (index, name) in &scope.local_fixups {
            let stack_index = scope
                .def
                .local(name)
                .and_then(|local| local.stack_index)
                .ok_or_else(|| self.internal(format!("unresolved local '{}'", name)))?;
            self.code
                .patch_local(*index, stack_index)
                .map_err(|msg| self.internal(msg))?;
        }

        let params = scope.def.param_count;
        let locals = scope.def.local_count();
        for index in &scope.return_fixups {
            self.code
                .patch_return(*index, params, locals)
                .map_err(|msg| self.internal(msg))?;
        }

        debug!(
            function = %scope.def.name,
            entry = scope.def.code_index,
            params,
            locals,
            "compiled function"
        );

        self.infos.push(scope.def.info());
        self.functions.insert(scope.def.name.clone(), scope.def);
        Ok(())
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn statement(&mut self) -> Result<(), CompileError> {
        if self.scanner.parse_keyword("return") {
            return self.return_statement();
        }
        if self.scanner.parse_keyword("if") {
            return self.if_statement();
        }
        if self.scanner.parse_keyword("while") {
            return self.while_statement();
        }
        self.scanner.skip_blanks();
        let pos = self.scanner.position();
        if self.scanner.parse_keyword("var") {
            let rule = if self.current.is_some() {
                "local declarations only at the start of a function body"
            } else {
                "global declarations only before the first statement"
            };
            return Err(self
                .scanner
                .error_at(CompileErrorKind::Expected(rule.to_string()), pos));
        }

        let (name, pos) = self.name("statement")?;

        if self.scanner.parse_char('(') {
            // call statement: the result is discarded
            self.call(name, pos)?;
            self.expect_char(';')?;
            self.code.push(Op::Pop);
            return Ok(());
        }

        if self.scanner.parse_char('=') {
            self.expression()?;
            self.code.end_of_expression();
            self.emit_store(name, pos)?;
            return self.expect_char(';');
        }

        Err(self
            .scanner
            .error(CompileErrorKind::Expected("'=' or '('".to_string())))
    }

    /// `return [expr] ;` with the keyword already consumed.
    fn return_statement(&mut self) -> Result<(), CompileError> {
        if self.scanner.parse_char(';') {
            self.code.push_value(Value::Undefined);
        } else {
            self.expression()?;
            self.code.end_of_expression();
            self.expect_char(';')?;
        }
        self.emit_return();
        Ok(())
    }

    /// `if expr body [else body]`; `else if` is an `if` statement as the
    /// else body.
    fn if_statement(&mut self) -> Result<(), CompileError> {
        self.expression()?;
        self.code.end_of_expression();
        let to_else = self.code.reserve_jump_if_false();

        self.body()?;

        if self.scanner.parse_keyword("else") {
            let to_end = self.code.reserve_jump();
            self.code
                .patch_jump_here(to_else)
                .map_err(|msg| self.internal(msg))?;
            self.body()?;
            self.code
                .patch_jump_here(to_end)
                .map_err(|msg| self.internal(msg))?;
        } else {
            self.code
                .patch_jump_here(to_else)
                .map_err(|msg| self.internal(msg))?;
        }
        Ok(())
    }

    /// `while expr body`
    fn while_statement(&mut self) -> Result<(), CompileError> {
        let loop_start = self.code.next_index();

        self.expression()?;
        self.code.end_of_expression();
        let to_exit = self.code.reserve_jump_if_false();

        self.body()?;

        let back_edge = self.code.reserve_jump();
        self.code
            .patch_jump(back_edge, loop_start)
            .map_err(|msg| self.internal(msg))?;
        self.code
            .patch_jump_here(to_exit)
            .map_err(|msg| self.internal(msg))
    }

    /// A `{ ... }` block or a single statement.
    fn body(&mut self) -> Result<(), CompileError> {
        self.enter()?;
        if self.scanner.parse_char('{') {
            self.statements_until_brace()?;
        } else {
            self.statement()?;
        }
        self.depth -= 1;
        Ok(())
    }

    fn statements_until_brace(&mut self) -> Result<(), CompileError> {
        loop {
            if self.scanner.parse_char('}') {
                return Ok(());
            }
            if self.scanner.at_end() {
                return Err(self
                    .scanner
                    .error(CompileErrorKind::Expected("'}'".to_string())));
            }
            self.statement()?;
        }
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// `operand {binaryOp operand}`. The caller closes it with
    /// `EndOfExpression` (or `)` inside parentheses).
    fn expression(&mut self) -> Result<(), CompileError> {
        self.enter()?;
        self.operand()?;
        while let Some(op) = self.scanner.parse_binary_operator() {
            self.code.push_operator(op);
            self.operand()?;
        }
        self.depth -= 1;
        Ok(())
    }

    /// `[unaryOp] primary`
    fn operand(&mut self) -> Result<(), CompileError> {
        if let Some(op) = self.scanner.parse_unary_operator() {
            self.code.push_operator(op);
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<(), CompileError> {
        if self.scanner.parse_char('(') {
            self.code.push_operator(Operator::LParen);
            self.expression()?;
            self.expect_char(')')?;
            self.code.push_operator(Operator::RParen);
            return Ok(());
        }

        if let Some(string) = self.scanner.read_string()? {
            self.code.push_value(Value::Str(string));
            return Ok(());
        }

        if let Some(number) = self.scanner.read_number()? {
            self.code.push_value(number);
            return Ok(());
        }

        if self.scanner.parse_keyword("true") {
            self.code.push_value(Value::Bool(true));
            return Ok(());
        }
        if self.scanner.parse_keyword("false") {
            self.code.push_value(Value::Bool(false));
            return Ok(());
        }

        let (name, pos) = self.name("operand")?;
        if self.scanner.parse_char('(') {
            self.call(name, pos)
        } else {
            self.emit_load(name, pos)
        }
    }

    /// Argument list and call of `name`; the opening `(` is consumed.
    ///
    /// Each argument is a full expression flushed down to the `PrepareCall`
    /// barrier, so the arguments end up on the stack in order.
    fn call(&mut self, name: &str, pos: usize) -> Result<(), CompileError> {
        let Some((target, expected)) = self.lookup_function(name) else {
            return Err(self
                .scanner
                .error_at(CompileErrorKind::UndeclaredFunction(name.to_string()), pos));
        };

        self.code.push_operator(Operator::PrepareCall);

        let mut found = 0;
        if !self.scanner.parse_char(')') {
            loop {
                self.expression()?;
                self.code.end_of_expression();
                found += 1;
                if self.scanner.parse_char(')') {
                    break;
                }
                self.expect_char(',')?;
            }
        }

        if found != expected {
            return Err(self.scanner.error_at(
                CompileErrorKind::ArgumentCount {
                    name: name.to_string(),
                    expected,
                    found,
                },
                pos,
            ));
        }

        self.code.push(Op::Call(target));
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Entry index and arity. The function being compiled is visible to
    /// itself, so direct recursion works.
    fn lookup_function(&self, name: &str) -> Option<(usize, usize)> {
        if let Some(scope) = &self.current
            && scope.def.name == name
        {
            return Some((scope.def.code_index, scope.def.param_count));
        }
        self.functions
            .get(name)
            .map(|def| (def.code_index, def.param_count))
    }

    /// Locals of the current function shadow globals.
    fn resolve(&self, name: &str) -> Option<VarRef> {
        if let Some(scope) = &self.current
            && scope.def.local(name).is_some()
        {
            return Some(VarRef::Local);
        }
        self.globals.get(name).map(|def| VarRef::Global(def.slot))
    }

    fn emit_load(&mut self, name: &str, pos: usize) -> Result<(), CompileError> {
        match self.resolve(name) {
            Some(VarRef::Local) => {
                let index = self.code.push(Op::GetLocal(0));
                self.add_local_fixup(index, name);
                Ok(())
            }
            Some(VarRef::Global(slot)) => {
                self.code.push(Op::GetGlobal(slot));
                Ok(())
            }
            None => Err(self
                .scanner
                .error_at(CompileErrorKind::UndeclaredVariable(name.to_string()), pos)),
        }
    }

    fn emit_store(&mut self, name: &str, pos: usize) -> Result<(), CompileError> {
        let target = match self.resolve(name) {
            Some(target) => target,
            None if !self.config.strict && self.current.is_none() => {
                VarRef::Global(self.globals.declare(name).slot)
            }
            None => {
                return Err(self
                    .scanner
                    .error_at(CompileErrorKind::UndeclaredVariable(name.to_string()), pos));
            }
        };

        match target {
            VarRef::Local => {
                let index = self.code.push(Op::SetLocal(0));
                self.add_local_fixup(index, name);
            }
            VarRef::Global(slot) => {
                self.code.push(Op::SetGlobal(slot));
            }
        }
        Ok(())
    }

    fn add_local_fixup(&mut self, index: usize, name: &str) {
        if let Some(scope) = self.current.as_mut() {
            scope.local_fixups.push((index, name.to_string()));
        }
    }

    /// Emit a `Return`; inside a function its counts are patched later.
    fn emit_return(&mut self) {
        let index = self.code.push(Op::Return {
            params: 0,
            locals: 0,
        });
        if let Some(scope) = self.current.as_mut() {
            scope.return_fixups.push(index);
        }
    }

    /// An identifier that is not a keyword.
    fn name(&mut self, what: &str) -> Result<(&'a str, usize), CompileError> {
        self.scanner.skip_blanks();
        let pos = self.scanner.position();
        let Some(name) = self.scanner.parse_identifier() else {
            return Err(self
                .scanner
                .error(CompileErrorKind::Expected(what.to_string())));
        };
        if is_keyword(name) {
            return Err(self
                .scanner
                .error_at(CompileErrorKind::ReservedWord(name.to_string()), pos));
        }
        Ok((name, pos))
    }

    /// Open one level of recursive descent. The caller closes it on success;
    /// after an error the compiler is discarded, so the count is not unwound.
    fn enter(&mut self) -> Result<(), CompileError> {
        if self.depth >= self.config.max_nesting {
            return Err(self
                .scanner
                .error(CompileErrorKind::NestingTooDeep(self.config.max_nesting)));
        }
        self.depth += 1;
        Ok(())
    }

    fn expect_char(&mut self, symbol: char) -> Result<(), CompileError> {
        if self.scanner.parse_char(symbol) {
            Ok(())
        } else {
            Err(self
                .scanner
                .error(CompileErrorKind::Expected(format!("'{}'", symbol))))
        }
    }

    fn internal(&self, msg: String) -> CompileError {
        self.scanner.error(CompileErrorKind::Internal(msg))
    }
}
