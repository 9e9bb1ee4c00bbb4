//! # Cinder
//!
//! A small imperative scripting language: globals, recursive functions with
//! parameters and locals, `if`/`else`, `while`, and int, double, string and
//! bool values with numeric promotion.
//!
//! Source text goes through a single-pass [`Compiler`] straight into a linear
//! instruction stream ([`ProgramBc`]), which the stack machine [`VmBc`] runs
//! to a single [`Value`].
//!
//! ```text
//! var total = 0;
//! function add(a, b) { return a + b; }
//! total = add(2, 3) * 4;
//! return total;
//! ```

pub mod bytecode;
pub mod frontend;
pub mod lang;
pub mod runtime;

pub use bytecode::ProgramBc;
pub use bytecode::compile::{Compiler, CompilerConfig};
pub use bytecode::compile_error::{CompileError, CompileErrorKind};
pub use lang::value::Value;
pub use runtime::runtime_error::{RuntimeError, RuntimeErrorKind};
pub use runtime::vm_bc::{VmBc, VmBcConfig};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error("invalid program image: {0}")]
    Image(#[from] postcard::Error),
}

/// Compile a program in strict mode.
pub fn compile(source: &str) -> Result<ProgramBc, CompileError> {
    Compiler::new(source).compile_program()
}

pub fn compile_with(source: &str, config: CompilerConfig) -> Result<ProgramBc, CompileError> {
    Compiler::with_config(source, config).compile_program()
}

/// Compile a single expression. Useful for validating user input on its own.
pub fn compile_expression(source: &str) -> Result<ProgramBc, CompileError> {
    Compiler::new(source).compile_expression()
}

/// Run a compiled program with the default VM limits.
pub fn exec(program: &ProgramBc) -> Result<Value, RuntimeError> {
    VmBc::new().run(program)
}

/// Compile and run a program.
pub fn run(source: &str) -> Result<Value, Error> {
    let program = compile(source)?;
    Ok(exec(&program)?)
}

/// Compile and evaluate a single expression.
pub fn calc_expression(source: &str) -> Result<Value, Error> {
    let program = compile_expression(source)?;
    Ok(exec(&program)?)
}

/// Decode a program image written by [`ProgramBc::to_bytes`].
pub fn load_image(bytes: &[u8]) -> Result<ProgramBc, Error> {
    Ok(ProgramBc::from_bytes(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_ok(source: &str) -> Value {
        run(source).unwrap_or_else(|e| panic!("program failed: {}\n{}", e, source))
    }

    fn calc(source: &str) -> Value {
        calc_expression(source).unwrap_or_else(|e| panic!("expression failed: {}", e))
    }

    fn assert_compile_error(source: &str) -> CompileErrorKind {
        match run(source) {
            Err(Error::Compile(e)) => e.kind,
            other => panic!("expected compile error for {:?}, got {:?}", source, other),
        }
    }

    fn assert_runtime_error(source: &str) -> RuntimeErrorKind {
        match run(source) {
            Err(Error::Runtime(e)) => e.kind,
            other => panic!("expected runtime error for {:?}, got {:?}", source, other),
        }
    }

    // ============================================================
    // Expressions
    // ============================================================

    #[test]
    fn test_precedence() {
        assert_eq!(calc("2+3*4"), Value::Int(14));
        assert_eq!(calc("-(1+2)"), Value::Int(-3));
        assert_eq!(calc(" -(50/10)*(-1)/(-1)"), Value::Int(-5));
        assert_eq!(calc("1 + (10*3 + 9) / 13"), Value::Int(4));
        assert_eq!(calc("10 - 4 - 3"), Value::Int(3));
        assert_eq!(calc("2 * -3 + 1"), Value::Int(-5));
        assert_eq!(calc("17 % 5 * 2"), Value::Int(4));
    }

    #[test]
    fn test_numeric_promotion() {
        assert_eq!(calc("2.0+3"), Value::Double(5.0));
        assert_eq!(calc("2+3.0"), Value::Double(5.0));
        assert_eq!(calc("7/2"), Value::Int(3));
        assert_eq!(calc("7.0/2"), Value::Double(3.5));
        assert_eq!(calc("1.5e1 - 5"), Value::Double(10.0));
    }

    #[test]
    fn test_double_equality_is_approximate_but_inequality_exact() {
        // 0.1 + 0.2 and 0.3 differ in the last bit
        assert_eq!(calc("0.1 + 0.2 == 0.3"), Value::Bool(true));
        assert_eq!(calc("0.1 + 0.2 != 0.3"), Value::Bool(true));
        assert_eq!(calc("0.1 + 0.2 > 0.3"), Value::Bool(true));
        assert_eq!(calc("0.5 == 0.25 + 0.25"), Value::Bool(true));
        assert_eq!(calc("0.5 != 0.25 + 0.25"), Value::Bool(false));
    }

    #[test]
    fn test_logic_and_comparison() {
        assert_eq!(calc("1 < 2 && 2 < 3"), Value::Bool(true));
        assert_eq!(calc("!(1 > 2) || false"), Value::Bool(true));
        assert_eq!(calc("'abc' < 'abd'"), Value::Bool(true));
        assert_eq!(calc("false < true"), Value::Bool(true));
    }

    #[test]
    fn test_strings() {
        assert_eq!(calc("'foo' + 'bar'"), Value::Str("foobar".to_string()));
        assert_eq!(calc(r"'a\'b'"), Value::Str("a'b".to_string()));
        assert_eq!(calc(r"@'a\'"), Value::Str(r"a\".to_string()));
    }

    #[test]
    fn test_expression_mode_rejects() {
        for source in ["((24 + 3) 4)", "(24 + 3", "24 + 3)", "24 + (3 & 6)", "24 + 12x"] {
            assert!(
                matches!(calc_expression(source), Err(Error::Compile(_))),
                "accepted: {}",
                source
            );
        }
    }

    // ============================================================
    // Control flow
    // ============================================================

    #[test]
    fn test_while_counts_to_ten() {
        assert_eq!(
            run_ok("var i = 0; while (i < 10) { i = i + 1; } return i;"),
            Value::Int(10)
        );
    }

    #[test]
    fn test_if_else_chain_selects_one_branch() {
        let source = "
            var hits = 0;
            function classify(n) {
                if (n < 0) { hits = hits + 1; return 'neg'; }
                else if (n == 0) { hits = hits + 1; return 'zero'; }
                else { hits = hits + 1; return 'pos'; }
            }
            var s = classify(-5) + classify(0) + classify(7);
            if (hits == 3) return s; else return 'wrong';
        ";
        assert_eq!(run_ok(source), Value::Str("negzeropos".to_string()));
    }

    #[test]
    fn test_nested_loops() {
        let source = "
            var i = 0, total = 0, j;
            while (i < 4) {
                j = 0;
                while (j < i) { total = total + j; j = j + 1; }
                i = i + 1;
            }
            return total;
        ";
        // 0 + (0) + (0+1) + (0+1+2)
        assert_eq!(run_ok(source), Value::Int(4));
    }

    #[test]
    fn test_condition_must_be_bool() {
        assert_eq!(
            assert_runtime_error("var x = 1; if (x) x = 2;"),
            RuntimeErrorKind::ConditionNotBool(lang::types::ValueType::Int)
        );
    }

    // ============================================================
    // Functions
    // ============================================================

    #[test]
    fn test_recursive_factorial() {
        let source = "
            function factorial(n) {
                if (n<=1) return 1; else return n*factorial(n-1);
            }
            return factorial(4);
        ";
        assert_eq!(run_ok(source), Value::Int(24));
    }

    #[test]
    fn test_fibonacci_in_expression() {
        let source = "
            function fib(n) { if (n < 2) return n; return fib(n - 1) + fib(n - 2); }
            return 1 + fib(10) * 2;
        ";
        assert_eq!(run_ok(source), Value::Int(111));
    }

    #[test]
    fn test_falling_off_function_returns_zero() {
        assert_eq!(
            run_ok("function f(n) { if (n > 100) { return 1; } } return f(1);"),
            Value::Int(0)
        );
        assert_eq!(run_ok("function f() { var x; x = 1; } return f();"), Value::Int(0));
    }

    #[test]
    fn test_program_without_return_yields_zero() {
        assert_eq!(run_ok("var x = 5;"), Value::Int(0));
    }

    #[test]
    fn test_bare_return_is_undefined() {
        assert_eq!(run_ok("function f() { return; } return f();"), Value::Undefined);
    }

    #[test]
    fn test_discarded_result_keeps_caller_stack_intact() {
        let source = "
            var a = 2, b = 3;
            function side(x, y) { var t; t = x * y; return t; }
            function caller(p) {
                var q = 10;
                side(p, q);
                side(q, p);
                return p + q;
            }
            side(a, b);
            return caller(a) + b;
        ";
        assert_eq!(run_ok(source), Value::Int(15));
    }

    #[test]
    fn test_arguments_are_evaluated_expressions() {
        let source = "
            function sub(a, b) { return a - b; }
            return sub(10 - 2 * 3, (1 + 1)) * sub(sub(5, 1), 2);
        ";
        assert_eq!(run_ok(source), Value::Int(4));
    }

    // ============================================================
    // Scoping
    // ============================================================

    #[test]
    fn test_parameter_assignment_does_not_touch_global() {
        let source = "
            var x = 1, y;
            function f(x) { x = 99; return x; }
            y = f(5);
            if (y == 99) return x; else return -1;
        ";
        assert_eq!(run_ok(source), Value::Int(1));
    }

    #[test]
    fn test_global_is_visible_and_mutable_in_function() {
        let source = "
            var count = 0;
            function bump() { count = count + 1; return count; }
            bump(); bump();
            return count;
        ";
        assert_eq!(run_ok(source), Value::Int(2));
    }

    #[test]
    fn test_locals_are_per_call() {
        let source = "
            function depth(n) {
                var mine;
                mine = n;
                if (n > 0) depth(n - 1);
                return mine;
            }
            return depth(5);
        ";
        assert_eq!(run_ok(source), Value::Int(5));
    }

    #[test]
    fn test_lax_mode_declares_globals() {
        let config = CompilerConfig {
            strict: false,
            ..CompilerConfig::default()
        };
        let program = compile_with("x = 40; x = x + 2; return x;", config).unwrap();
        assert_eq!(exec(&program).unwrap(), Value::Int(42));
    }

    // ============================================================
    // Errors
    // ============================================================

    #[test]
    fn test_deep_nesting_is_a_compile_error() {
        let n = 600;
        let source = format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert!(matches!(
            calc_expression(&source),
            Err(Error::Compile(CompileError {
                kind: CompileErrorKind::NestingTooDeep(_),
                ..
            }))
        ));

        let source = format!(
            "var x = 1; {}x = 2; return x;",
            "if (x == 1) x = 1; else ".repeat(100_000)
        );
        assert!(matches!(
            assert_compile_error(&source),
            CompileErrorKind::NestingTooDeep(_)
        ));

        // moderate nesting still runs
        let source = format!("{}1{}", "(".repeat(100), ")".repeat(100));
        assert_eq!(calc_expression(&source).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_parser_rejects() {
        assert_eq!(
            assert_compile_error("var s = 'abc;"),
            CompileErrorKind::UnterminatedString
        );
        assert_eq!(
            assert_compile_error(r"var s = 'a\x';"),
            CompileErrorKind::InvalidEscape('x')
        );
        assert_eq!(
            assert_compile_error("var r = nope(1);"),
            CompileErrorKind::UndeclaredFunction("nope".to_string())
        );
        assert!(matches!(
            assert_compile_error("function f(a, a) { return a; }"),
            CompileErrorKind::DuplicateParameter { .. }
        ));
        assert!(matches!(
            assert_compile_error("var r = (1 + 2;"),
            CompileErrorKind::Expected(_)
        ));
        assert!(matches!(
            assert_compile_error("var r = 1 + 2);"),
            CompileErrorKind::Expected(_)
        ));
        assert!(matches!(
            assert_compile_error("function f(a) { return a; } var r = f(1, 2);"),
            CompileErrorKind::ArgumentCount { expected: 1, found: 2, .. }
        ));
        assert!(matches!(
            assert_compile_error("function f(a, b) { return a; } var r = f();"),
            CompileErrorKind::ArgumentCount { expected: 2, found: 0, .. }
        ));
    }

    #[test]
    fn test_compile_error_reports_context() {
        let err = compile("var a = 1;\nvar b = a +;").unwrap_err();
        assert_eq!(err.kind, CompileErrorKind::Expected("operand".to_string()));
        assert_eq!(err.position, 22);
        assert!(err.to_string().contains("b = a +<<HERE>>;"), "{}", err);
    }

    #[test]
    fn test_runtime_type_errors() {
        assert!(matches!(
            assert_runtime_error("return 1 + 'a';"),
            RuntimeErrorKind::IncompatibleTypes { .. }
        ));
        assert!(matches!(
            assert_runtime_error("var u; return u + 1;"),
            RuntimeErrorKind::IncompatibleTypes { .. }
        ));
        assert!(matches!(
            assert_runtime_error("return true + true;"),
            RuntimeErrorKind::IncompatibleTypes { .. }
        ));
        assert!(matches!(
            assert_runtime_error("return 5.5 % 2;"),
            RuntimeErrorKind::IncompatibleTypes { .. }
        ));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(
            assert_runtime_error("var z = 0; return 1 / z;"),
            RuntimeErrorKind::DivisionByZero
        );
        assert_eq!(run_ok("return 1.0 / 0;"), Value::Double(f64::INFINITY));
    }

    // ============================================================
    // Images
    // ============================================================

    #[test]
    fn test_compiling_twice_gives_same_result() {
        let source = "
            var n = 6;
            function tri(k) { if (k == 0) return 0; return k + tri(k - 1); }
            return tri(n);
        ";
        let first = compile(source).unwrap();
        let second = compile(source).unwrap();

        assert_eq!(first.to_bytes().unwrap(), second.to_bytes().unwrap());
        assert_eq!(exec(&first).unwrap(), Value::Int(21));
        assert_eq!(exec(&second).unwrap(), Value::Int(21));
    }

    #[test]
    fn test_image_roundtrip_runs() {
        let program = compile("var s = 'x'; s = s + 'y'; return s;").unwrap();
        let loaded = load_image(&program.to_bytes().unwrap()).unwrap();
        assert_eq!(exec(&loaded).unwrap(), Value::Str("xy".to_string()));
    }

    #[test]
    fn test_garbage_image_is_rejected() {
        assert!(matches!(load_image(&[0xff, 0xff, 0xff]), Err(Error::Image(_))));
    }
}
