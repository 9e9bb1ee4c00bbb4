use std::{
    fs,
    path::{Path, PathBuf},
    process,
};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cinder::bytecode::disasm::print_bc;
use cinder::{Compiler, CompilerConfig, ProgramBc, VmBc, VmBcConfig};

const SOURCE_EXTENSION: &str = "cin";
const IMAGE_EXTENSION: &str = "cinc";

#[derive(Parser, Debug)]
#[command(name = "cinder", version, about = "Compile and run Cinder programs")]
struct Args {
    /// Program to run: `.cin` source or `.cinc` compiled image
    file: Option<PathBuf>,

    /// Evaluate a single expression instead of a file
    #[arg(long, conflicts_with = "file")]
    expr: Option<String>,

    /// Print the disassembled program before running it
    #[arg(long)]
    bc: bool,

    /// Write the compiled image to this path instead of running
    #[arg(long, value_name = "OUT")]
    emit: Option<PathBuf>,

    /// Let top-level assignments declare globals
    #[arg(long)]
    lax: bool,

    /// Maximum operand stack slots
    #[arg(long, default_value_t = 10_000)]
    max_stack: usize,

    /// Maximum nested calls
    #[arg(long, default_value_t = 1000)]
    max_depth: usize,

    /// Abort after this many instructions
    #[arg(long)]
    max_steps: Option<usize>,

    /// Deepest nesting of parentheses, calls and statement bodies
    #[arg(long, default_value_t = 256)]
    max_nesting: usize,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    let compiler = CompilerConfig {
        strict: !args.lax,
        max_nesting: args.max_nesting,
    };

    let program = match (&args.expr, &args.file) {
        (Some(expr), _) => {
            compile_or_exit(Compiler::with_config(expr, compiler).compile_expression())
        }
        (None, Some(file)) => load_program(file, compiler),
        (None, None) => {
            eprintln!("Error: expected a .{} file or --expr", SOURCE_EXTENSION);
            process::exit(1);
        }
    };

    if args.bc {
        print_bc(&program);
    }

    if let Some(out) = &args.emit {
        emit_image(&program, out);
        return;
    }

    let config = VmBcConfig {
        max_call_depth: args.max_depth,
        max_steps: args.max_steps,
        max_stack_size: args.max_stack,
    };

    match VmBc::with_config(config).run(&program) {
        Ok(value) => println!("{}", value),
        Err(e) => {
            eprintln!("{}", e);
            process::exit(1);
        }
    }
}

fn load_program(file: &Path, config: CompilerConfig) -> ProgramBc {
    match file.extension().and_then(|e| e.to_str()) {
        Some(SOURCE_EXTENSION) => {
            let source = fs::read_to_string(file).unwrap_or_else(|e| {
                eprintln!("Failed to read '{}': {}", file.display(), e);
                process::exit(1);
            });
            compile_or_exit(cinder::compile_with(&source, config))
        }
        Some(IMAGE_EXTENSION) => {
            let bytes = fs::read(file).unwrap_or_else(|e| {
                eprintln!("Failed to read '{}': {}", file.display(), e);
                process::exit(1);
            });
            cinder::load_image(&bytes).unwrap_or_else(|e| {
                eprintln!("{}", e);
                process::exit(1);
            })
        }
        _ => {
            eprintln!(
                "Error: expected a .{} or .{} file, got {}",
                SOURCE_EXTENSION,
                IMAGE_EXTENSION,
                file.display()
            );
            process::exit(1);
        }
    }
}

fn compile_or_exit(result: Result<ProgramBc, cinder::CompileError>) -> ProgramBc {
    result.unwrap_or_else(|e| {
        eprintln!("{}", e);
        process::exit(1);
    })
}

fn emit_image(program: &ProgramBc, out: &Path) {
    let bytes = program.to_bytes().unwrap_or_else(|e| {
        eprintln!("Failed to encode program: {}", e);
        process::exit(1);
    });
    if let Err(e) = fs::write(out, bytes) {
        eprintln!("Failed to write '{}': {}", out.display(), e);
        process::exit(1);
    }
}
