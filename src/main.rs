use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{debug, info};

use ok::ast;
use ok::compiler::{Compiler, InterfaceTable};
use ok::diagnostic::ansi::AnsiRenderer;
use ok::diagnostic::{Diagnostic, json, registry};
use ok::vm::{NativeLibrary, Program, Vm};

/// Guest recursion runs on the host stack.
const VM_STACK_SIZE: usize = 256 * 1024 * 1024;

#[derive(Parser)]
#[command(name = "ok", version, about = "Compile and run parsed ok programs")]
struct Cli {
    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    json_errors: bool,

    /// Disable coloured output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile a program and run its entry function
    Run {
        /// Parsed program as JSON
        path: PathBuf,
        #[arg(long, default_value = "main")]
        entry: String,
    },
    /// Print the compiled instructions of every function
    Dump {
        path: PathBuf,
    },
    /// Explain an error code, e.g. `ok explain OK-C003`
    Explain {
        code: Option<String>,
        /// List every known code
        #[arg(long)]
        list: bool,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let reporter = Reporter { json: cli.json_errors, color: !cli.no_color && std::io::stderr().is_terminal() };

    let result = match cli.command {
        Command::Run { path, entry } => run(&path, &entry),
        Command::Dump { path } => compile(&path).map(|program| print!("{program}")),
        Command::Explain { code, list } => explain(code.as_deref(), list),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(d) => {
            reporter.report(&d);
            ExitCode::FAILURE
        }
    }
}

struct Reporter {
    json: bool,
    color: bool,
}

impl Reporter {
    fn report(&self, d: &Diagnostic) {
        if self.json {
            eprintln!("{}", json::render(d));
        } else {
            eprint!("{}", AnsiRenderer { use_color: self.color }.render(d));
        }
    }
}

fn load(path: &Path) -> Result<ast::File, Diagnostic> {
    let source = std::fs::read_to_string(path).map_err(|e| {
        Diagnostic::error(format!("cannot read {}: {e}", path.display())).with_code("OK-L001")
    })?;
    serde_json::from_str(&source).map_err(|e| {
        Diagnostic::error(format!("invalid program: {e}"))
            .with_code("OK-L001")
            .with_position(format!("{}:{}:{}", path.display(), e.line(), e.column()))
    })
}

fn compile(path: &Path) -> Result<Program, Diagnostic> {
    let file = load(path)?;
    let natives = NativeLibrary::standard();
    let program = Compiler::new(&natives, InterfaceTable::new())
        .compile_file(&file)
        .map_err(|e| Diagnostic::from(&e))?;
    info!(path = %path.display(), funcs = program.funcs.len(), "compiled");
    Ok(program)
}

fn run(path: &Path, entry: &str) -> Result<(), Diagnostic> {
    let program = compile(path)?;
    let entry = entry.to_string();

    let handle = std::thread::Builder::new()
        .name("ok-vm".into())
        .stack_size(VM_STACK_SIZE)
        .spawn(move || {
            let mut vm = Vm::new(program, NativeLibrary::standard());
            vm.run(&entry, Vec::new())
        })
        .map_err(|e| Diagnostic::error(format!("cannot start the virtual machine: {e}")).with_code("OK-R009"))?;

    match handle.join() {
        Ok(Ok(results)) => {
            debug!(results = results.len(), "finished");
            Ok(())
        }
        Ok(Err(err)) => Err(Diagnostic::from(&err)),
        Err(_) => Err(Diagnostic::error("the virtual machine panicked").with_code("OK-R009")),
    }
}

fn explain(code: Option<&str>, list: bool) -> Result<(), Diagnostic> {
    if list {
        for entry in registry::REGISTRY {
            println!("{}  {}", entry.code, entry.short);
        }
        return Ok(());
    }
    let Some(code) = code else {
        return Err(Diagnostic::error("expected an error code").with_suggestion("run `ok explain --list` to see them all"));
    };
    let entry = registry::lookup(&code.to_ascii_uppercase())
        .ok_or_else(|| Diagnostic::error(format!("unknown error code: {code}")))?;
    print!("{}", entry.long);
    Ok(())
}
