use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use muni_core::{
    compile_loaded,
    diagnostic::Diagnostic,
    error::CoreError,
    loader::{Loader, SourceMap},
    print_wat,
    span::FileId,
};
use wasmi::{Engine, Linker, Module, Store};

#[derive(Parser, Debug)]
#[command(name = "muni", version, about = "Compile and run Muni programs")]
struct Cli {
    /// Show internal error details on failures.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compile a .mun source file to .wat or .wasm.
    Compile {
        /// Input .mun source file.
        input: PathBuf,
        /// Output file; the suffix selects the format (.wat or .wasm).
        output: PathBuf,
    },
    /// Run a compiled .wasm module.
    Run {
        /// Module to instantiate and execute.
        module: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    let debug = cli.debug;
    if let Err(err) = execute(cli) {
        if debug {
            eprintln!("error: {err:?}");
        } else {
            eprintln!("error: {err}");
        }
        std::process::exit(1);
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Compile { input, output } => compile_command(&input, &output, cli.debug),
        Command::Run { module } => run_command(&module),
    }
}

fn compile_command(input: &Path, output: &Path, debug: bool) -> Result<()> {
    let loaded = match Loader::new().load(input) {
        Ok(l) => l,
        Err(e) => return Err(compile_failure(e, None, debug)),
    };
    let artifact = match compile_loaded(&loaded) {
        Ok(a) => a,
        Err(e) => return Err(compile_failure(e, Some(&loaded.source_map), debug)),
    };

    match output.extension().and_then(|e| e.to_str()) {
        Some("wasm") => write_output(output, &artifact.wasm)?,
        Some("wat") => {
            let text = print_wat(&artifact.wasm).map_err(|e| anyhow::anyhow!(e.to_string()))?;
            write_output(output, text.as_bytes())?;
        }
        _ => return Err(anyhow::anyhow!("output file must end with .wat or .wasm")),
    }
    Ok(())
}

fn compile_failure(err: CoreError, sm: Option<&SourceMap>, debug: bool) -> anyhow::Error {
    if let CoreError::Diagnostics(diags) = &err {
        if let Some(sm) = sm {
            render_diagnostics(diags, sm);
        } else {
            for d in diags {
                eprintln!("error: {}", d.message);
            }
        }
        if debug {
            eprintln!("{diags:#?}");
        }
        return anyhow::anyhow!("compilation failed");
    }
    anyhow::anyhow!(err.to_string())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

fn run_command(module_path: &Path) -> Result<()> {
    let wasm = fs::read(module_path)
        .with_context(|| format!("failed to read {}", module_path.display()))?;
    let engine = Engine::default();
    let module = Module::new(&engine, wasm.as_slice()).context("failed to load wasm module")?;

    let mut linker: Linker<()> = Linker::new(&engine);
    linker.func_wrap("env", "write_int", |value: i32| {
        println!("{value}");
    })?;
    linker.func_wrap("env", "write_chr", |value: i32| {
        if let Some(ch) = char::from_u32(value as u32) {
            print!("{ch}");
        }
    })?;

    let mut store = Store::new(&engine, ());
    let instance = linker
        .instantiate(&mut store, &module)
        .context("failed to instantiate module")?
        .start(&mut store)
        .context("failed to start module")?;
    let main = instance
        .get_typed_func::<(), ()>(&store, "main")
        .context("exported `main` function missing or has wrong type")?;
    main.call(&mut store, ()).context("program trapped")?;
    Ok(())
}

/// Render the whole diagnostic list into one buffer and write it in
/// a single shot, so output stays contiguous even when stderr is
/// shared.
fn render_diagnostics(diags: &[Diagnostic], sm: &SourceMap) {
    use std::fmt::Write;

    let mut out = String::new();
    for d in diags {
        let severity = if d.is_error() { "error" } else { "warning" };
        match d.code {
            Some(code) => {
                let _ = writeln!(out, "{severity}[{code}]: {}", d.message);
            }
            None => {
                let _ = writeln!(out, "{severity}: {}", d.message);
            }
        }

        let span = d.primary_span();
        let (path, line, col) = locate(sm, span.file, span.start);
        let _ = writeln!(out, "  at {path}:{}:{}", line + 1, col + 1);
        if let Some(text) = sm.line_str(span.file, line) {
            let _ = writeln!(out, "  {:>4} | {text}", line + 1);
            let underline = "^".repeat(span.len.max(1) as usize);
            let _ = writeln!(out, "  {:>4} | {:col$}{underline}", "", "");
        }

        for note in d.notes() {
            let (p, l, c) = locate(sm, note.span.file, note.span.start);
            let message = note.message.as_deref().unwrap_or("related location");
            let _ = writeln!(out, "  note: {message} ({p}:{}:{})", l + 1, c + 1);
        }
        out.push('\n');
    }
    eprint!("{out}");
}

/// Path, 0-based line, and 0-based column of a byte offset.
fn locate(sm: &SourceMap, file: FileId, byte: u32) -> (String, usize, usize) {
    let (line, col) = sm.line_col(file, byte).unwrap_or((0, 0));
    let path = sm
        .path(file)
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<unknown>".into());
    (path, line, col)
}
