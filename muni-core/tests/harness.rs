#![allow(dead_code)]

//! Shared test harness: compile Muni source strings and execute the
//! resulting modules under the `wasmi` interpreter, capturing what
//! the host imports write.

use std::path::PathBuf;

use muni_core::error::CoreError;
use muni_core::loader::Loader;
use muni_core::{compile_loaded, CompilationArtifact};
use wasmi::{Caller, Engine, Linker, Module, Store};

/// Compile source to wasm bytes, panicking on failure.
pub fn compile_src(src: &str) -> Vec<u8> {
    try_compile(src).expect("compile failure").wasm
}

/// Compile source, returning the artifact or the pipeline error.
pub fn try_compile(src: &str) -> Result<CompilationArtifact, CoreError> {
    let loaded = Loader::new().load_inline(PathBuf::from("<test>"), src.to_string())?;
    compile_loaded(&loaded)
}

/// Assert that compilation fails and return its diagnostics.
pub fn compile_err(src: &str) -> Vec<muni_core::diagnostic::Diagnostic> {
    match try_compile(src) {
        Ok(_) => panic!("expected a compile error"),
        Err(CoreError::Diagnostics(diags)) => diags,
        Err(other) => panic!("expected diagnostics, got {other}"),
    }
}

/// Assert that compilation fails with at least one diagnostic of the
/// given code whose message contains `needle`.
pub fn compile_err_with(src: &str, code: &str, needle: &str) {
    let diags = compile_err(src);
    assert!(
        diags
            .iter()
            .any(|d| d.code == Some(code) && d.message.contains(needle)),
        "no `{code}` diagnostic containing {needle:?} in {diags:#?}"
    );
}

/// Compile and run `main`, returning everything the program wrote
/// through `write_int` (one line per call) and `write_chr`.
pub fn run_main(src: &str) -> String {
    let wasm = compile_src(src);
    match execute(&wasm) {
        Ok(output) => output,
        Err((message, output)) => {
            panic!("execution failed: {message} (output so far: {output:?})")
        }
    }
}

/// Compile and run `main`, expecting a runtime trap; returns the
/// output produced before the trap.
pub fn run_main_trap(src: &str) -> String {
    let wasm = compile_src(src);
    match execute(&wasm) {
        Ok(output) => panic!("expected a trap, program finished with output {output:?}"),
        Err((_, output)) => output,
    }
}

type ExecErr = (String, String);

fn execute(wasm: &[u8]) -> Result<String, ExecErr> {
    let engine = Engine::default();
    let module = Module::new(&engine, wasm).expect("emitted module loads");

    let mut linker: Linker<String> = Linker::new(&engine);
    linker
        .func_wrap("env", "write_int", |mut caller: Caller<'_, String>, v: i32| {
            let out = caller.data_mut();
            out.push_str(&v.to_string());
            out.push('\n');
        })
        .unwrap();
    linker
        .func_wrap("env", "write_chr", |mut caller: Caller<'_, String>, v: i32| {
            if let Some(ch) = char::from_u32(v as u32) {
                caller.data_mut().push(ch);
            }
        })
        .unwrap();

    let mut store = Store::new(&engine, String::new());
    let instance = linker
        .instantiate(&mut store, &module)
        .expect("instantiate")
        .start(&mut store)
        .expect("start");
    let main = instance
        .get_typed_func::<(), ()>(&store, "main")
        .expect("exported main");
    match main.call(&mut store, ()) {
        Ok(()) => Ok(store.into_data()),
        Err(err) => {
            let message = err.to_string();
            Err((message, store.into_data()))
        }
    }
}

/// `write_int` output lines, trimmed.
pub fn run_main_lines(src: &str) -> Vec<String> {
    run_main(src)
        .lines()
        .map(|l| l.to_string())
        .collect()
}
