//! Compilation pipeline driver.
//!
//! Stages: load (lex, parse, resolve imports) → typecheck (with
//! monomorphization) → lower to IR → emit wasm → validate. Every
//! stage collects all the diagnostics it can; the pipeline aborts at
//! the first stage that produced any error.

use std::path::Path;

use wasmparser::Validator;

use crate::ast;
use crate::codegen_wasm;
use crate::diagnostic::{codes, Diagnostic};
use crate::error::CoreError;
use crate::loader::{LoadResult, Loader};
use crate::lower;
use crate::span::Span;
use crate::typecheck;

#[derive(Debug, Clone)]
pub struct CompilationArtifact {
    pub wasm: Vec<u8>,
}

/// Compile an already loaded and merged program to a wasm binary.
pub fn compile_program(program: &ast::Program) -> Result<CompilationArtifact, CoreError> {
    let tc = typecheck::typecheck(program);
    let Some(hir) = tc.program else {
        return Err(CoreError::from(tc.diagnostics));
    };
    let mut diagnostics = tc.diagnostics;

    let lowered = lower::lower(&hir);
    let Some(ir) = lowered.module else {
        let mut diags = diagnostics;
        diags.extend(lowered.diagnostics);
        return Err(CoreError::from(diags));
    };
    diagnostics.extend(lowered.diagnostics);

    let cg = codegen_wasm::generate_wasm(&ir);
    diagnostics.extend(cg.diagnostics);
    let Some(bytes) = cg.bytes else {
        return Err(CoreError::from(diagnostics));
    };

    // a module that fails validation is a compiler bug, not a user
    // error; still surfaced as a diagnostic so the CLI renders it
    let mut validator = Validator::new();
    if let Err(err) = validator.validate_all(&bytes) {
        diagnostics.push(
            Diagnostic::error(format!("invalid wasm generated: {err}"), Span::dummy())
                .with_code(codes::EMIT),
        );
        return Err(CoreError::from(diagnostics));
    }
    Ok(CompilationArtifact { wasm: bytes })
}

/// Compile a loaded module, failing first on any diagnostics the
/// loader collected.
pub fn compile_loaded(loaded: &LoadResult) -> Result<CompilationArtifact, CoreError> {
    if loaded.has_errors() {
        return Err(CoreError::from(loaded.diagnostics.clone()));
    }
    compile_program(&loaded.program)
}

/// Compile the Muni source file at `path` to a WebAssembly binary.
pub fn compile(path: &Path) -> Result<Vec<u8>, CoreError> {
    let loaded = Loader::new().load(path)?;
    compile_loaded(&loaded).map(|artifact| artifact.wasm)
}

/// Compile the Muni source file at `path` to WebAssembly text.
pub fn compile_to_wat(path: &Path) -> Result<String, CoreError> {
    let wasm = compile(path)?;
    print_wat(&wasm)
}

/// Render a validated binary as WebAssembly text.
pub fn print_wat(wasm: &[u8]) -> Result<String, CoreError> {
    wasmprinter::print_bytes(wasm)
        .map_err(|_| CoreError::Internal("emitted module could not be printed"))
}
