//! Core of the Muni compiler.
//!
//! Pipeline:
//!   source
//!     -> lexer
//!     -> parser
//!     -> loader (stdlib prepend + file-import inlining)
//!     -> typecheck (with monomorphization of generic structures)
//!     -> lower (linear typed IR)
//!     -> codegen_wasm
//!
//! The emitted module is a self-contained WebAssembly binary that
//! calls out only to declared host imports.

pub mod span;
pub mod diagnostic;
pub mod error;

pub mod ast;
pub mod lexer;
pub mod parser;

pub mod stdlib;
pub mod loader;

pub mod types;
pub mod hir;
pub mod typecheck;
pub mod monomorphize;

pub mod ir;
pub mod lower;
pub mod codegen_wasm;
pub mod compiler;

pub use compiler::{
    compile, compile_loaded, compile_program, compile_to_wat, print_wat, CompilationArtifact,
};
pub use error::CoreError;
