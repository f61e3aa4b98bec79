//! Embedded standard library sources.
//!
//! The standard library is compiled into the binary so that
//! `compile(path)` is hermetic: no stdlib search path, no environment
//! dependence. The loader prepends these modules, in order, to every
//! program; their declarations behave exactly as if the user had
//! written them at the top of the entry file.

/// Description of a single stdlib module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StdlibModule {
    /// Pseudo-path shown in diagnostics, e.g. "<std/vec.mun>".
    pub name: &'static str,
    /// The module's Muni source text.
    pub source: &'static str,
}

/// All stdlib modules, in prepend order. `io` must come first: it
/// declares the host imports that `string`'s `print` relies on.
pub const STDLIB_MODULES: &[StdlibModule] = &[
    StdlibModule {
        name: "<std/io.mun>",
        source: include_str!("../std/io.mun"),
    },
    StdlibModule {
        name: "<std/vec.mun>",
        source: include_str!("../std/vec.mun"),
    },
    StdlibModule {
        name: "<std/string.mun>",
        source: include_str!("../std/string.mun"),
    },
];
