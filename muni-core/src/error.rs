//! Outer error type of the compiler pipeline.
//!
//! Language-level problems travel as `Diagnostic` lists and convert
//! into `CoreError` via `From`; the other variants cover file I/O and
//! internal invariant violations. Tools render the diagnostics
//! themselves — the `Display` impl is only a one-line summary.

use core::fmt;

use crate::diagnostic::Diagnostic;

#[derive(Debug, Clone)]
pub enum CoreError {
    /// One or more language-level errors with full diagnostic
    /// information (spans, notes, codes).
    Diagnostics(Vec<Diagnostic>),

    /// A source or output file could not be read or written.
    Io(String),

    /// A bug in the compiler; well-typed input should never produce
    /// this variant.
    Internal(&'static str),
}

impl From<Vec<Diagnostic>> for CoreError {
    fn from(diagnostics: Vec<Diagnostic>) -> CoreError {
        CoreError::Diagnostics(diagnostics)
    }
}

impl From<Diagnostic> for CoreError {
    fn from(diagnostic: Diagnostic) -> CoreError {
        CoreError::Diagnostics(vec![diagnostic])
    }
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Diagnostics(diags) => {
                // summarize with the first error; the full list is
                // available to callers that want to render it
                let first = diags
                    .iter()
                    .find(|d| d.is_error())
                    .or_else(|| diags.first());
                match first {
                    None => f.write_str("compilation failed"),
                    Some(d) if diags.len() == 1 => f.write_str(&d.message),
                    Some(d) => {
                        write!(f, "{} ({} diagnostics in total)", d.message, diags.len())
                    }
                }
            }
            CoreError::Io(message) => f.write_str(message),
            CoreError::Internal(message) => {
                write!(f, "internal compiler error: {message}")
            }
        }
    }
}

impl std::error::Error for CoreError {}
