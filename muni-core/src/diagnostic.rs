//! Compiler diagnostics.
//!
//! Every pipeline stage accumulates `Diagnostic` values instead of
//! stopping at the first problem; the driver fails the compilation
//! once a stage has produced any error. A diagnostic owns an ordered
//! list of labeled source locations: the first entry is where the
//! problem is, later entries are notes pointing at related places
//! ("first declared here" and the like).

use crate::span::Span;

/// Diagnostic codes naming the error kind a diagnostic belongs to.
///
/// These are stable strings so tests and embedders can match on the
/// kind of a failure without parsing the message text.
pub mod codes {
    pub const LEX: &str = "LexError";
    pub const PARSE: &str = "ParseError";
    pub const IMPORT: &str = "ImportError";
    pub const NAME: &str = "NameError";
    pub const TYPE: &str = "TypeError";
    pub const ALIAS_CYCLE: &str = "AliasCycle";
    pub const MONO_DIVERGES: &str = "MonomorphizationDiverges";
    pub const EMIT: &str = "EmitError";
}

/// Severity level of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One source location attached to a diagnostic. The primary label
/// carries no message of its own (the diagnostic message covers it);
/// note labels always do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Label {
    pub span: Span,
    pub message: Option<String>,
}

/// A single problem report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: Option<&'static str>,
    pub message: String,
    /// Labeled locations; index 0 is the primary one.
    pub labels: Vec<Label>,
}

impl Diagnostic {
    fn report(severity: Severity, message: impl Into<String>, at: Span) -> Diagnostic {
        Diagnostic {
            severity,
            code: None,
            message: message.into(),
            labels: vec![Label {
                span: at,
                message: None,
            }],
        }
    }

    /// An error pointing at `at`.
    pub fn error(message: impl Into<String>, at: Span) -> Diagnostic {
        Diagnostic::report(Severity::Error, message, at)
    }

    /// A warning pointing at `at`.
    pub fn warning(message: impl Into<String>, at: Span) -> Diagnostic {
        Diagnostic::report(Severity::Warning, message, at)
    }

    /// Tag this diagnostic with an error-kind code from [`codes`].
    pub fn with_code(mut self, code: &'static str) -> Diagnostic {
        self.code = Some(code);
        self
    }

    /// Attach a note pointing at a related location.
    pub fn note(mut self, at: Span, message: impl Into<String>) -> Diagnostic {
        self.labels.push(Label {
            span: at,
            message: Some(message.into()),
        });
        self
    }

    /// Where the problem is.
    pub fn primary_span(&self) -> Span {
        self.labels
            .first()
            .map(|l| l.span)
            .unwrap_or_else(Span::dummy)
    }

    /// The note labels, in the order they were attached.
    pub fn notes(&self) -> &[Label] {
        self.labels.get(1..).unwrap_or(&[])
    }

    /// Returns true if this diagnostic is an error.
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

/// Returns true if any diagnostic in the slice is an error.
pub fn has_errors(diags: &[Diagnostic]) -> bool {
    diags.iter().any(Diagnostic::is_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::FileId;

    #[test]
    fn notes_follow_the_primary_label() {
        let here = Span::new(FileId(0), 10, 14);
        let there = Span::new(FileId(0), 2, 6);
        let d = Diagnostic::error("duplicate declaration", here)
            .with_code(codes::NAME)
            .note(there, "first declared here");
        assert_eq!(d.primary_span(), here);
        assert_eq!(d.notes().len(), 1);
        assert_eq!(d.notes()[0].span, there);
        assert!(d.is_error());
    }

    #[test]
    fn has_errors_ignores_warnings() {
        let w = Diagnostic::warning("unused", Span::dummy());
        assert!(!has_errors(&[w.clone()]));
        assert!(has_errors(&[w, Diagnostic::error("bad", Span::dummy())]));
    }
}
