//! Source loading and import resolution.
//!
//! The loader parses the entry file, prepends the embedded standard
//! library, and inlines `import <path.mun>` declarations recursively.
//! Inclusion is idempotent: files are keyed by canonical absolute
//! path, and revisiting a path (including via an import cycle)
//! contributes nothing.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::ast::{Decl, Program};
use crate::diagnostic::{codes, has_errors, Diagnostic};
use crate::error::CoreError;
use crate::lexer;
use crate::parser;
use crate::span::FileId;
use crate::stdlib;

/// Holds all loaded sources and their assigned FileId.
#[derive(Debug, Clone, Default)]
pub struct SourceMap {
    files: Vec<(PathBuf, String)>,
}

impl SourceMap {
    pub fn new() -> Self {
        Self { files: Vec::new() }
    }

    pub fn add(&mut self, path: PathBuf, src: String) -> FileId {
        let id = self.files.len() as u32;
        self.files.push((path, src));
        FileId(id)
    }

    pub fn path(&self, id: FileId) -> Option<&PathBuf> {
        self.files.get(id.index()).map(|(p, _)| p)
    }

    pub fn get(&self, id: FileId) -> Option<&str> {
        self.files.get(id.index()).map(|(_, s)| s.as_str())
    }

    /// Convert a byte offset to 0-based (line, column).
    pub fn line_col(&self, id: FileId, byte: u32) -> Option<(usize, usize)> {
        let src = self.get(id)?;
        let mut line = 0;
        let mut col = 0;
        for (count, ch) in src.bytes().enumerate() {
            if count as u32 == byte {
                return Some((line, col));
            }
            if ch == b'\n' {
                line += 1;
                col = 0;
            } else {
                col += 1;
            }
        }
        if src.len() as u32 == byte {
            Some((line, col))
        } else {
            None
        }
    }

    pub fn line_str(&self, id: FileId, line: usize) -> Option<&str> {
        let src = self.get(id)?;
        src.lines().nth(line)
    }
}

/// Result of loading sources: the merged program (stdlib first, then
/// the entry file with its imports inlined), the source map for
/// diagnostic rendering, and every lex/parse/import diagnostic that
/// was collected along the way. The program is unusable when any of
/// the diagnostics is an error.
#[derive(Debug, Clone)]
pub struct LoadResult {
    pub program: Program,
    pub source_map: SourceMap,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        has_errors(&self.diagnostics)
    }
}

/// Loader that builds a single merged program from an entry file,
/// preserving FileId/Span information across all included files.
#[derive(Debug, Default)]
pub struct Loader;

impl Loader {
    pub fn new() -> Self {
        Loader
    }

    /// Load and merge starting from a file on disk.
    pub fn load(&self, entry: &Path) -> Result<LoadResult, CoreError> {
        let src = fs::read_to_string(entry)
            .map_err(|e| CoreError::Io(format!("failed to read {}: {e}", entry.display())))?;
        self.load_inline(entry.to_path_buf(), src)
    }

    /// Load an already-provided source string as a pseudo file (used
    /// for tests and stdin-style input). Relative imports resolve
    /// against the pseudo path's parent directory.
    pub fn load_inline(&self, path: PathBuf, src: String) -> Result<LoadResult, CoreError> {
        let mut sm = SourceMap::new();
        let mut diagnostics = Vec::new();
        let mut seen: BTreeSet<PathBuf> = BTreeSet::new();

        let mut decls = Vec::new();
        for module in stdlib::STDLIB_MODULES {
            let parsed = self.parse_source(
                PathBuf::from(module.name),
                module.source.to_string(),
                &mut sm,
                &mut diagnostics,
            );
            decls.extend(parsed.decls);
        }

        let canon = path.canonicalize().unwrap_or_else(|_| path.clone());
        seen.insert(canon.clone());
        let entry = self.parse_source(canon.clone(), src, &mut sm, &mut diagnostics);
        let base = canon.parent().map(Path::to_path_buf).unwrap_or_default();
        self.inline_imports(entry, &base, &mut sm, &mut seen, &mut diagnostics, &mut decls);

        Ok(LoadResult {
            program: Program { decls },
            source_map: sm,
            diagnostics,
        })
    }

    /// Append `program`'s declarations to `out`, replacing each file
    /// import with the imported file's declarations.
    fn inline_imports(
        &self,
        program: Program,
        base: &Path,
        sm: &mut SourceMap,
        seen: &mut BTreeSet<PathBuf>,
        diagnostics: &mut Vec<Diagnostic>,
        out: &mut Vec<Decl>,
    ) {
        for decl in program.decls {
            match decl {
                Decl::FileImport(imp) => {
                    let target = base.join(&imp.path);
                    let canon = match target.canonicalize() {
                        Ok(p) => p,
                        Err(e) => {
                            diagnostics.push(
                                Diagnostic::error(
                                    format!(
                                        "cannot import `{}`: {e}",
                                        target.display()
                                    ),
                                    imp.span,
                                )
                                .with_code(codes::IMPORT),
                            );
                            continue;
                        }
                    };
                    // revisiting a path (cycles included) is a no-op
                    if !seen.insert(canon.clone()) {
                        continue;
                    }
                    let src = match fs::read_to_string(&canon) {
                        Ok(s) => s,
                        Err(e) => {
                            diagnostics.push(
                                Diagnostic::error(
                                    format!("cannot read `{}`: {e}", canon.display()),
                                    imp.span,
                                )
                                .with_code(codes::IMPORT),
                            );
                            continue;
                        }
                    };
                    let child = self.parse_source(canon.clone(), src, sm, diagnostics);
                    let child_base =
                        canon.parent().map(Path::to_path_buf).unwrap_or_default();
                    self.inline_imports(child, &child_base, sm, seen, diagnostics, out);
                }
                other => out.push(other),
            }
        }
    }

    fn parse_source(
        &self,
        path: PathBuf,
        src: String,
        sm: &mut SourceMap,
        diagnostics: &mut Vec<Diagnostic>,
    ) -> Program {
        let file_id = sm.add(path, src);
        let src = sm.get(file_id).unwrap_or_default().to_string();
        let lex = lexer::lex(file_id, &src);
        let mut parse = parser::parse_tokens(file_id, lex);
        diagnostics.append(&mut parse.diagnostics);
        parse.program.unwrap_or(Program { decls: Vec::new() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdlib_is_prepended() {
        let loader = Loader::new();
        let result = loader
            .load_inline(PathBuf::from("<test>"), "void main() { }".to_string())
            .expect("load");
        // vec, string alias, print and the host imports come from std
        let has_vec = result.program.decls.iter().any(|d| {
            matches!(d, Decl::Structure(s) if s.name.name == "vec")
        });
        let has_print = result.program.decls.iter().any(|d| {
            matches!(d, Decl::Function(f) if f.name.name == "print")
        });
        let has_write_int = result.program.decls.iter().any(|d| {
            matches!(d, Decl::HostImport(h) if h.name.name == "write_int")
        });
        assert!(has_vec && has_print && has_write_int);
    }

    #[test]
    fn missing_import_is_an_import_error() {
        let loader = Loader::new();
        let result = loader
            .load_inline(
                PathBuf::from("<test>"),
                "import <does/not/exist.mun>\nvoid main() { }".to_string(),
            )
            .expect("load");
        assert!(result.has_errors());
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.code == Some(codes::IMPORT)));
    }
}
