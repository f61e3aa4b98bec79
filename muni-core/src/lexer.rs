//! Lexer for Muni source text.

use crate::diagnostic::{codes, Diagnostic};
use crate::span::{FileId, Span};

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // literals / identifiers
    Ident(String),
    IntLiteral(String),
    CharLiteral(i32),
    StringLiteral(String),
    BoolLiteral(bool),
    /// Path of a file import, lexed as one token when `<` directly
    /// follows the `import` keyword.
    ImportPath(String),

    // keywords
    KwIf,
    KwElse,
    KwWhile,
    KwUntil,
    KwFor,
    KwDo,
    KwReturn,
    KwBreak,
    KwContinue,
    KwStructure,
    KwAlias,
    KwImport,
    KwStatic,
    KwThis,
    KwNull,
    KwVoid,

    // punctuation / operators
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    PlusEq,
    MinusEq,
    StarEq,
    SlashEq,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
    Assign,
    Dot,
    Comma,
    Semi,
    Colon,
    Arrow,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,

    Eof,
}

impl TokenKind {
    /// Human-readable description used in "expected X" messages.
    pub fn describe(&self) -> String {
        match self {
            TokenKind::Ident(name) => format!("identifier `{name}`"),
            TokenKind::IntLiteral(text) => format!("integer `{text}`"),
            TokenKind::CharLiteral(_) => "character literal".into(),
            TokenKind::StringLiteral(_) => "string literal".into(),
            TokenKind::BoolLiteral(b) => format!("`{b}`"),
            TokenKind::ImportPath(path) => format!("import path `{path}`"),
            TokenKind::KwIf => "`if`".into(),
            TokenKind::KwElse => "`else`".into(),
            TokenKind::KwWhile => "`while`".into(),
            TokenKind::KwUntil => "`until`".into(),
            TokenKind::KwFor => "`for`".into(),
            TokenKind::KwDo => "`do`".into(),
            TokenKind::KwReturn => "`return`".into(),
            TokenKind::KwBreak => "`break`".into(),
            TokenKind::KwContinue => "`continue`".into(),
            TokenKind::KwStructure => "`structure`".into(),
            TokenKind::KwAlias => "`alias`".into(),
            TokenKind::KwImport => "`import`".into(),
            TokenKind::KwStatic => "`static`".into(),
            TokenKind::KwThis => "`this`".into(),
            TokenKind::KwNull => "`null`".into(),
            TokenKind::KwVoid => "`void`".into(),
            TokenKind::Plus => "`+`".into(),
            TokenKind::Minus => "`-`".into(),
            TokenKind::Star => "`*`".into(),
            TokenKind::Slash => "`/`".into(),
            TokenKind::Percent => "`%`".into(),
            TokenKind::PlusEq => "`+=`".into(),
            TokenKind::MinusEq => "`-=`".into(),
            TokenKind::StarEq => "`*=`".into(),
            TokenKind::SlashEq => "`/=`".into(),
            TokenKind::EqEq => "`==`".into(),
            TokenKind::NotEq => "`!=`".into(),
            TokenKind::Lt => "`<`".into(),
            TokenKind::Le => "`<=`".into(),
            TokenKind::Gt => "`>`".into(),
            TokenKind::Ge => "`>=`".into(),
            TokenKind::AndAnd => "`&&`".into(),
            TokenKind::OrOr => "`||`".into(),
            TokenKind::Bang => "`!`".into(),
            TokenKind::Assign => "`=`".into(),
            TokenKind::Dot => "`.`".into(),
            TokenKind::Comma => "`,`".into(),
            TokenKind::Semi => "`;`".into(),
            TokenKind::Colon => "`:`".into(),
            TokenKind::Arrow => "`->`".into(),
            TokenKind::LParen => "`(`".into(),
            TokenKind::RParen => "`)`".into(),
            TokenKind::LBrace => "`{`".into(),
            TokenKind::RBrace => "`}`".into(),
            TokenKind::LBracket => "`[`".into(),
            TokenKind::RBracket => "`]`".into(),
            TokenKind::Eof => "end of file".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug)]
pub struct LexResult {
    pub tokens: Vec<Token>,
    pub diagnostics: Vec<Diagnostic>,
}

struct LexState<'a> {
    file_id: FileId,
    src: &'a str,
    pos: usize,
    tokens: Vec<Token>,
    diagnostics: Vec<Diagnostic>,
}

pub fn lex(file_id: FileId, src: &str) -> LexResult {
    let mut state = LexState {
        file_id,
        src,
        pos: 0,
        tokens: Vec::new(),
        diagnostics: Vec::new(),
    };
    state.run();
    let end = src.len();
    state.push(TokenKind::Eof, end, end);
    LexResult {
        tokens: state.tokens,
        diagnostics: state.diagnostics,
    }
}

impl<'a> LexState<'a> {
    fn run(&mut self) {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() {
            let c = bytes[self.pos];
            let start = self.pos;
            match c {
                b' ' | b'\t' | b'\r' | b'\n' => {
                    self.pos += 1;
                }
                b'#' => {
                    // line comment
                    while self.pos < bytes.len() && bytes[self.pos] != b'\n' {
                        self.pos += 1;
                    }
                }
                b'/' if bytes.get(self.pos + 1) == Some(&b'*') => {
                    self.block_comment(start);
                }
                b'(' => self.single(TokenKind::LParen),
                b')' => self.single(TokenKind::RParen),
                b'{' => self.single(TokenKind::LBrace),
                b'}' => self.single(TokenKind::RBrace),
                b'[' => self.single(TokenKind::LBracket),
                b']' => self.single(TokenKind::RBracket),
                b',' => self.single(TokenKind::Comma),
                b';' => self.single(TokenKind::Semi),
                b':' => self.single(TokenKind::Colon),
                b'.' => self.single(TokenKind::Dot),
                b'+' => self.with_eq(TokenKind::Plus, TokenKind::PlusEq),
                b'*' => self.with_eq(TokenKind::Star, TokenKind::StarEq),
                b'/' => self.with_eq(TokenKind::Slash, TokenKind::SlashEq),
                b'%' => self.single(TokenKind::Percent),
                b'-' => {
                    if bytes.get(self.pos + 1) == Some(&b'>') {
                        self.push(TokenKind::Arrow, start, start + 2);
                        self.pos += 2;
                    } else {
                        self.with_eq(TokenKind::Minus, TokenKind::MinusEq);
                    }
                }
                b'=' => self.with_eq(TokenKind::Assign, TokenKind::EqEq),
                b'!' => self.with_eq(TokenKind::Bang, TokenKind::NotEq),
                b'<' => {
                    if self.after_import_keyword() {
                        self.import_path(start);
                    } else {
                        self.with_eq(TokenKind::Lt, TokenKind::Le);
                    }
                }
                b'>' => self.with_eq(TokenKind::Gt, TokenKind::Ge),
                b'&' => {
                    if bytes.get(self.pos + 1) == Some(&b'&') {
                        self.push(TokenKind::AndAnd, start, start + 2);
                        self.pos += 2;
                    } else {
                        self.unknown(start);
                    }
                }
                b'|' => {
                    if bytes.get(self.pos + 1) == Some(&b'|') {
                        self.push(TokenKind::OrOr, start, start + 2);
                        self.pos += 2;
                    } else {
                        self.unknown(start);
                    }
                }
                b'\'' => self.char_literal(start),
                b'"' => self.string_literal(start),
                b'0'..=b'9' => {
                    while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                        self.pos += 1;
                    }
                    let lexeme = self.src[start..self.pos].to_string();
                    self.push(TokenKind::IntLiteral(lexeme), start, self.pos);
                }
                _ if is_ident_start(c) => {
                    while self.pos < bytes.len() && is_ident_continue(bytes[self.pos]) {
                        self.pos += 1;
                    }
                    let lexeme = &self.src[start..self.pos];
                    let kind = keyword(lexeme)
                        .unwrap_or_else(|| TokenKind::Ident(lexeme.to_string()));
                    self.push(kind, start, self.pos);
                }
                _ => self.unknown(start),
            }
        }
    }

    fn single(&mut self, kind: TokenKind) {
        let start = self.pos;
        self.push(kind, start, start + 1);
        self.pos += 1;
    }

    /// Lex `base` or, when an `=` follows, `with_eq`.
    fn with_eq(&mut self, base: TokenKind, with_eq: TokenKind) {
        let start = self.pos;
        if self.src.as_bytes().get(self.pos + 1) == Some(&b'=') {
            self.push(with_eq, start, start + 2);
            self.pos += 2;
        } else {
            self.push(base, start, start + 1);
            self.pos += 1;
        }
    }

    fn block_comment(&mut self, start: usize) {
        let bytes = self.src.as_bytes();
        self.pos += 2;
        loop {
            if self.pos + 1 >= bytes.len() {
                self.pos = bytes.len();
                self.diagnostics.push(
                    Diagnostic::error(
                        "unterminated block comment",
                        self.span(start, self.pos),
                    )
                    .with_code(codes::LEX),
                );
                return;
            }
            if bytes[self.pos] == b'*' && bytes[self.pos + 1] == b'/' {
                self.pos += 2;
                return;
            }
            self.pos += 1;
        }
    }

    /// True when the previously pushed token is the `import` keyword,
    /// in which case a following `<` opens a file path.
    fn after_import_keyword(&self) -> bool {
        matches!(
            self.tokens.last().map(|t| &t.kind),
            Some(TokenKind::KwImport)
        )
    }

    fn import_path(&mut self, start: usize) {
        let bytes = self.src.as_bytes();
        self.pos += 1;
        let path_start = self.pos;
        while self.pos < bytes.len() && bytes[self.pos] != b'>' && bytes[self.pos] != b'\n' {
            self.pos += 1;
        }
        if self.pos < bytes.len() && bytes[self.pos] == b'>' {
            let path = self.src[path_start..self.pos].trim().to_string();
            self.pos += 1;
            self.push(TokenKind::ImportPath(path), start, self.pos);
        } else {
            self.diagnostics.push(
                Diagnostic::error("unterminated import path", self.span(start, self.pos))
                    .with_code(codes::LEX),
            );
        }
    }

    fn char_literal(&mut self, start: usize) {
        let bytes = self.src.as_bytes();
        self.pos += 1;
        let value = match bytes.get(self.pos) {
            Some(b'\\') => {
                let esc = self.escape(self.pos);
                self.pos += 2;
                esc
            }
            Some(b'\'') | None => {
                self.diagnostics.push(
                    Diagnostic::error(
                        "empty or unterminated character literal",
                        self.span(start, self.pos + 1),
                    )
                    .with_code(codes::LEX),
                );
                self.pos = (self.pos + 1).min(bytes.len());
                return;
            }
            Some(_) => {
                // a full UTF-8 scalar, stored as its code point
                let ch = self.src[self.pos..].chars().next().unwrap();
                self.pos += ch.len_utf8();
                ch as i32
            }
        };
        if bytes.get(self.pos) == Some(&b'\'') {
            self.pos += 1;
            self.push(TokenKind::CharLiteral(value), start, self.pos);
        } else {
            self.diagnostics.push(
                Diagnostic::error(
                    "unterminated character literal",
                    self.span(start, self.pos),
                )
                .with_code(codes::LEX),
            );
        }
    }

    fn string_literal(&mut self, start: usize) {
        let bytes = self.src.as_bytes();
        self.pos += 1;
        let mut buf = String::new();
        loop {
            match bytes.get(self.pos) {
                None => {
                    self.diagnostics.push(
                        Diagnostic::error(
                            "unterminated string literal",
                            self.span(start, self.pos),
                        )
                        .with_code(codes::LEX),
                    );
                    return;
                }
                Some(b'"') => {
                    self.pos += 1;
                    self.push(TokenKind::StringLiteral(buf), start, self.pos);
                    return;
                }
                Some(b'\\') => {
                    let value = self.escape(self.pos);
                    if let Some(ch) = char::from_u32(value as u32) {
                        buf.push(ch);
                    }
                    self.pos += 2;
                }
                Some(_) => {
                    let ch = self.src[self.pos..].chars().next().unwrap();
                    buf.push(ch);
                    self.pos += ch.len_utf8();
                }
            }
        }
    }

    /// Decode the escape sequence starting at the backslash. Reports
    /// illegal escapes and falls back to the raw character.
    fn escape(&mut self, at: usize) -> i32 {
        let esc = self.src.as_bytes().get(at + 1).copied().unwrap_or(b'\\');
        match esc {
            b'n' => '\n' as i32,
            b't' => '\t' as i32,
            b'r' => '\r' as i32,
            b'\\' => '\\' as i32,
            b'\'' => '\'' as i32,
            b'"' => '"' as i32,
            b'0' => 0,
            other => {
                self.diagnostics.push(
                    Diagnostic::error("illegal escape sequence", self.span(at, at + 2))
                        .with_code(codes::LEX),
                );
                other as i32
            }
        }
    }

    fn unknown(&mut self, start: usize) {
        let ch = self.src[start..].chars().next().unwrap_or('\u{fffd}');
        let end = start + ch.len_utf8();
        self.diagnostics.push(
            Diagnostic::error(format!("unknown character `{ch}`"), self.span(start, end))
                .with_code(codes::LEX),
        );
        self.pos = end;
    }

    fn push(&mut self, kind: TokenKind, start: usize, end: usize) {
        self.tokens.push(Token {
            kind,
            span: self.span(start, end),
        });
    }

    fn span(&self, start: usize, end: usize) -> Span {
        Span::new(self.file_id, start as u32, end as u32)
    }
}

fn keyword(lexeme: &str) -> Option<TokenKind> {
    Some(match lexeme {
        "if" => TokenKind::KwIf,
        "else" => TokenKind::KwElse,
        "while" => TokenKind::KwWhile,
        "until" => TokenKind::KwUntil,
        "for" => TokenKind::KwFor,
        "do" => TokenKind::KwDo,
        "return" => TokenKind::KwReturn,
        "break" => TokenKind::KwBreak,
        "continue" => TokenKind::KwContinue,
        "structure" => TokenKind::KwStructure,
        "alias" => TokenKind::KwAlias,
        "import" => TokenKind::KwImport,
        "static" => TokenKind::KwStatic,
        "this" => TokenKind::KwThis,
        "null" => TokenKind::KwNull,
        "void" => TokenKind::KwVoid,
        "true" => TokenKind::BoolLiteral(true),
        "false" => TokenKind::BoolLiteral(false),
        _ => return None,
    })
}

fn is_ident_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn is_ident_continue(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_'
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let result = lex(FileId(0), src);
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            result.diagnostics
        );
        result.tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lexes_declaration_line() {
        let toks = kinds("int x = 40 + 2;");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("int".into()),
                TokenKind::Ident("x".into()),
                TokenKind::Assign,
                TokenKind::IntLiteral("40".into()),
                TokenKind::Plus,
                TokenKind::IntLiteral("2".into()),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn strips_comments() {
        let toks = kinds("x # trailing\n/* block\ncomment */ y");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("x".into()),
                TokenKind::Ident("y".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn import_path_is_one_token() {
        let toks = kinds("import <lib/util.mun>");
        assert_eq!(
            toks,
            vec![
                TokenKind::KwImport,
                TokenKind::ImportPath("lib/util.mun".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn comparison_after_ident_is_not_a_path() {
        let toks = kinds("a < b");
        assert_eq!(
            toks,
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Lt,
                TokenKind::Ident("b".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn char_escapes() {
        let toks = kinds(r"'\n' '\0' 'A'");
        assert_eq!(
            toks,
            vec![
                TokenKind::CharLiteral(10),
                TokenKind::CharLiteral(0),
                TokenKind::CharLiteral(65),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        let toks = kinds(r#""a\tb\"c""#);
        assert_eq!(
            toks,
            vec![
                TokenKind::StringLiteral("a\tb\"c".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_assign_operators() {
        let toks = kinds("x += 1; y -> z");
        assert!(toks.contains(&TokenKind::PlusEq));
        assert!(toks.contains(&TokenKind::Arrow));
    }

    #[test]
    fn unterminated_string_is_reported() {
        let result = lex(FileId(0), "\"abc");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].code, Some(codes::LEX));
    }

    #[test]
    fn unknown_character_is_reported() {
        let result = lex(FileId(0), "a @ b");
        assert_eq!(result.diagnostics.len(), 1);
        assert!(result.diagnostics[0].message.contains('@'));
    }
}
