//! Hand-written recursive-descent parser for Muni.
//!
//! One token of lookahead is sufficient everywhere except two spots:
//! statement starts speculatively parse a type to recognize variable
//! declarations, and `<` after an identifier is disambiguated between
//! a comparison and a generic argument list by scanning ahead for a
//! matching `>` over type-shaped tokens.

use crate::ast::*;
use crate::diagnostic::{codes, Diagnostic};
use crate::lexer::{LexResult, Token, TokenKind};
use crate::span::{FileId, Span};

#[derive(Debug)]
pub struct ParseResult {
    pub program: Option<Program>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn parse_tokens(file_id: FileId, lex: LexResult) -> ParseResult {
    let mut parser = Parser {
        file_id,
        tokens: lex.tokens,
        pos: 0,
        diagnostics: lex.diagnostics,
    };
    let program = parser.parse_program();
    ParseResult {
        program: Some(program),
        diagnostics: parser.diagnostics,
    }
}

struct Parser {
    file_id: FileId,
    tokens: Vec<Token>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
}

/// Saved parser state for speculative parses. Restoring also drops
/// any diagnostics the speculation produced.
#[derive(Clone, Copy)]
struct Checkpoint {
    pos: usize,
    diags: usize,
}

impl Parser {
    // -----------------------------------------------------------------
    // token plumbing
    // -----------------------------------------------------------------

    fn peek(&self) -> &TokenKind {
        self.tokens
            .get(self.pos)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        self.tokens
            .get(self.pos + offset)
            .map(|t| &t.kind)
            .unwrap_or(&TokenKind::Eof)
    }

    fn peek_span(&self) -> Span {
        self.tokens
            .get(self.pos)
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    fn prev_span(&self) -> Span {
        self.tokens
            .get(self.pos.saturating_sub(1))
            .map(|t| t.span)
            .unwrap_or_else(Span::dummy)
    }

    fn advance(&mut self) -> Token {
        let tok = self
            .tokens
            .get(self.pos)
            .cloned()
            .unwrap_or(Token {
                kind: TokenKind::Eof,
                span: Span::point(self.file_id, 0),
            });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn consume_if(&mut self, kind: &TokenKind) -> bool {
        if self.peek() == kind {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind) -> Option<Span> {
        if self.consume_if(kind) {
            Some(self.prev_span())
        } else {
            let found = self.peek().describe();
            self.diagnostics.push(
                Diagnostic::error(
                    format!("expected {}, found {}", kind.describe(), found),
                    self.peek_span(),
                )
                .with_code(codes::PARSE),
            );
            None
        }
    }

    fn expect_ident(&mut self) -> Option<Ident> {
        if let TokenKind::Ident(name) = self.peek() {
            let name = name.clone();
            let span = self.peek_span();
            self.pos += 1;
            Some(Ident { name, span })
        } else {
            let found = self.peek().describe();
            self.diagnostics.push(
                Diagnostic::error(
                    format!("expected identifier, found {found}"),
                    self.peek_span(),
                )
                .with_code(codes::PARSE),
            );
            None
        }
    }

    fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            diags: self.diagnostics.len(),
        }
    }

    fn rollback(&mut self, cp: Checkpoint) {
        self.pos = cp.pos;
        self.diagnostics.truncate(cp.diags);
    }

    fn error(&mut self, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, span).with_code(codes::PARSE));
    }

    /// Skip forward to a statement boundary after a parse error.
    fn sync_stmt(&mut self) {
        loop {
            match self.peek() {
                TokenKind::Eof | TokenKind::RBrace => return,
                TokenKind::Semi => {
                    self.pos += 1;
                    return;
                }
                _ => {
                    self.pos += 1;
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // declarations
    // -----------------------------------------------------------------

    fn parse_program(&mut self) -> Program {
        let mut decls = Vec::new();
        while !matches!(self.peek(), TokenKind::Eof) {
            let before = self.pos;
            match self.peek() {
                TokenKind::KwStructure => {
                    if let Some(d) = self.parse_structure() {
                        decls.push(Decl::Structure(d));
                    }
                }
                TokenKind::KwAlias => {
                    if let Some(d) = self.parse_alias() {
                        decls.push(Decl::Alias(d));
                    }
                }
                TokenKind::KwImport => {
                    if let Some(d) = self.parse_import() {
                        decls.push(d);
                    }
                }
                TokenKind::KwVoid | TokenKind::Ident(_) => {
                    if let Some(d) = self.parse_function() {
                        decls.push(Decl::Function(d));
                    }
                }
                _ => {
                    let span = self.peek_span();
                    let found = self.peek().describe();
                    self.error(format!("expected declaration, found {found}"), span);
                }
            }
            if self.pos == before {
                // no progress; skip the offending token
                self.pos += 1;
            }
        }
        Program { decls }
    }

    fn parse_function(&mut self) -> Option<FunctionDecl> {
        let return_type = self.parse_type()?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let params = self.parse_params()?;
        let body = self.parse_block()?;
        let span = return_type.span().to(name.span);
        Some(FunctionDecl {
            name,
            params,
            return_type,
            body,
            span,
        })
    }

    fn parse_params(&mut self) -> Option<Vec<Param>> {
        let mut params = Vec::new();
        if !self.consume_if(&TokenKind::RParen) {
            loop {
                let ty = self.parse_type()?;
                let name = self.expect_ident()?;
                params.push(Param { name, ty });
                if self.consume_if(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(&TokenKind::RParen)?;
        }
        Some(params)
    }

    fn parse_structure(&mut self) -> Option<StructureDecl> {
        let kw_span = self.advance().span;
        let name = self.expect_ident()?;
        let type_params = self.parse_type_params();
        self.expect(&TokenKind::LBrace)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !matches!(self.peek(), TokenKind::RBrace | TokenKind::Eof) {
            let before = self.pos;
            self.parse_struct_member(&name.name, &mut fields, &mut methods);
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(StructureDecl {
            span: kw_span.to(name.span),
            name,
            type_params,
            fields,
            methods,
        })
    }

    fn parse_struct_member(
        &mut self,
        struct_name: &str,
        fields: &mut Vec<FieldDecl>,
        methods: &mut Vec<MethodDecl>,
    ) {
        // constructor: IDENT equal to the structure name, then `(`
        if let TokenKind::Ident(n) = self.peek() {
            if n == struct_name && matches!(self.peek_at(1), TokenKind::LParen) {
                let name = self.expect_ident().unwrap();
                self.expect(&TokenKind::LParen);
                let Some(params) = self.parse_params() else {
                    self.sync_stmt();
                    return;
                };
                let Some(body) = self.parse_block() else {
                    return;
                };
                let span = name.span;
                methods.push(MethodDecl {
                    return_type: TypeExpr::Void(span),
                    name,
                    params,
                    body,
                    is_static: true,
                    is_ctor: true,
                    span,
                });
                return;
            }
        }

        let is_static = self.consume_if(&TokenKind::KwStatic);
        let Some(ty) = self.parse_type() else {
            self.sync_stmt();
            return;
        };
        let Some(name) = self.expect_ident() else {
            self.sync_stmt();
            return;
        };
        match self.peek() {
            TokenKind::Semi => {
                self.pos += 1;
                if is_static {
                    self.error("fields cannot be static", name.span);
                }
                let span = ty.span().to(name.span);
                fields.push(FieldDecl { name, ty, span });
            }
            TokenKind::LParen => {
                self.pos += 1;
                let Some(params) = self.parse_params() else {
                    self.sync_stmt();
                    return;
                };
                let Some(body) = self.parse_block() else {
                    return;
                };
                let span = ty.span().to(name.span);
                methods.push(MethodDecl {
                    name,
                    params,
                    return_type: ty,
                    body,
                    is_static,
                    is_ctor: false,
                    span,
                });
            }
            other => {
                let found = other.describe();
                let span = self.peek_span();
                self.error(
                    format!("expected `;` or `(` in structure member, found {found}"),
                    span,
                );
                self.sync_stmt();
            }
        }
    }

    fn parse_type_params(&mut self) -> Vec<Ident> {
        let mut params = Vec::new();
        if self.consume_if(&TokenKind::Lt) {
            loop {
                match self.expect_ident() {
                    Some(id) => params.push(id),
                    None => break,
                }
                if self.consume_if(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(&TokenKind::Gt);
        }
        params
    }

    fn parse_alias(&mut self) -> Option<AliasDecl> {
        let kw_span = self.advance().span;
        let name = self.expect_ident()?;
        let type_params = self.parse_type_params();
        self.expect(&TokenKind::Assign)?;
        let body = self.parse_type()?;
        self.expect(&TokenKind::Semi)?;
        Some(AliasDecl {
            span: kw_span.to(name.span),
            name,
            type_params,
            body,
        })
    }

    fn parse_import(&mut self) -> Option<Decl> {
        let kw_span = self.advance().span;
        if let TokenKind::ImportPath(path) = self.peek() {
            let path = path.clone();
            let span = kw_span.to(self.peek_span());
            self.pos += 1;
            return Some(Decl::FileImport(FileImportDecl { path, span }));
        }

        let module = self.expect_ident()?;
        self.expect(&TokenKind::Dot)?;
        let name = self.expect_ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        if !self.consume_if(&TokenKind::RParen) {
            loop {
                params.push(self.parse_type()?);
                if self.consume_if(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(&TokenKind::RParen)?;
        }
        self.expect(&TokenKind::Arrow)?;
        let return_type = self.parse_type()?;
        self.expect(&TokenKind::Semi)?;
        Some(Decl::HostImport(HostImportDecl {
            span: kw_span.to(name.span),
            module,
            name,
            params,
            return_type,
        }))
    }

    // -----------------------------------------------------------------
    // types
    // -----------------------------------------------------------------

    fn parse_type(&mut self) -> Option<TypeExpr> {
        match self.peek() {
            TokenKind::KwVoid => {
                let span = self.advance().span;
                Some(TypeExpr::Void(span))
            }
            TokenKind::Ident(name) if name == "array" => {
                let span = self.advance().span;
                self.expect(&TokenKind::Lt)?;
                let elem = self.parse_type()?;
                let end = self.expect(&TokenKind::Gt)?;
                Some(TypeExpr::Array(Box::new(elem), span.to(end)))
            }
            TokenKind::Ident(_) => {
                let name = self.expect_ident()?;
                let mut args = Vec::new();
                if self.consume_if(&TokenKind::Lt) {
                    loop {
                        args.push(self.parse_type()?);
                        if self.consume_if(&TokenKind::Comma) {
                            continue;
                        }
                        break;
                    }
                    self.expect(&TokenKind::Gt)?;
                }
                Some(TypeExpr::Named { name, args })
            }
            other => {
                let found = other.describe();
                let span = self.peek_span();
                self.error(format!("expected type, found {found}"), span);
                None
            }
        }
    }

    // -----------------------------------------------------------------
    // statements
    // -----------------------------------------------------------------

    fn parse_block(&mut self) -> Option<Vec<Stmt>> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while !matches!(self.peek(), TokenKind::RBrace | TokenKind::Eof) {
            let before = self.pos;
            match self.parse_stmt() {
                Some(stmt) => stmts.push(stmt),
                None => self.sync_stmt(),
            }
            if self.pos == before {
                self.pos += 1;
            }
        }
        self.expect(&TokenKind::RBrace)?;
        Some(stmts)
    }

    fn parse_stmt(&mut self) -> Option<Stmt> {
        match self.peek() {
            TokenKind::LBrace => {
                let start = self.peek_span();
                let body = self.parse_block()?;
                Some(Stmt::Block(body, start.to(self.prev_span())))
            }
            TokenKind::KwReturn => {
                let span = self.advance().span;
                let value = if matches!(self.peek(), TokenKind::Semi) {
                    None
                } else {
                    Some(self.parse_expr(0)?)
                };
                self.expect(&TokenKind::Semi)?;
                Some(Stmt::Return { value, span })
            }
            TokenKind::KwBreak => {
                let span = self.advance().span;
                self.expect(&TokenKind::Semi)?;
                Some(Stmt::Break(span))
            }
            TokenKind::KwContinue => {
                let span = self.advance().span;
                self.expect(&TokenKind::Semi)?;
                Some(Stmt::Continue(span))
            }
            TokenKind::KwIf => self.parse_if(),
            TokenKind::KwWhile => self.parse_while(false),
            TokenKind::KwUntil => self.parse_while(true),
            TokenKind::KwFor => self.parse_for(),
            TokenKind::KwDo => self.parse_do(),
            _ => self.parse_simple_stmt(true),
        }
    }

    /// Variable declaration, assignment, or expression statement.
    /// Used directly for `for` init/step where no `;` is consumed.
    fn parse_simple_stmt(&mut self, consume_semi: bool) -> Option<Stmt> {
        // Speculative: `type ident =` begins a variable declaration.
        let cp = self.checkpoint();
        if let Some(ty) = self.parse_type() {
            if let TokenKind::Ident(_) = self.peek() {
                if matches!(self.peek_at(1), TokenKind::Assign) {
                    let name = self.expect_ident()?;
                    self.expect(&TokenKind::Assign)?;
                    let init = self.parse_expr(0)?;
                    if consume_semi {
                        self.expect(&TokenKind::Semi)?;
                    }
                    let span = ty.span().to(name.span);
                    return Some(Stmt::VarDecl {
                        ty,
                        name,
                        init,
                        span,
                    });
                }
            }
        }
        self.rollback(cp);

        let target = self.parse_expr(0)?;
        let op = match self.peek() {
            TokenKind::Assign => Some(None),
            TokenKind::PlusEq => Some(Some(BinOp::Add)),
            TokenKind::MinusEq => Some(Some(BinOp::Sub)),
            TokenKind::StarEq => Some(Some(BinOp::Mul)),
            TokenKind::SlashEq => Some(Some(BinOp::Div)),
            _ => None,
        };
        if let Some(op) = op {
            self.pos += 1;
            let value = self.parse_expr(0)?;
            if consume_semi {
                self.expect(&TokenKind::Semi)?;
            }
            let span = target.span.to(value.span);
            return Some(Stmt::Assign {
                target,
                op,
                value,
                span,
            });
        }
        if consume_semi {
            self.expect(&TokenKind::Semi)?;
        }
        Some(Stmt::Expr(target))
    }

    fn parse_if(&mut self) -> Option<Stmt> {
        let span = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr(0)?;
        self.expect(&TokenKind::RParen)?;
        let then_body = self.parse_block()?;
        let else_body = if self.consume_if(&TokenKind::KwElse) {
            if matches!(self.peek(), TokenKind::KwIf) {
                vec![self.parse_if()?]
            } else {
                self.parse_block()?
            }
        } else {
            Vec::new()
        };
        Some(Stmt::If {
            cond,
            then_body,
            else_body,
            span,
        })
    }

    fn parse_while(&mut self, inverted: bool) -> Option<Stmt> {
        let span = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr(0)?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let else_body = self.parse_loop_else()?;
        Some(if inverted {
            Stmt::Until {
                cond,
                body,
                else_body,
                span,
            }
        } else {
            Stmt::While {
                cond,
                body,
                else_body,
                span,
            }
        })
    }

    fn parse_for(&mut self) -> Option<Stmt> {
        let span = self.advance().span;
        self.expect(&TokenKind::LParen)?;
        let init = if matches!(self.peek(), TokenKind::Semi) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt(false)?))
        };
        self.expect(&TokenKind::Semi)?;
        let cond = if matches!(self.peek(), TokenKind::Semi) {
            None
        } else {
            Some(self.parse_expr(0)?)
        };
        self.expect(&TokenKind::Semi)?;
        let step = if matches!(self.peek(), TokenKind::RParen) {
            None
        } else {
            Some(Box::new(self.parse_simple_stmt(false)?))
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        let else_body = self.parse_loop_else()?;
        Some(Stmt::For {
            init,
            cond,
            step,
            body,
            else_body,
            span,
        })
    }

    fn parse_do(&mut self) -> Option<Stmt> {
        let span = self.advance().span;
        let count = if matches!(self.peek(), TokenKind::LBrace) {
            None
        } else {
            Some(self.parse_expr(0)?)
        };
        let body = self.parse_block()?;
        let cond = if self.consume_if(&TokenKind::KwWhile) {
            self.expect(&TokenKind::LParen)?;
            let c = self.parse_expr(0)?;
            self.expect(&TokenKind::RParen)?;
            self.consume_if(&TokenKind::Semi);
            Some(c)
        } else {
            None
        };
        let else_body = self.parse_loop_else()?;
        Some(Stmt::Do {
            count,
            cond,
            body,
            else_body,
            span,
        })
    }

    fn parse_loop_else(&mut self) -> Option<Vec<Stmt>> {
        if self.consume_if(&TokenKind::KwElse) {
            self.parse_block()
        } else {
            Some(Vec::new())
        }
    }

    // -----------------------------------------------------------------
    // expressions
    // -----------------------------------------------------------------

    fn parse_expr(&mut self, min_prec: u8) -> Option<Expr> {
        let mut lhs = self.parse_unary()?;
        loop {
            let Some((op, prec)) = binary_op(self.peek()) else {
                break;
            };
            if prec < min_prec {
                break;
            }
            self.pos += 1;
            // left-associative: the right side binds strictly tighter
            let rhs = self.parse_expr(prec + 1)?;
            let span = lhs.span.to(rhs.span);
            lhs = Expr {
                kind: ExprKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            };
        }
        Some(lhs)
    }

    fn parse_unary(&mut self) -> Option<Expr> {
        match self.peek() {
            TokenKind::Bang => {
                let span = self.advance().span;
                let expr = self.parse_unary()?;
                let span = span.to(expr.span);
                Some(Expr {
                    kind: ExprKind::Unary {
                        op: UnOp::Not,
                        expr: Box::new(expr),
                    },
                    span,
                })
            }
            TokenKind::Minus => {
                let span = self.advance().span;
                let expr = self.parse_unary()?;
                let span = span.to(expr.span);
                Some(Expr {
                    kind: ExprKind::Unary {
                        op: UnOp::Neg,
                        expr: Box::new(expr),
                    },
                    span,
                })
            }
            TokenKind::LParen if self.is_cast() => {
                let span = self.advance().span;
                let ty = self.expect_ident()?;
                self.expect(&TokenKind::RParen)?;
                let expr = self.parse_unary()?;
                let span = span.to(expr.span);
                Some(Expr {
                    kind: ExprKind::Cast {
                        ty,
                        expr: Box::new(expr),
                    },
                    span,
                })
            }
            _ => self.parse_postfix(),
        }
    }

    /// `( scalar-type )` starts a cast; any other parenthesis starts a
    /// grouped expression.
    fn is_cast(&self) -> bool {
        if let TokenKind::Ident(name) = self.peek_at(1) {
            matches!(name.as_str(), "int" | "char" | "boolean")
                && matches!(self.peek_at(2), TokenKind::RParen)
        } else {
            false
        }
    }

    fn parse_postfix(&mut self) -> Option<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                TokenKind::Dot => {
                    self.pos += 1;
                    let name = self.expect_ident()?;
                    if self.consume_if(&TokenKind::LParen) {
                        let args = self.parse_args()?;
                        let span = expr.span.to(self.prev_span());
                        expr = Expr {
                            kind: ExprKind::MethodCall {
                                obj: Box::new(expr),
                                method: name,
                                args,
                            },
                            span,
                        };
                    } else {
                        let span = expr.span.to(name.span);
                        expr = Expr {
                            kind: ExprKind::Field {
                                obj: Box::new(expr),
                                field: name,
                            },
                            span,
                        };
                    }
                }
                TokenKind::LBracket => {
                    self.pos += 1;
                    let index = self.parse_expr(0)?;
                    let end = self.expect(&TokenKind::RBracket)?;
                    let span = expr.span.to(end);
                    expr = Expr {
                        kind: ExprKind::Index {
                            obj: Box::new(expr),
                            index: Box::new(index),
                        },
                        span,
                    };
                }
                _ => break,
            }
        }
        Some(expr)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let span = self.peek_span();
        match self.peek().clone() {
            TokenKind::IntLiteral(text) => {
                self.pos += 1;
                let value = match text.parse::<i32>() {
                    Ok(v) => v,
                    Err(_) => {
                        self.error(format!("integer literal `{text}` out of range"), span);
                        0
                    }
                };
                Some(Expr {
                    kind: ExprKind::Int(value),
                    span,
                })
            }
            TokenKind::CharLiteral(value) => {
                self.pos += 1;
                Some(Expr {
                    kind: ExprKind::Int(value),
                    span,
                })
            }
            TokenKind::StringLiteral(text) => {
                self.pos += 1;
                Some(Expr {
                    kind: ExprKind::Str(text),
                    span,
                })
            }
            TokenKind::BoolLiteral(value) => {
                self.pos += 1;
                Some(Expr {
                    kind: ExprKind::Bool(value),
                    span,
                })
            }
            TokenKind::KwNull => {
                self.pos += 1;
                Some(Expr {
                    kind: ExprKind::Null,
                    span,
                })
            }
            TokenKind::KwThis => {
                self.pos += 1;
                Some(Expr {
                    kind: ExprKind::This,
                    span,
                })
            }
            TokenKind::LBracket => {
                self.pos += 1;
                let mut elements = Vec::new();
                if !self.consume_if(&TokenKind::RBracket) {
                    loop {
                        elements.push(self.parse_expr(0)?);
                        if self.consume_if(&TokenKind::Comma) {
                            continue;
                        }
                        break;
                    }
                    self.expect(&TokenKind::RBracket)?;
                }
                let span = span.to(self.prev_span());
                Some(Expr {
                    kind: ExprKind::ArrayLit(elements),
                    span,
                })
            }
            TokenKind::LParen => {
                self.pos += 1;
                let expr = self.parse_expr(0)?;
                self.expect(&TokenKind::RParen)?;
                Some(expr)
            }
            TokenKind::Ident(_) => self.parse_ident_expr(),
            other => {
                self.error(
                    format!("expected expression, found {}", other.describe()),
                    span,
                );
                None
            }
        }
    }

    /// Identifier-led expressions: a plain reference, a call, or a
    /// generic constructor / static-method call.
    fn parse_ident_expr(&mut self) -> Option<Expr> {
        let name = self.expect_ident()?;
        let span = name.span;

        if matches!(self.peek(), TokenKind::Lt) && self.angle_starts_type_args() {
            self.pos += 1; // `<`
            let mut type_args = Vec::new();
            loop {
                type_args.push(self.parse_type()?);
                if self.consume_if(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(&TokenKind::Gt)?;
            if self.consume_if(&TokenKind::LParen) {
                let args = self.parse_args()?;
                let span = span.to(self.prev_span());
                return Some(Expr {
                    kind: ExprKind::Ctor {
                        name,
                        type_args,
                        args,
                    },
                    span,
                });
            }
            self.expect(&TokenKind::Dot)?;
            let method = self.expect_ident()?;
            self.expect(&TokenKind::LParen)?;
            let args = self.parse_args()?;
            let span = span.to(self.prev_span());
            return Some(Expr {
                kind: ExprKind::StaticCall {
                    ty_name: name,
                    type_args,
                    method,
                    args,
                },
                span,
            });
        }

        if self.consume_if(&TokenKind::LParen) {
            let args = self.parse_args()?;
            let span = span.to(self.prev_span());
            return Some(Expr {
                kind: ExprKind::Call { name, args },
                span,
            });
        }

        Some(Expr {
            kind: ExprKind::Ident(name.name),
            span,
        })
    }

    /// Decide whether a `<` after an identifier opens a type-argument
    /// list: scan for a matching `>` over type-shaped tokens at the
    /// same bracket depth, then require `(` or `.` after it.
    fn angle_starts_type_args(&self) -> bool {
        let mut depth = 1usize;
        let mut i = self.pos + 1;
        loop {
            match self.tokens.get(i).map(|t| &t.kind) {
                Some(TokenKind::Ident(_)) | Some(TokenKind::KwVoid) | Some(TokenKind::Comma) => {
                    i += 1;
                }
                Some(TokenKind::Lt) => {
                    depth += 1;
                    i += 1;
                }
                Some(TokenKind::Gt) => {
                    depth -= 1;
                    i += 1;
                    if depth == 0 {
                        return matches!(
                            self.tokens.get(i).map(|t| &t.kind),
                            Some(TokenKind::LParen) | Some(TokenKind::Dot)
                        );
                    }
                }
                _ => return false,
            }
        }
    }

    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        if !self.consume_if(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr(0)?);
                if self.consume_if(&TokenKind::Comma) {
                    continue;
                }
                break;
            }
            self.expect(&TokenKind::RParen)?;
        }
        Some(args)
    }
}

fn binary_op(kind: &TokenKind) -> Option<(BinOp, u8)> {
    Some(match kind {
        TokenKind::OrOr => (BinOp::Or, 1),
        TokenKind::AndAnd => (BinOp::And, 2),
        TokenKind::EqEq => (BinOp::Eq, 3),
        TokenKind::NotEq => (BinOp::Ne, 3),
        TokenKind::Lt => (BinOp::Lt, 4),
        TokenKind::Le => (BinOp::Le, 4),
        TokenKind::Gt => (BinOp::Gt, 4),
        TokenKind::Ge => (BinOp::Ge, 4),
        TokenKind::Plus => (BinOp::Add, 5),
        TokenKind::Minus => (BinOp::Sub, 5),
        TokenKind::Star => (BinOp::Mul, 6),
        TokenKind::Slash => (BinOp::Div, 6),
        TokenKind::Percent => (BinOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer;

    fn parse(src: &str) -> Program {
        let result = parse_tokens(FileId(0), lexer::lex(FileId(0), src));
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics: {:?}",
            result.diagnostics
        );
        result.program.unwrap()
    }

    fn parse_err(src: &str) -> Vec<Diagnostic> {
        let result = parse_tokens(FileId(0), lexer::lex(FileId(0), src));
        assert!(!result.diagnostics.is_empty(), "expected parse errors");
        result.diagnostics
    }

    #[test]
    fn parses_function_with_params() {
        let program = parse("int add(int a, int b) { return a + b; }");
        assert_eq!(program.decls.len(), 1);
        let Decl::Function(f) = &program.decls[0] else {
            panic!("expected function");
        };
        assert_eq!(f.name.name, "add");
        assert_eq!(f.params.len(), 2);
    }

    #[test]
    fn precedence_mul_over_add() {
        let program = parse("void main() { int x = 1 + 2 * 3; }");
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        let Stmt::VarDecl { init, .. } = &f.body[0] else {
            panic!();
        };
        let ExprKind::Binary { op: BinOp::Add, rhs, .. } = &init.kind else {
            panic!("expected + at the top");
        };
        assert!(matches!(rhs.kind, ExprKind::Binary { op: BinOp::Mul, .. }));
    }

    #[test]
    fn generic_ctor_vs_comparison() {
        // `Box<int>(1)` is a constructor, `a < b` stays a comparison.
        let program = parse(
            "void main() { Box<int> b = Box<int>(1); boolean c = a < b; }",
        );
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        let Stmt::VarDecl { init, .. } = &f.body[0] else {
            panic!();
        };
        assert!(matches!(init.kind, ExprKind::Ctor { .. }));
        let Stmt::VarDecl { init, .. } = &f.body[1] else {
            panic!();
        };
        assert!(matches!(
            init.kind,
            ExprKind::Binary { op: BinOp::Lt, .. }
        ));
    }

    #[test]
    fn static_method_call_with_type_args() {
        let program = parse("void main() { Box<int> b = Box<int>.make(7); }");
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        let Stmt::VarDecl { init, .. } = &f.body[0] else {
            panic!();
        };
        assert!(matches!(init.kind, ExprKind::StaticCall { .. }));
    }

    #[test]
    fn structure_with_ctor_field_method() {
        let program = parse(
            "structure Point { int x; int y; Point(int x, int y) { this.x = x; this.y = y; } int norm() { return this.x * this.x + this.y * this.y; } }",
        );
        let Decl::Structure(s) = &program.decls[0] else {
            panic!();
        };
        assert_eq!(s.fields.len(), 2);
        assert_eq!(s.methods.len(), 2);
        assert!(s.methods[0].is_ctor);
        assert!(!s.methods[1].is_static);
    }

    #[test]
    fn alias_and_imports() {
        let program = parse(
            "alias string = vec<char>;\nimport <lib/util.mun>\nimport env.write_int(int) -> void;",
        );
        assert!(matches!(program.decls[0], Decl::Alias(_)));
        assert!(matches!(program.decls[1], Decl::FileImport(_)));
        let Decl::HostImport(h) = &program.decls[2] else {
            panic!();
        };
        assert_eq!(h.module.name, "env");
        assert_eq!(h.name.name, "write_int");
        assert_eq!(h.params.len(), 1);
    }

    #[test]
    fn loops_with_else_and_do_count() {
        let program = parse(
            "void main() { while (a) { } else { } do 3 { } for (int i = 0; i < 9; i += 1) { } do { } while (a); }",
        );
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        assert!(matches!(&f.body[0], Stmt::While { else_body, .. } if !else_body.is_empty()));
        assert!(matches!(&f.body[1], Stmt::Do { count: Some(_), .. }));
        assert!(matches!(&f.body[2], Stmt::For { init: Some(_), step: Some(_), .. }));
        assert!(matches!(&f.body[3], Stmt::Do { cond: Some(_), .. }));
    }

    #[test]
    fn cast_expression() {
        let program = parse("void main() { int x = (int) c; }");
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        let Stmt::VarDecl { init, .. } = &f.body[0] else {
            panic!();
        };
        assert!(matches!(init.kind, ExprKind::Cast { .. }));
    }

    #[test]
    fn compound_assignment_targets() {
        let program = parse("void main() { s += i; p.x = 1; a[0] = 2; }");
        let Decl::Function(f) = &program.decls[0] else {
            panic!();
        };
        assert!(matches!(&f.body[0], Stmt::Assign { op: Some(BinOp::Add), .. }));
        assert!(
            matches!(&f.body[1], Stmt::Assign { target, .. } if matches!(target.kind, ExprKind::Field { .. }))
        );
        assert!(
            matches!(&f.body[2], Stmt::Assign { target, .. } if matches!(target.kind, ExprKind::Index { .. }))
        );
    }

    #[test]
    fn missing_semicolon_is_parse_error() {
        let diags = parse_err("void main() { int x = 1 }");
        assert!(diags.iter().any(|d| d.code == Some(codes::PARSE)));
    }

    #[test]
    fn top_level_statement_is_rejected() {
        let diags = parse_err("int x = 1;");
        assert!(diags.iter().any(|d| d.code == Some(codes::PARSE)));
    }
}
