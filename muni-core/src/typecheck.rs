//! Name resolution and type checking.
//!
//! Two sub-passes: declaration collection registers every top-level
//! function, structure, alias and host import; body resolution walks
//! statements and expressions with a scoped environment and produces
//! the typed HIR. Structure bodies are checked per monomorphic
//! instantiation (see `monomorphize`), so everything that reaches HIR
//! is concrete.

use std::collections::{BTreeMap, BTreeSet};

use crate::ast::{self, BinOp, Ident, MethodDecl, Param, StructureDecl, TypeExpr, UnOp};
use crate::diagnostic::{codes, Diagnostic};
use crate::hir::*;
use crate::monomorphize::{self, MAX_INSTANTIATION_DEPTH};
use crate::span::Span;
use crate::types::{Layout, Ty};

pub(crate) type Subst = BTreeMap<String, Ty>;

#[derive(Debug)]
pub struct TypeCheckResult {
    pub program: Option<HirProgram>,
    pub diagnostics: Vec<Diagnostic>,
}

pub fn typecheck(program: &ast::Program) -> TypeCheckResult {
    let mut checker = Checker::new();
    checker.collect_declarations(program);
    checker.check_free_functions();
    monomorphize::drain(&mut checker);

    // signatures are resolved once while collecting declarations and
    // again when their bodies are checked; keep one copy of each
    // resulting diagnostic
    let diagnostics = dedup_diagnostics(checker.diagnostics);
    if crate::diagnostic::has_errors(&diagnostics) {
        return TypeCheckResult {
            program: None,
            diagnostics,
        };
    }
    let functions = checker.hir_functions.into_values().collect();
    TypeCheckResult {
        program: Some(HirProgram {
            functions,
            imports: checker.imports,
            layouts: checker.layouts,
        }),
        diagnostics,
    }
}

/// Signature of a callable registered at top level (free function or
/// host import).
#[derive(Debug, Clone)]
pub(crate) struct FnSig {
    /// Name the call lowers to: the function name itself, or the
    /// qualified `module.name` of a host import.
    pub callee: String,
    pub params: Vec<Ty>,
    pub ret: Ty,
    pub span: Span,
}

pub(crate) struct Checker {
    pub(crate) structs: BTreeMap<String, StructureDecl>,
    aliases: BTreeMap<String, ast::AliasDecl>,
    funcs: BTreeMap<String, FnSig>,
    func_decls: Vec<ast::FunctionDecl>,
    pub(crate) imports: Vec<HostImport>,
    pub(crate) diagnostics: Vec<Diagnostic>,
    /// Mangled names of requested instantiations (guard set).
    instantiated: BTreeSet<String>,
    /// Mangled names already reported as divergent.
    diverged: BTreeSet<String>,
    /// Worklist of `(structure, concrete type arguments)` pairs.
    pub(crate) pending: Vec<(String, Vec<Ty>, Span)>,
    pub(crate) layouts: BTreeMap<String, Layout>,
    pub(crate) hir_functions: BTreeMap<String, HirFunction>,
    alias_stack: Vec<String>,
}

/// Per-body checking context.
struct BodyCtx<'a> {
    subst: &'a Subst,
    expected_ret: Ty,
    is_ctor: bool,
}

/// Scoped environment: a stack of frames, innermost last.
struct Env {
    scopes: Vec<BTreeMap<String, Ty>>,
}

impl Env {
    fn new() -> Env {
        Env {
            scopes: vec![BTreeMap::new()],
        }
    }

    fn push(&mut self) {
        self.scopes.push(BTreeMap::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    /// Declare in the innermost scope; false if already declared there.
    fn declare(&mut self, name: &str, ty: Ty) -> bool {
        let scope = self.scopes.last_mut().expect("scope stack never empty");
        if scope.contains_key(name) {
            return false;
        }
        scope.insert(name.to_string(), ty);
        true
    }

    fn lookup(&self, name: &str) -> Option<&Ty> {
        self.scopes.iter().rev().find_map(|s| s.get(name))
    }
}

impl Checker {
    fn new() -> Checker {
        Checker {
            structs: BTreeMap::new(),
            aliases: BTreeMap::new(),
            funcs: BTreeMap::new(),
            func_decls: Vec::new(),
            imports: Vec::new(),
            diagnostics: Vec::new(),
            instantiated: BTreeSet::new(),
            diverged: BTreeSet::new(),
            pending: Vec::new(),
            layouts: BTreeMap::new(),
            hir_functions: BTreeMap::new(),
            alias_stack: Vec::new(),
        }
    }

    fn error(&mut self, code: &'static str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error(message, span).with_code(code));
    }

    // -----------------------------------------------------------------
    // declaration collection
    // -----------------------------------------------------------------

    fn collect_declarations(&mut self, program: &ast::Program) {
        // First the type namespace (structures and aliases), so that
        // callable signatures can refer to any of them regardless of
        // declaration order.
        for decl in &program.decls {
            match decl {
                ast::Decl::Structure(s) => self.collect_structure(s),
                ast::Decl::Alias(a) => self.collect_alias(a),
                _ => {}
            }
        }
        for decl in &program.decls {
            match decl {
                ast::Decl::HostImport(imp) => self.collect_host_import(imp),
                ast::Decl::Function(f) => self.collect_function(f),
                _ => {}
            }
        }
    }

    fn collect_structure(&mut self, s: &StructureDecl) {
        if s.name.name == "array" {
            self.error(
                codes::NAME,
                "`array` is a built-in type and cannot be redeclared",
                s.name.span,
            );
            return;
        }
        if self.structs.contains_key(&s.name.name) || self.aliases.contains_key(&s.name.name) {
            self.error(
                codes::NAME,
                format!("duplicate declaration of `{}`", s.name.name),
                s.name.span,
            );
            return;
        }
        let mut seen_params = BTreeSet::new();
        for p in &s.type_params {
            if !seen_params.insert(p.name.clone()) {
                self.error(
                    codes::NAME,
                    format!("duplicate type parameter `{}`", p.name),
                    p.span,
                );
            }
        }
        let mut seen_fields = BTreeSet::new();
        for f in &s.fields {
            if !seen_fields.insert(f.name.name.clone()) {
                self.error(
                    codes::NAME,
                    format!("duplicate field `{}` in `{}`", f.name.name, s.name.name),
                    f.name.span,
                );
            }
        }
        let mut seen_methods = BTreeSet::new();
        let mut seen_ctor = false;
        for m in &s.methods {
            if m.is_ctor {
                if seen_ctor {
                    self.error(
                        codes::NAME,
                        format!("duplicate constructor for `{}`", s.name.name),
                        m.name.span,
                    );
                }
                seen_ctor = true;
            } else if !seen_methods.insert(m.name.name.clone()) {
                self.error(
                    codes::NAME,
                    format!("duplicate method `{}` in `{}`", m.name.name, s.name.name),
                    m.name.span,
                );
            }
        }
        self.structs.insert(s.name.name.clone(), s.clone());
    }

    fn collect_alias(&mut self, a: &ast::AliasDecl) {
        if self.structs.contains_key(&a.name.name) || self.aliases.contains_key(&a.name.name) {
            self.error(
                codes::NAME,
                format!("duplicate declaration of `{}`", a.name.name),
                a.name.span,
            );
            return;
        }
        self.aliases.insert(a.name.name.clone(), a.clone());
    }

    fn collect_host_import(&mut self, imp: &ast::HostImportDecl) {
        let empty = Subst::new();
        let params: Vec<Ty> = imp
            .params
            .iter()
            .map(|t| self.resolve_value_type(t, &empty))
            .collect();
        let ret = self.resolve_type(&imp.return_type, &empty);

        let qualified = format!("{}.{}", imp.module.name, imp.name.name);

        // host imports are keyed by the (module, name) pair; an
        // identical re-declaration merges, a signature mismatch under
        // the same key is a conflict
        if let Some(existing) = self
            .imports
            .iter()
            .find(|e| e.module == imp.module.name && e.name == imp.name.name)
        {
            if existing.params == params && existing.ret == ret {
                return;
            }
            let existing_span = existing.span;
            self.diagnostics.push(
                Diagnostic::error(
                    format!("host import `{qualified}` conflicts with an earlier declaration"),
                    imp.span,
                )
                .with_code(codes::IMPORT)
                .note(existing_span, "first declared here"),
            );
            return;
        }

        // the bare function name binds to the first import that
        // claims it; an import from another module remains reachable
        // through the qualified `module.name(...)` call form
        let holder = self
            .funcs
            .get(&imp.name.name)
            .map(|sig| (sig.callee.contains('.'), sig.span));
        match holder {
            // a free function already owns the name
            Some((false, prev)) => {
                self.diagnostics.push(
                    Diagnostic::error(
                        format!("duplicate declaration of `{}`", imp.name.name),
                        imp.span,
                    )
                    .with_code(codes::NAME)
                    .note(prev, "first declared here"),
                );
                return;
            }
            // another module's import holds the bare name
            Some((true, _)) => {}
            None => {
                self.funcs.insert(
                    imp.name.name.clone(),
                    FnSig {
                        callee: qualified,
                        params: params.clone(),
                        ret: ret.clone(),
                        span: imp.span,
                    },
                );
            }
        }
        self.imports.push(HostImport {
            module: imp.module.name.clone(),
            name: imp.name.name.clone(),
            params,
            ret,
            span: imp.span,
        });
    }

    fn collect_function(&mut self, f: &ast::FunctionDecl) {
        if let Some(existing) = self.funcs.get(&f.name.name) {
            let prev = existing.span;
            self.diagnostics.push(
                Diagnostic::error(
                    format!("duplicate declaration of `{}`", f.name.name),
                    f.name.span,
                )
                .with_code(codes::NAME)
                .note(prev, "first declared here"),
            );
            return;
        }
        let empty = Subst::new();
        let params: Vec<Ty> = f
            .params
            .iter()
            .map(|p| self.resolve_value_type(&p.ty, &empty))
            .collect();
        let ret = self.resolve_type(&f.return_type, &empty);
        if f.name.name == "main" && (!params.is_empty() || ret != Ty::Void) {
            self.error(
                codes::TYPE,
                "`main` must be declared as `void main()`",
                f.name.span,
            );
        }
        self.funcs.insert(
            f.name.name.clone(),
            FnSig {
                callee: f.name.name.clone(),
                params,
                ret,
                span: f.span,
            },
        );
        self.func_decls.push(f.clone());
    }

    fn check_free_functions(&mut self) {
        let decls = std::mem::take(&mut self.func_decls);
        for f in &decls {
            let empty = Subst::new();
            let ret = self.resolve_type(&f.return_type, &empty);
            self.check_callable(
                f.name.name.clone(),
                None,
                &f.params,
                ret,
                &f.body,
                &empty,
                false,
                f.span,
            );
        }
        self.func_decls = decls;
    }

    // -----------------------------------------------------------------
    // type resolution
    // -----------------------------------------------------------------

    /// Resolve a syntactic type to a concrete type, expanding aliases
    /// and substituting type parameters. Errors resolve to `int` so
    /// checking can continue.
    pub(crate) fn resolve_type(&mut self, ty: &TypeExpr, subst: &Subst) -> Ty {
        match ty {
            TypeExpr::Void(_) => Ty::Void,
            TypeExpr::Array(elem, _) => {
                let elem = self.resolve_value_type(elem, subst);
                Ty::Array(Box::new(elem))
            }
            TypeExpr::Named { name, args } => self.resolve_named(name, args, subst),
        }
    }

    /// Like `resolve_type` but rejects `void`, which is only valid in
    /// return position.
    pub(crate) fn resolve_value_type(&mut self, ty: &TypeExpr, subst: &Subst) -> Ty {
        let resolved = self.resolve_type(ty, subst);
        if resolved == Ty::Void {
            self.error(
                codes::TYPE,
                "`void` is only valid as a return type",
                ty.span(),
            );
            return Ty::Int;
        }
        resolved
    }

    fn resolve_named(&mut self, name: &Ident, args: &[TypeExpr], subst: &Subst) -> Ty {
        if args.is_empty() {
            if let Some(t) = subst.get(&name.name) {
                return t.clone();
            }
        }
        match name.name.as_str() {
            "int" | "char" | "boolean" => {
                if !args.is_empty() {
                    self.error(
                        codes::TYPE,
                        format!("type `{}` does not take type arguments", name.name),
                        name.span,
                    );
                }
                return if name.name == "boolean" {
                    Ty::Bool
                } else {
                    Ty::Int
                };
            }
            "float" => {
                self.error(
                    codes::TYPE,
                    "`float` is not implemented; only i32 arithmetic is supported",
                    name.span,
                );
                return Ty::Int;
            }
            _ => {}
        }

        if self.aliases.contains_key(&name.name) {
            return self.resolve_alias(name, args, subst);
        }

        if let Some(tmpl) = self.structs.get(&name.name) {
            let needed = tmpl.type_params.len();
            if args.len() != needed {
                self.error(
                    codes::TYPE,
                    format!(
                        "type `{}` expects {needed} type argument(s), got {}",
                        name.name,
                        args.len()
                    ),
                    name.span,
                );
                return Ty::Int;
            }
            let resolved: Vec<Ty> = args
                .iter()
                .map(|a| self.resolve_value_type(a, subst))
                .collect();
            self.request_instantiation(&name.name, &resolved, name.span);
            return Ty::Struct {
                name: name.name.clone(),
                args: resolved,
            };
        }

        self.error(
            codes::NAME,
            format!("unknown type `{}`", name.name),
            name.span,
        );
        Ty::Int
    }

    fn resolve_alias(&mut self, name: &Ident, args: &[TypeExpr], subst: &Subst) -> Ty {
        if self.alias_stack.iter().any(|n| n == &name.name) {
            self.error(
                codes::ALIAS_CYCLE,
                format!("alias `{}` is part of a definition cycle", name.name),
                name.span,
            );
            return Ty::Int;
        }
        let alias = self.aliases.get(&name.name).cloned().expect("checked");
        if args.len() != alias.type_params.len() {
            self.error(
                codes::TYPE,
                format!(
                    "alias `{}` expects {} type argument(s), got {}",
                    name.name,
                    alias.type_params.len(),
                    args.len()
                ),
                name.span,
            );
            return Ty::Int;
        }
        let mut map = Subst::new();
        for (param, arg) in alias.type_params.iter().zip(args) {
            let resolved = self.resolve_value_type(arg, subst);
            map.insert(param.name.clone(), resolved);
        }
        self.alias_stack.push(name.name.clone());
        let out = self.resolve_type(&alias.body, &map);
        self.alias_stack.pop();
        out
    }

    /// Record a `(structure, type arguments)` pair for the
    /// monomorphizer, unless it is already known or too deep.
    pub(crate) fn request_instantiation(&mut self, name: &str, args: &[Ty], span: Span) {
        let ty = Ty::Struct {
            name: name.to_string(),
            args: args.to_vec(),
        };
        if ty.depth() > MAX_INSTANTIATION_DEPTH {
            if self.diverged.insert(ty.mangle()) {
                self.error(
                    codes::MONO_DIVERGES,
                    format!(
                        "instantiating `{ty}` exceeds the generic instantiation depth bound of {MAX_INSTANTIATION_DEPTH}"
                    ),
                    span,
                );
            }
            return;
        }
        if self.instantiated.insert(ty.mangle()) {
            self.pending
                .push((name.to_string(), args.to_vec(), span));
        }
    }

    // -----------------------------------------------------------------
    // callables
    // -----------------------------------------------------------------

    /// Check one function, method, or constructor body and register
    /// the resulting HIR function under `name`.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn check_callable(
        &mut self,
        name: String,
        this_ty: Option<Ty>,
        params: &[Param],
        declared_ret: Ty,
        body: &[ast::Stmt],
        subst: &Subst,
        is_ctor: bool,
        span: Span,
    ) {
        let mut env = Env::new();
        let mut hir_params = Vec::new();
        if let Some(this) = &this_ty {
            env.declare("this", this.clone());
            hir_params.push(("this".to_string(), this.clone()));
        }
        for p in params {
            let ty = self.resolve_value_type(&p.ty, subst);
            if !env.declare(&p.name.name, ty.clone()) {
                self.error(
                    codes::NAME,
                    format!("duplicate parameter `{}`", p.name.name),
                    p.name.span,
                );
            }
            hir_params.push((p.name.name.clone(), ty));
        }

        let ctx = BodyCtx {
            subst,
            expected_ret: if is_ctor {
                Ty::Void
            } else {
                declared_ret.clone()
            },
            is_ctor,
        };
        let hir_body = self.check_block(body, &mut env, &ctx, false);

        if !is_ctor && declared_ret != Ty::Void && !block_returns(&hir_body) {
            self.error(
                codes::TYPE,
                format!("`{name}` may exit without returning a value"),
                span,
            );
        }

        let ret = if is_ctor {
            this_ty.clone().expect("constructors have a receiver")
        } else {
            declared_ret
        };
        self.hir_functions.insert(
            name.clone(),
            HirFunction {
                name,
                params: hir_params,
                ret,
                body: hir_body,
                is_ctor,
                span,
            },
        );
    }

    // -----------------------------------------------------------------
    // statements
    // -----------------------------------------------------------------

    fn check_block(
        &mut self,
        stmts: &[ast::Stmt],
        env: &mut Env,
        ctx: &BodyCtx,
        in_loop: bool,
    ) -> Vec<HirStmt> {
        let mut out = Vec::new();
        for stmt in stmts {
            if let Some(s) = self.check_stmt(stmt, env, ctx, in_loop) {
                out.push(s);
            }
        }
        out
    }

    fn check_scoped_block(
        &mut self,
        stmts: &[ast::Stmt],
        env: &mut Env,
        ctx: &BodyCtx,
        in_loop: bool,
    ) -> Vec<HirStmt> {
        env.push();
        let out = self.check_block(stmts, env, ctx, in_loop);
        env.pop();
        out
    }

    fn check_stmt(
        &mut self,
        stmt: &ast::Stmt,
        env: &mut Env,
        ctx: &BodyCtx,
        in_loop: bool,
    ) -> Option<HirStmt> {
        match stmt {
            ast::Stmt::Block(body, _) => {
                Some(HirStmt::Block(self.check_scoped_block(body, env, ctx, in_loop)))
            }
            ast::Stmt::VarDecl {
                ty,
                name,
                init,
                span,
            } => {
                let declared = self.resolve_value_type(ty, ctx.subst);
                let value = self.infer(init, env, ctx);
                if !assignable(&declared, &value.ty) {
                    self.error(
                        codes::TYPE,
                        format!(
                            "cannot assign `{}` to `{declared}` `{}`",
                            value.ty, name.name
                        ),
                        *span,
                    );
                }
                if !env.declare(&name.name, declared.clone()) {
                    self.error(
                        codes::NAME,
                        format!("redeclaration of `{}`", name.name),
                        name.span,
                    );
                }
                Some(HirStmt::Let {
                    name: name.name.clone(),
                    ty: declared,
                    value,
                })
            }
            ast::Stmt::Assign {
                target,
                op,
                value,
                span,
            } => self.check_assign(target, *op, value, *span, env, ctx),
            ast::Stmt::If {
                cond,
                then_body,
                else_body,
                ..
            } => {
                let cond = self.check_condition(cond, env, ctx, "if");
                let then_body = self.check_scoped_block(then_body, env, ctx, in_loop);
                let else_body = self.check_scoped_block(else_body, env, ctx, in_loop);
                Some(HirStmt::If {
                    cond,
                    then_body,
                    else_body,
                })
            }
            ast::Stmt::While {
                cond,
                body,
                else_body,
                ..
            } => {
                let cond = self.check_condition(cond, env, ctx, "while");
                let body = self.check_scoped_block(body, env, ctx, true);
                let else_body = self.check_scoped_block(else_body, env, ctx, in_loop);
                Some(HirStmt::While {
                    cond,
                    body,
                    else_body,
                })
            }
            ast::Stmt::Until {
                cond,
                body,
                else_body,
                ..
            } => {
                let cond = self.check_condition(cond, env, ctx, "until");
                let body = self.check_scoped_block(body, env, ctx, true);
                let else_body = self.check_scoped_block(else_body, env, ctx, in_loop);
                Some(HirStmt::Until {
                    cond,
                    body,
                    else_body,
                })
            }
            ast::Stmt::For {
                init,
                cond,
                step,
                body,
                else_body,
                ..
            } => {
                env.push();
                let init = init
                    .as_ref()
                    .and_then(|s| self.check_stmt(s, env, ctx, false))
                    .map(Box::new);
                let cond = cond
                    .as_ref()
                    .map(|c| self.check_condition(c, env, ctx, "for"));
                let step = step
                    .as_ref()
                    .and_then(|s| self.check_stmt(s, env, ctx, false))
                    .map(Box::new);
                let body = self.check_scoped_block(body, env, ctx, true);
                let else_body = self.check_scoped_block(else_body, env, ctx, in_loop);
                env.pop();
                Some(HirStmt::For {
                    init,
                    cond,
                    step,
                    body,
                    else_body,
                })
            }
            ast::Stmt::Do {
                count,
                cond,
                body,
                else_body,
                ..
            } => {
                let count = count.as_ref().map(|c| {
                    let e = self.infer(c, env, ctx);
                    if e.ty != Ty::Int {
                        self.error(
                            codes::TYPE,
                            format!("repeat count of `do` must be `int`, got `{}`", e.ty),
                            e.span,
                        );
                    }
                    e
                });
                let body = self.check_scoped_block(body, env, ctx, true);
                let cond = cond
                    .as_ref()
                    .map(|c| self.check_condition(c, env, ctx, "do-while"));
                let else_body = self.check_scoped_block(else_body, env, ctx, in_loop);
                Some(HirStmt::Do {
                    count,
                    cond,
                    body,
                    else_body,
                })
            }
            ast::Stmt::Return { value, span } => {
                let value = value.as_ref().map(|v| self.infer(v, env, ctx));
                match (&value, &ctx.expected_ret) {
                    (None, Ty::Void) => {}
                    (Some(v), Ty::Void) => {
                        let msg = if ctx.is_ctor {
                            "constructors implicitly return `this`; remove the value"
                        } else {
                            "cannot return a value from a void function"
                        };
                        self.error(codes::TYPE, msg, v.span);
                    }
                    (None, expected) => {
                        let expected = expected.clone();
                        self.error(
                            codes::TYPE,
                            format!("missing return value in function returning `{expected}`"),
                            *span,
                        );
                    }
                    (Some(v), expected) => {
                        if !assignable(expected, &v.ty) {
                            let expected = expected.clone();
                            let got = v.ty.clone();
                            self.error(
                                codes::TYPE,
                                format!("return type mismatch: expected `{expected}`, got `{got}`"),
                                v.span,
                            );
                        }
                    }
                }
                Some(HirStmt::Return(value))
            }
            ast::Stmt::Break(span) => {
                if !in_loop {
                    self.error(codes::TYPE, "`break` outside of a loop", *span);
                }
                Some(HirStmt::Break)
            }
            ast::Stmt::Continue(span) => {
                if !in_loop {
                    self.error(codes::TYPE, "`continue` outside of a loop", *span);
                }
                Some(HirStmt::Continue)
            }
            ast::Stmt::Expr(expr) => {
                let e = self.infer(expr, env, ctx);
                Some(HirStmt::Expr(e))
            }
        }
    }

    fn check_condition(
        &mut self,
        cond: &ast::Expr,
        env: &mut Env,
        ctx: &BodyCtx,
        what: &str,
    ) -> HirExpr {
        let e = self.infer(cond, env, ctx);
        if e.ty != Ty::Bool {
            self.error(
                codes::TYPE,
                format!("condition of `{what}` must be `boolean`, got `{}`", e.ty),
                e.span,
            );
        }
        e
    }

    fn check_assign(
        &mut self,
        target: &ast::Expr,
        op: Option<BinOp>,
        value: &ast::Expr,
        span: Span,
        env: &mut Env,
        ctx: &BodyCtx,
    ) -> Option<HirStmt> {
        let value = self.infer(value, env, ctx);
        match &target.kind {
            ast::ExprKind::Ident(name) => {
                let Some(ty) = env.lookup(name).cloned() else {
                    self.error(
                        codes::NAME,
                        format!("assignment to undefined variable `{name}`"),
                        target.span,
                    );
                    return None;
                };
                let value = self.apply_compound(
                    op,
                    HirExpr {
                        ty: ty.clone(),
                        kind: HirExprKind::Local(name.clone()),
                        span: target.span,
                    },
                    value,
                    span,
                );
                if !assignable(&ty, &value.ty) {
                    self.error(
                        codes::TYPE,
                        format!("cannot assign `{}` to `{ty}` `{name}`", value.ty),
                        span,
                    );
                }
                Some(HirStmt::AssignLocal {
                    name: name.clone(),
                    value,
                })
            }
            ast::ExprKind::Field { obj, field } => {
                let obj = self.infer(obj, env, ctx);
                let (strct, field_ty) = self.field_of(&obj, field)?;
                let load = HirExpr {
                    ty: field_ty.clone(),
                    kind: HirExprKind::Field {
                        obj: Box::new(obj.clone()),
                        strct: strct.clone(),
                        field: field.name.clone(),
                    },
                    span: target.span,
                };
                let value = self.apply_compound(op, load, value, span);
                if !assignable(&field_ty, &value.ty) {
                    self.error(
                        codes::TYPE,
                        format!(
                            "cannot assign `{}` to field `{}` of type `{field_ty}`",
                            value.ty, field.name
                        ),
                        span,
                    );
                }
                Some(HirStmt::AssignField {
                    obj,
                    strct,
                    field: field.name.clone(),
                    value,
                })
            }
            ast::ExprKind::Index { obj, index } => {
                let array = self.infer(obj, env, ctx);
                let Ty::Array(elem) = array.ty.clone() else {
                    self.error(
                        codes::TYPE,
                        format!("cannot index non-array `{}`", array.ty),
                        array.span,
                    );
                    return None;
                };
                let index = self.infer(index, env, ctx);
                if index.ty != Ty::Int {
                    self.error(
                        codes::TYPE,
                        format!("array index must be `int`, got `{}`", index.ty),
                        index.span,
                    );
                }
                let load = HirExpr {
                    ty: (*elem).clone(),
                    kind: HirExprKind::Index {
                        array: Box::new(array.clone()),
                        index: Box::new(index.clone()),
                    },
                    span: target.span,
                };
                let value = self.apply_compound(op, load, value, span);
                if !assignable(&elem, &value.ty) {
                    self.error(
                        codes::TYPE,
                        format!("cannot store `{}` into `array<{elem}>`", value.ty),
                        span,
                    );
                }
                Some(HirStmt::AssignIndex {
                    array,
                    index,
                    value,
                })
            }
            _ => {
                self.error(codes::TYPE, "invalid assignment target", target.span);
                None
            }
        }
    }

    /// Desugar `lhs op= value` into `lhs op value`.
    fn apply_compound(
        &mut self,
        op: Option<BinOp>,
        load: HirExpr,
        value: HirExpr,
        span: Span,
    ) -> HirExpr {
        match op {
            None => value,
            Some(op) => self.check_binary(op, load, value, span),
        }
    }

    // -----------------------------------------------------------------
    // expressions
    // -----------------------------------------------------------------

    fn infer(&mut self, expr: &ast::Expr, env: &mut Env, ctx: &BodyCtx) -> HirExpr {
        let span = expr.span;
        match &expr.kind {
            ast::ExprKind::Int(v) => HirExpr {
                ty: Ty::Int,
                kind: HirExprKind::Int(*v),
                span,
            },
            ast::ExprKind::Bool(v) => HirExpr {
                ty: Ty::Bool,
                kind: HirExprKind::Bool(*v),
                span,
            },
            ast::ExprKind::Null => HirExpr {
                ty: Ty::Null,
                kind: HirExprKind::Null,
                span,
            },
            ast::ExprKind::Str(text) => {
                if self.structs.contains_key("vec") {
                    self.request_instantiation("vec", &[Ty::Int], span);
                } else {
                    self.error(
                        codes::TYPE,
                        "string literals require the standard library `vec` structure",
                        span,
                    );
                }
                HirExpr {
                    ty: Ty::Struct {
                        name: "vec".into(),
                        args: vec![Ty::Int],
                    },
                    kind: HirExprKind::Str(text.clone()),
                    span,
                }
            }
            ast::ExprKind::ArrayLit(elements) => self.infer_array_lit(elements, env, ctx, span),
            ast::ExprKind::Ident(name) => {
                if let Some(ty) = env.lookup(name) {
                    HirExpr {
                        ty: ty.clone(),
                        kind: HirExprKind::Local(name.clone()),
                        span,
                    }
                } else {
                    self.error(
                        codes::NAME,
                        format!("unknown variable `{name}`"),
                        span,
                    );
                    poison(span)
                }
            }
            ast::ExprKind::This => {
                if let Some(ty) = env.lookup("this") {
                    HirExpr {
                        ty: ty.clone(),
                        kind: HirExprKind::Local("this".into()),
                        span,
                    }
                } else {
                    self.error(codes::NAME, "`this` outside of a method", span);
                    poison(span)
                }
            }
            ast::ExprKind::Field { obj, field } => {
                let obj = self.infer(obj, env, ctx);
                if let Ty::Array(_) = obj.ty {
                    if field.name == "length" {
                        return HirExpr {
                            ty: Ty::Int,
                            kind: HirExprKind::ArrayLen {
                                array: Box::new(obj),
                            },
                            span,
                        };
                    }
                    self.error(
                        codes::TYPE,
                        format!("`array` has no field `{}`", field.name),
                        field.span,
                    );
                    return poison(span);
                }
                let Some((strct, field_ty)) = self.field_of(&obj, field) else {
                    return poison(span);
                };
                HirExpr {
                    ty: field_ty,
                    kind: HirExprKind::Field {
                        obj: Box::new(obj),
                        strct,
                        field: field.name.clone(),
                    },
                    span,
                }
            }
            ast::ExprKind::Index { obj, index } => {
                let array = self.infer(obj, env, ctx);
                let Ty::Array(elem) = array.ty.clone() else {
                    self.error(
                        codes::TYPE,
                        format!("cannot index non-array `{}`", array.ty),
                        array.span,
                    );
                    return poison(span);
                };
                let index = self.infer(index, env, ctx);
                if index.ty != Ty::Int {
                    self.error(
                        codes::TYPE,
                        format!("array index must be `int`, got `{}`", index.ty),
                        index.span,
                    );
                }
                HirExpr {
                    ty: (*elem).clone(),
                    kind: HirExprKind::Index {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    span,
                }
            }
            ast::ExprKind::Call { name, args } => self.infer_call(name, args, env, ctx, span),
            ast::ExprKind::Ctor {
                name,
                type_args,
                args,
            } => self.infer_ctor(name, type_args, args, env, ctx, span),
            ast::ExprKind::StaticCall {
                ty_name,
                type_args,
                method,
                args,
            } => self.infer_static_call(ty_name, type_args, method, args, env, ctx, span),
            ast::ExprKind::MethodCall { obj, method, args } => {
                self.infer_method_call(obj, method, args, env, ctx, span)
            }
            ast::ExprKind::Binary { op, lhs, rhs } => {
                let lhs = self.infer(lhs, env, ctx);
                let rhs = self.infer(rhs, env, ctx);
                self.check_binary(*op, lhs, rhs, span)
            }
            ast::ExprKind::Unary { op, expr } => {
                let inner = self.infer(expr, env, ctx);
                match op {
                    UnOp::Not => {
                        if inner.ty != Ty::Bool {
                            self.error(
                                codes::TYPE,
                                format!("`!` expects `boolean`, got `{}`", inner.ty),
                                inner.span,
                            );
                        }
                        HirExpr {
                            ty: Ty::Bool,
                            kind: HirExprKind::Unary {
                                op: UnOp::Not,
                                expr: Box::new(inner),
                            },
                            span,
                        }
                    }
                    UnOp::Neg => {
                        if inner.ty != Ty::Int {
                            self.error(
                                codes::TYPE,
                                format!("unary `-` expects `int`, got `{}`", inner.ty),
                                inner.span,
                            );
                        }
                        HirExpr {
                            ty: Ty::Int,
                            kind: HirExprKind::Unary {
                                op: UnOp::Neg,
                                expr: Box::new(inner),
                            },
                            span,
                        }
                    }
                }
            }
            ast::ExprKind::Cast { ty, expr } => {
                let inner = self.infer(expr, env, ctx);
                let target = match ty.name.as_str() {
                    "boolean" => Ty::Bool,
                    _ => Ty::Int,
                };
                if !matches!(inner.ty, Ty::Int | Ty::Bool) {
                    self.error(
                        codes::TYPE,
                        format!("cannot cast `{}` to `{}`", inner.ty, ty.name),
                        span,
                    );
                }
                // casts only adjust the static type; values are i32
                HirExpr {
                    ty: target,
                    kind: inner.kind,
                    span,
                }
            }
        }
    }

    fn infer_array_lit(
        &mut self,
        elements: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        if elements.is_empty() {
            self.error(
                codes::TYPE,
                "array literal requires at least one element",
                span,
            );
            return poison(span);
        }
        let elems: Vec<HirExpr> = elements.iter().map(|e| self.infer(e, env, ctx)).collect();
        let elem_ty = elems[0].ty.clone();
        if matches!(elem_ty, Ty::Void | Ty::Null) {
            self.error(
                codes::TYPE,
                format!("cannot infer array element type from `{elem_ty}`"),
                elems[0].span,
            );
            return poison(span);
        }
        for e in &elems[1..] {
            if !assignable(&elem_ty, &e.ty) {
                self.error(
                    codes::TYPE,
                    format!(
                        "array elements must all be `{elem_ty}`, got `{}`",
                        e.ty
                    ),
                    e.span,
                );
            }
        }
        HirExpr {
            ty: Ty::Array(Box::new(elem_ty)),
            kind: HirExprKind::ArrayLit(elems),
            span,
        }
    }

    fn infer_call(
        &mut self,
        name: &Ident,
        args: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        // `S(...)` where S is a non-generic structure (or an alias of
        // one) is a constructor call.
        if self.structs.contains_key(&name.name) || self.aliases.contains_key(&name.name) {
            return self.infer_ctor(name, &[], args, env, ctx, span);
        }
        if name.name == "array" {
            self.error(
                codes::TYPE,
                "`array` requires a type argument, e.g. `array<int>(3)`",
                span,
            );
            return poison(span);
        }
        let Some(sig) = self.funcs.get(&name.name).cloned() else {
            self.error(
                codes::NAME,
                format!("call to undefined function `{}`", name.name),
                span,
            );
            return poison(span);
        };
        let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
        let args = self.check_args(&name.name, &sig.params, args, span);
        HirExpr {
            ty: sig.ret,
            kind: HirExprKind::Call {
                callee: sig.callee,
                args,
            },
            span,
        }
    }

    fn infer_ctor(
        &mut self,
        name: &Ident,
        type_args: &[TypeExpr],
        args: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        // `array<T>(n)`
        if name.name == "array" {
            if type_args.len() != 1 {
                self.error(
                    codes::TYPE,
                    format!(
                        "constructor `array` expects 1 type argument, got {}",
                        type_args.len()
                    ),
                    span,
                );
                return poison(span);
            }
            let elem = self.resolve_value_type(&type_args[0], ctx.subst);
            let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
            let args = self.check_args("array", &[Ty::Int], args, span);
            let length = args.into_iter().next().unwrap_or_else(|| poison(span));
            return HirExpr {
                ty: Ty::Array(Box::new(elem)),
                kind: HirExprKind::ArrayNew {
                    length: Box::new(length),
                },
                span,
            };
        }

        // resolve the callee type; aliases expand here, so
        // `string()` reaches the `vec<char>` constructor
        let ty = self.resolve_named(name, type_args, ctx.subst);
        let Ty::Struct {
            name: strct_name,
            args: strct_args,
        } = ty
        else {
            self.error(
                codes::TYPE,
                format!("`{}` is not constructible", name.name),
                span,
            );
            return poison(span);
        };

        let tmpl = self
            .structs
            .get(&strct_name)
            .cloned()
            .expect("resolved struct exists");
        let Some(ctor) = tmpl.methods.iter().find(|m| m.is_ctor).cloned() else {
            self.error(
                codes::TYPE,
                format!("no constructor for `{strct_name}`"),
                span,
            );
            return poison(span);
        };

        let subst = param_subst(&tmpl, &strct_args);
        let param_tys: Vec<Ty> = ctor
            .params
            .iter()
            .map(|p| self.resolve_value_type(&p.ty, &subst))
            .collect();
        let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
        let args = self.check_args(&strct_name, &param_tys, args, span);

        let instance = Ty::Struct {
            name: strct_name.clone(),
            args: strct_args,
        };
        let mangled = instance.mangle();
        HirExpr {
            ty: instance,
            kind: HirExprKind::New {
                ctor: format!("{mangled}_{}", ctor.name.name),
                strct: mangled,
                args,
            },
            span,
        }
    }

    fn infer_static_call(
        &mut self,
        ty_name: &Ident,
        type_args: &[TypeExpr],
        method: &Ident,
        args: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        let ty = self.resolve_named(ty_name, type_args, ctx.subst);
        let Ty::Struct {
            name: strct_name,
            args: strct_args,
        } = ty
        else {
            self.error(
                codes::TYPE,
                format!("`{}` has no static methods", ty_name.name),
                span,
            );
            return poison(span);
        };
        let tmpl = self
            .structs
            .get(&strct_name)
            .cloned()
            .expect("resolved struct exists");
        let Some(m) = tmpl
            .methods
            .iter()
            .find(|m| !m.is_ctor && m.name.name == method.name)
            .cloned()
        else {
            self.error(
                codes::TYPE,
                format!("no static method `{}` on `{strct_name}`", method.name),
                method.span,
            );
            return poison(span);
        };
        if !m.is_static {
            self.error(
                codes::TYPE,
                format!(
                    "`{}` is an instance method of `{strct_name}`; call it on a value",
                    method.name
                ),
                method.span,
            );
            return poison(span);
        }

        let subst = param_subst(&tmpl, &strct_args);
        let param_tys: Vec<Ty> = m
            .params
            .iter()
            .map(|p| self.resolve_value_type(&p.ty, &subst))
            .collect();
        let ret = self.resolve_type(&m.return_type, &subst);
        let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
        let args = self.check_args(&method.name, &param_tys, args, span);

        let mangled = Ty::Struct {
            name: strct_name,
            args: strct_args,
        }
        .mangle();
        HirExpr {
            ty: ret,
            kind: HirExprKind::Call {
                callee: format!("{mangled}_{}", m.name.name),
                args,
            },
            span,
        }
    }

    fn infer_method_call(
        &mut self,
        obj: &ast::Expr,
        method: &Ident,
        args: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        // `S.m(...)` on a type name is a static call without type
        // arguments, and `module.name(...)` addresses a host import
        // by its full key (needed when two modules export the same
        // function name); local variables shadow both.
        if let ast::ExprKind::Ident(n) = &obj.kind {
            if env.lookup(n).is_none() {
                if let Some(imp) = self
                    .imports
                    .iter()
                    .find(|i| i.module == *n && i.name == method.name)
                    .cloned()
                {
                    let qualified = format!("{}.{}", imp.module, imp.name);
                    let args: Vec<HirExpr> =
                        args.iter().map(|a| self.infer(a, env, ctx)).collect();
                    let args = self.check_args(&qualified, &imp.params, args, span);
                    return HirExpr {
                        ty: imp.ret,
                        kind: HirExprKind::Call {
                            callee: qualified,
                            args,
                        },
                        span,
                    };
                }
                if self.structs.contains_key(n) || self.aliases.contains_key(n) {
                    let ty_name = Ident {
                        name: n.clone(),
                        span: obj.span,
                    };
                    return self.infer_static_call(&ty_name, &[], method, args, env, ctx, span);
                }
            }
        }

        let recv = self.infer(obj, env, ctx);
        match recv.ty.clone() {
            Ty::Array(elem) => {
                self.infer_array_method(recv, &elem, method, args, env, ctx, span)
            }
            Ty::Struct {
                name: strct_name,
                args: strct_args,
            } => {
                let tmpl = self
                    .structs
                    .get(&strct_name)
                    .cloned()
                    .expect("struct instances have templates");
                let Some(m) = tmpl
                    .methods
                    .iter()
                    .find(|m| !m.is_ctor && m.name.name == method.name)
                    .cloned()
                else {
                    self.error(
                        codes::TYPE,
                        format!("`{strct_name}` has no method `{}`", method.name),
                        method.span,
                    );
                    return poison(span);
                };
                if m.is_static {
                    self.error(
                        codes::TYPE,
                        format!(
                            "cannot call static method `{}` on an instance of `{strct_name}`",
                            method.name
                        ),
                        method.span,
                    );
                    return poison(span);
                }
                let subst = param_subst(&tmpl, &strct_args);
                let param_tys: Vec<Ty> = m
                    .params
                    .iter()
                    .map(|p| self.resolve_value_type(&p.ty, &subst))
                    .collect();
                let ret = self.resolve_type(&m.return_type, &subst);
                let args: Vec<HirExpr> =
                    args.iter().map(|a| self.infer(a, env, ctx)).collect();
                let args = self.check_args(&method.name, &param_tys, args, span);
                let mut checked = vec![recv];
                checked.extend(args);
                let mangled = Ty::Struct {
                    name: strct_name,
                    args: strct_args,
                }
                .mangle();
                HirExpr {
                    ty: ret,
                    kind: HirExprKind::Call {
                        callee: format!("{mangled}_{}", m.name.name),
                        args: checked,
                    },
                    span,
                }
            }
            other => {
                self.error(
                    codes::TYPE,
                    format!("cannot call method `{}` on `{other}`", method.name),
                    span,
                );
                poison(span)
            }
        }
    }

    /// Built-in methods of `array<T>`: `get`, `set`.
    fn infer_array_method(
        &mut self,
        recv: HirExpr,
        elem: &Ty,
        method: &Ident,
        args: &[ast::Expr],
        env: &mut Env,
        ctx: &BodyCtx,
        span: Span,
    ) -> HirExpr {
        match method.name.as_str() {
            "get" => {
                let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
                let args = self.check_args("get", &[Ty::Int], args, span);
                let index = args.into_iter().next().unwrap_or_else(|| poison(span));
                HirExpr {
                    ty: elem.clone(),
                    kind: HirExprKind::Index {
                        array: Box::new(recv),
                        index: Box::new(index),
                    },
                    span,
                }
            }
            "set" => {
                let args: Vec<HirExpr> = args.iter().map(|a| self.infer(a, env, ctx)).collect();
                let args =
                    self.check_args("set", &[Ty::Int, elem.clone()], args, span);
                let mut it = args.into_iter();
                let index = it.next().unwrap_or_else(|| poison(span));
                let value = it.next().unwrap_or_else(|| poison(span));
                HirExpr {
                    ty: Ty::Void,
                    kind: HirExprKind::ArraySet {
                        array: Box::new(recv),
                        index: Box::new(index),
                        value: Box::new(value),
                    },
                    span,
                }
            }
            other => {
                self.error(
                    codes::TYPE,
                    format!("`array` has no method `{other}`"),
                    method.span,
                );
                poison(span)
            }
        }
    }

    fn check_binary(&mut self, op: BinOp, lhs: HirExpr, rhs: HirExpr, span: Span) -> HirExpr {
        let ty = match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Rem => {
                if lhs.ty != Ty::Int || rhs.ty != Ty::Int {
                    self.error(
                        codes::TYPE,
                        format!(
                            "arithmetic `{}` expects `int` operands, got `{}` and `{}`",
                            op.symbol(),
                            lhs.ty,
                            rhs.ty
                        ),
                        span,
                    );
                }
                Ty::Int
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let scalars = matches!(lhs.ty, Ty::Int | Ty::Bool)
                    && matches!(rhs.ty, Ty::Int | Ty::Bool)
                    && lhs.ty == rhs.ty;
                if !scalars {
                    self.error(
                        codes::TYPE,
                        format!(
                            "comparison `{}` expects matching scalar operands, got `{}` and `{}`",
                            op.symbol(),
                            lhs.ty,
                            rhs.ty
                        ),
                        span,
                    );
                }
                Ty::Bool
            }
            BinOp::Eq | BinOp::Ne => {
                let ok = lhs.ty == rhs.ty
                    || (lhs.ty == Ty::Null && rhs.ty.is_reference())
                    || (rhs.ty == Ty::Null && lhs.ty.is_reference());
                if !ok {
                    self.error(
                        codes::TYPE,
                        format!(
                            "cannot compare `{}` {} `{}`",
                            lhs.ty,
                            op.symbol(),
                            rhs.ty
                        ),
                        span,
                    );
                }
                Ty::Bool
            }
            BinOp::And | BinOp::Or => {
                if lhs.ty != Ty::Bool || rhs.ty != Ty::Bool {
                    self.error(
                        codes::TYPE,
                        format!(
                            "logical `{}` expects `boolean` operands, got `{}` and `{}`",
                            op.symbol(),
                            lhs.ty,
                            rhs.ty
                        ),
                        span,
                    );
                }
                Ty::Bool
            }
        };
        HirExpr {
            ty,
            kind: HirExprKind::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        }
    }

    fn check_args(
        &mut self,
        what: &str,
        params: &[Ty],
        args: Vec<HirExpr>,
        span: Span,
    ) -> Vec<HirExpr> {
        if params.len() != args.len() {
            self.error(
                codes::TYPE,
                format!(
                    "`{what}` expects {} argument(s), got {}",
                    params.len(),
                    args.len()
                ),
                span,
            );
            return args;
        }
        for (param, arg) in params.iter().zip(&args) {
            if !assignable(param, &arg.ty) {
                self.error(
                    codes::TYPE,
                    format!("in call to `{what}`, expected `{param}`, got `{}`", arg.ty),
                    arg.span,
                );
            }
        }
        args
    }

    /// Resolve a field access on a structure instance: the owning
    /// structure's mangled name plus the field's substituted type.
    fn field_of(&mut self, obj: &HirExpr, field: &Ident) -> Option<(String, Ty)> {
        let Ty::Struct { name, args } = &obj.ty else {
            self.error(
                codes::TYPE,
                format!("cannot access field `{}` on `{}`", field.name, obj.ty),
                field.span,
            );
            return None;
        };
        let tmpl = self
            .structs
            .get(name)
            .cloned()
            .expect("struct instances have templates");
        let Some(f) = tmpl.fields.iter().find(|f| f.name.name == field.name).cloned() else {
            self.error(
                codes::TYPE,
                format!("`{name}` has no field `{}`", field.name),
                field.span,
            );
            return None;
        };
        let subst = param_subst(&tmpl, args);
        let field_ty = self.resolve_value_type(&f.ty, &subst);
        Some((obj.ty.mangle(), field_ty))
    }
}

/// Map a structure template's type parameters to concrete arguments.
fn param_subst(tmpl: &StructureDecl, args: &[Ty]) -> Subst {
    tmpl.type_params
        .iter()
        .zip(args)
        .map(|(p, a)| (p.name.clone(), a.clone()))
        .collect()
}

/// `source` may be stored into a slot of type `target`.
fn assignable(target: &Ty, source: &Ty) -> bool {
    source == target || (*source == Ty::Null && target.is_reference())
}

/// Conservative all-paths-return analysis.
fn block_returns(stmts: &[HirStmt]) -> bool {
    stmts.iter().any(|s| match s {
        HirStmt::Return(_) => true,
        HirStmt::If {
            then_body,
            else_body,
            ..
        } => block_returns(then_body) && block_returns(else_body),
        HirStmt::Block(body) => block_returns(body),
        _ => false,
    })
}

fn dedup_diagnostics(diags: Vec<Diagnostic>) -> Vec<Diagnostic> {
    let mut seen: BTreeSet<(String, Option<&'static str>, u32, u32, u32)> = BTreeSet::new();
    let mut out = Vec::new();
    for d in diags {
        let at = d.primary_span();
        let key = (d.message.clone(), d.code, at.file.0, at.start, at.len);
        if seen.insert(key) {
            out.push(d);
        }
    }
    out
}

/// Placeholder expression after an error, typed `int` to keep
/// checking going without cascading too far.
fn poison(span: Span) -> HirExpr {
    HirExpr {
        ty: Ty::Int,
        kind: HirExprKind::Int(0),
        span,
    }
}

pub(crate) use method_check::check_instantiation;

mod method_check {
    use super::*;

    /// Check one structure instantiation: compute its layout and
    /// type-check the substituted constructor and methods, producing
    /// their HIR under mangled names. Invoked by the monomorphizer's
    /// worklist; nested uses of further generic types enqueue more
    /// pairs.
    pub(crate) fn check_instantiation(
        checker: &mut Checker,
        name: &str,
        args: &[Ty],
        span: Span,
    ) {
        let Some(tmpl) = checker.structs.get(name).cloned() else {
            // unknown structures were already diagnosed at resolution
            return;
        };
        let instance = Ty::Struct {
            name: name.to_string(),
            args: args.to_vec(),
        };
        let mangled = instance.mangle();
        let subst = param_subst(&tmpl, args);

        let mut fields = Vec::new();
        for f in &tmpl.fields {
            let ty = checker.resolve_value_type(&f.ty, &subst);
            fields.push((f.name.name.clone(), ty));
        }
        checker
            .layouts
            .insert(mangled.clone(), Layout::for_fields(fields));

        for m in &tmpl.methods {
            check_method(checker, &instance, &mangled, m, &subst, span);
        }
    }

    fn check_method(
        checker: &mut Checker,
        instance: &Ty,
        mangled: &str,
        m: &MethodDecl,
        subst: &Subst,
        _request_span: Span,
    ) {
        let fn_name = format!("{mangled}_{}", m.name.name);
        if m.is_ctor {
            checker.check_callable(
                fn_name,
                Some(instance.clone()),
                &m.params,
                Ty::Void,
                &m.body,
                subst,
                true,
                m.span,
            );
        } else if m.is_static {
            let ret = checker.resolve_type(&m.return_type, subst);
            checker.check_callable(
                fn_name,
                None,
                &m.params,
                ret,
                &m.body,
                subst,
                false,
                m.span,
            );
        } else {
            let ret = checker.resolve_type(&m.return_type, subst);
            checker.check_callable(
                fn_name,
                Some(instance.clone()),
                &m.params,
                ret,
                &m.body,
                subst,
                false,
                m.span,
            );
        }
    }
}
