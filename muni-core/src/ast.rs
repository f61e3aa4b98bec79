//! Source-level abstract syntax tree for Muni.
//!
//! Every node category is a discriminated union so that the resolver
//! and lowerer stay exhaustive when new node kinds are introduced.

use crate::span::Span;

/// Identifier with span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

/// A parsed compilation unit: the top-level declarations of one file
/// (after import resolution, of the whole merged module).
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub decls: Vec<Decl>,
}

/// Top-level declarations.
#[derive(Debug, Clone, PartialEq)]
pub enum Decl {
    Function(FunctionDecl),
    Structure(StructureDecl),
    Alias(AliasDecl),
    HostImport(HostImportDecl),
    FileImport(FileImportDecl),
}

/// A free function: `type name(params) { body }`.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: Ident,
    pub ty: TypeExpr,
}

/// `structure Name<T, ...> { fields methods }`.
///
/// The constructor is stored as a method whose `is_ctor` flag is set;
/// its name equals the structure name and it has no return type of
/// its own (it implicitly returns `this`).
#[derive(Debug, Clone, PartialEq)]
pub struct StructureDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub fields: Vec<FieldDecl>,
    pub methods: Vec<MethodDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: Ident,
    pub ty: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MethodDecl {
    pub name: Ident,
    pub params: Vec<Param>,
    pub return_type: TypeExpr,
    pub body: Vec<Stmt>,
    pub is_static: bool,
    pub is_ctor: bool,
    pub span: Span,
}

/// `alias name<T, ...> = type;`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasDecl {
    pub name: Ident,
    pub type_params: Vec<Ident>,
    pub body: TypeExpr,
    pub span: Span,
}

/// `import module.name(arg_types) -> ret_type;`
#[derive(Debug, Clone, PartialEq)]
pub struct HostImportDecl {
    pub module: Ident,
    pub name: Ident,
    pub params: Vec<TypeExpr>,
    pub return_type: TypeExpr,
    pub span: Span,
}

/// `import <path.mun>`
#[derive(Debug, Clone, PartialEq)]
pub struct FileImportDecl {
    pub path: String,
    pub span: Span,
}

/// Syntactic type, before resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeExpr {
    Void(Span),
    Array(Box<TypeExpr>, Span),
    Named { name: Ident, args: Vec<TypeExpr> },
}

impl TypeExpr {
    pub fn span(&self) -> Span {
        match self {
            TypeExpr::Void(span) => *span,
            TypeExpr::Array(_, span) => *span,
            TypeExpr::Named { name, .. } => name.span,
        }
    }
}

/// Statements.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Block(Vec<Stmt>, Span),
    VarDecl {
        ty: TypeExpr,
        name: Ident,
        init: Expr,
        span: Span,
    },
    /// `target = value;` or compound `target op= value;`. The target
    /// must be an identifier, a field access, or an index expression;
    /// the resolver rejects anything else.
    Assign {
        target: Expr,
        op: Option<BinOp>,
        value: Expr,
        span: Span,
    },
    If {
        cond: Expr,
        then_body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    While {
        cond: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    /// `until (c) { .. }` — a while loop with inverted header test.
    Until {
        cond: Expr,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    For {
        init: Option<Box<Stmt>>,
        cond: Option<Expr>,
        step: Option<Box<Stmt>>,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    /// `do <count>? { .. } while (c)? else { .. }?`
    Do {
        count: Option<Expr>,
        cond: Option<Expr>,
        body: Vec<Stmt>,
        else_body: Vec<Stmt>,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Expr(Expr),
}

impl Stmt {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Block(_, span)
            | Stmt::VarDecl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::Until { span, .. }
            | Stmt::For { span, .. }
            | Stmt::Do { span, .. }
            | Stmt::Return { span, .. }
            | Stmt::Break(span)
            | Stmt::Continue(span) => *span,
            Stmt::Expr(e) => e.span,
        }
    }
}

/// Expressions.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    /// Integer literal; character literals also land here with the
    /// code point as value, since `char` is an alias for `int`.
    Int(i32),
    Bool(bool),
    Str(String),
    ArrayLit(Vec<Expr>),
    Null,
    Ident(String),
    This,
    Field {
        obj: Box<Expr>,
        field: Ident,
    },
    Index {
        obj: Box<Expr>,
        index: Box<Expr>,
    },
    /// `name(args)` — a free function call, or a constructor call of
    /// a non-generic structure or alias (resolved later).
    Call {
        name: Ident,
        args: Vec<Expr>,
    },
    MethodCall {
        obj: Box<Expr>,
        method: Ident,
        args: Vec<Expr>,
    },
    /// `Name<T, ...>(args)`
    Ctor {
        name: Ident,
        type_args: Vec<TypeExpr>,
        args: Vec<Expr>,
    },
    /// `Name<T, ...>.method(args)`
    StaticCall {
        ty_name: Ident,
        type_args: Vec<TypeExpr>,
        method: Ident,
        args: Vec<Expr>,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnOp,
        expr: Box<Expr>,
    },
    /// `(type) expr` over the scalar type names.
    Cast {
        ty: Ident,
        expr: Box<Expr>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    /// Surface spelling, for diagnostics.
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Rem => "%",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Not,
    Neg,
}
