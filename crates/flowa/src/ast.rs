//! AST nodes produced by the parser.
//!
//! The tree is deliberately small: parser-level sugar (pipelines, service
//! blocks' route arrows) is lowered while parsing wherever that keeps the
//! compiler simple, so several surface forms never appear here.

use std::fmt;

/// A parsed source file or REPL line.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A block of statements, either brace-delimited or indentation-delimited in
/// the source. Both surface forms produce the same node.
pub type Block = Vec<Stmt>;

/// One `if`/`elif` arm: condition plus body.
#[derive(Debug, Clone, PartialEq)]
pub struct IfArm {
    pub condition: Expr,
    pub body: Block,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `name = expr`
    Assign { name: String, value: Expr },
    /// `return` / `return expr`
    Return(Option<Expr>),
    /// `break`
    Break,
    /// An expression evaluated for its value (or side effect).
    Expr(Expr),
    /// `func name(params) { ... }` / `def name(params): ...`
    ///
    /// `async` functions parse to the same node; the flag is kept so tooling
    /// can see it, but execution is eager either way.
    Func {
        name: String,
        params: Vec<String>,
        body: Block,
        is_async: bool,
    },
    /// `if` with any number of `elif` arms and an optional `else` block.
    If { arms: Vec<IfArm>, or_else: Option<Block> },
    /// `while cond: ...`
    While { condition: Expr, body: Block },
    /// `for name in iterable: ...`
    ForIn {
        var: String,
        iterable: Expr,
        body: Block,
    },
    /// C-style `for (init; cond; post) { ... }`
    ForC {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        post: Option<Box<Stmt>>,
        body: Block,
    },
    /// `module name:` followed by a block of declarations.
    Module { name: String, body: Block },
    /// `import "path"`
    Import { path: String },
    /// `from "path" import a, b` / `from "path" import *` /
    /// `import {a, b} from "path"`. `names: None` means the star form.
    FromImport {
        path: String,
        names: Option<Vec<String>>,
    },
    /// `type Name:` followed by one field name per line.
    TypeDecl { name: String, fields: Vec<String> },
    /// `service Name on ":port":` followed by routes and middleware.
    Service {
        name: String,
        addr: String,
        body: Block,
    },
    /// `METHOD "path" -> handler` inside a service block.
    Route {
        method: String,
        path: String,
        handler: Expr,
    },
    /// `use middleware` inside a service block.
    Use(Expr),
    /// `defer expr`
    Defer(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// Unary minus.
    Neg,
    /// Logical not.
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    NotEq,
    Lt,
    Gt,
    LtEq,
    GtEq,
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Eq => "==",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::LtEq => "<=",
            Self::GtEq => ">=",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostfixOp {
    /// `x++`
    Inc,
    /// `x--`
    Dec,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Ident(String),
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Array(Vec<Expr>),
    /// `{key: value, ...}` map literal. Pairs keep source order.
    Map(Vec<(Expr, Expr)>),
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        op: InfixOp,
        right: Box<Expr>,
    },
    /// `x++` / `x--`. The operand is kept as an expression so the compiler
    /// can report a precise error when it is not a plain identifier.
    Postfix {
        op: PostfixOp,
        operand: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    /// `left[index]`
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
    /// `object.name` — member access on maps and modules.
    Member {
        object: Box<Expr>,
        name: String,
    },
    /// `spawn expr`
    Spawn(Box<Expr>),
    /// `await expr`
    Await(Box<Expr>),
}

impl Expr {
    /// Returns the identifier name when this expression is a bare name.
    #[must_use]
    pub fn as_ident(&self) -> Option<&str> {
        match self {
            Self::Ident(name) => Some(name),
            _ => None,
        }
    }
}
