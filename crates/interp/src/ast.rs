//! Abstract syntax for the command language.

use num_bigint::BigInt;

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Nil,
    Bool(bool),
    Int(BigInt),
    Float(f64),
    Str(String),

    /// `{e1, e2, …}`
    Array(Vec<Expr>),

    /// `{name = e, …}`
    Record(Vec<(String, Expr)>),

    /// Dotted path read, e.g. `iso.value`.
    Path(Vec<String>),

    /// Call through a dotted path, optionally a method call through `:`.
    Call {
        path: Vec<String>,
        method: Option<String>,
        args: Vec<Expr>,
    },

    /// Unary negation of a numeric literal or path read.
    Neg(Box<Expr>),
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for effect; result discarded.
    Expr(Expr),

    /// `path = expr`
    Assign { path: Vec<String>, value: Expr },

    /// `return expr` — must be the final statement.
    Return(Expr),
}

/// A parsed program.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}
