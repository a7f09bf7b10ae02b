//! Error types for the interpreter substrate.
//!
//! Covers value access failures, table arena faults, evaluation stack
//! underflow and command-language parse errors.

use thiserror::Error;

/// Interpreter errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InterpError {
    /// Parse error with source position
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        message: String,
        line: usize,
        column: usize,
    },

    /// Evaluation stack underflow
    #[error("Stack underflow: requested {requested} values, {available} available")]
    StackUnderflow { requested: usize, available: usize },

    /// A dotted path segment resolved to something that is not a table
    #[error("Path segment is not a table: {path}")]
    NotATable { path: String },

    /// A dotted path did not resolve
    #[error("No such path: {path}")]
    NoSuchPath { path: String },

    /// A table handle referenced a freed or out-of-range arena slot
    #[error("Invalid table handle: {id}")]
    InvalidTable { id: u32 },

    /// Value accessor used on the wrong variant
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Metatable index chain exceeded the cycle bound
    #[error("Metatable chain too deep resolving {key}")]
    MetaChainTooDeep { key: String },

    /// Generic runtime failure
    #[error("{message}")]
    Runtime { message: String },
}

impl InterpError {
    /// Creates a parse error at the given position.
    pub fn parse<S: Into<String>>(message: S, line: usize, column: usize) -> Self {
        Self::Parse {
            message: message.into(),
            line,
            column,
        }
    }

    /// Creates a stack underflow error.
    pub fn underflow(requested: usize, available: usize) -> Self {
        Self::StackUnderflow {
            requested,
            available,
        }
    }

    /// Creates a not-a-table error for the given path.
    pub fn not_a_table<S: Into<String>>(path: S) -> Self {
        Self::NotATable { path: path.into() }
    }

    /// Creates a no-such-path error.
    pub fn no_such_path<S: Into<String>>(path: S) -> Self {
        Self::NoSuchPath { path: path.into() }
    }

    /// Creates a type mismatch error.
    pub fn type_mismatch(expected: &'static str, got: &'static str) -> Self {
        Self::TypeMismatch { expected, got }
    }

    /// Creates a generic runtime error.
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

/// Result type for interpreter operations.
pub type InterpResult<T> = Result<T, InterpError>;
