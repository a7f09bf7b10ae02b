//! Error taxonomy for the scripting engine.
//!
//! Every failure the engine can report belongs to this closed set. All
//! variants carry a textual message only; there are no numeric error codes.
//! Interpreter faults fold in through [`ScriptError::Interp`].

use argus_interp::InterpError;
use thiserror::Error;

/// Scripting engine errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    /// Fault raised by the interpreter substrate (parse errors, stack
    /// underflow, table faults)
    #[error(transparent)]
    Interp(#[from] InterpError),

    /// A native function could not be bound
    #[error("Function binding failed: {message}")]
    FunBind { message: String },

    /// Call or configuration against an unregistered function name
    #[error("No such function: {name}")]
    NonExistentFunction { name: String },

    /// Registration attempted over an already-registered function name
    #[error("Name already registered: {name}")]
    DuplicateName { name: String },

    /// Hook or undo/redo override whose signature does not match the target
    #[error("Signature mismatch for {name}: expected ({expected}), got ({got})")]
    InvalidFunSignature {
        name: String,
        expected: String,
        got: String,
    },

    /// A provenance record was begun while another was being logged
    #[error("Provenance reentry is not allowed; consider provenance.enableReentryException(false)")]
    ProvenanceReenter,

    /// Undo/redo replay failed for a reason common to both directions
    #[error("Invalid undo/redo operation: {message}")]
    ProvenanceInvalidUndoOrRedo { message: String },

    /// Undo was not possible
    #[error("Invalid undo: {message}")]
    ProvenanceInvalidUndo { message: String },

    /// Redo was not possible
    #[error("Invalid redo: {message}")]
    ProvenanceInvalidRedo { message: String },

    /// The undo stack did not contain enough history to rebuild deleted
    /// instances
    #[error("Undo failed: {message}")]
    ProvenanceFailedUndo { message: String },

    /// Argument or return value of the wrong type
    #[error("Invalid type for parameter {param} of {name}: expected {expected}, got {got}")]
    InvalidType {
        name: String,
        param: usize,
        expected: String,
        got: String,
    },

    /// Call with the wrong number of arguments
    #[error("Unequal parameter count for {name}: expected {expected}, got {got}")]
    UnequalNumParams {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A custom undo function was installed twice
    #[error("Undo function already set for {name}")]
    UndoFuncAlreadySet { name: String },

    /// A custom redo function was installed twice
    #[error("Redo function already set for {name}")]
    RedoFuncAlreadySet { name: String },

    /// Lookup of a class instance that is not registered
    #[error("No such class instance: {which}")]
    NonExistentClassInstance { which: String },

    /// Generic engine failure
    #[error("{message}")]
    Runtime { message: String },
}

impl ScriptError {
    /// Creates a binding failure.
    pub fn fun_bind<S: Into<String>>(message: S) -> Self {
        Self::FunBind {
            message: message.into(),
        }
    }

    /// Creates a missing-function error.
    pub fn no_such_function<S: Into<String>>(name: S) -> Self {
        Self::NonExistentFunction { name: name.into() }
    }

    /// Creates a duplicate-name error.
    pub fn duplicate_name<S: Into<String>>(name: S) -> Self {
        Self::DuplicateName { name: name.into() }
    }

    /// Creates a type error without call context.
    pub fn invalid_type<E: Into<String>, G: Into<String>>(expected: E, got: G) -> Self {
        Self::InvalidType {
            name: String::new(),
            param: 0,
            expected: expected.into(),
            got: got.into(),
        }
    }

    /// Creates an invalid undo error.
    pub fn invalid_undo<S: Into<String>>(message: S) -> Self {
        Self::ProvenanceInvalidUndo {
            message: message.into(),
        }
    }

    /// Creates an invalid redo error.
    pub fn invalid_redo<S: Into<String>>(message: S) -> Self {
        Self::ProvenanceInvalidRedo {
            message: message.into(),
        }
    }

    /// Creates an invalid undo-or-redo error.
    pub fn invalid_undo_redo<S: Into<String>>(message: S) -> Self {
        Self::ProvenanceInvalidUndoOrRedo {
            message: message.into(),
        }
    }

    /// Creates a failed-undo error.
    pub fn failed_undo<S: Into<String>>(message: S) -> Self {
        Self::ProvenanceFailedUndo {
            message: message.into(),
        }
    }

    /// Creates a missing-instance error.
    pub fn no_such_instance<S: Into<String>>(which: S) -> Self {
        Self::NonExistentClassInstance {
            which: which.into(),
        }
    }

    /// Creates a generic runtime error.
    pub fn runtime<S: Into<String>>(message: S) -> Self {
        Self::Runtime {
            message: message.into(),
        }
    }
}

/// Result type for engine operations.
pub type ScriptResult<T> = Result<T, ScriptError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = ScriptError::no_such_function("iso.set");
        assert_eq!(err.to_string(), "No such function: iso.set");

        let err = ScriptError::UnequalNumParams {
            name: "iso.set".into(),
            expected: 1,
            got: 2,
        };
        assert_eq!(
            err.to_string(),
            "Unequal parameter count for iso.set: expected 1, got 2"
        );
    }

    #[test]
    fn test_interp_fold() {
        let inner = InterpError::underflow(1, 0);
        let err: ScriptError = inner.clone().into();
        assert_eq!(err, ScriptError::Interp(inner));
    }
}
