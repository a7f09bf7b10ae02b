//! # Argus Scripting Engine
//!
//! The embedded scripting, reflection and provenance engine of the Argus
//! framework. Native collaborators (renderers, IO managers, transfer
//! function editors) register functions and classes here; everything they
//! expose becomes callable from the command language, type-checked,
//! hooked, and recorded in a linear undo/redo history.
//!
//! ## Architecture
//!
//! - **Transit/marshalling**: the closed set of types that cross the
//!   boundary, with canonical type strings and per-type defaults
//! - **Binding**: one variadic mechanism turning any supported native
//!   signature into a uniform callable plus signature metadata
//! - **Registry**: per-function records carrying defaults, last-exec
//!   state, hooks and behaviour flags
//! - **Classes/instances**: factories published at `<class>.new`,
//!   instances held in an engine-owned arena with integer ids
//! - **Provenance**: the undo/redo stack, command grouping, and the
//!   re-roll algorithm recreating deleted instances under their original
//!   ids
//! - **Dispatcher**: `exec`/`cexec`/`execRet`/`cexecRet` entry points over
//!   a shared pipeline
//!
//! ## Example
//!
//! ```
//! use argus_script::ScriptEngine;
//!
//! # fn main() -> argus_script::ScriptResult<()> {
//! let mut engine = ScriptEngine::new()?;
//! engine.register_function(
//!     |v: f32| -> argus_script::ScriptResult<()> {
//!         log::info!("iso value now {v}");
//!         Ok(())
//!     },
//!     "iso.set",
//!     "Sets the isosurface extraction value.",
//!     true,
//! )?;
//!
//! engine.cexec("iso.set", (0.7_f32,))?;
//! engine.exec("iso.set(0.5)")?;
//! engine.cexec("provenance.undo", ())?;
//! # Ok(())
//! # }
//! ```

#![warn(rustdoc::missing_crate_level_docs)]

/// Typed binding of native callables
pub mod bind;
/// Builtin reflected command surface
mod builtins;
/// Class constructor subsystem and instance handles
pub mod classes;
/// The engine and dispatcher
pub mod engine;
/// Error taxonomy
pub mod error;
/// Command-language evaluator
mod eval;
/// Instance registry
pub mod instances;
/// Type marshalling capability
pub mod marshal;
/// Undo/redo provenance engine
pub mod provenance;
/// Function registry
pub mod registry;
/// Evaluation-stack balance guard
pub mod stack_guard;

pub use argus_interp::{InterpError, Value};
pub use bind::{NativeCallable, ParamPack, Signature};
pub use classes::{ClassInstance, ClassRegistry};
pub use engine::ScriptEngine;
pub use error::{ScriptError, ScriptResult};
pub use marshal::{Bytes, Record, TableRef, Transit};
pub use provenance::{Provenance, UndoRedoItem};
pub use registry::{FunFlags, FunKind, FunctionDesc, FunctionRegistry};
pub use stack_guard::StackGuard;

/// Reserved system namespace.
pub const SYSTEM_TABLE: &str = "_sys_";

/// Container table for class instances.
pub const CLASS_INSTANCE_TABLE: &str = "_sys_.inst";

/// Prefix of instance table names: instances live at `_sys_.inst.m<id>`.
pub const CLASS_INSTANCE_PREFIX: &str = "m";

/// Reserved name of the pointer lookup table.
///
/// The lookup itself is kept natively in the instance registry; the name
/// stays reserved so scripts cannot squat on it.
pub const CLASS_LOOKUP_TABLE: &str = "_sys_.lookup";

/// The no-op system command anchoring command groups.
pub const SYSTEM_NOP: &str = "_sys_.nop";
