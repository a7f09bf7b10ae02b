//! Function registry.
//!
//! One [`FunctionRecord`] per registered fully-qualified name. The registry
//! owns every record in a slot arena; the interpreter's table tree stores
//! only [`FuncKey`] handles pointing back here.

use bitflags::bitflags;
use hashbrown::HashMap;

use argus_interp::{FuncKey, Value};

use crate::bind::{NativeCallable, Signature};
use crate::error::{ScriptError, ScriptResult};

bitflags! {
    /// Per-function behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct FunFlags: u8 {
        /// Log the call but keep it off the undo/redo stack.
        const STACK_EXEMPT = 0b0001;

        /// Skip provenance entirely.
        const PROV_EXEMPT = 0b0010;

        /// Execute a no-op on undo; children are still walked.
        const NULL_UNDO = 0b0100;

        /// Execute a no-op on redo; children are still walked.
        const NULL_REDO = 0b1000;
    }
}

/// Discriminator for the native callable held by a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunKind {
    /// Free function or capturing closure.
    Free,

    /// Member function bound to a receiver.
    Member,

    /// Class factory published at `<class>.new`.
    Constructor,

    /// Engine-internal builtin.
    Builtin,
}

/// Documentation attached to one parameter (or the return value at index 0).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParamInfo {
    pub name: String,
    pub desc: String,
}

/// A static post-call hook.
pub struct Hook {
    /// Unique id minted from the record's hook index.
    pub id: u64,
    pub callable: NativeCallable,
}

/// A member post-call hook, keyed by its subscriber for bulk removal.
pub struct MemberHook {
    /// Opaque subscriber id; every hook a subscriber installs carries it.
    pub subscriber: String,
    pub callable: NativeCallable,
}

/// Everything the engine knows about one registered function.
pub struct FunctionRecord {
    /// Fully qualified name, e.g. `tuv.renderer.setIsoValue`.
    pub fq_name: String,

    /// Human description.
    pub desc: String,

    /// Signature metadata captured at bind time.
    pub signature: Signature,

    /// The native callable.
    pub callable: NativeCallable,

    /// What kind of callable this is.
    pub kind: FunKind,

    /// Defaults vector, one entry per parameter. Synthesizes the first undo.
    pub defaults: Vec<Value>,

    /// Arguments of the most recent successful call.
    pub last_exec: Vec<Value>,

    /// Static post-call hooks, fired in registration order.
    pub hooks: Vec<Hook>,

    /// Member post-call hooks, fired after the static hooks.
    pub member_hooks: Vec<MemberHook>,

    /// Monotonic counter minting hook ids.
    pub hook_index: u64,

    /// Behaviour flags.
    pub flags: FunFlags,

    /// Custom undo replacement; may be installed at most once.
    pub undo_fn: Option<NativeCallable>,

    /// Custom redo replacement; may be installed at most once.
    pub redo_fn: Option<NativeCallable>,

    /// Parameter documentation, indexed from 1. Index 0 describes the
    /// return value.
    pub param_info: HashMap<usize, ParamInfo>,
}

impl FunctionRecord {
    /// Creates a record with defaults and last-exec seeded from the
    /// signature's default values.
    pub fn new(
        fq_name: String,
        desc: String,
        signature: Signature,
        callable: NativeCallable,
        kind: FunKind,
    ) -> Self {
        let defaults = signature.defaults.clone();
        Self {
            fq_name,
            desc,
            callable,
            kind,
            last_exec: defaults.clone(),
            defaults,
            hooks: Vec::new(),
            member_hooks: Vec::new(),
            hook_index: 0,
            flags: FunFlags::empty(),
            undo_fn: None,
            redo_fn: None,
            param_info: HashMap::new(),
            signature,
        }
    }

    /// Number of parameters the callable consumes.
    pub fn num_params(&self) -> usize {
        self.signature.num_params()
    }

    /// Unqualified name (the final path segment).
    pub fn unqualified_name(&self) -> &str {
        self.fq_name
            .rsplit('.')
            .next()
            .unwrap_or(self.fq_name.as_str())
    }

    /// Mints a fresh hook id.
    pub fn next_hook_id(&mut self) -> u64 {
        let id = self.hook_index;
        self.hook_index += 1;
        id
    }
}

/// Summary row used by `help()` and `log.printFunctions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDesc {
    pub fq_name: String,
    pub desc: String,
    pub param_sig: String,
    pub sig: String,
}

/// The registry: a slot arena of records plus the name index.
#[derive(Default)]
pub struct FunctionRegistry {
    records: Vec<Option<FunctionRecord>>,
    by_name: HashMap<String, FuncKey>,

    /// Root-level table names created by registration, in creation order.
    /// Walked by `unregisterAllFunctions` at shutdown.
    root_registered: Vec<String>,
}

impl FunctionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a record, returning its key.
    ///
    /// Fails with `DuplicateName` when the name is already registered.
    pub fn insert(&mut self, record: FunctionRecord) -> ScriptResult<FuncKey> {
        if self.by_name.contains_key(&record.fq_name) {
            return Err(ScriptError::duplicate_name(&record.fq_name));
        }
        let name = record.fq_name.clone();
        let key = FuncKey(self.records.len() as u32);
        self.records.push(Some(record));
        self.by_name.insert(name, key);
        Ok(key)
    }

    /// Resolves a name to its key.
    pub fn key_of(&self, name: &str) -> Option<FuncKey> {
        self.by_name.get(name).copied()
    }

    /// Returns true if the name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Borrows a record by key.
    pub fn record(&self, key: FuncKey) -> ScriptResult<&FunctionRecord> {
        self.records
            .get(key.0 as usize)
            .and_then(|r| r.as_ref())
            .ok_or_else(|| ScriptError::runtime(format!("stale function key {key}")))
    }

    /// Borrows a record by key, mutably.
    pub fn record_mut(&mut self, key: FuncKey) -> ScriptResult<&mut FunctionRecord> {
        self.records
            .get_mut(key.0 as usize)
            .and_then(|r| r.as_mut())
            .ok_or_else(|| ScriptError::runtime(format!("stale function key {key}")))
    }

    /// Borrows a record by name.
    pub fn record_by_name(&self, name: &str) -> ScriptResult<&FunctionRecord> {
        let key = self
            .key_of(name)
            .ok_or_else(|| ScriptError::no_such_function(name))?;
        self.record(key)
    }

    /// Borrows a record by name, mutably.
    pub fn record_by_name_mut(&mut self, name: &str) -> ScriptResult<&mut FunctionRecord> {
        let key = self
            .key_of(name)
            .ok_or_else(|| ScriptError::no_such_function(name))?;
        self.record_mut(key)
    }

    /// Removes a record by name, returning it.
    pub fn remove(&mut self, name: &str) -> ScriptResult<FunctionRecord> {
        let key = self
            .by_name
            .remove(name)
            .ok_or_else(|| ScriptError::no_such_function(name))?;
        self.records
            .get_mut(key.0 as usize)
            .and_then(|r| r.take())
            .ok_or_else(|| ScriptError::runtime(format!("stale function key {key}")))
    }

    /// Remembers a root-level table name created during registration.
    pub fn note_root_registered(&mut self, name: &str) {
        if !self.root_registered.iter().any(|n| n == name) {
            self.root_registered.push(name.to_string());
        }
    }

    /// Root-level names created by registration.
    pub fn root_registered(&self) -> &[String] {
        &self.root_registered
    }

    /// Clears the root-registered list.
    pub fn clear_root_registered(&mut self) {
        self.root_registered.clear();
    }

    /// Iterates every live record.
    pub fn iter(&self) -> impl Iterator<Item = &FunctionRecord> {
        self.records.iter().filter_map(|r| r.as_ref())
    }

    /// Every registered name, unsorted.
    pub fn names(&self) -> impl Iterator<Item = &String> {
        self.by_name.keys()
    }

    /// Resets every record's last-exec vector to its defaults.
    pub fn clear_all_last_exec(&mut self) {
        for record in self.records.iter_mut().filter_map(|r| r.as_mut()) {
            record.last_exec = record.defaults.clone();
        }
    }

    /// Sorted summaries of every registered function, excluding the hidden
    /// system namespace unless `include_system` is set.
    pub fn all_function_descs(&self, include_system: bool) -> Vec<FunctionDesc> {
        let mut descs: Vec<FunctionDesc> = self
            .iter()
            .filter(|r| include_system || !r.fq_name.starts_with(crate::SYSTEM_TABLE))
            .map(|r| FunctionDesc {
                fq_name: r.fq_name.clone(),
                desc: r.desc.clone(),
                param_sig: r.signature.param_sig(),
                sig: r.signature.sig_with_name(r.unqualified_name()),
            })
            .collect();
        descs.sort_by(|a, b| a.fq_name.cmp(&b.fq_name));
        descs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bind::NativeFn;

    fn sample(name: &str) -> FunctionRecord {
        let bound = (|_: f32| -> ScriptResult<()> { Ok(()) }).bind();
        FunctionRecord::new(
            name.to_string(),
            "sample".to_string(),
            bound.signature,
            bound.callable,
            FunKind::Free,
        )
    }

    #[test]
    fn test_insert_lookup_remove() {
        let mut registry = FunctionRegistry::new();
        let key = registry.insert(sample("iso.set")).unwrap();
        assert_eq!(registry.key_of("iso.set"), Some(key));
        assert!(registry.contains("iso.set"));
        assert_eq!(registry.record(key).unwrap().fq_name, "iso.set");

        let removed = registry.remove("iso.set").unwrap();
        assert_eq!(removed.fq_name, "iso.set");
        assert!(!registry.contains("iso.set"));
        assert!(registry.record(key).is_err());
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let mut registry = FunctionRegistry::new();
        registry.insert(sample("iso.set")).unwrap();
        let err = registry.insert(sample("iso.set")).unwrap_err();
        assert!(matches!(err, ScriptError::DuplicateName { .. }));
    }

    #[test]
    fn test_defaults_seed_last_exec() {
        let record = sample("iso.set");
        assert_eq!(record.defaults, vec![Value::Number(0.0)]);
        assert_eq!(record.last_exec, record.defaults);
    }

    #[test]
    fn test_clear_all_last_exec() {
        let mut registry = FunctionRegistry::new();
        let key = registry.insert(sample("iso.set")).unwrap();
        registry.record_mut(key).unwrap().last_exec = vec![Value::Number(0.7)];
        registry.clear_all_last_exec();
        assert_eq!(
            registry.record(key).unwrap().last_exec,
            vec![Value::Number(0.0)]
        );
    }

    #[test]
    fn test_function_descs_hide_system_names() {
        let mut registry = FunctionRegistry::new();
        registry.insert(sample("b.fn")).unwrap();
        registry.insert(sample("a.fn")).unwrap();
        registry.insert(sample("_sys_.nop")).unwrap();

        let descs = registry.all_function_descs(false);
        let names: Vec<&str> = descs.iter().map(|d| d.fq_name.as_str()).collect();
        assert_eq!(names, vec!["a.fn", "b.fn"]);

        let all = registry.all_function_descs(true);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_hook_id_minting() {
        let mut record = sample("iso.set");
        assert_eq!(record.next_hook_id(), 0);
        assert_eq!(record.next_hook_id(), 1);
        assert_eq!(record.hook_index, 2);
    }
}
