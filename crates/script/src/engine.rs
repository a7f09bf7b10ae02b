//! The script engine: composition root and call dispatcher.
//!
//! `ScriptEngine` owns the interpreter state, the function registry, the
//! class and instance registries and the provenance engine. Dispatch is
//! single-threaded and synchronous; native callables receive the engine
//! itself and pull their arguments off the evaluation stack.

use std::cell::RefCell;
use std::rc::Rc;

use argus_interp::{FuncKey, Interp, Value};

use crate::bind::{BoundFunction, MethodFn, NativeFn, ParamPack};
use crate::classes::ClassRegistry;
use crate::error::{ScriptError, ScriptResult};
use crate::instances::InstanceRegistry;
use crate::marshal::Transit;
use crate::provenance::Provenance;
use crate::registry::{
    FunFlags, FunKind, FunctionDesc, FunctionRecord, FunctionRegistry, Hook, MemberHook, ParamInfo,
};
use crate::stack_guard::StackGuard;

/// The process-wide scripting engine.
pub struct ScriptEngine {
    pub(crate) interp: Interp,
    pub(crate) registry: FunctionRegistry,
    pub(crate) classes: ClassRegistry,
    pub(crate) instances: InstanceRegistry,
    pub(crate) provenance: Provenance,

    /// Runtime parameter type checks on dispatch.
    type_checks: bool,

    /// Suppresses stack-imbalance warnings around intentional failures.
    expected_exception: bool,

    pub(crate) verbose: bool,

    /// Mints subscriber ids for member hooks.
    member_hook_index: u64,

    cleaned: bool,
}

impl ScriptEngine {
    /// Creates an engine with the builtin command surface registered.
    pub fn new() -> ScriptResult<Self> {
        let mut engine = Self {
            interp: Interp::new(),
            registry: FunctionRegistry::new(),
            classes: ClassRegistry::new(),
            instances: InstanceRegistry::new(),
            provenance: Provenance::new(),
            type_checks: true,
            expected_exception: false,
            verbose: false,
            member_hook_index: 0,
            cleaned: false,
        };
        engine.register_builtins()?;
        Ok(engine)
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Registers a native function or closure under a fully qualified name.
    ///
    /// Missing intermediate namespace tables are created. When `undo_redo`
    /// is false the function is logged but kept off the undo/redo stack.
    /// Returns the registered name.
    pub fn register_function<Args, F>(
        &mut self,
        f: F,
        name: &str,
        desc: &str,
        undo_redo: bool,
    ) -> ScriptResult<String>
    where
        F: NativeFn<Args>,
    {
        self.register_bound(f.bind(), name, desc, undo_redo, FunKind::Free)?;
        Ok(name.to_string())
    }

    /// Registers a composite function that re-enters the engine. Calls the
    /// body dispatches record as children of this function's provenance
    /// entry; undoing the entry replays the body with its prior parameters
    /// and then walks the children.
    pub fn register_engine_function<Args, F>(
        &mut self,
        f: F,
        name: &str,
        desc: &str,
        undo_redo: bool,
    ) -> ScriptResult<String>
    where
        F: crate::bind::EngineFn<Args>,
    {
        self.register_bound(f.bind_engine(), name, desc, undo_redo, FunKind::Free)?;
        Ok(name.to_string())
    }

    /// Registers a member function: `method` is invoked with a mutable
    /// borrow of `receiver` on every call.
    pub fn register_member_function<T, Args, F>(
        &mut self,
        receiver: &Rc<RefCell<T>>,
        method: F,
        name: &str,
        desc: &str,
        undo_redo: bool,
    ) -> ScriptResult<String>
    where
        F: MethodFn<T, Args>,
    {
        let bound = method.bind_method(receiver.clone());
        self.register_bound(bound, name, desc, undo_redo, FunKind::Member)?;
        Ok(name.to_string())
    }

    pub(crate) fn register_bound(
        &mut self,
        bound: BoundFunction,
        name: &str,
        desc: &str,
        undo_redo: bool,
        kind: FunKind,
    ) -> ScriptResult<FuncKey> {
        let mut record = FunctionRecord::new(
            name.to_string(),
            desc.to_string(),
            bound.signature,
            bound.callable,
            kind,
        );
        if !undo_redo {
            record.flags |= FunFlags::STACK_EXEMPT;
        }
        self.install_record(record)
    }

    /// Places a record into the registry and the interpreter table tree.
    pub(crate) fn install_record(&mut self, record: FunctionRecord) -> ScriptResult<FuncKey> {
        let name = record.fq_name.clone();
        validate_fq_name(&name)?;

        // No segment of the name may shadow a registered function, and the
        // leaf must be free.
        let segments: Vec<&str> = name.split('.').collect();
        let mut prefix = String::new();
        for (i, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('.');
            }
            prefix.push_str(segment);
            match self.interp.tables.resolve_path(&prefix)? {
                Some(Value::Function(_)) => {
                    return Err(ScriptError::duplicate_name(&name));
                }
                Some(Value::Table(_)) => {
                    if i == segments.len() - 1 {
                        return Err(ScriptError::duplicate_name(format!(
                            "{name} (existing namespace)"
                        )));
                    }
                }
                Some(_) => {
                    return Err(ScriptError::duplicate_name(format!(
                        "{prefix} (existing value)"
                    )));
                }
                None => {}
            }
        }

        let key = self.registry.insert(record)?;
        self.interp.tables.set_path(&name, Value::Function(key))?;
        self.registry.note_root_registered(segments[0]);
        Ok(key)
    }

    /// Removes a registered function and its interpreter-side binding.
    pub fn unregister(&mut self, name: &str) -> ScriptResult<()> {
        if !self.registry.contains(name) {
            return Err(ScriptError::no_such_function(name));
        }
        self.registry.remove(name)?;
        self.interp.tables.remove_path(name)?;
        Ok(())
    }

    /// Removes every registered function and prunes the root tables
    /// registration created.
    pub fn unregister_all_functions(&mut self) -> ScriptResult<()> {
        let names: Vec<String> = self.registry.names().cloned().collect();
        for name in &names {
            let _ = self.registry.remove(name);
            let _ = self.interp.tables.remove_path(name);
        }

        let roots: Vec<String> = self.registry.root_registered().to_vec();
        let root_table = self.interp.tables.root();
        for root in roots {
            let entry = self.interp.tables.get(root_table)?.get(&root).cloned();
            if let Some(Value::Table(id)) = entry {
                let empty = self.interp.tables.get(id).map(|t| t.is_empty()).unwrap_or(true);
                if empty {
                    self.interp.tables.get_mut(root_table)?.remove(&root);
                    let _ = self.interp.tables.free(id);
                }
            }
        }
        self.registry.clear_root_registered();
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Dispatch
    // ---------------------------------------------------------------------

    /// Pops `n` call arguments off the evaluation stack, in call order.
    pub(crate) fn pop_call_args(&mut self, n: usize) -> ScriptResult<Vec<Value>> {
        Ok(self.interp.stack.pop_n(n)?)
    }

    pub(crate) fn dispatch_name(
        &mut self,
        name: &str,
        args: Vec<Value>,
    ) -> ScriptResult<Option<Value>> {
        let key = self
            .registry
            .key_of(name)
            .ok_or_else(|| ScriptError::no_such_function(name))?;
        self.dispatch_key(key, args)
    }

    /// The dispatch pipeline: type checks, marshalling, the native call,
    /// provenance recording, last-exec update, hooks, return extraction.
    pub(crate) fn dispatch_key(
        &mut self,
        key: FuncKey,
        args: Vec<Value>,
    ) -> ScriptResult<Option<Value>> {
        let (fq_name, flags, callable, num_params, returns_value, checks, param_types, prev_exec) = {
            let record = self.registry.record(key)?;
            (
                record.fq_name.clone(),
                record.flags,
                record.callable.clone(),
                record.num_params(),
                record.signature.returns_value,
                record.signature.checks.clone(),
                record.signature.param_types.clone(),
                record.last_exec.clone(),
            )
        };

        if self.type_checks {
            if args.len() != num_params {
                return Err(ScriptError::UnequalNumParams {
                    name: fq_name,
                    expected: num_params,
                    got: args.len(),
                });
            }
            for (i, (check, value)) in checks.iter().zip(args.iter()).enumerate() {
                if !check(value) {
                    return Err(ScriptError::InvalidType {
                        name: fq_name,
                        param: i + 1,
                        expected: param_types[i].clone(),
                        got: value.type_name().to_string(),
                    });
                }
            }
        }

        let guard = StackGuard::new(&self.interp.stack, 0, 0);
        for value in &args {
            self.interp.stack.push(value.clone());
        }

        // Calls issued by the native body nest one command level deeper and
        // record as children of this call.
        self.provenance.begin_command();
        let call_result = (callable)(self);
        self.provenance.end_command();

        let ret = match call_result {
            Ok(ret) => ret,
            Err(err) => {
                self.prov_log_failure(&err.to_string());
                // A failed call leaves no record for nested bookkeeping.
                self.provenance.discard_pending();
                guard.settle(&mut self.interp.stack, self.expected_exception);
                return Err(err);
            }
        };

        // The return value occupies the stack from here until extraction.
        if returns_value {
            if let Some(value) = &ret {
                self.interp.stack.push(value.clone());
            }
        }

        if !flags.contains(FunFlags::PROV_EXEMPT) {
            if let Err(err) = self.prov_log_execution(
                &fq_name,
                flags.contains(FunFlags::STACK_EXEMPT),
                &args,
                &prev_exec,
            ) {
                guard.settle(&mut self.interp.stack, self.expected_exception);
                return Err(err);
            }
        } else {
            self.provenance.discard_pending();
        }

        self.registry.record_mut(key)?.last_exec = args.clone();

        if let Err(err) = self.run_hooks(key, &args) {
            guard.settle(&mut self.interp.stack, self.expected_exception);
            return Err(err);
        }

        let out = if returns_value {
            match ret {
                Some(value) => {
                    self.interp.stack.pop()?;
                    Some(value)
                }
                None => None,
            }
        } else {
            None
        };

        guard.settle(&mut self.interp.stack, self.expected_exception);
        Ok(out)
    }

    /// Fires the static hooks, then the member hooks, in registration
    /// order, each with the call's arguments. A hook failure propagates
    /// but leaves the provenance entry in place.
    fn run_hooks(&mut self, key: FuncKey, args: &[Value]) -> ScriptResult<()> {
        let (static_hooks, member_hooks) = {
            let record = self.registry.record(key)?;
            let statics: Vec<_> = record.hooks.iter().map(|h| h.callable.clone()).collect();
            let members: Vec<_> = record
                .member_hooks
                .iter()
                .map(|h| h.callable.clone())
                .collect();
            (statics, members)
        };
        let static_count = static_hooks.len();
        let member_count = member_hooks.len();

        for hook in static_hooks.into_iter().chain(member_hooks) {
            let guard = StackGuard::new(&self.interp.stack, 0, 0);
            for value in args {
                self.interp.stack.push(value.clone());
            }
            let result = (hook)(self);
            guard.settle(
                &mut self.interp.stack,
                result.is_err() || self.expected_exception,
            );
            if let Err(err) = result {
                self.prov_log_failure(&format!("hook failed: {err}"));
                return Err(err);
            }
        }

        self.prov_log_hooks(static_count, member_count);
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Typed entry points
    // ---------------------------------------------------------------------

    /// Calls a registered function with typed arguments.
    pub fn cexec<P: ParamPack>(&mut self, name: &str, params: P) -> ScriptResult<()> {
        self.dispatch_name(name, params.into_values()).map(|_| ())
    }

    /// Calls a registered function and marshals its single return value.
    pub fn cexec_ret<T: Transit, P: ParamPack>(
        &mut self,
        name: &str,
        params: P,
    ) -> ScriptResult<T> {
        let ret = self.dispatch_name(name, params.into_values())?;
        T::from_value(&ret.unwrap_or(Value::Nil))
    }

    /// Overwrites a function's defaults and last-exec vectors, optionally
    /// invoking it with the new defaults under a provenance disable.
    pub fn set_defaults<P: ParamPack>(
        &mut self,
        name: &str,
        params: P,
        should_call: bool,
    ) -> ScriptResult<()> {
        let args = params.into_values();
        let key = self
            .registry
            .key_of(name)
            .ok_or_else(|| ScriptError::no_such_function(name))?;

        {
            let record = self.registry.record_mut(key)?;
            if args.len() != record.num_params() {
                return Err(ScriptError::UnequalNumParams {
                    name: name.to_string(),
                    expected: record.num_params(),
                    got: args.len(),
                });
            }
            for (i, (check, value)) in record
                .signature
                .checks
                .iter()
                .zip(args.iter())
                .enumerate()
            {
                if !check(value) {
                    return Err(ScriptError::InvalidType {
                        name: name.to_string(),
                        param: i + 1,
                        expected: record.signature.param_types[i].clone(),
                        got: value.type_name().to_string(),
                    });
                }
            }
            record.defaults = args.clone();
            record.last_exec = args.clone();
        }

        if should_call {
            let was_disabled = self.provenance.temporarily_disabled();
            self.provenance.set_temporarily_disabled(true);
            let result = self.dispatch_key(key, args);
            self.provenance.set_temporarily_disabled(was_disabled);
            result?;
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Hooks and undo/redo configuration
    // ---------------------------------------------------------------------

    /// Appends a post-call hook. The hook's parameter signature must match
    /// the target exactly and it must return nothing. Returns the hook id.
    pub fn strict_hook<Args, F>(&mut self, f: F, name: &str) -> ScriptResult<u64>
    where
        F: NativeFn<Args>,
    {
        let bound = f.bind();
        let record = self.registry.record_by_name_mut(name)?;
        if bound.signature.param_sig() != record.signature.param_sig()
            || bound.signature.returns_value
        {
            return Err(ScriptError::InvalidFunSignature {
                name: name.to_string(),
                expected: record.signature.param_sig(),
                got: bound.signature.param_sig(),
            });
        }
        let id = record.next_hook_id();
        record.hooks.push(Hook {
            id,
            callable: bound.callable,
        });
        Ok(id)
    }

    /// Appends a member hook under a subscriber id, so the subscriber can
    /// remove every hook it installed in one call.
    pub fn strict_member_hook<Args, F>(
        &mut self,
        f: F,
        name: &str,
        subscriber: &str,
    ) -> ScriptResult<()>
    where
        F: NativeFn<Args>,
    {
        let bound = f.bind();
        let record = self.registry.record_by_name_mut(name)?;
        if bound.signature.param_sig() != record.signature.param_sig()
            || bound.signature.returns_value
        {
            return Err(ScriptError::InvalidFunSignature {
                name: name.to_string(),
                expected: record.signature.param_sig(),
                got: bound.signature.param_sig(),
            });
        }
        record.member_hooks.push(MemberHook {
            subscriber: subscriber.to_string(),
            callable: bound.callable,
        });
        Ok(())
    }

    /// Mints a unique member-hook subscriber id.
    pub fn new_member_hook_id(&mut self) -> String {
        let id = self.member_hook_index;
        self.member_hook_index += 1;
        format!("memberHook{id}")
    }

    /// Removes every member hook installed under `subscriber`.
    pub fn remove_member_hooks(&mut self, subscriber: &str) {
        for name in self.registry.names().cloned().collect::<Vec<_>>() {
            if let Ok(record) = self.registry.record_by_name_mut(&name) {
                record.member_hooks.retain(|h| h.subscriber != subscriber);
            }
        }
    }

    /// Installs a custom undo function. May be set at most once.
    pub fn set_undo_fn<Args, F>(&mut self, f: F, name: &str) -> ScriptResult<()>
    where
        F: NativeFn<Args>,
    {
        let bound = f.bind();
        let record = self.registry.record_by_name_mut(name)?;
        if bound.signature.param_sig() != record.signature.param_sig() {
            return Err(ScriptError::InvalidFunSignature {
                name: name.to_string(),
                expected: record.signature.param_sig(),
                got: bound.signature.param_sig(),
            });
        }
        if record.undo_fn.is_some() {
            return Err(ScriptError::UndoFuncAlreadySet {
                name: name.to_string(),
            });
        }
        record.undo_fn = Some(bound.callable);
        Ok(())
    }

    /// Installs a custom redo function. May be set at most once.
    pub fn set_redo_fn<Args, F>(&mut self, f: F, name: &str) -> ScriptResult<()>
    where
        F: NativeFn<Args>,
    {
        let bound = f.bind();
        let record = self.registry.record_by_name_mut(name)?;
        if bound.signature.param_sig() != record.signature.param_sig() {
            return Err(ScriptError::InvalidFunSignature {
                name: name.to_string(),
                expected: record.signature.param_sig(),
                got: bound.signature.param_sig(),
            });
        }
        if record.redo_fn.is_some() {
            return Err(ScriptError::RedoFuncAlreadySet {
                name: name.to_string(),
            });
        }
        record.redo_fn = Some(bound.callable);
        Ok(())
    }

    /// Marks the function's undo as a no-op (children are still walked).
    pub fn set_null_undo(&mut self, name: &str) -> ScriptResult<()> {
        self.registry.record_by_name_mut(name)?.flags |= FunFlags::NULL_UNDO;
        Ok(())
    }

    /// Marks the function's redo as a no-op (children are still walked).
    pub fn set_null_redo(&mut self, name: &str) -> ScriptResult<()> {
        self.registry.record_by_name_mut(name)?.flags |= FunFlags::NULL_REDO;
        Ok(())
    }

    /// Keeps the function's calls off the undo/redo stack.
    pub fn set_undo_redo_stack_exempt(&mut self, name: &str) -> ScriptResult<()> {
        self.registry.record_by_name_mut(name)?.flags |= FunFlags::STACK_EXEMPT;
        Ok(())
    }

    /// Skips provenance entirely for the function.
    pub fn set_provenance_exempt(&mut self, name: &str) -> ScriptResult<()> {
        self.registry.record_by_name_mut(name)?.flags |= FunFlags::PROV_EXEMPT;
        Ok(())
    }

    /// Attaches documentation to a parameter (1-based index).
    pub fn add_param_info(
        &mut self,
        name: &str,
        param: usize,
        param_name: &str,
        param_desc: &str,
    ) -> ScriptResult<()> {
        let record = self.registry.record_by_name_mut(name)?;
        if param == 0 || param > record.num_params() {
            return Err(ScriptError::runtime(format!(
                "parameter index {param} out of range for {name}"
            )));
        }
        record.param_info.insert(
            param,
            ParamInfo {
                name: param_name.to_string(),
                desc: param_desc.to_string(),
            },
        );
        Ok(())
    }

    /// Attaches documentation to the return value (index 0).
    pub fn add_return_info(&mut self, name: &str, desc: &str) -> ScriptResult<()> {
        let record = self.registry.record_by_name_mut(name)?;
        record.param_info.insert(
            0,
            ParamInfo {
                name: String::new(),
                desc: desc.to_string(),
            },
        );
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Introspection
    // ---------------------------------------------------------------------

    /// All registered names completing `prefix`, sorted.
    pub fn complete_command(&self, prefix: &str) -> ScriptResult<Vec<String>> {
        let (parent_path, partial) = match prefix.rfind('.') {
            Some(i) => (&prefix[..i], &prefix[i + 1..]),
            None => ("", prefix),
        };

        let parent = if parent_path.is_empty() {
            Some(self.interp.tables.root())
        } else {
            match self.interp.tables.resolve_path(parent_path)? {
                Some(Value::Table(id)) => Some(id),
                _ => None,
            }
        };

        let mut out = Vec::new();
        if let Some(parent) = parent {
            for (key, _) in self.interp.tables.get(parent)?.iter() {
                if key.starts_with(partial) {
                    if parent_path.is_empty() {
                        out.push(key.clone());
                    } else {
                        out.push(format!("{parent_path}.{key}"));
                    }
                }
            }
        }

        // An exact namespace match lists its contents too.
        if !prefix.is_empty() {
            if let Some(Value::Table(id)) = self.interp.tables.resolve_path(prefix)? {
                for (key, _) in self.interp.tables.get(id)?.iter() {
                    out.push(format!("{prefix}.{key}"));
                }
            }
        }

        out.sort();
        out.dedup();
        Ok(out)
    }

    /// The namespace portion of a partial command (`a.b.c` yields `a.b`).
    pub fn get_cmd_path(&self, partial: &str) -> String {
        match partial.rfind('.') {
            Some(i) => partial[..i].to_string(),
            None => String::new(),
        }
    }

    /// Sorted summaries of registered functions.
    pub fn all_function_descs(&self, include_system: bool) -> Vec<FunctionDesc> {
        self.registry.all_function_descs(include_system)
    }

    /// True if the name is a registered function.
    pub fn function_exists(&self, name: &str) -> bool {
        self.registry.contains(name)
    }

    /// The function's last-exec parameter vector.
    pub fn last_exec_of(&self, name: &str) -> ScriptResult<Vec<Value>> {
        Ok(self.registry.record_by_name(name)?.last_exec.clone())
    }

    /// The function's defaults vector.
    pub fn defaults_of(&self, name: &str) -> ScriptResult<Vec<Value>> {
        Ok(self.registry.record_by_name(name)?.defaults.clone())
    }

    /// Current evaluation stack height.
    pub fn stack_height(&self) -> usize {
        self.interp.stack.len()
    }

    /// Number of records on the undo/redo stack.
    pub fn undo_stack_len(&self) -> usize {
        self.provenance.stack_len()
    }

    /// 1-based undo stack pointer.
    pub fn undo_stack_pointer(&self) -> usize {
        self.provenance.stack_pointer()
    }

    /// The textual provenance record.
    pub fn provenance_log(&self) -> &[String] {
        self.provenance.desc_log()
    }

    /// Current command-group nesting depth.
    pub fn command_depth(&self) -> usize {
        self.provenance.command_depth()
    }

    /// Sorted ids of every live class instance.
    pub fn live_instance_ids(&self) -> Vec<i64> {
        self.instances.live_ids()
    }

    /// The id the instance mint will hand out next.
    pub fn next_global_instance_id(&self) -> i64 {
        self.instances.next_global_id()
    }

    // ---------------------------------------------------------------------
    // Engine switches
    // ---------------------------------------------------------------------

    pub fn provenance_enabled(&self) -> bool {
        self.provenance.is_enabled()
    }

    /// Enables or disables provenance; disabling clears history.
    pub fn enable_provenance(&mut self, enabled: bool) {
        self.provenance.set_enabled(enabled);
    }

    /// Clears provenance history and garbage-collects the table arena.
    pub fn clear_provenance(&mut self) {
        self.provenance.clear();
        let collected = self.interp.collect_garbage();
        if collected > 0 {
            log::debug!("provenance clear collected {collected} tables");
        }
    }

    /// Enables or disables the textual command log.
    pub fn enable_provenance_log(&mut self, enabled: bool) {
        self.provenance.set_desc_log_enabled(enabled);
    }

    /// Controls whether provenance reentry raises an error.
    pub fn enable_reentry_exception(&mut self, enabled: bool) {
        self.provenance.set_reentry_throws(enabled);
    }

    /// Block-scoped provenance suppression.
    pub fn set_temp_prov_disable(&mut self, disabled: bool) {
        self.provenance.set_temporarily_disabled(disabled);
    }

    /// Suppresses stack-imbalance warnings around intentional failures.
    pub fn set_expected_exception_flag(&mut self, expected: bool) {
        self.expected_exception = expected;
    }

    /// Enables or disables runtime parameter type checks.
    pub fn set_runtime_type_checks(&mut self, enabled: bool) {
        self.type_checks = enabled;
    }

    pub fn verbose_mode(&self) -> bool {
        self.verbose
    }

    pub fn set_verbose_mode(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    // ---------------------------------------------------------------------
    // Shutdown
    // ---------------------------------------------------------------------

    /// Tears everything down: live instances first (their destructors may
    /// reach back into registered functions), then class constructors,
    /// last-exec state, registrations, and finally the table arena.
    pub fn remove_all_registrations(&mut self) -> ScriptResult<()> {
        self.delete_all_class_instances()?;
        self.cleanup_class_constructors();
        self.registry.clear_all_last_exec();
        self.unregister_all_functions()?;
        self.interp.collect_garbage();
        Ok(())
    }

    /// Idempotent shutdown; also run on drop.
    pub fn clean(&mut self) {
        if self.cleaned {
            return;
        }
        if let Err(err) = self.remove_all_registrations() {
            log::error!("engine shutdown failed: {err}");
        }
        self.cleaned = true;
    }
}

impl Drop for ScriptEngine {
    fn drop(&mut self) {
        self.clean();
    }
}

fn validate_fq_name(name: &str) -> ScriptResult<()> {
    if name.is_empty() {
        return Err(ScriptError::fun_bind("empty function name"));
    }
    for segment in name.split('.') {
        let mut chars = segment.chars();
        let valid = match chars.next() {
            None => false,
            Some(first) => {
                (first.is_alphabetic() || first == '_')
                    && chars.all(|c| c.is_alphanumeric() || c == '_')
            }
        };
        if !valid {
            return Err(ScriptError::fun_bind(format!(
                "malformed function name: {name}"
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_names() {
        assert!(validate_fq_name("iso.set").is_ok());
        assert!(validate_fq_name("_sys_.nop").is_ok());
        assert!(validate_fq_name("a.b.c3").is_ok());
        assert!(validate_fq_name("").is_err());
        assert!(validate_fq_name("a..b").is_err());
        assert!(validate_fq_name("3a").is_err());
        assert!(validate_fq_name("a b").is_err());
    }
}
