//! The reflected builtin command surface.
//!
//! Registered once at engine construction: the provenance commands, the
//! introspection helpers (`help`, `info`, `log.*`), instance id
//! conversions, `deleteClass` and the hidden `_sys_.nop` marker that
//! anchors command groups.

use std::rc::Rc;

use argus_interp::Value;

use crate::classes::ClassInstance;
use crate::engine::ScriptEngine;
use crate::error::ScriptResult;
use crate::marshal::Transit;
use crate::registry::{FunFlags, FunKind, FunctionRecord};
use crate::bind::{NativeCallable, Signature};
use crate::SYSTEM_NOP;

/// Parameter description for a builtin signature.
struct BuiltinParam {
    type_name: String,
    check: fn(&Value) -> bool,
    default: Value,
}

fn param_of<T: Transit>() -> BuiltinParam {
    BuiltinParam {
        type_name: T::type_name(),
        check: <T as Transit>::compatible,
        default: T::default_value().into_value(),
    }
}

/// Exemption for read-only commands: logged nowhere, stacked nowhere.
const EXEMPT: FunFlags = FunFlags::STACK_EXEMPT.union(FunFlags::PROV_EXEMPT);

impl ScriptEngine {
    fn register_builtin(
        &mut self,
        name: &str,
        desc: &str,
        params: Vec<BuiltinParam>,
        ret: &str,
        flags: FunFlags,
        callable: NativeCallable,
    ) -> ScriptResult<()> {
        let signature = Signature {
            param_types: params.iter().map(|p| p.type_name.clone()).collect(),
            checks: params.iter().map(|p| p.check).collect(),
            defaults: params.iter().map(|p| p.default.clone()).collect(),
            ret_type: ret.to_string(),
            returns_value: ret != "void",
        };
        let mut record = FunctionRecord::new(
            name.to_string(),
            desc.to_string(),
            signature,
            callable,
            FunKind::Builtin,
        );
        record.flags = flags;
        self.install_record(record)?;
        Ok(())
    }

    /// Registers the whole builtin surface. Called once from `new`.
    pub(crate) fn register_builtins(&mut self) -> ScriptResult<()> {
        // The no-op marker anchoring command groups. Recorded like any
        // other call so a group undoes and redoes as one step.
        self.register_builtin(
            SYSTEM_NOP,
            "No-op system command.",
            Vec::new(),
            "void",
            FunFlags::empty(),
            Rc::new(|_engine| Ok(None)),
        )?;

        self.register_builtin(
            "deleteClass",
            "Destroys a class instance.",
            vec![param_of::<ClassInstance>()],
            "void",
            FunFlags::empty(),
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                let inst = ClassInstance::from_value(&args[0])?;
                engine.delete_class_instance(inst)?;
                Ok(None)
            }),
        )?;
        // Undoing a deletion never re-runs the target; the re-roll
        // rebuilds the instance and replays its history.
        self.set_null_undo("deleteClass")?;

        self.register_builtin(
            "getClassUNID",
            "Returns the unique id of a class instance.",
            vec![param_of::<ClassInstance>()],
            "i64",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                let inst = ClassInstance::from_value(&args[0])?;
                Ok(Some(Value::from_int(inst.id())))
            }),
        )?;

        self.register_builtin(
            "getClassWithUNID",
            "Returns the class instance carrying the given unique id.",
            vec![param_of::<i64>()],
            "instance",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                let id = i64::from_value(&args[0])?;
                Ok(Some(Value::Instance(id)))
            }),
        )?;

        self.register_provenance_builtins()?;
        self.register_log_builtins()?;
        Ok(())
    }

    fn register_provenance_builtins(&mut self) -> ScriptResult<()> {
        self.register_builtin(
            "provenance.undo",
            "Undoes one step.",
            Vec::new(),
            "void",
            FunFlags::STACK_EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.provenance_undo()?;
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.redo",
            "Redoes one step.",
            Vec::new(),
            "void",
            FunFlags::STACK_EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.provenance_redo()?;
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.enable",
            "Enables or disables provenance. Disabling clears all history.",
            vec![param_of::<bool>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                engine.enable_provenance(bool::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.clear",
            "Clears provenance history and collects interpreter garbage.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.clear_provenance();
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.enableProvLog",
            "Enables or disables the textual command log.",
            vec![param_of::<bool>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                engine.enable_provenance_log(bool::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.enableReentryException",
            "Controls whether provenance reentry raises an error.",
            vec![param_of::<bool>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                engine.enable_reentry_exception(bool::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.logUndoStack",
            "Logs the undo-available records.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.log_undo_stack();
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.logRedoStack",
            "Logs the redo-available records.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.log_redo_stack();
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.logProvRecord_toConsole",
            "Logs the full provenance record.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                engine.log_provenance_record();
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "provenance.logProvRecord_toFile",
            "Writes the full provenance record to a file.",
            vec![param_of::<String>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                let path = String::from_value(&args[0])?;
                engine.write_provenance_record(&path)?;
                Ok(None)
            }),
        )?;

        Ok(())
    }

    fn register_log_builtins(&mut self) -> ScriptResult<()> {
        self.register_builtin(
            "help",
            "Lists every registered function with its description.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                for desc in engine.all_function_descs(false) {
                    if desc.desc.is_empty() {
                        log::info!("{}", desc.sig);
                    } else {
                        log::info!("{} -- {}", desc.sig, desc.desc);
                    }
                }
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "info",
            "Describes one registered function.",
            vec![param_of::<String>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                let name = String::from_value(&args[0])?;
                let record = engine.registry.record_by_name(&name)?;
                log::info!("{}", record.signature.sig_with_name(&record.fq_name));
                if !record.desc.is_empty() {
                    log::info!("  {}", record.desc);
                }
                for index in 0..=record.num_params() {
                    if let Some(info) = record.param_info.get(&index) {
                        if index == 0 {
                            log::info!("  returns: {}", info.desc);
                        } else {
                            log::info!("  param {index} ({}): {}", info.name, info.desc);
                        }
                    }
                }
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "log.info",
            "Logs an informational message.",
            vec![param_of::<String>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                log::info!("{}", String::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "log.warn",
            "Logs a warning.",
            vec![param_of::<String>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                log::warn!("{}", String::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "log.error",
            "Logs an error.",
            vec![param_of::<String>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                log::error!("{}", String::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "log.printFunctions",
            "Logs every registered function signature.",
            Vec::new(),
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                engine.pop_call_args(0)?;
                let include_system = engine.verbose_mode();
                for desc in engine.all_function_descs(include_system) {
                    log::info!("{}", desc.sig);
                }
                Ok(None)
            }),
        )?;

        self.register_builtin(
            "luaVerboseMode",
            "Enables or disables verbose engine logging.",
            vec![param_of::<bool>()],
            "void",
            EXEMPT,
            Rc::new(|engine: &mut ScriptEngine| {
                let args = engine.pop_call_args(1)?;
                engine.set_verbose_mode(bool::from_value(&args[0])?);
                Ok(None)
            }),
        )?;

        Ok(())
    }
}
