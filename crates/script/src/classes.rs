//! Class constructor subsystem.
//!
//! A registered class publishes a factory at `<class>.new`. Invoking it
//! mints an instance id, runs the native constructor, builds the instance
//! method table at `_sys_.inst.m<id>`, and hands the class a registration
//! callback so it can attach its own member functions. Deletion tears all
//! of that down deterministically and records itself in provenance.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use argus_interp::Value;
use hashbrown::HashMap;

use crate::bind::{ConstructorFn, CtorCallable, NativeCallable, NativeFn};
use crate::engine::ScriptEngine;
use crate::error::{ScriptError, ScriptResult};
use crate::instances::{object_addr, InstanceRecord};
use crate::registry::{FunKind, FunctionRecord};
use crate::{CLASS_INSTANCE_PREFIX, CLASS_INSTANCE_TABLE};

/// Logical handle to a class instance.
///
/// Transported across the scripting boundary as its integer id; resolving
/// the handle back to the native object goes through the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassInstance {
    id: i64,
}

impl ClassInstance {
    /// Id carried by handles that refer to nothing (e.g. the result of a
    /// failed construction).
    pub const INVALID_ID: i64 = -1;

    /// Creates a handle from a raw instance id.
    pub fn from_id(id: i64) -> Self {
        Self { id }
    }

    /// The invalid handle.
    pub fn invalid() -> Self {
        Self {
            id: Self::INVALID_ID,
        }
    }

    /// The global instance id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// True unless this is the invalid handle.
    pub fn is_valid(&self) -> bool {
        self.id >= 0
    }

    /// Fully qualified name of the instance method table,
    /// e.g. `_sys_.inst.m4`.
    pub fn fq_name(&self) -> String {
        format!("{CLASS_INSTANCE_TABLE}.{CLASS_INSTANCE_PREFIX}{}", self.id)
    }
}

impl fmt::Display for ClassInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance {}", self.id)
    }
}

/// Callback a class provides to attach member functions onto a fresh
/// instance.
pub type RegisterMembersFn = Rc<dyn Fn(&mut ScriptEngine, ClassInstance) -> ScriptResult<()>>;

/// Optional per-class destruction callback, run on deletion unless the
/// instance carries the no-delete hint.
pub type DeleteCallback = Rc<dyn Fn(&Rc<dyn Any>)>;

/// One registered class.
pub struct ClassDefinition {
    /// Class table name, e.g. `ren`.
    pub class_name: String,

    /// Factory name, e.g. `ren.new`.
    pub factory_name: String,

    /// Bound native constructor.
    pub construct: CtorCallable,

    /// Attaches member functions after construction.
    pub register_members: RegisterMembersFn,

    /// Destruction callback; skipped when the no-delete hint is set.
    pub on_delete: Option<DeleteCallback>,
}

/// Registry of class definitions, keyed by factory name.
#[derive(Default)]
pub struct ClassRegistry {
    by_factory: HashMap<String, ClassDefinition>,
}

impl ClassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: ClassDefinition) -> ScriptResult<()> {
        if self.by_factory.contains_key(&def.factory_name) {
            return Err(ScriptError::duplicate_name(&def.factory_name));
        }
        self.by_factory.insert(def.factory_name.clone(), def);
        Ok(())
    }

    pub fn get(&self, factory_name: &str) -> Option<&ClassDefinition> {
        self.by_factory.get(factory_name)
    }

    pub fn get_mut(&mut self, factory_name: &str) -> Option<&mut ClassDefinition> {
        self.by_factory.get_mut(factory_name)
    }

    /// Drops every definition (and with them the registration callbacks).
    pub fn clear(&mut self) {
        self.by_factory.clear();
    }
}

impl ScriptEngine {
    /// Registers a class.
    ///
    /// Publishes a factory function at `<class_name>.new`. The factory is
    /// marked null-undo: undoing a construction must not re-run the
    /// constructor, it force-deletes the created instances instead.
    ///
    /// `register_members` runs once per constructed instance so the class
    /// can attach its member functions onto the instance table.
    pub fn register_class<Args, T, F, M>(
        &mut self,
        factory: F,
        class_name: &str,
        desc: &str,
        register_members: M,
    ) -> ScriptResult<()>
    where
        F: ConstructorFn<Args, T>,
        M: Fn(&mut ScriptEngine, ClassInstance) -> ScriptResult<()> + 'static,
    {
        let bound = factory.bind_constructor();
        let factory_name = format!("{class_name}.new");

        // The published `.new` entry goes through the ordinary registry so
        // constructions are dispatched, recorded and hooked like any other
        // call.
        let target = factory_name.clone();
        let callable: NativeCallable =
            Rc::new(move |engine: &mut ScriptEngine| engine.construct_class_instance(&target));
        let record = FunctionRecord::new(
            factory_name.clone(),
            desc.to_string(),
            bound.signature,
            callable,
            FunKind::Constructor,
        );
        self.install_record(record)?;
        self.set_null_undo(&factory_name)?;

        self.classes.insert(ClassDefinition {
            class_name: class_name.to_string(),
            factory_name,
            construct: bound.construct,
            register_members: Rc::new(register_members),
            on_delete: None,
        })?;
        Ok(())
    }

    /// Installs a destruction callback for a class, run when instances are
    /// deleted without the no-delete hint.
    pub fn set_class_delete_callback<F>(&mut self, class_name: &str, callback: F) -> ScriptResult<()>
    where
        F: Fn(&Rc<dyn Any>) + 'static,
    {
        let factory_name = format!("{class_name}.new");
        let def = self
            .classes
            .get_mut(&factory_name)
            .ok_or_else(|| ScriptError::no_such_function(&factory_name))?;
        def.on_delete = Some(Rc::new(callback));
        Ok(())
    }

    /// The factory body behind every `<class>.new` entry.
    ///
    /// Pops the constructor arguments, mints an id, builds the native
    /// object and the instance table, and runs the class's member
    /// registration callback. Construction failure yields the invalid
    /// handle rather than an error.
    pub(crate) fn construct_class_instance(
        &mut self,
        factory_name: &str,
    ) -> ScriptResult<Option<Value>> {
        let (construct, register_members) = {
            let def = self
                .classes
                .get(factory_name)
                .ok_or_else(|| ScriptError::no_such_function(factory_name))?;
            (def.construct.clone(), def.register_members.clone())
        };

        let id = self.instances.mint_id();
        let object = match (construct)(self) {
            Ok(object) => object,
            Err(err) => {
                log::warn!("construction via {factory_name} failed: {err}");
                return Ok(Some(Value::Instance(ClassInstance::INVALID_ID)));
            }
        };

        let inst = ClassInstance::from_id(id);
        let table = self.interp.tables.alloc();
        self.interp.tables.get_mut(table)?.set_instance_of(Some(id));
        self.interp
            .tables
            .set_path(&inst.fq_name(), Value::Table(table))?;

        self.instances.insert(InstanceRecord {
            id,
            factory_name: factory_name.to_string(),
            table,
            object,
            no_delete_hint: false,
        });

        self.prov_note_creation(id);
        if self.verbose {
            log::info!("class instance created: {id} via {factory_name}");
        }

        (register_members)(self, inst)?;
        Ok(Some(Value::Instance(id)))
    }

    /// Registers a member function onto an instance's method table.
    ///
    /// Usually called from a class's member registration callback. The
    /// function lands at `<instance table>.<method>` and participates in
    /// dispatch, hooks and provenance like any other registered function.
    pub fn register_instance_function<Args, F>(
        &mut self,
        inst: ClassInstance,
        f: F,
        method: &str,
        desc: &str,
        undo_redo: bool,
    ) -> ScriptResult<String>
    where
        F: NativeFn<Args>,
    {
        if !self.instances.contains(inst.id()) {
            return Err(ScriptError::no_such_instance(inst.to_string()));
        }
        let fq = format!("{}.{}", inst.fq_name(), method);
        self.register_bound(f.bind(), &fq, desc, undo_redo, FunKind::Member)?;
        Ok(fq)
    }

    /// Destroys a class instance.
    ///
    /// Reentrant: deleting an instance that is already gone is a silent
    /// no-op. Records the deletion in the current provenance step, runs the
    /// class delete callback (unless hinted), unregisters the instance's
    /// member functions and frees its table. Dropping the object reference
    /// destroys the native object when no collaborator holds it.
    pub fn delete_class_instance(&mut self, inst: ClassInstance) -> ScriptResult<()> {
        let record = match self.instances.remove(inst.id()) {
            None => return Ok(()),
            Some(record) => record,
        };

        self.prov_note_deletion(inst.id());

        // Unregister every member function registered on the method table.
        let method_names: Vec<String> = self
            .interp
            .tables
            .get(record.table)?
            .iter()
            .filter(|(_, v)| matches!(v, Value::Function(_)))
            .map(|(k, _)| k.clone())
            .collect();
        for method in method_names {
            let fq = format!("{}.{}", inst.fq_name(), method);
            if self.registry.contains(&fq) {
                self.unregister(&fq)?;
            }
        }

        // Sever inheritance links other instances hold into this table. The
        // arena recycles slots, so a stale link could silently rebind.
        let table = record.table;
        let linked: Vec<i64> = self
            .instances
            .live_ids()
            .into_iter()
            .filter(|other| {
                self.instances
                    .get(*other)
                    .and_then(|r| self.interp.tables.get(r.table).ok())
                    .and_then(|t| t.index_link())
                    == Some(table)
            })
            .collect();
        for other in linked {
            if let Some(r) = self.instances.get(other) {
                let t = r.table;
                self.interp.tables.get_mut(t)?.set_index_link(None);
            }
        }

        if !record.no_delete_hint {
            let on_delete = self
                .classes
                .get(&record.factory_name)
                .and_then(|def| def.on_delete.clone());
            if let Some(callback) = on_delete {
                (callback)(&record.object);
            }
        }

        self.interp.tables.remove_path(&inst.fq_name())?;
        self.interp.tables.free(record.table)?;
        if self.verbose {
            log::info!("class instance deleted: {}", inst.id());
        }
        Ok(())
    }

    /// Informs the engine that a native object is being destroyed outside
    /// of `deleteClass` (for example a window the user closed). Sets the
    /// no-delete hint and performs a regular, provenance-recorded deletion.
    pub fn notify_of_deletion(&mut self, inst: ClassInstance) -> ScriptResult<()> {
        match self.instances.get_mut(inst.id()) {
            None => return Ok(()),
            Some(record) => record.no_delete_hint = true,
        }
        self.cexec("deleteClass", (inst,))
    }

    /// Resolves a native object back to its instance handle.
    pub fn class_instance_for<T: Any>(
        &self,
        object: &Rc<RefCell<T>>,
    ) -> ScriptResult<ClassInstance> {
        let addr = Rc::as_ptr(object) as *const () as usize;
        self.instances
            .id_for_addr(addr)
            .map(ClassInstance::from_id)
            .ok_or_else(|| ScriptError::no_such_instance(format!("object at {addr:#x}")))
    }

    /// Borrows the type-erased object behind an instance handle.
    pub fn instance_object(&self, inst: ClassInstance) -> ScriptResult<Rc<dyn Any>> {
        self.instances
            .get(inst.id())
            .map(|record| record.object.clone())
            .ok_or_else(|| ScriptError::no_such_instance(inst.to_string()))
    }

    /// Borrows the typed object behind an instance handle.
    pub fn instance_downcast<T: Any>(&self, inst: ClassInstance) -> ScriptResult<Rc<RefCell<T>>> {
        self.instance_object(inst)?
            .downcast::<RefCell<T>>()
            .map_err(|_| {
                ScriptError::runtime(format!("instance {} has a different type", inst.id()))
            })
    }

    /// Whole-class inheritance: missed method lookups on `child` fall
    /// through to `parent`'s method table.
    pub fn inherit_class(
        &mut self,
        child: ClassInstance,
        parent: ClassInstance,
    ) -> ScriptResult<()> {
        let parent_table = self
            .instances
            .get(parent.id())
            .map(|r| r.table)
            .ok_or_else(|| ScriptError::no_such_instance(parent.to_string()))?;
        let child_table = self
            .instances
            .get(child.id())
            .map(|r| r.table)
            .ok_or_else(|| ScriptError::no_such_instance(child.to_string()))?;
        self.interp
            .tables
            .get_mut(child_table)?
            .set_index_link(Some(parent_table));
        Ok(())
    }

    /// Single-method inheritance: copies one named method from `parent`'s
    /// table onto `child`'s.
    pub fn inherit_method(
        &mut self,
        child: ClassInstance,
        parent: ClassInstance,
        method: &str,
    ) -> ScriptResult<()> {
        let parent_table = self
            .instances
            .get(parent.id())
            .map(|r| r.table)
            .ok_or_else(|| ScriptError::no_such_instance(parent.to_string()))?;
        let child_table = self
            .instances
            .get(child.id())
            .map(|r| r.table)
            .ok_or_else(|| ScriptError::no_such_instance(child.to_string()))?;
        let entry = self
            .interp
            .tables
            .lookup(parent_table, method)?
            .filter(|v| matches!(v, Value::Function(_)))
            .ok_or_else(|| {
                ScriptError::no_such_function(format!("{}.{}", parent.fq_name(), method))
            })?;
        self.interp.tables.get_mut(child_table)?.set(method, entry);
        Ok(())
    }

    /// Destroys every live instance. Used during shutdown and by tests.
    pub fn delete_all_class_instances(&mut self) -> ScriptResult<()> {
        let was_disabled = self.provenance.temporarily_disabled();
        self.provenance.set_temporarily_disabled(true);
        let result = (|| {
            for id in self.instances.live_ids() {
                self.delete_class_instance(ClassInstance::from_id(id))?;
            }
            Ok(())
        })();
        self.provenance.set_temporarily_disabled(was_disabled);
        result
    }

    /// Drops every class definition and registration callback.
    pub(crate) fn cleanup_class_constructors(&mut self) {
        self.classes.clear();
    }

    /// Notes an object address for tests that exercise the raw lookup path.
    pub fn instance_addr(&self, inst: ClassInstance) -> ScriptResult<usize> {
        self.instances
            .get(inst.id())
            .map(|record| object_addr(&record.object))
            .ok_or_else(|| ScriptError::no_such_instance(inst.to_string()))
    }
}
