//! Class instance registry.
//!
//! The engine owns every live instance: the native object (type-erased
//! behind `Rc<dyn Any>`), its method table handle, and the bookkeeping the
//! provenance engine needs (id minting, the temporary id range used during
//! redo, and the pointer-to-id lookup).

use std::any::Any;
use std::rc::Rc;

use argus_interp::TableId;
use hashbrown::HashMap;

/// Address of the allocation backing an instance object.
///
/// Stable for the lifetime of the `Rc`, which the registry keeps alive
/// until deletion.
pub fn object_addr(object: &Rc<dyn Any>) -> usize {
    Rc::as_ptr(object) as *const () as usize
}

/// One live class instance.
pub struct InstanceRecord {
    /// Globally unique instance id.
    pub id: i64,

    /// Fully qualified name of the factory that built this instance.
    pub factory_name: String,

    /// Method table in the interpreter's table arena.
    pub table: TableId,

    /// The native object. Concretely an `Rc<RefCell<T>>` erased to `Any`.
    pub object: Rc<dyn Any>,

    /// When set, deletion skips the class's delete callback. Set by
    /// `notifyOfDeletion` when the native side is tearing the object down
    /// itself.
    pub no_delete_hint: bool,
}

/// Temporary id range active while a redo replays instance creations.
#[derive(Debug, Clone, Copy)]
struct TempIdRange {
    current: i64,
    high: i64,
}

/// Registry of live instances plus the id mint.
#[derive(Default)]
pub struct InstanceRegistry {
    records: HashMap<i64, InstanceRecord>,
    by_ptr: HashMap<usize, i64>,
    next_id: i64,
    temp_range: Option<TempIdRange>,
}

impl InstanceRegistry {
    /// Creates an empty registry. Ids mint from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mints the next instance id.
    ///
    /// While a temporary range is active (seeded by redo), ids come from the
    /// range so recreated instances keep their original ids; the global
    /// counter is not advanced.
    pub fn mint_id(&mut self) -> i64 {
        if let Some(range) = &mut self.temp_range {
            let id = range.current;
            range.current += 1;
            if range.current > range.high {
                self.temp_range = None;
            }
            return id;
        }
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Seeds the temporary id range `[low, high]` for the next creations.
    pub fn set_temp_id_range(&mut self, low: i64, high: i64) {
        self.temp_range = Some(TempIdRange {
            current: low,
            high,
        });
    }

    /// The id the global counter will mint next.
    pub fn next_global_id(&self) -> i64 {
        self.next_id
    }

    /// Inserts a record and its pointer lookup entry.
    pub fn insert(&mut self, record: InstanceRecord) {
        self.by_ptr.insert(object_addr(&record.object), record.id);
        self.records.insert(record.id, record);
    }

    /// Borrows a record.
    pub fn get(&self, id: i64) -> Option<&InstanceRecord> {
        self.records.get(&id)
    }

    /// Borrows a record mutably.
    pub fn get_mut(&mut self, id: i64) -> Option<&mut InstanceRecord> {
        self.records.get_mut(&id)
    }

    /// Returns true if the instance is live.
    pub fn contains(&self, id: i64) -> bool {
        self.records.contains_key(&id)
    }

    /// Removes a record and its pointer lookup entry.
    pub fn remove(&mut self, id: i64) -> Option<InstanceRecord> {
        let record = self.records.remove(&id)?;
        self.by_ptr.remove(&object_addr(&record.object));
        Some(record)
    }

    /// Resolves a raw object address back to an instance id.
    pub fn id_for_addr(&self, addr: usize) -> Option<i64> {
        self.by_ptr.get(&addr).copied()
    }

    /// Sorted ids of every live instance.
    pub fn live_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.records.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Number of live instances.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no instances are live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
