//! Table arena for the interpreter.
//!
//! All tables live in a slot arena owned by [`Tables`]; the rest of the
//! system refers to them through [`TableId`] handles. A table maps string
//! keys to values, may delegate missed lookups to another table through its
//! index link (whole-class inheritance), and may be tagged as the method
//! table of a class instance.

use std::collections::BTreeMap;

use crate::error::{InterpError, InterpResult};
use crate::value::{TableId, Value};

/// Upper bound on index-link chains. Guards against accidental cycles
/// introduced through inheritance.
const MAX_META_CHAIN: usize = 128;

/// A single table.
#[derive(Debug, Clone, Default)]
pub struct Table {
    /// Sorted key/value entries. Sorted iteration keeps help listings and
    /// logs deterministic.
    entries: BTreeMap<String, Value>,

    /// Table consulted on missed lookups.
    index_link: Option<TableId>,

    /// Set when this table is the method table of a class instance.
    instance_of: Option<i64>,
}

impl Table {
    /// Returns the value stored under `key`, without consulting the index
    /// link.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set<S: Into<String>>(&mut self, key: S, value: Value) -> Option<Value> {
        self.entries.insert(key.into(), value)
    }

    /// Removes `key`, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.entries.remove(key)
    }

    /// Iterates entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }

    /// Returns the number of direct entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the table has no direct entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the index link, if set.
    pub fn index_link(&self) -> Option<TableId> {
        self.index_link
    }

    /// Sets or clears the index link.
    pub fn set_index_link(&mut self, link: Option<TableId>) {
        self.index_link = link;
    }

    /// Returns the owning instance id, if this is an instance method table.
    pub fn instance_of(&self) -> Option<i64> {
        self.instance_of
    }

    /// Tags this table as the method table of an instance.
    pub fn set_instance_of(&mut self, id: Option<i64>) {
        self.instance_of = id;
    }
}

/// The table arena.
///
/// Slot 0 is always the root table; freed slots are recycled.
#[derive(Debug)]
pub struct Tables {
    slots: Vec<Option<Table>>,
    free: Vec<u32>,
    root: TableId,
}

impl Tables {
    /// Creates an arena containing only the root table.
    pub fn new() -> Self {
        Self {
            slots: vec![Some(Table::default())],
            free: Vec::new(),
            root: TableId(0),
        }
    }

    /// Returns the root table handle.
    pub fn root(&self) -> TableId {
        self.root
    }

    /// Allocates a fresh empty table.
    pub fn alloc(&mut self) -> TableId {
        if let Some(slot) = self.free.pop() {
            self.slots[slot as usize] = Some(Table::default());
            TableId(slot)
        } else {
            self.slots.push(Some(Table::default()));
            TableId((self.slots.len() - 1) as u32)
        }
    }

    /// Frees a table. The root table cannot be freed.
    pub fn free(&mut self, id: TableId) -> InterpResult<()> {
        if id == self.root {
            return Err(InterpError::runtime("cannot free the root table"));
        }
        let slot = self
            .slots
            .get_mut(id.0 as usize)
            .ok_or(InterpError::InvalidTable { id: id.0 })?;
        if slot.take().is_none() {
            return Err(InterpError::InvalidTable { id: id.0 });
        }
        self.free.push(id.0);
        Ok(())
    }

    /// Borrows a table.
    pub fn get(&self, id: TableId) -> InterpResult<&Table> {
        self.slots
            .get(id.0 as usize)
            .and_then(|s| s.as_ref())
            .ok_or(InterpError::InvalidTable { id: id.0 })
    }

    /// Borrows a table mutably.
    pub fn get_mut(&mut self, id: TableId) -> InterpResult<&mut Table> {
        self.slots
            .get_mut(id.0 as usize)
            .and_then(|s| s.as_mut())
            .ok_or(InterpError::InvalidTable { id: id.0 })
    }

    /// Looks up `key` in `table`, following the index-link chain on misses.
    pub fn lookup(&self, table: TableId, key: &str) -> InterpResult<Option<Value>> {
        let mut current = table;
        for _ in 0..MAX_META_CHAIN {
            let t = self.get(current)?;
            if let Some(v) = t.get(key) {
                return Ok(Some(v.clone()));
            }
            match t.index_link() {
                Some(next) => current = next,
                None => return Ok(None),
            }
        }
        Err(InterpError::MetaChainTooDeep {
            key: key.to_string(),
        })
    }

    /// Resolves a dotted path from the root table.
    ///
    /// Returns `None` when any segment is missing. Errors only when an
    /// intermediate segment resolves to a non-table value.
    pub fn resolve_path(&self, path: &str) -> InterpResult<Option<Value>> {
        let mut current = self.root;
        let segments: Vec<&str> = path.split('.').collect();
        for (i, segment) in segments.iter().enumerate() {
            let table = self.get(current)?;
            match table.get(segment) {
                None => return Ok(None),
                Some(value) => {
                    if i == segments.len() - 1 {
                        return Ok(Some(value.clone()));
                    }
                    match value {
                        Value::Table(id) => current = *id,
                        _ => {
                            return Err(InterpError::not_a_table(
                                segments[..=i].join("."),
                            ))
                        }
                    }
                }
            }
        }
        Ok(None)
    }

    /// Resolves the table holding the final segment of `path`, creating
    /// missing intermediate namespace tables.
    ///
    /// Returns the parent table handle and the final segment.
    pub fn ensure_parent<'p>(&mut self, path: &'p str) -> InterpResult<(TableId, &'p str)> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| InterpError::no_such_path(path))?;
        let mut current = self.root;
        for (i, segment) in parents.iter().enumerate() {
            let existing = self.get(current)?.get(segment).cloned();
            match existing {
                Some(Value::Table(id)) => current = id,
                Some(_) => return Err(InterpError::not_a_table(segments[..=i].join("."))),
                None => {
                    let id = self.alloc();
                    self.get_mut(current)?
                        .set(segment.to_string(), Value::Table(id));
                    current = id;
                }
            }
        }
        Ok((current, last))
    }

    /// Stores `value` at a dotted path, creating intermediate tables.
    pub fn set_path(&mut self, path: &str, value: Value) -> InterpResult<()> {
        let (parent, key) = self.ensure_parent(path)?;
        self.get_mut(parent)?.set(key.to_string(), value);
        Ok(())
    }

    /// Removes the value at a dotted path, returning it.
    pub fn remove_path(&mut self, path: &str) -> InterpResult<Option<Value>> {
        let segments: Vec<&str> = path.split('.').collect();
        let (last, parents) = segments
            .split_last()
            .ok_or_else(|| InterpError::no_such_path(path))?;
        let mut current = self.root;
        for (i, segment) in parents.iter().enumerate() {
            match self.get(current)?.get(segment) {
                Some(Value::Table(id)) => current = *id,
                Some(_) => return Err(InterpError::not_a_table(segments[..=i].join("."))),
                None => return Ok(None),
            }
        }
        Ok(self.get_mut(current)?.remove(last))
    }

    /// Number of live tables (including the root).
    pub fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// Mark-sweep collection.
    ///
    /// Tables unreachable from the root (or from `extra_roots`, typically
    /// the evaluation stack) are freed. Returns the number of tables
    /// collected.
    pub fn collect_garbage(&mut self, extra_roots: &[Value]) -> usize {
        let mut marked = vec![false; self.slots.len()];
        let mut work = vec![self.root];
        for v in extra_roots {
            if let Value::Table(id) = v {
                work.push(*id);
            }
        }

        while let Some(id) = work.pop() {
            let slot = id.0 as usize;
            if slot >= marked.len() || marked[slot] {
                continue;
            }
            marked[slot] = true;
            if let Some(table) = self.slots[slot].as_ref() {
                if let Some(link) = table.index_link() {
                    work.push(link);
                }
                for (_, v) in table.iter() {
                    if let Value::Table(child) = v {
                        work.push(*child);
                    }
                }
            }
        }

        let mut collected = 0;
        for (slot, entry) in self.slots.iter_mut().enumerate() {
            if entry.is_some() && !marked[slot] {
                *entry = None;
                self.free.push(slot as u32);
                collected += 1;
            }
        }
        if collected > 0 {
            log::debug!("table arena collected {collected} unreachable tables");
        }
        collected
    }
}

impl Default for Tables {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_set_resolve() {
        let mut tables = Tables::new();
        tables
            .set_path("a.b.c", Value::from_int(7))
            .expect("set should succeed");

        let v = tables.resolve_path("a.b.c").expect("resolve should succeed");
        assert_eq!(v, Some(Value::from_int(7)));

        // Intermediate tables were created.
        let a = tables.resolve_path("a").unwrap().unwrap();
        assert!(matches!(a, Value::Table(_)));

        // Missing paths resolve to None.
        assert_eq!(tables.resolve_path("a.b.x").unwrap(), None);
        assert_eq!(tables.resolve_path("z").unwrap(), None);
    }

    #[test]
    fn test_non_table_segment_errors() {
        let mut tables = Tables::new();
        tables.set_path("a.b", Value::from_int(1)).unwrap();
        assert!(tables.resolve_path("a.b.c").is_err());
        assert!(tables.set_path("a.b.c", Value::Nil).is_err());
    }

    #[test]
    fn test_index_link_lookup() {
        let mut tables = Tables::new();
        let parent = tables.alloc();
        let child = tables.alloc();
        tables
            .get_mut(parent)
            .unwrap()
            .set("method", Value::from_int(1));
        tables.get_mut(child).unwrap().set_index_link(Some(parent));

        let found = tables.lookup(child, "method").unwrap();
        assert_eq!(found, Some(Value::from_int(1)));
        assert_eq!(tables.lookup(child, "missing").unwrap(), None);
    }

    #[test]
    fn test_remove_path() {
        let mut tables = Tables::new();
        tables.set_path("ns.fn", Value::from_int(2)).unwrap();
        let removed = tables.remove_path("ns.fn").unwrap();
        assert_eq!(removed, Some(Value::from_int(2)));
        assert_eq!(tables.resolve_path("ns.fn").unwrap(), None);
    }

    #[test]
    fn test_collect_garbage() {
        let mut tables = Tables::new();
        tables.set_path("kept.child", Value::Nil).unwrap();
        let orphan = tables.alloc();
        tables
            .get_mut(orphan)
            .unwrap()
            .set("x", Value::from_int(1));

        let before = tables.live_count();
        let collected = tables.collect_garbage(&[]);
        assert_eq!(collected, 1);
        assert_eq!(tables.live_count(), before - 1);
        assert!(tables.get(orphan).is_err());

        // Reachable tables survive.
        assert!(tables.resolve_path("kept.child").unwrap().is_some());
    }

    #[test]
    fn test_gc_respects_extra_roots() {
        let mut tables = Tables::new();
        let held = tables.alloc();
        let collected = tables.collect_garbage(&[Value::Table(held)]);
        assert_eq!(collected, 0);
        assert!(tables.get(held).is_ok());
    }
}
