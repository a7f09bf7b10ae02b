//! Provenance engine: linear undo/redo with command grouping and the
//! re-roll algorithm for undoing instance deletions.
//!
//! Recording happens after the native call succeeds, between the call and
//! its hooks, so a failed call never leaves an entry and a hook failure
//! leaves a valid undo point. Calls nested inside another call buffer
//! their records per depth level and are adopted as children when the
//! enclosing call records itself; calls inside an explicit command group
//! attach directly to the group's no-op marker.

use std::fs::File;
use std::io::Write;

use argus_interp::Value;

use crate::classes::ClassInstance;
use crate::engine::ScriptEngine;
use crate::error::{ScriptError, ScriptResult};
use crate::registry::FunFlags;

/// One entry on the undo/redo stack.
#[derive(Debug, Clone, Default)]
pub struct UndoRedoItem {
    /// Target function name.
    pub fq_name: String,

    /// Parameters of the call prior to this one (defaults when the function
    /// had never run).
    pub undo_params: Vec<Value>,

    /// Parameters of this call.
    pub redo_params: Vec<Value>,

    /// Calls nested inside this one. Undo walks them explicitly after the
    /// step's own undo; redo replays them only when `also_redo_children`
    /// is set, otherwise the function's own execution re-drives them.
    pub children: Vec<UndoRedoItem>,

    /// Sorted ids of instances created during this step.
    pub inst_creations: Vec<i64>,

    /// Sorted ids of instances deleted during this step.
    pub inst_deletions: Vec<i64>,

    /// Set only on the no-op marker anchoring a command group.
    pub also_redo_children: bool,
}

/// Provenance state. The algorithms that need to dispatch calls live on
/// [`ScriptEngine`] below.
pub struct Provenance {
    enabled: bool,
    temporarily_disabled: bool,

    stack: Vec<UndoRedoItem>,
    /// 1-based index into `stack`; `stack.len() - stack_pointer` records
    /// are redo-available.
    stack_pointer: usize,

    /// Textual description of every executed call, including exempt ones.
    desc_log: Vec<String>,
    desc_log_enabled: bool,

    /// Guard against beginning a record while one is being logged.
    logging: bool,
    reentry_throws: bool,

    /// Set while an undo or redo replay is running.
    in_flight: bool,

    /// Set while undoing a step that deleted instances; replay of calls
    /// whose target vanished with the instance is then ignored.
    undoing_instance_deletion: bool,

    command_depth: usize,
    /// Depth contributed by explicit command groups.
    group_depth: usize,

    /// Records of nested calls awaiting adoption, indexed by depth.
    child_buffers: Vec<Vec<UndoRedoItem>>,

    /// Instance ids created/deleted since the current step opened.
    pending_creations: Vec<i64>,
    pending_deletions: Vec<i64>,
}

impl Provenance {
    pub fn new() -> Self {
        Self {
            enabled: true,
            temporarily_disabled: false,
            stack: Vec::new(),
            stack_pointer: 0,
            desc_log: Vec::new(),
            desc_log_enabled: true,
            logging: false,
            reentry_throws: true,
            in_flight: false,
            undoing_instance_deletion: false,
            command_depth: 0,
            group_depth: 0,
            child_buffers: Vec::new(),
            pending_creations: Vec::new(),
            pending_deletions: Vec::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enables or disables provenance. Disabling clears all history.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.clear();
        }
    }

    /// Clears the undo/redo stack and the description log.
    pub fn clear(&mut self) {
        self.stack.clear();
        self.stack_pointer = 0;
        self.desc_log.clear();
        self.child_buffers.clear();
        self.pending_creations.clear();
        self.pending_deletions.clear();
    }

    pub fn temporarily_disabled(&self) -> bool {
        self.temporarily_disabled
    }

    pub fn set_temporarily_disabled(&mut self, disabled: bool) {
        self.temporarily_disabled = disabled;
    }

    pub fn set_reentry_throws(&mut self, throws: bool) {
        self.reentry_throws = throws;
    }

    pub fn set_desc_log_enabled(&mut self, enabled: bool) {
        self.desc_log_enabled = enabled;
    }

    pub fn command_depth(&self) -> usize {
        self.command_depth
    }

    pub fn stack_len(&self) -> usize {
        self.stack.len()
    }

    pub fn stack_pointer(&self) -> usize {
        self.stack_pointer
    }

    pub fn desc_log(&self) -> &[String] {
        &self.desc_log
    }

    pub fn top(&self) -> Option<&UndoRedoItem> {
        self.stack.last()
    }

    pub(crate) fn begin_command(&mut self) {
        self.command_depth += 1;
    }

    pub(crate) fn end_command(&mut self) {
        self.command_depth = self.command_depth.saturating_sub(1);
    }

    /// Drops buffered child records and pending instance sets.
    ///
    /// Called when a top-level call completes without appending a record
    /// (exempt or failed): there is no entry for the nested bookkeeping to
    /// attach to, and it must not leak onto the next record.
    pub(crate) fn discard_pending(&mut self) {
        if self.in_flight || self.command_depth != 0 {
            return;
        }
        self.child_buffers.clear();
        self.pending_creations.clear();
        self.pending_deletions.clear();
    }

    /// Marks the current top record as a command-group anchor.
    pub(crate) fn set_top_also_redo_children(&mut self) {
        if let Some(top) = self.stack.last_mut() {
            top.also_redo_children = true;
        }
    }

    /// Appends to the last description-log line.
    pub(crate) fn amend_last_desc(&mut self, amendment: &str) {
        if !self.enabled || !self.desc_log_enabled {
            return;
        }
        if let Some(last) = self.desc_log.last_mut() {
            last.push_str(amendment);
        }
    }

    fn note_creation(&mut self, id: i64) {
        // Creations during replay are re-creations; the step already
        // carries them.
        if !self.enabled || self.temporarily_disabled || self.in_flight {
            return;
        }
        if self.group_depth > 0 && self.command_depth >= self.group_depth {
            if let Some(top) = self.stack.last_mut() {
                top.inst_creations.push(id);
                top.inst_creations.sort_unstable();
                return;
            }
        }
        self.pending_creations.push(id);
    }

    fn note_deletion(&mut self, id: i64) {
        if !self.enabled || self.temporarily_disabled || self.in_flight {
            return;
        }
        if self.group_depth > 0 && self.command_depth >= self.group_depth {
            if let Some(top) = self.stack.last_mut() {
                top.inst_deletions.push(id);
                top.inst_deletions.sort_unstable();
                return;
            }
        }
        self.pending_deletions.push(id);
    }

    /// Renders the redo-parameter list of an item the way the description
    /// log prints calls.
    fn format_params(params: &[Value]) -> String {
        params
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn describe_item(item: &UndoRedoItem) -> String {
        format!("{}({})", item.fq_name, Self::format_params(&item.redo_params))
    }

    /// Lines describing the undo-available half of the stack, newest first.
    pub fn undo_stack_desc(&self) -> Vec<String> {
        self.stack[..self.stack_pointer]
            .iter()
            .rev()
            .map(Self::describe_item)
            .collect()
    }

    /// Lines describing the redo-available half of the stack, oldest first.
    pub fn redo_stack_desc(&self) -> Vec<String> {
        self.stack[self.stack_pointer..]
            .iter()
            .map(Self::describe_item)
            .collect()
    }
}

impl Default for Provenance {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine {
    /// Records a successful call. `redo` holds the arguments as executed;
    /// `undo` holds the prior last-exec snapshot.
    pub(crate) fn prov_log_execution(
        &mut self,
        fq_name: &str,
        stack_exempt: bool,
        redo: &[Value],
        undo: &[Value],
    ) -> ScriptResult<()> {
        let p = &mut self.provenance;
        if p.temporarily_disabled || !p.enabled {
            return Ok(());
        }
        if p.logging {
            if p.reentry_throws {
                return Err(ScriptError::ProvenanceReenter);
            }
            return Ok(());
        }
        p.logging = true;

        if p.desc_log_enabled {
            let line = format!(
                "{}({}) -- depth:{}",
                fq_name,
                Provenance::format_params(redo),
                p.command_depth
            );
            if p.in_flight {
                let amendment = format!(" -- Called: \"{line}\"");
                if let Some(last) = p.desc_log.last_mut() {
                    last.push_str(&amendment);
                } else {
                    p.desc_log.push(line);
                }
            } else {
                p.desc_log.push(line);
            }
        }

        if stack_exempt || p.in_flight {
            p.logging = false;
            p.discard_pending();
            return Ok(());
        }

        let depth = p.command_depth;
        let mut item = UndoRedoItem {
            fq_name: fq_name.to_string(),
            undo_params: undo.to_vec(),
            redo_params: redo.to_vec(),
            children: Vec::new(),
            inst_creations: Vec::new(),
            inst_deletions: Vec::new(),
            also_redo_children: false,
        };

        // Adopt records buffered by calls nested one level deeper.
        if p.child_buffers.len() > depth + 1 {
            item.children = std::mem::take(&mut p.child_buffers[depth + 1]);
        }

        if depth == 0 {
            // Entering a new timeline drops the redo-available records.
            p.stack.truncate(p.stack_pointer);
            item.inst_creations = std::mem::take(&mut p.pending_creations);
            item.inst_creations.sort_unstable();
            item.inst_deletions = std::mem::take(&mut p.pending_deletions);
            item.inst_deletions.sort_unstable();
            p.stack.push(item);
            p.stack_pointer += 1;
        } else if p.group_depth > 0 && depth <= p.group_depth {
            // Direct member of an explicit command group: attach to the
            // marker record.
            if let Some(top) = p.stack.last_mut() {
                top.children.push(item);
            }
        } else {
            while p.child_buffers.len() <= depth {
                p.child_buffers.push(Vec::new());
            }
            p.child_buffers[depth].push(item);
        }

        p.logging = false;
        Ok(())
    }

    /// Amends the description log after a failed native call or hook.
    pub(crate) fn prov_log_failure(&mut self, reason: &str) {
        let amendment = if reason.is_empty() {
            " -- FAILED".to_string()
        } else {
            format!(" -- FAILED: {reason}")
        };
        self.provenance.amend_last_desc(&amendment);
    }

    /// Amends the description log with the number of hooks fired.
    pub(crate) fn prov_log_hooks(&mut self, static_hooks: usize, member_hooks: usize) {
        let total = static_hooks + member_hooks;
        if total == 0 {
            return;
        }
        self.provenance
            .amend_last_desc(&format!(" -- {total} hook(s) called"));
    }

    pub(crate) fn prov_note_creation(&mut self, id: i64) {
        self.provenance.note_creation(id);
    }

    pub(crate) fn prov_note_deletion(&mut self, id: i64) {
        self.provenance.note_deletion(id);
    }

    /// Undo one user-level step.
    ///
    /// A step that deleted instances triggers the re-roll: walk back until
    /// the accumulated deletions are covered by creations, undo that far,
    /// then redo forward to just before the requested step. Redo already
    /// reseeds instance ids, so recreated instances keep their ids.
    pub fn provenance_undo(&mut self) -> ScriptResult<()> {
        if !self.provenance.enabled {
            return Ok(());
        }
        if self.provenance.stack_pointer == 0 {
            return Err(ScriptError::invalid_undo("undo pointer at bottom of stack"));
        }

        let undo_index = self.provenance.stack_pointer - 1;
        let mut num_undos = 1;
        let deletes = !self.provenance.stack[undo_index].inst_deletions.is_empty();
        if deletes {
            self.provenance.undoing_instance_deletion = true;
            num_undos = match self.prov_determine_rerolls(undo_index) {
                Ok(n) => n,
                Err(err) => {
                    self.provenance.undoing_instance_deletion = false;
                    return Err(err);
                }
            };
        }

        let result = (|| {
            for _ in 0..num_undos {
                self.prov_undo_internal()?;
            }
            for _ in 1..num_undos {
                self.provenance_redo()?;
            }
            Ok(())
        })();

        self.provenance.undoing_instance_deletion = false;
        result
    }

    /// Redo one user-level step.
    pub fn provenance_redo(&mut self) -> ScriptResult<()> {
        if !self.provenance.enabled {
            return Ok(());
        }
        if self.provenance.stack_pointer == self.provenance.stack.len() {
            return Err(ScriptError::invalid_redo("redo pointer at top of stack"));
        }

        let item = self.provenance.stack[self.provenance.stack_pointer].clone();

        // Recreated instances must come back under their original ids.
        if !item.inst_creations.is_empty() {
            let low = item.inst_creations[0];
            let high = item.inst_creations[item.inst_creations.len() - 1];
            self.instances.set_temp_id_range(low, high);
        }

        self.perform_undo_redo_op(&item.fq_name, &item.redo_params, false)
            .map_err(|err| match err {
                ScriptError::ProvenanceInvalidUndoOrRedo { message } => {
                    ScriptError::invalid_redo(message)
                }
                other => other,
            })?;

        if item.also_redo_children {
            for child in &item.children {
                self.perform_undo_redo_op(&child.fq_name, &child.redo_params, false)
                    .map_err(|err| match err {
                        ScriptError::ProvenanceInvalidUndoOrRedo { message } => {
                            ScriptError::invalid_redo(message)
                        }
                        other => other,
                    })?;
            }
        }

        self.provenance.stack_pointer += 1;
        Ok(())
    }

    /// Undo exactly one record, walking children, without re-roll checks.
    fn prov_undo_internal(&mut self) -> ScriptResult<()> {
        if self.provenance.stack_pointer == 0 {
            return Err(ScriptError::invalid_undo("undo pointer at bottom of stack"));
        }
        let item = self.provenance.stack[self.provenance.stack_pointer - 1].clone();

        let map_undo = |err: ScriptError| match err {
            ScriptError::ProvenanceInvalidUndoOrRedo { message } => {
                ScriptError::invalid_undo(message)
            }
            other => other,
        };

        self.perform_undo_redo_op(&item.fq_name, &item.undo_params, true)
            .map_err(map_undo)?;

        // Children undo after the parent; this reverses the original call
        // order of the composited sequence.
        for child in &item.children {
            self.perform_undo_redo_op(&child.fq_name, &child.undo_params, true)
                .map_err(map_undo)?;
        }

        // Instances created by this step are torn down; redo rebuilds them
        // with their original ids.
        if !item.inst_creations.is_empty() {
            let was_in_flight = self.provenance.in_flight;
            self.provenance.in_flight = true;
            let result: Result<(), ScriptError> = (|| {
                for id in &item.inst_creations {
                    self.delete_class_instance(ClassInstance::from_id(*id))?;
                }
                Ok(())
            })();
            self.provenance.in_flight = was_in_flight;
            result?;
        }

        self.provenance.stack_pointer -= 1;
        Ok(())
    }

    /// Number of undo steps needed so that every instance deleted between
    /// here and there is covered by its creation.
    fn prov_determine_rerolls(&self, undo_index: usize) -> ScriptResult<usize> {
        let mut unresolved: Vec<i64> = Vec::new();
        let mut num_undos = 0usize;
        let mut index = undo_index as isize;
        let mut resolved = false;

        while index >= 0 {
            let item = &self.provenance.stack[index as usize];
            num_undos += 1;

            for id in &item.inst_deletions {
                // An id cannot be deleted twice across one timeline.
                if unresolved.contains(id) {
                    return Err(ScriptError::failed_undo("duplicate instance ids"));
                }
                unresolved.push(*id);
            }
            unresolved.retain(|id| !item.inst_creations.contains(id));

            if unresolved.is_empty() {
                resolved = true;
                break;
            }
            index -= 1;
        }

        if !resolved {
            return Err(ScriptError::failed_undo(
                "not enough history to rebuild the deleted instances",
            ));
        }
        Ok(num_undos)
    }

    /// Replays one record in the given direction: a null-undo/redo is a
    /// no-op, a custom undo/redo function takes precedence, otherwise the
    /// function itself is re-dispatched with the stored parameters
    /// (provenance recording suppressed, hooks firing as usual).
    pub(crate) fn perform_undo_redo_op(
        &mut self,
        fq_name: &str,
        params: &[Value],
        is_undo: bool,
    ) -> ScriptResult<()> {
        let key = match self.registry.key_of(fq_name) {
            Some(key) => key,
            None => {
                if self.provenance.undoing_instance_deletion {
                    // The target vanished with its instance; the re-roll
                    // will recreate and replay it.
                    return Ok(());
                }
                return Err(ScriptError::invalid_undo_redo(format!(
                    "no function table for {fq_name}"
                )));
            }
        };

        let (flags, custom) = {
            let record = self.registry.record(key)?;
            let custom = if is_undo {
                record.undo_fn.clone()
            } else {
                record.redo_fn.clone()
            };
            (record.flags, custom)
        };

        let skip = if is_undo {
            flags.contains(FunFlags::NULL_UNDO)
        } else {
            flags.contains(FunFlags::NULL_REDO)
        };
        if skip {
            return Ok(());
        }

        let was_in_flight = self.provenance.in_flight;
        self.provenance.in_flight = true;
        let result = match custom {
            Some(callable) => {
                let guard = crate::stack_guard::StackGuard::new(&self.interp.stack, 0, 0);
                for value in params {
                    self.interp.stack.push(value.clone());
                }
                let call = (callable)(self);
                guard.settle(&mut self.interp.stack, call.is_err());
                call.map(|_| ())
            }
            None => self.dispatch_key(key, params.to_vec()).map(|_| ()),
        };
        self.provenance.in_flight = was_in_flight;
        result
    }

    /// Opens a command group: issue the no-op marker, flag it, and deepen
    /// the command depth so subsequent calls attach to the marker.
    pub fn begin_command_group(&mut self) -> ScriptResult<()> {
        self.cexec(crate::SYSTEM_NOP, ())?;
        self.provenance.set_top_also_redo_children();
        self.provenance.command_depth += 1;
        self.provenance.group_depth = self.provenance.command_depth;
        Ok(())
    }

    /// Closes the innermost command group.
    pub fn end_command_group(&mut self) -> ScriptResult<()> {
        self.provenance.command_depth = self.provenance.command_depth.saturating_sub(1);
        self.provenance.group_depth = self
            .provenance
            .group_depth
            .min(self.provenance.command_depth);
        Ok(())
    }

    /// Writes the description log to `path`, one call per line.
    pub fn write_provenance_record(&self, path: &str) -> ScriptResult<()> {
        let mut file = File::create(path)
            .map_err(|err| ScriptError::runtime(format!("cannot create {path}: {err}")))?;
        for line in self.provenance.desc_log() {
            writeln!(file, "{line}")
                .map_err(|err| ScriptError::runtime(format!("cannot write {path}: {err}")))?;
        }
        Ok(())
    }

    /// Logs the undo-available records.
    pub fn log_undo_stack(&self) {
        log::info!("undo stack (latest first):");
        for line in self.provenance.undo_stack_desc() {
            log::info!("  {line}");
        }
    }

    /// Logs the redo-available records.
    pub fn log_redo_stack(&self) {
        log::info!("redo stack (next first):");
        for line in self.provenance.redo_stack_desc() {
            log::info!("  {line}");
        }
    }

    /// Logs the full description record.
    pub fn log_provenance_record(&self) {
        log::info!("provenance record:");
        for line in self.provenance.desc_log() {
            log::info!("  {line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disable_clears_history() {
        let mut p = Provenance::new();
        p.stack.push(UndoRedoItem::default());
        p.stack_pointer = 1;
        p.desc_log.push("iso.set(0.5) -- depth:0".to_string());

        p.set_enabled(false);
        assert_eq!(p.stack_len(), 0);
        assert_eq!(p.stack_pointer(), 0);
        assert!(p.desc_log().is_empty());
        assert!(!p.is_enabled());
    }

    #[test]
    fn test_stack_descriptions() {
        let mut p = Provenance::new();
        for name in ["a.f", "b.g", "c.h"] {
            p.stack.push(UndoRedoItem {
                fq_name: name.to_string(),
                ..Default::default()
            });
        }
        p.stack_pointer = 2;

        assert_eq!(p.undo_stack_desc(), vec!["b.g()", "a.f()"]);
        assert_eq!(p.redo_stack_desc(), vec!["c.h()"]);
    }

    #[test]
    fn test_format_params() {
        assert_eq!(
            Provenance::format_params(&[Value::Number(0.5), Value::from_bool(true)]),
            "0.5, true"
        );
    }
}
