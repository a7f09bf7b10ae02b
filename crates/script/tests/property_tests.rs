//! Property-based tests for argus-script
//!
//! These tests use proptest to verify the engine invariants:
//! - Round-trip: `from_value(into_value(v)) == v` for every transit type
//! - Stack balance across every public entry point, and guard repair
//! - Last-exec law: after a successful call, lastExec equals its arguments
//! - Undo-redo identity: `undo(); redo()` restores the observable state
//! - Depth-0 append: one record per top-level call
//! - Instance id stability under redo
//! - No dangling pointer lookups after deletion

use std::cell::RefCell;
use std::rc::Rc;

use argus_script::{
    Bytes, ClassInstance, Record, ScriptEngine, ScriptResult, StackGuard, Transit, Value,
};
use proptest::prelude::*;

fn engine() -> ScriptEngine {
    ScriptEngine::new().expect("engine construction should succeed")
}

fn finite_f32() -> impl Strategy<Value = f32> {
    any::<f32>().prop_filter("finite", |v| v.is_finite())
}

fn finite_f64() -> impl Strategy<Value = f64> {
    any::<f64>().prop_filter("finite", |v| v.is_finite())
}

/// Registers a probe function writing into the returned cell.
fn register_cell(engine: &mut ScriptEngine, name: &str) -> Rc<RefCell<f32>> {
    let state = Rc::new(RefCell::new(0.0f32));
    let target = state.clone();
    engine
        .register_function(
            move |v: f32| -> ScriptResult<()> {
                *target.borrow_mut() = v;
                Ok(())
            },
            name,
            "",
            true,
        )
        .unwrap();
    state
}

struct Probe;

/// Registers a method-less class usable for lifecycle properties.
fn register_probe_class(engine: &mut ScriptEngine) {
    engine
        .register_class(
            || -> ScriptResult<Probe> { Ok(Probe) },
            "probe",
            "",
            |_, _| Ok(()),
        )
        .unwrap();
}

proptest! {
    // =========================================================================
    // Round-Trip Law
    // =========================================================================

    /// Round-trip law - bool
    #[test]
    fn test_round_trip_bool(v in any::<bool>()) {
        prop_assert_eq!(bool::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - i64
    #[test]
    fn test_round_trip_i64(v in any::<i64>()) {
        prop_assert_eq!(i64::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - u64
    #[test]
    fn test_round_trip_u64(v in any::<u64>()) {
        prop_assert_eq!(u64::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - f32
    #[test]
    fn test_round_trip_f32(v in finite_f32()) {
        prop_assert_eq!(f32::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - f64
    #[test]
    fn test_round_trip_f64(v in finite_f64()) {
        prop_assert_eq!(f64::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - string
    #[test]
    fn test_round_trip_string(v in any::<String>()) {
        prop_assert_eq!(String::from_value(&v.clone().into_value()).unwrap(), v);
    }

    /// Round-trip law - bytes
    #[test]
    fn test_round_trip_bytes(v in any::<Vec<u8>>()) {
        let bytes = Bytes(v);
        prop_assert_eq!(Bytes::from_value(&bytes.clone().into_value()).unwrap(), bytes);
    }

    /// Round-trip law - fixed vector
    #[test]
    fn test_round_trip_vec3(v in prop::array::uniform3(finite_f32())) {
        prop_assert_eq!(<[f32; 3]>::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - matrix
    #[test]
    fn test_round_trip_mat2(v in prop::array::uniform2(prop::array::uniform2(finite_f64()))) {
        prop_assert_eq!(<[[f64; 2]; 2]>::from_value(&v.into_value()).unwrap(), v);
    }

    /// Round-trip law - sequence
    #[test]
    fn test_round_trip_sequence(v in prop::collection::vec(any::<u32>(), 0..16)) {
        prop_assert_eq!(Vec::<u32>::from_value(&v.clone().into_value()).unwrap(), v);
    }

    /// Round-trip law - pair
    #[test]
    fn test_round_trip_pair(a in any::<i32>(), b in any::<bool>()) {
        let pair = (a, b);
        prop_assert_eq!(<(i32, bool)>::from_value(&pair.into_value()).unwrap(), pair);
    }

    /// Round-trip law - record
    #[test]
    fn test_round_trip_record(width in any::<u32>(), name in any::<String>()) {
        let mut rec = Record::new();
        rec.insert("width", width);
        rec.insert("name", name);
        prop_assert_eq!(Record::from_value(&rec.clone().into_value()).unwrap(), rec);
    }

    /// Round-trip law - class instance handle
    #[test]
    fn test_round_trip_instance(id in any::<i64>()) {
        let inst = ClassInstance::from_id(id);
        prop_assert_eq!(ClassInstance::from_value(&inst.into_value()).unwrap(), inst);
    }

    /// Integers widen silently into the float family
    #[test]
    fn test_integers_widen_into_floats(v in any::<i32>()) {
        let value = Value::from_int(v);
        prop_assert!(f32::compatible(&value));
        prop_assert_eq!(f64::from_value(&value).unwrap(), v as f64);
    }

    // =========================================================================
    // Stack Balance
    // =========================================================================

    /// The guard repairs any leak while preserving the return values
    #[test]
    fn test_guard_settles_any_leak(
        initial in prop::collection::vec(any::<i64>(), 0..8),
        leaked in prop::collection::vec(any::<i64>(), 0..6),
        returned in prop::collection::vec(any::<i64>(), 0..3),
    ) {
        let mut stack = argus_interp::EvaluationStack::new();
        for v in &initial {
            stack.push(Value::from_int(*v));
        }

        let guard = StackGuard::new(&stack, 0, returned.len());

        // The operation leaks scratch values beneath its return values.
        for v in leaked.iter().chain(returned.iter()) {
            stack.push(Value::from_int(*v));
        }

        let balanced = guard.settle(&mut stack, true);
        prop_assert_eq!(balanced, leaked.is_empty());
        prop_assert_eq!(stack.len(), initial.len() + returned.len());

        // Return values survive the repair, topmost last-pushed.
        for (n, v) in returned.iter().rev().enumerate() {
            prop_assert_eq!(stack.peek(n).unwrap(), &Value::from_int(*v));
        }
    }

    /// Every public entry point leaves the evaluation stack balanced
    #[test]
    fn test_entry_points_keep_stack_balanced(v in finite_f32()) {
        let mut eng = engine();
        register_cell(&mut eng, "iso.set");
        eng.register_function(|| -> ScriptResult<f32> { Ok(0.5) }, "iso.get", "", false)
            .unwrap();

        let before = eng.stack_height();
        eng.cexec("iso.set", (v,)).unwrap();
        prop_assert_eq!(eng.stack_height(), before);

        let _: f32 = eng.cexec_ret("iso.get", ()).unwrap();
        prop_assert_eq!(eng.stack_height(), before);

        eng.exec("iso.set(0.25)").unwrap();
        prop_assert_eq!(eng.stack_height(), before);

        let _: f32 = eng.exec_ret("iso.get()").unwrap();
        prop_assert_eq!(eng.stack_height(), before);
    }

    // =========================================================================
    // Last-Exec Law
    // =========================================================================

    /// After any successful call, lastExec equals the call's arguments
    #[test]
    fn test_last_exec_matches_arguments(values in prop::collection::vec(finite_f32(), 1..6)) {
        let mut eng = engine();
        register_cell(&mut eng, "iso.set");

        for v in &values {
            eng.cexec("iso.set", (*v,)).unwrap();
            prop_assert_eq!(
                eng.last_exec_of("iso.set").unwrap(),
                vec![Value::Number(*v as f64)]
            );
        }
    }

    // =========================================================================
    // Undo-Redo Identity
    // =========================================================================

    /// undo(); redo() restores lastExec and the native state
    #[test]
    fn test_undo_redo_identity(values in prop::collection::vec(finite_f32(), 2..6)) {
        let mut eng = engine();
        let state = register_cell(&mut eng, "iso.set");

        for v in &values {
            eng.cexec("iso.set", (*v,)).unwrap();
        }
        let last = eng.last_exec_of("iso.set").unwrap();
        let native = *state.borrow();

        eng.cexec("provenance.undo", ()).unwrap();
        eng.cexec("provenance.redo", ()).unwrap();

        prop_assert_eq!(eng.last_exec_of("iso.set").unwrap(), last);
        prop_assert_eq!(*state.borrow(), native);
    }

    // =========================================================================
    // Depth-0 Append
    // =========================================================================

    /// Every top-level call appends exactly one undo record
    #[test]
    fn test_depth_zero_append(values in prop::collection::vec(finite_f32(), 0..8)) {
        let mut eng = engine();
        register_cell(&mut eng, "iso.set");

        for (n, v) in values.iter().enumerate() {
            eng.cexec("iso.set", (*v,)).unwrap();
            prop_assert_eq!(eng.undo_stack_len(), n + 1);
        }
        prop_assert_eq!(eng.undo_stack_pointer(), values.len());
    }

    // =========================================================================
    // Instance Id Stability
    // =========================================================================

    /// A step creating several instances recreates them under the same ids
    #[test]
    fn test_ids_stable_under_redo(extra in 1usize..4) {
        let mut eng = engine();
        register_probe_class(&mut eng);

        let _: ClassInstance = eng.cexec_ret("probe.new", ()).unwrap();

        // One user-level step creating `extra` instances.
        eng.begin_command_group().unwrap();
        for _ in 0..extra {
            let _: ClassInstance = eng.cexec_ret("probe.new", ()).unwrap();
        }
        eng.end_command_group().unwrap();

        let live = eng.live_instance_ids();
        eng.cexec("provenance.undo", ()).unwrap();
        prop_assert_eq!(eng.live_instance_ids(), vec![0]);

        eng.cexec("provenance.redo", ()).unwrap();
        prop_assert_eq!(eng.live_instance_ids(), live);
    }

    // =========================================================================
    // No Dangling Lookups
    // =========================================================================

    /// Deletion removes the pointer lookup for every deleted instance
    #[test]
    fn test_no_dangling_lookups(count in 1usize..5) {
        let mut eng = engine();
        register_probe_class(&mut eng);

        let mut held = Vec::new();
        for _ in 0..count {
            let inst: ClassInstance = eng.cexec_ret("probe.new", ()).unwrap();
            held.push((inst, eng.instance_downcast::<Probe>(inst).unwrap()));
        }

        for (inst, _) in &held {
            eng.cexec("deleteClass", (*inst,)).unwrap();
        }

        prop_assert!(eng.live_instance_ids().is_empty());
        for (_, object) in &held {
            prop_assert!(eng.class_instance_for(object).is_err());
        }
    }
}
