//! Class lifecycle: construction from the interpreter, member
//! registration, deletion, inheritance, id stability under redo and the
//! deletion re-roll.

use std::cell::RefCell;
use std::rc::Rc;

use argus_script::{ClassInstance, ScriptEngine, ScriptError, ScriptResult};

struct Ren {
    color: [f32; 3],
}

fn engine_with_ren() -> ScriptEngine {
    let mut eng = ScriptEngine::new().expect("engine construction should succeed");
    eng.register_class(
        || -> ScriptResult<Ren> { Ok(Ren { color: [0.0; 3] }) },
        "ren",
        "A renderer.",
        |eng, inst| {
            let obj = eng.instance_downcast::<Ren>(inst)?;
            let target = obj.clone();
            eng.register_instance_function(
                inst,
                move |r: f32, g: f32, b: f32| -> ScriptResult<()> {
                    target.borrow_mut().color = [r, g, b];
                    Ok(())
                },
                "setColor",
                "Sets the background color.",
                true,
            )?;
            Ok(())
        },
    )
    .expect("class registration should succeed");
    eng
}

fn color_of(eng: &ScriptEngine, inst: ClassInstance) -> [f32; 3] {
    let obj = eng.instance_downcast::<Ren>(inst).unwrap();
    let color = obj.borrow().color;
    color
}

#[test]
fn construction_mints_ids_and_registers_methods() {
    let mut eng = engine_with_ren();

    let first: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let second: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    assert_eq!(first.id(), 0);
    assert_eq!(second.id(), 1);
    assert_eq!(eng.live_instance_ids(), vec![0, 1]);
    assert!(eng.function_exists("_sys_.inst.m0.setColor"));
    assert!(eng.function_exists("_sys_.inst.m1.setColor"));
}

#[test]
fn instance_methods_dispatch_by_name_and_by_text() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    eng.cexec("_sys_.inst.m0.setColor", (1.0f32, 0.0f32, 0.0f32))
        .unwrap();
    assert_eq!(color_of(&eng, inst), [1.0, 0.0, 0.0]);

    eng.exec("_sys_.inst.m0:setColor(0, 1, 0)").unwrap();
    assert_eq!(color_of(&eng, inst), [0.0, 1.0, 0.0]);
}

#[test]
fn undo_walks_back_through_instance_history() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    eng.cexec("_sys_.inst.m0.setColor", (1.0f32, 0.0f32, 0.0f32))
        .unwrap();
    eng.cexec("_sys_.inst.m0.setColor", (0.0f32, 1.0f32, 0.0f32))
        .unwrap();

    eng.cexec("provenance.undo", ()).unwrap();
    assert_eq!(color_of(&eng, inst), [1.0, 0.0, 0.0]);

    eng.cexec("provenance.undo", ()).unwrap();
    // Back to the member defaults; the instance is still alive.
    assert_eq!(color_of(&eng, inst), [0.0, 0.0, 0.0]);
    assert_eq!(eng.live_instance_ids(), vec![0]);

    // One more undo unwinds the construction itself.
    eng.cexec("provenance.undo", ()).unwrap();
    assert!(eng.live_instance_ids().is_empty());
    assert!(!eng.function_exists("_sys_.inst.m0.setColor"));

    // Redo recreates the instance under its original id.
    eng.cexec("provenance.redo", ()).unwrap();
    assert_eq!(eng.live_instance_ids(), vec![0]);
    assert!(eng.function_exists("_sys_.inst.m0.setColor"));
}

#[test]
fn ids_are_stable_across_undo_redo() {
    let mut eng = engine_with_ren();
    let _: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let _: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let third: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    assert_eq!(third.id(), 2);

    eng.cexec("provenance.undo", ()).unwrap();
    assert_eq!(eng.live_instance_ids(), vec![0, 1]);

    eng.cexec("provenance.redo", ()).unwrap();
    assert_eq!(eng.live_instance_ids(), vec![0, 1, 2]);

    // New constructions continue above the recreated range.
    let fourth: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    assert_eq!(fourth.id(), 3);
}

#[test]
fn delete_class_removes_lookup_and_bindings() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let obj = eng.instance_downcast::<Ren>(inst).unwrap();

    assert_eq!(eng.class_instance_for(&obj).unwrap(), inst);

    eng.cexec("deleteClass", (inst,)).unwrap();
    assert!(eng.live_instance_ids().is_empty());
    assert!(matches!(
        eng.class_instance_for(&obj).unwrap_err(),
        ScriptError::NonExistentClassInstance { .. }
    ));
    assert!(!eng.function_exists("_sys_.inst.m0.setColor"));

    // Deletion is reentrant: deleting again is a silent no-op.
    eng.delete_class_instance(inst).unwrap();
}

#[test]
fn undoing_a_deletion_rebuilds_the_instance() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    eng.cexec("_sys_.inst.m0.setColor", (1.0f32, 0.0f32, 0.0f32))
        .unwrap();
    eng.cexec("deleteClass", (inst,)).unwrap();
    assert!(eng.live_instance_ids().is_empty());

    // The re-roll walks back to the construction, replays forward, and
    // leaves the pointer just before the deletion.
    eng.cexec("provenance.undo", ()).unwrap();
    assert_eq!(eng.live_instance_ids(), vec![0]);
    assert_eq!(color_of(&eng, inst), [1.0, 0.0, 0.0]);
    assert_eq!(eng.undo_stack_pointer(), 2);

    // Redoing the deletion kills it again.
    eng.cexec("provenance.redo", ()).unwrap();
    assert!(eng.live_instance_ids().is_empty());
}

#[test]
fn failed_undo_when_history_is_gone() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    // Creation drops off the history, leaving only the deletion.
    eng.cexec("provenance.clear", ()).unwrap();
    eng.cexec("deleteClass", (inst,)).unwrap();

    let err = eng.cexec("provenance.undo", ()).unwrap_err();
    assert!(matches!(err, ScriptError::ProvenanceFailedUndo { .. }));
    // The pointer did not move.
    assert_eq!(eng.undo_stack_pointer(), 1);
}

#[test]
fn unid_conversions_round_trip() {
    let mut eng = engine_with_ren();
    let inst: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    let id: i64 = eng.cexec_ret("getClassUNID", (inst,)).unwrap();
    assert_eq!(id, inst.id());

    let back: ClassInstance = eng.cexec_ret("getClassWithUNID", (id,)).unwrap();
    assert_eq!(back, inst);
}

#[test]
fn delete_callback_respects_no_delete_hint() {
    let mut eng = engine_with_ren();
    let deleted = Rc::new(RefCell::new(0u32));
    let sink = deleted.clone();
    eng.set_class_delete_callback("ren", move |_| {
        *sink.borrow_mut() += 1;
    })
    .unwrap();

    let first: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    eng.cexec("deleteClass", (first,)).unwrap();
    assert_eq!(*deleted.borrow(), 1);

    // The native side is tearing this one down itself.
    let second: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    eng.notify_of_deletion(second).unwrap();
    assert_eq!(*deleted.borrow(), 1);
    assert!(eng.live_instance_ids().is_empty());
}

#[test]
fn whole_class_inheritance_chains_method_lookup() {
    let mut eng = engine_with_ren();
    let parent: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let child: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    eng.inherit_class(child, parent).unwrap();

    // The child resolves setColor through the parent's table; the bound
    // receiver is the parent object.
    eng.exec("_sys_.inst.m1:setColor(0, 0, 1)").unwrap();
    assert_eq!(color_of(&eng, parent), [0.0, 0.0, 1.0]);

    let gone = ClassInstance::from_id(99);
    assert!(matches!(
        eng.inherit_class(child, gone).unwrap_err(),
        ScriptError::NonExistentClassInstance { .. }
    ));
}

#[test]
fn single_method_inheritance_copies_one_entry() {
    let mut eng = engine_with_ren();
    let parent: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let child: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    eng.inherit_method(child, parent, "setColor").unwrap();
    eng.exec("_sys_.inst.m1:setColor(1, 1, 0)").unwrap();
    assert_eq!(color_of(&eng, parent), [1.0, 1.0, 0.0]);

    assert!(matches!(
        eng.inherit_method(child, parent, "noSuchMethod").unwrap_err(),
        ScriptError::NonExistentFunction { .. }
    ));
}

#[test]
fn constructor_failure_yields_invalid_handle() {
    let mut eng = ScriptEngine::new().unwrap();
    eng.register_class(
        |threshold: f32| -> ScriptResult<Ren> {
            if threshold < 0.0 {
                return Err(ScriptError::runtime("threshold out of range"));
            }
            Ok(Ren { color: [0.0; 3] })
        },
        "ren",
        "",
        |_, _| Ok(()),
    )
    .unwrap();

    let bad: ClassInstance = eng.cexec_ret("ren.new", (-1.0f32,)).unwrap();
    assert!(!bad.is_valid());
    assert!(eng.live_instance_ids().is_empty());

    let good: ClassInstance = eng.cexec_ret("ren.new", (0.5f32,)).unwrap();
    assert!(good.is_valid());
}

#[test]
fn constructor_arguments_are_type_checked() {
    let mut eng = ScriptEngine::new().unwrap();
    eng.register_class(
        |_v: f32| -> ScriptResult<Ren> { Ok(Ren { color: [0.0; 3] }) },
        "ren",
        "",
        |_, _| Ok(()),
    )
    .unwrap();

    assert!(matches!(
        eng.cexec("ren.new", ()).unwrap_err(),
        ScriptError::UnequalNumParams { .. }
    ));
    assert!(matches!(
        eng.cexec("ren.new", ("x".to_string(),)).unwrap_err(),
        ScriptError::InvalidType { .. }
    ));
}

#[test]
fn shutdown_destroys_instances_before_registrations() {
    let mut eng = engine_with_ren();
    let deleted = Rc::new(RefCell::new(0u32));
    let sink = deleted.clone();
    eng.set_class_delete_callback("ren", move |_| {
        *sink.borrow_mut() += 1;
    })
    .unwrap();

    let _: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();
    let _: ClassInstance = eng.cexec_ret("ren.new", ()).unwrap();

    eng.remove_all_registrations().unwrap();
    assert_eq!(*deleted.borrow(), 2);
    assert!(eng.live_instance_ids().is_empty());
    assert!(!eng.function_exists("ren.new"));
}
