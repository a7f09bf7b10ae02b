//! Property-based tests for argus-interp
//!
//! These tests use proptest to verify:
//! - Stack operations (push then pop returns original)
//! - Value accessor consistency
//! - Table path operations

use argus_interp::{EvaluationStack, Tables, Value};
use num_bigint::BigInt;
use proptest::prelude::*;

proptest! {
    // =========================================================================
    // Evaluation Stack Push/Pop Tests
    // =========================================================================

    /// Test that push then pop returns the original value - bool
    #[test]
    fn test_push_pop_roundtrip_bool(b in any::<bool>()) {
        let mut stack = EvaluationStack::new();
        let value = Value::from_bool(b);
        let original = value.clone();
        stack.push(value);
        let popped = stack.pop().unwrap();
        prop_assert_eq!(original, popped);
    }

    /// Test that push then pop returns the original value - int
    #[test]
    fn test_push_pop_roundtrip_int(i in any::<i64>()) {
        let mut stack = EvaluationStack::new();
        let value = Value::from_int(i);
        let original = value.clone();
        stack.push(value);
        let popped = stack.pop().unwrap();
        prop_assert_eq!(original, popped);
    }

    /// Test that push then pop returns the original value - bytes
    #[test]
    fn test_push_pop_roundtrip_bytes(v in any::<Vec<u8>>()) {
        let mut stack = EvaluationStack::new();
        let value = Value::Bytes(v);
        let original = value.clone();
        stack.push(value);
        let popped = stack.pop().unwrap();
        prop_assert_eq!(original, popped);
    }

    /// Test that push then pop returns the original value - text
    #[test]
    fn test_push_pop_roundtrip_text(s in any::<String>()) {
        let mut stack = EvaluationStack::new();
        let value = Value::from_text(s);
        let original = value.clone();
        stack.push(value);
        let popped = stack.pop().unwrap();
        prop_assert_eq!(original, popped);
    }

    // =========================================================================
    // Stack Length Tests
    // =========================================================================

    /// Test that stack length is tracked correctly
    #[test]
    fn test_stack_length(values in prop::collection::vec(any::<i64>(), 0..16)) {
        let mut stack = EvaluationStack::new();

        prop_assert_eq!(stack.len(), 0);
        prop_assert!(stack.is_empty());

        for v in &values {
            stack.push(Value::from_int(*v));
        }
        prop_assert_eq!(stack.len(), values.len());

        for _ in &values {
            stack.pop().unwrap();
        }
        prop_assert!(stack.is_empty());
    }

    /// Test that pop_n returns values in push order
    #[test]
    fn test_pop_n_preserves_push_order(values in prop::collection::vec(any::<i64>(), 1..8)) {
        let mut stack = EvaluationStack::new();
        for v in &values {
            stack.push(Value::from_int(*v));
        }

        let popped = stack.pop_n(values.len()).unwrap();
        let expected: Vec<Value> = values.iter().map(|v| Value::from_int(*v)).collect();
        prop_assert_eq!(popped, expected);
        prop_assert!(stack.is_empty());
    }

    // =========================================================================
    // Peek Tests
    // =========================================================================

    /// Test that peek doesn't remove the item
    #[test]
    fn test_peek_preserves_item(value in any::<i64>()) {
        let mut stack = EvaluationStack::new();
        let original = Value::from_int(value);
        stack.push(original.clone());

        // Peek multiple times
        let peek1 = stack.peek(0).unwrap().clone();
        let peek2 = stack.peek(0).unwrap().clone();

        // Stack should still have the item
        prop_assert_eq!(stack.len(), 1);

        // Pop should still work
        let popped = stack.pop().unwrap();

        prop_assert_eq!(&original, &peek1);
        prop_assert_eq!(&original, &peek2);
        prop_assert_eq!(&original, &popped);
    }

    // =========================================================================
    // Truncation Tests
    // =========================================================================

    /// Test that truncate_keeping lands on the requested height and keeps
    /// the topmost values
    #[test]
    fn test_truncate_keeping_height(
        base in prop::collection::vec(any::<i64>(), 0..8),
        extra in prop::collection::vec(any::<i64>(), 0..6),
        keep in 0usize..3,
    ) {
        let mut stack = EvaluationStack::new();
        for v in base.iter().chain(extra.iter()) {
            stack.push(Value::from_int(*v));
        }

        let height = stack.len();
        let target = base.len();
        let top: Vec<Value> = (0..keep.min(height))
            .map(|n| stack.peek(n).unwrap().clone())
            .collect();

        stack.truncate_keeping(target, keep);
        if height > target {
            prop_assert_eq!(stack.len(), target.max(keep.min(height)));
        } else {
            prop_assert_eq!(stack.len(), height);
        }

        // The preserved return values still sit on top, in order.
        for (n, value) in top.iter().enumerate() {
            if n < stack.len() {
                prop_assert_eq!(stack.peek(n).unwrap(), value);
            }
        }
    }

    // =========================================================================
    // Value Accessor Tests
    // =========================================================================

    /// Test that boolean conversion is consistent
    #[test]
    fn test_value_bool_consistency(value in any::<bool>()) {
        let v = Value::from_bool(value);
        prop_assert_eq!(v.as_bool().unwrap(), value);
    }

    /// Test that integer conversion is consistent
    #[test]
    fn test_value_int_consistency(value in any::<i64>()) {
        let v = Value::from_int(value);
        prop_assert_eq!(v.as_i64().unwrap(), value);
        prop_assert_eq!(v.as_int().unwrap(), &BigInt::from(value));
    }

    /// Test that integers widen into floats through the accessor
    #[test]
    fn test_value_int_widens_to_f64(value in any::<i32>()) {
        let v = Value::from_int(value);
        prop_assert_eq!(v.as_f64().unwrap(), value as f64);
    }

    /// Test that text conversion is consistent
    #[test]
    fn test_value_text_consistency(s in any::<String>()) {
        let v = Value::from_text(s.clone());
        prop_assert_eq!(v.as_text().unwrap(), s.as_str());
    }

    // =========================================================================
    // Table Path Tests
    // =========================================================================

    /// Test that a value stored at a dotted path resolves back unchanged
    #[test]
    fn test_table_path_roundtrip(value in any::<i64>()) {
        let mut tables = Tables::new();
        tables.set_path("ns.leaf", Value::from_int(value)).unwrap();
        let resolved = tables.resolve_path("ns.leaf").unwrap();
        prop_assert_eq!(resolved, Some(Value::from_int(value)));

        let removed = tables.remove_path("ns.leaf").unwrap();
        prop_assert_eq!(removed, Some(Value::from_int(value)));
        prop_assert_eq!(tables.resolve_path("ns.leaf").unwrap(), None);
    }
}
