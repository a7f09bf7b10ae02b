//! Scoped evaluation-stack balance guard.
//!
//! Every engine operation that touches the evaluation stack brackets its
//! work with a [`StackGuard`]: on entry the guard records the stack height
//! and how many values the operation is expected to consume and return; on
//! settle it verifies the final height and repairs any imbalance so that no
//! exit path, normal or failing, leaks values onto the stack.

use argus_interp::EvaluationStack;

/// Records the expected stack balance of one operation.
#[derive(Debug, Clone, Copy)]
pub struct StackGuard {
    start_height: usize,
    vals_consumed: usize,
    vals_returned: usize,
}

impl StackGuard {
    /// Opens a guard over `stack` for an operation expected to consume
    /// `vals_consumed` values and leave `vals_returned` on top.
    pub fn new(stack: &EvaluationStack, vals_consumed: usize, vals_returned: usize) -> Self {
        Self {
            start_height: stack.len(),
            vals_consumed,
            vals_returned,
        }
    }

    /// The stack height this guard expects after the operation completes.
    pub fn expected_height(&self) -> usize {
        self.start_height - self.vals_consumed.min(self.start_height) + self.vals_returned
    }

    /// Verifies the final stack height, repairing any imbalance.
    ///
    /// Extra values are removed while preserving the topmost expected
    /// return values. A warning is logged unless `expected_failure` is set
    /// (the engine sets it around intentionally failing operations).
    ///
    /// Returns true when the stack was already balanced.
    pub fn settle(&self, stack: &mut EvaluationStack, expected_failure: bool) -> bool {
        let expected = self.expected_height();
        let actual = stack.len();
        if actual == expected {
            return true;
        }

        if !expected_failure {
            log::warn!(
                "evaluation stack imbalance: expected height {expected}, found {actual}; repairing"
            );
        }

        if actual > expected {
            stack.truncate_keeping(expected, self.vals_returned);
        }
        // A short stack cannot be repaired; the imbalance has already been
        // reported and downstream underflow checks will surface it.
        false
    }
}
