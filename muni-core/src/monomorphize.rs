//! Monomorphization worklist.
//!
//! Resolution records every `(generic structure, concrete type
//! argument tuple)` pair it encounters. This module drains that
//! worklist: each pair gets its layout computed and its substituted
//! constructor and method bodies type-checked, which may in turn
//! enqueue further pairs. The set of concrete types reachable from
//! the checked functions is finite unless a generic structure grows
//! its own type argument on every step; the depth bound below turns
//! that case into a `MonomorphizationDiverges` diagnostic instead of
//! a hang.

use crate::typecheck::{check_instantiation, Checker};

/// Maximum nesting depth of an instantiated structure type.
pub const MAX_INSTANTIATION_DEPTH: usize = 64;

/// Process pending instantiations until a fixed point. Instantiation
/// requests are deduplicated by mangled name before they reach the
/// worklist, so each pair is processed exactly once.
pub(crate) fn drain(checker: &mut Checker) {
    while let Some((name, args, span)) = checker.pending.pop() {
        check_instantiation(checker, &name, &args, span);
    }
}
