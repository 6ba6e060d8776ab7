//! The copy-type planner: which guards a bulk copy still needs, and which
//! specialization it can take.
//!
//! The tie-break is always "the most specialized plan that is provably
//! sound". Absence of proof is not an error; it drops the plan one tier, down
//! to the generic fallback. A plan that skips a needed check would be an
//! unsound elision, which is a compiler defect caught by the soundness tests,
//! never a runtime-recoverable condition.

use crate::types::ArrayTypeDescriptor;
use ember::kind::ElementKind;
use ember::reflect::Reflection;

/// How the copy site will be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyStrategy {
    /// Same primitive element kind on both sides; a single-width move.
    DirectPrimitiveCopy,
    /// Reference copy with a per-element store-compatibility check.
    DirectObjectCopyWithStoreCheck,
    /// Reference copy with store checks elided: the destination's exact
    /// runtime class statically covers every element the source can hold.
    DirectObjectCopyExact,
    /// Not enough static information; the generic entry point stays.
    GenericFallback,
}

/// Non-nullness and range facts about the concrete operands of one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OperandFacts {
    pub src_non_null: bool,
    pub dst_non_null: bool,
    pub bounds_proven: bool,
}

/// The planner's verdict for one lowering site. Produced once, consumed
/// immediately by the lowering; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyPlan {
    pub strategy: CopyStrategy,
    pub element_kind: ElementKind,
    pub null_check_src: bool,
    pub null_check_dst: bool,
    pub bounds_check: bool,
    pub store_check: bool,
    pub array_type_check: bool,
}

impl CopyPlan {
    /// The conservative verdict: keep the generic operation reachable, all
    /// checking stays inside the callee.
    pub fn generic_fallback() -> Self {
        CopyPlan {
            strategy: CopyStrategy::GenericFallback,
            element_kind: ElementKind::Object,
            null_check_src: false,
            null_check_dst: false,
            bounds_check: false,
            store_check: false,
            array_type_check: false,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.strategy == CopyStrategy::GenericFallback
    }
}

/// Computes the minimal sound guard set and specialization for a copy from
/// `src` to `dst`. `None` descriptors mean static analysis could not narrow
/// the type.
pub fn plan(
    oracle: &dyn Reflection,
    src: Option<&ArrayTypeDescriptor>,
    dst: Option<&ArrayTypeDescriptor>,
    facts: &OperandFacts,
) -> CopyPlan {
    let (src, dst) = match (src, dst) {
        (Some(s), Some(d)) => (s, d),
        // "Don't know" is a valid answer: no elision.
        _ => return CopyPlan::generic_fallback(),
    };
    if src.kind != dst.kind {
        // Two declared kinds that no single-width copy serves.
        return CopyPlan::generic_fallback();
    }

    let null_check_src = !facts.src_non_null;
    let null_check_dst = !facts.dst_non_null;
    let bounds_check = !facts.bounds_proven;

    if src.kind.is_primitive() {
        return CopyPlan {
            strategy: CopyStrategy::DirectPrimitiveCopy,
            element_kind: src.kind,
            null_check_src,
            null_check_dst,
            bounds_check,
            store_check: false,
            // An imprecise descriptor re-establishes the kind at runtime.
            array_type_check: !(src.exact && dst.exact),
        };
    }

    // Reference copy. Store checks can only go away when the destination's
    // runtime component type is known precisely and provably covers the upper
    // bound of every element the source can hold.
    let store_compatible = match (dst.exact, src.component, dst.component) {
        (true, Some(s), Some(d)) => oracle.is_subtype(s, d),
        _ => false,
    };
    if store_compatible {
        CopyPlan {
            strategy: CopyStrategy::DirectObjectCopyExact,
            element_kind: ElementKind::Object,
            null_check_src,
            null_check_dst,
            bounds_check,
            store_check: false,
            array_type_check: false,
        }
    } else {
        CopyPlan {
            strategy: CopyStrategy::DirectObjectCopyWithStoreCheck,
            element_kind: ElementKind::Object,
            null_check_src,
            null_check_dst,
            bounds_check,
            store_check: true,
            array_type_check: false,
        }
    }
}
