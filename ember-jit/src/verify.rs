//! Post-lowering graph verification.
//!
//! After lowering, the only calls a graph may still contain are the
//! out-of-line generic stub and constructors of the runtime's sanctioned
//! failure exceptions. Anything else, in particular a surviving candidate
//! call, means a rewrite was skipped or half-applied.

use crate::graph::{Graph, InvokeNode, MethodRef, Node};
use crate::lower::ARRAYCOPY_STUB;
use thiserror::Error;

/// Why a call is allowed to survive lowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvokeKind {
    /// The deliberately kept generic entry point.
    GenericFallback,
    /// Constructing one of the failure exceptions a rewritten path raises.
    ExceptionConstructor,
    /// Nothing sanctions this call.
    Unexpected,
}

const SANCTIONED_EXCEPTIONS: [&str; 3] = [
    "NullPointerException",
    "ArrayIndexOutOfBoundsException",
    "ArrayStoreException",
];

pub fn classify_invoke(invoke: &InvokeNode) -> InvokeKind {
    if invoke.target == ARRAYCOPY_STUB {
        return InvokeKind::GenericFallback;
    }
    if invoke.target.name == "<init>" && SANCTIONED_EXCEPTIONS.contains(&invoke.target.class) {
        return InvokeKind::ExceptionConstructor;
    }
    InvokeKind::Unexpected
}

/// A call survived lowering that neither the fallback nor the sanctioned
/// exception set accounts for.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("unsanctioned call to {target} remains after lowering")]
pub struct InvariantViolation {
    pub target: MethodRef,
}

/// Checks the post-lowering call invariant over the whole graph.
pub fn check_lowered(graph: &Graph) -> Result<(), InvariantViolation> {
    for (_, node) in graph.iter() {
        if let Node::Invoke(invoke) = node {
            if classify_invoke(invoke) == InvokeKind::Unexpected {
                return Err(InvariantViolation {
                    target: invoke.target,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ValueRef;
    use crate::lower::ARRAYCOPY;

    fn invoke(target: MethodRef) -> InvokeNode {
        InvokeNode {
            target,
            args: vec![ValueRef(0)],
        }
    }

    #[test]
    fn stub_and_exception_constructors_are_sanctioned() {
        assert_eq!(
            classify_invoke(&invoke(ARRAYCOPY_STUB)),
            InvokeKind::GenericFallback
        );
        for class in SANCTIONED_EXCEPTIONS {
            assert_eq!(
                classify_invoke(&invoke(MethodRef {
                    class,
                    name: "<init>",
                })),
                InvokeKind::ExceptionConstructor
            );
        }
    }

    #[test]
    fn candidate_and_arbitrary_calls_are_not() {
        assert_eq!(classify_invoke(&invoke(ARRAYCOPY)), InvokeKind::Unexpected);
        assert_eq!(
            classify_invoke(&invoke(MethodRef {
                class: "NullPointerException",
                name: "fillInStackTrace",
            })),
            InvokeKind::Unexpected
        );
    }

    #[test]
    fn check_lowered_flags_the_surviving_candidate() {
        let mut graph = Graph::new();
        graph.add(Node::Invoke(invoke(ARRAYCOPY_STUB)));
        assert_eq!(check_lowered(&graph), Ok(()));

        graph.add(Node::Invoke(invoke(ARRAYCOPY)));
        assert_eq!(
            check_lowered(&graph),
            Err(InvariantViolation { target: ARRAYCOPY })
        );
    }
}
