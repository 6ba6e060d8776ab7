//! Intrinsic lowering of the generic bulk-copy call.
//!
//! A call to the runtime's generic copy entry point is replaced in place by
//! the guard sequence the planner demands plus a specialized copy node, or by
//! a call to the out-of-line generic stub when planning falls back. Either
//! way the original candidate disappears from the graph, so running the
//! lowering again finds nothing to do.
//!
//! Guard order is fixed: nullness first, then array kinds, then the copy
//! range. Each guard's deoptimization reason selects the failure signal the
//! runtime raises when deoptimized re-execution reaches the same condition,
//! which keeps the specialized path observably identical to the generic one.

use crate::error::LowerError;
use crate::graph::{
    ArrayCopyNode, DeoptAction, DeoptReason, Graph, GuardCheck, GuardNode, InvokeNode, MethodRef,
    Node, NodeId, ValueRef,
};
use crate::planner::{self, CopyPlan, OperandFacts};
use crate::types::{ArrayTypeDescriptor, TypeFlow};
use ember::constant::Constant;
use ember::reflect::Reflection;

/// The frontend-resolved generic copy entry point this stage intrinsifies.
pub const ARRAYCOPY: MethodRef = MethodRef {
    class: "System",
    name: "arraycopy",
};

/// The out-of-line stub a non-specializable site is routed to. Keeps the
/// fully checked semantics but is no longer a lowering candidate.
pub const ARRAYCOPY_STUB: MethodRef = MethodRef {
    class: "EmberRuntime",
    name: "genericArraycopy",
};

/// The five operands of one copy site, in call order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CopyOperands {
    pub src: ValueRef,
    pub src_pos: ValueRef,
    pub dst: ValueRef,
    pub dst_pos: ValueRef,
    pub length: ValueRef,
}

impl CopyOperands {
    fn from_invoke(invoke: &InvokeNode) -> Result<Self, LowerError> {
        match invoke.args[..] {
            [src, src_pos, dst, dst_pos, length] => Ok(CopyOperands {
                src,
                src_pos,
                dst,
                dst_pos,
                length,
            }),
            _ => Err(LowerError::MalformedCandidate {
                target: invoke.target,
                found: invoke.args.len(),
            }),
        }
    }

    fn as_args(&self) -> Vec<ValueRef> {
        vec![self.src, self.src_pos, self.dst, self.dst_pos, self.length]
    }
}

/// The lowering pass. Borrows the reflection oracle for questions about
/// constant-folded operands and the type-flow analysis for everything else.
pub struct IntrinsicLowering<'a> {
    reflection: &'a dyn Reflection,
    type_flow: &'a dyn TypeFlow,
}

impl<'a> IntrinsicLowering<'a> {
    pub fn new(reflection: &'a dyn Reflection, type_flow: &'a dyn TypeFlow) -> Self {
        IntrinsicLowering {
            reflection,
            type_flow,
        }
    }

    /// Rewrites every candidate call in the graph. Returns how many sites
    /// were rewritten; a second run over the same graph returns zero.
    pub fn lower_graph(&self, graph: &mut Graph) -> Result<usize, LowerError> {
        let mut rewritten = 0;
        for id in graph.node_ids() {
            let is_candidate = matches!(
                graph.node(id),
                Some(Node::Invoke(invoke)) if invoke.target == ARRAYCOPY
            );
            if is_candidate && self.lower_call(id, graph)? {
                rewritten += 1;
            }
        }
        Ok(rewritten)
    }

    /// Rewrites a single call node. Returns `Ok(false)` when the call targets
    /// something other than the generic copy entry point.
    pub fn lower_call(&self, id: NodeId, graph: &mut Graph) -> Result<bool, LowerError> {
        let invoke = match graph.node(id) {
            Some(Node::Invoke(invoke)) => invoke,
            _ => return Err(LowerError::NotAnInvoke),
        };
        if invoke.target != ARRAYCOPY {
            return Ok(false);
        }
        let operands = CopyOperands::from_invoke(invoke)?;

        let src_type = self.descriptor_for(operands.src);
        let dst_type = self.descriptor_for(operands.dst);
        let facts = OperandFacts {
            src_non_null: self.proven_non_null(operands.src),
            dst_non_null: self.proven_non_null(operands.dst),
            bounds_proven: self.type_flow.copy_bounds_proven(
                operands.src_pos,
                operands.dst_pos,
                operands.length,
            ),
        };
        let plan = planner::plan(self.reflection, src_type.as_ref(), dst_type.as_ref(), &facts);

        let replacement = if plan.is_fallback() {
            vec![Node::Invoke(InvokeNode {
                target: ARRAYCOPY_STUB,
                args: operands.as_args(),
            })]
        } else {
            Self::specialized_nodes(&plan, &operands)
        };
        graph.replace_with(id, replacement);
        Ok(true)
    }

    /// Guards in checking order, then the copy primitive.
    fn specialized_nodes(plan: &CopyPlan, ops: &CopyOperands) -> Vec<Node> {
        let mut nodes = Vec::new();
        if plan.null_check_src {
            nodes.push(guard(
                GuardCheck::NonNull { value: ops.src },
                DeoptReason::NullPointer,
            ));
        }
        if plan.null_check_dst {
            nodes.push(guard(
                GuardCheck::NonNull { value: ops.dst },
                DeoptReason::NullPointer,
            ));
        }
        if plan.array_type_check {
            for value in [ops.src, ops.dst] {
                nodes.push(guard(
                    GuardCheck::ArrayKind {
                        value,
                        kind: plan.element_kind,
                    },
                    DeoptReason::ArrayKindMismatch,
                ));
            }
        }
        if plan.bounds_check {
            nodes.push(guard(
                GuardCheck::CopyBounds {
                    array: ops.src,
                    pos: ops.src_pos,
                    length: ops.length,
                },
                DeoptReason::BoundsCheckFailed,
            ));
            nodes.push(guard(
                GuardCheck::CopyBounds {
                    array: ops.dst,
                    pos: ops.dst_pos,
                    length: ops.length,
                },
                DeoptReason::BoundsCheckFailed,
            ));
        }
        nodes.push(Node::ArrayCopy(ArrayCopyNode {
            kind: plan.element_kind,
            check_store: plan.store_check,
            src: ops.src,
            src_pos: ops.src_pos,
            dst: ops.dst,
            dst_pos: ops.dst_pos,
            length: ops.length,
        }));
        nodes
    }

    /// Static array type of an operand. A constant-folded operand is the
    /// strongest source: the oracle reports its runtime array class exactly.
    fn descriptor_for(&self, value: ValueRef) -> Option<ArrayTypeDescriptor> {
        if let Some(Constant::Object(obj)) = self.type_flow.constant_value(value) {
            let kind = self.reflection.array_element_kind(obj.handle())?;
            return Some(if kind.is_primitive() {
                ArrayTypeDescriptor::primitive(kind)
            } else {
                let component = self.reflection.array_component(obj.handle())?;
                ArrayTypeDescriptor::object(component, true)
            });
        }
        self.type_flow.array_type_of(value)
    }

    fn proven_non_null(&self, value: ValueRef) -> bool {
        if self.type_flow.is_non_null(value) {
            return true;
        }
        // Object constants denote live objects; only Constant::Null is null.
        matches!(
            self.type_flow.constant_value(value),
            Some(Constant::Object(_))
        )
    }
}

fn guard(check: GuardCheck, reason: DeoptReason) -> Node {
    Node::Guard(GuardNode {
        check,
        on_failure: DeoptAction { reason },
    })
}
