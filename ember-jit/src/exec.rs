//! Reference execution of a graph against the mock heap.
//!
//! This is the semantic yardstick for lowering: a lowered graph executed here
//! must be observably indistinguishable from the generic copy it replaced,
//! over final heap state and over the failure raised. Guard failures raise
//! the failure signal their deoptimization reason names, which is exactly
//! what deoptimized re-execution would produce.

use crate::graph::{DeoptReason, Graph, GuardCheck, MethodRef, Node, ValueRef};
use crate::lower::{ARRAYCOPY, ARRAYCOPY_STUB};
use ember::error::Trap;
use ember::heap::{Heap, ObjHandle};
use ember::value::Slot;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ExecError {
    /// The runtime condition the program observed.
    #[error(transparent)]
    Trap(#[from] Trap),

    /// An operand index outside the argument frame, or a slot of the wrong
    /// kind for its use. A malformed graph, not a program condition.
    #[error("operand v{0} is missing or has the wrong kind")]
    BadOperand(u32),

    /// A call this executor has no definition for.
    #[error("no executable definition for {0}")]
    UnsupportedInvoke(MethodRef),
}

/// Runs `graph` top to bottom over `args`, mutating `heap`.
pub fn execute(graph: &Graph, heap: &mut Heap, args: &[Slot]) -> Result<(), ExecError> {
    for (_, node) in graph.iter() {
        match node {
            Node::Invoke(invoke) => {
                if invoke.target == ARRAYCOPY || invoke.target == ARRAYCOPY_STUB {
                    let [src, src_pos, dst, dst_pos, length] = invoke.args[..] else {
                        return Err(ExecError::UnsupportedInvoke(invoke.target));
                    };
                    heap.arraycopy_generic(
                        reference(args, src)?,
                        int(args, src_pos)?,
                        reference(args, dst)?,
                        int(args, dst_pos)?,
                        int(args, length)?,
                    )?;
                } else if let Some(trap) = exception_trap(invoke.target) {
                    return Err(trap.into());
                } else {
                    return Err(ExecError::UnsupportedInvoke(invoke.target));
                }
            }
            Node::Guard(g) => {
                if !check_holds(heap, args, g.check)? {
                    return Err(trap_for(g.on_failure.reason).into());
                }
            }
            Node::ArrayCopy(copy) => {
                // Null operands here mean an elided guard lacked its proof.
                let src = reference(args, copy.src)?.ok_or(Trap::NullPointer)?;
                let dst = reference(args, copy.dst)?.ok_or(Trap::NullPointer)?;
                let src_pos = int(args, copy.src_pos)?;
                let dst_pos = int(args, copy.dst_pos)?;
                let length = int(args, copy.length)?;
                if copy.kind.is_primitive() {
                    heap.arraycopy_primitive(copy.kind, src, src_pos, dst, dst_pos, length)?;
                } else {
                    heap.arraycopy_object(src, src_pos, dst, dst_pos, length, copy.check_store)?;
                }
            }
        }
    }
    Ok(())
}

/// A call that raises a runtime failure directly; emitted by rewrites on
/// paths proven to fail.
fn exception_trap(target: MethodRef) -> Option<Trap> {
    if target.name != "<init>" {
        return None;
    }
    match target.class {
        "NullPointerException" => Some(Trap::NullPointer),
        "ArrayIndexOutOfBoundsException" => Some(Trap::IndexOutOfBounds),
        "ArrayStoreException" => Some(Trap::ArrayStore { index: 0 }),
        _ => None,
    }
}

fn trap_for(reason: DeoptReason) -> Trap {
    match reason {
        DeoptReason::NullPointer => Trap::NullPointer,
        DeoptReason::BoundsCheckFailed => Trap::IndexOutOfBounds,
        DeoptReason::ArrayKindMismatch => Trap::IncompatibleArrays,
    }
}

fn check_holds(heap: &Heap, args: &[Slot], check: GuardCheck) -> Result<bool, ExecError> {
    Ok(match check {
        GuardCheck::NonNull { value } => reference(args, value)?.is_some(),
        GuardCheck::ArrayKind { value, kind } => match reference(args, value)? {
            Some(h) => heap.array_kind(h) == Some(kind),
            None => false,
        },
        GuardCheck::CopyBounds { array, pos, length } => {
            let (pos, length) = (int(args, pos)? as i64, int(args, length)? as i64);
            match reference(args, array)? {
                Some(h) => match heap.array_length(h) {
                    Some(len) => pos >= 0 && length >= 0 && pos + length <= len as i64,
                    None => false,
                },
                None => false,
            }
        }
    })
}

fn slot(args: &[Slot], value: ValueRef) -> Result<Slot, ExecError> {
    args.get(value.0 as usize)
        .copied()
        .ok_or(ExecError::BadOperand(value.0))
}

fn reference(args: &[Slot], value: ValueRef) -> Result<Option<ObjHandle>, ExecError> {
    slot(args, value)?
        .as_reference()
        .ok_or(ExecError::BadOperand(value.0))
}

fn int(args: &[Slot], value: ValueRef) -> Result<i32, ExecError> {
    match slot(args, value)? {
        Slot::Int(x) => Ok(x),
        _ => Err(ExecError::BadOperand(value.0)),
    }
}
