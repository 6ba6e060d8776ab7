//! Errors raised by the lowering stage itself.
//!
//! These report malformed input graphs, a compiler bug upstream of this
//! stage. Runtime conditions (null operands, bad ranges, store conflicts) are
//! never lowering errors; they become guards or stay inside the generic
//! fallback.

use crate::graph::MethodRef;
use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LowerError {
    /// The node handed to `lower_call` is not a call at all.
    #[error("node is not a call")]
    NotAnInvoke,

    /// A candidate call does not have the five copy operands.
    #[error("call to {target} carries {found} arguments, expected 5")]
    MalformedCandidate { target: MethodRef, found: usize },
}
