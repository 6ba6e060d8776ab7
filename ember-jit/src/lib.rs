//! # ember-jit: intrinsic lowering for the Ember compiler
//!
//! This crate rewrites calls to the runtime's generic bulk-copy entry point
//! into guarded, specialized copy primitives, planned from whatever static
//! type information the compilation has. The moving parts:
//!
//! - [`graph`]: the small IR the rewrite operates on (calls, guards,
//!   specialized copies) with an explicit schedule;
//! - [`types`]: the [`TypeFlow`](types::TypeFlow) query surface onto the
//!   surrounding type analysis, plus a table-backed implementation for tests;
//! - [`planner`]: picks the most specialized copy strategy that is provably
//!   sound, degrading to a generic fallback when facts run out;
//! - [`lower`]: splices the planned guards and copy (or the fallback stub)
//!   into the graph, idempotently;
//! - [`verify`]: the post-lowering invariant that only sanctioned calls
//!   survive;
//! - [`exec`]: reference execution against the mock heap, used to pin the
//!   rewrite to the generic semantics;
//! - [`artifact`]: a lowered graph bundled with the assumption ledger it
//!   speculated on.

pub mod artifact;
pub mod error;
pub mod exec;
pub mod graph;
pub mod lower;
pub mod planner;
pub mod types;
pub mod verify;

pub use artifact::Artifact;
pub use error::LowerError;
pub use exec::{execute, ExecError};
pub use graph::{
    ArrayCopyNode, DeoptAction, DeoptReason, Graph, GuardCheck, GuardNode, InvokeNode, MethodRef,
    Node, NodeId, ValueRef,
};
pub use lower::{CopyOperands, IntrinsicLowering, ARRAYCOPY, ARRAYCOPY_STUB};
pub use planner::{plan, CopyPlan, CopyStrategy, OperandFacts};
pub use types::{ArrayTypeDescriptor, TypeFacts, TypeFlow};
pub use verify::{check_lowered, classify_invoke, InvariantViolation, InvokeKind};
