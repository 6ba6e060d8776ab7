//! # ember: compiler-facing runtime interface for the Ember managed engine
//!
//! This crate is the boundary between the Ember engine's JIT compiler and the
//! host runtime it compiles against. It provides:
//!
//! - a deterministic mock of the host object world ([`Heap`]) with classes,
//!   instances, primitive and object arrays, and call-site objects;
//! - the reflection oracle ([`Reflection`]) through which the compiler asks
//!   every question about a live object;
//! - the constant model ([`Constant`], [`ObjectConstant`]): immutable
//!   compiler-visible views of runtime values, with explicit narrow/full-width
//!   representations and identity-based equality;
//! - the assumption ledger ([`Assumptions`]) recording the speculative facts
//!   a compilation folded on;
//! - the generic checked bulk-copy entry point
//!   ([`Heap::arraycopy_generic`]), the semantic baseline that the JIT's
//!   intrinsic lowering (in the `ember-jit` crate) specializes.
//!
//! The heap here is a test oracle, not a production allocator: it exists so
//! the compiler crates can be exercised deterministically without a live
//! runtime underneath.

pub mod assumptions;
pub mod constant;
pub mod error;
pub mod heap;
pub mod kind;
pub mod reflect;
pub mod value;

pub use assumptions::{Assumption, Assumptions};
pub use constant::{Constant, ObjectConstant, PrimitiveConstant};
pub use error::{ConstantError, HeapError, Trap};
pub use heap::{ClassId, FieldDecl, FieldId, Heap, ObjHandle, PrimArray};
pub use kind::ElementKind;
pub use reflect::Reflection;
pub use value::Slot;
