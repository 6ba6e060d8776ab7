use crate::kind::ElementKind;
use thiserror::Error;

/// Runtime failure signal raised by a guard or by the generic bulk-copy entry
/// point.
///
/// A trap is the *expected* runtime-detected outcome of a violated check; it
/// routes to deoptimization or the engine's exception machinery and is never a
/// compile-time error. `ArrayStore` and `IncompatibleArrays` both surface as
/// the engine's store-type exception; they are kept apart so tests can tell a
/// per-element store failure from an operand-level kind mismatch.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trap {
    #[error("null array operand")]
    NullPointer,

    #[error("copy range out of bounds")]
    IndexOutOfBounds,

    #[error("incompatible element store at index {index}")]
    ArrayStore { index: i32 },

    #[error("operands are not arrays of a common element kind")]
    IncompatibleArrays,
}

/// Misuse of the constant model, surfaced immediately to the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConstantError {
    /// A primitive accessor was invoked on a constant of the wrong kind.
    #[error("cannot read a {kind} constant as {requested}")]
    InvalidConversion {
        kind: ElementKind,
        requested: &'static str,
    },

    /// The constant has no narrow (or no wide) representation to convert to.
    #[error("constant has no {requested} representation")]
    InvalidRepresentation { requested: &'static str },

    /// A compile-time field read would observe state that may still change.
    #[error("field `{field}` is not stable enough to fold at compile time")]
    UnstableField { field: String },

    /// The named field does not exist on the object's class.
    #[error("no field {field} on the receiver's class")]
    NoSuchField { field: String },
}

/// Misuse of a heap handle (wrong object shape for the requested operation).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HeapError {
    #[error("object is not a call site")]
    NotACallSite,

    #[error("object is not an array")]
    NotAnArray,

    #[error("no such field on the object's class")]
    BadField,
}
