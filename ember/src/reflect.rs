//! The host-runtime reflection oracle.
//!
//! Everything the compiler learns about a live object flows through this
//! trait: identity hashes, class queries, field reads, call-site targets. The
//! answers are trusted; the compiler never touches object storage directly.
//! Passing the oracle explicitly (rather than a process-wide singleton) keeps
//! constant folding deterministic under test, with [`Heap`] as the standard
//! implementation.

use crate::heap::{ClassId, FieldDecl, FieldId, Heap, ObjHandle};
use crate::kind::ElementKind;
use crate::value::Slot;

pub trait Reflection {
    /// Stable identity hash, independent of mutable object state.
    fn identity_hash_code(&self, obj: ObjHandle) -> i32;

    /// Whether this runtime configuration has a narrow reference form.
    fn supports_narrow_refs(&self) -> bool;

    /// Runtime class of the object.
    fn class_of(&self, obj: ObjHandle) -> ClassId;

    fn is_subtype(&self, sub: ClassId, sup: ClassId) -> bool;

    fn is_call_site(&self, obj: ObjHandle) -> bool;

    /// A call site whose target is intrinsically fixed; reading its target
    /// requires no speculation.
    fn is_constant_call_site(&self, obj: ObjHandle) -> bool;

    /// Current target of a call-site object, `None` for the unlinked state.
    /// Callers must have established that `obj` is a call site.
    fn call_site_target(&self, obj: ObjHandle) -> Option<ObjHandle>;

    fn field_decl(&self, field: FieldId) -> Option<&FieldDecl>;

    /// Raw field read; stability/volatility policy is enforced by the
    /// constant model, not here.
    fn read_field(&self, obj: ObjHandle, field: FieldId) -> Option<Slot>;

    /// Element kind of an array object, `None` for non-arrays.
    fn array_element_kind(&self, obj: ObjHandle) -> Option<ElementKind>;

    /// Runtime component class of an object array.
    fn array_component(&self, obj: ObjHandle) -> Option<ClassId>;
}

impl Reflection for Heap {
    fn identity_hash_code(&self, obj: ObjHandle) -> i32 {
        self.identity_hash(obj)
    }

    fn supports_narrow_refs(&self) -> bool {
        Heap::supports_narrow_refs(self)
    }

    fn class_of(&self, obj: ObjHandle) -> ClassId {
        Heap::class_of(self, obj)
    }

    fn is_subtype(&self, sub: ClassId, sup: ClassId) -> bool {
        Heap::is_subtype(self, sub, sup)
    }

    fn is_call_site(&self, obj: ObjHandle) -> bool {
        Heap::is_call_site(self, obj)
    }

    fn is_constant_call_site(&self, obj: ObjHandle) -> bool {
        Heap::is_constant_call_site(self, obj)
    }

    fn call_site_target(&self, obj: ObjHandle) -> Option<ObjHandle> {
        Heap::call_site_target(self, obj).unwrap_or(None)
    }

    fn field_decl(&self, field: FieldId) -> Option<&FieldDecl> {
        Heap::field_decl(self, field)
    }

    fn read_field(&self, obj: ObjHandle, field: FieldId) -> Option<Slot> {
        self.field_value(obj, field)
    }

    fn array_element_kind(&self, obj: ObjHandle) -> Option<ElementKind> {
        self.array_kind(obj)
    }

    fn array_component(&self, obj: ObjHandle) -> Option<ClassId> {
        Heap::array_component(self, obj)
    }
}
