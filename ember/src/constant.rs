//! Compiler-visible constants.
//!
//! A constant is either a primitive value or an immutable view of a live
//! runtime object. Object constants carry their representation (narrow or
//! full-width) explicitly; the two forms of the same object interconvert only
//! through [`ObjectConstant::compress`] / [`ObjectConstant::uncompress`],
//! never implicitly.
//!
//! Equality policy: object constants are equal iff they denote the same
//! object identity *and* the same representation. A narrow and a full-width
//! constant for one object are two distinct constants. This is a deliberate
//! decision (representation is part of the constant, conversion is always an
//! explicit node in the program) and is pinned by a test below.

use crate::assumptions::{Assumption, Assumptions};
use crate::error::ConstantError;
use crate::heap::{ClassId, FieldId, ObjHandle};
use crate::kind::ElementKind;
use crate::reflect::Reflection;
use crate::value::Slot;
use std::fmt;

/// A primitive compile-time value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PrimitiveConstant {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
}

impl PrimitiveConstant {
    pub fn kind(&self) -> ElementKind {
        match self {
            PrimitiveConstant::Boolean(_) => ElementKind::Boolean,
            PrimitiveConstant::Byte(_) => ElementKind::Byte,
            PrimitiveConstant::Char(_) => ElementKind::Char,
            PrimitiveConstant::Short(_) => ElementKind::Short,
            PrimitiveConstant::Int(_) => ElementKind::Int,
            PrimitiveConstant::Float(_) => ElementKind::Float,
            PrimitiveConstant::Long(_) => ElementKind::Long,
            PrimitiveConstant::Double(_) => ElementKind::Double,
        }
    }
}

/// A constant non-null reference to a runtime object.
///
/// Identity lives in the handle; `compressed` selects the representation.
/// Derived equality and hashing therefore cover exactly the documented
/// policy: same handle, same representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectConstant {
    handle: ObjHandle,
    compressed: bool,
}

impl ObjectConstant {
    /// A full-width constant for the given object.
    pub fn new(handle: ObjHandle) -> Self {
        ObjectConstant {
            handle,
            compressed: false,
        }
    }

    pub fn handle(&self) -> ObjHandle {
        self.handle
    }

    pub fn is_compressed(&self) -> bool {
        self.compressed
    }

    /// The narrow form of the same object. Fails when the runtime has no
    /// narrow reference encoding, or when this constant is already narrow.
    pub fn compress(&self, oracle: &dyn Reflection) -> Result<ObjectConstant, ConstantError> {
        if self.compressed || !oracle.supports_narrow_refs() {
            return Err(ConstantError::InvalidRepresentation { requested: "narrow" });
        }
        Ok(ObjectConstant {
            handle: self.handle,
            compressed: true,
        })
    }

    /// The full-width form of the same object. Fails on an already-wide
    /// constant.
    pub fn uncompress(&self) -> Result<ObjectConstant, ConstantError> {
        if !self.compressed {
            return Err(ConstantError::InvalidRepresentation {
                requested: "full-width",
            });
        }
        Ok(ObjectConstant {
            handle: self.handle,
            compressed: false,
        })
    }

    /// Stable identity hash; a pure query against the runtime, reading no
    /// mutable object state.
    pub fn identity_hash_code(&self, oracle: &dyn Reflection) -> i32 {
        oracle.identity_hash_code(self.handle)
    }

    pub fn runtime_class(&self, oracle: &dyn Reflection) -> ClassId {
        oracle.class_of(self.handle)
    }

    /// Materializes a field of the referenced object as a constant.
    ///
    /// Only effectively-final (stable) fields may be folded through a plain
    /// read; volatile fields additionally require the read itself to be
    /// volatile-aware. Anything else could observe a data race and is
    /// rejected.
    pub fn read_field_value(
        &self,
        field: FieldId,
        is_volatile: bool,
        oracle: &dyn Reflection,
    ) -> Result<Constant, ConstantError> {
        let decl = oracle
            .field_decl(field)
            .ok_or_else(|| ConstantError::NoSuchField {
                field: format!("{}#{}", field.class.0, field.index),
            })?;
        let foldable = decl.stable || (decl.volatile && is_volatile);
        if !foldable {
            return Err(ConstantError::UnstableField {
                field: decl.name.clone(),
            });
        }
        let slot = oracle
            .read_field(self.handle, field)
            .ok_or_else(|| ConstantError::NoSuchField {
                field: decl.name.clone(),
            })?;
        Ok(Constant::from_slot(slot))
    }

    /// Resolves the target of a call-site-like object.
    ///
    /// For constant call sites the target is intrinsically fixed and returned
    /// directly. For mutable call sites the returned target is only a
    /// speculation: it is recorded into the supplied ledger first, and when no
    /// ledger is available the optimization is unavailable and no value is
    /// returned. Non-call-site objects yield no value.
    pub fn call_site_target(
        &self,
        oracle: &dyn Reflection,
        assumptions: Option<&mut Assumptions>,
    ) -> Option<Constant> {
        if !oracle.is_call_site(self.handle) {
            return None;
        }
        let target = match oracle.call_site_target(self.handle) {
            Some(t) => Constant::object(t),
            None => Constant::Null,
        };
        if !oracle.is_constant_call_site(self.handle) {
            let ledger = assumptions?;
            ledger.record(Assumption::CallSiteTargetValue {
                call_site: *self,
                target: target.clone(),
            });
        }
        Some(target)
    }
}

/// A compile-time value of any kind.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Primitive(PrimitiveConstant),
    Object(ObjectConstant),
    /// The null reference constant (object kind, no identity).
    Null,
}

impl Constant {
    pub fn object(handle: ObjHandle) -> Self {
        Constant::Object(ObjectConstant::new(handle))
    }

    pub fn kind(&self) -> ElementKind {
        match self {
            Constant::Primitive(p) => p.kind(),
            Constant::Object(_) | Constant::Null => ElementKind::Object,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Constant::Null)
    }

    pub fn from_slot(slot: Slot) -> Self {
        match slot {
            Slot::Boolean(x) => Constant::Primitive(PrimitiveConstant::Boolean(x)),
            Slot::Byte(x) => Constant::Primitive(PrimitiveConstant::Byte(x)),
            Slot::Char(x) => Constant::Primitive(PrimitiveConstant::Char(x)),
            Slot::Short(x) => Constant::Primitive(PrimitiveConstant::Short(x)),
            Slot::Int(x) => Constant::Primitive(PrimitiveConstant::Int(x)),
            Slot::Float(x) => Constant::Primitive(PrimitiveConstant::Float(x)),
            Slot::Long(x) => Constant::Primitive(PrimitiveConstant::Long(x)),
            Slot::Double(x) => Constant::Primitive(PrimitiveConstant::Double(x)),
            Slot::Ref(Some(h)) => Constant::object(h),
            Slot::Ref(None) => Constant::Null,
        }
    }

    fn conversion_error(&self, requested: &'static str) -> ConstantError {
        ConstantError::InvalidConversion {
            kind: self.kind(),
            requested,
        }
    }

    /// Reads an int-kind constant; any other kind fails, including object
    /// constants. No silent coercion of narrower kinds either.
    pub fn as_int(&self) -> Result<i32, ConstantError> {
        match self {
            Constant::Primitive(PrimitiveConstant::Int(x)) => Ok(*x),
            other => Err(other.conversion_error("int")),
        }
    }

    pub fn as_boolean(&self) -> Result<bool, ConstantError> {
        match self {
            Constant::Primitive(PrimitiveConstant::Boolean(x)) => Ok(*x),
            other => Err(other.conversion_error("boolean")),
        }
    }

    pub fn as_long(&self) -> Result<i64, ConstantError> {
        match self {
            Constant::Primitive(PrimitiveConstant::Long(x)) => Ok(*x),
            other => Err(other.conversion_error("long")),
        }
    }

    pub fn as_float(&self) -> Result<f32, ConstantError> {
        match self {
            Constant::Primitive(PrimitiveConstant::Float(x)) => Ok(*x),
            other => Err(other.conversion_error("float")),
        }
    }

    pub fn as_double(&self) -> Result<f64, ConstantError> {
        match self {
            Constant::Primitive(PrimitiveConstant::Double(x)) => Ok(*x),
            other => Err(other.conversion_error("double")),
        }
    }

    /// The object constant inside, for object-kind non-null constants.
    pub fn as_object(&self) -> Result<ObjectConstant, ConstantError> {
        match self {
            Constant::Object(o) => Ok(*o),
            other => Err(other.conversion_error("object")),
        }
    }
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Primitive(p) => match p {
                PrimitiveConstant::Boolean(x) => write!(f, "{x}"),
                PrimitiveConstant::Byte(x) => write!(f, "{x}"),
                PrimitiveConstant::Char(x) => write!(f, "{x}"),
                PrimitiveConstant::Short(x) => write!(f, "{x}"),
                PrimitiveConstant::Int(x) => write!(f, "{x}"),
                PrimitiveConstant::Float(x) => write!(f, "{x}"),
                PrimitiveConstant::Long(x) => write!(f, "{x}"),
                PrimitiveConstant::Double(x) => write!(f, "{x}"),
            },
            Constant::Object(o) if o.is_compressed() => write!(f, "Narrow[#{}]", o.handle().0),
            Constant::Object(o) => write!(f, "Object[#{}]", o.handle().0),
            Constant::Null => f.write_str("null"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::heap::{FieldDecl, Heap};

    #[test]
    fn primitive_accessors_reject_object_constants() {
        let mut heap = Heap::new();
        let class = heap.object_class();
        let obj = Constant::object(heap.alloc_instance(class));
        assert_eq!(
            obj.as_int(),
            Err(ConstantError::InvalidConversion {
                kind: ElementKind::Object,
                requested: "int",
            })
        );
        assert!(obj.as_boolean().is_err());
        assert!(obj.as_long().is_err());
        assert!(obj.as_float().is_err());
        assert!(obj.as_double().is_err());
    }

    #[test]
    fn no_silent_widening_between_primitive_kinds() {
        let byte = Constant::Primitive(PrimitiveConstant::Byte(7));
        assert!(byte.as_int().is_err());
        assert_eq!(
            Constant::Primitive(PrimitiveConstant::Int(7)).as_int(),
            Ok(7)
        );
    }

    #[test]
    fn compress_uncompress_round_trip() {
        let mut heap = Heap::new();
        let class = heap.object_class();
        let wide = ObjectConstant::new(heap.alloc_instance(class));
        let narrow = wide.compress(&heap).unwrap();
        assert!(narrow.is_compressed());
        assert_eq!(narrow.handle(), wide.handle());
        assert_eq!(narrow.uncompress().unwrap(), wide);
        // Converting a form onto itself is an error, not a no-op.
        assert!(narrow.compress(&heap).is_err());
        assert!(wide.uncompress().is_err());
    }

    #[test]
    fn compress_fails_without_narrow_reference_support() {
        let mut heap = Heap::without_narrow_refs();
        let class = heap.object_class();
        let wide = ObjectConstant::new(heap.alloc_instance(class));
        assert_eq!(
            wide.compress(&heap),
            Err(ConstantError::InvalidRepresentation { requested: "narrow" })
        );
    }

    #[test]
    fn equality_is_identity_plus_representation() {
        let mut heap = Heap::new();
        let class = heap.object_class();
        let a = ObjectConstant::new(heap.alloc_instance(class));
        let b = ObjectConstant::new(heap.alloc_instance(class));

        // Same identity, same form: equal.
        assert_eq!(a, ObjectConstant::new(a.handle()));
        // Different identity: never equal.
        assert_ne!(a, b);
        // Same identity, different compression form: distinct constants.
        let narrow = a.compress(&heap).unwrap();
        assert_ne!(a, narrow);
        assert_eq!(narrow.uncompress().unwrap(), a);
    }

    #[test]
    fn identity_hash_matches_oracle_and_is_form_independent() {
        let mut heap = Heap::new();
        let class = heap.object_class();
        let wide = ObjectConstant::new(heap.alloc_instance(class));
        let narrow = wide.compress(&heap).unwrap();
        assert_eq!(
            wide.identity_hash_code(&heap),
            narrow.identity_hash_code(&heap)
        );
    }

    #[test]
    fn stable_field_reads_fold() {
        let mut heap = Heap::new();
        let object = heap.object_class();
        let holder = heap.define_class_with_fields(
            "Holder",
            Some(object),
            vec![
                FieldDecl::stable("bound"),
                FieldDecl::mutable("counter"),
                FieldDecl::volatile("flag"),
            ],
        );
        let bound = heap.resolve_field(holder, "bound").unwrap();
        let counter = heap.resolve_field(holder, "counter").unwrap();
        let flag = heap.resolve_field(holder, "flag").unwrap();
        let obj = heap.alloc_instance(holder);
        heap.set_field(obj, bound, Slot::Int(99)).unwrap();
        heap.set_field(obj, flag, Slot::Boolean(true)).unwrap();

        let c = ObjectConstant::new(obj);
        assert_eq!(
            c.read_field_value(bound, false, &heap).unwrap().as_int(),
            Ok(99)
        );
        // Plain read of a mutable field could observe a race.
        assert_eq!(
            c.read_field_value(counter, false, &heap),
            Err(ConstantError::UnstableField {
                field: "counter".to_string()
            })
        );
        // Volatile fields fold only through a volatile-aware read.
        assert!(c.read_field_value(flag, false, &heap).is_err());
        assert_eq!(
            c.read_field_value(flag, true, &heap).unwrap().as_boolean(),
            Ok(true)
        );
    }

    #[test]
    fn null_field_reads_materialize_the_null_constant() {
        let mut heap = Heap::new();
        let object = heap.object_class();
        let holder =
            heap.define_class_with_fields("Holder", Some(object), vec![FieldDecl::stable("next")]);
        let next = heap.resolve_field(holder, "next").unwrap();
        let obj = heap.alloc_instance(holder);
        let c = ObjectConstant::new(obj);
        assert_eq!(c.read_field_value(next, false, &heap), Ok(Constant::Null));
    }

    #[test]
    fn display_distinguishes_representations() {
        let mut heap = Heap::new();
        let class = heap.object_class();
        let wide = ObjectConstant::new(heap.alloc_instance(class));
        let narrow = wide.compress(&heap).unwrap();
        assert!(Constant::Object(wide).to_string().starts_with("Object["));
        assert!(Constant::Object(narrow).to_string().starts_with("Narrow["));
        assert_eq!(Constant::Null.to_string(), "null");
    }
}
