//! Mock host heap backing the constant model and the copy runtime.
//!
//! The real engine owns its objects; the compiler only ever sees opaque
//! handles and asks questions through the [`Reflection`](crate::reflect::Reflection)
//! oracle. This module provides a deterministic stand-in: a table of objects
//! indexed by stable handles, a single-supertype class registry, and the
//! generic checked bulk-copy entry point whose observable behavior every
//! specialized copy must reproduce.

use crate::error::{HeapError, Trap};
use crate::kind::ElementKind;
use crate::value::Slot;
use hashbrown::HashMap;

/// Opaque handle to a live runtime object. Identity is handle identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjHandle(pub(crate) u32);

/// Handle to a registered class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClassId(pub(crate) u32);

/// A field slot on a specific class. Lookup is by exact declaring class;
/// the mock heap does not model field inheritance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FieldId {
    pub class: ClassId,
    pub index: u32,
}

/// Declared shape of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDecl {
    pub name: String,
    /// Effectively-final: safe to fold at compile time.
    pub stable: bool,
    /// Declared volatile: foldable only through a volatile-aware read.
    pub volatile: bool,
}

impl FieldDecl {
    pub fn stable(name: &str) -> Self {
        FieldDecl {
            name: name.to_string(),
            stable: true,
            volatile: false,
        }
    }

    pub fn mutable(name: &str) -> Self {
        FieldDecl {
            name: name.to_string(),
            stable: false,
            volatile: false,
        }
    }

    pub fn volatile(name: &str) -> Self {
        FieldDecl {
            name: name.to_string(),
            stable: false,
            volatile: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ClassDecl {
    name: String,
    super_class: Option<ClassId>,
    fields: Vec<FieldDecl>,
}

/// Backing storage of one primitive array, one variant per element kind.
#[derive(Debug, Clone, PartialEq)]
pub enum PrimArray {
    Boolean(Vec<bool>),
    Byte(Vec<i8>),
    Char(Vec<u16>),
    Short(Vec<i16>),
    Int(Vec<i32>),
    Float(Vec<f32>),
    Long(Vec<i64>),
    Double(Vec<f64>),
}

impl PrimArray {
    pub fn kind(&self) -> ElementKind {
        match self {
            PrimArray::Boolean(_) => ElementKind::Boolean,
            PrimArray::Byte(_) => ElementKind::Byte,
            PrimArray::Char(_) => ElementKind::Char,
            PrimArray::Short(_) => ElementKind::Short,
            PrimArray::Int(_) => ElementKind::Int,
            PrimArray::Float(_) => ElementKind::Float,
            PrimArray::Long(_) => ElementKind::Long,
            PrimArray::Double(_) => ElementKind::Double,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimArray::Boolean(v) => v.len(),
            PrimArray::Byte(v) => v.len(),
            PrimArray::Char(v) => v.len(),
            PrimArray::Short(v) => v.len(),
            PrimArray::Int(v) => v.len(),
            PrimArray::Float(v) => v.len(),
            PrimArray::Long(v) => v.len(),
            PrimArray::Double(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, i: usize) -> Option<Slot> {
        match self {
            PrimArray::Boolean(v) => v.get(i).map(|x| Slot::Boolean(*x)),
            PrimArray::Byte(v) => v.get(i).map(|x| Slot::Byte(*x)),
            PrimArray::Char(v) => v.get(i).map(|x| Slot::Char(*x)),
            PrimArray::Short(v) => v.get(i).map(|x| Slot::Short(*x)),
            PrimArray::Int(v) => v.get(i).map(|x| Slot::Int(*x)),
            PrimArray::Float(v) => v.get(i).map(|x| Slot::Float(*x)),
            PrimArray::Long(v) => v.get(i).map(|x| Slot::Long(*x)),
            PrimArray::Double(v) => v.get(i).map(|x| Slot::Double(*x)),
        }
    }

    /// Writes one element; the slot kind must match the array kind.
    pub fn set(&mut self, i: usize, value: Slot) -> bool {
        match (self, value) {
            (PrimArray::Boolean(v), Slot::Boolean(x)) if i < v.len() => v[i] = x,
            (PrimArray::Byte(v), Slot::Byte(x)) if i < v.len() => v[i] = x,
            (PrimArray::Char(v), Slot::Char(x)) if i < v.len() => v[i] = x,
            (PrimArray::Short(v), Slot::Short(x)) if i < v.len() => v[i] = x,
            (PrimArray::Int(v), Slot::Int(x)) if i < v.len() => v[i] = x,
            (PrimArray::Float(v), Slot::Float(x)) if i < v.len() => v[i] = x,
            (PrimArray::Long(v), Slot::Long(x)) if i < v.len() => v[i] = x,
            (PrimArray::Double(v), Slot::Double(x)) if i < v.len() => v[i] = x,
            _ => return false,
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum HeapObject {
    Instance {
        class: ClassId,
        fields: Vec<Slot>,
    },
    PrimitiveArray {
        data: PrimArray,
    },
    ObjectArray {
        component: ClassId,
        elems: Vec<Option<ObjHandle>>,
    },
    /// A call-site-like object: an indirection whose target field resolves
    /// the actual callee. Constant call sites never change their target.
    CallSite {
        constant: bool,
        target: Option<ObjHandle>,
    },
}

/// The deterministic mock of the host runtime's object world.
///
/// Cloning a heap snapshots every object; tests use this to run a generic and
/// a specialized copy against identical initial states.
#[derive(Debug, Clone)]
pub struct Heap {
    classes: Vec<ClassDecl>,
    by_name: HashMap<String, ClassId>,
    objects: Vec<HeapObject>,
    narrow_refs: bool,
    object_class: ClassId,
    call_site_class: ClassId,
    constant_call_site_class: ClassId,
}

impl Heap {
    /// A heap on a configuration that supports narrow (compressed) references.
    pub fn new() -> Self {
        Self::with_narrow_refs(true)
    }

    /// A heap on a configuration without a narrow reference form; compressing
    /// a constant against this heap fails with `InvalidRepresentation`.
    pub fn without_narrow_refs() -> Self {
        Self::with_narrow_refs(false)
    }

    fn with_narrow_refs(narrow_refs: bool) -> Self {
        let mut heap = Heap {
            classes: Vec::new(),
            by_name: HashMap::new(),
            objects: Vec::new(),
            narrow_refs,
            object_class: ClassId(0),
            call_site_class: ClassId(0),
            constant_call_site_class: ClassId(0),
        };
        heap.object_class = heap.define_class("Object", None);
        heap.call_site_class = heap.define_class("CallSite", Some(heap.object_class));
        heap.constant_call_site_class =
            heap.define_class("ConstantCallSite", Some(heap.call_site_class));
        heap
    }

    pub fn supports_narrow_refs(&self) -> bool {
        self.narrow_refs
    }

    /// Root of the class hierarchy; every object array component is a subtype.
    pub fn object_class(&self) -> ClassId {
        self.object_class
    }

    pub fn define_class(&mut self, name: &str, super_class: Option<ClassId>) -> ClassId {
        self.define_class_with_fields(name, super_class, Vec::new())
    }

    pub fn define_class_with_fields(
        &mut self,
        name: &str,
        super_class: Option<ClassId>,
        fields: Vec<FieldDecl>,
    ) -> ClassId {
        let id = ClassId(self.classes.len() as u32);
        self.classes.push(ClassDecl {
            name: name.to_string(),
            super_class,
            fields,
        });
        self.by_name.insert(name.to_string(), id);
        id
    }

    pub fn class_by_name(&self, name: &str) -> Option<ClassId> {
        self.by_name.get(name).copied()
    }

    pub fn class_name(&self, class: ClassId) -> &str {
        &self.classes[class.0 as usize].name
    }

    /// Single-supertype subtype query; every class is a subtype of itself.
    pub fn is_subtype(&self, sub: ClassId, sup: ClassId) -> bool {
        let mut cursor = Some(sub);
        while let Some(c) = cursor {
            if c == sup {
                return true;
            }
            cursor = self.classes[c.0 as usize].super_class;
        }
        false
    }

    pub fn resolve_field(&self, class: ClassId, name: &str) -> Option<FieldId> {
        self.classes[class.0 as usize]
            .fields
            .iter()
            .position(|f| f.name == name)
            .map(|index| FieldId {
                class,
                index: index as u32,
            })
    }

    pub fn field_decl(&self, field: FieldId) -> Option<&FieldDecl> {
        self.classes
            .get(field.class.0 as usize)?
            .fields
            .get(field.index as usize)
    }

    fn alloc(&mut self, object: HeapObject) -> ObjHandle {
        let handle = ObjHandle(self.objects.len() as u32);
        self.objects.push(object);
        handle
    }

    /// Allocates an instance with all fields initialized to null.
    pub fn alloc_instance(&mut self, class: ClassId) -> ObjHandle {
        let field_count = self.classes[class.0 as usize].fields.len();
        self.alloc(HeapObject::Instance {
            class,
            fields: vec![Slot::null(); field_count],
        })
    }

    pub fn set_field(&mut self, obj: ObjHandle, field: FieldId, value: Slot) -> Result<(), HeapError> {
        match self.objects.get_mut(obj.0 as usize) {
            Some(HeapObject::Instance { class, fields })
                if *class == field.class && (field.index as usize) < fields.len() =>
            {
                fields[field.index as usize] = value;
                Ok(())
            }
            _ => Err(HeapError::BadField),
        }
    }

    pub fn field_value(&self, obj: ObjHandle, field: FieldId) -> Option<Slot> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::Instance { class, fields } if *class == field.class => {
                fields.get(field.index as usize).copied()
            }
            _ => None,
        }
    }

    pub fn alloc_primitive_array(&mut self, data: PrimArray) -> ObjHandle {
        self.alloc(HeapObject::PrimitiveArray { data })
    }

    /// Allocates an object array filled with nulls.
    pub fn alloc_object_array(&mut self, component: ClassId, length: usize) -> ObjHandle {
        self.alloc(HeapObject::ObjectArray {
            component,
            elems: vec![None; length],
        })
    }

    pub fn alloc_call_site(&mut self, constant: bool, target: Option<ObjHandle>) -> ObjHandle {
        self.alloc(HeapObject::CallSite { constant, target })
    }

    /// The external event that falsifies a recorded call-site speculation.
    /// Constant call sites reject retargeting.
    pub fn retarget_call_site(
        &mut self,
        site: ObjHandle,
        target: Option<ObjHandle>,
    ) -> Result<(), HeapError> {
        match self.objects.get_mut(site.0 as usize) {
            Some(HeapObject::CallSite {
                constant: false,
                target: t,
            }) => {
                *t = target;
                Ok(())
            }
            _ => Err(HeapError::NotACallSite),
        }
    }

    pub fn is_call_site(&self, obj: ObjHandle) -> bool {
        matches!(
            self.objects.get(obj.0 as usize),
            Some(HeapObject::CallSite { .. })
        )
    }

    pub fn is_constant_call_site(&self, obj: ObjHandle) -> bool {
        matches!(
            self.objects.get(obj.0 as usize),
            Some(HeapObject::CallSite { constant: true, .. })
        )
    }

    pub fn call_site_target(&self, obj: ObjHandle) -> Result<Option<ObjHandle>, HeapError> {
        match self.objects.get(obj.0 as usize) {
            Some(HeapObject::CallSite { target, .. }) => Ok(*target),
            _ => Err(HeapError::NotACallSite),
        }
    }

    /// Runtime class of any object. Arrays report the hierarchy root; their
    /// element typing is queried through the array accessors instead.
    pub fn class_of(&self, obj: ObjHandle) -> ClassId {
        match &self.objects[obj.0 as usize] {
            HeapObject::Instance { class, .. } => *class,
            HeapObject::PrimitiveArray { .. } | HeapObject::ObjectArray { .. } => self.object_class,
            HeapObject::CallSite { constant: true, .. } => self.constant_call_site_class,
            HeapObject::CallSite { constant: false, .. } => self.call_site_class,
        }
    }

    pub fn is_instance_of(&self, obj: ObjHandle, class: ClassId) -> bool {
        self.is_subtype(self.class_of(obj), class)
    }

    pub fn is_array(&self, obj: ObjHandle) -> bool {
        self.array_kind(obj).is_some()
    }

    /// Element kind of an array object, `None` for non-arrays.
    pub fn array_kind(&self, obj: ObjHandle) -> Option<ElementKind> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::PrimitiveArray { data } => Some(data.kind()),
            HeapObject::ObjectArray { .. } => Some(ElementKind::Object),
            _ => None,
        }
    }

    pub fn array_length(&self, obj: ObjHandle) -> Option<usize> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::PrimitiveArray { data } => Some(data.len()),
            HeapObject::ObjectArray { elems, .. } => Some(elems.len()),
            _ => None,
        }
    }

    /// Runtime component class of an object array.
    pub fn array_component(&self, obj: ObjHandle) -> Option<ClassId> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::ObjectArray { component, .. } => Some(*component),
            _ => None,
        }
    }

    pub fn prim_array(&self, obj: ObjHandle) -> Option<&PrimArray> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::PrimitiveArray { data } => Some(data),
            _ => None,
        }
    }

    pub fn object_array(&self, obj: ObjHandle) -> Option<&[Option<ObjHandle>]> {
        match self.objects.get(obj.0 as usize)? {
            HeapObject::ObjectArray { elems, .. } => Some(elems),
            _ => None,
        }
    }

    pub fn object_array_set(
        &mut self,
        obj: ObjHandle,
        index: usize,
        value: Option<ObjHandle>,
    ) -> Result<(), HeapError> {
        match self.objects.get_mut(obj.0 as usize) {
            Some(HeapObject::ObjectArray { elems, .. }) if index < elems.len() => {
                elems[index] = value;
                Ok(())
            }
            _ => Err(HeapError::NotAnArray),
        }
    }

    /// Identity hash of an object: stable for the object's lifetime, derived
    /// from the handle alone, never from mutable object state.
    pub fn identity_hash(&self, obj: ObjHandle) -> i32 {
        // Fibonacci hashing of the handle bits.
        (obj.0.wrapping_mul(0x9e37_79b9) ^ obj.0.rotate_left(16)) as i32
    }

    /// The generic bulk-copy entry point: the fully checked runtime semantics
    /// that intrinsic lowering replaces and that the fallback path re-enters.
    ///
    /// Check order matches the engine's library contract: null operands, then
    /// array-kind compatibility, then the copy range, then per-element store
    /// compatibility. A store failure leaves every element before the failing
    /// index written. Overlapping ranges behave as if the source range were
    /// staged before any write.
    pub fn arraycopy_generic(
        &mut self,
        src: Option<ObjHandle>,
        src_pos: i32,
        dst: Option<ObjHandle>,
        dst_pos: i32,
        length: i32,
    ) -> Result<(), Trap> {
        let (src, dst) = match (src, dst) {
            (Some(s), Some(d)) => (s, d),
            _ => return Err(Trap::NullPointer),
        };
        let (src_kind, dst_kind) = match (self.array_kind(src), self.array_kind(dst)) {
            (Some(s), Some(d)) => (s, d),
            _ => return Err(Trap::IncompatibleArrays),
        };
        if src_kind != dst_kind {
            return Err(Trap::IncompatibleArrays);
        }
        self.check_copy_bounds(src, src_pos, dst, dst_pos, length)?;
        if src_kind.is_primitive() {
            self.copy_primitive_unchecked(src, src_pos as usize, dst, dst_pos as usize, length as usize)
        } else {
            self.copy_object_staged(
                src,
                src_pos as usize,
                dst,
                dst_pos as usize,
                length as usize,
                true,
            )
        }
    }

    /// Specialized primitive copy: preconditions (non-null, matching kinds,
    /// in-range) are the lowering's responsibility; the guards it emitted must
    /// already have passed.
    pub fn arraycopy_primitive(
        &mut self,
        kind: ElementKind,
        src: ObjHandle,
        src_pos: i32,
        dst: ObjHandle,
        dst_pos: i32,
        length: i32,
    ) -> Result<(), Trap> {
        debug_assert_eq!(self.array_kind(src), Some(kind));
        debug_assert_eq!(self.array_kind(dst), Some(kind));
        if self.array_kind(src) != Some(kind) || self.array_kind(dst) != Some(kind) {
            return Err(Trap::IncompatibleArrays);
        }
        self.check_copy_bounds(src, src_pos, dst, dst_pos, length)?;
        self.copy_primitive_unchecked(src, src_pos as usize, dst, dst_pos as usize, length as usize)
    }

    /// Specialized reference copy. With `check_store` the destination's
    /// runtime component type re-checks every stored element; without it the
    /// planner has proven store compatibility statically.
    pub fn arraycopy_object(
        &mut self,
        src: ObjHandle,
        src_pos: i32,
        dst: ObjHandle,
        dst_pos: i32,
        length: i32,
        check_store: bool,
    ) -> Result<(), Trap> {
        if self.array_kind(src) != Some(ElementKind::Object)
            || self.array_kind(dst) != Some(ElementKind::Object)
        {
            return Err(Trap::IncompatibleArrays);
        }
        self.check_copy_bounds(src, src_pos, dst, dst_pos, length)?;
        self.copy_object_staged(
            src,
            src_pos as usize,
            dst,
            dst_pos as usize,
            length as usize,
            check_store,
        )
    }

    fn check_copy_bounds(
        &self,
        src: ObjHandle,
        src_pos: i32,
        dst: ObjHandle,
        dst_pos: i32,
        length: i32,
    ) -> Result<(), Trap> {
        let src_len = self.array_length(src).ok_or(Trap::IncompatibleArrays)? as i64;
        let dst_len = self.array_length(dst).ok_or(Trap::IncompatibleArrays)? as i64;
        let (src_pos, dst_pos, length) = (src_pos as i64, dst_pos as i64, length as i64);
        if src_pos < 0
            || dst_pos < 0
            || length < 0
            || src_pos + length > src_len
            || dst_pos + length > dst_len
        {
            return Err(Trap::IndexOutOfBounds);
        }
        Ok(())
    }

    fn copy_primitive_unchecked(
        &mut self,
        src: ObjHandle,
        src_pos: usize,
        dst: ObjHandle,
        dst_pos: usize,
        length: usize,
    ) -> Result<(), Trap> {
        // Stage the source range first so that src == dst with overlapping
        // ranges reads the pre-copy contents.
        let staged: Vec<Slot> = {
            let data = self.prim_array(src).ok_or(Trap::IncompatibleArrays)?;
            (src_pos..src_pos + length)
                .map(|i| data.get(i).ok_or(Trap::IndexOutOfBounds))
                .collect::<Result<_, _>>()?
        };
        let data = match self.objects.get_mut(dst.0 as usize) {
            Some(HeapObject::PrimitiveArray { data }) => data,
            _ => return Err(Trap::IncompatibleArrays),
        };
        for (i, slot) in staged.into_iter().enumerate() {
            if !data.set(dst_pos + i, slot) {
                return Err(Trap::IncompatibleArrays);
            }
        }
        Ok(())
    }

    fn copy_object_staged(
        &mut self,
        src: ObjHandle,
        src_pos: usize,
        dst: ObjHandle,
        dst_pos: usize,
        length: usize,
        check_store: bool,
    ) -> Result<(), Trap> {
        let staged: Vec<Option<ObjHandle>> = {
            let elems = self.object_array(src).ok_or(Trap::IncompatibleArrays)?;
            elems[src_pos..src_pos + length].to_vec()
        };
        let component = self.array_component(dst).ok_or(Trap::IncompatibleArrays)?;
        for (i, elem) in staged.into_iter().enumerate() {
            if check_store {
                if let Some(e) = elem {
                    if !self.is_instance_of(e, component) {
                        // Elements before the failing index stay written.
                        return Err(Trap::ArrayStore { index: i as i32 });
                    }
                }
            } else if cfg!(debug_assertions) {
                if let Some(e) = elem {
                    debug_assert!(
                        self.is_instance_of(e, component),
                        "store-check elision without static proof"
                    );
                }
            }
            match self.objects.get_mut(dst.0 as usize) {
                Some(HeapObject::ObjectArray { elems, .. }) if dst_pos + i < elems.len() => {
                    elems[dst_pos + i] = elem;
                }
                _ => return Err(Trap::IncompatibleArrays),
            }
        }
        Ok(())
    }
}

impl Default for Heap {
    fn default() -> Self {
        Heap::new()
    }
}
