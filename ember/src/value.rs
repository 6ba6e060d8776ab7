use crate::heap::ObjHandle;
use crate::kind::ElementKind;

/// A runtime value occupying one frame slot or one array cell.
///
/// `Ref(None)` is the null reference. Wide primitives (`Long`, `Double`) are
/// still one slot here; the mock heap does not model split slots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Slot {
    Boolean(bool),
    Byte(i8),
    Char(u16),
    Short(i16),
    Int(i32),
    Float(f32),
    Long(i64),
    Double(f64),
    Ref(Option<ObjHandle>),
}

impl Slot {
    pub fn kind(&self) -> ElementKind {
        match self {
            Slot::Boolean(_) => ElementKind::Boolean,
            Slot::Byte(_) => ElementKind::Byte,
            Slot::Char(_) => ElementKind::Char,
            Slot::Short(_) => ElementKind::Short,
            Slot::Int(_) => ElementKind::Int,
            Slot::Float(_) => ElementKind::Float,
            Slot::Long(_) => ElementKind::Long,
            Slot::Double(_) => ElementKind::Double,
            Slot::Ref(_) => ElementKind::Object,
        }
    }

    /// The reference payload, if this slot holds a reference.
    pub fn as_reference(&self) -> Option<Option<ObjHandle>> {
        match self {
            Slot::Ref(r) => Some(*r),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Slot::Ref(None))
    }

    /// Null reference slot.
    pub const fn null() -> Self {
        Slot::Ref(None)
    }
}

impl From<ObjHandle> for Slot {
    fn from(handle: ObjHandle) -> Self {
        Slot::Ref(Some(handle))
    }
}
