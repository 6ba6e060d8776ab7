use std::fmt;

/// The kind of value stored in an array cell, a field, or a constant.
///
/// The eight primitive kinds are storage-compatible only with themselves; a
/// bulk copy between arrays of two different kinds is never a single-width
/// move. `Object` covers every reference-typed cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementKind {
    Boolean,
    Byte,
    Char,
    Short,
    Int,
    Float,
    Long,
    Double,
    Object,
}

impl ElementKind {
    /// True for every kind except `Object`.
    pub fn is_primitive(self) -> bool {
        !matches!(self, ElementKind::Object)
    }

    /// Storage width of one element in bytes. References report the
    /// full-width (uncompressed) form.
    pub fn byte_width(self) -> usize {
        match self {
            ElementKind::Boolean | ElementKind::Byte => 1,
            ElementKind::Char | ElementKind::Short => 2,
            ElementKind::Int | ElementKind::Float => 4,
            ElementKind::Long | ElementKind::Double | ElementKind::Object => 8,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ElementKind::Boolean => "boolean",
            ElementKind::Byte => "byte",
            ElementKind::Char => "char",
            ElementKind::Short => "short",
            ElementKind::Int => "int",
            ElementKind::Float => "float",
            ElementKind::Long => "long",
            ElementKind::Double => "double",
            ElementKind::Object => "object",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
