//! Static array-type facts consumed by the copy planner.
//!
//! The surrounding type-flow analysis owns the real inference; this stage
//! only asks for its conclusions through [`TypeFlow`]. Answers are assumed
//! sound: the analysis never claims more precision than it proved, and "don't
//! know" (`None`) is a valid, conservative answer that degrades planning to
//! the generic fallback rather than raising an error.

use crate::graph::ValueRef;
use ember::constant::Constant;
use ember::heap::ClassId;
use ember::kind::ElementKind;
use hashbrown::{HashMap, HashSet};

/// What static analysis proved about an array-typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayTypeDescriptor {
    pub kind: ElementKind,
    /// Upper bound on the component class; only meaningful for object arrays.
    pub component: Option<ClassId>,
    /// True when the runtime array class is known precisely, not just as an
    /// upper bound.
    pub exact: bool,
}

impl ArrayTypeDescriptor {
    /// A primitive array type. Primitive array classes have no subclasses,
    /// so the descriptor is exact.
    pub fn primitive(kind: ElementKind) -> Self {
        debug_assert!(kind.is_primitive());
        ArrayTypeDescriptor {
            kind,
            component: None,
            exact: true,
        }
    }

    /// A primitive array type recovered from an imprecise source (e.g. a
    /// receiver only known to be "some array of this kind"); the planner
    /// re-checks the kind at runtime.
    pub fn primitive_imprecise(kind: ElementKind) -> Self {
        debug_assert!(kind.is_primitive());
        ArrayTypeDescriptor {
            kind,
            component: None,
            exact: false,
        }
    }

    /// An object array with the given component-class bound.
    pub fn object(component: ClassId, exact: bool) -> Self {
        ArrayTypeDescriptor {
            kind: ElementKind::Object,
            component: Some(component),
            exact,
        }
    }

    /// An object array about whose component nothing is known.
    pub fn object_erased() -> Self {
        ArrayTypeDescriptor {
            kind: ElementKind::Object,
            component: None,
            exact: false,
        }
    }
}

/// Query interface onto the surrounding type-flow analysis.
pub trait TypeFlow {
    /// Static array type of a value, `None` when analysis could not narrow it.
    fn array_type_of(&self, value: ValueRef) -> Option<ArrayTypeDescriptor>;

    /// Whether the value is proven non-null.
    fn is_non_null(&self, _value: ValueRef) -> bool {
        false
    }

    /// Whether positions and length are proven in range for this copy site.
    /// Rare; the default keeps the bounds guard.
    fn copy_bounds_proven(
        &self,
        _src_pos: ValueRef,
        _dst_pos: ValueRef,
        _length: ValueRef,
    ) -> bool {
        false
    }

    /// The value folded to a compile-time constant, if it did.
    fn constant_value(&self, _value: ValueRef) -> Option<Constant> {
        None
    }
}

/// Table-backed [`TypeFlow`] used by compilations under test.
#[derive(Debug, Clone, Default)]
pub struct TypeFacts {
    arrays: HashMap<u32, ArrayTypeDescriptor>,
    non_null: HashSet<u32>,
    constants: HashMap<u32, Constant>,
    bounds_proven: bool,
}

impl TypeFacts {
    pub fn new() -> Self {
        TypeFacts::default()
    }

    pub fn set_array_type(&mut self, value: ValueRef, descriptor: ArrayTypeDescriptor) -> &mut Self {
        self.arrays.insert(value.0, descriptor);
        self
    }

    pub fn set_non_null(&mut self, value: ValueRef) -> &mut Self {
        self.non_null.insert(value.0);
        self
    }

    pub fn set_constant(&mut self, value: ValueRef, constant: Constant) -> &mut Self {
        self.constants.insert(value.0, constant);
        self
    }

    pub fn set_bounds_proven(&mut self, proven: bool) -> &mut Self {
        self.bounds_proven = proven;
        self
    }
}

impl TypeFlow for TypeFacts {
    fn array_type_of(&self, value: ValueRef) -> Option<ArrayTypeDescriptor> {
        self.arrays.get(&value.0).copied()
    }

    fn is_non_null(&self, value: ValueRef) -> bool {
        self.non_null.contains(&value.0)
    }

    fn copy_bounds_proven(
        &self,
        _src_pos: ValueRef,
        _dst_pos: ValueRef,
        _length: ValueRef,
    ) -> bool {
        self.bounds_proven
    }

    fn constant_value(&self, value: ValueRef) -> Option<Constant> {
        self.constants.get(&value.0).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_values_are_unknown() {
        let facts = TypeFacts::new();
        assert_eq!(facts.array_type_of(ValueRef(0)), None);
        assert!(!facts.is_non_null(ValueRef(0)));
        assert_eq!(facts.constant_value(ValueRef(0)), None);
    }

    #[test]
    fn recorded_facts_come_back() {
        let mut facts = TypeFacts::new();
        facts
            .set_array_type(ValueRef(0), ArrayTypeDescriptor::primitive(ElementKind::Int))
            .set_non_null(ValueRef(0));
        let desc = facts.array_type_of(ValueRef(0)).unwrap();
        assert_eq!(desc.kind, ElementKind::Int);
        assert!(desc.exact);
        assert!(facts.is_non_null(ValueRef(0)));
    }
}
