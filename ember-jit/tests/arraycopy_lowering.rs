//! End-to-end lowering tests: every rewritten copy site must be observably
//! indistinguishable from the generic entry point it replaced, over both
//! final heap state and the failure raised.

use ember::constant::{Constant, ObjectConstant};
use ember::error::Trap;
use ember::heap::{Heap, ObjHandle, PrimArray};
use ember::kind::ElementKind;
use ember::value::Slot;
use ember_jit::exec::{execute, ExecError};
use ember_jit::graph::{Graph, GuardCheck, InvokeNode, Node, ValueRef};
use ember_jit::lower::{IntrinsicLowering, ARRAYCOPY, ARRAYCOPY_STUB};
use ember_jit::types::{ArrayTypeDescriptor, TypeFacts};
use ember_jit::verify::check_lowered;
use ember_jit::Artifact;

const SRC: ValueRef = ValueRef(0);
const SRC_POS: ValueRef = ValueRef(1);
const DST: ValueRef = ValueRef(2);
const DST_POS: ValueRef = ValueRef(3);
const LEN: ValueRef = ValueRef(4);

fn copy_call_graph() -> Graph {
    let mut graph = Graph::new();
    graph.add(Node::Invoke(InvokeNode {
        target: ARRAYCOPY,
        args: vec![SRC, SRC_POS, DST, DST_POS, LEN],
    }));
    graph
}

fn copy_args(
    src: Option<ObjHandle>,
    src_pos: i32,
    dst: Option<ObjHandle>,
    dst_pos: i32,
    length: i32,
) -> [Slot; 5] {
    [
        Slot::Ref(src),
        Slot::Int(src_pos),
        Slot::Ref(dst),
        Slot::Int(dst_pos),
        Slot::Int(length),
    ]
}

fn primitive_facts(kind: ElementKind) -> TypeFacts {
    let mut facts = TypeFacts::new();
    let desc = ArrayTypeDescriptor::primitive(kind);
    facts.set_array_type(SRC, desc).set_array_type(DST, desc);
    facts
}

/// Lowers a fresh candidate graph, verifies it, and executes it.
fn run_lowered(heap: &mut Heap, facts: &TypeFacts, args: &[Slot]) -> Result<(), ExecError> {
    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&*heap, facts)
        .lower_graph(&mut graph)
        .unwrap();
    check_lowered(&graph).unwrap();
    execute(&graph, heap, args)
}

/// Runs the same copy through the generic entry point and through lowering,
/// each against its own snapshot of `heap`, and demands identical outcomes.
/// Returns the two heaps for state comparison.
fn run_both(
    heap: &Heap,
    facts: &TypeFacts,
    src: Option<ObjHandle>,
    src_pos: i32,
    dst: Option<ObjHandle>,
    dst_pos: i32,
    length: i32,
) -> (Heap, Heap) {
    let mut generic_heap = heap.clone();
    let mut lowered_heap = heap.clone();
    let generic = generic_heap.arraycopy_generic(src, src_pos, dst, dst_pos, length);
    let lowered = run_lowered(
        &mut lowered_heap,
        facts,
        &copy_args(src, src_pos, dst, dst_pos, length),
    )
    .map_err(|e| match e {
        ExecError::Trap(t) => t,
        other => panic!("lowered execution failed structurally: {other}"),
    });
    assert_eq!(lowered, generic);
    (generic_heap, lowered_heap)
}

fn assert_prim_arrays_match(generic: &Heap, lowered: &Heap, arrays: &[ObjHandle]) {
    for &h in arrays {
        assert_eq!(generic.prim_array(h), lowered.prim_array(h));
    }
}

#[test]
fn lowering_replaces_the_call_and_changes_the_node_count() {
    let heap = Heap::new();
    let facts = primitive_facts(ElementKind::Int);
    let mut graph = copy_call_graph();
    assert_eq!(graph.node_count(), 1);
    let rewritten = IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    assert_eq!(rewritten, 1);
    // Two null guards, two bounds guards, one copy.
    assert_eq!(graph.node_count(), 5);
    assert!(graph.iter().all(|(_, n)| n.as_invoke().is_none()));
    check_lowered(&graph).unwrap();
}

#[test]
fn lowering_is_idempotent() {
    let heap = Heap::new();
    let facts = primitive_facts(ElementKind::Int);
    let lowering = IntrinsicLowering::new(&heap, &facts);
    let mut graph = copy_call_graph();
    lowering.lower_graph(&mut graph).unwrap();
    let snapshot = graph.clone();
    assert_eq!(lowering.lower_graph(&mut graph).unwrap(), 0);
    assert_eq!(graph, snapshot);
}

#[test]
fn verifier_rejects_an_unlowered_candidate() {
    let graph = copy_call_graph();
    let violation = check_lowered(&graph).unwrap_err();
    assert_eq!(violation.target, ARRAYCOPY);
}

#[test]
fn full_int_copy_matches_the_generic_path() {
    let mut heap = Heap::new();
    let data = [234, 5345, 756, 23, 8, 345, 873, 440];
    let src = heap.alloc_primitive_array(PrimArray::Int(data.to_vec()));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 8]));
    let facts = primitive_facts(ElementKind::Int);

    let (g, l) = run_both(&heap, &facts, Some(src), 0, Some(dst), 0, 8);
    assert_prim_arrays_match(&g, &l, &[src, dst]);
    assert_eq!(l.prim_array(dst), Some(&PrimArray::Int(data.to_vec())));
}

#[test]
fn every_primitive_kind_matches_the_generic_path() {
    let cases: Vec<(ElementKind, PrimArray, PrimArray)> = vec![
        (
            ElementKind::Boolean,
            PrimArray::Boolean(vec![true, false, true, true]),
            PrimArray::Boolean(vec![false; 4]),
        ),
        (
            ElementKind::Byte,
            PrimArray::Byte(vec![-8, 3, 120, -1]),
            PrimArray::Byte(vec![0; 4]),
        ),
        (
            ElementKind::Char,
            PrimArray::Char(vec![0x41, 0x2603, 0xffff, 7]),
            PrimArray::Char(vec![0; 4]),
        ),
        (
            ElementKind::Short,
            PrimArray::Short(vec![-300, 12, 32000, -4]),
            PrimArray::Short(vec![0; 4]),
        ),
        (
            ElementKind::Int,
            PrimArray::Int(vec![234, 5345, 756, 23]),
            PrimArray::Int(vec![0; 4]),
        ),
        (
            ElementKind::Float,
            PrimArray::Float(vec![1.5, -0.25, 3.0, 8.125]),
            PrimArray::Float(vec![0.0; 4]),
        ),
        (
            ElementKind::Long,
            PrimArray::Long(vec![1 << 40, -9, 873, 440]),
            PrimArray::Long(vec![0; 4]),
        ),
        (
            ElementKind::Double,
            PrimArray::Double(vec![2.75, -1e100, 0.5, 9.0]),
            PrimArray::Double(vec![0.0; 4]),
        ),
    ];
    for (kind, src_data, dst_data) in cases {
        let mut heap = Heap::new();
        let src = heap.alloc_primitive_array(src_data);
        let dst = heap.alloc_primitive_array(dst_data);
        let facts = primitive_facts(kind);
        let (g, l) = run_both(&heap, &facts, Some(src), 1, Some(dst), 0, 3);
        assert_prim_arrays_match(&g, &l, &[src, dst]);
    }
}

#[test]
fn null_operands_trap_like_the_generic_path() {
    let mut heap = Heap::new();
    let arr = heap.alloc_primitive_array(PrimArray::Int(vec![1, 2, 3]));
    let facts = primitive_facts(ElementKind::Int);

    let (g, l) = run_both(&heap, &facts, None, 0, Some(arr), 0, 1);
    assert_prim_arrays_match(&g, &l, &[arr]);
    let (g, l) = run_both(&heap, &facts, Some(arr), 0, None, 0, 1);
    assert_prim_arrays_match(&g, &l, &[arr]);

    // And the trap itself is the null one.
    let err = run_lowered(&mut heap, &facts, &copy_args(None, 0, Some(arr), 0, 1));
    assert_eq!(err, Err(ExecError::Trap(Trap::NullPointer)));
}

#[test]
fn bad_ranges_trap_before_any_write() {
    let mut heap = Heap::new();
    let data = [234, 5345, 756, 23, 8, 345, 873, 440];
    let src = heap.alloc_primitive_array(PrimArray::Int(data.to_vec()));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 8]));
    let facts = primitive_facts(ElementKind::Int);

    for (src_pos, dst_pos, length) in [(0, 0, -1), (0, 0, 9), (-1, 0, 2), (0, 7, 2)] {
        let (g, l) = run_both(&heap, &facts, Some(src), src_pos, Some(dst), dst_pos, length);
        assert_prim_arrays_match(&g, &l, &[src, dst]);
        assert_eq!(l.prim_array(dst), Some(&PrimArray::Int(vec![0; 8])));
    }
    let err = run_lowered(&mut heap, &facts, &copy_args(Some(src), 0, Some(dst), 0, -1));
    assert_eq!(err, Err(ExecError::Trap(Trap::IndexOutOfBounds)));
}

#[test]
fn overlapping_copies_read_the_pre_copy_source() {
    let mut heap = Heap::new();
    let forward = heap.alloc_primitive_array(PrimArray::Int(vec![1, 2, 3, 4, 5, 6, 7, 8]));
    let facts = primitive_facts(ElementKind::Int);
    let (g, l) = run_both(&heap, &facts, Some(forward), 0, Some(forward), 1, 7);
    assert_prim_arrays_match(&g, &l, &[forward]);
    assert_eq!(
        l.prim_array(forward),
        Some(&PrimArray::Int(vec![1, 1, 2, 3, 4, 5, 6, 7]))
    );

    let mut heap = Heap::new();
    let backward = heap.alloc_primitive_array(PrimArray::Int(vec![1, 2, 3, 4]));
    let (g, l) = run_both(&heap, &facts, Some(backward), 1, Some(backward), 0, 3);
    assert_prim_arrays_match(&g, &l, &[backward]);
    assert_eq!(l.prim_array(backward), Some(&PrimArray::Int(vec![2, 3, 4, 4])));
}

#[test]
fn kind_guard_catches_a_lying_imprecise_descriptor() {
    let mut heap = Heap::new();
    let src = heap.alloc_primitive_array(PrimArray::Byte(vec![1, 2, 3]));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 3]));

    // Analysis only knows "some array, probably of ints"; the runtime array
    // is actually a byte array and the kind guard must catch it.
    let mut facts = TypeFacts::new();
    let fuzzy = ArrayTypeDescriptor::primitive_imprecise(ElementKind::Int);
    facts.set_array_type(SRC, fuzzy).set_array_type(DST, fuzzy);

    let (g, l) = run_both(&heap, &facts, Some(src), 0, Some(dst), 0, 3);
    assert_prim_arrays_match(&g, &l, &[src, dst]);
    let err = run_lowered(&mut heap, &facts, &copy_args(Some(src), 0, Some(dst), 0, 3));
    assert_eq!(err, Err(ExecError::Trap(Trap::IncompatibleArrays)));
}

#[test]
fn store_failure_keeps_the_prefix_exactly_like_the_generic_path() {
    let mut heap = Heap::new();
    let object = heap.object_class();
    let seq = heap.define_class("CharSequence", Some(object));
    let string = heap.define_class("String", Some(seq));
    let list = heap.define_class("ArrayList", Some(object));
    let map = heap.define_class("HashMap", Some(object));

    let src = heap.alloc_object_array(object, 5);
    for (i, class) in [string, string, string, list, map].into_iter().enumerate() {
        let e = heap.alloc_instance(class);
        heap.object_array_set(src, i, Some(e)).unwrap();
    }
    let dst = heap.alloc_object_array(seq, 5);

    let mut facts = TypeFacts::new();
    facts
        .set_array_type(SRC, ArrayTypeDescriptor::object(object, false))
        .set_array_type(DST, ArrayTypeDescriptor::object(seq, false));

    let (g, l) = run_both(&heap, &facts, Some(src), 0, Some(dst), 0, 5);
    assert_eq!(g.object_array(dst), l.object_array(dst));
    let written = l.object_array(dst).unwrap();
    let source = l.object_array(src).unwrap();
    assert_eq!(&written[..3], &source[..3]);
    assert_eq!(written[3], None);

    let err = run_lowered(&mut heap, &facts, &copy_args(Some(src), 0, Some(dst), 0, 5));
    assert_eq!(err, Err(ExecError::Trap(Trap::ArrayStore { index: 3 })));
}

#[test]
fn exact_destination_elides_every_store_check() {
    let mut heap = Heap::new();
    let object = heap.object_class();
    let seq = heap.define_class("CharSequence", Some(object));
    let string = heap.define_class("String", Some(seq));

    let src = heap.alloc_object_array(string, 3);
    for i in 0..3 {
        let e = heap.alloc_instance(string);
        heap.object_array_set(src, i, Some(e)).unwrap();
    }
    let dst = heap.alloc_object_array(seq, 3);

    let mut facts = TypeFacts::new();
    facts
        .set_array_type(SRC, ArrayTypeDescriptor::object(string, false))
        .set_array_type(DST, ArrayTypeDescriptor::object(seq, true));

    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    let copy = graph
        .iter()
        .find_map(|(_, n)| match n {
            Node::ArrayCopy(c) => Some(*c),
            _ => None,
        })
        .unwrap();
    assert!(!copy.check_store);

    let (g, l) = run_both(&heap, &facts, Some(src), 0, Some(dst), 0, 3);
    assert_eq!(g.object_array(dst), l.object_array(dst));
    assert_eq!(l.object_array(dst), l.object_array(src));
}

#[test]
fn inexact_destination_keeps_a_store_checked_copy() {
    let heap = Heap::new();
    let object = heap.object_class();
    let mut facts = TypeFacts::new();
    facts
        .set_array_type(SRC, ArrayTypeDescriptor::object(object, false))
        .set_array_type(DST, ArrayTypeDescriptor::object(object, false));

    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    let copy = graph
        .iter()
        .find_map(|(_, n)| match n {
            Node::ArrayCopy(c) => Some(*c),
            _ => None,
        })
        .unwrap();
    assert!(copy.check_store);
}

#[test]
fn unknown_types_fall_back_to_the_stub_with_identical_semantics() {
    let mut heap = Heap::new();
    let data = [234, 5345, 756, 23, 8, 345, 873, 440];
    let src = heap.alloc_primitive_array(PrimArray::Int(data.to_vec()));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 8]));
    let facts = TypeFacts::new();

    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    check_lowered(&graph).unwrap();
    let (_, node) = graph.iter().next().unwrap();
    assert_eq!(node.as_invoke().unwrap().target, ARRAYCOPY_STUB);

    let (g, l) = run_both(&heap, &facts, Some(src), 2, Some(dst), 1, 4);
    assert_prim_arrays_match(&g, &l, &[src, dst]);
}

#[test]
fn constant_operands_elide_their_null_guards() {
    let mut heap = Heap::new();
    let src = heap.alloc_primitive_array(PrimArray::Int(vec![5, 6, 7]));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 3]));

    let mut facts = TypeFacts::new();
    facts
        .set_constant(SRC, Constant::object(src))
        .set_constant(DST, Constant::object(dst));

    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    let null_guards = graph
        .iter()
        .filter(|(_, n)| matches!(n, Node::Guard(g) if matches!(g.check, GuardCheck::NonNull { .. })))
        .count();
    assert_eq!(null_guards, 0);

    execute(&graph, &mut heap, &copy_args(Some(src), 0, Some(dst), 0, 3)).unwrap();
    assert_eq!(heap.prim_array(dst), Some(&PrimArray::Int(vec![5, 6, 7])));
}

#[test]
fn artifact_with_a_folded_call_site_invalidates_on_retarget() {
    let mut heap = Heap::new();
    let target = heap.alloc_call_site(false, None);
    let site_handle = heap.alloc_call_site(false, Some(target));
    let src = heap.alloc_primitive_array(PrimArray::Int(vec![1, 2, 3, 4]));
    let dst = heap.alloc_primitive_array(PrimArray::Int(vec![0; 4]));

    // A compilation that both lowers a copy and folds a call-site target.
    let facts = primitive_facts(ElementKind::Int);
    let mut graph = copy_call_graph();
    IntrinsicLowering::new(&heap, &facts)
        .lower_graph(&mut graph)
        .unwrap();
    let mut ledger = ember::Assumptions::new();
    ObjectConstant::new(site_handle)
        .call_site_target(&heap, Some(&mut ledger))
        .unwrap();
    let artifact = Artifact::with_assumptions(graph, ledger);

    assert!(artifact.is_valid(&heap));
    artifact
        .run(&mut heap, &copy_args(Some(src), 0, Some(dst), 0, 4))
        .unwrap();
    assert_eq!(heap.prim_array(dst), Some(&PrimArray::Int(vec![1, 2, 3, 4])));

    heap.retarget_call_site(site_handle, None).unwrap();
    assert!(!artifact.is_valid(&heap));
}
