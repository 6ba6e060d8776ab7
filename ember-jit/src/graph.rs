//! The IR graph this compiler stage operates on.
//!
//! Nodes live in an arena indexed by stable [`NodeId`]s; execution order is
//! an explicit schedule, so splicing a call site into a guard-plus-copy
//! sequence never invalidates other handles. Nodes are immutable once
//! created; rewrites remove and insert whole nodes.

use ember::kind::ElementKind;
use std::fmt;

/// Stable handle to a node in one [`Graph`]'s arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

/// A data value flowing into a node: an index into the frame's argument
/// slots. The surrounding pipeline owns richer value numbering; this stage
/// only needs to thread operands through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRef(pub u32);

/// Declaring class and name of a callee, as resolved by the frontend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MethodRef {
    pub class: &'static str,
    pub name: &'static str,
}

impl fmt::Display for MethodRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.class, self.name)
    }
}

/// A call to a resolved method.
#[derive(Debug, Clone, PartialEq)]
pub struct InvokeNode {
    pub target: MethodRef,
    pub args: Vec<ValueRef>,
}

/// Why a guard deoptimizes; also selects the failure signal the runtime
/// raises when the deoptimized re-execution reaches the same condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeoptReason {
    NullPointer,
    BoundsCheckFailed,
    ArrayKindMismatch,
}

/// The condition a guard asserts. Guards are safety gates: a failing guard
/// must route to `on_failure`, never fall through to the guarded operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardCheck {
    /// The reference is non-null.
    NonNull { value: ValueRef },
    /// The value is an array of the given element kind.
    ArrayKind { value: ValueRef, kind: ElementKind },
    /// `pos >= 0 && length >= 0 && pos + length <= array.length`.
    CopyBounds {
        array: ValueRef,
        pos: ValueRef,
        length: ValueRef,
    },
}

/// The declared deoptimize-or-fallback action of a guard. How the action is
/// executed belongs to the deoptimization infrastructure, not this stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeoptAction {
    pub reason: DeoptReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GuardNode {
    pub check: GuardCheck,
    pub on_failure: DeoptAction,
}

/// A specialized bulk copy over two arrays of one element kind. With
/// `check_store` set, every stored reference is re-checked against the
/// destination's runtime component type during the copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayCopyNode {
    pub kind: ElementKind,
    pub check_store: bool,
    pub src: ValueRef,
    pub src_pos: ValueRef,
    pub dst: ValueRef,
    pub dst_pos: ValueRef,
    pub length: ValueRef,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Invoke(InvokeNode),
    Guard(GuardNode),
    ArrayCopy(ArrayCopyNode),
}

impl Node {
    pub fn as_invoke(&self) -> Option<&InvokeNode> {
        match self {
            Node::Invoke(i) => Some(i),
            _ => None,
        }
    }
}

/// Arena-backed node graph with an explicit schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Graph {
    nodes: Vec<Option<Node>>,
    order: Vec<NodeId>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Some(node));
        id
    }

    /// Appends a node at the end of the schedule.
    pub fn add(&mut self, node: Node) -> NodeId {
        let id = self.alloc(node);
        self.order.push(id);
        id
    }

    /// Inserts a node immediately before `anchor` in the schedule.
    /// Returns `None` when the anchor is not scheduled.
    pub fn insert_before(&mut self, anchor: NodeId, node: Node) -> Option<NodeId> {
        let at = self.order.iter().position(|&n| n == anchor)?;
        let id = self.alloc(node);
        self.order.insert(at, id);
        Some(id)
    }

    /// Removes a node from the arena and the schedule.
    pub fn remove(&mut self, id: NodeId) -> Option<Node> {
        let at = self.order.iter().position(|&n| n == id)?;
        self.order.remove(at);
        self.nodes[id.0 as usize].take()
    }

    /// Splices `replacements` into the schedule at the position of `id`,
    /// removing `id`. Returns the new node ids in schedule order.
    pub fn replace_with(&mut self, id: NodeId, replacements: Vec<Node>) -> Option<Vec<NodeId>> {
        let at = self.order.iter().position(|&n| n == id)?;
        self.order.remove(at);
        self.nodes[id.0 as usize] = None;
        let ids: Vec<NodeId> = replacements.into_iter().map(|n| self.alloc(n)).collect();
        for (offset, &new_id) in ids.iter().enumerate() {
            self.order.insert(at + offset, new_id);
        }
        Some(ids)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)?.as_ref()
    }

    /// Number of live nodes. Lowering changes this; it is the only
    /// externally observable signal that a rewrite happened.
    pub fn node_count(&self) -> usize {
        self.order.len()
    }

    /// Live nodes in schedule order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.order.iter().filter_map(move |&id| {
            self.nodes[id.0 as usize].as_ref().map(|n| (id, n))
        })
    }

    /// Schedule snapshot, for rewrite loops that mutate while walking.
    pub fn node_ids(&self) -> Vec<NodeId> {
        self.order.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn invoke(name: &'static str) -> Node {
        Node::Invoke(InvokeNode {
            target: MethodRef {
                class: "T",
                name,
            },
            args: vec![],
        })
    }

    fn names(graph: &Graph) -> Vec<&'static str> {
        graph
            .iter()
            .filter_map(|(_, n)| n.as_invoke().map(|i| i.target.name))
            .collect()
    }

    #[test]
    fn add_and_iterate_in_order() {
        let mut g = Graph::new();
        g.add(invoke("a"));
        g.add(invoke("b"));
        assert_eq!(g.node_count(), 2);
        assert_eq!(names(&g), ["a", "b"]);
    }

    #[test]
    fn insert_before_keeps_schedule() {
        let mut g = Graph::new();
        g.add(invoke("a"));
        let c = g.add(invoke("c"));
        g.insert_before(c, invoke("b")).unwrap();
        assert_eq!(names(&g), ["a", "b", "c"]);
    }

    #[test]
    fn replace_with_splices_in_place() {
        let mut g = Graph::new();
        g.add(invoke("a"));
        let b = g.add(invoke("b"));
        g.add(invoke("d"));
        let new_ids = g
            .replace_with(b, vec![invoke("b1"), invoke("b2")])
            .unwrap();
        assert_eq!(new_ids.len(), 2);
        assert_eq!(names(&g), ["a", "b1", "b2", "d"]);
        assert_eq!(g.node(b), None);
    }

    #[test]
    fn remove_detaches_node() {
        let mut g = Graph::new();
        let a = g.add(invoke("a"));
        g.add(invoke("b"));
        assert!(g.remove(a).is_some());
        assert_eq!(g.node_count(), 1);
        assert_eq!(g.remove(a), None);
    }
}
