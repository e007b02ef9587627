//! AST node model.
//!
//! Nodes live in a flat arena (`Ast`) addressed by `NodeId` rather than as an
//! owned tree with back-references, so that the "parent" link required for
//! lexical-scope walks doesn't create a reference cycle. This is Design Notes
//! option (a): an arena plus a parallel `parent_of` array, populated by
//! `set_parents` once parsing is complete.

mod node;
mod walk;

pub use node::{BinaryOp, Node, UnaryOp};
pub use walk::{Order, Visitor};

use crate::value::Number;

/// Identifies a node inside an [`Ast`] arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);

impl NodeId {
    fn new(index: usize) -> Self {
        Self(u32::try_from(index).expect("AST arena exceeds u32::MAX nodes"))
    }

    /// Crate-internal escape hatch for passes that must iterate every arena slot
    /// directly (the compiler's reversal pass) rather than reach a node through a
    /// walk or a stored child reference.
    pub(crate) fn from_raw(index: usize) -> Self {
        Self::new(index)
    }

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A parsed program: a node arena plus parent back-references.
///
/// The root is always index 0 and is a `Node::Stmts`.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<Node>,
    parent_of: Vec<Option<NodeId>>,
}

impl Ast {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a node into the arena and returns its id.
    pub fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        self.nodes.push(node);
        self.parent_of.push(None);
        id
    }

    #[must_use]
    pub fn get(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    /// Used only by the compiler's reversal pass (spec.md §4.1 pass 4), which
    /// needs to mutate child order in place after parsing.
    pub fn get_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    #[must_use]
    pub fn root(&self) -> NodeId {
        NodeId::new(0)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    #[must_use]
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parent_of[id.index()]
    }

    /// Climbs the parent chain until `predicate` holds, returning the first match.
    pub fn ancestor(&self, id: NodeId, predicate: impl Fn(NodeId, &Node) -> bool) -> Option<NodeId> {
        let mut cur = self.parent(id);
        while let Some(node_id) = cur {
            if predicate(node_id, self.get(node_id)) {
                return Some(node_id);
            }
            cur = self.parent(node_id);
        }
        None
    }

    /// Populates `parent_of` for every node reachable from the root.
    ///
    /// Must be called once, right after parsing, before any compiler pass runs.
    pub fn set_parents(&mut self) {
        let root = self.root();
        self.set_parents_from(root, None);
    }

    fn set_parents_from(&mut self, id: NodeId, parent: Option<NodeId>) {
        self.parent_of[id.index()] = parent;
        for child in self.get(id).children() {
            self.set_parents_from(child, Some(id));
        }
    }

    /// Walks the tree rooted at `id` in the given order, calling `visitor(node_id, depth)`.
    ///
    /// If the visitor returns `false`, that subtree is not recursed into further
    /// (matching the external parser/compiler contract's boolean-return convention).
    pub fn walk(&self, order: Order, id: NodeId, visitor: &mut impl Visitor) {
        walk::walk(self, order, id, 0, visitor);
    }

    #[must_use]
    pub fn number(&self, value: Number) -> Node {
        Node::Number { value }
    }
}
