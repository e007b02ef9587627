use super::{Ast, Node, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Pre,
    Post,
}

/// Receives `(node_id, depth)` during a walk. Returning `false` prunes the subtree
/// rooted at this node (it still fires in post-order for the node itself if the
/// walk is post-order, matching the boolean-return contract of spec.md §4.5).
pub trait Visitor {
    fn visit(&mut self, ast: &Ast, id: NodeId, depth: usize) -> bool;
}

impl<F> Visitor for F
where
    F: FnMut(&Ast, NodeId, usize) -> bool,
{
    fn visit(&mut self, ast: &Ast, id: NodeId, depth: usize) -> bool {
        self(ast, id, depth)
    }
}

pub(super) fn walk(ast: &Ast, order: Order, id: NodeId, depth: usize, visitor: &mut impl Visitor) {
    match order {
        Order::Pre => {
            if !visitor.visit(ast, id, depth) {
                return;
            }
            for child in children_in_emission_order(ast.get(id)) {
                walk(ast, order, child, depth + 1, visitor);
            }
        }
        Order::Post => {
            for child in children_in_emission_order(ast.get(id)) {
                walk(ast, order, child, depth + 1, visitor);
            }
            visitor.visit(ast, id, depth);
        }
    }
}

fn children_in_emission_order(node: &Node) -> Vec<NodeId> {
    node.children()
}
