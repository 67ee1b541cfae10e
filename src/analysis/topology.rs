use crate::store::{DependencyGraph, NodeId, NodeKind};
use log::{debug, warn};

/// Orders the nodes the loss depends on for reverse-mode differentiation.
///
/// The walk is a depth-first search rooted at the loss node only, so nodes
/// the loss does not depend on never appear. Children finish before their
/// parent, and the result is the reverse of that finishing order: the loss comes
/// first and every node precedes all of its own operands.
///
/// Constants are skipped. A node that is reached while still in progress
/// closes a cycle; the walk stops there instead of failing.
pub fn sort(graph: &DependencyGraph) -> Vec<NodeId> {
    let mut order = Vec::with_capacity(graph.num_nodes());
    let Some(loss) = graph.loss() else {
        debug!("no loss declared, differentiation order is empty");
        return order;
    };

    // Marks are per-traversal state, indexed like the arena.
    let mut state = vec![VisitState::None; graph.count()];
    visit(loss, graph, &mut state, &mut order);

    order.reverse();
    debug!("differentiation order covers {} of {} nodes", order.len(), graph.num_nodes());
    order
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum VisitState {
    None,
    Visiting,
    Visited,
}

/// Iterative post-order walk. Each frame holds a node and the operand slot
/// to descend into next, so chain length is bounded by the heap, not the
/// call stack.
fn visit(root: NodeId, graph: &DependencyGraph, state: &mut [VisitState], order: &mut Vec<NodeId>) {
    let mut stack: Vec<(NodeId, usize)> = Vec::new();
    if enter(root, graph, state) {
        stack.push((root, 0));
    }

    while let Some(frame) = stack.last_mut() {
        let (node, slot) = *frame;
        let Some(n) = graph.node(node) else {
            stack.pop();
            continue;
        };
        // child_one, then child_two
        if let Some(child) = n.children().get(slot) {
            frame.1 += 1;
            if enter(child.id, graph, state) {
                stack.push((child.id, 0));
            }
            continue;
        }

        state[node.index()] = VisitState::Visited;
        order.push(node);
        stack.pop();
    }
}

/// Marks `id` as in progress and reports whether the walk should descend
/// into it.
fn enter(id: NodeId, graph: &DependencyGraph, state: &mut [VisitState]) -> bool {
    let Some(n) = graph.node(id) else { return false };
    if n.kind() == NodeKind::Constant {
        return false;
    }
    let idx = id.index();
    match state[idx] {
        VisitState::Visited => false,
        VisitState::Visiting => {
            warn!("cycle through '{}' ignored during ordering", n.name());
            false
        }
        VisitState::None => {
            state[idx] = VisitState::Visiting;
            true
        }
    }
}
