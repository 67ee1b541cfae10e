use super::node::Node;
use super::types::*;
use crate::analysis::topology;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("literal '{0}' cannot be registered by name")]
    ConstantNotRegistrable(String),
    #[error("'{0}' is already registered")]
    DuplicateName(String),
    #[error("cannot declare loss '{rejected}': '{existing}' is already the loss")]
    SecondLoss { existing: String, rejected: String },
    #[error("'{0}' is not registered")]
    Unregistered(String),
    #[error("'{child}' cannot be an operand of '{parent}'")]
    EdgeRejected { child: String, parent: String },
}

/// Owns every node of one program.
///
/// Named nodes and literal constants share a single arena addressed by
/// `NodeId`; only named nodes are reachable through the name index. Edges are
/// stored on the nodes themselves as (id, name) links.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<Node>,
    names: HashMap<String, NodeId>,
    loss: Option<NodeId>,
}

impl DependencyGraph {
    pub fn new() -> Self { Self::default() }

    /// Registers a named node. The first loss node becomes its own parent and
    /// the graph's loss; a second one is rejected without touching the registry.
    pub fn add_node(&mut self, mut node: Node) -> Result<NodeId, RegistryError> {
        if node.kind() == NodeKind::Constant {
            return Err(RegistryError::ConstantNotRegistrable(node.name().to_string()));
        }
        if self.names.contains_key(node.name()) {
            return Err(RegistryError::DuplicateName(node.name().to_string()));
        }
        if node.kind() == NodeKind::Loss {
            if let Some(existing) = self.loss_node() {
                return Err(RegistryError::SecondLoss {
                    existing: existing.name().to_string(),
                    rejected: node.name().to_string(),
                });
            }
        }

        let id = NodeId::new(self.nodes.len());
        node.id = id;
        if node.kind() == NodeKind::Loss {
            let me = node.handle();
            node.add_parent(&me);
            self.loss = Some(id);
        }
        self.names.insert(node.name().to_string(), id);
        self.nodes.push(node);
        Ok(id)
    }

    pub fn get_node(&self, name: &str) -> Option<&Node> {
        self.names.get(name).map(|id| &self.nodes[id.index()])
    }

    pub fn node_id(&self, name: &str) -> Option<NodeId> {
        self.names.get(name).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.index())
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.index())
    }

    /// Records that `parent` consumes `child`.
    ///
    /// A numeric-literal `child` is materialised as a fresh constant node; every
    /// occurrence gets its own. The edge only forms if the child accepts the
    /// parent and the parent accepts the child; otherwise nothing changes.
    pub fn add_flow_edge(&mut self, child: &str, parent: &str) -> Result<NodeId, RegistryError> {
        let parent_id = self
            .node_id(parent)
            .ok_or_else(|| RegistryError::Unregistered(parent.to_string()))?;

        let (child_id, fresh_constant) = match Literal::parse(child) {
            Some(literal) => {
                let id = NodeId::new(self.nodes.len());
                self.nodes.push(Node::constant(id, literal));
                (id, true)
            }
            None => {
                let id = self
                    .node_id(child)
                    .ok_or_else(|| RegistryError::Unregistered(child.to_string()))?;
                (id, false)
            }
        };

        let parent_handle = self.nodes[parent_id.index()].handle();
        let child_handle = self.nodes[child_id.index()].handle();

        let accepted = self.nodes[child_id.index()].accepts_parent(&parent_handle)
            && self.nodes[parent_id.index()].accepts_child(&child_handle);
        if !accepted {
            if fresh_constant {
                self.nodes.pop();
            }
            return Err(RegistryError::EdgeRejected {
                child: child.to_string(),
                parent: parent.to_string(),
            });
        }

        self.nodes[child_id.index()].add_parent(&parent_handle);
        self.nodes[parent_id.index()].set_child(&child_handle);
        Ok(child_id)
    }

    /// Number of named (non-constant) nodes.
    pub fn num_nodes(&self) -> usize { self.names.len() }

    /// Total arena size, constants included.
    pub fn count(&self) -> usize { self.nodes.len() }

    pub fn loss(&self) -> Option<NodeId> { self.loss }

    pub fn loss_node(&self) -> Option<&Node> {
        self.loss.map(|id| &self.nodes[id.index()])
    }

    /// Every node in creation order, constants included.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Named nodes in declaration order.
    pub fn named_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.kind() != NodeKind::Constant)
    }

    /// The order in which partial derivatives must be produced: the loss
    /// first, and every node ahead of its own operands.
    pub fn topological_order(&self) -> Vec<NodeId> {
        topology::sort(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_with(decls: &[(&str, NodeKind)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for (name, kind) in decls {
            g.add_node(Node::new(*name, *kind)).expect("declare");
        }
        g
    }

    #[test]
    fn test_second_loss_is_rejected_and_count_unchanged() {
        let mut g = graph_with(&[("l", NodeKind::Loss), ("x", NodeKind::Input)]);
        assert_eq!(g.num_nodes(), 2);

        let err = g.add_node(Node::new("l2", NodeKind::Loss)).unwrap_err();
        assert_eq!(
            err,
            RegistryError::SecondLoss { existing: "l".into(), rejected: "l2".into() }
        );
        assert_eq!(g.num_nodes(), 2);
        assert!(g.get_node("l2").is_none());
    }

    #[test]
    fn test_loss_is_self_linked() {
        let g = graph_with(&[("l", NodeKind::Loss)]);
        let loss = g.loss_node().unwrap();
        assert!(loss.has_parent("l"));
        assert_eq!(loss.parents().len(), 1);
        assert_eq!(g.loss(), g.node_id("l"));
    }

    #[test]
    fn test_duplicate_and_constant_registration_rejected() {
        let mut g = graph_with(&[("x", NodeKind::Input)]);
        assert_eq!(
            g.add_node(Node::new("x", NodeKind::Weight)),
            Err(RegistryError::DuplicateName("x".into()))
        );
        let c = Node::constant(NodeId(0), Literal::parse("1").unwrap());
        assert!(matches!(g.add_node(c), Err(RegistryError::ConstantNotRegistrable(_))));
        assert_eq!(g.num_nodes(), 1);
    }

    #[test]
    fn test_edge_to_unregistered_parent_fails_without_side_effects() {
        let mut g = graph_with(&[("x", NodeKind::Input)]);
        let before = g.count();

        assert_eq!(
            g.add_flow_edge("x", "ghost"),
            Err(RegistryError::Unregistered("ghost".into()))
        );
        assert_eq!(
            g.add_flow_edge("3", "ghost"),
            Err(RegistryError::Unregistered("ghost".into()))
        );
        assert_eq!(g.count(), before);
        assert!(!g.get_node("x").unwrap().has_parents());
    }

    #[test]
    fn test_literal_children_are_fresh_per_occurrence() {
        let mut g = graph_with(&[("h", NodeKind::Intermediate)]);
        let a = g.add_flow_edge("2", "h").unwrap();
        let b = g.add_flow_edge("2", "h").unwrap();
        assert_ne!(a, b);
        assert_eq!(g.num_nodes(), 1);
        assert_eq!(g.count(), 3);
        assert_eq!(g.node(a).unwrap().kind(), NodeKind::Constant);
    }

    #[test]
    fn test_rejected_edge_discards_fresh_constant() {
        let mut g = graph_with(&[("w", NodeKind::Weight)]);
        let err = g.add_flow_edge("1", "w").unwrap_err();
        assert!(matches!(err, RegistryError::EdgeRejected { .. }));
        assert_eq!(g.count(), 1);
    }

    #[test]
    fn test_loss_operand_edge_rejected_on_both_ends() {
        let mut g = graph_with(&[("l", NodeKind::Loss), ("o", NodeKind::Output)]);
        assert!(g.add_flow_edge("l", "o").is_err());
        assert_eq!(g.get_node("o").unwrap().num_children(), 0);
        assert!(!g.get_node("l").unwrap().has_parent("o"));
    }

    #[test]
    fn test_edge_records_both_directions() {
        let mut g = graph_with(&[("x", NodeKind::Input), ("h", NodeKind::Intermediate)]);
        g.add_flow_edge("x", "h").unwrap();
        assert!(g.get_node("x").unwrap().has_parent("h"));
        assert!(g.get_node("h").unwrap().has_child_with_name("x"));
    }
}
