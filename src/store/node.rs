//! A single vertex of the dependency graph: a declared variable or a literal
//! operand. Edges are stored on both endpoints as (`NodeId`, name) links into
//! the owning registry's arena.

use super::types::{Literal, NodeId, NodeKind, Operation};
use smallvec::SmallVec;

/// One end of an edge, recorded by identity and by name.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    pub id: NodeId,
    pub name: String,
}

/// A detached description of a node, used to check and form edges without
/// holding two borrows into the arena at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Handle {
    pub id: NodeId,
    pub kind: NodeKind,
    pub name: String,
}

impl Handle {
    fn link(&self) -> Link {
        Link { id: self.id, name: self.name.clone() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub(crate) id: NodeId,
    name: String,
    kind: NodeKind,
    operation: Option<Operation>,
    literal: Option<Literal>,
    // Operand order is significant for `pow`.
    children: SmallVec<[Link; 2]>,
    parents: Vec<Link>,
}

impl Node {
    /// A named variable. The id is assigned when the node is registered.
    pub fn new(name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: NodeId::default(),
            name: name.into(),
            kind,
            operation: None,
            literal: None,
            children: SmallVec::new(),
            parents: Vec::new(),
        }
    }

    /// A literal operand. Its name is the literal text.
    pub fn constant(id: NodeId, literal: Literal) -> Self {
        Self {
            id,
            name: literal.text.clone(),
            kind: NodeKind::Constant,
            operation: None,
            literal: Some(literal),
            children: SmallVec::new(),
            parents: Vec::new(),
        }
    }

    pub fn id(&self) -> NodeId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn kind(&self) -> NodeKind { self.kind }
    pub fn operation(&self) -> Option<Operation> { self.operation }
    pub fn literal(&self) -> Option<&Literal> { self.literal.as_ref() }

    /// Constants keep their kind for life; the request is ignored.
    pub fn set_kind(&mut self, kind: NodeKind) {
        if self.kind == NodeKind::Constant || kind == NodeKind::Constant {
            return;
        }
        self.kind = kind;
    }

    pub fn handle(&self) -> Handle {
        Handle { id: self.id, kind: self.kind, name: self.name.clone() }
    }

    pub fn is_defined(&self) -> bool { self.operation.is_some() }

    pub(crate) fn set_operation(&mut self, op: Operation) {
        if self.kind != NodeKind::Constant {
            self.operation = Some(op);
        }
    }

    // --- Parents ---

    /// Whether `parent` may be recorded as a consumer of this node.
    pub fn accepts_parent(&self, parent: &Handle) -> bool {
        if parent.kind == NodeKind::Constant || parent.kind.is_source() {
            return false;
        }
        // The loss is only ever "used" by itself.
        !(self.kind == NodeKind::Loss && parent.id != self.id)
    }

    /// Adds `parent` to the parent set. Adding an existing parent again is a
    /// successful no-op.
    pub fn add_parent(&mut self, parent: &Handle) -> bool {
        if !self.accepts_parent(parent) {
            return false;
        }
        if !self.parents.iter().any(|p| p.id == parent.id) {
            self.parents.push(parent.link());
        }
        true
    }

    pub fn has_parent(&self, name: &str) -> bool {
        self.parents.iter().any(|p| p.name == name)
    }

    pub fn has_parents(&self) -> bool { !self.parents.is_empty() }

    /// Parents in the order their edges were recorded.
    pub fn parents(&self) -> &[Link] { &self.parents }

    // --- Children ---

    pub fn accepts_child(&self, child: &Handle) -> bool {
        if self.kind == NodeKind::Constant || self.kind.is_source() {
            return false;
        }
        self.children.len() < 2 && child.kind != NodeKind::Loss
    }

    /// Fills the first free operand slot.
    pub fn set_child(&mut self, child: &Handle) -> bool {
        if !self.accepts_child(child) {
            return false;
        }
        self.children.push(child.link());
        true
    }

    pub fn has_child_with_name(&self, name: &str) -> bool {
        self.children.iter().any(|c| c.name == name)
    }

    pub fn num_children(&self) -> usize { self.children.len() }

    pub fn child_one(&self) -> Option<&Link> { self.children.first() }
    pub fn child_two(&self) -> Option<&Link> { self.children.get(1) }
    pub fn children(&self) -> &[Link] { &self.children }
}
