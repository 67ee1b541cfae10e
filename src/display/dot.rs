use crate::store::{DependencyGraph, Node, NodeKind};
use petgraph::dot::Dot;
use petgraph::graph::DiGraph;

/// Copies the dependency graph into a `petgraph` graph. Edges follow the data
/// flow, operand to consumer, and are labelled with the operand slot.
/// Node indices coincide with arena `NodeId`s.
pub fn to_petgraph(graph: &DependencyGraph) -> DiGraph<String, String> {
    let mut pg = DiGraph::with_capacity(graph.count(), graph.count());
    for node in graph.nodes() {
        pg.add_node(label(node));
    }
    for node in graph.nodes() {
        for (slot, child) in node.children().iter().enumerate() {
            pg.add_edge(
                petgraph::graph::NodeIndex::new(child.id.index()),
                petgraph::graph::NodeIndex::new(node.id().index()),
                slot.to_string(),
            );
        }
    }
    pg
}

/// Renders the graph in Graphviz DOT syntax.
pub fn render_dot(graph: &DependencyGraph) -> String {
    let pg = to_petgraph(graph);
    format!("{}", Dot::new(&pg))
}

fn label(node: &Node) -> String {
    match (node.kind(), node.operation()) {
        (NodeKind::Constant, _) => node.name().to_string(),
        (kind, Some(op)) => format!("{} : {} = {}", node.name(), kind, op),
        (kind, None) => format!("{} : {}", node.name(), kind),
    }
}
