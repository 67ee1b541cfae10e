use crate::autodiff::instruction::{partial_name, Instruction};
use crate::store::{DependencyGraph, NodeId, NodeKind};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// Summary of one compilation, for logging and `--report` output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompileReport {
    pub declared_nodes: usize,
    pub constants: usize,
    /// Named nodes the loss depends on (the loss included).
    pub reachable_nodes: usize,
    pub op_counts: BTreeMap<String, usize>,
    /// `d/<loss>/d/<n>` variables.
    pub loss_partials: usize,
    /// `d/<n>/d/<operand>` variables for every other `n`.
    pub local_partials: usize,
    /// Compiler-introduced helpers (`d/<n>/d/<operand>/<k>`).
    pub helpers: usize,
    pub weights_with_gradient: Vec<String>,
    pub weights_without_gradient: Vec<String>,
    pub emitted_lines: usize,
}

impl CompileReport {
    pub fn analyze(graph: &DependencyGraph, order: &[NodeId], program: &[Instruction]) -> Self {
        let mut report = Self {
            declared_nodes: graph.num_nodes(),
            constants: graph.count() - graph.num_nodes(),
            reachable_nodes: order.len(),
            emitted_lines: program.len(),
            ..Self::default()
        };

        for node in graph.named_nodes() {
            if let Some(op) = node.operation() {
                *report.op_counts.entry(op.keyword().to_string()).or_insert(0) += 1;
            }
        }

        let loss_name = graph.loss_node().map(|n| n.name().to_string());
        let mut declared = HashSet::new();
        for instr in program {
            let Instruction::Declare { name, .. } = instr else { continue };
            declared.insert(name.as_str());

            let segments: Vec<&str> = name.split('/').collect();
            match segments.as_slice() {
                ["d", of, "d", _] if Some(*of) == loss_name.as_deref() => report.loss_partials += 1,
                ["d", _, "d", _] => report.local_partials += 1,
                ["d", _, "d", _, _] => report.helpers += 1,
                _ => {}
            }
        }

        for node in graph.named_nodes().filter(|n| n.kind() == NodeKind::Weight) {
            let has_gradient = loss_name
                .as_deref()
                .map(|loss| declared.contains(partial_name(loss, node.name()).as_str()))
                .unwrap_or(false);
            if has_gradient {
                report.weights_with_gradient.push(node.name().to_string());
            } else {
                report.weights_without_gradient.push(node.name().to_string());
            }
        }

        report
    }
}
