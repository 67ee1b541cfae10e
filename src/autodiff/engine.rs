//! The differentiation engine: builds the dependency graph from a shape
//! program and emits the gradient computing program (GCP).
//!
//! Compilation runs in three strictly ordered phases:
//! 1. every line is parsed into graph mutations (and echoed, kinds remapped),
//! 2. the graph is ordered from the loss down to its sources,
//! 3. each node in that order receives its loss partial and the local
//!    partials of its operands.
//!
//! Emitted instructions are buffered and only reach the destination once the
//! whole program compiled, so a failed compile never leaves a partial GCP
//! behind in the writer.

use super::error::CompileError;
use super::instruction::{partial_name, Instruction, Rhs};
use super::parser::{canonical_form, parse_statement, Statement};
use super::rules::{apply_rule, GradientOps, Operands, Slot};
use crate::analysis::telemetry::CompileReport;
use crate::config::CompileOptions;
use crate::store::{DependencyGraph, Node, NodeId, NodeKind, Operation};
use log::{debug, info, warn};
use std::io::{BufRead, Write};

pub struct DifferentiationEngine<W: Write> {
    graph: DependencyGraph,
    options: CompileOptions,
    out: Option<W>,
    program: Vec<Instruction>,
    processed: Vec<bool>,
    next_helper: usize,
    finished: bool,
}

impl DifferentiationEngine<std::io::Sink> {
    /// An engine with no destination. It builds and orders graphs, but every
    /// emitting step is a no-op and [`compile`](Self::compile) fails with
    /// [`CompileError::OutputNotOpen`].
    pub fn detached() -> Self {
        Self::with_destination(None, CompileOptions::default())
    }
}

impl<W: Write> DifferentiationEngine<W> {
    pub fn new(out: W) -> Self {
        Self::with_destination(Some(out), CompileOptions::default())
    }

    pub fn with_options(out: W, options: CompileOptions) -> Self {
        Self::with_destination(Some(out), options)
    }

    fn with_destination(out: Option<W>, options: CompileOptions) -> Self {
        Self {
            graph: DependencyGraph::new(),
            options,
            out,
            program: Vec::new(),
            processed: Vec::new(),
            next_helper: 0,
            finished: false,
        }
    }

    pub fn graph(&self) -> &DependencyGraph { &self.graph }

    /// Every instruction emitted so far, echoed source lines included.
    pub fn program(&self) -> &[Instruction] { &self.program }

    /// True while the engine has a destination and has not yet emitted its
    /// differentiation block.
    pub fn is_open(&self) -> bool { self.out.is_some() && !self.finished }

    /// Compiles a whole shape program and writes the GCP to the destination.
    ///
    /// The first error aborts; nothing is written in that case. An engine
    /// compiles once: later calls fail with [`CompileError::OutputNotOpen`].
    pub fn compile<R: BufRead>(&mut self, source: R) -> Result<CompileReport, CompileError> {
        if !self.is_open() {
            return Err(CompileError::OutputNotOpen);
        }
        for (idx, line) in source.lines().enumerate() {
            let line = line.map_err(|e| CompileError::from(e).at_line(idx + 1))?;
            self.parse_line(&line).map_err(|e| e.at_line(idx + 1))?;
        }

        let report = self.differentiate();
        self.flush()?;
        info!(
            "compiled {} nodes: {} loss partials, {} helpers, {} lines emitted",
            report.declared_nodes, report.loss_partials, report.helpers, report.emitted_lines
        );
        Ok(report)
    }

    // --- Phase 1: parsing ---

    /// Applies one line of the primitive grammar to the graph and echoes it
    /// with its kind remapped for the GCP.
    pub fn parse_line(&mut self, line: &str) -> Result<(), CompileError> {
        match parse_statement(line)? {
            None => Ok(()),
            Some(Statement::Declare { kind, name }) => {
                self.graph.add_node(Node::new(name.as_str(), kind))?;
                debug!("declared {} {}", kind, name);
                if self.options.echo_source {
                    self.emit(Instruction::declare(kind.gcp_kind(), name));
                }
                Ok(())
            }
            Some(Statement::Define { name, rhs }) => {
                self.define_variable(&name, &rhs)?;
                if self.options.echo_source {
                    self.emit(Instruction::define(name, rhs));
                }
                Ok(())
            }
        }
    }

    fn define_variable(&mut self, name: &str, rhs: &Rhs) -> Result<(), CompileError> {
        let target = self
            .graph
            .get_node(name)
            .ok_or_else(|| CompileError::Undeclared(name.to_string()))?;
        if target.kind().is_source() {
            return Err(CompileError::DefineSource { name: name.to_string(), kind: target.kind() });
        }
        if target.is_defined() {
            return Err(CompileError::Redefinition(name.to_string()));
        }
        let id = target.id();

        let (op, operands) = canonical_form(rhs);
        let bare = matches!(rhs, Rhs::Value(_));
        for operand in &operands {
            self.check_operand(operand, bare)?;
        }
        for operand in &operands {
            self.graph.add_flow_edge(operand, name)?;
        }
        if let Some(node) = self.graph.node_mut(id) {
            node.set_operation(op);
        }
        debug!("defined {} = {}", name, rhs);
        Ok(())
    }

    /// Operands are literals, sources, or variables defined on an earlier line.
    /// An unknown name copied as a bare value (`define y = x`) counts as
    /// referenced before definition; inside an operation it is undeclared.
    fn check_operand(&self, operand: &str, bare: bool) -> Result<(), CompileError> {
        if crate::store::Literal::parse(operand).is_some() {
            return Ok(());
        }
        let Some(node) = self.graph.get_node(operand) else {
            let name = operand.to_string();
            return Err(if bare {
                CompileError::UsedBeforeDefinition(name)
            } else {
                CompileError::Undeclared(name)
            });
        };
        if node.kind().is_source() || node.is_defined() {
            Ok(())
        } else {
            Err(CompileError::UsedBeforeDefinition(operand.to_string()))
        }
    }

    // --- Phases 2 and 3: ordering and emission ---

    /// Emits the differentiation block for every node the loss depends on.
    ///
    /// Runs once per engine. A repeated call emits nothing and reports on the
    /// program produced by the first one.
    pub fn differentiate(&mut self) -> CompileReport {
        let order = self.graph.topological_order();
        if self.finished {
            debug!("differentiation block already emitted");
            return CompileReport::analyze(&self.graph, &order, &self.program);
        }
        if self.graph.loss().is_none() {
            warn!("program declares no loss, no partials emitted");
        }
        for &id in &order {
            self.differentiate_node(id);
        }
        self.finished = true;

        let report = CompileReport::analyze(&self.graph, &order, &self.program);
        if self.options.warn_unreachable_weights {
            for weight in &report.weights_without_gradient {
                warn!("loss does not depend on weight '{}', its gradient is not materialised", weight);
            }
        }
        report
    }

    /// Runs the three per-node steps for `id` and marks it processed.
    pub fn differentiate_node(&mut self, id: NodeId) {
        match self.graph.node(id) {
            Some(node) if node.kind() != NodeKind::Constant => {}
            _ => return,
        }
        if self.is_processed(id) {
            return;
        }
        // A node whose loss partial was produced elsewhere (or not at all)
        // must not be bound a second time.
        if !self.declare_partial(id).is_empty() {
            self.define_partial(id);
        }
        self.differentiate_operands(id);
        self.mark_processed(id);
    }

    /// Declares `d/<loss>/d/<n>` and returns its name, or an empty string when
    /// nothing is to be declared for `n`.
    pub fn declare_partial(&mut self, id: NodeId) -> String {
        let Some(loss) = self.graph.loss_node() else { return String::new() };
        let Some(node) = self.graph.node(id) else { return String::new() };
        if !self.is_open() || node.kind() == NodeKind::Constant {
            return String::new();
        }
        // Direct operands of the loss got theirs while the loss was processed.
        if node.id() != loss.id() && node.has_parent(loss.name()) {
            return String::new();
        }
        // The loss does not depend on a node nothing consumes.
        if !node.has_parents() {
            return String::new();
        }

        let storage = if node.kind() == NodeKind::Weight {
            NodeKind::Output
        } else {
            NodeKind::Intermediate
        };
        let name = partial_name(loss.name(), node.name());
        self.emit(Instruction::declare(storage, name.as_str()));
        name
    }

    /// Binds `d/<loss>/d/<n>`: `1` for the loss itself, otherwise the chain
    /// rule through the first parent of `n` that has already been processed.
    ///
    /// Only one parent path contributes. A value consumed at several places
    /// does not receive the sum over all of its consumers.
    pub fn define_partial(&mut self, id: NodeId) -> String {
        let Some(loss) = self.graph.loss_node() else { return String::new() };
        let Some(node) = self.graph.node(id) else { return String::new() };
        if !self.is_open() || node.kind() == NodeKind::Constant {
            return String::new();
        }
        let name = partial_name(loss.name(), node.name());

        if node.id() == loss.id() {
            self.emit(Instruction::define(name.as_str(), Rhs::value("1")));
            return name;
        }

        let Some(via) = node.parents().iter().find(|p| self.is_processed(p.id)) else {
            debug!("no processed parent for '{}', partial left unbound", node.name());
            return String::new();
        };
        let rhs = Rhs::binary(
            Operation::Multiply,
            partial_name(loss.name(), &via.name),
            partial_name(&via.name, node.name()),
        );
        self.emit(Instruction::define(name.as_str(), rhs));
        name
    }

    /// Declares and defines `d/<n>/d/<operand>` for each variable operand of
    /// `n`. A repeated operand is handled once.
    fn differentiate_operands(&mut self, id: NodeId) {
        let Some(node) = self.graph.node(id) else { return };
        let Some(op) = node.operation() else { return };
        if !self.is_open() {
            return;
        }

        let is_loss = self.graph.loss() == Some(id);
        let of = node.name().to_string();
        let children: Vec<(String, NodeKind)> = node
            .children()
            .iter()
            .map(|c| {
                let kind = self.graph.node(c.id).map(|n| n.kind()).unwrap_or(NodeKind::Constant);
                (c.name.clone(), kind)
            })
            .collect();
        let Some((first, _)) = children.first() else { return };
        let operands = Operands {
            first: first.as_str(),
            second: children.get(1).map(|(name, _)| name.as_str()),
        };

        for (slot_idx, (child, kind)) in children.iter().enumerate() {
            if *kind == NodeKind::Constant {
                continue;
            }
            if slot_idx == 1 && operands.second == Some(operands.first) {
                continue;
            }
            let slot = if slot_idx == 0 { Slot::First } else { Slot::Second };
            let target = partial_name(&of, child);
            let storage = if is_loss && *kind == NodeKind::Weight {
                NodeKind::Output
            } else {
                NodeKind::Intermediate
            };
            self.emit(Instruction::declare(storage, target.as_str()));
            apply_rule(&mut *self, op, slot, operands, &target);
        }
    }

    fn is_processed(&self, id: NodeId) -> bool {
        self.processed.get(id.index()).copied().unwrap_or(false)
    }

    fn mark_processed(&mut self, id: NodeId) {
        if self.processed.len() <= id.index() {
            self.processed.resize(id.index() + 1, false);
        }
        self.processed[id.index()] = true;
    }

    fn emit(&mut self, instr: Instruction) {
        if self.is_open() {
            self.program.push(instr);
        }
    }

    /// Writes the buffered program to the destination.
    fn flush(&mut self) -> Result<(), CompileError> {
        let Some(out) = self.out.as_mut() else {
            return Err(CompileError::OutputNotOpen);
        };
        for instr in &self.program {
            writeln!(out, "{}", instr)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Returns the destination, consuming the engine.
    pub fn into_inner(self) -> Option<W> { self.out }
}

impl<W: Write> GradientOps for DifferentiationEngine<W> {
    fn add_helper(&mut self, target: &str, rhs: Rhs) -> String {
        let name = format!("{}/{}", target, self.next_helper);
        self.next_helper += 1;
        self.emit(Instruction::declare(NodeKind::Intermediate, name.as_str()));
        self.emit(Instruction::define(name.as_str(), rhs));
        name
    }

    fn define(&mut self, target: &str, rhs: Rhs) {
        self.emit(Instruction::define(target, rhs));
    }
}
