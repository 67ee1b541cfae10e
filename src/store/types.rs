use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline(always)]
    pub fn index(&self) -> usize { self.0 as usize }
    /// Arena positions are limited to `u32`.
    pub fn new(idx: usize) -> Self {
        debug_assert!(idx <= u32::MAX as usize, "arena index {idx} exceeds NodeId range");
        Self(idx as u32)
    }
}

/// The role a variable plays in a shape program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    Input,
    Output,
    ExpectedOutput,
    Weight,
    Intermediate,
    Loss,
    /// An ad hoc literal operand. Never registered by name.
    Constant,
}

impl NodeKind {
    /// Source values are supplied from outside the program: they can never be
    /// defined, never have operands and never act as a parent.
    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::Input | NodeKind::Weight | NodeKind::ExpectedOutput)
    }

    /// Parses the keyword used by `declare <kind> <name>`.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "input" => Some(NodeKind::Input),
            "output" => Some(NodeKind::Output),
            "exp_output" => Some(NodeKind::ExpectedOutput),
            "weight" => Some(NodeKind::Weight),
            "intvar" => Some(NodeKind::Intermediate),
            "loss" => Some(NodeKind::Loss),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            NodeKind::Input => "input",
            NodeKind::Output => "output",
            NodeKind::ExpectedOutput => "exp_output",
            NodeKind::Weight => "weight",
            NodeKind::Intermediate => "intvar",
            NodeKind::Loss => "loss",
            NodeKind::Constant => "constant",
        }
    }

    /// The kind a variable is re-declared with inside the gradient computing
    /// program: everything supplied per evaluation becomes `input`, everything
    /// computed becomes `intvar`.
    pub fn gcp_kind(&self) -> NodeKind {
        if self.is_source() { NodeKind::Input } else { NodeKind::Intermediate }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// The primitive operations a `define` line may apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operation {
    Add,
    Multiply,
    Power,
    Exp,
    NaturalLog,
    Logistic,
}

impl Operation {
    pub fn arity(&self) -> usize {
        match self {
            Operation::Add | Operation::Multiply | Operation::Power => 2,
            Operation::Exp | Operation::NaturalLog | Operation::Logistic => 1,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Operation::Add => "add",
            Operation::Multiply => "mul",
            Operation::Power => "pow",
            Operation::Exp => "exp",
            Operation::NaturalLog => "ln",
            Operation::Logistic => "logistic",
        }
    }
}

impl FromStr for Operation {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Operation::Add),
            "mul" => Ok(Operation::Multiply),
            "pow" => Ok(Operation::Power),
            "exp" => Ok(Operation::Exp),
            "ln" => Ok(Operation::NaturalLog),
            "logistic" => Ok(Operation::Logistic),
            _ => Err(()),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// A numeric literal as it appeared in the source. The text is kept so the
/// emitted program reproduces the operand exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Literal {
    pub text: String,
    pub value: f64,
}

impl Literal {
    /// Accepts `[+-]digits[.digits][e[+-]digits]` style literals. Words that
    /// `f64::from_str` would also take (`inf`, `NaN`) are rejected so they stay
    /// available as variable names.
    pub fn parse(text: &str) -> Option<Self> {
        let unsigned = text.strip_prefix(|c: char| c == '+' || c == '-').unwrap_or(text);
        let first = unsigned.chars().next()?;
        if !(first.is_ascii_digit() || first == '.') {
            return None;
        }
        let value = text.parse::<f64>().ok()?;
        Some(Self { text: text.to_string(), value })
    }
}

/// Returns true for `[A-Za-z_][A-Za-z0-9_]*`.
pub fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
