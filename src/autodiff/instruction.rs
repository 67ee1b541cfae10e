//! The primitive instruction grammar shared by shape programs and the
//! gradient computing programs derived from them.

use crate::store::{NodeKind, Operation};
use std::fmt;

/// Right-hand side of a `define` line.
#[derive(Debug, Clone, PartialEq)]
pub enum Rhs {
    /// A bare literal or variable name.
    Value(String),
    Unary(Operation, String),
    Binary(Operation, String, String),
}

impl Rhs {
    pub fn value(v: impl Into<String>) -> Self { Rhs::Value(v.into()) }

    pub fn unary(op: Operation, x: impl Into<String>) -> Self { Rhs::Unary(op, x.into()) }

    pub fn binary(op: Operation, a: impl Into<String>, b: impl Into<String>) -> Self {
        Rhs::Binary(op, a.into(), b.into())
    }
}

impl fmt::Display for Rhs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rhs::Value(v) => write!(f, "{}", v),
            Rhs::Unary(op, x) => write!(f, "{} {}", op, x),
            Rhs::Binary(op, a, b) => write!(f, "{} {} {}", op, a, b),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Instruction {
    Declare { kind: NodeKind, name: String },
    Define { name: String, rhs: Rhs },
}

impl Instruction {
    pub fn declare(kind: NodeKind, name: impl Into<String>) -> Self {
        Instruction::Declare { kind, name: name.into() }
    }

    pub fn define(name: impl Into<String>, rhs: Rhs) -> Self {
        Instruction::Define { name: name.into(), rhs }
    }

    pub fn name(&self) -> &str {
        match self {
            Instruction::Declare { name, .. } | Instruction::Define { name, .. } => name,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Declare { kind, name } => write!(f, "declare {} {}", kind, name),
            Instruction::Define { name, rhs } => write!(f, "define {} = {}", name, rhs),
        }
    }
}

/// `d/<of>/d/<wrt>`
pub fn partial_name(of: &str, wrt: &str) -> String {
    format!("d/{}/d/{}", of, wrt)
}
