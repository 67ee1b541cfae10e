//! Symbolic reverse-mode differentiation of shape programs.
//!
//! [`DifferentiationEngine`] consumes the primitive instruction grammar line by
//! line and emits the gradient computing program: the source with its kinds
//! remapped, followed by one declare/define block per node the loss depends on.

pub mod engine;
pub mod error;
pub mod instruction;
pub mod parser;
mod rules;

pub use engine::DifferentiationEngine;
pub use error::CompileError;
pub use instruction::{partial_name, Instruction, Rhs};
