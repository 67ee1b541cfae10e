//! Core of the shape-program toolchain: parses the primitive instruction
//! grammar into a dependency graph and derives the gradient computing program
//! by symbolic reverse-mode differentiation.

pub mod analysis;
pub mod autodiff;
pub mod config;
pub mod display;
pub mod store;

pub use analysis::CompileReport;
pub use autodiff::{CompileError, DifferentiationEngine};
pub use config::{CompileOptions, ConfigError};
pub use store::{DependencyGraph, Node, NodeId, NodeKind, Operation};
