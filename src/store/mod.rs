//! Storage for the parsed program: node kinds, the node arena and its edges.
pub mod node;
pub mod registry;
pub mod types;

pub use node::{Handle, Link, Node};
pub use registry::{DependencyGraph, RegistryError};
pub use types::{is_valid_name, Literal, NodeId, NodeKind, Operation};
