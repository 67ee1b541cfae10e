//! Human-facing renderings of a dependency graph.
pub mod dot;
