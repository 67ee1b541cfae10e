//! Read-only passes over a built dependency graph.
pub mod telemetry;
pub mod topology;

pub use telemetry::CompileReport;
