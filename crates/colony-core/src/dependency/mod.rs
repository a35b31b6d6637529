//! Dependency resolution between tasks.

pub mod dag;

pub use dag::DependencyGraph;
