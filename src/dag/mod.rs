// src/dag/mod.rs

//! Node graph representation.
//!
//! - [`node`] defines a named vertex owning one runner.
//! - [`graph`] holds the validated, acyclic set of nodes and answers
//!   lookups and dependency-closure queries.

pub mod graph;
pub mod node;

pub use graph::Graph;
pub use node::Node;
