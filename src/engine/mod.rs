// src/engine/mod.rs

//! Orchestration engine.
//!
//! [`Orchestrator`] resolves targets in a [`crate::dag::Graph`], decides
//! which nodes are stale, rebuilds them in dependency order and starts
//! services with their links. The per-call memo tables live in [`state`].

pub mod orchestrator;
pub mod state;

pub use orchestrator::{NodeStatus, Orchestrator};
pub use state::{BuildState, LinkMap};
