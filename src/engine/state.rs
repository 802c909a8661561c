// src/engine/state.rs

//! Per-invocation traversal state.
//!
//! Both tables are created fresh for every top-level orchestrator call and
//! dropped when it returns, so a node's staleness is re-evaluated on the next
//! call.

use std::collections::BTreeMap;

use crate::types::{NodeName, Timestamp};

/// Nodes already satisfied in this traversal, with their freshness
/// timestamps.
#[derive(Debug, Default)]
pub struct BuildState {
    done: BTreeMap<NodeName, Option<Timestamp>>,
}

impl BuildState {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(timestamp)` if the node was already handled in this traversal.
    pub fn get(&self, node: &str) -> Option<Option<Timestamp>> {
        self.done.get(node).copied()
    }

    pub fn record(&mut self, node: impl Into<NodeName>, timestamp: Option<Timestamp>) {
        self.done.insert(node.into(), timestamp);
    }

    /// Newest recorded timestamp among `nodes`.
    pub fn newest_of<'a>(&self, nodes: impl IntoIterator<Item = &'a str>) -> Option<Timestamp> {
        nodes
            .into_iter()
            .filter_map(|n| self.done.get(n).copied().flatten())
            .max()
    }
}

/// Live container identifiers of services started in this invocation.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkMap {
    ids: BTreeMap<NodeName, String>,
}

impl LinkMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node: &str) -> Option<&str> {
        self.ids.get(node).map(String::as_str)
    }

    pub fn insert(&mut self, node: impl Into<NodeName>, id: impl Into<String>) {
        self.ids.insert(node.into(), id.into());
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}
