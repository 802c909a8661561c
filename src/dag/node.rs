// src/dag/node.rs

use crate::config::model::NodeConfig;
use crate::runner::{ArtifactBuilder, ImageBuilder, Runner, ServiceRunner};
use crate::types::{NodeKind, NodeName};

/// A named vertex of the build/run graph.
///
/// A node owns its [`Runner`]; its dependencies are other nodes of the same
/// [`crate::dag::Graph`], referenced by name.
#[derive(Debug, Clone)]
pub struct Node {
    name: NodeName,
    runner: Runner,
    /// Cached `runner.inputs()`, in order.
    deps: Vec<NodeName>,
}

impl Node {
    pub fn new(name: impl Into<NodeName>, runner: impl Into<Runner>) -> Self {
        let runner = runner.into();
        let deps = runner.inputs().into_iter().map(str::to_string).collect();
        Self {
            name: name.into(),
            runner,
            deps,
        }
    }

    pub fn from_config(name: &str, cfg: &NodeConfig) -> Self {
        let runner: Runner = match cfg {
            NodeConfig::Image(c) => ImageBuilder::from(c).into(),
            NodeConfig::Artifact(c) => ArtifactBuilder::from(c).into(),
            NodeConfig::Service(c) => ServiceRunner::from(c).into(),
        };
        Self::new(name, runner)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn runner(&self) -> &Runner {
        &self.runner
    }

    pub fn kind(&self) -> NodeKind {
        self.runner.kind()
    }

    /// Direct dependencies in the order the runner declares them.
    pub fn deps(&self) -> &[NodeName] {
        &self.deps
    }
}
