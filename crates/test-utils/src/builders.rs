#![allow(dead_code)]

use std::collections::BTreeMap;

use layerdag::config::{
    ArtifactConfig, ConfigFile, ConfigSection, ImageConfig, NodeConfig, RawConfigFile,
    ServiceConfig,
};
use layerdag::dag::Graph;
use layerdag::types::Artifact;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                config: ConfigSection::default(),
                vars: BTreeMap::new(),
                node: BTreeMap::new(),
            },
        }
    }

    pub fn with_node(mut self, name: &str, node: impl Into<NodeConfig>) -> Self {
        self.config.node.insert(name.to_string(), node.into());
        self
    }

    pub fn with_var(mut self, name: &str, value: &str) -> Self {
        self.config.vars.insert(name.to_string(), value.to_string());
        self
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }

    /// Validate the config and turn it into a graph.
    pub fn build_graph(self) -> Graph {
        Graph::from_config(&self.build()).expect("Failed to build valid graph from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `NodeConfig`.
///
/// Methods that only make sense for one kind panic when used on another.
pub struct NodeConfigBuilder {
    node: NodeConfig,
}

impl NodeConfigBuilder {
    pub fn image(context: &str, tag: &str) -> Self {
        Self {
            node: NodeConfig::Image(ImageConfig {
                context: context.to_string(),
                tag: tag.to_string(),
                sources: vec![".".to_string()],
                after: vec![],
            }),
        }
    }

    pub fn artifact(base: &str, context: &str, tag: &str) -> Self {
        Self {
            node: NodeConfig::Artifact(ArtifactConfig {
                base: base.to_string(),
                context: context.to_string(),
                tag: tag.to_string(),
                target_dir: "/".to_string(),
                artifacts: vec![],
                command: vec!["sleep".to_string(), "3600".to_string()],
                after: vec![],
            }),
        }
    }

    pub fn service(image: &str) -> Self {
        Self {
            node: NodeConfig::Service(ServiceConfig {
                image: image.to_string(),
                links: vec![],
                command: vec![],
            }),
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        match &mut self.node {
            NodeConfig::Image(c) => c.after.push(dep.to_string()),
            NodeConfig::Artifact(c) => c.after.push(dep.to_string()),
            NodeConfig::Service(_) => panic!("service nodes use links, not after"),
        }
        self
    }

    pub fn link(mut self, dep: &str) -> Self {
        match &mut self.node {
            NodeConfig::Service(c) => c.links.push(dep.to_string()),
            _ => panic!("only service nodes have links"),
        }
        self
    }

    pub fn command(mut self, args: &[&str]) -> Self {
        let args = args.iter().map(|s| s.to_string()).collect();
        match &mut self.node {
            NodeConfig::Artifact(c) => c.command = args,
            NodeConfig::Service(c) => c.command = args,
            NodeConfig::Image(_) => panic!("image nodes have no command"),
        }
        self
    }

    pub fn sources(mut self, paths: &[&str]) -> Self {
        match &mut self.node {
            NodeConfig::Image(c) => c.sources = paths.iter().map(|s| s.to_string()).collect(),
            _ => panic!("only image nodes have sources"),
        }
        self
    }

    pub fn artifact_file(mut self, source: &str, destination: &str) -> Self {
        match &mut self.node {
            NodeConfig::Artifact(c) => c.artifacts.push(Artifact::new(source, destination)),
            _ => panic!("only artifact nodes copy artifacts"),
        }
        self
    }

    pub fn target_dir(mut self, dir: &str) -> Self {
        match &mut self.node {
            NodeConfig::Artifact(c) => c.target_dir = dir.to_string(),
            _ => panic!("only artifact nodes have a target_dir"),
        }
        self
    }

    pub fn build(self) -> NodeConfig {
        self.node
    }
}

impl From<NodeConfigBuilder> for NodeConfig {
    fn from(b: NodeConfigBuilder) -> Self {
        b.build()
    }
}
