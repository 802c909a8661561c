// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{Artifact, NodeKind, Vars};

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [config]
/// docker = "docker"
///
/// [vars]
/// PROFILE = "release"
///
/// [node.base]
/// kind = "image"
/// context = "./base"
/// tag = "acme/base"
///
/// [node.web]
/// kind = "service"
/// image = "base"
/// command = ["serve"]
/// ```
///
/// This is the unvalidated form; use [`ConfigFile`] (via `TryFrom`) in the
/// rest of the application.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    /// Global settings from `[config]`.
    #[serde(default)]
    pub config: ConfigSection,

    /// Variables from `[vars]`, used to expand artifact paths.
    #[serde(default)]
    pub vars: Vars,

    /// All nodes from `[node.<name>]`.
    #[serde(default)]
    pub node: BTreeMap<String, NodeConfig>,
}

/// Validated configuration.
///
/// Only constructed through `TryFrom<RawConfigFile>`, so field-level checks
/// have always run.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    config: ConfigSection,
    vars: Vars,
    node: BTreeMap<String, NodeConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        config: ConfigSection,
        vars: Vars,
        node: BTreeMap<String, NodeConfig>,
    ) -> Self {
        Self { config, vars, node }
    }

    pub fn config(&self) -> &ConfigSection {
        &self.config
    }

    pub fn vars(&self) -> &Vars {
        &self.vars
    }

    /// Nodes keyed by name.
    pub fn nodes(&self) -> &BTreeMap<String, NodeConfig> {
        &self.node
    }
}

/// `[config]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSection {
    /// Container engine binary to shell out to.
    #[serde(default = "default_docker")]
    pub docker: String,
}

fn default_docker() -> String {
    "docker".to_string()
}

impl Default for ConfigSection {
    fn default() -> Self {
        Self {
            docker: default_docker(),
        }
    }
}

/// `[node.<name>]` section, discriminated by `kind`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NodeConfig {
    Image(ImageConfig),
    Artifact(ArtifactConfig),
    Service(ServiceConfig),
}

impl NodeConfig {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeConfig::Image(_) => NodeKind::Image,
            NodeConfig::Artifact(_) => NodeKind::Artifact,
            NodeConfig::Service(_) => NodeKind::Service,
        }
    }
}

/// `kind = "image"`: build `tag` from the Dockerfile in `context`.
#[derive(Debug, Clone, Deserialize)]
pub struct ImageConfig {
    pub context: String,
    pub tag: String,

    /// Paths under `context` whose modification time makes the image stale.
    ///
    /// Defaults to the whole context directory. Staleness is mtime-based, so
    /// touching a file without changing it (a checkout, editor temp files)
    /// triggers a rebuild. If docker serves that build entirely from cache,
    /// the image keeps its old creation time and stays stale until a source
    /// actually changes; list narrower paths to avoid that.
    #[serde(default = "default_sources")]
    pub sources: Vec<String>,

    /// Other build nodes that must be up to date first (e.g. the `FROM` image).
    #[serde(default)]
    pub after: Vec<String>,
}

fn default_sources() -> Vec<String> {
    vec![".".to_string()]
}

/// `kind = "artifact"`: copy build output on top of the `base` node's image.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    /// Name of the image or artifact node to start from.
    pub base: String,

    /// Host directory the artifact sources are relative to.
    pub context: String,

    pub tag: String,

    /// Directory in the container the artifact destinations are relative to.
    #[serde(default = "default_target_dir")]
    pub target_dir: String,

    #[serde(default)]
    pub artifacts: Vec<Artifact>,

    /// Command that keeps the transient container alive while copying.
    #[serde(default = "default_keepalive")]
    pub command: Vec<String>,

    #[serde(default)]
    pub after: Vec<String>,
}

fn default_target_dir() -> String {
    "/".to_string()
}

fn default_keepalive() -> Vec<String> {
    vec!["sleep".to_string(), "3600".to_string()]
}

/// `kind = "service"`: run a container from the `image` node, linked to the
/// containers of `links`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Name of the image or artifact node to run.
    pub image: String,

    /// Service nodes to start first and link to, in this order.
    #[serde(default)]
    pub links: Vec<String>,

    /// Entry point and arguments.
    #[serde(default)]
    pub command: Vec<String>,
}
