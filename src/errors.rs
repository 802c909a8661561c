// src/errors.rs

//! Crate-wide error type and helpers.
//!
//! Configuration problems are reported before any engine call is made. The
//! three engine-facing variants carry the node that failed plus the engine's
//! own error as `source`.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayerdagError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Duplicate node name: {0}")]
    DuplicateNode(String),

    #[error("Cycle detected in node graph: {0}")]
    DagCycle(String),

    #[error("staleness check failed for node '{node}': {source:#}")]
    StalenessCheck {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("build failed for node '{node}': {source:#}")]
    Build {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("run failed for node '{node}': {source:#}")]
    Run {
        node: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LayerdagError {
    pub fn staleness(node: &str, source: anyhow::Error) -> Self {
        Self::StalenessCheck {
            node: node.to_string(),
            source,
        }
    }

    pub fn build(node: &str, source: anyhow::Error) -> Self {
        Self::Build {
            node: node.to_string(),
            source,
        }
    }

    pub fn run(node: &str, source: anyhow::Error) -> Self {
        Self::Run {
            node: node.to_string(),
            source,
        }
    }

    /// Name of the node an engine-facing error belongs to, if any.
    pub fn node(&self) -> Option<&str> {
        match self {
            Self::StalenessCheck { node, .. } | Self::Build { node, .. } | Self::Run { node, .. } => {
                Some(node)
            }
            Self::NodeNotFound(node) | Self::DuplicateNode(node) => Some(node),
            _ => None,
        }
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, LayerdagError>;
