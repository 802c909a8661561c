use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Canonical node name type used throughout the crate.
pub type NodeName = String;

/// Point in time an artifact was last (re)built.
pub type Timestamp = DateTime<Utc>;

/// Variables available for `${NAME}` expansion in artifact paths.
pub type Vars = BTreeMap<String, String>;

/// Boxed `Send` future, for trait objects and recursive traversals.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The three kinds of graph node behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Builds a tagged image from a build context ("layer 1").
    Image,
    /// Commits build output on top of a base image ("layer 2").
    Artifact,
    /// Runs a linked container ("layer 3").
    Service,
}

impl NodeKind {
    /// Whether nodes of this kind produce an image that others can build on.
    pub fn produces_image(self) -> bool {
        matches!(self, NodeKind::Image | NodeKind::Artifact)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Image => "image",
            NodeKind::Artifact => "artifact",
            NodeKind::Service => "service",
        };
        f.pad(s)
    }
}

/// A file or directory to copy from a host context into a container.
///
/// ```toml
/// artifacts = [{ source = "${PROFILE}/app", destination = "bin/app" }]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Artifact {
    /// Path relative to the node's `context`; may contain `${VAR}` references.
    pub source: String,
    /// Path relative to the node's `target_dir` inside the container.
    #[serde(default)]
    pub destination: String,
}

impl Artifact {
    pub fn new(source: impl Into<String>, destination: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            destination: destination.into(),
        }
    }

    /// An artifact used only for modification-time queries.
    pub fn source_only(source: impl Into<String>) -> Self {
        Self::new(source, String::new())
    }
}
