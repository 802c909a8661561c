// src/runner/mod.rs

//! Node behaviours.
//!
//! Every node owns exactly one [`Runner`]. The three variants share one
//! contract:
//!
//! - [`Runner::inputs`]: the ordered dependencies that must be satisfied
//!   before any of the other operations run.
//! - [`Runner::ood`]: is the artifact out of date?
//! - [`Runner::build`]: (re)produce the artifact; only called when `ood`
//!   said so.
//! - [`Runner::run`]: start the artifact, in the foreground or detached.
//!
//! - [`image`] builds images from a context ("layer 1").
//! - [`artifact`] commits build output onto a base image ("layer 2").
//! - [`service`] runs linked containers ("layer 3").

pub mod artifact;
pub mod image;
pub mod service;

use anyhow::anyhow;

use crate::dag::Graph;
use crate::engine::LinkMap;
use crate::errors::{LayerdagError, Result};
use crate::exec::ContainerEngine;
use crate::types::{BoxFuture, NodeKind, Timestamp, Vars};

pub use artifact::ArtifactBuilder;
pub use image::ImageBuilder;
pub use service::ServiceRunner;

/// Everything a runner may consult while checking, building or running.
#[derive(Clone, Copy)]
pub struct RunnerEnv<'a> {
    pub graph: &'a Graph,
    pub engine: &'a dyn ContainerEngine,
    pub vars: &'a Vars,
}

/// Result of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    /// When the existing artifact was built, `None` if there is none.
    pub timestamp: Option<Timestamp>,
    /// Whether `build` must run before the artifact can be used.
    pub stale: bool,
}

impl Freshness {
    pub fn stale(timestamp: Option<Timestamp>) -> Self {
        Self {
            timestamp,
            stale: true,
        }
    }

    pub fn fresh(timestamp: Option<Timestamp>) -> Self {
        Self {
            timestamp,
            stale: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runner {
    Image(ImageBuilder),
    Artifact(ArtifactBuilder),
    Service(ServiceRunner),
}

impl From<ImageBuilder> for Runner {
    fn from(r: ImageBuilder) -> Self {
        Runner::Image(r)
    }
}

impl From<ArtifactBuilder> for Runner {
    fn from(r: ArtifactBuilder) -> Self {
        Runner::Artifact(r)
    }
}

impl From<ServiceRunner> for Runner {
    fn from(r: ServiceRunner) -> Self {
        Runner::Service(r)
    }
}

impl Runner {
    pub fn kind(&self) -> NodeKind {
        match self {
            Runner::Image(_) => NodeKind::Image,
            Runner::Artifact(_) => NodeKind::Artifact,
            Runner::Service(_) => NodeKind::Service,
        }
    }

    /// Dependencies in the order they must be satisfied.
    pub fn inputs(&self) -> Vec<&str> {
        match self {
            Runner::Image(r) => r.inputs(),
            Runner::Artifact(r) => r.inputs(),
            Runner::Service(r) => r.inputs(),
        }
    }

    /// The image tag this node produces, if it produces one.
    pub fn image_tag(&self) -> Option<&str> {
        match self {
            Runner::Image(r) => Some(&r.tag),
            Runner::Artifact(r) => Some(&r.tag),
            Runner::Service(_) => None,
        }
    }

    /// Decide whether the node's artifact must be rebuilt.
    ///
    /// `upstream` is the newest freshness timestamp among the node's
    /// dependencies in the current traversal.
    pub async fn ood(
        &self,
        node: &str,
        env: RunnerEnv<'_>,
        upstream: Option<Timestamp>,
    ) -> Result<Freshness> {
        match self {
            Runner::Image(r) => r.ood(node, env, upstream).await,
            Runner::Artifact(r) => r.ood(node, env, upstream).await,
            Runner::Service(r) => Ok(r.ood(node)),
        }
    }

    /// Produce the artifact and return its new freshness timestamp.
    pub async fn build(&self, node: &str, env: RunnerEnv<'_>) -> Result<Option<Timestamp>> {
        match self {
            Runner::Image(r) => r.build(node, env).await.map(Some),
            Runner::Artifact(r) => r.build(node, env).await.map(Some),
            Runner::Service(r) => Ok(r.build(node)),
        }
    }

    /// Run the node.
    ///
    /// With `tee_output` the container runs in the foreground and the
    /// returned identifier is empty; otherwise it is started detached and
    /// its identifier returned. Only service nodes are runnable.
    pub fn run<'a>(
        &'a self,
        node: &'a str,
        env: RunnerEnv<'a>,
        tee_output: bool,
        links: &'a mut LinkMap,
    ) -> BoxFuture<'a, Result<String>> {
        match self {
            Runner::Service(r) => r.run(node, env, tee_output, links),
            Runner::Image(_) | Runner::Artifact(_) => {
                let kind = self.kind();
                Box::pin(async move {
                    Err(LayerdagError::run(
                        node,
                        anyhow!("{kind} nodes produce images and cannot be run"),
                    ))
                })
            }
        }
    }
}

/// Newest of two optional timestamps.
pub(crate) fn newest(a: Option<Timestamp>, b: Option<Timestamp>) -> Option<Timestamp> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

/// Whether something that changed at `changed` invalidates an artifact
/// created at `created`.
pub(crate) fn changed_since(changed: Option<Timestamp>, created: Timestamp) -> bool {
    changed.is_some_and(|t| t > created)
}
