// src/exec/backend.rs

//! Pluggable container-engine abstraction.
//!
//! The orchestrator and the runners talk to a [`ContainerEngine`] instead of
//! a concrete CLI. Production code uses [`crate::exec::DockerCli`]; tests
//! provide a fake that records calls and simulates images and containers.
//!
//! Every operation is a boxed `Send` future of `anyhow::Result`. Callers
//! await them one at a time; implementations must not rely on overlapping
//! calls.

use std::fmt;
use std::str::FromStr;

use crate::types::{Artifact, BoxFuture, Timestamp, Vars};

pub type EngineFuture<'a, T> = BoxFuture<'a, anyhow::Result<T>>;

/// Metadata of an existing image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    pub created: Timestamp,
    pub id: String,
    /// Container the image was committed from, if any.
    pub container: Option<String>,
}

/// Metadata of an existing container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInfo {
    pub running: bool,
    pub created: Timestamp,
    /// Name usable in `--link`, without the engine's leading `/`.
    pub name: String,
    pub exit_status: i32,
}

/// `repository[:tag]` split into its parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagInfo {
    pub repository: String,
    pub tag: String,
}

impl TagInfo {
    pub fn new(repository: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            repository: repository.into(),
            tag: tag.into(),
        }
    }
}

impl FromStr for TagInfo {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err("empty image reference".to_string());
        }

        // Only a colon in the last path segment separates the tag; earlier
        // ones belong to a registry port (`registry:5000/app`).
        let last_segment = s.rfind('/').map(|i| i + 1).unwrap_or(0);
        match s[last_segment..].rfind(':') {
            Some(i) => {
                let split = last_segment + i;
                let (repository, tag) = (&s[..split], &s[split + 1..]);
                if repository.is_empty() || tag.is_empty() {
                    return Err(format!("invalid image reference '{s}'"));
                }
                Ok(TagInfo::new(repository, tag))
            }
            None => Ok(TagInfo::new(s, "latest")),
        }
    }
}

impl fmt::Display for TagInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.repository, self.tag)
    }
}

/// Metadata recorded on a committed image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    pub author: Option<String>,
    pub message: String,
}

/// Capability surface of a container engine.
pub trait ContainerEngine: Send + Sync {
    /// Build `tag` from the build context directory `context`.
    fn build_image(&self, context: &str, tag: &str) -> EngineFuture<'_, ()>;

    /// Run a container with `args` (options, image, command).
    ///
    /// Detached runs return the last line the engine printed, which is the
    /// new container's id. Attached runs stream output and return an empty
    /// string.
    fn run_container(&self, detached: bool, args: Vec<String>) -> EngineFuture<'_, String>;

    /// Point `info` at `image`; with `force` an existing tag is moved.
    fn tag_image(&self, image: &str, force: bool, info: &TagInfo) -> EngineFuture<'_, ()>;

    /// Commit a container to a new image and return the image id.
    fn commit_container(&self, container: &str, info: &CommitInfo) -> EngineFuture<'_, String>;

    /// Copy `artifacts` from the host directory `context` into the container
    /// `dest`, below `target_dir`.
    fn copy_into_container(
        &self,
        vars: &Vars,
        context: &str,
        target_dir: &str,
        artifacts: &[Artifact],
        dest: &str,
    ) -> EngineFuture<'_, ()>;

    /// Newest modification time of `artifacts` under `context`; `None` if
    /// none of them exist.
    fn last_modified_time(
        &self,
        vars: &Vars,
        context: &str,
        artifacts: &[Artifact],
    ) -> EngineFuture<'_, Option<Timestamp>>;

    fn stop_container(&self, id: &str) -> EngineFuture<'_, ()>;

    fn remove_container(&self, id: &str) -> EngineFuture<'_, ()>;

    fn remove_image(&self, id: &str) -> EngineFuture<'_, ()>;

    /// Inspect an image by id or tag; `None` if there is no such image.
    fn inspect_image(&self, id: &str) -> EngineFuture<'_, Option<ImageInfo>>;

    fn inspect_container(&self, id: &str) -> EngineFuture<'_, ContainerInfo>;
}
