// src/exec/mod.rs

//! Container engine layer.
//!
//! - [`backend`] provides the `ContainerEngine` trait the orchestrator and
//!   runners talk to, plus the metadata types it returns.
//! - [`docker`] is the production implementation, shelling out to the
//!   `docker` CLI via `tokio::process`.
//! - [`vars`] expands `${NAME}` references in artifact paths.

pub mod backend;
pub mod docker;
pub mod vars;

pub use backend::{
    CommitInfo, ContainerEngine, ContainerInfo, EngineFuture, ImageInfo, TagInfo,
};
pub use docker::DockerCli;
