// src/config/mod.rs

//! Configuration loading and validation.
//!
//! - [`model`] holds the serde types for `Layerdag.toml`.
//! - [`loader`] reads files and turns them into a [`ConfigFile`] or a
//!   ready-to-use [`crate::dag::Graph`].
//! - [`validate`] performs field-level checks during `TryFrom<RawConfigFile>`.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, load_graph};
pub use model::{
    ArtifactConfig, ConfigFile, ConfigSection, ImageConfig, NodeConfig, RawConfigFile,
    ServiceConfig,
};
