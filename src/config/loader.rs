// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::dag::Graph;
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw
/// `RawConfigFile`.
///
/// This only performs TOML deserialization; use [`load_and_validate`] or
/// [`load_graph`] for anything that will drive the engine.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file and run field-level validation.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load, validate, and build the node graph.
///
/// Unknown references, kind mismatches and cycles are all reported here,
/// before anything talks to the container engine.
pub fn load_graph(path: impl AsRef<Path>) -> Result<(ConfigFile, Graph)> {
    let config = load_and_validate(&path)?;
    let graph = Graph::from_config(&config)?;
    debug!(
        path = %path.as_ref().display(),
        nodes = graph.len(),
        "loaded node graph"
    );
    Ok((config, graph))
}

/// Default config path: `Layerdag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Layerdag.toml")
}
