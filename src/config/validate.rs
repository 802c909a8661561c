// src/config/validate.rs

use regex::Regex;

use crate::config::model::{ConfigFile, NodeConfig, RawConfigFile};
use crate::errors::{LayerdagError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::LayerdagError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw.config, raw.vars, raw.node))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_nodes(cfg)?;
    validate_global_config(cfg)?;
    validate_vars(cfg)?;
    validate_node_fields(cfg)?;
    Ok(())
}

fn ensure_has_nodes(cfg: &RawConfigFile) -> Result<()> {
    if cfg.node.is_empty() {
        return Err(LayerdagError::ConfigError(
            "config must contain at least one [node.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_global_config(cfg: &RawConfigFile) -> Result<()> {
    if cfg.config.docker.trim().is_empty() {
        return Err(LayerdagError::ConfigError(
            "[config].docker must name the engine binary (got an empty string)".to_string(),
        ));
    }
    Ok(())
}

fn validate_vars(cfg: &RawConfigFile) -> Result<()> {
    let name_re = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
        .map_err(|e| LayerdagError::Other(e.into()))?;

    for name in cfg.vars.keys() {
        if !name_re.is_match(name) {
            return Err(LayerdagError::ConfigError(format!(
                "[vars] has invalid variable name '{}'",
                name
            )));
        }
    }
    Ok(())
}

fn validate_node_fields(cfg: &RawConfigFile) -> Result<()> {
    for (name, node) in cfg.node.iter() {
        let required: Vec<(&str, &str)> = match node {
            NodeConfig::Image(image) => {
                vec![("context", image.context.as_str()), ("tag", image.tag.as_str())]
            }
            NodeConfig::Artifact(artifact) => vec![
                ("base", artifact.base.as_str()),
                ("context", artifact.context.as_str()),
                ("tag", artifact.tag.as_str()),
            ],
            NodeConfig::Service(service) => vec![("image", service.image.as_str())],
        };

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(LayerdagError::ConfigError(format!(
                    "node '{}' has an empty `{}`",
                    name, field
                )));
            }
        }

        if let NodeConfig::Artifact(artifact) = node {
            if artifact.command.is_empty() {
                return Err(LayerdagError::ConfigError(format!(
                    "node '{}' needs a `command` to keep its transient container running",
                    name
                )));
            }
            if let Some(bad) = artifact.artifacts.iter().find(|a| a.source.trim().is_empty()) {
                return Err(LayerdagError::ConfigError(format!(
                    "node '{}' has an artifact with an empty `source` (destination '{}')",
                    name, bad.destination
                )));
            }
        }
    }
    Ok(())
}
