// src/runner/image.rs

//! "Layer 1": images built directly from a build context.

use anyhow::anyhow;
use tracing::{debug, info};

use crate::config::model::ImageConfig;
use crate::errors::{LayerdagError, Result};
use crate::runner::{changed_since, newest, Freshness, RunnerEnv};
use crate::types::{Artifact, NodeName, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageBuilder {
    /// Build context directory handed to the engine.
    pub context: String,
    pub tag: String,
    /// Paths under `context` whose changes make the image stale.
    pub sources: Vec<String>,
    /// Build nodes that must be up to date first.
    pub after: Vec<NodeName>,
}

impl ImageBuilder {
    pub fn new(context: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            tag: tag.into(),
            sources: vec![".".to_string()],
            after: Vec::new(),
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        self.after.iter().map(String::as_str).collect()
    }

    /// Stale if the image is missing, or if its sources or any upstream image
    /// changed after it was created.
    pub(crate) async fn ood(
        &self,
        node: &str,
        env: RunnerEnv<'_>,
        upstream: Option<Timestamp>,
    ) -> Result<Freshness> {
        let image = env
            .engine
            .inspect_image(&self.tag)
            .await
            .map_err(|e| LayerdagError::staleness(node, e))?;

        let Some(image) = image else {
            debug!(node, tag = %self.tag, "no image for tag; out of date");
            return Ok(Freshness::stale(None));
        };

        let paths: Vec<Artifact> = self.sources.iter().map(Artifact::source_only).collect();
        let modified = env
            .engine
            .last_modified_time(env.vars, &self.context, &paths)
            .await
            .map_err(|e| LayerdagError::staleness(node, e))?;

        let stale = changed_since(newest(modified, upstream), image.created);
        debug!(
            node,
            tag = %self.tag,
            created = %image.created,
            ?modified,
            ?upstream,
            stale,
            "checked image freshness"
        );
        Ok(Freshness {
            timestamp: Some(image.created),
            stale,
        })
    }

    pub(crate) async fn build(&self, node: &str, env: RunnerEnv<'_>) -> Result<Timestamp> {
        info!(node, context = %self.context, tag = %self.tag, "building image");

        env.engine
            .build_image(&self.context, &self.tag)
            .await
            .map_err(|e| LayerdagError::build(node, e))?;

        let image = env
            .engine
            .inspect_image(&self.tag)
            .await
            .map_err(|e| LayerdagError::build(node, e))?
            .ok_or_else(|| {
                LayerdagError::build(
                    node,
                    anyhow!("image '{}' does not exist after a successful build", self.tag),
                )
            })?;

        Ok(image.created)
    }
}

impl From<&ImageConfig> for ImageBuilder {
    fn from(cfg: &ImageConfig) -> Self {
        Self {
            context: cfg.context.clone(),
            tag: cfg.tag.clone(),
            sources: cfg.sources.clone(),
            after: cfg.after.clone(),
        }
    }
}
