// src/runner/artifact.rs

//! "Layer 2": derived images holding build output.
//!
//! A build starts a transient container from the base node's image, copies
//! the artifacts into it, commits it and moves `tag` to the new image. The
//! transient container is always stopped and removed afterwards.

use anyhow::{anyhow, Context};
use tracing::{debug, info, warn};

use crate::config::model::ArtifactConfig;
use crate::errors::{LayerdagError, Result};
use crate::exec::{CommitInfo, TagInfo};
use crate::runner::{changed_since, newest, Freshness, RunnerEnv};
use crate::types::{Artifact, NodeName, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactBuilder {
    /// Image or artifact node to start the transient container from.
    pub base: NodeName,
    /// Host directory the artifact sources are relative to.
    pub context: String,
    pub tag: String,
    pub target_dir: String,
    pub artifacts: Vec<Artifact>,
    /// Keeps the transient container alive while artifacts are copied.
    pub command: Vec<String>,
    pub after: Vec<NodeName>,
}

impl ArtifactBuilder {
    pub fn new(base: impl Into<NodeName>, context: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            context: context.into(),
            tag: tag.into(),
            target_dir: "/".to_string(),
            artifacts: Vec::new(),
            command: vec!["sleep".to_string(), "3600".to_string()],
            after: Vec::new(),
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        std::iter::once(self.base.as_str())
            .chain(self.after.iter().map(String::as_str))
            .collect()
    }

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
            debug!(node, tag = %self.tag, "no derived image yet; out of date");
            return Ok(Freshness::stale(None));
        };

        let modified = env
            .engine
            .last_modified_time(env.vars, &self.context, &self.artifacts)
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
            "checked artifact freshness"
        );
        Ok(Freshness {
            timestamp: Some(image.created),
            stale,
        })
    }

    pub(crate) async fn build(&self, node: &str, env: RunnerEnv<'_>) -> Result<Timestamp> {
        let base_tag = env
            .graph
            .get(&self.base)?
            .runner()
            .image_tag()
            .ok_or_else(|| {
                LayerdagError::build(node, anyhow!("base '{}' produces no image", self.base))
            })?
            .to_string();
        let tag: TagInfo = self
            .tag
            .parse()
            .map_err(|e: String| LayerdagError::build(node, anyhow!(e)))?;

        info!(node, base = %base_tag, tag = %tag, "building artifact image");

        let mut args = vec![base_tag];
        args.extend(self.command.iter().cloned());
        let container = env
            .engine
            .run_container(true, args)
            .await
            .map_err(|e| LayerdagError::build(node, e))?;
        let container = container.trim().to_string();
        if container.is_empty() {
            return Err(LayerdagError::build(
                node,
                anyhow!("engine returned no id for the transient container"),
            ));
        }
        debug!(node, %container, "started transient container");

        let outcome = self.commit_artifacts(node, env, &container, &tag).await;
        let cleanup = remove_transient(env, &container).await;

        match (outcome, cleanup) {
            (Ok(created), Ok(())) => Ok(created),
            (Ok(_), Err(e)) => Err(LayerdagError::build(node, e)),
            (Err(e), cleanup) => {
                if let Err(cleanup_err) = cleanup {
                    warn!(
                        node,
                        %container,
                        error = %cleanup_err,
                        "failed to clean up transient container after a failed build"
                    );
                }
                Err(LayerdagError::build(node, e))
            }
        }
    }

    /// Copy, commit and tag. Returns the new image's creation time.
    async fn commit_artifacts(
        &self,
        node: &str,
        env: RunnerEnv<'_>,
        container: &str,
        tag: &TagInfo,
    ) -> anyhow::Result<Timestamp> {
        env.engine
            .copy_into_container(env.vars, &self.context, &self.target_dir, &self.artifacts, container)
            .await
            .with_context(|| format!("copying artifacts into container {container}"))?;

        let commit = CommitInfo {
            author: None,
            message: format!("layerdag: artifacts for node '{node}'"),
        };
        let image = env
            .engine
            .commit_container(container, &commit)
            .await
            .with_context(|| format!("committing container {container}"))?;

        env.engine
            .tag_image(&image, true, tag)
            .await
            .with_context(|| format!("tagging image {image} as {tag}"))?;

        let info = env
            .engine
            .inspect_image(&image)
            .await?
            .ok_or_else(|| anyhow!("committed image {image} disappeared"))?;

        debug!(node, %image, created = %info.created, "committed artifact image");
        Ok(info.created)
    }
}

async fn remove_transient(env: RunnerEnv<'_>, container: &str) -> anyhow::Result<()> {
    let stopped = env.engine.stop_container(container).await;
    let removed = env.engine.remove_container(container).await;
    stopped.with_context(|| format!("stopping transient container {container}"))?;
    removed.with_context(|| format!("removing transient container {container}"))
}

impl From<&ArtifactConfig> for ArtifactBuilder {
    fn from(cfg: &ArtifactConfig) -> Self {
        Self {
            base: cfg.base.clone(),
            context: cfg.context.clone(),
            tag: cfg.tag.clone(),
            target_dir: cfg.target_dir.clone(),
            artifacts: cfg.artifacts.clone(),
            command: cfg.command.clone(),
            after: cfg.after.clone(),
        }
    }
}
