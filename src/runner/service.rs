// src/runner/service.rs

//! "Layer 3": long-running containers wired together with links.

use anyhow::anyhow;
use tracing::{debug, info};

use crate::config::model::ServiceConfig;
use crate::engine::LinkMap;
use crate::errors::{LayerdagError, Result};
use crate::runner::{Freshness, RunnerEnv};
use crate::types::{BoxFuture, NodeName, Timestamp};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceRunner {
    /// Image or artifact node whose image is run.
    pub image: NodeName,
    /// Services to start first and link to, in this order.
    pub links: Vec<NodeName>,
    /// Entry point and arguments.
    pub command: Vec<String>,
}

impl ServiceRunner {
    pub fn new(image: impl Into<NodeName>, command: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            image: image.into(),
            links: Vec::new(),
            command: command.into_iter().map(Into::into).collect(),
        }
    }

    pub fn inputs(&self) -> Vec<&str> {
        self.links
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.image.as_str()))
            .collect()
    }

    /// A service has no artifact of its own, so it is never out of date.
    pub(crate) fn ood(&self, node: &str) -> Freshness {
        debug!(node, "service node is always up to date");
        Freshness::fresh(None)
    }

    /// Nothing to build.
    pub(crate) fn build(&self, _node: &str) -> Option<Timestamp> {
        None
    }

    pub(crate) fn run<'a>(
        &'a self,
        node: &'a str,
        env: RunnerEnv<'a>,
        tee_output: bool,
        links: &'a mut LinkMap,
    ) -> BoxFuture<'a, Result<String>> {
        Box::pin(async move {
            info!(node, tee_output, "starting service");

            let mut args = Vec::new();
            for dep in &self.links {
                let id = match links.get(dep) {
                    Some(id) => {
                        debug!(node, dep = %dep, %id, "reusing container started earlier");
                        id.to_string()
                    }
                    None => {
                        let dep_node = env.graph.get(dep)?;
                        let id = dep_node.runner().run(dep, env, false, links).await?;
                        links.insert(dep.clone(), id.clone());
                        id
                    }
                };

                let container = env
                    .engine
                    .inspect_container(&id)
                    .await
                    .map_err(|e| LayerdagError::run(node, e))?;
                debug!(node, dep = %dep, %id, name = %container.name, "resolved link target");

                args.push("--link".to_string());
                args.push(format!("{}:{}", container.name, dep));
            }

            let image = env
                .graph
                .get(&self.image)?
                .runner()
                .image_tag()
                .ok_or_else(|| {
                    LayerdagError::run(node, anyhow!("'{}' produces no image", self.image))
                })?;
            args.push(image.to_string());
            args.extend(self.command.iter().cloned());

            if tee_output {
                env.engine
                    .run_container(false, args)
                    .await
                    .map_err(|e| LayerdagError::run(node, e))?;
                return Ok(String::new());
            }

            let output = env
                .engine
                .run_container(true, args)
                .await
                .map_err(|e| LayerdagError::run(node, e))?;
            let id = output.trim().to_string();
            if id.is_empty() {
                return Err(LayerdagError::run(
                    node,
                    anyhow!("engine printed no container id for detached run"),
                ));
            }
            info!(node, %id, "service started");
            Ok(id)
        })
    }
}

impl From<&ServiceConfig> for ServiceRunner {
    fn from(cfg: &ServiceConfig) -> Self {
        Self {
            image: cfg.image.clone(),
            links: cfg.links.clone(),
            command: cfg.command.clone(),
        }
    }
}
