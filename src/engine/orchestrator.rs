// src/engine/orchestrator.rs

//! Build-then-run traversal over the node graph.
//!
//! Traversal is depth-first and strictly sequential: dependencies are
//! handled one at a time in declaration order, and every engine call is
//! awaited before the next one is issued. The first error aborts the whole
//! traversal.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use anyhow::Context;
use tracing::instrument::WithSubscriber;
use tracing::{debug, dispatcher, info, info_span, Dispatch, Instrument, Span};

use crate::dag::Graph;
use crate::engine::state::{BuildState, LinkMap};
use crate::errors::{LayerdagError, Result};
use crate::exec::ContainerEngine;
use crate::runner::RunnerEnv;
use crate::types::{BoxFuture, NodeKind, NodeName, Timestamp, Vars};

/// Staleness report for one node, as produced by [`Orchestrator::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeStatus {
    pub name: NodeName,
    pub kind: NodeKind,
    /// Whether a build of the target would rebuild this node.
    pub stale: bool,
    /// Creation time of the node's current artifact, if it has one.
    pub timestamp: Option<Timestamp>,
}

/// Drives the build/run protocol for targets of one [`Graph`].
///
/// Diagnostics go to the `Dispatch` given at construction; the orchestrator
/// never touches the process-wide default subscriber.
pub struct Orchestrator {
    graph: Graph,
    engine: Arc<dyn ContainerEngine>,
    vars: Vars,
    diagnostics: Dispatch,
}

impl Orchestrator {
    pub fn new(graph: Graph, engine: Arc<dyn ContainerEngine>, diagnostics: Dispatch) -> Self {
        Self {
            graph,
            engine,
            vars: Vars::new(),
            diagnostics,
        }
    }

    /// Variables for `${NAME}` expansion in artifact paths.
    pub fn with_vars(mut self, vars: Vars) -> Self {
        self.vars = vars;
        self
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    /// Make sure `target` and everything it depends on is up to date.
    ///
    /// Returns the target's freshness timestamp (`None` for services).
    pub async fn ensure_built(&self, target: &str) -> Result<Option<Timestamp>> {
        let work = async {
            self.graph.get(target)?;
            let mut state = BuildState::new();
            self.build_node(target, &mut state).await
        };
        self.diagnosed(|| info_span!("ensure_built", target), work).await
    }

    /// Build the target's closure, then run the target.
    ///
    /// With `tee_output` the target runs in the foreground and the returned
    /// identifier is empty. Otherwise it is started detached and its
    /// container identifier is returned.
    pub async fn ensure_running(&self, target: &str, tee_output: bool) -> Result<String> {
        let work = async {
            let node = self.graph.get(target)?;
            if node.kind() != NodeKind::Service {
                return Err(LayerdagError::run(
                    target,
                    anyhow::anyhow!("{} nodes produce images and cannot be run", node.kind()),
                ));
            }

            let mut state = BuildState::new();
            self.build_node(target, &mut state).await?;

            let mut links = LinkMap::new();
            let id = node
                .runner()
                .run(target, self.env(), tee_output, &mut links)
                .await?;
            debug!(started = links.len(), "link dependencies running");
            Ok(id)
        };
        self.diagnosed(|| info_span!("ensure_running", target, tee_output), work)
            .await
    }

    /// Report which nodes of the target's closure are out of date, without
    /// building anything.
    ///
    /// A build node is reported stale when its own check says so or when any
    /// of its dependencies is stale. Services are never stale.
    pub async fn status(&self, target: &str) -> Result<Vec<NodeStatus>> {
        let work = async {
            let closure = self.graph.closure(target)?;
            let mut seen: BTreeMap<&str, (bool, Option<Timestamp>)> = BTreeMap::new();
            let mut report = Vec::with_capacity(closure.len());

            for node in closure {
                let deps: Vec<(bool, Option<Timestamp>)> = node
                    .deps()
                    .iter()
                    .filter_map(|d| seen.get(d.as_str()).copied())
                    .collect();
                let upstream = deps.iter().filter_map(|(_, ts)| *ts).max();
                let dep_stale = deps.iter().any(|(stale, _)| *stale);

                let freshness = node.runner().ood(node.name(), self.env(), upstream).await?;
                let stale = freshness.stale || (dep_stale && node.kind().produces_image());
                seen.insert(node.name(), (stale, freshness.timestamp));

                report.push(NodeStatus {
                    name: node.name().to_string(),
                    kind: node.kind(),
                    stale,
                    timestamp: freshness.timestamp,
                });
            }
            Ok(report)
        };
        self.diagnosed(|| info_span!("status", target), work).await
    }

    /// Remove the images of every build node in the target's closure.
    ///
    /// Dependents are removed before the images they were built from.
    /// Returns the removed tags; tags without an image are skipped.
    pub async fn wipe(&self, target: &str) -> Result<Vec<String>> {
        let work = async {
            let closure = self.graph.closure(target)?;
            let mut removed = Vec::new();

            for node in closure.iter().rev() {
                let Some(tag) = node.runner().image_tag() else {
                    continue;
                };

                let existing = self
                    .engine
                    .inspect_image(tag)
                    .await
                    .with_context(|| format!("inspecting image '{tag}' of node '{}'", node.name()))?;
                if existing.is_none() {
                    debug!(node = node.name(), tag, "no image to remove");
                    continue;
                }

                self.engine
                    .remove_image(tag)
                    .await
                    .with_context(|| format!("removing image '{tag}' of node '{}'", node.name()))?;
                info!(node = node.name(), tag, "removed image");
                removed.push(tag.to_string());
            }
            Ok(removed)
        };
        self.diagnosed(|| info_span!("wipe", target), work).await
    }

    fn env(&self) -> RunnerEnv<'_> {
        RunnerEnv {
            graph: &self.graph,
            engine: self.engine.as_ref(),
            vars: &self.vars,
        }
    }

    /// Run `work` inside a span, with this orchestrator's diagnostics as the
    /// default subscriber.
    fn diagnosed<F>(&self, span: impl FnOnce() -> Span, work: F) -> impl Future<Output = F::Output>
    where
        F: Future,
    {
        let span = dispatcher::with_default(&self.diagnostics, span);
        work.instrument(span).with_subscriber(self.diagnostics.clone())
    }

    /// Depth-first: dependencies in order, then the node itself.
    fn build_node<'a>(
        &'a self,
        name: &'a str,
        state: &'a mut BuildState,
    ) -> BoxFuture<'a, Result<Option<Timestamp>>> {
        Box::pin(async move {
            if let Some(timestamp) = state.get(name) {
                return Ok(timestamp);
            }

            let node = self.graph.get(name)?;
            for dep in node.deps() {
                self.build_node(dep, state).await?;
            }

            let upstream = state.newest_of(node.deps().iter().map(String::as_str));
            let env = self.env();
            let freshness = node.runner().ood(name, env, upstream).await?;

            let timestamp = if freshness.stale {
                info!(node = name, kind = %node.kind(), "out of date; building");
                let built = node.runner().build(name, env).await?;
                info!(node = name, timestamp = ?built, "build finished");
                if built.is_some() && built == freshness.timestamp {
                    debug!(
                        node = name,
                        "build fully cached; image creation time unchanged, node stays out of date"
                    );
                }
                built
            } else {
                debug!(node = name, timestamp = ?freshness.timestamp, "up to date");
                freshness.timestamp
            };

            state.record(name, timestamp);
            Ok(timestamp)
        })
    }
}
