// src/lib.rs

pub mod cli;
pub mod config;
pub mod dag;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod runner;
pub mod types;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, dispatcher, info, Dispatch};

use crate::cli::{CliArgs, Command};
use crate::config::load_graph;
use crate::dag::Graph;
use crate::engine::Orchestrator;
use crate::exec::DockerCli;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and graph validation
/// - the docker CLI engine
/// - the orchestrator, with the globally installed subscriber as its
///   diagnostics sink
pub async fn run(args: CliArgs) -> Result<()> {
    let (cfg, graph) = load_graph(&args.config)?;

    let engine = Arc::new(DockerCli::new(cfg.config().docker.clone()));
    let diagnostics = dispatcher::get_default(Dispatch::clone);
    let orchestrator =
        Orchestrator::new(graph, engine, diagnostics).with_vars(cfg.vars().clone());

    match args.command {
        Command::Build { target } => {
            let timestamp = orchestrator.ensure_built(&target).await?;
            info!(%target, ?timestamp, "target is up to date");
        }
        Command::Run { target, detach } => {
            let id = orchestrator.ensure_running(&target, !detach).await?;
            if detach {
                println!("{id}");
            }
        }
        Command::Status { target } => {
            for status in orchestrator.status(&target).await? {
                let state = if status.stale { "out of date" } else { "up to date" };
                let built = status
                    .timestamp
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string());
                println!("{:<20} {:<9} {:<12} {}", status.name, status.kind, state, built);
            }
        }
        Command::Wipe { target } => {
            for tag in orchestrator.wipe(&target).await? {
                println!("removed {tag}");
            }
        }
        Command::List => print_graph(orchestrator.graph()),
    }

    Ok(())
}

/// Print every node with its kind and dependencies.
fn print_graph(graph: &Graph) {
    println!("layerdag nodes ({}):", graph.len());
    for node in graph.nodes() {
        println!("  - {} ({})", node.name(), node.kind());
        if let Some(tag) = node.runner().image_tag() {
            println!("      tag: {tag}");
        }
        if !node.deps().is_empty() {
            println!("      deps: {:?}", node.deps());
        }
    }

    debug!("list complete (no engine calls)");
}
