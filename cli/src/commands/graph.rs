// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dependency graph query commands
//!
//! Commands: dependencies, root-cause, topology, path

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

use aether_cortex::{DependencyGraphStore, Direction, ServiceKey, DEFAULT_NAMESPACE};
use aether_orchestrator_core::domain::aether_config::AetherConfigManifest;

use super::{open_graph_store, OutputFormat};

/// Options shared by every graph command
#[derive(Args)]
pub struct GraphSource {
    /// Topology file to load (overrides graph.topology_file)
    #[arg(long, value_name = "FILE")]
    topology: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,
}

#[derive(Subcommand)]
pub enum GraphCommand {
    /// List the neighbours of a service
    Dependencies {
        #[command(flatten)]
        source: GraphSource,

        #[arg(long)]
        service: String,

        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// upstream, downstream or both
        #[arg(long, default_value = "upstream")]
        direction: Direction,
    },

    /// Rank candidate root causes reachable from a service
    RootCause {
        #[command(flatten)]
        source: GraphSource,

        #[arg(long)]
        service: String,

        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,

        /// Defaults to pipeline.root_cause.max_hops
        #[arg(long)]
        max_hops: Option<usize>,

        /// Defaults to pipeline.root_cause.min_impact_score
        #[arg(long)]
        min_score: Option<f64>,
    },

    /// Dump services and dependencies
    Topology {
        #[command(flatten)]
        source: GraphSource,

        /// Only services and edges inside this namespace
        #[arg(long)]
        namespace: Option<String>,
    },

    /// Shortest dependency path between two services
    Path {
        #[command(flatten)]
        source: GraphSource,

        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,

        #[arg(long, default_value = DEFAULT_NAMESPACE)]
        namespace: String,
    },
}

pub async fn handle_command(command: GraphCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = AetherConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    match command {
        GraphCommand::Dependencies {
            source,
            service,
            namespace,
            direction,
        } => {
            let store = open(&config, &source).await?;
            let key = ServiceKey::new(service, namespace);
            let neighbors = store
                .get_dependencies(&key, direction)
                .await
                .with_context(|| format!("Failed to list dependencies of {}", key))?;

            render(source.output, &neighbors, || {
                println!("{} {}", "Dependencies of".bold(), key.to_string().bold());
                if neighbors.is_empty() {
                    println!("  {}", "(none)".dimmed());
                }
                for n in &neighbors {
                    println!(
                        "  {:?} {}/{} [{}] {} via {}",
                        n.direction, n.namespace, n.name, n.status, n.kind, n.protocol
                    );
                }
            })
        }
        GraphCommand::RootCause {
            source,
            service,
            namespace,
            max_hops,
            min_score,
        } => {
            let defaults = &config.spec.pipeline.root_cause;
            let max_hops = max_hops.unwrap_or(defaults.max_hops);
            let min_score = min_score.unwrap_or(defaults.min_impact_score);

            let store = open(&config, &source).await?;
            let key = ServiceKey::new(service, namespace);
            let candidates = store
                .multi_hop_root_cause(&key, max_hops, min_score)
                .await
                .with_context(|| format!("Root cause analysis failed for {}", key))?;

            render(source.output, &candidates, || {
                println!(
                    "{} {} (max hops {}, min score {:.2})",
                    "Root cause candidates for".bold(),
                    key.to_string().bold(),
                    max_hops,
                    min_score
                );
                if candidates.is_empty() {
                    println!("  {}", "(none)".dimmed());
                }
                for (rank, c) in candidates.iter().enumerate() {
                    println!(
                        "  {}. {} [{}] impact {:.3}, {} hop(s): {}",
                        rank + 1,
                        c.service.bold(),
                        c.status,
                        c.impact_score,
                        c.hops,
                        c.path.join(" → ")
                    );
                }
            })
        }
        GraphCommand::Topology { source, namespace } => {
            let store = open(&config, &source).await?;
            let topology = store
                .topology(namespace.as_deref())
                .await
                .context("Failed to export topology")?;

            render(source.output, &topology, || {
                println!("{} ({})", "Services".bold(), topology.services.len());
                for s in &topology.services {
                    println!("  {}/{} [{}] {}", s.namespace, s.name, s.status, s.service_type);
                }
                println!("{} ({})", "Dependencies".bold(), topology.dependencies.len());
                for d in &topology.dependencies {
                    println!("  {} → {} ({}, {}:{})", d.source, d.target, d.kind, d.protocol, d.port);
                }
            })
        }
        GraphCommand::Path {
            source,
            from,
            to,
            namespace,
        } => {
            let store = open(&config, &source).await?;
            let from = ServiceKey::new(from, namespace.clone());
            let to = ServiceKey::new(to, namespace);
            let path = store
                .shortest_path(&from, &to)
                .await
                .with_context(|| format!("Failed to find a path from {} to {}", from, to))?;

            render(source.output, &path, || {
                if path.is_empty() {
                    println!("{}", format!("No path from {} to {}", from, to).yellow());
                } else {
                    println!("{}", path.join(" → "));
                }
            })
        }
    }
}

async fn open(
    config: &AetherConfigManifest,
    source: &GraphSource,
) -> Result<std::sync::Arc<dyn DependencyGraphStore>> {
    open_graph_store(&config.spec.graph, source.topology.as_deref()).await
}

fn render<T: Serialize>(output: OutputFormat, value: &T, text: impl FnOnce()) -> Result<()> {
    match output {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(value).context("Failed to serialize result")?
            );
        }
        OutputFormat::Text => text(),
    }
    Ok(())
}
