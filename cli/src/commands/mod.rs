// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for Aether CLI

pub mod config;
pub mod graph;
pub mod incident;

pub use self::config::ConfigCommand;
pub use self::graph::GraphCommand;
pub use self::incident::IncidentCommand;

use anyhow::{Context, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;

use aether_cortex::{sync_topology, DependencyGraphStore, InMemoryDependencyGraph, TopologyDocument};
use aether_orchestrator_core::domain::aether_config::{GraphBackend, GraphConfig};

/// Output rendering for commands that print results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Open the configured graph backend and load a topology into it.
///
/// `topology` overrides `graph.topology_file`. Edges with unknown endpoints
/// are reported and skipped.
pub async fn open_graph_store(
    graph: &GraphConfig,
    topology: Option<&Path>,
) -> Result<Arc<dyn DependencyGraphStore>> {
    let store: Arc<dyn DependencyGraphStore> = match graph.backend {
        GraphBackend::Memory => Arc::new(InMemoryDependencyGraph::new()),
        GraphBackend::Neo4j => connect_neo4j(graph).await?,
    };

    let topology = topology
        .map(Path::to_path_buf)
        .or_else(|| graph.topology_file.clone());

    if let Some(path) = topology {
        let document = TopologyDocument::from_file(&path)
            .with_context(|| format!("Failed to load topology {:?}", path))?;
        let report = sync_topology(store.as_ref(), &document.services)
            .await
            .context("Failed to load topology into the graph store")?;
        for skipped in &report.skipped {
            eprintln!("{} {}", "⚠ Skipped dependency:".yellow(), skipped);
        }
    }

    Ok(store)
}

#[cfg(feature = "neo4j")]
async fn connect_neo4j(graph: &GraphConfig) -> Result<Arc<dyn DependencyGraphStore>> {
    use aether_orchestrator_core::domain::aether_config::resolve_secret;

    let neo4j = graph
        .neo4j
        .as_ref()
        .context("graph.backend is neo4j but graph.neo4j is not set")?;
    let password = resolve_secret(&Some(neo4j.password.clone()))?;
    let store = aether_cortex::Neo4jDependencyGraph::connect(&neo4j.uri, &neo4j.user, &password)
        .await
        .with_context(|| format!("Failed to connect to Neo4j at {}", neo4j.uri))?;
    Ok(Arc::new(store))
}

#[cfg(not(feature = "neo4j"))]
async fn connect_neo4j(_graph: &GraphConfig) -> Result<Arc<dyn DependencyGraphStore>> {
    anyhow::bail!("Neo4j backend requested but aether was built without the `neo4j` feature")
}
