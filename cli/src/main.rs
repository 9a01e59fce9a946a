// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Aether Incident Response CLI
//!
//! The `aether` binary runs the incident pipeline in-process against a
//! dependency graph loaded from a topology file (or Neo4j) and the
//! configured reasoning providers.
//!
//! ## Commands
//!
//! - `aether incident run` - Run the pipeline for one incident
//! - `aether graph dependencies|root-cause|topology|path` - Query the dependency graph
//! - `aether config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use aether_orchestrator::commands::{self, ConfigCommand, GraphCommand, IncidentCommand};

/// Aether - Multi-agent incident response
#[derive(Parser)]
#[command(name = "aether")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "AETHER_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "AETHER_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Incident pipeline operations
    #[command(name = "incident")]
    Incident {
        #[command(subcommand)]
        command: IncidentCommand,
    },

    /// Dependency graph queries
    #[command(name = "graph")]
    Graph {
        #[command(subcommand)]
        command: GraphCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is fine
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Incident { command }) => {
            commands::incident::handle_command(command, cli.config).await
        }
        Some(Commands::Graph { command }) => {
            commands::graph::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
