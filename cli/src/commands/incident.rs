// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Incident pipeline commands
//!
//! Commands: run

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aether_orchestrator_core::application::{default_agents, Orchestrator};
use aether_orchestrator_core::domain::aether_config::{AetherConfigManifest, PipelineConfig};
use aether_orchestrator_core::domain::events::RunEvent;
use aether_orchestrator_core::domain::incident::{RunStatus, RunSummary, StepRecord};
use aether_orchestrator_core::domain::llm::LLMProvider;
use aether_orchestrator_core::infrastructure::event_bus::EventBus;
use aether_orchestrator_core::infrastructure::llm::ProviderRegistry;
use aether_orchestrator_core::infrastructure::tools::builtin_registry;

use super::{open_graph_store, OutputFormat};

#[derive(Subcommand)]
pub enum IncidentCommand {
    /// Run the response pipeline for one incident
    Run {
        /// Incident identifier
        #[arg(long)]
        incident_id: String,

        /// Affected service
        #[arg(long)]
        service: String,

        #[arg(long, default_value = "default")]
        namespace: String,

        /// Observed symptoms
        #[arg(long, value_delimiter = ',')]
        symptoms: Vec<String>,

        /// Topology file loaded into the graph (overrides graph.topology_file)
        #[arg(long, value_name = "FILE")]
        topology: Option<PathBuf>,

        /// Agent names to run in order (overrides pipeline.flow)
        #[arg(long, value_delimiter = ',')]
        flow: Option<Vec<String>>,

        /// Execute proposed actions without approval
        #[arg(long)]
        auto_execute: bool,

        /// Use rule-based analysis only
        #[arg(long)]
        no_llm: bool,

        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        output: OutputFormat,
    },
}

pub async fn handle_command(command: IncidentCommand, config_path: Option<PathBuf>) -> Result<()> {
    match command {
        IncidentCommand::Run {
            incident_id,
            service,
            namespace,
            symptoms,
            topology,
            flow,
            auto_execute,
            no_llm,
            output,
        } => {
            let config = AetherConfigManifest::load_or_default(config_path)
                .context("Failed to load configuration")?;
            let pipeline = pipeline_overrides(&config.spec.pipeline, flow, auto_execute, no_llm);

            let request = RunRequest {
                incident_id,
                service,
                namespace,
                symptoms,
            };
            run(&config, &pipeline, topology, request, output).await
        }
    }
}

struct RunRequest {
    incident_id: String,
    service: String,
    namespace: String,
    symptoms: Vec<String>,
}

/// Command-line flags applied over the configured pipeline section
fn pipeline_overrides(
    configured: &PipelineConfig,
    flow: Option<Vec<String>>,
    auto_execute: bool,
    no_llm: bool,
) -> PipelineConfig {
    let mut pipeline = configured.clone();
    if let Some(flow) = flow {
        pipeline.flow = flow;
    }
    pipeline.auto_execute |= auto_execute;
    pipeline.use_llm &= !no_llm;
    pipeline
}

fn reasoning_provider(config: &AetherConfigManifest) -> Result<Option<Arc<dyn LLMProvider>>> {
    let registry = ProviderRegistry::from_config(config)?;
    if registry.is_empty() {
        warn!("No LLM providers available, running rule-based analysis only");
        return Ok(None);
    }
    info!(aliases = ?registry.available_aliases(), "LLM providers ready");
    Ok(Some(Arc::new(registry)))
}

async fn run(
    config: &AetherConfigManifest,
    pipeline: &PipelineConfig,
    topology: Option<PathBuf>,
    request: RunRequest,
    output: OutputFormat,
) -> Result<()> {
    let store = open_graph_store(&config.spec.graph, topology.as_deref()).await?;
    let tools = builtin_registry(&config.spec.tools, pipeline.timeouts.tool);
    let provider = if pipeline.use_llm {
        reasoning_provider(config)?
    } else {
        None
    };

    let event_bus = EventBus::with_default_capacity();
    let orchestrator = Orchestrator::new(event_bus.clone());
    orchestrator.register_all(default_agents(pipeline, store, &tools, provider));

    let progress = (output == OutputFormat::Text).then(|| {
        let mut events = event_bus.subscribe();
        tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                let finished = matches!(event, RunEvent::RunFinished { .. });
                print_progress(&event);
                if finished {
                    break;
                }
            }
        })
    });

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("{}", "Interrupted, finishing the current step...".yellow());
                cancel.cancel();
            }
        })
    };

    let summary = orchestrator
        .run_with_cancellation(
            &pipeline.flow,
            &request.incident_id,
            &request.service,
            &request.namespace,
            request.symptoms,
            &cancel,
        )
        .await;
    ctrl_c.abort();
    if let Some(progress) = progress {
        // the printer exits on RunFinished
        let _ = progress.await;
    }

    match output {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("Failed to serialize run summary")?
        ),
        OutputFormat::Text => print_summary(&summary),
    }

    Ok(())
}

fn print_progress(event: &RunEvent) {
    match event {
        RunEvent::RunStarted { incident_id, service, flow, .. } => {
            println!(
                "{} {} on {} ({} steps)",
                "▶ Incident".bold(),
                incident_id.bold(),
                service,
                flow.len()
            );
        }
        RunEvent::StepStarted { agent, .. } => println!("  {} {}", "…".dimmed(), agent),
        RunEvent::StepCompleted { agent, success, message, .. } => {
            if *success {
                println!("  {} {}: {}", "✓".green(), agent, message);
            } else {
                println!("  {} {}: {}", "✗".red(), agent, message.red());
            }
        }
        RunEvent::StepSkipped { reason, .. } => println!("  {} {}", "⚠".yellow(), reason.yellow()),
        RunEvent::RunFinished { .. } => println!(),
    }
}

fn print_summary(summary: &RunSummary) {
    let status = match summary.status {
        RunStatus::Completed => "completed".green(),
        RunStatus::Terminated => "terminated".green(),
        RunStatus::Cancelled => "cancelled".yellow(),
    };
    println!("{} {} ({})", "Run".bold(), summary.run_id, status);

    let failed = summary
        .steps
        .iter()
        .filter(|step| match step {
            StepRecord::Invoked { result, .. } => !result.success,
            StepRecord::MissingAgent { .. } => true,
        })
        .count();
    if failed > 0 {
        println!("  {}", format!("{} step(s) failed or were skipped", failed).yellow());
    }
    println!();

    for finding in &summary.findings {
        let data = &finding.data;
        if let (Some(severity), Some(category)) = (
            data.get("severity").and_then(Value::as_str),
            data.get("category").and_then(Value::as_str),
        ) {
            println!("{}", "Classification:".bold());
            println!("  Severity: {}", severity);
            println!("  Category: {}", category);
            println!();
        }

        if let Some(causes) = data.get("root_causes").and_then(Value::as_array) {
            println!("{}", "Root causes:".bold());
            if causes.is_empty() {
                println!("  {}", "(none found)".dimmed());
            }
            for cause in causes {
                println!(
                    "  {} [{}] impact {:.2}, {} hop(s): {}",
                    cause["service"].as_str().unwrap_or("?").bold(),
                    cause["status"].as_str().unwrap_or("unknown"),
                    cause["impact_score"].as_f64().unwrap_or(0.0),
                    cause["hops"],
                    join_path(&cause["path"])
                );
            }
            if let Some(narrative) = data
                .get("synthesis")
                .and_then(|s| s.get("narrative"))
                .and_then(Value::as_str)
            {
                println!("  {}", narrative.italic());
            }
            println!();
        }

        if let Some(recommendations) = data.get("recommendations").and_then(Value::as_array) {
            println!("{}", "Recommendations:".bold());
            for recommendation in recommendations {
                println!(
                    "  - [{}] {}: {}",
                    recommendation["severity"].as_str().unwrap_or("-"),
                    recommendation["issue"].as_str().unwrap_or("-"),
                    recommendation["suggestion"].as_str().unwrap_or("")
                );
            }
            println!();
        }
    }

    if !summary.actions.is_empty() {
        println!("{}", "Actions:".bold());
        for action in &summary.actions {
            let status = action["status"].as_str().unwrap_or("unknown");
            let status = match status {
                "executed" => status.green(),
                "failed" => status.red(),
                _ => status.yellow(),
            };
            println!(
                "  {} {} ({})",
                action["action"]["type"].as_str().unwrap_or("?"),
                action["action"]["resource"].as_str().unwrap_or(&summary.service),
                status
            );
            if let Some(error) = action["error"].as_str() {
                println!("    {}", error.red());
            }
        }
    }
}

fn join_path(path: &Value) -> String {
    path.as_array()
        .map(|hops| {
            hops.iter()
                .filter_map(Value::as_str)
                .collect::<Vec<_>>()
                .join(" → ")
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_pipeline_overrides() {
        let configured = PipelineConfig::default();

        let unchanged = pipeline_overrides(&configured, None, false, false);
        assert_eq!(unchanged, configured);

        let overridden = pipeline_overrides(
            &configured,
            Some(vec!["triage".to_string()]),
            true,
            true,
        );
        assert_eq!(overridden.flow, vec!["triage".to_string()]);
        assert!(overridden.auto_execute);
        assert!(!overridden.use_llm);
    }

    #[test]
    fn test_no_llm_never_enables_reasoning() {
        let configured = PipelineConfig {
            use_llm: false,
            ..PipelineConfig::default()
        };
        assert!(!pipeline_overrides(&configured, None, false, false).use_llm);
    }

    #[test]
    fn test_join_path() {
        assert_eq!(join_path(&json!(["web", "api", "db"])), "web → api → db");
        assert_eq!(join_path(&Value::Null), "");
    }
}
