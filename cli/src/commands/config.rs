// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use aether_orchestrator_core::domain::aether_config::{
    AetherConfigManifest, LLMProviderConfig, ModelConfig,
};
use aether_orchestrator_core::infrastructure::llm::ProviderRegistry;
use aether_orchestrator_core::infrastructure::prompt_template_engine::PromptTemplateEngine;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Ping every enabled LLM provider
        #[arg(long)]
        check: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./aether-config.yaml)
        #[arg(short, long, default_value = "./aether-config.yaml")]
        output: PathBuf,

        /// Include example LLM providers
        #[arg(long)]
        examples: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, check } => show(config_override, paths, check).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, examples } => generate(output, examples).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool, check: bool) -> Result<()> {
    let config = AetherConfigManifest::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. AETHER_CONFIG_PATH: {}",
            std::env::var("AETHER_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./aether-config.yaml");
        println!("  4. ~/.aether/config.yaml");
        println!("  5. /etc/aether/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    // LLM providers
    println!("{}", "LLM Providers:".bold());
    if config.spec.llm_providers.is_empty() {
        println!("  {}", "(none, rule-based analysis only)".dimmed());
    }
    for provider in &config.spec.llm_providers {
        let state = if provider.enabled { "" } else { " [disabled]" };
        println!("  {} ({}){}", provider.name.bold(), provider.provider_type, state);
        println!("    Endpoint: {}", provider.endpoint);
        for model in &provider.models {
            println!("      - {} → {}", model.alias, model.model);
        }
    }
    let selection = &config.spec.llm_selection;
    println!("  Default alias: {}", selection.default_alias);
    if let Some(fallback) = &selection.fallback_provider {
        println!("  Fallback provider: {}", fallback);
    }
    println!(
        "  Retries: {} (base delay {} ms)",
        selection.max_retries, selection.retry_delay_ms
    );
    if check {
        print_provider_health(&config).await?;
    }
    println!();

    // Graph
    let graph = &config.spec.graph;
    println!("{}", "Dependency Graph:".bold());
    println!("  Backend: {:?}", graph.backend);
    if let Some(topology) = &graph.topology_file {
        println!("  Topology: {}", topology.display());
    }
    if let Some(neo4j) = &graph.neo4j {
        println!("  Neo4j: {} (user {})", neo4j.uri, neo4j.user);
    }
    println!();

    // Pipeline
    let pipeline = &config.spec.pipeline;
    println!("{}", "Pipeline:".bold());
    println!("  Flow: {}", pipeline.flow.join(" → "));
    println!("  Auto-execute: {}", pipeline.auto_execute);
    println!("  Use LLM: {}", pipeline.use_llm);
    println!(
        "  Root cause: max {} hops, min score {:.2}",
        pipeline.root_cause.max_hops, pipeline.root_cause.min_impact_score
    );
    println!(
        "  Timeouts: reasoning {:?}, tool {:?}, graph store {:?}",
        pipeline.timeouts.reasoning, pipeline.timeouts.tool, pipeline.timeouts.graph_store
    );
    println!("  Recommendation merge: {:?}", pipeline.remediation.merge);
    let custom = |template: &Option<String>| if template.is_some() { "custom" } else { "built-in" };
    println!(
        "  Prompts: system {}, user {}",
        custom(&pipeline.prompts.system_template),
        custom(&pipeline.prompts.user_template)
    );
    println!();

    // Tools
    println!("{}", "Tools:".bold());
    println!("  kubectl: {}", config.spec.tools.kubectl_binary);
    println!("  Prometheus: {}", config.spec.tools.prometheus_url);
    println!("  Loki: {}", config.spec.tools.loki_url);

    Ok(())
}

async fn print_provider_health(config: &AetherConfigManifest) -> Result<()> {
    let registry = ProviderRegistry::from_config(config)?;
    println!("  Health:");
    if registry.is_empty() {
        println!("    {}", "(no enabled providers)".dimmed());
    }
    for (name, result) in registry.health_check_all().await {
        match result {
            Ok(()) => println!("    {} {}", "✓".green(), name),
            Err(e) => println!("    {} {}: {}", "✗".red(), name, e.to_string().red()),
        }
    }
    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = AetherConfigManifest::load_or_default(config_path)
        .context("Failed to load configuration")?;

    check(&config)?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

/// Manifest rules plus a compile check of any prompt overrides
fn check(config: &AetherConfigManifest) -> Result<()> {
    config
        .validate()
        .context("Configuration validation failed")?;
    PromptTemplateEngine::new()
        .validate_overrides(&config.spec.pipeline.prompts)
        .context("Configuration validation failed")?;
    Ok(())
}

/// Default manifest, optionally with a local and a hosted provider filled in
fn sample_config(with_examples: bool) -> AetherConfigManifest {
    let mut config = AetherConfigManifest::default();
    if with_examples {
        config.spec.llm_providers = vec![
            LLMProviderConfig {
                name: "ollama-local".to_string(),
                provider_type: "ollama".to_string(),
                endpoint: "http://localhost:11434".to_string(),
                api_key: None,
                enabled: true,
                models: vec![ModelConfig {
                    alias: "default".to_string(),
                    model: "llama3.2".to_string(),
                }],
            },
            LLMProviderConfig {
                name: "openai".to_string(),
                provider_type: "openai".to_string(),
                endpoint: "https://api.openai.com/v1".to_string(),
                api_key: Some("env:OPENAI_API_KEY".to_string()),
                enabled: false,
                models: vec![ModelConfig {
                    alias: "default".to_string(),
                    model: "gpt-4o-mini".to_string(),
                }],
            },
        ];
        config.spec.llm_selection.fallback_provider = Some("openai".to_string());
    }
    config
}

async fn generate(output: PathBuf, with_examples: bool) -> Result<()> {
    sample_config(with_examples)
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_are_valid() {
        assert!(check(&sample_config(false)).is_ok());
        assert!(check(&sample_config(true)).is_ok());
    }

    #[test]
    fn test_check_rejects_broken_prompt_override() {
        let mut config = sample_config(false);
        config.spec.pipeline.prompts.user_template = Some("{{#each tools}}{{name}}".to_string());
        let err = check(&config).unwrap_err();
        assert!(format!("{:#}", err).contains("pipeline.prompts.user_template"));

        config.spec.pipeline.prompts.user_template = Some("Incident {{incident_id}}".to_string());
        assert!(check(&config).is_ok());
    }

    #[tokio::test]
    async fn test_provider_health_without_providers() {
        assert!(print_provider_health(&sample_config(false)).await.is_ok());
    }

    #[tokio::test]
    async fn test_generate_writes_loadable_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aether-config.yaml");

        generate(path.clone(), true).await.unwrap();

        let loaded = AetherConfigManifest::from_yaml_file(&path).unwrap();
        assert_eq!(loaded, sample_config(true));
    }
}
