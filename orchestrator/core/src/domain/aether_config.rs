// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Aether Configuration Types
//
// Configuration schema for the incident-response engine:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - LLM provider configuration and model aliases
// - Dependency graph backend
// - Pipeline flow, traversal limits, timeouts and remediation policy
// - External tool endpoints

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::agent::default_flow;

pub const API_VERSION: &str = "aether.dev/v1";
pub const KIND: &str = "AetherConfig";

/// Upper bound on `llm_selection.max_retries`
pub const MAX_LLM_RETRIES: u32 = 10;

/// Top-level configuration manifest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AetherConfigManifest {
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    pub kind: String,

    pub metadata: ManifestMetadata,

    #[serde(default)]
    pub spec: AetherConfigSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub labels: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AetherConfigSpec {
    #[serde(default)]
    pub llm_providers: Vec<LLMProviderConfig>,

    #[serde(default)]
    pub llm_selection: LLMSelection,

    #[serde(default)]
    pub graph: GraphConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub tools: ToolsConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMProviderConfig {
    /// Unique provider name (e.g., "ollama-local", "openai")
    pub name: String,

    /// "ollama", "openai" or "openai-compatible"
    #[serde(rename = "type")]
    pub provider_type: String,

    pub endpoint: String,

    /// API key (supports "env:VAR_NAME" for environment variables)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,

    pub models: Vec<ModelConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Alias agents ask for (e.g., "default", "fast")
    pub alias: String,

    /// Actual model identifier for the provider API
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LLMSelection {
    /// Model alias the pipeline agents use
    #[serde(default = "default_alias")]
    pub default_alias: String,

    /// Provider tried once after the primary exhausted its retries
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_provider: Option<String>,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay, doubled after each failed attempt
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GraphBackend {
    #[default]
    Memory,
    Neo4j,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub backend: GraphBackend,

    /// YAML/JSON topology loaded into the graph before a run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology_file: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub neo4j: Option<Neo4jConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neo4jConfig {
    pub uri: String,
    pub user: String,
    /// Supports "env:VAR_NAME"
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_flow")]
    pub flow: Vec<String>,

    /// Execute proposed remediations without approval
    #[serde(default)]
    pub auto_execute: bool,

    /// Consult the reasoning service; rule-based paths run either way
    #[serde(default = "default_true")]
    pub use_llm: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default)]
    pub root_cause: RootCauseConfig,

    #[serde(default)]
    pub timeouts: TimeoutConfig,

    #[serde(default)]
    pub remediation: RemediationPolicy,

    #[serde(default)]
    pub actions: ActionPolicy,

    #[serde(default)]
    pub prompts: PromptOverrides,
}

/// Handlebars templates replacing the built-in reasoning prompts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_template: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_template: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseConfig {
    #[serde(default = "default_max_hops")]
    pub max_hops: usize,

    #[serde(default = "default_min_impact_score")]
    pub min_impact_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(with = "humantime_serde", default = "default_reasoning_timeout")]
    pub reasoning: Duration,

    #[serde(with = "humantime_serde", default = "default_tool_timeout")]
    pub tool: Duration,

    #[serde(with = "humantime_serde", default = "default_store_timeout")]
    pub graph_store: Duration,
}

/// How LLM recommendations combine with rule-derived ones
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationMerge {
    /// Keep every LLM recommendation after the rule output
    Append,
    /// Drop LLM recommendations whose issue text matches an existing one
    #[default]
    Deduplicate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemediationPolicy {
    /// Restart count above which a scale action is proposed
    #[serde(default = "default_restart_threshold")]
    pub restart_threshold: u64,

    /// CPU usage percentage above which a resource action is proposed
    #[serde(default = "default_cpu_threshold")]
    pub cpu_threshold: f64,

    /// Number of root causes turned into investigation recommendations
    #[serde(default = "default_top_root_causes")]
    pub top_root_causes: usize,

    /// Impact score above which a root cause recommendation is "high"
    #[serde(default = "default_high_impact")]
    pub high_impact_threshold: f64,

    #[serde(default)]
    pub merge: RecommendationMerge,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionPolicy {
    #[serde(default = "default_scale_replicas")]
    pub scale_replicas: u32,

    #[serde(default = "default_cpu_limit")]
    pub cpu_limit: String,

    #[serde(default = "default_memory_limit")]
    pub memory_limit: String,

    /// Container whose limits a resource action patches
    #[serde(default = "default_container_name")]
    pub container_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolsConfig {
    #[serde(default = "default_kubectl")]
    pub kubectl_binary: String,

    #[serde(default = "default_prometheus_url")]
    pub prometheus_url: String,

    #[serde(default = "default_loki_url")]
    pub loki_url: String,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_alias() -> String {
    "default".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_hops() -> usize {
    3
}

fn default_min_impact_score() -> f64 {
    0.5
}

fn default_reasoning_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_store_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_restart_threshold() -> u64 {
    5
}

fn default_cpu_threshold() -> f64 {
    80.0
}

fn default_top_root_causes() -> usize {
    3
}

fn default_high_impact() -> f64 {
    0.8
}

fn default_scale_replicas() -> u32 {
    5
}

fn default_cpu_limit() -> String {
    "1000m".to_string()
}

fn default_memory_limit() -> String {
    "1Gi".to_string()
}

fn default_container_name() -> String {
    "app".to_string()
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_prometheus_url() -> String {
    "http://localhost:9090".to_string()
}

fn default_loki_url() -> String {
    "http://localhost:3100".to_string()
}

impl Default for LLMSelection {
    fn default() -> Self {
        Self {
            default_alias: default_alias(),
            fallback_provider: None,
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            flow: default_flow(),
            auto_execute: false,
            use_llm: true,
            temperature: default_temperature(),
            root_cause: RootCauseConfig::default(),
            timeouts: TimeoutConfig::default(),
            remediation: RemediationPolicy::default(),
            actions: ActionPolicy::default(),
            prompts: PromptOverrides::default(),
        }
    }
}

impl Default for RootCauseConfig {
    fn default() -> Self {
        Self {
            max_hops: default_max_hops(),
            min_impact_score: default_min_impact_score(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            reasoning: default_reasoning_timeout(),
            tool: default_tool_timeout(),
            graph_store: default_store_timeout(),
        }
    }
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self {
            restart_threshold: default_restart_threshold(),
            cpu_threshold: default_cpu_threshold(),
            top_root_causes: default_top_root_causes(),
            high_impact_threshold: default_high_impact(),
            merge: RecommendationMerge::default(),
        }
    }
}

impl Default for ActionPolicy {
    fn default() -> Self {
        Self {
            scale_replicas: default_scale_replicas(),
            cpu_limit: default_cpu_limit(),
            memory_limit: default_memory_limit(),
            container_name: default_container_name(),
        }
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            kubectl_binary: default_kubectl(),
            prometheus_url: default_prometheus_url(),
            loki_url: default_loki_url(),
        }
    }
}

impl Default for AetherConfigManifest {
    fn default() -> Self {
        let hostname = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "aether".to_string());

        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ManifestMetadata {
                name: hostname,
                version: Some("1.0.0".to_string()),
                labels: None,
            },
            spec: AetherConfigSpec::default(),
        }
    }
}

/// Resolve a secret value (supports "env:VAR_NAME" syntax)
pub fn resolve_secret(value: &Option<String>) -> anyhow::Result<String> {
    match value {
        Some(v) => match v.strip_prefix("env:") {
            Some(var_name) => std::env::var(var_name)
                .map_err(|_| anyhow::anyhow!("Environment variable not set: {}", var_name)),
            None => Ok(v.clone()),
        },
        // local providers without auth
        None => Ok(String::new()),
    }
}

impl AetherConfigManifest {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. AETHER_CONFIG_PATH environment variable
    /// 2. ./aether-config.yaml (working directory)
    /// 3. ~/.aether/config.yaml (user home)
    /// 4. /etc/aether/config.yaml (system)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("AETHER_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./aether-config.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".aether").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        let system_config = PathBuf::from("/etc/aether/config.yaml");
        if system_config.exists() {
            return Some(system_config);
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        // An explicit path must exist and parse
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        let mut config = if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            Self::from_yaml_file(config_path)?
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    /// Environment variable overrides for container deployments
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("AETHER_AUTO_EXECUTE") {
            match val.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => {
                    tracing::info!("Environment override: AETHER_AUTO_EXECUTE=true");
                    self.spec.pipeline.auto_execute = true;
                }
                "false" | "0" | "no" | "off" => {
                    tracing::info!("Environment override: AETHER_AUTO_EXECUTE=false");
                    self.spec.pipeline.auto_execute = false;
                }
                _ => {
                    tracing::warn!(
                        "Invalid value for AETHER_AUTO_EXECUTE: '{}'. Expected true/false. Ignoring.",
                        val
                    );
                }
            }
        }

        if let Ok(url) = std::env::var("AETHER_PROMETHEUS_URL") {
            tracing::info!("Environment override: AETHER_PROMETHEUS_URL={}", url);
            self.spec.tools.prometheus_url = url;
        }

        if let Ok(url) = std::env::var("AETHER_LOKI_URL") {
            tracing::info!("Environment override: AETHER_LOKI_URL={}", url);
            self.spec.tools.loki_url = url;
        }

        if let Ok(binary) = std::env::var("AETHER_KUBECTL") {
            tracing::info!("Environment override: AETHER_KUBECTL={}", binary);
            self.spec.tools.kubectl_binary = binary;
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        for provider in &self.spec.llm_providers {
            if provider.name.is_empty() {
                anyhow::bail!("LLM provider name cannot be empty");
            }

            if provider.endpoint.is_empty() {
                anyhow::bail!("LLM provider endpoint cannot be empty for: {}", provider.name);
            }

            if provider.models.is_empty() {
                anyhow::bail!("LLM provider must have at least one model: {}", provider.name);
            }

            for model in &provider.models {
                if model.alias.is_empty() {
                    anyhow::bail!("Model alias cannot be empty in provider: {}", provider.name);
                }

                if model.model.is_empty() {
                    anyhow::bail!("Model identifier cannot be empty for alias: {}", model.alias);
                }
            }
        }

        if let Some(fallback) = &self.spec.llm_selection.fallback_provider {
            if !self.spec.llm_providers.iter().any(|p| &p.name == fallback) {
                anyhow::bail!("Fallback provider '{}' not found in llm_providers", fallback);
            }
        }

        if self.spec.llm_selection.max_retries > MAX_LLM_RETRIES {
            anyhow::bail!(
                "llm_selection.max_retries must be at most {}, got {}",
                MAX_LLM_RETRIES,
                self.spec.llm_selection.max_retries
            );
        }

        if self.spec.graph.backend == GraphBackend::Neo4j && self.spec.graph.neo4j.is_none() {
            anyhow::bail!("graph.backend is neo4j but graph.neo4j is not configured");
        }

        let pipeline = &self.spec.pipeline;
        if !(0.0..=1.0).contains(&pipeline.root_cause.min_impact_score) {
            anyhow::bail!(
                "pipeline.root_cause.min_impact_score must be within [0, 1], got {}",
                pipeline.root_cause.min_impact_score
            );
        }

        if !(0.0..=2.0).contains(&pipeline.temperature) {
            anyhow::bail!("pipeline.temperature must be within [0, 2], got {}", pipeline.temperature);
        }

        if pipeline.flow.iter().any(String::is_empty) {
            anyhow::bail!("pipeline.flow cannot contain empty step names");
        }

        Ok(())
    }
}
