// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Built-in incident agents and their wiring from configuration

pub mod action_executor;
pub mod remediation;
pub mod root_cause;
pub mod triage;

use std::sync::Arc;

use aether_cortex::DependencyGraphStore;

use crate::application::reasoning::ReasoningEngine;
use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::aether_config::PipelineConfig;
use crate::domain::agent::IncidentAgent;
use crate::domain::llm::LLMProvider;
use crate::infrastructure::prompt_template_engine::{
    DEFAULT_SYSTEM_TEMPLATE, DEFAULT_USER_TEMPLATE,
};

pub use action_executor::ActionExecutorAgent;
pub use remediation::RemediationAdvisorAgent;
pub use root_cause::RootCauseAnalysisAgent;
pub use triage::{classify_by_rules, TriageAgent};

/// Tools each agent may reach, by name
const ROOT_CAUSE_TOOLS: &[&str] = &[
    "get_service_status",
    "get_pod_logs",
    "get_pod_events",
    "query_metrics",
    "get_service_metrics_summary",
    "query_logs",
    "analyze_logs",
];
const REMEDIATION_TOOLS: &[&str] = &["query_metrics", "generate_yaml_patch"];
const EXECUTOR_TOOLS: &[&str] = &["apply_yaml_patch", "restart_deployment"];

/// Reasoning engine with the pipeline's temperature, timeout and prompt overrides
pub fn reasoning_engine(
    pipeline: &PipelineConfig,
    provider: Arc<dyn LLMProvider>,
) -> ReasoningEngine {
    let mut engine = ReasoningEngine::new(provider)
        .with_temperature(pipeline.temperature)
        .with_timeout(pipeline.timeouts.reasoning);
    let prompts = &pipeline.prompts;
    if prompts.system_template.is_some() || prompts.user_template.is_some() {
        engine = engine.with_templates(
            prompts
                .system_template
                .as_deref()
                .unwrap_or(DEFAULT_SYSTEM_TEMPLATE),
            prompts
                .user_template
                .as_deref()
                .unwrap_or(DEFAULT_USER_TEMPLATE),
        );
    }
    engine
}

/// The four default agents, configured from the pipeline section.
///
/// A reasoning engine is only created when a provider is given and
/// `pipeline.use_llm` is set; otherwise every agent runs its rule path.
pub fn default_agents(
    pipeline: &PipelineConfig,
    store: Arc<dyn DependencyGraphStore>,
    tools: &ToolRegistry,
    provider: Option<Arc<dyn LLMProvider>>,
) -> Vec<Arc<dyn IncidentAgent>> {
    let engine = provider.filter(|_| pipeline.use_llm).map(|provider| {
        Arc::new(reasoning_engine(pipeline, provider))
    });

    let mut root_cause = RootCauseAnalysisAgent::new(store, tools.subset(ROOT_CAUSE_TOOLS))
        .with_config(pipeline.root_cause.clone())
        .with_store_timeout(pipeline.timeouts.graph_store);
    let mut remediation = RemediationAdvisorAgent::new(tools.subset(REMEDIATION_TOOLS))
        .with_policy(pipeline.remediation.clone());
    if let Some(engine) = &engine {
        root_cause = root_cause.with_engine(engine.clone());
        remediation = remediation.with_engine(engine.clone());
    }

    vec![
        Arc::new(TriageAgent::new(engine)),
        Arc::new(root_cause),
        Arc::new(remediation),
        Arc::new(
            ActionExecutorAgent::new(tools.subset(EXECUTOR_TOOLS), pipeline.auto_execute)
                .with_policy(pipeline.actions.clone()),
        ),
    ]
}
