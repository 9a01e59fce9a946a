// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! End-to-end pipeline runs against an in-memory graph, scripted reasoning
//! service and fake tools.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use aether_cortex::{
    DependencyEdge, DependencyGraphStore, HealthStatus, InMemoryDependencyGraph, ServiceKey,
    ServiceNode,
};
use aether_orchestrator_core::application::{default_agents, Orchestrator, ToolRegistry};
use aether_orchestrator_core::domain::aether_config::PipelineConfig;
use aether_orchestrator_core::domain::agent::{
    default_flow, IncidentAgent, ACTION_EXECUTION, REMEDIATION_ADVICE, ROOT_CAUSE_ANALYSIS, TRIAGE,
};
use aether_orchestrator_core::domain::incident::{RunStatus, StepRecord};
use aether_orchestrator_core::domain::llm::{
    ChatRequest, ChatResponse, LLMError, LLMProvider,
};
use aether_orchestrator_core::domain::tool::{
    FnTool, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolSchema,
};
use aether_orchestrator_core::infrastructure::event_bus::EventBus;

/// Answers by agent, identified from the system prompt
struct RoutingProvider;

#[async_trait]
impl LLMProvider for RoutingProvider {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        let system = &request.messages[0].content;
        let answer = if system.starts_with("You are triage") {
            json!({"severity": "high", "category": "performance", "reasoning": "latency spike"})
        } else if system.starts_with("You are root_cause_analysis") {
            json!({"primary_root_cause": "db", "confidence": 0.9, "narrative": "db is saturated"})
        } else {
            json!({"recommendations": [
                {"issue": "High pod restart count", "severity": "high", "suggestion": "dup"},
                {"issue": "Connection pool exhaustion", "severity": "medium", "suggestion": "raise pool size"}
            ]})
        };
        Ok(ChatResponse::text(format!("```json\n{}\n```", answer)))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

struct DownProvider;

#[async_trait]
impl LLMProvider for DownProvider {
    async fn chat(&self, _request: &ChatRequest) -> Result<ChatResponse, LLMError> {
        Err(LLMError::Network("connection refused".into()))
    }

    async fn health_check(&self) -> Result<(), LLMError> {
        Err(LLMError::Network("connection refused".into()))
    }
}

fn key(name: &str) -> ServiceKey {
    ServiceKey::new(name, "shop")
}

/// frontend -> api -> db, with api and db unhealthy
async fn chain_store() -> Arc<InMemoryDependencyGraph> {
    let store = Arc::new(InMemoryDependencyGraph::new());
    for (name, status) in [
        ("frontend", HealthStatus::Degraded),
        ("api", HealthStatus::Unhealthy),
        ("db", HealthStatus::Unhealthy),
    ] {
        store
            .upsert_service(&ServiceNode::new(name, "shop", "service").with_status(status))
            .await
            .unwrap();
    }
    store
        .upsert_dependency(&DependencyEdge::new(key("frontend"), key("api")))
        .await
        .unwrap();
    store
        .upsert_dependency(&DependencyEdge::new(key("api"), key("db")))
        .await
        .unwrap();
    store
}

/// Status tool reporting restarts and CPU above the rule thresholds, plus an
/// apply tool recording every manifest
fn fake_tools() -> (ToolRegistry, Arc<Mutex<Vec<String>>>) {
    let applied = Arc::new(Mutex::new(Vec::new()));
    let sink = applied.clone();
    let mut tools = ToolRegistry::new();
    tools.register(
        ToolSchema::new("get_service_status", "Get the status of a Kubernetes service")
            .param("service_name", ParameterSpec::required(ParameterType::String))
            .param("namespace", ParameterSpec::required(ParameterType::String)),
        Arc::new(FnTool(|_args: ToolArguments| -> Result<Value, ToolError> {
            Ok(json!({"restarts": 12, "cpu_usage": 95.0}))
        })),
    );
    tools.register(
        ToolSchema::new("apply_yaml_patch", "Apply a YAML patch")
            .param("yaml_content", ParameterSpec::required(ParameterType::String))
            .param("namespace", ParameterSpec::required(ParameterType::String)),
        Arc::new(FnTool(move |args: ToolArguments| -> Result<Value, ToolError> {
            let yaml = args
                .get("yaml_content")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            sink.lock().push(yaml);
            Ok(json!({"success": true}))
        })),
    );
    (tools, applied)
}

async fn orchestrator(
    pipeline: &PipelineConfig,
    provider: Option<Arc<dyn LLMProvider>>,
) -> (Orchestrator, Arc<Mutex<Vec<String>>>) {
    let (tools, applied) = fake_tools();
    let orchestrator = Orchestrator::new(EventBus::with_default_capacity());
    orchestrator.register_all(default_agents(pipeline, chain_store().await, &tools, provider));
    (orchestrator, applied)
}

fn symptoms(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_full_flow_with_rules_only() {
    let pipeline = PipelineConfig {
        auto_execute: true,
        ..PipelineConfig::default()
    };
    let (orchestrator, applied) = orchestrator(&pipeline, None).await;

    let summary = orchestrator
        .run(&default_flow(), "INC-100", "frontend", "shop", symptoms(&["pod crash"]))
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.history.len(), 4);
    assert!(summary.history.iter().all(|h| h.result.success));

    let agents: Vec<&str> = summary.findings.iter().map(|f| f.agent.as_str()).collect();
    assert_eq!(
        agents,
        vec![TRIAGE, ROOT_CAUSE_ANALYSIS, REMEDIATION_ADVICE, ACTION_EXECUTION]
    );

    let triage = &summary.findings[0].data;
    assert_eq!(triage["severity"], "critical");
    assert_eq!(triage["classification_source"], "rules");

    let root_causes = summary.findings[1].data["root_causes"].as_array().unwrap();
    let services: Vec<&str> = root_causes
        .iter()
        .filter_map(|c| c["service"].as_str())
        .collect();
    assert_eq!(services, vec!["api", "db"]);

    let remediation = &summary.findings[2].data;
    assert_eq!(remediation["proposed_actions"].as_array().unwrap().len(), 2);
    // two threshold rules plus two root causes
    assert_eq!(remediation["recommendations"].as_array().unwrap().len(), 4);

    assert_eq!(summary.actions.len(), 2);
    assert!(summary.actions.iter().all(|a| a["status"] == "executed"));
    assert_eq!(applied.lock().len(), 2);
}

#[tokio::test]
async fn test_full_flow_with_reasoning_service() {
    let pipeline = PipelineConfig::default();
    let (orchestrator, applied) =
        orchestrator(&pipeline, Some(Arc::new(RoutingProvider) as Arc<dyn LLMProvider>)).await;

    let summary = orchestrator
        .run(&default_flow(), "INC-101", "frontend", "shop", symptoms(&["checkout slow"]))
        .await;

    let triage = &summary.findings[0].data;
    assert_eq!(triage["severity"], "high");
    assert_eq!(triage["classification_source"], "llm");

    let synthesis = &summary.findings[1].data["synthesis"];
    assert_eq!(synthesis["primary_root_cause"], "db");

    let remediation = &summary.findings[2].data;
    // the duplicate of the restart rule is dropped
    assert_eq!(remediation["recommendation_sources"]["llm"], 1);
    assert_eq!(remediation["recommendations"].as_array().unwrap().len(), 5);

    // nothing is critical and auto-execution is off
    assert!(summary.actions.iter().all(|a| a["status"] == "pending_approval"));
    assert_eq!(summary.actions.len(), 2);
    assert!(applied.lock().is_empty());
}

#[tokio::test]
async fn test_reasoning_outage_falls_back_to_rules() {
    let (orchestrator, _) = orchestrator(
        &PipelineConfig::default(),
        Some(Arc::new(DownProvider) as Arc<dyn LLMProvider>),
    )
    .await;

    let summary = orchestrator
        .run(&default_flow(), "INC-102", "frontend", "shop", symptoms(&["high latency"]))
        .await;

    assert_eq!(summary.status, RunStatus::Completed);
    assert_eq!(summary.findings[0].data["severity"], "high");
    assert_eq!(summary.findings[0].data["classification_source"], "rules");
    assert!(summary.findings[2].data.contains_key("llm_error"));
}

#[tokio::test]
async fn test_empty_flow_and_unknown_step() {
    let (orchestrator, _) = orchestrator(&PipelineConfig::default(), None).await;

    let empty = orchestrator
        .run(&[], "INC-103", "frontend", "shop", vec![])
        .await;
    assert!(empty.steps.is_empty());
    assert!(empty.findings.is_empty());

    let flow = vec!["postmortem".to_string(), TRIAGE.to_string()];
    let summary = orchestrator
        .run(&flow, "INC-104", "frontend", "shop", vec![])
        .await;
    assert!(matches!(
        &summary.steps[0],
        StepRecord::MissingAgent { error, .. } if error == "Agent postmortem not found"
    ));
    assert_eq!(summary.findings.len(), 1);
    assert_eq!(summary.findings[0].data["severity"], "unknown");
}

#[tokio::test]
async fn test_executor_terminates_before_later_steps() {
    let (orchestrator, _) = orchestrator(&PipelineConfig::default(), None).await;
    let flow = vec![ACTION_EXECUTION.to_string(), TRIAGE.to_string()];

    let summary = orchestrator
        .run(&flow, "INC-105", "frontend", "shop", vec![])
        .await;

    assert_eq!(summary.status, RunStatus::Terminated);
    assert_eq!(summary.steps.len(), 1);
}

#[tokio::test]
async fn test_cancelled_run_stops_scheduling() {
    let (orchestrator, _) = orchestrator(&PipelineConfig::default(), None).await;
    let cancel = CancellationToken::new();
    cancel.cancel();

    let summary = orchestrator
        .run_with_cancellation(&default_flow(), "INC-106", "frontend", "shop", vec![], &cancel)
        .await;

    assert_eq!(summary.status, RunStatus::Cancelled);
    assert!(summary.history.is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let (orchestrator, _) = orchestrator(&PipelineConfig::default(), None).await;
    let orchestrator = Arc::new(orchestrator);

    let mut handles = Vec::new();
    for (i, symptom) in ["crash", "slow", "disk full"].into_iter().enumerate() {
        let orchestrator = orchestrator.clone();
        handles.push(tokio::spawn(async move {
            orchestrator
                .run(
                    &default_flow(),
                    &format!("INC-2{}", i),
                    "frontend",
                    "shop",
                    vec![symptom.to_string()],
                )
                .await
        }));
    }

    let mut severities = Vec::new();
    for handle in handles {
        let summary = handle.await.unwrap();
        assert_eq!(summary.findings.len(), 4);
        severities.push(summary.findings[0].data["severity"].as_str().unwrap().to_string());
    }
    assert_eq!(severities, vec!["critical", "high", "medium"]);

    let status = orchestrator.agent_status();
    assert_eq!(status.len(), 4);
}

#[tokio::test]
async fn test_agents_listed_by_name() {
    let (orchestrator, _) = orchestrator(&PipelineConfig::default(), None).await;
    let mut expected = default_flow();
    expected.sort();
    assert_eq!(orchestrator.agent_names(), expected);

    // re-registering replaces rather than duplicates
    let (tools, _) = fake_tools();
    let agents: Vec<Arc<dyn IncidentAgent>> = default_agents(
        &PipelineConfig::default(),
        chain_store().await,
        &tools,
        None,
    );
    orchestrator.register_all(agents);
    assert_eq!(orchestrator.agent_names().len(), 4);
}
