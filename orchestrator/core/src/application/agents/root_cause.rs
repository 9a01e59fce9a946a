// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Root cause analysis over the dependency graph
//!
//! Every sub-step is independent: a store or tool failure becomes an
//! `{"type": "error"}` entry and the analysis carries on.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use aether_cortex::{DependencyGraphStore, Direction, GraphError, ServiceKey};

use crate::application::reasoning::ReasoningEngine;
use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::aether_config::RootCauseConfig;
use crate::domain::agent::{
    AgentError, AgentStateCell, IncidentAgent, REMEDIATION_ADVICE, ROOT_CAUSE_ANALYSIS,
};
use crate::domain::incident::{AgentContext, AgentResult, AgentState, DataMap};
use crate::infrastructure::prompt_template_engine::PromptContext;

pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(10);

const STATUS_TOOL: &str = "get_service_status";

const INSTRUCTIONS: &str = "Using the graph analysis below and any tool results, name the most \
likely root cause. Respond with a JSON object only:
{\"primary_root_cause\": \"service name\", \"confidence\": 0.0-1.0, \"narrative\": \"short explanation\"}";

pub struct RootCauseAnalysisAgent {
    store: Arc<dyn DependencyGraphStore>,
    tools: ToolRegistry,
    engine: Option<Arc<ReasoningEngine>>,
    config: RootCauseConfig,
    store_timeout: Duration,
    state: AgentStateCell,
}

impl RootCauseAnalysisAgent {
    pub fn new(store: Arc<dyn DependencyGraphStore>, tools: ToolRegistry) -> Self {
        Self {
            store,
            tools,
            engine: None,
            config: RootCauseConfig::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
            state: AgentStateCell::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_config(mut self, config: RootCauseConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    async fn bounded<T>(
        &self,
        call: impl Future<Output = Result<T, GraphError>>,
    ) -> Result<T, AgentError> {
        match tokio::time::timeout(self.store_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(GraphError::StoreUnavailable(format!(
                "no response within {:?}",
                self.store_timeout
            ))
            .into()),
        }
    }

    async fn synthesize(
        &self,
        engine: &ReasoningEngine,
        context: &AgentContext,
        findings: &[Value],
    ) -> Result<Value, AgentError> {
        let analysis = serde_json::to_string_pretty(findings)
            .map_err(|e| AgentError::InvalidOutput(e.to_string()))?;
        let prompt = PromptContext::for_agent(ROOT_CAUSE_ANALYSIS, self.description())
            .incident(context)
            .instructions(format!("{}\n\nGraph analysis:\n{}", INSTRUCTIONS, analysis));

        let reasoning = engine.reason(prompt, &self.tools, &self.state).await?;
        let data = &reasoning.data;

        let confidence = data
            .get("confidence")
            .and_then(Value::as_f64)
            .filter(|c| c.is_finite())
            .unwrap_or(0.0)
            .clamp(0.0, 1.0);
        let narrative = data
            .get("narrative")
            .or_else(|| data.get("response"))
            .and_then(Value::as_str)
            .unwrap_or(&reasoning.text);

        Ok(json!({
            "type": "llm_synthesis",
            "primary_root_cause": data.get("primary_root_cause").cloned().unwrap_or(Value::Null),
            "confidence": confidence,
            "narrative": narrative,
            "tool_results": reasoning.tool_results,
        }))
    }
}

fn error_finding(what: &str, error: impl std::fmt::Display) -> Value {
    json!({ "type": "error", "message": format!("{} failed: {}", what, error) })
}

#[async_trait]
impl IncidentAgent for RootCauseAnalysisAgent {
    fn name(&self) -> &str {
        ROOT_CAUSE_ANALYSIS
    }

    fn description(&self) -> &str {
        "Performs multi-hop root cause analysis using the dependency graph"
    }

    async fn execute(&self, context: &AgentContext) -> AgentResult {
        self.state.set(AgentState::Thinking);

        let key = ServiceKey::new(&context.service_name, &context.namespace);
        let mut findings = Vec::new();
        let mut root_causes = Vec::new();

        match self
            .bounded(self.store.get_dependencies(&key, Direction::Upstream))
            .await
        {
            Ok(dependencies) => findings.push(json!({
                "type": "dependency_analysis",
                "description": format!("Found {} upstream dependencies", dependencies.len()),
                "dependencies": dependencies,
            })),
            Err(e) => {
                warn!(service = %key, error = %e, "Dependency lookup failed");
                findings.push(error_finding("Dependency graph query", e));
            }
        }

        match self
            .bounded(self.store.multi_hop_root_cause(
                &key,
                self.config.max_hops,
                self.config.min_impact_score,
            ))
            .await
        {
            Ok(candidates) => {
                debug!(service = %key, candidates = candidates.len(), "Multi-hop analysis done");
                root_causes = candidates;
                findings.push(json!({
                    "type": "multi_hop_analysis",
                    "root_causes": root_causes,
                }));
            }
            Err(e) => {
                warn!(service = %key, error = %e, "Multi-hop analysis failed");
                findings.push(error_finding("Multi-hop analysis", e));
            }
        }

        if self.tools.contains(STATUS_TOOL) {
            self.state.set(AgentState::Executing);
            let arguments = json!({
                "service_name": context.service_name,
                "namespace": context.namespace,
            });
            match self.tools.invoke(STATUS_TOOL, arguments).await {
                Ok(status) => findings.push(json!({ "type": "service_status", "data": status })),
                Err(e) => findings.push(error_finding("Status check", e)),
            }
        }

        let mut data = DataMap::new();
        if let Some(engine) = &self.engine {
            match self.synthesize(engine, context, &findings).await {
                Ok(synthesis) => {
                    data.insert("synthesis".into(), synthesis.clone());
                    findings.push(synthesis);
                }
                Err(e) => {
                    warn!(error = %e, "Root cause synthesis failed");
                    findings.push(error_finding("Root cause synthesis", e));
                }
            }
        }

        info!(
            service = %key,
            root_causes = root_causes.len(),
            "Root cause analysis complete"
        );

        data.insert("findings".into(), Value::Array(findings));
        data.insert("root_causes".into(), json!(root_causes));

        self.state.set(AgentState::Completed);
        AgentResult::success(
            format!(
                "Root cause analysis complete. Found {} potential root causes.",
                root_causes.len()
            ),
            data,
        )
        .with_next_agent(REMEDIATION_ADVICE)
    }

    fn state(&self) -> AgentState {
        self.state.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::reasoning::tests::ScriptedProvider;
    use crate::domain::llm::ChatResponse;
    use crate::domain::tool::{FnTool, ParameterSpec, ParameterType, ToolArguments, ToolError, ToolSchema};
    use aether_cortex::{
        DependencyEdge, HealthStatus, InMemoryDependencyGraph, Neighbor, RootCauseCandidate,
        ServiceNode, Topology,
    };

    async fn chain_store() -> Arc<InMemoryDependencyGraph> {
        let store = Arc::new(InMemoryDependencyGraph::new());
        for (name, status) in [
            ("frontend", HealthStatus::Degraded),
            ("api", HealthStatus::Unhealthy),
            ("db", HealthStatus::Unhealthy),
        ] {
            store
                .upsert_service(&ServiceNode::new(name, "default", "service").with_status(status))
                .await
                .unwrap();
        }
        let key = |n: &str| ServiceKey::new(n, "default");
        store
            .upsert_dependency(&DependencyEdge::new(key("frontend"), key("api")))
            .await
            .unwrap();
        store
            .upsert_dependency(
                &DependencyEdge::new(key("api"), key("db")).with_metric("latency_ms", 250.0),
            )
            .await
            .unwrap();
        store
    }

    fn status_tools(restarts: u64) -> ToolRegistry {
        let mut tools = ToolRegistry::new();
        tools.register(
            ToolSchema::new(STATUS_TOOL, "status")
                .param("service_name", ParameterSpec::required(ParameterType::String))
                .param("namespace", ParameterSpec::required(ParameterType::String)),
            Arc::new(FnTool(move |_args: ToolArguments| -> Result<Value, ToolError> {
                Ok(json!({ "restarts": restarts, "cpu_usage": 12.0 }))
            })),
        );
        tools
    }

    fn context() -> AgentContext {
        AgentContext::new("INC-2", "frontend", "default", vec!["latency".into()])
    }

    fn typed<'a>(result: &'a AgentResult, kind: &str) -> Vec<&'a Value> {
        result.data["findings"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|f| f["type"] == kind)
            .collect()
    }

    #[tokio::test]
    async fn test_chain_analysis() {
        let agent = RootCauseAnalysisAgent::new(chain_store().await, status_tools(9));
        let result = agent.execute(&context()).await;

        assert!(result.success);
        assert_eq!(result.next_agent.as_deref(), Some(REMEDIATION_ADVICE));

        let root_causes = result.data["root_causes"].as_array().unwrap();
        assert_eq!(root_causes.len(), 2);
        assert_eq!(root_causes[0]["service"], "api");
        assert_eq!(root_causes[1]["service"], "db");
        let score = root_causes[1]["impact_score"].as_f64().unwrap();
        assert!((score - 0.72).abs() < 1e-9);

        assert_eq!(typed(&result, "dependency_analysis").len(), 1);
        assert_eq!(typed(&result, "multi_hop_analysis").len(), 1);
        assert_eq!(typed(&result, "service_status")[0]["data"]["restarts"], 9);
        assert!(typed(&result, "error").is_empty());
    }

    #[tokio::test]
    async fn test_unknown_service_is_recorded_not_fatal() {
        let agent = RootCauseAnalysisAgent::new(chain_store().await, ToolRegistry::new());
        let ctx = AgentContext::new("INC-3", "ghost", "default", vec![]);
        let result = agent.execute(&ctx).await;

        assert!(result.success);
        assert_eq!(typed(&result, "error").len(), 2);
        assert_eq!(result.data["root_causes"], json!([]));
    }

    struct DownStore;

    #[async_trait]
    impl DependencyGraphStore for DownStore {
        async fn upsert_service(&self, _node: &ServiceNode) -> Result<(), GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn upsert_dependency(&self, _edge: &DependencyEdge) -> Result<(), GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn get_service(&self, _key: &ServiceKey) -> Result<Option<ServiceNode>, GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn update_service_status(
            &self,
            _key: &ServiceKey,
            _status: HealthStatus,
        ) -> Result<(), GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn get_dependencies(
            &self,
            _key: &ServiceKey,
            _direction: Direction,
        ) -> Result<Vec<Neighbor>, GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn multi_hop_root_cause(
            &self,
            _start: &ServiceKey,
            _max_hops: usize,
            _min_impact_score: f64,
        ) -> Result<Vec<RootCauseCandidate>, GraphError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(vec![])
        }
        async fn shortest_path(
            &self,
            _source: &ServiceKey,
            _target: &ServiceKey,
        ) -> Result<Vec<String>, GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn topology(&self, _namespace: Option<&str>) -> Result<Topology, GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
        async fn clear(&self) -> Result<(), GraphError> {
            Err(GraphError::StoreUnavailable("down".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_outage_and_timeout_become_findings() {
        let agent = RootCauseAnalysisAgent::new(Arc::new(DownStore), status_tools(0))
            .with_store_timeout(Duration::from_secs(2));
        let result = agent.execute(&context()).await;

        assert!(result.success);
        let errors = typed(&result, "error");
        assert_eq!(errors.len(), 2);
        assert!(errors[0]["message"].as_str().unwrap().contains("down"));
        assert!(errors[1]["message"].as_str().unwrap().contains("no response"));
        // the status check still ran
        assert_eq!(typed(&result, "service_status").len(), 1);
    }

    #[tokio::test]
    async fn test_synthesis_confidence_is_clamped() {
        let provider = Arc::new(ScriptedProvider::new(vec![Ok(ChatResponse::text(
            "{\"primary_root_cause\": \"db\", \"confidence\": 1.7, \"narrative\": \"db is slow\"}",
        ))]));
        let agent = RootCauseAnalysisAgent::new(chain_store().await, ToolRegistry::new())
            .with_engine(Arc::new(ReasoningEngine::new(provider.clone())));
        let result = agent.execute(&context()).await;

        let synthesis = &result.data["synthesis"];
        assert_eq!(synthesis["primary_root_cause"], "db");
        assert_eq!(synthesis["confidence"], 1.0);
        assert_eq!(synthesis["narrative"], "db is slow");
        assert_eq!(typed(&result, "llm_synthesis").len(), 1);

        let requests = provider.requests.lock();
        assert!(requests[0].messages[0].content.contains("multi_hop_analysis"));
    }

    #[tokio::test]
    async fn test_custom_hop_limit() {
        let agent = RootCauseAnalysisAgent::new(chain_store().await, ToolRegistry::new())
            .with_config(RootCauseConfig {
                max_hops: 1,
                min_impact_score: 0.5,
            });
        let result = agent.execute(&context()).await;
        assert_eq!(result.data["root_causes"].as_array().unwrap().len(), 1);
    }
}
