// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Executes remediation proposals
//!
//! Only proposals made by the remediation advisor are considered. Without
//! auto-execution, anything not marked critical waits for approval. This is
//! always the last step of a run.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::aether_config::ActionPolicy;
use crate::domain::agent::{AgentStateCell, IncidentAgent, ACTION_EXECUTION, REMEDIATION_ADVICE};
use crate::domain::incident::{AgentContext, AgentResult, AgentState, DataMap};
use crate::domain::tool::ToolError;
use crate::infrastructure::tools::patch::{resource_limits_manifest, scale_manifest};

const APPLY_TOOL: &str = "apply_yaml_patch";

pub struct ActionExecutorAgent {
    tools: ToolRegistry,
    auto_execute: bool,
    policy: ActionPolicy,
    state: AgentStateCell,
}

impl ActionExecutorAgent {
    pub fn new(tools: ToolRegistry, auto_execute: bool) -> Self {
        Self {
            tools,
            auto_execute,
            policy: ActionPolicy::default(),
            state: AgentStateCell::new(),
        }
    }

    pub fn with_policy(mut self, policy: ActionPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn approved(&self, action: &Value) -> bool {
        self.auto_execute || action.get("severity").and_then(Value::as_str) == Some("critical")
    }

    async fn apply(&self, action: &Value, context: &AgentContext) -> Result<Value, ToolError> {
        let resource = action
            .get("resource")
            .and_then(Value::as_str)
            .unwrap_or(&context.service_name);
        let namespace = action
            .get("namespace")
            .and_then(Value::as_str)
            .unwrap_or(&context.namespace);

        let manifest = match action.get("type").and_then(Value::as_str) {
            Some("scale") => scale_manifest(resource, namespace, self.policy.scale_replicas)?,
            Some("resource") => resource_limits_manifest(
                resource,
                namespace,
                &self.policy.container_name,
                &self.policy.cpu_limit,
                &self.policy.memory_limit,
            )?,
            other => {
                return Err(ToolError::failed(format!(
                    "Unsupported action type: {}",
                    other.unwrap_or("<missing>")
                )))
            }
        };

        self.tools
            .invoke(
                APPLY_TOOL,
                json!({ "yaml_content": manifest, "namespace": namespace }),
            )
            .await
    }
}

#[async_trait]
impl IncidentAgent for ActionExecutorAgent {
    fn name(&self) -> &str {
        ACTION_EXECUTION
    }

    fn description(&self) -> &str {
        "Executes approved remediation actions"
    }

    async fn execute(&self, context: &AgentContext) -> AgentResult {
        self.state.set(AgentState::Thinking);

        let proposals: Vec<&Value> = context
            .findings_from(REMEDIATION_ADVICE)
            .filter_map(|f| f.data.get("proposed_actions").and_then(Value::as_array))
            .flatten()
            .collect();

        let mut outcomes = Vec::with_capacity(proposals.len());
        let (mut executed, mut pending, mut failed) = (0, 0, 0);

        for action in proposals {
            if !self.approved(action) {
                pending += 1;
                outcomes.push(json!({ "action": action, "status": "pending_approval" }));
                continue;
            }

            self.state.set(AgentState::Executing);
            match self.apply(action, context).await {
                Ok(result) => {
                    executed += 1;
                    info!(action = %action["type"], "Remediation action executed");
                    outcomes.push(json!({ "action": action, "result": result, "status": "executed" }));
                }
                Err(e) => {
                    failed += 1;
                    warn!(action = %action["type"], error = %e, "Remediation action failed");
                    outcomes.push(json!({ "action": action, "error": e.to_string(), "status": "failed" }));
                }
            }
        }

        let mut data = DataMap::new();
        data.insert("actions".into(), Value::Array(outcomes));
        data.insert("executed".into(), json!(executed));
        data.insert("pending_approval".into(), json!(pending));
        data.insert("failed".into(), json!(failed));

        self.state.set(AgentState::Completed);
        AgentResult::success(
            format!(
                "Executed {} actions, {} pending approval, {} failed",
                executed, pending, failed
            ),
            data,
        )
        .terminating()
    }

    fn state(&self) -> AgentState {
        self.state.get()
    }
}
