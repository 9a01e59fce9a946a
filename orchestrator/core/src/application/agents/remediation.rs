// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Remediation advice from earlier findings
//!
//! Rules run first and always contribute. Reasoning-service recommendations
//! are added after them according to the configured merge policy.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::reasoning::ReasoningEngine;
use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::aether_config::{RecommendationMerge, RemediationPolicy};
use crate::domain::agent::{
    AgentError, AgentStateCell, IncidentAgent, ACTION_EXECUTION, REMEDIATION_ADVICE,
};
use crate::domain::incident::{AgentContext, AgentResult, AgentState, DataMap};
use crate::infrastructure::prompt_template_engine::PromptContext;

const INSTRUCTIONS: &str = "Recommend remediations for this incident. Respond with a JSON object only:
{\"recommendations\": [{\"issue\": \"...\", \"severity\": \"high|medium|low\", \"suggestion\": \"...\"}]}";

pub struct RemediationAdvisorAgent {
    tools: ToolRegistry,
    engine: Option<Arc<ReasoningEngine>>,
    policy: RemediationPolicy,
    state: AgentStateCell,
}

/// Typed analysis entries, both nested under `data.findings` and at the top
/// level of a finding's data
fn typed_findings(context: &AgentContext) -> Vec<&DataMap> {
    let mut typed = Vec::new();
    for finding in context.findings() {
        if finding.data.contains_key("type") {
            typed.push(&finding.data);
        }
        if let Some(nested) = finding.data.get("findings").and_then(Value::as_array) {
            typed.extend(nested.iter().filter_map(Value::as_object));
        }
    }
    typed
}

/// Lower-cased alphanumeric words, single-spaced
fn normalize_issue(issue: &str) -> String {
    issue
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

fn as_number(value: &Value) -> f64 {
    value.as_f64().unwrap_or(0.0)
}

impl RemediationAdvisorAgent {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            engine: None,
            policy: RemediationPolicy::default(),
            state: AgentStateCell::new(),
        }
    }

    pub fn with_engine(mut self, engine: Arc<ReasoningEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn with_policy(mut self, policy: RemediationPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Rule-derived recommendations and proposed actions
    fn apply_rules(&self, context: &AgentContext) -> (Vec<Value>, Vec<Value>) {
        let mut recommendations = Vec::new();
        let mut actions = Vec::new();
        let mut root_causes = Vec::new();

        for finding in typed_findings(context) {
            match finding.get("type").and_then(Value::as_str) {
                Some("service_status") => {
                    let status = finding.get("data");
                    let metric = |name: &str| {
                        status
                            .and_then(|s| s.get(name))
                            .map(as_number)
                            .unwrap_or(0.0)
                    };

                    if metric("restarts") > self.policy.restart_threshold as f64 {
                        recommendations.push(json!({
                            "issue": "High pod restart count",
                            "severity": "high",
                            "suggestion": "Check resource limits and application logs",
                        }));
                        actions.push(json!({
                            "type": "scale",
                            "action": "increase_replicas",
                            "resource": context.service_name,
                            "namespace": context.namespace,
                        }));
                    }

                    if metric("cpu_usage") > self.policy.cpu_threshold {
                        recommendations.push(json!({
                            "issue": "High CPU usage",
                            "severity": "medium",
                            "suggestion": "Consider horizontal pod autoscaling or resource optimization",
                        }));
                        actions.push(json!({
                            "type": "resource",
                            "action": "increase_cpu_limit",
                            "resource": context.service_name,
                            "namespace": context.namespace,
                        }));
                    }
                }
                Some("multi_hop_analysis") => {
                    if let Some(causes) = finding.get("root_causes").and_then(Value::as_array) {
                        root_causes.extend(causes.iter());
                    }
                }
                _ => {}
            }
        }

        root_causes.sort_by(|a, b| {
            as_number(&b["impact_score"]).total_cmp(&as_number(&a["impact_score"]))
        });

        for cause in root_causes.into_iter().take(self.policy.top_root_causes) {
            let service = cause["service"].as_str().unwrap_or("unknown");
            let impact = as_number(&cause["impact_score"]);
            recommendations.push(json!({
                "issue": format!("Dependency issue with {}", service),
                "severity": if impact > self.policy.high_impact_threshold { "high" } else { "medium" },
                "suggestion": format!("Investigate {} (impact score: {:.2})", service, impact),
            }));
        }

        (recommendations, actions)
    }

    async fn llm_recommendations(
        &self,
        engine: &ReasoningEngine,
        context: &AgentContext,
        rules: &[Value],
    ) -> Result<Vec<Value>, AgentError> {
        let rule_output = serde_json::to_string_pretty(rules)
            .map_err(|e| AgentError::InvalidOutput(e.to_string()))?;
        let prompt = PromptContext::for_agent(REMEDIATION_ADVICE, self.description())
            .incident(context)
            .instructions(format!(
                "{}\n\nRule-based recommendations already made:\n{}",
                INSTRUCTIONS, rule_output
            ));

        let reasoning = engine.reason(prompt, &self.tools, &self.state).await?;
        let recommendations = reasoning
            .data
            .get("recommendations")
            .and_then(Value::as_array)
            .ok_or_else(|| AgentError::InvalidOutput("no recommendations array".into()))?;

        Ok(recommendations
            .iter()
            .filter(|r| r.get("issue").and_then(Value::as_str).is_some())
            .map(|r| {
                let mut r = r.clone();
                r["source"] = json!("llm");
                r
            })
            .collect())
    }

    fn merge(&self, recommendations: &mut Vec<Value>, extra: Vec<Value>) -> usize {
        let mut seen: HashSet<String> = recommendations
            .iter()
            .filter_map(|r| r["issue"].as_str().map(normalize_issue))
            .collect();

        let mut added = 0;
        for recommendation in extra {
            if self.policy.merge == RecommendationMerge::Deduplicate {
                let issue = normalize_issue(recommendation["issue"].as_str().unwrap_or_default());
                if !seen.insert(issue) {
                    continue;
                }
            }
            recommendations.push(recommendation);
            added += 1;
        }
        added
    }
}

#[async_trait]
impl IncidentAgent for RemediationAdvisorAgent {
    fn name(&self) -> &str {
        REMEDIATION_ADVICE
    }

    fn description(&self) -> &str {
        "Suggests and generates remediation actions"
    }

    async fn execute(&self, context: &AgentContext) -> AgentResult {
        self.state.set(AgentState::Thinking);

        let (mut recommendations, actions) = self.apply_rules(context);
        let from_rules = recommendations.len();
        let mut data = DataMap::new();

        let mut from_llm = 0;
        if let Some(engine) = &self.engine {
            match self
                .llm_recommendations(engine, context, &recommendations)
                .await
            {
                Ok(extra) => from_llm = self.merge(&mut recommendations, extra),
                Err(e) => {
                    warn!(error = %e, "Reasoning recommendations unavailable");
                    data.insert("llm_error".into(), json!(e.to_string()));
                }
            }
        }

        info!(
            incident_id = %context.incident_id,
            from_rules,
            from_llm,
            actions = actions.len(),
            "Remediation advice ready"
        );

        let message = format!(
            "Generated {} recommendations and {} actions",
            recommendations.len(),
            actions.len()
        );
        data.insert("recommendations".into(), Value::Array(recommendations));
        data.insert("proposed_actions".into(), Value::Array(actions));
        data.insert(
            "recommendation_sources".into(),
            json!({ "rules": from_rules, "llm": from_llm }),
        );

        self.state.set(AgentState::Completed);
        AgentResult::success(message, data).with_next_agent(ACTION_EXECUTION)
    }

    fn state(&self) -> AgentState {
        self.state.get()
    }
}
