// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Triage: severity and category classification
//!
//! Asks the reasoning service first when one is configured. Any failure or an
//! answer outside the allowed vocabulary falls back to keyword rules.

use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::reasoning::ReasoningEngine;
use crate::application::tool_invocation_service::ToolRegistry;
use crate::domain::agent::{AgentStateCell, IncidentAgent, ROOT_CAUSE_ANALYSIS, TRIAGE};
use crate::domain::incident::{AgentContext, AgentResult, AgentState, Category, DataMap, Severity};
use crate::infrastructure::prompt_template_engine::PromptContext;

const INSTRUCTIONS: &str = "Classify the incident. Respond with a JSON object only:
{\"severity\": \"critical|high|medium|low|unknown\", \"category\": \"availability|performance|resource|security|degradation|unknown\", \"reasoning\": \"one sentence\"}";

/// Keyword groups in priority order; the first group with a hit wins
const RULES: &[(&[&str], Severity, Category)] = &[
    (
        &["crash", "error", "failure", "down"],
        Severity::Critical,
        Category::Availability,
    ),
    (
        &["slow", "latency", "timeout", "performance"],
        Severity::High,
        Category::Performance,
    ),
    (
        &["memory", "cpu", "disk", "resource"],
        Severity::Medium,
        Category::Resource,
    ),
    (&["warning", "degraded"], Severity::Low, Category::Degradation),
];

/// Deterministic classification from symptom keywords
pub fn classify_by_rules(symptoms: &[String]) -> (Severity, Category) {
    let symptoms: Vec<String> = symptoms.iter().map(|s| s.to_lowercase()).collect();

    RULES
        .iter()
        .find(|(keywords, _, _)| {
            symptoms
                .iter()
                .any(|symptom| keywords.iter().any(|k| symptom.contains(k)))
        })
        .map(|(_, severity, category)| (*severity, *category))
        .unwrap_or((Severity::Unknown, Category::Unknown))
}

pub struct TriageAgent {
    engine: Option<Arc<ReasoningEngine>>,
    state: AgentStateCell,
}

impl TriageAgent {
    pub fn new(engine: Option<Arc<ReasoningEngine>>) -> Self {
        Self {
            engine,
            state: AgentStateCell::new(),
        }
    }

    /// Classification from the reasoning service, if it gave a valid one
    async fn classify_with_llm(
        &self,
        engine: &ReasoningEngine,
        context: &AgentContext,
    ) -> Option<(Severity, Category, Option<String>)> {
        let prompt = PromptContext::for_agent(TRIAGE, self.description())
            .incident(context)
            .instructions(INSTRUCTIONS);

        let reasoning = match engine.reason(prompt, &ToolRegistry::new(), &self.state).await {
            Ok(reasoning) => reasoning,
            Err(e) => {
                warn!(error = %e, "Triage reasoning failed, using keyword rules");
                return None;
            }
        };

        let field = |name: &str| reasoning.data.get(name).and_then(|v| v.as_str());
        let severity = field("severity").and_then(Severity::parse);
        let category = field("category").and_then(Category::parse);

        match (severity, category) {
            (Some(severity), Some(category)) => Some((
                severity,
                category,
                field("reasoning").map(String::from),
            )),
            _ => {
                warn!(
                    severity = ?field("severity"),
                    category = ?field("category"),
                    "Triage answer outside the allowed values, using keyword rules"
                );
                None
            }
        }
    }
}

#[async_trait]
impl IncidentAgent for TriageAgent {
    fn name(&self) -> &str {
        TRIAGE
    }

    fn description(&self) -> &str {
        "Classifies incidents and determines severity"
    }

    async fn execute(&self, context: &AgentContext) -> AgentResult {
        self.state.set(AgentState::Thinking);

        let llm = match &self.engine {
            Some(engine) => self.classify_with_llm(engine, context).await,
            None => None,
        };

        let mut data = DataMap::new();
        let (severity, category) = match llm {
            Some((severity, category, reasoning)) => {
                data.insert("classification_source".into(), json!("llm"));
                if let Some(reasoning) = reasoning {
                    data.insert("reasoning".into(), json!(reasoning));
                }
                (severity, category)
            }
            None => {
                data.insert("classification_source".into(), json!("rules"));
                classify_by_rules(&context.symptoms)
            }
        };
        data.insert("severity".into(), json!(severity.as_str()));
        data.insert("category".into(), json!(category.as_str()));

        info!(
            incident_id = %context.incident_id,
            severity = severity.as_str(),
            category = category.as_str(),
            "Incident classified"
        );

        self.state.set(AgentState::Completed);
        AgentResult::success(
            format!(
                "Incident classified as {} severity, {} category",
                severity.as_str(),
                category.as_str()
            ),
            data,
        )
        .with_next_agent(ROOT_CAUSE_ANALYSIS)
    }

    fn state(&self) -> AgentState {
        self.state.get()
    }
}
