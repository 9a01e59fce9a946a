// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Prompt Template Engine
//!
//! Renders the system and user instructions sent to the reasoning service,
//! using Handlebars for placeholder substitution.
//!
//! # Supported Placeholders
//!
//! - `{{agent_name}}`, `{{agent_description}}` - the agent being run
//! - `{{#each tools}}{{name}}: {{description}}{{/each}}` - its tool list
//! - `{{incident_id}}`, `{{service}}`, `{{namespace}}`
//! - `{{symptoms}}` - comma separated symptom tags
//! - `{{findings}}`, `{{actions}}` - pretty-printed JSON
//! - `{{instructions}}` - agent-specific answer format

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;

use crate::domain::aether_config::PromptOverrides;
use crate::domain::incident::AgentContext;

pub const DEFAULT_SYSTEM_TEMPLATE: &str = "You are {{agent_name}}, an AI operations agent.
{{agent_description}}
{{#if tools}}
Available tools:
{{#each tools}}- {{name}}: {{description}}
{{/each}}{{/if}}
Always provide structured, actionable responses. If you need to use tools, do so systematically.
{{#if instructions}}
{{instructions}}
{{/if}}";

pub const DEFAULT_USER_TEMPLATE: &str = "Incident ID: {{incident_id}}
Service: {{service}} (namespace: {{namespace}})
Symptoms: {{symptoms}}
Findings so far: {{findings}}
Actions taken: {{actions}}

What should be done next? Analyze the situation and provide specific recommendations.";

#[derive(Debug, Clone, Serialize)]
pub struct ToolLine {
    pub name: String,
    pub description: String,
}

/// Context data for prompt rendering
#[derive(Debug, Clone, Default, Serialize)]
pub struct PromptContext {
    pub agent_name: String,
    pub agent_description: String,
    pub tools: Vec<ToolLine>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,

    pub incident_id: String,
    pub service: String,
    pub namespace: String,
    pub symptoms: String,
    pub findings: String,
    pub actions: String,
}

impl PromptContext {
    pub fn for_agent(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            agent_name: name.into(),
            agent_description: description.into(),
            ..Self::default()
        }
    }

    pub fn tool(mut self, name: impl Into<String>, description: impl Into<String>) -> Self {
        self.tools.push(ToolLine {
            name: name.into(),
            description: description.into(),
        });
        self
    }

    pub fn instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = Some(instructions.into());
        self
    }

    /// Serialise the incident context into the placeholders
    pub fn incident(mut self, context: &AgentContext) -> Self {
        self.incident_id = context.incident_id.clone();
        self.service = context.service_name.clone();
        self.namespace = context.namespace.clone();
        self.symptoms = context.symptoms.join(", ");
        self.findings =
            serde_json::to_string_pretty(context.findings()).unwrap_or_else(|_| "[]".to_string());
        self.actions = serde_json::to_string_pretty(context.actions_taken())
            .unwrap_or_else(|_| "[]".to_string());
        self
    }
}

pub struct PromptTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl PromptTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        // prompts are plain text, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);
        Self { handlebars }
    }

    pub fn render(&self, template: &str, context: &PromptContext) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render prompt template")
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }

    /// Compile every configured prompt override
    pub fn validate_overrides(&self, prompts: &PromptOverrides) -> Result<()> {
        if let Some(system) = &prompts.system_template {
            self.validate_template(system)
                .context("pipeline.prompts.system_template")?;
        }
        if let Some(user) = &prompts.user_template {
            self.validate_template(user)
                .context("pipeline.prompts.user_template")?;
        }
        Ok(())
    }
}

impl Default for PromptTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::incident::{DataMap, Finding};

    #[test]
    fn test_system_prompt_lists_tools() {
        let engine = PromptTemplateEngine::new();
        let context = PromptContext::for_agent("root_cause_analysis", "Finds root causes")
            .tool("get_service_status", "Get the status of a Kubernetes service")
            .tool("query_metrics", "Query Prometheus metrics");

        let prompt = engine.render(DEFAULT_SYSTEM_TEMPLATE, &context).unwrap();
        assert!(prompt.starts_with("You are root_cause_analysis"));
        assert!(prompt.contains("- get_service_status: Get the status"));
        assert!(prompt.contains("- query_metrics:"));
    }

    #[test]
    fn test_system_prompt_without_tools() {
        let engine = PromptTemplateEngine::new();
        let context = PromptContext::for_agent("triage", "Classifies incidents");
        let prompt = engine.render(DEFAULT_SYSTEM_TEMPLATE, &context).unwrap();
        assert!(!prompt.contains("Available tools"));
    }

    #[test]
    fn test_user_prompt_serialises_context() {
        let engine = PromptTemplateEngine::new();
        let mut incident = AgentContext::new(
            "INC-42",
            "checkout",
            "shop",
            vec!["latency".into(), "5xx errors".into()],
        );
        incident.push_finding(Finding {
            agent: "triage".into(),
            message: "critical/availability".into(),
            data: DataMap::new(),
        });

        let context = PromptContext::for_agent("x", "y").incident(&incident);
        let prompt = engine.render(DEFAULT_USER_TEMPLATE, &context).unwrap();

        assert!(prompt.contains("Incident ID: INC-42"));
        assert!(prompt.contains("Service: checkout (namespace: shop)"));
        assert!(prompt.contains("Symptoms: latency, 5xx errors"));
        assert!(prompt.contains("\"agent\": \"triage\""));
        assert!(prompt.contains("Actions taken: []"));
    }

    #[test]
    fn test_validate_template() {
        let engine = PromptTemplateEngine::new();
        assert!(engine.validate_template(DEFAULT_SYSTEM_TEMPLATE).is_ok());
        assert!(engine.validate_template("{{agent_name").is_err());
    }

    #[test]
    fn test_validate_overrides() {
        let engine = PromptTemplateEngine::new();
        assert!(engine.validate_overrides(&PromptOverrides::default()).is_ok());

        let good = PromptOverrides {
            system_template: Some("You are {{agent_name}}.".into()),
            user_template: None,
        };
        assert!(engine.validate_overrides(&good).is_ok());

        let broken = PromptOverrides {
            system_template: None,
            user_template: Some("Service: {{#if service}}{{service}}".into()),
        };
        let err = engine.validate_overrides(&broken).unwrap_err();
        assert!(format!("{:#}", err).contains("pipeline.prompts.user_template"));
    }
}
