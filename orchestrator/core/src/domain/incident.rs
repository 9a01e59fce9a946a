// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Incident run state shared between agents
//!
//! An [`AgentContext`] lives for exactly one pipeline run. Agents read it,
//! the orchestrator is the only writer: it appends findings for successful
//! results and extends the action log, never removing anything.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

/// Structured payload carried by results and findings
pub type DataMap = serde_json::Map<String, Value>;

/// Unique identifier of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(pub Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A successful agent result as recorded in the context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub agent: String,
    pub message: String,
    pub data: DataMap,
}

/// Shared, accumulating state of one incident run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
    pub incident_id: String,
    pub service_name: String,
    pub namespace: String,
    pub symptoms: Vec<String>,
    findings: Vec<Finding>,
    actions_taken: Vec<Value>,
    #[serde(default)]
    pub metadata: DataMap,
}

impl AgentContext {
    pub fn new(
        incident_id: impl Into<String>,
        service_name: impl Into<String>,
        namespace: impl Into<String>,
        symptoms: Vec<String>,
    ) -> Self {
        Self {
            incident_id: incident_id.into(),
            service_name: service_name.into(),
            namespace: namespace.into(),
            symptoms,
            findings: Vec::new(),
            actions_taken: Vec::new(),
            metadata: DataMap::new(),
        }
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn actions_taken(&self) -> &[Value] {
        &self.actions_taken
    }

    /// Findings produced by a specific agent, oldest first
    pub fn findings_from<'a>(&'a self, agent: &'a str) -> impl Iterator<Item = &'a Finding> + 'a {
        self.findings.iter().filter(move |f| f.agent == agent)
    }

    pub fn push_finding(&mut self, finding: Finding) {
        self.findings.push(finding);
    }

    pub fn extend_actions(&mut self, actions: impl IntoIterator<Item = Value>) {
        self.actions_taken.extend(actions);
    }
}

/// Outcome of one agent invocation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub success: bool,
    pub message: String,
    #[serde(default)]
    pub data: DataMap,
    /// Suggestion only; the pipeline follows its configured flow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_agent: Option<String>,
    #[serde(default)]
    pub terminate: bool,
}

impl AgentResult {
    pub fn success(message: impl Into<String>, data: DataMap) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            next_agent: None,
            terminate: false,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: DataMap::new(),
            next_agent: None,
            terminate: false,
        }
    }

    pub fn with_next_agent(mut self, agent: impl Into<String>) -> Self {
        self.next_agent = Some(agent.into());
        self
    }

    pub fn terminating(mut self) -> Self {
        self.terminate = true;
        self
    }

    /// `data.actions` when it is an array
    pub fn reported_actions(&self) -> Option<&Vec<Value>> {
        self.data.get("actions").and_then(Value::as_array)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionHistoryEntry {
    pub timestamp: DateTime<Utc>,
    pub agent: String,
    pub result: AgentResult,
}

/// Lifecycle of an agent across one invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentState {
    #[default]
    Idle,
    Thinking,
    Executing,
    Completed,
    Error,
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AgentState::Idle => "idle",
            AgentState::Thinking => "thinking",
            AgentState::Executing => "executing",
            AgentState::Completed => "completed",
            AgentState::Error => "error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Unknown,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Unknown => "unknown",
        }
    }

    /// Strict parse; anything outside the allowed set is rejected
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "unknown" => Some(Severity::Unknown),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Availability,
    Performance,
    Resource,
    Security,
    Degradation,
    Unknown,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Availability => "availability",
            Category::Performance => "performance",
            Category::Resource => "resource",
            Category::Security => "security",
            Category::Degradation => "degradation",
            Category::Unknown => "unknown",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "availability" => Some(Category::Availability),
            "performance" => Some(Category::Performance),
            "resource" => Some(Category::Resource),
            "security" => Some(Category::Security),
            "degradation" => Some(Category::Degradation),
            "unknown" => Some(Category::Unknown),
            _ => None,
        }
    }
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every step in the flow was visited
    Completed,
    /// An agent asked to stop early
    Terminated,
    Cancelled,
}

/// Per-step record in a run summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepRecord {
    Invoked { agent: String, result: AgentResult },
    MissingAgent { agent: String, error: String },
}

impl StepRecord {
    pub fn agent(&self) -> &str {
        match self {
            StepRecord::Invoked { agent, .. } | StepRecord::MissingAgent { agent, .. } => agent,
        }
    }
}

/// Everything a caller gets back from a pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: RunId,
    pub incident_id: String,
    pub service: String,
    pub namespace: String,
    pub status: RunStatus,
    pub steps: Vec<StepRecord>,
    pub findings: Vec<Finding>,
    pub actions: Vec<Value>,
    pub history: Vec<ExecutionHistoryEntry>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}
