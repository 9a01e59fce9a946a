// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Agent contract
//!
//! Every pipeline step is an [`IncidentAgent`]. Agents never return errors to
//! the orchestrator: any failure becomes `AgentResult { success: false }`.

use async_trait::async_trait;
use parking_lot::Mutex;

use aether_cortex::GraphError;

use crate::domain::incident::{AgentContext, AgentResult, AgentState};
use crate::domain::llm::LLMError;
use crate::domain::tool::ToolError;

/// Canonical step names of the default flow
pub const TRIAGE: &str = "triage";
pub const ROOT_CAUSE_ANALYSIS: &str = "root_cause_analysis";
pub const REMEDIATION_ADVICE: &str = "remediation_advice";
pub const ACTION_EXECUTION: &str = "action_execution";

pub fn default_flow() -> Vec<String> {
    [TRIAGE, ROOT_CAUSE_ANALYSIS, REMEDIATION_ADVICE, ACTION_EXECUTION]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

#[async_trait]
pub trait IncidentAgent: Send + Sync {
    /// Unique name the agent is registered and addressed by
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run one step against a read-only view of the context
    async fn execute(&self, context: &AgentContext) -> AgentResult;

    /// Last observed lifecycle state
    fn state(&self) -> AgentState;
}

/// Interior-mutable lifecycle state an agent updates while executing
#[derive(Debug, Default)]
pub struct AgentStateCell(Mutex<AgentState>);

impl AgentStateCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, state: AgentState) {
        *self.0.lock() = state;
    }

    pub fn get(&self) -> AgentState {
        *self.0.lock()
    }
}

/// Failures inside an agent, before they are folded into a result
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("Reasoning service error: {0}")]
    Reasoning(#[from] LLMError),

    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("Prompt rendering failed: {0}")]
    Prompt(String),

    #[error("Unusable reasoning output: {0}")]
    InvalidOutput(String),
}
