// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agents;
pub mod orchestrator;
pub mod reasoning;
pub mod tool_invocation_service;

// Re-export the pipeline entry points for convenience
pub use agents::default_agents;
pub use orchestrator::Orchestrator;
pub use reasoning::{LlmAgent, ReasoningEngine};
pub use tool_invocation_service::ToolRegistry;
