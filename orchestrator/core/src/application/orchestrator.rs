// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Incident pipeline orchestrator
//!
//! Runs a flow of named agents strictly in order against one shared context.
//! A step naming an unregistered agent is recorded and skipped; a failed step
//! is recorded and the flow continues; a result with `terminate` set ends the
//! run. `next_agent` suggestions are logged and otherwise ignored.
//!
//! Independent runs share the registry and may run concurrently; each run
//! owns its own [`AgentContext`].

use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::agent::IncidentAgent;
use crate::domain::events::RunEvent;
use crate::domain::incident::{
    AgentContext, AgentState, ExecutionHistoryEntry, Finding, RunId, RunStatus, RunSummary,
    StepRecord,
};
use crate::infrastructure::event_bus::EventBus;

pub struct Orchestrator {
    agents: RwLock<HashMap<String, Arc<dyn IncidentAgent>>>,
    event_bus: EventBus,
}

impl Orchestrator {
    pub fn new(event_bus: EventBus) -> Self {
        Self {
            agents: RwLock::new(HashMap::new()),
            event_bus,
        }
    }

    /// Register an agent under its name, replacing any agent of that name
    pub fn register_agent(&self, agent: Arc<dyn IncidentAgent>) {
        let name = agent.name().to_string();
        if self.agents.write().insert(name.clone(), agent).is_some() {
            debug!(agent = %name, "Replaced registered agent");
        } else {
            debug!(agent = %name, "Registered agent");
        }
    }

    pub fn register_all(&self, agents: impl IntoIterator<Item = Arc<dyn IncidentAgent>>) {
        for agent in agents {
            self.register_agent(agent);
        }
    }

    pub fn agent_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.agents.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Last observed lifecycle state of every registered agent
    pub fn agent_status(&self) -> BTreeMap<String, AgentState> {
        self.agents
            .read()
            .iter()
            .map(|(name, agent)| (name.clone(), agent.state()))
            .collect()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    fn agent(&self, name: &str) -> Option<Arc<dyn IncidentAgent>> {
        self.agents.read().get(name).cloned()
    }

    pub async fn run(
        &self,
        flow: &[String],
        incident_id: &str,
        service_name: &str,
        namespace: &str,
        symptoms: Vec<String>,
    ) -> RunSummary {
        self.run_with_cancellation(
            flow,
            incident_id,
            service_name,
            namespace,
            symptoms,
            &CancellationToken::new(),
        )
        .await
    }

    /// Like [`Orchestrator::run`], checking `cancel` before every step.
    /// An agent already executing is allowed to finish.
    pub async fn run_with_cancellation(
        &self,
        flow: &[String],
        incident_id: &str,
        service_name: &str,
        namespace: &str,
        symptoms: Vec<String>,
        cancel: &CancellationToken,
    ) -> RunSummary {
        let run_id = RunId::new();
        let started_at = Utc::now();
        let mut context = AgentContext::new(incident_id, service_name, namespace, symptoms);
        let mut steps = Vec::with_capacity(flow.len());
        let mut history = Vec::with_capacity(flow.len());
        let mut status = RunStatus::Completed;

        info!(
            run_id = %run_id,
            incident_id = %incident_id,
            service = %service_name,
            namespace = %namespace,
            steps = flow.len(),
            "Starting incident run"
        );
        self.event_bus.publish(RunEvent::RunStarted {
            run_id,
            incident_id: incident_id.to_string(),
            service: service_name.to_string(),
            flow: flow.to_vec(),
            started_at,
        });

        for (index, agent_name) in flow.iter().enumerate() {
            if cancel.is_cancelled() {
                info!(run_id = %run_id, next_step = %agent_name, "Run cancelled");
                status = RunStatus::Cancelled;
                break;
            }

            let Some(agent) = self.agent(agent_name) else {
                let error = format!("Agent {} not found", agent_name);
                warn!(run_id = %run_id, agent = %agent_name, "{}", error);
                metrics::counter!("aether_agent_steps_total", "agent" => agent_name.clone(), "outcome" => "missing").increment(1);
                self.event_bus.publish(RunEvent::StepSkipped {
                    run_id,
                    agent: agent_name.clone(),
                    reason: error.clone(),
                    skipped_at: Utc::now(),
                });
                steps.push(StepRecord::MissingAgent {
                    agent: agent_name.clone(),
                    error,
                });
                continue;
            };

            self.event_bus.publish(RunEvent::StepStarted {
                run_id,
                agent: agent_name.clone(),
                step: index,
                started_at: Utc::now(),
            });
            debug!(run_id = %run_id, agent = %agent_name, step = index, "Executing agent");

            let result = agent.execute(&context).await;

            let outcome = if result.success { "success" } else { "failure" };
            metrics::counter!("aether_agent_steps_total", "agent" => agent_name.clone(), "outcome" => outcome).increment(1);

            if result.success {
                context.push_finding(Finding {
                    agent: agent_name.clone(),
                    message: result.message.clone(),
                    data: result.data.clone(),
                });
                if let Some(actions) = result.reported_actions() {
                    context.extend_actions(actions.iter().cloned());
                }
                info!(run_id = %run_id, agent = %agent_name, message = %result.message, "Step completed");
            } else {
                warn!(run_id = %run_id, agent = %agent_name, message = %result.message, "Step failed");
            }

            if let Some(next) = &result.next_agent {
                debug!(run_id = %run_id, agent = %agent_name, suggested = %next, "Agent suggested next step");
            }

            self.event_bus.publish(RunEvent::StepCompleted {
                run_id,
                agent: agent_name.clone(),
                success: result.success,
                message: result.message.clone(),
                terminate: result.terminate,
                completed_at: Utc::now(),
            });

            let terminate = result.terminate;
            history.push(ExecutionHistoryEntry {
                timestamp: Utc::now(),
                agent: agent_name.clone(),
                result: result.clone(),
            });
            steps.push(StepRecord::Invoked {
                agent: agent_name.clone(),
                result,
            });

            if terminate {
                info!(run_id = %run_id, agent = %agent_name, "Agent requested termination");
                status = if index + 1 < flow.len() {
                    RunStatus::Terminated
                } else {
                    RunStatus::Completed
                };
                break;
            }
        }

        let finished_at = Utc::now();
        self.event_bus.publish(RunEvent::RunFinished {
            run_id,
            status,
            steps: steps.len(),
            finished_at,
        });
        info!(
            run_id = %run_id,
            status = ?status,
            findings = context.findings().len(),
            actions = context.actions_taken().len(),
            "Incident run finished"
        );

        RunSummary {
            run_id,
            incident_id: context.incident_id.clone(),
            service: context.service_name.clone(),
            namespace: context.namespace.clone(),
            status,
            steps,
            findings: context.findings().to_vec(),
            actions: context.actions_taken().to_vec(),
            history,
            started_at,
            finished_at,
        }
    }
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(EventBus::with_default_capacity())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::agent::AgentStateCell;
    use crate::domain::incident::{AgentResult, DataMap};
    use async_trait::async_trait;
    use serde_json::json;

    /// Agent returning a fixed result and recording how many findings it saw
    struct FixedAgent {
        name: &'static str,
        result: AgentResult,
        seen_findings: parking_lot::Mutex<Vec<usize>>,
        state: AgentStateCell,
    }

    impl FixedAgent {
        fn new(name: &'static str, result: AgentResult) -> Arc<Self> {
            Arc::new(Self {
                name,
                result,
                seen_findings: parking_lot::Mutex::new(Vec::new()),
                state: AgentStateCell::new(),
            })
        }
    }

    #[async_trait]
    impl IncidentAgent for FixedAgent {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fixed"
        }

        async fn execute(&self, context: &AgentContext) -> AgentResult {
            self.seen_findings.lock().push(context.findings().len());
            self.state.set(AgentState::Completed);
            self.result.clone()
        }

        fn state(&self) -> AgentState {
            self.state.get()
        }
    }

    fn flow(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn with_actions(actions: serde_json::Value) -> AgentResult {
        let mut data = DataMap::new();
        data.insert("actions".into(), actions);
        AgentResult::success("ok", data)
    }

    #[tokio::test]
    async fn test_empty_flow() {
        let orchestrator = Orchestrator::default();
        let summary = orchestrator.run(&[], "INC-1", "api", "default", vec![]).await;

        assert_eq!(summary.status, RunStatus::Completed);
        assert!(summary.steps.is_empty());
        assert!(summary.findings.is_empty());
        assert!(summary.history.is_empty());
    }

    #[tokio::test]
    async fn test_missing_agent_is_recorded_and_skipped() {
        let orchestrator = Orchestrator::default();
        let b = FixedAgent::new("b", AgentResult::success("fine", DataMap::new()));
        orchestrator.register_agent(b.clone());

        let summary = orchestrator
            .run(&flow(&["a", "b"]), "INC-2", "api", "default", vec![])
            .await;

        assert_eq!(summary.steps.len(), 2);
        assert_eq!(
            summary.steps[0],
            StepRecord::MissingAgent {
                agent: "a".into(),
                error: "Agent a not found".into()
            }
        );
        assert_eq!(summary.steps[1].agent(), "b");
        assert_eq!(summary.history.len(), 1);
        assert_eq!(summary.findings.len(), 1);
        assert_eq!(*b.seen_findings.lock(), vec![0]);
    }

    #[tokio::test]
    async fn test_terminate_stops_run() {
        let orchestrator = Orchestrator::default();
        let stop = FixedAgent::new("stop", AgentResult::success("done", DataMap::new()).terminating());
        let never = FixedAgent::new("never", AgentResult::success("x", DataMap::new()));
        orchestrator.register_all([
            stop.clone() as Arc<dyn IncidentAgent>,
            never.clone() as Arc<dyn IncidentAgent>,
        ]);

        let summary = orchestrator
            .run(&flow(&["stop", "never"]), "INC-3", "api", "default", vec![])
            .await;

        assert_eq!(summary.status, RunStatus::Terminated);
        assert_eq!(summary.steps.len(), 1);
        assert!(never.seen_findings.lock().is_empty());
    }

    #[tokio::test]
    async fn test_terminate_on_last_step_completes() {
        let orchestrator = Orchestrator::default();
        orchestrator.register_agent(FixedAgent::new(
            "last",
            AgentResult::success("done", DataMap::new()).terminating(),
        ));
        let summary = orchestrator
            .run(&flow(&["last"]), "INC-3b", "api", "default", vec![])
            .await;
        assert_eq!(summary.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_failure_recorded_without_finding() {
        let orchestrator = Orchestrator::default();
        let after = FixedAgent::new("after", AgentResult::success("ok", DataMap::new()));
        orchestrator.register_all([
            FixedAgent::new("broken", AgentResult::failure("boom")) as Arc<dyn IncidentAgent>,
            after.clone() as Arc<dyn IncidentAgent>,
        ]);

        let summary = orchestrator
            .run(&flow(&["broken", "after"]), "INC-4", "api", "default", vec![])
            .await;

        assert_eq!(summary.history.len(), 2);
        assert!(!summary.history[0].result.success);
        assert_eq!(summary.findings.len(), 1);
        assert_eq!(summary.findings[0].agent, "after");
        assert_eq!(*after.seen_findings.lock(), vec![0]);
    }

    #[tokio::test]
    async fn test_actions_only_extended_from_arrays() {
        let orchestrator = Orchestrator::default();
        orchestrator.register_all([
            FixedAgent::new("list", with_actions(json!([{"a": 1}, {"a": 2}]))) as Arc<dyn IncidentAgent>,
            FixedAgent::new("scalar", with_actions(json!("restart"))) as Arc<dyn IncidentAgent>,
        ]);

        let summary = orchestrator
            .run(&flow(&["list", "scalar"]), "INC-5", "api", "default", vec![])
            .await;

        assert_eq!(summary.actions, vec![json!({"a": 1}), json!({"a": 2})]);
        assert_eq!(summary.findings.len(), 2);
    }

    #[tokio::test]
    async fn test_register_overwrites_by_name() {
        let orchestrator = Orchestrator::default();
        orchestrator.register_agent(FixedAgent::new("x", AgentResult::failure("old")));
        orchestrator.register_agent(FixedAgent::new("x", AgentResult::success("new", DataMap::new())));

        assert_eq!(orchestrator.agent_names(), vec!["x".to_string()]);
        let summary = orchestrator.run(&flow(&["x"]), "INC-6", "api", "default", vec![]).await;
        assert!(summary.history[0].result.success);
        assert_eq!(orchestrator.agent_status()["x"], AgentState::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_first_step() {
        let orchestrator = Orchestrator::default();
        let a = FixedAgent::new("a", AgentResult::success("ok", DataMap::new()));
        orchestrator.register_agent(a.clone());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = orchestrator
            .run_with_cancellation(&flow(&["a"]), "INC-7", "api", "default", vec![], &cancel)
            .await;

        assert_eq!(summary.status, RunStatus::Cancelled);
        assert!(summary.steps.is_empty());
        assert!(a.seen_findings.lock().is_empty());
    }

    #[tokio::test]
    async fn test_events_published_in_order() {
        let orchestrator = Orchestrator::default();
        orchestrator.register_agent(FixedAgent::new("a", AgentResult::success("ok", DataMap::new())));
        let mut events = orchestrator.event_bus().subscribe();

        orchestrator
            .run(&flow(&["a", "ghost"]), "INC-8", "api", "default", vec![])
            .await;

        let mut kinds = Vec::new();
        while let Ok(event) = events.try_recv() {
            kinds.push(match event {
                RunEvent::RunStarted { .. } => "started",
                RunEvent::StepStarted { .. } => "step_started",
                RunEvent::StepCompleted { .. } => "step_completed",
                RunEvent::StepSkipped { .. } => "skipped",
                RunEvent::RunFinished { .. } => "finished",
            });
        }
        assert_eq!(
            kinds,
            vec!["started", "step_started", "step_completed", "skipped", "finished"]
        );
    }
}
