// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pipeline run events published on the event bus

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::incident::{RunId, RunStatus};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RunEvent {
    RunStarted {
        run_id: RunId,
        incident_id: String,
        service: String,
        flow: Vec<String>,
        started_at: DateTime<Utc>,
    },
    StepStarted {
        run_id: RunId,
        agent: String,
        step: usize,
        started_at: DateTime<Utc>,
    },
    StepCompleted {
        run_id: RunId,
        agent: String,
        success: bool,
        message: String,
        terminate: bool,
        completed_at: DateTime<Utc>,
    },
    /// The flow named an agent that is not registered
    StepSkipped {
        run_id: RunId,
        agent: String,
        reason: String,
        skipped_at: DateTime<Utc>,
    },
    RunFinished {
        run_id: RunId,
        status: RunStatus,
        steps: usize,
        finished_at: DateTime<Utc>,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> RunId {
        match self {
            RunEvent::RunStarted { run_id, .. }
            | RunEvent::StepStarted { run_id, .. }
            | RunEvent::StepCompleted { run_id, .. }
            | RunEvent::StepSkipped { run_id, .. }
            | RunEvent::RunFinished { run_id, .. } => *run_id,
        }
    }
}
