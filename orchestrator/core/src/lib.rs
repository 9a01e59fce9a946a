// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Incident-response pipeline engine: a static flow of agents (triage, root
//! cause analysis, remediation advice, action execution) run by an
//! orchestrator over a shared incident context.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, orchestrator, agents and adapters

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use domain::*;
