// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Aether Cortex
//!
//! Service dependency graph for incident analysis.
//!
//! # Architecture
//!
//! - **Layer:** Knowledge Layer
//! - **Purpose:** Stores services and depends-on edges, answers neighbour,
//!   path and multi-hop root cause queries

pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::*;
pub use domain::*;
pub use infrastructure::*;
