// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Incident run model, agent and tool contracts, reasoning service
//! interface and configuration manifest.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by every pipeline component

pub mod aether_config;
pub mod agent;
pub mod events;
pub mod incident;
pub mod llm;
pub mod tool;
