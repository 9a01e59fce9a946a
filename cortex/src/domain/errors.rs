// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use crate::domain::graph::ServiceKey;

/// Errors raised by dependency graph operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GraphError {
    #[error("Graph store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Service not found: {0}")]
    NotFound(ServiceKey),

    #[error("Invalid graph data: {0}")]
    InvalidData(String),
}
