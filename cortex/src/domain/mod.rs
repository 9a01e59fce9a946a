// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Domain layer: service graph entities, the graph aggregate and its errors

pub mod dependency_graph;
pub mod errors;
pub mod graph;

pub use dependency_graph::DependencyGraph;
pub use errors::GraphError;
pub use graph::*;
