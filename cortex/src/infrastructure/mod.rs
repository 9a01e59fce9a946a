// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Infrastructure layer for the dependency graph bounded context

pub mod graph_store;
#[cfg(feature = "neo4j")]
pub mod neo4j_store;
pub mod repository;

pub use graph_store::InMemoryDependencyGraph;
#[cfg(feature = "neo4j")]
pub use neo4j_store::Neo4jDependencyGraph;
pub use repository::DependencyGraphStore;
