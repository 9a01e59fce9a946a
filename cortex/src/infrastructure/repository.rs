// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Repository interface for the service dependency graph
//! Defines the contract every graph backend fulfils

use async_trait::async_trait;

use crate::domain::errors::GraphError;
use crate::domain::graph::{
    DependencyEdge, Direction, HealthStatus, Neighbor, RootCauseCandidate, ServiceKey,
    ServiceNode, Topology,
};

/// Storage for services and their depends-on edges
#[async_trait]
pub trait DependencyGraphStore: Send + Sync {
    /// Insert or merge a service keyed by (name, namespace)
    async fn upsert_service(&self, node: &ServiceNode) -> Result<(), GraphError>;

    /// Insert or merge an edge keyed by (source, target); both endpoints must exist
    async fn upsert_dependency(&self, edge: &DependencyEdge) -> Result<(), GraphError>;

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<ServiceNode>, GraphError>;

    /// Set only the status of an existing service
    async fn update_service_status(
        &self,
        key: &ServiceKey,
        status: HealthStatus,
    ) -> Result<(), GraphError>;

    async fn get_dependencies(
        &self,
        key: &ServiceKey,
        direction: Direction,
    ) -> Result<Vec<Neighbor>, GraphError>;

    /// Scored non-healthy paths of 1..=max_hops edges leaving `start`
    async fn multi_hop_root_cause(
        &self,
        start: &ServiceKey,
        max_hops: usize,
        min_impact_score: f64,
    ) -> Result<Vec<RootCauseCandidate>, GraphError>;

    async fn shortest_path(
        &self,
        source: &ServiceKey,
        target: &ServiceKey,
    ) -> Result<Vec<String>, GraphError>;

    async fn topology(&self, namespace: Option<&str>) -> Result<Topology, GraphError>;

    /// Remove every node and edge
    async fn clear(&self) -> Result<(), GraphError>;
}
