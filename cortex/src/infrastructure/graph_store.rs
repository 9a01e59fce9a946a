// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory dependency graph store
//! Used for local runs, tests and topology files loaded from disk

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::dependency_graph::DependencyGraph;
use crate::domain::errors::GraphError;
use crate::domain::graph::{
    DependencyEdge, Direction, HealthStatus, Neighbor, RootCauseCandidate, ServiceKey,
    ServiceNode, Topology,
};
use crate::infrastructure::repository::DependencyGraphStore;

/// In-memory implementation of DependencyGraphStore
#[derive(Clone, Default)]
pub struct InMemoryDependencyGraph {
    graph: Arc<RwLock<DependencyGraph>>,
}

impl InMemoryDependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DependencyGraphStore for InMemoryDependencyGraph {
    async fn upsert_service(&self, node: &ServiceNode) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        graph.upsert_service(node.clone());
        Ok(())
    }

    async fn upsert_dependency(&self, edge: &DependencyEdge) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        graph.upsert_dependency(edge.clone())
    }

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<ServiceNode>, GraphError> {
        let graph = self.graph.read().await;
        Ok(graph.service(key).cloned())
    }

    async fn update_service_status(
        &self,
        key: &ServiceKey,
        status: HealthStatus,
    ) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        let node = graph
            .service_mut(key)
            .ok_or_else(|| GraphError::NotFound(key.clone()))?;
        node.status = status;
        Ok(())
    }

    async fn get_dependencies(
        &self,
        key: &ServiceKey,
        direction: Direction,
    ) -> Result<Vec<Neighbor>, GraphError> {
        let graph = self.graph.read().await;
        graph.dependencies(key, direction)
    }

    async fn multi_hop_root_cause(
        &self,
        start: &ServiceKey,
        max_hops: usize,
        min_impact_score: f64,
    ) -> Result<Vec<RootCauseCandidate>, GraphError> {
        let graph = self.graph.read().await;
        graph.multi_hop_root_cause(start, max_hops, min_impact_score)
    }

    async fn shortest_path(
        &self,
        source: &ServiceKey,
        target: &ServiceKey,
    ) -> Result<Vec<String>, GraphError> {
        let graph = self.graph.read().await;
        graph.shortest_path(source, target)
    }

    async fn topology(&self, namespace: Option<&str>) -> Result<Topology, GraphError> {
        let graph = self.graph.read().await;
        Ok(graph.topology(namespace))
    }

    async fn clear(&self) -> Result<(), GraphError> {
        let mut graph = self.graph.write().await;
        graph.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> ServiceKey {
        ServiceKey::new(name, "default")
    }

    async fn seeded() -> InMemoryDependencyGraph {
        let store = InMemoryDependencyGraph::new();
        for name in ["frontend", "api", "database"] {
            store
                .upsert_service(
                    &ServiceNode::new(name, "default", "backend").with_status(HealthStatus::Unhealthy),
                )
                .await
                .unwrap();
        }
        store
            .upsert_dependency(&DependencyEdge::new(key("frontend"), key("api")))
            .await
            .unwrap();
        store
            .upsert_dependency(
                &DependencyEdge::new(key("api"), key("database")).with_metric("error_rate", 0.2),
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_upsert_and_get_service() {
        let store = InMemoryDependencyGraph::new();
        let node = ServiceNode::new("checkout", "shop", "backend").with_label("team", "payments");
        store.upsert_service(&node).await.unwrap();

        let found = store.get_service(&node.key()).await.unwrap();
        assert_eq!(found, Some(node));
        assert!(store.get_service(&key("missing")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_service_status() {
        let store = seeded().await;
        store
            .update_service_status(&key("api"), HealthStatus::Healthy)
            .await
            .unwrap();

        let api = store.get_service(&key("api")).await.unwrap().unwrap();
        assert_eq!(api.status, HealthStatus::Healthy);
        assert_eq!(api.service_type, "backend");

        let err = store
            .update_service_status(&key("ghost"), HealthStatus::Degraded)
            .await
            .unwrap_err();
        assert_eq!(err, GraphError::NotFound(key("ghost")));
    }

    #[tokio::test]
    async fn test_multi_hop_through_store() {
        let store = seeded().await;
        let results = store
            .multi_hop_root_cause(&key("frontend"), 3, 0.5)
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].service, "api");
        assert_eq!(results[1].service, "database");
        assert!((results[1].impact_score - 0.72).abs() < 1e-9);
        assert_eq!(results[1].path, vec!["frontend", "api", "database"]);
    }

    #[tokio::test]
    async fn test_unknown_start_is_not_found() {
        let store = seeded().await;
        let err = store
            .multi_hop_root_cause(&key("nowhere"), 3, 0.5)
            .await
            .unwrap_err();
        assert!(matches!(err, GraphError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_clear_then_topology_is_empty() {
        let store = seeded().await;
        assert_eq!(store.topology(None).await.unwrap().services.len(), 3);

        store.clear().await.unwrap();
        let topology = store.topology(None).await.unwrap();
        assert!(topology.services.is_empty());
        assert!(topology.dependencies.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_readers() {
        let store = seeded().await;
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.multi_hop_root_cause(&key("frontend"), 3, 0.0).await
            }));
        }

        let mut outputs = Vec::new();
        for handle in handles {
            outputs.push(handle.await.unwrap().unwrap());
        }
        assert!(outputs.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
