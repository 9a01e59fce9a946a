// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Neo4j-backed dependency graph store
//!
//! Services are `(:Service {name, namespace})` nodes and dependencies are
//! `[:DEPENDS_ON]` relationships. Labels and edge metrics are stored as
//! JSON strings. Traversal queries load a snapshot into a
//! [`DependencyGraph`] and run the same scoring as the in-memory store.

use async_trait::async_trait;
use neo4rs::{query, Graph, Query};
use std::collections::BTreeMap;
use tracing::{debug, warn};

use crate::domain::dependency_graph::DependencyGraph;
use crate::domain::errors::GraphError;
use crate::domain::graph::{
    DependencyEdge, Direction, HealthStatus, Neighbor, RootCauseCandidate, ServiceKey,
    ServiceNode, Topology,
};
use crate::infrastructure::repository::DependencyGraphStore;

const SERVICE_COLUMNS: &str = "s.name AS name, s.namespace AS namespace, \
     s.service_type AS service_type, s.status AS status, s.labels AS labels";

pub struct Neo4jDependencyGraph {
    graph: Graph,
}

impl Neo4jDependencyGraph {
    pub async fn connect(uri: &str, user: &str, password: &str) -> Result<Self, GraphError> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?;
        debug!(uri, "Connected to Neo4j");
        Ok(Self { graph })
    }

    async fn run(&self, q: Query) -> Result<(), GraphError> {
        self.graph
            .run(q)
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))
    }

    async fn fetch_services(&self, q: Query) -> Result<Vec<ServiceNode>, GraphError> {
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?;

        let mut services = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?
        {
            let name: String = field(&row, "name")?;
            let namespace: String = field(&row, "namespace")?;
            let service_type: String = optional_field(&row, "service_type")
                .unwrap_or_else(|| "unknown".to_string());
            let status = optional_field::<String>(&row, "status")
                .map(|s| HealthStatus::parse_lenient(&s))
                .unwrap_or_default();
            let labels = decode_json_map(optional_field(&row, "labels"));

            services.push(ServiceNode {
                name,
                namespace,
                service_type,
                status,
                labels,
            });
        }
        Ok(services)
    }

    async fn fetch_edges(&self) -> Result<Vec<DependencyEdge>, GraphError> {
        let q = query(
            "MATCH (a:Service)-[r:DEPENDS_ON]->(b:Service) \
             RETURN a.name AS source_name, a.namespace AS source_namespace, \
                    b.name AS target_name, b.namespace AS target_namespace, \
                    r.kind AS kind, r.protocol AS protocol, r.port AS port, r.metrics AS metrics",
        );
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?;

        let mut edges = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::StoreUnavailable(e.to_string()))?
        {
            let source = ServiceKey::new(
                field::<String>(&row, "source_name")?,
                field::<String>(&row, "source_namespace")?,
            );
            let target = ServiceKey::new(
                field::<String>(&row, "target_name")?,
                field::<String>(&row, "target_namespace")?,
            );
            let mut edge = DependencyEdge::new(source, target);
            if let Some(kind) = optional_field::<String>(&row, "kind") {
                edge.kind = kind;
            }
            if let Some(protocol) = optional_field::<String>(&row, "protocol") {
                edge.protocol = protocol;
            }
            if let Some(port) = optional_field::<i64>(&row, "port") {
                edge.port = u16::try_from(port)
                    .map_err(|_| GraphError::InvalidData(format!("port out of range: {}", port)))?;
            }
            edge.metrics = decode_json_map(optional_field(&row, "metrics"));
            edges.push(edge);
        }
        Ok(edges)
    }

    /// Rebuild the full graph from the database
    async fn snapshot(&self) -> Result<DependencyGraph, GraphError> {
        let services = self
            .fetch_services(query(&format!("MATCH (s:Service) RETURN {}", SERVICE_COLUMNS)))
            .await?;
        let edges = self.fetch_edges().await?;

        let mut graph = DependencyGraph::new();
        for service in services {
            graph.upsert_service(service);
        }
        for edge in edges {
            if let Err(e) = graph.upsert_dependency(edge) {
                warn!(error = %e, "Skipping dangling dependency in snapshot");
            }
        }
        Ok(graph)
    }
}

/// Required row column
fn field<T>(row: &neo4rs::Row, key: &str) -> Result<T, GraphError>
where
    T: serde::de::DeserializeOwned,
{
    optional_field(row, key)
        .ok_or_else(|| GraphError::InvalidData(format!("missing column '{}'", key)))
}

fn optional_field<T>(row: &neo4rs::Row, key: &str) -> Option<T>
where
    T: serde::de::DeserializeOwned,
{
    row.get::<T>(key).into_iter().next()
}

fn decode_json_map<V: serde::de::DeserializeOwned>(raw: Option<String>) -> BTreeMap<String, V> {
    raw.and_then(|text| serde_json::from_str(&text).ok())
        .unwrap_or_default()
}

fn encode_json_map<V: serde::Serialize>(map: &BTreeMap<String, V>) -> Result<String, GraphError> {
    serde_json::to_string(map).map_err(|e| GraphError::InvalidData(e.to_string()))
}

#[async_trait]
impl DependencyGraphStore for Neo4jDependencyGraph {
    async fn upsert_service(&self, node: &ServiceNode) -> Result<(), GraphError> {
        let q = query(
            "MERGE (s:Service {name: $name, namespace: $namespace}) \
             SET s.service_type = $service_type, s.status = $status, s.labels = $labels",
        )
        .param("name", node.name.clone())
        .param("namespace", node.namespace.clone())
        .param("service_type", node.service_type.clone())
        .param("status", node.status.as_str().to_string())
        .param("labels", encode_json_map(&node.labels)?);
        self.run(q).await
    }

    async fn upsert_dependency(&self, edge: &DependencyEdge) -> Result<(), GraphError> {
        for endpoint in [&edge.source, &edge.target] {
            if self.get_service(endpoint).await?.is_none() {
                return Err(GraphError::NotFound(endpoint.clone()));
            }
        }

        let q = query(
            "MATCH (a:Service {name: $source_name, namespace: $source_namespace}) \
             MATCH (b:Service {name: $target_name, namespace: $target_namespace}) \
             MERGE (a)-[r:DEPENDS_ON]->(b) \
             SET r.kind = $kind, r.protocol = $protocol, r.port = $port, r.metrics = $metrics",
        )
        .param("source_name", edge.source.name.clone())
        .param("source_namespace", edge.source.namespace.clone())
        .param("target_name", edge.target.name.clone())
        .param("target_namespace", edge.target.namespace.clone())
        .param("kind", edge.kind.clone())
        .param("protocol", edge.protocol.clone())
        .param("port", i64::from(edge.port))
        .param("metrics", encode_json_map(&edge.metrics)?);
        self.run(q).await
    }

    async fn get_service(&self, key: &ServiceKey) -> Result<Option<ServiceNode>, GraphError> {
        let q = query(&format!(
            "MATCH (s:Service {{name: $name, namespace: $namespace}}) RETURN {}",
            SERVICE_COLUMNS
        ))
        .param("name", key.name.clone())
        .param("namespace", key.namespace.clone());
        Ok(self.fetch_services(q).await?.into_iter().next())
    }

    async fn update_service_status(
        &self,
        key: &ServiceKey,
        status: HealthStatus,
    ) -> Result<(), GraphError> {
        if self.get_service(key).await?.is_none() {
            return Err(GraphError::NotFound(key.clone()));
        }
        let q = query("MATCH (s:Service {name: $name, namespace: $namespace}) SET s.status = $status")
            .param("name", key.name.clone())
            .param("namespace", key.namespace.clone())
            .param("status", status.as_str().to_string());
        self.run(q).await
    }

    async fn get_dependencies(
        &self,
        key: &ServiceKey,
        direction: Direction,
    ) -> Result<Vec<Neighbor>, GraphError> {
        self.snapshot().await?.dependencies(key, direction)
    }

    async fn multi_hop_root_cause(
        &self,
        start: &ServiceKey,
        max_hops: usize,
        min_impact_score: f64,
    ) -> Result<Vec<RootCauseCandidate>, GraphError> {
        self.snapshot()
            .await?
            .multi_hop_root_cause(start, max_hops, min_impact_score)
    }

    async fn shortest_path(
        &self,
        source: &ServiceKey,
        target: &ServiceKey,
    ) -> Result<Vec<String>, GraphError> {
        self.snapshot().await?.shortest_path(source, target)
    }

    async fn topology(&self, namespace: Option<&str>) -> Result<Topology, GraphError> {
        Ok(self.snapshot().await?.topology(namespace))
    }

    async fn clear(&self) -> Result<(), GraphError> {
        self.run(query("MATCH (n:Service) DETACH DELETE n")).await
    }
}
