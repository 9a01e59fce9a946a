// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Topology sync
//!
//! Loads service/dependency records (from a YAML or JSON document, or any
//! other discovery source that produces [`TopologyRecord`]s) into a graph
//! store. All services are written before any edge so that records may
//! reference services that appear later in the list.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{info, warn};

use crate::domain::errors::GraphError;
use crate::domain::graph::{DependencyEdge, HealthStatus, ServiceKey, ServiceNode, DEFAULT_NAMESPACE};
use crate::infrastructure::repository::DependencyGraphStore;

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_service_type() -> String {
    "unknown".to_string()
}

fn default_kind() -> String {
    "depends_on".to_string()
}

fn default_protocol() -> String {
    "http".to_string()
}

fn default_port() -> u16 {
    80
}

/// Root of a topology file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyDocument {
    #[serde(default)]
    pub services: Vec<TopologyRecord>,
}

impl TopologyDocument {
    /// Parse a topology document. JSON is a subset of YAML so one parser covers both.
    pub fn parse(content: &str) -> Result<Self, GraphError> {
        serde_yaml::from_str(content)
            .map_err(|e| GraphError::InvalidData(format!("invalid topology document: {}", e)))
    }

    pub fn from_file(path: &Path) -> Result<Self, GraphError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            GraphError::InvalidData(format!("cannot read topology file {:?}: {}", path, e))
        })?;
        Self::parse(&content)
    }
}

/// One service as reported by a discovery source
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyRecord {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_service_type", rename = "type")]
    pub service_type: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    /// Free-form status text; unrecognised values become `unknown`
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub dependencies: Vec<DependencyRecord>,
}

impl TopologyRecord {
    pub fn to_node(&self) -> ServiceNode {
        let status = self
            .status
            .as_deref()
            .map(HealthStatus::parse_lenient)
            .unwrap_or_default();
        ServiceNode {
            name: self.name.clone(),
            namespace: self.namespace.clone(),
            service_type: self.service_type.clone(),
            status,
            labels: self.labels.clone(),
        }
    }

    pub fn to_edges(&self) -> Vec<DependencyEdge> {
        let source = ServiceKey::new(self.name.clone(), self.namespace.clone());
        self.dependencies
            .iter()
            .map(|dep| {
                let target_namespace = dep
                    .target_namespace
                    .clone()
                    .unwrap_or_else(|| self.namespace.clone());
                DependencyEdge {
                    source: source.clone(),
                    target: ServiceKey::new(dep.target.clone(), target_namespace),
                    kind: dep.kind.clone(),
                    protocol: dep.protocol.clone(),
                    port: dep.port,
                    metrics: dep.metrics.clone(),
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyRecord {
    pub target: String,
    /// Defaults to the namespace of the owning service
    #[serde(default)]
    pub target_namespace: Option<String>,
    #[serde(default = "default_kind", rename = "type")]
    pub kind: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
}

/// Outcome of a sync
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncReport {
    pub services: usize,
    pub dependencies: usize,
    /// Edges rejected because an endpoint does not exist
    pub skipped: Vec<String>,
}

/// Upsert every record into `store`. Re-running with the same records
/// leaves the store unchanged.
pub async fn sync_topology(
    store: &dyn DependencyGraphStore,
    records: &[TopologyRecord],
) -> Result<SyncReport, GraphError> {
    let mut report = SyncReport::default();

    for record in records {
        store.upsert_service(&record.to_node()).await?;
        report.services += 1;
    }

    for record in records {
        for edge in record.to_edges() {
            match store.upsert_dependency(&edge).await {
                Ok(()) => report.dependencies += 1,
                Err(GraphError::NotFound(missing)) => {
                    warn!(
                        source = %edge.source,
                        target = %edge.target,
                        missing = %missing,
                        "Skipping dependency with unknown endpoint"
                    );
                    report
                        .skipped
                        .push(format!("{} -> {}: {} not found", edge.source, edge.target, missing));
                }
                Err(e) => return Err(e),
            }
        }
    }

    info!(
        services = report.services,
        dependencies = report.dependencies,
        skipped = report.skipped.len(),
        "Topology synchronized"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::graph_store::InMemoryDependencyGraph;
    use std::io::Write;

    const TOPOLOGY: &str = r#"
services:
  - name: frontend
    type: frontend
    status: degraded
    dependencies:
      - target: api
        protocol: grpc
        port: 9090
  - name: api
    status: Unhealthy
    labels:
      team: core
    dependencies:
      - target: database
        metrics:
          error_rate: 0.35
      - target: ledger
        target_namespace: finance
  - name: database
    type: database
    status: on fire
"#;

    #[test]
    fn test_record_defaults() {
        let doc = TopologyDocument::parse(TOPOLOGY).unwrap();
        assert_eq!(doc.services.len(), 3);

        let api = &doc.services[1];
        assert_eq!(api.namespace, "default");
        assert_eq!(api.service_type, "unknown");
        assert_eq!(api.to_node().status, HealthStatus::Unhealthy);

        let edges = api.to_edges();
        assert_eq!(edges[0].kind, "depends_on");
        assert_eq!(edges[0].protocol, "http");
        assert_eq!(edges[0].port, 80);
        assert_eq!(edges[0].target.namespace, "default");
        assert_eq!(edges[1].target.namespace, "finance");

        assert_eq!(doc.services[2].to_node().status, HealthStatus::Unknown);
    }

    #[test]
    fn test_json_document() {
        let json = r#"{"services":[{"name":"a","dependencies":[{"target":"b"}]},{"name":"b"}]}"#;
        let doc = TopologyDocument::parse(json).unwrap();
        assert_eq!(doc.services.len(), 2);
        assert_eq!(doc.services[0].dependencies[0].target, "b");
    }

    #[test]
    fn test_invalid_document() {
        let err = TopologyDocument::parse("services: 12").unwrap_err();
        assert!(matches!(err, GraphError::InvalidData(_)));
    }

    #[tokio::test]
    async fn test_sync_reports_missing_endpoints() {
        let doc = TopologyDocument::parse(TOPOLOGY).unwrap();
        let store = InMemoryDependencyGraph::new();

        let report = sync_topology(&store, &doc.services).await.unwrap();
        assert_eq!(report.services, 3);
        assert_eq!(report.dependencies, 2);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].contains("finance/ledger"));
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let doc = TopologyDocument::parse(TOPOLOGY).unwrap();
        let store = InMemoryDependencyGraph::new();

        sync_topology(&store, &doc.services).await.unwrap();
        let first = store.topology(None).await.unwrap();
        sync_topology(&store, &doc.services).await.unwrap();
        let second = store.topology(None).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(second.dependencies.len(), 2);
    }

    #[tokio::test]
    async fn test_sync_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TOPOLOGY.as_bytes()).unwrap();

        let doc = TopologyDocument::from_file(file.path()).unwrap();
        let store = InMemoryDependencyGraph::new();
        sync_topology(&store, &doc.services).await.unwrap();

        let results = store
            .multi_hop_root_cause(&ServiceKey::new("frontend", "default"), 3, 0.5)
            .await
            .unwrap();
        // frontend -> api (0.9), frontend -> api -> database (0.72)
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].path, vec!["frontend", "api", "database"]);
    }
}
