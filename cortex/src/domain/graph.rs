// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Service dependency graph entities
//!
//! Nodes are services keyed by `(namespace, name)`; edges are directed
//! "depends on" relationships keyed by `(source, target)`. Both merge on
//! re-insert instead of duplicating.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Score factor applied for an edge that carries metric annotations
pub const ANNOTATED_EDGE_FACTOR: f64 = 0.8;

/// Score factor applied for an edge without metric annotations
pub const PLAIN_EDGE_FACTOR: f64 = 0.9;

/// Namespace used when a record does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Unique identity of a service node
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ServiceKey {
    pub namespace: String,
    pub name: String,
}

impl ServiceKey {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Observed health of a service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    #[default]
    Unknown,
}

impl HealthStatus {
    /// Only non-healthy services may appear on a root cause path
    pub fn is_healthy(self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
            HealthStatus::Unknown => "unknown",
        }
    }

    /// Lenient parse used for data coming from external topology sources.
    /// Anything unrecognised is `Unknown`.
    pub fn parse_lenient(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "healthy" => HealthStatus::Healthy,
            "degraded" => HealthStatus::Degraded,
            "unhealthy" => HealthStatus::Unhealthy,
            _ => HealthStatus::Unknown,
        }
    }
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A microservice in the dependency graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceNode {
    pub name: String,
    pub namespace: String,
    /// e.g. "frontend", "backend", "database"
    pub service_type: String,
    #[serde(default)]
    pub status: HealthStatus,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

impl ServiceNode {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        service_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            service_type: service_type.into(),
            status: HealthStatus::Unknown,
            labels: BTreeMap::new(),
        }
    }

    pub fn with_status(mut self, status: HealthStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(self.name.clone(), self.namespace.clone())
    }
}

/// Directed "depends on" edge: `source` depends on `target`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub source: ServiceKey,
    pub target: ServiceKey,
    /// e.g. "calls", "uses", "depends_on"
    pub kind: String,
    pub protocol: String,
    pub port: u16,
    /// Per-edge telemetry annotations
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metrics: BTreeMap<String, f64>,
}

impl DependencyEdge {
    pub fn new(source: ServiceKey, target: ServiceKey) -> Self {
        Self {
            source,
            target,
            kind: "depends_on".to_string(),
            protocol: "http".to_string(),
            port: 80,
            metrics: BTreeMap::new(),
        }
    }

    pub fn with_kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = kind.into();
        self
    }

    pub fn with_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    pub fn has_metric_annotations(&self) -> bool {
        !self.metrics.is_empty()
    }
}

/// Which side of a service to list neighbours for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Services this service depends on
    Upstream,
    /// Services that depend on this service
    Downstream,
    Both,
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "upstream" => Ok(Direction::Upstream),
            "downstream" => Ok(Direction::Downstream),
            "both" => Ok(Direction::Both),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

/// Immediate neighbour of a service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub name: String,
    pub namespace: String,
    pub status: HealthStatus,
    pub kind: String,
    pub protocol: String,
    /// `Upstream` or `Downstream`, never `Both`
    pub direction: Direction,
}

/// One scored path from the affected service to a candidate root cause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseCandidate {
    /// Terminal service of the path
    pub service: String,
    pub namespace: String,
    pub status: HealthStatus,
    pub hops: usize,
    pub impact_score: f64,
    /// Service names from the start service to `service`, inclusive
    pub path: Vec<String>,
}

/// Full node and edge listing for export
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Topology {
    pub services: Vec<ServiceNode>,
    pub dependencies: Vec<DependencyEdge>,
}
