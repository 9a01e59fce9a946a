// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Dependency graph aggregate
//!
//! Holds services and depends-on edges in ordered maps so that every walk
//! over the graph visits neighbours in the same order for the same input.
//! Storage backends either keep one of these in memory or rebuild one from
//! their own data before answering traversal queries, so the scoring rules
//! live in exactly one place.
//!
//! # Multi-hop root cause scoring
//!
//! ```text
//! score(path) = Π over edges e of path:  0.8 if e has metric annotations
//!                                        0.9 otherwise
//! ```
//!
//! Paths are simple (no node repeats within one path), at most `max_hops`
//! edges long, and may not contain a healthy node anywhere.
//!
//! The product is computed from the number of annotated and plain edges on
//! the path, not in path order, so two paths with the same mix of edges get
//! bit-identical scores and fall through to the path-name tie-break.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::domain::errors::GraphError;
use crate::domain::graph::{
    DependencyEdge, Direction, Neighbor, RootCauseCandidate, ServiceKey, ServiceNode, Topology,
    ANNOTATED_EDGE_FACTOR, PLAIN_EDGE_FACTOR,
};

/// Edge mix of a path prefix during the multi-hop walk
#[derive(Debug, Clone, Copy, Default)]
struct EdgeMix {
    annotated: i32,
    plain: i32,
}

impl EdgeMix {
    fn extend(self, edge: &DependencyEdge) -> Self {
        if edge.has_metric_annotations() {
            Self {
                annotated: self.annotated + 1,
                ..self
            }
        } else {
            Self {
                plain: self.plain + 1,
                ..self
            }
        }
    }

    fn score(self) -> f64 {
        ANNOTATED_EDGE_FACTOR.powi(self.annotated) * PLAIN_EDGE_FACTOR.powi(self.plain)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DependencyGraph {
    nodes: BTreeMap<ServiceKey, ServiceNode>,
    /// source -> (target -> edge)
    outgoing: BTreeMap<ServiceKey, BTreeMap<ServiceKey, DependencyEdge>>,
    /// target -> sources
    incoming: BTreeMap<ServiceKey, BTreeSet<ServiceKey>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn service_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn dependency_count(&self) -> usize {
        self.outgoing.values().map(BTreeMap::len).sum()
    }

    /// Insert or merge a service keyed by (name, namespace)
    pub fn upsert_service(&mut self, node: ServiceNode) {
        self.nodes.insert(node.key(), node);
    }

    /// Insert or merge an edge keyed by (source, target).
    /// Both endpoints must already exist.
    pub fn upsert_dependency(&mut self, edge: DependencyEdge) -> Result<(), GraphError> {
        if !self.nodes.contains_key(&edge.source) {
            return Err(GraphError::NotFound(edge.source));
        }
        if !self.nodes.contains_key(&edge.target) {
            return Err(GraphError::NotFound(edge.target));
        }

        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .insert(edge.source.clone());
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .insert(edge.target.clone(), edge);
        Ok(())
    }

    pub fn service(&self, key: &ServiceKey) -> Option<&ServiceNode> {
        self.nodes.get(key)
    }

    pub fn service_mut(&mut self, key: &ServiceKey) -> Option<&mut ServiceNode> {
        self.nodes.get_mut(key)
    }

    pub fn dependency(&self, source: &ServiceKey, target: &ServiceKey) -> Option<&DependencyEdge> {
        self.outgoing.get(source).and_then(|edges| edges.get(target))
    }

    /// Immediate neighbours in the requested direction
    pub fn dependencies(
        &self,
        key: &ServiceKey,
        direction: Direction,
    ) -> Result<Vec<Neighbor>, GraphError> {
        if !self.nodes.contains_key(key) {
            return Err(GraphError::NotFound(key.clone()));
        }

        let mut neighbors = Vec::new();

        if matches!(direction, Direction::Upstream | Direction::Both) {
            if let Some(edges) = self.outgoing.get(key) {
                for (target, edge) in edges {
                    if let Some(node) = self.nodes.get(target) {
                        neighbors.push(Self::neighbor(node, edge, Direction::Upstream));
                    }
                }
            }
        }

        if matches!(direction, Direction::Downstream | Direction::Both) {
            if let Some(sources) = self.incoming.get(key) {
                for source in sources {
                    let edge = self.dependency(source, key);
                    if let (Some(node), Some(edge)) = (self.nodes.get(source), edge) {
                        neighbors.push(Self::neighbor(node, edge, Direction::Downstream));
                    }
                }
            }
        }

        Ok(neighbors)
    }

    fn neighbor(node: &ServiceNode, edge: &DependencyEdge, direction: Direction) -> Neighbor {
        Neighbor {
            name: node.name.clone(),
            namespace: node.namespace.clone(),
            status: node.status,
            kind: edge.kind.clone(),
            protocol: edge.protocol.clone(),
            direction,
        }
    }

    /// Score every non-healthy path of 1..=`max_hops` edges leaving `start`.
    ///
    /// Results are ordered by impact score (descending), hop count
    /// (ascending) and finally by the path's service names so that the
    /// output is identical for identical graphs.
    pub fn multi_hop_root_cause(
        &self,
        start: &ServiceKey,
        max_hops: usize,
        min_impact_score: f64,
    ) -> Result<Vec<RootCauseCandidate>, GraphError> {
        let start_node = self
            .nodes
            .get(start)
            .ok_or_else(|| GraphError::NotFound(start.clone()))?;

        let mut candidates = Vec::new();
        if max_hops == 0 || start_node.status.is_healthy() {
            return Ok(candidates);
        }

        let mut path = vec![start.clone()];
        self.walk(
            &mut path,
            EdgeMix::default(),
            max_hops,
            min_impact_score,
            &mut candidates,
        );

        candidates.sort_by(|a, b| {
            b.impact_score
                .total_cmp(&a.impact_score)
                .then(a.hops.cmp(&b.hops))
                .then_with(|| a.path.cmp(&b.path))
        });

        Ok(candidates)
    }

    fn walk(
        &self,
        path: &mut Vec<ServiceKey>,
        mix: EdgeMix,
        max_hops: usize,
        min_impact_score: f64,
        out: &mut Vec<RootCauseCandidate>,
    ) {
        let current = match path.last() {
            Some(key) => key.clone(),
            None => return,
        };
        let Some(edges) = self.outgoing.get(&current) else {
            return;
        };

        for (target, edge) in edges {
            // per-path guard: cycles end the branch, other branches may still reuse the node
            if path.contains(target) {
                continue;
            }
            let Some(node) = self.nodes.get(target) else {
                continue;
            };
            if node.status.is_healthy() {
                continue;
            }

            let next_mix = mix.extend(edge);
            let next_score = next_mix.score();
            // scores never increase along a path, so nothing past this point can qualify
            if next_score < min_impact_score {
                continue;
            }

            path.push(target.clone());
            let hops = path.len() - 1;

            out.push(RootCauseCandidate {
                service: node.name.clone(),
                namespace: node.namespace.clone(),
                status: node.status,
                hops,
                impact_score: next_score,
                path: path.iter().map(|key| key.name.clone()).collect(),
            });

            if hops < max_hops {
                self.walk(path, next_mix, max_hops, min_impact_score, out);
            }
            path.pop();
        }
    }

    /// Minimal edge-count path following depends-on edges, as service names.
    /// Empty when `target` is unreachable.
    pub fn shortest_path(
        &self,
        source: &ServiceKey,
        target: &ServiceKey,
    ) -> Result<Vec<String>, GraphError> {
        if !self.nodes.contains_key(source) {
            return Err(GraphError::NotFound(source.clone()));
        }
        if !self.nodes.contains_key(target) {
            return Err(GraphError::NotFound(target.clone()));
        }
        if source == target {
            return Ok(vec![source.name.clone()]);
        }

        let mut parents: BTreeMap<ServiceKey, ServiceKey> = BTreeMap::new();
        let mut seen: BTreeSet<ServiceKey> = BTreeSet::new();
        let mut queue = VecDeque::new();
        seen.insert(source.clone());
        queue.push_back(source.clone());

        while let Some(current) = queue.pop_front() {
            let Some(edges) = self.outgoing.get(&current) else {
                continue;
            };
            for next in edges.keys() {
                if !seen.insert(next.clone()) {
                    continue;
                }
                parents.insert(next.clone(), current.clone());
                if next == target {
                    let mut path = vec![next.name.clone()];
                    let mut cursor = next;
                    while let Some(parent) = parents.get(cursor) {
                        path.push(parent.name.clone());
                        cursor = parent;
                    }
                    path.reverse();
                    return Ok(path);
                }
                queue.push_back(next.clone());
            }
        }

        Ok(Vec::new())
    }

    /// All nodes and edges. With a namespace filter only nodes in that
    /// namespace and edges between them are returned.
    pub fn topology(&self, namespace: Option<&str>) -> Topology {
        let in_scope = |key: &ServiceKey| namespace.map_or(true, |ns| key.namespace == ns);

        let services = self
            .nodes
            .iter()
            .filter(|(key, _)| in_scope(key))
            .map(|(_, node)| node.clone())
            .collect();

        let dependencies = self
            .outgoing
            .values()
            .flat_map(BTreeMap::values)
            .filter(|edge| in_scope(&edge.source) && in_scope(&edge.target))
            .cloned()
            .collect();

        Topology {
            services,
            dependencies,
        }
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.outgoing.clear();
        self.incoming.clear();
    }
}
