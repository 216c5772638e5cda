//! Strongly Connected Components Pruning
//!
//! This module removes want edges that can never lie on a trade cycle. It
//! runs Kosaraju's two-pass algorithm over the item graph whose arcs are
//! "item X wants item Y", then drops every edge whose endpoints fall in
//! different components and sets aside the items left with nothing but
//! their self edge.
//!
//! # Theoretical Foundation
//!
//! A trade cycle is a directed cycle in the item graph, so every edge on one
//! joins two mutually reachable items. An edge between different strongly
//! connected components cannot close a cycle and is safe to discard before
//! the O(n^3) matching solve.
//!
//! ## Passes
//!
//! 1. **Finish order**: depth-first post-order over want vertices, following
//!    each want edge to the twin want vertex of its offer endpoint.
//! 2. **Labeling**: in reverse finish order, depth-first over offer vertices
//!    along the reversed relation, stamping every reached item with the
//!    current component number.
//!
//! # Algorithmic Complexity
//!
//! - **Time Complexity**: O(V + E)
//! - **Space Complexity**: O(V) for the finish order and explicit DFS stacks
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::algorithm::config::PruneConfig;
use crate::algorithm::traits::{
    parse_bool_parameter, Algorithm, EdgeId, InvariantViolation, ItemId, PreconditionError,
    TradeError, TradeResult, VertexId,
};
use crate::data_structures::graph::{TradeGraph, VertexRole};

/// Performance and behavior statistics for one pruning pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PruneStatistics {
    pub components: usize,
    pub edges_examined: usize,
    pub edges_removed: usize,
    pub orphans: usize,
    pub execution_time_ms: f64,
}

/// Connectivity pruner over a frozen trade graph
#[derive(Debug, Clone)]
pub struct ConnectivityPruner {
    config: PruneConfig,
    statistics: PruneStatistics,
}

impl ConnectivityPruner {
    pub fn new() -> Self {
        Self::with_config(PruneConfig::default())
    }

    pub fn with_config(config: PruneConfig) -> Self {
        Self {
            config,
            statistics: PruneStatistics::default(),
        }
    }

    pub fn config(&self) -> &PruneConfig {
        &self.config
    }

    /// Removes impossible edges, then the orphans they leave behind
    ///
    /// Running it again on a pruned graph removes nothing.
    pub fn prune(&mut self, graph: &mut TradeGraph) -> TradeResult<PruneStatistics> {
        if !graph.is_frozen() {
            return Err(PreconditionError::NotFrozen("pruning").into());
        }
        let start_time = std::time::Instant::now();
        self.statistics = PruneStatistics::default();

        // Both passes share one timestamp: the first marks want vertices,
        // the second offer vertices.
        let timestamp = graph.advance_timestamp();
        let finished = self.finish_order(graph, timestamp);
        self.statistics.components = self.label_components(graph, &finished, timestamp);

        self.remove_bad_edges(graph);
        self.remove_orphans(graph);
        graph.pruned = true;

        if self.config.verify_result {
            self.verify_pruned_graph(graph)?;
        }

        self.statistics.execution_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Pruned trade graph: {} components, {} of {} edges removed, {} orphans",
            self.statistics.components,
            self.statistics.edges_removed,
            self.statistics.edges_examined,
            self.statistics.orphans
        );
        Ok(self.statistics.clone())
    }

    /// Whether two items landed in the same component during the last pass
    pub fn strongly_connected(graph: &TradeGraph, a: ItemId, b: ItemId) -> bool {
        match (graph.item(a), graph.item(b)) {
            (Some(a), Some(b)) => {
                let component = |v: VertexId| graph.vertices[v.0].component;
                component(a.want_vertex()) == component(b.want_vertex())
            }
            _ => false,
        }
    }

    pub fn get_statistics(&self) -> &PruneStatistics {
        &self.statistics
    }

    pub fn reset_statistics(&mut self) {
        self.statistics = PruneStatistics::default();
    }

    /// First pass: post-order of want vertices; records their offer twins
    fn finish_order(&self, graph: &mut TradeGraph, timestamp: u64) -> Vec<VertexId> {
        let mut finished = Vec::with_capacity(graph.wants.len());
        let mut stack: Vec<(VertexId, usize)> = Vec::new();

        for root_index in 0..graph.wants.len() {
            let root = graph.wants[root_index];
            if graph.vertices[root.0].mark == timestamp {
                continue;
            }
            graph.vertices[root.0].mark = timestamp;
            stack.push((root, 0));

            while let Some((want, cursor)) = stack.last().copied() {
                let edges = graph.vertices[want.0].edges();
                if let Some(&edge) = edges.get(cursor) {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let next = graph.vertices[graph.edges[edge.0].offer.0].twin();
                    if graph.vertices[next.0].mark != timestamp {
                        graph.vertices[next.0].mark = timestamp;
                        stack.push((next, 0));
                    }
                } else {
                    stack.pop();
                    finished.push(graph.vertices[want.0].twin());
                }
            }
        }

        finished
    }

    /// Second pass: label components walking offers along reversed wants
    fn label_components(&self, graph: &mut TradeGraph, finished: &[VertexId], timestamp: u64) -> usize {
        let mut component = 0;
        let mut stack: Vec<(VertexId, usize)> = Vec::new();

        for &root in finished.iter().rev() {
            if graph.vertices[root.0].mark == timestamp {
                continue;
            }
            component += 1;
            graph.vertices[root.0].mark = timestamp;
            stack.push((root, 0));

            while let Some((offer, cursor)) = stack.last().copied() {
                let edges = graph.vertices[offer.0].edges();
                if let Some(&edge) = edges.get(cursor) {
                    if let Some(top) = stack.last_mut() {
                        top.1 += 1;
                    }
                    let next = graph.vertices[graph.edges[edge.0].want.0].twin();
                    if graph.vertices[next.0].mark != timestamp {
                        graph.vertices[next.0].mark = timestamp;
                        stack.push((next, 0));
                    }
                } else {
                    stack.pop();
                    let twin = graph.vertices[offer.0].twin();
                    graph.vertices[offer.0].component = component;
                    graph.vertices[twin.0].component = component;
                }
            }
        }

        component
    }

    /// Drops edges between components and recomputes offer minimum costs
    fn remove_bad_edges(&mut self, graph: &mut TradeGraph) {
        for index in 0..graph.wants.len() {
            let want = graph.wants[index];
            let (kept, removed) = Self::good_edges(graph, want);
            self.statistics.edges_examined += kept.len() + removed;
            self.statistics.edges_removed += removed;
            if removed > 0 {
                graph.vertices[want.0].set_edges(kept);
            }
        }

        for index in 0..graph.offers.len() {
            let offer = graph.offers[index];
            let (kept, removed) = Self::good_edges(graph, offer);
            let minimum = kept.iter().map(|edge| graph.edges[edge.0].cost).min();
            if removed > 0 {
                graph.vertices[offer.0].set_edges(kept);
            }
            graph.vertices[offer.0].minimum_in_cost = minimum;
        }
    }

    fn good_edges(graph: &TradeGraph, vertex: VertexId) -> (Vec<EdgeId>, usize) {
        let edges = graph.vertices[vertex.0].edges();
        let kept: Vec<EdgeId> = edges
            .iter()
            .copied()
            .filter(|edge| {
                let edge = &graph.edges[edge.0];
                graph.vertices[edge.want.0].component == graph.vertices[edge.offer.0].component
            })
            .collect();
        let removed = edges.len() - kept.len();
        (kept, removed)
    }

    /// Sets aside items left with no trading partner
    fn remove_orphans(&mut self, graph: &mut TradeGraph) {
        let mut orphaned = vec![false; graph.items.len()];
        for &want in &graph.wants {
            let vertex = &graph.vertices[want.0];
            let partners = vertex
                .edges()
                .iter()
                .filter(|edge| graph.edges[edge.0].offer != vertex.twin())
                .count();
            if partners == 0 {
                orphaned[vertex.item().0] = true;
                graph.orphans.push(vertex.item());
                self.statistics.orphans += 1;
            }
        }
        if self.statistics.orphans == 0 {
            return;
        }

        let vertices = &graph.vertices;
        graph.wants.retain(|v| !orphaned[vertices[v.0].item().0]);
        graph.offers.retain(|v| !orphaned[vertices[v.0].item().0]);
        debug!("Set aside {} orphaned items", self.statistics.orphans);
    }

    /// Every live edge joins one component and every active item still trades
    fn verify_pruned_graph(&self, graph: &TradeGraph) -> TradeResult<()> {
        if graph.wants.len() != graph.offers.len() {
            return Err(InvariantViolation::PruneVerification(format!(
                "{} active want vertices but {} offer vertices",
                graph.wants.len(),
                graph.offers.len()
            ))
            .into());
        }

        for &vertex in graph.wants.iter().chain(graph.offers.iter()) {
            let node = &graph.vertices[vertex.0];
            let mut partners = 0;
            for edge in node.edges() {
                let edge = &graph.edges[edge.0];
                if graph.vertices[edge.want.0].component != graph.vertices[edge.offer.0].component {
                    return Err(InvariantViolation::PruneVerification(format!(
                        "edge {} -> {} crosses components",
                        edge.want, edge.offer
                    ))
                    .into());
                }
                let other = match node.role() {
                    VertexRole::Want => edge.offer,
                    VertexRole::Offer => edge.want,
                };
                if other != node.twin() {
                    partners += 1;
                }
            }
            if partners == 0 {
                return Err(InvariantViolation::PruneVerification(format!(
                    "active {} has no trading partner",
                    graph.items[node.item().0].name()
                ))
                .into());
            }
        }

        Ok(())
    }
}

impl Default for ConnectivityPruner {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for ConnectivityPruner {
    fn name(&self) -> &str {
        "Impossible Edge Pruning (Kosaraju)"
    }

    fn category(&self) -> &str {
        "graph"
    }

    fn description(&self) -> &str {
        "Kosaraju's two-pass strongly connected components algorithm over the item want-graph. Edges joining different components can never close a trade cycle and are removed, followed by items left with only their self edge. Runs in O(V+E)."
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), TradeError> {
        match name {
            "verify_result" => {
                self.config.verify_result = parse_bool_parameter(name, value)?;
                Ok(())
            }
            _ => Err(PreconditionError::InvalidParameter {
                name: name.to_string(),
                reason: "Unknown parameter. Valid parameters: verify_result".to_string(),
            }
            .into()),
        }
    }

    fn get_parameter(&self, name: &str) -> Option<String> {
        match name {
            "verify_result" => Some(self.config.verify_result.to_string()),
            _ => None,
        }
    }

    fn get_parameters(&self) -> HashMap<String, String> {
        let mut parameters = HashMap::new();
        parameters.insert("verify_result".to_string(), self.config.verify_result.to_string());
        parameters
    }
}
