//! Matching snapshots
//!
//! An outer driver that retries the solve with different shuffle seeds keeps
//! the best matching seen so far by taking a [`MatchingSnapshot`] and later
//! restoring it. Both directions are plain O(n) copies of match links and
//! matched costs.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use log::debug;
use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{PreconditionError, TradeResult, VertexId};
use crate::data_structures::graph::TradeGraph;

/// Saved match links and matched costs of every vertex
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchingSnapshot {
    matches: Vec<Option<VertexId>>,
    match_costs: Vec<i64>,
}

impl MatchingSnapshot {
    /// Number of vertices covered
    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Saved match of a vertex
    pub fn matched(&self, vertex: VertexId) -> Option<VertexId> {
        self.matches.get(vertex.0).copied().flatten()
    }

    /// Sum of saved matched costs over want vertices that are matched
    pub fn total_cost(&self, graph: &TradeGraph) -> i64 {
        graph
            .want_vertices()
            .iter()
            .filter(|v| self.matched(**v).is_some())
            .map(|v| self.match_costs[v.0])
            .sum()
    }
}

impl TradeGraph {
    /// Saves the current matching
    pub fn snapshot_matches(&self) -> MatchingSnapshot {
        let snapshot = MatchingSnapshot {
            matches: self.vertices.iter().map(|v| v.matched).collect(),
            match_costs: self.vertices.iter().map(|v| v.match_cost).collect(),
        };
        debug!("Saved matching snapshot over {} vertices", snapshot.len());
        snapshot
    }

    /// Reinstates a matching saved from this graph
    pub fn restore_matches(&mut self, snapshot: &MatchingSnapshot) -> TradeResult<()> {
        if snapshot.len() != self.vertices.len() {
            return Err(PreconditionError::SnapshotMismatch {
                expected: self.vertices.len(),
                found: snapshot.len(),
            }
            .into());
        }

        for ((vertex, matched), cost) in self
            .vertices
            .iter_mut()
            .zip(&snapshot.matches)
            .zip(&snapshot.match_costs)
        {
            vertex.matched = *matched;
            vertex.match_cost = *cost;
        }
        debug!("Restored matching snapshot over {} vertices", snapshot.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::TradeError;

    fn matched_pair() -> TradeGraph {
        let mut graph = TradeGraph::new();
        let a = graph.add_item("A", "alice", false).unwrap();
        let b = graph.add_item("B", "bob", false).unwrap();
        graph.add_want(a, b, 2).unwrap();
        graph.add_want(b, a, 3).unwrap();
        graph.freeze().unwrap();

        // A receives B, B receives A
        let (wa, oa) = (VertexId(0), VertexId(1));
        let (wb, ob) = (VertexId(2), VertexId(3));
        graph.vertices[wa.0].matched = Some(ob);
        graph.vertices[ob.0].matched = Some(wa);
        graph.vertices[wa.0].match_cost = 2;
        graph.vertices[wb.0].matched = Some(oa);
        graph.vertices[oa.0].matched = Some(wb);
        graph.vertices[wb.0].match_cost = 3;
        graph
    }

    #[test]
    fn test_snapshot_restore_round_trip() {
        let mut graph = matched_pair();
        let snapshot = graph.snapshot_matches();
        assert_eq!(snapshot.total_cost(&graph), 5);

        for vertex in &mut graph.vertices {
            vertex.matched = Some(vertex.twin());
            vertex.match_cost = 99;
        }
        graph.restore_matches(&snapshot).unwrap();

        assert_eq!(graph.snapshot_matches(), snapshot);
        assert_eq!(graph.vertices[0].matched, Some(VertexId(3)));
        assert_eq!(graph.vertices[2].match_cost, 3);
    }

    #[test]
    fn test_restore_rejects_foreign_snapshot() {
        let mut graph = matched_pair();
        let other = TradeGraph::new().snapshot_matches();

        assert_eq!(
            graph.restore_matches(&other).unwrap_err(),
            TradeError::Precondition(PreconditionError::SnapshotMismatch {
                expected: 4,
                found: 0
            })
        );
    }

    #[test]
    fn test_snapshot_serializes() {
        let graph = matched_pair();
        let snapshot = graph.snapshot_matches();
        let json = serde_json::to_string(&snapshot).unwrap();
        let decoded: MatchingSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, snapshot);
    }
}
