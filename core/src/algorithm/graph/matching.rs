//! Minimum-Cost Trade Cycle Matching
//!
//! This module finds the cheapest set of disjoint trade cycles over a pruned
//! trade graph. A trade assignment is a perfect matching between want
//! vertices and offer vertices; every item's self edge guarantees one exists.
//! The matching is grown one item per round by successive shortest
//! augmenting paths, with Dijkstra run on reduced costs kept non-negative by
//! per-vertex potentials.
//!
//! # Theoretical Foundation
//!
//! With potentials `p`, the reduced cost of a want edge `w -> o` is
//! `p(w) + c(w, o) - p(o)` and that of a matched offer reversing into its
//! want is `p(o) - c(w, o) - p(w)`. Adding each round's shortest distances to
//! the potentials keeps every reduced cost non-negative and every matched
//! edge at exactly zero, so on completion
//!
//! ```text
//! sum(p(offer)) - sum(p(want)) = sum(matched cost)
//! ```
//!
//! which is the optimality certificate checked when `verify_optimality` is on.
//!
//! # Post-processing
//!
//! - **Placeholder collapse**: real items routed through placeholder items
//!   are rewired to the first real offer along the chain; bypassed
//!   placeholders revert to matching themselves.
//! - **Cycle extraction**: following `match -> twin` from each unvisited,
//!   non-self-matched want vertex yields one trade cycle.
//!
//! # Algorithmic Complexity
//!
//! - **Time Complexity**: O(n (n + E) log n) for n active items
//! - **Space Complexity**: O(n) per round for the queue
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;
use std::time::Instant;

use log::{debug, info, trace};
use serde::{Deserialize, Serialize};

use crate::algorithm::config::SolverConfig;
use crate::algorithm::traits::{
    parse_bool_parameter, Algorithm, InvariantViolation, ItemId, PreconditionError, TradeError,
    TradeResult, VertexId,
};
use crate::data_structures::graph::{Scratch, TradeGraph, VertexRole};
use crate::data_structures::priority_queue::{HeapHandle, PairingHeap};

/// Sentinel cost of a vertex not yet reached in a round
///
/// Must exceed any real path cost; potentials of unreached vertices grow by
/// this amount each round.
pub const INFINITY: i64 = 100_000_000_000_000;

/// Closed chain of trades: each item goes to the owner of the one before it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeCycle {
    items: Vec<ItemId>,
    cost: i64,
}

impl TradeCycle {
    /// Items in trade order; the owner of `items[i]` receives `items[i + 1]`
    pub fn items(&self) -> &[ItemId] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn contains(&self, item: ItemId) -> bool {
        self.items.contains(&item)
    }

    /// Sum of the matched costs of every item in the cycle
    pub fn total_cost(&self) -> i64 {
        self.cost
    }
}

/// Performance and behavior statistics for one solve
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchingStatistics {
    pub rounds: usize,
    pub relaxations: usize,
    pub total_cost: i64,
    pub cycles: usize,
    pub placeholders_collapsed: usize,
    pub execution_time_ms: f64,
}

/// Successive shortest path matching engine
#[derive(Debug, Clone)]
pub struct MatchingEngine {
    config: SolverConfig,
    statistics: MatchingStatistics,
}

impl MatchingEngine {
    pub fn new() -> Self {
        Self::with_config(SolverConfig::default())
    }

    pub fn with_config(config: SolverConfig) -> Self {
        Self {
            config,
            statistics: MatchingStatistics::default(),
        }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    pub fn get_statistics(&self) -> &MatchingStatistics {
        &self.statistics
    }

    /// Solves the graph and returns its trade cycles
    ///
    /// Items outside every cycle, orphans included, end up matched to
    /// themselves and report [`TradeGraph::keeps_current_owner`].
    pub fn find_cycles(&mut self, graph: &mut TradeGraph) -> TradeResult<Vec<TradeCycle>> {
        let start_time = Instant::now();
        self.compute_matching(graph)?;

        let rewired = self.collapse_placeholders(graph)?;
        let cycles = Self::extract_cycles(graph);
        if self.config.validate_cycles {
            Self::validate_cycles(graph, &cycles, &rewired)?;
        }

        self.statistics.cycles = cycles.len();
        self.statistics.total_cost = cycles.iter().map(TradeCycle::total_cost).sum();
        self.statistics.execution_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        info!(
            "Found {} trade cycles moving {} items at total cost {} in {} rounds",
            cycles.len(),
            cycles.iter().map(TradeCycle::len).sum::<usize>(),
            self.statistics.total_cost,
            self.statistics.rounds
        );
        Ok(cycles)
    }

    /// Builds the minimum-cost perfect matching and returns its cost
    ///
    /// Placeholders are left in place; [`find_cycles`](Self::find_cycles)
    /// collapses them.
    pub fn compute_matching(&mut self, graph: &mut TradeGraph) -> TradeResult<i64> {
        if !graph.is_frozen() {
            return Err(PreconditionError::NotFrozen("solving").into());
        }
        if !graph.is_pruned() {
            return Err(PreconditionError::NotPruned.into());
        }
        let start_time = Instant::now();
        self.statistics = MatchingStatistics::default();

        Self::initialize(graph);
        for round in 0..graph.wants.len() {
            let epoch = graph.next_round_epoch();
            let (sink, heap) = self.shortest_paths(graph, round, epoch)?;
            Self::augment(graph, sink, epoch)?;
            Self::reprice(graph, &heap, epoch)?;
            self.statistics.rounds += 1;
        }

        let cost: i64 = graph
            .wants
            .iter()
            .map(|want| graph.vertices[want.0].match_cost)
            .sum();
        if self.config.verify_optimality {
            Self::verify_dual(graph, cost)?;
        }

        self.statistics.execution_time_ms = start_time.elapsed().as_secs_f64() * 1000.0;
        debug!(
            "Perfect matching over {} items costs {} ({} relaxations)",
            graph.wants.len(),
            cost,
            self.statistics.relaxations
        );
        Ok(cost)
    }

    /// Clears matches and seeds potentials; orphans keep their own item
    fn initialize(graph: &mut TradeGraph) {
        for want in &graph.wants {
            let vertex = &mut graph.vertices[want.0];
            vertex.matched = None;
            vertex.match_cost = 0;
            vertex.price = 0;
        }
        for offer in &graph.offers {
            let vertex = &mut graph.vertices[offer.0];
            vertex.matched = None;
            vertex.match_cost = 0;
            vertex.price = vertex.minimum_in_cost.unwrap_or(0);
        }

        for index in 0..graph.orphans.len() {
            let item = &graph.items[graph.orphans[index].0];
            let (want, offer) = (item.want_vertex(), item.offer_vertex());
            let cost = graph.edge_cost_between(want, offer).unwrap_or(0);
            Self::link(graph, want, offer, cost);
        }
    }

    /// One Dijkstra pass over reduced costs; returns the round's sink
    fn shortest_paths(
        &mut self,
        graph: &mut TradeGraph,
        round: usize,
        epoch: u64,
    ) -> TradeResult<(VertexId, PairingHeap<VertexId>)> {
        let mut heap = PairingHeap::with_capacity(graph.wants.len() + graph.offers.len());
        for offer in &graph.offers {
            let entry = heap.insert(*offer, INFINITY);
            graph.vertices[offer.0].scratch = Scratch::fresh(epoch, entry);
        }
        for want in &graph.wants {
            // only unmatched wants are free starting points
            let cost = if graph.vertices[want.0].matched.is_none() { 0 } else { INFINITY };
            let entry = heap.insert(*want, cost);
            graph.vertices[want.0].scratch = Scratch::fresh(epoch, entry);
        }

        let mut sink: Option<(VertexId, i64)> = None;
        while !heap.is_empty() {
            let (vertex, cost) = heap.extract_min().map_err(InvariantViolation::Heap)?;
            if cost >= INFINITY {
                break;
            }

            match graph.vertices[vertex.0].role() {
                VertexRole::Want => self.relax_want_edges(graph, &mut heap, epoch, vertex, cost)?,
                VertexRole::Offer => {
                    let matched = graph.vertices[vertex.0].matched;
                    match matched {
                        None => {
                            if sink.map_or(true, |(_, best)| cost < best) {
                                sink = Some((vertex, cost));
                            }
                        }
                        Some(want) => {
                            let offer_price = graph.vertices[vertex.0].price;
                            let node = &graph.vertices[want.0];
                            let reduced = offer_price
                                .checked_sub(node.match_cost)
                                .and_then(|c| c.checked_sub(node.price))
                                .ok_or(InvariantViolation::PotentialOverflow(vertex))?;
                            self.relax(graph, &mut heap, epoch, vertex, want, cost, reduced)?;
                        }
                    }
                }
            }
        }

        let (sink, sink_cost) = sink.ok_or(InvariantViolation::MissingSink { round })?;
        trace!("Round {} ends at {} with path cost {}", round, sink, sink_cost);
        Ok((sink, heap))
    }

    fn relax_want_edges(
        &mut self,
        graph: &mut TradeGraph,
        heap: &mut PairingHeap<VertexId>,
        epoch: u64,
        want: VertexId,
        cost: i64,
    ) -> TradeResult<()> {
        let degree = graph.vertices[want.0].edges().len();
        for k in 0..degree {
            let edge = graph.edges[graph.vertices[want.0].edges()[k].0];
            let node = &graph.vertices[want.0];
            if node.matched == Some(edge.offer) {
                continue;
            }
            let reduced = node
                .price
                .checked_add(edge.cost)
                .and_then(|c| c.checked_sub(graph.vertices[edge.offer.0].price))
                .ok_or(InvariantViolation::PotentialOverflow(want))?;
            self.relax(graph, heap, epoch, want, edge.offer, cost, reduced)?;
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn relax(
        &mut self,
        graph: &mut TradeGraph,
        heap: &mut PairingHeap<VertexId>,
        epoch: u64,
        from: VertexId,
        to: VertexId,
        cost: i64,
        reduced: i64,
    ) -> TradeResult<()> {
        if reduced < 0 {
            return Err(InvariantViolation::NegativeReducedCost { from, to, reduced }.into());
        }
        let candidate = cost
            .checked_add(reduced)
            .ok_or(InvariantViolation::PotentialOverflow(to))?;
        let entry = Self::entry(graph, to, epoch)?;
        let current = heap.cost(entry).map_err(InvariantViolation::Heap)?;

        if candidate < current {
            heap.decrease_key(entry, candidate)
                .map_err(InvariantViolation::Heap)?;
            graph.vertices[to.0].scratch.from = Some(from);
            self.statistics.relaxations += 1;
        }
        Ok(())
    }

    fn entry(graph: &TradeGraph, vertex: VertexId, epoch: u64) -> TradeResult<HeapHandle> {
        graph.vertices[vertex.0]
            .scratch
            .entry_in(epoch)
            .ok_or_else(|| InvariantViolation::BrokenAugmentingPath(vertex).into())
    }

    /// Flips matches along the predecessor chain ending at `sink`
    fn augment(graph: &mut TradeGraph, sink: VertexId, epoch: u64) -> TradeResult<()> {
        let limit = graph.vertices.len();
        let mut offer = Some(sink);
        let mut steps = 0;

        while let Some(current) = offer {
            steps += 1;
            if steps > limit {
                return Err(InvariantViolation::BrokenAugmentingPath(current).into());
            }
            let want = graph.vertices[current.0]
                .scratch
                .from_in(epoch)
                .ok_or(InvariantViolation::BrokenAugmentingPath(current))?;

            if let Some(old) = graph.vertices[current.0].matched {
                graph.vertices[old.0].matched = None;
            }
            if let Some(old) = graph.vertices[want.0].matched {
                graph.vertices[old.0].matched = None;
            }
            let cost = graph
                .edge_cost_between(want, current)
                .ok_or(InvariantViolation::BrokenAugmentingPath(want))?;
            Self::link(graph, want, current, cost);

            // the offer this want held before, if it was matched
            offer = graph.vertices[want.0].scratch.from_in(epoch);
        }
        Ok(())
    }

    /// Adds each vertex's round distance to its potential
    fn reprice(graph: &mut TradeGraph, heap: &PairingHeap<VertexId>, epoch: u64) -> TradeResult<()> {
        for vertex in graph.wants.iter().chain(graph.offers.iter()) {
            let node = &mut graph.vertices[vertex.0];
            let entry = node
                .scratch
                .entry_in(epoch)
                .ok_or(InvariantViolation::BrokenAugmentingPath(*vertex))?;
            let distance = heap.cost(entry).map_err(InvariantViolation::Heap)?;
            node.price = node
                .price
                .checked_add(distance)
                .ok_or(InvariantViolation::PotentialOverflow(*vertex))?;
        }
        Ok(())
    }

    fn verify_dual(graph: &TradeGraph, primal: i64) -> TradeResult<()> {
        let price = |v: &VertexId| i128::from(graph.vertices[v.0].price);
        let dual = graph.offers.iter().map(price).sum::<i128>()
            - graph.wants.iter().map(price).sum::<i128>();

        if dual != i128::from(primal) {
            return Err(InvariantViolation::DualMismatch {
                primal,
                dual: i64::try_from(dual).unwrap_or(i64::MAX),
            }
            .into());
        }
        Ok(())
    }

    /// Rewires real items past placeholders; returns which wants were rewired
    fn collapse_placeholders(&mut self, graph: &mut TradeGraph) -> TradeResult<Vec<bool>> {
        let mut rewired = vec![false; graph.vertices.len()];
        let limit = graph.items.len();

        for index in 0..graph.wants.len() {
            let want = graph.wants[index];
            if graph.is_placeholder_vertex(want) {
                continue;
            }

            let mut steps = 0;
            loop {
                let placeholder = match graph.vertices[want.0].matched {
                    Some(offer) if graph.is_placeholder_vertex(offer) => offer,
                    _ => break,
                };
                steps += 1;
                if steps > limit {
                    return Err(InvariantViolation::BrokenCycle(
                        graph.vertices[want.0].item(),
                        "placeholder chain never reaches a real item".to_string(),
                    )
                    .into());
                }
                let placeholder_want = graph.vertices[placeholder.0].twin();
                let next = graph.vertices[placeholder_want.0].matched.ok_or_else(|| {
                    InvariantViolation::BrokenCycle(
                        graph.vertices[placeholder.0].item(),
                        "placeholder left unmatched".to_string(),
                    )
                })?;

                let carried = graph.vertices[want.0].match_cost;
                Self::link(graph, want, next, carried);
                let keep = graph
                    .edge_cost_between(placeholder_want, placeholder)
                    .unwrap_or(0);
                Self::link(graph, placeholder_want, placeholder, keep);

                rewired[want.0] = true;
                self.statistics.placeholders_collapsed += 1;
            }
        }

        // cycles made only of placeholders trade nothing
        let mut reverted = 0;
        for index in 0..graph.wants.len() {
            let want = graph.wants[index];
            let twin = graph.vertices[want.0].twin();
            if graph.is_placeholder_vertex(want) && graph.vertices[want.0].matched != Some(twin) {
                let keep = graph.edge_cost_between(want, twin).unwrap_or(0);
                Self::link(graph, want, twin, keep);
                reverted += 1;
            }
        }

        if self.statistics.placeholders_collapsed > 0 || reverted > 0 {
            debug!(
                "Collapsed {} placeholders, reverted {} placeholder-only matches",
                self.statistics.placeholders_collapsed, reverted
            );
        }
        self.statistics.placeholders_collapsed += reverted;
        Ok(rewired)
    }

    fn extract_cycles(graph: &mut TradeGraph) -> Vec<TradeCycle> {
        let timestamp = graph.advance_timestamp();
        let mut cycles = Vec::new();

        for index in 0..graph.wants.len() {
            let start = graph.wants[index];
            let node = &graph.vertices[start.0];
            if node.mark == timestamp || node.matched.is_none() || node.matched == Some(node.twin()) {
                continue;
            }

            let mut items = Vec::new();
            let mut cost: i64 = 0;
            let mut current = start;
            while graph.vertices[current.0].mark != timestamp {
                let vertex = &mut graph.vertices[current.0];
                vertex.mark = timestamp;
                items.push(vertex.item());
                cost = cost.saturating_add(vertex.match_cost);

                let matched = vertex.matched;
                match matched {
                    Some(offer) => current = graph.vertices[offer.0].twin(),
                    None => break,
                }
            }
            cycles.push(TradeCycle { items, cost });
        }

        cycles
    }

    fn validate_cycles(graph: &TradeGraph, cycles: &[TradeCycle], rewired: &[bool]) -> TradeResult<()> {
        let broken = |item: ItemId, reason: String| -> TradeError {
            InvariantViolation::BrokenCycle(item, reason).into()
        };

        for cycle in cycles {
            if cycle.len() < 2 {
                let item = cycle.items.first().copied().unwrap_or(ItemId(0));
                return Err(broken(item, "fewer than two items".to_string()));
            }

            for (position, &item) in cycle.items.iter().enumerate() {
                let entry = &graph.items[item.0];
                if entry.is_placeholder() {
                    return Err(broken(item, "placeholder left in a trade cycle".to_string()));
                }

                let want = entry.want_vertex();
                let node = &graph.vertices[want.0];
                let offer = node
                    .matched
                    .ok_or_else(|| broken(item, "unmatched want vertex".to_string()))?;
                if graph.vertices[offer.0].matched != Some(want) {
                    return Err(broken(item, "match links disagree".to_string()));
                }

                let successor = cycle.items[(position + 1) % cycle.len()];
                if graph.vertices[offer.0].item() != successor {
                    return Err(broken(item, "cycle does not close".to_string()));
                }

                // a rewired want keeps the cost of its edge into the first placeholder
                if rewired[want.0] {
                    continue;
                }
                match graph.edge_cost_between(want, offer) {
                    Some(cost) if cost != node.match_cost => {
                        return Err(broken(
                            item,
                            format!("matched cost {} but want edge costs {}", node.match_cost, cost),
                        ));
                    }
                    None => {
                        return Err(broken(item, "no want edge to the received item".to_string()));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }

    /// Matches `want` and `offer` to each other at `cost`
    fn link(graph: &mut TradeGraph, want: VertexId, offer: VertexId, cost: i64) {
        let want_node = &mut graph.vertices[want.0];
        want_node.matched = Some(offer);
        want_node.match_cost = cost;
        let offer_node = &mut graph.vertices[offer.0];
        offer_node.matched = Some(want);
        offer_node.match_cost = cost;
    }
}

impl Default for MatchingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Algorithm for MatchingEngine {
    fn name(&self) -> &str {
        "Minimum-Cost Trade Cycles (Successive Shortest Paths)"
    }

    fn category(&self) -> &str {
        "matching"
    }

    fn description(&self) -> &str {
        "Minimum-cost perfect matching between want and offer vertices by successive shortest augmenting paths, using Dijkstra on a pairing heap with vertex potentials. Placeholders are collapsed and trade cycles read off the final matching. Runs in O(n(n+E) log n)."
    }

    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), TradeError> {
        match name {
            "verify_optimality" => {
                self.config.verify_optimality = parse_bool_parameter(name, value)?;
                Ok(())
            }
            "validate_cycles" => {
                self.config.validate_cycles = parse_bool_parameter(name, value)?;
                Ok(())
            }
            _ => Err(PreconditionError::InvalidParameter {
                name: name.to_string(),
                reason: "Unknown parameter. Valid parameters: verify_optimality, validate_cycles"
                    .to_string(),
            }
            .into()),
        }
    }

    fn get_parameter(&self, name: &str) -> Option<String> {
        match name {
            "verify_optimality" => Some(self.config.verify_optimality.to_string()),
            "validate_cycles" => Some(self.config.validate_cycles.to_string()),
            _ => None,
        }
    }

    fn get_parameters(&self) -> HashMap<String, String> {
        let mut parameters = HashMap::new();
        parameters.insert(
            "verify_optimality".to_string(),
            self.config.verify_optimality.to_string(),
        );
        parameters.insert(
            "validate_cycles".to_string(),
            self.config.validate_cycles.to_string(),
        );
        parameters
    }
}
