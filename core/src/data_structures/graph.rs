//! Trade graph with paired want/offer vertices
//!
//! Every item is modeled as two vertices joined by a permanent twin link: a
//! *want* vertex, whose edges point at the items its owner would accept, and
//! an *offer* vertex, whose edges come from every item wanting it. All
//! vertices, edges and items live in arenas addressed by typed handles, so
//! the many back references (twin, match, predecessor) never own anything.
//!
//! # Lifecycle
//! The graph is built while [`GraphPhase::Open`], then [`TradeGraph::freeze`]
//! seals every adjacency list into a fixed slice and snapshots the active
//! vertex arrays. Pruning may only shrink those arrays afterwards; the
//! matching fields are rebuilt by every solve.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;
use std::fmt;

use log::debug;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{EdgeId, ItemId, PreconditionError, TradeResult, VertexId};
use crate::data_structures::priority_queue::HeapHandle;

/// Customary cost of an item's self edge: keeping it must cost more than any
/// ranked want so that trades are preferred whenever one exists.
pub const DEFAULT_NO_TRADE_COST: i64 = 1_000_000_000;

/// Role of a vertex within its item's twin pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VertexRole {
    Want,
    Offer,
}

/// Construction phase of the graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GraphPhase {
    Open,
    Frozen,
}

/// Tradeable unit owned by a participant
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    name: String,
    owner: String,
    is_placeholder: bool,
    want: VertexId,
    offer: VertexId,
}

impl Item {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    /// Synthetic capacity slot standing for "no trade"
    pub fn is_placeholder(&self) -> bool {
        self.is_placeholder
    }

    pub fn want_vertex(&self) -> VertexId {
        self.want
    }

    pub fn offer_vertex(&self) -> VertexId {
        self.offer
    }
}

/// Directed arc from a want vertex to an offer vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WantEdge {
    pub want: VertexId,
    pub offer: VertexId,
    pub cost: i64,
}

/// Incident edges: growable while open, a fixed slice once frozen
#[derive(Debug, Clone)]
enum Adjacency {
    Growing(Vec<EdgeId>),
    Fixed(Box<[EdgeId]>),
}

impl Adjacency {
    fn as_slice(&self) -> &[EdgeId] {
        match self {
            Adjacency::Growing(edges) => edges,
            Adjacency::Fixed(edges) => edges,
        }
    }

    fn as_mut_slice(&mut self) -> &mut [EdgeId] {
        match self {
            Adjacency::Growing(edges) => edges,
            Adjacency::Fixed(edges) => edges,
        }
    }

    fn seal(&mut self) {
        if let Adjacency::Growing(edges) = self {
            let sealed = std::mem::take(edges).into_boxed_slice();
            *self = Adjacency::Fixed(sealed);
        }
    }
}

/// Per-round solver scratch, valid only while `epoch` matches the round
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Scratch {
    pub(crate) epoch: u64,
    pub(crate) entry: Option<HeapHandle>,
    pub(crate) from: Option<VertexId>,
}

impl Scratch {
    pub(crate) fn fresh(epoch: u64, entry: HeapHandle) -> Self {
        Self {
            epoch,
            entry: Some(entry),
            from: None,
        }
    }

    /// Heap entry of this round, if the vertex was queued in it
    pub(crate) fn entry_in(&self, epoch: u64) -> Option<HeapHandle> {
        if self.epoch == epoch { self.entry } else { None }
    }

    /// Predecessor recorded in this round
    pub(crate) fn from_in(&self, epoch: u64) -> Option<VertexId> {
        if self.epoch == epoch { self.from } else { None }
    }
}

/// Want or offer vertex
#[derive(Debug, Clone)]
pub struct Vertex {
    role: VertexRole,
    item: ItemId,
    twin: VertexId,
    adjacency: Adjacency,

    pub(crate) matched: Option<VertexId>,
    pub(crate) match_cost: i64,
    pub(crate) price: i64,
    /// Only kept on offer vertices
    pub(crate) minimum_in_cost: Option<i64>,
    pub(crate) mark: u64,
    pub(crate) component: usize,
    pub(crate) scratch: Scratch,
}

impl Vertex {
    fn new(role: VertexRole, item: ItemId, twin: VertexId) -> Self {
        Self {
            role,
            item,
            twin,
            adjacency: Adjacency::Growing(Vec::new()),
            matched: None,
            match_cost: 0,
            price: 0,
            minimum_in_cost: None,
            mark: 0,
            component: 0,
            scratch: Scratch::default(),
        }
    }

    pub fn role(&self) -> VertexRole {
        self.role
    }

    pub fn item(&self) -> ItemId {
        self.item
    }

    pub fn twin(&self) -> VertexId {
        self.twin
    }

    /// Incident edges in their current order
    pub fn edges(&self) -> &[EdgeId] {
        self.adjacency.as_slice()
    }

    pub fn matched(&self) -> Option<VertexId> {
        self.matched
    }

    pub fn match_cost(&self) -> i64 {
        self.match_cost
    }

    /// Potential carried between solver rounds
    pub fn price(&self) -> i64 {
        self.price
    }

    pub fn minimum_in_cost(&self) -> Option<i64> {
        self.minimum_in_cost
    }

    pub(crate) fn set_edges(&mut self, edges: Vec<EdgeId>) {
        self.adjacency = Adjacency::Fixed(edges.into_boxed_slice());
    }
}

/// Bipartite trade graph
#[derive(Debug, Clone)]
pub struct TradeGraph {
    pub(crate) items: Vec<Item>,
    pub(crate) vertices: Vec<Vertex>,
    pub(crate) edges: Vec<WantEdge>,
    names: HashMap<String, ItemId>,
    phase: GraphPhase,

    /// Active want vertices; fixed at freeze, shrunk by pruning
    pub(crate) wants: Vec<VertexId>,
    /// Active offer vertices; fixed at freeze, shrunk by pruning
    pub(crate) offers: Vec<VertexId>,
    pub(crate) orphans: Vec<ItemId>,
    pub(crate) pruned: bool,

    timestamp: u64,
    round_epoch: u64,
}

impl TradeGraph {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            vertices: Vec::new(),
            edges: Vec::new(),
            names: HashMap::new(),
            phase: GraphPhase::Open,
            wants: Vec::new(),
            offers: Vec::new(),
            orphans: Vec::new(),
            pruned: false,
            timestamp: 0,
            round_epoch: 0,
        }
    }

    /// Adds an item as a want/offer twin pair
    pub fn add_item(
        &mut self,
        name: impl Into<String>,
        owner: impl Into<String>,
        is_placeholder: bool,
    ) -> TradeResult<ItemId> {
        if self.phase == GraphPhase::Frozen {
            return Err(PreconditionError::AlreadyFrozen.into());
        }
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(PreconditionError::DuplicateName(name).into());
        }

        let id = ItemId(self.items.len());
        let want = VertexId(self.vertices.len());
        let offer = VertexId(want.0 + 1);
        self.vertices.push(Vertex::new(VertexRole::Want, id, offer));
        self.vertices.push(Vertex::new(VertexRole::Offer, id, want));

        self.names.insert(name.clone(), id);
        self.items.push(Item {
            name,
            owner: owner.into(),
            is_placeholder,
            want,
            offer,
        });

        Ok(id)
    }

    /// Records that `from`'s owner would accept `to` at `cost`
    ///
    /// `from == to` is the item's self edge: the option of keeping it.
    pub fn add_want(&mut self, from: ItemId, to: ItemId, cost: i64) -> TradeResult<EdgeId> {
        if self.phase == GraphPhase::Frozen {
            return Err(PreconditionError::AlreadyFrozen.into());
        }
        let want = self.item_checked(from)?.want;
        let offer = self.item_checked(to)?.offer;
        if cost < 0 {
            return Err(PreconditionError::NegativeCost { from, to, cost }.into());
        }

        let id = EdgeId(self.edges.len());
        self.edges.push(WantEdge { want, offer, cost });

        for vertex in [want, offer] {
            if let Adjacency::Growing(edges) = &mut self.vertices[vertex.0].adjacency {
                edges.push(id);
            }
        }

        // recomputed anew after pruning
        let sender = &mut self.vertices[offer.0];
        sender.minimum_in_cost = Some(sender.minimum_in_cost.map_or(cost, |c| c.min(cost)));

        Ok(id)
    }

    /// Seals the graph: no more items or edges, adjacency becomes fixed
    pub fn freeze(&mut self) -> TradeResult<()> {
        if self.phase == GraphPhase::Frozen {
            return Err(PreconditionError::AlreadyFrozen.into());
        }

        self.wants = self.items.iter().map(|item| item.want).collect();
        self.offers = self.items.iter().map(|item| item.offer).collect();
        for vertex in &mut self.vertices {
            vertex.adjacency.seal();
        }
        self.phase = GraphPhase::Frozen;

        debug!(
            "Froze trade graph with {} items and {} want edges",
            self.items.len(),
            self.edges.len()
        );
        Ok(())
    }

    pub fn phase(&self) -> GraphPhase {
        self.phase
    }

    pub fn is_frozen(&self) -> bool {
        self.phase == GraphPhase::Frozen
    }

    /// Whether impossible edges have been pruned
    pub fn is_pruned(&self) -> bool {
        self.pruned
    }

    /// Resolves an item by name
    pub fn get_item(&self, name: &str) -> Option<ItemId> {
        self.names.get(name).copied()
    }

    pub fn item(&self, id: ItemId) -> Option<&Item> {
        self.items.get(id.0)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn vertex(&self, id: VertexId) -> Option<&Vertex> {
        self.vertices.get(id.0)
    }

    pub fn edge(&self, id: EdgeId) -> Option<&WantEdge> {
        self.edges.get(id.0)
    }

    /// Number of want edges ever added, pruned or not
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Number of edges still incident to active want vertices
    pub fn live_edge_count(&self) -> usize {
        self.wants.iter().map(|v| self.vertices[v.0].edges().len()).sum()
    }

    /// Finds the live want edge from `from` to `to`
    pub fn get_edge(&self, from: ItemId, to: ItemId) -> Option<EdgeId> {
        let want = self.item(from)?.want;
        let offer = self.item(to)?.offer;
        self.vertices[want.0]
            .edges()
            .iter()
            .copied()
            .find(|edge| self.edges[edge.0].offer == offer)
    }

    /// Active want vertices in iteration order
    pub fn want_vertices(&self) -> &[VertexId] {
        &self.wants
    }

    /// Active offer vertices in iteration order
    pub fn offer_vertices(&self) -> &[VertexId] {
        &self.offers
    }

    /// Items still taking part in the solve
    pub fn active_items(&self) -> impl Iterator<Item = ItemId> + '_ {
        self.wants.iter().map(move |v| self.vertices[v.0].item)
    }

    /// Items set aside by pruning because nobody can trade with them
    pub fn orphans(&self) -> &[ItemId] {
        &self.orphans
    }

    /// The item this item's owner receives under the current matching
    pub fn receives(&self, id: ItemId) -> Option<ItemId> {
        let want = self.item(id)?.want;
        self.vertices[want.0].matched.map(|offer| self.vertices[offer.0].item)
    }

    /// Cost of the current match of this item's want vertex
    pub fn matched_cost(&self, id: ItemId) -> Option<i64> {
        let want = self.item(id)?.want;
        let vertex = &self.vertices[want.0];
        vertex.matched.map(|_| vertex.match_cost)
    }

    /// Whether the item is matched to its own offer vertex
    pub fn keeps_current_owner(&self, id: ItemId) -> bool {
        self.item(id).map_or(false, |item| {
            self.vertices[item.want.0].matched == Some(item.offer)
        })
    }

    /// Reorders active items and each item's want edges for tie-break diversity
    ///
    /// Must run between solves, never during one.
    pub fn shuffle(&mut self, seed: u64) -> TradeResult<()> {
        if !self.is_frozen() {
            return Err(PreconditionError::NotFrozen("shuffling").into());
        }

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.wants.shuffle(&mut rng);
        for want in &self.wants {
            self.vertices[want.0].adjacency.as_mut_slice().shuffle(&mut rng);
        }

        debug!("Shuffled {} active items with seed {}", self.wants.len(), seed);
        Ok(())
    }

    fn item_checked(&self, id: ItemId) -> TradeResult<&Item> {
        self.items
            .get(id.0)
            .ok_or_else(|| PreconditionError::UnknownItem(id).into())
    }

    pub(crate) fn item_of(&self, vertex: VertexId) -> &Item {
        &self.items[self.vertices[vertex.0].item.0]
    }

    pub(crate) fn is_placeholder_vertex(&self, vertex: VertexId) -> bool {
        self.item_of(vertex).is_placeholder
    }

    /// Cheapest live edge cost joining `want` to `offer`
    pub(crate) fn edge_cost_between(&self, want: VertexId, offer: VertexId) -> Option<i64> {
        self.vertices[want.0]
            .edges()
            .iter()
            .map(|edge| &self.edges[edge.0])
            .filter(|edge| edge.offer == offer)
            .map(|edge| edge.cost)
            .min()
    }

    /// Starts a new visitation generation for marks
    pub(crate) fn advance_timestamp(&mut self) -> u64 {
        self.timestamp += 1;
        self.timestamp
    }

    /// Starts a new solver round generation for scratch state
    pub(crate) fn next_round_epoch(&mut self) -> u64 {
        self.round_epoch += 1;
        self.round_epoch
    }
}

impl Default for TradeGraph {
    fn default() -> Self {
        Self::new()
    }
}

/// One line per active item listing what it wants; self edges are omitted
impl fmt::Display for TradeGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_frozen() {
            return writeln!(f, "(open trade graph: {} items)", self.items.len());
        }
        for want in &self.wants {
            let vertex = &self.vertices[want.0];
            write!(f, "{} :", self.items[vertex.item.0].name)?;
            for edge in vertex.edges() {
                let edge = &self.edges[edge.0];
                if edge.offer != vertex.twin {
                    write!(f, " {}", self.item_of(edge.offer).name)?;
                }
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::traits::TradeError;

    fn graph_with_pair() -> (TradeGraph, ItemId, ItemId) {
        let mut graph = TradeGraph::new();
        let a = graph.add_item("A", "alice", false).unwrap();
        let b = graph.add_item("B", "bob", false).unwrap();
        (graph, a, b)
    }

    #[test]
    fn test_item_creates_twin_pair() {
        let (graph, a, _) = graph_with_pair();
        let item = graph.item(a).unwrap();
        let want = graph.vertex(item.want_vertex()).unwrap();
        let offer = graph.vertex(item.offer_vertex()).unwrap();

        assert_eq!(item.name(), "A");
        assert_eq!(item.owner(), "alice");
        assert!(!item.is_placeholder());
        assert_eq!(want.role(), VertexRole::Want);
        assert_eq!(offer.role(), VertexRole::Offer);
        assert_eq!(want.twin(), item.offer_vertex());
        assert_eq!(offer.twin(), item.want_vertex());
        assert_eq!(want.item(), a);
        assert_eq!(offer.item(), a);
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let (mut graph, _, _) = graph_with_pair();
        let err = graph.add_item("A", "carol", false).unwrap_err();
        assert_eq!(
            err,
            TradeError::Precondition(PreconditionError::DuplicateName("A".into()))
        );
    }

    #[test]
    fn test_lookup_by_name() {
        let (graph, a, b) = graph_with_pair();
        assert_eq!(graph.get_item("A"), Some(a));
        assert_eq!(graph.get_item("B"), Some(b));
        assert_eq!(graph.get_item("C"), None);
    }

    #[test]
    fn test_add_want_tracks_minimum_in_cost() {
        let (mut graph, a, b) = graph_with_pair();
        graph.add_want(a, b, 7).unwrap();
        graph.add_want(b, b, 3).unwrap();
        graph.add_want(a, a, 9).unwrap();

        let offer_b = graph.item(b).unwrap().offer_vertex();
        let offer_a = graph.item(a).unwrap().offer_vertex();
        assert_eq!(graph.vertex(offer_b).unwrap().minimum_in_cost(), Some(3));
        assert_eq!(graph.vertex(offer_a).unwrap().minimum_in_cost(), Some(9));
        assert_eq!(graph.vertex(offer_b).unwrap().edges().len(), 2);
    }

    #[test]
    fn test_add_want_validation() {
        let (mut graph, a, _) = graph_with_pair();
        assert!(matches!(
            graph.add_want(a, ItemId(9), 1),
            Err(TradeError::Precondition(PreconditionError::UnknownItem(ItemId(9))))
        ));
        assert!(matches!(
            graph.add_want(a, a, -1),
            Err(TradeError::Precondition(PreconditionError::NegativeCost { .. }))
        ));
    }

    #[test]
    fn test_freeze_is_single_shot() {
        let (mut graph, a, b) = graph_with_pair();
        graph.add_want(a, b, 1).unwrap();
        graph.freeze().unwrap();

        assert_eq!(graph.phase(), GraphPhase::Frozen);
        assert_eq!(graph.want_vertices().len(), 2);
        assert_eq!(graph.offer_vertices().len(), 2);

        let frozen = TradeError::Precondition(PreconditionError::AlreadyFrozen);
        assert_eq!(graph.freeze().unwrap_err(), frozen);
        assert_eq!(graph.add_item("C", "carol", false).unwrap_err(), frozen);
        assert_eq!(graph.add_want(b, a, 1).unwrap_err(), frozen);
    }

    #[test]
    fn test_get_edge() {
        let (mut graph, a, b) = graph_with_pair();
        let edge = graph.add_want(a, b, 4).unwrap();
        graph.freeze().unwrap();

        assert_eq!(graph.get_edge(a, b), Some(edge));
        assert_eq!(graph.get_edge(b, a), None);
        assert_eq!(graph.edge(edge).unwrap().cost, 4);
    }

    #[test]
    fn test_display_lists_wants_without_self_edges() {
        let (mut graph, a, b) = graph_with_pair();
        graph.add_want(a, a, 100).unwrap();
        graph.add_want(a, b, 1).unwrap();
        graph.add_want(b, b, 100).unwrap();
        graph.freeze().unwrap();

        assert_eq!(graph.to_string(), "A : B\nB :\n");
    }

    #[test]
    fn test_shuffle_is_deterministic_per_seed() {
        let build = || {
            let mut graph = TradeGraph::new();
            let ids: Vec<_> = (0..12)
                .map(|i| graph.add_item(format!("item-{}", i), "owner", false).unwrap())
                .collect();
            for &from in &ids {
                for &to in &ids {
                    graph.add_want(from, to, 1).unwrap();
                }
            }
            graph.freeze().unwrap();
            graph
        };

        let mut first = build();
        let mut second = build();
        first.shuffle(42).unwrap();
        second.shuffle(42).unwrap();
        assert_eq!(first.want_vertices(), second.want_vertices());

        let mut items: Vec<_> = first.active_items().collect();
        items.sort();
        assert_eq!(items.len(), 12);
        items.dedup();
        assert_eq!(items.len(), 12);
    }

    #[test]
    fn test_shuffle_requires_frozen_graph() {
        let (mut graph, _, _) = graph_with_pair();
        assert!(graph.shuffle(1).unwrap_err().is_precondition());
    }

    #[test]
    fn test_scratch_is_epoch_scoped() {
        let scratch = Scratch {
            epoch: 3,
            entry: None,
            from: Some(VertexId(4)),
        };
        assert_eq!(scratch.from_in(3), Some(VertexId(4)));
        assert_eq!(scratch.from_in(4), None);
    }
}
