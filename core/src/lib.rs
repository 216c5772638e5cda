//! # tradecycle-core
//!
//! Minimum-cost trade cycles for multi-party barter. Each item has an owner
//! and a costed list of items its owner would accept in exchange; the solver
//! finds disjoint cycles of trades of least total cost, with every item
//! either trading along exactly one cycle or staying with its owner.
//!
//! ```text
//! build graph -> freeze -> prune -> (shuffle) -> solve -> collapse -> cycles
//! ```
//!
//! ```no_run
//! use tradecycle_core::{ConnectivityPruner, MatchingEngine, TradeGraph, DEFAULT_NO_TRADE_COST};
//!
//! # fn main() -> tradecycle_core::TradeResult<()> {
//! let mut graph = TradeGraph::new();
//! let a = graph.add_item("A", "alice", false)?;
//! let b = graph.add_item("B", "bob", false)?;
//! graph.add_want(a, a, DEFAULT_NO_TRADE_COST)?;
//! graph.add_want(b, b, DEFAULT_NO_TRADE_COST)?;
//! graph.add_want(a, b, 1)?;
//! graph.add_want(b, a, 1)?;
//! graph.freeze()?;
//!
//! ConnectivityPruner::new().prune(&mut graph)?;
//! let cycles = MatchingEngine::new().find_cycles(&mut graph)?;
//! assert_eq!(cycles.len(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod algorithm;
pub mod data_structures;

pub use algorithm::{
    Algorithm, ConnectivityPruner, EdgeId, InvariantViolation, ItemId, MatchingEngine,
    MatchingSnapshot, MatchingStatistics, PreconditionError, PruneConfig, PruneStatistics,
    SolverConfig, TradeCycle, TradeError, TradeResult, VertexId,
};
pub use data_structures::{
    GraphPhase, HeapError, PairingHeap, TradeGraph, VertexRole, DEFAULT_NO_TRADE_COST,
};
