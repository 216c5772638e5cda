//! Arena-backed graph model and the solver's priority queue
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod graph;
pub mod priority_queue;

pub use self::graph::{
    GraphPhase, Item, TradeGraph, Vertex, VertexRole, WantEdge, DEFAULT_NO_TRADE_COST,
};
pub use self::priority_queue::{HeapError, HeapHandle, HeapStats, PairingHeap};
