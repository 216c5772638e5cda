//! Graph passes run over a frozen trade graph
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod matching;
pub mod scc;

pub use self::matching::{MatchingEngine, MatchingStatistics, TradeCycle, INFINITY};
pub use self::scc::{ConnectivityPruner, PruneStatistics};
