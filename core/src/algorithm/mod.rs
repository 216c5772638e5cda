//! Trade-cycle solver passes and their shared contracts
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

pub mod config;
pub mod graph;
pub mod state;
pub mod traits;

pub use self::config::*;
pub use self::graph::*;
pub use self::state::*;
pub use self::traits::*;
