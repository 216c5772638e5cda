//! Typed configuration for the pruning and matching passes
//!
//! Both passes also expose these settings through the string-keyed
//! [`Algorithm`](crate::algorithm::traits::Algorithm) parameter surface.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

use crate::algorithm::traits::{PreconditionError, TradeResult};

/// Matching engine settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Check the dual certificate once the perfect matching is complete
    pub verify_optimality: bool,
    /// Check the shape of every extracted cycle
    pub validate_cycles: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            verify_optimality: true,
            validate_cycles: true,
        }
    }
}

impl SolverConfig {
    /// Parses a JSON object; missing fields take their defaults
    pub fn from_json(json: &str) -> TradeResult<Self> {
        parse_json("solver_config", json)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// Connectivity pruner settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PruneConfig {
    /// Cross-check the pruned graph after removal
    pub verify_result: bool,
}

impl Default for PruneConfig {
    fn default() -> Self {
        Self { verify_result: true }
    }
}

impl PruneConfig {
    pub fn from_json(json: &str) -> TradeResult<Self> {
        parse_json("prune_config", json)
    }
}

fn parse_json<T: for<'de> Deserialize<'de>>(name: &str, json: &str) -> TradeResult<T> {
    serde_json::from_str(json).map_err(|e| {
        PreconditionError::InvalidParameter {
            name: name.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}
