//! Core trait and error definitions for the trade-cycle solver
//!
//! This module establishes the typed handles used throughout the arena-based
//! graph, the two-class error taxonomy shared by every component, and the
//! parameter surface common to the pruning and matching passes.
//!
//! # Error Taxonomy
//! - [`PreconditionError`]: the caller broke a usage contract (duplicate
//!   names, mutating a frozen graph, solving before pruning, ...).
//! - [`InvariantViolation`]: the solver broke one of its own invariants
//!   (negative reduced cost, missing sink, potential overflow). These are
//!   defects, never recoverable input conditions.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::collections::HashMap;
use std::fmt::{self, Debug, Display};

use serde::{Deserialize, Serialize};

use crate::data_structures::priority_queue::HeapError;

/// Item identifier; indexes the graph's item arena
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ItemId(pub usize);

impl ItemId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item#{}", self.0)
    }
}

/// Vertex identifier; indexes the graph's vertex arena
///
/// Equality of handles stands in for identity of vertices.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct VertexId(pub usize);

impl VertexId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

impl Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vertex#{}", self.0)
    }
}

/// Want-edge identifier; indexes the graph's edge arena
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct EdgeId(pub usize);

impl EdgeId {
    #[inline]
    pub fn as_usize(self) -> usize {
        self.0
    }
}

/// Usage-contract violations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("Duplicate item name: {0}")]
    DuplicateName(String),

    #[error("Graph is frozen; no further items or edges may be added")]
    AlreadyFrozen,

    #[error("Graph must be frozen before {0}")]
    NotFrozen(&'static str),

    #[error("Impossible edges must be pruned before solving")]
    NotPruned,

    #[error("Unknown item: {0}")]
    UnknownItem(ItemId),

    #[error("Negative want cost {cost} from {from} to {to}")]
    NegativeCost { from: ItemId, to: ItemId, cost: i64 },

    #[error("Snapshot covers {found} vertices but the graph has {expected}")]
    SnapshotMismatch { expected: usize, found: usize },

    #[error("Invalid parameter: {name} - {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Priority queue misuse: {0}")]
    Heap(#[from] HeapError),
}

/// Defects in the solver's maintenance of its own invariants
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantViolation {
    #[error("Negative reduced cost {reduced} on arc {from} -> {to}")]
    NegativeReducedCost { from: VertexId, to: VertexId, reduced: i64 },

    #[error("Round {round} ended without reaching an unmatched offer")]
    MissingSink { round: usize },

    #[error("Augmenting path broken at {0}: no predecessor recorded this round")]
    BrokenAugmentingPath(VertexId),

    #[error("Potential of {0} overflowed the sentinel headroom")]
    PotentialOverflow(VertexId),

    #[error("Priority queue contract broken by the solver: {0}")]
    Heap(HeapError),

    #[error("Dual certificate mismatch: primal cost {primal}, dual value {dual}")]
    DualMismatch { primal: i64, dual: i64 },

    #[error("Malformed trade cycle at {0}: {1}")]
    BrokenCycle(ItemId, String),

    #[error("Pruned graph failed verification: {0}")]
    PruneVerification(String),
}

/// Error type returned by every fallible operation of the core
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeError {
    #[error("Precondition violated: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Internal invariant violated: {0}")]
    Invariant(#[from] InvariantViolation),
}

impl TradeError {
    /// True for caller mistakes
    pub fn is_precondition(&self) -> bool {
        matches!(self, TradeError::Precondition(_))
    }

    /// True for solver defects
    pub fn is_invariant(&self) -> bool {
        matches!(self, TradeError::Invariant(_))
    }
}

impl From<HeapError> for TradeError {
    fn from(error: HeapError) -> Self {
        TradeError::Precondition(PreconditionError::Heap(error))
    }
}

pub type TradeResult<T> = Result<T, TradeError>;

/// Common parameter surface of the pruning and matching passes
pub trait Algorithm: Debug {
    /// Returns the algorithm's descriptive name
    fn name(&self) -> &str;

    /// Returns the algorithm's category
    fn category(&self) -> &str;

    /// Returns a short description with complexity notes
    fn description(&self) -> &str;

    /// Sets a parameter by name from its textual value
    fn set_parameter(&mut self, name: &str, value: &str) -> Result<(), TradeError>;

    /// Gets a parameter's textual value
    fn get_parameter(&self, name: &str) -> Option<String>;

    /// Returns every parameter with its current value
    fn get_parameters(&self) -> HashMap<String, String>;
}

/// Parses a boolean parameter value the way every pass expects it
pub(crate) fn parse_bool_parameter(name: &str, value: &str) -> Result<bool, TradeError> {
    match value {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(PreconditionError::InvalidParameter {
            name: name.to_string(),
            reason: format!("Invalid boolean value: {}. Use 'true' or 'false'", value),
        }
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_type_safety() {
        let a = ItemId(42);
        let b = ItemId(42);
        let c = ItemId(43);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_usize(), 42);
        assert_eq!(VertexId(7).as_usize(), 7);
        assert_eq!(EdgeId(3).as_usize(), 3);
    }

    #[test]
    fn test_error_classes_are_distinguishable() {
        let precondition: TradeError = PreconditionError::AlreadyFrozen.into();
        let invariant: TradeError = InvariantViolation::MissingSink { round: 2 }.into();
        let heap: TradeError = HeapError::Empty.into();

        assert!(precondition.is_precondition());
        assert!(!precondition.is_invariant());
        assert!(invariant.is_invariant());
        assert!(!invariant.is_precondition());
        assert!(heap.is_precondition());
    }

    #[test]
    fn test_error_messages() {
        let err: TradeError = PreconditionError::DuplicateName("book".into()).into();
        assert_eq!(err.to_string(), "Precondition violated: Duplicate item name: book");

        let err: TradeError = InvariantViolation::NegativeReducedCost {
            from: VertexId(0),
            to: VertexId(3),
            reduced: -2,
        }
        .into();
        assert!(err.to_string().starts_with("Internal invariant violated"));
    }

    #[test]
    fn test_bool_parameter_parsing() {
        assert_eq!(parse_bool_parameter("x", "true").unwrap(), true);
        assert_eq!(parse_bool_parameter("x", "false").unwrap(), false);
        assert!(parse_bool_parameter("x", "maybe").is_err());
    }
}
