//! Meldable priority queue with decrease-key
//!
//! This module implements a pairing heap keyed by a 64-bit cost, the queue
//! behind every shortest-path round of the matching engine. Entries live in
//! an arena and are addressed by stable [`HeapHandle`]s, so the engine can
//! keep one handle per vertex and lower its key in place.
//!
//! # Structure
//! Every entry owns a possibly-empty child list, a forward sibling link and a
//! back link that points at its parent when it is the first child and at its
//! previous sibling otherwise. The back link lets `decrease_key` splice an
//! entry out of its list in O(1) before melding it into the root.
//!
//! # Complexity
//! - `insert`: O(1)
//! - `decrease_key`: O(1) structural work, amortized sub-logarithmic
//! - `extract_min`: O(log n) amortized (pairwise merge passes)
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use serde::{Deserialize, Serialize};

/// Stable reference to a heap entry, valid for the heap's whole lifetime
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct HeapHandle(usize);

/// Priority queue contract violations
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    #[error("extract_min on an empty heap")]
    Empty,

    #[error("decrease_key must strictly lower the key: current {current}, requested {requested}")]
    KeyNotDecreased { current: i64, requested: i64 },

    #[error("entry {0} was already extracted")]
    EntryConsumed(usize),

    #[error("no heap entry for handle {0}")]
    InvalidHandle(usize),

    #[error("heap order violated between entries {0} and {1}")]
    HeapInvariantViolation(usize, usize),
}

#[derive(Debug, Clone)]
struct Entry<T> {
    payload: T,
    cost: i64,
    child: Option<usize>,
    sibling: Option<usize>,
    /// Parent if first child, else previous sibling
    prev: Option<usize>,
    used: bool,
}

/// Operation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeapStats {
    pub insertions: u64,
    pub decrease_keys: u64,
    pub extractions: u64,
    pub merges: u64,
}

/// Pairing heap over arena-indexed entries
#[derive(Debug, Clone)]
pub struct PairingHeap<T> {
    entries: Vec<Entry<T>>,
    root: Option<usize>,
    len: usize,
    stats: HeapStats,
}

impl<T: Clone> PairingHeap<T> {
    /// Creates an empty heap
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty heap with room for `capacity` entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            root: None,
            len: 0,
            stats: HeapStats::default(),
        }
    }

    /// Inserts `payload` with `cost` and returns its handle
    pub fn insert(&mut self, payload: T, cost: i64) -> HeapHandle {
        let index = self.entries.len();
        self.entries.push(Entry {
            payload,
            cost,
            child: None,
            sibling: None,
            prev: None,
            used: false,
        });

        self.root = Some(match self.root {
            None => index,
            Some(root) => self.merge(index, root),
        });
        self.len += 1;
        self.stats.insertions += 1;

        HeapHandle(index)
    }

    /// Removes and returns the minimum entry
    pub fn extract_min(&mut self) -> Result<(T, i64), HeapError> {
        let root = self.root.ok_or(HeapError::Empty)?;
        self.entries[root].used = true;

        let mut list = self.entries[root].child.take();
        if let Some(mut head) = list {
            // The new root can't have siblings, so pair up the orphaned
            // children until a single tree is left.
            while self.entries[head].sibling.is_some() {
                let mut next_list: Option<usize> = None;
                let mut cursor = Some(head);

                while let Some(a) = cursor {
                    let Some(b) = self.entries[a].sibling else { break };
                    cursor = self.entries[b].sibling;

                    self.entries[a].sibling = None;
                    self.entries[b].sibling = None;
                    let merged = self.merge(a, b);
                    self.entries[merged].sibling = next_list;
                    next_list = Some(merged);
                }

                head = match cursor {
                    Some(odd) => {
                        self.entries[odd].sibling = next_list;
                        odd
                    }
                    None => match next_list {
                        Some(merged) => merged,
                        None => break,
                    },
                };
            }
            self.entries[head].prev = None;
            list = Some(head);
        }

        self.root = list;
        self.len -= 1;
        self.stats.extractions += 1;

        let entry = &self.entries[root];
        Ok((entry.payload.clone(), entry.cost))
    }

    /// Lowers the cost of a live entry
    pub fn decrease_key(&mut self, handle: HeapHandle, cost: i64) -> Result<(), HeapError> {
        let index = handle.0;
        let entry = self.entries.get(index).ok_or(HeapError::InvalidHandle(index))?;
        if entry.used {
            return Err(HeapError::EntryConsumed(index));
        }
        if cost >= entry.cost {
            return Err(HeapError::KeyNotDecreased {
                current: entry.cost,
                requested: cost,
            });
        }

        self.entries[index].cost = cost;
        self.stats.decrease_keys += 1;

        let Some(root) = self.root else {
            return Err(HeapError::InvalidHandle(index));
        };
        if index == root {
            return Ok(());
        }
        let Some(prev) = self.entries[index].prev else {
            return Err(HeapError::InvalidHandle(index));
        };
        // A previous sibling is never cheaper than the parent, so this is a
        // safe stand-in for the parent comparison.
        if cost >= self.entries[prev].cost {
            return Ok(());
        }

        let sibling = self.entries[index].sibling;
        if self.entries[prev].child == Some(index) {
            self.entries[prev].child = sibling;
        } else {
            debug_assert_eq!(self.entries[prev].sibling, Some(index));
            self.entries[prev].sibling = sibling;
        }
        if let Some(next) = sibling {
            self.entries[next].prev = Some(prev);
        }
        self.entries[index].prev = None;
        self.entries[index].sibling = None;

        self.root = Some(self.merge(index, root));
        Ok(())
    }

    /// Current cost of an entry, extracted or not
    pub fn cost(&self, handle: HeapHandle) -> Result<i64, HeapError> {
        self.entries
            .get(handle.0)
            .map(|entry| entry.cost)
            .ok_or(HeapError::InvalidHandle(handle.0))
    }

    /// Whether the entry has been extracted
    pub fn is_consumed(&self, handle: HeapHandle) -> bool {
        self.entries.get(handle.0).map_or(false, |entry| entry.used)
    }

    /// Minimum entry without removing it
    pub fn peek_min(&self) -> Option<(&T, i64)> {
        self.root.map(|root| {
            let entry = &self.entries[root];
            (&entry.payload, entry.cost)
        })
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn stats(&self) -> HeapStats {
        self.stats
    }

    /// Validates heap order and back links over the live tree
    pub fn validate(&self) -> Result<(), HeapError> {
        let Some(root) = self.root else {
            return if self.len == 0 { Ok(()) } else { Err(HeapError::Empty) };
        };
        if self.entries[root].prev.is_some() {
            return Err(HeapError::HeapInvariantViolation(root, root));
        }

        let mut visited = 0;
        let mut stack = vec![root];
        while let Some(parent) = stack.pop() {
            visited += 1;
            let mut expected_prev = parent;
            let mut cursor = self.entries[parent].child;
            while let Some(child) = cursor {
                let entry = &self.entries[child];
                if entry.prev != Some(expected_prev) || entry.used {
                    return Err(HeapError::HeapInvariantViolation(expected_prev, child));
                }
                if entry.cost < self.entries[parent].cost {
                    return Err(HeapError::HeapInvariantViolation(parent, child));
                }
                stack.push(child);
                expected_prev = child;
                cursor = entry.sibling;
            }
        }

        if visited == self.len {
            Ok(())
        } else {
            Err(HeapError::HeapInvariantViolation(root, visited))
        }
    }

    /// Melds two roots; the cheaper one adopts the other as its first child
    fn merge(&mut self, a: usize, b: usize) -> usize {
        let (a, b) = if self.entries[b].cost < self.entries[a].cost { (b, a) } else { (a, b) };

        let first_child = self.entries[a].child;
        self.entries[b].prev = Some(a);
        self.entries[b].sibling = first_child;
        if let Some(next) = first_child {
            self.entries[next].prev = Some(b);
        }
        self.entries[a].child = Some(b);
        self.stats.merges += 1;

        a
    }
}

impl<T: Clone> Default for PairingHeap<T> {
    fn default() -> Self {
        Self::new()
    }
}
