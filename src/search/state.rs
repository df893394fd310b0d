//! Search states and the best-first frontier.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap};

/// Duplicate-count bound of the root state, worse than any real count.
pub const UNBOUNDED: u64 = u64::MAX;

/// One node of the branch-and-bound search.
///
/// `selected` is the fixed part of the candidate key; `remaining` holds the
/// columns not yet tried relative to this node. The two never overlap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchState {
    /// Columns fixed by the path to this state, in selection order.
    pub selected: Vec<String>,
    /// Columns still available for extension, in table order.
    pub remaining: Vec<String>,
    /// Duplicate count of `selected`; children must beat it.
    pub bound: u64,
}

impl SearchState {
    /// The root state: nothing selected, every column remaining.
    pub fn root(columns: Vec<String>) -> Self {
        Self {
            selected: Vec::new(),
            remaining: columns,
            bound: UNBOUNDED,
        }
    }

    /// Columns probed when extending this state with `remaining[index]`.
    pub fn extended_columns(&self, index: usize) -> Vec<String> {
        let mut columns = Vec::with_capacity(self.selected.len() + 1);
        columns.extend(self.selected.iter().cloned());
        columns.push(self.remaining[index].clone());
        columns
    }

    /// The selected columns as an unordered set.
    ///
    /// Because every state's `remaining` is the table's columns minus
    /// `selected`, two states with the same fingerprint are identical.
    pub fn fingerprint(&self) -> BTreeSet<String> {
        self.selected.iter().cloned().collect()
    }

    /// Child state selecting `remaining[index]` with the given bound.
    pub fn child(&self, index: usize, bound: u64) -> Self {
        let mut remaining = self.remaining.clone();
        let column = remaining.remove(index);

        let mut selected = self.selected.clone();
        selected.push(column);

        Self {
            selected,
            remaining,
            bound,
        }
    }
}

/// Frontier ordering key: fewest selected columns first, then the lowest
/// duplicate bound, then insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct FrontierKey {
    width: usize,
    bound: u64,
    seq: u64,
}

#[derive(Debug)]
struct FrontierEntry {
    key: Reverse<FrontierKey>,
    state: SearchState,
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for FrontierEntry {}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Priority queue of unexpanded states.
///
/// Popping by selected-column count keeps the emitted candidates in
/// non-decreasing width, which the result compressor relies on. A state
/// reached again through a different selection order is not re-queued.
#[derive(Debug, Default)]
pub struct Frontier {
    heap: BinaryHeap<FrontierEntry>,
    visited: BTreeSet<BTreeSet<String>>,
    next_seq: u64,
    high_water: usize,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a state. Returns `false` if the same selection was queued before.
    pub fn push(&mut self, state: SearchState) -> bool {
        if !self.visited.insert(state.fingerprint()) {
            return false;
        }
        let key = FrontierKey {
            width: state.selected.len(),
            bound: state.bound,
            seq: self.next_seq,
        };
        self.next_seq += 1;
        self.heap.push(FrontierEntry {
            key: Reverse(key),
            state,
        });
        self.high_water = self.high_water.max(self.heap.len());
        true
    }

    pub fn pop(&mut self) -> Option<SearchState> {
        self.heap.pop().map(|e| e.state)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Largest size the frontier reached.
    pub fn high_water(&self) -> usize {
        self.high_water
    }
}
