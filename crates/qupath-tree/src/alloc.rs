//! Per-link resource allocations read off a scheme tree.

use qupath_phys::{Cost, Edge, ExpCost};
use std::collections::BTreeMap;

/// Link → number of elementary pairs the tree consumes on it.
pub type Alloc = BTreeMap<Edge, Cost>;

/// Link → expected number of elementary attempts on it.
pub type ExpAlloc = BTreeMap<Edge, ExpCost>;

/// Sum of all expected attempts.
pub fn total_expected(alloc: &ExpAlloc) -> ExpCost {
    alloc.values().sum()
}

/// Sum of all elementary pairs.
pub fn total_pairs(alloc: &Alloc) -> Cost {
    alloc.values().sum()
}
