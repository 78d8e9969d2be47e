//! Reading nodes back out of the store: variable labels, cofactors, and leaf payloads. These are
//! the primitives every recursive algorithm in `apply`/`quantify`/`info` is built from.

use fxhash::FxHashSet;

use crate::kernel::flavor::Flavor;
use crate::store::node::NodeBody;
use crate::store::{Handle, LeafKind, NodeTable};

pub fn is_leaf(table: &NodeTable, h: Handle) -> bool {
    if h.is_constant() {
        return true;
    }
    matches!(table.body(h.index()), NodeBody::Leaf { .. })
}

/// Reconstruct a full edge handle for a child read out of a `NodeBody`, recovering the leaf bit
/// by checking the child's own body (the node store only stores a bare index for `low`, see
/// `store::node`).
fn child_handle(table: &NodeTable, index: u64, complement: bool) -> Handle {
    if index <= 1 {
        return Handle::new(index, complement, false, 0);
    }
    let leaf = matches!(table.body(index), NodeBody::Leaf { .. });
    Handle::new(index, complement, leaf, 0)
}

/// The variable label of an internal node, or `None` for a leaf/terminal.
pub fn variable_of(table: &NodeTable, h: Handle) -> Option<u32> {
    if is_leaf(table, h) {
        return None;
    }
    match table.body(h.index()) {
        NodeBody::Internal { variable, .. } => Some(variable),
        NodeBody::Leaf { .. } => None,
    }
}

/// Split an internal node's edges into (low, high), applying Shannon complement propagation for
/// `Flavor::Bdd` (§3.1: the low edge is never complemented in storage, so the outer handle's
/// complement bit must be folded into both children when reading them back out).
pub fn cofactor(table: &NodeTable, flavor: Flavor, h: Handle) -> (Handle, Handle) {
    debug_assert!(!is_leaf(table, h), "cannot cofactor a leaf or terminal");
    match table.body(h.index()) {
        NodeBody::Internal { low, high, high_complement, .. } => {
            if flavor.allows_complement() {
                let outer = h.is_complemented();
                (child_handle(table, low, outer), child_handle(table, high, outer ^ high_complement))
            } else {
                (child_handle(table, low, false), child_handle(table, high, false))
            }
        }
        NodeBody::Leaf { .. } => unreachable!("guarded by is_leaf above"),
    }
}

pub fn leaf_kind(table: &NodeTable, h: Handle) -> Option<LeafKind> {
    if h.is_constant() {
        return None;
    }
    match table.body(h.index()) {
        NodeBody::Leaf { kind, .. } => Some(kind),
        NodeBody::Internal { .. } => None,
    }
}

pub fn leaf_payload(table: &NodeTable, h: Handle) -> Option<u64> {
    if h.is_constant() {
        return None;
    }
    match table.body(h.index()) {
        NodeBody::Leaf { payload, .. } => Some(payload),
        NodeBody::Internal { .. } => None,
    }
}

/// Count the distinct internal+leaf nodes reachable from `roots`, sharing counted once
/// (§6.1 `nodecount`). Explicit-stack DFS (§4.4 "no long loop inside the kernel runs without a
/// yield" — this only walks already-resident nodes, no allocation, so no yield point is needed).
pub fn nodecount(table: &NodeTable, roots: &[Handle]) -> u64 {
    let mut seen: FxHashSet<u64> = FxHashSet::default();
    let mut stack: Vec<Handle> = roots.to_vec();
    let mut count = 0u64;
    while let Some(h) = stack.pop() {
        if h.is_constant() {
            continue;
        }
        if !seen.insert(h.index()) {
            continue;
        }
        count += 1;
        if is_leaf(table, h) {
            continue;
        }
        let (low, high) = cofactor(table, Flavor::Bdd, h);
        // `cofactor`'s complement handling is irrelevant here (structure-only traversal): we pass
        // `Flavor::Bdd` because it is the only flavor that ever needs the complement-aware path,
        // and other flavors ignore the distinction.
        stack.push(low);
        stack.push(high);
    }
    count
}
