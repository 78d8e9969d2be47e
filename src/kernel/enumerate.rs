//! Enumerating satisfying assignments (§6.1 `enum_first`/`enum_next`) and satisfying clauses
//! (`clause_enum_first`/`clause_enum_next`, which leave variables absent from the path as
//! don't-care instead of fixing them to `false`). Pure reads over an already-built DD: no
//! allocation happens here, so unlike `apply`/`quantify` these need no cache probe and no GC
//! yield point.

use crate::kernel::access::{cofactor, is_leaf};
use crate::kernel::flavor::Flavor;
use crate::store::{Handle, NodeTable};

/// One variable's value in a clause, or `None` if the clause doesn't constrain it.
pub type Clause = Vec<Option<bool>>;

/// The leftmost satisfying path through `node` (low branch preferred at every step), as
/// `(variable, chosen value)` pairs in the order encountered.
fn first_path(table: &NodeTable, flavor: Flavor, node: Handle) -> Option<Vec<(u32, bool)>> {
    if node.is_false() {
        return None;
    }
    if is_leaf(table, node) {
        return Some(Vec::new());
    }
    let (low, high) = cofactor(table, flavor, node);
    let var = crate::kernel::access::variable_of(table, node).expect("internal node");
    if let Some(mut rest) = first_path(table, flavor, low) {
        rest.insert(0, (var, false));
        return Some(rest);
    }
    if let Some(mut rest) = first_path(table, flavor, high) {
        rest.insert(0, (var, true));
        return Some(rest);
    }
    None
}

/// The lexicographically next satisfying path after `prev` (a path previously returned by
/// `first_path`/`next_path` over the same `node`).
fn next_path(table: &NodeTable, flavor: Flavor, node: Handle, prev: &[(u32, bool)]) -> Option<Vec<(u32, bool)>> {
    let (var, choice) = *prev.first()?;
    let (low, high) = cofactor(table, flavor, node);
    if !choice {
        if let Some(mut rest) = next_path(table, flavor, low, &prev[1..]) {
            rest.insert(0, (var, false));
            return Some(rest);
        }
        if let Some(mut rest) = first_path(table, flavor, high) {
            rest.insert(0, (var, true));
            return Some(rest);
        }
        None
    } else {
        let mut rest = next_path(table, flavor, high, &prev[1..])?;
        rest.insert(0, (var, true));
        Some(rest)
    }
}

fn densify(sparse: &[(u32, bool)], dom: &[u32]) -> Vec<bool> {
    let mut out = Vec::with_capacity(dom.len());
    let mut it = sparse.iter().peekable();
    for &v in dom {
        match it.peek() {
            Some(&&(sv, sb)) if sv == v => {
                out.push(sb);
                it.next();
            }
            _ => out.push(false),
        }
    }
    out
}

fn to_clause(sparse: &[(u32, bool)], dom: &[u32]) -> Clause {
    let mut out = vec![None; dom.len()];
    let mut it = sparse.iter().peekable();
    for (i, &v) in dom.iter().enumerate() {
        if let Some(&&(sv, sb)) = it.peek() {
            if sv == v {
                out[i] = Some(sb);
                it.next();
            }
        }
    }
    out
}

/// Re-walk `node` following `dense` (one value per `dom` entry) to recover which variables
/// actually sit on that path, discarding the values filled in only because `densify` defaulted
/// them to `false`.
fn sparsify(table: &NodeTable, flavor: Flavor, mut node: Handle, dense: &[bool], dom: &[u32]) -> Vec<(u32, bool)> {
    let mut path = Vec::new();
    for (idx, &v) in dom.iter().enumerate() {
        if is_leaf(table, node) {
            break;
        }
        let nv = crate::kernel::access::variable_of(table, node).expect("internal node");
        if nv == v {
            let choice = dense[idx];
            path.push((v, choice));
            let (low, high) = cofactor(table, flavor, node);
            node = if choice { high } else { low };
        }
    }
    path
}

pub fn enum_first(table: &NodeTable, flavor: Flavor, dd: Handle, dom: &[u32]) -> Option<Vec<bool>> {
    first_path(table, flavor, dd).map(|p| densify(&p, dom))
}

pub fn enum_next(table: &NodeTable, flavor: Flavor, dd: Handle, dom: &[u32], prev: &[bool]) -> Option<Vec<bool>> {
    let sparse_prev = sparsify(table, flavor, dd, prev, dom);
    next_path(table, flavor, dd, &sparse_prev).map(|p| densify(&p, dom))
}

pub fn clause_enum_first(table: &NodeTable, flavor: Flavor, dd: Handle, dom: &[u32]) -> Option<Clause> {
    first_path(table, flavor, dd).map(|p| to_clause(&p, dom))
}

pub fn clause_enum_next(table: &NodeTable, flavor: Flavor, dd: Handle, dom: &[u32], prev: &Clause) -> Option<Clause> {
    let sparse_prev: Vec<(u32, bool)> = dom.iter().zip(prev.iter()).filter_map(|(&v, &c)| c.map(|b| (v, b))).collect();
    next_path(table, flavor, dd, &sparse_prev).map(|p| to_clause(&p, dom))
}
