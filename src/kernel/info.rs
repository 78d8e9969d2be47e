//! Cheap structural queries: `satcount`, `pathcount`, `support`, and single-node accessors
//! (`var`/`low`/`high`/`isleaf`). `nodecount` lives in `access` since it is also used internally
//! by GC marking.

use fxhash::{FxHashMap, FxHashSet};

use crate::cache::{Key, Value};
use crate::kernel::access::{cofactor, is_leaf, leaf_payload, variable_of};
use crate::kernel::apply::and;
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::ithvar;
use crate::runtime::WorkerContext;
use crate::store::Handle;

const OPCODE_SATCOUNT: u8 = 24;
const OPCODE_PATHCOUNT: u8 = 25;

/// Number of satisfying assignments over `dom`, a sorted list of every variable the caller
/// considers relevant (§6.1 `satcount(dd, dom)`; variables missing from a node's structure count
/// for both of their values since the node is independent of them).
pub fn satcount(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, dom: &[u32]) -> u128 {
    satcount_at(ctx, flavor, dd, dom, 0)
}

fn satcount_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, dom: &[u32], idx: usize) -> u128 {
    if idx == dom.len() {
        return if node.is_true() { 1 } else { 0 };
    }
    let key = Key::new(OPCODE_SATCOUNT, node.raw(), idx as u64, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return v.primary as u128 | ((v.secondary as u128) << 64);
    }
    let result = match variable_of(&ctx.store, node) {
        None => {
            let remaining = (dom.len() - idx) as u32;
            if node.is_true() { 1u128 << remaining } else { 0 }
        }
        Some(nv) if nv == dom[idx] => {
            let (low, high) = cofactor(&ctx.store, flavor, node);
            satcount_at(ctx, flavor, low, dom, idx + 1) + satcount_at(ctx, flavor, high, dom, idx + 1)
        }
        Some(_) => 2u128 * satcount_at(ctx, flavor, node, dom, idx + 1),
    };
    ctx.cache.put(&key, Value { primary: result as u64, secondary: (result >> 64) as u64 });
    result
}

/// Number of distinct root-to-leaf paths that do not pass through `false` (§6.1 `pathcount`),
/// ignoring variable gaps entirely — a purely structural count, unlike `satcount`.
pub fn pathcount(ctx: &mut WorkerContext, dd: Handle) -> u128 {
    let mut memo: FxHashMap<u64, u128> = FxHashMap::default();
    pathcount_at(&ctx.store, dd, &mut memo)
}

fn pathcount_at(table: &crate::store::NodeTable, node: Handle, memo: &mut FxHashMap<u64, u128>) -> u128 {
    if node.is_false() {
        return 0;
    }
    if is_leaf(table, node) {
        return 1;
    }
    if let Some(&cached) = memo.get(&node.raw()) {
        return cached;
    }
    let (low, high) = cofactor(table, Flavor::Bdd, node);
    let result = pathcount_at(table, low, memo) + pathcount_at(table, high, memo);
    memo.insert(node.raw(), result);
    result
}

fn support_vars(table: &crate::store::NodeTable, dd: Handle) -> Vec<u32> {
    let mut seen = FxHashSet::default();
    let mut vars = FxHashSet::default();
    let mut stack = vec![dd];
    while let Some(h) = stack.pop() {
        if h.is_constant() || !seen.insert(h.index()) {
            continue;
        }
        if is_leaf(table, h) {
            continue;
        }
        let v = variable_of(table, h).expect("internal node");
        vars.insert(v);
        let (low, high) = cofactor(table, Flavor::Bdd, h);
        stack.push(low);
        stack.push(high);
    }
    let mut out: Vec<u32> = vars.into_iter().collect();
    out.sort_unstable();
    out
}

/// The cube of variables `dd` depends on, itself returned as a DD (§6.1 `support`).
pub fn support(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle) -> Handle {
    let vars = support_vars(&ctx.store, dd);
    let mut cube = Handle::TRUE;
    for v in vars.into_iter().rev() {
        let iv = ithvar(ctx, flavor, v);
        cube = and(ctx, flavor, iv, cube);
    }
    cube
}

pub fn var(ctx: &WorkerContext, dd: Handle) -> Option<u32> {
    variable_of(&ctx.store, dd)
}

pub fn low(ctx: &WorkerContext, flavor: Flavor, dd: Handle) -> Handle {
    cofactor(&ctx.store, flavor, dd).0
}

pub fn high(ctx: &WorkerContext, flavor: Flavor, dd: Handle) -> Handle {
    cofactor(&ctx.store, flavor, dd).1
}

pub fn isleaf(ctx: &WorkerContext, dd: Handle) -> bool {
    is_leaf(&ctx.store, dd)
}

pub fn leaf_value(ctx: &WorkerContext, dd: Handle) -> Option<u64> {
    leaf_payload(&ctx.store, dd)
}
