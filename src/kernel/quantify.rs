//! Existential/universal quantification and domain projection (§4.4 "Walks `dd` and `vars` in
//! lockstep over variable order").

use crate::cache::{Key, Value};
use crate::kernel::access::{cofactor, is_leaf, variable_of};
use crate::kernel::apply::{and, or};
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::makenode;
use crate::runtime::WorkerContext;
use crate::store::Handle;

const OPCODE_EXISTS: u8 = 8;
const OPCODE_FORALL: u8 = 9;
const OPCODE_PROJECT: u8 = 10;

type Combine = fn(&mut WorkerContext, Flavor, Handle, Handle) -> Handle;

fn quantify_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, vars: &[u32], idx: usize, opcode: u8, combine: Combine) -> Handle {
    if idx == vars.len() || is_leaf(&ctx.store, node) {
        return node;
    }
    let key = Key::new(opcode, node.raw(), idx as u64, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let target = vars[idx];
    let nv = variable_of(&ctx.store, node).expect("internal node always has a variable");
    let result = if nv > target {
        // `node` does not depend on `target`; nothing to quantify, skip to the next variable.
        quantify_at(ctx, flavor, node, vars, idx + 1, opcode, combine)
    } else if nv < target {
        // `node`'s own variable precedes the one we're hunting for; rebuild it unchanged.
        let (low, high) = cofactor(&ctx.store, flavor, node);
        let low_r = quantify_at(ctx, flavor, low, vars, idx, opcode, combine);
        ctx.refs.push_value(low_r.index());
        let high_r = quantify_at(ctx, flavor, high, vars, idx, opcode, combine);
        ctx.refs.pop_value();
        makenode(ctx, flavor, nv, low_r, high_r)
    } else {
        let (low, high) = cofactor(&ctx.store, flavor, node);
        let low_r = quantify_at(ctx, flavor, low, vars, idx + 1, opcode, combine);
        ctx.refs.push_value(low_r.index());
        let high_r = quantify_at(ctx, flavor, high, vars, idx + 1, opcode, combine);
        ctx.refs.pop_value();
        combine(ctx, flavor, low_r, high_r)
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

/// `exists(dd, vars)`: quantify `vars` out of `dd` by OR-ing their cofactors.
pub fn exists(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, vars: &[u32]) -> Handle {
    quantify_at(ctx, flavor, dd, vars, 0, OPCODE_EXISTS, or)
}

/// `forall(dd, vars)`: quantify `vars` out of `dd` by AND-ing their cofactors.
pub fn forall(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, vars: &[u32]) -> Handle {
    quantify_at(ctx, flavor, dd, vars, 0, OPCODE_FORALL, and)
}

/// `project(dd, dom)`: keep exactly the variables named in `dom`, existentially quantifying
/// everything else. `dom` must be sorted ascending.
pub fn project(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, dom: &[u32]) -> Handle {
    project_at(ctx, flavor, dd, dom)
}

fn project_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, dom: &[u32]) -> Handle {
    if is_leaf(&ctx.store, node) {
        return node;
    }
    let domain_tag = dom.iter().fold(0xcbf29ce484222325u64, |h, &v| (h ^ v as u64).wrapping_mul(0x100000001b3));
    let key = Key::new(OPCODE_PROJECT, node.raw(), domain_tag, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let nv = variable_of(&ctx.store, node).expect("internal node always has a variable");
    let (low, high) = cofactor(&ctx.store, flavor, node);
    let low_r = project_at(ctx, flavor, low, dom);
    ctx.refs.push_value(low_r.index());
    let high_r = project_at(ctx, flavor, high, dom);
    ctx.refs.pop_value();
    let result = if dom.binary_search(&nv).is_ok() {
        makenode(ctx, flavor, nv, low_r, high_r)
    } else {
        or(ctx, flavor, low_r, high_r)
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}
