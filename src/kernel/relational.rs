//! Relational product and variable substitution (§6.1 `relnext`/`relprev`/`compose`), built
//! entirely out of `apply`/`quantify` primitives plus a variable-renaming rebuild — no new
//! reduction rules or cache opcodes of their own beyond the rename step.

use crate::cache::{Key, Value};
use crate::kernel::access::{cofactor, is_leaf, variable_of};
use crate::kernel::apply::{and, ite};
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::makenode;
use crate::kernel::quantify::exists;
use crate::runtime::WorkerContext;
use crate::store::Handle;

const OPCODE_RENAME_DOWN: u8 = 32;
const OPCODE_RENAME_UP: u8 = 33;
const OPCODE_COMPOSE: u8 = 34;

/// Rewrite every variable label through `f`, preserving relative order (callers are responsible
/// for choosing a renaming that keeps the DD's variable order invariant intact, e.g. swapping an
/// interleaved primed/unprimed pair).
fn rename_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, opcode: u8, f: fn(u32) -> u32) -> Handle {
    if is_leaf(&ctx.store, node) {
        return node;
    }
    let key = Key::new(opcode, node.raw(), 0, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let nv = variable_of(&ctx.store, node).expect("internal node");
    let (low, high) = cofactor(&ctx.store, flavor, node);
    let low_r = rename_at(ctx, flavor, low, opcode, f);
    ctx.refs.push_value(low_r.index());
    let high_r = rename_at(ctx, flavor, high, opcode, f);
    ctx.refs.pop_value();
    let result = makenode(ctx, flavor, f(nv), low_r, high_r);
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

fn primed_to_unprimed(v: u32) -> u32 {
    if v % 2 == 1 { v - 1 } else { v }
}

fn unprimed_to_primed(v: u32) -> u32 {
    if v % 2 == 0 { v + 1 } else { v }
}

/// `relnext(set, rel, vars, dom)`: the image of `set` under transition relation `rel`. `vars` is
/// the (unprimed) current-state variables to quantify away once `set` and `rel` have been
/// conjoined; the result is then renamed from next-state (odd/primed) back to current-state
/// (even/unprimed) labels so it lives in the same variable space as `set` (§6.1, original_source
/// sylvan_ldd/bdd relprod conventions: variables interleave as `x=2k`, `x'=2k+1`).
pub fn relnext(ctx: &mut WorkerContext, flavor: Flavor, set: Handle, rel: Handle, vars: &[u32]) -> Handle {
    let conj = and(ctx, flavor, set, rel);
    let projected = exists(ctx, flavor, conj, vars);
    rename_at(ctx, flavor, projected, OPCODE_RENAME_DOWN, primed_to_unprimed)
}

/// `relprev(rel, set, vars)`: the pre-image of `set` under `rel` — states with some successor in
/// `set`. `vars` is the primed (next-state) variables to quantify away.
pub fn relprev(ctx: &mut WorkerContext, flavor: Flavor, rel: Handle, set: Handle, vars: &[u32]) -> Handle {
    let set_primed = rename_at(ctx, flavor, set, OPCODE_RENAME_UP, unprimed_to_primed);
    let conj = and(ctx, flavor, rel, set_primed);
    exists(ctx, flavor, conj, vars)
}

/// `compose(dd, map)`: substitute, for every `(variable, replacement)` pair in `map`, that
/// variable's two cofactors selected by `replacement` instead of by the variable itself (standard
/// BDD composition via `ite`, §6.1).
pub fn compose(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, map: &[(u32, Handle)]) -> Handle {
    compose_at(ctx, flavor, dd, map)
}

fn compose_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, map: &[(u32, Handle)]) -> Handle {
    if is_leaf(&ctx.store, node) {
        return node;
    }
    let tag = map.iter().fold(0xcbf29ce484222325u64, |h, &(v, r)| (h ^ v as u64 ^ r.raw()).wrapping_mul(0x100000001b3));
    let key = Key::new(OPCODE_COMPOSE, node.raw(), tag, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let nv = variable_of(&ctx.store, node).expect("internal node");
    let (low, high) = cofactor(&ctx.store, flavor, node);
    let low_c = compose_at(ctx, flavor, low, map);
    ctx.refs.push_value(low_c.index());
    let high_c = compose_at(ctx, flavor, high, map);
    ctx.refs.pop_value();
    let result = match map.iter().find(|&&(v, _)| v == nv) {
        Some(&(_, replacement)) => ite(ctx, flavor, replacement, high_c, low_c),
        None => makenode(ctx, flavor, nv, low_c, high_c),
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}
