//! `and`/`or`/`not` for ZDD/TBDD (§4.4 "Identical skeleton, each flavor's own `makenode` applies
//! its reduction rule"). Zero-suppression makes "this variable is absent" semantically load
//! bearing, so unlike `apply::ite` these recurse on structural presence/absence of a variable
//! rather than always cofactoring both arguments symmetrically, and complement (`not`) requires
//! an explicit domain.

use crate::cache::{Key, Value};
use crate::kernel::access::cofactor;
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::makenode;
use crate::runtime::{TaskArgs, TaskResult, WorkerContext};
use crate::store::Handle;

const OPCODE_UNION: u8 = 16;
const OPCODE_INTERSECT: u8 = 17;
const OPCODE_DIFF: u8 = 18;
const OPCODE_COMPLEMENT: u8 = 19;

fn union_task(ctx: &mut WorkerContext, args: TaskArgs) -> TaskResult {
    let flavor = Flavor::from_code(args.c);
    TaskResult::single(union(ctx, flavor, Handle::from_raw(args.a), Handle::from_raw(args.b)).raw())
}

fn intersect_task(ctx: &mut WorkerContext, args: TaskArgs) -> TaskResult {
    let flavor = Flavor::from_code(args.c);
    TaskResult::single(intersect(ctx, flavor, Handle::from_raw(args.a), Handle::from_raw(args.b)).raw())
}

fn diff_task(ctx: &mut WorkerContext, args: TaskArgs) -> TaskResult {
    let flavor = Flavor::from_code(args.c);
    TaskResult::single(diff(ctx, flavor, Handle::from_raw(args.a), Handle::from_raw(args.b)).raw())
}

fn var_of(ctx: &WorkerContext, _flavor: Flavor, h: Handle) -> Option<u32> {
    crate::kernel::access::variable_of(&ctx.store, h)
}

/// `union(P, Q)`: the family of sets represented by either argument.
pub fn union(ctx: &mut WorkerContext, flavor: Flavor, p: Handle, q: Handle) -> Handle {
    if p == Handle::FALSE {
        return q;
    }
    if q == Handle::FALSE || p == q {
        return p;
    }
    let key = Key::new(OPCODE_UNION, p.raw(), q.raw(), flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let vp = var_of(ctx, flavor, p);
    let vq = var_of(ctx, flavor, q);
    let pivot_is_p = match (vp, vq) {
        (Some(_), None) => true,
        (None, Some(_)) => false,
        (Some(a), Some(b)) => a <= b,
        (None, None) => unreachable!("p == q and both-FALSE cases are handled above"),
    };
    let result = if pivot_is_p && vp == vq {
        let a = vp.unwrap();
        let (p0, p1) = cofactor(&ctx.store, flavor, p);
        let (q0, q1) = cofactor(&ctx.store, flavor, q);
        ctx.refs.push_value(p0.index());
        ctx.refs.push_value(q0.index());
        let low_job = ctx.spawn(union_task, TaskArgs { a: p0.raw(), b: q0.raw(), c: flavor as u64, d: 0 });
        let high = union(ctx, flavor, p1, q1);
        let low = Handle::from_raw(ctx.sync(&low_job).a);
        ctx.refs.pop_value();
        ctx.refs.pop_value();
        makenode(ctx, flavor, a, low, high)
    } else if pivot_is_p {
        let a = vp.unwrap();
        let (p0, p1) = cofactor(&ctx.store, flavor, p);
        let low = union(ctx, flavor, p0, q);
        makenode(ctx, flavor, a, low, p1)
    } else {
        let b = vq.unwrap();
        let (q0, q1) = cofactor(&ctx.store, flavor, q);
        let low = union(ctx, flavor, p, q0);
        makenode(ctx, flavor, b, low, q1)
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

/// `intersect(P, Q)`: the family of sets represented by both arguments.
pub fn intersect(ctx: &mut WorkerContext, flavor: Flavor, p: Handle, q: Handle) -> Handle {
    if p == Handle::FALSE || q == Handle::FALSE {
        return Handle::FALSE;
    }
    if p == q {
        return p;
    }
    let key = Key::new(OPCODE_INTERSECT, p.raw(), q.raw(), flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let vp = var_of(ctx, flavor, p);
    let vq = var_of(ctx, flavor, q);
    let result = match (vp, vq) {
        (Some(a), Some(b)) if a == b => {
            let (p0, p1) = cofactor(&ctx.store, flavor, p);
            let (q0, q1) = cofactor(&ctx.store, flavor, q);
            ctx.refs.push_value(p0.index());
            ctx.refs.push_value(q0.index());
            let low_job = ctx.spawn(intersect_task, TaskArgs { a: p0.raw(), b: q0.raw(), c: flavor as u64, d: 0 });
            let high = intersect(ctx, flavor, p1, q1);
            let low = Handle::from_raw(ctx.sync(&low_job).a);
            ctx.refs.pop_value();
            ctx.refs.pop_value();
            makenode(ctx, flavor, a, low, high)
        }
        (Some(a), _) if vq.map_or(true, |b| a < b) => {
            // q never contains variable a: a's high branch of p can never match, so only p's low
            // branch contributes (and it collapses through the zero-suppression rule directly).
            let (p0, _p1) = cofactor(&ctx.store, flavor, p);
            intersect(ctx, flavor, p0, q)
        }
        _ => {
            let (q0, _q1) = cofactor(&ctx.store, flavor, q);
            intersect(ctx, flavor, p, q0)
        }
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

/// `diff(P, Q)`: sets in `P` that are not in `Q`.
pub fn diff(ctx: &mut WorkerContext, flavor: Flavor, p: Handle, q: Handle) -> Handle {
    if p == Handle::FALSE {
        return Handle::FALSE;
    }
    if q == Handle::FALSE {
        return p;
    }
    if p == q {
        return Handle::FALSE;
    }
    let key = Key::new(OPCODE_DIFF, p.raw(), q.raw(), flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let vp = var_of(ctx, flavor, p);
    let vq = var_of(ctx, flavor, q);
    let result = match (vp, vq) {
        (Some(a), Some(b)) if a == b => {
            let (p0, p1) = cofactor(&ctx.store, flavor, p);
            let (q0, q1) = cofactor(&ctx.store, flavor, q);
            ctx.refs.push_value(p0.index());
            ctx.refs.push_value(q0.index());
            let low_job = ctx.spawn(diff_task, TaskArgs { a: p0.raw(), b: q0.raw(), c: flavor as u64, d: 0 });
            let high = diff(ctx, flavor, p1, q1);
            let low = Handle::from_raw(ctx.sync(&low_job).a);
            ctx.refs.pop_value();
            ctx.refs.pop_value();
            makenode(ctx, flavor, a, low, high)
        }
        (Some(a), _) if vq.map_or(true, |b| a < b) => {
            let (p0, p1) = cofactor(&ctx.store, flavor, p);
            let low = diff(ctx, flavor, p0, q);
            makenode(ctx, flavor, a, low, p1)
        }
        _ => {
            let (q0, _q1) = cofactor(&ctx.store, flavor, q);
            diff(ctx, flavor, p, q0)
        }
    };
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

/// `not(dd, domain)`: complement relative to the powerset of `domain` (ZDD/TBDD `not` is only
/// meaningful relative to a fixed set of relevant variables — absence of a variable is already
/// meaningful, so there is no flavor-independent universal complement).
pub fn complement(ctx: &mut WorkerContext, flavor: Flavor, dd: Handle, domain: &[u32]) -> Handle {
    complement_at(ctx, flavor, dd, domain, 0)
}

fn complement_at(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, domain: &[u32], idx: usize) -> Handle {
    if idx == domain.len() {
        return if node == Handle::TRUE { Handle::FALSE } else { Handle::TRUE };
    }
    let key = Key::new(OPCODE_COMPLEMENT, node.raw(), idx as u64, flavor as u64, 0);
    if let Some(v) = ctx.cache.get(&key) {
        return Handle::from_raw(v.primary);
    }
    let v = domain[idx];
    let (low, high) = match var_of(ctx, flavor, node) {
        Some(nv) if nv == v => cofactor(&ctx.store, flavor, node),
        _ => (node, Handle::FALSE),
    };
    let low_c = complement_at(ctx, flavor, low, domain, idx + 1);
    ctx.refs.push_value(low_c.index());
    let high_c = complement_at(ctx, flavor, high, domain, idx + 1);
    ctx.refs.pop_value();
    let result = makenode(ctx, flavor, v, low_c, high_c);
    ctx.cache.put(&key, Value::single(result.raw()));
    result
}
