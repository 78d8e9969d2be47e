//! `ite`/`and`/`or`/`not`/`xor`/`implies`/`equiv`/`diff` for BDD and MTBDD (§4.4). Every operation
//! shares the skeleton described there: terminal-case reductions, a GC yield point, a cache
//! probe, recursive cofactor-and-combine, `makenode`, cache publish.

use crate::cache::{Key, Value};
use crate::kernel::access::{cofactor, variable_of};
use crate::kernel::flavor::Flavor;
use crate::kernel::makenode::makenode;
use crate::runtime::{TaskArgs, TaskResult, WorkerContext};
use crate::store::Handle;

const OPCODE_ITE: u8 = 0;

/// `TaskFn` entry point for the low-cofactor half of an `ite`, spawned onto the worker's own
/// deque so another worker can steal it while this one computes the high cofactor (§4.4 "recurse
/// on cofactors via spawn/sync").
fn ite_task(ctx: &mut WorkerContext, args: TaskArgs) -> TaskResult {
    let flavor = Flavor::from_code(args.d);
    let result = ite(ctx, flavor, Handle::from_raw(args.a), Handle::from_raw(args.b), Handle::from_raw(args.c));
    TaskResult::single(result.raw())
}

fn min_var(a: Option<u32>, b: Option<u32>, c: Option<u32>) -> u32 {
    [a, b, c].into_iter().flatten().min().expect("at least one argument is internal")
}

/// `ite(f, g, h)`: "if f then g else h", the universal BDD/MTBDD combinator every boolean
/// operation below is expressed in terms of.
pub fn ite(ctx: &mut WorkerContext, flavor: Flavor, f: Handle, g: Handle, h: Handle) -> Handle {
    // Terminal-case reductions (§4.4 "pure, no cache lookup").
    if f.is_true() {
        return g;
    }
    if f.is_false() {
        return h;
    }
    if g == h {
        return g;
    }
    if g.is_true() && h.is_false() {
        return f;
    }

    // GC yield point (§4.4, §9 "every operation yields at its entry").
    if ctx.pool.gc_pending.load(std::sync::atomic::Ordering::Acquire) {
        ctx.participate_in_gc();
    }

    let key = Key::new(OPCODE_ITE, f.raw(), g.raw(), h.raw(), flavor as u64);
    if let Some(value) = ctx.cache.get(&key) {
        return Handle::from_raw(value.primary);
    }

    let var_f = variable_of(&ctx.store, f);
    let var_g = variable_of(&ctx.store, g);
    let var_h = variable_of(&ctx.store, h);
    let pivot = min_var(var_f, var_g, var_h);

    let (f0, f1) = cofactor_on(ctx, flavor, f, var_f, pivot);
    let (g0, g1) = cofactor_on(ctx, flavor, g, var_g, pivot);
    let (h0, h1) = cofactor_on(ctx, flavor, h, var_h, pivot);

    // Fork the low cofactor onto this worker's deque — a thief may run it concurrently — and
    // compute the high cofactor inline. The low task's own operands are kept on the value stack
    // for as long as the task is outstanding, so a GC that rendezvouses while it is still
    // in-flight elsewhere can still find them from this frame (§4.4 "Parallelism discipline").
    ctx.refs.push_value(f0.index());
    ctx.refs.push_value(g0.index());
    ctx.refs.push_value(h0.index());
    let low_job = ctx.spawn(ite_task, TaskArgs { a: f0.raw(), b: g0.raw(), c: h0.raw(), d: flavor as u64 });
    let high = ite(ctx, flavor, f1, g1, h1);
    let low = Handle::from_raw(ctx.sync(&low_job).a);
    ctx.refs.pop_value();
    ctx.refs.pop_value();
    ctx.refs.pop_value();

    let result = makenode(ctx, flavor, pivot, low, high);

    ctx.cache.put(&key, Value::single(result.raw()));
    result
}

/// If `node`'s own variable equals `pivot`, return its real cofactors; otherwise `node` does not
/// depend on `pivot` and both cofactors are `node` itself (§4.4 "pivot on the lowest variable
/// present in any argument").
fn cofactor_on(ctx: &mut WorkerContext, flavor: Flavor, node: Handle, node_var: Option<u32>, pivot: u32) -> (Handle, Handle) {
    match node_var {
        Some(v) if v == pivot => cofactor(&ctx.store, flavor, node),
        _ => (node, node),
    }
}

pub fn and(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    ite(ctx, flavor, a, b, Handle::FALSE)
}

pub fn or(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    ite(ctx, flavor, a, Handle::TRUE, b)
}

pub fn not(ctx: &mut WorkerContext, flavor: Flavor, a: Handle) -> Handle {
    ite(ctx, flavor, a, Handle::FALSE, Handle::TRUE)
}

pub fn xor(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    let not_b = not(ctx, flavor, b);
    ite(ctx, flavor, a, not_b, b)
}

pub fn implies(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    ite(ctx, flavor, a, b, Handle::TRUE)
}

pub fn equiv(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    let not_b = not(ctx, flavor, b);
    ite(ctx, flavor, a, b, not_b)
}

pub fn diff(ctx: &mut WorkerContext, flavor: Flavor, a: Handle, b: Handle) -> Handle {
    let not_b = not(ctx, flavor, b);
    ite(ctx, flavor, a, not_b, Handle::FALSE)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::kernel::makenode::ithvar;
    use crate::runtime::PoolHandles;
    use crate::store::NodeTable;
    use crate::cache::OperationCache;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;
    use crossbeam_deque::{Injector, Worker as Deque};
    use crate::runtime::barrier::GcBarrier;

    fn test_ctx() -> WorkerContext {
        let store = Arc::new(NodeTable::new(1 << 12));
        let cache = Arc::new(OperationCache::new(1 << 10));
        let pool = PoolHandles {
            injector: Arc::new(Injector::new()),
            stealers: Arc::new(Vec::new()),
            barrier: Arc::new(GcBarrier::new(1)),
            gc_pending: Arc::new(AtomicBool::new(false)),
            gc: Arc::new(|_roots: &[u64]| {}),
            stats: Arc::new(crate::runtime::RuntimeStats::default()),
        };
        WorkerContext::new(0, 1, Deque::new_fifo(), pool, store, cache)
    }

    #[test]
    fn and_of_variable_with_itself_is_itself() {
        let mut ctx = test_ctx();
        let x0 = ithvar(&mut ctx, Flavor::Bdd, 0);
        let result = and(&mut ctx, Flavor::Bdd, x0, x0);
        assert_eq!(result, x0);
    }

    #[test]
    fn not_not_is_identity() {
        let mut ctx = test_ctx();
        let x0 = ithvar(&mut ctx, Flavor::Bdd, 0);
        let doubled = not(&mut ctx, Flavor::Bdd, not(&mut ctx, Flavor::Bdd, x0));
        assert_eq!(doubled, x0);
    }

    #[test]
    fn and_is_commutative() {
        let mut ctx = test_ctx();
        let x0 = ithvar(&mut ctx, Flavor::Bdd, 0);
        let x1 = ithvar(&mut ctx, Flavor::Bdd, 1);
        assert_eq!(and(&mut ctx, Flavor::Bdd, x0, x1), and(&mut ctx, Flavor::Bdd, x1, x0));
    }

    #[test]
    fn conjunction_of_three_variables_has_three_nodes() {
        let mut ctx = test_ctx();
        let x0 = ithvar(&mut ctx, Flavor::Bdd, 0);
        let x1 = ithvar(&mut ctx, Flavor::Bdd, 1);
        let x2 = ithvar(&mut ctx, Flavor::Bdd, 2);
        let a = and(&mut ctx, Flavor::Bdd, x0, x1);
        let dd = and(&mut ctx, Flavor::Bdd, a, x2);
        assert_eq!(crate::kernel::access::nodecount(&ctx.store, &[dd]), 3);
    }
}
