//! Per-flavor `makenode`: the interning constructor that applies a reduction rule and then
//! canonicalizes through the unique table (§3.1, §4.2). Every DD-producing operation in this
//! crate ultimately bottoms out here.

use crate::error::TableFull;
use crate::kernel::flavor::Flavor;
use crate::runtime::WorkerContext;
use crate::store::node::{pack, NodeBody};
use crate::store::{Handle, InsertOutcome, LeafKind};

/// Intern a packed node body, retrying through a GC cycle if the table signals full (§7 "Table
/// full: the kernel retries after GC").
fn intern(ctx: &mut WorkerContext, body: NodeBody, custom_leaf: bool) -> u64 {
    let (w0, w1) = pack(body);
    loop {
        match ctx.store.lookup(&mut ctx.table_state, ctx.id, ctx.num_workers, w0, w1, custom_leaf) {
            Ok(InsertOutcome::Existing(index)) | Ok(InsertOutcome::Created(index)) => return index,
            Err(TableFull) => ctx.request_gc(),
        }
    }
}

/// Canonicalize `(variable, low, high)` under `flavor`'s reduction rule, returning the handle a
/// caller should treat as the node (or, after reduction, the child it collapses to).
///
/// `low`/`high` are freshly computed results that exist only as the caller's Rust locals until
/// this call links them into an interned node; `intern`'s table-full retry (`request_gc`) can
/// trigger a GC rendezvous on this very thread before that happens, so both are pushed onto the
/// task stack for the duration (§4.4 "Parallelism discipline", §4.5 "task stack").
pub fn makenode(ctx: &mut WorkerContext, flavor: Flavor, variable: u32, low: Handle, high: Handle) -> Handle {
    ctx.refs.push_task_operands(low.index(), high.index());
    let result = match flavor {
        Flavor::Bdd => make_bdd(ctx, variable, low, high),
        Flavor::Mtbdd => make_mtbdd(ctx, variable, low, high),
        Flavor::Zdd => make_zdd(ctx, variable, low, high),
        Flavor::Tbdd => make_tbdd(ctx, variable, low, high),
    };
    ctx.refs.pop_task_operands();
    result
}

/// Skip-node rule plus Shannon complement normalization: the low edge never carries the
/// complement bit, so if it would, both edges and the outgoing complement are flipped instead.
fn make_bdd(ctx: &mut WorkerContext, variable: u32, low: Handle, high: Handle) -> Handle {
    if low == high {
        return low;
    }
    let (low, high, out_complement) = if low.is_complemented() {
        (low.negated(), high.negated(), true)
    } else {
        (low, high, false)
    };
    let body = NodeBody::Internal { variable, low: low.index(), high: high.index(), high_complement: high.is_complemented() };
    let index = intern(ctx, body, false);
    Handle::new(index, out_complement, false, 0)
}

/// Skip-node rule only; complement edges are never used for MTBDD (§9 "normalize so `low` never
/// carries the complement bit" doesn't apply to non-boolean leaves).
fn make_mtbdd(ctx: &mut WorkerContext, variable: u32, low: Handle, high: Handle) -> Handle {
    debug_assert!(!low.is_complemented() && !high.is_complemented(), "MTBDD edges are never complemented");
    if low == high {
        return low;
    }
    let body = NodeBody::Internal { variable, low: low.index(), high: high.index(), high_complement: false };
    let index = intern(ctx, body, false);
    Handle::new(index, false, false, 0)
}

/// Zero-suppression rule: a node whose high edge is `false` contributes nothing and collapses to
/// its low child.
fn make_zdd(ctx: &mut WorkerContext, variable: u32, low: Handle, high: Handle) -> Handle {
    debug_assert!(!low.is_complemented() && !high.is_complemented(), "ZDD edges are never complemented");
    if high == Handle::FALSE {
        return low;
    }
    let body = NodeBody::Internal { variable, low: low.index(), high: high.index(), high_complement: false };
    let index = intern(ctx, body, false);
    Handle::new(index, false, false, 0)
}

/// Combined BDD skip-node + ZDD zero-suppression rule, plus tag propagation: whenever a node
/// collapses to its low child, the returned edge's tag is updated to the variable that was
/// skipped, so a later reader can recover which variables were elided along this edge.
fn make_tbdd(ctx: &mut WorkerContext, variable: u32, low: Handle, high: Handle) -> Handle {
    debug_assert!(!low.is_complemented() && !high.is_complemented(), "TBDD edges are never complemented");
    if low == high {
        return low.with_tag(variable);
    }
    if high == Handle::FALSE {
        return low.with_tag(variable);
    }
    let body = NodeBody::Internal { variable, low: low.index(), high: high.index(), high_complement: false };
    let index = intern(ctx, body, false);
    Handle::new(index, false, false, variable)
}

pub(crate) fn intern_leaf(ctx: &mut WorkerContext, kind: LeafKind, payload: u64) -> Handle {
    let body = NodeBody::Leaf { kind, payload };
    let index = intern(ctx, body, kind == LeafKind::Custom);
    Handle::new(index, false, true, 0)
}

pub fn leaf_integer(ctx: &mut WorkerContext, value: i64) -> Handle {
    intern_leaf(ctx, LeafKind::Integer, value as u64)
}

pub fn leaf_double(ctx: &mut WorkerContext, value: f64) -> Handle {
    intern_leaf(ctx, LeafKind::Double, value.to_bits())
}

/// Packs `numerator`/`denominator` into one 64-bit payload as two `i32` halves.
pub fn leaf_fraction(ctx: &mut WorkerContext, numerator: i32, denominator: i32) -> Handle {
    let payload = ((numerator as u32 as u64) << 32) | (denominator as u32 as u64);
    intern_leaf(ctx, LeafKind::Fraction, payload)
}

pub fn fraction_parts(payload: u64) -> (i32, i32) {
    ((payload >> 32) as i32, payload as i32)
}

/// An opaque user datum, hashed/compared by content like any other leaf but flagged in
/// `bitmapc` so GC invokes a destroy callback for it (§3.2 "Custom leaves").
pub fn leaf_custom(ctx: &mut WorkerContext, payload: u64) -> Handle {
    intern_leaf(ctx, LeafKind::Custom, payload)
}

pub fn ithvar(ctx: &mut WorkerContext, flavor: Flavor, variable: u32) -> Handle {
    makenode(ctx, flavor, variable, Handle::FALSE, Handle::TRUE)
}

pub fn nithvar(ctx: &mut WorkerContext, flavor: Flavor, variable: u32) -> Handle {
    makenode(ctx, flavor, variable, Handle::TRUE, Handle::FALSE)
}
