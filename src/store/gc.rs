//! GC coordination glue (§4.2 "GC phases"). `NodeTable` implements each phase in isolation;
//! this module sequences them and applies the growth policy. The actual stop-the-world
//! rendezvous (deciding *when* every worker has reached a phase boundary) lives in
//! `runtime::barrier` — this module is the single-writer body that runs once all workers have
//! arrived.

use tracing::{error, info, warn};

use crate::store::node::NodeBody;
use crate::store::table::NodeTable;

/// Runs one full GC cycle: clear, mark every root, rehash, destroy unreached custom leaves, and
/// grow the table if post-GC occupancy exceeds `table_ratio`. `roots` is every handle index that
/// must survive (external protections, per-worker value/pointer/task stacks, §3.4).
///
/// `on_destroy_custom`, if any, is invoked with the payload of every custom leaf that does not
/// survive marking, before its slot is reclaimed (§3.2 "Custom leaves") — the node store itself
/// has no notion of leaf value types, so dispatching by payload is left to the caller (`Engine`'s
/// custom-leaf registry).
///
/// On a rehash failure the table is grown once and the whole cycle is retried from `gc_clear`;
/// if it still does not fit, this aborts the process after logging occupancy (§7 "Table full").
pub fn run_cycle(table: &NodeTable, roots: &[u64], table_ratio: f64, mut on_destroy_custom: impl FnMut(u64)) {
    info!(capacity = table.capacity(), occupancy = table.len(), "gc: starting cycle");

    for attempt in 0..2 {
        table.gc_clear();
        for &root in roots {
            table.mark_reachable(root);
        }

        if table.gc_rehash().is_ok() {
            table.gc_destroy_unreached_custom(|slot| {
                if let NodeBody::Leaf { payload, .. } = table.body(slot) {
                    on_destroy_custom(payload);
                }
            });

            if table.should_grow(table_ratio) {
                table.grow();
            }

            info!(roots = roots.len(), occupancy_after = table.len(), "gc: cycle complete");
            return;
        }

        warn!(attempt, "gc: rehash failed, growing table and retrying");
        if !table.grow() {
            break;
        }
    }

    error!(
        occupied = table.len(),
        capacity = table.capacity(),
        "gc: table full after GC at maximum capacity, aborting"
    );
    std::process::abort();
}
