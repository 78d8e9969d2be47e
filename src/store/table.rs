//! L2: the lock-free unique node table (§3.2, §4.2).
//!
//! Open-addressed variant only — per SPEC_FULL.md's resolution of the Open Question in spec.md
//! §9, the trie-chained backend is not ported. `lookup` either returns an existing canonical
//! slot or atomically creates one; GC clears, marks, and rehashes in three cooperative phases.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::TableFull;
use crate::hash::hash_node;
use crate::store::bitset::AtomicBitset;
use crate::store::node::{self, NodeBody};
use crate::store::region::{OccupancyCounter, RegionAllocator, RegionCursor};

/// Marks an empty hash-table bucket. `u64::MAX` can never be produced by `pack_entry` because
/// the slot-index component is bounded by `INDEX_MASK < 2^40 - 1`.
const EMPTY_BUCKET: u64 = u64::MAX;
const HASH_PREFIX_BITS: u32 = 24;
const SLOT_BITS: u32 = 40;
const SLOT_MASK: u64 = (1 << SLOT_BITS) - 1;

#[inline]
fn pack_entry(hash: u64, slot: u64) -> u64 {
    let prefix = hash >> (64 - HASH_PREFIX_BITS);
    (prefix << SLOT_BITS) | (slot & SLOT_MASK)
}

#[inline]
fn entry_matches_prefix(entry: u64, hash: u64) -> bool {
    let prefix = hash >> (64 - HASH_PREFIX_BITS);
    (entry >> SLOT_BITS) == prefix
}

#[inline]
fn entry_slot(entry: u64) -> u64 {
    entry & SLOT_MASK
}

/// Per-worker state needed to call `NodeTable::lookup` — a claimed region cursor. Lives in the
/// runtime's `WorkerContext` (§4.5 "All four are per-worker"); passed explicitly rather than
/// hidden behind a thread-local, per the DESIGN NOTE in spec.md §9.
pub struct TableWorkerState {
    pub cursor: RegionCursor,
}

impl TableWorkerState {
    pub fn new() -> TableWorkerState {
        TableWorkerState { cursor: RegionCursor::empty() }
    }
}

pub struct NodeTable {
    data: Vec<(AtomicU64, AtomicU64)>,
    hash_entries: Vec<AtomicU64>,
    occupied: AtomicBitset, // bitmap2: slot occupied (and, during GC, reachability mark)
    custom: AtomicBitset,   // bitmapc: slot holds a custom leaf
    regions: RegionAllocator,
    capacity: u64,
    current_size: AtomicU64,
    occupancy: OccupancyCounter,
    seed: u64,
}

pub enum InsertOutcome {
    Existing(u64),
    Created(u64),
}

impl NodeTable {
    pub fn new(capacity: u64) -> NodeTable {
        assert!(capacity.is_power_of_two());
        let mut data = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            data.push((AtomicU64::new(0), AtomicU64::new(0)));
        }
        let hash_entries = (0..capacity).map(|_| AtomicU64::new(EMPTY_BUCKET)).collect();
        let occupied = AtomicBitset::new(capacity);
        let custom = AtomicBitset::new(capacity);
        occupied.set(0, Ordering::Relaxed);
        occupied.set(1, Ordering::Relaxed);

        NodeTable {
            data,
            hash_entries,
            occupied,
            custom,
            regions: RegionAllocator::new(capacity),
            capacity,
            current_size: AtomicU64::new(capacity),
            occupancy: OccupancyCounter::new(),
            seed: 0x9e3779b97f4a7c15,
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn len(&self) -> u64 {
        self.occupancy.get()
    }

    /// `192 - 2*log2(size)` per §4.2 "Resize".
    fn probe_threshold(&self) -> u32 {
        let size = self.current_size.load(Ordering::Relaxed);
        let log2 = 63 - size.leading_zeros();
        192u32.saturating_sub(2 * log2)
    }

    fn size_mask(&self) -> u64 {
        self.current_size.load(Ordering::Relaxed) - 1
    }

    /// Claim a genuinely free data slot for `worker`, reclaiming a fresh region as many times as
    /// needed if the current one turns out to be exhausted (§4.2 "Region claiming"). Returns
    /// `TableFull` only once no region anywhere has a free slot left.
    fn claim_free_slot(&self, worker: &mut TableWorkerState, worker_id: usize, num_workers: usize) -> Result<u64, TableFull> {
        loop {
            if !worker.cursor.has_room() {
                worker.cursor = self.regions.claim_region(worker_id, num_workers).ok_or(TableFull)?;
            }
            if let Some(slot) = worker.cursor.allocate(&self.occupied) {
                return Ok(slot);
            }
            // Region scanned to its end without a free slot (fully held by survivors); has_room()
            // is now false, so the next iteration claims a fresh one.
        }
    }

    /// `lookup(a, b) -> (index, created?)` of §4.2. Returns `Err(TableFull)` if the probe budget
    /// is exhausted; the caller must trigger GC and retry, or enlarge the table.
    pub fn lookup(
        &self,
        worker: &mut TableWorkerState,
        worker_id: usize,
        num_workers: usize,
        a: u64,
        b: u64,
        custom_leaf: bool,
    ) -> Result<InsertOutcome, TableFull> {
        let hash = hash_node(a, b, self.seed);
        let mask = self.size_mask();
        let threshold = self.probe_threshold();
        let start = hash & mask;

        for attempt in 0..threshold {
            let bucket = (start + attempt as u64) & mask;
            let entry = self.hash_entries[bucket as usize].load(Ordering::Acquire);

            if entry != EMPTY_BUCKET {
                if entry_matches_prefix(entry, hash) {
                    let slot = entry_slot(entry);
                    let (w0, w1) = self.load_slot(slot);
                    if w0 == a && w1 == b {
                        return Ok(InsertOutcome::Existing(slot));
                    }
                }
                continue;
            }

            // Bucket looked empty. Claim a data slot and try to publish it here.
            let slot = self.claim_free_slot(worker, worker_id, num_workers)?;
            self.store_slot(slot, a, b);

            let new_entry = pack_entry(hash, slot);
            match self.hash_entries[bucket as usize].compare_exchange(
                EMPTY_BUCKET,
                new_entry,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // `claim_free_slot` already CAS-set `occupied` for `slot` to claim it.
                    if custom_leaf {
                        self.custom.set(slot, Ordering::Release);
                    }
                    self.occupancy.increment();
                    return Ok(InsertOutcome::Created(slot));
                }
                Err(_) => {
                    // Someone else published a bucket first (possibly the same (a,b), possibly
                    // not). The data slot we claimed is simply abandoned; it is reclaimed on the
                    // next GC because it is never marked reachable. Continue the scan forward.
                    continue;
                }
            }
        }

        Err(TableFull)
    }

    #[inline]
    fn load_slot(&self, slot: u64) -> (u64, u64) {
        let (w0, w1) = &self.data[slot as usize];
        (w0.load(Ordering::Acquire), w1.load(Ordering::Acquire))
    }

    #[inline]
    fn store_slot(&self, slot: u64, a: u64, b: u64) {
        let (w0, w1) = &self.data[slot as usize];
        w0.store(a, Ordering::Relaxed);
        w1.store(b, Ordering::Relaxed);
    }

    pub fn body(&self, index: u64) -> NodeBody {
        let (w0, w1) = self.load_slot(index);
        node::unpack(w0, w1)
    }

    pub fn is_custom(&self, index: u64) -> bool {
        self.custom.get(index)
    }

    /// Set the reachability mark for `index`. Returns `true` the first time it is set, so callers
    /// can avoid re-descending into an already-marked subgraph (§4.2 "re-marking is idempotent").
    pub fn mark(&self, index: u64) -> bool {
        self.occupied.set_if_clear(index)
    }

    pub fn is_marked(&self, index: u64) -> bool {
        self.occupied.get(index)
    }

    // ---- GC phases (§4.2) ----

    /// Phase 1: clear hashes. Zeroes the hash-entry array and the occupied/custom bitmaps, then
    /// re-reserves slots 0 and 1.
    pub fn gc_clear(&self) {
        for entry in &self.hash_entries {
            entry.store(EMPTY_BUCKET, Ordering::Relaxed);
        }
        self.occupied.clear_all();
        self.custom.clear_all();
        self.occupied.set(0, Ordering::Relaxed);
        self.occupied.set(1, Ordering::Relaxed);
        self.regions.reset();
        self.occupancy.set(2);
    }

    /// Phase 2 helper: recursively mark `index` and everything reachable from it. Uses an
    /// explicit stack (kernel-style, §4.4) rather than native recursion so deep BDDs cannot blow
    /// the worker's call stack.
    ///
    /// `gc_clear` reset `occupancy` to 2; every slot actually marked here is a survivor that
    /// `gc_clear` did not count, so each first-time mark re-increments it. Without this, `len()`
    /// undercounts by the number of surviving nodes and `should_grow` under-triggers.
    pub fn mark_reachable(&self, index: u64) {
        if index <= 1 {
            return;
        }
        let mut stack = vec![index];
        while let Some(idx) = stack.pop() {
            if idx <= 1 {
                continue;
            }
            if !self.mark(idx) {
                continue; // already visited
            }
            self.occupancy.increment();
            match self.body(idx) {
                NodeBody::Internal { low, high, .. } => {
                    stack.push(low);
                    stack.push(high);
                }
                NodeBody::Leaf { .. } => {}
            }
        }
    }

    /// Phase 3: rehash every slot whose occupied bit survived marking. Returns `Err` if any slot
    /// could not be reinserted within its probe budget.
    pub fn gc_rehash(&self) -> Result<(), crate::error::RehashFailure> {
        let mask = self.size_mask();
        let threshold = self.probe_threshold();
        // Slots 0/1 are terminals and are never placed in the hash array.
        for slot in 2..self.capacity {
            if !self.occupied.get(slot) {
                continue;
            }
            let (w0, w1) = self.load_slot(slot);
            let hash = hash_node(w0, w1, self.seed);
            let start = hash & mask;
            let mut placed = false;
            for attempt in 0..threshold {
                let bucket = (start + attempt as u64) & mask;
                if self.hash_entries[bucket as usize]
                    .compare_exchange(
                        EMPTY_BUCKET,
                        pack_entry(hash, slot),
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    )
                    .is_ok()
                {
                    placed = true;
                    break;
                }
            }
            if !placed {
                return Err(crate::error::RehashFailure);
            }
        }
        Ok(())
    }

    /// Phase 4: invoke `destroy` for every custom-leaf slot that did not survive marking, then
    /// clear its `bitmapc` bit. Must run after phase 2 (mark) and can overlap phase 3 (rehash)
    /// since it only inspects slots whose occupied bit is clear.
    pub fn gc_destroy_unreached_custom<F: FnMut(u64)>(&self, mut destroy: F) {
        for slot in 2..self.capacity {
            if self.custom.get(slot) && !self.occupied.get(slot) {
                destroy(slot);
                self.custom.clear(slot, Ordering::Relaxed);
            }
        }
    }

    /// Whether post-GC occupancy exceeds the growth threshold and `current_size` should double
    /// (§4.2 "Resize"). `current_size` may only grow, never shrink.
    pub fn should_grow(&self, ratio: f64) -> bool {
        let size = self.current_size.load(Ordering::Relaxed);
        (self.occupancy.get() as f64) > (size as f64) * ratio && size < self.capacity
    }

    pub fn grow(&self) -> bool {
        let size = self.current_size.load(Ordering::Relaxed);
        if size >= self.capacity {
            return false;
        }
        let new_size = (size * 2).min(self.capacity);
        self.current_size.store(new_size, Ordering::Relaxed);
        true
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_worker() -> TableWorkerState {
        TableWorkerState::new()
    }

    #[test]
    fn lookup_is_canonical_for_repeated_content() {
        let table = NodeTable::new(1 << 12);
        let mut w = new_worker();
        let (idx1, created1) = match table.lookup(&mut w, 0, 1, 5, 9, false).unwrap() {
            InsertOutcome::Created(i) => (i, true),
            InsertOutcome::Existing(i) => (i, false),
        };
        assert!(created1);
        let (idx2, created2) = match table.lookup(&mut w, 0, 1, 5, 9, false).unwrap() {
            InsertOutcome::Created(i) => (i, true),
            InsertOutcome::Existing(i) => (i, false),
        };
        assert!(!created2);
        assert_eq!(idx1, idx2);
    }

    #[test]
    fn distinct_content_gets_distinct_slots() {
        let table = NodeTable::new(1 << 12);
        let mut w = new_worker();
        let a = match table.lookup(&mut w, 0, 1, 1, 2, false).unwrap() {
            InsertOutcome::Created(i) => i,
            InsertOutcome::Existing(i) => i,
        };
        let b = match table.lookup(&mut w, 0, 1, 3, 4, false).unwrap() {
            InsertOutcome::Created(i) => i,
            InsertOutcome::Existing(i) => i,
        };
        assert_ne!(a, b);
    }

    #[test]
    fn gc_clear_mark_rehash_preserves_reachable_slot() {
        let table = NodeTable::new(1 << 12);
        let mut w = new_worker();
        let slot = match table.lookup(&mut w, 0, 1, 11, 13, false).unwrap() {
            InsertOutcome::Created(i) => i,
            InsertOutcome::Existing(i) => i,
        };
        let (w0, w1) = table.load_slot(slot);

        table.gc_clear();
        table.mark_reachable(slot);
        table.gc_rehash().unwrap();

        let mut w2 = new_worker();
        let after = match table.lookup(&mut w2, 0, 1, w0, w1, false).unwrap() {
            InsertOutcome::Existing(i) => i,
            InsertOutcome::Created(_) => panic!("expected the slot to survive GC"),
        };
        assert_eq!(after, slot);
    }

    #[test]
    fn gc_clear_drops_unreachable_slots() {
        let table = NodeTable::new(1 << 12);
        let mut w = new_worker();
        let _ = table.lookup(&mut w, 0, 1, 21, 22, false).unwrap();

        table.gc_clear();
        table.gc_rehash().unwrap();

        let mut w2 = new_worker();
        match table.lookup(&mut w2, 0, 1, 21, 22, false).unwrap() {
            InsertOutcome::Created(_) => {}
            InsertOutcome::Existing(_) => panic!("unreachable slot should have been collected"),
        }
    }
}
