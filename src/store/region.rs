//! Region-based slot allocation (§3.2, §4.2 "Region claiming").
//!
//! The data array is divided into fixed 512-slot regions. Each worker claims one region at a
//! time via CAS on `bitmap1` and allocates serially (no further synchronization) from within it;
//! when exhausted, it claims the next free region. This removes contention on a global
//! free-slot cursor, matching the teacher's `NodeCache` observation that newly created nodes
//! reference recently created ones and so a worker-local cursor has excellent locality.

use std::sync::atomic::{AtomicU64, Ordering};

use super::bitset::AtomicBitset;

pub const REGION_SLOTS: u64 = 512;

pub struct RegionAllocator {
    claimed: AtomicBitset,
    num_regions: u64,
    capacity: u64,
}

/// A worker's private cursor into its currently claimed region. Lives in the per-worker context
/// (DESIGN NOTE: "pass a per-worker context reference explicitly", not a hidden thread-local).
#[derive(Clone, Copy)]
pub struct RegionCursor {
    region_start: u64,
    next: u64,
    region_end: u64,
}

impl RegionCursor {
    pub fn empty() -> RegionCursor {
        RegionCursor { region_start: 0, next: 0, region_end: 0 }
    }

    #[inline]
    pub fn has_room(&self) -> bool {
        self.next < self.region_end
    }

    /// Claim the next genuinely free slot in this region, scanning forward and CAS-setting
    /// `occupied` (bitmap2) rather than handing out a plain counter value. After `gc_clear`
    /// resets the region allocator (`table.rs`'s `gc_clear`) but `mark_reachable` re-sets
    /// `occupied` for survivors in their original slots, a region can be reclaimed by a new
    /// cursor while still holding live nodes; scanning and CAS-claiming is what lets that cursor
    /// skip them instead of overwriting live data (grounded in Sylvan's `llgcset`/`nodes_llht.c`
    /// slot claim). Returns `None` once the region is exhausted without finding a free slot; the
    /// caller must then claim a fresh region. Slots skipped this way because they were occupied
    /// are not revisited by this cursor even if they are later freed — full reclaiming happens
    /// only when the region itself is released back to the allocator at the next GC.
    #[inline]
    pub fn allocate(&mut self, occupied: &AtomicBitset) -> Option<u64> {
        while self.next < self.region_end {
            let slot = self.next;
            self.next += 1;
            if occupied.set_if_clear(slot) {
                return Some(slot);
            }
        }
        None
    }
}

impl RegionAllocator {
    pub fn new(capacity_slots: u64) -> RegionAllocator {
        let num_regions = (capacity_slots + REGION_SLOTS - 1) / REGION_SLOTS;
        RegionAllocator {
            claimed: AtomicBitset::new(num_regions),
            num_regions,
            capacity: capacity_slots,
        }
    }

    /// Claim a fresh region for `worker_id`, biased towards `worker_id * regions/nworkers` to
    /// reduce early collisions between workers (§4.2).
    pub fn claim_region(&self, worker_id: usize, num_workers: usize) -> Option<RegionCursor> {
        let bias_word = if num_workers == 0 {
            0
        } else {
            ((worker_id as u64 * self.num_regions) / num_workers as u64) as usize / 64
        };
        let region = self.claimed.find_and_set_free_bit(bias_word)?;
        let start = region * REGION_SLOTS;
        let end = (start + REGION_SLOTS).min(self.capacity);
        Some(RegionCursor { region_start: start, next: start.max(2), region_end: end })
    }

    /// Release every claimed region, called at the start of a GC cycle once the table has been
    /// cleared (§4.2 phase 1 clears `bitmap1` alongside the hash array).
    pub fn reset(&self) {
        self.claimed.clear_all();
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }
}

/// A simple monotonically increasing occupancy counter, used only for resize-threshold
/// decisions (§4.2 "Resize"); it is an approximation under concurrent allocation, which is
/// acceptable because growth decisions are only evaluated at the GC barrier.
pub struct OccupancyCounter(AtomicU64);

impl OccupancyCounter {
    pub fn new() -> OccupancyCounter {
        OccupancyCounter(AtomicU64::new(2)) // slots 0 and 1 are always reserved/occupied.
    }

    pub fn increment(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    pub fn set(&self, value: u64) {
        self.0.store(value, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn two_workers_claim_distinct_regions() {
        let alloc = RegionAllocator::new(REGION_SLOTS * 4);
        let a = alloc.claim_region(0, 2).unwrap();
        let b = alloc.claim_region(1, 2).unwrap();
        assert_ne!(a.region_start, b.region_start);
    }

    #[test]
    fn cursor_allocates_sequential_slots_starting_after_reserved() {
        let alloc = RegionAllocator::new(REGION_SLOTS);
        let mut cursor = alloc.claim_region(0, 1).unwrap();
        let occupied = AtomicBitset::new(REGION_SLOTS);
        assert_eq!(cursor.allocate(&occupied), Some(2));
        assert_eq!(cursor.allocate(&occupied), Some(3));
    }

    #[test]
    fn cursor_skips_slots_already_marked_occupied() {
        let alloc = RegionAllocator::new(REGION_SLOTS);
        let mut cursor = alloc.claim_region(0, 1).unwrap();
        let occupied = AtomicBitset::new(REGION_SLOTS);
        // Simulate a survivor re-marked into slot 2 by a prior GC's mark phase.
        occupied.set(2, Ordering::Relaxed);
        assert_eq!(cursor.allocate(&occupied), Some(3));
    }

    #[test]
    fn cursor_returns_none_once_region_is_fully_occupied() {
        let alloc = RegionAllocator::new(REGION_SLOTS);
        let mut cursor = alloc.claim_region(0, 1).unwrap();
        let occupied = AtomicBitset::new(REGION_SLOTS);
        for slot in 2..REGION_SLOTS {
            occupied.set(slot, Ordering::Relaxed);
        }
        assert_eq!(cursor.allocate(&occupied), None);
        assert!(!cursor.has_room());
    }

    #[test]
    fn reset_allows_regions_to_be_reclaimed() {
        let alloc = RegionAllocator::new(REGION_SLOTS);
        let _ = alloc.claim_region(0, 1).unwrap();
        assert!(alloc.claim_region(0, 1).is_none());
        alloc.reset();
        assert!(alloc.claim_region(0, 1).is_some());
    }
}
