//! Per-worker state (§3.5, §4.5). Held by value inside each worker thread's stack frame and
//! passed by `&mut` into every kernel operation — never stashed behind a thread-local, per the
//! DESIGN NOTE in spec.md §9.

use std::sync::Arc;

use crossbeam_deque::{Steal, Stealer, Worker};
use crossbeam_utils::Backoff;

use crate::cache::OperationCache;
use crate::runtime::task::{Job, JobHandle, TaskArgs, TaskFn, TaskResult};
use crate::runtime::PoolHandles;
use crate::store::{NodeTable, TableWorkerState};

/// The four GC root mechanisms of §3.4, all private to one worker and scanned during GC mark.
pub struct RefStacks {
    /// `ref_push`/`ref_pop`: live DD handles (indices) the caller wants protected across the next
    /// allocation.
    value_stack: Vec<u64>,
    /// `ref_push_ptr`/`ref_pop_ptr`: addresses of caller-owned handle slots that will be
    /// overwritten; GC dereferences them each cycle rather than snapshotting once.
    pointer_stack: Vec<*const u64>,
    /// Task-reference stack (§4.4 "Parallelism discipline"): argument/result node indices of
    /// still-in-flight spawned sub-calls, so GC can find them even if the task was stolen and
    /// its future has not resolved yet.
    task_stack: Vec<(u64, u64)>,
}

impl RefStacks {
    fn new() -> RefStacks {
        RefStacks { value_stack: Vec::with_capacity(256), pointer_stack: Vec::with_capacity(64), task_stack: Vec::with_capacity(256) }
    }

    pub fn push_value(&mut self, handle_index: u64) {
        self.value_stack.push(handle_index);
    }

    pub fn pop_value(&mut self) -> Option<u64> {
        self.value_stack.pop()
    }

    /// # Safety
    /// `ptr` must remain valid for as long as it stays on this stack; the caller is responsible
    /// for popping it before the referenced storage is freed.
    pub unsafe fn push_pointer(&mut self, ptr: *const u64) {
        self.pointer_stack.push(ptr);
    }

    pub fn pop_pointer(&mut self) -> Option<*const u64> {
        self.pointer_stack.pop()
    }

    pub fn push_task_operands(&mut self, a: u64, b: u64) {
        self.task_stack.push((a, b));
    }

    pub fn pop_task_operands(&mut self) {
        self.task_stack.pop();
    }

    /// Yield every node index currently rooted by this worker, for the GC mark phase.
    pub fn roots(&self) -> impl Iterator<Item = u64> + '_ {
        let values = self.value_stack.iter().copied();
        // SAFETY: pointers on this stack are guaranteed live by the caller contract of
        // `push_pointer`; GC only runs at yield points where no concurrent mutation occurs
        // (§4.5 "must all be quiescent ... at every GC yield point").
        let pointers = self.pointer_stack.iter().map(|p| unsafe { **p });
        let tasks = self.task_stack.iter().flat_map(|&(a, b)| [a, b]);
        values.chain(pointers).chain(tasks)
    }
}

/// Everything one worker thread needs to run kernel operations, carried by value and passed by
/// `&mut` into every `TaskFn` (spec.md §9 DESIGN NOTE: "pass a per-worker context reference
/// explicitly... do not hide it behind a global").
pub struct WorkerContext {
    pub id: usize,
    pub num_workers: usize,
    pub deque: Worker<Job>,
    pub table_state: TableWorkerState,
    pub refs: RefStacks,
    pub pool: PoolHandles,
    /// Shared with every other worker and with the `Engine` handle; the node store and cache
    /// are the two structures every kernel operation ultimately bottoms out on.
    pub store: Arc<NodeTable>,
    pub cache: Arc<OperationCache>,
    rng_state: u64,
    pub steals_succeeded: u64,
    pub steals_failed: u64,
    pub empty_deque_events: u64,
}

impl WorkerContext {
    pub fn new(
        id: usize,
        num_workers: usize,
        deque: Worker<Job>,
        pool: PoolHandles,
        store: Arc<NodeTable>,
        cache: Arc<OperationCache>,
    ) -> WorkerContext {
        WorkerContext {
            id,
            num_workers,
            deque,
            table_state: TableWorkerState::new(),
            refs: RefStacks::new(),
            pool,
            store,
            cache,
            rng_state: 0x9e3779b97f4a7c15 ^ (id as u64 + 1),
            steals_succeeded: 0,
            steals_failed: 0,
            empty_deque_events: 0,
        }
    }

    pub fn stealer(&self) -> Stealer<Job> {
        self.deque.stealer()
    }

    /// xorshift64*, good enough for victim selection and not used for anything security
    /// sensitive (§4.1 "random-number state for victim selection").
    pub fn next_victim(&mut self, exclude_self: usize) -> usize {
        if self.num_workers <= 1 {
            return self.id;
        }
        let mut x = self.rng_state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.rng_state = x;
        let pick = (x as usize) % (self.num_workers - 1);
        if pick >= exclude_self {
            pick + 1
        } else {
            pick
        }
    }

    /// Fork a child task onto this worker's own deque (§4.1 "spawn"). Absent theft, this same
    /// worker is the one that later pops and runs it.
    pub fn spawn(&mut self, func: TaskFn, args: TaskArgs) -> JobHandle {
        let (job, handle) = Job::new(func, args);
        self.deque.push(job);
        handle
    }

    /// Wait for a spawned task to complete, helping with other available work meanwhile instead
    /// of idling (§4.1 "sync"). Whoever actually runs the target job — this worker or a thief —
    /// publishes its result to `handle` before `sync` returns.
    pub fn sync(&mut self, handle: &JobHandle) -> TaskResult {
        if let Some(job) = self.deque.pop() {
            if job.matches(handle) {
                return job.run(self);
            }
            job.run(self);
            if handle.is_done() {
                return handle.take_result();
            }
        }

        let backoff = Backoff::new();
        loop {
            if handle.is_done() {
                return handle.take_result();
            }
            if let Some(job) = self.steal_one() {
                job.run(self);
                backoff.reset();
            } else {
                backoff.snooze();
            }
        }
    }

    /// One round of "steal from the shared injector, else from a random peer" (§4.1).
    pub fn steal_one(&mut self) -> Option<Job> {
        loop {
            match self.pool.injector.steal_batch_and_pop(&self.deque) {
                Steal::Success(job) => return Some(job),
                Steal::Retry => continue,
                Steal::Empty => break,
            }
        }
        let victim = self.next_victim(self.id);
        if victim == self.id {
            return None;
        }
        match self.pool.stealers[victim].steal() {
            Steal::Success(job) => {
                self.steals_succeeded += 1;
                Some(job)
            }
            Steal::Retry | Steal::Empty => {
                self.steals_failed += 1;
                None
            }
        }
    }

    /// Ask the pool to run a cooperative GC cycle, contributing this worker's own roots. Blocks
    /// until the cycle (this one's, or one already in flight) completes (§4.2).
    pub fn request_gc(&mut self) {
        self.pool.gc_pending.store(true, std::sync::atomic::Ordering::Release);
        self.participate_in_gc();
    }

    /// Join an in-progress (or just-requested) GC cycle: contribute this worker's roots, and if
    /// this worker happens to be the last arrival, actually run the cycle body.
    pub fn participate_in_gc(&mut self) {
        let roots: Vec<u64> = self.refs.roots().collect();
        if let Some(all_roots) = self.pool.barrier.rendezvous(roots) {
            (self.pool.gc)(&all_roots);
            self.pool.stats.gc_cycles.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
            self.pool.gc_pending.store(false, std::sync::atomic::Ordering::Release);
            self.pool.barrier.release();
        }
    }
}
