//! L1: the work-stealing task runtime (§4.1), modeled on Sylvan's Lace. Each worker owns a
//! `crossbeam_deque::Worker<Job>` (a Chase-Lev deque); idle workers steal from a shared
//! `Injector` first, then from a randomly chosen peer's `Stealer` handle.

pub mod barrier;
pub mod task;
pub mod worker;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use crossbeam_deque::{Injector, Stealer, Worker as Deque};
use crossbeam_utils::Backoff;
use tracing::{debug, info};

use crate::cache::OperationCache;
use crate::store::NodeTable;
use barrier::GcBarrier;
pub use task::{Job, JobHandle, TaskArgs, TaskFn, TaskResult};
pub use worker::WorkerContext;

/// Counters exposed through `Engine::stats` when `EngineConfig::collect_stats` is set.
#[derive(Default)]
pub struct RuntimeStats {
    pub tasks_run: AtomicU64,
    pub gc_cycles: AtomicU64,
}

impl RuntimeStats {
    pub fn tasks_run(&self) -> u64 {
        self.tasks_run.load(Ordering::Relaxed)
    }

    pub fn gc_cycles(&self) -> u64 {
        self.gc_cycles.load(Ordering::Relaxed)
    }
}

/// A GC cycle body, supplied by `Engine` — it closes over the node table and operation cache so
/// this module never needs to know about either. Invoked with every root contributed by every
/// worker at the rendezvous point.
pub type GcCallback = Arc<dyn Fn(&[u64]) + Send + Sync>;

/// The handles every worker needs to participate in stealing and GC, bundled so `WorkerContext`
/// can carry them without the runtime reaching back into a thread-local or global (§9 DESIGN
/// NOTE). Cheap to clone: everything inside is an `Arc` or a plain reference-counted handle.
#[derive(Clone)]
pub struct PoolHandles {
    pub injector: Arc<Injector<Job>>,
    pub stealers: Arc<Vec<Stealer<Job>>>,
    pub barrier: Arc<GcBarrier>,
    pub gc_pending: Arc<AtomicBool>,
    pub gc: GcCallback,
    pub stats: Arc<RuntimeStats>,
}

struct Shared {
    injector: Arc<Injector<Job>>,
    barrier: Arc<GcBarrier>,
    gc_pending: Arc<AtomicBool>,
    shutdown: AtomicBool,
    num_workers: usize,
    stats: Arc<RuntimeStats>,
}

/// The running worker pool. Constructed by `Engine::init`, torn down by `Engine::quit`.
pub struct Runtime {
    shared: Arc<Shared>,
    threads: Vec<thread::JoinHandle<()>>,
    pool: PoolHandles,
}

fn worker_main(shared: Arc<Shared>, mut ctx: WorkerContext) {
    let backoff = Backoff::new();
    loop {
        if shared.shutdown.load(Ordering::Acquire) {
            break;
        }
        if shared.gc_pending.load(Ordering::Acquire) {
            ctx.participate_in_gc();
            backoff.reset();
            continue;
        }
        match ctx.deque.pop().or_else(|| ctx.steal_one()) {
            Some(job) => {
                job.run(&mut ctx);
                shared.stats.tasks_run.fetch_add(1, Ordering::Relaxed);
                backoff.reset();
            }
            None => backoff.snooze(),
        }
    }
    debug!(
        worker = ctx.id,
        steals_ok = ctx.steals_succeeded,
        steals_failed = ctx.steals_failed,
        "worker shutting down"
    );
}

impl Runtime {
    /// Start `num_workers` background threads, each driving its own deque, sharing one injector
    /// and one GC barrier. `gc` is invoked (by exactly one worker per cycle) whenever any worker
    /// calls `WorkerContext::request_gc`.
    ///
    /// `extra_participants` is the number of additional `WorkerContext`s the caller intends to
    /// mint via `external_context` (e.g. `Engine` handing the embedding thread its own context so
    /// it can call kernel operations directly) — these never run background jobs and never show
    /// up in `stealers`, but they do join the GC rendezvous, so the barrier must be sized for
    /// them too.
    pub fn start(num_workers: usize, extra_participants: usize, store: Arc<NodeTable>, cache: Arc<OperationCache>, gc: GcCallback) -> Runtime {
        assert!(num_workers > 0);
        let total = num_workers + extra_participants;
        let deques: Vec<Deque<Job>> = (0..num_workers).map(|_| Deque::new_fifo()).collect();
        let stealers: Arc<Vec<Stealer<Job>>> = Arc::new(deques.iter().map(|d| d.stealer()).collect());
        let injector = Arc::new(Injector::new());
        let barrier = Arc::new(GcBarrier::new(total));
        let gc_pending = Arc::new(AtomicBool::new(false));
        let stats = Arc::new(RuntimeStats::default());

        let shared = Arc::new(Shared {
            injector: injector.clone(),
            barrier: barrier.clone(),
            gc_pending: gc_pending.clone(),
            shutdown: AtomicBool::new(false),
            num_workers: total,
            stats: stats.clone(),
        });

        let pool = PoolHandles { injector, stealers, barrier, gc_pending, gc, stats };

        let threads = deques
            .into_iter()
            .enumerate()
            .map(|(id, deque)| {
                let shared = shared.clone();
                let ctx = WorkerContext::new(id, total, deque, pool.clone(), store.clone(), cache.clone());
                thread::Builder::new()
                    .name(format!("sharpd-worker-{id}"))
                    .spawn(move || worker_main(shared, ctx))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        info!(num_workers, extra_participants, "runtime: started worker pool");
        Runtime { shared, threads, pool }
    }

    /// Mint a `WorkerContext` for a thread outside the background pool (an "extra participant"
    /// accounted for at `start`). It has its own private deque — nothing steals from it and it is
    /// never handed background jobs — but it shares the pool's injector, GC barrier, and
    /// `gc_pending` flag, so it can call `request_gc`/`participate_in_gc` like any other worker.
    pub fn external_context(&self, id: usize, store: Arc<NodeTable>, cache: Arc<OperationCache>) -> WorkerContext {
        WorkerContext::new(id, self.shared.num_workers, Deque::new_fifo(), self.pool.clone(), store, cache)
    }

    pub fn num_workers(&self) -> usize {
        self.shared.num_workers
    }

    pub fn stats(&self) -> &RuntimeStats {
        &self.shared.stats
    }

    /// Submit a task from outside the worker pool (the public `Engine` API surface) and block
    /// the calling thread until it completes. This is the documented simplification of §4.1's
    /// "run(T) starts the root task on worker 0": rather than pressing the external caller into
    /// worker-0's identity, the root job is injected and every real worker thread competes for
    /// it, which is observationally identical for a single outstanding root call.
    pub fn run(&self, func: TaskFn, args: TaskArgs) -> TaskResult {
        let (job, handle) = Job::new(func, args);
        self.shared.injector.push(job);
        let backoff = Backoff::new();
        while !handle.is_done() {
            backoff.snooze();
        }
        handle.take_result()
    }

    pub fn shutdown(mut self) {
        self.shared.shutdown.store(true, Ordering::Release);
        for handle in self.threads.drain(..) {
            let _ = handle.join();
        }
    }
}
