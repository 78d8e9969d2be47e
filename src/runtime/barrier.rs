//! Stop-the-world rendezvous barrier for cooperative GC (§4.2 "Every worker must reach a GC-safe
//! point before the cycle starts").
//!
//! Grounded in `xgillard-ddo`'s parallel solver monitor: a `Mutex`-guarded critical section plus
//! a `Condvar` for both directions of the handshake (workers announce arrival, one worker runs
//! the cycle, workers wait to be released). Sylvan's `lace.c` uses a spinning generation counter
//! for the same handshake; this crate swaps the busy-wait for `parking_lot::Condvar` because a
//! GC cycle is rare and comparatively long, so blocking is the better trade.

use parking_lot::{Condvar, Mutex};

struct Critical {
    generation: u64,
    arrived: usize,
    running: bool,
    roots: Vec<u64>,
}

pub struct GcBarrier {
    num_workers: usize,
    state: Mutex<Critical>,
    arrived_cv: Condvar,
    released_cv: Condvar,
}

impl GcBarrier {
    pub fn new(num_workers: usize) -> GcBarrier {
        GcBarrier {
            num_workers,
            state: Mutex::new(Critical { generation: 0, arrived: 0, running: false, roots: Vec::new() }),
            arrived_cv: Condvar::new(),
            released_cv: Condvar::new(),
        }
    }

    /// Called by every worker at a yield point, contributing its own GC roots (§3.4: the value
    /// stack, pointer stack, and task stack of its `WorkerContext`). Blocks until the elected
    /// runner has completed the cycle. The last worker to arrive gets back every contributed
    /// root and must run `gc::run_cycle` on them, then call `release`; everyone else gets `None`.
    pub fn rendezvous(&self, my_roots: impl IntoIterator<Item = u64>) -> Option<Vec<u64>> {
        let mut state = self.state.lock();
        let my_generation = state.generation;
        state.roots.extend(my_roots);
        state.arrived += 1;

        if state.arrived == self.num_workers {
            state.running = true;
            self.arrived_cv.notify_all();
            return Some(std::mem::take(&mut state.roots));
        }

        // Not the last arrival: wait for the elected runner to start, then for it to finish.
        self.arrived_cv.wait_while(&mut state, |s| s.generation == my_generation && !s.running);
        self.released_cv.wait_while(&mut state, |s| s.generation == my_generation);
        None
    }

    /// Called only by the worker for whom `rendezvous` returned `Some(_)`, after it has run the
    /// GC cycle. Advances the generation and releases everyone waiting in `rendezvous`.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.generation += 1;
        state.arrived = 0;
        state.running = false;
        self.released_cv.notify_all();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn exactly_one_worker_is_elected_runner_and_sees_all_roots() {
        let barrier = Arc::new(GcBarrier::new(4));
        let elected = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let seen_roots = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let barrier = barrier.clone();
                let elected = elected.clone();
                let seen_roots = seen_roots.clone();
                thread::spawn(move || {
                    if let Some(roots) = barrier.rendezvous([i as u64]) {
                        elected.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                        seen_roots.store(roots.len(), std::sync::atomic::Ordering::SeqCst);
                        barrier.release();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(elected.load(std::sync::atomic::Ordering::SeqCst), 1);
        assert_eq!(seen_roots.load(std::sync::atomic::Ordering::SeqCst), 4);
    }
}
