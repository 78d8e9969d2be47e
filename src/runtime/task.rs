//! Task objects for the work-stealing runtime (§4.1, §9 "Recursion + task spawning").
//!
//! Per the DESIGN NOTE in spec.md §9, a task is modeled as a value holding a function pointer,
//! fixed closed-over arguments, a result slot, and a completion flag — not a boxed closure. Every
//! DD kernel operation takes at most four `u64` arguments (handles, domains, or small integers)
//! and produces at most two `u64` results, so a fixed-width representation covers every caller
//! without type erasure.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::worker::WorkerContext;

#[derive(Copy, Clone, Debug, Default)]
pub struct TaskArgs {
    pub a: u64,
    pub b: u64,
    pub c: u64,
    pub d: u64,
}

#[derive(Copy, Clone, Debug, Default)]
pub struct TaskResult {
    pub a: u64,
    pub b: u64,
}

impl TaskResult {
    pub fn single(a: u64) -> TaskResult {
        TaskResult { a, b: 0 }
    }
}

pub type TaskFn = fn(&mut WorkerContext, TaskArgs) -> TaskResult;

struct Slot {
    done: AtomicBool,
    value: Mutex<TaskResult>,
}

/// A task pushed onto a worker's deque. Cheap to clone (an `Arc` to the shared result slot) so
/// the owner can keep a `Job` value after pushing it while a thief races to steal and run it.
#[derive(Clone)]
pub struct Job {
    pub(crate) func: TaskFn,
    pub(crate) args: TaskArgs,
    slot: Arc<Slot>,
}

/// A handle returned by `spawn`; pass it to `sync` to retrieve the result once the task
/// completes, wherever it ran.
#[derive(Clone)]
pub struct JobHandle {
    slot: Arc<Slot>,
}

impl Job {
    pub fn new(func: TaskFn, args: TaskArgs) -> (Job, JobHandle) {
        let slot = Arc::new(Slot { done: AtomicBool::new(false), value: Mutex::new(TaskResult::default()) });
        (
            Job { func, args, slot: slot.clone() },
            JobHandle { slot },
        )
    }

    /// Run this task to completion (inline, by whichever worker owns or stole it) and publish
    /// the result to anyone holding the matching `JobHandle`.
    pub fn run(self, ctx: &mut WorkerContext) -> TaskResult {
        let result = (self.func)(ctx, self.args);
        *self.slot.value.lock() = result;
        self.slot.done.store(true, Ordering::Release);
        result
    }

    /// Identity check used by `sync`'s fast path: "is the task I just popped off my own deque
    /// the same one I am trying to sync on?" (it always should be, under strict fork/join
    /// discipline, but `sync` must not blindly execute an unrelated popped task).
    pub fn matches(&self, handle: &JobHandle) -> bool {
        Arc::ptr_eq(&self.slot, &handle.slot)
    }
}

impl JobHandle {
    pub fn is_done(&self) -> bool {
        self.slot.done.load(Ordering::Acquire)
    }

    pub fn take_result(&self) -> TaskResult {
        debug_assert!(self.is_done());
        *self.slot.value.lock()
    }
}
