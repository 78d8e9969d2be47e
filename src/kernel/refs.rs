//! `ref_push`/`ref_pop`/`ref_push_ptr`/`ref_pop_ptr` (§3.4 "Reference stack") and `protect`/
//! `unprotect` (§6.1), the two ways a caller keeps a DD alive across a call that might trigger GC.

use crate::runtime::WorkerContext;
use crate::store::Handle;

/// Push `dd` onto this worker's value-reference stack, keeping it alive until the matching
/// `ref_pop`. Returns the handle unchanged so calls can be chained inline around an operation.
pub fn ref_push(ctx: &mut WorkerContext, dd: Handle) -> Handle {
    ctx.refs.push_value(dd.raw());
    dd
}

/// Pop the most recently pushed value reference. Panics if the stack is empty — callers must
/// balance every `ref_push` with exactly one `ref_pop` (§3.4 "stack discipline").
pub fn ref_pop(ctx: &mut WorkerContext) -> Handle {
    let raw = ctx.refs.pop_value().expect("ref_pop with no matching ref_push");
    Handle::from_raw(raw)
}

/// Register `slot` itself as a GC root: every cycle until the matching `ref_pop_ptr`, GC
/// dereferences `slot` fresh rather than snapshotting its value once. Useful when the caller holds
/// a `Handle` in a local variable that it keeps reassigning across several operations.
///
/// # Safety
/// `slot` must stay valid (point at live, readable memory holding a `Handle`'s raw bits) for as
/// long as it remains on the stack.
pub unsafe fn ref_push_ptr(ctx: &mut WorkerContext, slot: &Handle) {
    ctx.refs.push_pointer(slot as *const Handle as *const u64);
}

pub fn ref_pop_ptr(ctx: &mut WorkerContext) {
    ctx.refs.pop_pointer();
}

/// An external, long-lived root: a DD the caller intends to hold onto across many operations,
/// outside the scope of any single worker's call stack (§6.1 `protect`). Implemented as a process
/// -wide registry scanned by GC alongside every worker's own reference stacks.
pub struct ProtectedSet {
    held: std::sync::Mutex<std::collections::HashMap<u64, u64>>,
}

impl ProtectedSet {
    pub fn new() -> ProtectedSet {
        ProtectedSet { held: std::sync::Mutex::new(std::collections::HashMap::new()) }
    }

    pub fn protect(&self, dd: Handle) {
        let mut held = self.held.lock().unwrap();
        *held.entry(dd.raw()).or_insert(0) += 1;
    }

    pub fn unprotect(&self, dd: Handle) {
        let mut held = self.held.lock().unwrap();
        if let std::collections::hash_map::Entry::Occupied(mut entry) = held.entry(dd.raw()) {
            *entry.get_mut() -= 1;
            if *entry.get() == 0 {
                entry.remove();
            }
        }
    }

    pub fn roots(&self) -> Vec<u64> {
        self.held.lock().unwrap().keys().copied().collect()
    }
}

impl Default for ProtectedSet {
    fn default() -> ProtectedSet {
        ProtectedSet::new()
    }
}
