// Copyright (c) 2025 Weft Contributors
//
// Task, permit, and handle types
//
// A task is a schedulable unit of work: an identifier stamped at allocation,
// an optional kernel, and the bookkeeping that wires it into the dependency
// graph. Dependencies are expressed in reverse: each task owns a small chain
// of permits naming the tasks it unblocks on completion, and each task counts
// the predecessors still blocking it in a single atomic.

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

/// Number of permit cells allocated inline with every task.
///
/// Successor edges beyond this count chain through nodes drawn from the
/// overflow permit pool.
pub const EMBEDDED_PERMITS: usize = 2;

/// Sentinel for "no index" in handles and free-lists.
pub(crate) const NIL: u32 = 0xffff_ffff;

/// `blockers` value latched by the first successful submission.
///
/// A task is submitted exactly once: either by `kick` observing zero
/// outstanding blockers, or by the final predecessor's decrement-to-zero.
/// Whichever path wins the latch pushes the task; every other path no-ops.
pub(crate) const SCHEDULED: u32 = 0xffff_ffff;

/// The callable body of a CPU task.
pub type Kernel = fn(*mut ());

/// Callback invoked around every kernel.
pub type HookFn = fn(&Task, *mut ());

/// Work to perform when a task is scheduled.
#[derive(Clone, Copy)]
pub enum Work {
    /// No work; the task exists only for its permits and barrier.
    None,
    /// Run `kernel(data)` on whichever worker picks the task up.
    Cpu { kernel: Kernel, data: *mut () },
}

/// A reverse-dependency edge: "when the owning task completes, unblock
/// `task`."
///
/// Permits are either embedded in the owning task or drawn from the overflow
/// pool; both forms are traversed uniformly through `next`.
pub struct Permit {
    next: Cell<*const Permit>,
    task: Cell<*const Task>,
}

impl Permit {
    pub(crate) const fn new() -> Self {
        Self {
            next: Cell::new(std::ptr::null()),
            task: Cell::new(std::ptr::null()),
        }
    }

    pub(crate) fn next(&self) -> *const Permit {
        self.next.get()
    }

    pub(crate) fn set_next(&self, next: *const Permit) {
        self.next.set(next);
    }

    pub(crate) fn target(&self) -> *const Task {
        self.task.get()
    }

    pub(crate) fn set_target(&self, task: *const Task) {
        self.task.set(task);
    }

    pub(crate) fn clear(&self) {
        self.next.set(std::ptr::null());
        self.task.set(std::ptr::null());
    }
}

// Safety: a permit is mutated only by the thread that owns its task, either
// while wiring edges before the task is first kicked or while walking the
// chain after the task's kernel has run. Those two phases are serialized by
// the task lifecycle, so the plain cells are never raced.
unsafe impl Send for Permit {}
unsafe impl Sync for Permit {}

/// A schedulable unit of work and its permits.
///
/// Task slots live in a fixed pool and are recycled through a lock-free
/// free-list. Fields fall into two camps: those written only by the
/// describing thread before the first kick (`flags`, `work`, `barrier`, the
/// embedded permits), and those shared across threads afterwards
/// (`blockers`, the barrier counter behind the pointer). The former are
/// plain cells, the latter atomics.
pub struct Task {
    /// Pool-unique identifier stamped at allocation, used to detect stale
    /// handles in checked builds.
    id: Cell<u32>,

    /// Reserved flag space.
    flags: Cell<u32>,

    /// Work to perform.
    work: Cell<Work>,

    /// Head of the permit chain. The first few cells are allocated inline
    /// for locality; overflow nodes chain off the last one.
    permits: [Permit; EMBEDDED_PERMITS],

    /// Number of successor edges this task owns.
    blocks: AtomicU32,

    /// Number of predecessors that have not yet completed. Latched to
    /// `SCHEDULED` by the winning submission.
    blockers: AtomicU32,

    /// Caller-owned counter decremented after completion, or null.
    barrier: Cell<*const AtomicU32>,
}

impl Task {
    pub(crate) const fn vacant() -> Self {
        const VACANT_PERMIT: Permit = Permit::new();

        Self {
            id: Cell::new(0),
            flags: Cell::new(0),
            work: Cell::new(Work::None),
            permits: [VACANT_PERMIT; EMBEDDED_PERMITS],
            blocks: AtomicU32::new(0),
            blockers: AtomicU32::new(0),
            barrier: Cell::new(std::ptr::null()),
        }
    }

    /// Reset a freshly acquired slot to describe new work.
    pub(crate) fn describe(&self, work: Work, flags: u32) {
        self.flags.set(flags);
        self.work.set(work);

        for permit in &self.permits {
            permit.clear();
        }

        self.blocks.store(0, Ordering::Relaxed);
        self.blockers.store(0, Ordering::Relaxed);

        self.barrier.set(std::ptr::null());
    }

    /// Globally unique identifier for the current occupancy of this slot.
    pub fn id(&self) -> u32 {
        self.id.get()
    }

    pub(crate) fn stamp_id(&self, id: u32) {
        self.id.set(id);
    }

    /// Reserved flag word supplied at description.
    pub fn flags(&self) -> u32 {
        self.flags.get()
    }

    pub(crate) fn work(&self) -> Work {
        self.work.get()
    }

    pub(crate) fn embedded_permit(&self, index: usize) -> &Permit {
        &self.permits[index]
    }

    pub(crate) fn blocks(&self) -> &AtomicU32 {
        &self.blocks
    }

    pub(crate) fn blockers(&self) -> &AtomicU32 {
        &self.blockers
    }

    pub(crate) fn barrier(&self) -> *const AtomicU32 {
        self.barrier.get()
    }

    pub(crate) fn set_barrier(&self, barrier: *const AtomicU32) {
        self.barrier.set(barrier);
    }
}

// Safety: tasks are shared across worker threads through the pool and the
// work queues. The cell-backed fields are only touched by the describing
// thread before the first kick and by the single executing worker after the
// kernel runs; every field that is genuinely concurrent is an atomic.
unsafe impl Send for Task {}
unsafe impl Sync for Task {}

/// Opaque, copyable reference to a pooled task.
///
/// Handles are valid from description until the task completes; the slot
/// index is paired with the stamped id so checked builds can catch use of a
/// recycled slot. Do not retain a handle after the task has run.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub(crate) index: u32,
    pub(crate) id: u32,
}

impl Handle {
    /// A handle that never names a live task.
    pub const INVALID: Handle = Handle { index: NIL, id: NIL };

    /// Whether this handle could name a live task.
    pub fn is_valid(&self) -> bool {
        self.index != NIL
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("index", &self.index)
            .field("id", &self.id)
            .finish()
    }
}

/// A per-task callback and its context, invoked before (prologue) or after
/// (epilogue) every kernel.
#[derive(Clone, Copy)]
pub struct Hook {
    pub callback: Option<HookFn>,
    pub context: *mut (),
}

impl Hook {
    /// No callback; the scheduler substitutes a no-op so call sites remain
    /// unconditional.
    pub const NONE: Hook = Hook {
        callback: None,
        context: std::ptr::null_mut(),
    };
}

impl Default for Hook {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_resets_state() {
        let task = Task::vacant();
        task.blocks.store(7, Ordering::Relaxed);
        task.blockers.store(3, Ordering::Relaxed);
        task.embedded_permit(0).set_next(&task.permits[1]);

        task.describe(Work::None, 0);

        assert_eq!(task.blocks.load(Ordering::Relaxed), 0);
        assert_eq!(task.blockers.load(Ordering::Relaxed), 0);
        assert!(task.embedded_permit(0).next().is_null());
        assert!(task.embedded_permit(0).target().is_null());
        assert!(task.barrier().is_null());
    }

    #[test]
    fn test_invalid_handle() {
        assert!(!Handle::INVALID.is_valid());
        let handle = Handle { index: 4, id: 9 };
        assert!(handle.is_valid());
        assert_ne!(handle, Handle::INVALID);
    }
}
