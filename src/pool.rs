// Copyright (c) 2025 Weft Contributors
//
// Fixed task and permit pools
//
// Each pool owns a contiguous array of entities and a lock-free free-list of
// slot indices. Acquire pops an index; release converts the entity's address
// back to an index and pushes it. Nothing is ever allocated after
// construction, so exhausting a pool is a sizing bug on the embedder's side
// and trips an assertion rather than surfacing as a recoverable error.

use std::sync::atomic::{AtomicU32, Ordering};

use crate::freelist::FreeList;
use crate::task::{Handle, Permit, Task};

/// Pool of task slots with monotonic id stamping.
pub(crate) struct TaskPool {
    slots: Box<[Task]>,
    freelist: FreeList,
    next_id: AtomicU32,
}

impl TaskPool {
    pub fn new(size: usize) -> Self {
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            slots.push(Task::vacant());
        }

        Self {
            slots: slots.into_boxed_slice(),
            freelist: FreeList::new(size),
            next_id: AtomicU32::new(0),
        }
    }

    /// Take a free slot and stamp a fresh id into it.
    pub fn acquire(&self) -> &Task {
        let index = match self.freelist.pop() {
            Some(index) => index,
            None => panic!("task pool exhausted; size the pool for peak outstanding tasks"),
        };

        let task = &self.slots[index as usize];
        task.stamp_id(self.next_id.fetch_add(1, Ordering::Relaxed).wrapping_add(1));
        task
    }

    /// Return a completed task's slot to the pool.
    pub fn release(&self, task: &Task) {
        self.freelist.push(self.index_of(task));
    }

    /// Encode a pooled task as a caller-facing handle.
    pub fn handle_for(&self, task: &Task) -> Handle {
        Handle {
            index: self.index_of(task),
            id: task.id(),
        }
    }

    /// Decode a handle back to its task.
    ///
    /// Checked builds verify the stamped id so a handle that outlived its
    /// task is caught instead of silently aliasing the slot's next tenant.
    pub fn resolve(&self, handle: Handle) -> &Task {
        let task = &self.slots[handle.index as usize];
        debug_assert_eq!(task.id(), handle.id, "stale task handle");
        task
    }

    fn index_of(&self, task: &Task) -> u32 {
        // Safety: every `&Task` handed out by this pool points into `slots`.
        let index = unsafe { (task as *const Task).offset_from(self.slots.as_ptr()) };
        debug_assert!((0..self.slots.len() as isize).contains(&index));
        index as u32
    }
}

/// Pool of overflow permit nodes.
///
/// Tasks carry a few permit cells inline; edges past that count draw nodes
/// from here. Release detects embedded cells by address range and leaves
/// them alone, so completion code can return every node on a chain
/// uniformly.
pub(crate) struct PermitPool {
    slots: Box<[Permit]>,
    freelist: FreeList,
}

impl PermitPool {
    pub fn new(size: usize) -> Self {
        let mut slots = Vec::with_capacity(size);
        for _ in 0..size {
            slots.push(Permit::new());
        }

        Self {
            slots: slots.into_boxed_slice(),
            freelist: FreeList::new(size),
        }
    }

    pub fn acquire(&self) -> &Permit {
        let index = match self.freelist.pop() {
            Some(index) => index,
            None => panic!("permit pool exhausted; size the pool for peak wired dependencies"),
        };

        let permit = &self.slots[index as usize];
        permit.clear();
        permit
    }

    /// Return a permit node; a no-op (beyond scrubbing) for cells embedded
    /// in a task.
    pub fn release(&self, permit: &Permit) {
        let address = permit as *const Permit;
        let base = self.slots.as_ptr();
        // Safety: one-past-the-end pointer of the same allocation.
        let end = unsafe { base.add(self.slots.len()) };

        permit.clear();

        if address < base || address >= end {
            // Embedded in some task; the slot is recycled with the task.
            return;
        }

        // Safety: just range-checked against `slots`.
        let index = unsafe { address.offset_from(base) } as u32;
        self.freelist.push(index);
    }
}
