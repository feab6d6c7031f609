// Copyright (c) 2025 Weft Contributors
//
// Work-stealing deque implementation
//
// This module implements the Chase-Lev work-stealing deque. The owner can
// push and pop from the bottom in LIFO order, while thieves steal from the
// top in FIFO order.
//
// Unlike the growable variants, capacity here is fixed at construction:
// sizing is prescribed up front and overflow is a programming error. The
// indices are 32-bit counters compared with wrap-around arithmetic, so the
// deque stays correct across counter overflow.
//
// Reference: "Dynamic Circular Work-Stealing Deque" by Chase and Lev (2005)

use std::sync::atomic::{fence, AtomicPtr, AtomicU32, AtomicU64, Ordering};

/// Chase-Lev work-stealing deque over raw `*mut T` payloads.
///
/// # Lock-free guarantees
///
/// - Owner operations (push/pop) are wait-free when no stealing occurs
/// - Stealer operations are lock-free
///
/// # Safety
///
/// Exactly one thread may act as the owner. `push` and `pop` must only be
/// called from that thread; any thread may call `steal`.
#[repr(C, align(64))]
pub(crate) struct WorkQueue<T> {
    /// Bottom index (producer end, owner only).
    bottom: AtomicU32,
    /// Padding to separate bottom and top into different cache lines.
    _pad: [u8; 64 - std::mem::size_of::<AtomicU32>()],
    /// Top index (consumer end, shared with stealers).
    top: AtomicU32,
    /// Fixed circular storage; capacity is a power of two.
    slots: Box<[AtomicPtr<T>]>,
    mask: u32,
    /// Statistics
    pushes: AtomicU64,
    pops: AtomicU64,
    steals: AtomicU64,
    failed_steals: AtomicU64,
}

impl<T> WorkQueue<T> {
    /// Create a deque with the given capacity (must be a power of two).
    pub fn new(capacity: usize) -> Self {
        assert!(capacity.is_power_of_two());
        assert!(capacity <= u32::MAX as usize / 2);

        let mut slots = Vec::with_capacity(capacity);
        for _ in 0..capacity {
            slots.push(AtomicPtr::new(std::ptr::null_mut()));
        }

        Self {
            bottom: AtomicU32::new(0),
            _pad: [0; 64 - std::mem::size_of::<AtomicU32>()],
            top: AtomicU32::new(0),
            slots: slots.into_boxed_slice(),
            mask: (capacity - 1) as u32,
            pushes: AtomicU64::new(0),
            pops: AtomicU64::new(0),
            steals: AtomicU64::new(0),
            failed_steals: AtomicU64::new(0),
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Push an item onto the bottom, returning the new depth.
    ///
    /// # Safety
    ///
    /// Only the owner thread may call this method.
    pub unsafe fn push(&self, item: *mut T) -> u32 {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);

        // Overflow is a programming error; sizing is the embedder's call.
        debug_assert!(
            bottom.wrapping_sub(top) < self.slots.len() as u32,
            "work queue overflow"
        );

        self.slots[(bottom & self.mask) as usize].store(item, Ordering::Relaxed);

        // Ensure the item is published prior to advertising it.
        fence(Ordering::Release);

        self.bottom.store(bottom.wrapping_add(1), Ordering::Relaxed);
        self.pushes.fetch_add(1, Ordering::Relaxed);

        bottom.wrapping_sub(top).wrapping_add(1)
    }

    /// Pop an item from the bottom.
    ///
    /// Returns `None` if the deque is empty or the last element was lost to
    /// a racing stealer.
    ///
    /// # Safety
    ///
    /// Only the owner thread may call this method.
    pub unsafe fn pop(&self) -> Option<*mut T> {
        let bottom = self
            .bottom
            .fetch_sub(1, Ordering::Relaxed)
            .wrapping_sub(1);

        // The decrement must be visible before top is examined, or a
        // concurrent steal could hand out the same slot.
        fence(Ordering::SeqCst);

        let top = self.top.load(Ordering::Relaxed);

        if (bottom.wrapping_sub(top) as i32) >= 0 {
            // Non-empty.
            let item = self.slots[(bottom & self.mask) as usize].load(Ordering::Relaxed);

            if top != bottom {
                // Still more than one item left in the queue.
                self.pops.fetch_add(1, Ordering::Relaxed);
                return Some(item);
            }

            // This is the last item. Potential race against stealers.
            let won = self
                .top
                .compare_exchange(
                    top,
                    top.wrapping_add(1),
                    Ordering::SeqCst,
                    Ordering::Relaxed,
                )
                .is_ok();

            self.bottom.store(top.wrapping_add(1), Ordering::Relaxed);

            if won {
                self.pops.fetch_add(1, Ordering::Relaxed);
                Some(item)
            } else {
                None
            }
        } else {
            // Empty; restore bottom.
            self.bottom.store(top, Ordering::Relaxed);
            None
        }
    }

    /// Steal an item from the top.
    ///
    /// Returns `None` if the deque is empty or the steal lost to a pop or a
    /// concurrent steal. Callers retry as they see fit.
    pub fn steal(&self) -> Option<*mut T> {
        let top = self.top.load(Ordering::Acquire);

        // The load of bottom must not be reordered before the load of top.
        fence(Ordering::SeqCst);

        let bottom = self.bottom.load(Ordering::Acquire);

        if (bottom.wrapping_sub(top) as i32) <= 0 {
            // Empty.
            return None;
        }

        let item = self.slots[(top & self.mask) as usize].load(Ordering::Relaxed);

        if self
            .top
            .compare_exchange(
                top,
                top.wrapping_add(1),
                Ordering::SeqCst,
                Ordering::Relaxed,
            )
            .is_err()
        {
            // Lost to a pop or another steal.
            self.failed_steals.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        self.steals.fetch_add(1, Ordering::Relaxed);
        Some(item)
    }

    /// Approximate depth. May change after calling.
    pub fn depth(&self) -> u32 {
        let bottom = self.bottom.load(Ordering::Relaxed);
        let top = self.top.load(Ordering::Relaxed);
        bottom.wrapping_sub(top)
    }

    /// Whether the deque appears empty. Advisory only.
    pub fn is_empty(&self) -> bool {
        self.depth() == 0
    }

    /// Get statistics
    pub fn stats(&self) -> QueueStats {
        QueueStats {
            pushes: self.pushes.load(Ordering::Relaxed),
            pops: self.pops.load(Ordering::Relaxed),
            steals: self.steals.load(Ordering::Relaxed),
            failed_steals: self.failed_steals.load(Ordering::Relaxed),
            depth: self.depth(),
        }
    }
}

// Safety: the deque hands out raw pointers it was given; synchronization of
// the pointees is the caller's concern. The deque itself is thread-safe
// under the owner/stealer discipline documented above.
unsafe impl<T> Send for WorkQueue<T> {}
unsafe impl<T> Sync for WorkQueue<T> {}

/// Statistics for a single work queue.
#[derive(Debug, Clone, Copy, Default)]
pub struct QueueStats {
    pub pushes: u64,
    pub pops: u64,
    pub steals: u64,
    pub failed_steals: u64,
    pub depth: u32,
}
