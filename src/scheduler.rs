// Copyright (c) 2025 Weft Contributors
//
// Scheduler core
//
// A single scheduler instance owns the task and permit pools, one Chase-Lev
// deque per worker slot (slot 0 belongs to the main thread), two bitmaps
// tracking which slots are online and which may hold stealable work, and the
// pair of events workers sleep on. Submission pushes to the submitting
// thread's own deque; completion walks the finished task's permit chain and
// submits whatever it unblocked; idle workers steal from a randomly rotated
// enumeration of advertised queues.

use std::cell::Cell;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::{Mutex, RwLock};

use crate::config::Options;
use crate::deque::WorkQueue;
use crate::error::{Result, SchedulerError};
use crate::platform;
use crate::platform::event::{wait_any, Event, WaitHub};
use crate::pool::{PermitPool, TaskPool};
use crate::task::{Handle, HookFn, Kernel, Permit, Task, Work, EMBEDDED_PERMITS, SCHEDULED};

/// Hard limit on worker threads.
///
/// Worker slots double as bit positions in the `online` and `work` bitmaps,
/// and those are manipulated atomically as single 64-bit words; one bit is
/// reserved for the main thread.
pub const WORKER_LIMIT: usize = 63;

/// Queue/bitmap slot owned by the main thread.
pub(crate) const MAIN_SLOT: u32 = 0;

const BITMAP_BITS: u32 = u64::BITS;

/// Steal attempts per victim before moving on, in case of contention.
const STEAL_ATTEMPTS: usize = 3;

const UNBOUND: u32 = u32::MAX;

thread_local! {
    /// Which queue submissions from this thread land on. Workers bind their
    /// slot on startup; the initializing thread binds slot 0. Losing this
    /// association would push work onto the wrong deque, so every
    /// submission path asserts it is set.
    static SLOT: Cell<u32> = Cell::new(UNBOUND);
}

pub(crate) fn bind_slot(slot: u32) {
    SLOT.with(|cell| cell.set(slot));
}

fn current_slot() -> u32 {
    let slot = SLOT.with(|cell| cell.get());
    assert!(
        slot != UNBOUND,
        "thread is not bound to the scheduler; submit from the main thread or a worker"
    );
    slot
}

fn default_hook(_task: &Task, _context: *mut ()) {}

fn resolve_hook(hook: crate::task::Hook) -> (HookFn, *mut ()) {
    match hook.callback {
        Some(callback) => (callback, hook.context),
        None => (default_hook, std::ptr::null_mut()),
    }
}

/// Map a set-bit position in a left-rotated bitmap back to the original bit
/// index.
fn unrotate(position: u32, rotation: u32) -> usize {
    ((position + BITMAP_BITS - rotation) % BITMAP_BITS) as usize
}

/// What woke a waiting worker.
pub(crate) enum Signal {
    Message,
    Work,
}

struct Manager {
    live: usize,
    handles: Vec<Option<thread::JoinHandle<()>>>,
}

/// Aggregate queue statistics, advisory only.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchedulerStats {
    pub pushes: u64,
    pub pops: u64,
    pub steals: u64,
    pub failed_steals: u64,
    pub queued: u64,
    pub workers_online: usize,
}

/// The task scheduler.
///
/// One instance per process is the intended shape; `initialize` wires one up
/// as the process-wide instance behind the module-level functions. The
/// methods are the same surface for embedders that want to hold the `Arc`
/// themselves.
pub struct Scheduler {
    this: Weak<Scheduler>,

    prologue: (HookFn, *mut ()),
    epilogue: (HookFn, *mut ()),

    /// Work queues, lazily created at worker bring-up. Index 0 is the main
    /// thread's.
    queues: Box<[OnceCell<WorkQueue<Task>>]>,
    queue_capacity: usize,
    worker_stack: usize,

    /// Bitmap of online worker slots; bit 0 (main) is always set.
    online: AtomicU64,

    /// Bitmap of slots whose queues may contain stealable work. Stale bits
    /// are tolerated in the conservative direction only.
    work: AtomicU64,

    /// Raised whenever excess work is pushed to a queue. Auto-reset: one
    /// signaled worker wakes per push, never a herd that mostly yields.
    work_to_steal: Event,

    /// Raised to broadcast shutdown requests. Manual-reset so every worker
    /// wakes and checks its flag.
    message: Event,

    tasks: TaskPool,
    permits: PermitPool,

    /// Whenever work is pushed to the main thread's queue the push also
    /// signals, since nothing guarantees the main thread will drain it.
    always_signal_on_main: bool,

    /// Held for managerial work: worker bring-up and bring-down.
    manager: Mutex<Manager>,

    /// Per-worker cooperative shutdown flags, observed at loop edges.
    shutdown_flags: Box<[AtomicBool]>,
}

// Safety: the scheduler is shared across its worker threads by design; all
// scheduling state is atomics, lock-free pools, or lock-guarded. The raw
// hook contexts are the embedder's promise: prologue/epilogue contexts must
// be safe to use from any worker thread.
unsafe impl Send for Scheduler {}
unsafe impl Sync for Scheduler {}

impl Scheduler {
    /// Construct a scheduler, bring up the configured workers, and bind the
    /// calling thread as the main thread (slot 0).
    pub fn new(options: Options) -> Result<Arc<Self>> {
        options.validate()?;

        let hub = WaitHub::new();

        let scheduler = Arc::new_cyclic(|this| Self {
            this: this.clone(),
            prologue: resolve_hook(options.prologue),
            epilogue: resolve_hook(options.epilogue),
            queues: (0..=WORKER_LIMIT).map(|_| OnceCell::new()).collect(),
            queue_capacity: options.queue,
            worker_stack: options.stack,
            online: AtomicU64::new(1 << MAIN_SLOT),
            work: AtomicU64::new(0),
            work_to_steal: Event::new(&hub, false),
            message: Event::new(&hub, true),
            tasks: TaskPool::new(options.tasks),
            permits: PermitPool::new(options.permits),
            always_signal_on_main: !options.main_thread_does_work,
            manager: Mutex::new(Manager {
                live: 0,
                handles: (0..WORKER_LIMIT).map(|_| None).collect(),
            }),
            shutdown_flags: (0..WORKER_LIMIT).map(|_| AtomicBool::new(false)).collect(),
        });

        scheduler.queues[MAIN_SLOT as usize]
            .get_or_init(|| WorkQueue::new(options.queue));
        bind_slot(MAIN_SLOT);

        let workers = resolve_worker_count(options.workers);
        tracing::debug!(
            workers,
            tasks = options.tasks,
            permits = options.permits,
            queue = options.queue,
            "initializing scheduler"
        );

        scheduler.bring_up_workers(workers)?;

        Ok(scheduler)
    }

    /// Number of worker threads currently online.
    pub fn worker_count(&self) -> usize {
        self.manager.lock().live
    }

    /// Allocate a task with no work; useful as a join point in a graph.
    pub fn empty(&self, flags: u32) -> Handle {
        let task = self.tasks.acquire();
        task.describe(Work::None, flags);
        self.tasks.handle_for(task)
    }

    /// Allocate a task that runs `kernel(data)` when scheduled.
    ///
    /// `data` must stay valid until the task completes, and whatever it
    /// points at must tolerate being touched from whichever worker picks
    /// the task up.
    pub fn describe(&self, kernel: Kernel, data: *mut (), flags: u32) -> Handle {
        let task = self.tasks.acquire();
        task.describe(Work::Cpu { kernel, data }, flags);
        self.tasks.handle_for(task)
    }

    /// Declare that `blocker` must complete before `blocked` may run.
    ///
    /// May only be called between describing `blocker` and first kicking
    /// it; `blocked` may already be kicked-pending but not yet submitted.
    /// Cycles deadlock.
    pub fn permits(&self, blocker: Handle, blocked: Handle) {
        let task = self.tasks.resolve(blocker);
        let target = self.tasks.resolve(blocked);

        let permit = self.acquire_permit(task);
        permit.set_next(std::ptr::null());
        permit.set_target(target);

        target.blockers().fetch_add(1, Ordering::Relaxed);
    }

    /// Submit a task for execution.
    pub fn kick(&self, task: Handle) {
        self.kick_n(&[task]);
    }

    /// Submit a batch of tasks for execution.
    pub fn kick_n(&self, tasks: &[Handle]) {
        for &handle in tasks {
            self.submit(self.tasks.resolve(handle));
        }
    }

    /// Submit a task and yield until it has completed.
    pub fn kick_and_wait(&self, task: Handle) {
        self.kick_and_wait_n(&[task]);
    }

    /// Submit a batch of tasks and yield until all have completed.
    pub fn kick_and_wait_n(&self, tasks: &[Handle]) {
        let outstanding = AtomicU32::new(tasks.len() as u32);

        self.kick_with_barrier(tasks, &outstanding);

        while !is_zero_yet(&outstanding) {
            thread::yield_now();
        }
    }

    /// Submit a task and help execute queued work until it has completed.
    pub fn kick_and_do_work_while_waiting(&self, task: Handle) {
        self.kick_and_do_work_while_waiting_n(&[task]);
    }

    /// Submit a batch of tasks and help execute queued work until all have
    /// completed. Main thread only.
    pub fn kick_and_do_work_while_waiting_n(&self, tasks: &[Handle]) {
        let outstanding = AtomicU32::new(tasks.len() as u32);

        self.kick_with_barrier(tasks, &outstanding);

        while !is_zero_yet(&outstanding) {
            if !self.do_some_work() {
                thread::yield_now();
            }
        }
    }

    /// Execute one queued task if any is available. Main thread only.
    ///
    /// Calling this re-entrantly from inside a kernel is unsupported.
    pub fn do_some_work(&self) -> bool {
        assert_eq!(
            current_slot(),
            MAIN_SLOT,
            "do_some_work may only be called from the main thread"
        );

        if let Some(task) = self.grab_a_task(MAIN_SLOT) {
            self.run_task(task);
            return true;
        }

        if let Some(task) = self.steal_a_task(MAIN_SLOT) {
            self.run_task(task);
            return true;
        }

        false
    }

    /// Spawn `count` additional workers.
    pub fn bring_up_workers(&self, count: usize) -> Result<()> {
        let mut manager = self.manager.lock();

        if manager.live + count > WORKER_LIMIT {
            return Err(SchedulerError::WorkerLimitExceeded(format!(
                "{} workers online, {} more requested, limit is {}",
                manager.live, count, WORKER_LIMIT
            )));
        }

        for _ in 0..count {
            let worker = manager.live;
            let slot = (worker + 1) as u32;

            // Work queues are lazily allocated and survive bring-down, so a
            // slot that cycles off and on keeps its queue.
            self.queues[slot as usize].get_or_init(|| WorkQueue::new(self.queue_capacity));

            let Some(scheduler) = self.this.upgrade() else {
                return Err(SchedulerError::NotInitialized);
            };

            let mut builder =
                thread::Builder::new().name(format!("weft-worker-{:02}", slot));
            if self.worker_stack > 0 {
                builder = builder.stack_size(self.worker_stack);
            }

            let handle = builder.spawn(move || crate::worker::worker_main(scheduler, slot))?;

            manager.handles[worker] = Some(handle);
            manager.live += 1;

            tracing::debug!(slot, "worker brought up");
        }

        Ok(())
    }

    /// Cooperatively stop the last `count` workers and join them.
    ///
    /// In-flight kernels run to completion; workers observe the request at
    /// loop edges only.
    pub fn bring_down_workers(&self, count: usize) -> Result<()> {
        let mut manager = self.manager.lock();

        if count > manager.live {
            return Err(SchedulerError::InvalidOptions(format!(
                "{} workers online, asked to bring down {}",
                manager.live, count
            )));
        }

        let keep = manager.live - count;

        for worker in keep..manager.live {
            self.shutdown_flags[worker].store(true, Ordering::SeqCst);
        }

        // Manual-reset, so every worker wakes and checks its flag.
        self.message.signal();

        for worker in (keep..manager.live).rev() {
            if let Some(handle) = manager.handles[worker].take() {
                let _ = handle.join();
            }

            // Re-arm the slot in case it is brought up again.
            self.shutdown_flags[worker].store(false, Ordering::SeqCst);

            tracing::debug!(slot = worker + 1, "worker brought down");
        }

        manager.live = keep;
        self.message.unsignal();

        Ok(())
    }

    /// Drain all outstanding work, then stop and join every worker.
    ///
    /// Must be called from the main thread. No kernel is dropped: kicked
    /// tasks all complete before this returns.
    pub fn shutdown(&self) {
        tracing::debug!("scheduler shutting down");

        while self.work.load(Ordering::SeqCst) != 0 {
            if !self.do_some_work() {
                if self.queue(MAIN_SLOT).is_empty() {
                    // Nothing of ours left; the advisory bit may be stale.
                    self.work
                        .fetch_and(!(1u64 << MAIN_SLOT), Ordering::SeqCst);
                }
                thread::yield_now();
            }
        }

        let live = self.manager.lock().live;
        if live > 0 {
            let _ = self.bring_down_workers(live);
        }

        tracing::debug!("scheduler shut down");
    }

    /// Aggregate advisory statistics across all queues.
    pub fn stats(&self) -> SchedulerStats {
        let mut totals = SchedulerStats::default();

        for queue in self.queues.iter().filter_map(|slot| slot.get()) {
            let stats = queue.stats();
            totals.pushes += stats.pushes;
            totals.pops += stats.pops;
            totals.steals += stats.steals;
            totals.failed_steals += stats.failed_steals;
            totals.queued += stats.depth as u64;
        }

        totals.workers_online =
            self.online.load(Ordering::SeqCst).count_ones() as usize - 1;

        totals
    }

    // ------------------------------------------------------------------
    // Submission and completion
    // ------------------------------------------------------------------

    /// Submit a task to the calling thread's queue, unless it still has
    /// outstanding blockers.
    ///
    /// The `blockers` latch makes submission exactly-once: the winning path
    /// (a kick seeing no blockers, or the final predecessor's
    /// decrement-to-zero) swings it from zero to the sentinel and pushes;
    /// every other call is a no-op.
    pub(crate) fn submit(&self, task: &Task) {
        if task
            .blockers()
            .compare_exchange(0, SCHEDULED, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Can't schedule yet; the last predecessor to complete will.
            return;
        }

        let slot = current_slot();
        let queue = self.queue(slot);

        // Safety: the slot binding makes this thread the queue's owner.
        let depth = unsafe { queue.push(task as *const Task as *mut Task) };

        if depth > 1 {
            // More queued than we can run ourselves; wake a thief.
            self.advertise(slot);
        } else if slot == MAIN_SLOT && self.always_signal_on_main {
            // No guarantee the main thread will drain its own queue.
            self.advertise(slot);
        }
    }

    /// Mark `slot`'s queue as holding stealable work and wake one worker.
    pub(crate) fn advertise(&self, slot: u32) {
        self.work.fetch_or(1u64 << slot, Ordering::SeqCst);
        self.work_to_steal.signal();
    }

    pub(crate) fn clear_work_bit(&self, slot: u32) {
        self.work.fetch_and(!(1u64 << slot), Ordering::SeqCst);
    }

    /// Pop a task from `slot`'s own queue.
    pub(crate) fn grab_a_task(&self, slot: u32) -> Option<*mut Task> {
        let queue = self.queue(slot);

        while !queue.is_empty() {
            // Safety: callers only pass their own bound slot.
            if let Some(task) = unsafe { queue.pop() } {
                return Some(task);
            }
        }

        None
    }

    /// Try to steal a task from any other queue advertising work.
    ///
    /// Enumerating victims low-to-high would starve high slots, so each
    /// pass rotates the snapshot by a random amount and walks the rotated
    /// word instead.
    pub(crate) fn steal_a_task(&self, slot: u32) -> Option<*mut Task> {
        loop {
            // Races are fine: a newly onlined worker picks up its own work.
            let online = self.online.load(Ordering::SeqCst);
            let offline = !online;

            let victims = self.work.load(Ordering::SeqCst) & !(1u64 << slot);
            if victims == 0 {
                // No work to steal.
                return None;
            }

            let rotation = fastrand::u32(0..BITMAP_BITS);
            let mut rotated = victims.rotate_left(rotation);

            while rotated != 0 {
                let victim = unrotate(rotated.trailing_zeros(), rotation);

                match self.queues[victim].get() {
                    Some(queue) => {
                        for _ in 0..STEAL_ATTEMPTS {
                            if let Some(task) = queue.steal() {
                                return Some(task);
                            }
                        }

                        // Nobody refills an offline worker's queue (or the
                        // main queue, unless the main thread is draining),
                        // so once observed empty it can stop advertising.
                        let draining =
                            (offline & (1u64 << victim)) != 0 || victim == MAIN_SLOT as usize;
                        if draining && queue.is_empty() {
                            self.clear_work_bit(victim as u32);
                        }
                    }
                    None => self.clear_work_bit(victim as u32),
                }

                rotated &= rotated - 1;
            }
        }
    }

    /// Execute a task: prologue, kernel, epilogue, then resolve its permits,
    /// count it off any barrier, and recycle the slot.
    pub(crate) fn run_task(&self, task: *mut Task) {
        // Safety: the pointer came off a work queue and names a live pooled
        // task that no other thread will touch until its permits resolve.
        let task = unsafe { &*task };

        (self.prologue.0)(task, self.prologue.1);

        match task.work() {
            Work::None => {}
            Work::Cpu { kernel, data } => kernel(data),
        }

        (self.epilogue.0)(task, self.epilogue.1);

        self.unblock_permitted(task);

        let barrier = task.barrier();
        if !barrier.is_null() {
            // Safety: the barrier lives in a waiter's frame, which cannot
            // unwind until this very decrement (or a later one) hits zero.
            unsafe { &*barrier }.fetch_sub(1, Ordering::AcqRel);
        }

        self.tasks.release(task);
    }

    /// Walk a completed task's permit chain, unblocking successors and
    /// returning overflow nodes to the pool.
    fn unblock_permitted(&self, task: &Task) {
        // Tasks are not modified by other threads once scheduled, so the
        // relaxed read of the wired-edge count is race-free.
        if task.blocks().load(Ordering::Relaxed) == 0 {
            return;
        }

        let mut cursor = task.embedded_permit(0) as *const Permit;

        while !cursor.is_null() {
            // Safety: the chain is owned by this completing task.
            let permit = unsafe { &*cursor };
            let target = unsafe { &*permit.target() };

            if target.blockers().fetch_sub(1, Ordering::AcqRel) == 1 {
                // That was the last blocker; submit to this worker's queue.
                self.submit(target);
            }

            let next = permit.next();
            self.permits.release(permit);
            cursor = next;
        }
    }

    /// Acquire the next permit cell for a task being wired: embedded cells
    /// first, then overflow nodes chained off the last embedded cell.
    fn acquire_permit<'a>(&'a self, task: &'a Task) -> &'a Permit {
        let wired = task.blocks().fetch_add(1, Ordering::Relaxed) as usize;

        if wired < EMBEDDED_PERMITS {
            let cell = task.embedded_permit(wired);
            if wired > 0 {
                task.embedded_permit(wired - 1).set_next(cell);
            }
            cell
        } else {
            let mut tail = task.embedded_permit(EMBEDDED_PERMITS - 1) as *const Permit;

            // Safety: wiring happens on one thread, before the task is
            // kicked, so the chain cannot change under us.
            unsafe {
                while !(*tail).next().is_null() {
                    tail = (*tail).next();
                }
            }

            let node = self.permits.acquire();
            // Safety: `tail` is the live end of the chain walked above.
            unsafe { (*tail).set_next(node) };
            node
        }
    }

    fn kick_with_barrier(&self, tasks: &[Handle], barrier: &AtomicU32) {
        for &handle in tasks {
            self.tasks.resolve(handle).set_barrier(barrier);
        }

        for &handle in tasks {
            self.submit(self.tasks.resolve(handle));
        }
    }

    // ------------------------------------------------------------------
    // Worker support
    // ------------------------------------------------------------------

    pub(crate) fn queue(&self, slot: u32) -> &WorkQueue<Task> {
        match self.queues[slot as usize].get() {
            Some(queue) => queue,
            None => panic!("no work queue for slot {slot}"),
        }
    }

    pub(crate) fn set_online(&self, slot: u32) {
        self.online.fetch_or(1u64 << slot, Ordering::SeqCst);
    }

    pub(crate) fn set_offline(&self, slot: u32) {
        self.online.fetch_and(!(1u64 << slot), Ordering::SeqCst);
    }

    pub(crate) fn shutdown_requested(&self, slot: u32) -> bool {
        self.shutdown_flags[slot as usize - 1].load(Ordering::SeqCst)
    }

    /// Park until there is work to steal or a message to handle.
    pub(crate) fn wait_for_signal(&self) -> Signal {
        match wait_any(&[&self.message, &self.work_to_steal], None) {
            Some(0) => Signal::Message,
            _ => Signal::Work,
        }
    }
}

fn resolve_worker_count(hint: i32) -> usize {
    let cores = platform::logical_cores() as i64;

    let wanted = if hint < 0 {
        cores + hint as i64
    } else {
        hint as i64
    };

    wanted.clamp(0, WORKER_LIMIT as i64) as usize
}

/// A strong read of the barrier counter, so waiters never miss the final
/// decrement.
fn is_zero_yet(barrier: &AtomicU32) -> bool {
    barrier.load(Ordering::SeqCst) == 0
}

// ----------------------------------------------------------------------
// Process-wide instance
// ----------------------------------------------------------------------

static INSTANCE: Lazy<RwLock<Option<Arc<Scheduler>>>> = Lazy::new(|| RwLock::new(None));

fn instance() -> Arc<Scheduler> {
    match INSTANCE.read().as_ref() {
        Some(scheduler) => Arc::clone(scheduler),
        None => panic!("scheduler is not initialized"),
    }
}

/// Initialize the process-wide scheduler. The calling thread becomes the
/// main thread.
pub fn initialize(options: Options) -> Result<()> {
    let mut guard = INSTANCE.write();

    if guard.is_some() {
        return Err(SchedulerError::AlreadyInitialized);
    }

    *guard = Some(Scheduler::new(options)?);
    Ok(())
}

/// Drain outstanding work, stop every worker, and tear the process-wide
/// scheduler down. Must be called from the main thread.
pub fn shutdown() -> Result<()> {
    let scheduler = INSTANCE
        .write()
        .take()
        .ok_or(SchedulerError::NotInitialized)?;

    scheduler.shutdown();
    Ok(())
}

/// See [`Scheduler::bring_up_workers`].
pub fn bring_up_workers(count: usize) -> Result<()> {
    instance().bring_up_workers(count)
}

/// See [`Scheduler::bring_down_workers`].
pub fn bring_down_workers(count: usize) -> Result<()> {
    instance().bring_down_workers(count)
}

/// See [`Scheduler::empty`].
pub fn empty(flags: u32) -> Handle {
    instance().empty(flags)
}

/// See [`Scheduler::describe`].
pub fn describe(kernel: Kernel, data: *mut (), flags: u32) -> Handle {
    instance().describe(kernel, data, flags)
}

/// See [`Scheduler::permits`].
pub fn permits(blocker: Handle, blocked: Handle) {
    instance().permits(blocker, blocked)
}

/// See [`Scheduler::kick`].
pub fn kick(task: Handle) {
    instance().kick(task)
}

/// See [`Scheduler::kick_n`].
pub fn kick_n(tasks: &[Handle]) {
    instance().kick_n(tasks)
}

/// See [`Scheduler::kick_and_wait`].
pub fn kick_and_wait(task: Handle) {
    instance().kick_and_wait(task)
}

/// See [`Scheduler::kick_and_wait_n`].
pub fn kick_and_wait_n(tasks: &[Handle]) {
    instance().kick_and_wait_n(tasks)
}

/// See [`Scheduler::kick_and_do_work_while_waiting`].
pub fn kick_and_do_work_while_waiting(task: Handle) {
    instance().kick_and_do_work_while_waiting(task)
}

/// See [`Scheduler::kick_and_do_work_while_waiting_n`].
pub fn kick_and_do_work_while_waiting_n(tasks: &[Handle]) {
    instance().kick_and_do_work_while_waiting_n(tasks)
}

/// See [`Scheduler::do_some_work`].
pub fn do_some_work() -> bool {
    instance().do_some_work()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn solo_options() -> Options {
        Options {
            workers: 0,
            main_thread_does_work: true,
            tasks: 32,
            permits: 8,
            queue: 16,
            ..Options::default()
        }
    }

    fn bump(data: *mut ()) {
        // Safety: tests pass a pointer to a live AtomicUsize.
        let counter = unsafe { &*(data as *const AtomicUsize) };
        counter.fetch_add(1, Ordering::SeqCst);
    }

    #[test]
    fn test_unrotate_inverts_rotation() {
        for bit in 0..64u32 {
            for rotation in [0u32, 1, 17, 31, 63] {
                let word = (1u64 << bit).rotate_left(rotation);
                assert_eq!(unrotate(word.trailing_zeros(), rotation), bit as usize);
            }
        }
    }

    #[test]
    fn test_worker_count_resolution() {
        let cores = platform::logical_cores();

        assert_eq!(resolve_worker_count(0), 0);
        assert_eq!(resolve_worker_count(4), 4);
        assert_eq!(resolve_worker_count(10_000), WORKER_LIMIT);
        assert_eq!(resolve_worker_count(-1), cores.saturating_sub(1).min(WORKER_LIMIT));
        assert_eq!(resolve_worker_count(-(cores as i32) - 5), 0);
    }

    #[test]
    fn test_main_thread_drains_without_workers() {
        let scheduler = Scheduler::new(solo_options()).unwrap();

        let ran = AtomicUsize::new(0);
        let task = scheduler.describe(bump, &ran as *const _ as *mut (), 0);

        scheduler.kick_and_do_work_while_waiting(task);
        assert_eq!(ran.load(Ordering::SeqCst), 1);

        scheduler.shutdown();
    }

    #[test]
    fn test_dormant_kick_is_idempotent() {
        let scheduler = Scheduler::new(solo_options()).unwrap();

        let ran = AtomicUsize::new(0);
        let first = scheduler.describe(bump, &ran as *const _ as *mut (), 0);
        let second = scheduler.describe(bump, &ran as *const _ as *mut (), 0);
        scheduler.permits(first, second);

        // A dormant task can be kicked any number of times without ever
        // touching a queue.
        scheduler.kick(second);
        scheduler.kick(second);
        scheduler.kick(second);
        assert_eq!(scheduler.queue(MAIN_SLOT).depth(), 0);
        assert!(!scheduler.do_some_work());

        scheduler.kick(first);
        while scheduler.do_some_work() {}

        assert_eq!(ran.load(Ordering::SeqCst), 2);

        scheduler.shutdown();
    }

    #[test]
    fn test_empty_task_counts_off_barrier() {
        let scheduler = Scheduler::new(solo_options()).unwrap();

        let join = scheduler.empty(0);
        scheduler.kick_and_do_work_while_waiting(join);

        scheduler.shutdown();
    }

    #[test]
    fn test_permit_chain_spills_into_pool() {
        let scheduler = Scheduler::new(solo_options()).unwrap();

        let ran = AtomicUsize::new(0);
        let root = scheduler.describe(bump, &ran as *const _ as *mut (), 0);

        let mut successors = vec![];
        for _ in 0..EMBEDDED_PERMITS + 3 {
            let successor = scheduler.describe(bump, &ran as *const _ as *mut (), 0);
            scheduler.permits(root, successor);
            successors.push(successor);
        }

        scheduler.kick_n(&successors);
        scheduler.kick(root);
        while scheduler.do_some_work() {}

        assert_eq!(ran.load(Ordering::SeqCst), EMBEDDED_PERMITS + 4);

        scheduler.shutdown();
    }
}
