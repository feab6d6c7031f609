// Weft - fixed-size, lock-free, work-stealing task scheduler
// Core library module

pub mod config;
pub mod error;
pub mod scheduler;
pub mod task;

mod deque;
mod freelist;
mod platform;
mod pool;
mod worker;

pub use config::Options;
pub use error::{Result, SchedulerError};
pub use scheduler::{
    bring_down_workers, bring_up_workers, describe, do_some_work, empty, initialize, kick,
    kick_and_do_work_while_waiting, kick_and_do_work_while_waiting_n, kick_and_wait,
    kick_and_wait_n, kick_n, permits, shutdown, Scheduler, SchedulerStats, WORKER_LIMIT,
};
pub use task::{Handle, Hook, HookFn, Kernel, Task, Work, EMBEDDED_PERMITS};
