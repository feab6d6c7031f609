// Copyright (c) 2025 Weft Contributors
//
// Scheduler configuration

use crate::error::{Result, SchedulerError};
use crate::task::Hook;

/// Scheduler configuration
///
/// All capacities are fixed at initialization; the scheduler never allocates
/// once it is running, so these numbers must cover the embedder's peak load.
#[derive(Clone, Copy)]
pub struct Options {
    /// Number of worker threads to spawn. Negative values mean "one per
    /// logical core, minus that many": `-1` on an 8-core machine spawns 7.
    /// Clamped to the bitmap-imposed worker limit.
    pub workers: i32,

    /// Indicates that the main thread will routinely call `do_some_work` or
    /// one of the working waits. When false, every main-thread submission
    /// also wakes a worker, since nothing else would drain that queue.
    pub main_thread_does_work: bool,

    /// Callback invoked before every kernel.
    pub prologue: Hook,

    /// Callback invoked after every kernel.
    pub epilogue: Hook,

    /// Task pool capacity.
    pub tasks: usize,

    /// Overflow permit pool capacity.
    pub permits: usize,

    /// Per-worker deque capacity; must be a power of two.
    pub queue: usize,

    /// Worker thread stack size in bytes; zero means the platform default.
    pub stack: usize,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            workers: -1,
            main_thread_does_work: false,
            prologue: Hook::NONE,
            epilogue: Hook::NONE,
            tasks: 4096,
            permits: 4096,
            queue: 1024,
            stack: 0,
        }
    }
}

impl Options {
    pub(crate) fn validate(&self) -> Result<()> {
        if self.tasks == 0 {
            return Err(SchedulerError::InvalidOptions(
                "task pool capacity must be non-zero".into(),
            ));
        }

        if self.queue < 2 || !self.queue.is_power_of_two() {
            return Err(SchedulerError::InvalidOptions(format!(
                "queue capacity must be a power of two >= 2, got {}",
                self.queue
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options_are_valid() {
        assert!(Options::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_tasks() {
        let options = Options {
            tasks: 0,
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_rejects_non_power_of_two_queue() {
        let options = Options {
            queue: 768,
            ..Options::default()
        };
        assert!(options.validate().is_err());

        let options = Options {
            queue: 1,
            ..Options::default()
        };
        assert!(options.validate().is_err());
    }
}
