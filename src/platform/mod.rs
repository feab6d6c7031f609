// Copyright (c) 2025 Weft Contributors
//
// OS-facing shims: waitable events, thread affinity, topology.

mod affinity;
pub(crate) mod event;

pub(crate) use affinity::pin_current_thread;

/// Number of logical cores, used to resolve negative worker-count hints.
pub(crate) fn logical_cores() -> usize {
    num_cpus::get()
}
