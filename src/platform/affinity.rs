// Copyright (c) 2025 Weft Contributors
//
// Thread affinity shim
//
// Each worker is pinned to one logical core so the per-worker deques keep
// their cache locality. Failure to pin is survivable and only logged.

/// Pin the calling thread to the given logical core, wrapping around the
/// machine's core count.
#[cfg(target_os = "linux")]
pub(crate) fn pin_current_thread(core: usize) {
    let core = core % num_cpus::get();

    // Safety: plain libc affinity calls on the current thread.
    unsafe {
        let mut set: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut set);
        libc::CPU_SET(core, &mut set);

        let rc = libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &set,
        );

        if rc != 0 {
            tracing::warn!(core, rc, "failed to pin worker thread");
        }
    }
}

#[cfg(windows)]
pub(crate) fn pin_current_thread(core: usize) {
    use windows_sys::Win32::System::Threading::{GetCurrentThread, SetThreadAffinityMask};

    let core = core % usize::BITS.min(num_cpus::get() as u32) as usize;

    // Safety: plain Win32 affinity call on the current thread.
    unsafe {
        if SetThreadAffinityMask(GetCurrentThread(), 1usize << core) == 0 {
            tracing::warn!(core, "failed to pin worker thread");
        }
    }
}

#[cfg(not(any(target_os = "linux", windows)))]
pub(crate) fn pin_current_thread(core: usize) {
    // No portable affinity interface on this platform.
    let _ = core;
}
