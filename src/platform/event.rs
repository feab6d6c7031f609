// Copyright (c) 2025 Weft Contributors
//
// Waitable events
//
// Manual-reset and auto-reset events in the Windows style: signal, unsignal,
// timed wait, and wait-on-any. Events that must be waited on together are
// created against a shared hub (one mutex and condvar), which is what makes
// wait-on-any possible without polling: waiters re-check every event under
// the hub lock and go back to sleep on false wakes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Shared parking spot for a group of events.
pub(crate) struct WaitHub {
    lock: Mutex<()>,
    cond: Condvar,
}

impl WaitHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            lock: Mutex::new(()),
            cond: Condvar::new(),
        })
    }
}

/// A waitable event flag.
pub(crate) struct Event {
    hub: Arc<WaitHub>,
    manual: bool,
    signaled: AtomicBool,
}

impl Event {
    /// Create an event parked on `hub`. `manual` selects manual-reset
    /// semantics; otherwise a successful wait consumes the signal.
    pub fn new(hub: &Arc<WaitHub>, manual: bool) -> Event {
        Event {
            hub: Arc::clone(hub),
            manual,
            signaled: AtomicBool::new(false),
        }
    }

    /// Raise the event, waking every thread parked on the hub so each can
    /// re-check what it is waiting for. For an auto-reset event exactly one
    /// of them will consume the signal.
    pub fn signal(&self) {
        let _guard = self.hub.lock.lock();
        self.signaled.store(true, Ordering::SeqCst);
        self.hub.cond.notify_all();
    }

    /// Lower a manual-reset event.
    pub fn unsignal(&self) {
        let _guard = self.hub.lock.lock();
        self.signaled.store(false, Ordering::SeqCst);
    }

    /// Consume the signal if raised. Called with the hub lock held.
    fn try_consume(&self) -> bool {
        if self.manual {
            self.signaled.load(Ordering::SeqCst)
        } else {
            self.signaled
                .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
        }
    }

    /// Wait for this event alone. Returns false on timeout.
    pub fn wait(&self, timeout: Option<Duration>) -> bool {
        wait_any(&[self], timeout).is_some()
    }
}

/// Block until one of `events` is signaled, returning its index, or `None`
/// on timeout. All events must share a hub.
pub(crate) fn wait_any(events: &[&Event], timeout: Option<Duration>) -> Option<usize> {
    let hub = &events[0].hub;
    debug_assert!(events.iter().all(|event| Arc::ptr_eq(&event.hub, hub)));

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut guard = hub.lock.lock();

    loop {
        for (index, event) in events.iter().enumerate() {
            if event.try_consume() {
                return Some(index);
            }
        }

        match deadline {
            None => hub.cond.wait(&mut guard),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline
                    || hub.cond.wait_for(&mut guard, deadline - now).timed_out()
                {
                    // One last check so a signal racing the timeout wins.
                    return events.iter().position(|event| event.try_consume());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_wait_returns_false_on_timeout() {
        let hub = WaitHub::new();
        let event = Event::new(&hub, false);
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_signal_before_wait_is_not_lost() {
        let hub = WaitHub::new();
        let event = Event::new(&hub, false);

        event.signal();
        assert!(event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_auto_reset_consumes_signal() {
        let hub = WaitHub::new();
        let event = Event::new(&hub, false);

        event.signal();
        assert!(event.wait(Some(Duration::from_millis(10))));
        // Consumed by the first wait.
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_manual_reset_stays_signaled_until_unsignal() {
        let hub = WaitHub::new();
        let event = Event::new(&hub, true);

        event.signal();
        assert!(event.wait(Some(Duration::from_millis(10))));
        assert!(event.wait(Some(Duration::from_millis(10))));

        event.unsignal();
        assert!(!event.wait(Some(Duration::from_millis(10))));
    }

    #[test]
    fn test_wait_any_reports_the_signaled_event() {
        let hub = WaitHub::new();
        let first = Event::new(&hub, false);
        let second = Event::new(&hub, false);

        second.signal();
        assert_eq!(wait_any(&[&first, &second], None), Some(1));
    }

    #[test]
    fn test_cross_thread_wakeup() {
        let hub = WaitHub::new();
        let event = Arc::new(Event::new(&hub, false));

        let signaler = {
            let event = Arc::clone(&event);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                event.signal();
            })
        };

        assert!(event.wait(Some(Duration::from_secs(5))));
        signaler.join().unwrap();
    }

    #[test]
    fn test_auto_reset_wakes_exactly_one_waiter_per_signal() {
        let hub = WaitHub::new();
        let event = Arc::new(Event::new(&hub, false));

        let mut waiters = vec![];
        for _ in 0..4 {
            let event = Arc::clone(&event);
            waiters.push(thread::spawn(move || {
                event.wait(Some(Duration::from_millis(200)))
            }));
        }

        // Give the waiters time to park, then fire twice.
        thread::sleep(Duration::from_millis(50));
        event.signal();
        thread::sleep(Duration::from_millis(10));
        event.signal();

        let woken = waiters
            .into_iter()
            .map(|waiter| waiter.join().unwrap())
            .filter(|&was_signaled| was_signaled)
            .count();

        assert_eq!(woken, 2);
    }
}
