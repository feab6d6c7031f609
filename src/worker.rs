// Copyright (c) 2025 Weft Contributors
//
// Worker thread loop
//
// Each worker binds one queue slot for its lifetime and cycles through
// three states: draining its own queue LIFO, stealing FIFO from queues
// advertising work, and sleeping on the scheduler's events. Shutdown is
// cooperative; the flag is only observed between tasks.

use std::sync::Arc;

use crate::platform;
use crate::scheduler::{bind_slot, Scheduler, Signal};

enum State {
    /// Parked on the work/message events.
    Waiting,
    /// Draining the worker's own queue.
    WorkInQueue,
    /// Taking work from other queues.
    Stealing,
}

pub(crate) fn worker_main(scheduler: Arc<Scheduler>, slot: u32) {
    bind_slot(slot);
    platform::pin_current_thread(slot as usize - 1);

    scheduler.set_online(slot);
    tracing::trace!(slot, "worker online");

    let mut state = State::Waiting;

    loop {
        if scheduler.shutdown_requested(slot) {
            break;
        }

        state = match state {
            State::Waiting => match scheduler.wait_for_signal() {
                // Either a shutdown request (caught at the top of the
                // loop) or a false wake-up; park again.
                Signal::Message => State::Waiting,
                Signal::Work => State::Stealing,
            },

            State::WorkInQueue => {
                if let Some(task) = scheduler.grab_a_task(slot) {
                    scheduler.run_task(task);
                    State::WorkInQueue
                } else {
                    // Nothing left of our own to advertise.
                    scheduler.clear_work_bit(slot);
                    State::Stealing
                }
            }

            State::Stealing => {
                if let Some(task) = scheduler.steal_a_task(slot) {
                    scheduler.run_task(task);
                    State::Stealing
                } else if !scheduler.queue(slot).is_empty() {
                    // Work landed in our queue while we were out stealing.
                    State::WorkInQueue
                } else {
                    State::Waiting
                }
            }
        };
    }

    scheduler.set_offline(slot);

    // Let another worker drain our queue, or take over stealing work.
    scheduler.advertise(slot);

    tracing::trace!(slot, "worker offline");
}
