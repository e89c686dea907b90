//! Worker Loop
//!
//! Body of every pool thread: take the oldest task, run it outside the lock,
//! and retire after sitting idle while the pool is above its low watermark.

use std::panic::{self, AssertUnwindSafe};

use parking_lot::MutexGuard;
use tracing::{debug, error};

use super::pool::{PoolState, Shared, Task};

pub(super) fn run(shared: &Shared, worker_id: usize) {
    debug!(worker_id, "worker started");
    let mut inner = shared.inner.lock();

    loop {
        if inner.lifecycle == PoolState::Stopped {
            break;
        }

        if let Some(task) = inner.queue.pop_front() {
            let completed = MutexGuard::unlocked(&mut inner, || run_task(task, worker_id));
            if completed {
                inner.completed_tasks += 1;
            } else {
                inner.panicked_tasks += 1;
            }
            continue;
        }

        // Queue is drained
        if inner.lifecycle == PoolState::Stopping {
            break;
        }

        inner.idle_workers += 1;
        let timed_out = shared
            .task_available
            .wait_for(&mut inner, shared.config.idle_timeout)
            .timed_out();
        inner.idle_workers -= 1;

        if timed_out
            && inner.queue.is_empty()
            && inner.lifecycle == PoolState::Running
            && inner.live_workers > shared.config.low_watermark
        {
            debug!(worker_id, "idle worker retiring");
            break;
        }
    }

    shared.worker_exited(&mut inner);
    debug!(worker_id, live_workers = inner.live_workers, "worker exited");
}

/// Runs one task, returning false if it panicked.
fn run_task(task: Task, worker_id: usize) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(()) => true,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .copied()
                .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                .unwrap_or("non-string panic payload");
            error!(worker_id, panic = message, "task panicked");
            false
        }
    }
}
