//! Executor Pool Module
//!
//! Supervisor side of the thread pool: configuration, shared state,
//! task submission, burst scaling and shutdown.

use std::collections::VecDeque;
use std::mem;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::worker;
use crate::error::{ConfigError, ExecutorError};

/// A unit of work; runs exactly once or is dropped unexecuted.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

// == Executor Config ==
/// Sizing and timing for an [`Executor`].
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Thread name prefix; workers are named `{name}-{id}`
    pub name: String,
    /// Workers kept alive while idle
    pub low_watermark: usize,
    /// Upper bound on live workers
    pub high_watermark: usize,
    /// Pending tasks accepted before `execute` rejects
    pub max_queue_size: usize,
    /// How long a worker waits on an empty queue before it may retire
    pub idle_timeout: Duration,
}

impl ExecutorConfig {
    /// Checks the watermark and queue bounds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.high_watermark == 0 || self.low_watermark > self.high_watermark {
            return Err(ConfigError::InvalidWatermarks {
                low: self.low_watermark,
                high: self.high_watermark,
            });
        }
        if self.max_queue_size == 0 {
            return Err(ConfigError::ZeroQueue);
        }
        Ok(())
    }
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            name: "worker".to_string(),
            low_watermark: 2,
            high_watermark: 8,
            max_queue_size: 256,
            idle_timeout: Duration::from_secs(5),
        }
    }
}

// == Pool State ==
/// Lifecycle of the pool. Only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolState {
    Running,
    Stopping,
    Stopped,
}

// == Executor Stats ==
/// Point-in-time view of the pool.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutorStats {
    pub state: PoolState,
    pub live_workers: usize,
    pub idle_workers: usize,
    pub queued_tasks: usize,
    pub completed_tasks: u64,
    pub panicked_tasks: u64,
    pub rejected_tasks: u64,
}

/// Everything the workers and the supervisor share, guarded by one mutex.
pub(super) struct PoolInner {
    pub(super) lifecycle: PoolState,
    pub(super) queue: VecDeque<Task>,
    pub(super) live_workers: usize,
    pub(super) idle_workers: usize,
    pub(super) completed_tasks: u64,
    pub(super) panicked_tasks: u64,
    pub(super) rejected_tasks: u64,
    next_worker_id: usize,
}

pub(super) struct Shared {
    pub(super) config: ExecutorConfig,
    pub(super) inner: Mutex<PoolInner>,
    /// Signalled on enqueue and on stop
    pub(super) task_available: Condvar,
    /// Signalled when the last worker exits a stopping pool
    pub(super) all_exited: Condvar,
}

impl Shared {
    /// Books a new worker. Must be followed by a spawn or `worker_exited`.
    fn reserve_worker(&self, inner: &mut PoolInner) -> usize {
        inner.live_workers += 1;
        inner.next_worker_id += 1;
        inner.next_worker_id
    }

    /// Drops a worker from the live count, finishing shutdown if it was the last.
    pub(super) fn worker_exited(&self, inner: &mut PoolInner) {
        inner.live_workers -= 1;
        if inner.live_workers == 0 && inner.lifecycle != PoolState::Running {
            inner.lifecycle = PoolState::Stopped;
            self.all_exited.notify_all();
        }
    }
}

// == Executor ==
/// Thread pool with watermark scaling and idle shrinkage.
///
/// Starts `low_watermark` workers. `execute` adds a worker (up to
/// `high_watermark`) whenever the queue is non-empty after the push, and a
/// worker that has been idle for `idle_timeout` retires while more than
/// `low_watermark` are alive. Tasks are dequeued in submission order and run
/// outside the lock, so several may run at once.
///
/// Dropping the executor performs `stop(true)`.
pub struct Executor {
    shared: Arc<Shared>,
    /// Join handles of every worker started; finished ones are pruned on spawn
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Executor {
    // == Constructor ==
    /// Validates `config` and starts `low_watermark` workers.
    pub fn new(config: ExecutorConfig) -> Result<Self, ExecutorError> {
        config.validate()?;

        let low_watermark = config.low_watermark;
        let executor = Self {
            shared: Arc::new(Shared {
                config,
                inner: Mutex::new(PoolInner {
                    lifecycle: PoolState::Running,
                    queue: VecDeque::new(),
                    live_workers: 0,
                    idle_workers: 0,
                    completed_tasks: 0,
                    panicked_tasks: 0,
                    rejected_tasks: 0,
                    next_worker_id: 0,
                }),
                task_available: Condvar::new(),
                all_exited: Condvar::new(),
            }),
            handles: Mutex::new(Vec::with_capacity(low_watermark)),
        };

        for _ in 0..low_watermark {
            let worker_id = executor.shared.reserve_worker(&mut executor.shared.inner.lock());
            // On failure the executor is dropped here, which stops the workers already started
            executor.start_worker(worker_id)?;
        }

        info!(
            name = %executor.shared.config.name,
            low_watermark,
            high_watermark = executor.shared.config.high_watermark,
            max_queue_size = executor.shared.config.max_queue_size,
            "executor started"
        );
        Ok(executor)
    }

    // == Execute ==
    /// Queues `task` for execution.
    ///
    /// # Errors
    /// - `PoolNotAccepting` once `stop` has been called
    /// - `QueueOverflow` if `max_queue_size` tasks are already pending
    ///
    /// A rejected task is dropped without running.
    pub fn execute<F>(&self, task: F) -> Result<(), ExecutorError>
    where
        F: FnOnce() + Send + 'static,
    {
        let config = &self.shared.config;
        let burst_worker = {
            let mut inner = self.shared.inner.lock();

            if inner.lifecycle != PoolState::Running {
                inner.rejected_tasks += 1;
                return Err(ExecutorError::PoolNotAccepting);
            }
            if inner.queue.len() >= config.max_queue_size {
                inner.rejected_tasks += 1;
                warn!(
                    max_queue_size = config.max_queue_size,
                    "task queue full, rejecting task"
                );
                return Err(ExecutorError::QueueOverflow {
                    max_queue_size: config.max_queue_size,
                });
            }

            inner.queue.push_back(Box::new(task));
            self.shared.task_available.notify_one();

            if !inner.queue.is_empty() && inner.live_workers < config.high_watermark {
                Some(self.shared.reserve_worker(&mut inner))
            } else {
                None
            }
        };

        if let Some(worker_id) = burst_worker {
            debug!(worker_id, "adding worker for burst");
            // The task is already queued; an existing or later worker will pick it up
            if let Err(err) = self.start_worker(worker_id) {
                warn!(error = %err, "failed to add burst worker");
            }
        }
        Ok(())
    }

    // == Stop ==
    /// Stops accepting tasks.
    ///
    /// With `await_workers == false` the pool is marked `Stopped` at once and
    /// queued tasks are dropped; tasks already running finish on their own.
    /// With `await_workers == true` the pool drains the queue and this call
    /// blocks until every worker has exited.
    pub fn stop(&self, await_workers: bool) {
        let abandoned = {
            let mut inner = self.shared.inner.lock();

            if !await_workers {
                inner.lifecycle = PoolState::Stopped;
            } else if inner.lifecycle == PoolState::Running {
                inner.lifecycle = PoolState::Stopping;
            }
            if inner.live_workers == 0 && inner.lifecycle != PoolState::Stopped {
                inner.lifecycle = PoolState::Stopped;
                self.shared.all_exited.notify_all();
            }
            self.shared.task_available.notify_all();

            if inner.lifecycle == PoolState::Stopped {
                mem::take(&mut inner.queue)
            } else {
                VecDeque::new()
            }
        };

        info!(
            name = %self.shared.config.name,
            await_workers,
            abandoned = abandoned.len(),
            "executor stopping"
        );
        drop(abandoned);

        if await_workers {
            self.join();
        }
    }

    // == Join ==
    /// Blocks until the pool is stopped and every worker has exited, then
    /// joins the worker threads.
    ///
    /// Never returns for a pool nobody stops. Must not be called from a task.
    pub fn join(&self) {
        {
            let mut inner = self.shared.inner.lock();
            while inner.lifecycle != PoolState::Stopped || inner.live_workers > 0 {
                self.shared.all_exited.wait(&mut inner);
            }
        }

        let handles = mem::take(&mut *self.handles.lock());
        for handle in handles {
            if handle.join().is_err() {
                error!("worker thread panicked outside a task");
            }
        }
    }

    // == Stats ==
    pub fn stats(&self) -> ExecutorStats {
        let inner = self.shared.inner.lock();
        ExecutorStats {
            state: inner.lifecycle,
            live_workers: inner.live_workers,
            idle_workers: inner.idle_workers,
            queued_tasks: inner.queue.len(),
            completed_tasks: inner.completed_tasks,
            panicked_tasks: inner.panicked_tasks,
            rejected_tasks: inner.rejected_tasks,
        }
    }

    pub fn state(&self) -> PoolState {
        self.shared.inner.lock().lifecycle
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.shared.config
    }

    /// Spawns the thread for a worker already counted by `reserve_worker`.
    fn start_worker(&self, worker_id: usize) -> Result<(), ExecutorError> {
        let shared = Arc::clone(&self.shared);
        let spawned = thread::Builder::new()
            .name(format!("{}-{}", self.shared.config.name, worker_id))
            .spawn(move || worker::run(&shared, worker_id));

        match spawned {
            Ok(handle) => {
                let mut handles = self.handles.lock();
                handles.retain(|h| !h.is_finished());
                handles.push(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.worker_exited(&mut self.shared.inner.lock());
                Err(ExecutorError::Spawn(err))
            }
        }
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        self.stop(true);
    }
}
