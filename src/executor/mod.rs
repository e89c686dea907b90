//! Executor Module
//!
//! A thread pool that runs submitted closures on OS threads.
//!
//! # Scaling
//! - Starts with `low_watermark` workers
//! - Adds workers on bursts, never more than `high_watermark`
//! - Idle workers above `low_watermark` retire after `idle_timeout`
//!
//! # Shutdown
//! - `stop(true)`: drain the queue, wait for every worker
//! - `stop(false)`: drop queued tasks, let running ones finish

mod pool;
mod worker;

pub use pool::{Executor, ExecutorConfig, ExecutorStats, PoolState, Task};
