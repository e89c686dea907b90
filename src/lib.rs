//! Stripe Cache - A memcached-style key-value cache
//!
//! Provides a byte-bounded, sharded LRU cache and the thread pool that
//! serves requests against it.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod executor;
pub mod models;

pub use api::AppState;
pub use cache::{ShardedLru, SimpleLru, Storage};
pub use config::Config;
pub use executor::{Executor, ExecutorConfig};
