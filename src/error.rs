//! Error types for the cache server
//!
//! Provides unified error handling using thiserror.
//!
//! Storage and executor outcomes are plain values (`StoreError`,
//! `ExecutorError`) so the hot path never allocates. `CacheError` is the
//! HTTP-facing wrapper that knows how to turn them into responses.

use std::io;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Store Error ==
/// Outcome of a failed storage operation.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    /// Key plus value is larger than the whole shard
    #[error("entry of {size} bytes exceeds capacity of {capacity} bytes")]
    EntryTooLarge { size: usize, capacity: usize },

    /// Key is not resident
    #[error("key not found")]
    NotFound,

    /// Key is already resident (put_if_absent)
    #[error("key already exists")]
    AlreadyExists,
}

// == Executor Error ==
/// Reasons the executor refuses a task or fails to grow.
#[derive(Error, Debug)]
pub enum ExecutorError {
    /// Pending queue is full
    #[error("task queue is full ({max_queue_size} pending tasks)")]
    QueueOverflow { max_queue_size: usize },

    /// Pool has been asked to stop
    #[error("executor is not accepting tasks")]
    PoolNotAccepting,

    /// The OS refused to start a worker thread
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// Configuration rejected at construction
    #[error(transparent)]
    Config(#[from] ConfigError),
}

// == Config Error ==
/// Construction-time configuration failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Per-shard capacity would fall below the floor
    #[error("too many stripes: {shard_size} bytes per shard is below the minimum of {min_shard_size}")]
    TooManyStripes {
        shard_size: usize,
        min_shard_size: usize,
    },

    /// A sharded cache needs at least one shard
    #[error("stripe count must be at least 1")]
    NoStripes,

    /// low_watermark > high_watermark, or high_watermark == 0
    #[error("invalid watermarks: low={low}, high={high}")]
    InvalidWatermarks { low: usize, high: usize },

    /// A zero-length queue would reject every task
    #[error("max_queue_size must be at least 1")]
    ZeroQueue,
}

// == Cache Error Enum ==
/// Unified error type for the cache server.
#[derive(Error, Debug)]
pub enum CacheError {
    /// A storage operation failed for a key
    #[error("{source}: {key}")]
    Store {
        key: String,
        #[source]
        source: StoreError,
    },

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Executor refused the work
    #[error("Request rejected: {0}")]
    Rejected(#[from] ExecutorError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CacheError {
    /// Attaches the key a storage failure happened on.
    pub fn store(key: impl Into<String>, source: StoreError) -> Self {
        CacheError::Store {
            key: key.into(),
            source,
        }
    }
}

// == IntoResponse Implementation ==
impl IntoResponse for CacheError {
    fn into_response(self) -> Response {
        let status = match &self {
            CacheError::Store { source, .. } => match source {
                StoreError::NotFound => StatusCode::NOT_FOUND,
                StoreError::AlreadyExists => StatusCode::CONFLICT,
                StoreError::EntryTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            },
            CacheError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            CacheError::Rejected(_) => StatusCode::SERVICE_UNAVAILABLE,
            CacheError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache server.
pub type Result<T> = std::result::Result<T, CacheError>;
