//! API Handlers
//!
//! HTTP request handlers for each cache server endpoint.
//!
//! Every storage operation is submitted to the executor and its result is
//! handed back over a oneshot channel, so the async runtime never blocks on
//! a shard lock.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    Json,
};
use tokio::sync::oneshot;

use crate::cache::{ShardedLru, Storage};
use crate::error::{CacheError, Result, StoreError};
use crate::executor::Executor;
use crate::models::{
    validate_key, GetResponse, HealthResponse, StatsResponse, StoreRequest, StoreResponse,
};

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Sharded cache; each shard carries its own lock
    pub cache: Arc<ShardedLru>,
    /// Pool that runs the storage operations
    pub executor: Arc<Executor>,
}

impl AppState {
    /// Creates a new AppState from a cache and the pool serving it.
    pub fn new(cache: ShardedLru, executor: Executor) -> Self {
        Self {
            cache: Arc::new(cache),
            executor: Arc::new(executor),
        }
    }
}

/// Runs `op` against the cache on a pool worker and waits for its result.
async fn run_on_pool<T, F>(state: &AppState, op: F) -> Result<T>
where
    F: FnOnce(&ShardedLru) -> T + Send + 'static,
    T: Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let cache = Arc::clone(&state.cache);

    state.executor.execute(move || {
        // The receiver may have gone away with a cancelled request
        let _ = tx.send(op(&cache));
    })?;

    rx.await
        .map_err(|_| CacheError::Internal("request dropped before it ran".to_string()))
}

type WriteOp = fn(&ShardedLru, &str, &str) -> std::result::Result<(), StoreError>;

async fn write(
    state: &AppState,
    req: StoreRequest,
    op: WriteOp,
    action: &str,
) -> Result<Json<StoreResponse>> {
    if let Some(error_msg) = req.validate() {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let StoreRequest { key, value } = req;
    let task_key = key.clone();
    run_on_pool(state, move |cache| op(cache, &task_key, &value))
        .await?
        .map_err(|err| CacheError::store(key.clone(), err))?;

    Ok(Json(StoreResponse::new(key, action)))
}

/// Handler for PUT /put
///
/// Stores a key-value pair, replacing any existing value.
pub async fn put_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<StoreResponse>> {
    write(&state, req, <ShardedLru as Storage>::put, "stored").await
}

/// Handler for POST /put_if_absent
///
/// Stores a key-value pair only if the key is not present (409 otherwise).
pub async fn put_if_absent_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<StoreResponse>> {
    write(&state, req, <ShardedLru as Storage>::put_if_absent, "stored").await
}

/// Handler for POST /set
///
/// Replaces the value of an existing key (404 otherwise).
pub async fn set_handler(
    State(state): State<AppState>,
    Json(req): Json<StoreRequest>,
) -> Result<Json<StoreResponse>> {
    write(&state, req, <ShardedLru as Storage>::set, "updated").await
}

/// Handler for GET /get/:key
///
/// Retrieves a value from the cache by key. The read promotes the entry.
pub async fn get_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let task_key = key.clone();
    let value = run_on_pool(&state, move |cache| cache.get(&task_key))
        .await?
        .map_err(|err| CacheError::store(key.clone(), err))?;

    Ok(Json(GetResponse::new(key, value)))
}

/// Handler for DELETE /del/:key
///
/// Deletes a key from the cache.
pub async fn delete_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<StoreResponse>> {
    if let Some(error_msg) = validate_key(&key) {
        return Err(CacheError::InvalidRequest(error_msg));
    }

    let task_key = key.clone();
    run_on_pool(&state, move |cache| cache.delete(&task_key))
        .await?
        .map_err(|err| CacheError::store(key.clone(), err))?;

    Ok(Json(StoreResponse::new(key, "deleted")))
}

/// Handler for GET /stats
///
/// Returns cache and thread pool statistics.
pub async fn stats_handler(State(state): State<AppState>) -> Json<StatsResponse> {
    Json(StatsResponse::new(
        state.cache.stats(),
        state.cache.shard_stats(),
        state.executor.stats(),
    ))
}

/// Handler for GET /health
///
/// Returns health status of the server.
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}
