//! API Routes
//!
//! Configures the Axum router with all cache server endpoints.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    delete_handler, get_handler, health_handler, put_handler, put_if_absent_handler,
    set_handler, stats_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `PUT /put` - Store a key-value pair
/// - `POST /put_if_absent` - Store only if the key is absent
/// - `POST /set` - Replace the value of an existing key
/// - `GET /get/:key` - Retrieve a value by key
/// - `DELETE /del/:key` - Delete a key
/// - `GET /stats` - Cache and thread pool statistics
/// - `GET /health` - Health check endpoint
///
/// # Middleware
/// - CORS: Allows any origin (configurable for production)
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    // Configure CORS middleware
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/put", put(put_handler))
        .route("/put_if_absent", post(put_if_absent_handler))
        .route("/set", post(set_handler))
        .route("/get/:key", get(get_handler))
        .route("/del/:key", delete(delete_handler))
        .route("/stats", get(stats_handler))
        .route("/health", get(health_handler))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{ShardedLru, MIN_SHARD_SIZE};
    use crate::executor::{Executor, ExecutorConfig};
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::util::ServiceExt;

    fn create_test_app() -> Router {
        let cache = ShardedLru::build(1, MIN_SHARD_SIZE).unwrap();
        let executor = Executor::new(ExecutorConfig::default()).unwrap();
        create_router(AppState::new(cache, executor))
    }

    async fn status_of(app: Router, method: &str, uri: &str, json: Option<&str>) -> StatusCode {
        let builder = Request::builder().method(method).uri(uri);
        let request = match json {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string())),
            None => builder.body(Body::empty()),
        };
        app.oneshot(request.unwrap()).await.unwrap().status()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let status = status_of(create_test_app(), "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_stats_endpoint() {
        let status = status_of(create_test_app(), "GET", "/stats", None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_put_endpoint() {
        let body = r#"{"key":"test","value":"hello"}"#;
        let status = status_of(create_test_app(), "PUT", "/put", Some(body)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_set_missing_key_not_found() {
        let body = r#"{"key":"absent","value":"hello"}"#;
        let status = status_of(create_test_app(), "POST", "/set", Some(body)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_not_found() {
        let status = status_of(create_test_app(), "GET", "/get/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_wrong_method_rejected() {
        let status = status_of(create_test_app(), "GET", "/put", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
