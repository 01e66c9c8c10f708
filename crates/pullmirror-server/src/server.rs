use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{any, get},
};
use tower::ServiceBuilder;

use crate::handlers::{health::health_check, metrics::metrics_handler, webhook::webhook_handler};
use crate::middleware::{LoggingLayer, RequestIdLayer};
use crate::mirror::MirrorServer;

/// Paths served regardless of the callback URL.
pub const RESERVED_PATHS: &[&str] = &["/health", "/metrics"];

/// Creates the router serving webhooks on `callback_path`, plus the health and
/// metrics endpoints.
pub fn create_router(server: Arc<MirrorServer>, callback_path: &str) -> Router {
    let middleware_stack = ServiceBuilder::new()
        .layer(RequestIdLayer)
        .layer(LoggingLayer);

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics_handler))
        // Any method, so that non-POST deliveries get a 400 rather than a 405.
        .route(callback_path, any(webhook_handler))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&server),
            crate::metrics::http::http_metrics_middleware,
        ))
        .with_state(server)
        .layer(middleware_stack)
}
