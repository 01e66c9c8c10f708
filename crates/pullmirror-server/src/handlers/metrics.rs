//! Metrics endpoint handler.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse};

use crate::mirror::MirrorServer;

/// Handler for the /metrics endpoint.
pub async fn metrics_handler(State(server): State<Arc<MirrorServer>>) -> impl IntoResponse {
    server.observability().render()
}
