//! HTTP metrics middleware.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, State},
    http::Request,
    middleware::Next,
    response::Response,
};

use super::{Label, names};
use crate::mirror::MirrorServer;

/// Records a request counter and a duration histogram per matched path.
pub async fn http_metrics_middleware(
    State(server): State<Arc<MirrorServer>>,
    matched_path: Option<MatchedPath>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    // Unmatched paths share one label.
    let path = matched_path
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;

    let labels: Vec<Label> = vec![("method", method), ("path", path)];
    let mut with_status = labels.clone();
    with_status.push(("status", response.status().as_u16().to_string()));

    let observability = server.observability();
    observability.inc_counter(names::HTTP_REQUESTS, &with_status);
    observability.observe_latency(names::HTTP_DURATION, &labels, start.elapsed().as_secs_f64());

    response
}

/// Describes the HTTP metrics.
pub fn register_http_metrics() {
    metrics::describe_counter!(names::HTTP_REQUESTS, "Total number of HTTP requests");
    metrics::describe_histogram!(names::HTTP_DURATION, "HTTP request duration in seconds");
}
