use std::sync::Arc;

use axum::{Json, extract::State, http::StatusCode};
use pullmirror_git::MirrorStatus;
use serde::Serialize;

use crate::mirror::MirrorServer;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub ready: bool,
    pub running: bool,
    pub repositories: usize,
    pub mirrors: Vec<MirrorHealth>,
}

#[derive(Debug, Serialize)]
pub struct MirrorHealth {
    pub origin: String,
    pub target: String,
    #[serde(flatten)]
    pub sync: MirrorStatus,
}

/// `UP` with 200 once the server is running and ready, `DOWN` with 503
/// otherwise.
pub async fn health_check(
    State(server): State<Arc<MirrorServer>>,
) -> (StatusCode, Json<HealthResponse>) {
    let status = server.status();
    let up = status.ready && status.running;

    let mirrors: Vec<MirrorHealth> = status
        .repositories
        .iter()
        .map(|repo| MirrorHealth {
            origin: repo.origin().to_path(),
            target: repo.target().to_path(),
            sync: repo.state().status(),
        })
        .collect();

    let body = HealthResponse {
        status: if up { "UP" } else { "DOWN" },
        ready: status.ready,
        running: status.running,
        repositories: mirrors.len(),
        mirrors,
    };

    let code = if up {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(body))
}
