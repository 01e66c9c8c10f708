//! Error types for the mirror server.

use std::net::SocketAddr;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

/// Errors that stop the server from starting or serving.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Options failed validation.
    #[error("invalid server options: {0}")]
    InvalidOptions(String),

    /// The webhook client's callback URL has no usable path.
    #[error("could not parse callback url {url}: {message}")]
    InvalidCallbackUrl { url: String, message: String },

    /// The listener could not be bound.
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// The HTTP server stopped with an error.
    #[error("http server failed: {0}")]
    Serve(#[from] std::io::Error),
}

/// One repository that could not be materialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryFailure {
    /// Canonical path of the origin.
    pub origin: String,
    /// What went wrong.
    pub message: String,
}

/// A configure pass failed; the previous registry is still active.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "failed to load configuration, {} repositories failed{}",
    .failures.len(),
    list_failures(.failures)
)]
pub struct ConfigureError {
    failures: Vec<RepositoryFailure>,
}

impl ConfigureError {
    pub(crate) fn new(mut failures: Vec<RepositoryFailure>) -> Self {
        failures.sort_by(|a, b| a.origin.cmp(&b.origin));
        Self { failures }
    }

    /// Returns the per-repository failures, sorted by origin.
    pub fn failures(&self) -> &[RepositoryFailure] {
        &self.failures
    }
}

fn list_failures(failures: &[RepositoryFailure]) -> String {
    failures
        .iter()
        .map(|failure| format!("; {}: {}", failure.origin, failure.message))
        .collect()
}

/// Errors returned to webhook callers.
#[derive(Debug)]
pub enum AppError {
    /// Wrong method, bad form, or unparsable payload.
    BadRequest(String),

    /// The payload names a repository that is not mirrored.
    UnknownRepository(String),

    /// Not running or not ready.
    Unavailable(String),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "Bad Request", msg),
            AppError::UnknownRepository(repo) => (
                StatusCode::NOT_FOUND,
                "Not Found",
                format!("unknown repo {repo}"),
            ),
            AppError::Unavailable(msg) => {
                (StatusCode::SERVICE_UNAVAILABLE, "Service Unavailable", msg)
            }
        };

        let body = Json(ErrorResponse {
            error: error.to_string(),
            message,
        });

        (status, body).into_response()
    }
}
