//! # git-pull-mirror server
//!
//! Receives push webhooks and mirrors the notified repository from its origin
//! to its target.
//!
//! - [`MirrorServer`]: registry, worker pool and lifecycle
//! - [`create_router`]: webhook, health and metrics endpoints
//! - [`Observability`]: where counters, gauges and latencies go

pub mod cli;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod mirror;
pub mod options;
pub mod server;

pub use error::{AppError, ConfigureError, RepositoryFailure, ServerError};
pub use metrics::{InMemoryObservability, Observability, PrometheusObservability};
pub use mirror::{MirrorServer, ServerStatus, UPDATE_ALL_ID};
pub use options::ServerOptions;
pub use server::create_router;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_defined() {
        assert!(!version().is_empty());
    }
}
