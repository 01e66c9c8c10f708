//! Observability for the mirroring runtime.
//!
//! The runtime reports through the [`Observability`] trait and never touches a
//! global registry directly. [`PrometheusObservability`] forwards to the
//! `metrics` facade, [`InMemoryObservability`] keeps values in memory.

pub mod http;
mod memory;
mod prometheus;
pub mod setup;

pub use memory::InMemoryObservability;
pub use prometheus::PrometheusObservability;
pub use setup::init_metrics;

/// Metric names.
pub mod names {
    pub const HOOKS_RECEIVED: &str = "git_pull_mirror_hooks_received_total";
    pub const HOOKS_ACCEPTED: &str = "git_pull_mirror_hooks_accepted_total";
    pub const HOOKS_UPDATED: &str = "git_pull_mirror_hooks_updated_total";
    pub const HOOKS_FAILED: &str = "git_pull_mirror_hooks_failed_total";
    pub const HOOKS_RETRIED: &str = "git_pull_mirror_hooks_retried_total";
    pub const REPOSITORY_UP: &str = "git_pull_mirror_repository_up";
    pub const SERVER_UP: &str = "git_pull_mirror_server_up";
    pub const GIT_LATENCY: &str = "git_pull_mirror_git_latency_seconds";
    pub const BOOT_TIME: &str = "git_pull_mirror_boot_time_seconds";
    pub const LAST_SUCCESSFUL_CONFIG_APPLY: &str = "git_pull_mirror_last_successful_config_apply";
    pub const HTTP_REQUESTS: &str = "git_pull_mirror_http_requests_total";
    pub const HTTP_DURATION: &str = "git_pull_mirror_http_request_duration_seconds";
}

/// A metric label.
pub type Label = (&'static str, String);

/// Sink for runtime counters, gauges and latencies.
pub trait Observability: Send + Sync {
    /// Increments a counter by one.
    fn inc_counter(&self, name: &'static str, labels: &[Label]);

    /// Sets a gauge.
    fn set_gauge(&self, name: &'static str, labels: &[Label], value: f64);

    /// Records a latency observation, in seconds.
    fn observe_latency(&self, name: &'static str, labels: &[Label], seconds: f64);

    /// Renders the current values for the scrape endpoint.
    fn render(&self) -> String;
}

/// Seconds since the Unix epoch, as a gauge value.
pub fn unix_now() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}
