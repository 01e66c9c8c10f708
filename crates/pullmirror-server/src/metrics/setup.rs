//! Metrics setup and initialization.

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use super::names;

/// Installs the Prometheus recorder and returns the handle for the scrape
/// endpoint.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        // Git operations are network bound; buckets in seconds.
        .set_buckets(&[
            0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
        ])?
        .install_recorder()?;

    describe_metrics();
    info!("Metrics system initialized");
    Ok(handle)
}

fn describe_metrics() {
    metrics::describe_counter!(names::HOOKS_RECEIVED, "total number of hooks received");
    metrics::describe_counter!(names::HOOKS_ACCEPTED, "number of hooks accepted");
    metrics::describe_counter!(names::HOOKS_UPDATED, "number of repositories updated");
    metrics::describe_counter!(names::HOOKS_FAILED, "number of failed repository updates");
    metrics::describe_counter!(names::HOOKS_RETRIED, "number of retried pushes");
    metrics::describe_gauge!(
        names::REPOSITORY_UP,
        "whether the last update of a repository succeeded"
    );
    metrics::describe_gauge!(names::SERVER_UP, "whether the server accepts webhooks");
    metrics::describe_histogram!(names::GIT_LATENCY, "latency of git operations");
    metrics::describe_gauge!(
        names::BOOT_TIME,
        "unix timestamp of when the service was started"
    );
    metrics::describe_gauge!(
        names::LAST_SUCCESSFUL_CONFIG_APPLY,
        "unix timestamp of when the last configuration was successfully applied"
    );
    super::http::register_http_metrics();
}
