//! Prometheus-backed observability.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusHandle;

use super::{Label, Observability};

/// Forwards to the `metrics` facade and renders through the Prometheus
/// recorder installed by [`init_metrics`](super::init_metrics).
#[derive(Clone)]
pub struct PrometheusObservability {
    handle: PrometheusHandle,
}

impl PrometheusObservability {
    /// Creates an observability sink rendering through `handle`.
    pub fn new(handle: PrometheusHandle) -> Self {
        Self { handle }
    }
}

fn to_labels(labels: &[Label]) -> Vec<metrics::Label> {
    labels
        .iter()
        .map(|(key, value)| metrics::Label::new(*key, value.clone()))
        .collect()
}

impl Observability for PrometheusObservability {
    fn inc_counter(&self, name: &'static str, labels: &[Label]) {
        counter!(name, to_labels(labels)).increment(1);
    }

    fn set_gauge(&self, name: &'static str, labels: &[Label], value: f64) {
        gauge!(name, to_labels(labels)).set(value);
    }

    fn observe_latency(&self, name: &'static str, labels: &[Label], seconds: f64) {
        histogram!(name, to_labels(labels)).record(seconds);
    }

    fn render(&self) -> String {
        self.handle.render()
    }
}
