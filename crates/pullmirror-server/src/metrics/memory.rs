//! In-memory observability.

use std::collections::BTreeMap;
use std::fmt::Write;

use parking_lot::Mutex;

use super::{Label, Observability};

type Key = (String, Vec<(String, String)>);

fn key(name: &str, labels: &[Label]) -> Key {
    let mut labels: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect();
    labels.sort();
    (name.to_string(), labels)
}

fn format_key((name, labels): &Key) -> String {
    if labels.is_empty() {
        return name.clone();
    }
    let labels: Vec<String> = labels.iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
    format!("{name}{{{}}}", labels.join(","))
}

/// Keeps every value in memory so it can be inspected.
#[derive(Debug, Default)]
pub struct InMemoryObservability {
    counters: Mutex<BTreeMap<Key, u64>>,
    gauges: Mutex<BTreeMap<Key, f64>>,
    latencies: Mutex<BTreeMap<Key, Vec<f64>>>,
}

impl InMemoryObservability {
    /// Creates an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a counter value, zero if never incremented.
    pub fn counter(&self, name: &str, labels: &[Label]) -> u64 {
        self.counters
            .lock()
            .get(&key(name, labels))
            .copied()
            .unwrap_or(0)
    }

    /// Returns a gauge value, if ever set.
    pub fn gauge(&self, name: &str, labels: &[Label]) -> Option<f64> {
        self.gauges.lock().get(&key(name, labels)).copied()
    }

    /// Returns the number of latency observations.
    pub fn observations(&self, name: &str, labels: &[Label]) -> usize {
        self.latencies
            .lock()
            .get(&key(name, labels))
            .map_or(0, Vec::len)
    }
}

impl Observability for InMemoryObservability {
    fn inc_counter(&self, name: &'static str, labels: &[Label]) {
        *self.counters.lock().entry(key(name, labels)).or_default() += 1;
    }

    fn set_gauge(&self, name: &'static str, labels: &[Label], value: f64) {
        self.gauges.lock().insert(key(name, labels), value);
    }

    fn observe_latency(&self, name: &'static str, labels: &[Label], seconds: f64) {
        self.latencies
            .lock()
            .entry(key(name, labels))
            .or_default()
            .push(seconds);
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in self.counters.lock().iter() {
            let _ = writeln!(out, "{} {value}", format_key(key));
        }
        for (key, value) in self.gauges.lock().iter() {
            let _ = writeln!(out, "{} {value}", format_key(key));
        }
        for (key, values) in self.latencies.lock().iter() {
            let (name, labels) = key;
            let sum: f64 = values.iter().sum();
            let _ = writeln!(out, "{} {sum}", format_key(&(format!("{name}_sum"), labels.clone())));
            let _ = writeln!(
                out,
                "{} {}",
                format_key(&(format!("{name}_count"), labels.clone())),
                values.len()
            );
        }
        out
    }
}
