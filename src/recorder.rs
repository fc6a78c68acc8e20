//! A metrics recorder that keeps every value in memory and logs a snapshot
//! on demand.

use metrics::{
    Counter, CounterFn, Gauge, GaugeFn, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder,
    SharedString, Unit,
};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

/// Metric name plus its labels, sorted by label name.
type MetricKey = (String, Vec<(String, String)>);

#[derive(Debug, Default)]
struct Store {
    counters: BTreeMap<MetricKey, u64>,
    gauges: BTreeMap<MetricKey, f64>,
    histograms: BTreeMap<MetricKey, Vec<f64>>,
}

/// In-memory `metrics::Recorder`. Clones share the same storage, so one
/// clone can be installed globally while another is queried.
#[derive(Debug, Clone, Default)]
pub struct LoggingRecorder {
    store: Arc<Mutex<Store>>,
}

impl LoggingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter, 0 if it was never incremented.
    pub fn counter(&self, name: &str, labels: &[(&str, &str)]) -> u64 {
        self.lock()
            .counters
            .get(&lookup_key(name, labels))
            .copied()
            .unwrap_or(0)
    }

    pub fn gauge(&self, name: &str, labels: &[(&str, &str)]) -> Option<f64> {
        self.lock().gauges.get(&lookup_key(name, labels)).copied()
    }

    /// Every value recorded into a histogram, in order.
    pub fn histogram(&self, name: &str, labels: &[(&str, &str)]) -> Vec<f64> {
        self.lock()
            .histograms
            .get(&lookup_key(name, labels))
            .cloned()
            .unwrap_or_default()
    }

    /// Logs every counter and histogram at INFO level.
    pub fn log_snapshot(&self) {
        let store = self.lock();
        for ((name, labels), value) in &store.counters {
            info!(metric = %name, labels = %format_labels(labels), value, "[Counter]");
        }
        for ((name, labels), value) in &store.gauges {
            info!(metric = %name, labels = %format_labels(labels), value, "[Gauge]");
        }
        for ((name, labels), samples) in &store.histograms {
            let sum: f64 = samples.iter().sum();
            info!(
                metric = %name,
                labels = %format_labels(labels),
                count = samples.len(),
                sum,
                "[Histogram]"
            );
        }
    }

    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn handle(&self, key: &Key) -> Arc<Handle> {
        let mut labels: Vec<(String, String)> = key
            .labels()
            .map(|label| (label.key().to_string(), label.value().to_string()))
            .collect();
        labels.sort();
        Arc::new(Handle {
            key: (key.name().to_string(), labels),
            store: self.store.clone(),
        })
    }
}

fn lookup_key(name: &str, labels: &[(&str, &str)]) -> MetricKey {
    let mut labels: Vec<(String, String)> = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    labels.sort();
    (name.to_string(), labels)
}

fn format_labels(labels: &[(String, String)]) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",")
}

impl Recorder for LoggingRecorder {
    fn describe_counter(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_gauge(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn describe_histogram(&self, _key: KeyName, _unit: Option<Unit>, _description: SharedString) {}

    fn register_counter(&self, key: &Key, _metadata: &Metadata<'_>) -> Counter {
        Counter::from_arc(self.handle(key))
    }

    fn register_gauge(&self, key: &Key, _metadata: &Metadata<'_>) -> Gauge {
        Gauge::from_arc(self.handle(key))
    }

    fn register_histogram(&self, key: &Key, _metadata: &Metadata<'_>) -> Histogram {
        Histogram::from_arc(self.handle(key))
    }
}

/// One registered metric, writing straight into the shared store.
#[derive(Debug)]
struct Handle {
    key: MetricKey,
    store: Arc<Mutex<Store>>,
}

impl Handle {
    fn lock(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl CounterFn for Handle {
    fn increment(&self, value: u64) {
        *self.lock().counters.entry(self.key.clone()).or_insert(0) += value;
    }

    fn absolute(&self, value: u64) {
        let mut store = self.lock();
        let counter = store.counters.entry(self.key.clone()).or_insert(0);
        *counter = (*counter).max(value);
    }
}

impl GaugeFn for Handle {
    fn increment(&self, value: f64) {
        *self.lock().gauges.entry(self.key.clone()).or_insert(0.0) += value;
    }

    fn decrement(&self, value: f64) {
        *self.lock().gauges.entry(self.key.clone()).or_insert(0.0) -= value;
    }

    fn set(&self, value: f64) {
        self.lock().gauges.insert(self.key.clone(), value);
    }
}

impl HistogramFn for Handle {
    fn record(&self, value: f64) {
        self.lock()
            .histograms
            .entry(self.key.clone())
            .or_default()
            .push(value);
    }
}
