/*!
 * # Metrics Module
 *
 * In-process counters and histograms for the gateway, exposed as
 * Prometheus text at `/metrics` and as JSON at `/metrics/json`.
 */

use dashmap::DashMap;
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("Failed to export metrics: {0}")]
    ExportError(String),
}

#[derive(Debug, Clone, Default)]
pub struct Counter {
    value: Arc<AtomicU64>,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Count and sum of observations, sum kept in microseconds
#[derive(Debug, Clone, Default)]
pub struct Histogram {
    sum_micros: Arc<AtomicU64>,
    count: Arc<AtomicU64>,
}

impl Histogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&self, value: Duration) {
        self.sum_micros
            .fetch_add(value.as_micros() as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    pub fn get_sum_seconds(&self) -> f64 {
        self.sum_micros.load(Ordering::Relaxed) as f64 / 1_000_000.0
    }
}

#[derive(Debug, Default)]
pub struct MetricsRegistry {
    counters: DashMap<String, Counter>,
    histograms: DashMap<String, Histogram>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_create_counter(&self, name: &str) -> Counter {
        self.counters
            .entry(name.to_string())
            .or_insert_with(Counter::new)
            .clone()
    }

    pub fn get_or_create_histogram(&self, name: &str) -> Histogram {
        self.histograms
            .entry(name.to_string())
            .or_insert_with(Histogram::new)
            .clone()
    }

    pub fn export_metrics(&self) -> Result<String, MetricsError> {
        use std::fmt::Write;

        let mut output = String::new();
        let mut names: Vec<_> = self.counters.iter().map(|e| e.key().clone()).collect();
        names.sort();
        for name in names {
            if let Some(counter) = self.counters.get(&name) {
                writeln!(output, "# TYPE {} counter", name)
                    .and_then(|_| writeln!(output, "{} {}", name, counter.get()))
                    .map_err(|e| MetricsError::ExportError(e.to_string()))?;
            }
        }

        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            writeln!(output, "# TYPE {} histogram", name)
                .and_then(|_| writeln!(output, "{}_count {}", name, histogram.get_count()))
                .and_then(|_| writeln!(output, "{}_sum {}", name, histogram.get_sum_seconds()))
                .map_err(|e| MetricsError::ExportError(e.to_string()))?;
        }

        Ok(output)
    }

    pub fn export_metrics_json(&self) -> Result<serde_json::Value, MetricsError> {
        let mut counters = serde_json::Map::new();
        for entry in self.counters.iter() {
            let (name, counter) = entry.pair();
            counters.insert(name.to_string(), json!(counter.get()));
        }

        let mut histograms = serde_json::Map::new();
        for entry in self.histograms.iter() {
            let (name, histogram) = entry.pair();
            histograms.insert(
                name.to_string(),
                json!({
                    "count": histogram.get_count(),
                    "sum": histogram.get_sum_seconds(),
                }),
            );
        }

        Ok(json!({
            "counters": counters,
            "histograms": histograms,
        }))
    }
}

// Global metrics registry
lazy_static::lazy_static! {
    pub static ref METRICS: MetricsRegistry = MetricsRegistry::new();
    pub static ref GATEWAY_METRICS: GatewayMetrics = GatewayMetrics::new(&METRICS);
}

pub fn increment_counter(name: &str) {
    METRICS.get_or_create_counter(name).inc();
}

pub struct GatewayMetrics {
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub upstream_requests: Counter,
    pub upstream_errors: Counter,
    pub upstream_latency: Histogram,
    pub journal_entries_rejected: Counter,
}

impl GatewayMetrics {
    pub fn new(registry: &MetricsRegistry) -> Self {
        Self {
            cache_hits: registry.get_or_create_counter("cache_hits_total"),
            cache_misses: registry.get_or_create_counter("cache_misses_total"),
            upstream_requests: registry.get_or_create_counter("upstream_requests_total"),
            upstream_errors: registry.get_or_create_counter("upstream_errors_total"),
            upstream_latency: registry.get_or_create_histogram("upstream_request_duration_seconds"),
            journal_entries_rejected: registry
                .get_or_create_counter("journal_entries_rejected_total"),
        }
    }

    pub fn record_upstream(&self, elapsed: Duration, failed: bool) {
        self.upstream_requests.inc();
        self.upstream_latency.observe(elapsed);
        if failed {
            self.upstream_errors.inc();
        }
    }
}

pub async fn metrics_handler() -> Result<String, MetricsError> {
    METRICS.export_metrics()
}

pub async fn metrics_json_handler() -> Result<serde_json::Value, MetricsError> {
    METRICS.export_metrics_json()
}
