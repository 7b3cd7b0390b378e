//! # Prometheus Metrics
//!
//! HTTP request and error counters are recorded in [`metrics_middleware`].
//! Log gauges (registered identities, published STHs, latest STH time) are
//! set on each `/metrics` scrape by the handler in `routes::metrics`.

use std::sync::Arc;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::core::Collector;
use prometheus::{Encoder, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // Recorded by the middleware.
    http_requests_total: IntCounterVec,
    http_errors_total: IntCounterVec,

    // Set on scrape.
    process_up: IntGauge,
    users_count: IntGauge,
    sth_count: IntGauge,
    last_sth_timestamp: IntGauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests served"),
            &["method", "status"],
        )?;
        let http_errors_total = IntCounterVec::new(
            Opts::new("http_errors_total", "HTTP responses with a 4xx or 5xx status"),
            &["method", "status"],
        )?;
        let process_up = IntGauge::new("process_up", "Whether the service is up")?;
        let users_count = IntGauge::new("users_count", "Registered identities")?;
        let sth_count = IntGauge::new("sth_count", "Published signed tree heads")?;
        let last_sth_timestamp = IntGauge::new(
            "last_sth_timestamp",
            "Issue time of the latest STH, Unix seconds",
        )?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_errors_total.clone()))?;
        registry.register(Box::new(process_up.clone()))?;
        registry.register(Box::new(users_count.clone()))?;
        registry.register(Box::new(sth_count.clone()))?;
        registry.register(Box::new(last_sth_timestamp.clone()))?;

        process_up.set(1);

        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_errors_total,
                process_up,
                users_count,
                sth_count,
                last_sth_timestamp,
            }),
        })
    }

    /// Total request count, summed across labels.
    pub fn requests(&self) -> u64 {
        sum_counter(&self.inner.http_requests_total)
    }

    /// Total error count, summed across labels.
    pub fn errors(&self) -> u64 {
        sum_counter(&self.inner.http_errors_total)
    }

    fn record_request(&self, method: &str, status: u16) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, &status_str])
            .inc();
        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, &status_str])
                .inc();
        }
    }

    /// Update the log gauges before a scrape.
    pub fn set_log_gauges(&self, users_count: usize, sth_count: usize, last_sth_timestamp: i64) {
        self.inner.process_up.set(1);
        self.inner.users_count.set(saturating_i64(users_count));
        self.inner.sth_count.set(saturating_i64(sth_count));
        self.inner.last_sth_timestamp.set(last_sth_timestamp);
    }

    /// Gather all metrics and encode to the Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer).map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

fn sum_counter(counter: &IntCounterVec) -> u64 {
    counter
        .collect()
        .iter()
        .flat_map(|mf| mf.get_metric())
        .map(|m| m.get_counter().get_value() as u64)
        .sum()
}

fn saturating_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        m.record_request(&method, response.status().as_u16());
    }

    response
}
