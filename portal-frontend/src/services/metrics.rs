use prometheus::{Encoder, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::sync::OnceLock;

pub struct Metrics {
    pub registry: Registry,
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub guard_decisions_total: IntCounterVec,
    pub provider_calls_total: IntCounterVec,
}

// Global registry and collectors, always installed together.
pub static METRICS: OnceLock<Metrics> = OnceLock::new();

fn build() -> Result<Metrics, prometheus::Error> {
    let registry = Registry::new();

    let http_requests_total = IntCounterVec::new(
        Opts::new("http_requests_total", "Total number of HTTP requests"),
        &["method", "path", "status"],
    )?;

    let http_request_duration_seconds = HistogramVec::new(
        prometheus::HistogramOpts::new(
            "http_request_duration_seconds",
            "HTTP request duration in seconds",
        ),
        &["method", "path", "status"],
    )?;

    let guard_decisions_total = IntCounterVec::new(
        Opts::new(
            "session_guard_decisions_total",
            "Session guard outcomes by decision",
        ),
        &["outcome"],
    )?;

    let provider_calls_total = IntCounterVec::new(
        Opts::new(
            "identity_provider_calls_total",
            "Calls made to the identity provider",
        ),
        &["operation", "result"],
    )?;

    registry.register(Box::new(http_requests_total.clone()))?;
    registry.register(Box::new(http_request_duration_seconds.clone()))?;
    registry.register(Box::new(guard_decisions_total.clone()))?;
    registry.register(Box::new(provider_calls_total.clone()))?;

    Ok(Metrics {
        registry,
        http_requests_total,
        http_request_duration_seconds,
        guard_decisions_total,
        provider_calls_total,
    })
}

pub fn init_metrics() -> Result<(), prometheus::Error> {
    if METRICS.get().is_none() {
        let metrics = build()?;
        // A concurrent initialiser may have won; either set is complete.
        let _ = METRICS.set(metrics);
    }
    Ok(())
}

pub fn record_http_request(method: &str, path: &str, status: &str, seconds: f64) {
    if let Some(metrics) = METRICS.get() {
        let labels = [method, path, status];
        metrics.http_requests_total.with_label_values(&labels).inc();
        metrics
            .http_request_duration_seconds
            .with_label_values(&labels)
            .observe(seconds);
    }
}

pub fn record_guard_decision(outcome: &str) {
    if let Some(metrics) = METRICS.get() {
        metrics
            .guard_decisions_total
            .with_label_values(&[outcome])
            .inc();
    }
}

pub fn record_provider_call(operation: &str, ok: bool) {
    if let Some(metrics) = METRICS.get() {
        let result = if ok { "ok" } else { "error" };
        metrics
            .provider_calls_total
            .with_label_values(&[operation, result])
            .inc();
    }
}

pub fn get_metrics() -> String {
    let Some(metrics) = METRICS.get() else {
        return String::new();
    };

    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exposes_guard_and_provider_counters() {
        init_metrics().unwrap();
        // Second call is a no-op
        init_metrics().unwrap();

        record_guard_decision("redirect");
        record_provider_call("get_user", true);
        record_http_request("GET", "/", "200", 0.01);

        let text = get_metrics();
        assert!(text.contains("session_guard_decisions_total"));
        assert!(text.contains("identity_provider_calls_total"));
        assert!(text.contains("http_requests_total"));
    }
}
