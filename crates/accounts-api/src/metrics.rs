//! Prometheus metrics owned by the application state

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

const NAMESPACE: &str = "accounts";

/// Latency buckets in seconds; password hashing dominates the upper range
const LATENCY_BUCKETS: &[f64] = &[0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5];

/// Request and limiter metrics
#[derive(Clone)]
pub struct ApiMetrics {
    registry: Registry,
    pub requests: IntCounterVec,
    pub latency: HistogramVec,
    pub rate_limited: IntCounter,
    pub rate_limit_buckets: IntGauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics").finish_non_exhaustive()
    }
}

impl ApiMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some(NAMESPACE.to_string()), None)?;

        let requests = IntCounterVec::new(
            Opts::new("http_requests_total", "HTTP requests by endpoint and status"),
            &["method", "endpoint", "status"],
        )?;
        let latency = HistogramVec::new(
            HistogramOpts::new("http_request_duration_seconds", "HTTP request latency")
                .buckets(LATENCY_BUCKETS.to_vec()),
            &["method", "endpoint"],
        )?;
        let rate_limited = IntCounter::new(
            "rate_limited_total",
            "Requests rejected by the rate limiter",
        )?;
        let rate_limit_buckets = IntGauge::new(
            "rate_limit_buckets",
            "Client buckets currently tracked by the rate limiter",
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(rate_limited.clone()))?;
        registry.register(Box::new(rate_limit_buckets.clone()))?;

        #[cfg(target_os = "linux")]
        registry.register(Box::new(
            prometheus::process_collector::ProcessCollector::for_self(),
        ))?;

        Ok(Self {
            registry,
            requests,
            latency,
            rate_limited,
            rate_limit_buckets,
        })
    }

    /// Record a finished request
    pub fn observe(&self, method: &str, endpoint: &str, status: u16, elapsed_secs: f64) {
        self.requests
            .with_label_values(&[method, endpoint, &status.to_string()])
            .inc();
        self.latency
            .with_label_values(&[method, endpoint])
            .observe(elapsed_secs);
    }

    /// Render all metrics in the Prometheus text format
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_contains_recorded_series() {
        let metrics = ApiMetrics::new().unwrap();
        metrics.observe("GET", "/users/:id", 200, 0.002);
        metrics.rate_limited.inc();
        metrics.rate_limit_buckets.set(3);

        let output = metrics.render().unwrap();
        assert!(output.contains("accounts_http_requests_total"));
        assert!(output.contains("endpoint=\"/users/:id\""));
        assert!(output.contains("accounts_rate_limited_total 1"));
        assert!(output.contains("accounts_rate_limit_buckets 3"));
        assert!(output.contains("accounts_http_request_duration_seconds_bucket"));
    }

    #[test]
    fn test_registries_are_independent() {
        let a = ApiMetrics::new().unwrap();
        let b = ApiMetrics::new().unwrap();
        a.rate_limited.inc();

        assert!(b.render().unwrap().contains("accounts_rate_limited_total 0"));
    }
}
