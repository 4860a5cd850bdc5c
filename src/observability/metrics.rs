use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::info;

static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Process-wide metrics, created on first use.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE
        .get_or_init(|| async {
            info!("Initializing Metrics ...");
            // metric names and label sets are static, so this only fails on a typo
            Arc::new(Metrics::build().expect("metric definitions are valid"))
        })
        .await
}

#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Config
    pub parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,

    // Token store
    pub store_failures: IntCounterVec,

    // Login / refresh
    pub login_attempts: IntCounter,
    pub login_failures: IntCounterVec,
    pub login_duration: Histogram,
    pub refresh_joins: IntCounter,

    // Vendor calls
    pub vendor_calls: IntCounterVec,
    pub vendor_call_duration: HistogramVec,
    pub auth_retries: IntCounterVec,

    // Stations
    pub pop_results: IntCounterVec,

    pub up: IntGauge,
}

impl Metrics {
    fn build() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("stationagent".into()), None)?;

        let metrics = Self {
            parse_failures: IntCounter::new("config_parse_failures_total", "Config files that failed to parse")?,
            config_validation_errors: IntCounter::new("config_validation_errors_total", "Validation errors during startup")?,

            store_failures: IntCounterVec::new(Opts::new("token_store_failures_total", "Token store operations that failed"), &["op"])?,

            login_attempts: IntCounter::new("login_attempts_total", "Vendor logins started")?,
            login_failures: IntCounterVec::new(Opts::new("login_failures_total", "Vendor logins that failed by reason"), &["reason"])?,
            login_duration: Histogram::with_opts(
                HistogramOpts::new("login_duration_seconds", "Vendor login duration seconds").buckets(vec![0.5, 1.0, 2.5, 5.0, 10.0, 20.0, 40.0, 90.0]),
            )?,
            refresh_joins: IntCounter::new("refresh_joins_total", "Refresh requests that joined an in-flight login")?,

            vendor_calls: IntCounterVec::new(Opts::new("vendor_calls_total", "Vendor API calls by outcome"), &["endpoint", "outcome"])?,
            vendor_call_duration: HistogramVec::new(
                HistogramOpts::new("vendor_call_duration_seconds", "Vendor API call duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),
                &["endpoint"],
            )?,
            auth_retries: IntCounterVec::new(Opts::new("auth_retries_total", "Vendor calls retried after a token refresh"), &["endpoint"])?,

            pop_results: IntCounterVec::new(Opts::new("pop_results_total", "Slot pop attempts by result"), &["result"])?,

            up: IntGauge::new("up", "1 if service is serving requests")?,

            registry,
        };

        let reg = &metrics.registry;
        reg.register(Box::new(metrics.parse_failures.clone()))?;
        reg.register(Box::new(metrics.config_validation_errors.clone()))?;
        reg.register(Box::new(metrics.store_failures.clone()))?;
        reg.register(Box::new(metrics.login_attempts.clone()))?;
        reg.register(Box::new(metrics.login_failures.clone()))?;
        reg.register(Box::new(metrics.login_duration.clone()))?;
        reg.register(Box::new(metrics.refresh_joins.clone()))?;
        reg.register(Box::new(metrics.vendor_calls.clone()))?;
        reg.register(Box::new(metrics.vendor_call_duration.clone()))?;
        reg.register(Box::new(metrics.auth_retries.clone()))?;
        reg.register(Box::new(metrics.pop_results.clone()))?;
        reg.register(Box::new(metrics.up.clone()))?;

        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use prometheus::{Encoder, TextEncoder};

    use super::*;

    #[tokio::test]
    async fn registry_exposes_prefixed_families() {
        let metrics = get_metrics().await;
        metrics.refresh_joins.inc();
        metrics.vendor_calls.with_label_values(&["cabinet_query", "success"]).inc();

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&metrics.registry.gather(), &mut buffer).unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("stationagent_refresh_joins_total"));
        assert!(text.contains("stationagent_vendor_calls_total{endpoint=\"cabinet_query\",outcome=\"success\"}"));
    }
}
