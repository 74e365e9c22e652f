use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use prometheus::{IntCounterVec, Opts, Registry};
use std::sync::OnceLock;

pub static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
pub static PROMETHEUS_REGISTRY: OnceLock<Registry> = OnceLock::new();
pub static GATEWAY_REQUESTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GATEWAY_TOKENS_COMMITTED_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();
pub static GATEWAY_PAYMENTS_TOTAL: OnceLock<IntCounterVec> = OnceLock::new();

/// Install the Prometheus recorder and register the gateway counters.
/// Safe to call more than once; later calls are no-ops (tests spawn many
/// apps in one process).
pub fn init_metrics() {
    if METRICS_HANDLE.get().is_some() {
        return;
    }

    let builder = PrometheusBuilder::new();
    match builder.install_recorder() {
        Ok(handle) => {
            let _ = METRICS_HANDLE.set(handle);
        }
        Err(e) => {
            tracing::warn!(error = %e, "Prometheus recorder already installed");
        }
    }

    let registry = Registry::new();

    let requests_counter = IntCounterVec::new(
        Opts::new(
            "gateway_requests_total",
            "Chat requests by outcome (admitted or rejection reason)",
        ),
        &["outcome"],
    )
    .expect("Failed to create gateway_requests_total metric");

    let tokens_counter = IntCounterVec::new(
        Opts::new(
            "gateway_tokens_committed_total",
            "Tokens committed against session quotas, by provider",
        ),
        &["provider"],
    )
    .expect("Failed to create gateway_tokens_committed_total metric");

    let payments_counter = IntCounterVec::new(
        Opts::new(
            "gateway_payments_total",
            "Payment webhook deliveries by disposition",
        ),
        &["disposition"],
    )
    .expect("Failed to create gateway_payments_total metric");

    registry
        .register(Box::new(requests_counter.clone()))
        .expect("Failed to register gateway_requests_total");
    registry
        .register(Box::new(tokens_counter.clone()))
        .expect("Failed to register gateway_tokens_committed_total");
    registry
        .register(Box::new(payments_counter.clone()))
        .expect("Failed to register gateway_payments_total");

    let _ = PROMETHEUS_REGISTRY.set(registry);
    let _ = GATEWAY_REQUESTS_TOTAL.set(requests_counter);
    let _ = GATEWAY_TOKENS_COMMITTED_TOTAL.set(tokens_counter);
    let _ = GATEWAY_PAYMENTS_TOTAL.set(payments_counter);
}

pub fn get_metrics() -> String {
    let mut output = METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string());

    if let Some(registry) = PROMETHEUS_REGISTRY.get() {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let metric_families = registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).ok();
        if let Ok(custom_metrics) = String::from_utf8(buffer) {
            output.push_str(&custom_metrics);
        }
    }

    output
}

/// Record a chat request outcome ("admitted" or a rejection reason code).
pub fn record_request(outcome: &str) {
    if let Some(counter) = GATEWAY_REQUESTS_TOTAL.get() {
        counter.with_label_values(&[outcome]).inc();
    }
}

/// Record committed tokens for metering.
pub fn record_tokens(provider: &str, tokens: i64) {
    if let Some(counter) = GATEWAY_TOKENS_COMMITTED_TOTAL.get() {
        counter
            .with_label_values(&[provider])
            .inc_by(tokens.max(0) as u64);
    }
}

/// Record a payment webhook disposition ("granted", "extended", "duplicate", "ignored").
pub fn record_payment(disposition: &str) {
    if let Some(counter) = GATEWAY_PAYMENTS_TOTAL.get() {
        counter.with_label_values(&[disposition]).inc();
    }
}
