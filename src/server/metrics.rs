use axum::{http::StatusCode, response::IntoResponse};
use lazy_static::lazy_static;
use prometheus::{
    CounterVec, Encoder, Gauge, HistogramOpts, HistogramVec, IntCounter, Opts, Registry,
    TextEncoder,
};
use std::time::Duration;

/// Metric name prefix for all JinglePress metrics
const PREFIX: &str = "jinglepress";

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // HTTP Request Metrics
    pub static ref HTTP_REQUESTS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_http_requests_total"), "Total number of HTTP requests"),
        &["method", "path", "status"]
    ).expect("Failed to create http_requests_total metric");

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            format!("{PREFIX}_http_request_duration_seconds"),
            "HTTP request duration in seconds"
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Pipeline Metrics
    pub static ref PIPELINE_FAILURES_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_pipeline_failures_total"), "Pipeline failures by stage and error kind"),
        &["stage", "kind"]
    ).expect("Failed to create pipeline_failures_total metric");

    pub static ref STAGING_RECONSTRUCTED_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_staging_reconstructed_total"),
        "Staging lookups served from the file-name convention without a stored record"
    ).expect("Failed to create staging_reconstructed_total metric");

    pub static ref MIX_FALLBACKS_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_mix_fallbacks_total"),
        "Automatic mixes that fell back to the unmixed source"
    ).expect("Failed to create mix_fallbacks_total metric");

    pub static ref TAG_SIZE_MISMATCH_TOTAL: IntCounter = IntCounter::new(
        format!("{PREFIX}_tag_size_mismatch_total"),
        "Finalized files whose size changed unexpectedly around the tag write"
    ).expect("Failed to create tag_size_mismatch_total metric");

    pub static ref FINALIZED_ASSETS_TOTAL: CounterVec = CounterVec::new(
        Opts::new(format!("{PREFIX}_finalized_assets_total"), "Finalized assets by usage kind"),
        &["kind"]
    ).expect("Failed to create finalized_assets_total metric");

    pub static ref PROCESS_MEMORY_BYTES: Gauge = Gauge::new(
        format!("{PREFIX}_process_memory_bytes"),
        "Process memory usage in bytes"
    ).expect("Failed to create process_memory_bytes metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PIPELINE_FAILURES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(STAGING_RECONSTRUCTED_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(MIX_FALLBACKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(TAG_SIZE_MISMATCH_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(FINALIZED_ASSETS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(PROCESS_MEMORY_BYTES.clone()));

    tracing::info!("Metrics system initialized successfully");
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: Duration) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();

    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration.as_secs_f64());
}

pub fn record_pipeline_failure(stage: &str, kind: &str) {
    PIPELINE_FAILURES_TOTAL
        .with_label_values(&[stage, kind])
        .inc();
}

pub fn record_staging_reconstructed() {
    STAGING_RECONSTRUCTED_TOTAL.inc();
}

pub fn record_mix_fallback() {
    MIX_FALLBACKS_TOTAL.inc();
}

pub fn record_tag_size_mismatch() {
    TAG_SIZE_MISMATCH_TOTAL.inc();
}

pub fn record_finalized_asset(kind: &str) {
    FINALIZED_ASSETS_TOTAL.with_label_values(&[kind]).inc();
}

/// Path label with ids collapsed, e.g. `/v1/staging/{id}/finalize`.
pub fn endpoint_label(path: &str) -> String {
    if path.starts_with("/uploads/") {
        return "/uploads/{file}".to_string();
    }

    let mut label = Vec::new();
    let mut previous = "";
    for segment in path.split('/') {
        if matches!(previous, "staging" | "audio") && !segment.is_empty() {
            label.push("{id}");
        } else {
            label.push(segment);
        }
        previous = segment;
    }
    label.join("/")
}

/// Update process memory usage
pub fn update_memory_usage() {
    #[cfg(target_os = "linux")]
    {
        if let Ok(status) = std::fs::read_to_string("/proc/self/status") {
            for line in status.lines() {
                if line.starts_with("VmRSS:") {
                    if let Some(kb_str) = line.split_whitespace().nth(1) {
                        if let Ok(kb) = kb_str.parse::<f64>() {
                            PROCESS_MEMORY_BYTES.set(kb * 1024.0);
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler() -> impl IntoResponse {
    update_memory_usage();

    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = vec![];
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => {
            let response = String::from_utf8(buffer).unwrap_or_default();
            (StatusCode::OK, response)
        }
        Err(e) => {
            tracing::error!("Failed to encode metrics: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Failed to encode metrics: {}", e),
            )
        }
    }
}
