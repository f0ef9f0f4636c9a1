use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter_vec, CounterVec, Encoder,
    HistogramVec, IntCounterVec, TextEncoder,
};

lazy_static! {
    // HTTP Metrics
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .unwrap();

    // Business Metrics
    pub static ref ATTEMPTS_GRADED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "attempts_graded_total",
        "Total number of quiz attempts graded",
        &["status"]
    )
    .unwrap();

    pub static ref CHAPTERS_COMPLETED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "chapters_completed_total",
        "Total number of chapter completions recorded",
        &["kind"]
    )
    .unwrap();

    pub static ref ACHIEVEMENTS_AWARDED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "achievements_awarded_total",
        "Total number of achievements awarded",
        &["kind"]
    )
    .unwrap();

    pub static ref EVENT_WORKER_TICKS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "event_worker_ticks_total",
        "Outbox worker ticks by outcome",
        &["result"]
    )
    .unwrap();

    pub static ref RECOMMENDER_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "recommender_requests_total",
        "Requests to the external recommender service",
        &["outcome"]
    )
    .unwrap();

    // Cache Metrics (Redis)
    pub static ref CACHE_HIT_RATIO: CounterVec = register_counter_vec!(
        "cache_hit_ratio",
        "Cache hit/miss ratio",
        &["result"]
    )
    .unwrap();
}

pub fn record_cache_hit() {
    CACHE_HIT_RATIO.with_label_values(&["hit"]).inc();
}

pub fn record_cache_miss() {
    CACHE_HIT_RATIO.with_label_values(&["miss"]).inc();
}

/// Render all registered metrics in the Prometheus text format.
pub fn render_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}
