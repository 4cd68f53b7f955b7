use anyhow::{Context, Result};
use axum::extract::State;
use axum::{http::StatusCode, response::IntoResponse, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::ResponseCache;
use crate::catalog_store::MoodStats;

/// Metric name prefix for all Umore metrics
const PREFIX: &str = "umore";

lazy_static! {
    // Global Prometheus registry
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
        .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0]),
        &["method", "path"]
    ).expect("Failed to create http_request_duration_seconds metric");

    // Playback Metrics
    pub static ref PLAYS_TOTAL: Counter = Counter::new(
        format!("{PREFIX}_plays_total"),
        "Total recorded play events (skips excluded)"
    ).expect("Failed to create plays_total metric");

    // Catalog Metrics
    pub static ref CATALOG_TRACKS_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_catalog_tracks_total"), "Approved tracks per mood"),
        &["mood"]
    ).expect("Failed to create catalog_tracks_total metric");

    // Response Cache Metrics (refreshed at scrape time)
    pub static ref CACHE_HITS_TOTAL: Gauge = Gauge::new(
        format!("{PREFIX}_cache_hits_total"),
        "Response cache hits"
    ).expect("Failed to create cache_hits_total metric");

    pub static ref CACHE_MISSES_TOTAL: GaugeVec = GaugeVec::new(
        Opts::new(format!("{PREFIX}_cache_misses_total"), "Response cache misses by reason"),
        &["reason"]
    ).expect("Failed to create cache_misses_total metric");

    pub static ref CACHE_KEYS: Gauge = Gauge::new(
        format!("{PREFIX}_cache_keys"),
        "Entries currently held by the response cache"
    ).expect("Failed to create cache_keys metric");
}

/// Initialize all metrics and register them with the Prometheus registry
pub fn init_metrics() {
    // Register all metrics - ignore errors if already registered (for tests)
    let _ = REGISTRY.register(Box::new(HTTP_REQUESTS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(HTTP_REQUEST_DURATION_SECONDS.clone()));
    let _ = REGISTRY.register(Box::new(PLAYS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CATALOG_TRACKS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CACHE_HITS_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CACHE_MISSES_TOTAL.clone()));
    let _ = REGISTRY.register(Box::new(CACHE_KEYS.clone()));

    info!("Metrics system initialized");
}

/// Seed the per-mood track gauges from the catalog.
pub fn init_catalog_metrics(stats: &[MoodStats]) {
    for stat in stats {
        CATALOG_TRACKS_TOTAL
            .with_label_values(&[&stat.mood])
            .set(stat.track_count as f64);
    }
    info!("Catalog metrics initialized for {} moods", stats.len());
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

/// Record a successfully committed play event
pub fn record_play() {
    PLAYS_TOTAL.inc();
}

fn update_cache_metrics(cache: &ResponseCache) {
    let stats = cache.stats();
    CACHE_HITS_TOTAL.set(stats.hits as f64);
    CACHE_MISSES_TOTAL
        .with_label_values(&["absent"])
        .set(stats.misses_absent as f64);
    CACHE_MISSES_TOTAL
        .with_label_values(&["expired"])
        .set(stats.misses_expired as f64);
    CACHE_KEYS.set(stats.keys as f64);
}

/// Handler for the /metrics endpoint
pub async fn metrics_handler(State(cache): State<Arc<ResponseCache>>) -> impl IntoResponse {
    // Refresh cache gauges before encoding
    update_cache_metrics(&cache);

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

/// Serve the Prometheus text endpoint on its own localhost-only port.
pub async fn run_metrics_server(port: u16, cache: Arc<ResponseCache>) -> Result<()> {
    let app = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(cache);

    let listener = tokio::net::TcpListener::bind(format!("127.0.0.1:{}", port))
        .await
        .with_context(|| format!("Failed to bind metrics port {}", port))?;

    Ok(axum::serve(listener, app).await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_initialize_without_panic() {
        init_metrics();

        let metric_families = REGISTRY.gather();
        assert!(!metric_families.is_empty(), "Metrics should be registered");
    }

    #[test]
    fn http_requests_are_recorded() {
        init_metrics();

        record_http_request("GET", "/api/moods", 200, Duration::from_millis(5));

        let metrics = REGISTRY.gather();
        let http_metrics = metrics
            .iter()
            .find(|m| m.get_name() == "umore_http_requests_total");
        assert!(http_metrics.is_some(), "HTTP request metrics should exist");
    }

    #[test]
    fn plays_counter_increments() {
        init_metrics();

        let before = PLAYS_TOTAL.get();
        record_play();
        // Other tests may record plays concurrently; only assert growth.
        assert!(PLAYS_TOTAL.get() >= before + 1.0);
    }

    #[test]
    fn cache_gauges_reflect_stats() {
        init_metrics();

        let cache = ResponseCache::default();
        cache.set("k", serde_json::json!(1));
        let _ = cache.get("k");
        let _ = cache.get("missing");

        update_cache_metrics(&cache);
        assert_eq!(CACHE_HITS_TOTAL.get() as u64, 1);
        assert_eq!(
            CACHE_MISSES_TOTAL.with_label_values(&["absent"]).get() as u64,
            1
        );
        assert_eq!(CACHE_KEYS.get() as u64, 1);
    }

    #[test]
    fn catalog_gauges_are_seeded_per_mood() {
        init_metrics();

        init_catalog_metrics(&[
            MoodStats {
                mood: "focus".to_string(),
                track_count: 12,
                total_duration_seconds: 2400,
            },
            MoodStats {
                mood: "calm".to_string(),
                track_count: 3,
                total_duration_seconds: 500,
            },
        ]);

        assert_eq!(
            CATALOG_TRACKS_TOTAL.with_label_values(&["focus"]).get() as i64,
            12
        );
        assert_eq!(
            CATALOG_TRACKS_TOTAL.with_label_values(&["calm"]).get() as i64,
            3
        );
    }
}
