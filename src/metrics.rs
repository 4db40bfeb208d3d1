//! Prometheus metrics for the query adapter
//!
//! Counts queries, cache lookups and decode failures, and tracks query
//! latency per operation.

use lazy_static::lazy_static;
use prometheus::{
    register_counter_vec, register_histogram_vec, CounterVec, Encoder, HistogramVec, TextEncoder,
};

lazy_static! {
    /// Total queries issued, by operation and outcome
    pub static ref QUERIES_TOTAL: CounterVec = register_counter_vec!(
        "graphite_queries_total",
        "Total render queries issued",
        &["operation", "status"]
    ).unwrap();

    /// Cache lookups, by backend and hit/miss
    pub static ref CACHE_LOOKUPS_TOTAL: CounterVec = register_counter_vec!(
        "graphite_cache_lookups_total",
        "Response cache lookups",
        &["backend", "result"]
    ).unwrap();

    /// Decode failures, by kind
    pub static ref DECODE_ERRORS_TOTAL: CounterVec = register_counter_vec!(
        "graphite_decode_errors_total",
        "Responses that failed to decode",
        &["kind"]
    ).unwrap();

    /// Query latency, including cache lookup
    pub static ref QUERY_DURATION: HistogramVec = register_histogram_vec!(
        "graphite_query_duration_seconds",
        "Render query latency in seconds",
        &["operation"],
        vec![0.001, 0.01, 0.1, 0.5, 1.0, 5.0, 30.0]
    ).unwrap();
}

/// Get metrics in Prometheus text format
pub fn gather_metrics() -> Result<String, String> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];

    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| format!("Failed to encode metrics: {}", e))?;

    String::from_utf8(buffer).map_err(|e| format!("Metrics contain invalid UTF-8: {}", e))
}

/// Record one query
#[inline]
pub fn record_query(operation: &str, duration_secs: f64, success: bool) {
    let status = if success { "success" } else { "error" };

    QUERIES_TOTAL.with_label_values(&[operation, status]).inc();
    QUERY_DURATION
        .with_label_values(&[operation])
        .observe(duration_secs);
}

/// Record a cache lookup
#[inline]
pub fn record_cache_lookup(backend: &str, hit: bool) {
    let result = if hit { "hit" } else { "miss" };
    CACHE_LOOKUPS_TOTAL.with_label_values(&[backend, result]).inc();
}

/// Record a decode failure
#[inline]
pub fn record_decode_error(kind: &str) {
    DECODE_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_query() {
        record_query("graphite", 0.01, true);
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("graphite_queries_total"));
        assert!(metrics.contains("graphite_query_duration_seconds"));
    }

    #[test]
    fn test_record_cache_lookup() {
        let before = CACHE_LOOKUPS_TOTAL
            .with_label_values(&["test", "hit"])
            .get();
        record_cache_lookup("test", true);
        let after = CACHE_LOOKUPS_TOTAL
            .with_label_values(&["test", "hit"])
            .get();
        assert_eq!(after - before, 1.0);
    }

    #[test]
    fn test_record_decode_error() {
        record_decode_error("empty_response");
        let metrics = gather_metrics().expect("Failed to gather metrics");
        assert!(metrics.contains("graphite_decode_errors_total"));
    }
}
