//! Prometheus metrics for the ARGUS hub.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()` intentionally. If registration fails,
//! it indicates a fatal configuration error (e.g., duplicate metric names)
//! that should crash at startup rather than fail silently. These panics only
//! occur during static initialization, never at runtime.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_gauge,
    register_int_gauge_vec, CounterVec, HistogramVec, IntCounter, IntGauge, IntGaugeVec,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Notifications appended to the store.
pub static NOTIFICATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "argus_notifications_total",
        "Notifications appended to the store",
        &["source", "priority"]
    )
    .unwrap()
});

/// Duplicate submissions rejected by dedup key.
pub static DEDUP_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "argus_dedup_hits_total",
        "Duplicate submissions short-circuited by dedup key"
    )
    .unwrap()
});

/// Summarizer failures that fell back to deterministic truncation.
pub static SUMMARIZER_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "argus_summarizer_failures_total",
        "AI summarizer failures (fallback summary used)"
    )
    .unwrap()
});

/// Summary cache hits.
pub static SUMMARY_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "argus_summary_cache_hits_total",
        "Summary cache hits (AI call avoided)"
    )
    .unwrap()
});

/// Poll cycles per source and outcome.
pub static POLL_CYCLES_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "argus_poll_cycles_total",
        "Poll cycles by source and outcome",
        &["source", "outcome"]
    )
    .unwrap()
});

/// Current poller backoff multiplier per source.
pub static POLLER_BACKOFF_MULTIPLIER: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "argus_poller_backoff_multiplier",
        "Current interval multiplier per source (1 = nominal)",
        &["source"]
    )
    .unwrap()
});

/// Alert evaluations and triggers.
pub static ALERT_TRIGGERS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "argus_alert_triggers_total",
        "Alert triggers by symbol and alert type",
        &["symbol", "alert_type"]
    )
    .unwrap()
});

/// Threat emissions by grade.
pub static THREAT_EMITTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "argus_threat_emitted_total",
        "Risk alerts emitted by threat grade",
        &["grade"]
    )
    .unwrap()
});

/// TTS synthesis attempts by provider and outcome.
pub static TTS_SYNTH_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "argus_tts_synth_total",
        "TTS synthesis attempts by provider and outcome",
        &["provider", "outcome"]
    )
    .unwrap()
});

/// TTS cache hits.
pub static TTS_CACHE_HITS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("argus_tts_cache_hits_total", "TTS audio cache hits").unwrap()
});

/// Connected WebSocket sessions per topic.
pub static WS_SESSIONS: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "argus_ws_sessions",
        "Connected WebSocket sessions per topic",
        &["topic"]
    )
    .unwrap()
});

/// Sessions closed for lagging.
pub static SESSIONS_LAGGING_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "argus_sessions_lagging_total",
        "Sessions closed because their send buffer overflowed"
    )
    .unwrap()
});

/// Store size.
pub static STORE_SIZE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("argus_store_size", "Notifications currently retained").unwrap()
});

/// Time from store append to presentation start, per priority.
pub static PRESENTATION_DELAY_SECONDS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "argus_presentation_delay_seconds",
        "Delay between store append and presentation start",
        &["priority"],
        vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0]
    )
    .unwrap()
});

/// Encode all registered metrics in the prometheus text format.
pub fn encode_metrics() -> TelemetryResult<String> {
    use prometheus::Encoder;
    let encoder = prometheus::TextEncoder::new();
    let families = prometheus::gather();
    let mut buf = Vec::new();
    encoder
        .encode(&families, &mut buf)
        .map_err(|e| TelemetryError::MetricsEncode(e.to_string()))?;
    String::from_utf8(buf).map_err(|e| TelemetryError::MetricsEncode(e.to_string()))
}
