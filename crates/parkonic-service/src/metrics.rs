//! Prometheus metrics for ticket ingestion.

use lazy_static::lazy_static;
use prometheus::{register_int_counter_vec, Encoder, IntCounterVec, TextEncoder};

lazy_static! {
    /// Ingested tickets by table and outcome (inserted, merged, duplicate, failed).
    pub static ref INGEST_TOTAL: IntCounterVec = register_int_counter_vec!(
        "parkonic_ingest_total",
        "Tickets processed by the ingestion service",
        &["table", "outcome"]
    )
    .unwrap();

    /// Input values dropped during lenient coercion, by column.
    pub static ref COERCION_WARNINGS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "parkonic_coercion_warnings_total",
        "Input values that could not be parsed and were stored as NULL",
        &["column"]
    )
    .unwrap();
}

/// Renders every registered metric in the Prometheus text format.
pub fn gather() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(err) = encoder.encode(&metric_families, &mut buffer) {
        tracing::warn!(error = %err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}
