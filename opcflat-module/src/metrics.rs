// opcflat Module - Prometheus metrics definitions
// Copyright (c) 2025 David Martin Venti
//
// Dual-licensed under AGPL-3.0 and Commercial License.
// See LICENSE file for details.

//! Prometheus metrics for the module host.
//!
//! Counters mirror the engine's [`opcflat::Diagnostics`] but are labelled
//! by failure kind, so dropped messages can be told apart on a dashboard.

use lazy_static::lazy_static;
use opcflat::ErrorKind;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    /// Messages handed to the flattener.
    pub static ref MESSAGES_TOTAL: IntCounter = register_int_counter!(
        "opcflat_messages_total",
        "Total messages received by the flattener"
    ).unwrap();

    /// Messages flattened and forwarded.
    pub static ref FORWARDED_TOTAL: IntCounter = register_int_counter!(
        "opcflat_forwarded_total",
        "Total flattened messages forwarded downstream"
    ).unwrap();

    /// Dropped messages, labelled by error kind.
    pub static ref FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "opcflat_failures_total",
        "Total messages not forwarded, by error kind",
        &["kind"]
    ).unwrap();

    /// Top-level keys in the last forwarded body.
    pub static ref OUTPUT_KEYS: IntGauge = register_int_gauge!(
        "opcflat_output_keys",
        "Number of keys in the last flattened output"
    ).unwrap();
}

/// Count one inbound message.
pub fn record_received() {
    MESSAGES_TOTAL.inc();
}

/// Count one forwarded message and record its key count.
pub fn record_forwarded(output_keys: usize) {
    FORWARDED_TOTAL.inc();
    OUTPUT_KEYS.set(output_keys as i64);
}

/// Count one dropped message.
pub fn record_failure(kind: ErrorKind) {
    FAILURES_TOTAL.with_label_values(&[kind.as_str()]).inc();
}

/// Encode all metrics to Prometheus text format.
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}
