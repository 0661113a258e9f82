// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for stream-cache.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The embedding application is responsible for choosing the exporter
//! (Prometheus, OTEL, etc.)
//!
//! # Metric Naming Convention
//! - `stream_cache_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `store`: streams, events
//! - `operation`: get, query, insert, upsert, delete, create, update, fetch
//! - `status`: success, error, not_found, cycle, duplicate, unchanged

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record a store or coordinator operation outcome
pub fn record_operation(store: &str, operation: &str, status: &str) {
    counter!(
        "stream_cache_operations_total",
        "store" => store.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(store: &str, operation: &str, duration: Duration) {
    histogram!(
        "stream_cache_operation_seconds",
        "store" => store.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record a remote source request outcome
pub fn record_remote(operation: &str, status: &str) {
    counter!(
        "stream_cache_remote_requests_total",
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record remote request latency
pub fn record_remote_latency(operation: &str, duration: Duration) {
    histogram!(
        "stream_cache_remote_seconds",
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record the outcome of a timestamp-gated merge (created, updated, unchanged)
pub fn record_merge(store: &str, outcome: &str) {
    counter!(
        "stream_cache_merges_total",
        "store" => store.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Record stream ids newly recorded into the adaptive scope
pub fn record_scope_widened(count: usize) {
    counter!("stream_cache_scope_widened_total").increment(count as u64);
}

/// Set current item count for a store
pub fn set_store_items(store: &str, count: usize) {
    gauge!(
        "stream_cache_store_items",
        "store" => store.to_string()
    )
    .set(count as f64);
}

/// Set the last-synced high-water mark (epoch millis)
pub fn set_last_synced(timestamp: i64) {
    gauge!("stream_cache_last_synced_ms").set(timestamp as f64);
}

/// Set the number of writes awaiting remote confirmation
pub fn set_pending_writes(count: usize) {
    gauge!("stream_cache_pending_writes").set(count as f64);
}

/// Record a lifecycle phase duration (load, flush, shutdown)
pub fn record_lifecycle_phase(phase: &str, duration: Duration) {
    histogram!(
        "stream_cache_lifecycle_seconds",
        "phase" => phase.to_string()
    )
    .record(duration.as_secs_f64());
}
