// Copyright 2026 Nagashi Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

//! Metrics instrumentation for Nagashi monitors.
//!
//! Metrics go through the `metrics` facade, so any exporter can be installed by the
//! binary (the CLI offers Prometheus). Without an installed recorder every call is
//! a no-op.
//!
//! # Naming Conventions
//!
//! - Prefix with application name (nagashi\_)
//! - Include unit suffix (\_seconds, \_bytes)
//! - Counter metrics end with \_total
//!
//! # Labels
//!
//! - **table**: table name (low cardinality, bounded by the schema)
//! - **operation**: "insert", "update", "delete"
//! - **destination\_type**: e.g. "file"
//! - **error\_type**: one of [`ErrorCategory`]
//!
//! Never label with primary keys, timestamps or error messages.
//!
//! # Example
//!
//! ```rust
//! use nagashi_core::metrics;
//!
//! metrics::init_metrics();
//! metrics::increment_events_received("users", "insert");
//! metrics::set_tracked_rows(42, "users");
//! ```

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Metric name prefix for all Nagashi metrics.
#[doc(hidden)]
pub const METRIC_PREFIX: &str = "nagashi";

// ============================================================================
// Metric Name Constants
// ============================================================================

/// Row change events received from the source.
///
/// Type: Counter
/// Labels: table, operation
#[doc(hidden)]
pub const EVENTS_RECEIVED_TOTAL: &str = "nagashi_events_received_total";

/// Mutations applied to the state store.
///
/// Type: Counter
/// Labels: table, mutation
#[doc(hidden)]
pub const ROWS_APPLIED_TOTAL: &str = "nagashi_rows_applied_total";

/// Rows dropped because no primary key could be resolved.
///
/// Type: Counter
/// Labels: table, operation
const ROWS_SKIPPED_TOTAL: &str = "nagashi_rows_skipped_total";

/// Rows whose width did not match the loaded column list.
///
/// Type: Counter
/// Labels: table
const SCHEMA_MISMATCHES_TOTAL: &str = "nagashi_schema_mismatches_total";

/// Errors reported by the event source.
///
/// Type: Counter
/// Labels: error_type
const SOURCE_ERRORS_TOTAL: &str = "nagashi_source_errors_total";

/// Table snapshots written successfully.
///
/// Type: Counter
/// Labels: destination_type
const SNAPSHOT_WRITES_TOTAL: &str = "nagashi_snapshot_writes_total";

/// Table snapshot writes that failed.
///
/// Type: Counter
/// Labels: destination_type, error_type
const SNAPSHOT_WRITE_ERRORS_TOTAL: &str = "nagashi_snapshot_write_errors_total";

/// Time taken by a whole flush.
///
/// Type: Histogram
/// Labels: scope
/// Unit: seconds
#[doc(hidden)]
pub const FLUSH_DURATION_SECONDS: &str = "nagashi_flush_duration_seconds";

/// Size of one table snapshot.
///
/// Type: Histogram
/// Labels: destination_type
/// Unit: bytes
const SNAPSHOT_BYTES: &str = "nagashi_snapshot_bytes";

/// Tables held in the state store.
///
/// Type: Gauge
const TRACKED_TABLES: &str = "nagashi_tracked_tables";

/// Rows held per table.
///
/// Type: Gauge
/// Labels: table
const TRACKED_ROWS: &str = "nagashi_tracked_rows";

/// Monitor lifecycle state (see [`MonitorStatus`]).
///
/// Type: Gauge
const MONITOR_STATUS: &str = "nagashi_monitor_status";

// ============================================================================
// Initialization
// ============================================================================

/// Registers metric descriptions. Call once at startup, after installing a recorder.
pub fn init_metrics() {
    describe_counter!(
        EVENTS_RECEIVED_TOTAL,
        "Total number of row change events received from the replication log"
    );
    describe_counter!(
        ROWS_APPLIED_TOTAL,
        "Total number of upserts and removes applied to the materialized state"
    );
    describe_counter!(
        ROWS_SKIPPED_TOTAL,
        "Total number of rows dropped because no primary key could be resolved"
    );
    describe_counter!(
        SCHEMA_MISMATCHES_TOTAL,
        "Total number of rows whose width did not match the loaded column list"
    );
    describe_counter!(
        SOURCE_ERRORS_TOTAL,
        "Total number of errors reported by the event source"
    );
    describe_counter!(
        SNAPSHOT_WRITES_TOTAL,
        "Total number of table snapshots written"
    );
    describe_counter!(
        SNAPSHOT_WRITE_ERRORS_TOTAL,
        "Total number of failed table snapshot writes"
    );

    describe_histogram!(
        FLUSH_DURATION_SECONDS,
        metrics::Unit::Seconds,
        "Time taken to flush the selected tables"
    );
    describe_histogram!(
        SNAPSHOT_BYTES,
        metrics::Unit::Bytes,
        "Size of one written table snapshot"
    );

    describe_gauge!(
        TRACKED_TABLES,
        metrics::Unit::Count,
        "Number of tables held in the materialized state"
    );
    describe_gauge!(
        TRACKED_ROWS,
        metrics::Unit::Count,
        "Number of rows held per table"
    );
    describe_gauge!(
        MONITOR_STATUS,
        "Monitor state: 0=idle, 1=preflighted, 2=streaming, 3=stopping, 4=stopped"
    );
}

// ============================================================================
// Counter Metrics
// ============================================================================

/// Counts one received event.
pub fn increment_events_received(table: &str, operation: &str) {
    counter!(EVENTS_RECEIVED_TOTAL, "table" => table.to_string(), "operation" => operation.to_string())
        .increment(1);
}

/// Counts applied mutations of one kind ("upsert" or "remove").
pub fn increment_rows_applied(table: &str, mutation: &'static str, count: u64) {
    counter!(ROWS_APPLIED_TOTAL, "table" => table.to_string(), "mutation" => mutation)
        .increment(count);
}

/// Counts one row skipped for lack of a key.
pub fn increment_rows_skipped(table: &str, operation: &str) {
    counter!(ROWS_SKIPPED_TOTAL, "table" => table.to_string(), "operation" => operation.to_string())
        .increment(1);
}

/// Counts one row whose width did not match its schema.
pub fn increment_schema_mismatches(table: &str) {
    counter!(SCHEMA_MISMATCHES_TOTAL, "table" => table.to_string()).increment(1);
}

/// Counts one event source error.
pub fn increment_source_errors(error_category: ErrorCategory) {
    counter!(SOURCE_ERRORS_TOTAL, "error_type" => error_category.as_str()).increment(1);
}

/// Counts one successful snapshot write.
pub fn increment_snapshot_writes(destination_type: &str) {
    counter!(SNAPSHOT_WRITES_TOTAL, "destination_type" => destination_type.to_string())
        .increment(1);
}

/// Counts one failed snapshot write.
pub fn increment_snapshot_write_errors(destination_type: &str, error_category: ErrorCategory) {
    counter!(
        SNAPSHOT_WRITE_ERRORS_TOTAL,
        "destination_type" => destination_type.to_string(),
        "error_type" => error_category.as_str()
    )
    .increment(1);
}

// ============================================================================
// Histogram Metrics
// ============================================================================

/// Records the duration of a flush.
pub fn record_flush_duration(duration: Duration, scope: &str) {
    histogram!(FLUSH_DURATION_SECONDS, "scope" => scope.to_string()).record(duration.as_secs_f64());
}

/// Records the size of one snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn record_snapshot_bytes(bytes: usize, destination_type: &str) {
    histogram!(SNAPSHOT_BYTES, "destination_type" => destination_type.to_string())
        .record(bytes as f64);
}

// ============================================================================
// Gauge Metrics
// ============================================================================

/// Sets the number of tracked tables.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_tables(count: usize) {
    gauge!(TRACKED_TABLES).set(count as f64);
}

/// Sets the number of rows held for `table`.
#[allow(clippy::cast_precision_loss)]
pub fn set_tracked_rows(count: usize, table: &str) {
    gauge!(TRACKED_ROWS, "table" => table.to_string()).set(count as f64);
}

/// Sets the monitor status gauge.
pub fn set_monitor_status(status: MonitorStatus) {
    gauge!(MONITOR_STATUS).set(f64::from(status as u8));
}

// ============================================================================
// Label Types
// ============================================================================

/// Monitor lifecycle state for the `monitor_status` gauge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MonitorStatus {
    /// Created, schemas not loaded yet
    Idle = 0,
    /// Schemas loaded, ready to stream
    Preflighted = 1,
    /// Pulling events
    Streaming = 2,
    /// Final flush in progress
    Stopping = 3,
    /// Finished
    Stopped = 4,
}

/// Error categories for consistent metric labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection error (network, TCP, DNS failures)
    Connection,
    /// Server/protocol error reported by the database
    Protocol,
    /// Serialization or decoding error
    Serialization,
    /// Filesystem or other I/O error
    Io,
    /// Validation or configuration error
    Validation,
    /// Unknown error (unclassified)
    Unknown,
}

impl ErrorCategory {
    /// Returns the error category as a static string for metrics labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Connection => "connection_error",
            Self::Protocol => "protocol_error",
            Self::Serialization => "serialization_error",
            Self::Io => "io_error",
            Self::Validation => "validation_error",
            Self::Unknown => "unknown_error",
        }
    }
}

// ============================================================================
// Metric Helper Utilities
// ============================================================================

/// Records the elapsed time through `record_fn` when dropped.
///
/// ```rust
/// use nagashi_core::metrics::{self, Timer};
///
/// {
///     let _timer = Timer::new("all", |duration, scope| {
///         metrics::record_flush_duration(duration, scope);
///     });
///     // ... flush ...
/// }
/// ```
pub struct Timer<F>
where
    F: FnOnce(Duration, &str),
{
    start: std::time::Instant,
    label: String,
    record_fn: Option<F>,
}

impl<F> Timer<F>
where
    F: FnOnce(Duration, &str),
{
    /// Starts a timer.
    pub fn new(label: impl Into<String>, record_fn: F) -> Self {
        Self {
            start: std::time::Instant::now(),
            label: label.into(),
            record_fn: Some(record_fn),
        }
    }
}

impl<F> Drop for Timer<F>
where
    F: FnOnce(Duration, &str),
{
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        if let Some(record_fn) = self.record_fn.take() {
            record_fn(duration, &self.label);
        }
    }
}
