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

//! Snapshot flushing: hands each table's current state to a destination.
//!
//! A flush walks the selected tables in name order, writes each one, and marks it
//! clean only once the write succeeded. A failing table is logged and skipped; the
//! remaining tables are still attempted, and the failed one stays dirty so the next
//! flush retries it.

use crate::destination::SnapshotDestination;
use crate::metrics::{self, ErrorCategory, Timer};
use crate::state::TableStateStore;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, instrument};

/// Which tables a flush writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushScope {
    /// Every table in the store
    All,
    /// Only tables changed since their last successful write
    Dirty,
}

impl FlushScope {
    /// Returns the scope as a static string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Dirty => "dirty",
        }
    }
}

/// A table whose write failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTable {
    /// Table name
    pub table: String,
    /// Error description
    pub error: String,
}

/// Summary of one flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Tables written successfully, in write order
    pub written: Vec<String>,
    /// Tables whose write failed
    pub failed: Vec<FailedTable>,
    /// Total bytes written
    pub bytes: usize,
    /// Wall time of the flush
    pub elapsed: Duration,
}

impl FlushReport {
    /// Returns true when every selected table was written.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of tables attempted.
    #[must_use]
    pub fn attempted(&self) -> usize {
        self.written.len() + self.failed.len()
    }
}

/// Writes the selected tables of `store` to `destination`.
#[instrument(skip_all, fields(scope = scope.as_str()))]
pub async fn flush<D>(
    store: &mut TableStateStore,
    destination: &mut D,
    scope: FlushScope,
) -> FlushReport
where
    D: SnapshotDestination + ?Sized,
{
    let started = Instant::now();
    let destination_type = destination.metadata().destination_type;
    let _timer = Timer::new(scope.as_str(), |duration, scope| {
        metrics::record_flush_duration(duration, scope);
    });

    let tables: Vec<String> = match scope {
        FlushScope::All => store.tables().map(str::to_string).collect(),
        FlushScope::Dirty => store.dirty_tables(),
    };

    let mut report = FlushReport::default();

    for table in tables {
        let result = match store.snapshot_view(&table) {
            Some(records) => {
                debug!(table = %table, rows = records.len(), "Writing table snapshot");
                destination.write_table(&table, &records).await
            }
            None => continue,
        };

        match result {
            Ok(write) => {
                store.mark_clean(&table);
                metrics::increment_snapshot_writes(&destination_type);
                metrics::record_snapshot_bytes(write.bytes, &destination_type);
                report.bytes += write.bytes;
                report.written.push(table);
            }
            Err(e) => {
                error!(
                    table = %table,
                    error = %e,
                    retryable = e.is_retryable(),
                    "Failed to write table snapshot"
                );
                let category = if e.is_retryable() {
                    ErrorCategory::Io
                } else {
                    ErrorCategory::Serialization
                };
                metrics::increment_snapshot_write_errors(&destination_type, category);
                report.failed.push(FailedTable {
                    table,
                    error: e.to_string(),
                });
            }
        }
    }

    report.elapsed = started.elapsed();

    if report.attempted() > 0 {
        info!(
            written = report.written.len(),
            failed = report.failed.len(),
            bytes = report.bytes,
            elapsed_ms = report.elapsed.as_millis(),
            "Snapshot flush finished"
        );
    } else {
        debug!("Nothing to flush");
    }

    report
}
