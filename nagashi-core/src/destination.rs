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

//! Snapshot destination trait and error types.
//!
//! A [`SnapshotDestination`] receives the full current content of one table at a
//! time and persists it as that table's snapshot artifact, replacing the previous
//! one. Unlike an append log, every write is the complete truth for that table.
//!
//! # Atomicity
//!
//! Implementations must make each table write all-or-nothing: a reader of the
//! artifact sees either the previous snapshot or the new one, never a truncated
//! file. Flushes can be triggered by an asynchronous stop request, so a write may
//! race process termination.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use nagashi_core::destination::{DestinationError, SnapshotDestination, SnapshotWrite};
//! use nagashi_core::value::Record;
//!
//! /// Prints each snapshot to stdout.
//! struct StdoutDestination;
//!
//! #[async_trait]
//! impl SnapshotDestination for StdoutDestination {
//!     async fn write_table(
//!         &mut self,
//!         table: &str,
//!         records: &[&Record],
//!     ) -> Result<SnapshotWrite, DestinationError> {
//!         let body = serde_json::to_vec(records)
//!             .map_err(|e| DestinationError::serialization(e, "Failed to encode snapshot"))?;
//!         println!("{table}: {}", String::from_utf8_lossy(&body));
//!         Ok(SnapshotWrite::new(format!("stdout:{table}"), body.len()))
//!     }
//! }
//! ```

use crate::value::Record;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Errors that can occur when writing a snapshot.
#[derive(Error, Debug)]
pub enum DestinationError {
    /// Failed to serialize the table content.
    ///
    /// Non-retryable: the same state will fail the same way.
    #[error("Serialization error: {message}")]
    SerializationError {
        /// Human-readable error message
        message: String,
        /// The underlying serialization error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Failed to persist the artifact.
    #[error("Write error: {message}")]
    WriteError {
        /// Human-readable error message
        message: String,
        /// Whether a later flush may succeed
        retryable: bool,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The table name cannot be mapped to an artifact.
    #[error("Invalid table name '{table}': {reason}")]
    InvalidTable {
        /// Offending table name
        table: String,
        /// Why it was rejected
        reason: String,
    },

    /// Invalid destination configuration.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Human-readable error message
        message: String,
        /// Configuration parameter name if applicable
        parameter: Option<String>,
    },
}

impl DestinationError {
    /// Creates a serialization error from any error type.
    #[must_use]
    pub fn serialization(
        source: impl std::error::Error + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self::SerializationError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a write error with retryability information.
    #[must_use]
    pub fn write(source: impl std::error::Error + Send + Sync + 'static, retryable: bool) -> Self {
        Self::WriteError {
            message: source.to_string(),
            retryable,
            source: Some(Box::new(source)),
        }
    }

    /// Creates a write error with a custom message.
    #[must_use]
    pub fn write_msg(message: impl Into<String>, retryable: bool) -> Self {
        Self::WriteError {
            message: message.into(),
            retryable,
            source: None,
        }
    }

    /// Creates an invalid table error.
    #[must_use]
    pub fn invalid_table(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidTable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn configuration(message: impl Into<String>, parameter: Option<String>) -> Self {
        Self::ConfigurationError {
            message: message.into(),
            parameter,
        }
    }

    /// Returns whether a later attempt may succeed.
    ///
    /// A failed table stays dirty and is written again on the next flush either
    /// way; this only affects how loudly the failure is reported.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::SerializationError { .. }
            | Self::InvalidTable { .. }
            | Self::ConfigurationError { .. } => false,
            Self::WriteError { retryable, .. } => *retryable,
        }
    }
}

/// Outcome of one successful table write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotWrite {
    /// Where the artifact was written (path, URI, ...)
    pub location: String,
    /// Bytes written
    pub bytes: usize,
}

impl SnapshotWrite {
    /// Creates a write outcome.
    pub fn new(location: impl Into<String>, bytes: usize) -> Self {
        Self {
            location: location.into(),
            bytes,
        }
    }
}

/// Metadata about a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationMetadata {
    /// Human-readable destination name (e.g., "JSON files")
    pub name: String,

    /// Destination type identifier used as a metric label (e.g., "file")
    pub destination_type: String,

    /// Whether table writes replace the artifact atomically
    pub atomic_writes: bool,

    /// Additional destination-specific metadata
    pub properties: HashMap<String, String>,
}

impl DestinationMetadata {
    /// Creates new metadata with required fields.
    #[must_use]
    pub fn new(name: impl Into<String>, destination_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            destination_type: destination_type.into(),
            atomic_writes: false,
            properties: HashMap::new(),
        }
    }

    /// Sets atomic write support.
    #[must_use]
    pub const fn with_atomic_writes(mut self, atomic: bool) -> Self {
        self.atomic_writes = atomic;
        self
    }

    /// Adds a custom property.
    #[must_use]
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// Persists per-table snapshots.
#[async_trait]
pub trait SnapshotDestination: Send + Sync {
    /// Replaces the snapshot of `table` with `records`.
    ///
    /// `records` may be empty; an empty table still gets an artifact (an empty
    /// array). Record field order must be preserved.
    async fn write_table(
        &mut self,
        table: &str,
        records: &[&Record],
    ) -> Result<SnapshotWrite, DestinationError>;

    /// Releases resources. Safe to call more than once.
    async fn close(&mut self) -> Result<(), DestinationError> {
        Ok(())
    }

    /// Describes this destination.
    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata::new("Unknown", "unknown")
    }
}

/// In-memory destination for tests.
///
/// Keeps the latest snapshot of every table plus a write history, and can be told
/// to fail writes for all or selected tables.
///
/// ```rust
/// use nagashi_core::destination::{MockDestination, SnapshotDestination};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut dest = MockDestination::new().with_failing_table("broken");
///
/// dest.write_table("users", &[]).await?;
/// assert!(dest.write_table("broken", &[]).await.is_err());
///
/// assert_eq!(dest.table("users"), Some(&[][..]));
/// assert_eq!(dest.write_count(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct MockDestination {
    /// Latest snapshot per table
    tables: BTreeMap<String, Vec<Record>>,
    /// Table name of every successful write, in order
    history: Vec<String>,
    /// Number of times close was called
    close_count: usize,
    /// Fail every write
    fail_writes: bool,
    /// Fail writes to these tables only
    failing_tables: HashSet<String>,
}

impl MockDestination {
    /// Creates a new mock destination.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the mock to fail all writes.
    #[must_use]
    pub const fn with_write_failures(mut self) -> Self {
        self.fail_writes = true;
        self
    }

    /// Configures the mock to fail writes to `table`.
    #[must_use]
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        self.failing_tables.insert(table.into());
        self
    }

    /// Stops failing writes to `table`.
    pub fn heal_table(&mut self, table: &str) {
        self.failing_tables.remove(table);
    }

    /// Latest snapshot of `table`.
    #[must_use]
    pub fn table(&self, table: &str) -> Option<&[Record]> {
        self.tables.get(table).map(Vec::as_slice)
    }

    /// Tables that have a snapshot, sorted.
    #[must_use]
    pub fn tables(&self) -> Vec<&str> {
        self.tables.keys().map(String::as_str).collect()
    }

    /// Total successful writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.history.len()
    }

    /// Successful writes of `table`.
    #[must_use]
    pub fn writes_for(&self, table: &str) -> usize {
        self.history.iter().filter(|t| *t == table).count()
    }

    /// Number of times close was called.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }

    /// Clears snapshots and counters.
    pub fn reset(&mut self) {
        self.tables.clear();
        self.history.clear();
        self.close_count = 0;
    }
}

#[async_trait]
impl SnapshotDestination for MockDestination {
    async fn write_table(
        &mut self,
        table: &str,
        records: &[&Record],
    ) -> Result<SnapshotWrite, DestinationError> {
        if self.fail_writes || self.failing_tables.contains(table) {
            return Err(DestinationError::write_msg(
                format!("Simulated write failure for {table}"),
                true,
            ));
        }

        let snapshot: Vec<Record> = records.iter().map(|r| (*r).clone()).collect();
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| DestinationError::serialization(e, "Failed to encode snapshot"))?
            .len();

        self.tables.insert(table.to_string(), snapshot);
        self.history.push(table.to_string());

        Ok(SnapshotWrite::new(format!("memory://{table}"), bytes))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        self.close_count += 1;
        Ok(())
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata::new("MockDestination", "mock").with_atomic_writes(true)
    }
}
