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

//! Row change events as delivered by an event source.
//!
//! A [`ChangeEvent`] carries one or more positional row images for a single table.
//! Values are positional: they only gain column names once zipped with the table's
//! [`ColumnSchema`](crate::schema::ColumnSchema).
//!
//! # Example
//!
//! ```rust
//! use nagashi_core::event::{ChangeEvent, Namespace, OperationType};
//! use nagashi_core::value::ScalarValue;
//!
//! let event = ChangeEvent::insert(
//!     Namespace::new("shop", "users"),
//!     vec![vec![ScalarValue::Int(1), ScalarValue::from("Ann")]],
//! );
//!
//! assert_eq!(event.operation(), OperationType::Insert);
//! assert_eq!(event.table_name(), "users");
//! assert_eq!(event.row_count(), 1);
//! ```

use crate::value::ScalarValue;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Positional values of one row image.
pub type RowValues = Vec<ScalarValue>;

/// The three row-level mutations carried by the replication log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationType {
    /// Rows were inserted
    Insert,
    /// Rows were updated in place
    Update,
    /// Rows were deleted
    Delete,
}

impl OperationType {
    /// Returns the operation as a static string for logs and metric labels.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Database and table an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Namespace {
    /// Database (schema) name
    pub database: String,
    /// Table name
    pub table: String,
}

impl Namespace {
    /// Creates a new namespace.
    pub fn new(database: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            table: table.into(),
        }
    }

    /// Returns `database.table`.
    #[must_use]
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.table)
    }
}

/// Before and after images of an updated row.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateRow {
    /// Row values before the update
    pub before: RowValues,
    /// Row values after the update
    pub after: RowValues,
}

/// Row images of an event, shaped by operation.
#[derive(Debug, Clone, PartialEq)]
pub enum RowChanges {
    /// Inserted rows
    Insert(Vec<RowValues>),
    /// Updated rows with both images
    Update(Vec<UpdateRow>),
    /// Deleted rows (the values identify the row)
    Delete(Vec<RowValues>),
}

impl RowChanges {
    /// Operation these rows belong to.
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        match self {
            Self::Insert(_) => OperationType::Insert,
            Self::Update(_) => OperationType::Update,
            Self::Delete(_) => OperationType::Delete,
        }
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Insert(rows) | Self::Delete(rows) => rows.len(),
            Self::Update(rows) => rows.len(),
        }
    }

    /// Returns true when no rows are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Position of an event in the replication log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPosition {
    /// Log file name, when known
    pub file: Option<String>,
    /// Offset of the end of the event within the file
    pub offset: u64,
}

impl fmt::Display for LogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.file {
            Some(file) => write!(f, "{file}:{}", self.offset),
            None => write!(f, "?:{}", self.offset),
        }
    }
}

/// A row-level mutation event for one table.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeEvent {
    /// Database and table
    pub namespace: Namespace,
    /// Affected rows
    pub rows: RowChanges,
    /// When the server logged the change
    pub timestamp: DateTime<Utc>,
    /// Where the event sits in the log
    pub position: Option<LogPosition>,
}

impl ChangeEvent {
    /// Creates an event from its parts, stamped with the current time.
    #[must_use]
    pub fn new(namespace: Namespace, rows: RowChanges) -> Self {
        Self {
            namespace,
            rows,
            timestamp: Utc::now(),
            position: None,
        }
    }

    /// Creates an insert event.
    #[must_use]
    pub fn insert(namespace: Namespace, rows: Vec<RowValues>) -> Self {
        Self::new(namespace, RowChanges::Insert(rows))
    }

    /// Creates an update event.
    #[must_use]
    pub fn update(namespace: Namespace, rows: Vec<UpdateRow>) -> Self {
        Self::new(namespace, RowChanges::Update(rows))
    }

    /// Creates a delete event.
    #[must_use]
    pub fn delete(namespace: Namespace, rows: Vec<RowValues>) -> Self {
        Self::new(namespace, RowChanges::Delete(rows))
    }

    /// Sets the server timestamp.
    #[must_use]
    pub const fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Sets the log position.
    #[must_use]
    pub fn with_position(mut self, position: LogPosition) -> Self {
        self.position = Some(position);
        self
    }

    /// Operation type of this event.
    #[inline]
    #[must_use]
    pub const fn operation(&self) -> OperationType {
        self.rows.operation()
    }

    /// Table the event applies to.
    #[inline]
    #[must_use]
    pub fn table_name(&self) -> &str {
        &self.namespace.table
    }

    /// Number of rows carried.
    #[inline]
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operation_from_rows() {
        let ns = Namespace::new("db", "t");
        assert_eq!(
            ChangeEvent::insert(ns.clone(), vec![]).operation(),
            OperationType::Insert
        );
        assert_eq!(
            ChangeEvent::update(ns.clone(), vec![]).operation(),
            OperationType::Update
        );
        assert_eq!(
            ChangeEvent::delete(ns, vec![]).operation(),
            OperationType::Delete
        );
    }

    #[test]
    fn test_operation_serde() {
        let json = serde_json::to_string(&OperationType::Delete).unwrap();
        assert_eq!(json, "\"delete\"");
        let parsed: OperationType = serde_json::from_str("\"update\"").unwrap();
        assert_eq!(parsed, OperationType::Update);
    }

    #[test]
    fn test_row_count_for_update() {
        let event = ChangeEvent::update(
            Namespace::new("db", "t"),
            vec![UpdateRow {
                before: vec![ScalarValue::Int(1)],
                after: vec![ScalarValue::Int(1)],
            }],
        );
        assert_eq!(event.row_count(), 1);
        assert!(!event.rows.is_empty());
    }

    #[test]
    fn test_position_display() {
        let pos = LogPosition {
            file: Some("mysql-bin.000003".to_string()),
            offset: 1234,
        };
        assert_eq!(pos.to_string(), "mysql-bin.000003:1234");
    }

    #[test]
    fn test_namespace_full_name() {
        assert_eq!(Namespace::new("shop", "orders").full_name(), "shop.orders");
    }
}
