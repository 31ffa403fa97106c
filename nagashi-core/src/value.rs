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

//! Scalar values, records and primary keys.
//!
//! Row images arrive from the replication log as positional [`ScalarValue`]s. Once
//! zipped with a table's column list they become a [`Record`]: an insertion-ordered
//! map from column name to value, so snapshots keep the table's column order.
//!
//! # Serialization
//!
//! Records serialize to plain JSON objects. Timestamps are rendered as ISO-8601
//! strings without a timezone suffix, with microseconds only when present:
//!
//! ```rust
//! use chrono::NaiveDate;
//! use nagashi_core::value::{Record, ScalarValue};
//!
//! let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
//!     .and_then(|d| d.and_hms_opt(12, 30, 0))
//!     .unwrap();
//!
//! let mut record = Record::new();
//! record.insert("id".to_string(), ScalarValue::Int(1));
//! record.insert("updated_at".to_string(), ScalarValue::Timestamp(ts));
//!
//! let json = serde_json::to_string(&record).unwrap();
//! assert_eq!(json, r#"{"id":1,"updated_at":"2024-03-01T12:30:00"}"#);
//! ```

use chrono::{NaiveDateTime, Timelike};
use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A named row: column name to value, in column order.
pub type Record = IndexMap<String, ScalarValue>;

/// A single column value as delivered by the event source.
///
/// Only flat scalars exist; nested structures are not part of the model.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    /// SQL NULL
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer
    Int(i64),
    /// Unsigned integer that does not fit in `i64`
    UInt(u64),
    /// Floating point number
    Float(f64),
    /// Text (also used for decimals, times and binary data rendered as hex)
    Text(String),
    /// Date and time without timezone
    Timestamp(NaiveDateTime),
}

impl ScalarValue {
    /// Returns true for [`ScalarValue::Null`].
    #[inline]
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Short type name, used in diagnostics.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::Float(_) => "float",
            Self::Text(_) => "text",
            Self::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for ScalarValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for ScalarValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u64> for ScalarValue {
    fn from(v: u64) -> Self {
        i64::try_from(v).map_or(Self::UInt(v), Self::Int)
    }
}

impl From<f64> for ScalarValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for ScalarValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for ScalarValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<NaiveDateTime> for ScalarValue {
    fn from(v: NaiveDateTime) -> Self {
        Self::Timestamp(v)
    }
}

impl<T: Into<ScalarValue>> From<Option<T>> for ScalarValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Text(v) => serializer.serialize_str(v),
            Self::Timestamp(v) => serializer.serialize_str(&iso8601(v)),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&iso8601(v)),
        }
    }
}

/// Renders a timestamp as ISO-8601 (`YYYY-MM-DDTHH:MM:SS[.ffffff]`).
#[must_use]
pub fn iso8601(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

/// Total-ordered wrapper so floating point values can key a table.
#[derive(Debug, Clone, Copy)]
pub struct FloatKey(pub f64);

impl PartialEq for FloatKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for FloatKey {}

impl PartialOrd for FloatKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for FloatKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Hash for FloatKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.to_bits().hash(state);
    }
}

/// Identity of a row within one table.
///
/// Integer keys are normalized so that the same number always maps to the same
/// key regardless of whether the source reported it signed or unsigned.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PrimaryKey {
    /// Boolean key
    Bool(bool),
    /// Integer key (signed, or unsigned values that fit)
    Int(i64),
    /// Unsigned key above `i64::MAX`
    UInt(u64),
    /// Floating point key
    Float(FloatKey),
    /// Textual key
    Text(String),
    /// Timestamp key
    Timestamp(NaiveDateTime),
    /// Multi-column key, in key-column order
    Composite(Vec<PrimaryKey>),
}

impl PrimaryKey {
    /// Converts a scalar into a key. Returns `None` for NULL.
    #[must_use]
    pub fn from_scalar(value: &ScalarValue) -> Option<Self> {
        match value {
            ScalarValue::Null => None,
            ScalarValue::Bool(v) => Some(Self::Bool(*v)),
            ScalarValue::Int(v) => Some(Self::Int(*v)),
            ScalarValue::UInt(v) => Some(i64::try_from(*v).map_or(Self::UInt(*v), Self::Int)),
            ScalarValue::Float(v) => Some(Self::Float(FloatKey(*v))),
            ScalarValue::Text(v) => Some(Self::Text(v.clone())),
            ScalarValue::Timestamp(v) => Some(Self::Timestamp(*v)),
        }
    }
}

impl From<i64> for PrimaryKey {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<&str> for PrimaryKey {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::UInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{}", v.0),
            Self::Text(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&iso8601(v)),
            Self::Composite(parts) => {
                f.write_str("(")?;
                for (i, part) in parts.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{part}")?;
                }
                f.write_str(")")
            }
        }
    }
}
