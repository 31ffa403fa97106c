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

//! Conversion of MySQL row values into scalars.
//!
//! Binlog row images carry some types in their storage form: `TIMESTAMP` as
//! epoch seconds, `ENUM` as a 1-based index, `SET` as a bitmask and `BIT` as
//! big-endian bytes. [`ColumnKind`] tells [`binlog_to_scalar`] how to read them.

use chrono::{DateTime, NaiveDate};
use mysql_async::binlog::value::BinlogValue;
use mysql_async::consts::ColumnType;
use mysql_async::Value;
use nagashi_core::stream::StreamError;
use nagashi_core::value::ScalarValue;

/// Converts a plain protocol value.
///
/// - Integers and floats map to their numeric scalars
/// - Byte strings become text, or lowercase hex when they are not valid UTF-8
/// - `DATE`/`DATETIME` become timestamps; zero or otherwise invalid
///   dates keep their literal text (`0000-00-00 00:00:00`)
/// - `TIME` becomes text such as `-838:59:59` (it is a duration, not a time of day)
#[must_use]
pub fn to_scalar(value: Value) -> ScalarValue {
    match value {
        Value::NULL => ScalarValue::Null,
        Value::Int(n) => ScalarValue::Int(n),
        Value::UInt(n) => ScalarValue::from(n),
        Value::Float(n) => ScalarValue::Float(f64::from(n)),
        Value::Double(n) => ScalarValue::Float(n),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => ScalarValue::Text(text),
            Err(e) => ScalarValue::Text(hex::encode(e.into_bytes())),
        },
        Value::Date(year, month, day, hour, minute, second, micros) => {
            NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
                .and_then(|date| {
                    date.and_hms_micro_opt(
                        u32::from(hour),
                        u32::from(minute),
                        u32::from(second),
                        micros,
                    )
                })
                .map_or_else(
                    || {
                        ScalarValue::Text(format_date_literal(
                            year, month, day, hour, minute, second, micros,
                        ))
                    },
                    ScalarValue::Timestamp,
                )
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if negative { "-" } else { "" };
            let total_hours = days * 24 + u32::from(hours);
            let mut text = format!("{sign}{total_hours:02}:{minutes:02}:{seconds:02}");
            if micros != 0 {
                text.push_str(&format!(".{micros:06}"));
            }
            ScalarValue::Text(text)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn format_date_literal(
    year: u16,
    month: u8,
    day: u8,
    hour: u8,
    minute: u8,
    second: u8,
    micros: u32,
) -> String {
    let mut text =
        format!("{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}");
    if micros != 0 {
        text.push_str(&format!(".{micros:06}"));
    }
    text
}

/// Text MySQL shows for a zero `DATETIME`/`TIMESTAMP`.
const ZERO_DATETIME: &str = "0000-00-00 00:00:00";

/// Decoding hint for one binlog column.
///
/// `Enum` and `Set` carry the column's labels in definition order. An empty
/// label list means the labels are unknown and the raw number is kept as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind<'a> {
    /// Decoded as is
    Plain,
    /// Epoch seconds
    Timestamp,
    /// 1-based index into the labels
    Enum(&'a [String]),
    /// Bitmask over the labels
    Set(&'a [String]),
    /// Big-endian bit field
    Bit,
}

impl<'a> ColumnKind<'a> {
    /// Picks the kind for a column type. `labels` is only consulted for
    /// `ENUM` and `SET`.
    #[must_use]
    pub fn for_column(column_type: ColumnType, labels: &'a [String]) -> Self {
        match column_type {
            ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_TIMESTAMP2 => Self::Timestamp,
            ColumnType::MYSQL_TYPE_ENUM => Self::Enum(labels),
            ColumnType::MYSQL_TYPE_SET => Self::Set(labels),
            ColumnType::MYSQL_TYPE_BIT => Self::Bit,
            _ => Self::Plain,
        }
    }

    /// True for `ENUM` and `SET` columns.
    #[must_use]
    pub const fn is_labelled(column_type: ColumnType) -> bool {
        matches!(
            column_type,
            ColumnType::MYSQL_TYPE_ENUM | ColumnType::MYSQL_TYPE_SET
        )
    }
}

/// Converts a value decoded from a binlog row image.
///
/// JSON columns are rendered as their compact JSON text.
///
/// # Errors
///
/// Returns a skippable [`StreamError::Decode`] for JSON that cannot be parsed and
/// for partial JSON updates, which only carry a diff against the previous value.
pub fn binlog_to_scalar(
    value: BinlogValue<'_>,
    kind: ColumnKind<'_>,
) -> Result<ScalarValue, StreamError> {
    match value {
        BinlogValue::Value(value) => Ok(column_to_scalar(value, kind)),
        BinlogValue::Jsonb(jsonb) => {
            let dom = jsonb
                .parse()
                .map_err(|e| StreamError::decode(format!("Invalid JSON column value: {e}")))?;
            Ok(ScalarValue::Text(serde_json::Value::from(dom).to_string()))
        }
        BinlogValue::JsonDiff(_) => Err(StreamError::decode(
            "Partial JSON updates are not supported; set binlog_row_value_options=''",
        )),
    }
}

fn column_to_scalar(value: Value, kind: ColumnKind<'_>) -> ScalarValue {
    if value == Value::NULL {
        return ScalarValue::Null;
    }

    match kind {
        ColumnKind::Plain => to_scalar(value),
        ColumnKind::Timestamp => timestamp_to_scalar(value),
        ColumnKind::Enum(labels) => match unsigned(&value, Endian::Little) {
            Some(index) => enum_label(index, labels),
            None => to_scalar(value),
        },
        ColumnKind::Set(labels) => match unsigned(&value, Endian::Little) {
            Some(mask) => set_labels(mask, labels),
            None => to_scalar(value),
        },
        ColumnKind::Bit => match unsigned(&value, Endian::Big) {
            Some(bits) => ScalarValue::from(bits),
            None => to_scalar(value),
        },
    }
}

#[derive(Clone, Copy)]
enum Endian {
    Little,
    Big,
}

/// Reads an integer value, or up to eight packed bytes.
fn unsigned(value: &Value, endian: Endian) -> Option<u64> {
    match value {
        Value::Int(n) => u64::try_from(*n).ok(),
        Value::UInt(n) => Some(*n),
        Value::Bytes(bytes) if bytes.len() <= 8 => {
            let fold = |acc: u64, byte: &u8| (acc << 8) | u64::from(*byte);
            Some(match endian {
                Endian::Big => bytes.iter().fold(0, fold),
                Endian::Little => bytes.iter().rev().fold(0, fold),
            })
        }
        _ => None,
    }
}

/// `TIMESTAMP` arrives as integer epoch seconds, `TIMESTAMP2` as text
/// `<secs>[.<fraction>]`. Epoch zero is MySQL's zero timestamp.
fn timestamp_to_scalar(value: Value) -> ScalarValue {
    let parsed = match &value {
        Value::Int(secs) => Some((*secs, 0)),
        Value::UInt(secs) => i64::try_from(*secs).ok().map(|secs| (secs, 0)),
        Value::Bytes(bytes) => std::str::from_utf8(bytes).ok().and_then(parse_epoch),
        _ => None,
    };

    match parsed {
        Some((0, 0)) => ScalarValue::Text(ZERO_DATETIME.to_string()),
        Some((secs, nanos)) => DateTime::from_timestamp(secs, nanos).map_or_else(
            || ScalarValue::Text(secs.to_string()),
            |ts| ScalarValue::Timestamp(ts.naive_utc()),
        ),
        None => to_scalar(value),
    }
}

/// Parses `<secs>[.<fraction>]` into seconds and nanoseconds.
fn parse_epoch(text: &str) -> Option<(i64, u32)> {
    let (secs, fraction) = text.split_once('.').unwrap_or((text, ""));
    let secs = secs.parse().ok()?;
    if fraction.is_empty() {
        return Some((secs, 0));
    }
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let nanos: u32 = format!("{fraction:0<9}").parse().ok()?;
    Some((secs, nanos))
}

/// Index 0 is the empty string MySQL stores for invalid values.
fn enum_label(index: u64, labels: &[String]) -> ScalarValue {
    if index == 0 {
        return ScalarValue::Text(String::new());
    }
    usize::try_from(index - 1)
        .ok()
        .and_then(|i| labels.get(i))
        .map_or_else(
            || ScalarValue::Text(index.to_string()),
            |label| ScalarValue::Text(label.clone()),
        )
}

/// Comma-joined labels of the set bits, as MySQL renders a `SET`.
fn set_labels(mask: u64, labels: &[String]) -> ScalarValue {
    if labels.is_empty() {
        return ScalarValue::Text(mask.to_string());
    }
    let members: Vec<&str> = labels
        .iter()
        .take(64)
        .enumerate()
        .filter(|(bit, _)| mask & (1 << bit) != 0)
        .map(|(_, label)| label.as_str())
        .collect();
    ScalarValue::Text(members.join(","))
}
