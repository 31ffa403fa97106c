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

//! Shared fixtures for the Nagashi benchmarks.

use chrono::{DateTime, NaiveDateTime};
use nagashi_core::event::{ChangeEvent, Namespace, RowValues, UpdateRow};
use nagashi_core::schema::{ColumnSchema, SchemaRegistry};
use nagashi_core::value::ScalarValue;

/// Database used by every fixture.
pub const DATABASE: &str = "bench_db";

/// Column list of the `users` fixture table.
pub const USER_COLUMNS: [&str; 6] = ["id", "email", "name", "age", "balance", "created_at"];

/// Registry holding the `users` table.
#[must_use]
pub fn user_registry() -> SchemaRegistry {
    let mut registry = SchemaRegistry::new(DATABASE);
    if let Ok(schema) = ColumnSchema::new(USER_COLUMNS) {
        registry.insert("users", schema);
    }
    registry
}

fn created_at(i: usize) -> NaiveDateTime {
    DateTime::from_timestamp(1_700_000_000 + i as i64, 0)
        .unwrap_or_default()
        .naive_utc()
}

/// Row values for user `id`, in column order.
#[must_use]
pub fn user_row(id: usize, version: usize) -> RowValues {
    vec![
        ScalarValue::Int(id as i64),
        ScalarValue::Text(format!("user_{id}@example.com")),
        ScalarValue::Text(format!("User {id} v{version}")),
        ScalarValue::Int(20 + (id % 50) as i64),
        ScalarValue::Float(id as f64 * 123.45),
        ScalarValue::Timestamp(created_at(id)),
    ]
}

/// Single-row inserts for users `0..count`.
#[must_use]
pub fn insert_events(count: usize) -> Vec<ChangeEvent> {
    (0..count)
        .map(|i| ChangeEvent::insert(Namespace::new(DATABASE, "users"), vec![user_row(i, 0)]))
        .collect()
}

/// Events over `keys` distinct users: one insert per user, then updates with
/// every seventh event a delete.
#[must_use]
pub fn mixed_events(count: usize, keys: usize) -> Vec<ChangeEvent> {
    let keys = keys.max(1);
    (0..count)
        .map(|i| {
            let id = i % keys;
            let ns = Namespace::new(DATABASE, "users");
            if i < keys {
                ChangeEvent::insert(ns, vec![user_row(id, 0)])
            } else if i % 7 == 0 {
                ChangeEvent::delete(ns, vec![user_row(id, i)])
            } else {
                ChangeEvent::update(
                    ns,
                    vec![UpdateRow {
                        before: user_row(id, i - 1),
                        after: user_row(id, i),
                    }],
                )
            }
        })
        .collect()
}
