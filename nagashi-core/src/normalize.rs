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

//! Event Normalizer: folds the three event shapes into one mutation model.
//!
//! | event  | image used          | mutation |
//! |--------|---------------------|----------|
//! | insert | row values          | upsert   |
//! | update | after image only    | upsert   |
//! | delete | row values (key)    | remove   |
//!
//! Rows whose key cannot be resolved produce no mutation at all.

use crate::event::{ChangeEvent, OperationType, RowChanges};
use crate::key::KeyStrategy;
use crate::metrics;
use crate::schema::SchemaRegistry;
use crate::value::{PrimaryKey, Record};
use tracing::warn;

/// A canonical change against the materialized state.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Set `key` to `record`, replacing any prior record.
    Upsert {
        /// Table name
        table: String,
        /// Row identity
        key: PrimaryKey,
        /// Complete new row
        record: Record,
    },
    /// Delete `key` if present.
    Remove {
        /// Table name
        table: String,
        /// Row identity
        key: PrimaryKey,
    },
}

impl Mutation {
    /// Table this mutation targets.
    #[must_use]
    pub fn table(&self) -> &str {
        match self {
            Self::Upsert { table, .. } | Self::Remove { table, .. } => table,
        }
    }

    /// Key this mutation targets.
    #[must_use]
    pub const fn key(&self) -> &PrimaryKey {
        match self {
            Self::Upsert { key, .. } | Self::Remove { key, .. } => key,
        }
    }

    /// Label for logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Upsert { .. } => "upsert",
            Self::Remove { .. } => "remove",
        }
    }
}

/// Result of normalizing one event.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedEvent {
    /// Table the event belongs to
    pub table: String,
    /// Operation of the source event
    pub operation: OperationType,
    /// Mutations in row order
    pub mutations: Vec<Mutation>,
    /// Rows dropped because their key could not be resolved
    pub skipped: usize,
}

/// Converts [`ChangeEvent`]s into [`Mutation`]s.
#[derive(Debug, Clone, Default)]
pub struct EventNormalizer {
    keys: KeyStrategy,
}

impl EventNormalizer {
    /// Creates a normalizer using `keys` to identify rows.
    #[must_use]
    pub const fn new(keys: KeyStrategy) -> Self {
        Self { keys }
    }

    /// Key strategy in use.
    #[must_use]
    pub const fn keys(&self) -> &KeyStrategy {
        &self.keys
    }

    /// Normalizes one event against the registry's column lists.
    pub fn normalize(&self, registry: &SchemaRegistry, event: ChangeEvent) -> NormalizedEvent {
        let table = event.namespace.table;
        let operation = event.rows.operation();

        let images = match event.rows {
            RowChanges::Insert(rows) | RowChanges::Delete(rows) => rows,
            RowChanges::Update(rows) => rows.into_iter().map(|row| row.after).collect(),
        };

        let mut mutations = Vec::with_capacity(images.len());
        let mut skipped = 0;

        for values in images {
            let record = registry.zip(&table, values);
            let Some(key) = self.keys.extract(&table, &record) else {
                warn!(
                    table = %table,
                    operation = %operation,
                    key = %self.keys.for_table(&table).describe(),
                    "Skipping row without a resolvable primary key"
                );
                metrics::increment_rows_skipped(&table, operation.as_str());
                skipped += 1;
                continue;
            };

            let mutation = match operation {
                OperationType::Insert | OperationType::Update => Mutation::Upsert {
                    table: table.clone(),
                    key,
                    record,
                },
                OperationType::Delete => Mutation::Remove {
                    table: table.clone(),
                    key,
                },
            };
            mutations.push(mutation);
        }

        NormalizedEvent {
            table,
            operation,
            mutations,
            skipped,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Namespace, UpdateRow};
    use crate::key::ColumnKey;
    use crate::schema::ColumnSchema;
    use crate::value::ScalarValue;

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new("shop");
        registry.insert("users", ColumnSchema::new(["id", "name"]).unwrap());
        registry
    }

    fn ns() -> Namespace {
        Namespace::new("shop", "users")
    }

    #[test]
    fn test_insert_becomes_upsert() {
        let event = ChangeEvent::insert(ns(), vec![vec![ScalarValue::Int(1), "Ann".into()]]);
        let out = EventNormalizer::default().normalize(&registry(), event);

        assert_eq!(out.table, "users");
        assert_eq!(out.skipped, 0);
        match &out.mutations[..] {
            [Mutation::Upsert { key, record, .. }] => {
                assert_eq!(key, &PrimaryKey::Int(1));
                assert_eq!(record.get("name"), Some(&ScalarValue::from("Ann")));
            }
            other => panic!("unexpected mutations: {other:?}"),
        }
    }

    #[test]
    fn test_update_uses_after_image() {
        let event = ChangeEvent::update(
            ns(),
            vec![UpdateRow {
                before: vec![ScalarValue::Int(1), "Ann".into()],
                after: vec![ScalarValue::Int(1), "Anne".into()],
            }],
        );
        let out = EventNormalizer::default().normalize(&registry(), event);

        match &out.mutations[..] {
            [Mutation::Upsert { record, .. }] => {
                assert_eq!(record.get("name"), Some(&ScalarValue::from("Anne")));
            }
            other => panic!("unexpected mutations: {other:?}"),
        }
    }

    #[test]
    fn test_delete_becomes_remove() {
        let event = ChangeEvent::delete(ns(), vec![vec![ScalarValue::Int(1), "Anne".into()]]);
        let out = EventNormalizer::default().normalize(&registry(), event);

        assert_eq!(
            out.mutations,
            vec![Mutation::Remove {
                table: "users".to_string(),
                key: PrimaryKey::Int(1)
            }]
        );
    }

    #[test]
    fn test_unkeyable_rows_are_skipped() {
        let event = ChangeEvent::insert(
            ns(),
            vec![
                vec![ScalarValue::Null, "ghost".into()],
                vec![ScalarValue::Int(2), "Bo".into()],
            ],
        );
        let out = EventNormalizer::default().normalize(&registry(), event);

        assert_eq!(out.skipped, 1);
        assert_eq!(out.mutations.len(), 1);
        assert_eq!(out.mutations[0].key(), &PrimaryKey::Int(2));
    }

    #[test]
    fn test_table_without_schema_skips_everything() {
        let event = ChangeEvent::insert(Namespace::new("shop", "unknown"), vec![vec![ScalarValue::Int(2)]]);
        let out = EventNormalizer::default().normalize(&registry(), event);

        assert_eq!(out.table, "unknown");
        assert!(out.mutations.is_empty());
        assert_eq!(out.skipped, 1);
    }

    #[test]
    fn test_custom_key_column() {
        let normalizer =
            EventNormalizer::new(KeyStrategy::default().with_table("users", ColumnKey::single("name")));
        let event = ChangeEvent::insert(ns(), vec![vec![ScalarValue::Null, "Ann".into()]]);
        let out = normalizer.normalize(&registry(), event);

        assert_eq!(out.mutations[0].key(), &PrimaryKey::from("Ann"));
        assert_eq!(out.mutations[0].kind(), "upsert");
    }
}
