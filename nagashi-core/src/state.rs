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

//! Table State Store: the materialized latest state of every table.
//!
//! The store maps table name to a key-ordered map of primary key to record. It has a
//! single writer (the monitor loop), so it is a plain owned structure with no
//! locking. After any prefix of the event stream its content equals the in-order
//! fold of every upsert and remove seen so far.
//!
//! The store also tracks which tables changed since their last successful snapshot
//! ("dirty" tables), so periodic flushes only rewrite what changed.

use crate::normalize::Mutation;
use crate::value::{PrimaryKey, Record};
use std::collections::{BTreeMap, BTreeSet};

/// Key to record map of one table.
pub type TableState = BTreeMap<PrimaryKey, Record>;

/// Effect of applying one mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Upsert created a new key
    Inserted,
    /// Upsert replaced an existing record
    Replaced,
    /// Remove deleted an existing record
    Removed,
    /// Remove targeted a key that was not present
    Absent,
}

/// All tables' materialized state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStateStore {
    tables: BTreeMap<String, TableState>,
    dirty: BTreeSet<String>,
}

impl TableStateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes sure `table` exists, empty if new.
    ///
    /// A newly created table is dirty so that its (empty) snapshot gets written.
    pub fn ensure_table(&mut self, table: &str) -> &mut TableState {
        if !self.tables.contains_key(table) {
            self.dirty.insert(table.to_string());
        }
        self.tables.entry(table.to_string()).or_default()
    }

    /// Applies one mutation.
    pub fn apply(&mut self, mutation: Mutation) -> ApplyOutcome {
        match mutation {
            Mutation::Upsert { table, key, record } => {
                let state = self.ensure_table(&table);
                let outcome = match state.insert(key, record) {
                    Some(_) => ApplyOutcome::Replaced,
                    None => ApplyOutcome::Inserted,
                };
                self.dirty.insert(table);
                outcome
            }
            Mutation::Remove { table, key } => {
                let removed = self
                    .tables
                    .get_mut(&table)
                    .and_then(|state| state.remove(&key))
                    .is_some();
                if removed {
                    self.dirty.insert(table);
                    ApplyOutcome::Removed
                } else {
                    ApplyOutcome::Absent
                }
            }
        }
    }

    /// Current records of `table` in key order, or `None` for an unknown table.
    #[must_use]
    pub fn snapshot_view(&self, table: &str) -> Option<Vec<&Record>> {
        self.tables.get(table).map(|state| state.values().collect())
    }

    /// State of one table.
    #[must_use]
    pub fn table(&self, table: &str) -> Option<&TableState> {
        self.tables.get(table)
    }

    /// Record stored under `key` in `table`.
    #[must_use]
    pub fn get(&self, table: &str, key: &PrimaryKey) -> Option<&Record> {
        self.tables.get(table).and_then(|state| state.get(key))
    }

    /// Names of all known tables, sorted.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of known tables.
    #[must_use]
    pub fn table_count(&self) -> usize {
        self.tables.len()
    }

    /// Number of rows in `table` (0 if unknown).
    #[must_use]
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, BTreeMap::len)
    }

    /// Number of rows across all tables.
    #[must_use]
    pub fn total_rows(&self) -> usize {
        self.tables.values().map(BTreeMap::len).sum()
    }

    /// Returns true when `table` changed since its last successful snapshot.
    #[must_use]
    pub fn is_dirty(&self, table: &str) -> bool {
        self.dirty.contains(table)
    }

    /// Tables changed since their last successful snapshot, sorted.
    #[must_use]
    pub fn dirty_tables(&self) -> Vec<String> {
        self.dirty.iter().cloned().collect()
    }

    /// Records that `table` has been written out in its current state.
    pub fn mark_clean(&mut self, table: &str) {
        self.dirty.remove(table);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ScalarValue;

    fn rec(id: i64, name: &str) -> Record {
        let mut r = Record::new();
        r.insert("id".to_string(), ScalarValue::Int(id));
        r.insert("name".to_string(), ScalarValue::from(name));
        r
    }

    fn upsert(id: i64, name: &str) -> Mutation {
        Mutation::Upsert {
            table: "users".to_string(),
            key: PrimaryKey::Int(id),
            record: rec(id, name),
        }
    }

    fn remove(id: i64) -> Mutation {
        Mutation::Remove {
            table: "users".to_string(),
            key: PrimaryKey::Int(id),
        }
    }

    #[test]
    fn test_upsert_creates_and_replaces() {
        let mut store = TableStateStore::new();
        assert_eq!(store.apply(upsert(1, "Ann")), ApplyOutcome::Inserted);
        assert_eq!(store.apply(upsert(1, "Anne")), ApplyOutcome::Replaced);

        assert_eq!(store.row_count("users"), 1);
        assert_eq!(
            store.get("users", &PrimaryKey::Int(1)),
            Some(&rec(1, "Anne"))
        );
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut store = TableStateStore::new();
        store.apply(upsert(1, "Ann"));
        store.apply(upsert(2, "Bo"));

        assert_eq!(store.apply(remove(1)), ApplyOutcome::Removed);
        let once = store.clone();
        assert_eq!(store.apply(remove(1)), ApplyOutcome::Absent);

        assert_eq!(store, once);
    }

    #[test]
    fn test_remove_on_unknown_table_does_not_create_it() {
        let mut store = TableStateStore::new();
        assert_eq!(store.apply(remove(1)), ApplyOutcome::Absent);
        assert_eq!(store.table_count(), 0);
    }

    #[test]
    fn test_snapshot_view_is_key_ordered() {
        let mut store = TableStateStore::new();
        store.apply(upsert(3, "C"));
        store.apply(upsert(1, "A"));
        store.apply(upsert(2, "B"));

        let view = store.snapshot_view("users").unwrap();
        let ids: Vec<_> = view.iter().map(|r| r["id"].clone()).collect();
        assert_eq!(
            ids,
            vec![ScalarValue::Int(1), ScalarValue::Int(2), ScalarValue::Int(3)]
        );
        assert!(store.snapshot_view("nope").is_none());
    }

    #[test]
    fn test_empty_table_is_tracked() {
        let mut store = TableStateStore::new();
        store.ensure_table("empty");

        assert_eq!(store.tables().collect::<Vec<_>>(), vec!["empty"]);
        assert_eq!(store.snapshot_view("empty"), Some(vec![]));
        assert!(store.is_dirty("empty"));
    }

    #[test]
    fn test_dirty_tracking() {
        let mut store = TableStateStore::new();
        store.apply(upsert(1, "Ann"));
        assert_eq!(store.dirty_tables(), vec!["users".to_string()]);

        store.mark_clean("users");
        assert!(!store.is_dirty("users"));

        // A no-op remove leaves the table clean
        store.apply(remove(42));
        assert!(!store.is_dirty("users"));

        store.apply(remove(1));
        assert!(store.is_dirty("users"));
        assert_eq!(store.total_rows(), 0);
    }
}
