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

//! Primary key extraction.
//!
//! Each table resolves row identity through a [`KeyExtractor`]. The default is the
//! single column `id`; tables can be given other or composite key columns, or any
//! closure `Fn(&Record) -> Option<PrimaryKey>`.

use crate::value::{PrimaryKey, Record};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Column used as the key when nothing else is configured.
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// Resolves the primary key of a record.
///
/// Returning `None` means the row cannot be identified; such rows are skipped.
pub trait KeyExtractor: Send + Sync {
    /// Extracts the key from `record`.
    fn extract(&self, record: &Record) -> Option<PrimaryKey>;

    /// Short description for logs.
    fn describe(&self) -> String {
        "custom".to_string()
    }
}

impl<F> KeyExtractor for F
where
    F: Fn(&Record) -> Option<PrimaryKey> + Send + Sync,
{
    fn extract(&self, record: &Record) -> Option<PrimaryKey> {
        self(record)
    }
}

/// Key made of one or more named columns.
///
/// All key columns must be present and non-null, otherwise the key is unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnKey {
    columns: Vec<String>,
}

impl ColumnKey {
    /// Key on a single column.
    pub fn single(column: impl Into<String>) -> Self {
        Self {
            columns: vec![column.into()],
        }
    }

    /// Key on several columns, in order.
    ///
    /// # Errors
    ///
    /// Returns an error if no column is given.
    pub fn composite<I, S>(columns: I) -> Result<Self, String>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        if columns.is_empty() {
            return Err("key requires at least one column".to_string());
        }
        if columns.iter().any(String::is_empty) {
            return Err("key column names cannot be empty".to_string());
        }
        Ok(Self { columns })
    }

    /// Key columns.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }
}

impl Default for ColumnKey {
    fn default() -> Self {
        Self::single(DEFAULT_KEY_COLUMN)
    }
}

impl KeyExtractor for ColumnKey {
    fn extract(&self, record: &Record) -> Option<PrimaryKey> {
        if let [column] = self.columns.as_slice() {
            return record.get(column).and_then(PrimaryKey::from_scalar);
        }

        self.columns
            .iter()
            .map(|column| record.get(column).and_then(PrimaryKey::from_scalar))
            .collect::<Option<Vec<_>>>()
            .map(PrimaryKey::Composite)
    }

    fn describe(&self) -> String {
        self.columns.join(",")
    }
}

/// Default key extractor plus per-table overrides.
#[derive(Clone)]
pub struct KeyStrategy {
    default: Arc<dyn KeyExtractor>,
    overrides: HashMap<String, Arc<dyn KeyExtractor>>,
}

impl KeyStrategy {
    /// Uses `default` for every table without an override.
    pub fn new(default: impl KeyExtractor + 'static) -> Self {
        Self {
            default: Arc::new(default),
            overrides: HashMap::new(),
        }
    }

    /// Sets the extractor for one table.
    #[must_use]
    pub fn with_table(
        mut self,
        table: impl Into<String>,
        extractor: impl KeyExtractor + 'static,
    ) -> Self {
        self.overrides.insert(table.into(), Arc::new(extractor));
        self
    }

    /// Extractor used for `table`.
    #[must_use]
    pub fn for_table(&self, table: &str) -> &dyn KeyExtractor {
        self.overrides
            .get(table)
            .map_or(self.default.as_ref(), |extractor| extractor.as_ref())
    }

    /// Resolves the key of a record of `table`.
    #[must_use]
    pub fn extract(&self, table: &str, record: &Record) -> Option<PrimaryKey> {
        self.for_table(table).extract(record)
    }
}

impl Default for KeyStrategy {
    fn default() -> Self {
        Self::new(ColumnKey::default())
    }
}

impl fmt::Debug for KeyStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut overrides: Vec<(&String, String)> = self
            .overrides
            .iter()
            .map(|(table, extractor)| (table, extractor.describe()))
            .collect();
        overrides.sort();
        f.debug_struct("KeyStrategy")
            .field("default", &self.default.describe())
            .field("overrides", &overrides)
            .finish()
    }
}
