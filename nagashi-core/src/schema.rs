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

//! Schema Registry: table name to ordered column names.
//!
//! Column lists are loaded once, before streaming starts, from a [`SchemaSource`].
//! Failures are local to a table: the table falls back to an empty column list and
//! its rows degrade to empty records (which then cannot resolve a key and are
//! skipped). Loading never aborts startup.

use crate::metrics;
use crate::value::{Record, ScalarValue};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Errors raised while reading schema metadata.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// The schema source could not be queried.
    #[error("Schema source error: {message}")]
    Source {
        /// Human-readable error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A column name appeared twice in one table.
    #[error("Duplicate column '{column}'")]
    DuplicateColumn {
        /// The repeated column name
        column: String,
    },

    /// The table does not exist in the source.
    #[error("Table not found: {table}")]
    TableNotFound {
        /// Table name
        table: String,
    },
}

impl SchemaError {
    /// Creates a source error from any error type.
    #[must_use]
    pub fn source(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Source {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a source error with a custom message.
    #[must_use]
    pub fn source_msg(message: impl Into<String>) -> Self {
        Self::Source {
            message: message.into(),
            source: None,
        }
    }
}

/// Ordered, duplicate-free column names of one table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnSchema {
    columns: Vec<String>,
}

static EMPTY_SCHEMA: ColumnSchema = ColumnSchema {
    columns: Vec::new(),
};

impl ColumnSchema {
    /// Creates a schema from column names in positional order.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateColumn`] if a name repeats.
    pub fn new<I, S>(columns: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashSet::with_capacity(columns.len());
        for column in &columns {
            if !seen.insert(column.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    column: column.clone(),
                });
            }
        }
        Ok(Self { columns })
    }

    /// An empty schema (every row zips to an empty record).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            columns: Vec::new(),
        }
    }

    /// Column names in positional order.
    #[must_use]
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns true when no columns are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Pairs positional values with column names.
    ///
    /// Extra values or extra columns are dropped: the result has
    /// `min(columns, values)` entries.
    #[must_use]
    pub fn zip(&self, values: Vec<ScalarValue>) -> Record {
        self.columns.iter().cloned().zip(values).collect()
    }
}

/// Provider of table and column metadata for one database.
#[async_trait]
pub trait SchemaSource: Send + Sync {
    /// Lists the tables of `database`.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, SchemaError>;

    /// Returns the ordered column names of `database.table`.
    async fn columns(&self, database: &str, table: &str) -> Result<Vec<String>, SchemaError>;
}

/// Table name to [`ColumnSchema`] for the monitored database.
#[derive(Debug, Clone, Default)]
pub struct SchemaRegistry {
    database: String,
    tables: HashMap<String, ColumnSchema>,
}

impl SchemaRegistry {
    /// Creates an empty registry.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            tables: HashMap::new(),
        }
    }

    /// Loads column lists for `tables`, one query per table.
    ///
    /// A table whose query fails is logged and falls back to an empty schema.
    pub async fn load<S>(source: &S, database: &str, tables: &[String]) -> Self
    where
        S: SchemaSource + ?Sized,
    {
        let mut registry = Self::new(database);

        for table in tables {
            let schema = match source.columns(database, table).await {
                Ok(columns) => match ColumnSchema::new(columns) {
                    Ok(schema) => schema,
                    Err(e) => {
                        error!(table = %table, error = %e, "Invalid column list, using empty schema");
                        ColumnSchema::empty()
                    }
                },
                Err(e) => {
                    error!(table = %table, error = %e, "Failed to load columns, using empty schema");
                    ColumnSchema::empty()
                }
            };

            debug!(table = %table, columns = schema.len(), "Loaded table schema");
            registry.tables.insert(table.clone(), schema);
        }

        info!(
            database = %database,
            tables = registry.tables.len(),
            "Schema registry loaded"
        );

        registry
    }

    /// Lists every table of `database` and loads its columns.
    ///
    /// If listing fails the error is logged and the registry stays empty.
    pub async fn discover<S>(source: &S, database: &str) -> Self
    where
        S: SchemaSource + ?Sized,
    {
        match source.list_tables(database).await {
            Ok(tables) => Self::load(source, database, &tables).await,
            Err(e) => {
                error!(database = %database, error = %e, "Failed to list tables");
                Self::new(database)
            }
        }
    }

    /// Registers or replaces one table's schema.
    pub fn insert(&mut self, table: impl Into<String>, schema: ColumnSchema) {
        self.tables.insert(table.into(), schema);
    }

    /// Database this registry describes.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Schema of `table`, if one was loaded.
    #[must_use]
    pub fn get(&self, table: &str) -> Option<&ColumnSchema> {
        self.tables.get(table)
    }

    /// Schema of `table`, or the empty schema when unknown.
    #[must_use]
    pub fn columns_for(&self, table: &str) -> &ColumnSchema {
        self.tables.get(table).unwrap_or(&EMPTY_SCHEMA)
    }

    /// Names of all registered tables, sorted.
    #[must_use]
    pub fn tables(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tables.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Returns true when no tables are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Zips a positional row of `table` into a record.
    ///
    /// A width mismatch means the column list no longer matches the log; it is
    /// reported, and the row is truncated to the shorter side.
    pub fn zip(&self, table: &str, values: Vec<ScalarValue>) -> Record {
        let schema = self.columns_for(table);
        if values.len() != schema.len() && !schema.is_empty() {
            warn!(
                table = %table,
                columns = schema.len(),
                values = values.len(),
                "Row width does not match table schema"
            );
            metrics::increment_schema_mismatches(table);
        }
        schema.zip(values)
    }
}

/// In-memory [`SchemaSource`], for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct StaticSchemaSource {
    tables: BTreeMap<String, Vec<String>>,
    failing_tables: HashSet<String>,
    fail_listing: bool,
}

impl StaticSchemaSource {
    /// Creates an empty source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table with its columns.
    #[must_use]
    pub fn with_table<I, S>(mut self, table: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tables
            .insert(table.into(), columns.into_iter().map(Into::into).collect());
        self
    }

    /// Makes column queries for `table` fail.
    #[must_use]
    pub fn with_failing_table(mut self, table: impl Into<String>) -> Self {
        let table = table.into();
        self.tables.entry(table.clone()).or_default();
        self.failing_tables.insert(table);
        self
    }

    /// Makes table listing fail.
    #[must_use]
    pub const fn with_listing_failure(mut self) -> Self {
        self.fail_listing = true;
        self
    }
}

#[async_trait]
impl SchemaSource for StaticSchemaSource {
    async fn list_tables(&self, _database: &str) -> Result<Vec<String>, SchemaError> {
        if self.fail_listing {
            return Err(SchemaError::source_msg("Simulated listing failure"));
        }
        Ok(self.tables.keys().cloned().collect())
    }

    async fn columns(&self, _database: &str, table: &str) -> Result<Vec<String>, SchemaError> {
        if self.failing_tables.contains(table) {
            return Err(SchemaError::source_msg(format!(
                "Simulated column query failure for {table}"
            )));
        }
        self.tables
            .get(table)
            .cloned()
            .ok_or_else(|| SchemaError::TableNotFound {
                table: table.to_string(),
            })
    }
}
