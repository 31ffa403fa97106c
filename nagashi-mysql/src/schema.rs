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

//! Column lists from `INFORMATION_SCHEMA`.

use crate::config::MySqlConfig;
use crate::error::MySqlError;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::{Conn, Pool};
use nagashi_core::schema::{SchemaError, SchemaSource};
use std::collections::HashMap;
use tracing::{debug, warn};

const LIST_TABLES_QUERY: &str = r"
    SELECT TABLE_NAME
    FROM INFORMATION_SCHEMA.TABLES
    WHERE TABLE_SCHEMA = ? AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
";

const COLUMNS_QUERY: &str = r"
    SELECT COLUMN_NAME
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
";

const VALUE_LABELS_QUERY: &str = r"
    SELECT ORDINAL_POSITION, COLUMN_TYPE
    FROM INFORMATION_SCHEMA.COLUMNS
    WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? AND DATA_TYPE IN ('enum', 'set')
    ORDER BY ORDINAL_POSITION
";

/// `ENUM`/`SET` labels of a table, keyed by 0-based column position.
pub type ValueLabels = HashMap<usize, Vec<String>>;

/// [`SchemaSource`] backed by the server's `INFORMATION_SCHEMA`.
///
/// Holds a small connection pool; call [`InformationSchemaSource::disconnect`]
/// once schemas are loaded.
#[derive(Debug, Clone)]
pub struct InformationSchemaSource {
    pool: Pool,
}

impl InformationSchemaSource {
    /// Creates a source for the server described by `config`. Connections are
    /// opened lazily.
    #[must_use]
    pub fn new(config: &MySqlConfig) -> Self {
        Self {
            pool: Pool::new(config.opts()),
        }
    }

    async fn conn(&self) -> Result<Conn, MySqlError> {
        self.pool
            .get_conn()
            .await
            .map_err(|e| MySqlError::driver("Failed to get connection", e))
    }

    /// Loads the labels of every `ENUM` and `SET` column of `table`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn value_labels(
        &self,
        database: &str,
        table: &str,
    ) -> Result<ValueLabels, MySqlError> {
        let mut conn = self.conn().await?;
        let rows: Vec<(u64, String)> = conn
            .exec(VALUE_LABELS_QUERY, (database, table))
            .await
            .map_err(|e| MySqlError::driver("Failed to load ENUM/SET labels", e))?;

        let mut labels = ValueLabels::new();
        for (position, column_type) in rows {
            let index = usize::try_from(position).ok().and_then(|p| p.checked_sub(1));
            match (index, parse_value_labels(&column_type)) {
                (Some(index), Some(values)) => {
                    labels.insert(index, values);
                }
                _ => warn!(
                    table = %table,
                    column_type = %column_type,
                    "Unrecognized ENUM/SET definition"
                ),
            }
        }
        Ok(labels)
    }

    /// Closes the pool.
    pub async fn disconnect(self) {
        if let Err(e) = self.pool.disconnect().await {
            warn!(error = %e, "Failed to close schema connection pool");
        }
    }
}

/// Parses the labels out of a `COLUMN_TYPE` such as `enum('new','it''s')`.
///
/// Returns `None` for anything that is not an `enum(...)` or `set(...)` list.
#[must_use]
pub fn parse_value_labels(column_type: &str) -> Option<Vec<String>> {
    let lower = column_type.to_ascii_lowercase();
    let start = if lower.starts_with("enum(") {
        5
    } else if lower.starts_with("set(") {
        4
    } else {
        return None;
    };
    let body = column_type.get(start..)?.strip_suffix(')')?;

    let mut labels = Vec::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' => {
                let mut label = String::new();
                loop {
                    match chars.next()? {
                        '\'' if chars.peek() == Some(&'\'') => {
                            chars.next();
                            label.push('\'');
                        }
                        '\'' => break,
                        '\\' => label.push(chars.next()?),
                        other => label.push(other),
                    }
                }
                labels.push(label);
            }
            ',' | ' ' => {}
            _ => return None,
        }
    }
    Some(labels)
}

#[async_trait]
impl SchemaSource for InformationSchemaSource {
    async fn list_tables(&self, database: &str) -> Result<Vec<String>, SchemaError> {
        let mut conn = self.conn().await?;
        let tables: Vec<String> = conn
            .exec(LIST_TABLES_QUERY, (database,))
            .await
            .map_err(|e| MySqlError::driver("Failed to list tables", e))?;

        debug!(database = %database, tables = tables.len(), "Listed tables");
        Ok(tables)
    }

    async fn columns(&self, database: &str, table: &str) -> Result<Vec<String>, SchemaError> {
        let mut conn = self.conn().await?;
        let columns: Vec<String> = conn
            .exec(COLUMNS_QUERY, (database, table))
            .await
            .map_err(|e| MySqlError::driver("Failed to load columns", e))?;

        if columns.is_empty() {
            return Err(SchemaError::TableNotFound {
                table: format!("{database}.{table}"),
            });
        }
        Ok(columns)
    }
}
