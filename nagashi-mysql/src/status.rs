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

//! Current binlog position lookup.
//!
//! MySQL 8.2 renamed `SHOW MASTER STATUS` to `SHOW BINARY LOG STATUS` (and 8.4
//! removed the old name). MariaDB and older MySQL releases only understand the old
//! statement. The statement is chosen once per connection from the server version.

use crate::error::MySqlError;
use mysql_async::prelude::*;
use mysql_async::{Conn, Row};
use std::fmt;
use tracing::{debug, info};

/// Statement used to read the current binlog file and position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinlogStatusQuery {
    /// `SHOW MASTER STATUS` (MySQL before 8.2, MariaDB)
    MasterStatus,
    /// `SHOW BINARY LOG STATUS` (MySQL 8.2 and later)
    BinaryLogStatus,
}

impl BinlogStatusQuery {
    /// Picks the statement for a `SELECT VERSION()` string.
    ///
    /// Unparseable versions fall back to [`Self::MasterStatus`].
    #[must_use]
    pub fn for_version(version: &str) -> Self {
        if version.to_ascii_lowercase().contains("mariadb") {
            return Self::MasterStatus;
        }

        let mut parts = version
            .split(|c: char| !c.is_ascii_digit())
            .filter(|part| !part.is_empty())
            .map(str::parse::<u32>);

        match (parts.next(), parts.next()) {
            (Some(Ok(major)), Some(Ok(minor))) if (major, minor) >= (8, 2) => {
                Self::BinaryLogStatus
            }
            _ => Self::MasterStatus,
        }
    }

    /// SQL text of the statement.
    #[must_use]
    pub const fn sql(&self) -> &'static str {
        match self {
            Self::MasterStatus => "SHOW MASTER STATUS",
            Self::BinaryLogStatus => "SHOW BINARY LOG STATUS",
        }
    }
}

impl fmt::Display for BinlogStatusQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql())
    }
}

/// A binlog file and byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinlogPosition {
    /// Binlog file name, e.g. `mysql-bin.000003`
    pub file: String,
    /// Byte offset in the file
    pub position: u64,
}

impl fmt::Display for BinlogPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.position)
    }
}

/// Reads the server version string.
///
/// # Errors
///
/// Returns [`MySqlError::Driver`] if the query fails.
pub async fn server_version(conn: &mut Conn) -> Result<String, MySqlError> {
    let version: Option<String> = conn
        .query_first("SELECT VERSION()")
        .await
        .map_err(|e| MySqlError::driver("Failed to read server version", e))?;
    Ok(version.unwrap_or_default())
}

/// Selects the status statement for the server behind `conn`.
///
/// # Errors
///
/// Returns [`MySqlError::Driver`] if the version cannot be read.
pub async fn detect_status_query(conn: &mut Conn) -> Result<BinlogStatusQuery, MySqlError> {
    let version = server_version(conn).await?;
    let query = BinlogStatusQuery::for_version(&version);
    debug!(version = %version, query = %query, "Selected binlog status statement");
    Ok(query)
}

/// Reads the current binlog position.
///
/// # Errors
///
/// Returns [`MySqlError::Driver`] if the statement fails, or
/// [`MySqlError::BinlogUnavailable`] if it returns no row or an empty file name.
pub async fn current_position(
    conn: &mut Conn,
    query: BinlogStatusQuery,
) -> Result<BinlogPosition, MySqlError> {
    let rows: Vec<Row> = conn
        .query(query.sql())
        .await
        .map_err(|e| MySqlError::driver("Failed to query binlog position", e))?;

    let row = rows
        .into_iter()
        .next()
        .ok_or_else(|| MySqlError::BinlogUnavailable(format!("{query} returned no rows")))?;

    let file: String = row.get(0).unwrap_or_default();
    if file.is_empty() {
        return Err(MySqlError::BinlogUnavailable(format!(
            "{query} returned an empty file name"
        )));
    }
    let position: u64 = row.get(1).unwrap_or(4);

    let position = BinlogPosition { file, position };
    info!(position = %position, "Current binlog position");
    Ok(position)
}
