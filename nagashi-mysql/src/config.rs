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

//! MySQL connection settings.

use mysql_async::{Opts, OptsBuilder};
use std::fmt;

/// Default replica server id announced when reading the binlog.
pub const DEFAULT_SERVER_ID: u32 = 100;

/// Connection settings for the monitored server.
///
/// The same settings are used for preflight checks, schema loading and the
/// replication stream. `Debug` output never includes the password.
///
/// # Examples
///
/// ```rust
/// use nagashi_mysql::MySqlConfig;
///
/// let config = MySqlConfig::builder()
///     .host("db.internal")
///     .user("replicator")
///     .password("secret")
///     .database("shop")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.port, 3306);
/// assert!(!format!("{config:?}").contains("secret"));
/// ```
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlConfig {
    /// Server host name or address
    pub host: String,

    /// Server port
    pub port: u16,

    /// Account used for every connection
    pub user: String,

    /// Account password
    pub password: Option<String>,

    /// Monitored database
    pub database: String,

    /// Server id announced to the primary; must be unique among its replicas
    pub server_id: u32,
}

impl MySqlConfig {
    /// Creates a new builder for `MySqlConfig`.
    #[must_use]
    pub fn builder() -> MySqlConfigBuilder {
        MySqlConfigBuilder::default()
    }

    /// Driver options for a plain client connection.
    #[must_use]
    pub fn opts(&self) -> Opts {
        OptsBuilder::default()
            .ip_or_hostname(self.host.clone())
            .tcp_port(self.port)
            .user(Some(self.user.clone()))
            .pass(self.password.clone())
            .db_name(Some(self.database.clone()))
            .into()
    }

    /// `host:port/database` for log lines.
    #[must_use]
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.database)
    }
}

impl fmt::Debug for MySqlConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MySqlConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field("database", &self.database)
            .field("server_id", &self.server_id)
            .finish()
    }
}

/// Builder for `MySqlConfig`.
#[derive(Debug, Default)]
pub struct MySqlConfigBuilder {
    host: Option<String>,
    port: Option<u16>,
    user: Option<String>,
    password: Option<String>,
    database: Option<String>,
    server_id: Option<u32>,
}

impl MySqlConfigBuilder {
    /// Sets the host (default: `localhost`).
    #[must_use]
    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
        self
    }

    /// Sets the port (default: 3306).
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Sets the user (default: `root`).
    #[must_use]
    pub fn user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the password.
    #[must_use]
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Sets the monitored database (required).
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the replica server id (default: 100).
    #[must_use]
    pub const fn server_id(mut self, server_id: u32) -> Self {
        self.server_id = Some(server_id);
        self
    }

    /// Builds the `MySqlConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is missing or empty, the host or user is
    /// empty, or the server id is zero.
    pub fn build(self) -> Result<MySqlConfig, String> {
        let database = self.database.ok_or("database is required")?;
        if database.is_empty() {
            return Err("database cannot be empty".to_string());
        }

        let host = self.host.unwrap_or_else(|| "localhost".to_string());
        if host.is_empty() {
            return Err("host cannot be empty".to_string());
        }

        let user = self.user.unwrap_or_else(|| "root".to_string());
        if user.is_empty() {
            return Err("user cannot be empty".to_string());
        }

        let server_id = self.server_id.unwrap_or(DEFAULT_SERVER_ID);
        if server_id == 0 {
            return Err("server_id must be greater than zero".to_string());
        }

        Ok(MySqlConfig {
            host,
            port: self.port.unwrap_or(3306),
            user,
            password: self.password,
            database,
            server_id,
        })
    }
}
