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

//! Replication preflight checks.
//!
//! Reading the binlog needs three things from the server: binary logging turned
//! on, row-based logging, and an account with `REPLICATION SLAVE` and
//! `REPLICATION CLIENT`. Each failure comes with the configuration or grant that
//! fixes it.

use crate::config::MySqlConfig;
use async_trait::async_trait;
use mysql_async::prelude::*;
use mysql_async::Conn;
use nagashi_core::preflight::{PreconditionCheck, PreconditionError, PreconditionKind};
use tracing::{debug, info, instrument, warn};

/// Checks a server's replication settings before streaming.
#[derive(Debug, Clone)]
pub struct ReplicationPreflight {
    config: MySqlConfig,
}

impl ReplicationPreflight {
    /// Creates a check for the server described by `config`.
    #[must_use]
    pub const fn new(config: MySqlConfig) -> Self {
        Self { config }
    }

    async fn run_checks(&self, conn: &mut Conn) -> Result<(), PreconditionError> {
        let log_bin: Option<(String, String)> = conn
            .query_first("SHOW VARIABLES LIKE 'log_bin'")
            .await
            .map_err(query_failed)?;
        evaluate_log_bin(log_bin.as_ref().map(|(_, value)| value.as_str()))?;

        let binlog_format: Option<(String, String)> = conn
            .query_first("SHOW VARIABLES LIKE 'binlog_format'")
            .await
            .map_err(query_failed)?;
        evaluate_binlog_format(binlog_format.as_ref().map(|(_, value)| value.as_str()))?;

        let grants: Vec<String> = conn.query("SHOW GRANTS").await.map_err(query_failed)?;
        debug!(grants = grants.len(), "Read account grants");
        evaluate_grants(&grants)
    }
}

#[async_trait]
impl PreconditionCheck for ReplicationPreflight {
    #[instrument(skip_all, fields(server = %self.config.endpoint()))]
    async fn check(&self) -> Result<(), PreconditionError> {
        let mut conn = Conn::new(self.config.opts()).await.map_err(|e| {
            PreconditionError::new(
                PreconditionKind::Unreachable,
                format!("Cannot connect to {}: {e}", self.config.endpoint()),
            )
        })?;

        let result = self.run_checks(&mut conn).await;

        if let Err(e) = conn.disconnect().await {
            warn!(error = %e, "Failed to close preflight connection");
        }

        if result.is_ok() {
            info!("MySQL configuration looks good");
        }
        result
    }
}

fn query_failed(e: mysql_async::Error) -> PreconditionError {
    PreconditionError::new(
        PreconditionKind::Unreachable,
        format!("Error checking MySQL configuration: {e}"),
    )
}

/// Checks the `log_bin` variable.
///
/// # Errors
///
/// Fails unless the value is `ON` (any case).
pub fn evaluate_log_bin(value: Option<&str>) -> Result<(), PreconditionError> {
    if value.is_some_and(|v| v.eq_ignore_ascii_case("on")) {
        return Ok(());
    }

    Err(PreconditionError::new(
        PreconditionKind::ReplicationDisabled,
        "Binary logging is not enabled on the MySQL server",
    )
    .with_remediation("Add the following to your MySQL configuration:")
    .with_remediation("[mysqld]")
    .with_remediation("log-bin=mysql-bin")
    .with_remediation("server-id=1")
    .with_remediation("binlog-format=row"))
}

/// Checks the `binlog_format` variable. A missing variable passes (MySQL 8.4+
/// always logs rows).
///
/// # Errors
///
/// Fails when the value is present and not `ROW` (any case).
pub fn evaluate_binlog_format(value: Option<&str>) -> Result<(), PreconditionError> {
    match value {
        None => Ok(()),
        Some(format) if format.eq_ignore_ascii_case("row") => Ok(()),
        Some(format) => Err(PreconditionError::new(
            PreconditionKind::UnsupportedLogFormat,
            format!("Binary log format is not set to ROW (current format: {format})"),
        )
        .with_remediation("Set binlog_format=ROW in your MySQL configuration")),
    }
}

/// Checks `SHOW GRANTS` output for the replication privileges.
///
/// `ALL PRIVILEGES ON *.*` satisfies both.
///
/// # Errors
///
/// Fails if either `REPLICATION SLAVE` or `REPLICATION CLIENT` is missing.
pub fn evaluate_grants(grants: &[String]) -> Result<(), PreconditionError> {
    let upper: Vec<String> = grants.iter().map(|g| g.to_ascii_uppercase()).collect();

    let has_all = upper
        .iter()
        .any(|g| g.contains("ALL PRIVILEGES ON *.*"));
    let has_slave = has_all || upper.iter().any(|g| g.contains("REPLICATION SLAVE"));
    let has_client = has_all || upper.iter().any(|g| g.contains("REPLICATION CLIENT"));

    if has_slave && has_client {
        return Ok(());
    }

    let missing: Vec<&str> = [
        (!has_slave).then_some("REPLICATION SLAVE"),
        (!has_client).then_some("REPLICATION CLIENT"),
    ]
    .into_iter()
    .flatten()
    .collect();

    Err(PreconditionError::new(
        PreconditionKind::MissingPrivileges,
        format!("Missing replication privileges: {}", missing.join(", ")),
    )
    .with_remediation("Grant the following privileges:")
    .with_remediation("GRANT REPLICATION SLAVE, REPLICATION CLIENT ON *.* TO '[user]'@'%';")
    .with_remediation("FLUSH PRIVILEGES;"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grants(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|line| (*line).to_string()).collect()
    }

    #[test]
    fn test_log_bin() {
        assert!(evaluate_log_bin(Some("ON")).is_ok());
        assert!(evaluate_log_bin(Some("on")).is_ok());

        let err = evaluate_log_bin(Some("OFF")).unwrap_err();
        assert_eq!(err.kind, PreconditionKind::ReplicationDisabled);
        assert!(err.remediation.contains(&"log-bin=mysql-bin".to_string()));
        assert!(err.remediation.contains(&"binlog-format=row".to_string()));

        assert!(evaluate_log_bin(None).is_err());
    }

    #[test]
    fn test_binlog_format() {
        assert!(evaluate_binlog_format(Some("ROW")).is_ok());
        assert!(evaluate_binlog_format(Some("row")).is_ok());
        assert!(evaluate_binlog_format(None).is_ok());

        let err = evaluate_binlog_format(Some("STATEMENT")).unwrap_err();
        assert_eq!(err.kind, PreconditionKind::UnsupportedLogFormat);
        assert!(err.message.contains("STATEMENT"));
    }

    #[test]
    fn test_grants_both_present() {
        let lines = grants(&[
            "GRANT USAGE ON *.* TO `repl`@`%`",
            "GRANT REPLICATION SLAVE, REPLICATION CLIENT ON *.* TO `repl`@`%`",
        ]);
        assert!(evaluate_grants(&lines).is_ok());
    }

    #[test]
    fn test_grants_all_privileges() {
        let lines = grants(&["GRANT ALL PRIVILEGES ON *.* TO `root`@`localhost` WITH GRANT OPTION"]);
        assert!(evaluate_grants(&lines).is_ok());
    }

    #[test]
    fn test_grants_missing_client() {
        let lines = grants(&["GRANT REPLICATION SLAVE ON *.* TO `repl`@`%`"]);
        let err = evaluate_grants(&lines).unwrap_err();

        assert_eq!(err.kind, PreconditionKind::MissingPrivileges);
        assert!(err.message.contains("REPLICATION CLIENT"));
        assert!(!err.message.contains("REPLICATION SLAVE"));
        assert!(err.remediation.iter().any(|l| l.starts_with("GRANT REPLICATION SLAVE")));
        assert_eq!(err.remediation.last().unwrap(), "FLUSH PRIVILEGES;");
    }

    #[test]
    fn test_grants_database_scoped_all_is_not_enough() {
        let lines = grants(&["GRANT ALL PRIVILEGES ON `shop`.* TO `app`@`%`"]);
        assert!(evaluate_grants(&lines).is_err());
    }
}
