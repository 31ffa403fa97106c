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

//! Precondition checks run before streaming starts.
//!
//! A failed precondition is fatal: the monitor never enters streaming. Each failure
//! carries remediation lines an operator can act on directly.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;
use tracing::{error, info};

/// What kind of precondition failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreconditionKind {
    /// The replication log is disabled on the server
    ReplicationDisabled,
    /// The replication log uses a format other than row-based
    UnsupportedLogFormat,
    /// The account lacks replication privileges
    MissingPrivileges,
    /// The server could not be reached or queried
    Unreachable,
}

impl PreconditionKind {
    /// Returns the kind as a static string for logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReplicationDisabled => "replication_disabled",
            Self::UnsupportedLogFormat => "unsupported_log_format",
            Self::MissingPrivileges => "missing_privileges",
            Self::Unreachable => "unreachable",
        }
    }
}

impl fmt::Display for PreconditionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed precondition with remediation steps.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct PreconditionError {
    /// Failure kind
    pub kind: PreconditionKind,
    /// What is wrong
    pub message: String,
    /// Lines to show the operator on how to fix it
    pub remediation: Vec<String>,
}

impl PreconditionError {
    /// Creates a precondition error without remediation.
    pub fn new(kind: PreconditionKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            remediation: Vec::new(),
        }
    }

    /// Adds a remediation line.
    #[must_use]
    pub fn with_remediation(mut self, line: impl Into<String>) -> Self {
        self.remediation.push(line.into());
        self
    }

    /// Logs the failure at error level followed by the remediation lines.
    pub fn report(&self) {
        error!(kind = %self.kind, "{}", self.message);
        if !self.remediation.is_empty() {
            info!("To fix this:");
            for line in &self.remediation {
                info!("  {line}");
            }
        }
    }
}

/// A check that must pass before streaming.
#[async_trait]
pub trait PreconditionCheck: Send + Sync {
    /// Runs the check.
    async fn check(&self) -> Result<(), PreconditionError>;
}

/// Precondition check with a fixed outcome, for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticPrecondition {
    failure: Option<PreconditionError>,
}

impl StaticPrecondition {
    /// A check that always passes.
    #[must_use]
    pub const fn passing() -> Self {
        Self { failure: None }
    }

    /// A check that always fails with `error`.
    #[must_use]
    pub const fn failing(error: PreconditionError) -> Self {
        Self {
            failure: Some(error),
        }
    }
}

#[async_trait]
impl PreconditionCheck for StaticPrecondition {
    async fn check(&self) -> Result<(), PreconditionError> {
        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remediation_builder() {
        let err = PreconditionError::new(PreconditionKind::ReplicationDisabled, "Binary logging is disabled")
            .with_remediation("[mysqld]")
            .with_remediation("log-bin=mysql-bin");

        assert_eq!(err.to_string(), "Binary logging is disabled");
        assert_eq!(err.remediation.len(), 2);
        assert_eq!(err.kind.as_str(), "replication_disabled");
        err.report();
    }

    #[tokio::test]
    async fn test_static_precondition() {
        assert!(StaticPrecondition::passing().check().await.is_ok());

        let failing = StaticPrecondition::failing(PreconditionError::new(
            PreconditionKind::MissingPrivileges,
            "missing REPLICATION CLIENT",
        ));
        let err = failing.check().await.unwrap_err();
        assert_eq!(err.kind, PreconditionKind::MissingPrivileges);
    }
}
