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

//! MySQL errors and their mapping onto the core error types.

use nagashi_core::schema::SchemaError;
use nagashi_core::stream::StreamError;
use thiserror::Error;

/// MySQL error code for a SQL syntax error.
pub const ER_PARSE_ERROR: u16 = 1064;

/// Errors from talking to the server.
#[derive(Debug, Error)]
pub enum MySqlError {
    /// The driver reported an error.
    #[error("{context}: {source}")]
    Driver {
        /// What was being done
        context: &'static str,
        /// The driver error
        #[source]
        source: mysql_async::Error,
    },

    /// The server did not report a binlog position.
    #[error("No binlog position reported ({0}); binary logging may be disabled")]
    BinlogUnavailable(String),
}

impl MySqlError {
    /// Wraps a driver error with context.
    #[must_use]
    pub const fn driver(context: &'static str, source: mysql_async::Error) -> Self {
        Self::Driver { context, source }
    }

    /// Server error code, if the server rejected a statement.
    #[must_use]
    pub fn server_code(&self) -> Option<u16> {
        match self {
            Self::Driver {
                source: mysql_async::Error::Server(e),
                ..
            } => Some(e.code),
            _ => None,
        }
    }
}

/// Operator hint for known server error codes.
#[must_use]
pub fn hint_for_code(code: u16) -> Option<&'static str> {
    match code {
        ER_PARSE_ERROR => Some(
            "This might be due to MySQL version compatibility issues. \
             Make sure you're using a compatible MySQL server version.",
        ),
        _ => None,
    }
}

impl From<MySqlError> for StreamError {
    fn from(err: MySqlError) -> Self {
        match err {
            MySqlError::Driver {
                context,
                source: mysql_async::Error::Server(e),
            } => StreamError::Server {
                code: Some(e.code),
                message: format!("{context}: {}", e.message),
                hint: hint_for_code(e.code).map(str::to_string),
            },
            MySqlError::Driver {
                source: mysql_async::Error::Other(e),
                context,
            } => StreamError::fatal_msg(format!("{context}: {e}")),
            err @ MySqlError::Driver { .. } => StreamError::connection(err),
            MySqlError::BinlogUnavailable(message) => StreamError::Server {
                code: None,
                message,
                hint: None,
            },
        }
    }
}

impl From<MySqlError> for SchemaError {
    fn from(err: MySqlError) -> Self {
        SchemaError::source(err)
    }
}
