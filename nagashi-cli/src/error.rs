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

use nagashi_core::{DestinationError, MonitorError, StreamError};
use nagashi_destinations::file::FileConfigError;

/// Errors that end the `nagashi` process with a failure status.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Invalid command-line settings
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    FileConfig(#[from] FileConfigError),

    #[error("Failed to open snapshot destination: {0}")]
    Destination(#[from] DestinationError),

    #[error(transparent)]
    Monitor(#[from] MonitorError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    /// Prometheus exporter could not be installed
    #[error("Failed to start metrics exporter: {0}")]
    Metrics(String),

    /// Password prompt failed
    #[error("Failed to read password: {0}")]
    Prompt(#[source] std::io::Error),

    /// Stop signal arrived before streaming started
    #[error("Stopped before streaming started, while {0}")]
    Interrupted(&'static str),
}

impl CliError {
    /// Operator hint for errors the server explains poorly.
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Stream(e) | Self::Monitor(MonitorError::Stream(e)) => e.hint(),
            _ => None,
        }
    }
}
