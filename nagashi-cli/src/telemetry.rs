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

//! Logging and metrics setup for the binary.

use crate::error::CliError;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::io::IsTerminal;
use std::net::SocketAddr;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when neither `--log-level` nor `RUST_LOG` is set.
const DEFAULT_FILTER: &str = "info";

/// Builds the log filter. An explicit level wins over `RUST_LOG`.
pub fn log_filter(level: Option<&str>) -> Result<EnvFilter, CliError> {
    match level {
        Some(level) => EnvFilter::try_new(level)
            .map_err(|e| CliError::Config(format!("invalid log level `{level}`: {e}"))),
        None => Ok(EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))),
    }
}

/// Installs the global `fmt` subscriber. Colors are used only on a terminal.
pub fn init_logging(level: Option<&str>, no_color: bool) -> Result<(), CliError> {
    let filter = log_filter(level)?;
    let ansi = !no_color && std::io::stdout().is_terminal();

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(ansi)
        .try_init()
        .map_err(|e| CliError::Config(format!("failed to install logger: {e}")))
}

/// Serves Prometheus metrics on `addr` and registers the metric descriptions.
///
/// Must be called from within the Tokio runtime.
pub fn install_metrics(addr: SocketAddr) -> Result<(), CliError> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| CliError::Metrics(e.to_string()))?;
    nagashi_core::metrics::init_metrics();
    tracing::info!(%addr, "Prometheus metrics available at http://{addr}/metrics");
    Ok(())
}
