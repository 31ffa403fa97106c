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

//! `nagashi` binary.
//!
//! ```bash
//! nagashi monitor --host localhost --user root --database shop --output-dir ./logs
//! ```
//!
//! The password is read from `--password` or `NAGASHI_PASSWORD`, or prompted for
//! with hidden input.
//!
//! Exits 0 when stopped by a signal while streaming or when the binlog stream
//! ends. Exits 1 on a failed precondition, a source failure, a signal received
//! before streaming started, or any other error.

mod cli;
mod error;
mod telemetry;

use clap::{CommandFactory, Parser};
use cli::{Cli, Commands, MonitorArgs};
use error::CliError;
use nagashi_core::{Monitor, MonitorHandle, MonitorReport};
use nagashi_destinations::file::FileSnapshotDestination;
use nagashi_mysql::{BinlogEventSource, InformationSchemaSource, ReplicationPreflight};
use std::future::Future;
use std::process::ExitCode;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Some(Commands::Monitor(args)) = cli.command else {
        eprintln!("No command given. Run `nagashi monitor --database <db>` to start mirroring.\n");
        // Printing help can only fail on a closed stderr.
        let _ = Cli::command().print_help();
        return ExitCode::SUCCESS;
    };

    if let Err(e) = telemetry::init_logging(cli.log_level.as_deref(), cli.no_color) {
        eprintln!("{e}");
        return ExitCode::FAILURE;
    }

    match monitor(args).await {
        Ok(report) if !report.stop_reason.is_failure() => {
            info!(reason = %report.stop_reason, "Monitor stopped");
            ExitCode::SUCCESS
        }
        Ok(report) => {
            error!(reason = %report.stop_reason, "Monitor stopped");
            ExitCode::FAILURE
        }
        Err(e) => {
            error!(error = %e, "Monitor failed");
            if let Some(hint) = e.hint() {
                info!("{hint}");
            }
            ExitCode::FAILURE
        }
    }
}

async fn monitor(mut args: MonitorArgs) -> Result<MonitorReport, CliError> {
    args.resolve_password(|| rpassword::prompt_password("Password: "))?;

    if let Some(addr) = args.metrics_addr {
        telemetry::install_metrics(addr)?;
    }

    let mysql = args.mysql_config()?;
    let destination = FileSnapshotDestination::new(args.destination_config()?).await?;
    let mut monitor = Monitor::new(args.monitor_config()?, destination);

    info!(
        server = %mysql.endpoint(),
        database = %mysql.database,
        output_dir = %args.output_dir.display(),
        "Starting Nagashi"
    );

    let handle = monitor.handle();
    tokio::spawn(stop_on_signal(handle.clone()));

    let preflight = ReplicationPreflight::new(mysql.clone());
    unless_stopped(&handle, "checking preconditions", monitor.check_preconditions(&preflight))
        .await??;

    let schemas = InformationSchemaSource::new(&mysql);
    let loaded = unless_stopped(&handle, "loading schemas", monitor.load_schemas(&schemas)).await;
    schemas.disconnect().await;
    loaded??;

    let mut source =
        unless_stopped(&handle, "connecting to the binlog", BinlogEventSource::connect(&mysql))
            .await??;
    let report = monitor.run(&mut source).await?;

    info!(
        events = report.stats.events_received,
        upserted = report.stats.rows_upserted,
        removed = report.stats.rows_removed,
        skipped = report.stats.rows_skipped,
        flushes = report.stats.flushes,
        tables_written = report.final_flush.written.len(),
        "Run summary"
    );

    Ok(report)
}

/// Runs a setup step, giving up as soon as a stop is requested.
async fn unless_stopped<F: Future>(
    handle: &MonitorHandle,
    stage: &'static str,
    step: F,
) -> Result<F::Output, CliError> {
    tokio::select! {
        biased;

        () = handle.stopped() => {
            warn!(stage, "Stop requested before streaming started");
            Err(CliError::Interrupted(stage))
        }
        output = step => Ok(output),
    }
}

/// Requests a stop on Ctrl+C or SIGTERM.
async fn stop_on_signal(handle: MonitorHandle) {
    shutdown_signal().await;
    info!("Shutdown signal received, flushing snapshots");
    handle.stop();
}

#[cfg(unix)]
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(e) => {
            warn!(error = %e, "Cannot listen for SIGTERM, only Ctrl+C will stop the monitor");
            ctrl_c().await;
            return;
        }
    };

    tokio::select! {
        () = ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() {
    ctrl_c().await;
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Cannot listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}
