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

//! Command-line surface.

use crate::error::CliError;
use clap::{Args, Parser, Subcommand};
use nagashi_core::{ColumnKey, KeyStrategy, MonitorConfig};
use nagashi_destinations::file::{Compression, FileDestinationConfig};
use nagashi_mysql::{MySqlConfig, DEFAULT_SERVER_ID};
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Mirrors MySQL tables into JSON snapshot files by following the binlog
#[derive(Debug, Parser)]
#[command(name = "nagashi")]
#[command(author = "Nagashi Contributors")]
#[command(version)]
#[command(about = "Mirror MySQL tables into JSON snapshot files by following the binlog", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Log filter, e.g. `debug` or `nagashi_core=trace` (overrides RUST_LOG)
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    /// Disable colored log output
    #[arg(long, global = true)]
    pub no_color: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Stream row changes and keep one JSON snapshot per table
    Monitor(MonitorArgs),
}

#[derive(Debug, Args)]
pub struct MonitorArgs {
    /// MySQL host
    #[arg(long, default_value = "localhost")]
    pub host: String,

    /// MySQL port
    #[arg(short = 'P', long, default_value_t = 3306)]
    pub port: u16,

    /// MySQL user
    #[arg(short, long, default_value = "root")]
    pub user: String,

    /// MySQL password (prompted for with hidden input when omitted)
    #[arg(short, long, env = "NAGASHI_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Database to monitor
    #[arg(short, long)]
    pub database: String,

    /// Directory receiving `<table>.json` snapshots
    #[arg(short, long, default_value = "./logs")]
    pub output_dir: PathBuf,

    /// Replica server id used when registering for the binlog
    #[arg(long, default_value_t = DEFAULT_SERVER_ID)]
    pub server_id: u32,

    /// Only load schemas for these tables (repeatable; default: all tables)
    #[arg(short, long = "table")]
    pub tables: Vec<String>,

    /// Flush changed tables every N seconds
    #[arg(long, value_name = "SECS")]
    pub flush_interval: Option<u64>,

    /// Flush changed tables after every N events
    #[arg(long, value_name = "N")]
    pub flush_every: Option<u64>,

    /// Default primary key column
    #[arg(long, default_value = "id")]
    pub key_column: String,

    /// Per-table key override, e.g. `order_items=order_id,line` (repeatable)
    #[arg(long = "table-key", value_name = "TABLE=COLS", value_parser = parse_table_key)]
    pub table_keys: Vec<(String, ColumnKey)>,

    /// Write compact JSON instead of pretty-printed
    #[arg(long)]
    pub compact: bool,

    /// Gzip snapshot files (`<table>.json.gz`)
    #[arg(long)]
    pub gzip: bool,

    /// Skip fsync before replacing snapshot files
    #[arg(long)]
    pub no_fsync: bool,

    /// Serve Prometheus metrics on this address, e.g. `0.0.0.0:9000`
    #[arg(long)]
    pub metrics_addr: Option<SocketAddr>,
}

impl MonitorArgs {
    /// Fills in a password missing from both the flag and the environment by
    /// calling `prompt`.
    pub fn resolve_password<F>(&mut self, prompt: F) -> Result<(), CliError>
    where
        F: FnOnce() -> io::Result<String>,
    {
        if self.password.is_none() {
            self.password = Some(prompt().map_err(CliError::Prompt)?);
        }
        Ok(())
    }

    /// MySQL connection settings. A missing or empty password connects without one.
    pub fn mysql_config(&self) -> Result<MySqlConfig, CliError> {
        let mut builder = MySqlConfig::builder()
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .database(&self.database)
            .server_id(self.server_id);
        if let Some(password) = self.password.as_deref().filter(|p| !p.is_empty()) {
            builder = builder.password(password);
        }
        builder.build().map_err(CliError::Config)
    }

    pub fn monitor_config(&self) -> Result<MonitorConfig, CliError> {
        let default_key =
            ColumnKey::composite([self.key_column.as_str()]).map_err(CliError::Config)?;
        let mut keys = KeyStrategy::new(default_key);
        for (table, key) in &self.table_keys {
            keys = keys.with_table(table, key.clone());
        }

        let mut builder = MonitorConfig::builder()
            .database(&self.database)
            .tables(self.tables.clone())
            .keys(keys);
        if let Some(secs) = self.flush_interval {
            builder = builder.flush_interval(Duration::from_secs(secs));
        }
        if let Some(count) = self.flush_every {
            builder = builder.flush_every_events(count);
        }
        builder.build().map_err(CliError::Config)
    }

    pub fn destination_config(&self) -> Result<FileDestinationConfig, CliError> {
        Ok(FileDestinationConfig::builder()
            .output_dir(&self.output_dir)
            .pretty(!self.compact)
            .fsync(!self.no_fsync)
            .compression(self.compression()?)
            .build()?)
    }

    #[cfg(feature = "gzip")]
    fn compression(&self) -> Result<Compression, CliError> {
        Ok(if self.gzip {
            Compression::Gzip
        } else {
            Compression::None
        })
    }

    #[cfg(not(feature = "gzip"))]
    fn compression(&self) -> Result<Compression, CliError> {
        if self.gzip {
            return Err(CliError::Config(
                "--gzip requires nagashi to be built with the `gzip` feature".to_string(),
            ));
        }
        Ok(Compression::None)
    }
}

/// Parses `table=col1,col2`.
fn parse_table_key(value: &str) -> Result<(String, ColumnKey), String> {
    let (table, columns) = value
        .split_once('=')
        .ok_or_else(|| format!("expected TABLE=COLUMNS, got `{value}`"))?;
    let table = table.trim();
    if table.is_empty() {
        return Err("table name cannot be empty".to_string());
    }

    let key = ColumnKey::composite(columns.split(',').map(str::trim))?;
    Ok((table.to_string(), key))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use nagashi_core::KeyExtractor;

    fn monitor(args: &[&str]) -> MonitorArgs {
        let cli = Cli::try_parse_from(
            ["nagashi", "monitor", "--password", "pw", "--database", "shop"]
                .iter()
                .chain(args),
        )
        .unwrap();
        match cli.command {
            Some(Commands::Monitor(args)) => args,
            None => panic!("expected monitor subcommand"),
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let args = monitor(&[]);
        assert_eq!(args.host, "localhost");
        assert_eq!(args.port, 3306);
        assert_eq!(args.user, "root");
        assert_eq!(args.server_id, 100);
        assert_eq!(args.output_dir, PathBuf::from("./logs"));
        assert!(args.tables.is_empty());
        assert!(!args.compact);
    }

    #[test]
    fn test_no_subcommand_parses() {
        let cli = Cli::try_parse_from(["nagashi"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_database_is_required() {
        assert!(Cli::try_parse_from(["nagashi", "monitor", "--password", "pw"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "nagashi",
            "monitor",
            "--password",
            "pw",
            "-d",
            "shop",
            "--log-level",
            "debug",
            "--no-color",
        ])
        .unwrap();
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(cli.no_color);
    }

    #[test]
    fn test_parse_table_key() {
        let (table, key) = parse_table_key("order_items=order_id, line").unwrap();
        assert_eq!(table, "order_items");
        assert_eq!(key.columns(), ["order_id", "line"]);

        assert!(parse_table_key("orders").is_err());
        assert!(parse_table_key("=id").is_err());
        assert!(parse_table_key("orders=").is_err());
    }

    #[test]
    fn test_monitor_config_applies_keys_and_flush() {
        let args = monitor(&[
            "--key-column",
            "uuid",
            "--table-key",
            "items=order_id,line",
            "--flush-interval",
            "5",
            "--flush-every",
            "100",
            "-t",
            "users",
        ]);
        let config = args.monitor_config().unwrap();

        assert_eq!(config.database, "shop");
        assert_eq!(config.tables, vec!["users".to_string()]);
        assert_eq!(config.flush_interval, Some(Duration::from_secs(5)));
        assert_eq!(config.flush_every_events, Some(100));
        assert_eq!(config.keys.for_table("users").describe(), "uuid");
        assert_eq!(config.keys.for_table("items").describe(), "order_id,line");
    }

    #[test]
    fn test_zero_flush_interval_rejected() {
        let args = monitor(&["--flush-interval", "0"]);
        assert!(matches!(args.monitor_config(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_empty_password_means_none() {
        let args = Cli::try_parse_from(["nagashi", "monitor", "--password", "", "-d", "shop"])
            .unwrap()
            .command;
        let Some(Commands::Monitor(args)) = args else {
            panic!("expected monitor subcommand");
        };
        let config = args.mysql_config().unwrap();
        assert!(config.password.is_none());
    }

    fn without_password() -> MonitorArgs {
        let cli = Cli::try_parse_from(["nagashi", "monitor", "-d", "shop"]).unwrap();
        match cli.command {
            Some(Commands::Monitor(args)) => args,
            None => panic!("expected monitor subcommand"),
        }
    }

    #[test]
    fn test_missing_password_is_prompted() {
        let mut args = without_password();
        assert!(args.password.is_none());

        args.resolve_password(|| Ok("typed".to_string())).unwrap();
        assert_eq!(args.password.as_deref(), Some("typed"));
        assert_eq!(args.mysql_config().unwrap().password.as_deref(), Some("typed"));
    }

    #[test]
    fn test_given_password_skips_prompt() {
        let mut args = monitor(&[]);
        args.resolve_password(|| panic!("prompt must not run")).unwrap();
        assert_eq!(args.password.as_deref(), Some("pw"));
    }

    #[test]
    fn test_prompt_failure_is_reported() {
        let mut args = without_password();
        let err = args
            .resolve_password(|| Err(io::Error::new(io::ErrorKind::NotFound, "no tty")))
            .unwrap_err();
        assert!(matches!(err, CliError::Prompt(_)));
    }

    #[tokio::test]
    async fn test_destination_config_creates_output_dir() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("snapshots");
        let output_arg = output.to_string_lossy().into_owned();

        let args = monitor(&["--compact", "--no-fsync", "-o", output_arg.as_str()]);
        let config = args.destination_config().unwrap();
        assert_eq!(config.output_dir, output);
        assert!(!config.pretty);
        assert!(!config.fsync);

        nagashi_destinations::file::FileSnapshotDestination::new(config)
            .await
            .unwrap();
        assert!(output.is_dir());
    }

    #[cfg(not(feature = "gzip"))]
    #[test]
    fn test_gzip_without_feature_is_rejected() {
        let args = monitor(&["--gzip"]);
        assert!(args.destination_config().is_err());
    }
}
