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

//! In-memory monitor example
//!
//! Feeds a scripted sequence of row events through a [`Monitor`] and prints each
//! table snapshot to the console. No database is needed.
//!
//! # Running the Example
//!
//! ```bash
//! RUST_LOG=info cargo run -p nagashi-core --example in_memory_monitor
//! ```

use nagashi_core::destination::{
    DestinationError, DestinationMetadata, SnapshotDestination, SnapshotWrite,
};
use nagashi_core::event::{ChangeEvent, Namespace, UpdateRow};
use nagashi_core::monitor::{Monitor, MonitorConfig};
use nagashi_core::schema::StaticSchemaSource;
use nagashi_core::stream::ChannelEventSource;
use nagashi_core::value::{Record, ScalarValue};
use std::error::Error;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// Destination that prints every snapshot as pretty JSON.
#[derive(Debug, Default)]
struct ConsoleDestination {
    writes: usize,
}

#[async_trait::async_trait]
impl SnapshotDestination for ConsoleDestination {
    async fn write_table(
        &mut self,
        table: &str,
        records: &[&Record],
    ) -> Result<SnapshotWrite, DestinationError> {
        let body = serde_json::to_string_pretty(records)
            .map_err(|e| DestinationError::serialization(e, "Failed to encode snapshot"))?;
        self.writes += 1;
        println!("--- {table}.json ---\n{body}");
        Ok(SnapshotWrite::new(format!("console://{table}"), body.len()))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        info!(writes = self.writes, "Console destination closed");
        Ok(())
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata::new("Console", "console")
    }
}

fn user(id: i64, name: &str, email: &str) -> Vec<ScalarValue> {
    vec![
        ScalarValue::Int(id),
        ScalarValue::from(name),
        ScalarValue::from(email),
    ]
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = MonitorConfig::builder()
        .database("shop")
        .flush_interval(Duration::from_millis(200))
        .build()?;

    let schemas = StaticSchemaSource::new().with_table("users", ["id", "name", "email"]);

    let mut monitor = Monitor::new(config, ConsoleDestination::default());
    monitor.load_schemas(&schemas).await?;

    let (tx, mut source) = ChannelEventSource::new(16);
    let users = Namespace::new("shop", "users");

    let producer = tokio::spawn(async move {
        let script = vec![
            ChangeEvent::insert(
                users.clone(),
                vec![
                    user(1, "Alice", "alice@example.com"),
                    user(2, "Bob", "bob@example.com"),
                ],
            ),
            ChangeEvent::update(
                users.clone(),
                vec![UpdateRow {
                    before: user(1, "Alice", "alice@example.com"),
                    after: user(1, "Alice", "alice@corp.example.com"),
                }],
            ),
            ChangeEvent::delete(users, vec![user(2, "Bob", "bob@example.com")]),
        ];

        for event in script {
            if tx.send(event).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(300)).await;
        }
    });

    let report = monitor.run(&mut source).await?;
    producer.await?;

    info!(
        reason = %report.stop_reason,
        events = report.stats.events_received,
        flushes = report.stats.flushes,
        "Done"
    );
    Ok(())
}
