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

//! Integration tests for the monitor loop.
//!
//! These tests drive a [`Monitor`] end to end over a channel event source:
//! - Folding inserts, updates and deletes into table snapshots
//! - Stop handling and the final flush
//! - Source failures
//! - Periodic and count-based flushing

use async_trait::async_trait;
use nagashi_core::destination::{
    DestinationError, DestinationMetadata, MockDestination, SnapshotDestination, SnapshotWrite,
};
use nagashi_core::event::{ChangeEvent, Namespace, UpdateRow};
use nagashi_core::key::{ColumnKey, KeyStrategy};
use nagashi_core::monitor::{Monitor, MonitorConfig, MonitorError, MonitorState, StopReason};
use nagashi_core::schema::StaticSchemaSource;
use nagashi_core::stream::{ChannelEventSource, StreamError};
use nagashi_core::value::{Record, ScalarValue};
use serde_json::json;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Destination that records every write in shared storage, so tests can inspect it
/// while the monitor is still running.
#[derive(Debug, Clone, Default)]
struct RecordingDestination {
    writes: Arc<Mutex<Vec<(String, usize)>>>,
}

impl RecordingDestination {
    fn writes(&self) -> Vec<(String, usize)> {
        self.writes.lock().unwrap().clone()
    }
}

#[async_trait]
impl SnapshotDestination for RecordingDestination {
    async fn write_table(
        &mut self,
        table: &str,
        records: &[&Record],
    ) -> Result<SnapshotWrite, DestinationError> {
        self.writes
            .lock()
            .unwrap()
            .push((table.to_string(), records.len()));
        Ok(SnapshotWrite::new(format!("memory://{table}"), records.len()))
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata::new("recording", "recording")
    }
}

fn ns(table: &str) -> Namespace {
    Namespace::new("shop", table)
}

fn user(id: i64, name: &str) -> Vec<ScalarValue> {
    vec![ScalarValue::Int(id), ScalarValue::from(name)]
}

fn schemas() -> StaticSchemaSource {
    StaticSchemaSource::new()
        .with_table("users", ["id", "name"])
        .with_table("orders", ["id", "total"])
}

async fn preflighted<D: SnapshotDestination>(config: MonitorConfig, destination: D) -> Monitor<D> {
    let mut monitor = Monitor::new(config, destination);
    monitor.load_schemas(&schemas()).await.unwrap();
    monitor
}

fn config() -> MonitorConfig {
    MonitorConfig::builder().database("shop").build().unwrap()
}

fn snapshot_json(destination: &MockDestination, table: &str) -> serde_json::Value {
    serde_json::to_value(destination.table(table).unwrap()).unwrap()
}

#[tokio::test]
async fn test_insert_update_delete_sequence() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(
        ns("users"),
        vec![user(1, "Ann"), user(2, "Bob")],
    ))
    .await
    .unwrap();
    tx.send(ChangeEvent::update(
        ns("users"),
        vec![UpdateRow {
            before: user(1, "Ann"),
            after: user(1, "Anna"),
        }],
    ))
    .await
    .unwrap();
    tx.send(ChangeEvent::delete(ns("users"), vec![user(2, "Bob")]))
        .await
        .unwrap();
    drop(tx);

    let report = monitor.run(&mut source).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::SourceEnded);
    assert_eq!(report.stats.events_received, 3);
    assert_eq!(report.stats.rows_upserted, 3);
    assert_eq!(report.stats.rows_removed, 1);
    assert_eq!(report.final_flush.written, vec!["users".to_string()]);
    assert_eq!(
        snapshot_json(monitor.destination(), "users"),
        json!([{"id": 1, "name": "Anna"}])
    );
    assert_eq!(monitor.state(), MonitorState::Stopped);
    assert!(source.is_closed());
    assert_eq!(monitor.destination().close_count(), 1);
}

#[tokio::test]
async fn test_table_emptied_by_deletes_still_written() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tx.send(ChangeEvent::delete(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    drop(tx);

    monitor.run(&mut source).await.unwrap();

    assert_eq!(snapshot_json(monitor.destination(), "users"), json!([]));
}

#[tokio::test]
async fn test_delete_of_unknown_key_creates_empty_table() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::delete(ns("orders"), vec![vec![
        ScalarValue::Int(9),
        ScalarValue::Float(1.5),
    ]]))
    .await
    .unwrap();
    drop(tx);

    let report = monitor.run(&mut source).await.unwrap();

    assert_eq!(report.stats.removes_absent, 1);
    assert_eq!(snapshot_json(monitor.destination(), "orders"), json!([]));
}

#[tokio::test]
async fn test_table_without_schema_skips_rows() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(
        ns("audit_log"),
        vec![vec![ScalarValue::Int(1), ScalarValue::from("login")]],
    ))
    .await
    .unwrap();
    drop(tx);

    let report = monitor.run(&mut source).await.unwrap();

    assert_eq!(report.stats.rows_skipped, 1);
    assert_eq!(snapshot_json(monitor.destination(), "audit_log"), json!([]));
}

#[tokio::test]
async fn test_snapshot_ordered_by_key() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(
        ns("users"),
        vec![user(3, "Cid"), user(1, "Ann"), user(2, "Bob")],
    ))
    .await
    .unwrap();
    drop(tx);

    monitor.run(&mut source).await.unwrap();

    assert_eq!(
        snapshot_json(monitor.destination(), "users"),
        json!([
            {"id": 1, "name": "Ann"},
            {"id": 2, "name": "Bob"},
            {"id": 3, "name": "Cid"}
        ])
    );
}

#[tokio::test]
async fn test_composite_key_override() {
    let keys = KeyStrategy::default().with_table(
        "orders",
        ColumnKey::composite(["id", "total"]).unwrap(),
    );
    let config = MonitorConfig::builder()
        .database("shop")
        .keys(keys)
        .build()
        .unwrap();
    let mut monitor = preflighted(config, MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    // Same id, different totals: two distinct rows under a composite key
    tx.send(ChangeEvent::insert(
        ns("orders"),
        vec![
            vec![ScalarValue::Int(1), ScalarValue::Int(10)],
            vec![ScalarValue::Int(1), ScalarValue::Int(20)],
        ],
    ))
    .await
    .unwrap();
    drop(tx);

    monitor.run(&mut source).await.unwrap();

    assert_eq!(monitor.destination().table("orders").unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_stop_flushes_each_table_once() {
    let monitor = preflighted(config(), MockDestination::new()).await;
    let handle = monitor.handle();
    let (tx, source) = ChannelEventSource::new(16);

    let task = tokio::spawn(async move {
        let mut monitor = monitor;
        let mut source = source;
        let result = monitor.run(&mut source).await;
        (monitor, source, result)
    });

    assert!(handle.wait_for_state(MonitorState::Streaming).await);
    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tx.send(ChangeEvent::insert(ns("orders"), vec![vec![
        ScalarValue::Int(7),
        ScalarValue::Int(100),
    ]]))
    .await
    .unwrap();

    // Let the monitor drain the channel
    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.stop();
    handle.stop();

    let (monitor, source, result) = task.await.unwrap();
    let report = result.unwrap();

    assert_eq!(report.stop_reason, StopReason::StopRequested);
    assert_eq!(report.stats.events_received, 2);
    assert_eq!(monitor.destination().writes_for("users"), 1);
    assert_eq!(monitor.destination().writes_for("orders"), 1);
    assert_eq!(monitor.destination().write_count(), 2);
    assert_eq!(source.close_count(), 1);
    assert_eq!(handle.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn test_source_error_still_flushes_and_closes() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tx.fail(StreamError::connection_msg("connection reset by peer"))
        .await
        .unwrap();
    // Never reached
    tx.send(ChangeEvent::insert(ns("users"), vec![user(2, "Bob")]))
        .await
        .unwrap();

    let report = monitor.run(&mut source).await.unwrap();

    assert!(report.stop_reason.is_failure());
    assert_eq!(report.stats.events_received, 1);
    assert_eq!(
        snapshot_json(monitor.destination(), "users"),
        json!([{"id": 1, "name": "Ann"}])
    );
    assert!(source.is_closed());
}

#[tokio::test]
async fn test_fatal_error_propagates_after_cleanup() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tx.fail(StreamError::fatal_msg("unexpected event layout"))
        .await
        .unwrap();

    let err = monitor.run(&mut source).await.unwrap_err();

    assert!(matches!(err, MonitorError::Stream(StreamError::Fatal { .. })));
    assert_eq!(monitor.destination().writes_for("users"), 1);
    assert!(source.is_closed());
    assert_eq!(monitor.state(), MonitorState::Stopped);
}

#[tokio::test]
async fn test_decode_errors_are_skipped() {
    let mut monitor = preflighted(config(), MockDestination::new()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.fail(StreamError::decode("truncated rows event"))
        .await
        .unwrap();
    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    drop(tx);

    let report = monitor.run(&mut source).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::SourceEnded);
    assert_eq!(report.stats.events_skipped, 1);
    assert_eq!(report.stats.events_received, 1);
}

#[tokio::test]
async fn test_failed_table_write_does_not_block_others() {
    let destination = MockDestination::new().with_failing_table("orders");
    let mut monitor = preflighted(config(), destination).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tx.send(ChangeEvent::insert(ns("orders"), vec![vec![
        ScalarValue::Int(1),
        ScalarValue::Int(5),
    ]]))
    .await
    .unwrap();
    drop(tx);

    let report = monitor.run(&mut source).await.unwrap();

    assert_eq!(report.final_flush.written, vec!["users".to_string()]);
    assert_eq!(report.final_flush.failed.len(), 1);
    assert_eq!(report.final_flush.failed[0].table, "orders");
    assert_eq!(report.stats.table_writes_failed, 1);
    assert!(monitor.store().is_dirty("orders"));
}

#[tokio::test(start_paused = true)]
async fn test_periodic_flush_writes_only_changed_tables() {
    let destination = RecordingDestination::default();
    let config = MonitorConfig::builder()
        .database("shop")
        .flush_interval(Duration::from_secs(1))
        .build()
        .unwrap();
    let monitor = preflighted(config, destination.clone()).await;
    let handle = monitor.handle();
    let (tx, source) = ChannelEventSource::new(16);

    let task = tokio::spawn(async move {
        let mut monitor = monitor;
        let mut source = source;
        monitor.run(&mut source).await
    });

    tx.send(ChangeEvent::insert(ns("users"), vec![user(1, "Ann")]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(1500)).await;
    assert_eq!(destination.writes(), vec![("users".to_string(), 1)]);

    tx.send(ChangeEvent::insert(ns("orders"), vec![vec![
        ScalarValue::Int(1),
        ScalarValue::Int(5),
    ]]))
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(
        destination.writes(),
        vec![("users".to_string(), 1), ("orders".to_string(), 1)]
    );

    // Nothing changed: the next tick writes nothing
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(destination.writes().len(), 2);

    handle.stop();
    let report = task.await.unwrap().unwrap();

    assert_eq!(report.stats.flushes, 4);
    assert_eq!(
        destination.writes()[2..],
        [("orders".to_string(), 1), ("users".to_string(), 1)]
    );
}

#[tokio::test]
async fn test_flush_every_events() {
    let destination = RecordingDestination::default();
    let config = MonitorConfig::builder()
        .database("shop")
        .flush_every_events(2)
        .build()
        .unwrap();
    let mut monitor = preflighted(config, destination.clone()).await;
    let (tx, mut source) = ChannelEventSource::new(16);

    for id in 1..=3 {
        tx.send(ChangeEvent::insert(ns("users"), vec![user(id, "x")]))
            .await
            .unwrap();
    }
    drop(tx);

    monitor.run(&mut source).await.unwrap();

    assert_eq!(
        destination.writes(),
        vec![("users".to_string(), 2), ("users".to_string(), 3)]
    );
}

#[tokio::test]
async fn test_discovers_tables_when_none_configured() {
    let mut monitor = Monitor::new(config(), MockDestination::new());
    monitor.load_schemas(&schemas()).await.unwrap();

    assert_eq!(monitor.registry().tables(), vec!["orders", "users"]);
}

#[tokio::test]
async fn test_configured_tables_with_failing_schema() {
    let config = MonitorConfig::builder()
        .database("shop")
        .tables(vec!["users".to_string(), "ghost".to_string()])
        .build()
        .unwrap();
    let mut monitor = Monitor::new(config, MockDestination::new());
    monitor
        .load_schemas(&schemas().with_failing_table("ghost"))
        .await
        .unwrap();

    assert_eq!(monitor.state(), MonitorState::Preflighted);
    assert!(monitor.registry().columns_for("ghost").is_empty());
    assert_eq!(monitor.registry().columns_for("users").len(), 2);
}
