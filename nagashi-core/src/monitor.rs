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

//! The monitor: owns the streaming loop and the materialized state.
//!
//! A [`Monitor`] moves through `Idle → Preflighted → Streaming → Stopping →
//! Stopped`:
//!
//! - **Idle → Preflighted**: [`Monitor::load_schemas`] completes (partial per-table
//!   failures included). Optional [`Monitor::check_preconditions`] runs before it;
//!   a failed precondition keeps the monitor out of streaming for good.
//! - **Preflighted → Streaming**: [`Monitor::run`] starts pulling from an opened
//!   [`EventSource`].
//! - **Streaming → Stopping**: a stop request, the end of the stream, or a read
//!   failure.
//! - **Stopping → Stopped**: the final flush of every table has run and the event
//!   source has been closed, even if the flush failed.
//!
//! Events are normalized and applied one at a time, in arrival order, by this single
//! task. A stop request is only observed between events, so the state is always
//! fully applied when the final flush starts.
//!
//! # Example
//!
//! ```rust
//! use nagashi_core::destination::MockDestination;
//! use nagashi_core::event::{ChangeEvent, Namespace};
//! use nagashi_core::monitor::{Monitor, MonitorConfig, StopReason};
//! use nagashi_core::schema::StaticSchemaSource;
//! use nagashi_core::stream::ChannelEventSource;
//! use nagashi_core::value::ScalarValue;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = MonitorConfig::builder().database("shop").build()?;
//! let mut monitor = Monitor::new(config, MockDestination::new());
//!
//! let schemas = StaticSchemaSource::new().with_table("users", ["id", "name"]);
//! monitor.load_schemas(&schemas).await?;
//!
//! let (tx, mut source) = ChannelEventSource::new(8);
//! tx.send(ChangeEvent::insert(
//!     Namespace::new("shop", "users"),
//!     vec![vec![ScalarValue::Int(1), ScalarValue::from("Ann")]],
//! ))
//! .await?;
//! drop(tx);
//!
//! let report = monitor.run(&mut source).await?;
//! assert_eq!(report.stop_reason, StopReason::SourceEnded);
//! assert_eq!(monitor.destination().table("users").map(<[_]>::len), Some(1));
//! # Ok(())
//! # }
//! ```

use crate::destination::SnapshotDestination;
use crate::event::ChangeEvent;
use crate::key::KeyStrategy;
use crate::metrics::{self, MonitorStatus};
use crate::normalize::EventNormalizer;
use crate::preflight::{PreconditionCheck, PreconditionError};
use crate::schema::{SchemaRegistry, SchemaSource};
use crate::snapshot::{self, FlushReport, FlushScope};
use crate::state::{ApplyOutcome, TableStateStore};
use crate::stream::{EventSource, StreamError};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Configuration for a [`Monitor`].
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Database whose tables are materialized
    pub database: String,

    /// Tables to load schemas for (empty = every table of the database)
    pub tables: Vec<String>,

    /// Flush changed tables on this period while streaming (None = only on stop)
    pub flush_interval: Option<Duration>,

    /// Flush changed tables after this many events (None = no count trigger)
    pub flush_every_events: Option<u64>,

    /// How rows are identified per table
    pub keys: KeyStrategy,
}

impl MonitorConfig {
    /// Creates a new builder for `MonitorConfig`.
    #[must_use]
    pub fn builder() -> MonitorConfigBuilder {
        MonitorConfigBuilder::default()
    }
}

/// Builder for `MonitorConfig`.
#[derive(Debug, Default)]
pub struct MonitorConfigBuilder {
    database: Option<String>,
    tables: Vec<String>,
    flush_interval: Option<Duration>,
    flush_every_events: Option<u64>,
    keys: Option<KeyStrategy>,
}

impl MonitorConfigBuilder {
    /// Sets the database name (required).
    #[must_use]
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Restricts schema loading to these tables.
    #[must_use]
    pub fn tables(mut self, tables: Vec<String>) -> Self {
        self.tables = tables;
        self
    }

    /// Sets the periodic flush interval.
    #[must_use]
    pub const fn flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = Some(interval);
        self
    }

    /// Flushes after every `count` events.
    #[must_use]
    pub const fn flush_every_events(mut self, count: u64) -> Self {
        self.flush_every_events = Some(count);
        self
    }

    /// Sets the key strategy (default: column `id` for every table).
    #[must_use]
    pub fn keys(mut self, keys: KeyStrategy) -> Self {
        self.keys = Some(keys);
        self
    }

    /// Builds the `MonitorConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database is missing or empty, or if a flush trigger
    /// is zero.
    pub fn build(self) -> Result<MonitorConfig, String> {
        let database = self.database.ok_or("database is required")?;
        if database.is_empty() {
            return Err("database cannot be empty".to_string());
        }

        if self.flush_interval.is_some_and(|d| d.is_zero()) {
            return Err("flush_interval must be greater than zero".to_string());
        }

        if self.flush_every_events == Some(0) {
            return Err("flush_every_events must be greater than zero".to_string());
        }

        Ok(MonitorConfig {
            database,
            tables: self.tables,
            flush_interval: self.flush_interval,
            flush_every_events: self.flush_every_events,
            keys: self.keys.unwrap_or_default(),
        })
    }
}

/// Lifecycle state of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// Created; schemas not loaded
    Idle,
    /// Schemas loaded; ready to stream
    Preflighted,
    /// Pulling and applying events
    Streaming,
    /// Final flush and cleanup in progress
    Stopping,
    /// Finished; terminal
    Stopped,
}

impl MonitorState {
    /// Gauge value for this state.
    #[must_use]
    pub const fn status(self) -> MonitorStatus {
        match self {
            Self::Idle => MonitorStatus::Idle,
            Self::Preflighted => MonitorStatus::Preflighted,
            Self::Streaming => MonitorStatus::Streaming,
            Self::Stopping => MonitorStatus::Stopping,
            Self::Stopped => MonitorStatus::Stopped,
        }
    }
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Preflighted => "preflighted",
            Self::Streaming => "streaming",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Why streaming ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    /// [`MonitorHandle::stop`] was called
    StopRequested,
    /// The event source reported end of stream
    SourceEnded,
    /// The event source failed with this message
    SourceFailed(String),
}

impl StopReason {
    /// Returns true when streaming ended because of a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        matches!(self, Self::SourceFailed(_))
    }
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StopRequested => f.write_str("stop requested"),
            Self::SourceEnded => f.write_str("event source ended"),
            Self::SourceFailed(message) => write!(f, "event source failed: {message}"),
        }
    }
}

/// Monitor statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Events received from the source
    pub events_received: u64,

    /// Events the source could not decode
    pub events_skipped: u64,

    /// Upserts applied
    pub rows_upserted: u64,

    /// Removes that deleted a record
    pub rows_removed: u64,

    /// Removes for keys that were not present
    pub removes_absent: u64,

    /// Rows dropped for lack of a key
    pub rows_skipped: u64,

    /// Flushes run (periodic and final)
    pub flushes: u64,

    /// Table writes that failed across all flushes
    pub table_writes_failed: u64,
}

/// Outcome of [`Monitor::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorReport {
    /// State when the report was produced (always `Stopped`)
    pub state: MonitorState,
    /// Why streaming ended
    pub stop_reason: StopReason,
    /// Final statistics
    pub stats: MonitorStats,
    /// Result of the final flush
    pub final_flush: FlushReport,
}

/// Monitor errors.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    /// Operation not allowed in the current state
    #[error("Monitor is {actual}, expected {expected}")]
    InvalidState {
        /// State the operation requires
        expected: MonitorState,
        /// Current state
        actual: MonitorState,
    },

    /// A precondition check failed
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// An earlier precondition check failed, so the monitor cannot proceed
    #[error("Preconditions not met; streaming is not allowed")]
    PreconditionsNotMet,

    /// Unexpected event source failure
    #[error("Event source error: {0}")]
    Stream(#[from] StreamError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Cloneable handle to stop a running monitor and watch its state.
///
/// `stop` may be called from any task or thread, including a signal handler task.
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    stop_tx: Arc<watch::Sender<bool>>,
    state_rx: watch::Receiver<MonitorState>,
}

impl MonitorHandle {
    /// Requests a stop. Idempotent; also honored if sent before streaming starts.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// Returns true once a stop was requested.
    #[must_use]
    pub fn is_stop_requested(&self) -> bool {
        *self.stop_tx.borrow()
    }

    /// Current state of the monitor.
    #[must_use]
    pub fn state(&self) -> MonitorState {
        *self.state_rx.borrow()
    }

    /// Waits until the monitor reaches `state`.
    ///
    /// Returns false if the monitor was dropped first.
    pub async fn wait_for_state(&self, state: MonitorState) -> bool {
        let mut rx = self.state_rx.clone();
        let reached = rx.wait_for(|current| *current == state).await.is_ok();
        reached
    }

    /// Completes once a stop is requested, including one sent before
    /// [`Monitor::run`] started.
    pub async fn stopped(&self) {
        let mut rx = self.stop_tx.subscribe();
        // The handle owns a sender, so the channel cannot close while waiting.
        let _ = rx.wait_for(|stop| *stop).await;
    }
}

/// Materializes one database's tables from a change event stream.
pub struct Monitor<D: SnapshotDestination> {
    /// Monitor configuration
    config: MonitorConfig,

    /// Column lists per table
    registry: SchemaRegistry,

    /// Event to mutation conversion
    normalizer: EventNormalizer,

    /// Materialized state
    store: TableStateStore,

    /// Where snapshots go
    destination: D,

    /// Lifecycle state, observable through handles
    state_tx: watch::Sender<MonitorState>,

    /// Stop flag shared with handles
    stop_tx: Arc<watch::Sender<bool>>,

    /// Set when a precondition check failed
    preconditions_failed: bool,

    /// Statistics
    stats: MonitorStats,
}

impl<D: SnapshotDestination> Monitor<D> {
    /// Creates an idle monitor writing snapshots to `destination`.
    pub fn new(config: MonitorConfig, destination: D) -> Self {
        info!(
            database = %config.database,
            tables = ?config.tables,
            flush_interval = ?config.flush_interval,
            flush_every_events = ?config.flush_every_events,
            keys = ?config.keys,
            destination = %destination.metadata().name,
            "Creating monitor"
        );

        let (state_tx, _) = watch::channel(MonitorState::Idle);
        let (stop_tx, _) = watch::channel(false);
        metrics::set_monitor_status(MonitorStatus::Idle);

        Self {
            registry: SchemaRegistry::new(config.database.clone()),
            normalizer: EventNormalizer::new(config.keys.clone()),
            config,
            store: TableStateStore::new(),
            destination,
            state_tx,
            stop_tx: Arc::new(stop_tx),
            preconditions_failed: false,
            stats: MonitorStats::default(),
        }
    }

    /// Returns a handle for stopping the monitor from another task.
    #[must_use]
    pub fn handle(&self) -> MonitorHandle {
        MonitorHandle {
            stop_tx: Arc::clone(&self.stop_tx),
            state_rx: self.state_tx.subscribe(),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> MonitorState {
        *self.state_tx.borrow()
    }

    fn set_state(&self, state: MonitorState) {
        debug!(state = %state, "Monitor state change");
        self.state_tx.send_replace(state);
        metrics::set_monitor_status(state.status());
    }

    fn expect_state(&self, expected: MonitorState) -> Result<(), MonitorError> {
        let actual = self.state();
        if actual == expected {
            Ok(())
        } else {
            Err(MonitorError::InvalidState { expected, actual })
        }
    }

    /// Runs a precondition check.
    ///
    /// On failure the remediation is logged and the monitor refuses to load schemas
    /// or stream.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::Precondition`] if the check fails, or
    /// [`MonitorError::InvalidState`] if the monitor is not idle.
    #[instrument(skip_all, fields(database = %self.config.database))]
    pub async fn check_preconditions<P>(&mut self, check: &P) -> Result<(), MonitorError>
    where
        P: PreconditionCheck + ?Sized,
    {
        self.expect_state(MonitorState::Idle)?;

        match check.check().await {
            Ok(()) => {
                info!("Preconditions satisfied");
                Ok(())
            }
            Err(e) => {
                e.report();
                self.preconditions_failed = true;
                Err(MonitorError::Precondition(e))
            }
        }
    }

    /// Loads column lists and moves to `Preflighted`.
    ///
    /// Per-table failures degrade that table to an empty schema and are not errors.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::PreconditionsNotMet`] after a failed precondition
    /// check, or [`MonitorError::InvalidState`] if the monitor is not idle.
    #[instrument(skip_all, fields(database = %self.config.database))]
    pub async fn load_schemas<S>(&mut self, source: &S) -> Result<(), MonitorError>
    where
        S: SchemaSource + ?Sized,
    {
        if self.preconditions_failed {
            return Err(MonitorError::PreconditionsNotMet);
        }
        self.expect_state(MonitorState::Idle)?;

        self.registry = if self.config.tables.is_empty() {
            SchemaRegistry::discover(source, &self.config.database).await
        } else {
            SchemaRegistry::load(source, &self.config.database, &self.config.tables).await
        };

        self.set_state(MonitorState::Preflighted);
        Ok(())
    }

    /// Streams events from `source` until stopped, then flushes and closes it.
    ///
    /// The source is closed unconditionally before this returns.
    ///
    /// # Errors
    ///
    /// Returns [`MonitorError::InvalidState`] if schemas were not loaded, and
    /// [`MonitorError::Stream`] for fatal source failures (after the final flush and
    /// close). Ordinary read failures end the run with
    /// [`StopReason::SourceFailed`] instead.
    #[instrument(skip_all, fields(database = %self.config.database))]
    pub async fn run<S>(&mut self, source: &mut S) -> Result<MonitorReport, MonitorError>
    where
        S: EventSource + ?Sized,
    {
        if self.preconditions_failed {
            return Err(MonitorError::PreconditionsNotMet);
        }
        self.expect_state(MonitorState::Preflighted)?;
        self.set_state(MonitorState::Streaming);
        info!(tables = self.registry.len(), "Streaming started");

        let mut stop_rx = self.stop_tx.subscribe();
        let mut ticker = self.config.flush_interval.map(|period| {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker
        });
        let mut events_since_flush: u64 = 0;
        let mut fatal: Option<StreamError> = None;

        let stop_reason = loop {
            if *stop_rx.borrow_and_update() {
                info!("Received stop request");
                break StopReason::StopRequested;
            }

            let next = tokio::select! {
                biased;

                changed = stop_rx.changed() => {
                    if changed.is_err() {
                        break StopReason::StopRequested;
                    }
                    continue;
                }

                () = next_tick(&mut ticker) => {
                    debug!("Flush interval elapsed");
                    self.flush(FlushScope::Dirty).await;
                    events_since_flush = 0;
                    continue;
                }

                next = source.next_event() => next,
            };

            match next {
                Some(Ok(event)) => {
                    self.process_event(event);
                    events_since_flush += 1;

                    if self
                        .config
                        .flush_every_events
                        .is_some_and(|limit| events_since_flush >= limit)
                    {
                        debug!(events = events_since_flush, "Event count reached - flushing");
                        self.flush(FlushScope::Dirty).await;
                        events_since_flush = 0;
                    }
                }
                Some(Err(e)) if e.is_skippable() => {
                    warn!(error = %e, "Skipping undecodable event");
                    metrics::increment_source_errors(e.category());
                    self.stats.events_skipped += 1;
                }
                Some(Err(e)) => {
                    metrics::increment_source_errors(e.category());
                    error!(error = %e, "Error reading from event source");
                    if let Some(hint) = e.hint() {
                        error!("{hint}");
                    }
                    let reason = StopReason::SourceFailed(e.to_string());
                    if e.is_fatal() {
                        fatal = Some(e);
                    }
                    break reason;
                }
                None => {
                    info!("Event source ended");
                    break StopReason::SourceEnded;
                }
            }
        };

        self.set_state(MonitorState::Stopping);
        info!(reason = %stop_reason, "Stopping monitor");

        let final_flush = self.flush(FlushScope::All).await;

        if let Err(e) = source.close().await {
            warn!(error = %e, "Failed to close event source");
        }
        if let Err(e) = self.destination.close().await {
            warn!(error = %e, "Failed to close snapshot destination");
        }

        self.set_state(MonitorState::Stopped);
        info!(
            events_received = self.stats.events_received,
            rows_upserted = self.stats.rows_upserted,
            rows_removed = self.stats.rows_removed,
            rows_skipped = self.stats.rows_skipped,
            flushes = self.stats.flushes,
            table_writes_failed = self.stats.table_writes_failed,
            "Monitor stopped"
        );

        if let Some(e) = fatal {
            return Err(MonitorError::Stream(e));
        }

        Ok(MonitorReport {
            state: self.state(),
            stop_reason,
            stats: self.stats.clone(),
            final_flush,
        })
    }

    /// Normalizes and applies one event.
    fn process_event(&mut self, event: ChangeEvent) {
        let operation = event.operation();
        debug!(
            table = %event.table_name(),
            operation = %operation,
            rows = event.row_count(),
            "Received event"
        );
        metrics::increment_events_received(event.table_name(), operation.as_str());
        self.stats.events_received += 1;

        let normalized = self.normalizer.normalize(&self.registry, event);
        self.store.ensure_table(&normalized.table);
        self.stats.rows_skipped += normalized.skipped as u64;

        let (mut upserts, mut removes) = (0_u64, 0_u64);
        for mutation in normalized.mutations {
            match self.store.apply(mutation) {
                ApplyOutcome::Inserted | ApplyOutcome::Replaced => upserts += 1,
                ApplyOutcome::Removed => removes += 1,
                ApplyOutcome::Absent => self.stats.removes_absent += 1,
            }
        }
        self.stats.rows_upserted += upserts;
        self.stats.rows_removed += removes;

        if upserts > 0 {
            metrics::increment_rows_applied(&normalized.table, "upsert", upserts);
        }
        if removes > 0 {
            metrics::increment_rows_applied(&normalized.table, "remove", removes);
        }
        metrics::set_tracked_rows(self.store.row_count(&normalized.table), &normalized.table);
        metrics::set_tracked_tables(self.store.table_count());
    }

    /// Writes tables to the destination now.
    pub async fn flush(&mut self, scope: FlushScope) -> FlushReport {
        let report = snapshot::flush(&mut self.store, &mut self.destination, scope).await;
        self.stats.flushes += 1;
        self.stats.table_writes_failed += report.failed.len() as u64;
        report
    }

    /// Monitor configuration.
    #[must_use]
    pub const fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Loaded schemas.
    #[must_use]
    pub const fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    /// Materialized state.
    #[must_use]
    pub const fn store(&self) -> &TableStateStore {
        &self.store
    }

    /// Current statistics.
    #[must_use]
    pub const fn stats(&self) -> &MonitorStats {
        &self.stats
    }

    /// Snapshot destination.
    #[must_use]
    pub const fn destination(&self) -> &D {
        &self.destination
    }
}

impl<D: SnapshotDestination> Drop for Monitor<D> {
    fn drop(&mut self) {
        if self.state() == MonitorState::Streaming {
            warn!(
                tables = self.store.table_count(),
                rows = self.store.total_rows(),
                "Monitor dropped while streaming - state was not flushed"
            );
        }
    }
}

/// Waits for the next tick, or forever when no interval is configured.
async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(ticker) => {
            ticker.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::destination::MockDestination;
    use crate::preflight::{PreconditionKind, StaticPrecondition};
    use crate::schema::StaticSchemaSource;
    use crate::stream::ChannelEventSource;

    fn config() -> MonitorConfig {
        MonitorConfig::builder().database("shop").build().unwrap()
    }

    #[test]
    fn test_config_builder_defaults() {
        let config = config();
        assert_eq!(config.database, "shop");
        assert!(config.tables.is_empty());
        assert_eq!(config.flush_interval, None);
        assert_eq!(config.flush_every_events, None);
    }

    #[test]
    fn test_config_builder_validation() {
        assert!(MonitorConfig::builder().build().unwrap_err().contains("database"));
        assert!(MonitorConfig::builder().database("").build().unwrap_err().contains("empty"));
        assert!(MonitorConfig::builder()
            .database("db")
            .flush_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(MonitorConfig::builder()
            .database("db")
            .flush_every_events(0)
            .build()
            .is_err());
    }

    #[tokio::test]
    async fn test_run_requires_preflight() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        let (_tx, mut source) = ChannelEventSource::new(1);

        let err = monitor.run(&mut source).await.unwrap_err();
        assert!(matches!(
            err,
            MonitorError::InvalidState {
                expected: MonitorState::Preflighted,
                actual: MonitorState::Idle
            }
        ));
    }

    #[tokio::test]
    async fn test_failed_precondition_blocks_streaming() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        let check = StaticPrecondition::failing(PreconditionError::new(
            PreconditionKind::ReplicationDisabled,
            "binary logging is off",
        ));

        assert!(matches!(
            monitor.check_preconditions(&check).await,
            Err(MonitorError::Precondition(_))
        ));
        assert!(matches!(
            monitor.load_schemas(&StaticSchemaSource::new()).await,
            Err(MonitorError::PreconditionsNotMet)
        ));
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_load_schemas_moves_to_preflighted() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        monitor
            .check_preconditions(&StaticPrecondition::passing())
            .await
            .unwrap();
        monitor
            .load_schemas(&StaticSchemaSource::new().with_table("users", ["id"]))
            .await
            .unwrap();

        assert_eq!(monitor.state(), MonitorState::Preflighted);
        assert_eq!(monitor.registry().tables(), vec!["users"]);

        // Loading twice is not allowed
        assert!(monitor
            .load_schemas(&StaticSchemaSource::new())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_stop_before_run_is_honored() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        monitor.load_schemas(&StaticSchemaSource::new()).await.unwrap();
        let handle = monitor.handle();
        handle.stop();

        let (_tx, mut source) = ChannelEventSource::new(1);
        let report = monitor.run(&mut source).await.unwrap();

        assert_eq!(report.stop_reason, StopReason::StopRequested);
        assert!(source.is_closed());
        assert_eq!(handle.state(), MonitorState::Stopped);
    }

    struct HangingPrecondition;

    #[async_trait::async_trait]
    impl PreconditionCheck for HangingPrecondition {
        async fn check(&self) -> Result<(), PreconditionError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn test_stop_interrupts_setup() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        let handle = monitor.handle();

        let stopper = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            stopper.stop();
        });

        let interrupted = tokio::time::timeout(Duration::from_secs(5), async {
            tokio::select! {
                () = handle.stopped() => true,
                _ = monitor.check_preconditions(&HangingPrecondition) => false,
            }
        })
        .await
        .expect("stop should interrupt a hanging check");

        assert!(interrupted);
        assert_eq!(monitor.state(), MonitorState::Idle);
    }

    #[tokio::test]
    async fn test_wait_for_state_sees_reached_and_dropped() {
        let mut monitor = Monitor::new(config(), MockDestination::new());
        let handle = monitor.handle();
        monitor.load_schemas(&StaticSchemaSource::new()).await.unwrap();

        assert!(handle.wait_for_state(MonitorState::Preflighted).await);

        drop(monitor);
        assert!(!handle.wait_for_state(MonitorState::Streaming).await);
    }

    #[tokio::test]
    async fn test_stopped_completes_for_earlier_stop() {
        let monitor = Monitor::new(config(), MockDestination::new());
        let handle = monitor.handle();
        handle.stop();

        tokio::time::timeout(Duration::from_secs(1), handle.stopped())
            .await
            .expect("stop was already requested");
    }

    #[test]
    fn test_stop_reason_display() {
        assert_eq!(StopReason::SourceEnded.to_string(), "event source ended");
        assert!(StopReason::SourceFailed("x".into()).is_failure());
        assert!(!StopReason::StopRequested.is_failure());
    }

    #[test]
    fn test_state_status_mapping() {
        assert_eq!(MonitorState::Streaming.status() as u8, 2);
        assert_eq!(MonitorState::Stopped.to_string(), "stopped");
    }
}
