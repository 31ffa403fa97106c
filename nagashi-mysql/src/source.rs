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

//! Binlog event source.
//!
//! Opens a replication stream at the server's current binlog position and turns
//! row events of the monitored database into [`ChangeEvent`]s. Table map, rotate
//! and all other events are consumed silently.
//!
//! `ENUM` and `SET` columns only carry indexes in the binlog. Their labels are
//! read from `INFORMATION_SCHEMA` the first time a table's rows are seen.

use crate::config::MySqlConfig;
use crate::error::MySqlError;
use crate::schema::{InformationSchemaSource, ValueLabels};
use crate::status::{current_position, detect_status_query};
use crate::value::{binlog_to_scalar, ColumnKind};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use mysql_async::binlog::events::{Event, EventData, RowsEventData};
use mysql_async::binlog::row::BinlogRow;
use mysql_async::{BinlogStream, BinlogStreamRequest, Column, Conn};
use nagashi_core::event::{
    ChangeEvent, LogPosition, Namespace, OperationType, RowChanges, RowValues, UpdateRow,
};
use nagashi_core::stream::{EventSource, StreamError};
use std::collections::HashMap;
use tracing::{debug, info, instrument, warn};

/// Before and after images of one row, as decoded.
type RowImages = (Option<RowValues>, Option<RowValues>);

/// Outcome of decoding one binlog event.
enum Decoded {
    Change(ChangeEvent),
    Skip,
    /// Rows of this table have `ENUM`/`SET` columns whose labels are not loaded yet
    NeedsLabels(String),
}

/// [`EventSource`] reading row events from a MySQL binlog.
///
/// Reads are cancel safe: an event is only taken off the stream inside a single
/// poll, and decoding is synchronous. An event waiting on a label lookup stays
/// parked in the source until the lookup completes.
pub struct BinlogEventSource {
    /// Replication stream; `None` once closed
    stream: Option<BinlogStream>,

    /// Monitored database
    database: String,

    /// Binlog file of the most recent event
    current_file: Option<String>,

    /// Side connection for `ENUM`/`SET` labels; `None` once closed
    schemas: Option<InformationSchemaSource>,

    /// Labels per table, loaded on first use
    labels: HashMap<String, ValueLabels>,

    /// Event whose table labels are being loaded
    parked: Option<Event>,
}

impl BinlogEventSource {
    /// Connects and starts streaming from the current binlog position.
    ///
    /// # Errors
    ///
    /// Returns a connection or server error if the server cannot be reached, the
    /// position cannot be read, or the server refuses the replication request.
    #[instrument(skip_all, fields(server = %config.endpoint(), server_id = config.server_id))]
    pub async fn connect(config: &MySqlConfig) -> Result<Self, StreamError> {
        let mut conn = Conn::new(config.opts())
            .await
            .map_err(|e| MySqlError::driver("Failed to connect", e))?;

        let query = detect_status_query(&mut conn).await?;
        let position = current_position(&mut conn, query).await?;

        let request = BinlogStreamRequest::new(config.server_id)
            .with_filename(position.file.as_bytes())
            .with_pos(position.position);
        let stream = conn
            .get_binlog_stream(request)
            .await
            .map_err(|e| MySqlError::driver("Failed to start binlog stream", e))?;

        info!(position = %position, database = %config.database, "Binlog stream opened");

        Ok(Self {
            stream: Some(stream),
            database: config.database.clone(),
            current_file: Some(position.file),
            schemas: Some(InformationSchemaSource::new(config)),
            labels: HashMap::new(),
            parked: None,
        })
    }

    /// Monitored database.
    #[must_use]
    pub fn database(&self) -> &str {
        &self.database
    }

    /// Loads the `ENUM`/`SET` labels of `table`. On failure the table is cached
    /// without labels and its values are written as raw numbers.
    async fn load_labels(&mut self, table: String) {
        let labels = match &self.schemas {
            Some(schemas) => match schemas.value_labels(&self.database, &table).await {
                Ok(labels) => {
                    debug!(table = %table, columns = labels.len(), "Loaded ENUM/SET labels");
                    labels
                }
                Err(e) => {
                    warn!(
                        table = %table,
                        error = %e,
                        "Failed to load ENUM/SET labels, writing raw values"
                    );
                    ValueLabels::new()
                }
            },
            None => ValueLabels::new(),
        };
        self.labels.insert(table, labels);
    }

    /// Decodes one binlog event.
    fn decode(&mut self, event: &Event) -> Result<Decoded, StreamError> {
        let data = event
            .read_data()
            .map_err(|e| StreamError::decode(format!("Failed to read binlog event: {e}")))?;

        match data {
            Some(EventData::RotateEvent(rotate)) => {
                let file = rotate.name().into_owned();
                debug!(file = %file, "Binlog rotated");
                self.current_file = Some(file);
                Ok(Decoded::Skip)
            }
            Some(EventData::RowsEvent(rows)) => self.decode_rows(event, &rows),
            _ => Ok(Decoded::Skip),
        }
    }

    fn decode_rows(&self, event: &Event, rows: &RowsEventData<'_>) -> Result<Decoded, StreamError> {
        let stream = self.stream.as_ref().ok_or(StreamError::Closed)?;
        let table_id = rows.table_id();
        let tme = stream
            .get_tme(table_id)
            .ok_or_else(|| StreamError::decode(format!("No table map for table id {table_id}")))?;

        if tme.database_name() != self.database.as_str() {
            return Ok(Decoded::Skip);
        }
        let table = tme.table_name().into_owned();

        let no_labels = ValueLabels::new();
        let cached = self.labels.get(&table);

        let mut images: Vec<RowImages> = Vec::new();
        for row in rows.rows(tme) {
            let (before, after) = row.map_err(|e| {
                StreamError::decode(format!("Failed to decode row of {table}: {e}"))
            })?;
            if cached.is_none() && [&before, &after].into_iter().flatten().any(has_labelled_columns)
            {
                return Ok(Decoded::NeedsLabels(table));
            }
            let labels = cached.unwrap_or(&no_labels);
            images.push((
                before.map(|row| row_values(row, labels)).transpose()?,
                after.map(|row| row_values(row, labels)).transpose()?,
            ));
        }

        let header = event.header();
        let changes = build_changes(operation_of(rows), images);
        let change = ChangeEvent::new(Namespace::new(self.database.clone(), table), changes)
            .with_timestamp(
                DateTime::from_timestamp(i64::from(header.timestamp()), 0)
                    .unwrap_or_else(Utc::now),
            )
            .with_position(LogPosition {
                file: self.current_file.clone(),
                offset: u64::from(header.log_pos()),
            });

        Ok(Decoded::Change(change))
    }
}

/// Operation of a rows event. Partial updates are plain updates here.
const fn operation_of(rows: &RowsEventData<'_>) -> OperationType {
    match rows {
        RowsEventData::WriteRowsEventV1(_) | RowsEventData::WriteRowsEvent(_) => {
            OperationType::Insert
        }
        RowsEventData::UpdateRowsEventV1(_)
        | RowsEventData::UpdateRowsEvent(_)
        | RowsEventData::PartialUpdateRowsEvent(_) => OperationType::Update,
        RowsEventData::DeleteRowsEventV1(_) | RowsEventData::DeleteRowsEvent(_) => {
            OperationType::Delete
        }
    }
}

fn has_labelled_columns(row: &BinlogRow) -> bool {
    row.columns_ref()
        .iter()
        .any(|column| ColumnKind::is_labelled(column.column_type()))
}

/// Converts a row image. Values pair with the image's columns by position.
fn row_values(row: BinlogRow, labels: &ValueLabels) -> Result<RowValues, StreamError> {
    let types: Vec<_> = row.columns_ref().iter().map(Column::column_type).collect();

    // Moves the column values out; never panics.
    row.unwrap()
        .into_iter()
        .zip(types)
        .enumerate()
        .map(|(position, (value, column_type))| {
            let names = labels.get(&position).map_or(&[][..], Vec::as_slice);
            binlog_to_scalar(value, ColumnKind::for_column(column_type, names))
        })
        .collect()
}

/// Shapes decoded images by operation: inserts keep after-images, deletes keep
/// before-images, updates keep both (a missing before-image becomes empty).
fn build_changes(operation: OperationType, images: Vec<RowImages>) -> RowChanges {
    match operation {
        OperationType::Insert => {
            RowChanges::Insert(images.into_iter().filter_map(|(_, after)| after).collect())
        }
        OperationType::Update => RowChanges::Update(
            images
                .into_iter()
                .filter_map(|(before, after)| {
                    after.map(|after| UpdateRow {
                        before: before.unwrap_or_default(),
                        after,
                    })
                })
                .collect(),
        ),
        OperationType::Delete => {
            RowChanges::Delete(images.into_iter().filter_map(|(before, _)| before).collect())
        }
    }
}

#[async_trait]
impl EventSource for BinlogEventSource {
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, StreamError>> {
        loop {
            let event = match self.parked.take() {
                Some(event) => event,
                None => match self.stream.as_mut()?.next().await? {
                    Ok(event) => event,
                    Err(e) => {
                        return Some(Err(MySqlError::driver("Binlog stream failed", e).into()));
                    }
                },
            };

            let mut decoded = self.decode(&event);
            if let Ok(Decoded::NeedsLabels(table)) = decoded {
                self.parked = Some(event);
                self.load_labels(table).await;
                let event = self.parked.take()?;
                decoded = self.decode(&event);
            }

            match decoded {
                Ok(Decoded::Change(change)) => return Some(Ok(change)),
                Ok(Decoded::Skip | Decoded::NeedsLabels(_)) => {}
                Err(e) => return Some(Err(e)),
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.parked = None;
        if let Some(schemas) = self.schemas.take() {
            schemas.disconnect().await;
        }

        let Some(stream) = self.stream.take() else {
            debug!("Binlog stream already closed");
            return Ok(());
        };

        stream
            .close()
            .await
            .map_err(|e| MySqlError::driver("Failed to close binlog stream", e))?;
        info!("Binlog stream closed");
        Ok(())
    }
}

impl Drop for BinlogEventSource {
    fn drop(&mut self) {
        if self.stream.is_some() {
            warn!("BinlogEventSource dropped without calling close() - replication connection aborted");
        }
    }
}
