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

//! Nagashi Core - change event folding and table snapshots
//!
//! This crate turns an ordered stream of row change events (insert, update, delete)
//! into an in-memory copy of each table keyed by primary key, and writes that copy
//! out as whole-table snapshots.
//!
//! # Key Components
//!
//! - **Events**: [`event`] defines row change events as delivered by a binlog reader
//! - **Schemas**: [`schema`] maps positional row values to column names
//! - **Keys**: [`key`] decides which column(s) identify a row
//! - **Normalization**: [`normalize`] turns events into upserts and removes
//! - **State**: [`state`] holds the materialized tables
//! - **Snapshots**: [`snapshot`] and [`destination`] write tables out
//! - **Monitor**: [`monitor`] drives the whole loop and handles shutdown
//!
//! Connectors live in other crates: `nagashi-mysql` provides the binlog event source,
//! schema source and preflight checks, `nagashi-destinations` the file writer.
//!
//! # Example
//!
//! ```rust
//! use nagashi_core::event::{ChangeEvent, Namespace};
//! use nagashi_core::normalize::EventNormalizer;
//! use nagashi_core::schema::{ColumnSchema, SchemaRegistry};
//! use nagashi_core::state::TableStateStore;
//! use nagashi_core::value::{PrimaryKey, ScalarValue};
//!
//! let mut registry = SchemaRegistry::new("shop");
//! registry.insert("users", ColumnSchema::new(["id", "name"]).unwrap());
//!
//! let event = ChangeEvent::insert(
//!     Namespace::new("shop", "users"),
//!     vec![vec![ScalarValue::Int(1), ScalarValue::from("Ann")]],
//! );
//!
//! let mut store = TableStateStore::new();
//! let normalized = EventNormalizer::default().normalize(&registry, event);
//! store.ensure_table(&normalized.table);
//! for mutation in normalized.mutations {
//!     store.apply(mutation);
//! }
//!
//! assert!(store.get("users", &PrimaryKey::Int(1)).is_some());
//! ```

pub mod destination;
pub mod event;
pub mod key;
pub mod metrics;
pub mod monitor;
pub mod normalize;
pub mod preflight;
pub mod schema;
pub mod snapshot;
pub mod state;
pub mod stream;
pub mod value;

pub use destination::{DestinationError, MockDestination, SnapshotDestination, SnapshotWrite};
pub use event::{ChangeEvent, Namespace, OperationType, RowChanges, UpdateRow};
pub use key::{ColumnKey, KeyExtractor, KeyStrategy};
pub use monitor::{
    Monitor, MonitorConfig, MonitorError, MonitorHandle, MonitorReport, MonitorState, MonitorStats,
    StopReason,
};
pub use preflight::{PreconditionCheck, PreconditionError, PreconditionKind};
pub use schema::{ColumnSchema, SchemaError, SchemaRegistry, SchemaSource};
pub use snapshot::{FlushReport, FlushScope};
pub use state::TableStateStore;
pub use stream::{EventSource, StreamError};
pub use value::{PrimaryKey, Record, ScalarValue};
