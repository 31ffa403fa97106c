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

//! MySQL integration for Nagashi.
//!
//! This crate connects Nagashi to a MySQL server acting as a replication source:
//!
//! - [`ReplicationPreflight`] verifies binary logging, row-based format and the
//!   replication grants before anything is streamed
//! - [`InformationSchemaSource`] reads ordered column lists from
//!   `information_schema`
//! - [`BinlogEventSource`] registers as a replica and yields row events of the
//!   monitored database, starting at the server's current binlog position
//!
//! # Server requirements
//!
//! ```text
//! log_bin        = ON
//! binlog_format  = ROW
//! GRANT REPLICATION SLAVE, REPLICATION CLIENT ON *.* TO '<user>'@'%';
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nagashi_core::{Monitor, MonitorConfig};
//! use nagashi_mysql::{BinlogEventSource, InformationSchemaSource, MySqlConfig, ReplicationPreflight};
//!
//! # async fn example(destination: impl nagashi_core::SnapshotDestination) -> Result<(), Box<dyn std::error::Error>> {
//! let mysql = MySqlConfig::builder()
//!     .host("localhost")
//!     .user("root")
//!     .password("secret")
//!     .database("shop")
//!     .build()?;
//!
//! let config = MonitorConfig::builder().database("shop").build()?;
//! let mut monitor = Monitor::new(config, destination);
//!
//! monitor.check_preconditions(&ReplicationPreflight::new(mysql.clone())).await?;
//! let schemas = InformationSchemaSource::new(&mysql);
//! monitor.load_schemas(&schemas).await?;
//! schemas.disconnect().await;
//!
//! let mut source = BinlogEventSource::connect(&mysql).await?;
//! let report = monitor.run(&mut source).await?;
//! println!("stopped: {}", report.stop_reason);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod preflight;
pub mod schema;
pub mod source;
pub mod status;
pub mod value;

pub use config::{MySqlConfig, MySqlConfigBuilder, DEFAULT_SERVER_ID};
pub use error::MySqlError;
pub use preflight::ReplicationPreflight;
pub use schema::InformationSchemaSource;
pub use source::BinlogEventSource;
pub use status::{BinlogPosition, BinlogStatusQuery};
