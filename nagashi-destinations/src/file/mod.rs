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

//! Local file destination for table snapshots.
//!
//! Every flushed table becomes `<output_dir>/<table>.<extension>` holding a JSON
//! array of the table's records. Writes go to a hidden temporary file in the same
//! directory, are synced, and then renamed over the target, so a reader never
//! sees a half-written snapshot even if the process is killed mid-flush.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nagashi_core::SnapshotDestination;
//! use nagashi_destinations::file::{FileDestinationConfig, FileSnapshotDestination};
//!
//! let config = FileDestinationConfig::builder()
//!     .output_dir("./logs")
//!     .pretty(false)
//!     .build()?;
//!
//! let mut destination = FileSnapshotDestination::new(config).await?;
//! destination.write_table("users", &[]).await?; // ./logs/users.json = []
//! ```
//!
//! ## Compressed snapshots
//!
//! ```rust,ignore
//! use nagashi_destinations::file::{Compression, FileDestinationConfig};
//!
//! let config = FileDestinationConfig::builder()
//!     .output_dir("/var/lib/nagashi")
//!     .compression(Compression::Gzip) // users.json.gz
//!     .build()?;
//! ```

mod config;
mod destination;
mod naming;

pub use config::{Compression, FileConfigError, FileDestinationConfig, FileDestinationConfigBuilder};
pub use destination::FileSnapshotDestination;
pub use naming::{snapshot_file_name, validate_table_name};
