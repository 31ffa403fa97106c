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

//! Nagashi Destinations - snapshot writers
//!
//! This crate provides [`SnapshotDestination`](nagashi_core::SnapshotDestination)
//! implementations. Each flush replaces one artifact per table with the table's
//! current content.
//!
//! # Available Destinations
//!
//! - **File**: one JSON array file per table in a local directory, replaced
//!   atomically
//!
//! # Features
//!
//! - `file` - local file destination (default)
//! - `gzip` - gzip-compressed snapshots (`users.json.gz`)
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use nagashi_destinations::file::{FileDestinationConfig, FileSnapshotDestination};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = FileDestinationConfig::builder()
//!         .output_dir("./logs")
//!         .build()?;
//!
//!     let destination = FileSnapshotDestination::new(config).await?;
//!
//!     // Hand it to a Monitor
//!     // let monitor = Monitor::new(monitor_config, destination);
//!     Ok(())
//! }
//! ```

// File destination module (enabled with "file" feature)
#[cfg(feature = "file")]
pub mod file;
