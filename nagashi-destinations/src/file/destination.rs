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

//! File snapshot destination implementation.

use super::config::{Compression, FileDestinationConfig};
use super::naming::{snapshot_file_name, temp_file_name, validate_table_name};
use async_trait::async_trait;
use nagashi_core::destination::{
    DestinationError, DestinationMetadata, SnapshotDestination, SnapshotWrite,
};
use nagashi_core::value::Record;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// Writes each table snapshot to its own JSON file.
///
/// # Atomicity
///
/// A table write either leaves the previous file untouched or replaces it with
/// the complete new content. The new content is written to a temporary file in
/// the output directory and renamed over the target; with `fsync` enabled the
/// file and the directory entry are synced before the write is reported.
///
/// # Examples
///
/// ```rust,ignore
/// use nagashi_destinations::file::{FileDestinationConfig, FileSnapshotDestination};
/// use nagashi_core::SnapshotDestination;
///
/// let config = FileDestinationConfig::builder().output_dir("./logs").build()?;
/// let mut destination = FileSnapshotDestination::new(config).await?;
///
/// destination.write_table("users", &records).await?;
/// destination.close().await?;
/// ```
#[derive(Debug)]
pub struct FileSnapshotDestination {
    /// Configuration
    config: FileDestinationConfig,

    /// Temporary file sequence number
    sequence: u64,

    /// Successful writes
    writes: u64,

    /// Whether the destination has been closed
    closed: bool,
}

impl FileSnapshotDestination {
    /// Creates the destination, creating the output directory if needed.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError::ConfigurationError`] if the output directory
    /// cannot be created.
    pub async fn new(config: FileDestinationConfig) -> Result<Self, DestinationError> {
        info!(
            output_dir = %config.output_dir.display(),
            extension = %config.full_extension(),
            pretty = config.pretty,
            fsync = config.fsync,
            "Initializing file destination"
        );

        fs::create_dir_all(&config.output_dir).await.map_err(|e| {
            DestinationError::configuration(
                format!(
                    "Cannot create output directory {}: {e}",
                    config.output_dir.display()
                ),
                Some("output_dir".to_string()),
            )
        })?;

        Ok(Self {
            config,
            sequence: 0,
            writes: 0,
            closed: false,
        })
    }

    /// Configuration in use.
    #[must_use]
    pub const fn config(&self) -> &FileDestinationConfig {
        &self.config
    }

    /// Path the snapshot of `table` is written to.
    ///
    /// # Errors
    ///
    /// Returns [`DestinationError::InvalidTable`] if the table name cannot be used
    /// as a file name.
    pub fn path_for(&self, table: &str) -> Result<PathBuf, DestinationError> {
        validate_table_name(table)?;
        Ok(self
            .config
            .output_dir
            .join(snapshot_file_name(table, &self.config.full_extension())))
    }

    /// Encodes records as a JSON array.
    fn encode(&self, records: &[&Record]) -> Result<Vec<u8>, DestinationError> {
        let encoded = if self.config.pretty {
            serde_json::to_vec_pretty(records)
        } else {
            serde_json::to_vec(records)
        };
        encoded.map_err(|e| DestinationError::serialization(e, "Failed to encode snapshot"))
    }

    /// Compresses data based on the configured compression algorithm.
    fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>, DestinationError> {
        match self.config.compression {
            Compression::None => Ok(data),
            #[cfg(feature = "gzip")]
            Compression::Gzip => Self::compress_gzip(&data),
        }
    }

    /// Compresses data using gzip.
    #[cfg(feature = "gzip")]
    fn compress_gzip(data: &[u8]) -> Result<Vec<u8>, DestinationError> {
        use flate2::write::GzEncoder;
        use flate2::Compression as GzCompression;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), GzCompression::default());
        encoder
            .write_all(data)
            .map_err(|e| DestinationError::serialization(e, "Failed to compress with gzip"))?;

        encoder
            .finish()
            .map_err(|e| DestinationError::serialization(e, "Failed to finalize gzip compression"))
    }

    /// Writes `data` to `target` through a temporary file and a rename.
    async fn replace_file(&mut self, target: &Path, data: &[u8]) -> io::Result<()> {
        let file_name = target
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid target path"))?;

        self.sequence += 1;
        let temp = self
            .config
            .output_dir
            .join(temp_file_name(file_name, self.sequence));

        let result = self.write_and_rename(&temp, target, data).await;
        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp).await {
                if e.kind() != io::ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %e, "Failed to remove temporary file");
                }
            }
        }
        result
    }

    async fn write_and_rename(&self, temp: &Path, target: &Path, data: &[u8]) -> io::Result<()> {
        let mut file = fs::File::create(temp).await?;
        file.write_all(data).await?;
        file.flush().await?;
        if self.config.fsync {
            file.sync_all().await?;
        }
        drop(file);

        fs::rename(temp, target).await?;

        if self.config.fsync {
            self.sync_output_dir().await;
        }
        Ok(())
    }

    /// Syncs the directory entry after a rename. The new content is already in
    /// place, so a failure here is only logged.
    #[cfg(unix)]
    async fn sync_output_dir(&self) {
        let result = async {
            let dir = fs::File::open(&self.config.output_dir).await?;
            dir.sync_all().await
        }
        .await;

        if let Err(e) = result {
            warn!(
                output_dir = %self.config.output_dir.display(),
                error = %e,
                "Failed to sync output directory"
            );
        }
    }

    #[cfg(not(unix))]
    async fn sync_output_dir(&self) {}
}

/// Permission and invalid-path problems will not go away on their own.
fn is_retryable(error: &io::Error) -> bool {
    !matches!(
        error.kind(),
        io::ErrorKind::PermissionDenied | io::ErrorKind::InvalidInput
    )
}

#[async_trait]
impl SnapshotDestination for FileSnapshotDestination {
    async fn write_table(
        &mut self,
        table: &str,
        records: &[&Record],
    ) -> Result<SnapshotWrite, DestinationError> {
        if self.closed {
            return Err(DestinationError::write_msg(
                "Cannot write to closed file destination",
                false,
            ));
        }

        let target = self.path_for(table)?;
        let encoded = self.encode(records)?;
        let uncompressed_size = encoded.len();
        let data = self.compress(encoded)?;

        self.replace_file(&target, &data).await.map_err(|e| {
            let retryable = is_retryable(&e);
            DestinationError::write(e, retryable)
        })?;
        self.writes += 1;

        debug!(
            table = %table,
            path = %target.display(),
            rows = records.len(),
            bytes = data.len(),
            uncompressed_bytes = uncompressed_size,
            "Wrote table snapshot"
        );

        Ok(SnapshotWrite::new(target.display().to_string(), data.len()))
    }

    async fn close(&mut self) -> Result<(), DestinationError> {
        if self.closed {
            debug!("File destination already closed");
            return Ok(());
        }

        self.closed = true;
        info!(writes = self.writes, "File destination closed");
        Ok(())
    }

    fn metadata(&self) -> DestinationMetadata {
        DestinationMetadata::new("JSON files", "file")
            .with_atomic_writes(true)
            .with_property("output_dir", self.config.output_dir.display().to_string())
            .with_property("extension", self.config.full_extension())
            .with_property("compression", self.config.compression.as_str())
            .with_property("pretty", self.config.pretty.to_string())
    }
}
