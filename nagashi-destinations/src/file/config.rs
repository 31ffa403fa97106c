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

//! File destination configuration.

use std::path::PathBuf;
use thiserror::Error;

/// Compression applied to snapshot files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Compression {
    /// Plain JSON.
    #[default]
    None,

    /// Gzip (RFC 1952), default level.
    ///
    /// File extension: `.gz` appended to the format extension
    #[cfg(feature = "gzip")]
    Gzip,
}

impl Compression {
    /// Suffix appended after the format extension (with the dot).
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::None => "",
            #[cfg(feature = "gzip")]
            Self::Gzip => ".gz",
        }
    }

    /// Name used in metadata and logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            #[cfg(feature = "gzip")]
            Self::Gzip => "gzip",
        }
    }
}

/// Errors building a [`FileDestinationConfig`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FileConfigError {
    /// No output directory was given.
    #[error("output_dir is required")]
    MissingOutputDir,

    /// The output directory path is empty.
    #[error("output_dir cannot be empty")]
    EmptyOutputDir,

    /// The extension cannot be used in a file name.
    #[error("invalid extension '{extension}': {reason}")]
    InvalidExtension {
        /// Offending extension
        extension: String,
        /// Why it was rejected
        reason: &'static str,
    },
}

/// Configuration for [`FileSnapshotDestination`](super::FileSnapshotDestination).
///
/// # Examples
///
/// ```rust
/// use nagashi_destinations::file::FileDestinationConfig;
///
/// let config = FileDestinationConfig::builder()
///     .output_dir("./logs")
///     .build()
///     .unwrap();
///
/// assert_eq!(config.extension, "json");
/// assert!(config.pretty);
/// assert!(config.fsync);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDestinationConfig {
    /// Directory holding the snapshot files (created if missing).
    pub output_dir: PathBuf,

    /// File extension without the dot (default: `json`).
    pub extension: String,

    /// Indent the JSON output (default: true).
    pub pretty: bool,

    /// Sync file contents and the directory entry before reporting success
    /// (default: true).
    pub fsync: bool,

    /// Compression (default: none).
    pub compression: Compression,
}

impl FileDestinationConfig {
    /// Creates a new builder for `FileDestinationConfig`.
    #[must_use]
    pub fn builder() -> FileDestinationConfigBuilder {
        FileDestinationConfigBuilder::default()
    }

    /// Full extension including compression, e.g. `json.gz`.
    #[must_use]
    pub fn full_extension(&self) -> String {
        format!("{}{}", self.extension, self.compression.extension())
    }
}

/// Builder for `FileDestinationConfig`.
#[derive(Debug, Default)]
pub struct FileDestinationConfigBuilder {
    output_dir: Option<PathBuf>,
    extension: Option<String>,
    pretty: Option<bool>,
    fsync: Option<bool>,
    compression: Option<Compression>,
}

impl FileDestinationConfigBuilder {
    /// Sets the output directory (required).
    #[must_use]
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// Sets the file extension (default: `json`). A leading dot is ignored.
    #[must_use]
    pub fn extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = Some(extension.into());
        self
    }

    /// Enables or disables indented output (default: enabled).
    #[must_use]
    pub const fn pretty(mut self, pretty: bool) -> Self {
        self.pretty = Some(pretty);
        self
    }

    /// Enables or disables fsync after each write (default: enabled).
    #[must_use]
    pub const fn fsync(mut self, fsync: bool) -> Self {
        self.fsync = Some(fsync);
        self
    }

    /// Sets the compression (default: none).
    #[must_use]
    pub const fn compression(mut self, compression: Compression) -> Self {
        self.compression = Some(compression);
        self
    }

    /// Builds the `FileDestinationConfig`.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory is missing or empty, or if the
    /// extension is empty or contains a path separator.
    pub fn build(self) -> Result<FileDestinationConfig, FileConfigError> {
        let output_dir = self.output_dir.ok_or(FileConfigError::MissingOutputDir)?;
        if output_dir.as_os_str().is_empty() {
            return Err(FileConfigError::EmptyOutputDir);
        }

        let extension = self
            .extension
            .map(|ext| ext.trim_start_matches('.').to_string())
            .unwrap_or_else(|| "json".to_string());
        validate_extension(&extension)?;

        Ok(FileDestinationConfig {
            output_dir,
            extension,
            pretty: self.pretty.unwrap_or(true),
            fsync: self.fsync.unwrap_or(true),
            compression: self.compression.unwrap_or_default(),
        })
    }
}

fn validate_extension(extension: &str) -> Result<(), FileConfigError> {
    let reason = if extension.is_empty() {
        "must not be empty"
    } else if extension.contains(['/', '\\']) {
        "must not contain path separators"
    } else if extension.contains('\0') {
        "must not contain NUL"
    } else {
        return Ok(());
    };

    Err(FileConfigError::InvalidExtension {
        extension: extension.to_string(),
        reason,
    })
}
