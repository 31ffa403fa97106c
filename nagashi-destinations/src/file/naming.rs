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

//! Table name to file name mapping.

use nagashi_core::destination::DestinationError;

/// Checks that `table` can be used as a file name inside the output directory.
///
/// Table names come straight from the replication log, so anything that could
/// escape the directory or collide with temporary files is rejected.
///
/// # Errors
///
/// Returns [`DestinationError::InvalidTable`] for empty names, `.`/`..`, names
/// with a path separator or NUL, and names starting with a dot.
pub fn validate_table_name(table: &str) -> Result<(), DestinationError> {
    let reason = if table.is_empty() {
        "name is empty"
    } else if table == "." || table == ".." {
        "name is a relative path component"
    } else if table.contains(['/', '\\']) {
        "name contains a path separator"
    } else if table.contains('\0') {
        "name contains NUL"
    } else if table.starts_with('.') {
        "name starts with a dot"
    } else {
        return Ok(());
    };

    Err(DestinationError::invalid_table(table, reason))
}

/// File name of a table snapshot, e.g. `users.json` or `users.json.gz`.
#[must_use]
pub fn snapshot_file_name(table: &str, full_extension: &str) -> String {
    format!("{table}.{full_extension}")
}

/// Hidden temporary file name used while writing `file_name`.
pub(crate) fn temp_file_name(file_name: &str, sequence: u64) -> String {
    format!(".{file_name}.tmp-{}-{sequence}", std::process::id())
}
