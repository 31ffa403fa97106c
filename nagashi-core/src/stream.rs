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

//! Event sources: the ordered feed of row change events.
//!
//! An [`EventSource`] yields [`ChangeEvent`]s for one monitored database, strictly
//! in log order. The monitor pulls from it one event at a time.
//!
//! # Cancellation
//!
//! The monitor races [`EventSource::next_event`] against its stop signal and drops
//! the pending future when a stop arrives, so `next_event` must be cancel safe: a
//! dropped call must not lose an event that was already consumed from the
//! underlying connection. After the loop ends, [`EventSource::close`] is always
//! called.
//!
//! # Errors
//!
//! [`StreamError`] separates three classes of failure:
//!
//! - **Skippable** ([`StreamError::Decode`]): one event could not be decoded; the
//!   stream itself is fine and continues.
//! - **Terminal** (connection and server errors): the stream cannot continue;
//!   the monitor stops streaming, flushes, and reports the failure.
//! - **Fatal** ([`StreamError::Fatal`]): an unexpected condition; the monitor still
//!   flushes and closes the source, then propagates the error.

use crate::event::ChangeEvent;
use crate::metrics::ErrorCategory;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

/// Errors reported by an event source.
#[derive(Error, Debug)]
pub enum StreamError {
    /// Connection to the server failed or was lost.
    #[error("Connection error: {message}")]
    Connection {
        /// Human-readable error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The server rejected a replication command.
    #[error("Server error{}: {message}", .code.map(|c| format!(" {c}")).unwrap_or_default())]
    Server {
        /// Server error code, if known
        code: Option<u16>,
        /// Server message
        message: String,
        /// Operator hint, if the code is a known trap
        hint: Option<String>,
    },

    /// A single event could not be decoded; the stream is still usable.
    #[error("Failed to decode event: {message}")]
    Decode {
        /// Human-readable error message
        message: String,
    },

    /// The source was already closed.
    #[error("Event source is closed")]
    Closed,

    /// Invalid source configuration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// An unexpected failure.
    #[error("Unexpected event source failure: {message}")]
    Fatal {
        /// Human-readable error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StreamError {
    /// Creates a connection error from any error type.
    #[must_use]
    pub fn connection(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Connection {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a connection error with a custom message.
    #[must_use]
    pub fn connection_msg(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a decode error.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Creates a fatal error from any error type.
    #[must_use]
    pub fn fatal(source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Fatal {
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }

    /// Creates a fatal error with a custom message.
    #[must_use]
    pub fn fatal_msg(message: impl Into<String>) -> Self {
        Self::Fatal {
            message: message.into(),
            source: None,
        }
    }

    /// Returns true when only the current event is affected.
    #[must_use]
    pub const fn is_skippable(&self) -> bool {
        matches!(self, Self::Decode { .. })
    }

    /// Returns true for unexpected failures that must propagate to the caller.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal { .. } | Self::Configuration(_))
    }

    /// Operator hint attached to the error, if any.
    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        match self {
            Self::Server { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }

    /// Metric label category.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Connection { .. } | Self::Closed => ErrorCategory::Connection,
            Self::Server { .. } => ErrorCategory::Protocol,
            Self::Decode { .. } => ErrorCategory::Serialization,
            Self::Configuration(_) => ErrorCategory::Validation,
            Self::Fatal { .. } => ErrorCategory::Unknown,
        }
    }
}

/// A pull-based feed of change events.
#[async_trait]
pub trait EventSource: Send {
    /// Waits for the next event.
    ///
    /// Returns `None` once the stream has ended. Must be cancel safe.
    async fn next_event(&mut self) -> Option<Result<ChangeEvent, StreamError>>;

    /// Closes the underlying connection. Safe to call more than once.
    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Item carried by a [`ChannelEventSource`].
pub type SourceItem = Result<ChangeEvent, StreamError>;

/// Producer half of a [`ChannelEventSource`].
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: mpsc::Sender<SourceItem>,
}

impl EventSender {
    /// Sends an event. Fails once the source is closed.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the receiving side is gone.
    pub async fn send(&self, event: ChangeEvent) -> Result<(), StreamError> {
        self.tx.send(Ok(event)).await.map_err(|_| StreamError::Closed)
    }

    /// Sends an error item.
    ///
    /// # Errors
    ///
    /// Returns [`StreamError::Closed`] if the receiving side is gone.
    pub async fn fail(&self, error: StreamError) -> Result<(), StreamError> {
        self.tx.send(Err(error)).await.map_err(|_| StreamError::Closed)
    }

    /// Returns true once the source has been closed or dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Event source backed by a bounded channel.
///
/// Useful for tests and for feeding events from another task. The stream ends when
/// every [`EventSender`] is dropped.
///
/// ```rust
/// use nagashi_core::event::{ChangeEvent, Namespace};
/// use nagashi_core::stream::{ChannelEventSource, EventSource};
///
/// # #[tokio::main]
/// # async fn main() {
/// let (tx, mut source) = ChannelEventSource::new(16);
/// tx.send(ChangeEvent::insert(Namespace::new("db", "t"), vec![])).await.unwrap();
/// drop(tx);
///
/// assert!(source.next_event().await.is_some());
/// assert!(source.next_event().await.is_none());
/// # }
/// ```
#[derive(Debug)]
pub struct ChannelEventSource {
    rx: mpsc::Receiver<SourceItem>,
    closed: bool,
    close_count: usize,
}

impl ChannelEventSource {
    /// Creates a source and its sender with room for `buffer` pending items.
    #[must_use]
    pub fn new(buffer: usize) -> (EventSender, Self) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        (
            EventSender { tx },
            Self {
                rx,
                closed: false,
                close_count: 0,
            },
        )
    }

    /// Returns true once [`EventSource::close`] has been called.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Number of times close was called.
    #[must_use]
    pub const fn close_count(&self) -> usize {
        self.close_count
    }
}

#[async_trait]
impl EventSource for ChannelEventSource {
    async fn next_event(&mut self) -> Option<SourceItem> {
        if self.closed {
            return None;
        }
        self.rx.recv().await
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        self.close_count += 1;
        if !self.closed {
            debug!("Closing channel event source");
            self.rx.close();
            self.closed = true;
        }
        Ok(())
    }
}
