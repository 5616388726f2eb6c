// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for media pipeline operations.
//!
//! Configuration and handle errors are returned immediately to the caller that
//! attempted the operation. End of stream and format errors met while reading
//! are *not* errors: they are returned as [`crate::TerminalSignal`] values so
//! the reader can apply its auto-close policy.

use crate::EventKind;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur while building or running a media pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Attempted to change configuration that is frozen once the container is open.
    #[error("Container is already open")]
    AlreadyOpen,

    /// The container has not been opened, or was closed.
    #[error("Container is not open")]
    NotOpen,

    /// The coder was closed and cannot be used again.
    #[error("Coder is closed")]
    Closed,

    /// A native handle was used after it was released.
    #[error(transparent)]
    Handle(#[from] ferry::Error),

    /// An argument was invalid (unknown unit, wrong container kind, ...).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// A listener failed while handling an event.
    ///
    /// The listeners registered after the failing one did not see the event.
    #[error("Listener failed on {kind} event: {source}")]
    Listener {
        /// Kind of the event being dispatched.
        kind: EventKind,
        /// The error returned by the listener.
        #[source]
        source: Box<Error>,
    },

    /// An event was dispatched to a listener that is still handling another one.
    #[error("Listener is already handling an event")]
    ListenerBusy,

    /// The media backend reported a failure.
    #[error("Backend error: {0}")]
    Backend(String),

    /// An I/O failure outside the read loop (configuration files, output files).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be parsed.
    #[error("Invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A generic error for failures not covered by other variants.
    #[error("Other error: {0}")]
    Other(String),
}

impl Error {
    /// Returns `true` if this error, or the listener error it wraps, is a
    /// use-after-free of a native handle.
    pub fn is_use_after_free(&self) -> bool {
        match self {
            Error::Handle(ferry::Error::UseAfterFree(_)) => true,
            Error::Listener { source, .. } => source.is_use_after_free(),
            _ => false,
        }
    }

    /// Returns the innermost error, unwrapping listener failures.
    pub fn root(&self) -> &Error {
        match self {
            Error::Listener { source, .. } => source.root(),
            other => other,
        }
    }
}
