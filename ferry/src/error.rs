// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for handle and memory-model operations.

use crate::HandleId;

/// Convenience result type using [`Error`] as the error variant.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors that can occur when operating on ferry handles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The handle was released, or the slot it pointed to has been freed.
    #[error("Use after free: handle {0}")]
    UseAfterFree(HandleId),

    /// An argument was outside the accepted set (e.g. an unknown memory model name).
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
