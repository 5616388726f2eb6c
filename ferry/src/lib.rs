// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # ferry - native resource lifetime for media pipelines
//!
//! Reference-counted handles over arena-stored resources, plus the memory-model
//! policy that decides how native buffer bytes are handed out.
//!
//! ## Overview
//!
//! A native resource (a container session, a decoded picture buffer, ...) is
//! moved into an [`Arena`] slot and owned through one or more [`Handle`]s.
//! Every handle is a logical owner:
//!
//! - [`Arena::acquire`] stores the resource and returns the first handle
//! - [`Handle::copy_reference`] creates another owner of the same resource
//! - [`Handle::release`] (or [`Handle::close`]) gives up one ownership
//!
//! The resource is dropped exactly once, when the last owner releases it.
//! Using a handle after it was released fails with [`Error::UseAfterFree`].
//!
//! ```text
//! ┌──────────────┐  acquire   ┌──────────────────────────────┐
//! │   Arena<T>   │──────────► │ slot #3 (gen 0, refs 1, T)   │
//! └──────────────┘            └──────────────────────────────┘
//!                                  ▲            ▲
//!                             Handle<T>    copy_reference()
//! ```
//!
//! ## Memory models
//!
//! [`MemoryModel::MirroredHeap`] copies native bytes into owned heap memory on
//! every access; [`MemoryModel::NativeOnly`] hands out shared views of the
//! native storage. Each arena snapshots a model when it is created, either
//! explicitly ([`Arena::new`]) or from the process-wide switch
//! ([`set_memory_model`]).
//!
//! ```
//! use ferry::{Arena, MemoryModel};
//!
//! # fn main() -> Result<(), ferry::Error> {
//! let arena = Arena::new(MemoryModel::NativeOnly);
//! let mut first = arena.acquire(String::from("native resource"));
//! let mut second = first.copy_reference()?;
//! assert_eq!(first.ref_count()?, 2);
//!
//! second.release()?;
//! assert!(first.is_open());
//! first.release()?;
//! assert_eq!(arena.live_count(), 0);
//! # Ok(())
//! # }
//! ```
//!
//! ## Thread Safety
//!
//! Arena storage sits behind a mutex, so handles are `Send` when the resource
//! is. The media pipeline built on top of this crate is single-threaded; the
//! lock only keeps handle bookkeeping sound.

mod arena;
mod error;
mod memory;

pub use arena::{Arena, Handle, HandleId};
pub use error::{Error, Result};
pub use memory::{BufferData, MemoryModel, memory_model, set_memory_model};
