// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! # mediatool - event-driven media pipelines
//!
//! Readers demux and decode containers, writers encode and mux them, and both
//! report what they do to chains of listeners. The actual demuxing and
//! codec work is delegated to a [`backend::MediaBackend`].
//!
//! ## Overview
//!
//! - **Container**: a reference-counted handle to a demux or mux session ([`Container`])
//! - **Coder**: a reader or writer bound to one container ([`MediaCoder`])
//! - **Generator**: anything that emits events to listeners ([`MediaGenerator`])
//! - **Listener**: receives events synchronously, in registration order ([`MediaListener`])
//! - **Context**: the arenas and memory model shared by one pipeline ([`MediaContext`])
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   events   ┌──────────────────┐
//! │ MediaReader  │──────────► │ MediaDebugListener│
//! │ (generator)  │──────┐     └──────────────────┘
//! └──────┬───────┘      │     ┌──────────────────┐   events   ┌──────────┐
//!        │              └───► │   MediaWriter    │──────────► │ listeners│
//!   Container (Read)          │ (listener + gen) │            └──────────┘
//!        │                    └────────┬─────────┘
//!   MediaBackend                  Container (Write)
//! ```
//!
//! ## Example
//!
//! Copying an in-memory source into an in-memory sink:
//!
//! ```
//! use std::sync::Arc;
//!
//! use mediatool::{
//!     MediaContext, MediaGenerator, ToolFactory,
//!     backend::{StreamInfo, memory::{MemoryBackend, MemorySource}},
//!     listener::shared,
//! };
//!
//! # fn main() -> Result<(), mediatool::Error> {
//! let backend = MemoryBackend::new();
//! backend.add_source(
//!     "mem://in",
//!     MemorySource::new()
//!         .with_stream(StreamInfo::data(0, "bin"))
//!         .packet(0, b"hello", None),
//! );
//! let factory = ToolFactory::new(MediaContext::default(), Arc::new(backend.clone()));
//!
//! let mut reader = factory.make_reader("mem://in")?;
//! let writer = shared(factory.make_writer("mem://out", &reader)?);
//! reader.add_listener(writer);
//! while reader.read_packet()?.is_none() {}
//!
//! let sink = backend.sink("mem://out").expect("sink was opened");
//! assert_eq!(sink.packets[0].payload, b"hello");
//! assert!(sink.trailer_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Event payload lifetime
//!
//! Media data handed to a listener is borrowed for the duration of the
//! callback. Keep it with [`MediaData::copy_reference`] or [`MediaData::to_owned`].
//!
//! ## Thread Safety
//!
//! Pipelines are single-threaded: generators and listeners are shared through
//! `Rc<RefCell<_>>` and are not `Send`.

mod adapter;
mod coder;
mod container;
mod context;
mod data;
mod debug;
mod error;
mod factory;
mod reader;
mod time;
mod writer;

pub mod backend;
pub mod config;
pub mod event;
pub mod listener;

pub use adapter::MediaToolAdapter;
pub use backend::{SignalKind, TerminalSignal};
pub use coder::{CoderState, MediaCoder};
pub use container::{Container, ContainerKind};
pub use context::MediaContext;
pub use data::{MediaBuffer, MediaData, MediaKind, OwnedMediaData};
pub use debug::{DebugMode, MediaDebugListener};
pub use error::{Error, Result};
pub use event::{EventKind, GeneratorId, MediaEvent, RawMediaEvent, RawPayload};
pub use factory::ToolFactory;
pub use ferry::{BufferData, MemoryModel};
pub use listener::{ListenerRef, MediaGenerator, MediaListener};
pub use reader::{MediaReader, ReaderState};
pub use time::TimeUnit;
pub use writer::MediaWriter;
