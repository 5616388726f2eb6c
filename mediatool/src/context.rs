// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Per-pipeline native context.
//!
//! A [`MediaContext`] owns the arenas that containers and media buffers are
//! allocated from, and fixes the memory model those buffers obey. Every
//! container, reader and writer of one pipeline shares the same context.

use ferry::{Arena, MemoryModel};

use crate::{MediaBuffer, MediaData, MediaKind, TimeUnit, config::ToolConfig, container::ContainerSession};

/// Shared native context of a media pipeline.
///
/// Cloning is cheap: clones refer to the same arenas.
#[derive(Clone, Debug)]
pub struct MediaContext {
    pub(crate) containers: Arena<ContainerSession>,
    buffers: Arena<MediaBuffer>,
    model: MemoryModel,
}

impl Default for MediaContext {
    /// Creates a context using the current process-wide memory model.
    fn default() -> Self {
        Self::new(ferry::memory_model())
    }
}

impl MediaContext {
    /// Creates a context whose media buffers follow `model`.
    pub fn new(model: MemoryModel) -> Self {
        Self {
            containers: Arena::new(model),
            buffers: Arena::new(model),
            model,
        }
    }

    /// Creates a context from tool configuration.
    ///
    /// Falls back to the process-wide memory model when the configuration
    /// does not name one.
    pub fn from_config(config: &ToolConfig) -> Self {
        Self::new(config.memory_model())
    }

    pub fn memory_model(&self) -> MemoryModel {
        self.model
    }

    /// Arena media buffers are allocated from.
    pub fn buffers(&self) -> &Arena<MediaBuffer> {
        &self.buffers
    }

    /// Allocates a new media buffer in this context.
    pub fn media_data(
        &self,
        kind: MediaKind,
        stream_index: usize,
        bytes: impl Into<std::sync::Arc<[u8]>>,
        time_stamp: Option<i64>,
        time_unit: TimeUnit,
    ) -> MediaData {
        MediaData::new(
            &self.buffers,
            kind,
            stream_index,
            bytes,
            time_stamp,
            time_unit,
        )
    }

    /// Number of container sessions still referenced.
    pub fn live_containers(&self) -> usize {
        self.containers.live_count()
    }

    /// Number of media buffers still referenced.
    pub fn live_buffers(&self) -> usize {
        self.buffers.live_count()
    }
}
