// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Media data handles: packets, decoded pictures and decoded audio samples.

use std::sync::Arc;

use ferry::{Arena, BufferData, Handle};

use crate::{Result, TimeUnit};

/// What a [`MediaData`] buffer holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    /// Compressed data as read from or written to a container.
    Packet,
    /// A decoded video picture.
    Picture,
    /// A block of decoded audio samples.
    Samples,
}

/// Native storage behind a [`MediaData`] handle.
pub struct MediaBuffer {
    bytes: Arc<[u8]>,
}

impl MediaBuffer {
    fn new(bytes: Arc<[u8]>) -> Self {
        Self { bytes }
    }
}

/// A reference-counted handle to media bytes plus their stream and timing metadata.
///
/// Media data delivered in an event is only valid while the listener callback
/// runs. To keep it, either call [`Self::copy_reference`] (shares the buffer)
/// or [`Self::to_owned`] (deep copy).
///
/// Byte access follows the memory model of the arena the buffer lives in:
/// mirrored-heap arenas return copies, native-only arenas return shared views.
#[derive(Debug)]
pub struct MediaData {
    buffer: Handle<MediaBuffer>,
    kind: MediaKind,
    stream_index: usize,
    time_stamp: Option<i64>,
    time_unit: TimeUnit,
    key_frame: bool,
}

impl MediaData {
    /// Stores `bytes` in `buffers` and returns the first handle to them.
    pub fn new(
        buffers: &Arena<MediaBuffer>,
        kind: MediaKind,
        stream_index: usize,
        bytes: impl Into<Arc<[u8]>>,
        time_stamp: Option<i64>,
        time_unit: TimeUnit,
    ) -> Self {
        Self {
            buffer: buffers.acquire(MediaBuffer::new(bytes.into())),
            kind,
            stream_index,
            time_stamp,
            time_unit,
            key_frame: false,
        }
    }

    /// Marks this data as a key frame (builder style).
    pub fn with_key_frame(mut self, key_frame: bool) -> Self {
        self.key_frame = key_frame;
        self
    }

    /// Re-labels the stream this data belongs to (builder style).
    pub fn with_stream_index(mut self, stream_index: usize) -> Self {
        self.stream_index = stream_index;
        self
    }

    /// Re-labels what the buffer holds (builder style).
    ///
    /// Pass-through codecs use this to turn a packet into a picture or back
    /// without copying bytes.
    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> MediaKind {
        self.kind
    }

    pub fn stream_index(&self) -> usize {
        self.stream_index
    }

    /// Timestamp in [`Self::time_unit`], if known.
    pub fn time_stamp(&self) -> Option<i64> {
        self.time_stamp
    }

    pub fn time_unit(&self) -> TimeUnit {
        self.time_unit
    }

    pub fn is_key_frame(&self) -> bool {
        self.key_frame
    }

    /// Returns `true` while this handle is valid.
    pub fn is_open(&self) -> bool {
        self.buffer.is_open()
    }

    /// Number of handles sharing the underlying buffer.
    pub fn ref_count(&self) -> Result<usize> {
        Ok(self.buffer.ref_count()?)
    }

    /// Size of the payload in bytes.
    pub fn len(&self) -> Result<usize> {
        Ok(self.buffer.with(|buffer| buffer.bytes.len())?)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// The payload bytes, copied or shared according to the memory model.
    pub fn data(&self) -> Result<BufferData> {
        let model = self.buffer.memory_model();
        Ok(self.buffer.with(|buffer| model.access(&buffer.bytes))?)
    }

    /// Creates another handle to the same buffer and metadata.
    pub fn copy_reference(&self) -> Result<MediaData> {
        Ok(Self {
            buffer: self.buffer.copy_reference()?,
            kind: self.kind,
            stream_index: self.stream_index,
            time_stamp: self.time_stamp,
            time_unit: self.time_unit,
            key_frame: self.key_frame,
        })
    }

    /// Releases this handle; the buffer is freed with its last handle.
    pub fn release(&mut self) -> Result<()> {
        Ok(self.buffer.release()?)
    }

    /// Deep-copies payload and metadata into memory owned by the caller.
    pub fn to_owned(&self) -> Result<OwnedMediaData> {
        let payload = self.buffer.with(|buffer| buffer.bytes.to_vec())?;
        Ok(OwnedMediaData {
            kind: self.kind,
            stream_index: self.stream_index,
            time_stamp: self.time_stamp,
            time_unit: self.time_unit,
            key_frame: self.key_frame,
            payload,
        })
    }
}

/// Owned copy of media data.
///
/// Unlike [`MediaData`], this owns its bytes and can outlive any dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedMediaData {
    pub kind: MediaKind,
    pub stream_index: usize,
    pub time_stamp: Option<i64>,
    pub time_unit: TimeUnit,
    pub key_frame: bool,
    /// Owned copy of the payload bytes.
    pub payload: Vec<u8>,
}

impl TryFrom<&MediaData> for OwnedMediaData {
    type Error = crate::Error;

    fn try_from(value: &MediaData) -> Result<Self> {
        value.to_owned()
    }
}
