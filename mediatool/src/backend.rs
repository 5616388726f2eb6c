// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Media backend seam.
//!
//! The backend stands in for the native codec library: it opens demux and mux
//! sessions for URLs and supplies decoders and encoders for streams. The pipeline
//! never parses container formats or runs codecs itself.
//!
//! Two backends ship with the crate:
//!
//! - [`memory::MemoryBackend`]: scripted in-memory sources and inspectable sinks
//! - [`file::FileBackend`]: raw files read and written as chunked byte streams

pub mod file;
pub mod memory;

use std::fmt;

use ferry::Arena;
use serde::{Deserialize, Serialize};

use crate::{MediaBuffer, MediaData, MediaKind, Result, TimeUnit};

/// Media type of a container stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Video,
    Audio,
    /// Opaque data, copied packet by packet and never decoded.
    Data,
}

impl MediaType {
    /// Returns `true` for stream types that have decoders and encoders.
    pub fn is_decodable(self) -> bool {
        matches!(self, MediaType::Video | MediaType::Audio)
    }

    /// Kind of the decoded data produced for this stream type.
    pub fn raw_kind(self) -> Option<MediaKind> {
        match self {
            MediaType::Video => Some(MediaKind::Picture),
            MediaType::Audio => Some(MediaKind::Samples),
            MediaType::Data => None,
        }
    }
}

/// Description of one stream in a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    /// Position of the stream in its container.
    pub index: usize,
    pub media_type: MediaType,
    /// Codec name as reported by the backend.
    pub codec: String,
    /// Unit of the timestamps carried by this stream's packets.
    pub time_unit: TimeUnit,
}

impl StreamInfo {
    pub fn new(index: usize, media_type: MediaType, codec: impl Into<String>) -> Self {
        Self {
            index,
            media_type,
            codec: codec.into(),
            time_unit: TimeUnit::Microseconds,
        }
    }

    pub fn video(index: usize, codec: impl Into<String>) -> Self {
        Self::new(index, MediaType::Video, codec)
    }

    pub fn audio(index: usize, codec: impl Into<String>) -> Self {
        Self::new(index, MediaType::Audio, codec)
    }

    pub fn data(index: usize, codec: impl Into<String>) -> Self {
        Self::new(index, MediaType::Data, codec)
    }
}

/// Open options passed through to the backend unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerOptions {
    /// New streams may appear after open.
    pub add_dynamic_streams: bool,
    /// Open blocks until metadata of all streams is known.
    pub query_metadata: bool,
}

impl Default for ContainerOptions {
    fn default() -> Self {
        Self {
            add_dynamic_streams: false,
            query_metadata: true,
        }
    }
}

/// Classification of a [`TerminalSignal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    /// End of file: the normal end of a stream.
    Eof,
    /// An input/output failure of the underlying resource.
    Io,
    /// The backend could not make sense of the data.
    InvalidData,
    /// Any other backend failure.
    Other,
}

/// Non-continuation result of a read.
///
/// This is a value, not an error: end of file and format failures end the read
/// loop, and the reader decides from the kind whether to close automatically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalSignal {
    kind: SignalKind,
    message: String,
}

impl TerminalSignal {
    pub fn new(kind: SignalKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// End-of-file signal.
    pub fn eof() -> Self {
        Self::new(SignalKind::Eof, "end of file")
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_eof(&self) -> bool {
        self.kind == SignalKind::Eof
    }
}

impl fmt::Display for TerminalSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Outcome of one read from a demuxer.
#[derive(Debug)]
pub enum ReadNext {
    /// A packet was read; more data may follow.
    Packet(MediaData),
    /// The read loop is over (end of file or a failure).
    Terminal(TerminalSignal),
}

/// An open demux session.
pub trait Demuxer {
    /// Streams whose metadata is currently known.
    fn streams(&self) -> Vec<StreamInfo>;

    /// Reads the next packet, allocating its buffer from `buffers`.
    fn read_packet(&mut self, buffers: &Arena<MediaBuffer>) -> ReadNext;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// An open mux session.
pub trait Muxer {
    /// Adds a stream and returns its index in the output.
    fn add_stream(&mut self, info: &StreamInfo) -> Result<usize>;
    fn write_header(&mut self) -> Result<()>;
    fn write_packet(&mut self, packet: &MediaData) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    fn write_trailer(&mut self) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Turns packets of one stream into decoded media.
pub trait Decoder {
    /// Decodes one packet. `None` means the decoder needs more input.
    fn decode(&mut self, packet: &MediaData) -> Result<Option<MediaData>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Turns decoded media of one stream into packets.
pub trait Encoder {
    /// Encodes one picture or sample block. `None` means the encoder buffered it.
    fn encode(&mut self, raw: &MediaData) -> Result<Option<MediaData>>;

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory for demux/mux sessions and codecs.
pub trait MediaBackend {
    /// Opens `url` for reading.
    fn open_input(&self, url: &str, options: &ContainerOptions) -> Result<Box<dyn Demuxer>>;

    /// Opens `url` for writing.
    fn open_output(&self, url: &str) -> Result<Box<dyn Muxer>>;

    /// Decoder for `stream`; `None` for streams that are not decoded.
    ///
    /// The default shares packet buffers as decoded data without copying.
    fn decoder(&self, stream: &StreamInfo) -> Result<Option<Box<dyn Decoder>>> {
        Ok(stream
            .media_type
            .raw_kind()
            .map(|kind| Box::new(PassThrough::new(kind)) as Box<dyn Decoder>))
    }

    /// Encoder for `stream`; `None` for streams that are copied as packets.
    fn encoder(&self, stream: &StreamInfo) -> Result<Option<Box<dyn Encoder>>> {
        Ok(stream
            .media_type
            .is_decodable()
            .then(|| Box::new(PassThrough::new(MediaKind::Packet)) as Box<dyn Encoder>))
    }
}

/// Codec that relabels buffers instead of transforming them.
///
/// The output shares the input's buffer through a new reference.
#[derive(Debug, Clone, Copy)]
pub struct PassThrough {
    output: MediaKind,
}

impl PassThrough {
    /// Creates a codec producing data of kind `output`.
    pub fn new(output: MediaKind) -> Self {
        Self { output }
    }
}

impl Decoder for PassThrough {
    fn decode(&mut self, packet: &MediaData) -> Result<Option<MediaData>> {
        Ok(Some(packet.copy_reference()?.with_kind(self.output)))
    }
}

impl Encoder for PassThrough {
    fn encode(&mut self, raw: &MediaData) -> Result<Option<MediaData>> {
        Ok(Some(raw.copy_reference()?.with_kind(self.output)))
    }
}
