// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! In-memory backend with scripted sources and inspectable sinks.
//!
//! Sources are registered under a URL as a list of streams and a script of
//! packets and terminal signals. Once the script is exhausted every read
//! returns end of file. Outputs opened under a URL record everything written
//! into a [`MemorySink`] that stays available after the writer is gone.

use std::{
    collections::{BTreeSet, HashMap},
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use ferry::Arena;

use super::{ContainerOptions, Demuxer, MediaBackend, Muxer, ReadNext, StreamInfo, TerminalSignal};
use crate::{Error, MediaBuffer, MediaData, MediaKind, OwnedMediaData, Result};

/// One step of a scripted source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceItem {
    /// A packet of the given stream.
    Packet {
        stream_index: usize,
        payload: Vec<u8>,
        time_stamp: Option<i64>,
        key_frame: bool,
    },
    /// A terminal signal returned by one read; later items stay readable.
    Signal(TerminalSignal),
}

/// Scripted content of an in-memory input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySource {
    streams: Vec<StreamInfo>,
    items: Vec<SourceItem>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a stream (builder style). Its index must be unique.
    pub fn with_stream(mut self, info: StreamInfo) -> Self {
        self.streams.push(info);
        self
    }

    /// Appends a packet to the script (builder style).
    pub fn packet(mut self, stream_index: usize, payload: &[u8], time_stamp: Option<i64>) -> Self {
        self.items.push(SourceItem::Packet {
            stream_index,
            payload: payload.to_vec(),
            time_stamp,
            key_frame: false,
        });
        self
    }

    /// Appends a terminal signal to the script (builder style).
    pub fn signal(mut self, signal: TerminalSignal) -> Self {
        self.items.push(SourceItem::Signal(signal));
        self
    }

    pub fn streams(&self) -> &[StreamInfo] {
        &self.streams
    }

    pub fn items(&self) -> &[SourceItem] {
        &self.items
    }
}

/// Everything written to an in-memory output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemorySink {
    pub streams: Vec<StreamInfo>,
    pub packets: Vec<OwnedMediaData>,
    pub header_written: bool,
    pub trailer_written: bool,
    pub flushes: usize,
    pub closed: bool,
}

#[derive(Default)]
struct Registry {
    sources: HashMap<String, MemorySource>,
    sinks: HashMap<String, MemorySink>,
    opened_inputs: HashMap<String, usize>,
}

/// Backend serving registered in-memory sources and recording outputs.
///
/// Cloning is cheap; clones share the same registry.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    registry: Arc<Mutex<Registry>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `source` under `url`, replacing any previous source.
    pub fn add_source(&self, url: impl Into<String>, source: MemorySource) {
        self.lock().sources.insert(url.into(), source);
    }

    /// Snapshot of what was written to `url`, if it was ever opened for writing.
    pub fn sink(&self, url: &str) -> Option<MemorySink> {
        self.lock().sinks.get(url).cloned()
    }

    /// How many times `url` was opened for reading.
    pub fn open_count(&self, url: &str) -> usize {
        self.lock().opened_inputs.get(url).copied().unwrap_or(0)
    }

    fn lock(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MediaBackend for MemoryBackend {
    fn open_input(&self, url: &str, options: &ContainerOptions) -> Result<Box<dyn Demuxer>> {
        let mut registry = self.lock();
        let source = registry
            .sources
            .get(url)
            .cloned()
            .ok_or_else(|| Error::Backend(format!("no in-memory source at \"{url}\"")))?;
        *registry.opened_inputs.entry(url.to_string()).or_default() += 1;
        tracing::debug!(url, ?options, "Opened in-memory source");
        Ok(Box::new(MemoryDemuxer {
            source,
            position: 0,
            seen: BTreeSet::new(),
            options: *options,
        }))
    }

    fn open_output(&self, url: &str) -> Result<Box<dyn Muxer>> {
        self.lock()
            .sinks
            .insert(url.to_string(), MemorySink::default());
        tracing::debug!(url, "Opened in-memory sink");
        Ok(Box::new(MemoryMuxer {
            backend: self.clone(),
            url: url.to_string(),
        }))
    }
}

struct MemoryDemuxer {
    source: MemorySource,
    position: usize,
    seen: BTreeSet<usize>,
    options: ContainerOptions,
}

impl MemoryDemuxer {
    fn is_announced(&self, info: &StreamInfo) -> bool {
        self.seen.contains(&info.index) || (self.options.query_metadata && !self.is_late(info))
    }

    /// Streams whose first packet comes after a packet of another stream only
    /// show up at open time when dynamic streams are disabled.
    fn is_late(&self, info: &StreamInfo) -> bool {
        self.options.add_dynamic_streams
            && self
                .source
                .items
                .iter()
                .find_map(|item| match item {
                    SourceItem::Packet { stream_index, .. } => Some(*stream_index),
                    SourceItem::Signal(_) => None,
                })
                .is_some_and(|first| first != info.index)
    }
}

impl Demuxer for MemoryDemuxer {
    fn streams(&self) -> Vec<StreamInfo> {
        self.source
            .streams
            .iter()
            .filter(|info| self.is_announced(info))
            .cloned()
            .collect()
    }

    fn read_packet(&mut self, buffers: &Arena<MediaBuffer>) -> ReadNext {
        let Some(item) = self.source.items.get(self.position).cloned() else {
            return ReadNext::Terminal(TerminalSignal::eof());
        };
        self.position += 1;
        match item {
            SourceItem::Signal(signal) => ReadNext::Terminal(signal),
            SourceItem::Packet {
                stream_index,
                payload,
                time_stamp,
                key_frame,
            } => {
                let Some(info) = self
                    .source
                    .streams
                    .iter()
                    .find(|info| info.index == stream_index)
                else {
                    return ReadNext::Terminal(TerminalSignal::new(
                        super::SignalKind::InvalidData,
                        format!("packet for undeclared stream {stream_index}"),
                    ));
                };
                let time_unit = info.time_unit;
                self.seen.insert(stream_index);
                ReadNext::Packet(
                    MediaData::new(
                        buffers,
                        MediaKind::Packet,
                        stream_index,
                        payload,
                        time_stamp,
                        time_unit,
                    )
                    .with_key_frame(key_frame),
                )
            }
        }
    }
}

struct MemoryMuxer {
    backend: MemoryBackend,
    url: String,
}

impl MemoryMuxer {
    fn update<R>(&self, f: impl FnOnce(&mut MemorySink) -> Result<R>) -> Result<R> {
        let mut registry = self.backend.lock();
        let sink = registry
            .sinks
            .get_mut(&self.url)
            .ok_or_else(|| Error::Backend(format!("in-memory sink \"{}\" vanished", self.url)))?;
        f(sink)
    }
}

impl Muxer for MemoryMuxer {
    fn add_stream(&mut self, info: &StreamInfo) -> Result<usize> {
        self.update(|sink| {
            let index = sink.streams.len();
            sink.streams.push(StreamInfo {
                index,
                ..info.clone()
            });
            Ok(index)
        })
    }

    fn write_header(&mut self) -> Result<()> {
        self.update(|sink| {
            sink.header_written = true;
            Ok(())
        })
    }

    fn write_packet(&mut self, packet: &MediaData) -> Result<()> {
        let owned = packet.to_owned()?;
        self.update(|sink| {
            if owned.stream_index >= sink.streams.len() {
                return Err(Error::InvalidArgument(format!(
                    "packet for unknown output stream {}",
                    owned.stream_index
                )));
            }
            sink.packets.push(owned);
            Ok(())
        })
    }

    fn flush(&mut self) -> Result<()> {
        self.update(|sink| {
            sink.flushes += 1;
            Ok(())
        })
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.update(|sink| {
            sink.trailer_written = true;
            Ok(())
        })
    }

    fn close(&mut self) -> Result<()> {
        self.update(|sink| {
            sink.closed = true;
            Ok(())
        })
    }
}
