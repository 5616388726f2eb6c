// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Media writer: encodes and muxes media into an output container.
//!
//! A writer is both a listener and a generator. Registered with a reader it
//! mirrors the reader's streams, encodes the decoded pictures and samples it
//! receives, copies packets of streams that are not decoded, and closes when
//! the reader closes. It reports its own progress to its listeners.

use std::{collections::BTreeMap, sync::Arc};

use crate::{
    Container, Error, MediaContext, MediaData, MediaKind, MediaListener, OwnedMediaData, Result,
    backend::{Encoder, MediaBackend, StreamInfo},
    coder::{CoderState, MediaCoder},
    container::ContainerKind,
    event::{
        AddStreamEvent, AudioSamplesEvent, CloseCoderEvent, CloseEvent, FlushEvent, GeneratorId,
        MediaEvent, OpenCoderEvent, OpenEvent, RawMediaEvent, RawPayload, ReadPacketEvent,
        VideoPictureEvent, WriteHeaderEvent, WritePacketEvent, WriteTrailerEvent,
    },
    listener::{ListenerChain, MediaGenerator},
    reader::MediaReader,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Unopened,
    Open,
    Closed,
}

/// Writes media to an output container.
pub struct MediaWriter {
    id: GeneratorId,
    coder: CoderState,
    backend: Arc<dyn MediaBackend>,
    listeners: ListenerChain,
    state: WriterState,
    /// Input container whose streams are mirrored on demand.
    source: Option<Container>,
    /// Input stream index to output stream index.
    stream_map: BTreeMap<usize, usize>,
    encoders: BTreeMap<usize, Box<dyn Encoder>>,
    header_written: bool,
}

impl MediaWriter {
    /// Creates a writer for `url` without a source; streams are added with
    /// [`Self::add_stream`].
    pub fn new(context: &MediaContext, backend: Arc<dyn MediaBackend>, url: impl Into<String>) -> Self {
        let url = url.into();
        let container = Container::output(context, backend.clone(), url.clone());
        Self {
            id: GeneratorId::new(),
            coder: CoderState::new(url, container),
            backend,
            listeners: ListenerChain::new(),
            state: WriterState::Unopened,
            source: None,
            stream_map: BTreeMap::new(),
            encoders: BTreeMap::new(),
            header_written: false,
        }
    }

    /// Creates a writer for `url` copying the streams of `reader`.
    ///
    /// Register the writer as a listener of `reader` to feed it.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] if the reader allows dynamic streams or does
    /// not query stream metadata on open, since every output stream must be
    /// known before the header is written.
    pub fn from_reader(url: impl Into<String>, reader: &MediaReader) -> Result<Self> {
        let container = reader.container()?;
        Self::from_container(url, &container)
    }

    /// Creates a writer for `url` copying the streams of the input `container`.
    pub fn from_container(url: impl Into<String>, input: &Container) -> Result<Self> {
        if input.kind()? != ContainerKind::Read {
            return Err(Error::InvalidArgument(
                "writers copy from input containers only".to_string(),
            ));
        }
        if input.can_add_dynamic_streams()? {
            return Err(Error::InvalidArgument(
                "cannot copy from a container that allows dynamic streams".to_string(),
            ));
        }
        if !input.will_query_metadata()? {
            return Err(Error::InvalidArgument(
                "cannot copy from a container that does not query stream metadata".to_string(),
            ));
        }
        let mut writer = Self::new(input.context(), input.backend()?, url);
        writer.source = Some(input.copy_reference()?);
        Ok(writer)
    }

    /// Opens the output container and dispatches [`crate::EventKind::Open`].
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            WriterState::Unopened => {}
            WriterState::Open => return Err(Error::AlreadyOpen),
            WriterState::Closed => return Err(Error::Closed),
        }
        self.coder.container_ref().open()?;
        self.coder.set_should_close_container(true);
        self.state = WriterState::Open;
        tracing::debug!(url = %self.coder.url(), "Opened media writer");
        self.dispatch(MediaEvent::Open(OpenEvent {
            source: self.id,
            url: self.coder.url(),
        }))
    }

    fn ensure_open(&mut self) -> Result<()> {
        match self.state {
            WriterState::Unopened => self.open(),
            WriterState::Open => Ok(()),
            WriterState::Closed => Err(Error::Closed),
        }
    }

    /// Adds an output stream and returns its index.
    ///
    /// Decodable streams get an encoder; others take packets as they are.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidArgument`] once the header was written.
    pub fn add_stream(&mut self, info: StreamInfo) -> Result<usize> {
        self.ensure_open()?;
        if self.header_written {
            return Err(Error::InvalidArgument(
                "streams must be added before the first write".to_string(),
            ));
        }
        let index = self.coder.container_ref().add_stream(&info)?;
        let stream = StreamInfo { index, ..info };
        self.dispatch(MediaEvent::AddStream(AddStreamEvent {
            source: self.id,
            stream_index: index,
            stream: &stream,
        }))?;

        if let Some(encoder) = self.backend.encoder(&stream)? {
            self.encoders.insert(index, encoder);
            self.dispatch(MediaEvent::OpenCoder(OpenCoderEvent {
                source: self.id,
                stream_index: index,
                stream: &stream,
            }))?;
        }
        Ok(index)
    }

    /// Output stream for input stream `input_index`, mirroring it on first use.
    fn output_stream(&mut self, input_index: usize) -> Result<usize> {
        if let Some(&index) = self.stream_map.get(&input_index) {
            return Ok(index);
        }
        let info = self
            .source
            .as_ref()
            .ok_or_else(|| {
                Error::InvalidArgument(format!("writer has no source for stream {input_index}"))
            })?
            .stream(input_index)?;
        let index = self.add_stream(info)?;
        self.stream_map.insert(input_index, index);
        Ok(index)
    }

    /// Mirrors every stream of the source that is not mapped yet.
    fn mirror_source_streams(&mut self) -> Result<()> {
        let Some(source) = self.source.as_ref() else {
            return Ok(());
        };
        if !source.is_open() {
            return Ok(());
        }
        for stream in source.streams()? {
            self.output_stream(stream.index)?;
        }
        Ok(())
    }

    fn write_header_if_needed(&mut self) -> Result<()> {
        if self.header_written {
            return Ok(());
        }
        self.mirror_source_streams()?;
        self.coder.container_ref().write_header()?;
        self.header_written = true;
        self.dispatch(MediaEvent::WriteHeader(WriteHeaderEvent { source: self.id }))
    }

    /// Encodes decoded media for output stream `stream_index`.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] after close, [`Error::InvalidArgument`] if the stream
    /// has no encoder.
    pub fn encode(&mut self, stream_index: usize, raw: &MediaData) -> Result<()> {
        self.ensure_open()?;
        if raw.kind() == MediaKind::Packet {
            return Err(Error::InvalidArgument(
                "encode takes pictures or samples; use write_packet for packets".to_string(),
            ));
        }
        let encoder = self.encoders.get_mut(&stream_index).ok_or_else(|| {
            Error::InvalidArgument(format!("output stream {stream_index} has no encoder"))
        })?;
        let Some(packet) = encoder.encode(raw)? else {
            return Ok(());
        };
        let packet = packet.with_stream_index(stream_index);
        self.write_packet(&packet)
    }

    /// Writes an encoded packet; its stream index is an output stream index.
    ///
    /// The header is written before the first packet.
    pub fn write_packet(&mut self, packet: &MediaData) -> Result<()> {
        self.ensure_open()?;
        self.write_header_if_needed()?;
        self.coder.container_ref().write_packet(packet)?;
        tracing::trace!(
            url = %self.coder.url(),
            stream = packet.stream_index(),
            time_stamp = ?packet.time_stamp(),
            "Wrote packet"
        );
        self.dispatch(MediaEvent::WritePacket(WritePacketEvent {
            source: self.id,
            packet,
        }))
    }

    /// Flushes buffered output.
    pub fn flush(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.coder.container_ref().flush()?;
        self.dispatch(MediaEvent::Flush(FlushEvent { source: self.id }))
    }

    /// Finishes the output and closes the writer.
    ///
    /// If anything was written, flushes and writes the trailer. Then closes
    /// every encoder and the container if the writer opened it. Closing twice
    /// is a no-op.
    pub fn close(&mut self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Ok(());
        }
        let was_open = self.state == WriterState::Open;
        let mut outcome = Ok(());
        if self.header_written {
            outcome = outcome.and(self.flush());
            outcome = outcome.and(
                self.coder
                    .container_ref()
                    .write_trailer()
                    .and_then(|()| {
                        self.dispatch(MediaEvent::WriteTrailer(WriteTrailerEvent {
                            source: self.id,
                        }))
                    }),
            );
        }
        self.state = WriterState::Closed;

        for (stream_index, mut encoder) in std::mem::take(&mut self.encoders) {
            outcome = outcome.and(encoder.close());
            outcome = outcome.and(self.dispatch(MediaEvent::CloseCoder(CloseCoderEvent {
                source: self.id,
                stream_index,
            })));
        }
        outcome = outcome.and(self.coder.close_container_if_owned());
        if let Some(mut source) = self.source.take() {
            outcome = outcome.and(source.release());
        }
        tracing::debug!(url = %self.coder.url(), "Closed media writer");
        if was_open {
            outcome = outcome.and(self.dispatch(MediaEvent::Close(CloseEvent {
                source: self.id,
                url: self.coder.url(),
            })));
        }
        outcome
    }

    /// Encodes a raw media event received from another generator.
    fn encode_event(&mut self, event: &dyn RawMediaEvent) -> Result<()> {
        let Some(input_index) = event.stream_index() else {
            return Ok(());
        };
        let index = self.output_stream(input_index)?;
        match *event.payload() {
            RawPayload::Media(raw) => self.encode(index, raw),
            RawPayload::External(value) => {
                let owned = value.downcast_ref::<OwnedMediaData>().ok_or_else(|| {
                    Error::InvalidArgument("unsupported external payload".to_string())
                })?;
                let raw = self.coder.container_ref().context().media_data(
                    owned.kind,
                    index,
                    owned.payload.as_slice(),
                    owned.time_stamp,
                    owned.time_unit,
                );
                self.encode(index, &raw.with_key_frame(owned.key_frame))
            }
        }
    }

    fn dispatch(&self, event: MediaEvent<'_>) -> Result<()> {
        self.listeners.dispatch(&event)
    }
}

impl MediaListener for MediaWriter {
    fn on_video_picture(&mut self, event: &VideoPictureEvent<'_>) -> Result<()> {
        self.encode_event(event)
    }

    fn on_audio_samples(&mut self, event: &AudioSamplesEvent<'_>) -> Result<()> {
        self.encode_event(event)
    }

    /// Copies packets of streams that have no encoder.
    fn on_read_packet(&mut self, event: &ReadPacketEvent<'_>) -> Result<()> {
        let index = self.output_stream(event.packet.stream_index())?;
        if self.encoders.contains_key(&index) {
            return Ok(());
        }
        let packet = event.packet.copy_reference()?.with_stream_index(index);
        self.write_packet(&packet)
    }

    fn on_close(&mut self, event: &CloseEvent<'_>) -> Result<()> {
        if event.source != self.id {
            self.close()?;
        }
        Ok(())
    }
}

impl MediaCoder for MediaWriter {
    fn coder_state(&self) -> &CoderState {
        &self.coder
    }

    fn coder_state_mut(&mut self) -> &mut CoderState {
        &mut self.coder
    }

    fn open(&mut self) -> Result<()> {
        MediaWriter::open(self)
    }

    fn close(&mut self) -> Result<()> {
        MediaWriter::close(self)
    }
}

impl MediaGenerator for MediaWriter {
    fn id(&self) -> GeneratorId {
        self.id
    }

    fn listener_chain(&self) -> &ListenerChain {
        &self.listeners
    }

    fn listener_chain_mut(&mut self) -> &mut ListenerChain {
        &mut self.listeners
    }
}

impl std::fmt::Debug for MediaWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaWriter")
            .field("id", &self.id)
            .field("url", &self.coder.url())
            .field("state", &self.state)
            .field("header_written", &self.header_written)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ferry::MemoryModel;

    use super::*;
    use crate::{TimeUnit, backend::memory::MemoryBackend};

    fn blank() -> (MediaWriter, MemoryBackend, MediaContext) {
        let backend = MemoryBackend::new();
        let context = MediaContext::new(MemoryModel::MirroredHeap);
        let writer = MediaWriter::new(&context, Arc::new(backend.clone()), "mem://out");
        (writer, backend, context)
    }

    #[test]
    fn blank_writer_encodes_added_streams() {
        let (mut writer, backend, context) = blank();
        let video = writer.add_stream(StreamInfo::video(9, "raw")).unwrap();
        let data = writer.add_stream(StreamInfo::data(3, "bin")).unwrap();
        assert_eq!((video, data), (0, 1));

        let picture = context.media_data(MediaKind::Picture, 0, &b"pic"[..], Some(0), TimeUnit::Microseconds);
        writer.encode(video, &picture).unwrap();
        let packet = context.media_data(MediaKind::Packet, data, &b"dat"[..], None, TimeUnit::Microseconds);
        writer.write_packet(&packet).unwrap();
        assert!(matches!(writer.encode(data, &picture), Err(Error::InvalidArgument(_))));
        assert!(matches!(
            writer.add_stream(StreamInfo::audio(0, "pcm")),
            Err(Error::InvalidArgument(_))
        ));
        writer.close().unwrap();

        let sink = backend.sink("mem://out").unwrap();
        assert!(sink.header_written && sink.trailer_written && sink.closed);
        assert_eq!(sink.flushes, 1);
        let payloads: Vec<_> = sink.packets.iter().map(|p| p.payload.clone()).collect();
        assert_eq!(payloads, vec![b"pic".to_vec(), b"dat".to_vec()]);
        assert_eq!(sink.packets[0].kind, MediaKind::Packet);
        assert_eq!(sink.streams[1].index, 1);
    }

    #[test]
    fn writing_after_close_fails() {
        let (mut writer, _, context) = blank();
        writer.close().unwrap();
        writer.close().unwrap();
        let packet = context.media_data(MediaKind::Packet, 0, &b"x"[..], None, TimeUnit::Microseconds);
        assert!(matches!(writer.write_packet(&packet), Err(Error::Closed)));
        assert!(matches!(writer.add_stream(StreamInfo::data(0, "bin")), Err(Error::Closed)));
    }

    #[test]
    fn dynamic_sources_are_rejected() {
        let backend = MemoryBackend::new();
        let context = MediaContext::new(MemoryModel::MirroredHeap);
        let shared: Arc<dyn MediaBackend> = Arc::new(backend);
        let input = Container::input(&context, shared.clone(), "mem://in");
        input.set_add_dynamic_streams(true).unwrap();
        assert!(matches!(
            MediaWriter::from_container("mem://out", &input),
            Err(Error::InvalidArgument(_))
        ));

        let lazy = Container::input(&context, shared.clone(), "mem://lazy");
        lazy.set_query_metadata(false).unwrap();
        assert!(matches!(
            MediaWriter::from_container("mem://out", &lazy),
            Err(Error::InvalidArgument(_))
        ));

        let output = Container::output(&context, shared, "mem://other");
        assert!(matches!(
            MediaWriter::from_container("mem://out", &output),
            Err(Error::InvalidArgument(_))
        ));
    }
}
