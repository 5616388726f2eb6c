// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Media reader: demuxes and decodes a container, emitting events.

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};

use crate::{
    Container, Error, MediaContext, MediaData, MediaKind, OwnedMediaData, Result,
    backend::{Decoder, MediaBackend, ReadNext, StreamInfo, TerminalSignal},
    coder::{CoderState, MediaCoder},
    container::ContainerKind,
    event::{
        AddStreamEvent, AudioSamplesEvent, CloseCoderEvent, CloseEvent, GeneratorId, MediaEvent,
        OpenCoderEvent, OpenEvent, RawMedia, RawPayload, ReadPacketEvent, VideoPictureEvent,
    },
    listener::{ListenerChain, MediaGenerator},
};

/// Lifecycle of a [`MediaReader`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReaderState {
    /// The container has not been opened yet.
    Unopened,
    /// Packets are being read.
    Open,
    /// The last read returned a non-EOF terminal signal and the reader stayed
    /// open. Reading again retries.
    Errored,
    /// The reader was closed; it cannot be reopened.
    Closed,
}

/// Reads packets from a container and dispatches them, and their decoded
/// pictures and samples, to the registered listeners.
///
/// Each call to [`Self::read_packet`] reads one packet. For the first packet
/// of a stream, listeners receive [`crate::EventKind::AddStream`] and, for
/// decodable streams, [`crate::EventKind::OpenCoder`]. Every packet produces
/// [`crate::EventKind::ReadPacket`], followed by
/// [`crate::EventKind::VideoPicture`] or [`crate::EventKind::AudioSamples`]
/// when the decoder produced output.
pub struct MediaReader {
    id: GeneratorId,
    coder: CoderState,
    backend: Arc<dyn MediaBackend>,
    listeners: ListenerChain,
    state: ReaderState,
    close_on_eof_only: bool,
    external_payloads: bool,
    announced: BTreeSet<usize>,
    decoders: BTreeMap<usize, Box<dyn Decoder>>,
}

impl MediaReader {
    /// Creates a reader for `url`. The reader opens and closes its container.
    pub fn new(
        context: &MediaContext,
        backend: Arc<dyn MediaBackend>,
        url: impl Into<String>,
    ) -> Self {
        let url = url.into();
        let container = Container::input(context, backend.clone(), url.clone());
        Self::with_container(url, container, backend)
    }

    /// Creates a reader for an existing input container.
    ///
    /// The reader takes its own reference to `container`. If the container is
    /// already open the reader never closes it; otherwise the reader opens it
    /// on first read and closes it when the reader closes.
    pub fn from_container(container: &Container) -> Result<Self> {
        if container.kind()? != ContainerKind::Read {
            return Err(Error::InvalidArgument(
                "readers need an input container".to_string(),
            ));
        }
        let url = container.url()?;
        let backend = container.backend()?;
        Ok(Self::with_container(url, container.copy_reference()?, backend))
    }

    fn with_container(url: String, container: Container, backend: Arc<dyn MediaBackend>) -> Self {
        let state = if container.is_open() {
            ReaderState::Open
        } else {
            ReaderState::Unopened
        };
        Self {
            id: GeneratorId::new(),
            coder: CoderState::new(url, container),
            backend,
            listeners: ListenerChain::new(),
            state,
            close_on_eof_only: false,
            external_payloads: false,
            announced: BTreeSet::new(),
            decoders: BTreeMap::new(),
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// Allows streams to appear after the container was opened.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] once the container is open.
    pub fn set_add_dynamic_streams(&mut self, value: bool) -> Result<()> {
        self.coder.container_ref().set_add_dynamic_streams(value)
    }

    pub fn can_add_dynamic_streams(&self) -> Result<bool> {
        self.coder.container_ref().can_add_dynamic_streams()
    }

    /// Makes open wait for the metadata of all streams.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] once the container is open.
    pub fn set_query_metadata(&mut self, value: bool) -> Result<()> {
        self.coder.container_ref().set_query_metadata(value)
    }

    pub fn will_query_metadata(&self) -> Result<bool> {
        self.coder.container_ref().will_query_metadata()
    }

    /// Only close automatically on end of file.
    ///
    /// With `false` (the default) any terminal signal closes the reader. With
    /// `true`, other failures leave the reader open in [`ReaderState::Errored`].
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] once the container is open.
    pub fn set_close_on_eof_only(&mut self, value: bool) -> Result<()> {
        self.ensure_configurable()?;
        self.close_on_eof_only = value;
        Ok(())
    }

    pub fn will_close_on_eof_only(&self) -> bool {
        self.close_on_eof_only
    }

    /// Delivers raw events with an [`OwnedMediaData`] copy as external payload
    /// instead of a media data handle.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] once the container is open.
    pub fn set_external_payloads(&mut self, value: bool) -> Result<()> {
        self.ensure_configurable()?;
        self.external_payloads = value;
        Ok(())
    }

    pub fn will_use_external_payloads(&self) -> bool {
        self.external_payloads
    }

    fn ensure_configurable(&self) -> Result<()> {
        if self.state == ReaderState::Unopened && !self.coder.container_ref().is_open() {
            Ok(())
        } else {
            Err(Error::AlreadyOpen)
        }
    }

    /// Opens the container and dispatches [`crate::EventKind::Open`].
    ///
    /// A reader that opens its container also closes it.
    pub fn open(&mut self) -> Result<()> {
        match self.state {
            ReaderState::Closed => return Err(Error::Closed),
            ReaderState::Unopened => {}
            ReaderState::Open | ReaderState::Errored => return Err(Error::AlreadyOpen),
        }
        self.coder.container_ref().open()?;
        self.coder.set_should_close_container(true);
        self.state = ReaderState::Open;
        tracing::debug!(url = %self.coder.url(), "Opened media reader");
        self.dispatch(MediaEvent::Open(OpenEvent {
            source: self.id,
            url: self.coder.url(),
        }))
    }

    /// Reads and dispatches one packet.
    ///
    /// Returns `None` while more data may follow, or the terminal signal that
    /// ended the read. Depending on [`Self::will_close_on_eof_only`] the
    /// reader closes itself before returning the signal.
    ///
    /// # Errors
    ///
    /// [`Error::Closed`] once closed, or any error raised by the container or
    /// a listener.
    pub fn read_packet(&mut self) -> Result<Option<TerminalSignal>> {
        match self.state {
            ReaderState::Closed => return Err(Error::Closed),
            ReaderState::Unopened => self.open()?,
            ReaderState::Open | ReaderState::Errored => {}
        }

        match self.coder.container_ref().read_next()? {
            ReadNext::Packet(mut packet) => {
                self.state = ReaderState::Open;
                let dispatched = self.handle_packet(&packet);
                let released = packet.release();
                dispatched?;
                released?;
                Ok(None)
            }
            ReadNext::Terminal(signal) => {
                if signal.is_eof() || !self.close_on_eof_only {
                    tracing::debug!(url = %self.coder.url(), %signal, "Read ended, closing reader");
                    self.close()?;
                } else {
                    tracing::warn!(url = %self.coder.url(), %signal, "Read failed, reader stays open");
                    self.state = ReaderState::Errored;
                }
                Ok(Some(signal))
            }
        }
    }

    fn handle_packet(&mut self, packet: &MediaData) -> Result<()> {
        let index = packet.stream_index();
        if !self.announced.contains(&index) {
            let stream = self.coder.container_ref().stream(index)?;
            self.announce_stream(&stream)?;
        }

        self.dispatch(MediaEvent::ReadPacket(ReadPacketEvent {
            source: self.id,
            packet,
        }))?;

        let decoded = match self.decoders.get_mut(&index) {
            Some(decoder) => decoder.decode(packet)?,
            None => None,
        };
        if let Some(mut raw) = decoded {
            let dispatched = self.dispatch_raw(&raw);
            let released = raw.release();
            dispatched?;
            released?;
        }
        Ok(())
    }

    /// Dispatches AddStream and, for decodable streams, OpenCoder. The stream
    /// counts as announced only once both succeeded, so a failed listener sees
    /// the stream again on its next packet.
    fn announce_stream(&mut self, stream: &StreamInfo) -> Result<()> {
        tracing::debug!(url = %self.coder.url(), ?stream, "New stream");
        self.dispatch(MediaEvent::AddStream(AddStreamEvent {
            source: self.id,
            stream_index: stream.index,
            stream,
        }))?;

        if let Some(mut decoder) = self.backend.decoder(stream)? {
            let opened = self.dispatch(MediaEvent::OpenCoder(OpenCoderEvent {
                source: self.id,
                stream_index: stream.index,
                stream,
            }));
            if let Err(err) = opened {
                if let Err(close_err) = decoder.close() {
                    tracing::warn!(stream = stream.index, "Failed to close decoder: {close_err}");
                }
                return Err(err);
            }
            self.decoders.insert(stream.index, decoder);
        }
        self.announced.insert(stream.index);
        Ok(())
    }

    fn dispatch_raw(&self, raw: &MediaData) -> Result<()> {
        let owned;
        let mut media = RawMedia::from_media(self.id, raw);
        if self.external_payloads {
            owned = raw.to_owned()?;
            media.payload = RawPayload::External(&owned);
        }
        match raw.kind() {
            MediaKind::Picture => self.dispatch(MediaEvent::VideoPicture(VideoPictureEvent { raw: media })),
            MediaKind::Samples => self.dispatch(MediaEvent::AudioSamples(AudioSamplesEvent { raw: media })),
            MediaKind::Packet => Err(Error::Backend(format!(
                "decoder of stream {} produced a packet",
                raw.stream_index()
            ))),
        }
    }

    /// Closes the reader.
    ///
    /// Dispatches [`crate::EventKind::CloseCoder`] for every open decoder in
    /// stream order, closes the container if the reader opened it, then
    /// dispatches [`crate::EventKind::Close`]. A reader that was never opened
    /// closes silently. Closing twice is a no-op.
    ///
    /// Cleanup runs to the end even when a step fails; the first error is returned.
    pub fn close(&mut self) -> Result<()> {
        let was_open = match self.state {
            ReaderState::Closed => return Ok(()),
            ReaderState::Unopened => false,
            ReaderState::Open | ReaderState::Errored => true,
        };
        self.state = ReaderState::Closed;

        let mut outcome = Ok(());
        for (stream_index, mut decoder) in std::mem::take(&mut self.decoders) {
            outcome = outcome.and(decoder.close());
            outcome = outcome.and(self.dispatch(MediaEvent::CloseCoder(CloseCoderEvent {
                source: self.id,
                stream_index,
            })));
        }
        outcome = outcome.and(self.coder.close_container_if_owned());
        tracing::debug!(url = %self.coder.url(), "Closed media reader");
        if !was_open {
            return outcome;
        }
        outcome.and(self.dispatch(MediaEvent::Close(CloseEvent {
            source: self.id,
            url: self.coder.url(),
        })))
    }

    fn dispatch(&self, event: MediaEvent<'_>) -> Result<()> {
        self.listeners.dispatch(&event)
    }
}

impl MediaCoder for MediaReader {
    fn coder_state(&self) -> &CoderState {
        &self.coder
    }

    fn coder_state_mut(&mut self) -> &mut CoderState {
        &mut self.coder
    }

    fn open(&mut self) -> Result<()> {
        MediaReader::open(self)
    }

    fn close(&mut self) -> Result<()> {
        MediaReader::close(self)
    }
}

impl MediaGenerator for MediaReader {
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

impl std::fmt::Debug for MediaReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaReader")
            .field("id", &self.id)
            .field("url", &self.coder.url())
            .field("state", &self.state)
            .field("listeners", &self.listeners)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use ferry::MemoryModel;

    use super::*;
    use crate::backend::{
        SignalKind,
        memory::{MemoryBackend, MemorySource},
    };

    fn reader(source: MemorySource) -> (MediaReader, MemoryBackend) {
        let backend = MemoryBackend::new();
        backend.add_source("mem://in", source);
        let context = MediaContext::new(MemoryModel::MirroredHeap);
        (
            MediaReader::new(&context, Arc::new(backend.clone()), "mem://in"),
            backend,
        )
    }

    #[test]
    fn first_read_opens_implicitly() {
        let (mut reader, backend) = reader(
            MemorySource::new()
                .with_stream(StreamInfo::data(0, "bin"))
                .packet(0, b"x", None),
        );
        assert_eq!(reader.state(), ReaderState::Unopened);
        assert_eq!(reader.read_packet().unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Open);
        assert!(reader.should_close_container());
        assert_eq!(backend.open_count("mem://in"), 1);
    }

    #[test]
    fn errored_reader_recovers_on_next_packet() {
        let (mut reader, _) = reader(
            MemorySource::new()
                .with_stream(StreamInfo::data(0, "bin"))
                .signal(TerminalSignal::new(SignalKind::InvalidData, "bad"))
                .packet(0, b"x", None),
        );
        reader.set_close_on_eof_only(true).unwrap();
        let signal = reader.read_packet().unwrap().unwrap();
        assert_eq!(signal.kind(), SignalKind::InvalidData);
        assert_eq!(reader.state(), ReaderState::Errored);
        assert!(reader.is_open());

        assert_eq!(reader.read_packet().unwrap(), None);
        assert_eq!(reader.state(), ReaderState::Open);
        assert!(reader.read_packet().unwrap().unwrap().is_eof());
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(matches!(reader.read_packet(), Err(Error::Closed)));
    }

    #[test]
    fn any_signal_closes_by_default() {
        let (mut reader, _) = reader(
            MemorySource::new()
                .with_stream(StreamInfo::data(0, "bin"))
                .signal(TerminalSignal::new(SignalKind::Io, "disk gone")),
        );
        assert_eq!(reader.read_packet().unwrap().unwrap().kind(), SignalKind::Io);
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(!reader.is_open());
    }

    #[test]
    fn settings_freeze_after_open() {
        let (mut reader, _) = reader(MemorySource::new().with_stream(StreamInfo::data(0, "bin")));
        reader.set_close_on_eof_only(true).unwrap();
        reader.set_external_payloads(true).unwrap();
        reader.open().unwrap();
        assert!(matches!(reader.set_close_on_eof_only(false), Err(Error::AlreadyOpen)));
        assert!(matches!(reader.set_external_payloads(false), Err(Error::AlreadyOpen)));
        assert!(matches!(reader.set_query_metadata(false), Err(Error::AlreadyOpen)));
        assert!(matches!(reader.open(), Err(Error::AlreadyOpen)));
    }

    #[test]
    fn reader_on_open_container_leaves_it_open() {
        let backend = MemoryBackend::new();
        backend.add_source(
            "mem://in",
            MemorySource::new().with_stream(StreamInfo::data(0, "bin")),
        );
        let context = MediaContext::new(MemoryModel::MirroredHeap);
        let container = Container::input(&context, Arc::new(backend), "mem://in");
        container.open().unwrap();

        let mut reader = MediaReader::from_container(&container).unwrap();
        assert_eq!(reader.state(), ReaderState::Open);
        assert!(reader.read_packet().unwrap().unwrap().is_eof());
        assert_eq!(reader.state(), ReaderState::Closed);
        assert!(container.is_open());
    }

    #[test]
    fn output_container_is_rejected() {
        let context = MediaContext::new(MemoryModel::MirroredHeap);
        let container = Container::output(&context, Arc::new(MemoryBackend::new()), "mem://out");
        assert!(matches!(
            MediaReader::from_container(&container),
            Err(Error::InvalidArgument(_))
        ));
    }
}
