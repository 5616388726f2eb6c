// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Reference-counted container sessions.
//!
//! A [`Container`] is a handle to a demux or mux session living in the
//! context's container arena. Readers and writers share containers through
//! [`Container::copy_reference`]; the backend session is closed when the last
//! handle is released, if nobody closed it before.

use std::{fmt, sync::Arc};

use ferry::Handle;

use crate::{
    Error, MediaContext, MediaData, Result,
    backend::{ContainerOptions, Demuxer, MediaBackend, Muxer, ReadNext, StreamInfo},
};

/// Direction of a container session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContainerKind {
    /// Demuxes an input.
    Read,
    /// Muxes an output.
    Write,
}

impl fmt::Display for ContainerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerKind::Read => f.write_str("read"),
            ContainerKind::Write => f.write_str("write"),
        }
    }
}

enum SessionState {
    Unopened,
    Demux(Box<dyn Demuxer>),
    Mux(Box<dyn Muxer>),
    Closed,
}

/// Native state behind a [`Container`] handle.
pub(crate) struct ContainerSession {
    url: String,
    kind: ContainerKind,
    options: ContainerOptions,
    backend: Arc<dyn MediaBackend>,
    state: SessionState,
    /// Output streams; inputs ask the demuxer instead.
    streams: Vec<StreamInfo>,
    header_written: bool,
}

impl ContainerSession {
    fn is_open(&self) -> bool {
        matches!(self.state, SessionState::Demux(_) | SessionState::Mux(_))
    }

    fn configure(&mut self, f: impl FnOnce(&mut ContainerOptions)) -> Result<()> {
        match self.state {
            SessionState::Unopened => {
                f(&mut self.options);
                Ok(())
            }
            _ => Err(Error::AlreadyOpen),
        }
    }

    fn open(&mut self) -> Result<()> {
        match self.state {
            SessionState::Unopened => {}
            SessionState::Closed => return Err(Error::Closed),
            _ => return Err(Error::AlreadyOpen),
        }
        self.state = match self.kind {
            ContainerKind::Read => {
                SessionState::Demux(self.backend.open_input(&self.url, &self.options)?)
            }
            ContainerKind::Write => SessionState::Mux(self.backend.open_output(&self.url)?),
        };
        tracing::debug!(url = %self.url, kind = %self.kind, options = ?self.options, "Opened container");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        let result = match std::mem::replace(&mut self.state, SessionState::Closed) {
            SessionState::Demux(mut demuxer) => demuxer.close(),
            SessionState::Mux(mut muxer) => muxer.close(),
            SessionState::Unopened | SessionState::Closed => return Err(Error::NotOpen),
        };
        tracing::debug!(url = %self.url, kind = %self.kind, "Closed container");
        result
    }

    fn streams(&self) -> Result<Vec<StreamInfo>> {
        match &self.state {
            SessionState::Demux(demuxer) => Ok(demuxer.streams()),
            SessionState::Mux(_) => Ok(self.streams.clone()),
            SessionState::Unopened | SessionState::Closed => Err(Error::NotOpen),
        }
    }

    fn demuxer(&mut self) -> Result<&mut Box<dyn Demuxer>> {
        match &mut self.state {
            SessionState::Demux(demuxer) => Ok(demuxer),
            SessionState::Mux(_) => Err(Error::InvalidArgument(format!(
                "\"{}\" is an output container",
                self.url
            ))),
            SessionState::Unopened | SessionState::Closed => Err(Error::NotOpen),
        }
    }

    fn muxer(&mut self) -> Result<&mut Box<dyn Muxer>> {
        match &mut self.state {
            SessionState::Mux(muxer) => Ok(muxer),
            SessionState::Demux(_) => Err(Error::InvalidArgument(format!(
                "\"{}\" is an input container",
                self.url
            ))),
            SessionState::Unopened | SessionState::Closed => Err(Error::NotOpen),
        }
    }

    fn add_stream(&mut self, info: &StreamInfo) -> Result<usize> {
        if self.header_written {
            return Err(Error::InvalidArgument(format!(
                "cannot add a stream to \"{}\" after its header was written",
                self.url
            )));
        }
        let index = self.muxer()?.add_stream(info)?;
        self.streams.push(StreamInfo {
            index,
            ..info.clone()
        });
        Ok(index)
    }

    fn write_header(&mut self) -> Result<()> {
        if self.header_written {
            return Err(Error::InvalidArgument(format!(
                "header of \"{}\" was already written",
                self.url
            )));
        }
        self.muxer()?.write_header()?;
        self.header_written = true;
        Ok(())
    }

    fn require_header(&self, what: &str) -> Result<()> {
        if self.header_written {
            Ok(())
        } else {
            Err(Error::InvalidArgument(format!(
                "cannot {what} \"{}\" before its header",
                self.url
            )))
        }
    }
}

impl fmt::Debug for ContainerSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerSession")
            .field("url", &self.url)
            .field("kind", &self.kind)
            .field("open", &self.is_open())
            .finish()
    }
}

impl Drop for ContainerSession {
    fn drop(&mut self) {
        if self.is_open()
            && let Err(err) = self.close()
        {
            tracing::error!("Failed to close container \"{}\": {:?}", self.url, err);
        }
    }
}

/// Handle to a demux or mux session.
#[derive(Debug)]
pub struct Container {
    handle: Handle<ContainerSession>,
    context: MediaContext,
}

impl Container {
    /// Creates an unopened input container for `url`.
    pub fn input(context: &MediaContext, backend: Arc<dyn MediaBackend>, url: impl Into<String>) -> Self {
        Self::new(context, backend, url.into(), ContainerKind::Read)
    }

    /// Creates an unopened output container for `url`.
    pub fn output(context: &MediaContext, backend: Arc<dyn MediaBackend>, url: impl Into<String>) -> Self {
        Self::new(context, backend, url.into(), ContainerKind::Write)
    }

    fn new(
        context: &MediaContext,
        backend: Arc<dyn MediaBackend>,
        url: String,
        kind: ContainerKind,
    ) -> Self {
        let handle = context.containers.acquire(ContainerSession {
            url,
            kind,
            options: ContainerOptions::default(),
            backend,
            state: SessionState::Unopened,
            streams: Vec::new(),
            header_written: false,
        });
        Self {
            handle,
            context: context.clone(),
        }
    }

    /// Allows new streams to appear after open. Must be set before open.
    pub fn set_add_dynamic_streams(&self, value: bool) -> Result<()> {
        self.handle
            .with(|session| session.configure(|options| options.add_dynamic_streams = value))?
    }

    pub fn can_add_dynamic_streams(&self) -> Result<bool> {
        Ok(self.handle.with(|session| session.options.add_dynamic_streams)?)
    }

    /// Makes open wait for the metadata of all streams. Must be set before open.
    pub fn set_query_metadata(&self, value: bool) -> Result<()> {
        self.handle
            .with(|session| session.configure(|options| options.query_metadata = value))?
    }

    pub fn will_query_metadata(&self) -> Result<bool> {
        Ok(self.handle.with(|session| session.options.query_metadata)?)
    }

    /// Opens the backend session.
    ///
    /// # Errors
    ///
    /// [`Error::AlreadyOpen`] if open, [`Error::Closed`] once closed, or the
    /// backend's error.
    pub fn open(&self) -> Result<()> {
        self.handle.with(|session| session.open())?
    }

    /// Closes the backend session. The handle stays valid.
    pub fn close(&self) -> Result<()> {
        self.handle.with(|session| session.close())?
    }

    /// Returns `true` while both the handle and the session are open.
    pub fn is_open(&self) -> bool {
        self.handle
            .with(|session| session.is_open())
            .unwrap_or(false)
    }

    pub fn kind(&self) -> Result<ContainerKind> {
        Ok(self.handle.with(|session| session.kind)?)
    }

    pub fn url(&self) -> Result<String> {
        Ok(self.handle.with(|session| session.url.clone())?)
    }

    pub fn stream_count(&self) -> Result<usize> {
        Ok(self.streams()?.len())
    }

    /// Stream with container index `index`.
    pub fn stream(&self, index: usize) -> Result<StreamInfo> {
        self.streams()?
            .into_iter()
            .find(|info| info.index == index)
            .ok_or_else(|| Error::InvalidArgument(format!("no stream with index {index}")))
    }

    /// Streams currently known to the session.
    pub fn streams(&self) -> Result<Vec<StreamInfo>> {
        self.handle.with(|session| session.streams())?
    }

    /// Reads the next packet of an input container.
    pub fn read_next(&self) -> Result<ReadNext> {
        let buffers = self.context.buffers();
        self.handle
            .with(|session| -> Result<ReadNext> { Ok(session.demuxer()?.read_packet(buffers)) })?
    }

    /// Adds a stream to an output container and returns its index.
    pub fn add_stream(&self, info: &StreamInfo) -> Result<usize> {
        self.handle.with(|session| session.add_stream(info))?
    }

    pub fn write_header(&self) -> Result<()> {
        self.handle.with(|session| session.write_header())?
    }

    pub fn header_written(&self) -> Result<bool> {
        Ok(self.handle.with(|session| session.header_written)?)
    }

    pub fn write_packet(&self, packet: &MediaData) -> Result<()> {
        self.handle.with(|session| -> Result<()> {
            session.require_header("write packets to")?;
            session.muxer()?.write_packet(packet)
        })?
    }

    pub fn flush(&self) -> Result<()> {
        self.handle.with(|session| -> Result<()> { session.muxer()?.flush() })?
    }

    pub fn write_trailer(&self) -> Result<()> {
        self.handle.with(|session| -> Result<()> {
            session.require_header("write the trailer of")?;
            session.muxer()?.write_trailer()
        })?
    }

    /// Creates another handle to the same session.
    pub fn copy_reference(&self) -> Result<Container> {
        Ok(Self {
            handle: self.handle.copy_reference()?,
            context: self.context.clone(),
        })
    }

    /// Releases this handle; the session is closed and freed with its last handle.
    pub fn release(&mut self) -> Result<()> {
        Ok(self.handle.release()?)
    }

    pub fn ref_count(&self) -> Result<usize> {
        Ok(self.handle.ref_count()?)
    }

    pub fn context(&self) -> &MediaContext {
        &self.context
    }

    pub(crate) fn backend(&self) -> Result<Arc<dyn MediaBackend>> {
        Ok(self.handle.with(|session| session.backend.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use ferry::MemoryModel;

    use super::*;
    use crate::backend::memory::{MemoryBackend, MemorySource};

    fn setup() -> (MediaContext, MemoryBackend) {
        let backend = MemoryBackend::new();
        backend.add_source(
            "mem://in",
            MemorySource::new()
                .with_stream(StreamInfo::video(0, "raw"))
                .packet(0, b"p0", Some(0)),
        );
        (MediaContext::new(MemoryModel::MirroredHeap), backend)
    }

    #[test]
    fn options_are_frozen_once_open() {
        let (context, backend) = setup();
        let container = Container::input(&context, Arc::new(backend), "mem://in");
        container.set_add_dynamic_streams(true).unwrap();
        container.set_add_dynamic_streams(false).unwrap();
        container.open().unwrap();
        assert!(matches!(
            container.set_add_dynamic_streams(true),
            Err(Error::AlreadyOpen)
        ));
        assert!(matches!(container.set_query_metadata(false), Err(Error::AlreadyOpen)));
        assert!(!container.can_add_dynamic_streams().unwrap());
    }

    #[test]
    fn closed_container_reports_not_open() {
        let (context, backend) = setup();
        let container = Container::input(&context, Arc::new(backend), "mem://in");
        assert!(matches!(container.read_next(), Err(Error::NotOpen)));
        container.open().unwrap();
        assert_eq!(container.stream_count().unwrap(), 1);
        container.close().unwrap();
        assert!(!container.is_open());
        assert!(matches!(container.read_next(), Err(Error::NotOpen)));
        assert!(matches!(container.close(), Err(Error::NotOpen)));
        assert!(matches!(container.open(), Err(Error::Closed)));
    }

    #[test]
    fn released_container_is_use_after_free() {
        let (context, backend) = setup();
        let mut container = Container::input(&context, Arc::new(backend), "mem://in");
        let copy = container.copy_reference().unwrap();
        container.release().unwrap();

        assert!(container.open().unwrap_err().is_use_after_free());
        copy.open().unwrap();
        assert!(copy.is_open());
        assert_eq!(context.live_containers(), 1);
        drop(copy);
        assert_eq!(context.live_containers(), 0);
    }

    #[test]
    fn last_release_closes_the_session() {
        let (context, backend) = setup();
        let shared: Arc<dyn MediaBackend> = Arc::new(backend.clone());
        let container = Container::output(&context, shared, "mem://out");
        container.open().unwrap();
        drop(container);
        assert!(backend.sink("mem://out").unwrap().closed);
    }

    #[test]
    fn output_requires_header_before_packets() {
        let (context, backend) = setup();
        let container = Container::output(&context, Arc::new(backend), "mem://out");
        container.open().unwrap();
        let index = container.add_stream(&StreamInfo::data(5, "bin")).unwrap();
        assert_eq!(index, 0);
        assert_eq!(container.stream(0).unwrap().codec, "bin");

        let packet = context.media_data(
            crate::MediaKind::Packet,
            0,
            &b"x"[..],
            None,
            crate::TimeUnit::Microseconds,
        );
        assert!(matches!(
            container.write_packet(&packet),
            Err(Error::InvalidArgument(_))
        ));
        container.write_header().unwrap();
        container.write_packet(&packet).unwrap();
        assert!(matches!(
            container.add_stream(&StreamInfo::data(1, "bin")),
            Err(Error::InvalidArgument(_))
        ));
        assert!(matches!(container.read_next(), Err(Error::InvalidArgument(_))));
    }
}
