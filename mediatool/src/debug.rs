// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Listener that logs the events it receives.

use std::collections::{BTreeMap, HashSet};

use crate::{
    EventKind, MediaListener, Result,
    event::{
        AddStreamEvent, AudioSamplesEvent, CloseCoderEvent, CloseEvent, FlushEvent, MediaEvent,
        OpenCoderEvent, OpenEvent, ReadPacketEvent, VideoPictureEvent, WriteHeaderEvent,
        WritePacketEvent, WriteTrailerEvent,
    },
};

/// How much of each event is logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DebugMode {
    /// Only the event kind.
    Event,
    /// Kind, source, stream and timestamp.
    #[default]
    MetaData,
    /// Metadata plus payload size and key frame flag.
    Data,
}

/// Logs selected events at INFO level and counts every event it logs.
#[derive(Debug, Clone)]
pub struct MediaDebugListener {
    name: String,
    mode: DebugMode,
    events: HashSet<EventKind>,
    counts: BTreeMap<EventKind, usize>,
}

impl MediaDebugListener {
    /// Creates a listener logging `events` with the given level of detail.
    pub fn new(name: impl Into<String>, mode: DebugMode, events: impl IntoIterator<Item = EventKind>) -> Self {
        Self {
            name: name.into(),
            mode,
            events: events.into_iter().collect(),
            counts: BTreeMap::new(),
        }
    }

    /// Creates a listener logging every event kind.
    pub fn all(name: impl Into<String>, mode: DebugMode) -> Self {
        Self::new(name, mode, EventKind::ALL)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mode(&self) -> DebugMode {
        self.mode
    }

    /// Number of `kind` events logged so far.
    pub fn count(&self, kind: EventKind) -> usize {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    /// Number of events logged so far.
    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    fn log(&mut self, event: &MediaEvent<'_>) -> Result<()> {
        let kind = event.kind();
        if !self.events.contains(&kind) {
            return Ok(());
        }
        *self.counts.entry(kind).or_default() += 1;

        match self.mode {
            DebugMode::Event => tracing::info!(listener = %self.name, "{kind}"),
            DebugMode::MetaData => tracing::info!(
                listener = %self.name,
                source = %event.source(),
                stream = ?event.stream_index(),
                time_stamp = ?event.time_stamp(),
                "{kind}"
            ),
            DebugMode::Data => {
                let (size, key_frame) = match event.media_data() {
                    Some(data) => (Some(data.len()?), data.is_key_frame()),
                    None => (None, false),
                };
                tracing::info!(
                    listener = %self.name,
                    source = %event.source(),
                    stream = ?event.stream_index(),
                    time_stamp = ?event.time_stamp(),
                    size = ?size,
                    key_frame,
                    "{kind}"
                );
            }
        }
        Ok(())
    }
}

impl MediaListener for MediaDebugListener {
    fn on_add_stream(&mut self, event: &AddStreamEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::AddStream(*event))
    }

    fn on_open_coder(&mut self, event: &OpenCoderEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::OpenCoder(*event))
    }

    fn on_close_coder(&mut self, event: &CloseCoderEvent) -> Result<()> {
        self.log(&MediaEvent::CloseCoder(*event))
    }

    fn on_open(&mut self, event: &OpenEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::Open(*event))
    }

    fn on_close(&mut self, event: &CloseEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::Close(*event))
    }

    fn on_read_packet(&mut self, event: &ReadPacketEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::ReadPacket(*event))
    }

    fn on_write_packet(&mut self, event: &WritePacketEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::WritePacket(*event))
    }

    fn on_write_header(&mut self, event: &WriteHeaderEvent) -> Result<()> {
        self.log(&MediaEvent::WriteHeader(*event))
    }

    fn on_write_trailer(&mut self, event: &WriteTrailerEvent) -> Result<()> {
        self.log(&MediaEvent::WriteTrailer(*event))
    }

    fn on_flush(&mut self, event: &FlushEvent) -> Result<()> {
        self.log(&MediaEvent::Flush(*event))
    }

    fn on_video_picture(&mut self, event: &VideoPictureEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::VideoPicture(*event))
    }

    fn on_audio_samples(&mut self, event: &AudioSamplesEvent<'_>) -> Result<()> {
        self.log(&MediaEvent::AudioSamples(*event))
    }
}
