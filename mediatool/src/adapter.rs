// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Pass-through stage for composing pipelines.

use crate::{
    MediaListener, Result,
    event::{
        AddStreamEvent, AudioSamplesEvent, CloseCoderEvent, CloseEvent, FlushEvent, GeneratorId,
        MediaEvent, OpenCoderEvent, OpenEvent, ReadPacketEvent, VideoPictureEvent,
        WriteHeaderEvent, WritePacketEvent, WriteTrailerEvent,
    },
    listener::{ListenerChain, MediaGenerator},
};

/// A listener that forwards every event, unchanged, to its own listeners.
///
/// Tools that only care about a few events can wrap an adapter and override
/// those, forwarding the rest.
#[derive(Debug, Default)]
pub struct MediaToolAdapter {
    id: GeneratorId,
    listeners: ListenerChain,
}

impl MediaToolAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards `event` to the adapter's listeners.
    pub fn forward(&self, event: MediaEvent<'_>) -> Result<()> {
        self.listeners.dispatch(&event)
    }
}

impl MediaListener for MediaToolAdapter {
    fn on_add_stream(&mut self, event: &AddStreamEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::AddStream(*event))
    }

    fn on_open_coder(&mut self, event: &OpenCoderEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::OpenCoder(*event))
    }

    fn on_close_coder(&mut self, event: &CloseCoderEvent) -> Result<()> {
        self.forward(MediaEvent::CloseCoder(*event))
    }

    fn on_open(&mut self, event: &OpenEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::Open(*event))
    }

    fn on_close(&mut self, event: &CloseEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::Close(*event))
    }

    fn on_read_packet(&mut self, event: &ReadPacketEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::ReadPacket(*event))
    }

    fn on_write_packet(&mut self, event: &WritePacketEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::WritePacket(*event))
    }

    fn on_write_header(&mut self, event: &WriteHeaderEvent) -> Result<()> {
        self.forward(MediaEvent::WriteHeader(*event))
    }

    fn on_write_trailer(&mut self, event: &WriteTrailerEvent) -> Result<()> {
        self.forward(MediaEvent::WriteTrailer(*event))
    }

    fn on_flush(&mut self, event: &FlushEvent) -> Result<()> {
        self.forward(MediaEvent::Flush(*event))
    }

    fn on_video_picture(&mut self, event: &VideoPictureEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::VideoPicture(*event))
    }

    fn on_audio_samples(&mut self, event: &AudioSamplesEvent<'_>) -> Result<()> {
        self.forward(MediaEvent::AudioSamples(*event))
    }
}

impl MediaGenerator for MediaToolAdapter {
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
