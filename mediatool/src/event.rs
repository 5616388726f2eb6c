// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Events emitted by media generators.
//!
//! Events borrow their payload from the generator for the duration of one
//! dispatch. A listener that wants to keep media data past its callback must
//! take its own reference with [`MediaData::copy_reference`] or copy it with
//! [`MediaData::to_owned`].

use std::{any::Any, fmt};

use uuid::Uuid;

use crate::{MediaData, MediaListener, Result, TimeUnit, backend::StreamInfo};

/// Identity of the generator an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeneratorId(Uuid);

impl GeneratorId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for GeneratorId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for GeneratorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// The kinds of events a generator can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    AddStream,
    OpenCoder,
    CloseCoder,
    Open,
    Close,
    ReadPacket,
    WritePacket,
    WriteHeader,
    WriteTrailer,
    Flush,
    VideoPicture,
    AudioSamples,
}

impl EventKind {
    pub const ALL: [EventKind; 12] = [
        EventKind::AddStream,
        EventKind::OpenCoder,
        EventKind::CloseCoder,
        EventKind::Open,
        EventKind::Close,
        EventKind::ReadPacket,
        EventKind::WritePacket,
        EventKind::WriteHeader,
        EventKind::WriteTrailer,
        EventKind::Flush,
        EventKind::VideoPicture,
        EventKind::AudioSamples,
    ];
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Common accessors of all events.
pub trait Event {
    fn kind(&self) -> EventKind;

    /// The generator that emitted the event.
    fn source(&self) -> GeneratorId;
}

/// Events about one stream of a container.
pub trait StreamEvent: Event {
    fn stream_index(&self) -> Option<usize>;
}

/// Payload of a decoded picture or sample event.
///
/// Generators either hand out media data from the native context, or an
/// arbitrary value of their own when configured to do so.
#[derive(Debug, Clone, Copy)]
pub enum RawPayload<'a> {
    Media(&'a MediaData),
    External(&'a dyn Any),
}

/// Decoded media carried by [`VideoPictureEvent`] and [`AudioSamplesEvent`].
#[derive(Debug, Clone, Copy)]
pub struct RawMedia<'a> {
    pub source: GeneratorId,
    pub stream_index: usize,
    pub payload: RawPayload<'a>,
    pub time_stamp: Option<i64>,
    pub time_unit: TimeUnit,
}

impl<'a> RawMedia<'a> {
    /// Describes `data` as a raw media event payload.
    pub fn from_media(source: GeneratorId, data: &'a MediaData) -> Self {
        Self {
            source,
            stream_index: data.stream_index(),
            payload: RawPayload::Media(data),
            time_stamp: data.time_stamp(),
            time_unit: data.time_unit(),
        }
    }
}

/// Events carrying decoded pictures or samples.
pub trait RawMediaEvent: StreamEvent {
    fn raw(&self) -> &RawMedia<'_>;

    fn payload(&self) -> &RawPayload<'_> {
        &self.raw().payload
    }

    /// The media data, unless the payload is external.
    fn media_data(&self) -> Option<&MediaData> {
        match self.raw().payload {
            RawPayload::Media(data) => Some(data),
            RawPayload::External(_) => None,
        }
    }

    /// The external payload, unless the payload is media data.
    fn external_data(&self) -> Option<&dyn Any> {
        match self.raw().payload {
            RawPayload::Media(_) => None,
            RawPayload::External(value) => Some(value),
        }
    }

    /// Timestamp in [`Self::time_unit`].
    fn time_stamp(&self) -> Option<i64> {
        self.raw().time_stamp
    }

    fn time_unit(&self) -> TimeUnit {
        self.raw().time_unit
    }

    /// Timestamp converted to `unit`.
    fn time_stamp_in(&self, unit: TimeUnit) -> Result<Option<i64>> {
        self.time_stamp()
            .map(|value| unit.convert(value, self.time_unit()))
            .transpose()
    }
}

/// The generator opened its container.
#[derive(Debug, Clone, Copy)]
pub struct OpenEvent<'a> {
    pub source: GeneratorId,
    pub url: &'a str,
}

/// The generator closed.
#[derive(Debug, Clone, Copy)]
pub struct CloseEvent<'a> {
    pub source: GeneratorId,
    pub url: &'a str,
}

/// A stream was seen for the first time.
#[derive(Debug, Clone, Copy)]
pub struct AddStreamEvent<'a> {
    pub source: GeneratorId,
    pub stream_index: usize,
    pub stream: &'a StreamInfo,
}

/// A decoder or encoder was opened for a stream.
#[derive(Debug, Clone, Copy)]
pub struct OpenCoderEvent<'a> {
    pub source: GeneratorId,
    pub stream_index: usize,
    pub stream: &'a StreamInfo,
}

/// The decoder or encoder of a stream was closed.
#[derive(Debug, Clone, Copy)]
pub struct CloseCoderEvent {
    pub source: GeneratorId,
    pub stream_index: usize,
}

/// A packet was read from a container.
#[derive(Debug, Clone, Copy)]
pub struct ReadPacketEvent<'a> {
    pub source: GeneratorId,
    pub packet: &'a MediaData,
}

/// A packet was written to a container.
#[derive(Debug, Clone, Copy)]
pub struct WritePacketEvent<'a> {
    pub source: GeneratorId,
    pub packet: &'a MediaData,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteHeaderEvent {
    pub source: GeneratorId,
}

#[derive(Debug, Clone, Copy)]
pub struct WriteTrailerEvent {
    pub source: GeneratorId,
}

#[derive(Debug, Clone, Copy)]
pub struct FlushEvent {
    pub source: GeneratorId,
}

/// A picture was decoded, or is about to be encoded.
#[derive(Debug, Clone, Copy)]
pub struct VideoPictureEvent<'a> {
    pub raw: RawMedia<'a>,
}

/// A block of samples was decoded, or is about to be encoded.
#[derive(Debug, Clone, Copy)]
pub struct AudioSamplesEvent<'a> {
    pub raw: RawMedia<'a>,
}

macro_rules! impl_event {
    ($event:ty, $kind:ident, |$this:ident| $source:expr, $stream:expr) => {
        impl Event for $event {
            fn kind(&self) -> EventKind {
                EventKind::$kind
            }

            fn source(&self) -> GeneratorId {
                let $this = self;
                $source
            }
        }

        impl StreamEvent for $event {
            #[allow(unused_variables)]
            fn stream_index(&self) -> Option<usize> {
                let $this = self;
                $stream
            }
        }
    };
}

impl_event!(OpenEvent<'_>, Open, |e| e.source, None);
impl_event!(CloseEvent<'_>, Close, |e| e.source, None);
impl_event!(AddStreamEvent<'_>, AddStream, |e| e.source, Some(e.stream_index));
impl_event!(OpenCoderEvent<'_>, OpenCoder, |e| e.source, Some(e.stream_index));
impl_event!(CloseCoderEvent, CloseCoder, |e| e.source, Some(e.stream_index));
impl_event!(ReadPacketEvent<'_>, ReadPacket, |e| e.source, Some(e.packet.stream_index()));
impl_event!(WritePacketEvent<'_>, WritePacket, |e| e.source, Some(e.packet.stream_index()));
impl_event!(WriteHeaderEvent, WriteHeader, |e| e.source, None);
impl_event!(WriteTrailerEvent, WriteTrailer, |e| e.source, None);
impl_event!(FlushEvent, Flush, |e| e.source, None);
impl_event!(VideoPictureEvent<'_>, VideoPicture, |e| e.raw.source, Some(e.raw.stream_index));
impl_event!(AudioSamplesEvent<'_>, AudioSamples, |e| e.raw.source, Some(e.raw.stream_index));

impl RawMediaEvent for VideoPictureEvent<'_> {
    fn raw(&self) -> &RawMedia<'_> {
        &self.raw
    }
}

impl RawMediaEvent for AudioSamplesEvent<'_> {
    fn raw(&self) -> &RawMedia<'_> {
        &self.raw
    }
}

/// Any event, as passed through a listener chain.
#[derive(Debug, Clone, Copy)]
pub enum MediaEvent<'a> {
    AddStream(AddStreamEvent<'a>),
    OpenCoder(OpenCoderEvent<'a>),
    CloseCoder(CloseCoderEvent),
    Open(OpenEvent<'a>),
    Close(CloseEvent<'a>),
    ReadPacket(ReadPacketEvent<'a>),
    WritePacket(WritePacketEvent<'a>),
    WriteHeader(WriteHeaderEvent),
    WriteTrailer(WriteTrailerEvent),
    Flush(FlushEvent),
    VideoPicture(VideoPictureEvent<'a>),
    AudioSamples(AudioSamplesEvent<'a>),
}

impl MediaEvent<'_> {
    fn inner(&self) -> &dyn StreamEvent {
        match self {
            MediaEvent::AddStream(event) => event,
            MediaEvent::OpenCoder(event) => event,
            MediaEvent::CloseCoder(event) => event,
            MediaEvent::Open(event) => event,
            MediaEvent::Close(event) => event,
            MediaEvent::ReadPacket(event) => event,
            MediaEvent::WritePacket(event) => event,
            MediaEvent::WriteHeader(event) => event,
            MediaEvent::WriteTrailer(event) => event,
            MediaEvent::Flush(event) => event,
            MediaEvent::VideoPicture(event) => event,
            MediaEvent::AudioSamples(event) => event,
        }
    }

    pub fn kind(&self) -> EventKind {
        self.inner().kind()
    }

    pub fn source(&self) -> GeneratorId {
        self.inner().source()
    }

    pub fn stream_index(&self) -> Option<usize> {
        self.inner().stream_index()
    }

    /// Media data carried by packet and raw media events.
    pub fn media_data(&self) -> Option<&MediaData> {
        match self {
            MediaEvent::ReadPacket(event) => Some(event.packet),
            MediaEvent::WritePacket(event) => Some(event.packet),
            MediaEvent::VideoPicture(event) => event.media_data(),
            MediaEvent::AudioSamples(event) => event.media_data(),
            _ => None,
        }
    }

    /// Timestamp and unit of packet and raw media events.
    pub fn time_stamp(&self) -> Option<(i64, TimeUnit)> {
        match self {
            MediaEvent::VideoPicture(event) => event
                .time_stamp()
                .map(|value| (value, event.time_unit())),
            MediaEvent::AudioSamples(event) => event
                .time_stamp()
                .map(|value| (value, event.time_unit())),
            _ => self
                .media_data()
                .and_then(|data| data.time_stamp().map(|value| (value, data.time_unit()))),
        }
    }

    /// Calls the `on_*` method of `listener` matching this event.
    pub fn dispatch_to(&self, listener: &mut dyn MediaListener) -> Result<()> {
        match self {
            MediaEvent::AddStream(event) => listener.on_add_stream(event),
            MediaEvent::OpenCoder(event) => listener.on_open_coder(event),
            MediaEvent::CloseCoder(event) => listener.on_close_coder(event),
            MediaEvent::Open(event) => listener.on_open(event),
            MediaEvent::Close(event) => listener.on_close(event),
            MediaEvent::ReadPacket(event) => listener.on_read_packet(event),
            MediaEvent::WritePacket(event) => listener.on_write_packet(event),
            MediaEvent::WriteHeader(event) => listener.on_write_header(event),
            MediaEvent::WriteTrailer(event) => listener.on_write_trailer(event),
            MediaEvent::Flush(event) => listener.on_flush(event),
            MediaEvent::VideoPicture(event) => listener.on_video_picture(event),
            MediaEvent::AudioSamples(event) => listener.on_audio_samples(event),
        }
    }
}

#[cfg(test)]
mod tests {
    use ferry::{Arena, MemoryModel};

    use super::*;
    use crate::MediaKind;

    #[test]
    fn raw_events_expose_tagged_payloads() {
        let buffers = Arena::new(MemoryModel::MirroredHeap);
        let picture = MediaData::new(
            &buffers,
            MediaKind::Picture,
            2,
            vec![0u8; 4],
            Some(1_500),
            TimeUnit::Microseconds,
        );
        let source = GeneratorId::new();
        let event = VideoPictureEvent {
            raw: RawMedia::from_media(source, &picture),
        };
        assert_eq!(event.kind(), EventKind::VideoPicture);
        assert_eq!(event.stream_index(), Some(2));
        assert!(event.media_data().is_some());
        assert!(event.external_data().is_none());
        assert_eq!(event.time_stamp_in(TimeUnit::Milliseconds).unwrap(), Some(1));
        assert_eq!(MediaEvent::VideoPicture(event).source(), source);

        let label = String::from("frame");
        let external = AudioSamplesEvent {
            raw: RawMedia {
                source,
                stream_index: 1,
                payload: RawPayload::External(&label),
                time_stamp: None,
                time_unit: TimeUnit::Milliseconds,
            },
        };
        assert!(external.media_data().is_none());
        assert_eq!(
            external
                .external_data()
                .and_then(|value| value.downcast_ref::<String>()),
            Some(&label)
        );
        assert_eq!(external.time_stamp_in(TimeUnit::Seconds).unwrap(), None);
    }

    #[test]
    fn timestamp_overflow_is_reported() {
        let value = String::new();
        let event = AudioSamplesEvent {
            raw: RawMedia {
                source: GeneratorId::new(),
                stream_index: 0,
                payload: RawPayload::External(&value),
                time_stamp: Some(i64::MAX),
                time_unit: TimeUnit::Days,
            },
        };
        assert!(matches!(
            event.time_stamp_in(TimeUnit::Nanoseconds),
            Err(crate::Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn event_kinds_are_unique() {
        let kinds: std::collections::HashSet<_> = EventKind::ALL.into_iter().collect();
        assert_eq!(kinds.len(), 12);
        assert_eq!(EventKind::ReadPacket.to_string(), "ReadPacket");
    }
}
