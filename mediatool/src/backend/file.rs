// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Raw-file backend.
//!
//! An input file is exposed as a single stream whose media type is guessed
//! from the file extension. Packets are fixed-size chunks of the file; the
//! last one may be shorter. An output file receives packet payloads in the
//! order they are written, so copying a file through a reader and a writer
//! reproduces it byte for byte.

use std::{
    fs::File,
    io::{BufWriter, ErrorKind, Read, Write},
    path::Path,
};

use ferry::Arena;

use super::{
    ContainerOptions, Demuxer, MediaBackend, MediaType, Muxer, ReadNext, SignalKind, StreamInfo,
    TerminalSignal,
};
use crate::{Error, MediaBuffer, MediaData, MediaKind, Result, TimeUnit, config::DEFAULT_CHUNK_SIZE};

/// Nominal duration of one video chunk (25 frames per second).
const VIDEO_CHUNK_DURATION_US: i64 = 40_000;
/// Nominal audio layout: 48 kHz, 16-bit stereo.
const AUDIO_SAMPLE_RATE: i64 = 48_000;
const AUDIO_BYTES_PER_FRAME: i64 = 4;

/// Backend reading and writing plain files.
#[derive(Debug, Clone, Copy)]
pub struct FileBackend {
    chunk_size: usize,
}

impl Default for FileBackend {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl FileBackend {
    /// Creates a backend producing packets of `chunk_size` bytes.
    pub fn new(chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidArgument(
                "chunk size must be greater than zero".to_string(),
            ));
        }
        Ok(Self { chunk_size })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

/// Guesses the stream description of a raw file from its extension.
pub fn probe(path: &Path) -> StreamInfo {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    let media_type = match extension.as_str() {
        "wav" | "pcm" | "mp3" | "aac" | "flac" | "ogg" => MediaType::Audio,
        "yuv" | "mp4" | "mov" | "flv" | "mkv" | "avi" | "h264" | "mpg" => MediaType::Video,
        _ => MediaType::Data,
    };
    let codec = if extension.is_empty() {
        "raw".to_string()
    } else {
        extension
    };
    StreamInfo::new(0, media_type, codec)
}

impl MediaBackend for FileBackend {
    fn open_input(&self, url: &str, options: &ContainerOptions) -> Result<Box<dyn Demuxer>> {
        let path = Path::new(url);
        let file = File::open(path)?;
        let stream = probe(path);
        tracing::debug!(url, ?stream, ?options, chunk_size = self.chunk_size, "Opened input file");
        Ok(Box::new(FileDemuxer {
            file: Some(file),
            stream,
            chunk_size: self.chunk_size,
            chunks: 0,
            bytes: 0,
        }))
    }

    fn open_output(&self, url: &str) -> Result<Box<dyn Muxer>> {
        let file = File::create(url)?;
        tracing::debug!(url, "Created output file");
        Ok(Box::new(FileMuxer {
            url: url.to_string(),
            writer: Some(BufWriter::new(file)),
            streams: 0,
        }))
    }
}

struct FileDemuxer {
    file: Option<File>,
    stream: StreamInfo,
    chunk_size: usize,
    chunks: u64,
    bytes: u64,
}

impl FileDemuxer {
    fn time_stamp(&self) -> Option<i64> {
        match self.stream.media_type {
            MediaType::Video => Some(self.chunks as i64 * VIDEO_CHUNK_DURATION_US),
            MediaType::Audio => Some(
                (self.bytes as i64 / AUDIO_BYTES_PER_FRAME) * 1_000_000 / AUDIO_SAMPLE_RATE,
            ),
            MediaType::Data => None,
        }
    }

    /// Fills a chunk, tolerating short reads.
    fn read_chunk(&mut self) -> std::io::Result<Vec<u8>> {
        let Some(file) = self.file.as_mut() else {
            return Ok(Vec::new());
        };
        let mut chunk = vec![0u8; self.chunk_size];
        let mut filled = 0;
        while filled < chunk.len() {
            match file.read(&mut chunk[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        chunk.truncate(filled);
        Ok(chunk)
    }
}

impl Demuxer for FileDemuxer {
    fn streams(&self) -> Vec<StreamInfo> {
        vec![self.stream.clone()]
    }

    fn read_packet(&mut self, buffers: &Arena<MediaBuffer>) -> ReadNext {
        let chunk = match self.read_chunk() {
            Ok(chunk) => chunk,
            Err(err) => {
                return ReadNext::Terminal(TerminalSignal::new(SignalKind::Io, err.to_string()));
            }
        };
        if chunk.is_empty() {
            return ReadNext::Terminal(TerminalSignal::eof());
        }

        let time_stamp = self.time_stamp();
        let key_frame = self.chunks == 0 || self.stream.media_type != MediaType::Video;
        let len = chunk.len() as u64;
        let packet = MediaData::new(
            buffers,
            MediaKind::Packet,
            self.stream.index,
            chunk,
            time_stamp,
            TimeUnit::Microseconds,
        )
        .with_key_frame(key_frame);
        self.chunks += 1;
        self.bytes += len;
        ReadNext::Packet(packet)
    }

    fn close(&mut self) -> Result<()> {
        self.file = None;
        Ok(())
    }
}

struct FileMuxer {
    url: String,
    writer: Option<BufWriter<File>>,
    streams: usize,
}

impl FileMuxer {
    fn writer(&mut self) -> Result<&mut BufWriter<File>> {
        self.writer
            .as_mut()
            .ok_or_else(|| Error::Backend(format!("output file \"{}\" is closed", self.url)))
    }
}

impl Muxer for FileMuxer {
    fn add_stream(&mut self, info: &StreamInfo) -> Result<usize> {
        if self.streams > 0 {
            tracing::warn!(
                url = %self.url,
                codec = %info.codec,
                "Raw output files interleave the payloads of all their streams"
            );
        }
        self.streams += 1;
        Ok(self.streams - 1)
    }

    fn write_header(&mut self) -> Result<()> {
        self.writer().map(|_| ())
    }

    fn write_packet(&mut self, packet: &MediaData) -> Result<()> {
        let payload = packet.data()?;
        self.writer()?.write_all(&payload)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer()?.flush()?;
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<()> {
        self.flush()
    }

    fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ferry::MemoryModel;

    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "mediatool-file-{name}-{}",
            uuid::Uuid::new_v4()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn probes_media_type_from_extension() {
        assert_eq!(probe(Path::new("a/clip.MP4")).media_type, MediaType::Video);
        assert_eq!(probe(Path::new("tone.wav")).media_type, MediaType::Audio);
        assert_eq!(probe(Path::new("blob.bin")).media_type, MediaType::Data);
        assert_eq!(probe(Path::new("noext")).codec, "raw");
        assert_eq!(probe(Path::new("clip.mp4")).codec, "mp4");
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        assert!(matches!(FileBackend::new(0), Err(Error::InvalidArgument(_))));
    }

    #[test]
    fn reads_fixed_chunks_then_eof() {
        let dir = temp_dir("chunks");
        let path = dir.join("clip.yuv");
        std::fs::write(&path, [7u8; 10]).unwrap();

        let backend = FileBackend::new(4).unwrap();
        let buffers = Arena::new(MemoryModel::MirroredHeap);
        let mut demuxer = backend
            .open_input(path.to_str().unwrap(), &ContainerOptions::default())
            .unwrap();

        let mut sizes = Vec::new();
        let mut stamps = Vec::new();
        loop {
            match demuxer.read_packet(&buffers) {
                ReadNext::Packet(packet) => {
                    sizes.push(packet.len().unwrap());
                    stamps.push(packet.time_stamp());
                }
                ReadNext::Terminal(signal) => {
                    assert!(signal.is_eof());
                    break;
                }
            }
        }
        assert_eq!(sizes, vec![4, 4, 2]);
        assert_eq!(stamps, vec![Some(0), Some(40_000), Some(80_000)]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn audio_timestamps_follow_bytes_read() {
        let dir = temp_dir("audio");
        let path = dir.join("tone.pcm");
        std::fs::write(&path, vec![0u8; 192_000]).unwrap();

        let backend = FileBackend::new(96_000).unwrap();
        let buffers = Arena::new(MemoryModel::MirroredHeap);
        let mut demuxer = backend
            .open_input(path.to_str().unwrap(), &ContainerOptions::default())
            .unwrap();
        let stamps: Vec<_> = (0..2)
            .map(|_| match demuxer.read_packet(&buffers) {
                ReadNext::Packet(packet) => packet.time_stamp(),
                ReadNext::Terminal(signal) => panic!("unexpected {signal}"),
            })
            .collect();
        assert_eq!(stamps, vec![Some(0), Some(500_000)]);
        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn missing_input_is_an_io_error() {
        let backend = FileBackend::default();
        let result = backend.open_input("/nonexistent/mediatool/input.bin", &ContainerOptions::default());
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn muxer_writes_payloads_in_order() {
        let dir = temp_dir("mux");
        let path = dir.join("out.bin");
        let backend = FileBackend::default();
        let buffers = Arena::new(MemoryModel::NativeOnly);

        let mut muxer = backend.open_output(path.to_str().unwrap()).unwrap();
        muxer.add_stream(&StreamInfo::data(0, "bin")).unwrap();
        muxer.write_header().unwrap();
        for chunk in [&b"abc"[..], &b"de"[..]] {
            let packet = MediaData::new(
                &buffers,
                MediaKind::Packet,
                0,
                chunk,
                None,
                TimeUnit::Microseconds,
            );
            muxer.write_packet(&packet).unwrap();
        }
        muxer.write_trailer().unwrap();
        muxer.close().unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"abcde");
        std::fs::remove_dir_all(dir).unwrap();
    }
}
