// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Entry point for building pipelines.

use std::sync::Arc;

use ferry::MemoryModel;

use crate::{
    Container, EventKind, MediaContext, Result,
    adapter::MediaToolAdapter,
    backend::MediaBackend,
    config::{ReaderConfig, ToolConfig},
    debug::{DebugMode, MediaDebugListener},
    reader::MediaReader,
    writer::MediaWriter,
};

/// Creates readers, writers and listeners sharing one context and backend.
///
/// ```
/// use std::sync::Arc;
///
/// use mediatool::{
///     MediaContext, ToolFactory,
///     backend::{StreamInfo, memory::{MemoryBackend, MemorySource}},
/// };
///
/// # fn main() -> Result<(), mediatool::Error> {
/// let backend = MemoryBackend::new();
/// backend.add_source(
///     "mem://clip",
///     MemorySource::new()
///         .with_stream(StreamInfo::video(0, "raw"))
///         .packet(0, b"frame", Some(0)),
/// );
/// let factory = ToolFactory::new(MediaContext::default(), Arc::new(backend));
/// let mut reader = factory.make_reader("mem://clip")?;
/// while reader.read_packet()?.is_none() {}
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct ToolFactory {
    context: MediaContext,
    backend: Arc<dyn MediaBackend>,
    reader: ReaderConfig,
}

impl ToolFactory {
    pub fn new(context: MediaContext, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            context,
            backend,
            reader: ReaderConfig::default(),
        }
    }

    /// Creates a factory whose context and reader defaults come from `config`.
    pub fn from_config(config: &ToolConfig, backend: Arc<dyn MediaBackend>) -> Self {
        Self {
            context: MediaContext::from_config(config),
            backend,
            reader: config.reader,
        }
    }

    pub fn context(&self) -> &MediaContext {
        &self.context
    }

    pub fn backend(&self) -> Arc<dyn MediaBackend> {
        self.backend.clone()
    }

    /// Reader defaults applied by [`Self::make_reader`].
    pub fn reader_config(&self) -> ReaderConfig {
        self.reader
    }

    /// Creates a reader for `url` with the factory's reader defaults.
    pub fn make_reader(&self, url: impl Into<String>) -> Result<MediaReader> {
        let mut reader = MediaReader::new(&self.context, self.backend.clone(), url);
        reader.set_add_dynamic_streams(self.reader.add_dynamic_streams)?;
        reader.set_query_metadata(self.reader.query_metadata)?;
        reader.set_close_on_eof_only(self.reader.close_on_eof_only)?;
        Ok(reader)
    }

    /// Creates a reader for an existing input container.
    pub fn make_reader_from_container(&self, container: &Container) -> Result<MediaReader> {
        MediaReader::from_container(container)
    }

    /// Creates a writer for `url` copying the streams of `reader`.
    pub fn make_writer(&self, url: impl Into<String>, reader: &MediaReader) -> Result<MediaWriter> {
        MediaWriter::from_reader(url, reader)
    }

    /// Creates a writer for `url` copying the streams of the input `container`.
    pub fn make_writer_from_container(
        &self,
        url: impl Into<String>,
        container: &Container,
    ) -> Result<MediaWriter> {
        MediaWriter::from_container(url, container)
    }

    /// Creates a writer for `url` whose streams are added by the caller.
    pub fn make_blank_writer(&self, url: impl Into<String>) -> MediaWriter {
        MediaWriter::new(&self.context, self.backend.clone(), url)
    }

    /// Creates a listener logging the metadata of every event.
    pub fn make_debug_listener(&self) -> MediaDebugListener {
        MediaDebugListener::all("debug", DebugMode::MetaData)
    }

    pub fn make_debug_listener_with(
        &self,
        name: impl Into<String>,
        mode: DebugMode,
        events: impl IntoIterator<Item = EventKind>,
    ) -> MediaDebugListener {
        MediaDebugListener::new(name, mode, events)
    }

    pub fn make_tool_adapter(&self) -> MediaToolAdapter {
        MediaToolAdapter::new()
    }

    /// Switches the process-wide memory model.
    ///
    /// Turbo-charged mode never copies native buffers into owned memory. Only
    /// contexts created after the call are affected.
    pub fn set_turbo_charged(value: bool) {
        let model = if value {
            MemoryModel::NativeOnly
        } else {
            MemoryModel::MirroredHeap
        };
        tracing::debug!(%model, "Switching process-wide memory model");
        ferry::set_memory_model(model);
    }

    pub fn is_turbo_charged() -> bool {
        ferry::memory_model().is_native_only()
    }
}

impl std::fmt::Debug for ToolFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolFactory")
            .field("context", &self.context)
            .field("reader", &self.reader)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backend::{StreamInfo, memory::{MemoryBackend, MemorySource}},
        coder::MediaCoder,
        reader::ReaderState,
    };

    #[test]
    fn reader_defaults_come_from_config() {
        let config = ToolConfig::from_json(
            r#"{"memory_model": "native_only", "reader": {"close_on_eof_only": true, "query_metadata": false}}"#,
        )
        .unwrap();
        let backend = MemoryBackend::new();
        backend.add_source("mem://in", MemorySource::new().with_stream(StreamInfo::data(0, "bin")));
        let factory = ToolFactory::from_config(&config, Arc::new(backend));

        let reader = factory.make_reader("mem://in").unwrap();
        assert!(reader.will_close_on_eof_only());
        assert!(!reader.will_query_metadata().unwrap());
        assert!(!reader.can_add_dynamic_streams().unwrap());
        assert_eq!(reader.state(), ReaderState::Unopened);
        assert_eq!(factory.context().memory_model(), MemoryModel::NativeOnly);
    }

    #[test]
    fn writers_share_the_reader_context() {
        let backend = MemoryBackend::new();
        backend.add_source("mem://in", MemorySource::new().with_stream(StreamInfo::data(0, "bin")));
        let factory = ToolFactory::new(MediaContext::new(MemoryModel::MirroredHeap), Arc::new(backend));
        let reader = factory.make_reader("mem://in").unwrap();
        let writer = factory.make_writer("mem://out", &reader).unwrap();
        assert_eq!(writer.url(), "mem://out");
        assert_eq!(factory.context().live_containers(), 2);

        let blank = factory.make_blank_writer("mem://blank");
        assert!(!blank.is_open());
    }
}
