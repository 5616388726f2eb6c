// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Tool configuration.
//!
//! Configuration is read from JSON. Every field is optional; missing fields
//! take the defaults documented on each type.
//!
//! ```
//! use mediatool::config::ToolConfig;
//! use ferry::MemoryModel;
//!
//! # fn main() -> Result<(), mediatool::Error> {
//! let config = ToolConfig::from_json(r#"{
//!     "memory_model": "native_only",
//!     "reader": { "close_on_eof_only": true }
//! }"#)?;
//! assert_eq!(config.memory_model(), MemoryModel::NativeOnly);
//! assert!(config.reader.close_on_eof_only);
//! assert!(config.reader.query_metadata);
//! # Ok(())
//! # }
//! ```

use std::path::Path;

use ferry::MemoryModel;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Default chunk size, in bytes, of packets produced by the file backend.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// Top-level configuration of a media tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    /// Memory model for the pipeline; the process-wide model when omitted.
    pub memory_model: Option<MemoryModel>,
    /// Defaults applied to readers created by the tool factory.
    pub reader: ReaderConfig,
    /// Packet size used by the file backend.
    pub chunk_size: usize,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            memory_model: None,
            reader: ReaderConfig::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

impl ToolConfig {
    /// Parses configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        tracing::debug!(path = %path.as_ref().display(), ?config, "Loaded tool configuration");
        Ok(config)
    }

    /// Effective memory model.
    pub fn memory_model(&self) -> MemoryModel {
        self.memory_model.unwrap_or_else(ferry::memory_model)
    }
}

/// Reader options that must be fixed before the container opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReaderConfig {
    /// Whether new streams may appear after open. Default `false`.
    pub add_dynamic_streams: bool,
    /// Whether open blocks until all stream metadata is known. Default `true`.
    pub query_metadata: bool,
    /// Whether only end of file auto-closes the reader. Default `false`.
    pub close_on_eof_only: bool,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            add_dynamic_streams: false,
            query_metadata: true,
            close_on_eof_only: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_gives_defaults() {
        let config = ToolConfig::from_json("{}").unwrap();
        assert_eq!(config, ToolConfig::default());
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert!(!config.reader.add_dynamic_streams);
        assert!(config.reader.query_metadata);
        assert!(!config.reader.close_on_eof_only);
    }

    #[test]
    fn unknown_memory_model_is_rejected() {
        let err = ToolConfig::from_json(r#"{"memory_model": "swap"}"#).unwrap_err();
        assert!(matches!(err, crate::Error::Json(_)));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ToolConfig::from_json(
            r#"{"chunk_size": 188, "reader": {"add_dynamic_streams": true, "query_metadata": false}}"#,
        )
        .unwrap();
        assert_eq!(config.chunk_size, 188);
        assert!(config.reader.add_dynamic_streams);
        assert!(!config.reader.query_metadata);
        assert_eq!(config.memory_model, None);
    }
}
