// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Memory-model policy for native buffers.
//!
//! The model decides whether native bytes are mirrored into owned heap memory on
//! every access or handed out as shared views of the native storage. The
//! process-wide switch only affects arenas created after it changes; components
//! already running keep the model they were built with.

use std::{
    fmt,
    ops::Deref,
    str::FromStr,
    sync::{
        Arc,
        atomic::{AtomicU8, Ordering},
    },
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

static PROCESS_MODEL: AtomicU8 = AtomicU8::new(MemoryModel::MirroredHeap as u8);

/// How native buffer bytes are exposed to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum MemoryModel {
    /// Copy the native bytes into owned heap memory on every access.
    ///
    /// Slower, but the returned data never aliases native storage.
    #[default]
    MirroredHeap = 0,

    /// Share the native storage without copying ("turbo" mode).
    ///
    /// Callers must release every handle they receive and copy any reference
    /// they want to keep past a callback; violations are not detected.
    NativeOnly = 1,
}

impl MemoryModel {
    /// Returns `true` for the no-copy ("turbo") model.
    pub fn is_native_only(self) -> bool {
        self == MemoryModel::NativeOnly
    }

    /// Produces an access view of native bytes according to this model.
    pub fn access(self, bytes: &Arc<[u8]>) -> BufferData {
        match self {
            MemoryModel::MirroredHeap => BufferData::Heap(bytes.to_vec()),
            MemoryModel::NativeOnly => BufferData::Native(bytes.clone()),
        }
    }

    fn from_u8(value: u8) -> Self {
        match value {
            1 => MemoryModel::NativeOnly,
            _ => MemoryModel::MirroredHeap,
        }
    }
}

impl fmt::Display for MemoryModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemoryModel::MirroredHeap => f.write_str("mirrored_heap"),
            MemoryModel::NativeOnly => f.write_str("native_only"),
        }
    }
}

impl FromStr for MemoryModel {
    type Err = Error;

    /// Parses a model name.
    ///
    /// Accepts `mirrored_heap` / `mirrored-heap` and `native_only` /
    /// `native-only` / `turbo`, case-insensitively.
    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "mirrored_heap" | "mirrored-heap" => Ok(MemoryModel::MirroredHeap),
            "native_only" | "native-only" | "turbo" => Ok(MemoryModel::NativeOnly),
            other => Err(Error::InvalidArgument(format!(
                "unknown memory model \"{other}\""
            ))),
        }
    }
}

/// Sets the process-wide memory model.
///
/// Only arenas created afterwards pick up the new model. Switching while other
/// components of the process rely on the previous model is the caller's
/// responsibility.
pub fn set_memory_model(model: MemoryModel) {
    let previous = PROCESS_MODEL.swap(model as u8, Ordering::SeqCst);
    if previous != model as u8 {
        tracing::debug!(%model, "Process-wide memory model changed");
    }
}

/// Returns the process-wide memory model.
pub fn memory_model() -> MemoryModel {
    MemoryModel::from_u8(PROCESS_MODEL.load(Ordering::SeqCst))
}

/// Bytes of a native buffer as handed out by a [`MemoryModel`].
#[derive(Debug, Clone)]
pub enum BufferData {
    /// An owned copy in heap memory.
    Heap(Vec<u8>),
    /// A shared view of the native storage.
    Native(Arc<[u8]>),
}

impl BufferData {
    /// Returns `true` if the bytes alias native storage.
    pub fn is_native(&self) -> bool {
        matches!(self, BufferData::Native(_))
    }

    /// Converts into an owned vector, copying only when the data is native.
    pub fn into_vec(self) -> Vec<u8> {
        match self {
            BufferData::Heap(bytes) => bytes,
            BufferData::Native(bytes) => bytes.to_vec(),
        }
    }
}

impl Deref for BufferData {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            BufferData::Heap(bytes) => bytes.as_slice(),
            BufferData::Native(bytes) => &bytes[..],
        }
    }
}

impl AsRef<[u8]> for BufferData {
    fn as_ref(&self) -> &[u8] {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mirrored_access_copies() {
        let native: Arc<[u8]> = Arc::from(vec![1u8, 2, 3]);
        let data = MemoryModel::MirroredHeap.access(&native);
        assert!(!data.is_native());
        assert_eq!(&*data, &[1, 2, 3]);
        assert_eq!(Arc::strong_count(&native), 1);
    }

    #[test]
    fn native_access_shares_storage() {
        let native: Arc<[u8]> = Arc::from(vec![4u8, 5]);
        let data = MemoryModel::NativeOnly.access(&native);
        assert!(data.is_native());
        assert_eq!(Arc::strong_count(&native), 2);
        assert_eq!(data.into_vec(), vec![4, 5]);
    }

    #[test]
    fn parses_model_names() {
        assert_eq!(
            "Native-Only".parse::<MemoryModel>().unwrap(),
            MemoryModel::NativeOnly
        );
        assert_eq!(
            "turbo".parse::<MemoryModel>().unwrap(),
            MemoryModel::NativeOnly
        );
        assert_eq!(
            "mirrored_heap".parse::<MemoryModel>().unwrap(),
            MemoryModel::MirroredHeap
        );
        assert!(matches!(
            "swap".parse::<MemoryModel>(),
            Err(Error::InvalidArgument(_))
        ));
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&MemoryModel::NativeOnly).unwrap();
        assert_eq!(json, "\"native_only\"");
        let model: MemoryModel = serde_json::from_str("\"mirrored_heap\"").unwrap();
        assert_eq!(model, MemoryModel::MirroredHeap);
    }
}
