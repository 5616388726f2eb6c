// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Arena storage and reference-counted handles.
//!
//! Resources live in arena slots carrying an explicit reference count. The only
//! mutators of that count are [`Arena::acquire`], [`Handle::copy_reference`] and
//! [`Handle::release`]; nothing outside this module can alias a slot.

use std::{
    fmt,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{Error, MemoryModel, Result};

/// Identifies one arena slot generation.
///
/// The generation changes every time a slot is freed, so ids of freed
/// resources never match a reused slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId {
    index: u32,
    generation: u32,
}

impl HandleId {
    /// Slot index inside the arena.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation of the slot when the resource was acquired.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    refs: usize,
    value: Option<T>,
}

struct ArenaInner<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    live: usize,
}

impl<T> ArenaInner<T> {
    fn slot(&self, id: HandleId) -> Option<&Slot<T>> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.value.is_some())
    }

    fn slot_mut(&mut self, id: HandleId) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation && slot.value.is_some())
    }
}

/// Storage for reference-counted resources of one type.
///
/// Cloning an arena is cheap and yields another view of the same storage.
pub struct Arena<T> {
    inner: Arc<Mutex<ArenaInner<T>>>,
    model: MemoryModel,
}

impl<T> Clone for Arena<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            model: self.model,
        }
    }
}

impl<T> Default for Arena<T> {
    /// Creates an arena using the current process-wide memory model.
    fn default() -> Self {
        Self::new(crate::memory_model())
    }
}

impl<T> fmt::Debug for Arena<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Arena")
            .field("model", &self.model)
            .field("live", &self.live_count())
            .finish()
    }
}

impl<T> Arena<T> {
    /// Creates an empty arena bound to `model`.
    pub fn new(model: MemoryModel) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ArenaInner {
                slots: Vec::new(),
                free: Vec::new(),
                live: 0,
            })),
            model,
        }
    }

    /// The memory model this arena was created with.
    pub fn memory_model(&self) -> MemoryModel {
        self.model
    }

    /// Number of resources currently alive in this arena.
    pub fn live_count(&self) -> usize {
        self.lock().live
    }

    /// Moves `value` into a new slot and returns its first owner.
    pub fn acquire(&self, value: T) -> Handle<T> {
        let mut inner = self.lock();
        let id = match inner.free.pop() {
            Some(index) => {
                let slot = &mut inner.slots[index as usize];
                slot.refs = 1;
                slot.value = Some(value);
                HandleId {
                    index,
                    generation: slot.generation,
                }
            }
            None => {
                let index = inner.slots.len() as u32;
                inner.slots.push(Slot {
                    generation: 0,
                    refs: 1,
                    value: Some(value),
                });
                HandleId {
                    index,
                    generation: 0,
                }
            }
        };
        inner.live += 1;
        drop(inner);

        tracing::trace!(handle = %id, "Acquired native resource");
        Handle {
            arena: self.clone(),
            id,
            released: false,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ArenaInner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A logical owner of one arena resource.
///
/// Handles are not `Clone`: sharing is explicit through [`Self::copy_reference`].
/// Dropping a handle that was not released releases it.
pub struct Handle<T> {
    arena: Arena<T>,
    id: HandleId,
    released: bool,
}

impl<T> Handle<T> {
    /// The slot id this handle points to.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// The memory model of the owning arena.
    pub fn memory_model(&self) -> MemoryModel {
        self.arena.model
    }

    /// Returns `true` while this handle still owns a live resource.
    pub fn is_open(&self) -> bool {
        !self.released && self.arena.lock().slot(self.id).is_some()
    }

    /// Creates a new owner of the same resource, incrementing the shared count.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterFree`] if this handle was released.
    pub fn copy_reference(&self) -> Result<Handle<T>> {
        self.ensure_open()?;
        let mut inner = self.arena.lock();
        let slot = inner
            .slot_mut(self.id)
            .ok_or(Error::UseAfterFree(self.id))?;
        slot.refs += 1;
        let refs = slot.refs;
        drop(inner);

        tracing::trace!(handle = %self.id, refs, "Copied native reference");
        Ok(Handle {
            arena: self.arena.clone(),
            id: self.id,
            released: false,
        })
    }

    /// Number of owners currently sharing the resource.
    pub fn ref_count(&self) -> Result<usize> {
        self.ensure_open()?;
        self.arena
            .lock()
            .slot(self.id)
            .map(|slot| slot.refs)
            .ok_or(Error::UseAfterFree(self.id))
    }

    /// Runs `f` with exclusive access to the resource.
    ///
    /// The arena is locked while `f` runs; `f` must not use handles of the
    /// same arena.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Result<R> {
        self.ensure_open()?;
        let mut inner = self.arena.lock();
        let value = inner
            .slot_mut(self.id)
            .and_then(|slot| slot.value.as_mut())
            .ok_or(Error::UseAfterFree(self.id))?;
        Ok(f(value))
    }

    /// Gives up this handle's ownership.
    ///
    /// The resource is dropped when the last owner releases it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UseAfterFree`] if this handle was already released.
    pub fn release(&mut self) -> Result<()> {
        self.ensure_open()?;
        self.released = true;

        let mut inner = self.arena.lock();
        let slot = inner
            .slot_mut(self.id)
            .ok_or(Error::UseAfterFree(self.id))?;
        slot.refs -= 1;
        let freed = if slot.refs == 0 {
            let value = slot.value.take();
            slot.generation = slot.generation.wrapping_add(1);
            inner.free.push(self.id.index);
            inner.live -= 1;
            value
        } else {
            None
        };
        drop(inner);

        // The resource may own handles of other arenas; drop it unlocked.
        if let Some(value) = freed {
            tracing::trace!(handle = %self.id, "Freed native resource");
            drop(value);
        }
        Ok(())
    }

    /// Same as [`Self::release`].
    pub fn close(&mut self) -> Result<()> {
        self.release()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.released {
            Err(Error::UseAfterFree(self.id))
        } else {
            Ok(())
        }
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.id)
            .field("released", &self.released)
            .finish()
    }
}

impl<T> Drop for Handle<T> {
    fn drop(&mut self) {
        if !self.released
            && let Err(err) = self.release()
        {
            tracing::error!("Failed to release native handle {}: {:?}", self.id, err);
        }
    }
}
