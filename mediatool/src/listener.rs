// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! Listener registration and synchronous event dispatch.
//!
//! Generators dispatch every event to their listeners in registration order on
//! the calling thread. The first listener that returns an error stops the
//! dispatch of that event: later listeners do not see it, and the error is
//! returned to whoever triggered the event, wrapped in [`Error::Listener`].

use std::{cell::RefCell, rc::Rc};

use crate::{
    Error, Result,
    event::{
        AddStreamEvent, AudioSamplesEvent, CloseCoderEvent, CloseEvent, FlushEvent, GeneratorId,
        MediaEvent, OpenCoderEvent, OpenEvent, ReadPacketEvent, VideoPictureEvent,
        WriteHeaderEvent, WritePacketEvent, WriteTrailerEvent,
    },
};

/// Receives events from media generators.
///
/// Every method defaults to doing nothing, so listeners only implement the
/// events they care about.
#[allow(unused_variables)]
pub trait MediaListener {
    fn on_add_stream(&mut self, event: &AddStreamEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_open_coder(&mut self, event: &OpenCoderEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_close_coder(&mut self, event: &CloseCoderEvent) -> Result<()> {
        Ok(())
    }

    fn on_open(&mut self, event: &OpenEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_close(&mut self, event: &CloseEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_read_packet(&mut self, event: &ReadPacketEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_write_packet(&mut self, event: &WritePacketEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_write_header(&mut self, event: &WriteHeaderEvent) -> Result<()> {
        Ok(())
    }

    fn on_write_trailer(&mut self, event: &WriteTrailerEvent) -> Result<()> {
        Ok(())
    }

    fn on_flush(&mut self, event: &FlushEvent) -> Result<()> {
        Ok(())
    }

    fn on_video_picture(&mut self, event: &VideoPictureEvent<'_>) -> Result<()> {
        Ok(())
    }

    fn on_audio_samples(&mut self, event: &AudioSamplesEvent<'_>) -> Result<()> {
        Ok(())
    }
}

/// A listener shared between its owner and the generators it is registered with.
pub type ListenerRef = Rc<RefCell<dyn MediaListener>>;

/// Wraps `listener` for registration.
///
/// The returned `Rc` keeps the concrete type, so the caller can still inspect
/// the listener after handing clones of it to generators.
pub fn shared<L: MediaListener + 'static>(listener: L) -> Rc<RefCell<L>> {
    Rc::new(RefCell::new(listener))
}

fn same_listener<L: ?Sized>(registered: &ListenerRef, candidate: &Rc<RefCell<L>>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(registered), Rc::as_ptr(candidate))
}

/// Ordered set of listeners.
#[derive(Default)]
pub struct ListenerChain {
    listeners: Vec<ListenerRef>,
}

impl ListenerChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener`. Returns `false` if it is already registered.
    pub fn add(&mut self, listener: ListenerRef) -> bool {
        if self
            .listeners
            .iter()
            .any(|registered| same_listener(registered, &listener))
        {
            return false;
        }
        self.listeners.push(listener);
        true
    }

    /// Removes `listener`. Returns `false` if it was not registered.
    pub fn remove<L: MediaListener + ?Sized>(&mut self, listener: &Rc<RefCell<L>>) -> bool {
        let before = self.listeners.len();
        self.listeners
            .retain(|registered| !same_listener(registered, listener));
        self.listeners.len() != before
    }

    pub fn listeners(&self) -> &[ListenerRef] {
        &self.listeners
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Delivers `event` to every listener in order, stopping at the first error.
    ///
    /// # Errors
    ///
    /// [`Error::ListenerBusy`] if a listener is still handling another event,
    /// or [`Error::Listener`] wrapping the error a listener returned.
    pub fn dispatch(&self, event: &MediaEvent<'_>) -> Result<()> {
        let kind = event.kind();
        for (position, listener) in self.listeners.iter().enumerate() {
            let mut listener = listener.try_borrow_mut().map_err(|_| Error::ListenerBusy)?;
            tracing::trace!(%kind, source = %event.source(), position, "Dispatching event");
            event
                .dispatch_to(&mut *listener)
                .map_err(|source| Error::Listener {
                    kind,
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for ListenerChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerChain")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

/// A source of media events.
pub trait MediaGenerator {
    /// Identity stamped on every event this generator emits.
    fn id(&self) -> GeneratorId;

    fn listener_chain(&self) -> &ListenerChain;

    fn listener_chain_mut(&mut self) -> &mut ListenerChain;

    /// Registers `listener` after the existing ones.
    ///
    /// Returns `false`, leaving the chain unchanged, if it is already registered.
    ///
    /// # Errors
    ///
    /// A listener may be registered on several generators. If one of them
    /// dispatches to it while it is still handling an event from another
    /// (its callback made the other generator emit an event), that dispatch
    /// fails with [`crate::Error::ListenerBusy`] instead of re-entering the
    /// listener.
    fn add_listener(&mut self, listener: ListenerRef) -> bool {
        self.listener_chain_mut().add(listener)
    }

    /// Unregisters `listener`. Returns `false` if it was not registered.
    fn remove_listener<L: MediaListener + ?Sized>(&mut self, listener: &Rc<RefCell<L>>) -> bool
    where
        Self: Sized,
    {
        self.listener_chain_mut().remove(listener)
    }

    fn listeners(&self) -> &[ListenerRef] {
        self.listener_chain().listeners()
    }
}
