// SPDX-FileCopyrightText: 2025 2025 Contributors to the Media eXchange Layer project.
// SPDX-License-Identifier: Apache-2.0

//! State and behavior shared by readers and writers.

use crate::{Container, Result};

/// URL and container ownership of a coder.
///
/// The coder holds its own reference to the container. Whether it also
/// closes the container when it closes is tracked separately: a coder only
/// closes containers it opened itself, unless told otherwise.
#[derive(Debug)]
pub struct CoderState {
    url: String,
    container: Container,
    close_container: bool,
}

impl CoderState {
    pub fn new(url: impl Into<String>, container: Container) -> Self {
        Self {
            url: url.into(),
            container,
            close_container: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The coder's own container reference.
    pub(crate) fn container_ref(&self) -> &Container {
        &self.container
    }

    pub fn should_close_container(&self) -> bool {
        self.close_container
    }

    pub fn set_should_close_container(&mut self, value: bool) {
        self.close_container = value;
    }

    /// Closes the container if this coder is responsible for it and it is open.
    pub(crate) fn close_container_if_owned(&self) -> Result<()> {
        if self.close_container && self.container.is_open() {
            self.container.close()?;
        }
        Ok(())
    }
}

/// A reader or writer bound to one container.
pub trait MediaCoder {
    fn coder_state(&self) -> &CoderState;

    fn coder_state_mut(&mut self) -> &mut CoderState;

    /// Opens the container and announces it to listeners.
    fn open(&mut self) -> Result<()>;

    /// Closes codecs, the container if owned, and announces it to listeners.
    fn close(&mut self) -> Result<()>;

    fn url(&self) -> &str {
        self.coder_state().url()
    }

    /// A new reference to the coder's container.
    ///
    /// The caller owns the returned handle; releasing it does not affect the coder.
    fn container(&self) -> Result<Container> {
        self.coder_state().container.copy_reference()
    }

    fn is_open(&self) -> bool {
        self.coder_state().container.is_open()
    }

    fn should_close_container(&self) -> bool {
        self.coder_state().should_close_container()
    }

    fn set_should_close_container(&mut self, value: bool) {
        self.coder_state_mut().set_should_close_container(value);
    }
}
