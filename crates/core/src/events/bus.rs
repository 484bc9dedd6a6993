//! Write event bus.
//!
//! Each event kind has at most one listener, so every mutation has exactly
//! one handler: the transaction that is currently open. A bus is created per
//! transaction and dropped with it.

use std::collections::HashMap;

use crate::error::{OdmError, Result};

use super::{WriteEvent, WriteEventKind};

/// Handler of one event kind.
pub type Listener<'a> = Box<dyn FnMut(&WriteEvent) -> Result<()> + 'a>;

/// Single-listener-per-kind publish mechanism.
#[derive(Default)]
pub struct WriteEventBus<'a> {
    listeners: HashMap<WriteEventKind, Listener<'a>>,
}

impl<'a> WriteEventBus<'a> {
    pub fn new() -> Self {
        Self {
            listeners: HashMap::new(),
        }
    }

    /// Sets the listener of `kind`.
    ///
    /// # Errors
    /// `MaxListenerExceeded` if `kind` already has a listener.
    pub fn on<F>(&mut self, kind: WriteEventKind, listener: F) -> Result<()>
    where
        F: FnMut(&WriteEvent) -> Result<()> + 'a,
    {
        if self.listeners.contains_key(&kind) {
            return Err(OdmError::MaxListenerExceeded(kind));
        }
        self.listeners.insert(kind, Box::new(listener));
        Ok(())
    }

    /// Delivers `event` to the listener of its kind.
    ///
    /// Returns `false` when nobody listens, so callers can detect mutations
    /// made outside an open transaction.
    pub fn emit(&mut self, event: &WriteEvent) -> Result<bool> {
        match self.listeners.get_mut(&event.kind()) {
            Some(listener) => listener(event).map(|()| true),
            None => Ok(false),
        }
    }

    pub fn listener_count(&self, kind: WriteEventKind) -> usize {
        usize::from(self.listeners.contains_key(&kind))
    }

    pub fn remove_all_listeners(&mut self) {
        self.listeners.clear();
    }
}
