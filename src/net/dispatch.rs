//! Typed dispatch table: inbound tag → ordered listener list.
//!
//! Listeners take the context mutably plus the message, so a handler is a
//! plain reducer step over whatever state the table is instantiated for.
//! Several listeners may share a tag; they run in registration order. A
//! failing listener does not stop the others. Errors are collected and
//! handed back, and the caller decides how to report them.

#[cfg(test)]
#[path = "dispatch_test.rs"]
mod dispatch_test;

use std::collections::HashMap;
use std::fmt;

use tracing::debug;

use crate::error::SyncError;
use crate::net::types::{Inbound, InboundKind};

/// A registered handler.
pub type Listener<C> = Box<dyn FnMut(&mut C, &Inbound) -> Result<(), SyncError> + Send>;

/// Token returned by [`Dispatcher::on`], used to remove the listener again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub struct Dispatcher<C> {
    listeners: HashMap<InboundKind, Vec<(ListenerId, Listener<C>)>>,
    next_id: u64,
}

impl<C> Default for Dispatcher<C> {
    fn default() -> Self {
        Self { listeners: HashMap::new(), next_id: 0 }
    }
}

impl<C> fmt::Debug for Dispatcher<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut counts: Vec<_> = self.listeners.iter().map(|(kind, list)| (kind.as_str(), list.len())).collect();
        counts.sort_unstable();
        f.debug_struct("Dispatcher").field("listeners", &counts).finish()
    }
}

impl<C> Dispatcher<C> {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `kind`, after any already registered.
    pub fn on<F>(&mut self, kind: InboundKind, listener: F) -> ListenerId
    where
        F: FnMut(&mut C, &Inbound) -> Result<(), SyncError> + Send + 'static,
    {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.entry(kind).or_default().push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered.
    pub fn off(&mut self, id: ListenerId) -> bool {
        let mut removed = false;
        self.listeners.retain(|_, list| {
            let before = list.len();
            list.retain(|(candidate, _)| *candidate != id);
            removed |= list.len() != before;
            !list.is_empty()
        });
        removed
    }

    #[must_use]
    pub fn listener_count(&self, kind: InboundKind) -> usize {
        self.listeners.get(&kind).map_or(0, Vec::len)
    }

    /// Run every listener for the message's tag. Returns the errors raised,
    /// in listener order; an empty vec means every listener succeeded or none
    /// were registered.
    pub fn dispatch(&mut self, ctx: &mut C, message: &Inbound) -> Vec<SyncError> {
        let kind = message.kind();
        let Some(list) = self.listeners.get_mut(&kind) else {
            debug!(kind = kind.as_str(), "dispatch: no listeners");
            return Vec::new();
        };
        let mut errors = Vec::new();
        for (_, listener) in list.iter_mut() {
            if let Err(e) = listener(&mut *ctx, message) {
                errors.push(e);
            }
        }
        errors
    }
}
