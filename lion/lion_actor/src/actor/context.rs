//! What a handler can reach while it processes a message.

use std::sync::Arc;

use super::cell::ActorCell;
use super::{ActorRef, ActorSystem};
use crate::error::{ActorError, Result};

/// Handler-side view of the running actor.
///
/// The reply channel is not part of the context; it travels with the
/// [`Envelope`](crate::message::Envelope) handed to the handler.
pub struct ActorContext<'a> {
    cell: &'a Arc<ActorCell>,
}

impl<'a> ActorContext<'a> {
    pub(crate) fn new(cell: &'a Arc<ActorCell>) -> Self {
        Self { cell }
    }

    /// Reference to the running actor itself
    pub fn myself(&self) -> ActorRef {
        ActorRef::from_cell(Arc::clone(self.cell))
    }

    /// Identifier of the running actor
    pub fn id(&self) -> &str {
        self.cell.id()
    }

    /// Stop this actor once the current message has been handled.
    ///
    /// Messages still queued are not handled; pending requests among them fail.
    pub fn stop(&self) {
        self.cell.request_stop();
    }

    /// The actor system this actor belongs to, unless it has been dropped
    pub fn system(&self) -> Option<ActorSystem> {
        self.cell.system()
    }

    /// Resolve another actor by identifier
    pub fn lookup(&self, id: &str) -> Result<ActorRef> {
        match self.system() {
            Some(system) => system.lookup(id),
            None => Err(ActorError::ActorNotFound(id.to_string())),
        }
    }
}
