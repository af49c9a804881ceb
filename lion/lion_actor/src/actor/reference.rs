//! Actor references and the dispatch operations callers use on them.
//!
//! | Operation | Blocks | Channel handed to the target |
//! |---|---|---|
//! | [`ActorRef::tell`] / [`ActorRef::send`] | no | the caller's, or none |
//! | [`ActorRef::ask`] | up to the timeout | a fresh promise |
//! | [`ActorRef::ask_future`] | no | a fresh promise paired with the returned future |
//! | [`ActorRef::forward`] | no | the original channel of the envelope being relayed |

use std::any::{type_name, Any};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cell::{ActorCell, ActorStats, ActorStatus};
use super::ReplyChannel;
use crate::error::{ActorError, Result};
use crate::future::ActorFuture;
use crate::message::{Envelope, Message};

/// Handle to exactly one actor. Cheap to clone.
#[derive(Clone)]
pub struct ActorRef {
    cell: Arc<ActorCell>,
}

impl ActorRef {
    pub(crate) fn from_cell(cell: Arc<ActorCell>) -> Self {
        Self { cell }
    }

    pub(crate) fn cell(&self) -> &Arc<ActorCell> {
        &self.cell
    }

    /// Identifier the actor is registered under
    pub fn id(&self) -> &str {
        self.cell.id()
    }

    /// Current lifecycle state
    pub fn status(&self) -> ActorStatus {
        self.cell.status()
    }

    /// Counters for messages handled, failures and restarts
    pub fn stats(&self) -> ActorStats {
        self.cell.stats()
    }

    /// Number of envelopes waiting in the mailbox
    pub fn mailbox_len(&self) -> usize {
        self.cell.mailbox_len()
    }

    /// Start consuming messages. Starting a started actor is a no-op.
    pub fn start(&self) -> Result<()> {
        self.cell.start()
    }

    /// Stop the actor after the message it is currently handling.
    ///
    /// Queued messages are not handled; requests among them fail with
    /// [`ActorError::MailboxClosed`].
    pub fn stop(&self) {
        self.cell.request_stop();
    }

    /// Future completed once the actor has stopped
    pub fn termination(&self) -> ActorFuture {
        self.cell.termination()
    }

    /// Fire-and-forget send with an explicit reply channel.
    pub fn tell<M: Any + Send + Sync>(
        &self,
        message: M,
        sender: impl Into<ReplyChannel>,
    ) -> Result<()> {
        self.cell
            .enqueue(Envelope::new(Message::new(message), sender.into()))
    }

    /// Fire-and-forget send with no reply channel.
    pub fn send<M: Any + Send + Sync>(&self, message: M) -> Result<()> {
        self.tell(message, ReplyChannel::None)
    }

    /// Send a request and return a future for its reply.
    ///
    /// The future expires once `timeout` has elapsed without a reply.
    pub fn ask_future<M: Any + Send + Sync>(
        &self,
        message: M,
        timeout: Duration,
    ) -> Result<ActorFuture> {
        let (promise, future) = ActorFuture::linked(
            Instant::now().checked_add(timeout),
            Some(Arc::clone(self.cell.pool())),
        );
        self.tell(message, promise)?;
        Ok(future)
    }

    /// Send a request and block until the reply arrives or `timeout` elapses.
    ///
    /// Fails with [`ActorError::Timeout`] if no reply came in time, or with the
    /// failure the target reported. Asking the calling actor itself from inside
    /// its own handler can only time out.
    pub fn ask<M: Any + Send + Sync>(&self, message: M, timeout: Duration) -> Result<Message> {
        self.ask_future(message, timeout)?.wait(timeout)
    }

    /// Like [`ask`](Self::ask), downcasting the reply to `R`.
    pub fn ask_as<R: Any + Send + Sync>(
        &self,
        message: impl Any + Send + Sync,
        timeout: Duration,
    ) -> Result<Arc<R>> {
        let reply = self.ask(message, timeout)?;
        let actual = reply.type_name();
        reply
            .downcast::<R>()
            .map_err(|_| ActorError::UnexpectedReply {
                expected: type_name::<R>(),
                actual,
            })
    }

    /// Relay an envelope to this actor, keeping its original reply channel.
    pub fn forward(&self, envelope: &Envelope) -> Result<()> {
        envelope.forward(self)
    }
}

impl PartialEq for ActorRef {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl Eq for ActorRef {}

impl Hash for ActorRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        Arc::as_ptr(&self.cell).hash(state);
    }
}

impl fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorRef")
            .field("id", &self.id())
            .field("status", &self.status())
            .finish()
    }
}
