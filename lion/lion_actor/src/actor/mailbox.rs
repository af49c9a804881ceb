//! Actor mailbox implementation for message passing.
//!
//! A mailbox is an unbounded FIFO of envelopes. Any thread may enqueue; only
//! the owning actor's processing loop dequeues. Closing the mailbox rejects
//! further enqueues and wakes a consumer blocked in [`Mailbox::dequeue_blocking`].

use crossbeam_channel::{unbounded, Receiver, Sender, TryRecvError};
use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

use super::ActorId;
use crate::message::Envelope;

/// Error when sending a message to a mailbox
#[derive(Error, Debug)]
pub enum MailboxError {
    /// The mailbox has been closed because the actor is stopped
    #[error("mailbox is closed")]
    Closed(Envelope),
}

impl MailboxError {
    /// Recover the envelope that could not be enqueued
    pub fn into_envelope(self) -> Envelope {
        match self {
            Self::Closed(envelope) => envelope,
        }
    }
}

/// Result of a non-blocking dequeue
#[derive(Debug)]
pub enum Dequeued {
    /// The next envelope in FIFO order
    Letter(Envelope),
    /// Nothing queued right now
    Empty,
    /// The mailbox was closed and everything before the close was consumed
    Closed,
}

enum Signal {
    Letter(Envelope),
    Close,
}

/// An actor's message queue
pub struct Mailbox {
    sender: Sender<Signal>,
    receiver: Receiver<Signal>,
    // Held for reading while enqueueing so no letter can land behind the close marker
    closed: RwLock<bool>,
    // Close marker sent but not yet taken off the queue
    marker_queued: AtomicBool,
    actor_id: ActorId,
}

impl Mailbox {
    /// Create a new, open mailbox for the given actor
    pub fn new(actor_id: impl Into<ActorId>) -> Self {
        let (sender, receiver) = unbounded();
        Self {
            sender,
            receiver,
            closed: RwLock::new(false),
            marker_queued: AtomicBool::new(false),
            actor_id: actor_id.into(),
        }
    }

    /// Append an envelope. Never blocks waiting for the consumer.
    pub fn enqueue(&self, envelope: Envelope) -> Result<(), MailboxError> {
        let closed = self.closed.read();
        if *closed {
            return Err(MailboxError::Closed(envelope));
        }
        // Both channel ends live in `self`, so the send cannot fail.
        let _ = self.sender.send(Signal::Letter(envelope));
        Ok(())
    }

    /// Block until an envelope is available.
    ///
    /// Returns `None` once the mailbox has been closed and every envelope
    /// queued before the close has been consumed.
    pub fn dequeue_blocking(&self) -> Option<Envelope> {
        match self.receiver.recv() {
            Ok(Signal::Letter(envelope)) => Some(envelope),
            Ok(Signal::Close) => {
                self.marker_queued.store(false, Ordering::Release);
                None
            }
            Err(_) => None,
        }
    }

    /// Take the next envelope without blocking.
    pub fn try_dequeue(&self) -> Dequeued {
        match self.receiver.try_recv() {
            Ok(Signal::Letter(envelope)) => Dequeued::Letter(envelope),
            Ok(Signal::Close) => {
                self.marker_queued.store(false, Ordering::Release);
                Dequeued::Closed
            }
            Err(TryRecvError::Empty) => Dequeued::Empty,
            Err(TryRecvError::Disconnected) => Dequeued::Closed,
        }
    }

    /// Close the mailbox. Returns `true` if this call closed it.
    pub fn close(&self) -> bool {
        let mut closed = self.closed.write();
        if *closed {
            return false;
        }
        *closed = true;
        self.marker_queued.store(true, Ordering::Release);
        let _ = self.sender.send(Signal::Close);
        true
    }

    /// Remove every envelope still queued.
    pub fn drain(&self) -> Vec<Envelope> {
        self.receiver
            .try_iter()
            .filter_map(|signal| match signal {
                Signal::Letter(envelope) => Some(envelope),
                Signal::Close => {
                    self.marker_queued.store(false, Ordering::Release);
                    None
                }
            })
            .collect()
    }

    /// Whether the mailbox rejects new envelopes
    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    /// Number of queued envelopes
    pub fn len(&self) -> usize {
        let marker = usize::from(self.marker_queued.load(Ordering::Acquire));
        self.receiver.len().saturating_sub(marker)
    }

    /// Whether no envelope is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the actor ID associated with this mailbox
    pub fn actor_id(&self) -> &str {
        &self.actor_id
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("actor_id", &self.actor_id)
            .field("len", &self.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ReplyChannel;
    use crate::message::Message;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn letter(n: u32) -> Envelope {
        Envelope::new(Message::new(n), ReplyChannel::None)
    }

    fn value(envelope: &Envelope) -> u32 {
        *envelope.message().downcast_ref::<u32>().unwrap()
    }

    #[test]
    fn test_mailbox_fifo() {
        let mailbox = Mailbox::new("test-actor");

        for n in 0..5 {
            mailbox.enqueue(letter(n)).unwrap();
        }
        assert_eq!(mailbox.len(), 5);

        for n in 0..5 {
            match mailbox.try_dequeue() {
                Dequeued::Letter(envelope) => assert_eq!(value(&envelope), n),
                other => panic!("unexpected dequeue result: {:?}", other),
            }
        }
        assert!(matches!(mailbox.try_dequeue(), Dequeued::Empty));
    }

    #[test]
    fn test_mailbox_closed_rejects() {
        let mailbox = Mailbox::new("test-actor");

        assert!(mailbox.close());
        assert!(!mailbox.close());
        // The close marker is not an envelope
        assert_eq!(mailbox.len(), 0);
        assert!(mailbox.is_empty());

        let result = mailbox.enqueue(letter(1));
        let envelope = match result {
            Err(error) => error.into_envelope(),
            Ok(()) => panic!("enqueue on a closed mailbox succeeded"),
        };
        assert_eq!(value(&envelope), 1);
    }

    #[test]
    fn test_close_after_letters_keeps_order() {
        let mailbox = Mailbox::new("test-actor");

        mailbox.enqueue(letter(1)).unwrap();
        mailbox.close();
        assert_eq!(mailbox.len(), 1);

        assert!(matches!(mailbox.try_dequeue(), Dequeued::Letter(_)));
        assert!(matches!(mailbox.try_dequeue(), Dequeued::Closed));
        assert_eq!(mailbox.len(), 0);
    }

    #[test]
    fn test_drain_returns_pending_letters() {
        let mailbox = Mailbox::new("test-actor");

        mailbox.enqueue(letter(1)).unwrap();
        mailbox.enqueue(letter(2)).unwrap();
        mailbox.close();

        let drained: Vec<u32> = mailbox.drain().iter().map(value).collect();
        assert_eq!(drained, vec![1, 2]);
        assert!(mailbox.is_empty());
    }

    #[test]
    fn test_dequeue_blocking_wakes_on_close() {
        let mailbox = Arc::new(Mailbox::new("test-actor"));

        let consumer = {
            let mailbox = mailbox.clone();
            thread::spawn(move || {
                let mut seen = Vec::new();
                while let Some(envelope) = mailbox.dequeue_blocking() {
                    seen.push(value(&envelope));
                }
                seen
            })
        };

        mailbox.enqueue(letter(7)).unwrap();
        thread::sleep(Duration::from_millis(20));
        mailbox.close();

        assert_eq!(consumer.join().unwrap(), vec![7]);
    }
}
