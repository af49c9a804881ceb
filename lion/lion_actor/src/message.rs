//! Message payloads and mailbox envelopes.
//!
//! Messages are immutable, type-erased payloads shared behind an `Arc`, so a
//! message can be forwarded or mirrored into a reply without copying it.
//! An [`Envelope`] pairs a message with the [`ReplyChannel`] it was sent with
//! and is handed to the actor's handler explicitly.

use std::any::{type_name, Any};
use std::fmt;
use std::sync::Arc;

use crate::actor::{ActorRef, ReplyChannel};
use crate::error::{ActorError, Result};

/// An immutable, opaque message payload.
#[derive(Clone)]
pub struct Message {
    payload: Arc<dyn Any + Send + Sync>,
    type_name: &'static str,
}

impl Message {
    /// Wrap a payload. Wrapping a `Message` returns that same message.
    pub fn new<M: Any + Send + Sync>(payload: M) -> Self {
        if let Some(message) = (&payload as &dyn Any).downcast_ref::<Message>() {
            return message.clone();
        }

        Self {
            payload: Arc::new(payload),
            type_name: type_name::<M>(),
        }
    }

    /// Check whether the payload is of type `M`.
    pub fn is<M: Any>(&self) -> bool {
        self.payload.is::<M>()
    }

    /// Borrow the payload as `M`, if it has that type.
    pub fn downcast_ref<M: Any>(&self) -> Option<&M> {
        self.payload.downcast_ref::<M>()
    }

    /// Take shared ownership of the payload as `M`.
    ///
    /// On a type mismatch the original message is handed back.
    pub fn downcast<M: Any + Send + Sync>(self) -> std::result::Result<Arc<M>, Message> {
        let type_name = self.type_name;
        self.payload
            .downcast::<M>()
            .map_err(|payload| Message { payload, type_name })
    }

    /// Name of the payload type, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("type", &self.type_name)
            .finish()
    }
}

/// Stops the receiving actor once every message queued ahead of it is handled.
///
/// The pill itself is never passed to the actor's handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoisonPill;

/// Status message sent to an actor channel when a failure is reported through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure(pub ActorError);

/// A message together with the channel its reply should travel through.
#[derive(Clone, Debug)]
pub struct Envelope {
    message: Message,
    sender: ReplyChannel,
}

impl Envelope {
    /// Create an envelope for `message` replying through `sender`.
    pub fn new(message: Message, sender: ReplyChannel) -> Self {
        Self { message, sender }
    }

    /// The message payload.
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// The channel a reply to this message should be delivered through.
    pub fn sender(&self) -> &ReplyChannel {
        &self.sender
    }

    /// Split the envelope into its message and reply channel.
    pub fn into_parts(self) -> (Message, ReplyChannel) {
        (self.message, self.sender)
    }

    /// Reply through the bound channel, failing if there is none.
    pub fn reply<M: Any + Send + Sync>(&self, reply: M) -> Result<()> {
        self.sender.reply(reply)
    }

    /// Reply through the bound channel, reporting delivery as a flag.
    pub fn try_reply<M: Any + Send + Sync>(&self, reply: M) -> bool {
        self.sender.try_reply(reply)
    }

    /// Report a failure through the bound channel.
    pub fn reply_failure(&self, error: ActorError) -> Result<()> {
        self.sender.fail(error)
    }

    /// Relay this message to `target`, keeping the original reply channel.
    pub fn forward(&self, target: &ActorRef) -> Result<()> {
        target.tell(self.message.clone(), self.sender.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_downcast() {
        let message = Message::new(String::from("ping"));

        assert!(message.is::<String>());
        assert!(!message.is::<u32>());
        assert_eq!(message.downcast_ref::<String>().unwrap(), "ping");
        assert!(message.type_name().ends_with("String"));

        let value = message.downcast::<String>().unwrap();
        assert_eq!(value.as_str(), "ping");
    }

    #[test]
    fn test_message_downcast_mismatch_returns_message() {
        let message = Message::new(7u32);

        let message = message.downcast::<String>().unwrap_err();
        assert_eq!(*message.downcast_ref::<u32>().unwrap(), 7);
    }

    #[test]
    fn test_wrapping_message_is_identity() {
        let message = Message::new(42u64);
        let wrapped = Message::new(message.clone());

        assert!(wrapped.is::<u64>());
        assert!(!wrapped.is::<Message>());
    }

    #[test]
    fn test_envelope_without_sender() {
        let envelope = Envelope::new(Message::new("hello"), ReplyChannel::None);

        assert!(matches!(envelope.reply("world"), Err(ActorError::NoReplyTarget)));
        assert!(!envelope.try_reply("world"));
        assert!(envelope.sender().is_none());
    }
}
