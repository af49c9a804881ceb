//! Reply channels: where the reply to a message goes.

use log::trace;
use std::any::Any;

use super::ActorRef;
use crate::error::{ActorError, Result};
use crate::future::ActorPromise;
use crate::message::{Failure, Message};

/// Where a reply to a message should be delivered.
#[derive(Clone, Debug, Default)]
pub enum ReplyChannel {
    /// Reply by sending a fire-and-forget message to another actor
    Actor(ActorRef),
    /// Reply by completing a pending future
    Promise(ActorPromise),
    /// Nobody is listening for a reply
    #[default]
    None,
}

impl ReplyChannel {
    /// Deliver a reply, failing with [`ActorError::NoReplyTarget`] if there is
    /// no channel.
    ///
    /// Replying to an actor sends it the value with no reply channel of its own.
    /// Replying to an already completed promise is a silent no-op.
    pub fn reply<M: Any + Send + Sync>(&self, reply: M) -> Result<()> {
        match self {
            Self::Actor(target) => target.tell(reply, ReplyChannel::None),
            Self::Promise(promise) => {
                if !promise.complete(Message::new(reply)) {
                    trace!("Reply dropped: promise already completed");
                }
                Ok(())
            }
            Self::None => Err(ActorError::NoReplyTarget),
        }
    }

    /// Deliver a reply if possible, returning whether it was delivered.
    pub fn try_reply<M: Any + Send + Sync>(&self, reply: M) -> bool {
        match self {
            Self::Actor(target) => target.tell(reply, ReplyChannel::None).is_ok(),
            Self::Promise(promise) => promise.complete(Message::new(reply)),
            Self::None => false,
        }
    }

    /// Report a failure instead of a value.
    ///
    /// A promise completes with the failure; an actor receives a [`Failure`]
    /// status message.
    pub fn fail(&self, error: ActorError) -> Result<()> {
        match self {
            Self::Actor(target) => target.tell(Failure(error), ReplyChannel::None),
            Self::Promise(promise) => {
                promise.fail(error);
                Ok(())
            }
            Self::None => Err(ActorError::NoReplyTarget),
        }
    }

    /// Whether this is the absent channel.
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }
}

impl From<ActorRef> for ReplyChannel {
    fn from(actor: ActorRef) -> Self {
        Self::Actor(actor)
    }
}

impl From<&ActorRef> for ReplyChannel {
    fn from(actor: &ActorRef) -> Self {
        Self::Actor(actor.clone())
    }
}

impl From<ActorPromise> for ReplyChannel {
    fn from(promise: ActorPromise) -> Self {
        Self::Promise(promise)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::future::{ActorFuture, FutureState};

    #[test]
    fn test_strict_reply_without_channel_fails() {
        let channel = ReplyChannel::None;

        assert_eq!(channel.reply("pong"), Err(ActorError::NoReplyTarget));
        assert_eq!(
            channel.fail(ActorError::NoReplyTarget),
            Err(ActorError::NoReplyTarget)
        );
    }

    #[test]
    fn test_forgiving_reply_without_channel_returns_false() {
        assert!(!ReplyChannel::default().try_reply("pong"));
    }

    #[test]
    fn test_promise_channel_completes_once() {
        let (promise, future) = ActorFuture::pair();
        let channel = ReplyChannel::from(promise);

        assert!(channel.try_reply(1u8));
        assert!(!channel.try_reply(2u8));
        // Strict reply on a completed promise is a no-op, not an error
        assert!(channel.reply(3u8).is_ok());

        assert_eq!(*future.result().unwrap().downcast_ref::<u8>().unwrap(), 1);
    }

    #[test]
    fn test_promise_channel_failure() {
        let (promise, future) = ActorFuture::pair();
        let channel = ReplyChannel::Promise(promise);

        channel.fail(ActorError::NoReplyTarget).unwrap();

        assert_eq!(future.state(), FutureState::Failed);
        assert_eq!(future.exception(), Some(ActorError::NoReplyTarget));
    }
}
