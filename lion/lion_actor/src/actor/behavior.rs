//! The behaviour an actor plugs into its processing loop.

use super::ActorContext;
use crate::error::ActorError;
use crate::message::Envelope;

/// Error returned by message handlers and lifecycle hooks
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of a message handler or lifecycle hook
pub type HandlerResult = Result<(), HandlerError>;

/// An isolated unit of sequential computation.
///
/// Handlers of one actor never run concurrently. A handler that returns an
/// error or panics is reported to the actor's supervisor, whose directive the
/// processing loop then obeys.
pub trait Actor: Send + 'static {
    /// Handle one message. The envelope carries the reply channel.
    fn receive(&mut self, ctx: &ActorContext<'_>, envelope: Envelope) -> HandlerResult;

    /// Called once, before the first message is handled
    fn pre_start(&mut self, _ctx: &ActorContext<'_>) -> HandlerResult {
        Ok(())
    }

    /// Called once, after the last message has been handled
    fn post_stop(&mut self, _ctx: &ActorContext<'_>) -> HandlerResult {
        Ok(())
    }

    /// Called on the failed instance before it is replaced
    fn pre_restart(&mut self, _ctx: &ActorContext<'_>, _reason: &ActorError) -> HandlerResult {
        Ok(())
    }

    /// Called on the fresh instance after a restart. Defaults to `pre_start`.
    fn post_restart(&mut self, ctx: &ActorContext<'_>, _reason: &ActorError) -> HandlerResult {
        self.pre_start(ctx)
    }
}

/// Actor backed by a plain closure.
pub(crate) struct FnActor<F>(pub(crate) F);

impl<F> Actor for FnActor<F>
where
    F: FnMut(&ActorContext<'_>, Envelope) -> HandlerResult + Send + 'static,
{
    fn receive(&mut self, ctx: &ActorContext<'_>, envelope: Envelope) -> HandlerResult {
        (self.0)(ctx, envelope)
    }
}
