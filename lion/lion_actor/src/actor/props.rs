//! Recipes for creating actors.

use std::fmt;
use std::sync::Arc;

use super::behavior::{Actor, FnActor, HandlerResult};
use super::supervisor::Supervisor;
use super::ActorContext;
use crate::message::Envelope;

/// Factory producing fresh actor instances, at spawn and on every restart
pub type ActorFactory = dyn Fn() -> Box<dyn Actor> + Send + Sync;

/// How an actor's processing loop is scheduled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DispatcherKind {
    /// Multiplexed with other actors over the system worker pool
    #[default]
    Shared,
    /// Runs on a dedicated thread that blocks on the mailbox
    Pinned,
}

/// Everything needed to create and run an actor
#[derive(Clone)]
pub struct Props {
    factory: Arc<ActorFactory>,
    dispatcher: DispatcherKind,
    throughput: Option<usize>,
    supervisor: Option<Arc<dyn Supervisor>>,
}

impl Props {
    /// Props whose instances are built by `factory`
    pub fn new<A, F>(factory: F) -> Self
    where
        A: Actor,
        F: Fn() -> A + Send + Sync + 'static,
    {
        Self {
            factory: Arc::new(move || Box::new(factory()) as Box<dyn Actor>),
            dispatcher: DispatcherKind::default(),
            throughput: None,
            supervisor: None,
        }
    }

    /// Props for an actor whose whole behaviour is a message handler closure.
    ///
    /// Each restart starts again from a clone of the original closure.
    pub fn from_fn<F>(handler: F) -> Self
    where
        F: FnMut(&ActorContext<'_>, Envelope) -> HandlerResult + Clone + Send + Sync + 'static,
    {
        Self::new(move || FnActor(handler.clone()))
    }

    /// Choose how the actor is scheduled
    pub fn with_dispatcher(mut self, dispatcher: DispatcherKind) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    /// Messages handled per turn on the shared pool, overriding the system default
    pub fn with_throughput(mut self, throughput: usize) -> Self {
        self.throughput = Some(throughput.max(1));
        self
    }

    /// Supervise this actor with `supervisor` instead of the system default
    pub fn with_supervisor(mut self, supervisor: Arc<dyn Supervisor>) -> Self {
        self.supervisor = Some(supervisor);
        self
    }

    /// The dispatcher kind
    pub fn dispatcher(&self) -> DispatcherKind {
        self.dispatcher
    }

    pub(crate) fn throughput(&self) -> Option<usize> {
        self.throughput
    }

    pub(crate) fn supervisor(&self) -> Option<&Arc<dyn Supervisor>> {
        self.supervisor.as_ref()
    }

    pub(crate) fn produce(&self) -> Box<dyn Actor> {
        (self.factory)()
    }
}

impl fmt::Debug for Props {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Props")
            .field("dispatcher", &self.dispatcher)
            .field("throughput", &self.throughput)
            .field("custom_supervisor", &self.supervisor.is_some())
            .finish()
    }
}
