//! The per-actor processing loop.
//!
//! An `ActorCell` owns one actor's mailbox, instance and lifecycle state.
//! Lifecycle is monotonic: `New` (mailbox exists, nothing consumed) to
//! `Started` (loop active, `pre_start` run before the first message) to
//! `Stopped` (loop exited, `post_stop` run, mailbox closed).
//!
//! The instance sits behind a mutex that only the loop takes, and on the shared
//! dispatcher an atomic `scheduled` flag keeps at most one turn per actor in
//! the pool at any time, so handlers of one actor never overlap.

use log::{debug, error, trace, warn};
use parking_lot::Mutex;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::thread;

use super::behavior::{Actor, HandlerResult};
use super::mailbox::{Dequeued, Mailbox};
use super::props::{DispatcherKind, Props};
use super::supervisor::{Directive, Supervisor};
use super::system::SystemInner;
use super::{ActorContext, ActorId, ActorRef, ActorSystem, ReplyChannel};
use crate::error::{ActorError, Result};
use crate::future::{ActorFuture, ActorPromise};
use crate::message::{Envelope, Message, PoisonPill};
use crate::pool::ThreadPool;

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActorStatus {
    /// Created, not yet consuming messages
    New,
    /// Consuming messages
    Started,
    /// Stopped for good
    Stopped,
}

/// Counters describing what an actor has done so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStats {
    /// Messages passed to the handler
    pub messages_processed: u64,
    /// Handler and hook failures
    pub failures: u64,
    /// Instances replaced by a restart
    pub restarts: u64,
}

struct Instance {
    actor: Box<dyn Actor>,
    started: bool,
    stopped: bool,
}

/// Settings a cell takes from the system that creates it
pub(crate) struct CellSettings {
    pub(crate) pool: Arc<ThreadPool>,
    pub(crate) supervisor: Arc<dyn Supervisor>,
    pub(crate) throughput: usize,
    pub(crate) thread_name_prefix: String,
    pub(crate) system: Weak<SystemInner>,
}

pub(crate) struct ActorCell {
    id: ActorId,
    props: Props,
    mailbox: Mailbox,
    status: Mutex<ActorStatus>,
    instance: Mutex<Instance>,
    scheduled: AtomicBool,
    stop_requested: AtomicBool,
    settings: CellSettings,
    supervisor: Arc<dyn Supervisor>,
    termination: ActorPromise,
    messages_processed: AtomicU64,
    failures: AtomicU64,
    restarts: AtomicU64,
}

impl ActorCell {
    pub(crate) fn new(id: ActorId, props: Props, settings: CellSettings) -> Arc<Self> {
        let actor = props.produce();
        let supervisor = props
            .supervisor()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&settings.supervisor));
        let (termination, _) = ActorFuture::linked(None, Some(Arc::clone(&settings.pool)));

        Arc::new(Self {
            mailbox: Mailbox::new(id.clone()),
            id,
            props,
            status: Mutex::new(ActorStatus::New),
            instance: Mutex::new(Instance {
                actor,
                started: false,
                stopped: false,
            }),
            scheduled: AtomicBool::new(false),
            stop_requested: AtomicBool::new(false),
            settings,
            supervisor,
            termination,
            messages_processed: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            restarts: AtomicU64::new(0),
        })
    }

    pub(crate) fn id(&self) -> &ActorId {
        &self.id
    }

    pub(crate) fn status(&self) -> ActorStatus {
        *self.status.lock()
    }

    pub(crate) fn pool(&self) -> &Arc<ThreadPool> {
        &self.settings.pool
    }

    pub(crate) fn mailbox_len(&self) -> usize {
        self.mailbox.len()
    }

    pub(crate) fn termination(&self) -> ActorFuture {
        self.termination.future()
    }

    pub(crate) fn system(&self) -> Option<ActorSystem> {
        self.settings.system.upgrade().map(ActorSystem::from_inner)
    }

    pub(crate) fn stats(&self) -> ActorStats {
        ActorStats {
            messages_processed: self.messages_processed.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            restarts: self.restarts.load(Ordering::Relaxed),
        }
    }

    /// Accept an envelope from any thread.
    pub(crate) fn enqueue(self: &Arc<Self>, envelope: Envelope) -> Result<()> {
        match self.status() {
            ActorStatus::New => return Err(ActorError::NotStarted(self.id.clone())),
            ActorStatus::Stopped => return Err(ActorError::MailboxClosed(self.id.clone())),
            ActorStatus::Started => {}
        }

        self.mailbox
            .enqueue(envelope)
            .map_err(|_| ActorError::MailboxClosed(self.id.clone()))?;

        if self.props.dispatcher() == DispatcherKind::Shared {
            self.schedule();
        }
        Ok(())
    }

    /// Move from `New` to `Started` and begin consuming.
    pub(crate) fn start(self: &Arc<Self>) -> Result<()> {
        let mut status = self.status.lock();
        match *status {
            ActorStatus::Started => return Ok(()),
            ActorStatus::Stopped => return Err(ActorError::MailboxClosed(self.id.clone())),
            ActorStatus::New if self.stop_requested.load(Ordering::Acquire) => {
                return Err(ActorError::MailboxClosed(self.id.clone()));
            }
            ActorStatus::New => {}
        }

        match self.props.dispatcher() {
            DispatcherKind::Shared => {
                *status = ActorStatus::Started;
                drop(status);
                // Runs pre_start even if no message ever arrives
                self.schedule();
            }
            DispatcherKind::Pinned => {
                let cell = Arc::clone(self);
                thread::Builder::new()
                    .name(format!("{}-{}", self.settings.thread_name_prefix, self.id))
                    .spawn(move || cell.run_pinned())
                    .map_err(|e| ActorError::Dispatcher(e.to_string()))?;
                *status = ActorStatus::Started;
            }
        }

        debug!("Actor {}: started ({:?})", self.id, self.props.dispatcher());
        Ok(())
    }

    /// Ask the loop to stop once the current message, if any, is handled.
    pub(crate) fn request_stop(self: &Arc<Self>) {
        if self.stop_requested.swap(true, Ordering::AcqRel) {
            return;
        }
        self.mailbox.close();

        let mut status = self.status.lock();
        match *status {
            ActorStatus::New => {
                *status = ActorStatus::Stopped;
                drop(status);
                debug!("Actor {}: stopped before it was started", self.id);
                self.fail_pending();
                self.release();
            }
            ActorStatus::Started => {
                drop(status);
                // A pinned loop is woken by the close marker instead
                if self.props.dispatcher() == DispatcherKind::Shared {
                    self.schedule();
                }
            }
            ActorStatus::Stopped => {}
        }
    }

    /// Put one turn of this actor on the pool unless one is already there.
    fn schedule(self: &Arc<Self>) {
        if self
            .scheduled
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let cell = Arc::clone(self);
        if let Err(e) = self.settings.pool.execute(move || cell.run()) {
            self.scheduled.store(false, Ordering::Release);
            warn!("Actor {}: cannot be scheduled ({}), stopping", self.id, e);

            self.stop_requested.store(true, Ordering::Release);
            self.mailbox.close();
            if let Some(mut instance) = self.instance.try_lock() {
                self.finish_stop(&mut instance);
            }
        }
    }

    /// One turn on the shared pool.
    fn run(self: &Arc<Self>) {
        {
            let mut instance = self.instance.lock();
            if !instance.stopped {
                self.ensure_started(&mut instance);
                self.process_batch(&mut instance);
            }
        }

        self.scheduled.store(false, Ordering::Release);

        // Pick up letters or a stop request that raced with the end of the turn
        let pending = !self.mailbox.is_empty() || self.stop_requested.load(Ordering::Acquire);
        if pending && self.status() != ActorStatus::Stopped {
            self.schedule();
        }
    }

    fn process_batch(self: &Arc<Self>, instance: &mut Instance) {
        for _ in 0..self.settings.throughput {
            if self.stop_requested.load(Ordering::Acquire) {
                self.finish_stop(instance);
                return;
            }

            match self.mailbox.try_dequeue() {
                Dequeued::Letter(envelope) => self.invoke(instance, envelope),
                Dequeued::Closed => {
                    self.finish_stop(instance);
                    return;
                }
                Dequeued::Empty => return,
            }
        }
    }

    /// The whole life of an actor on its own thread.
    fn run_pinned(self: Arc<Self>) {
        let mut instance = self.instance.lock();
        self.ensure_started(&mut instance);

        while !self.stop_requested.load(Ordering::Acquire) {
            match self.mailbox.dequeue_blocking() {
                Some(envelope) => self.invoke(&mut instance, envelope),
                None => break,
            }
        }

        self.finish_stop(&mut instance);
    }

    fn ensure_started(self: &Arc<Self>, instance: &mut Instance) {
        if instance.started {
            return;
        }
        instance.started = true;

        let ctx = ActorContext::new(self);
        if let Err(reason) = guarded(|| instance.actor.pre_start(&ctx)) {
            let cause = self.record_failure(reason);
            self.obey(instance, cause);
        }
    }

    fn invoke(self: &Arc<Self>, instance: &mut Instance, envelope: Envelope) {
        if envelope.message().is::<PoisonPill>() {
            debug!("Actor {}: received poison pill", self.id);
            // A requester waits for the actor to stop, not for the pill
            if let ReplyChannel::Promise(promise) = envelope.sender() {
                let promise = promise.clone();
                self.termination.future().on_complete(move |outcome| {
                    let _ = match outcome {
                        Ok(stopped) => promise.complete(stopped),
                        Err(error) => promise.fail(error),
                    };
                });
            }
            self.request_stop();
            return;
        }

        trace!(
            "Actor {}: handling {}",
            self.id,
            envelope.message().type_name()
        );

        let sender = envelope.sender().clone();
        let ctx = ActorContext::new(self);
        let result = guarded(|| instance.actor.receive(&ctx, envelope));
        self.messages_processed.fetch_add(1, Ordering::Relaxed);

        if let Err(reason) = result {
            let cause = self.record_failure(reason);
            // A waiting requester learns about the failure too; no-op if it was answered
            if let ReplyChannel::Promise(promise) = &sender {
                promise.fail(cause.clone());
            }
            self.obey(instance, cause);
        }
    }

    fn record_failure(&self, reason: String) -> ActorError {
        self.failures.fetch_add(1, Ordering::Relaxed);
        let cause = ActorError::HandlerFailure {
            actor: self.id.clone(),
            reason,
        };
        error!("{}", cause);
        cause
    }

    fn supervise(self: &Arc<Self>, cause: &ActorError) -> Directive {
        self.supervisor
            .handle_failure(&ActorRef::from_cell(Arc::clone(self)), cause)
    }

    fn obey(self: &Arc<Self>, instance: &mut Instance, cause: ActorError) {
        match self.supervise(&cause) {
            Directive::Resume => debug!("Actor {}: resuming after failure", self.id),
            Directive::Restart => self.restart(instance, cause),
            Directive::Stop => self.request_stop(),
        }
    }

    fn restart(self: &Arc<Self>, instance: &mut Instance, mut cause: ActorError) {
        loop {
            debug!("Actor {}: restarting", self.id);
            let ctx = ActorContext::new(self);

            // Restart is already decided; the failure is only recorded
            if let Err(reason) = guarded(|| instance.actor.pre_restart(&ctx, &cause)) {
                self.record_failure(reason);
            }

            match panic::catch_unwind(AssertUnwindSafe(|| self.props.produce())) {
                Ok(actor) => instance.actor = actor,
                Err(payload) => {
                    self.record_failure(format!(
                        "actor factory panicked: {}",
                        panic_message(&*payload)
                    ));
                    self.request_stop();
                    return;
                }
            }
            self.restarts.fetch_add(1, Ordering::Relaxed);

            match guarded(|| instance.actor.post_restart(&ctx, &cause)) {
                Ok(()) => return,
                Err(reason) => {
                    cause = self.record_failure(reason);
                    match self.supervise(&cause) {
                        Directive::Resume => return,
                        Directive::Restart => continue,
                        Directive::Stop => {
                            self.request_stop();
                            return;
                        }
                    }
                }
            }
        }
    }

    /// Leave the loop for good. Runs on the thread that owns the instance.
    fn finish_stop(self: &Arc<Self>, instance: &mut Instance) {
        if instance.stopped {
            return;
        }
        instance.stopped = true;
        self.stop_requested.store(true, Ordering::Release);
        self.mailbox.close();
        *self.status.lock() = ActorStatus::Stopped;

        self.fail_pending();

        if instance.started {
            let ctx = ActorContext::new(self);
            if let Err(reason) = guarded(|| instance.actor.post_stop(&ctx)) {
                let failure = self.record_failure(reason);
                // Already stopped; the directive has nothing left to act on
                let _ = self.supervise(&failure);
            }
        }

        self.release();
    }

    /// Fail the senders of everything still queued.
    fn fail_pending(&self) {
        for envelope in self.mailbox.drain() {
            match envelope.sender() {
                ReplyChannel::Promise(promise) => {
                    promise.fail(ActorError::MailboxClosed(self.id.clone()));
                }
                _ => warn!(
                    "Actor {}: dead letter {} dropped on stop",
                    self.id,
                    envelope.message().type_name()
                ),
            }
        }
    }

    fn release(self: &Arc<Self>) {
        self.supervisor.actor_stopped(&self.id);
        if let Some(system) = self.settings.system.upgrade() {
            system.unregister(self);
        }
        self.termination.complete(Message::new(self.id.clone()));
        debug!("Actor {}: stopped", self.id);
    }
}

/// Run a handler or hook, turning errors and panics into a failure reason.
fn guarded<F>(f: F) -> std::result::Result<(), String>
where
    F: FnOnce() -> HandlerResult,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(error)) => Err(error.to_string()),
        Err(payload) => Err(format!("panicked: {}", panic_message(&*payload))),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "<unknown panic>".to_string()
    }
}
