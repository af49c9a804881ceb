//! Single-assignment future/promise pairs for request-reply.
//!
//! An [`ActorPromise`] is the write side: it completes the shared slot exactly
//! once, with either a value or a failure. Later completion attempts are
//! silent no-ops, so racing completers (a reply and a handler failure, say)
//! never change what readers observe.
//!
//! An [`ActorFuture`] is the read side. It supports blocking waits with a
//! timeout, non-blocking polling, and completion callbacks. A future created
//! with a deadline reports itself as *expired* once the deadline passes while
//! it is still pending; expiry is only ever a read, never a stored state.

use log::{trace, warn};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ActorError;
use crate::message::Message;
use crate::pool::ThreadPool;

/// Outcome of a completed future.
pub type Completion = Result<Message, ActorError>;

type Callback = Box<dyn FnOnce(Completion) + Send + 'static>;

/// Observable state of a future.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureState {
    /// Not completed, deadline (if any) not yet reached
    Pending,
    /// Completed with a value
    Completed,
    /// Completed with a failure
    Failed,
    /// Not completed and past its deadline
    Expired,
}

#[derive(Default)]
struct Slot {
    outcome: Option<Completion>,
    callbacks: Vec<Callback>,
}

struct Shared {
    slot: Mutex<Slot>,
    completed: Condvar,
    deadline: Option<Instant>,
    dispatcher: Option<Arc<ThreadPool>>,
}

impl Shared {
    fn new(deadline: Option<Instant>, dispatcher: Option<Arc<ThreadPool>>) -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::default()),
            completed: Condvar::new(),
            deadline,
            dispatcher,
        })
    }

    /// Run a callback off the completing thread: on the attached pool if it
    /// accepts the task, otherwise on a thread of its own.
    fn dispatch(&self, callback: Callback, outcome: Completion) {
        let job = Arc::new(Mutex::new(Some((callback, outcome))));

        if let Some(pool) = &self.dispatcher {
            let task = Arc::clone(&job);
            if pool.execute(move || run_job(&task)).is_ok() {
                return;
            }
        }

        let task = Arc::clone(&job);
        if let Err(e) = thread::Builder::new()
            .name("lion-actor-callback".to_string())
            .spawn(move || run_job(&task))
        {
            warn!("Cannot spawn callback thread ({}), running inline", e);
            run_job(&job);
        }
    }
}

/// Run a pending callback unless another path already took it.
fn run_job(job: &Mutex<Option<(Callback, Completion)>>) {
    let pending = job.lock().take();
    if let Some((callback, outcome)) = pending {
        callback(outcome);
    }
}

/// Write side of a future: completes it exactly once.
#[derive(Clone)]
pub struct ActorPromise {
    shared: Arc<Shared>,
}

/// Read side of a promise.
#[derive(Clone)]
pub struct ActorFuture {
    shared: Arc<Shared>,
}

impl ActorFuture {
    /// Create a linked promise and future with no deadline.
    pub fn pair() -> (ActorPromise, ActorFuture) {
        Self::linked(None, None)
    }

    /// Create a linked promise and future that expires after `timeout`.
    pub fn pair_with_timeout(timeout: Duration) -> (ActorPromise, ActorFuture) {
        Self::linked(Instant::now().checked_add(timeout), None)
    }

    /// Create a linked pair whose callbacks run on `dispatcher`.
    pub(crate) fn linked(
        deadline: Option<Instant>,
        dispatcher: Option<Arc<ThreadPool>>,
    ) -> (ActorPromise, ActorFuture) {
        let shared = Shared::new(deadline, dispatcher);
        (
            ActorPromise {
                shared: Arc::clone(&shared),
            },
            ActorFuture { shared },
        )
    }

    /// Block the calling thread until the future completes or `timeout` elapses.
    ///
    /// Returns the completed value or failure, or [`ActorError::Timeout`] if the
    /// future is still pending once the timeout has elapsed. Timing out leaves
    /// the future untouched; it may still complete later.
    pub fn wait(&self, timeout: Duration) -> Completion {
        let deadline = Instant::now().checked_add(timeout);
        let mut slot = self.shared.slot.lock();

        while slot.outcome.is_none() {
            match deadline {
                Some(deadline) => {
                    if self
                        .shared
                        .completed
                        .wait_until(&mut slot, deadline)
                        .timed_out()
                    {
                        break;
                    }
                }
                None => self.shared.completed.wait(&mut slot),
            }
        }

        match &slot.outcome {
            Some(outcome) => outcome.clone(),
            None => Err(ActorError::Timeout(timeout)),
        }
    }

    /// Whether the future has completed, with a value or a failure.
    pub fn is_completed(&self) -> bool {
        self.shared.slot.lock().outcome.is_some()
    }

    /// Whether the future is still pending past its deadline.
    pub fn is_expired(&self) -> bool {
        self.state() == FutureState::Expired
    }

    /// Current state of the future.
    pub fn state(&self) -> FutureState {
        match &self.shared.slot.lock().outcome {
            Some(Ok(_)) => FutureState::Completed,
            Some(Err(_)) => FutureState::Failed,
            None => match self.shared.deadline {
                Some(deadline) if Instant::now() >= deadline => FutureState::Expired,
                _ => FutureState::Pending,
            },
        }
    }

    /// The deadline after which a pending future counts as expired.
    pub fn deadline(&self) -> Option<Instant> {
        self.shared.deadline
    }

    /// The value, if the future completed with one.
    pub fn result(&self) -> Option<Message> {
        match &self.shared.slot.lock().outcome {
            Some(Ok(value)) => Some(value.clone()),
            _ => None,
        }
    }

    /// The failure, if the future completed with one.
    pub fn exception(&self) -> Option<ActorError> {
        match &self.shared.slot.lock().outcome {
            Some(Err(error)) => Some(error.clone()),
            _ => None,
        }
    }

    /// Register a callback to run once the future completes.
    ///
    /// If the future is already complete the callback runs immediately on the
    /// calling thread. Otherwise it runs after completion without blocking the
    /// completer: on the worker pool when the future belongs to an actor
    /// system, on a dedicated thread otherwise.
    pub fn on_complete<F>(&self, callback: F)
    where
        F: FnOnce(Completion) + Send + 'static,
    {
        let mut slot = self.shared.slot.lock();
        match &slot.outcome {
            Some(outcome) => {
                let outcome = outcome.clone();
                drop(slot);
                callback(outcome);
            }
            None => slot.callbacks.push(Box::new(callback)),
        }
    }
}

impl ActorPromise {
    /// Complete the paired future with a value.
    ///
    /// Returns `true` if this call completed the future, `false` if it had
    /// already been completed.
    pub fn complete(&self, value: Message) -> bool {
        self.settle(Ok(value))
    }

    /// Complete the paired future with a failure.
    pub fn fail(&self, error: ActorError) -> bool {
        self.settle(Err(error))
    }

    /// Whether the paired future has already been completed.
    pub fn is_completed(&self) -> bool {
        self.shared.slot.lock().outcome.is_some()
    }

    /// A new read handle on the paired future.
    pub fn future(&self) -> ActorFuture {
        ActorFuture {
            shared: Arc::clone(&self.shared),
        }
    }

    fn settle(&self, outcome: Completion) -> bool {
        let callbacks = {
            let mut slot = self.shared.slot.lock();
            if slot.outcome.is_some() {
                trace!("Ignoring completion of an already completed promise");
                return false;
            }
            slot.outcome = Some(outcome.clone());
            self.shared.completed.notify_all();
            std::mem::take(&mut slot.callbacks)
        };

        for callback in callbacks {
            self.shared.dispatch(callback, outcome.clone());
        }
        true
    }
}

impl fmt::Debug for ActorFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorFuture")
            .field("state", &self.state())
            .finish()
    }
}

impl fmt::Debug for ActorPromise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorPromise")
            .field("completed", &self.is_completed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_complete_once() {
        let (promise, future) = ActorFuture::pair();

        assert!(promise.complete(Message::new(1u32)));
        assert!(!promise.complete(Message::new(2u32)));
        assert!(!promise.fail(ActorError::NoReplyTarget));

        let value = future.result().unwrap();
        assert_eq!(*value.downcast_ref::<u32>().unwrap(), 1);
        assert!(future.exception().is_none());
        assert_eq!(future.state(), FutureState::Completed);
    }

    #[test]
    fn test_fail_once() {
        let (promise, future) = ActorFuture::pair();

        assert!(promise.fail(ActorError::NoReplyTarget));
        assert!(!promise.complete(Message::new("late")));

        assert_eq!(future.exception(), Some(ActorError::NoReplyTarget));
        assert!(future.result().is_none());
        assert_eq!(future.state(), FutureState::Failed);
    }

    #[test]
    fn test_wait_returns_value_completed_by_other_thread() {
        let (promise, future) = ActorFuture::pair();

        let completer = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            promise.complete(Message::new("done"));
        });

        let value = future.wait(Duration::from_secs(5)).unwrap();
        assert_eq!(*value.downcast_ref::<&str>().unwrap(), "done");
        completer.join().unwrap();
    }

    #[test]
    fn test_wait_times_out_not_before_deadline() {
        let (_promise, future) = ActorFuture::pair();
        let timeout = Duration::from_millis(50);

        let start = Instant::now();
        let result = future.wait(timeout);

        assert!(start.elapsed() >= timeout);
        assert_eq!(result.unwrap_err(), ActorError::Timeout(timeout));
        // Timing out does not complete the future
        assert!(!future.is_completed());
    }

    #[test]
    fn test_expiry_is_a_read_classification() {
        let (promise, future) = ActorFuture::pair_with_timeout(Duration::from_millis(10));

        assert_eq!(future.state(), FutureState::Pending);
        thread::sleep(Duration::from_millis(30));
        assert!(future.is_expired());

        // An expired future can still be completed
        assert!(promise.complete(Message::new(5u8)));
        assert!(!future.is_expired());
        assert_eq!(future.state(), FutureState::Completed);
    }

    #[test]
    fn test_future_without_deadline_never_expires() {
        let (_promise, future) = ActorFuture::pair();

        assert!(future.deadline().is_none());
        assert!(!future.is_expired());
    }

    #[test]
    fn test_callbacks_fire_once_each() {
        let (promise, future) = ActorFuture::pair();
        let (fired_tx, fired_rx) = crossbeam_channel::unbounded();

        for n in 0..3 {
            let fired_tx = fired_tx.clone();
            future.on_complete(move |outcome| {
                assert!(outcome.is_ok());
                fired_tx.send(n).unwrap();
            });
        }

        promise.complete(Message::new(()));
        promise.complete(Message::new(()));

        let mut fired: Vec<i32> = (0..3)
            .map(|_| fired_rx.recv_timeout(Duration::from_secs(1)).unwrap())
            .collect();
        fired.sort();
        assert_eq!(fired, vec![0, 1, 2]);
        assert!(fired_rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_slow_callback_does_not_block_completer() {
        let (promise, future) = ActorFuture::pair();
        let (fired_tx, fired_rx) = crossbeam_channel::bounded(1);
        let completer = thread::current().id();

        future.on_complete(move |_| {
            thread::sleep(Duration::from_millis(200));
            fired_tx.send(thread::current().id()).unwrap();
        });

        let start = Instant::now();
        assert!(promise.complete(Message::new(())));
        assert!(start.elapsed() < Duration::from_millis(100));

        let ran_on = fired_rx.recv_timeout(Duration::from_secs(1)).unwrap();
        assert_ne!(ran_on, completer);
    }

    #[test]
    fn test_callbacks_survive_pool_shutdown() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        pool.shutdown_and_join();
        let (promise, future) = ActorFuture::linked(None, Some(pool));
        let (fired_tx, fired_rx) = crossbeam_channel::bounded(1);

        future.on_complete(move |outcome| {
            fired_tx.send(outcome.is_ok()).unwrap();
        });
        promise.complete(Message::new(()));

        assert!(fired_rx.recv_timeout(Duration::from_secs(1)).unwrap());
    }

    #[test]
    fn test_callback_registered_after_completion_fires_immediately() {
        let (promise, future) = ActorFuture::pair();
        promise.fail(ActorError::NoReplyTarget);

        let seen = Arc::new(Mutex::new(None));
        let seen_clone = seen.clone();
        future.on_complete(move |outcome| {
            *seen_clone.lock() = Some(outcome);
        });

        assert_eq!(
            seen.lock().take().unwrap().unwrap_err(),
            ActorError::NoReplyTarget
        );
    }

    #[test]
    fn test_callbacks_dispatched_to_pool() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let (promise, future) = ActorFuture::linked(None, Some(pool.clone()));

        let ran_on_worker = Arc::new(Mutex::new(None));
        let ran_clone = ran_on_worker.clone();
        let pool_clone = pool.clone();
        future.on_complete(move |_| {
            *ran_clone.lock() = Some(pool_clone.is_worker_thread());
        });

        promise.complete(Message::new(()));
        thread::sleep(Duration::from_millis(50));

        assert_eq!(*ran_on_worker.lock(), Some(true));
    }
}
