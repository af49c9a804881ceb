//! Actor system for managing actor lifecycles and lookups.
//!
//! The `ActorSystem` owns the worker pool, the default supervisor and the
//! registry that resolves identifiers to actor references. It is an ordinary
//! value: create one at startup and shut it down explicitly.

use log::{debug, info, warn};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::cell::{ActorCell, CellSettings};
use super::supervisor::{BasicSupervisor, Supervisor};
use super::{ActorId, ActorRef, Props};
use crate::config::ActorSystemConfig;
use crate::error::{ActorError, Result, SystemError};
use crate::pool::{ThreadPool, ThreadPoolConfig, ThreadPoolStats};

pub(crate) struct SystemInner {
    config: ActorSystemConfig,
    pool: Arc<ThreadPool>,
    registry: RwLock<HashMap<ActorId, ActorRef>>,
    supervisor: Arc<dyn Supervisor>,
    is_shut_down: AtomicBool,
}

impl SystemInner {
    /// Forget a stopped actor, unless its identifier was already reused.
    pub(crate) fn unregister(&self, cell: &Arc<ActorCell>) {
        let mut registry = self.registry.write();
        let registered = registry
            .get(cell.id())
            .is_some_and(|actor| Arc::ptr_eq(actor.cell(), cell));
        if registered {
            registry.remove(cell.id());
            debug!("Unregistered actor: {}", cell.id());
        }
    }
}

impl Drop for SystemInner {
    fn drop(&mut self) {
        self.pool.shutdown();
    }
}

/// The central actor system that manages actors
#[derive(Clone)]
pub struct ActorSystem {
    inner: Arc<SystemInner>,
}

impl ActorSystem {
    /// Create a new actor system with default configuration
    pub fn new() -> Result<Self, SystemError> {
        Self::with_config(ActorSystemConfig::default())
    }

    /// Create a new actor system with the specified configuration
    pub fn with_config(config: ActorSystemConfig) -> Result<Self, SystemError> {
        let supervisor = Arc::new(BasicSupervisor::new(config.supervisor.clone()));
        Self::with_supervisor(config, supervisor)
    }

    /// Create a new actor system whose actors default to `supervisor`
    pub fn with_supervisor(
        config: ActorSystemConfig,
        supervisor: Arc<dyn Supervisor>,
    ) -> Result<Self, SystemError> {
        config.validate()?;

        let pool = ThreadPool::with_config(ThreadPoolConfig {
            threads: config.worker_threads,
            thread_name_prefix: config.thread_name_prefix.clone(),
        })?;

        info!(
            "Creating actor system '{}' with {} worker threads",
            config.name, config.worker_threads
        );

        Ok(Self {
            inner: Arc::new(SystemInner {
                config,
                pool: Arc::new(pool),
                registry: RwLock::new(HashMap::new()),
                supervisor,
                is_shut_down: AtomicBool::new(false),
            }),
        })
    }

    pub(crate) fn from_inner(inner: Arc<SystemInner>) -> Self {
        Self { inner }
    }

    /// Name of this actor system
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Configuration this system was created with
    pub fn config(&self) -> &ActorSystemConfig {
        &self.inner.config
    }

    /// Register a new actor without starting it
    pub fn actor_of(&self, id: impl Into<ActorId>, props: Props) -> Result<ActorRef> {
        if self.is_shut_down() {
            return Err(ActorError::Dispatcher(format!(
                "actor system '{}' is shut down",
                self.name()
            )));
        }

        let id = id.into();
        if self.inner.registry.read().contains_key(&id) {
            return Err(ActorError::AlreadyExists(id));
        }

        // Built outside the registry lock: the factory is user code
        let settings = CellSettings {
            pool: Arc::clone(&self.inner.pool),
            supervisor: Arc::clone(&self.inner.supervisor),
            throughput: props.throughput().unwrap_or(self.inner.config.throughput),
            thread_name_prefix: self.inner.config.thread_name_prefix.clone(),
            system: Arc::downgrade(&self.inner),
        };
        let actor = ActorRef::from_cell(ActorCell::new(id.clone(), props, settings));

        let mut registry = self.inner.registry.write();
        if registry.contains_key(&id) {
            return Err(ActorError::AlreadyExists(id));
        }
        registry.insert(id.clone(), actor.clone());
        debug!("Registered actor: {}", id);
        Ok(actor)
    }

    /// Register and start a new actor
    pub fn spawn(&self, id: impl Into<ActorId>, props: Props) -> Result<ActorRef> {
        let actor = self.actor_of(id, props)?;
        if let Err(e) = actor.start() {
            actor.stop();
            return Err(e);
        }
        Ok(actor)
    }

    /// Resolve an actor by identifier
    pub fn lookup(&self, id: &str) -> Result<ActorRef> {
        self.inner
            .registry
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| ActorError::ActorNotFound(id.to_string()))
    }

    /// Stop the actor registered under `id`
    pub fn stop(&self, id: &str) -> Result<()> {
        self.lookup(id)?.stop();
        Ok(())
    }

    /// Identifiers of all registered actors, sorted
    pub fn actor_ids(&self) -> Vec<ActorId> {
        let mut ids: Vec<_> = self.inner.registry.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Get the number of registered actors
    pub fn actor_count(&self) -> usize {
        self.inner.registry.read().len()
    }

    /// Statistics of the shared worker pool
    pub fn pool_stats(&self) -> ThreadPoolStats {
        self.inner.pool.get_stats()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down.load(Ordering::Acquire)
    }

    /// Stop every actor, wait up to `timeout` for them to terminate, then
    /// stop the worker pool.
    ///
    /// Returns `true` if every actor terminated in time.
    pub fn shutdown(&self, timeout: Duration) -> bool {
        if self.inner.is_shut_down.swap(true, Ordering::AcqRel) {
            return true;
        }
        info!("Shutting down actor system '{}'", self.name());

        let actors: Vec<ActorRef> = self.inner.registry.read().values().cloned().collect();
        for actor in &actors {
            debug!("Stopping actor: {}", actor.id());
            actor.stop();
        }

        // A timeout too large to represent is no deadline at all
        let deadline = Instant::now().checked_add(timeout);
        let mut all_stopped = true;
        for actor in &actors {
            let remaining = deadline.map_or(Duration::MAX, |deadline| {
                deadline.saturating_duration_since(Instant::now())
            });
            if actor.termination().wait(remaining).is_err() {
                warn!("Actor {} did not stop within {:?}", actor.id(), timeout);
                all_stopped = false;
            }
        }

        self.inner.pool.shutdown_and_join();
        info!("Actor system '{}' shutdown complete", self.name());
        all_stopped
    }

    /// [`shutdown`](Self::shutdown) with the configured timeout
    pub fn terminate(&self) -> bool {
        self.shutdown(self.inner.config.shutdown_timeout())
    }
}

impl std::fmt::Debug for ActorSystem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorSystem")
            .field("name", &self.name())
            .field("actors", &self.actor_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::ActorStatus;

    fn test_system() -> ActorSystem {
        ActorSystem::with_config(ActorSystemConfig {
            worker_threads: 2,
            ..Default::default()
        })
        .unwrap()
    }

    fn echo() -> Props {
        Props::from_fn(|_ctx, envelope| {
            envelope.reply(envelope.message().clone())?;
            Ok(())
        })
    }

    #[test]
    fn test_actor_registration() {
        let system = test_system();

        let actor = system.actor_of("actor1", echo()).unwrap();
        system.spawn("actor2", echo()).unwrap();

        assert_eq!(system.actor_count(), 2);
        assert_eq!(system.actor_ids(), vec!["actor1".to_string(), "actor2".to_string()]);
        assert_eq!(actor.status(), ActorStatus::New);
        assert_eq!(system.lookup("actor1").unwrap(), actor);

        system.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_duplicate_registration() {
        let system = test_system();

        system.actor_of("actor1", echo()).unwrap();
        let result = system.actor_of("actor1", echo());

        assert_eq!(result.unwrap_err(), ActorError::AlreadyExists("actor1".into()));
        system.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_lookup_missing_actor() {
        let system = test_system();

        let result = system.lookup("ghost");
        assert_eq!(result.unwrap_err(), ActorError::ActorNotFound("ghost".into()));
        assert!(system.stop("ghost").is_err());

        system.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_stopped_actor_unregisters() {
        let system = test_system();
        let actor = system.spawn("actor1", echo()).unwrap();

        actor.stop();
        actor.termination().wait(Duration::from_secs(1)).unwrap();

        assert_eq!(actor.status(), ActorStatus::Stopped);
        assert_eq!(system.actor_count(), 0);
        // The identifier can be reused
        assert!(system.actor_of("actor1", echo()).is_ok());

        system.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_shutdown_without_deadline() {
        let system = test_system();
        let actor = system.spawn("actor1", echo()).unwrap();

        assert!(system.shutdown(Duration::MAX));
        assert_eq!(actor.status(), ActorStatus::Stopped);
    }

    #[test]
    fn test_system_shutdown() {
        let system = test_system();
        let first = system.spawn("actor1", echo()).unwrap();
        let second = system.actor_of("actor2", echo()).unwrap();

        assert!(system.shutdown(Duration::from_secs(1)));

        assert_eq!(first.status(), ActorStatus::Stopped);
        assert_eq!(second.status(), ActorStatus::Stopped);
        assert_eq!(system.actor_count(), 0);
        assert!(system.is_shut_down());
        assert!(matches!(
            system.actor_of("actor3", echo()),
            Err(ActorError::Dispatcher(_))
        ));
    }
}
