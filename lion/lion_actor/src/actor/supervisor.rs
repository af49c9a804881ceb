//! Actor supervision and failure recovery.
//!
//! When a handler or lifecycle hook fails, the processing loop asks the
//! actor's supervisor what to do and obeys the returned [`Directive`].

use log::{error, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use super::{ActorId, ActorRef};
use crate::error::ActorError;

/// What the processing loop does after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Directive {
    /// Keep the current instance and continue with the next message
    Resume,

    /// Replace the instance with a fresh one from the actor's props
    Restart,

    /// Stop the actor
    Stop,
}

/// Configuration for a supervisor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Directive applied to every failure
    #[serde(default = "default_directive")]
    pub directive: Directive,

    /// Maximum number of restarts within the window before the actor is stopped
    #[serde(default = "default_max_restarts")]
    pub max_restarts: usize,

    /// Time window for counting restarts (milliseconds)
    #[serde(default = "default_restart_window_ms")]
    pub restart_window_ms: u64,
}

fn default_directive() -> Directive {
    Directive::Restart
}

fn default_max_restarts() -> usize {
    10
}

fn default_restart_window_ms() -> u64 {
    60_000
}

impl SupervisorConfig {
    /// Time window for counting restarts
    pub fn restart_window(&self) -> Duration {
        Duration::from_millis(self.restart_window_ms)
    }
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            directive: default_directive(),
            max_restarts: default_max_restarts(),
            restart_window_ms: default_restart_window_ms(),
        }
    }
}

/// Interface for supervising actors
pub trait Supervisor: Send + Sync {
    /// Decide how to handle a failed actor
    fn handle_failure(&self, actor: &ActorRef, cause: &ActorError) -> Directive;

    /// Notification that a supervised actor has stopped for good
    fn actor_stopped(&self, _actor_id: &str) {}
}

/// Applies one configured directive, stopping actors that restart too often
#[derive(Debug)]
pub struct BasicSupervisor {
    config: SupervisorConfig,
    restarts: Mutex<HashMap<ActorId, VecDeque<Instant>>>,
}

impl BasicSupervisor {
    /// Create a new basic supervisor
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            restarts: Mutex::new(HashMap::new()),
        }
    }

    /// Get the supervisor configuration
    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Restarts recorded for an actor within the current window
    pub fn restart_count(&self, actor_id: &str) -> usize {
        self.restarts
            .lock()
            .get(actor_id)
            .map_or(0, |history| history.len())
    }

    /// Record a restart if the actor is still within its budget
    fn admit_restart(&self, actor_id: &str) -> bool {
        let now = Instant::now();
        let window = self.config.restart_window();
        let mut restarts = self.restarts.lock();
        let history = restarts.entry(actor_id.to_string()).or_default();

        while history
            .front()
            .is_some_and(|at| now.duration_since(*at) > window)
        {
            history.pop_front();
        }

        if history.len() >= self.config.max_restarts {
            return false;
        }
        history.push_back(now);
        true
    }
}

impl Default for BasicSupervisor {
    fn default() -> Self {
        Self::new(SupervisorConfig::default())
    }
}

impl Supervisor for BasicSupervisor {
    fn handle_failure(&self, actor: &ActorRef, cause: &ActorError) -> Directive {
        error!("Actor failure: {} - Error: {}", actor.id(), cause);

        match self.config.directive {
            Directive::Restart => {
                if self.admit_restart(actor.id()) {
                    Directive::Restart
                } else {
                    warn!(
                        "Max restart attempts ({}) exceeded for actor {}, stopping",
                        self.config.max_restarts,
                        actor.id()
                    );
                    Directive::Stop
                }
            }
            directive => directive,
        }
    }

    fn actor_stopped(&self, actor_id: &str) {
        self.restarts.lock().remove(actor_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supervisor_config_default() {
        let config = SupervisorConfig::default();

        assert_eq!(config.directive, Directive::Restart);
        assert_eq!(config.max_restarts, 10);
        assert_eq!(config.restart_window(), Duration::from_secs(60));
    }

    #[test]
    fn test_restart_budget() {
        let supervisor = BasicSupervisor::new(SupervisorConfig {
            max_restarts: 2,
            ..Default::default()
        });

        assert!(supervisor.admit_restart("worker"));
        assert!(supervisor.admit_restart("worker"));
        assert!(!supervisor.admit_restart("worker"));
        assert_eq!(supervisor.restart_count("worker"), 2);

        // Budgets are per actor
        assert!(supervisor.admit_restart("other"));

        supervisor.actor_stopped("worker");
        assert_eq!(supervisor.restart_count("worker"), 0);
    }

    #[test]
    fn test_restart_window_expires() {
        let supervisor = BasicSupervisor::new(SupervisorConfig {
            max_restarts: 1,
            restart_window_ms: 20,
            ..Default::default()
        });

        assert!(supervisor.admit_restart("worker"));
        assert!(!supervisor.admit_restart("worker"));

        std::thread::sleep(Duration::from_millis(40));
        assert!(supervisor.admit_restart("worker"));
    }

    #[test]
    fn test_directive_deserialize() {
        let config: SupervisorConfig = toml::from_str("directive = \"resume\"").unwrap();

        assert_eq!(config.directive, Directive::Resume);
        assert_eq!(config.max_restarts, 10);
    }
}
