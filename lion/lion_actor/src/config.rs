//! Configuration for the actor system.
//!
//! Every field has a default, so a configuration file only needs to name the
//! values it changes:
//!
//! ```toml
//! name = "gateway"
//! worker_threads = 4
//!
//! [supervisor]
//! directive = "restart"
//! max_restarts = 3
//! ```

use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::actor::SupervisorConfig;
use crate::error::ConfigError;

/// Configuration for an [`ActorSystem`](crate::ActorSystem)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActorSystemConfig {
    /// Name of the system, used in logs
    #[serde(default = "default_name")]
    pub name: String,

    /// Number of worker threads in the shared pool
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,

    /// Messages an actor handles per turn before yielding its worker
    #[serde(default = "default_throughput")]
    pub throughput: usize,

    /// Name prefix for worker and pinned actor threads
    #[serde(default = "default_thread_name_prefix")]
    pub thread_name_prefix: String,

    /// How long `terminate` waits for actors to stop (milliseconds)
    #[serde(default = "default_shutdown_timeout_ms")]
    pub shutdown_timeout_ms: u64,

    /// Default supervision for actors without their own supervisor
    #[serde(default)]
    pub supervisor: SupervisorConfig,
}

fn default_name() -> String {
    "lion".to_string()
}

fn default_worker_threads() -> usize {
    num_cpus::get()
}

fn default_throughput() -> usize {
    16
}

fn default_thread_name_prefix() -> String {
    "lion-actor".to_string()
}

fn default_shutdown_timeout_ms() -> u64 {
    5_000
}

impl Default for ActorSystemConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            worker_threads: default_worker_threads(),
            throughput: default_throughput(),
            thread_name_prefix: default_thread_name_prefix(),
            shutdown_timeout_ms: default_shutdown_timeout_ms(),
            supervisor: SupervisorConfig::default(),
        }
    }
}

impl ActorSystemConfig {
    /// Load and validate configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!("Loading actor system configuration from {}", path.display());

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("name cannot be empty".to_string()));
        }

        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "worker_threads cannot be zero".to_string(),
            ));
        }

        if self.throughput == 0 {
            return Err(ConfigError::Invalid("throughput cannot be zero".to_string()));
        }

        if self.shutdown_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "shutdown_timeout_ms cannot be zero".to_string(),
            ));
        }

        Ok(())
    }

    /// How long `terminate` waits for actors to stop
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::Directive;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
            name = "gateway"
            worker_threads = 3
            shutdown_timeout_ms = 250

            [supervisor]
            directive = "stop"
            "#
        )
        .unwrap();

        let config = ActorSystemConfig::load(file.path()).unwrap();

        assert_eq!(config.name, "gateway");
        assert_eq!(config.worker_threads, 3);
        assert_eq!(config.throughput, 16);
        assert_eq!(config.shutdown_timeout(), Duration::from_millis(250));
        assert_eq!(config.supervisor.directive, Directive::Stop);
        assert_eq!(config.supervisor.max_restarts, 10);
    }

    #[test]
    fn test_default_config() {
        let config = ActorSystemConfig::from_toml_str("").unwrap();

        assert_eq!(config, ActorSystemConfig::default());
        assert_eq!(config.thread_name_prefix, "lion-actor");
        assert!(config.worker_threads > 0);
    }

    #[test]
    fn test_invalid_config() {
        let result = ActorSystemConfig::from_toml_str("worker_threads = 0");
        assert!(matches!(result, Err(ConfigError::Invalid(_))));

        let result = ActorSystemConfig::from_toml_str("throughput = \"many\"");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_missing_file() {
        let result = ActorSystemConfig::load("/nonexistent/lion-actor.toml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
