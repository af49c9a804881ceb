//! Error types for the actor messaging core.
//!
//! `ActorError` is the error surfaced by dispatch operations and carried by
//! failed futures, so it is `Clone`: every reader of a completed future
//! observes the same failure.

use std::time::Duration;
use thiserror::Error;

use crate::actor::ActorId;
use crate::pool::ThreadPoolError;

/// Result type used throughout the crate.
pub type Result<T, E = ActorError> = std::result::Result<T, E>;

/// Errors surfaced by actor dispatch, replies and futures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ActorError {
    /// A blocking request-reply did not complete before its deadline
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// A strict reply was attempted on a message that carries no reply channel
    #[error("message has no reply target")]
    NoReplyTarget,

    /// No actor is registered under the given identifier
    #[error("actor not found: {0}")]
    ActorNotFound(ActorId),

    /// An actor is already registered under the given identifier
    #[error("actor already exists: {0}")]
    AlreadyExists(ActorId),

    /// A message handler or lifecycle hook failed
    #[error("actor {actor} failed: {reason}")]
    HandlerFailure {
        /// Actor whose handler failed
        actor: ActorId,
        /// Rendered failure cause
        reason: String,
    },

    /// The target actor is stopped and its mailbox no longer accepts messages
    #[error("mailbox is closed for actor: {0}")]
    MailboxClosed(ActorId),

    /// The target actor exists but has not been started yet
    #[error("actor not started: {0}")]
    NotStarted(ActorId),

    /// A reply arrived but did not have the requested type
    #[error("unexpected reply: expected {expected}, got {actual}")]
    UnexpectedReply {
        /// Type the caller asked for
        expected: &'static str,
        /// Type the reply actually carried
        actual: &'static str,
    },

    /// The worker pool refused to schedule work
    #[error("dispatcher error: {0}")]
    Dispatcher(String),
}

impl ActorError {
    /// Whether this error is a request-reply timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }
}

/// Errors raised while creating an actor system.
#[derive(Error, Debug)]
pub enum SystemError {
    /// The configuration was rejected
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The worker pool could not be created
    #[error("failed to create worker pool: {0}")]
    Pool(#[from] ThreadPoolError),
}

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration file is not valid TOML for the expected schema
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration parsed but holds an unusable value
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
