#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Lion Actor
//!
//! Actor messaging and reply-channel core for the Lion microkernel.
//!
//! Every message travels in an [`Envelope`] together with a [`ReplyChannel`]
//! describing where its reply goes: another actor, a pending future, or
//! nowhere. On top of that the crate provides:
//!
//! - Fire-and-forget sends ([`ActorRef::tell`])
//! - Blocking request-reply ([`ActorRef::ask`])
//! - Future-based request-reply ([`ActorRef::ask_future`])
//! - Forwarding that keeps the original sender ([`Envelope::forward`])
//! - Per-actor serialized processing over a shared worker pool, with
//!   supervision of failing handlers
//!
//! ```no_run
//! use lion_actor::{ActorSystem, Props};
//! use std::time::Duration;
//!
//! let system = ActorSystem::new().unwrap();
//! let echo = system
//!     .spawn(
//!         "echo",
//!         Props::from_fn(|_ctx, envelope| {
//!             envelope.reply(envelope.message().clone())?;
//!             Ok(())
//!         }),
//!     )
//!     .unwrap();
//!
//! let reply = echo.ask_as::<&str>("ping", Duration::from_secs(1)).unwrap();
//! assert_eq!(*reply, "ping");
//! system.terminate();
//! ```

/// Actors, mailboxes, reply channels, supervision and the actor system
pub mod actor;

/// Configuration loading and validation
pub mod config;

/// Error types
pub mod error;

/// Single-assignment futures and promises
pub mod future;

/// Message payloads and envelopes
pub mod message;

/// Worker pool shared by actors
pub mod pool;

pub use actor::{
    Actor, ActorContext, ActorRef, ActorStatus, ActorSystem, BasicSupervisor, Directive,
    DispatcherKind, HandlerResult, Props, ReplyChannel, Supervisor, SupervisorConfig,
};
pub use config::ActorSystemConfig;
pub use error::{ActorError, ConfigError, Result, SystemError};
pub use future::{ActorFuture, ActorPromise, Completion, FutureState};
pub use message::{Envelope, Failure, Message, PoisonPill};
