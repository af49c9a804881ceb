//! Actor-based concurrency with message passing and supervision.
//!
//! This module provides the actor model implementation for Lion, including:
//!
//! - Mailboxes and the per-actor processing loop
//! - Reply channels that carry a sender's identity with each message
//! - The dispatch operations on actor references (tell, ask, forward)
//! - Actor supervision and failure recovery
//! - The actor system that owns actors and resolves them by identifier

pub mod behavior;
pub mod cell;
pub mod channel;
pub mod context;
pub mod mailbox;
pub mod props;
pub mod reference;
pub mod supervisor;
pub mod system;

/// Unique identifier for an actor
pub type ActorId = String;

pub use behavior::{Actor, HandlerError, HandlerResult};
pub use cell::{ActorStats, ActorStatus};
pub use channel::ReplyChannel;
pub use context::ActorContext;
pub use mailbox::{Dequeued, Mailbox, MailboxError};
pub use props::{ActorFactory, DispatcherKind, Props};
pub use reference::ActorRef;
pub use supervisor::{BasicSupervisor, Directive, Supervisor, SupervisorConfig};
pub use system::ActorSystem;
