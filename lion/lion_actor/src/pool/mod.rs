//! Worker threads that actor turns and future callbacks execute on.

pub mod thread;

pub use thread::{ThreadPool, ThreadPoolConfig, ThreadPoolError, ThreadPoolStats};
