//! Worker pool that actor turns and future callbacks run on.
//!
//! Actors sharing the pool are multiplexed over a fixed set of worker threads.
//! The task queue is unbounded so that scheduling an actor turn never blocks
//! the thread that enqueued a message. Tasks accepted before shutdown still
//! run: workers drain the queue before they exit.

use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, error, info, trace};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Error when submitting a task to the thread pool
#[derive(Error, Debug)]
pub enum ThreadPoolError {
    /// The thread pool is shutting down
    #[error("thread pool is shutting down")]
    ShuttingDown,

    /// A worker thread could not be spawned
    #[error("failed to spawn worker thread: {0}")]
    Spawn(String),
}

/// Statistics about the thread pool
#[derive(Debug, Default, Clone)]
pub struct ThreadPoolStats {
    /// Number of tasks queued
    pub tasks_queued: usize,

    /// Number of tasks completed
    pub tasks_completed: usize,

    /// Number of tasks that panicked
    pub tasks_panicked: usize,

    /// Total task execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Queue wait time (microseconds)
    pub total_queue_time_us: u64,
}

/// Configuration for the thread pool
#[derive(Debug, Clone)]
pub struct ThreadPoolConfig {
    /// Number of worker threads
    pub threads: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,
}

impl Default for ThreadPoolConfig {
    fn default() -> Self {
        Self {
            threads: num_cpus::get(),
            thread_name_prefix: "lion-actor".to_string(),
        }
    }
}

/// Task with metadata for tracking
struct Task {
    /// The closure to execute
    func: Box<dyn FnOnce() + Send + 'static>,

    /// When the task was enqueued
    enqueued_at: Instant,
}

impl Task {
    fn new<F>(f: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            func: Box::new(f),
            enqueued_at: Instant::now(),
        }
    }
}

/// Counters shared between the pool handle and its workers
#[derive(Debug, Default)]
struct Counters {
    tasks_queued: AtomicUsize,
    tasks_completed: AtomicUsize,
    tasks_panicked: AtomicUsize,
    total_execution_time_us: AtomicUsize,
    total_queue_time_us: AtomicUsize,
}

/// Worker context holding shared state for the worker loop
struct WorkerContext {
    receiver: Receiver<Task>,
    shutdown_flag: Arc<AtomicBool>,
    counters: Arc<Counters>,
}

/// A fixed-size pool of worker threads
pub struct ThreadPool {
    /// Channel for sending tasks to worker threads
    task_sender: Sender<Task>,

    /// Worker threads, drained on join
    workers: Mutex<Vec<JoinHandle<()>>>,

    /// Identifiers of the worker threads
    worker_ids: Vec<ThreadId>,

    /// Flag indicating if the pool is shutting down
    is_shutting_down: Arc<AtomicBool>,

    /// Statistics counters
    counters: Arc<Counters>,
}

impl ThreadPool {
    /// Create a new thread pool with `threads` workers
    pub fn new(threads: usize) -> Result<Self, ThreadPoolError> {
        Self::with_config(ThreadPoolConfig {
            threads,
            ..Default::default()
        })
    }

    /// Create a new thread pool with the specified configuration
    pub fn with_config(config: ThreadPoolConfig) -> Result<Self, ThreadPoolError> {
        let (task_sender, task_receiver) = unbounded();
        let is_shutting_down = Arc::new(AtomicBool::new(false));
        let counters = Arc::new(Counters::default());

        info!("Creating thread pool with {} workers", config.threads);

        let mut workers = Vec::with_capacity(config.threads);
        let mut worker_ids = Vec::with_capacity(config.threads);

        for id in 0..config.threads {
            let thread_name = format!("{}-{}", config.thread_name_prefix, id);
            let ctx = WorkerContext {
                receiver: task_receiver.clone(),
                shutdown_flag: Arc::clone(&is_shutting_down),
                counters: Arc::clone(&counters),
            };

            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || Self::worker_loop(id, ctx))
                .map_err(|e| {
                    is_shutting_down.store(true, Ordering::Relaxed);
                    ThreadPoolError::Spawn(e.to_string())
                })?;

            worker_ids.push(handle.thread().id());
            workers.push(handle);
        }

        Ok(Self {
            task_sender,
            workers: Mutex::new(workers),
            worker_ids,
            is_shutting_down,
            counters,
        })
    }

    /// Worker thread main loop
    fn worker_loop(id: usize, ctx: WorkerContext) {
        debug!("Worker {}: Starting", id);

        while !ctx.shutdown_flag.load(Ordering::Relaxed) {
            // Wait for a task or check shutdown flag every 100ms
            match ctx.receiver.recv_timeout(Duration::from_millis(100)) {
                Ok(task) => Self::run_task(id, task, &ctx.counters),
                Err(_) => continue,
            }
        }

        // Tasks accepted before the flag was raised still run
        while let Ok(task) = ctx.receiver.try_recv() {
            Self::run_task(id, task, &ctx.counters);
        }

        debug!("Worker {}: Shutting down", id);
    }

    fn run_task(id: usize, task: Task, counters: &Counters) {
        let queue_time = task.enqueued_at.elapsed();
        counters
            .total_queue_time_us
            .fetch_add(queue_time.as_micros() as usize, Ordering::Relaxed);

        let exec_start = Instant::now();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(task.func));
        let exec_time = exec_start.elapsed();

        counters
            .total_execution_time_us
            .fetch_add(exec_time.as_micros() as usize, Ordering::Relaxed);

        match result {
            Ok(()) => {
                trace!(
                    "Worker {}: Task completed in {:.2}ms",
                    id,
                    exec_time.as_micros() as f64 / 1000.0
                );
                counters.tasks_completed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                error!(
                    "Worker {}: Task panicked: {:?}",
                    id,
                    e.downcast_ref::<&str>().unwrap_or(&"<unknown panic>")
                );
                counters.tasks_panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Submit a task to be executed by the thread pool
    pub fn execute<F>(&self, f: F) -> Result<(), ThreadPoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shutting_down.load(Ordering::Relaxed) {
            return Err(ThreadPoolError::ShuttingDown);
        }

        self.task_sender
            .send(Task::new(f))
            .map_err(|_| ThreadPoolError::ShuttingDown)?;
        self.counters.tasks_queued.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Get current statistics for the thread pool
    pub fn get_stats(&self) -> ThreadPoolStats {
        ThreadPoolStats {
            tasks_queued: self.counters.tasks_queued.load(Ordering::Relaxed),
            tasks_completed: self.counters.tasks_completed.load(Ordering::Relaxed),
            tasks_panicked: self.counters.tasks_panicked.load(Ordering::Relaxed),
            total_execution_time_us: self.counters.total_execution_time_us.load(Ordering::Relaxed)
                as u64,
            total_queue_time_us: self.counters.total_queue_time_us.load(Ordering::Relaxed) as u64,
        }
    }

    /// Stop accepting tasks. Workers exit the next time they poll the flag.
    pub fn shutdown(&self) {
        if !self.is_shutting_down.swap(true, Ordering::Relaxed) {
            info!("Shutting down thread pool");
        }
    }

    /// Shut down the pool and wait for every worker to exit.
    ///
    /// Workers run every task still queued before they exit. When called from
    /// one of the pool's own workers, that worker is left to exit on its own.
    pub fn shutdown_and_join(&self) {
        self.shutdown();

        let current = thread::current().id();
        let workers: Vec<_> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if worker.thread().id() == current {
                continue;
            }
            worker.join().unwrap_or_else(|e| {
                error!("Worker thread panicked during shutdown: {:?}", e);
            });
        }

        info!("Thread pool shutdown complete");
    }

    /// Get the number of worker threads
    pub fn worker_count(&self) -> usize {
        self.worker_ids.len()
    }

    /// Whether the calling thread is one of this pool's workers
    pub fn is_worker_thread(&self) -> bool {
        self.worker_ids.contains(&thread::current().id())
    }

    /// Check if the thread pool is shutting down
    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::Relaxed)
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        self.shutdown();
        debug!("Thread pool dropped - workers will exit when they next check the shutdown flag");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    #[test]
    fn test_thread_pool_basic() {
        let pool = ThreadPool::new(4).unwrap();

        let counter = Arc::new(AtomicUsize::new(0));
        let counter_clone = counter.clone();

        pool.execute(move || {
            counter_clone.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

        // Give the task time to complete
        thread::sleep(Duration::from_millis(50));

        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert_eq!(pool.worker_count(), 4);
    }

    #[test]
    fn test_thread_pool_panic_handling() {
        let pool = ThreadPool::new(1).unwrap();

        let flag = Arc::new(AtomicBool::new(false));
        let flag_clone = flag.clone();

        pool.execute(|| {
            panic!("This task should panic");
        })
        .unwrap();

        // The single worker survives the panic and runs the next task
        pool.execute(move || {
            flag_clone.store(true, Ordering::SeqCst);
        })
        .unwrap();

        thread::sleep(Duration::from_millis(100));

        assert!(flag.load(Ordering::SeqCst));
        assert_eq!(pool.get_stats().tasks_panicked, 1);
    }

    #[test]
    fn test_thread_pool_shutdown_rejects_tasks() {
        let pool = ThreadPool::new(2).unwrap();

        pool.shutdown();

        let result = pool.execute(|| {});
        assert!(matches!(result, Err(ThreadPoolError::ShuttingDown)));
        assert!(pool.is_shutting_down());
    }

    #[test]
    fn test_thread_pool_shutdown_and_join() {
        let pool = ThreadPool::new(2).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..4 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        thread::sleep(Duration::from_millis(50));
        pool.shutdown_and_join();

        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(pool.get_stats().tasks_completed, 4);
    }

    #[test]
    fn test_worker_thread_detection() {
        let pool = Arc::new(ThreadPool::new(1).unwrap());
        let seen = Arc::new(StdMutex::new(None));

        let pool_clone = pool.clone();
        let seen_clone = seen.clone();
        pool.execute(move || {
            *seen_clone.lock().unwrap() = Some(pool_clone.is_worker_thread());
        })
        .unwrap();

        thread::sleep(Duration::from_millis(50));

        assert_eq!(*seen.lock().unwrap(), Some(true));
        assert!(!pool.is_worker_thread());
    }

    #[test]
    fn test_queued_tasks_run_after_shutdown() {
        let pool = ThreadPool::new(1).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));

        // Keep the only worker busy so the rest stay queued
        pool.execute(|| thread::sleep(Duration::from_millis(150)))
            .unwrap();
        for _ in 0..3 {
            let counter = counter.clone();
            pool.execute(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
        }

        pool.shutdown_and_join();

        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(pool.get_stats().tasks_completed, 4);
    }
}
