//! Background execution and host-loop liveness.
//!
//! The host drives the scheduler from a single cooperative loop. Anything that
//! must keep running when that loop stalls (draining queues, flushing the
//! observer) is scheduled on a [`BackgroundService`]. The service also tracks
//! the host heartbeat so the engine can tell whether running work inline on
//! the host thread is still acceptable.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use log::{info, warn};

use crate::error::{RelightResult, ServiceError};

/// Granularity at which sleeping timer threads notice cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default number of jobs that may wait for a free worker.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1024;

/// A repeatable background task.
pub type Task = Arc<dyn Fn() + Send + Sync>;

/// Host liveness plus a place to run periodic background work.
pub trait BackgroundService: Send + Sync {
    /// Records that the host loop is alive. Called once per host tick.
    fn heartbeat(&self);

    /// Returns true if the host loop has beaten within `max_time`.
    fn can_execute_sync(&self, max_time: Duration) -> bool;

    /// Returns true when called from the host thread.
    ///
    /// Advisory. The scheduler takes its queue locks on every thread, so
    /// correctness never depends on this answer; hosts may use it to route
    /// their own work.
    fn is_host_thread(&self) -> bool;

    /// Runs `task` after `initial_delay`, then again `delay` after each run completes.
    fn schedule_with_fixed_delay(
        &self,
        name: &str,
        initial_delay: Duration,
        delay: Duration,
        task: Task,
    ) -> RelightResult<ScheduledTask>;

    /// Stops accepting work and joins the workers.
    fn shutdown(&self);
}

/// Handle to a periodic task. Dropping it cancels the task.
pub struct ScheduledTask {
    name: String,
    cancelled: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl ScheduledTask {
    /// A handle not backed by any thread, for services that drive tasks themselves.
    #[must_use]
    pub fn inert(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cancelled: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    /// Task name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns true once the task will not run again.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.handle.as_ref().is_some_and(JoinHandle::is_finished)
    }

    /// Cancels the task and waits for an in-flight run to return.
    pub fn cancel(mut self) {
        self.cancelled.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            if handle.thread().id() != thread::current().id() {
                let _ = handle.join();
            }
        }
    }
}

impl Drop for ScheduledTask {
    fn drop(&mut self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for ScheduledTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScheduledTask")
            .field("name", &self.name)
            .field("finished", &self.is_finished())
            .finish()
    }
}

enum Job {
    Run(Box<dyn FnOnce() + Send>),
    Stop,
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(workers: usize, queue_capacity: usize) -> Result<Self, ServiceError> {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut pool = Self {
            tx,
            workers: Vec::with_capacity(workers),
            queue_capacity,
        };
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let thread_name = format!("relight-background-{idx}");
            let spawned = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || Self::run_worker(&rx));
            match spawned {
                Ok(handle) => pool.workers.push(handle),
                Err(err) => {
                    pool.shutdown();
                    return Err(ServiceError::SpawnFailed {
                        name: thread_name,
                        message: err.to_string(),
                    });
                }
            }
        }
        Ok(pool)
    }

    fn run_worker(rx: &Receiver<Job>) {
        loop {
            match rx.recv() {
                Ok(Job::Run(job)) => {
                    if panic::catch_unwind(AssertUnwindSafe(job)).is_err() {
                        let name = thread::current().name().unwrap_or("relight-background").to_string();
                        warn!("{name}: background job panicked");
                    }
                }
                Ok(Job::Stop) | Err(_) => break,
            }
        }
    }

    fn try_submit(&self, job: Job) -> Result<(), ServiceError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ServiceError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(ServiceError::Disconnected),
        }
    }

    fn shutdown(self) {
        // Queued jobs run first; each worker exits on its own stop marker.
        for _ in &self.workers {
            let _ = self.tx.send(Job::Stop);
        }
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// [`BackgroundService`] backed by a fixed pool of named worker threads.
///
/// The thread that constructs the service is taken to be the host thread.
pub struct ThreadPoolService {
    pool: Mutex<Option<WorkerPool>>,
    jobs: Sender<Job>,
    queue_capacity: usize,
    stopped: Arc<AtomicBool>,
    last_alive: Mutex<Option<Instant>>,
    host: ThreadId,
}

impl ThreadPoolService {
    /// Starts `core_pool_size` workers with the default queue capacity.
    pub fn new(core_pool_size: usize) -> RelightResult<Self> {
        Self::with_queue_capacity(core_pool_size, DEFAULT_QUEUE_CAPACITY)
    }

    /// Starts `core_pool_size` workers sharing a queue of `queue_capacity` jobs.
    pub fn with_queue_capacity(core_pool_size: usize, queue_capacity: usize) -> RelightResult<Self> {
        let pool = WorkerPool::start(core_pool_size, queue_capacity)?;
        info!(
            "background service started with {} workers",
            pool.workers.len()
        );
        Ok(Self {
            jobs: pool.tx.clone(),
            queue_capacity: pool.queue_capacity,
            pool: Mutex::new(Some(pool)),
            stopped: Arc::new(AtomicBool::new(false)),
            last_alive: Mutex::new(None),
            host: thread::current().id(),
        })
    }

    fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
        mutex.lock().unwrap_or_else(|poisoned| {
            warn!("background service: recovered poisoned lock");
            poisoned.into_inner()
        })
    }

    /// Returns true once [`BackgroundService::shutdown`] has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Runs `job` once on a worker thread.
    pub fn submit<F>(&self, job: F) -> RelightResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        if self.is_shut_down() {
            return Err(ServiceError::ShutDown.into());
        }
        let pool = Self::lock(&self.pool);
        let Some(pool) = pool.as_ref() else {
            return Err(ServiceError::ShutDown.into());
        };
        pool.try_submit(Job::Run(Box::new(job)))?;
        Ok(())
    }

    fn run_timer(timer: &Timer, initial_delay: Duration, delay: Duration, task: &Task) {
        let mut wait = initial_delay;
        loop {
            if !timer.sleep(wait) {
                return;
            }

            let (done_tx, done_rx) = bounded::<()>(1);
            let run = Arc::clone(task);
            let job = Job::Run(Box::new(move || {
                run();
                let _ = done_tx.send(());
            }));
            match timer.jobs.try_send(job) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => {
                    warn!("{}: worker queue full, skipping this run", timer.name);
                    wait = delay;
                    continue;
                }
                Err(TrySendError::Disconnected(_)) => return,
            }

            // Fixed delay: the next wait starts when this run has finished.
            // A submitted run is always awaited, even after cancellation, so
            // `ScheduledTask::cancel` returns only once it is over. Queued jobs
            // still run on pool shutdown, and a panicking run drops `done_tx`.
            let _ = done_rx.recv();
            wait = delay;
        }
    }
}

struct Timer {
    name: String,
    jobs: Sender<Job>,
    cancelled: Arc<AtomicBool>,
    stopped: Arc<AtomicBool>,
}

impl Timer {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire) || self.stopped.load(Ordering::Acquire)
    }

    /// Sleeps for `duration` in short slices. Returns false if cancelled meanwhile.
    fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(POLL_INTERVAL));
        }
    }
}

impl BackgroundService for ThreadPoolService {
    fn heartbeat(&self) {
        *Self::lock(&self.last_alive) = Some(Instant::now());
    }

    fn can_execute_sync(&self, max_time: Duration) -> bool {
        Self::lock(&self.last_alive).is_some_and(|alive| alive.elapsed() < max_time)
    }

    fn is_host_thread(&self) -> bool {
        self.host == thread::current().id()
    }

    fn schedule_with_fixed_delay(
        &self,
        name: &str,
        initial_delay: Duration,
        delay: Duration,
        task: Task,
    ) -> RelightResult<ScheduledTask> {
        if self.is_shut_down() {
            return Err(ServiceError::ShutDown.into());
        }
        let cancelled = Arc::new(AtomicBool::new(false));
        let timer = Timer {
            name: format!("relight-timer-{name}"),
            jobs: self.jobs.clone(),
            cancelled: Arc::clone(&cancelled),
            stopped: Arc::clone(&self.stopped),
        };
        let thread_name = timer.name.clone();
        let handle = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || Self::run_timer(&timer, initial_delay, delay, &task))
            .map_err(|err| ServiceError::SpawnFailed {
                name: thread_name,
                message: err.to_string(),
            })?;

        Ok(ScheduledTask {
            name: name.to_string(),
            cancelled,
            handle: Some(handle),
        })
    }

    fn shutdown(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(pool) = Self::lock(&self.pool).take() {
            pool.shutdown();
        }
        info!(
            "background service shut down (queue capacity {})",
            self.queue_capacity
        );
    }
}

impl Drop for ThreadPoolService {
    fn drop(&mut self) {
        self.shutdown();
    }
}
