//! # Thread Worker Spawner
//!
//! One dedicated OS thread per worker. The spawner enforces an upper bound on
//! live worker threads and keeps an exact count of them: the count is taken
//! before the thread starts and released by a guard when the thread exits,
//! panic or not.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use tracing::error;

use muster_api::{BootstrapError, SpawnError, WorkerId, WorkerSpawner};

use crate::{log_worker, worker_span};
use crate::logging::current_subscriber;
use crate::thread::channel;
use crate::thread::config::BootstrapConfig;
use crate::thread::handle::ThreadWorkerHandle;
use crate::thread::worker::{WorkerBootstrapHandler, WorkerRoutine};

/// Releases one live-worker slot when dropped.
struct ActiveGuard(Arc<AtomicUsize>);

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Spawns workers running routines produced by `factory`.
pub struct ThreadWorkerSpawner<F> {
    factory: F,
    max_workers: usize,
    channel_capacity: usize,
    thread_name_prefix: String,
    nack_on_setup_failure: bool,
    active: Arc<AtomicUsize>,
}

impl<F> fmt::Debug for ThreadWorkerSpawner<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadWorkerSpawner")
            .field("max_workers", &self.max_workers)
            .field("active_workers", &self.active_workers())
            .field("thread_name_prefix", &self.thread_name_prefix)
            .finish()
    }
}

impl<F, R> ThreadWorkerSpawner<F>
where
    F: Fn() -> R + Send + Sync,
    R: WorkerRoutine,
{
    pub fn new(factory: F) -> Self {
        Self::with_config(factory, &BootstrapConfig::default())
    }

    pub fn with_config(factory: F, config: &BootstrapConfig) -> Self {
        Self {
            factory,
            max_workers: config.max_workers,
            channel_capacity: config.channel_capacity,
            thread_name_prefix: config.thread_name_prefix.clone(),
            nack_on_setup_failure: config.nack_on_setup_failure,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl<F> ThreadWorkerSpawner<F> {
    /// Worker threads that have been started and not yet exited.
    pub fn active_workers(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Reject a config whose spawn-time settings differ from the ones this
    /// spawner was built with, since those cannot change per bootstrap.
    pub fn check_config(&self, config: &BootstrapConfig) -> Result<(), BootstrapError> {
        let mismatch = if config.max_workers != self.max_workers {
            Some(("max_workers", config.max_workers.to_string(), self.max_workers.to_string()))
        } else if config.channel_capacity != self.channel_capacity {
            Some((
                "channel_capacity",
                config.channel_capacity.to_string(),
                self.channel_capacity.to_string(),
            ))
        } else if config.thread_name_prefix != self.thread_name_prefix {
            Some((
                "thread_name_prefix",
                config.thread_name_prefix.clone(),
                self.thread_name_prefix.clone(),
            ))
        } else if config.nack_on_setup_failure != self.nack_on_setup_failure {
            Some((
                "nack_on_setup_failure",
                config.nack_on_setup_failure.to_string(),
                self.nack_on_setup_failure.to_string(),
            ))
        } else {
            None
        };

        match mismatch {
            Some((field, requested, actual)) => Err(BootstrapError::Config(format!(
                "{} is {} but the spawner was built with {}",
                field, requested, actual
            ))),
            None => Ok(()),
        }
    }
}

impl<F, R> WorkerSpawner for ThreadWorkerSpawner<F>
where
    F: Fn() -> R + Send + Sync,
    R: WorkerRoutine,
{
    type Handle = ThreadWorkerHandle;

    fn spawn(&self, id: WorkerId) -> Result<ThreadWorkerHandle, SpawnError> {
        // Reserve a slot first so concurrent spawns cannot overshoot the limit
        let previous = self.active.fetch_add(1, Ordering::SeqCst);
        let guard = ActiveGuard(Arc::clone(&self.active));
        if previous >= self.max_workers {
            return Err(SpawnError::LimitReached {
                max: self.max_workers,
            });
        }

        let (owner_end, worker_end) = channel::duplex(self.channel_capacity);
        let cancelled = Arc::new(AtomicBool::new(false));
        let handler =
            WorkerBootstrapHandler::new((self.factory)(), Arc::clone(&cancelled), self.nack_on_setup_failure);
        let dispatch = current_subscriber();

        let thread = std::thread::Builder::new()
            .name(format!("{}{}", self.thread_name_prefix, id))
            .spawn(move || {
                let _guard = guard;
                tracing::dispatcher::with_default(&dispatch, || {
                    let _span = worker_span!(id).entered();
                    handler.run(worker_end)
                });
            })
            .map_err(|e| {
                error!(worker = %id, error = %e, "failed to create worker thread");
                SpawnError::ThreadCreation(e)
            })?;

        log_worker!(id, "spawned");
        Ok(ThreadWorkerHandle::new(id, owner_end, cancelled, thread))
    }
}
