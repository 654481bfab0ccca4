//! # Worker Pool Bootstrapper
//!
//! Brings up K workers around one shared resource and returns them only once
//! every one of them has acknowledged its init message.
//!
//! ## Key Concepts
//! - Init delivery: each worker gets its init right after it is spawned, so a
//!   slow worker never delays another worker's init
//! - Concurrent waits: all K handshakes are polled together; the first failure
//!   decides the bootstrap without waiting for the remaining deadlines
//! - All-or-nothing: on failure every spawned worker is terminated, including
//!   the ones that already acknowledged, and no handle escapes

use std::time::Duration;

use futures::stream::{FuturesUnordered, StreamExt};
use tracing::{Instrument, debug, error, info, warn};
use uuid::Uuid;

use muster_api::{
    BootstrapError, BootstrapResult, InitMessage, ModuleLoader, SharedMemory, ToWorker,
    WorkerHandle, WorkerId, WorkerSpawner,
};

use crate::{log_error, pool_span};
use crate::thread::config::BootstrapConfig;
use crate::thread::handshake::{
    HandshakeFuture, HandshakeOutcome, HandshakeTable, deadline_after, handshake,
};
use crate::thread::handle::ThreadWorkerHandle;
use crate::thread::pool::WorkerPool;
use crate::thread::spawner::ThreadWorkerSpawner;
use crate::thread::worker::WorkerRoutine;

/// Spawns and synchronizes worker pools.
#[derive(Debug)]
pub struct WorkerPoolBootstrapper<S> {
    spawner: S,
}

impl<S: WorkerSpawner> WorkerPoolBootstrapper<S> {
    pub fn new(spawner: S) -> Self {
        Self { spawner }
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn into_spawner(self) -> S {
        self.spawner
    }

    /// Spawn `count` workers, hand each of them `resource`, and wait until all
    /// of them are ready.
    ///
    /// On success the handles are returned ordered by [`WorkerId`]. On failure
    /// every spawned worker has been terminated.
    pub async fn bootstrap(
        &self,
        resource: SharedMemory,
        count: usize,
        per_worker_timeout: Duration,
    ) -> BootstrapResult<Vec<S::Handle>> {
        let pool_id = Uuid::new_v4();
        self.run(resource, count, per_worker_timeout)
            .instrument(pool_span!(pool_id, count))
            .await
    }

    /// Like [`bootstrap`](Self::bootstrap), wrapping the handles into a [`WorkerPool`].
    pub async fn bootstrap_pool(
        &self,
        resource: SharedMemory,
        count: usize,
        per_worker_timeout: Duration,
    ) -> BootstrapResult<WorkerPool<S::Handle>> {
        let pool_id = Uuid::new_v4();
        let handles = self
            .run(resource.clone(), count, per_worker_timeout)
            .instrument(pool_span!(pool_id, count))
            .await?;
        Ok(WorkerPool::new(pool_id, resource, handles))
    }

    /// Load the shared resource first. A load failure aborts before anything
    /// is spawned.
    pub async fn bootstrap_with_loader<L>(
        &self,
        loader: &L,
        count: usize,
        per_worker_timeout: Duration,
    ) -> BootstrapResult<WorkerPool<S::Handle>>
    where
        L: ModuleLoader + ?Sized,
    {
        let resource = loader.load().await.map_err(|e| {
            log_error!(e, "failed to load shared resource");
            BootstrapError::Load(e)
        })?;
        debug!(resource_len = resource.len(), "shared resource loaded");
        self.bootstrap_pool(resource, count, per_worker_timeout).await
    }

    async fn run(
        &self,
        resource: SharedMemory,
        count: usize,
        per_worker_timeout: Duration,
    ) -> BootstrapResult<Vec<S::Handle>> {
        if count == 0 {
            debug!("empty pool, nothing to bootstrap");
            return Ok(Vec::new());
        }

        let mut table = HandshakeTable::new(count);
        let mut handles: Vec<S::Handle> = Vec::with_capacity(count);
        let mut deadlines = Vec::with_capacity(count);

        for index in 0..count {
            let id = WorkerId::new(index);

            let handle = match self.spawner.spawn(id) {
                Ok(handle) => handle,
                Err(source) => {
                    error!(worker = %id, error = %source, "failed to spawn worker");
                    terminate_all(&mut handles);
                    return Err(BootstrapError::Spawn { id, source });
                }
            };
            handles.push(handle);

            let init = ToWorker::Init(InitMessage::new(id, resource.clone()));
            if let Err(source) = handles[index].post(init) {
                error!(worker = %id, error = %source, "failed to deliver init");
                terminate_all(&mut handles);
                return Err(BootstrapError::Channel { id, source });
            }
            // The deadline starts when the init is out, not when waiting starts
            deadlines.push(deadline_after(per_worker_timeout));

            if let Err(violation) = table.mark_init_sent(id) {
                warn!(worker = %id, "{}", violation);
            }
        }

        debug!("init delivered to all workers, awaiting handshakes");

        let failure = {
            let mut waits: FuturesUnordered<HandshakeFuture<'_>> = handles
                .iter_mut()
                .zip(deadlines)
                .map(|(handle, deadline)| handshake(handle, deadline, per_worker_timeout))
                .collect();

            let mut failure = None;
            while let Some((id, outcome)) = waits.next().await {
                if let Some(error) = record_outcome(&mut table, id, outcome) {
                    failure = Some(error);
                    break;
                }
            }
            // Dropping the remaining waits abandons them and releases the handles
            failure
        };

        let failure = failure.or_else(|| {
            // Every wait ended in Ready; this only trips if the table disagrees
            table.pending().first().map(|id| BootstrapError::WorkerExited { id: *id })
        });

        if let Some(error) = failure {
            warn!(
                error = %error,
                ready = table.ready_count(),
                pending = table.pending_count(),
                "bootstrap failed, terminating all workers"
            );
            terminate_all(&mut handles);
            return Err(error);
        }

        info!(workers = count, "worker pool ready");
        Ok(handles)
    }
}

impl<F, R> WorkerPoolBootstrapper<ThreadWorkerSpawner<F>>
where
    F: Fn() -> R + Send + Sync,
    R: WorkerRoutine,
{
    /// Take the pool size and timeout from `config`.
    ///
    /// The remaining fields are fixed when the spawner is built
    /// ([`ThreadWorkerSpawner::with_config`]); a config that disagrees with
    /// the spawner is rejected before anything is spawned.
    pub async fn bootstrap_with_config(
        &self,
        resource: SharedMemory,
        config: &BootstrapConfig,
    ) -> BootstrapResult<WorkerPool<ThreadWorkerHandle>> {
        config.validate()?;
        self.spawner
            .check_config(config)
            .inspect_err(|e| warn!(error = %e, "config does not match the spawner"))?;
        self.bootstrap_pool(resource, config.worker_count, config.per_worker_timeout)
            .await
    }
}

/// Fold one handshake outcome into the table. Returns the bootstrap error it
/// causes, if any.
fn record_outcome(
    table: &mut HandshakeTable,
    id: WorkerId,
    outcome: HandshakeOutcome,
) -> Option<BootstrapError> {
    match outcome {
        HandshakeOutcome::Ready => {
            match table.mark_ready(id) {
                Ok(()) => debug!(worker = %id, ready = table.ready_count(), "worker acknowledged init"),
                Err(violation) => warn!(worker = %id, "{}", violation),
            }
            None
        }
        HandshakeOutcome::TimedOut(after) => {
            table.mark_timed_out(id);
            error!(worker = %id, timeout = ?after, "worker did not acknowledge init in time");
            Some(BootstrapError::Timeout { id, after })
        }
        HandshakeOutcome::Nack(reason) => {
            table.mark_failed(id, reason.clone());
            error!(worker = %id, reason = %reason, "worker rejected init");
            Some(BootstrapError::SetupFailed { id, reason })
        }
        HandshakeOutcome::Exited => {
            table.mark_failed(id, "exited");
            error!(worker = %id, "worker exited during handshake");
            Some(BootstrapError::WorkerExited { id })
        }
    }
}

fn terminate_all<H: WorkerHandle>(handles: &mut [H]) {
    for handle in handles.iter_mut() {
        handle.terminate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_outcome_counts_ready_once() {
        let mut table = HandshakeTable::new(2);
        table.mark_init_sent(WorkerId::new(0)).unwrap();
        table.mark_init_sent(WorkerId::new(1)).unwrap();

        assert!(record_outcome(&mut table, WorkerId::new(0), HandshakeOutcome::Ready).is_none());
        assert!(record_outcome(&mut table, WorkerId::new(0), HandshakeOutcome::Ready).is_none());

        assert_eq!(table.ready_count(), 1);
        assert_eq!(table.pending(), vec![WorkerId::new(1)]);
    }

    #[test]
    fn test_record_outcome_maps_failures() {
        let mut table = HandshakeTable::new(3);
        for i in 0..3 {
            table.mark_init_sent(WorkerId::new(i)).unwrap();
        }

        let timeout = record_outcome(
            &mut table,
            WorkerId::new(0),
            HandshakeOutcome::TimedOut(Duration::from_millis(5)),
        );
        assert!(matches!(timeout, Some(BootstrapError::Timeout { id, .. }) if id == WorkerId::new(0)));

        let nack = record_outcome(&mut table, WorkerId::new(1), HandshakeOutcome::Nack("bad".into()));
        assert!(matches!(nack, Some(BootstrapError::SetupFailed { ref reason, .. }) if reason == "bad"));

        let exited = record_outcome(&mut table, WorkerId::new(2), HandshakeOutcome::Exited);
        assert!(matches!(exited, Some(BootstrapError::WorkerExited { .. })));
    }
}
