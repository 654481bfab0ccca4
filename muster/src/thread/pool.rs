//! # Worker Pool
//!
//! The product of a successful bootstrap: K ready workers around one shared
//! resource. Used for the work phase, which is up to the caller.

use std::fmt;
use std::time::Duration;

use futures::future::join_all;
use tracing::{error, info, warn};
use uuid::Uuid;

use muster_api::{ChannelError, FromWorker, ProtocolViolation, SharedMemory, ToWorker, WorkerHandle, WorkerId};

use crate::thread::error::ShutdownError;
use crate::thread::handle::ThreadWorkerHandle;

/// A bootstrapped pool of ready workers, ordered by [`WorkerId`].
pub struct WorkerPool<H: WorkerHandle> {
    id: Uuid,
    resource: SharedMemory,
    handles: Vec<H>,
}

impl<H: WorkerHandle> fmt::Debug for WorkerPool<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkerPool")
            .field("id", &self.id)
            .field("workers", &self.handles.len())
            .field("resource", &self.resource)
            .finish()
    }
}

impl<H: WorkerHandle> WorkerPool<H> {
    pub fn new(id: Uuid, resource: SharedMemory, handles: Vec<H>) -> Self {
        Self { id, resource, handles }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn resource(&self) -> &SharedMemory {
        &self.resource
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    pub fn ids(&self) -> Vec<WorkerId> {
        self.handles.iter().map(|h| h.id()).collect()
    }

    pub fn get(&self, id: WorkerId) -> Option<&H> {
        self.handles.get(id.index()).filter(|h| h.id() == id)
    }

    pub fn get_mut(&mut self, id: WorkerId) -> Option<&mut H> {
        self.handles.get_mut(id.index()).filter(|h| h.id() == id)
    }

    /// Post one job to worker `id`.
    pub fn send_to(&self, id: WorkerId, job: Vec<u8>) -> Result<(), ChannelError> {
        let handle = self.get(id).ok_or(ChannelError::UnknownWorker(id))?;
        handle.post(ToWorker::Job(job))
    }

    /// Post the same job to every worker.
    ///
    /// Delivery is attempted for every worker even if some fail; the first
    /// failure is returned.
    pub fn broadcast(&self, job: &[u8]) -> Result<(), ChannelError> {
        let mut first_error = None;
        for handle in &self.handles {
            if let Err(e) = handle.post(ToWorker::Job(job.to_vec())) {
                warn!(worker = %handle.id(), error = %e, "broadcast delivery failed");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    /// Next job output from worker `id`. `None` once the worker is gone.
    ///
    /// Leftover handshake replies are protocol violations and are skipped.
    pub async fn recv_from(&mut self, id: WorkerId) -> Option<Vec<u8>> {
        let handle = self.get_mut(id)?;
        loop {
            match handle.recv().await? {
                FromWorker::Output(data) => return Some(data),
                FromWorker::Ready => warn!(worker = %id, "{}", ProtocolViolation::DuplicateReady(id)),
                FromWorker::Nack { .. } => warn!(worker = %id, "{}", ProtocolViolation::LateReply(id)),
            }
        }
    }

    /// Terminate every worker without waiting for them.
    pub fn terminate_all(&mut self) {
        for handle in self.handles.iter_mut() {
            handle.terminate();
        }
    }

    /// Give up the pool and take the handles.
    pub fn into_handles(mut self) -> Vec<H> {
        std::mem::take(&mut self.handles)
    }
}

impl<H: WorkerHandle> Drop for WorkerPool<H> {
    fn drop(&mut self) {
        self.terminate_all();
    }
}

impl WorkerPool<ThreadWorkerHandle> {
    /// Terminate every worker and join their threads, waiting at most
    /// `join_timeout` per worker. Workers are joined concurrently.
    pub async fn shutdown(mut self, join_timeout: Duration) -> Result<(), ShutdownError> {
        let handles = std::mem::take(&mut self.handles);
        let total = handles.len();

        let results = join_all(handles.into_iter().map(|h| h.join(join_timeout))).await;

        let mut failed = 0;
        for result in results {
            if let Err(e) = result {
                error!(pool = %self.id, error = %e, "worker did not shut down cleanly");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(ShutdownError::Incomplete { failed, total });
        }

        info!(pool = %self.id, workers = total, "worker pool shut down");
        Ok(())
    }
}
