//! # Thread Worker Handle
//!
//! Owner-side proxy for one worker running on a dedicated OS thread.
//!
//! ## Key Concepts
//! - Lifecycle: Running → Terminating → Stopped
//! - Termination: cancel flag, best-effort `Terminate`, then the outbound
//!   sender is dropped so the worker's receive loop sees a disconnect
//! - Joining is optional and bounded; a worker stuck in setup cannot be forced
//!   off its thread, it can only be told to stop

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use async_trait::async_trait;
use flume::Receiver;
use tokio::time::timeout;

use muster_api::{ChannelError, FromWorker, ToWorker, WorkerHandle, WorkerId};

use crate::log_worker;
use crate::thread::channel::{self, OwnerEnd};
use crate::thread::error::ShutdownError;

/// States a worker handle can be in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Worker thread is running
    Running,
    /// Termination was requested, thread may still be winding down
    Terminating,
    /// Worker thread has been joined
    Stopped,
}

/// Handle to one worker thread
pub struct ThreadWorkerHandle {
    id: WorkerId,

    /// Dropped on terminate
    outbound: Option<flume::Sender<ToWorker>>,

    inbound: Receiver<FromWorker>,

    /// Shared with the worker's context
    cancelled: Arc<AtomicBool>,

    thread: Option<JoinHandle<()>>,

    state: WorkerState,
}

impl fmt::Debug for ThreadWorkerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadWorkerHandle")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("has_thread", &self.thread.is_some())
            .finish()
    }
}

impl ThreadWorkerHandle {
    pub(crate) fn new(
        id: WorkerId,
        end: OwnerEnd,
        cancelled: Arc<AtomicBool>,
        thread: JoinHandle<()>,
    ) -> Self {
        Self {
            id,
            outbound: Some(end.outbound),
            inbound: end.inbound,
            cancelled,
            thread: Some(thread),
            state: WorkerState::Running,
        }
    }

    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Whether the worker thread has exited, joined or not.
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(|t| t.is_finished())
    }

    /// Terminate the worker and wait up to `wait` for its thread to exit.
    pub async fn join(mut self, wait: Duration) -> Result<(), ShutdownError> {
        self.terminate();

        let Some(thread) = self.thread.take() else {
            return Ok(());
        };
        let id = self.id;

        let join_handle = tokio::task::spawn_blocking(move || thread.join());

        match timeout(wait, join_handle).await {
            Ok(Ok(Ok(()))) => {
                self.state = WorkerState::Stopped;
                Ok(())
            }
            Ok(Ok(Err(payload))) => {
                self.state = WorkerState::Stopped;
                let message = if let Some(s) = payload.downcast_ref::<String>() {
                    s.clone()
                } else if let Some(s) = payload.downcast_ref::<&str>() {
                    s.to_string()
                } else {
                    "Unknown panic".to_string()
                };
                Err(ShutdownError::Panicked { id, message })
            }
            Ok(Err(e)) => Err(ShutdownError::JoinFailed {
                id,
                reason: e.to_string(),
            }),
            // The blocking join keeps running; the thread is detached
            Err(_) => Err(ShutdownError::JoinTimeout(id)),
        }
    }
}

#[async_trait]
impl WorkerHandle for ThreadWorkerHandle {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn post(&self, msg: ToWorker) -> Result<(), ChannelError> {
        match &self.outbound {
            Some(sender) => channel::try_post(sender, self.id, msg),
            None => Err(ChannelError::Terminated(self.id)),
        }
    }

    async fn recv(&mut self) -> Option<FromWorker> {
        if self.outbound.is_none() {
            return None;
        }
        self.inbound.recv_async().await.ok()
    }

    fn terminate(&mut self) {
        let Some(sender) = self.outbound.take() else {
            return;
        };

        self.cancelled.store(true, Ordering::SeqCst);
        // Best effort; a full channel still sees the disconnect once drained
        let _ = sender.try_send(ToWorker::Terminate);
        drop(sender);

        self.state = WorkerState::Terminating;
        log_worker!(self.id, "terminating");
    }

    fn is_terminated(&self) -> bool {
        self.outbound.is_none()
    }
}

impl Drop for ThreadWorkerHandle {
    fn drop(&mut self) {
        // A dropped handle never leaves its worker running
        self.terminate();
    }
}
