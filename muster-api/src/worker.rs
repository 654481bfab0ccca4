//! # Worker Handles
//!
//! ## Key Concepts
//! - WorkerSpawner: creates one worker per slot and returns its handle
//! - WorkerHandle: owner-side proxy for exactly one worker
//!
//! ## Design Principles
//! - Point-to-point: each handle owns a dedicated channel pair, FIFO per direction
//! - Lifecycle visibility: a closed inbound channel means the worker is gone
//! - Explicit termination: the owner decides when a worker stops

use std::fmt::Debug;

use async_trait::async_trait;

use crate::errors::{ChannelError, SpawnError};
use crate::message::{FromWorker, ToWorker};
use crate::types::WorkerId;

/// Owner-side proxy for one spawned worker.
#[async_trait]
pub trait WorkerHandle: Send + Debug {
    /// Identity assigned to this worker at spawn time.
    fn id(&self) -> WorkerId;

    /// Post a message to the worker without waiting.
    fn post(&self, msg: ToWorker) -> Result<(), ChannelError>;

    /// Wait for the next message from the worker.
    ///
    /// Returns `None` once the worker has exited or was terminated. Must be
    /// cancel-safe: dropping the future never loses a message.
    async fn recv(&mut self) -> Option<FromWorker>;

    /// Ask the worker to stop and release the owner's side of the channel.
    /// Idempotent.
    fn terminate(&mut self);

    fn is_terminated(&self) -> bool;
}

/// Creates workers.
pub trait WorkerSpawner: Send + Sync {
    type Handle: WorkerHandle;

    /// Create the worker for slot `id`. The worker must not do anything
    /// observable to the owner before it receives its init message.
    fn spawn(&self, id: WorkerId) -> Result<Self::Handle, SpawnError>;
}
