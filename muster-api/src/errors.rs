//! # Bootstrap Error Types
//!
//! Errors are captured where they happen and surface to the caller of a
//! bootstrap as a single [`BootstrapError`] naming the worker that failed and
//! why. The owner never partially succeeds.
//!
//! ## Core Components
//!
//! - `LoadError`: the shared resource could not be produced, nothing was spawned
//! - `SpawnError`: a worker slot could not be created
//! - `SetupError`: a worker's local setup failed (travels back as a NACK)
//! - `ChannelError`: a message could not be delivered to a worker
//! - `ProtocolViolation`: a peer broke the handshake rules, logged and rejected
//! - `AccessError`: out-of-bounds access to the shared region
//!
//! ## Usage Example
//!
//! ```rust
//! use muster_api::errors::BootstrapError;
//!
//! fn report(error: BootstrapError) {
//!     match error.worker_id() {
//!         Some(id) => println!("worker {} broke the bootstrap: {}", id, error),
//!         None => println!("bootstrap failed: {}", error),
//!     }
//! }
//! ```

use std::time::Duration;

use thiserror::Error;

use crate::types::WorkerId;

/// The shared resource could not be produced.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Resource image unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid resource size: {0}")]
    InvalidSize(usize),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A worker could not be created.
#[derive(Error, Debug)]
pub enum SpawnError {
    #[error("Failed to create worker thread: {0}")]
    ThreadCreation(#[from] std::io::Error),
    #[error("Worker limit reached (max: {max})")]
    LimitReached { max: usize },
    #[error("Spawner rejected worker: {0}")]
    Rejected(String),
}

/// Local setup inside a worker failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SetupError {
    #[error("Setup failed: {0}")]
    Failed(String),
    #[error("Setup panicked: {0}")]
    Panicked(String),
    #[error("Setup cancelled")]
    Cancelled,
}

impl SetupError {
    pub fn failed(reason: impl Into<String>) -> Self {
        SetupError::Failed(reason.into())
    }
}

impl From<AccessError> for SetupError {
    fn from(error: AccessError) -> Self {
        SetupError::Failed(error.to_string())
    }
}

/// A message could not be delivered to a worker.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    #[error("Worker {0} has been terminated")]
    Terminated(WorkerId),
    #[error("Worker {0} disconnected")]
    Disconnected(WorkerId),
    #[error("Channel to worker {0} is full")]
    Full(WorkerId),
    #[error("No worker {0} in this pool")]
    UnknownWorker(WorkerId),
}

/// A peer broke the handshake rules.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolViolation {
    #[error("Worker {0} reported ready more than once")]
    DuplicateReady(WorkerId),
    #[error("Worker {0} reported ready before it was sent init")]
    ReadyBeforeInit(WorkerId),
    #[error("Worker {0} reported after its handshake was already decided")]
    LateReply(WorkerId),
    #[error("Worker {id} sent an unexpected {kind} message during the handshake")]
    UnexpectedMessage { id: WorkerId, kind: &'static str },
    #[error("Worker {0} received a second init message")]
    DuplicateInit(WorkerId),
    #[error("Worker received a {0} message before init")]
    MessageBeforeInit(&'static str),
    #[error("No worker slot {0} in this pool")]
    UnknownWorker(WorkerId),
}

/// Out-of-bounds access to a shared region.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AccessError {
    #[error("Access of {length} bytes at offset {offset} exceeds region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        length: usize,
        size: usize,
    },
}

/// The single terminal error of a failed bootstrap.
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Failed to load shared resource: {0}")]
    Load(#[from] LoadError),
    #[error("Failed to spawn worker {id}: {source}")]
    Spawn {
        id: WorkerId,
        #[source]
        source: SpawnError,
    },
    #[error("Worker {id} did not acknowledge init within {after:?}")]
    Timeout { id: WorkerId, after: Duration },
    #[error("Worker {id} failed setup: {reason}")]
    SetupFailed { id: WorkerId, reason: String },
    #[error("Worker {id} exited before acknowledging init")]
    WorkerExited { id: WorkerId },
    #[error("Failed to deliver init to worker {id}: {source}")]
    Channel {
        id: WorkerId,
        #[source]
        source: ChannelError,
    },
    #[error("Invalid bootstrap configuration: {0}")]
    Config(String),
}

impl BootstrapError {
    /// Worker whose slot caused the failure, if the failure is tied to one.
    pub fn worker_id(&self) -> Option<WorkerId> {
        match self {
            BootstrapError::Spawn { id, .. }
            | BootstrapError::Timeout { id, .. }
            | BootstrapError::SetupFailed { id, .. }
            | BootstrapError::WorkerExited { id }
            | BootstrapError::Channel { id, .. } => Some(*id),
            BootstrapError::Load(_) | BootstrapError::Config(_) => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, BootstrapError::Timeout { .. })
    }
}
