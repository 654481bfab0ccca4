use thiserror::Error;

use muster_api::WorkerId;

pub use muster_api::errors::{
    AccessError, BootstrapError, ChannelError, LoadError, ProtocolViolation, SetupError, SpawnError,
};

/// Errors raised while stopping and joining worker threads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ShutdownError {
    #[error("Timeout waiting for worker {0} to terminate")]
    JoinTimeout(WorkerId),
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: WorkerId, message: String },
    #[error("Failed to join worker {id}: {reason}")]
    JoinFailed { id: WorkerId, reason: String },
    #[error("Failed to stop {failed} of {total} workers")]
    Incomplete { failed: usize, total: usize },
}
