//! # Handshake Messages
//!
//! The wire contract between a pool owner and one worker. The owner sends
//! exactly one [`InitMessage`] per worker; the worker answers exactly once with
//! [`FromWorker::Ready`] (the `"init done"` sentinel) or, when its local setup
//! fails, with [`FromWorker::Nack`].
//!
//! `Job`, `Output` and `Terminate` belong to the work phase that follows a
//! successful bootstrap and carry no handshake meaning.

use std::fmt;

use crate::resource::SharedMemory;
use crate::types::WorkerId;

/// Textual form of the readiness acknowledgment.
pub const READY_SENTINEL: &str = "init done";

/// Task tag carried by owner-to-worker control messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Task {
    Init,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Task::Init => "init",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `{task: "init", resource, id}`
#[derive(Debug, Clone)]
pub struct InitMessage {
    pub task: Task,
    pub resource: SharedMemory,
    pub id: WorkerId,
}

impl InitMessage {
    pub fn new(id: WorkerId, resource: SharedMemory) -> Self {
        Self {
            task: Task::Init,
            resource,
            id,
        }
    }
}

/// Messages flowing from the owner to a worker.
#[derive(Debug, Clone)]
pub enum ToWorker {
    /// Bind the shared resource and identity, run setup, acknowledge.
    Init(InitMessage),
    /// Work-phase payload.
    Job(Vec<u8>),
    /// Stop the worker.
    Terminate,
}

impl ToWorker {
    pub fn kind(&self) -> &'static str {
        match self {
            ToWorker::Init(_) => "init",
            ToWorker::Job(_) => "job",
            ToWorker::Terminate => "terminate",
        }
    }
}

/// Messages flowing from a worker back to the owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FromWorker {
    /// Local setup completed.
    Ready,
    /// Local setup failed.
    Nack { reason: String },
    /// Result of a work-phase job.
    Output(Vec<u8>),
}

impl FromWorker {
    pub fn is_ready(&self) -> bool {
        matches!(self, FromWorker::Ready)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FromWorker::Ready => "ready",
            FromWorker::Nack { .. } => "nack",
            FromWorker::Output(_) => "output",
        }
    }
}

impl fmt::Display for FromWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FromWorker::Ready => f.write_str(READY_SENTINEL),
            FromWorker::Nack { reason } => write!(f, "init failed: {}", reason),
            FromWorker::Output(data) => write!(f, "output ({} bytes)", data.len()),
        }
    }
}
