//! # Worker Channels
//!
//! Each worker talks to its owner over a dedicated pair of bounded `flume`
//! channels, one per direction. Both are FIFO; nothing is shared between the
//! channels of different workers.
//!
//! The owner side is async (`recv_async`), the worker side blocks, since worker
//! code runs on its own OS thread.

use flume::{Receiver, Sender, TrySendError};

use muster_api::{ChannelError, FromWorker, ToWorker, WorkerId};

/// Owner's end of a worker channel.
#[derive(Debug)]
pub struct OwnerEnd {
    pub(crate) outbound: Sender<ToWorker>,
    pub(crate) inbound: Receiver<FromWorker>,
}

/// Worker's end of a worker channel.
#[derive(Debug)]
pub struct WorkerEnd {
    inbound: Receiver<ToWorker>,
    outbound: Sender<FromWorker>,
}

/// Create a connected pair of ends with `capacity` slots per direction.
pub fn duplex(capacity: usize) -> (OwnerEnd, WorkerEnd) {
    let (to_worker_tx, to_worker_rx) = flume::bounded(capacity);
    let (from_worker_tx, from_worker_rx) = flume::bounded(capacity);

    (
        OwnerEnd {
            outbound: to_worker_tx,
            inbound: from_worker_rx,
        },
        WorkerEnd {
            inbound: to_worker_rx,
            outbound: from_worker_tx,
        },
    )
}

/// Non-blocking send used by the owner; a full channel is reported, not awaited.
pub(crate) fn try_post(
    sender: &Sender<ToWorker>,
    id: WorkerId,
    msg: ToWorker,
) -> Result<(), ChannelError> {
    sender.try_send(msg).map_err(|e| match e {
        TrySendError::Full(_) => ChannelError::Full(id),
        TrySendError::Disconnected(_) => ChannelError::Disconnected(id),
    })
}

impl WorkerEnd {
    /// Block until the next message arrives. `None` once the owner is gone and
    /// the queue is drained.
    pub fn recv(&self) -> Option<ToWorker> {
        self.inbound.recv().ok()
    }

    /// Send a reply to the owner. Returns `false` if the owner is gone.
    pub fn reply(&self, msg: FromWorker) -> bool {
        self.outbound.send(msg).is_ok()
    }
}
