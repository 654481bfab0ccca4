//! # Handshake
//!
//! Owner-side bookkeeping for the init → ready exchange.
//!
//! ## Key Concepts
//! - HandshakeTable: one slot per worker, indexed by `WorkerId`
//! - Slot state machine: `Spawned → Pending → {Ready | TimedOut | Failed}`
//! - Timed wait: a message receive raced against a fixed deadline
//!
//! A slot becomes Ready at most once. Replies that do not fit the slot's state
//! are reported as [`ProtocolViolation`]s and leave the table untouched.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::time::Instant;
use tracing::warn;

use muster_api::{FromWorker, ProtocolViolation, WorkerHandle, WorkerId};

use crate::log_handshake;

/// Handshake state of one worker slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState {
    /// Worker exists, init not sent yet
    Spawned,
    /// Init sent, waiting for the reply
    Pending,
    Ready,
    TimedOut,
    Failed(String),
}

impl SlotState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SlotState::Ready | SlotState::TimedOut | SlotState::Failed(_))
    }
}

/// Per-pool handshake state, one slot per worker.
#[derive(Debug, Clone)]
pub struct HandshakeTable {
    slots: Vec<SlotState>,
}

impl HandshakeTable {
    pub fn new(count: usize) -> Self {
        Self {
            slots: vec![SlotState::Spawned; count],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn state(&self, id: WorkerId) -> Option<&SlotState> {
        self.slots.get(id.index())
    }

    fn slot_mut(&mut self, id: WorkerId) -> Result<&mut SlotState, ProtocolViolation> {
        self.slots
            .get_mut(id.index())
            .ok_or(ProtocolViolation::UnknownWorker(id))
    }

    /// Record that the init message for `id` went out.
    pub fn mark_init_sent(&mut self, id: WorkerId) -> Result<(), ProtocolViolation> {
        let slot = self.slot_mut(id)?;
        match *slot {
            SlotState::Spawned => {
                *slot = SlotState::Pending;
                Ok(())
            }
            _ => Err(ProtocolViolation::DuplicateInit(id)),
        }
    }

    /// Record a readiness acknowledgment from `id`.
    pub fn mark_ready(&mut self, id: WorkerId) -> Result<(), ProtocolViolation> {
        let slot = self.slot_mut(id)?;
        match *slot {
            SlotState::Pending => {
                *slot = SlotState::Ready;
                Ok(())
            }
            SlotState::Spawned => Err(ProtocolViolation::ReadyBeforeInit(id)),
            SlotState::Ready => Err(ProtocolViolation::DuplicateReady(id)),
            SlotState::TimedOut | SlotState::Failed(_) => Err(ProtocolViolation::LateReply(id)),
        }
    }

    /// Record that `id` missed its deadline. Only a pending slot can time out.
    pub fn mark_timed_out(&mut self, id: WorkerId) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot @ SlotState::Pending) => {
                *slot = SlotState::TimedOut;
                true
            }
            _ => false,
        }
    }

    /// Record that `id` failed (NACK or exit) before acknowledging.
    pub fn mark_failed(&mut self, id: WorkerId, reason: impl Into<String>) -> bool {
        match self.slots.get_mut(id.index()) {
            Some(slot @ (SlotState::Spawned | SlotState::Pending)) => {
                *slot = SlotState::Failed(reason.into());
                true
            }
            _ => false,
        }
    }

    /// Workers whose handshake is not decided yet.
    pub fn pending(&self) -> Vec<WorkerId> {
        self.ids_where(|s| matches!(s, SlotState::Spawned | SlotState::Pending))
    }

    pub fn ready(&self) -> Vec<WorkerId> {
        self.ids_where(|s| matches!(s, SlotState::Ready))
    }

    pub fn ready_count(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, SlotState::Ready)).count()
    }

    pub fn pending_count(&self) -> usize {
        self.slots
            .iter()
            .filter(|s| matches!(s, SlotState::Spawned | SlotState::Pending))
            .count()
    }

    /// First slot that ended in a non-ready terminal state.
    pub fn failure(&self) -> Option<(WorkerId, &SlotState)> {
        self.slots
            .iter()
            .enumerate()
            .find(|(_, s)| matches!(s, SlotState::TimedOut | SlotState::Failed(_)))
            .map(|(index, s)| (WorkerId::new(index), s))
    }

    /// Every slot is Ready.
    pub fn is_complete(&self) -> bool {
        self.ready_count() == self.slots.len()
    }

    fn ids_where(&self, pred: impl Fn(&SlotState) -> bool) -> Vec<WorkerId> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| pred(s))
            .map(|(index, _)| WorkerId::new(index))
            .collect()
    }
}

/// Stand-in for "no deadline", matching what tokio uses for far-off sleeps.
const FAR_FUTURE: Duration = Duration::from_secs(86400 * 365 * 30);

/// Deadline `timeout` from now. Timeouts too large to represent, such as
/// `Duration::MAX`, are capped to a deadline that never fires in practice.
pub fn deadline_after(timeout: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(timeout).unwrap_or_else(|| now + FAR_FUTURE)
}

/// Result of one timed receive.
#[derive(Debug, PartialEq, Eq)]
pub enum TimedRecv<T> {
    Message(T),
    /// Worker exited or was terminated
    Closed,
    Elapsed,
}

/// Wait for the next message from `handle`, giving up at `deadline`.
///
/// Cancel-safe; a message that is already queued wins over an elapsed deadline.
pub async fn recv_until<H>(handle: &mut H, deadline: Instant) -> TimedRecv<FromWorker>
where
    H: WorkerHandle + ?Sized,
{
    tokio::select! {
        biased;
        msg = handle.recv() => match msg {
            Some(msg) => TimedRecv::Message(msg),
            None => TimedRecv::Closed,
        },
        _ = tokio::time::sleep_until(deadline) => TimedRecv::Elapsed,
    }
}

/// Terminal outcome of one worker's handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandshakeOutcome {
    Ready,
    TimedOut(Duration),
    Nack(String),
    Exited,
}

/// One worker's handshake wait, resolving to its id and outcome.
pub type HandshakeFuture<'a> = BoxFuture<'a, (WorkerId, HandshakeOutcome)>;

/// Wait for `handle` to acknowledge its init message before `deadline`.
///
/// Anything other than Ready or a NACK is logged and skipped; the deadline is
/// not extended by it. `timeout` is only reported back in the outcome.
pub fn handshake<'a, H>(handle: &'a mut H, deadline: Instant, timeout: Duration) -> HandshakeFuture<'a>
where
    H: WorkerHandle,
{
    async move {
        let id = handle.id();
        let outcome = loop {
            match recv_until(handle, deadline).await {
                TimedRecv::Message(FromWorker::Ready) => break HandshakeOutcome::Ready,
                TimedRecv::Message(FromWorker::Nack { reason }) => break HandshakeOutcome::Nack(reason),
                TimedRecv::Message(other) => {
                    warn!(
                        worker = %id,
                        "{}",
                        ProtocolViolation::UnexpectedMessage { id, kind: other.kind() }
                    );
                }
                TimedRecv::Closed => break HandshakeOutcome::Exited,
                TimedRecv::Elapsed => break HandshakeOutcome::TimedOut(timeout),
            }
        };
        log_handshake!(id, "decided", outcome = ?outcome);
        (id, outcome)
    }
    .boxed()
}
