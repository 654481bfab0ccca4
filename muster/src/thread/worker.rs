//! # Worker Bootstrap Handler
//!
//! Runs inside each worker thread. The handler owns the worker's side of the
//! handshake:
//!
//! - the first `Init` binds the shared resource and the worker's identity into a
//!   [`WorkerContext`], runs the routine's setup, and answers exactly once
//! - every later `Init` is a protocol violation and is ignored
//! - jobs are only dispatched once setup succeeded
//!
//! ## Key Concepts
//! - WorkerRoutine: user code, setup plus optional job handling
//! - WorkerContext: identity and resource of one worker, fixed at init
//! - Panic isolation: routine panics are caught and turned into a NACK or a
//!   clean exit

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, warn};

use muster_api::{
    FromWorker, InitMessage, ProtocolViolation, SetupError, SharedMemory, ToWorker, WorkerId,
};

use crate::thread::channel::WorkerEnd;
use crate::{log_handshake, log_worker};

/// Everything a worker learns from its init message.
///
/// Built once per worker and never reassigned.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    id: WorkerId,
    resource: SharedMemory,
    cancelled: Arc<AtomicBool>,
}

impl WorkerContext {
    pub(crate) fn new(id: WorkerId, resource: SharedMemory, cancelled: Arc<AtomicBool>) -> Self {
        Self {
            id,
            resource,
            cancelled,
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn resource(&self) -> &SharedMemory {
        &self.resource
    }

    /// Whether the owner has terminated this worker. Long setups should poll
    /// this and give up with [`SetupError::Cancelled`].
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Code that runs inside a worker.
pub trait WorkerRoutine: Send + 'static {
    /// Local setup that must finish before the worker may join the pool.
    fn setup(&mut self, ctx: &WorkerContext) -> Result<(), SetupError>;

    /// Handle one work-phase job. `Some` is sent back to the owner.
    fn handle(&mut self, ctx: &WorkerContext, job: Vec<u8>) -> Option<Vec<u8>> {
        let _ = (ctx, job);
        None
    }
}

/// Routine with no setup and no job handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRoutine;

impl WorkerRoutine for NoopRoutine {
    fn setup(&mut self, _ctx: &WorkerContext) -> Result<(), SetupError> {
        Ok(())
    }
}

/// Routine built from a setup closure. See [`setup_fn`].
pub struct SetupFn<F>(F);

/// Wrap a closure as a setup-only routine.
///
/// ```rust
/// use muster::thread::worker::setup_fn;
///
/// let routine = setup_fn(|ctx| {
///     ctx.resource().store(ctx.id().index(), 1)?;
///     Ok(())
/// });
/// # let _ = routine;
/// ```
pub fn setup_fn<F>(f: F) -> SetupFn<F>
where
    F: FnMut(&WorkerContext) -> Result<(), SetupError> + Send + 'static,
{
    SetupFn(f)
}

impl<F> WorkerRoutine for SetupFn<F>
where
    F: FnMut(&WorkerContext) -> Result<(), SetupError> + Send + 'static,
{
    fn setup(&mut self, ctx: &WorkerContext) -> Result<(), SetupError> {
        (self.0)(ctx)
    }
}

#[derive(Debug)]
enum HandlerState {
    AwaitingInit,
    Ready(WorkerContext),
    SetupFailed(WorkerId),
}

/// What the run loop should do after one message.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Continue,
    Reply(FromWorker),
    Stop,
}

/// Worker side of the handshake.
pub struct WorkerBootstrapHandler<R> {
    routine: R,
    state: HandlerState,
    cancelled: Arc<AtomicBool>,
    nack_on_failure: bool,
}

impl<R: WorkerRoutine> WorkerBootstrapHandler<R> {
    pub fn new(routine: R, cancelled: Arc<AtomicBool>, nack_on_failure: bool) -> Self {
        Self {
            routine,
            state: HandlerState::AwaitingInit,
            cancelled,
            nack_on_failure,
        }
    }

    /// Identity bound by the first init message, if any.
    pub fn worker_id(&self) -> Option<WorkerId> {
        match &self.state {
            HandlerState::AwaitingInit => None,
            HandlerState::Ready(ctx) => Some(ctx.id()),
            HandlerState::SetupFailed(id) => Some(*id),
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, HandlerState::Ready(_))
    }

    /// Process one inbound message.
    pub fn on_message(&mut self, msg: ToWorker) -> Step {
        if self.cancelled.load(Ordering::SeqCst) {
            return Step::Stop;
        }

        match msg {
            ToWorker::Init(init) => self.on_init(init),
            ToWorker::Job(job) => self.on_job(job),
            ToWorker::Terminate => Step::Stop,
        }
    }

    fn on_init(&mut self, init: InitMessage) -> Step {
        if let Some(id) = self.worker_id() {
            // The init listener is single-use
            warn!(worker = %id, "{}", ProtocolViolation::DuplicateInit(id));
            return Step::Continue;
        }

        let ctx = WorkerContext::new(init.id, init.resource, Arc::clone(&self.cancelled));
        log_handshake!(ctx.id(), "init received", resource_len = ctx.resource().len());

        let routine = &mut self.routine;
        let result = panic::catch_unwind(AssertUnwindSafe(|| routine.setup(&ctx)))
            .unwrap_or_else(|payload| Err(SetupError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(()) => {
                log_worker!(ctx.id(), "ready");
                self.state = HandlerState::Ready(ctx);
                Step::Reply(FromWorker::Ready)
            }
            Err(e) => {
                error!(worker = %ctx.id(), error = %e, "worker setup failed");
                self.state = HandlerState::SetupFailed(ctx.id());
                if self.nack_on_failure {
                    Step::Reply(FromWorker::Nack { reason: e.to_string() })
                } else {
                    Step::Continue
                }
            }
        }
    }

    fn on_job(&mut self, job: Vec<u8>) -> Step {
        let ctx = match &self.state {
            HandlerState::Ready(ctx) => ctx,
            HandlerState::AwaitingInit => {
                warn!("{}", ProtocolViolation::MessageBeforeInit("job"));
                return Step::Continue;
            }
            HandlerState::SetupFailed(id) => {
                debug!(worker = %id, "dropping job, setup failed");
                return Step::Continue;
            }
        };

        let routine = &mut self.routine;
        match panic::catch_unwind(AssertUnwindSafe(|| routine.handle(ctx, job))) {
            Ok(Some(output)) => Step::Reply(FromWorker::Output(output)),
            Ok(None) => Step::Continue,
            Err(payload) => {
                error!(
                    worker = %ctx.id(),
                    panic = %panic_message(payload.as_ref()),
                    "worker routine panicked while handling a job"
                );
                Step::Stop
            }
        }
    }

    /// Serve messages from `end` until terminated or disconnected.
    pub fn run(mut self, end: WorkerEnd) {
        while let Some(msg) = end.recv() {
            match self.on_message(msg) {
                Step::Continue => {}
                Step::Reply(reply) => {
                    if !end.reply(reply) {
                        break;
                    }
                }
                Step::Stop => break,
            }
        }

        match self.worker_id() {
            Some(id) => log_worker!(id, "stopped"),
            None => debug!("worker stopped before init"),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    }
}
