// Shared helpers for muster integration tests
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use flume::{Receiver, Sender};

use muster::{ChannelError, FromWorker, SpawnError, ToWorker, WorkerHandle, WorkerId, WorkerSpawner};

/// How a scripted worker answers its init message.
#[derive(Debug, Clone)]
pub enum Script {
    /// Acknowledge after `delay`
    Ready(Duration),
    /// Acknowledge twice in a row
    ReadyTwice,
    /// Send an output message before acknowledging
    ChatterThenReady,
    /// Never answer
    Silent,
    /// Reject the init after `delay`
    Nack(Duration, String),
    /// Exit without answering
    Exit,
    /// Channel is closed before the init can be delivered
    Unreachable,
    /// The spawner refuses to create this worker
    FailSpawn,
}

/// Owner-side handle to a scripted tokio task standing in for a worker.
#[derive(Debug)]
pub struct MockHandle {
    id: WorkerId,
    outbound: Option<Sender<ToWorker>>,
    inbound: Receiver<FromWorker>,
    terminated: Arc<AtomicBool>,
}

#[async_trait]
impl WorkerHandle for MockHandle {
    fn id(&self) -> WorkerId {
        self.id
    }

    fn post(&self, msg: ToWorker) -> Result<(), ChannelError> {
        match &self.outbound {
            Some(sender) => sender.send(msg).map_err(|_| ChannelError::Disconnected(self.id)),
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
        self.terminated.store(true, Ordering::SeqCst);
        self.outbound = None;
    }

    fn is_terminated(&self) -> bool {
        self.outbound.is_none()
    }
}

/// Spawner whose workers follow a per-id [`Script`]. Unscripted ids are
/// ready immediately.
///
/// Handles are not terminated on drop, so the flags show exactly what the
/// bootstrapper terminated.
#[derive(Default)]
pub struct MockSpawner {
    scripts: HashMap<usize, Script>,
    spawned: AtomicUsize,
    inits: Arc<AtomicUsize>,
    terminated: Mutex<Vec<Arc<AtomicBool>>>,
}

impl MockSpawner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(mut self, index: usize, script: Script) -> Self {
        self.scripts.insert(index, script);
        self
    }

    /// Spawn attempts, including refused ones.
    pub fn spawned(&self) -> usize {
        self.spawned.load(Ordering::SeqCst)
    }

    /// Init messages received by workers.
    pub fn inits(&self) -> usize {
        self.inits.load(Ordering::SeqCst)
    }

    /// Whether every created worker was terminated.
    pub fn all_terminated(&self) -> bool {
        let flags = self.terminated.lock().unwrap();
        !flags.is_empty() && flags.iter().all(|f| f.load(Ordering::SeqCst))
    }

    pub fn terminated_count(&self) -> usize {
        let flags = self.terminated.lock().unwrap();
        flags.iter().filter(|f| f.load(Ordering::SeqCst)).count()
    }
}

impl WorkerSpawner for MockSpawner {
    type Handle = MockHandle;

    fn spawn(&self, id: WorkerId) -> Result<MockHandle, SpawnError> {
        self.spawned.fetch_add(1, Ordering::SeqCst);
        let script = self
            .scripts
            .get(&id.index())
            .cloned()
            .unwrap_or(Script::Ready(Duration::ZERO));

        if let Script::FailSpawn = script {
            return Err(SpawnError::Rejected(format!("scripted failure for worker {}", id)));
        }

        let (to_worker, worker_rx) = flume::unbounded();
        let (worker_tx, from_worker) = flume::unbounded();

        if let Script::Unreachable = script {
            drop(worker_rx);
        } else {
            tokio::spawn(run_script(script, worker_rx, worker_tx, Arc::clone(&self.inits)));
        }

        let terminated = Arc::new(AtomicBool::new(false));
        self.terminated.lock().unwrap().push(Arc::clone(&terminated));

        Ok(MockHandle {
            id,
            outbound: Some(to_worker),
            inbound: from_worker,
            terminated,
        })
    }
}

async fn run_script(script: Script, rx: Receiver<ToWorker>, tx: Sender<FromWorker>, inits: Arc<AtomicUsize>) {
    let init = match rx.recv_async().await {
        Ok(ToWorker::Init(init)) => init,
        _ => return,
    };
    inits.fetch_add(1, Ordering::SeqCst);

    match script {
        Script::Ready(delay) => {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FromWorker::Ready);
        }
        Script::ReadyTwice => {
            let _ = tx.send(FromWorker::Ready);
            let _ = tx.send(FromWorker::Ready);
        }
        Script::ChatterThenReady => {
            let _ = tx.send(FromWorker::Output(b"early".to_vec()));
            let _ = tx.send(FromWorker::Ready);
        }
        Script::Nack(delay, reason) => {
            tokio::time::sleep(delay).await;
            let _ = tx.send(FromWorker::Nack { reason });
        }
        Script::Exit => return,
        Script::Silent | Script::Unreachable | Script::FailSpawn => {}
    }

    // Work phase: echo jobs back until terminated
    while let Ok(msg) = rx.recv_async().await {
        match msg {
            ToWorker::Job(job) => {
                let _ = tx.send(FromWorker::Output(job));
            }
            ToWorker::Terminate => break,
            ToWorker::Init(_) => {}
        }
    }
    drop(init);
}

/// Poll `cond` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Default wait for background threads to wind down.
pub const SETTLE_TIME: Duration = Duration::from_secs(2);
