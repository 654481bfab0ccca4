#![doc = " Thread-backed worker pools for muster."]

pub mod bootstrap;
pub mod channel;
pub mod config;
pub mod error;
pub mod handle;
pub mod handshake;
pub mod loader;
pub mod pool;
pub mod spawner;
pub mod worker;

// Re-export key types for easier usage
pub use bootstrap::WorkerPoolBootstrapper;
pub use config::BootstrapConfig;
pub use error::ShutdownError;
pub use handle::{ThreadWorkerHandle, WorkerState};
pub use handshake::{HandshakeOutcome, HandshakeTable, SlotState};
pub use loader::{ImageFileLoader, RegionLoader};
pub use pool::WorkerPool;
pub use spawner::ThreadWorkerSpawner;
pub use worker::{NoopRoutine, SetupFn, WorkerBootstrapHandler, WorkerContext, WorkerRoutine, setup_fn};
