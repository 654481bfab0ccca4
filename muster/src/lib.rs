// Muster Worker Pool Bootstrapping
//
// This crate brings up pools of dedicated worker threads around a shared
// memory region and hands them back only once every worker is ready.

pub mod logging;
pub mod thread;

// Re-export commonly used types
pub use muster_api::*;
pub use thread::{
    BootstrapConfig, ImageFileLoader, NoopRoutine, RegionLoader, ShutdownError, ThreadWorkerHandle,
    ThreadWorkerSpawner, WorkerContext, WorkerPool, WorkerPoolBootstrapper, WorkerRoutine, setup_fn,
};
