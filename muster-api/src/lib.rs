//! # Muster API
//!
//! Contracts for bringing up a fixed-size pool of workers around one shared
//! memory region. The owner spawns K workers, hands each of them the same
//! [`SharedMemory`] plus a unique [`WorkerId`], and only proceeds once every
//! worker has acknowledged readiness or a bounded wait has expired.
//!
//! ## Core Components
//!
//! - **Shared resource**: [`SharedMemory`], the one region every worker can address
//! - **Wire messages**: [`InitMessage`], [`ToWorker`], [`FromWorker`]
//! - **Collaborators**: [`ModuleLoader`], [`WorkerSpawner`], [`WorkerHandle`]
//! - **Errors**: [`BootstrapError`] and the per-stage error types
//!
//! ## Usage Example
//!
//! ```rust,ignore
//! use muster_api::{SharedMemory, WorkerSpawner};
//!
//! async fn example<S: WorkerSpawner>(spawner: S) {
//!     let memory = SharedMemory::new(4096);
//!     let bootstrapper = muster::WorkerPoolBootstrapper::new(spawner);
//!     let handles = bootstrapper
//!         .bootstrap(memory, 4, std::time::Duration::from_secs(3))
//!         .await
//!         .unwrap();
//!     assert_eq!(handles.len(), 4);
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`types`]: worker identities and common aliases
//! - [`resource`]: the shared memory handle
//! - [`message`]: the handshake and work-phase messages
//! - [`loader`]: the module loader collaborator
//! - [`worker`]: worker spawning and worker handles
//! - [`errors`]: error taxonomy

pub mod errors;
pub mod loader;
pub mod message;
pub mod resource;
pub mod types;
pub mod worker;

pub use errors::{
    AccessError, BootstrapError, ChannelError, LoadError, ProtocolViolation, SetupError, SpawnError,
};
pub use loader::ModuleLoader;
pub use message::{FromWorker, InitMessage, Task, ToWorker, READY_SENTINEL};
pub use resource::SharedMemory;
pub use types::{BootstrapResult, WorkerId};
pub use worker::{WorkerHandle, WorkerSpawner};
