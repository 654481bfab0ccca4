use async_trait::async_trait;

use crate::errors::LoadError;
use crate::resource::SharedMemory;

/// Produces the shared resource a pool is bootstrapped around.
///
/// Loading happens before any worker is spawned; a [`LoadError`] aborts the
/// bootstrap with nothing to clean up.
#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn load(&self) -> Result<SharedMemory, LoadError>;
}
