//! Module loaders producing the shared region a pool is built around.

use std::path::PathBuf;

use anyhow::anyhow;
use async_trait::async_trait;
use tracing::debug;

use muster_api::{LoadError, ModuleLoader, SharedMemory};

/// Allocates a zeroed region, optionally seeded with an image at offset 0.
#[derive(Debug, Clone)]
pub struct RegionLoader {
    size: usize,
    image: Option<Vec<u8>>,
}

impl RegionLoader {
    pub fn new(size: usize) -> Self {
        Self { size, image: None }
    }

    /// Copy `image` into the start of the region. The image must fit.
    pub fn with_image(mut self, image: Vec<u8>) -> Self {
        self.image = Some(image);
        self
    }
}

#[async_trait]
impl ModuleLoader for RegionLoader {
    async fn load(&self) -> Result<SharedMemory, LoadError> {
        if self.size == 0 {
            return Err(LoadError::InvalidSize(0));
        }

        let region = SharedMemory::new(self.size);
        if let Some(image) = &self.image {
            region
                .write(0, image)
                .map_err(|e| LoadError::Other(anyhow!(e).context("image does not fit the region")))?;
        }
        Ok(region)
    }
}

/// Reads the region image from a file at load time.
///
/// The region is the size of the file, or `min_size` if that is larger.
#[derive(Debug, Clone)]
pub struct ImageFileLoader {
    path: PathBuf,
    min_size: usize,
}

impl ImageFileLoader {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            min_size: 0,
        }
    }

    pub fn with_min_size(mut self, min_size: usize) -> Self {
        self.min_size = min_size;
        self
    }
}

#[async_trait]
impl ModuleLoader for ImageFileLoader {
    async fn load(&self) -> Result<SharedMemory, LoadError> {
        let image = tokio::fs::read(&self.path)
            .await
            .map_err(|e| LoadError::Unavailable(format!("{}: {}", self.path.display(), e)))?;
        debug!(path = %self.path.display(), bytes = image.len(), "image read");

        RegionLoader::new(image.len().max(self.min_size))
            .with_image(image)
            .load()
            .await
    }
}
