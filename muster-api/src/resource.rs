//! # Shared Resource Handle
//!
//! ## Key Concepts
//! - One block of memory, addressed concurrently by the owner and every worker
//! - Handles are cheap to clone and `Send + Sync`; cloning never copies the block
//! - Access is byte-granular through atomic cells with relaxed ordering
//!
//! No access discipline is imposed here. Workers treat the region as
//! setup-only until the owner signals that the pool is ready.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use crate::errors::AccessError;

/// Transferable handle to one shared memory region.
#[derive(Clone)]
pub struct SharedMemory {
    cells: Arc<[AtomicU8]>,
}

impl SharedMemory {
    /// Allocate a zeroed region of `size` bytes.
    pub fn new(size: usize) -> Self {
        let cells: Arc<[AtomicU8]> = (0..size).map(|_| AtomicU8::new(0)).collect();
        Self { cells }
    }

    /// Allocate a region initialized with a copy of `image`.
    pub fn from_image(image: &[u8]) -> Self {
        let cells: Arc<[AtomicU8]> = image.iter().map(|b| AtomicU8::new(*b)).collect();
        Self { cells }
    }

    /// Size of the region in bytes.
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Read a single byte.
    pub fn load(&self, offset: usize) -> Result<u8, AccessError> {
        self.check(offset, 1)?;
        Ok(self.cells[offset].load(Ordering::Relaxed))
    }

    /// Write a single byte.
    pub fn store(&self, offset: usize, value: u8) -> Result<(), AccessError> {
        self.check(offset, 1)?;
        self.cells[offset].store(value, Ordering::Relaxed);
        Ok(())
    }

    /// Copy `buf.len()` bytes starting at `offset` into `buf`.
    pub fn read(&self, offset: usize, buf: &mut [u8]) -> Result<(), AccessError> {
        self.check(offset, buf.len())?;
        for (cell, out) in self.cells[offset..offset + buf.len()].iter().zip(buf.iter_mut()) {
            *out = cell.load(Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy `data` into the region starting at `offset`.
    pub fn write(&self, offset: usize, data: &[u8]) -> Result<(), AccessError> {
        self.check(offset, data.len())?;
        for (cell, value) in self.cells[offset..offset + data.len()].iter().zip(data) {
            cell.store(*value, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Copy the whole region out.
    pub fn snapshot(&self) -> Vec<u8> {
        self.cells.iter().map(|cell| cell.load(Ordering::Relaxed)).collect()
    }

    /// Number of live handles to this region, this one included.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.cells)
    }

    /// Whether both handles refer to the same region.
    pub fn same_region(&self, other: &SharedMemory) -> bool {
        Arc::ptr_eq(&self.cells, &other.cells)
    }

    fn check(&self, offset: usize, length: usize) -> Result<(), AccessError> {
        let size = self.cells.len();
        match offset.checked_add(length) {
            Some(end) if end <= size => Ok(()),
            _ => Err(AccessError::OutOfBounds { offset, length, size }),
        }
    }
}

impl fmt::Debug for SharedMemory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedMemory")
            .field("len", &self.len())
            .field("handles", &self.handle_count())
            .finish()
    }
}
