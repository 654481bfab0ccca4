use std::fmt;

use crate::errors::BootstrapError;

/// Identity of one worker inside a pool.
///
/// Assigned at spawn time in `[0, K)` and never reassigned. Identities are used
/// for addressing and diagnostics only; they imply no ordering between workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WorkerId(usize);

impl WorkerId {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slot index of this worker in per-pool arenas.
    pub const fn index(self) -> usize {
        self.0
    }
}

impl From<usize> for WorkerId {
    fn from(index: usize) -> Self {
        Self(index)
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type BootstrapResult<T> = Result<T, BootstrapError>;
