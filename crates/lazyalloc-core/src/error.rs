//! Error types for benchmark construction and trial execution.

use thiserror::Error;

use crate::strategy::AllocationStrategy;

#[derive(Debug, Error)]
pub enum BenchError {
    #[error("buffer size must be at least 1 MiB")]
    ZeroSize,
    #[error("{mib} MiB does not fit in the address space")]
    SizeOverflow { mib: usize },
    /// The allocator returned null. There is no fallback: the run aborts.
    #[error("{strategy} allocation of {bytes} bytes failed")]
    AllocationFailed {
        strategy: AllocationStrategy,
        bytes: usize,
    },
    #[error("no {strategy} trial to compare against")]
    MissingTrial { strategy: AllocationStrategy },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}
