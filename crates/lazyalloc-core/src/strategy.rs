//! The three ways of acquiring the benchmark buffer.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::buffer::RawBuffer;
use crate::error::BenchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AllocationStrategy {
    /// `malloc`: virtual memory only, pages are mapped on first access.
    Plain,
    /// `calloc`: zero-filled. On Linux large requests are served by fresh
    /// kernel-zeroed pages, so the allocator may skip the memset and with it the
    /// page faults.
    Zeroing,
    /// `malloc` followed by one write per page, paying the page faults up front.
    Touched,
}

impl AllocationStrategy {
    pub const ALL: [Self; 3] = [Self::Plain, Self::Zeroing, Self::Touched];

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Plain => "plain",
            Self::Zeroing => "zeroing",
            Self::Touched => "touched",
        }
    }

    /// Name of the allocator call sequence, for human-readable headers.
    #[must_use]
    pub const fn allocator_call(self) -> &'static str {
        match self {
            Self::Plain => "malloc",
            Self::Zeroing => "calloc",
            Self::Touched => "malloc + page touch",
        }
    }

    /// Acquire a buffer of `size` bytes. Allocation failure is fatal for the run.
    pub fn allocate(self, size: usize) -> Result<RawBuffer, BenchError> {
        let buffer = match self {
            Self::Plain => RawBuffer::uninit(size),
            Self::Zeroing => RawBuffer::zeroed(size),
            Self::Touched => RawBuffer::uninit(size).map(|mut buf| {
                buf.touch_pages();
                buf
            }),
        };
        buffer.ok_or(BenchError::AllocationFailed {
            strategy: self,
            bytes: size,
        })
    }
}

impl fmt::Display for AllocationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
