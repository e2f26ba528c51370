//! Raw buffers acquired from the system allocator.
//!
//! Buffers come from `malloc` / `calloc` directly rather than `Vec` so the
//! allocator's own zeroing behavior is what gets measured. A [`RawBuffer`] owns
//! its allocation and releases it with `free` on drop, so a buffer cannot
//! outlive the trial that created it.

use std::ffi::c_void;
use std::hint::black_box;
use std::ptr::NonNull;

use crate::config::PAGE_SIZE;

/// Owned, possibly uninitialized, heap region of `len` bytes.
#[derive(Debug)]
pub struct RawBuffer {
    ptr: NonNull<u8>,
    len: usize,
    /// Every byte has been written, either by `calloc` or a full fill.
    initialized: bool,
}

impl RawBuffer {
    /// `malloc(len)`. Contents are uninitialized; returns `None` when the allocator fails.
    #[must_use]
    pub fn uninit(len: usize) -> Option<Self> {
        // SAFETY: malloc has no preconditions; a null return is handled below.
        let raw = unsafe { libc::malloc(len) };
        Self::from_raw(raw, len, false)
    }

    /// `calloc(1, len)`. Contents are zero-filled per the allocator contract.
    #[must_use]
    pub fn zeroed(len: usize) -> Option<Self> {
        // SAFETY: calloc has no preconditions; a null return is handled below.
        let raw = unsafe { libc::calloc(1, len) };
        Self::from_raw(raw, len, true)
    }

    fn from_raw(raw: *mut c_void, len: usize, initialized: bool) -> Option<Self> {
        NonNull::new(raw.cast::<u8>()).map(|ptr| Self {
            ptr,
            len,
            initialized,
        })
    }

    /// Write one byte at the start of every page, forcing the kernel to map it.
    ///
    /// Offsets `0, PAGE_SIZE, 2 * PAGE_SIZE, ..` below `len` are written, so a
    /// trailing partial page is touched only at its first byte. Returns the
    /// number of pages touched.
    pub fn touch_pages(&mut self) -> usize {
        let base = self.ptr.as_ptr();
        let mut touched = 0;
        for offset in (0..self.len).step_by(PAGE_SIZE) {
            // SAFETY: offset < len and the allocation is valid for len bytes.
            unsafe { base.add(offset).write(0) };
            touched += 1;
        }
        black_box(base);
        touched
    }

    /// Write `buf[i] = i as u8` over the whole buffer, front to back.
    pub fn fill_sequential(&mut self) {
        let base = self.ptr.as_ptr();
        for i in 0..self.len {
            // SAFETY: i < len and the allocation is valid for len bytes.
            unsafe { base.add(i).write(i as u8) };
        }
        // Keeps the stores observable so they are not elided before `free`.
        black_box(base);
        self.initialized = true;
    }

    /// View the contents, or `None` while some bytes may still be uninitialized.
    #[must_use]
    pub fn as_slice(&self) -> Option<&[u8]> {
        if !self.initialized {
            return None;
        }
        // SAFETY: the region is valid for len bytes and every byte has been
        // written, either by calloc or by fill_sequential.
        Some(unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.len) })
    }
}

impl Drop for RawBuffer {
    fn drop(&mut self) {
        // SAFETY: ptr came from malloc/calloc and is freed exactly once here.
        unsafe { libc::free(self.ptr.as_ptr().cast::<c_void>()) };
    }
}
