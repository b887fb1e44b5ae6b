//! Address spaces of a captured entry.
//!
//! A manifest records addresses as they were in device memory at capture
//! time. Those values are only meaningful relative to the start of their
//! image, so every relocation goes through a [`FileOffset`]:
//!
//! ```text
//! CaptureAddress --offset_from(image_start)--> FileOffset --rebase(buffer)--> RuntimeAddress
//! ```
//!
//! None of these conversions ever dereference an address.

use std::ffi::c_void;
use std::fmt;

/// An address recorded at capture time, in device memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CaptureAddress(u64);

impl CaptureAddress {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Reinterpret a signed manifest integer as a pointer value.
    pub const fn from_signed(raw: i64) -> Self {
        Self(raw as u64)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Distance from `base` to `self`, or `None` if `self` lies below `base`
    /// or the distance does not fit the host pointer width.
    pub fn offset_from(self, base: CaptureAddress) -> Option<FileOffset> {
        let delta = self.0.checked_sub(base.0)?;
        usize::try_from(delta).ok().map(FileOffset)
    }
}

impl fmt::Display for CaptureAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// Byte offset into a loaded image buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileOffset(usize);

impl FileOffset {
    pub const fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    /// `Some(self)` when the offset addresses a byte of a `len`-byte buffer.
    pub fn within(self, len: usize) -> Option<Self> {
        (self.0 < len).then_some(self)
    }

    /// The in-process address `base + self`.
    pub fn rebase(self, base: RuntimeAddress) -> Option<RuntimeAddress> {
        base.0.checked_add(self.0).map(RuntimeAddress)
    }
}

impl fmt::Display for FileOffset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An address inside this process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeAddress(usize);

impl RuntimeAddress {
    pub fn of<T>(ptr: *const T) -> Self {
        Self(ptr as usize)
    }

    pub const fn get(self) -> usize {
        self.0
    }

    pub fn offset_from(self, base: RuntimeAddress) -> Option<FileOffset> {
        self.0.checked_sub(base.0).map(FileOffset)
    }

    pub fn as_mut_ptr(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Display for RuntimeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}
