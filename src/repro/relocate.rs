//! Entry relocation.
//!
//! Rebases every entry of a captured image onto the buffer the image was
//! loaded into. A captured address only says where the entry sat relative
//! to `ImageStart` in device memory at capture time; it is converted to a
//! [`FileOffset`] and rebased, never dereferenced.

use std::ffi::CString;

use crate::error::ReplayError;
use crate::repro::address::{CaptureAddress, FileOffset, RuntimeAddress};
use crate::repro::image::LoadedImage;
use crate::repro::manifest::{CapturedEntry, CapturedImage};

/// A captured entry rebased into this process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelocatedEntry {
    /// Address inside the loaded image buffer.
    pub address: RuntimeAddress,
    /// Offset of the entry within its image.
    pub offset: FileOffset,
    /// Address the entry had at capture time.
    pub captured: CaptureAddress,
    /// Owned, NUL-terminated copy of the entry name.
    pub name: CString,
    pub size: usize,
    pub flags: i32,
    pub reserved: i32,
}

impl RelocatedEntry {
    pub fn name_lossy(&self) -> std::borrow::Cow<'_, str> {
        self.name.to_string_lossy()
    }
}

/// Relocate every entry of `image` onto `loaded`, preserving entry order.
pub fn relocate_entries(
    image: &CapturedImage,
    loaded: &LoadedImage,
) -> Result<Vec<RelocatedEntry>, ReplayError> {
    image
        .entries
        .iter()
        .map(|entry| relocate_entry(image, loaded, entry))
        .collect()
}

fn relocate_entry(
    image: &CapturedImage,
    loaded: &LoadedImage,
    entry: &CapturedEntry,
) -> Result<RelocatedEntry, ReplayError> {
    let offset = entry
        .address
        .offset_from(image.image_start)
        .and_then(|offset| offset.within(loaded.len()))
        .ok_or_else(|| {
            ReplayError::consistency(format!(
                "{}: entry {} at {} lies outside [{}, {}) of a {}-byte image",
                image.file_name,
                entry.name,
                entry.address,
                image.image_start,
                image.image_end,
                loaded.len()
            ))
        })?;

    let address = offset.rebase(loaded.base()).ok_or_else(|| {
        ReplayError::consistency(format!(
            "{}: entry {} overflows the address space",
            image.file_name, entry.name
        ))
    })?;

    let name = CString::new(entry.name.as_str()).map_err(|_| {
        ReplayError::consistency(format!(
            "{}: entry name {:?} contains NUL",
            image.file_name, entry.name
        ))
    })?;

    tracing::debug!(
        name = %entry.name,
        captured = %entry.address,
        offset = %offset,
        relocated = %address,
        "Relocated entry"
    );

    Ok(RelocatedEntry {
        address,
        offset,
        captured: entry.address,
        name,
        size: entry.size,
        flags: entry.flags,
        reserved: entry.reserved,
    })
}
