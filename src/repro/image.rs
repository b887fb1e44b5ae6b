//! Device image loading.

use std::path::{Path, PathBuf};

use crate::error::ReplayError;
use crate::repro::address::{FileOffset, RuntimeAddress};
use crate::repro::manifest::CapturedImage;

/// The bytes of one device image, read back from disk.
///
/// The buffer is a boxed slice: it is never resized, so its base address is
/// stable for as long as the value lives.
pub struct LoadedImage {
    path: PathBuf,
    bytes: Box<[u8]>,
}

impl LoadedImage {
    pub fn new(path: impl Into<PathBuf>, bytes: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            bytes: bytes.into_boxed_slice(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address of the first byte of the buffer.
    pub fn base(&self) -> RuntimeAddress {
        RuntimeAddress::of(self.bytes.as_ptr())
    }

    /// One past the last byte of the buffer.
    pub fn end(&self) -> RuntimeAddress {
        RuntimeAddress::of(self.bytes.as_ptr_range().end)
    }

    pub fn as_ptr_range(&self) -> std::ops::Range<*const u8> {
        self.bytes.as_ptr_range()
    }

    /// Pointer to the byte at `offset`. The pointer is only formed, not read.
    pub fn ptr_at(&self, offset: FileOffset) -> *const u8 {
        self.bytes.as_ptr().wrapping_add(offset.get())
    }
}

impl std::fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedImage")
            .field("path", &self.path)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Read the blob `image` refers to, relative to `base_dir`, and check it
/// against the manifest.
pub fn load_image(base_dir: &Path, image: &CapturedImage) -> Result<LoadedImage, ReplayError> {
    let loaded = read_image(base_dir, image)?;
    check_length(image, &loaded)?;
    Ok(loaded)
}

/// Read the blob `image` refers to, relative to `base_dir`, as is.
pub fn read_image(base_dir: &Path, image: &CapturedImage) -> Result<LoadedImage, ReplayError> {
    let path = base_dir.join(&image.file_name);
    let bytes = std::fs::read(&path).map_err(|e| ReplayError::io(&path, e))?;
    tracing::debug!(path = %path.display(), len = bytes.len(), "Read device image");
    Ok(LoadedImage::new(path, bytes))
}

/// The blob must be exactly `ImageEnd - ImageStart` bytes long.
pub fn check_length(image: &CapturedImage, loaded: &LoadedImage) -> Result<(), ReplayError> {
    let expected = image
        .image_end
        .get()
        .checked_sub(image.image_start.get())
        .ok_or_else(|| {
            ReplayError::consistency(format!(
                "{}: ImageEnd {} lies below ImageStart {}",
                image.file_name, image.image_end, image.image_start
            ))
        })?;

    if loaded.len() as u64 != expected {
        return Err(ReplayError::consistency(format!(
            "{}: manifest declares {expected} bytes but the file holds {}",
            loaded.path().display(),
            loaded.len()
        )));
    }
    Ok(())
}
