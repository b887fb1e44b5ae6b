//! Reconstruction of a whole record.
//!
//! [`Reconstruction`] owns everything a runtime pointer may refer to: the
//! loaded image buffers and the relocated entries (with their names). The
//! ABI view over it is built by [`crate::offload::abi::BinaryDescriptor`],
//! which borrows the reconstruction and so cannot outlive it.

use std::collections::HashSet;
use std::ops::Range;
use std::path::Path;

use crate::error::ReplayError;
use crate::repro::image::{check_length, read_image, LoadedImage};
use crate::repro::manifest::{CapturedImage, CapturedRecord};
use crate::repro::relocate::{relocate_entries, RelocatedEntry};

/// A loaded image and the slice of the host entry table it exports.
#[derive(Debug)]
pub struct ReconstructedImage {
    pub file_name: String,
    pub loaded: LoadedImage,
    /// Index range into [`Reconstruction::host_entries`].
    pub entries: Range<usize>,
}

/// All images of a record, loaded and relocated.
#[derive(Debug)]
pub struct Reconstruction {
    record: CapturedRecord,
    images: Vec<ReconstructedImage>,
    host_entries: Vec<RelocatedEntry>,
}

impl Reconstruction {
    /// Load every image of `record` and relocate its entries.
    ///
    /// The host entry table is the concatenation of each image's entries, in
    /// image order and then entry order.
    pub fn assemble(record: CapturedRecord) -> Result<Self, ReplayError> {
        Self::assemble_with(record, |_, _| Ok(()))
    }

    /// [`assemble`](Self::assemble), handing each blob to `on_read` as soon
    /// as it is read and before it is checked against the manifest.
    pub fn assemble_with<F>(record: CapturedRecord, mut on_read: F) -> Result<Self, ReplayError>
    where
        F: FnMut(&CapturedImage, &LoadedImage) -> Result<(), ReplayError>,
    {
        let mut images = Vec::with_capacity(record.images.len());
        let mut host_entries = Vec::with_capacity(record.entry_count());

        for image in &record.images {
            let loaded = read_image(&record.base_dir, image)?;
            on_read(image, &loaded)?;
            check_length(image, &loaded)?;
            let relocated = relocate_entries(image, &loaded)?;

            let begin = host_entries.len();
            host_entries.extend(relocated);
            images.push(ReconstructedImage {
                file_name: image.file_name.clone(),
                loaded,
                entries: begin..host_entries.len(),
            });
        }

        warn_duplicate_names(&host_entries);

        tracing::debug!(
            images = images.len(),
            entries = host_entries.len(),
            "Reconstructed record"
        );

        Ok(Self {
            record,
            images,
            host_entries,
        })
    }

    /// Image count as declared by the manifest.
    pub fn image_count(&self) -> i32 {
        self.record.image_count
    }

    pub fn base_dir(&self) -> &Path {
        &self.record.base_dir
    }

    pub fn images(&self) -> &[ReconstructedImage] {
        &self.images
    }

    /// Relocated entries of every image, flattened.
    pub fn host_entries(&self) -> &[RelocatedEntry] {
        &self.host_entries
    }

    /// Relocated entries of the image at `idx`.
    pub fn image_entries(&self, idx: usize) -> &[RelocatedEntry] {
        &self.host_entries[self.images[idx].entries.clone()]
    }
}

fn warn_duplicate_names(entries: &[RelocatedEntry]) {
    let mut seen = HashSet::with_capacity(entries.len());
    for entry in entries {
        if !seen.insert(entry.name.as_c_str()) {
            tracing::warn!(
                name = %entry.name_lossy(),
                "Host entry table holds duplicate entry name"
            );
        }
    }
}
