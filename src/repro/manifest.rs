//! Manifest decoding.
//!
//! A manifest is the JSON record written when a kernel launch was captured:
//!
//! ```json
//! {
//!   "NumDeviceImages": 1,
//!   "DeviceImages": [
//!     {
//!       "ImageFile": "k.bin",
//!       "ImageStart": 4096,
//!       "ImageEnd": 4112,
//!       "Entries": [
//!         { "addr": 4100, "name": "foo", "size": 4, "flags": 0, "reserved": 0 }
//!       ]
//!     }
//!   ]
//! }
//! ```
//!
//! Integers are read as `i64` and narrowed to their target width afterwards,
//! so an out-of-range value is reported against the field that holds it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ReplayError;
use crate::repro::address::CaptureAddress;
use crate::util::paths::replay_directory;

const INLINE_SOURCE: &str = "<inline manifest>";

/// A decoded manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub image_count: i32,
    pub images: Vec<CapturedImage>,
    /// Directory that relative image and payload paths resolve against.
    pub base_dir: PathBuf,
}

/// One device binary image of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedImage {
    pub file_name: String,
    pub image_start: CaptureAddress,
    pub image_end: CaptureAddress,
    pub entries: Vec<CapturedEntry>,
}

/// One exported function or variable of an image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedEntry {
    pub address: CaptureAddress,
    pub name: String,
    pub size: usize,
    pub flags: i32,
    pub reserved: i32,
}

impl CapturedRecord {
    pub fn entry_count(&self) -> usize {
        self.images.iter().map(|image| image.entries.len()).sum()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ManifestJson {
    num_device_images: i64,
    device_images: Vec<ImageJson>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ImageJson {
    image_file: String,
    image_start: i64,
    image_end: i64,
    entries: Vec<EntryJson>,
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    addr: i64,
    name: String,
    size: i64,
    flags: i64,
    reserved: i64,
}

/// Read and decode the manifest at `path`.
///
/// The manifest's directory becomes the record's `base_dir`. An unreadable
/// manifest is a decode error.
pub fn decode_manifest(path: &Path) -> Result<CapturedRecord, ReplayError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| ReplayError::decode(path, format!("cannot read manifest: {e}")))?;
    decode(&text, path, replay_directory(path))
}

/// Decode manifest text that did not come from a file.
pub fn decode_manifest_str(text: &str, base_dir: &Path) -> Result<CapturedRecord, ReplayError> {
    decode(text, Path::new(INLINE_SOURCE), base_dir.to_path_buf())
}

fn decode(text: &str, source: &Path, base_dir: PathBuf) -> Result<CapturedRecord, ReplayError> {
    let raw: ManifestJson =
        serde_json::from_str(text).map_err(|e| ReplayError::decode(source, e.to_string()))?;
    raw.into_record(base_dir)
        .map_err(|message| ReplayError::decode(source, message))
}

impl ManifestJson {
    fn into_record(self, base_dir: PathBuf) -> Result<CapturedRecord, String> {
        let image_count: i32 = narrow(self.num_device_images, "NumDeviceImages")?;
        if image_count < 0 {
            return Err(format!("NumDeviceImages: {image_count} is negative"));
        }
        if image_count as usize != self.device_images.len() {
            return Err(format!(
                "NumDeviceImages is {image_count} but DeviceImages holds {} images",
                self.device_images.len()
            ));
        }

        let images = self
            .device_images
            .into_iter()
            .enumerate()
            .map(|(idx, image)| image.into_image(idx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CapturedRecord {
            image_count,
            images,
            base_dir,
        })
    }
}

impl ImageJson {
    fn into_image(self, idx: usize) -> Result<CapturedImage, String> {
        let entries = self
            .entries
            .into_iter()
            .enumerate()
            .map(|(entry_idx, entry)| entry.into_entry(idx, entry_idx))
            .collect::<Result<Vec<_>, _>>()?;

        // Names identify entries within an image; other images may reuse them.
        let mut seen = HashSet::with_capacity(entries.len());
        for (entry_idx, entry) in entries.iter().enumerate() {
            if !seen.insert(entry.name.as_str()) {
                return Err(format!(
                    "DeviceImages[{idx}].Entries[{entry_idx}].name: duplicate entry name {:?}",
                    entry.name
                ));
            }
        }

        Ok(CapturedImage {
            file_name: self.image_file,
            image_start: CaptureAddress::from_signed(self.image_start),
            image_end: CaptureAddress::from_signed(self.image_end),
            entries,
        })
    }
}

impl EntryJson {
    fn into_entry(self, image_idx: usize, idx: usize) -> Result<CapturedEntry, String> {
        let field = |name: &str| format!("DeviceImages[{image_idx}].Entries[{idx}].{name}");

        if self.name.is_empty() {
            return Err(format!("{}: entry name is empty", field("name")));
        }
        if self.name.contains('\0') {
            return Err(format!("{}: entry name contains NUL", field("name")));
        }

        Ok(CapturedEntry {
            address: CaptureAddress::from_signed(self.addr),
            size: narrow(self.size, &field("size"))?,
            flags: narrow(self.flags, &field("flags"))?,
            reserved: narrow(self.reserved, &field("reserved"))?,
            name: self.name,
        })
    }
}

fn narrow<T: TryFrom<i64>>(value: i64, field: &str) -> Result<T, String> {
    T::try_from(value).map_err(|_| {
        format!(
            "{field}: value {value} does not fit {}",
            std::any::type_name::<T>()
        )
    })
}
