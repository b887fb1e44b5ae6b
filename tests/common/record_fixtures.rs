//! Captured-record test fixtures
//!
//! Builds a manifest and its image blobs inside a temporary directory, laid
//! out the way a capture leaves them on disk.

use std::path::PathBuf;

use serde_json::{json, Value};
use tempfile::TempDir;

/// One image of a fixture record
pub struct FixtureImage {
    pub file_name: String,
    pub image_start: u64,
    /// Length declared by the manifest (`ImageEnd - ImageStart`)
    pub declared_len: u64,
    /// Length actually written to disk
    pub blob_len: usize,
    /// `(addr, name)` pairs
    pub entries: Vec<(u64, String)>,
}

impl FixtureImage {
    pub fn new(file_name: &str, image_start: u64, len: usize) -> Self {
        Self {
            file_name: file_name.to_string(),
            image_start,
            declared_len: len as u64,
            blob_len: len,
            entries: Vec::new(),
        }
    }

    pub fn entry(mut self, addr: u64, name: &str) -> Self {
        self.entries.push((addr, name.to_string()));
        self
    }

    /// Write a blob of a different length than the manifest declares
    pub fn with_blob_len(mut self, blob_len: usize) -> Self {
        self.blob_len = blob_len;
        self
    }

    fn to_json(&self) -> Value {
        let entries: Vec<Value> = self
            .entries
            .iter()
            .map(|(addr, name)| {
                json!({ "addr": addr, "name": name, "size": 4, "flags": 0, "reserved": 0 })
            })
            .collect();
        json!({
            "ImageFile": self.file_name,
            "ImageStart": self.image_start,
            "ImageEnd": self.image_start + self.declared_len,
            "Entries": entries,
        })
    }
}

/// A record written to a temporary directory
///
/// The directory is removed when the fixture is dropped.
pub struct RecordFixture {
    /// TempDir handle (keeps directory alive until dropped)
    pub dir: TempDir,
    /// Path to the manifest
    pub manifest: PathBuf,
}

impl RecordFixture {
    /// Write `images` and a manifest describing them
    pub fn write(images: &[FixtureImage]) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        for image in images {
            let blob: Vec<u8> = (0..image.blob_len).map(|i| i as u8).collect();
            std::fs::write(dir.path().join(&image.file_name), blob).unwrap();
        }

        let manifest = json!({
            "NumDeviceImages": images.len(),
            "DeviceImages": images.iter().map(FixtureImage::to_json).collect::<Vec<_>>(),
        });
        Self::write_manifest(dir, &manifest.to_string())
    }

    /// Write raw manifest text, without any image
    pub fn raw(text: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        Self::write_manifest(dir, text)
    }

    /// The single-image record used throughout: 16 bytes at 0x1000 with
    /// `foo` at 0x1004
    pub fn single_kernel() -> Self {
        Self::write(&[FixtureImage::new("k.bin", 0x1000, 16).entry(0x1004, "foo")])
    }

    fn write_manifest(dir: TempDir, text: &str) -> Self {
        let manifest = dir.path().join("record.json");
        std::fs::write(&manifest, text).unwrap();
        Self { dir, manifest }
    }
}
