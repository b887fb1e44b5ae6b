//! Reconstruction of a captured offload record.
//!
//! A record is a JSON manifest plus one binary blob per device image, all in
//! the same directory. Reconstruction runs in one pass:
//! - decode the manifest ([`manifest`])
//! - load every image blob ([`image`])
//! - rebase entry addresses onto the loaded blobs ([`relocate`])
//! - gather images and entries into one owning [`assemble::Reconstruction`]
//!
//! Nothing here talks to the offload runtime; see [`crate::offload`].

pub mod address;
pub mod assemble;
pub mod image;
pub mod manifest;
pub mod relocate;
pub mod report;

use std::io::Write;
use std::path::Path;

use crate::error::ReplayError;
use crate::util::paths::replay_directory;

use assemble::Reconstruction;
use manifest::decode_manifest;
use report::Report;

const REPORT_SINK: &str = "<report>";

/// Decode, load and relocate the record at `manifest`, reporting progress.
pub fn reconstruct<W: Write>(
    manifest: &Path,
    report: &mut Report<W>,
) -> Result<Reconstruction, ReplayError> {
    let report_err = |e| ReplayError::io(REPORT_SINK, e);

    report.reading(manifest).map_err(report_err)?;
    report
        .replay_directory(&replay_directory(manifest))
        .map_err(report_err)?;

    let record = decode_manifest(manifest)?;
    let reconstruction = Reconstruction::assemble_with(record, |image, loaded| {
        report.image(&image.file_name, loaded.len()).map_err(report_err)
    })?;

    report.descriptor(&reconstruction).map_err(report_err)?;
    Ok(reconstruction)
}
