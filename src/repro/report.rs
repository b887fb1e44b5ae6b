//! Progress and field dumps printed while reconstructing a record.
//!
//! The line format is stable so runs can be compared against golden output.
//! Only the relocated addresses vary between runs.

use std::io::{self, Write};
use std::path::Path;

use crate::repro::assemble::Reconstruction;
use crate::repro::relocate::RelocatedEntry;

pub struct Report<W> {
    out: W,
}

impl<W: Write> Report<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    pub fn reading(&mut self, manifest: &Path) -> io::Result<()> {
        writeln!(self.out, "Reading {}", manifest.display())
    }

    pub fn replay_directory(&mut self, dir: &Path) -> io::Result<()> {
        writeln!(self.out, "Replay directory is {}", dir.display())
    }

    /// The `Found`/`Length` pair of an image whose blob was just read.
    pub fn image(&mut self, file_name: &str, len: usize) -> io::Result<()> {
        writeln!(self.out, "Found device image {file_name}!")?;
        writeln!(self.out, "Length:{len}")
    }

    /// Dump the descriptor fields: image bounds and entries of every device
    /// image, then the host entry table.
    pub fn descriptor(&mut self, reconstruction: &Reconstruction) -> io::Result<()> {
        writeln!(self.out, "NumDeviceImages:{}", reconstruction.image_count())?;
        for (idx, image) in reconstruction.images().iter().enumerate() {
            writeln!(self.out, "BinDesc.DeviceImage->ImageStart:{}", image.loaded.base())?;
            writeln!(self.out, "BinDesc.DeviceImage->ImageEnd:{}", image.loaded.end())?;
            for entry in reconstruction.image_entries(idx) {
                self.entry("BinDesc.DeviceImage.Entry", entry)?;
            }
        }
        for entry in reconstruction.host_entries() {
            self.entry("BinDesc.HostEntry", entry)?;
        }
        self.out.flush()
    }

    fn entry(&mut self, prefix: &str, entry: &RelocatedEntry) -> io::Result<()> {
        writeln!(self.out, "{prefix}.addr:{}", entry.address)?;
        writeln!(self.out, "{prefix}.name:{}", entry.name_lossy())?;
        writeln!(self.out, "{prefix}.size:{}", entry.size)?;
        writeln!(self.out, "{prefix}.flags:{}", entry.flags)?;
        writeln!(self.out, "{prefix}.reserved:{}", entry.reserved)
    }
}
