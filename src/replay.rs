//! End-to-end replay of a manifest.

use std::io::Write;
use std::path::Path;

use crate::error::{ReplayError, RuntimeError};
use crate::offload::{OffloadRuntime, ReplayDriver, ReplayOutcome};
use crate::repro::{self, report::Report};

/// Reconstruct the record at `manifest` and replay its kernel.
///
/// The runtime is only loaded once reconstruction has succeeded, so a bad
/// record fails without touching it. Progress lines go to `out`.
pub fn replay_manifest<R, F, W>(
    manifest: &Path,
    load_runtime: F,
    out: W,
) -> Result<ReplayOutcome, ReplayError>
where
    R: OffloadRuntime,
    F: FnOnce() -> Result<R, RuntimeError>,
    W: Write,
{
    let mut report = Report::new(out);
    let reconstruction = repro::reconstruct(manifest, &mut report)?;

    let runtime = load_runtime()?;
    ReplayDriver::new(runtime).replay(reconstruction)
}
