//! Replay sequencing: register, initialize, launch, unregister, release.

use std::ffi::CString;
use std::path::PathBuf;

use crate::error::ReplayError;
use crate::offload::abi::{BinaryDescriptor, KernelLaunch, REPLAY_MAGIC};
use crate::offload::runtime::OffloadRuntime;
use crate::repro::assemble::Reconstruction;

/// Replays always target the first device.
pub const REPLAY_DEVICE_ID: i64 = 0;

/// What a successful replay launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub kernel: String,
    pub payload: PathBuf,
    pub declined_backends: Vec<String>,
}

/// Build the launch of the record's kernel: the first host entry.
///
/// The kernel's own replay descriptor sits next to the manifest, named after
/// the entry. Teams and thread limit are zero, leaving both to the runtime.
pub fn resolve_launch(reconstruction: &Reconstruction) -> Result<KernelLaunch, ReplayError> {
    let kernel = reconstruction
        .host_entries()
        .first()
        .ok_or_else(|| ReplayError::consistency("record has no host entries to launch"))?;

    let name = kernel.name.to_str().map_err(|_| {
        ReplayError::consistency(format!("kernel name {:?} is not UTF-8", kernel.name))
    })?;
    let payload = reconstruction.base_dir().join(name);
    let payload = payload
        .to_str()
        .and_then(|p| CString::new(p).ok())
        .ok_or_else(|| {
            ReplayError::consistency(format!(
                "replay payload path {} is not representable as a C string",
                payload.display()
            ))
        })?;

    Ok(KernelLaunch {
        device_id: REPLAY_DEVICE_ID,
        kernel: kernel.address,
        payload,
        magic: REPLAY_MAGIC,
        num_teams: 0,
        thread_limit: 0,
    })
}

/// Drives one replay through an [`OffloadRuntime`].
pub struct ReplayDriver<R> {
    runtime: R,
}

impl<R: OffloadRuntime> ReplayDriver<R> {
    pub fn new(runtime: R) -> Self {
        Self { runtime }
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Replay the kernel of `reconstruction`, consuming it.
    ///
    /// Nothing reaches the runtime if the launch cannot be resolved. Once
    /// the descriptor is registered it is always unregistered, and the
    /// reconstruction released, whether or not the launch succeeds; a
    /// failing unregistration is logged and does not change the result.
    pub fn replay(&mut self, reconstruction: Reconstruction) -> Result<ReplayOutcome, ReplayError> {
        let launch = resolve_launch(&reconstruction)?;
        let mut descriptor = BinaryDescriptor::new(&reconstruction);

        let report = self.runtime.register(&mut descriptor);
        for backend in &report.declined {
            tracing::warn!(
                backend = %backend,
                "Backend declined registration, continuing with the remaining backends"
            );
        }
        tracing::debug!(images = descriptor.header().num_device_images, "Registered descriptor");

        self.runtime.init_all_backends();

        let kernel = reconstruction.host_entries()[0].name_lossy().into_owned();
        tracing::info!(
            kernel = %kernel,
            payload = ?launch.payload,
            device = launch.device_id,
            "Launching replay kernel"
        );
        let launched = self.runtime.launch(&launch);

        if let Err(e) = self.runtime.unregister(&mut descriptor) {
            tracing::error!(error = %e, "Failed to unregister descriptor");
        }
        drop(descriptor);
        drop(reconstruction);
        tracing::debug!("Released image buffers and entry storage");

        launched?;
        Ok(ReplayOutcome {
            kernel,
            payload: PathBuf::from(launch.payload.to_string_lossy().into_owned()),
            declined_backends: report.declined,
        })
    }
}
