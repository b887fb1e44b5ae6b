pub mod config;
pub mod error;
pub mod offload;
pub mod replay;
pub mod repro;
pub mod util;

pub use config::Config;
pub use error::{ReplayError, RuntimeError};
pub use offload::{
    BinaryDescriptor, KernelLaunch, LibompRuntime, OffloadRuntime, RegistrationReport,
    ReplayDriver, ReplayOutcome, REPLAY_MAGIC,
};
pub use replay::replay_manifest;
pub use repro::address::{CaptureAddress, FileOffset, RuntimeAddress};
pub use repro::assemble::Reconstruction;
pub use repro::manifest::{decode_manifest, CapturedEntry, CapturedImage, CapturedRecord};
pub use repro::relocate::RelocatedEntry;
