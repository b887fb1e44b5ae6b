//! Hand-off of a reconstruction to the offload runtime.
//!
//! [`abi`] lays the reconstruction out the way libomptarget expects it,
//! [`runtime`] is the narrow interface to the runtime (and its dynamically
//! loaded implementation), and [`driver`] sequences the replay.

pub mod abi;
pub mod driver;
pub mod runtime;

pub use abi::{BinaryDescriptor, KernelLaunch, REPLAY_MAGIC};
pub use driver::{resolve_launch, ReplayDriver, ReplayOutcome, REPLAY_DEVICE_ID};
pub use runtime::{LibompRuntime, OffloadRuntime, RegistrationReport};
