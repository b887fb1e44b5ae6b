//! Offload runtime interface and its libomptarget binding.

use std::ffi::{c_int, c_void, OsStr};

use libloading::Library;

use crate::config::Config;
use crate::error::RuntimeError;
use crate::offload::abi::{BinDesc, BinaryDescriptor, KernelLaunch};

/// The four runtime calls a replay needs.
///
/// Every call is synchronous and blocks until the runtime returns.
pub trait OffloadRuntime {
    /// Bind `descriptor` to the runtime. Backends that decline are listed in
    /// the report; declining is not an error.
    fn register(&mut self, descriptor: &mut BinaryDescriptor<'_>) -> RegistrationReport;

    /// Enumerate and initialize devices without binding an image.
    fn init_all_backends(&mut self);

    fn launch(&mut self, launch: &KernelLaunch) -> Result<(), RuntimeError>;

    fn unregister(&mut self, descriptor: &mut BinaryDescriptor<'_>) -> Result<(), RuntimeError>;
}

/// Outcome of a registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistrationReport {
    /// Backends that could not register the descriptor.
    pub declined: Vec<String>,
}

impl RegistrationReport {
    pub fn accepted() -> Self {
        Self::default()
    }

    pub fn is_complete(&self) -> bool {
        self.declined.is_empty()
    }
}

const OFFLOAD_SUCCESS: c_int = 0;

type RegisterLibFn = unsafe extern "C" fn(desc: *mut BinDesc);
type InitAllRtlsFn = unsafe extern "C" fn();
type TargetTeamsFn = unsafe extern "C" fn(
    device_id: i64,
    host_ptr: *mut c_void,
    arg_num: i32,
    args_base: *mut *mut c_void,
    args: *mut *mut c_void,
    arg_sizes: *mut i64,
    arg_types: *mut i64,
    num_teams: i32,
    thread_limit: i32,
) -> c_int;
type UnregisterLibFn = unsafe extern "C" fn(desc: *mut BinDesc);

struct LibompFns {
    register_lib: RegisterLibFn,
    init_all_rtls: InitAllRtlsFn,
    target_teams: TargetTeamsFn,
    unregister_lib: UnregisterLibFn,
}

/// libomptarget, loaded at runtime.
pub struct LibompRuntime {
    _lib: Library,
    fns: LibompFns,
}

impl LibompRuntime {
    /// Load the configured runtime library, or the first candidate that
    /// opens when none is configured.
    pub fn load(config: &Config) -> Result<Self, RuntimeError> {
        if let Some(path) = &config.runtime_library {
            return Self::open(path.as_os_str());
        }

        let mut failures = Vec::new();
        for candidate in &config.runtime_candidates {
            match Self::open(OsStr::new(candidate)) {
                Ok(runtime) => return Ok(runtime),
                Err(e) => failures.push(e.to_string()),
            }
        }

        tracing::debug!(?failures, "Runtime candidates exhausted");
        Err(RuntimeError::Load(format!(
            "no offload runtime could be opened (tried {})",
            config.runtime_candidates.join(", ")
        )))
    }

    /// Load libomptarget from `path` and resolve the replay entry points.
    pub fn open(path: &OsStr) -> Result<Self, RuntimeError> {
        let name = path.to_string_lossy().into_owned();
        // SAFETY: loading libomptarget runs its initializers, which only set
        // up runtime bookkeeping.
        let lib = unsafe { Library::new(path) }
            .map_err(|e| RuntimeError::Load(format!("{name}: {e}")))?;

        let fns = LibompFns {
            register_lib: load_symbol(&lib, b"__tgt_register_lib\0")?,
            init_all_rtls: load_symbol(&lib, b"__tgt_init_all_rtls\0")?,
            target_teams: load_symbol(&lib, b"__tgt_target_teams\0")?,
            unregister_lib: load_symbol(&lib, b"__tgt_unregister_lib\0")?,
        };

        tracing::info!(library = %name, "Loaded offload runtime");
        Ok(Self { _lib: lib, fns })
    }
}

impl OffloadRuntime for LibompRuntime {
    fn register(&mut self, descriptor: &mut BinaryDescriptor<'_>) -> RegistrationReport {
        // SAFETY: the descriptor and everything it points to stay alive and
        // unmoved until `unregister` is called with the same pointer.
        unsafe { (self.fns.register_lib)(descriptor.as_mut_ptr()) };
        // libomptarget only logs per-plugin failures; it reports none back.
        RegistrationReport::accepted()
    }

    fn init_all_backends(&mut self) {
        // SAFETY: takes no arguments.
        unsafe { (self.fns.init_all_rtls)() };
    }

    fn launch(&mut self, launch: &KernelLaunch) -> Result<(), RuntimeError> {
        let code = launch.with_target_teams_args(|args| {
            // SAFETY: `args` points at locals that outlive the call, and the
            // kernel handle is a host entry of the registered descriptor.
            unsafe {
                (self.fns.target_teams)(
                    args.device_id,
                    args.host_ptr,
                    args.arg_num,
                    args.args_base,
                    args.args,
                    args.arg_sizes,
                    args.arg_types,
                    args.num_teams,
                    args.thread_limit,
                )
            }
        });

        if code == OFFLOAD_SUCCESS {
            Ok(())
        } else {
            Err(RuntimeError::Launch { code })
        }
    }

    fn unregister(&mut self, descriptor: &mut BinaryDescriptor<'_>) -> Result<(), RuntimeError> {
        // SAFETY: same descriptor pointer that was registered.
        unsafe { (self.fns.unregister_lib)(descriptor.as_mut_ptr()) };
        Ok(())
    }
}

fn load_symbol<T: Copy>(lib: &Library, name: &'static [u8]) -> Result<T, RuntimeError> {
    let symbol_name = String::from_utf8_lossy(&name[..name.len().saturating_sub(1)]).into_owned();
    // SAFETY: `T` matches the C signature declared in omptarget.h.
    let symbol = unsafe { lib.get::<T>(name) }.map_err(|e| RuntimeError::Symbol {
        symbol: symbol_name,
        message: e.to_string(),
    })?;
    Ok(*symbol)
}
