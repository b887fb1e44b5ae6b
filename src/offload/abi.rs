//! libomptarget registration and launch ABI.
//!
//! Mirrors the descriptor layout of `omptarget.h`:
//!
//! ```c
//! struct __tgt_offload_entry { void *addr; char *name; size_t size; int32_t flags; int32_t reserved; };
//! struct __tgt_device_image  { void *ImageStart; void *ImageEnd;
//!                              __tgt_offload_entry *EntriesBegin; __tgt_offload_entry *EntriesEnd; };
//! struct __tgt_bin_desc      { int32_t NumDeviceImages; __tgt_device_image *DeviceImages;
//!                              __tgt_offload_entry *HostEntriesBegin; __tgt_offload_entry *HostEntriesEnd; };
//! ```
//!
//! Everything that hands raw pointers to the runtime is built here, in one
//! place, from a borrowed [`Reconstruction`].

use std::ffi::{c_char, c_void, CString};
use std::marker::PhantomData;

use crate::repro::address::RuntimeAddress;
use crate::repro::assemble::Reconstruction;

/// ASCII "REPLAYME": tells the runtime the launch replays a captured kernel.
pub const REPLAY_MAGIC: i64 = 0x5245504C41594D45;

/// `__tgt_offload_entry`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct OffloadEntry {
    pub addr: *mut c_void,
    pub name: *mut c_char,
    pub size: usize,
    pub flags: i32,
    pub reserved: i32,
}

/// `__tgt_device_image`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct DeviceImage {
    pub image_start: *mut c_void,
    pub image_end: *mut c_void,
    pub entries_begin: *mut OffloadEntry,
    pub entries_end: *mut OffloadEntry,
}

/// `__tgt_bin_desc`
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct BinDesc {
    pub num_device_images: i32,
    pub device_images: *mut DeviceImage,
    pub host_entries_begin: *mut OffloadEntry,
    pub host_entries_end: *mut OffloadEntry,
}

/// The registration descriptor of a [`Reconstruction`].
///
/// Device images and host entries live in boxed slices that are filled once
/// and never resized; the `__tgt_bin_desc` itself is boxed so the pointer
/// handed to `register` is still the one handed to `unregister`. The
/// lifetime ties every pointer (image bytes, entry names) to the
/// reconstruction that owns the pointee.
pub struct BinaryDescriptor<'a> {
    desc: Box<BinDesc>,
    device_images: Box<[DeviceImage]>,
    host_entries: Box<[OffloadEntry]>,
    _owner: PhantomData<&'a Reconstruction>,
}

impl<'a> BinaryDescriptor<'a> {
    pub fn new(reconstruction: &'a Reconstruction) -> Self {
        let images = reconstruction.images();

        // Image ranges partition the host table in order, so walking images
        // and their ranges reproduces the table exactly.
        let mut host_entries: Box<[OffloadEntry]> = images
            .iter()
            .flat_map(|image| {
                reconstruction.host_entries()[image.entries.clone()]
                    .iter()
                    .map(move |entry| OffloadEntry {
                        addr: image.loaded.ptr_at(entry.offset) as *mut c_void,
                        name: entry.name.as_ptr() as *mut c_char,
                        size: entry.size,
                        flags: entry.flags,
                        reserved: entry.reserved,
                    })
            })
            .collect();

        let table = host_entries.as_mut_ptr_range();
        let mut device_images: Box<[DeviceImage]> = images
            .iter()
            .map(|image| {
                let bounds = image.loaded.as_ptr_range();
                DeviceImage {
                    image_start: bounds.start as *mut c_void,
                    image_end: bounds.end as *mut c_void,
                    entries_begin: table.start.wrapping_add(image.entries.start),
                    entries_end: table.start.wrapping_add(image.entries.end),
                }
            })
            .collect();

        let desc = Box::new(BinDesc {
            num_device_images: reconstruction.image_count(),
            device_images: device_images.as_mut_ptr(),
            host_entries_begin: table.start,
            host_entries_end: table.end,
        });

        Self {
            desc,
            device_images,
            host_entries,
            _owner: PhantomData,
        }
    }

    /// Pointer passed to `__tgt_register_lib` and `__tgt_unregister_lib`.
    pub fn as_mut_ptr(&mut self) -> *mut BinDesc {
        &mut *self.desc
    }

    pub fn header(&self) -> &BinDesc {
        &self.desc
    }

    pub fn device_images(&self) -> &[DeviceImage] {
        &self.device_images
    }

    pub fn host_entries(&self) -> &[OffloadEntry] {
        &self.host_entries
    }
}

impl std::fmt::Debug for BinaryDescriptor<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinaryDescriptor")
            .field("num_device_images", &self.desc.num_device_images)
            .field("host_entries", &self.host_entries.len())
            .finish()
    }
}

/// Arguments of one `__tgt_target_teams` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KernelLaunch {
    pub device_id: i64,
    /// Host entry address identifying the kernel.
    pub kernel: RuntimeAddress,
    /// Path of the kernel's replay descriptor.
    pub payload: CString,
    pub magic: i64,
    pub num_teams: i32,
    pub thread_limit: i32,
}

/// Raw `__tgt_target_teams` argument list.
#[derive(Debug, Clone, Copy)]
pub struct TargetTeamsArgs {
    pub device_id: i64,
    pub host_ptr: *mut c_void,
    pub arg_num: i32,
    pub args_base: *mut *mut c_void,
    pub args: *mut *mut c_void,
    pub arg_sizes: *mut i64,
    pub arg_types: *mut i64,
    pub num_teams: i32,
    pub thread_limit: i32,
}

impl KernelLaunch {
    /// Lay the launch out as raw `__tgt_target_teams` arguments and pass them
    /// to `f`.
    ///
    /// A replay launch carries no kernel arguments. The runtime reads the
    /// payload pointer from the `args` slot and the magic marker from the
    /// `arg_sizes` slot; `args_base` and `arg_types` stay null. The slots
    /// point at locals of this call, so `f` must not retain them.
    pub fn with_target_teams_args<R>(&self, f: impl FnOnce(TargetTeamsArgs) -> R) -> R {
        let mut payload = self.payload.as_ptr() as *mut c_void;
        let mut magic = self.magic;
        f(TargetTeamsArgs {
            device_id: self.device_id,
            host_ptr: self.kernel.as_mut_ptr(),
            arg_num: 0,
            args_base: std::ptr::null_mut(),
            args: &mut payload,
            arg_sizes: &mut magic,
            arg_types: std::ptr::null_mut(),
            num_teams: self.num_teams,
            thread_limit: self.thread_limit,
        })
    }
}
