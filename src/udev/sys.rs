//! Raw libudev entry points, resolved at runtime
//!
//! libudev is opened with `dlopen` instead of being linked. A host that
//! already uses libudev gets its own copy back; a host that does not only
//! pays for the load the first time an in-scope path is checked.
//!
//! Every symbol is looked up in libudev itself, never through the global
//! search order. That matters for `udev_list_entry_get_next` and
//! `udev_enumerate_get_list_entry`, which this library also exports: the
//! adapter must always reach the real, unfiltered implementations.

use std::ffi::{c_void, CStr};
use std::sync::OnceLock;

use libc::{c_char, c_int};

use crate::error::SourceError;

const LIBRARY: &str = "libudev.so.1\0";

/// `struct udev`
#[repr(C)]
pub struct RawUdev {
    _private: [u8; 0],
}

/// `struct udev_enumerate`
#[repr(C)]
pub struct RawEnumerate {
    _private: [u8; 0],
}

/// `struct udev_device`
#[repr(C)]
pub struct RawDevice {
    _private: [u8; 0],
}

/// `struct udev_list_entry`
#[repr(C)]
pub struct RawListEntry {
    _private: [u8; 0],
}

/// Function table for the subset of libudev the filter uses
pub struct LibUdev {
    pub new: unsafe extern "C" fn() -> *mut RawUdev,
    pub r#ref: unsafe extern "C" fn(*mut RawUdev) -> *mut RawUdev,
    pub unref: unsafe extern "C" fn(*mut RawUdev) -> *mut RawUdev,

    pub enumerate_new: unsafe extern "C" fn(*mut RawUdev) -> *mut RawEnumerate,
    pub enumerate_unref: unsafe extern "C" fn(*mut RawEnumerate) -> *mut RawEnumerate,
    pub enumerate_add_match_subsystem:
        unsafe extern "C" fn(*mut RawEnumerate, *const c_char) -> c_int,
    pub enumerate_scan_devices: unsafe extern "C" fn(*mut RawEnumerate) -> c_int,
    pub enumerate_get_list_entry: unsafe extern "C" fn(*mut RawEnumerate) -> *mut RawListEntry,

    pub list_entry_get_next: unsafe extern "C" fn(*mut RawListEntry) -> *mut RawListEntry,
    pub list_entry_get_name: unsafe extern "C" fn(*mut RawListEntry) -> *const c_char,

    pub device_new_from_syspath:
        unsafe extern "C" fn(*mut RawUdev, *const c_char) -> *mut RawDevice,
    pub device_ref: unsafe extern "C" fn(*mut RawDevice) -> *mut RawDevice,
    pub device_unref: unsafe extern "C" fn(*mut RawDevice) -> *mut RawDevice,
    /// Borrowed result, owned by the child device
    pub device_get_parent: unsafe extern "C" fn(*mut RawDevice) -> *mut RawDevice,
    pub device_get_devnode: unsafe extern "C" fn(*mut RawDevice) -> *const c_char,
    pub device_get_syspath: unsafe extern "C" fn(*mut RawDevice) -> *const c_char,
    pub device_get_sysattr_list_entry: unsafe extern "C" fn(*mut RawDevice) -> *mut RawListEntry,
    pub device_get_sysattr_value:
        unsafe extern "C" fn(*mut RawDevice, *const c_char) -> *const c_char,
}

static LIBUDEV: OnceLock<Result<LibUdev, String>> = OnceLock::new();

/// The process-wide libudev function table, loaded on first use
pub fn libudev() -> Result<&'static LibUdev, SourceError> {
    LIBUDEV
        .get_or_init(load)
        .as_ref()
        .map_err(|e| SourceError::Unavailable(e.clone()))
}

fn load() -> Result<LibUdev, String> {
    // SAFETY: LIBRARY is NUL-terminated; the handle is never closed.
    let handle =
        unsafe { libc::dlopen(LIBRARY.as_ptr().cast(), libc::RTLD_LAZY | libc::RTLD_LOCAL) };
    if handle.is_null() {
        return Err(last_dl_error());
    }

    // SAFETY: each signature below matches the libudev(3) prototype.
    unsafe {
        Ok(LibUdev {
            new: symbol(handle, "udev_new\0")?,
            r#ref: symbol(handle, "udev_ref\0")?,
            unref: symbol(handle, "udev_unref\0")?,
            enumerate_new: symbol(handle, "udev_enumerate_new\0")?,
            enumerate_unref: symbol(handle, "udev_enumerate_unref\0")?,
            enumerate_add_match_subsystem: symbol(handle, "udev_enumerate_add_match_subsystem\0")?,
            enumerate_scan_devices: symbol(handle, "udev_enumerate_scan_devices\0")?,
            enumerate_get_list_entry: symbol(handle, "udev_enumerate_get_list_entry\0")?,
            list_entry_get_next: symbol(handle, "udev_list_entry_get_next\0")?,
            list_entry_get_name: symbol(handle, "udev_list_entry_get_name\0")?,
            device_new_from_syspath: symbol(handle, "udev_device_new_from_syspath\0")?,
            device_ref: symbol(handle, "udev_device_ref\0")?,
            device_unref: symbol(handle, "udev_device_unref\0")?,
            device_get_parent: symbol(handle, "udev_device_get_parent\0")?,
            device_get_devnode: symbol(handle, "udev_device_get_devnode\0")?,
            device_get_syspath: symbol(handle, "udev_device_get_syspath\0")?,
            device_get_sysattr_list_entry: symbol(handle, "udev_device_get_sysattr_list_entry\0")?,
            device_get_sysattr_value: symbol(handle, "udev_device_get_sysattr_value\0")?,
        })
    }
}

/// Look up `name` (NUL-terminated) in `handle` as a function pointer `F`.
///
/// # Safety
/// `F` must be an `extern "C"` function pointer type matching the symbol.
unsafe fn symbol<F: Copy>(handle: *mut c_void, name: &'static str) -> Result<F, String> {
    let addr = unsafe { libc::dlsym(handle, name.as_ptr().cast()) };
    if addr.is_null() {
        return Err(format!("{} not found", name.trim_end_matches('\0')));
    }
    // SAFETY: non-null code address of the right signature, per caller.
    Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&addr) })
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns NULL or a NUL-terminated thread-local string.
    let message = unsafe { libc::dlerror() };
    if message.is_null() {
        return format!("cannot load {}", LIBRARY.trim_end_matches('\0'));
    }
    unsafe { CStr::from_ptr(message) }.to_string_lossy().into_owned()
}

/// Copy a C string owned by libudev, `None` for NULL
///
/// # Safety
/// `ptr` must be NULL or point to a NUL-terminated string.
pub unsafe fn owned_string(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}
