//! C entry points exported by the preload library
//!
//! Every export follows the same sequence:
//!
//! 1. resolve the original (`RTLD_NEXT`, cached); failure fails this call
//! 2. take the re-entrancy guard; nested calls go straight to the original
//! 3. run the process-wide [`Filter`], which initializes the gate on first use
//!
//! `open`/`open64` are declared with a fixed third argument: on the
//! supported ABIs the optional `mode` arrives in the same register a
//! variadic callee would read it from.

use std::ffi::CStr;
use std::ptr::{self, NonNull};

use lazy_static::lazy_static;
use libc::{c_char, c_int, mode_t, FILE};
use nix::errno::Errno;
use tracing::error;

use super::reentry::ReentryGuard;
use super::symbols::{self, NextSymbol};
use super::Filter;
use crate::gate::Gate;
use crate::udev::sys::{RawEnumerate, RawListEntry};
use crate::udev::{self, UdevSource};

type OpenFn = unsafe extern "C" fn(*const c_char, c_int, mode_t) -> c_int;
type FopenFn = unsafe extern "C" fn(*const c_char, *const c_char) -> *mut FILE;
type GetNextFn = unsafe extern "C" fn(*mut RawListEntry) -> *mut RawListEntry;
type GetListEntryFn = unsafe extern "C" fn(*mut RawEnumerate) -> *mut RawListEntry;

lazy_static! {
    static ref FILTER: Filter<UdevSource> = Filter::new(Gate::from_env(), UdevSource);
}

fn set_errno(errno: Errno) {
    // SAFETY: __errno_location always returns this thread's errno slot.
    unsafe { *libc::__errno_location() = errno as c_int };
}

/// Resolve the original behind `symbol`, logging a failure.
///
/// # Safety
/// `F` must be the symbol's signature.
unsafe fn original<F: Copy>(symbol: &NextSymbol) -> Option<F> {
    match unsafe { symbol.get::<F>() } {
        Ok(f) => Some(f),
        Err(e) => {
            error!("{}", e);
            None
        }
    }
}

/// # Safety
/// `path` must be NULL or NUL-terminated.
unsafe fn path_arg<'a>(path: *const c_char) -> Option<&'a CStr> {
    if path.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(path) })
}

unsafe fn intercept_open(
    symbol: &NextSymbol,
    path: *const c_char,
    flags: c_int,
    mode: mode_t,
) -> c_int {
    let Some(real) = (unsafe { original::<OpenFn>(symbol) }) else {
        set_errno(Errno::ENOSYS);
        return -1;
    };
    let Some(_guard) = ReentryGuard::enter() else {
        return unsafe { real(path, flags, mode) };
    };

    FILTER.open_with(
        unsafe { path_arg(path) },
        || unsafe { real(path, flags, mode) },
        || {
            set_errno(Errno::EPERM);
            -1
        },
    )
}

unsafe fn intercept_fopen(
    symbol: &NextSymbol,
    path: *const c_char,
    mode: *const c_char,
) -> *mut FILE {
    let Some(real) = (unsafe { original::<FopenFn>(symbol) }) else {
        set_errno(Errno::ENOSYS);
        return ptr::null_mut();
    };
    let Some(_guard) = ReentryGuard::enter() else {
        return unsafe { real(path, mode) };
    };

    FILTER.open_with(
        unsafe { path_arg(path) },
        || unsafe { real(path, mode) },
        || {
            set_errno(Errno::EPERM);
            ptr::null_mut()
        },
    )
}

/// # Safety
/// Same contract as `open(2)`.
#[no_mangle]
pub unsafe extern "C" fn open(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    unsafe { intercept_open(&symbols::OPEN, path, flags, mode) }
}

/// # Safety
/// Same contract as `open64(2)`.
#[no_mangle]
pub unsafe extern "C" fn open64(path: *const c_char, flags: c_int, mode: mode_t) -> c_int {
    unsafe { intercept_open(&symbols::OPEN64, path, flags, mode) }
}

/// # Safety
/// Same contract as `fopen(3)`.
#[no_mangle]
pub unsafe extern "C" fn fopen(path: *const c_char, mode: *const c_char) -> *mut FILE {
    unsafe { intercept_fopen(&symbols::FOPEN, path, mode) }
}

/// # Safety
/// Same contract as `fopen64(3)`.
#[no_mangle]
pub unsafe extern "C" fn fopen64(path: *const c_char, mode: *const c_char) -> *mut FILE {
    unsafe { intercept_fopen(&symbols::FOPEN64, path, mode) }
}

/// # Safety
/// `entry` must be NULL or a live `udev_list_entry`.
#[no_mangle]
pub unsafe extern "C" fn udev_list_entry_get_next(entry: *mut RawListEntry) -> *mut RawListEntry {
    let Some(real) = (unsafe { original::<GetNextFn>(&symbols::LIST_ENTRY_GET_NEXT) }) else {
        return ptr::null_mut();
    };
    let Some(cursor) = NonNull::new(entry) else {
        return unsafe { real(entry) };
    };
    let Some(_guard) = ReentryGuard::enter() else {
        return unsafe { real(entry) };
    };

    FILTER
        .next_entry(
            cursor,
            |e| NonNull::new(unsafe { real(e.as_ptr()) }),
            |e| unsafe { udev::entry_name(e) },
        )
        .map_or(ptr::null_mut(), NonNull::as_ptr)
}

/// # Safety
/// `enumerate` must be NULL or a live `udev_enumerate`.
#[no_mangle]
pub unsafe extern "C" fn udev_enumerate_get_list_entry(
    enumerate: *mut RawEnumerate,
) -> *mut RawListEntry {
    let Some(real) = (unsafe { original::<GetListEntryFn>(&symbols::ENUMERATE_GET_LIST_ENTRY) })
    else {
        return ptr::null_mut();
    };
    let head = unsafe { real(enumerate) };

    let Some(_guard) = ReentryGuard::enter() else {
        return head;
    };
    let Some(advance) = (unsafe { original::<GetNextFn>(&symbols::LIST_ENTRY_GET_NEXT) }) else {
        return head;
    };

    FILTER
        .first_entry(
            NonNull::new(head),
            |e| NonNull::new(unsafe { advance(e.as_ptr()) }),
            |e| unsafe { udev::entry_name(e) },
        )
        .map_or(ptr::null_mut(), NonNull::as_ptr)
}
