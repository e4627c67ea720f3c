//! libudev-backed device tree
//!
//! Implements [`DeviceSource`] over the system device manager. All handles
//! are reference-counted by libudev; each wrapper here owns exactly one
//! reference and drops it in `Drop`:
//!
//! ```text
//! Udev        ── udev_new / udev_ref         ... udev_unref
//! Enumerator  ── udev_enumerate_new          ... udev_enumerate_unref
//! UdevDevice  ── udev_device_new_from_syspath ... udev_device_unref
//!                (parents: udev_device_ref on the borrowed pointer)
//! ```

pub mod sys;

use std::ffi::CString;
use std::ptr::NonNull;

use crate::device::{DeviceNode, DeviceSource};
use crate::error::SourceError;

use sys::{libudev, owned_string, LibUdev, RawDevice, RawEnumerate, RawListEntry, RawUdev};

/// A libudev context
pub struct Udev {
    lib: &'static LibUdev,
    raw: NonNull<RawUdev>,
}

impl Udev {
    pub fn new() -> Result<Self, SourceError> {
        let lib = libudev()?;
        // SAFETY: plain constructor, result checked for NULL.
        let raw = NonNull::new(unsafe { (lib.new)() }).ok_or(SourceError::Context)?;
        Ok(Self { lib, raw })
    }
}

impl Clone for Udev {
    fn clone(&self) -> Self {
        // SAFETY: self.raw is a live context we hold a reference on.
        unsafe { (self.lib.r#ref)(self.raw.as_ptr()) };
        Self {
            lib: self.lib,
            raw: self.raw,
        }
    }
}

impl Drop for Udev {
    fn drop(&mut self) {
        // SAFETY: releases the reference taken in new()/clone().
        unsafe { (self.lib.unref)(self.raw.as_ptr()) };
    }
}

/// A device enumeration session
struct Enumerator<'u> {
    udev: &'u Udev,
    raw: NonNull<RawEnumerate>,
}

impl<'u> Enumerator<'u> {
    fn new(udev: &'u Udev) -> Result<Self, SourceError> {
        // SAFETY: udev.raw is live for 'u.
        let raw = unsafe { (udev.lib.enumerate_new)(udev.raw.as_ptr()) };
        let raw = NonNull::new(raw).ok_or(SourceError::Enumerator)?;
        Ok(Self { udev, raw })
    }

    fn match_subsystem(&self, subsystem: &str) {
        if let Ok(subsystem) = CString::new(subsystem) {
            // SAFETY: both pointers valid for the duration of the call.
            unsafe {
                (self.udev.lib.enumerate_add_match_subsystem)(self.raw.as_ptr(), subsystem.as_ptr())
            };
        }
    }

    /// Scan and return the syspaths found
    fn syspaths(&self) -> Result<Vec<String>, SourceError> {
        let lib = self.udev.lib;
        // SAFETY: self.raw is live; list entries are owned by the enumerator
        // and outlive this borrow.
        unsafe {
            let rc = (lib.enumerate_scan_devices)(self.raw.as_ptr());
            if rc < 0 {
                return Err(SourceError::Scan(rc));
            }

            let head = (lib.enumerate_get_list_entry)(self.raw.as_ptr());
            if head.is_null() {
                return Err(SourceError::Empty);
            }
            Ok(list_names(lib, head))
        }
    }
}

impl Drop for Enumerator<'_> {
    fn drop(&mut self) {
        // SAFETY: releases the reference from udev_enumerate_new.
        unsafe { (self.udev.lib.enumerate_unref)(self.raw.as_ptr()) };
    }
}

/// One device, holding a reference on itself and on its context
pub struct UdevDevice {
    udev: Udev,
    raw: NonNull<RawDevice>,
}

impl UdevDevice {
    pub fn from_syspath(udev: &Udev, syspath: &str) -> Option<Self> {
        let syspath = CString::new(syspath).ok()?;
        // SAFETY: valid context and NUL-terminated path; NULL checked.
        let raw =
            unsafe { (udev.lib.device_new_from_syspath)(udev.raw.as_ptr(), syspath.as_ptr()) };
        NonNull::new(raw).map(|raw| Self {
            udev: udev.clone(),
            raw,
        })
    }

    fn lib(&self) -> &'static LibUdev {
        self.udev.lib
    }
}

impl Drop for UdevDevice {
    fn drop(&mut self) {
        // SAFETY: releases the reference taken at construction.
        unsafe { (self.lib().device_unref)(self.raw.as_ptr()) };
    }
}

impl DeviceNode for UdevDevice {
    fn attribute_names(&self) -> Vec<String> {
        // SAFETY: the list belongs to the device, which we keep alive.
        unsafe {
            let head = (self.lib().device_get_sysattr_list_entry)(self.raw.as_ptr());
            list_names(self.lib(), head)
        }
    }

    fn attribute(&self, name: &str) -> Option<String> {
        let name = CString::new(name).ok()?;
        // SAFETY: live device, NUL-terminated name; value copied out at once.
        unsafe {
            owned_string((self.lib().device_get_sysattr_value)(self.raw.as_ptr(), name.as_ptr()))
        }
    }

    fn parent(&self) -> Option<Self> {
        // SAFETY: get_parent returns a borrowed pointer; taking our own
        // reference lets the parent outlive this device.
        unsafe {
            let parent = NonNull::new((self.lib().device_get_parent)(self.raw.as_ptr()))?;
            (self.lib().device_ref)(parent.as_ptr());
            Some(Self {
                udev: self.udev.clone(),
                raw: parent,
            })
        }
    }

    fn devnode(&self) -> Option<String> {
        // SAFETY: live device; string copied out at once.
        unsafe { owned_string((self.lib().device_get_devnode)(self.raw.as_ptr())) }
    }

    fn syspath(&self) -> Option<String> {
        // SAFETY: live device; string copied out at once.
        unsafe { owned_string((self.lib().device_get_syspath)(self.raw.as_ptr())) }
    }
}

/// The system device tree. Every query opens and releases its own context.
#[derive(Debug, Clone, Copy, Default)]
pub struct UdevSource;

impl DeviceSource for UdevSource {
    type Node = UdevDevice;

    fn scan(&self, subsystems: &[&str]) -> Result<Vec<UdevDevice>, SourceError> {
        let udev = Udev::new()?;
        let enumerator = Enumerator::new(&udev)?;
        for subsystem in subsystems {
            enumerator.match_subsystem(subsystem);
        }

        let devices = enumerator
            .syspaths()?
            .iter()
            .filter_map(|syspath| UdevDevice::from_syspath(&udev, syspath))
            .collect();
        Ok(devices)
    }

    fn lookup(&self, syspath: &str) -> Option<UdevDevice> {
        let udev = Udev::new().ok()?;
        UdevDevice::from_syspath(&udev, syspath)
    }
}

/// Name of a list entry handed to us by the host
///
/// # Safety
/// `entry` must be a live `udev_list_entry`.
pub unsafe fn entry_name(entry: NonNull<RawListEntry>) -> Option<String> {
    let lib = libudev().ok()?;
    unsafe { owned_string((lib.list_entry_get_name)(entry.as_ptr())) }
}

/// Collect the names of a list, walking it with the real `get_next`.
///
/// # Safety
/// `head` must be NULL or the head of a live list.
unsafe fn list_names(lib: &LibUdev, head: *mut RawListEntry) -> Vec<String> {
    let mut names = Vec::new();
    let mut entry = head;
    while !entry.is_null() {
        if let Some(name) = unsafe { owned_string((lib.list_entry_get_name)(entry)) } {
            names.push(name);
        }
        entry = unsafe { (lib.list_entry_get_next)(entry) };
    }
    names
}
