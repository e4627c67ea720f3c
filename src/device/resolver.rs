//! Path Resolver
//!
//! Maps a file path to the devices behind it and asks the matcher about
//! them. Every `open()` in the host process passes through here, so the
//! pattern test runs first and out-of-scope paths never reach the device
//! tree.
//!
//! Failure to inspect the tree allows the path. Only devices that could be
//! inspected are ever denied.

use std::ffi::CStr;

use tracing::debug;

use super::{is_forbidden, DeviceNode, DeviceSource};
use crate::policy::Policy;

/// Device classes searched for a matching device node
pub const DEVICE_SUBSYSTEMS: &[&str] = &["input", "hidraw"];

/// May `path` be opened under `policy`?
pub fn is_device_allowed<S: DeviceSource>(policy: &Policy, source: &S, path: &CStr) -> bool {
    if !policy.in_scope(path) {
        return true;
    }

    debug!("Checking device '{}'", path.to_string_lossy());

    let devices = match source.scan(DEVICE_SUBSYSTEMS) {
        Ok(devices) => devices,
        Err(e) => {
            debug!("{}", e);
            return true;
        }
    };

    !devices.iter().any(|device| {
        device
            .devnode()
            .is_some_and(|node| node.as_bytes() == path.to_bytes())
            && is_forbidden(device, policy.attributes())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{MemoryDevice, MemorySource};

    fn policy() -> Policy {
        Policy::parse("[patterns]\np = /dev/input/*\n[attributes]\nPRODUCT = 1234\n").unwrap()
    }

    fn keyboard_tree() -> MemorySource {
        let hid = MemoryDevice::new("/sys/devices/usb1/1-1/input/input5")
            .with_subsystem("input")
            .with_attribute("PRODUCT", "1234");
        let forbidden = MemoryDevice::new("/sys/devices/usb1/1-1/input/input5/event3")
            .with_subsystem("input")
            .with_devnode("/dev/input/event3")
            .with_parent(hid);
        let allowed = MemoryDevice::new("/sys/devices/platform/i8042/input/input9/event9")
            .with_subsystem("input")
            .with_devnode("/dev/input/event9")
            .with_attribute("PRODUCT", "9999");

        MemorySource::new(vec![forbidden, allowed])
    }

    #[test]
    fn test_out_of_scope_never_scans() {
        let source = keyboard_tree();
        assert!(is_device_allowed(&policy(), &source, c"/etc/hosts"));
        assert!(is_device_allowed(&policy(), &source, c"/dev/sda1"));
        assert_eq!(source.scans(), 0);
    }

    #[test]
    fn test_denies_by_inherited_attribute() {
        let source = keyboard_tree();
        assert!(!is_device_allowed(&policy(), &source, c"/dev/input/event3"));
        assert_eq!(source.scans(), 1);
    }

    #[test]
    fn test_allows_clean_device() {
        assert!(is_device_allowed(&policy(), &keyboard_tree(), c"/dev/input/event9"));
    }

    #[test]
    fn test_in_scope_without_device_allowed() {
        assert!(is_device_allowed(&policy(), &keyboard_tree(), c"/dev/input/mice"));
    }

    #[test]
    fn test_fails_open_when_source_unavailable() {
        let source = MemorySource::unavailable();
        assert!(is_device_allowed(&policy(), &source, c"/dev/input/event3"));
        assert_eq!(source.scans(), 1);
    }

    #[test]
    fn test_fails_open_on_empty_enumeration() {
        let source = MemorySource::new(vec![]);
        assert!(is_device_allowed(&policy(), &source, c"/dev/input/event3"));
    }

    #[test]
    fn test_non_utf8_path_is_checked() {
        let source = keyboard_tree();
        assert!(is_device_allowed(&policy(), &source, c"/dev/input/ev\xfft3"));
        assert_eq!(source.scans(), 1);
    }
}
