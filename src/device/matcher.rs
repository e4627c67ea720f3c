//! Attribute Matcher
//!
//! Decides whether a device is forbidden by looking at its own attributes
//! and then those of each ancestor, stopping at the first match.
//!
//! ```text
//! input5   (PRODUCT=1234)   ◄── match here ...
//!   └── event3              ◄── ... so this node is forbidden too
//! ```
//!
//! Denial is inherited downwards: an input device marked by its HID parent
//! also denies the `/dev/input/eventN` node below it. The device tree is
//! finite and rooted, so the walk always terminates.

use super::DeviceNode;
use crate::policy::ForbiddenAttribute;

/// True if `device` or any ancestor exposes a forbidden attribute.
pub fn is_forbidden<N: DeviceNode>(device: &N, forbidden: &[ForbiddenAttribute]) -> bool {
    if exposes_forbidden(device, forbidden) {
        return true;
    }

    let mut ancestor = device.parent();
    while let Some(node) = ancestor {
        if exposes_forbidden(&node, forbidden) {
            return true;
        }
        ancestor = node.parent();
    }

    false
}

/// Check one node. A value is only read once its name matched.
fn exposes_forbidden<N: DeviceNode>(node: &N, forbidden: &[ForbiddenAttribute]) -> bool {
    node.attribute_names().iter().any(|name| {
        let mut candidates = forbidden.iter().filter(|a| a.matches_name(name)).peekable();
        if candidates.peek().is_none() {
            return false;
        }

        match node.attribute(name) {
            Some(value) => candidates.any(|a| a.value() == value),
            None => false,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::MemoryDevice;

    fn deny(pairs: &[(&str, &str)]) -> Vec<ForbiddenAttribute> {
        pairs
            .iter()
            .map(|(n, v)| ForbiddenAttribute::new(*n, *v))
            .collect()
    }

    /// A chain of `depth` ancestors above a leaf; `marked` is the level that
    /// carries the forbidden attribute (0 = leaf).
    fn chain(depth: usize, marked: Option<usize>) -> MemoryDevice {
        let mut node: Option<MemoryDevice> = None;
        for level in (0..=depth).rev() {
            let mut device = MemoryDevice::new(format!("/sys/devices/level{level}"))
                .with_attribute("name", format!("level {level}"));
            if marked == Some(level) {
                device = device.with_attribute("PRODUCT", "1234");
            }
            if let Some(parent) = node.take() {
                device = device.with_parent(parent);
            }
            node = Some(device);
        }
        node.unwrap()
    }

    #[test]
    fn test_own_attribute_forbidden() {
        let device = MemoryDevice::new("/sys/devices/kbd").with_attribute("PRODUCT", "1234");
        assert!(is_forbidden(&device, &deny(&[("PRODUCT", "1234")])));
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let device = MemoryDevice::new("/sys/devices/kbd").with_attribute("product", "1234");
        assert!(is_forbidden(&device, &deny(&[("PRODUCT", "1234")])));
    }

    #[test]
    fn test_value_match_is_exact() {
        let device = MemoryDevice::new("/sys/devices/kbd").with_attribute("PRODUCT", "12345");
        assert!(!is_forbidden(&device, &deny(&[("PRODUCT", "1234")])));
    }

    #[test]
    fn test_inherited_from_every_depth() {
        let forbidden = deny(&[("PRODUCT", "1234")]);
        for k in 1..=6 {
            let leaf = chain(6, Some(k));
            assert!(is_forbidden(&leaf, &forbidden), "ancestor at depth {k}");
        }
    }

    #[test]
    fn test_clean_chain_allowed() {
        let leaf = chain(6, None);
        assert!(!is_forbidden(&leaf, &deny(&[("PRODUCT", "1234")])));
    }

    #[test]
    fn test_unreadable_value_does_not_match() {
        let device = MemoryDevice::new("/sys/devices/kbd").with_unreadable_attribute("PRODUCT");
        assert!(!is_forbidden(&device, &deny(&[("PRODUCT", "1234")])));
    }

    #[test]
    fn test_values_only_read_for_matching_names() {
        let device = MemoryDevice::new("/sys/devices/kbd")
            .with_attribute("name", "keyboard")
            .with_attribute("phys", "usb-0000:00:14.0-1/input0");

        assert!(!is_forbidden(&device, &deny(&[("PRODUCT", "1234")])));
        assert_eq!(device.value_reads(), 0);
    }

    #[test]
    fn test_any_of_several_pairs() {
        let device = MemoryDevice::new("/sys/devices/kbd").with_attribute("idVendor", "046d");
        let forbidden = deny(&[("PRODUCT", "1234"), ("idVendor", "046d")]);
        assert!(is_forbidden(&device, &forbidden));
    }
}
