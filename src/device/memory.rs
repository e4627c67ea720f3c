//! In-memory device tree
//!
//! A synthetic [`DeviceSource`] for exercising the matcher, resolver and
//! enumeration filter without a real device manager. It also counts scans
//! and attribute reads so callers can check what the filter touched.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::{DeviceNode, DeviceSource};
use crate::error::SourceError;

/// A device node held in memory
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    syspath: String,
    devnode: Option<String>,
    subsystem: Option<String>,
    /// `None` value = attribute listed but unreadable
    attributes: Vec<(String, Option<String>)>,
    parent: Option<Arc<MemoryDevice>>,
    value_reads: Arc<AtomicUsize>,
}

impl MemoryDevice {
    pub fn new(syspath: impl Into<String>) -> Self {
        Self {
            syspath: syspath.into(),
            devnode: None,
            subsystem: None,
            attributes: Vec::new(),
            parent: None,
            value_reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_devnode(mut self, devnode: impl Into<String>) -> Self {
        self.devnode = Some(devnode.into());
        self
    }

    pub fn with_subsystem(mut self, subsystem: impl Into<String>) -> Self {
        self.subsystem = Some(subsystem.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), Some(value.into())));
        self
    }

    pub fn with_unreadable_attribute(mut self, name: impl Into<String>) -> Self {
        self.attributes.push((name.into(), None));
        self
    }

    pub fn with_parent(mut self, parent: MemoryDevice) -> Self {
        self.parent = Some(Arc::new(parent));
        self
    }

    /// How many attribute values were read from this node (all clones)
    pub fn value_reads(&self) -> usize {
        self.value_reads.load(Ordering::SeqCst)
    }

    fn subsystem_in(&self, subsystems: &[&str]) -> bool {
        self.subsystem
            .as_deref()
            .is_some_and(|s| subsystems.contains(&s))
    }

    fn find(&self, syspath: &str) -> Option<MemoryDevice> {
        if self.syspath == syspath {
            return Some(self.clone());
        }
        self.parent.as_deref().and_then(|p| p.find(syspath))
    }
}

impl DeviceNode for MemoryDevice {
    fn attribute_names(&self) -> Vec<String> {
        self.attributes.iter().map(|(name, _)| name.clone()).collect()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.value_reads.fetch_add(1, Ordering::SeqCst);
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .and_then(|(_, value)| value.clone())
    }

    fn parent(&self) -> Option<Self> {
        self.parent.as_deref().cloned()
    }

    fn devnode(&self) -> Option<String> {
        self.devnode.clone()
    }

    fn syspath(&self) -> Option<String> {
        Some(self.syspath.clone())
    }
}

/// A device tree made of [`MemoryDevice`] leaves
#[derive(Debug, Default)]
pub struct MemorySource {
    devices: Vec<MemoryDevice>,
    unavailable: bool,
    scans: AtomicUsize,
}

impl MemorySource {
    pub fn new(devices: Vec<MemoryDevice>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// A source whose every scan fails
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Number of scans performed so far
    pub fn scans(&self) -> usize {
        self.scans.load(Ordering::SeqCst)
    }
}

impl DeviceSource for MemorySource {
    type Node = MemoryDevice;

    fn scan(&self, subsystems: &[&str]) -> Result<Vec<MemoryDevice>, SourceError> {
        self.scans.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(SourceError::Unavailable("simulated failure".to_string()));
        }

        let found: Vec<MemoryDevice> = self
            .devices
            .iter()
            .filter(|d| d.subsystem_in(subsystems))
            .cloned()
            .collect();

        if found.is_empty() {
            return Err(SourceError::Empty);
        }
        Ok(found)
    }

    fn lookup(&self, syspath: &str) -> Option<MemoryDevice> {
        if self.unavailable {
            return None;
        }
        self.devices.iter().find_map(|d| d.find(syspath))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_filters_by_subsystem() {
        let source = MemorySource::new(vec![
            MemoryDevice::new("/sys/a").with_subsystem("input"),
            MemoryDevice::new("/sys/b").with_subsystem("block"),
            MemoryDevice::new("/sys/c").with_subsystem("hidraw"),
        ]);

        let found = source.scan(&["input", "hidraw"]).unwrap();
        let paths: Vec<_> = found.iter().filter_map(|d| d.syspath()).collect();
        assert_eq!(paths, vec!["/sys/a", "/sys/c"]);
        assert_eq!(source.scans(), 1);
    }

    #[test]
    fn test_scan_with_no_match_is_empty() {
        let source = MemorySource::new(vec![MemoryDevice::new("/sys/b").with_subsystem("block")]);
        assert!(matches!(source.scan(&["input"]), Err(SourceError::Empty)));
    }

    #[test]
    fn test_lookup_finds_ancestors() {
        let parent = MemoryDevice::new("/sys/usb1");
        let kbd = MemoryDevice::new("/sys/usb1/kbd").with_parent(parent);
        let source = MemorySource::new(vec![kbd]);

        assert!(source.lookup("/sys/usb1").is_some());
        assert!(source.lookup("/sys/usb1/kbd").is_some());
        assert!(source.lookup("/sys/usb2").is_none());
    }
}
