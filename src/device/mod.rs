//! Device tree access and the deny decision
//!
//! The filter never talks to the device manager directly from its decision
//! logic. It goes through two small capabilities:
//!
//! ```text
//! ┌────────────────────────┐   scan(["input", "hidraw"])  ┌──────────────┐
//! │  resolver              │ ───────────────────────────► │ DeviceSource │
//! │  is_device_allowed()   │ ◄─────────────────────────── │  (udev, mem) │
//! └──────────┬─────────────┘        Vec<Node>             └──────────────┘
//!            │ devnode == path
//!            ▼
//! ┌────────────────────────┐   attribute_names()/attribute()/parent()
//! │  matcher               │ ─────────────────────────────► DeviceNode
//! │  is_forbidden()        │   walks the node, then every ancestor
//! └────────────────────────┘
//! ```
//!
//! A node owns its handle: dropping it releases the underlying reference,
//! so every scope that obtains nodes also releases them on every exit path.

pub mod matcher;
pub mod memory;
pub mod resolver;

use crate::error::SourceError;

pub use matcher::is_forbidden;
pub use memory::{MemoryDevice, MemorySource};
pub use resolver::{is_device_allowed, DEVICE_SUBSYSTEMS};

/// One node of the device hierarchy
pub trait DeviceNode: Sized {
    /// Names of the attributes this node exposes, in source order
    fn attribute_names(&self) -> Vec<String>;

    /// Value of one attribute, `None` if it cannot be read
    fn attribute(&self, name: &str) -> Option<String>;

    /// The parent node, `None` at the root
    fn parent(&self) -> Option<Self>;

    /// Device node path (e.g. `/dev/input/event3`), if the node has one
    fn devnode(&self) -> Option<String>;

    /// Path of the node in the device tree
    fn syspath(&self) -> Option<String>;
}

/// A queryable device hierarchy
pub trait DeviceSource {
    type Node: DeviceNode;

    /// All devices belonging to any of `subsystems`.
    ///
    /// An enumeration that yields nothing is reported as
    /// [`SourceError::Empty`].
    fn scan(&self, subsystems: &[&str]) -> Result<Vec<Self::Node>, SourceError>;

    /// The device at `syspath`, if it exists
    fn lookup(&self, syspath: &str) -> Option<Self::Node>;
}
