//! denydevice - hide selected input/HID devices from a process
//!
//! Built as `libdenydevice.so` and loaded with `LD_PRELOAD`. The library
//! intercepts the calls a program uses to open device nodes and to
//! enumerate devices through libudev, and makes forbidden devices
//! disappear: opens fail with `EPERM`, enumerations skip them.
//!
//! This is a best-effort filter, not a security boundary. A program that
//! issues raw syscalls or ignores the preload is not affected.
//!
//! # Modules
//!
//! - `config` - environment settings (`LIBDD_DEBUG`, `LIBDD_CONFIG`)
//! - `policy` - path patterns and forbidden attributes from the config file
//! - `device` - device tree traits, attribute matcher, path resolver
//! - `udev` - libudev adapter for the device tree
//! - `gate` - one-shot policy initialization
//! - `shim` - the intercepting entry points
//! - `logging` - stderr diagnostics
//!
//! # Configuration
//!
//! ```text
//! LIBDD_CONFIG=/etc/denydevice.ini LD_PRELOAD=libdenydevice.so some-game
//!
//! [patterns]
//! p1 = /dev/input/*
//! p2 = /dev/hidraw*
//!
//! [attributes]
//! PRODUCT = 1234
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod gate;
pub mod logging;
pub mod policy;
pub mod shim;
pub mod udev;

pub use device::{DeviceNode, DeviceSource};
pub use error::{LoadError, ResolveError, SourceError};
pub use gate::{Gate, PolicyState};
pub use policy::{ForbiddenAttribute, PathPattern, Policy, PolicyBuilder};
pub use shim::{Filter, Verdict};
