//! Error taxonomy for the device filter
//!
//! None of these ever reach the host process as a Rust error. Each one is
//! absorbed at a fixed point:
//!
//! ```text
//! LoadError     ──► PolicyState::Inactive   (filter off for the process)
//! SourceError   ──► fail open               (this one decision allows)
//! ResolveError  ──► this call fails          (ENOSYS / no further entry)
//! ```

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// The policy could not be loaded. The filter stays inactive.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The environment does not name a policy file
    #[error("Environment variable '{var}' not set")]
    MissingSource { var: &'static str },

    /// The policy file could not be read
    #[error("Error loading config file '{}': {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No usable entry in `[patterns]`
    #[error("No patterns configured")]
    NoPatterns,

    /// No usable entry in `[attributes]`
    #[error("No attributes configured")]
    NoAttributes,
}

/// The device tree could not be inspected.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The device library (or one of its symbols) is not available
    #[error("device library unavailable: {0}")]
    Unavailable(String),

    #[error("udev_new() failed")]
    Context,

    #[error("udev_enumerate_new() failed")]
    Enumerator,

    #[error("udev_enumerate_scan_devices() failed with {0}")]
    Scan(i32),

    /// Enumeration succeeded but matched nothing
    #[error("udev_enumerate_get_list_entry() returned no devices")]
    Empty,
}

/// The next implementation of an intercepted symbol could not be located.
#[derive(Debug, Error)]
#[error("cannot resolve next definition of '{symbol}'")]
pub struct ResolveError {
    pub symbol: &'static str,
}
