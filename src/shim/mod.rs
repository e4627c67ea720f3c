//! Interception Shim
//!
//! Sits between the host process and the real `open`/`fopen`/libudev
//! implementations and decides, per call, whether to pass through, deny or
//! skip.
//!
//! ```text
//!  host ──open(path)──► exports ──► Filter::open_with ──► Gate::policy()
//!                          │                 │                 │
//!                          │                 │            Inactive ─► call original
//!                          │                 ▼
//!                          │        is_device_allowed(path)
//!                          │           ├─ true  ─► call original
//!                          │           └─ false ─► EPERM, original never called
//!                          │
//!  host ──get_next(e)──► exports ──► Filter::next_entry
//!                                     advance ─► forbidden? ─► advance ─► ...
//!                                     returns first visible entry or exhaustion
//! ```
//!
//! [`Filter`] holds the decision logic and takes the original
//! implementation as a closure, so it runs unchanged against the in-memory
//! device tree in tests. [`exports`] binds it to the real symbols.

pub mod exports;
pub mod reentry;
pub mod symbols;

use std::ffi::CStr;

use tracing::info;

use crate::device::{is_device_allowed, is_forbidden, DeviceNode, DeviceSource};
use crate::gate::Gate;
use crate::policy::Policy;

/// Outcome for an intercepted open
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Call the original implementation
    Allow,
    /// Fail with a permission error without calling it
    Deny,
}

/// The policy gate plus the device tree it is evaluated against
#[derive(Debug)]
pub struct Filter<S> {
    gate: Gate,
    source: S,
}

impl<S: DeviceSource> Filter<S> {
    pub fn new(gate: Gate, source: S) -> Self {
        Self { gate, source }
    }

    pub fn gate(&self) -> &Gate {
        &self.gate
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Decide an open of `path`
    pub fn check_open(&self, path: &CStr) -> Verdict {
        let Some(policy) = self.gate.policy() else {
            return Verdict::Allow;
        };

        if is_device_allowed(policy, &self.source, path) {
            Verdict::Allow
        } else {
            info!("Denying access to '{}'", path.to_string_lossy());
            Verdict::Deny
        }
    }

    /// Run one open through the filter.
    ///
    /// `open` is the original implementation and is called at most once;
    /// `deny` produces the caller-visible permission failure. A NULL path
    /// (`None`) is left for the original to reject.
    pub fn open_with<T>(
        &self,
        path: Option<&CStr>,
        open: impl FnOnce() -> T,
        deny: impl FnOnce() -> T,
    ) -> T {
        match path.map(|p| self.check_open(p)) {
            Some(Verdict::Deny) => deny(),
            _ => open(),
        }
    }

    /// Filter the head of an enumeration.
    ///
    /// A forbidden head is replaced by the first visible entry after it.
    pub fn first_entry<E, A, N>(&self, head: Option<E>, advance: A, syspath_of: N) -> Option<E>
    where
        E: Copy,
        A: FnMut(E) -> Option<E>,
        N: Fn(E) -> Option<String>,
    {
        let head = head?;
        let Some(policy) = self.gate.policy() else {
            return Some(head);
        };

        if self.is_hidden(policy, syspath_of(head)) {
            next_visible(head, advance, |&entry| self.is_hidden(policy, syspath_of(entry)))
        } else {
            Some(head)
        }
    }

    /// Advance an enumeration by one visible entry.
    ///
    /// `advance` is the original "get next". Forbidden entries are stepped
    /// over in a loop, so callers see exactly the allowed subsequence in
    /// order, and exhaustion only at the real end.
    pub fn next_entry<E, A, N>(&self, cursor: E, mut advance: A, syspath_of: N) -> Option<E>
    where
        E: Copy,
        A: FnMut(E) -> Option<E>,
        N: Fn(E) -> Option<String>,
    {
        let Some(policy) = self.gate.policy() else {
            return advance(cursor);
        };

        next_visible(cursor, advance, |&entry| self.is_hidden(policy, syspath_of(entry)))
    }

    /// Entries that do not name a device (property, tag and attribute
    /// lists share the same iterator) are never hidden.
    fn is_hidden(&self, policy: &Policy, syspath: Option<String>) -> bool {
        let Some(device) = syspath.and_then(|path| self.source.lookup(&path)) else {
            return false;
        };

        if !is_forbidden(&device, policy.attributes()) {
            return false;
        }

        info!(
            "Hiding udev device '{}'",
            device.devnode().or_else(|| device.syspath()).unwrap_or_default()
        );
        true
    }
}

/// Step `advance` from `cursor` until an entry that is not `hidden`, or the
/// end. Runs in one frame regardless of how many entries are skipped.
pub fn next_visible<E, A, H>(mut cursor: E, mut advance: A, mut hidden: H) -> Option<E>
where
    E: Copy,
    A: FnMut(E) -> Option<E>,
    H: FnMut(&E) -> bool,
{
    loop {
        let entry = advance(cursor)?;
        if !hidden(&entry) {
            return Some(entry);
        }
        cursor = entry;
    }
}
