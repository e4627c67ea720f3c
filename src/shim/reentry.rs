//! Per-thread re-entrancy guard
//!
//! While the filter is working (loading its config, loading libudev,
//! scanning sysfs) it triggers the very calls it intercepts. Those nested
//! calls must go straight to the original implementation.

use std::cell::Cell;
use std::marker::PhantomData;

thread_local! {
    static INSIDE: Cell<bool> = const { Cell::new(false) };
}

/// Marks the current thread as inside the filter until dropped
#[derive(Debug)]
pub struct ReentryGuard {
    // tied to the thread that set the flag
    _thread: PhantomData<*const ()>,
}

impl ReentryGuard {
    /// `None` if this thread is already inside the filter, or its
    /// thread-local storage is gone (thread teardown).
    pub fn enter() -> Option<Self> {
        INSIDE
            .try_with(|inside| {
                if inside.replace(true) {
                    None
                } else {
                    Some(Self {
                        _thread: PhantomData,
                    })
                }
            })
            .ok()
            .flatten()
    }
}

impl Drop for ReentryGuard {
    fn drop(&mut self) {
        let _ = INSIDE.try_with(|inside| inside.set(false));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_entry_refused() {
        let outer = ReentryGuard::enter();
        assert!(outer.is_some());
        assert!(ReentryGuard::enter().is_none());

        drop(outer);
        assert!(ReentryGuard::enter().is_some());
    }

    #[test]
    fn test_guard_is_per_thread() {
        let _outer = ReentryGuard::enter().unwrap();
        let other = std::thread::spawn(|| ReentryGuard::enter().is_some())
            .join()
            .unwrap();
        assert!(other);
    }
}
