//! Next-in-chain symbol resolution
//!
//! Each intercepted function forwards to whatever definition comes after
//! this library in the dynamic linker's search order (`dlsym(RTLD_NEXT)`).
//! The address is resolved on first use and cached; racing threads resolve
//! the same address, so the last store wins harmlessly.

use std::ffi::c_void;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::error::ResolveError;

/// A lazily resolved "next" definition of one symbol
#[derive(Debug)]
pub struct NextSymbol {
    /// NUL-terminated
    name: &'static str,
    addr: AtomicPtr<c_void>,
}

impl NextSymbol {
    /// `name` must end in `\0`
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            addr: AtomicPtr::new(ptr::null_mut()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name.trim_end_matches('\0')
    }

    /// Address of the next definition
    pub fn resolve(&self) -> Result<*mut c_void, ResolveError> {
        let cached = self.addr.load(Ordering::Acquire);
        if !cached.is_null() {
            return Ok(cached);
        }

        // SAFETY: name is NUL-terminated (constructor contract).
        let addr = unsafe { libc::dlsym(libc::RTLD_NEXT, self.name.as_ptr().cast()) };
        if addr.is_null() {
            return Err(ResolveError { symbol: self.name() });
        }

        self.addr.store(addr, Ordering::Release);
        Ok(addr)
    }

    /// Resolve and reinterpret as the function pointer type `F`
    ///
    /// # Safety
    /// `F` must be the `extern "C"` signature of the symbol.
    pub unsafe fn get<F: Copy>(&self) -> Result<F, ResolveError> {
        let addr = self.resolve()?;
        Ok(unsafe { std::mem::transmute_copy::<*mut c_void, F>(&addr) })
    }
}

pub static OPEN: NextSymbol = NextSymbol::new("open\0");
pub static OPEN64: NextSymbol = NextSymbol::new("open64\0");
pub static FOPEN: NextSymbol = NextSymbol::new("fopen\0");
pub static FOPEN64: NextSymbol = NextSymbol::new("fopen64\0");
pub static LIST_ENTRY_GET_NEXT: NextSymbol = NextSymbol::new("udev_list_entry_get_next\0");
pub static ENUMERATE_GET_LIST_ENTRY: NextSymbol =
    NextSymbol::new("udev_enumerate_get_list_entry\0");
