//! Runtime loading of the CUDA driver library
//!
//! The driver is resolved with the platform loader when a `CudaDevice` is
//! first created, so the crate builds and links without the CUDA toolkit.

use std::ffi::CStr;
use std::os::raw::{c_char, c_void};

use gpuscalar_core::{Error, Result};

/// An open shared library, closed on drop
pub struct SharedLibrary {
    handle: *mut c_void,
}

// SAFETY: the handle is process-global and the driver API is thread-safe.
unsafe impl Send for SharedLibrary {}
unsafe impl Sync for SharedLibrary {}

impl SharedLibrary {
    /// Open the first library in `candidates` that the loader can find.
    pub fn open_any(candidates: &[&CStr]) -> Result<Self> {
        let mut failures = Vec::with_capacity(candidates.len());
        for name in candidates {
            // SAFETY: `name` is NUL-terminated.
            let handle = unsafe { sys::open(name.as_ptr()) };
            if !handle.is_null() {
                tracing::debug!(target: "gpuscalar::cuda", library = ?name, "loaded driver library");
                return Ok(Self { handle });
            }
            failures.push(format!("{:?}: {}", name, sys::last_error()));
        }
        Err(Error::device(format!(
            "CUDA driver library not found ({})",
            failures.join("; ")
        )))
    }

    /// Resolve a symbol.
    ///
    /// # Safety
    ///
    /// The returned address must be transmuted to the symbol's actual
    /// signature before it is called.
    pub unsafe fn symbol(&self, name: &CStr) -> Result<*mut c_void> {
        let addr = sys::symbol(self.handle, name.as_ptr());
        if addr.is_null() {
            return Err(Error::device(format!(
                "missing driver symbol {:?}: {}",
                name,
                sys::last_error()
            )));
        }
        Ok(addr)
    }
}

impl Drop for SharedLibrary {
    fn drop(&mut self) {
        // SAFETY: `handle` came from a successful open and is closed once.
        unsafe { sys::close(self.handle) };
    }
}

#[cfg(unix)]
mod sys {
    use super::*;

    const RTLD_NOW: i32 = 2;
    const RTLD_LOCAL: i32 = 0;

    extern "C" {
        fn dlopen(filename: *const c_char, flags: i32) -> *mut c_void;
        fn dlsym(handle: *mut c_void, symbol: *const c_char) -> *mut c_void;
        fn dlclose(handle: *mut c_void) -> i32;
        fn dlerror() -> *const c_char;
    }

    pub unsafe fn open(name: *const c_char) -> *mut c_void {
        dlopen(name, RTLD_NOW | RTLD_LOCAL)
    }

    pub unsafe fn symbol(handle: *mut c_void, name: *const c_char) -> *mut c_void {
        // Clear any stale error so last_error() reports this lookup.
        dlerror();
        dlsym(handle, name)
    }

    pub unsafe fn close(handle: *mut c_void) {
        dlclose(handle);
    }

    pub fn last_error() -> String {
        // SAFETY: dlerror returns null or a NUL-terminated string owned by libc.
        unsafe {
            let msg = dlerror();
            if msg.is_null() {
                "no loader error reported".to_string()
            } else {
                CStr::from_ptr(msg).to_string_lossy().into_owned()
            }
        }
    }
}

#[cfg(windows)]
mod sys {
    use super::*;

    extern "system" {
        fn LoadLibraryA(name: *const c_char) -> *mut c_void;
        fn GetProcAddress(module: *mut c_void, name: *const c_char) -> *mut c_void;
        fn FreeLibrary(module: *mut c_void) -> i32;
        fn GetLastError() -> u32;
    }

    pub unsafe fn open(name: *const c_char) -> *mut c_void {
        LoadLibraryA(name)
    }

    pub unsafe fn symbol(handle: *mut c_void, name: *const c_char) -> *mut c_void {
        GetProcAddress(handle, name)
    }

    pub unsafe fn close(handle: *mut c_void) {
        FreeLibrary(handle);
    }

    pub fn last_error() -> String {
        // SAFETY: no preconditions.
        format!("win32 error {}", unsafe { GetLastError() })
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use super::*;

    pub unsafe fn open(_name: *const c_char) -> *mut c_void {
        std::ptr::null_mut()
    }

    pub unsafe fn symbol(_handle: *mut c_void, _name: *const c_char) -> *mut c_void {
        std::ptr::null_mut()
    }

    pub unsafe fn close(_handle: *mut c_void) {}

    pub fn last_error() -> String {
        "dynamic loading is not supported on this platform".to_string()
    }
}
