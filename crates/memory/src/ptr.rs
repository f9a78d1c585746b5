//! Device pointers
//!
//! A device pointer is an address in the device's address space. It is just
//! an integer handle: it never references host memory that Rust tracks, so it
//! is `Copy`, `Send` and `Sync`. Dereferencing it is the device runtime's job.

use std::fmt;

/// Address of device memory
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DevicePtr(u64);

impl DevicePtr {
    /// The null device pointer
    pub const NULL: DevicePtr = DevicePtr(0);

    /// Wrap a raw device address
    pub const fn new(addr: u64) -> Self {
        DevicePtr(addr)
    }

    /// Raw device address
    pub const fn addr(&self) -> u64 {
        self.0
    }

    /// True for the null pointer
    pub const fn is_null(&self) -> bool {
        self.0 == 0
    }

    /// Pointer `bytes` past this one
    ///
    /// Wraps on overflow; the caller keeps offsets inside one allocation.
    pub const fn offset(&self, bytes: usize) -> Self {
        DevicePtr(self.0.wrapping_add(bytes as u64))
    }

    /// Whether the address is a multiple of `align`
    pub fn is_aligned_to(&self, align: usize) -> bool {
        align != 0 && self.0 % align as u64 == 0
    }
}

impl fmt::Debug for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevicePtr({:#x})", self.0)
    }
}

impl fmt::Display for DevicePtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null() {
        assert!(DevicePtr::NULL.is_null());
        assert!(DevicePtr::default().is_null());
        assert!(!DevicePtr::new(0x1000).is_null());
    }

    #[test]
    fn test_offset_and_alignment() {
        let p = DevicePtr::new(0x100);
        assert_eq!(p.offset(0x10).addr(), 0x110);
        assert!(p.is_aligned_to(256));
        assert!(!p.offset(1).is_aligned_to(2));
        assert!(!p.is_aligned_to(0));
    }

    #[test]
    fn test_debug_format() {
        assert_eq!(format!("{:?}", DevicePtr::new(255)), "DevicePtr(0xff)");
    }
}
