//! Host-emulated device
//!
//! `HostDevice` and `HostMemoryResource` stand in for an accelerator when
//! none is present: "device memory" is aligned host heap and device pointers
//! are host addresses. Each operation executes when it is issued, which
//! satisfies in-issue-order execution per stream, and no call ever waits on
//! another stream.

use std::alloc::{self, Layout};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use gpuscalar_core::{Error, MemoryKind, Result};

use crate::device::{Device, RawStream};
use crate::ptr::DevicePtr;
use crate::resource::DeviceMemoryResource;
use crate::stream::Stream;

/// Default alignment of host-emulated device allocations
pub const DEFAULT_HOST_ALIGNMENT: usize = 256;

/// Device whose memory is host heap
#[derive(Debug)]
pub struct HostDevice {
    next_stream: AtomicU64,
}

impl HostDevice {
    /// Create a host-emulated device
    pub fn new() -> Self {
        Self {
            next_stream: AtomicU64::new(1),
        }
    }
}

impl Default for HostDevice {
    fn default() -> Self {
        Self::new()
    }
}

fn check_range(ptr: DevicePtr, bytes: usize, what: &str) -> Result<()> {
    if ptr.is_null() && bytes > 0 {
        return Err(Error::device(format!("{}: null device pointer", what)));
    }
    Ok(())
}

impl Device for HostDevice {
    fn name(&self) -> &'static str {
        "host"
    }

    fn memory_kind(&self) -> MemoryKind {
        MemoryKind::Host
    }

    fn create_stream(&self) -> Result<RawStream> {
        Ok(self.next_stream.fetch_add(1, Ordering::Relaxed))
    }

    fn destroy_stream(&self, _stream: RawStream) -> Result<()> {
        Ok(())
    }

    unsafe fn memset_async(
        &self,
        dst: DevicePtr,
        value: u8,
        bytes: usize,
        _stream: RawStream,
    ) -> Result<()> {
        check_range(dst, bytes, "memset")?;
        if bytes > 0 {
            // SAFETY: caller guarantees dst..dst+bytes is a live host allocation.
            std::ptr::write_bytes(dst.addr() as usize as *mut u8, value, bytes);
        }
        Ok(())
    }

    unsafe fn copy_host_to_device_async(
        &self,
        dst: DevicePtr,
        src: &[u8],
        _stream: RawStream,
    ) -> Result<()> {
        check_range(dst, src.len(), "copy host to device")?;
        if !src.is_empty() {
            // SAFETY: caller guarantees the destination range is live and it
            // cannot alias a borrowed slice.
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst.addr() as usize as *mut u8, src.len());
        }
        Ok(())
    }

    unsafe fn copy_device_to_device_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        _stream: RawStream,
    ) -> Result<()> {
        check_range(dst, bytes, "copy device to device")?;
        check_range(src, bytes, "copy device to device")?;
        if bytes > 0 {
            // SAFETY: caller guarantees both ranges are live; they may overlap.
            std::ptr::copy(
                src.addr() as usize as *const u8,
                dst.addr() as usize as *mut u8,
                bytes,
            );
        }
        Ok(())
    }

    unsafe fn copy_device_to_host(
        &self,
        dst: &mut [u8],
        src: DevicePtr,
        _stream: RawStream,
    ) -> Result<()> {
        check_range(src, dst.len(), "copy device to host")?;
        if !dst.is_empty() {
            // SAFETY: caller guarantees src..src+len is a live host allocation.
            std::ptr::copy_nonoverlapping(src.addr() as usize as *const u8, dst.as_mut_ptr(), dst.len());
        }
        Ok(())
    }

    fn synchronize(&self, _stream: RawStream) -> Result<()> {
        Ok(())
    }
}

/// Memory resource backed by the global host allocator
#[derive(Debug)]
pub struct HostMemoryResource {
    alignment: usize,
    allocated_bytes: AtomicUsize,
}

impl HostMemoryResource {
    /// Create a resource with [`DEFAULT_HOST_ALIGNMENT`]
    pub fn new() -> Self {
        Self {
            alignment: DEFAULT_HOST_ALIGNMENT,
            allocated_bytes: AtomicUsize::new(0),
        }
    }

    /// Create a resource with a custom alignment
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` unless `alignment` is a power of two.
    pub fn with_alignment(alignment: usize) -> Result<Self> {
        if !alignment.is_power_of_two() {
            return Err(Error::config(format!(
                "alignment must be a power of two, got {}",
                alignment
            )));
        }
        Ok(Self {
            alignment,
            allocated_bytes: AtomicUsize::new(0),
        })
    }

    /// Alignment of every allocation
    pub fn alignment(&self) -> usize {
        self.alignment
    }

    /// Bytes currently handed out
    pub fn allocated_bytes(&self) -> usize {
        self.allocated_bytes.load(Ordering::Relaxed)
    }
}

impl Default for HostMemoryResource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMemoryResource for HostMemoryResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr> {
        if bytes == 0 {
            return Ok(DevicePtr::NULL);
        }
        let layout = Layout::from_size_align(bytes, self.alignment)
            .map_err(|e| Error::out_of_memory(bytes, self.name(), e.to_string()))?;
        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc::alloc(layout) };
        if raw.is_null() {
            return Err(Error::out_of_memory(bytes, self.name(), "host allocator returned null"));
        }
        self.allocated_bytes.fetch_add(bytes, Ordering::Relaxed);
        let ptr = DevicePtr::new(raw as usize as u64);
        tracing::debug!(target: "gpuscalar::memory", %ptr, bytes, stream = %stream.id(), "host allocate");
        Ok(ptr)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()> {
        if ptr.is_null() {
            return Ok(());
        }
        let layout = Layout::from_size_align(bytes, self.alignment)
            .map_err(|e| Error::device(format!("invalid deallocation of {} bytes: {}", bytes, e)))?;
        // Work on this device completes at issue time, so nothing can still be
        // reading the block.
        // SAFETY: ptr was returned by allocate with this exact layout.
        unsafe { alloc::dealloc(ptr.addr() as usize as *mut u8, layout) };
        self.allocated_bytes.fetch_sub(bytes, Ordering::Relaxed);
        tracing::debug!(target: "gpuscalar::memory", %ptr, bytes, stream = %stream.id(), "host deallocate");
        Ok(())
    }

    fn memory_kind(&self) -> MemoryKind {
        MemoryKind::Host
    }

    fn name(&self) -> &'static str {
        "host"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRef;
    use std::sync::Arc;

    fn host_stream() -> Stream {
        let device: DeviceRef = Arc::new(HostDevice::new());
        Stream::new(&device).unwrap()
    }

    #[test]
    fn test_allocate_is_aligned() {
        let mr = HostMemoryResource::new();
        let stream = host_stream();
        let p = mr.allocate(3, &stream).unwrap();
        assert!(!p.is_null());
        assert!(p.is_aligned_to(DEFAULT_HOST_ALIGNMENT));
        assert_eq!(mr.allocated_bytes(), 3);
        mr.deallocate(p, 3, &stream).unwrap();
        assert_eq!(mr.allocated_bytes(), 0);
    }

    #[test]
    fn test_zero_byte_allocation_is_null() {
        let mr = HostMemoryResource::new();
        let stream = host_stream();
        let p = mr.allocate(0, &stream).unwrap();
        assert!(p.is_null());
        assert!(mr.deallocate(p, 0, &stream).is_ok());
        assert_eq!(mr.allocated_bytes(), 0);
    }

    #[test]
    fn test_custom_alignment() {
        assert!(HostMemoryResource::with_alignment(3).is_err());
        let mr = HostMemoryResource::with_alignment(4096).unwrap();
        let stream = host_stream();
        let p = mr.allocate(10, &stream).unwrap();
        assert!(p.is_aligned_to(4096));
        mr.deallocate(p, 10, &stream).unwrap();
    }

    #[test]
    fn test_oversized_request_is_out_of_memory() {
        let mr = HostMemoryResource::new();
        let stream = host_stream();
        let err = mr.allocate(usize::MAX, &stream).unwrap_err();
        assert!(err.is_out_of_memory());
    }

    #[test]
    fn test_memset_and_copies() {
        let mr = HostMemoryResource::new();
        let stream = host_stream();
        let a = mr.allocate(8, &stream).unwrap();
        let b = mr.allocate(8, &stream).unwrap();
        let mut out = [0u8; 8];
        unsafe {
            stream.memset_async(a, 0xAB, 8).unwrap();
            stream.copy_host_to_device_async(a.offset(4), b"wxyz").unwrap();
            stream.copy_device_to_device_async(b, a, 8).unwrap();
            stream.copy_device_to_host(&mut out, b).unwrap();
        }
        assert_eq!(&out, &[0xAB, 0xAB, 0xAB, 0xAB, b'w', b'x', b'y', b'z']);
        mr.deallocate(a, 8, &stream).unwrap();
        mr.deallocate(b, 8, &stream).unwrap();
    }

    #[test]
    fn test_null_pointer_rejected() {
        let stream = host_stream();
        let err = unsafe { stream.memset_async(DevicePtr::NULL, 0, 4) }.unwrap_err();
        assert!(err.to_string().contains("null device pointer"));
        // Empty operations on null are fine
        assert!(unsafe { stream.memset_async(DevicePtr::NULL, 0, 0) }.is_ok());
    }
}
