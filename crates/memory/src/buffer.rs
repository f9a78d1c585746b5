//! RAII device allocation
//!
//! A `DeviceBuffer` owns exactly one allocation. It remembers the stream and
//! resource it was acquired with and releases through them when dropped, so
//! memory always goes back to the resource that produced it.

use std::fmt;

use gpuscalar_core::Result;

use crate::ptr::DevicePtr;
use crate::resource::{ensure_compatible, MemoryResourceRef};
use crate::stream::Stream;

/// Owned, untyped device memory
pub struct DeviceBuffer {
    ptr: DevicePtr,
    size: usize,
    stream: Stream,
    mr: MemoryResourceRef,
}

impl DeviceBuffer {
    /// Allocate `size` uninitialized bytes on `stream`
    ///
    /// A zero-size buffer holds the null pointer and never touches `mr`.
    ///
    /// # Errors
    ///
    /// Returns `Error::DeviceMismatch` if `stream` and `mr` target different
    /// memory, or the resource's error if allocation fails.
    pub fn new(size: usize, stream: &Stream, mr: &MemoryResourceRef) -> Result<Self> {
        ensure_compatible(stream, mr.as_ref())?;
        let ptr = if size == 0 {
            DevicePtr::NULL
        } else {
            mr.allocate(size, stream)?
        };
        Ok(Self {
            ptr,
            size,
            stream: stream.clone(),
            mr: mr.clone(),
        })
    }

    /// Allocate `size` bytes and fill them with `value`
    pub fn filled(size: usize, value: u8, stream: &Stream, mr: &MemoryResourceRef) -> Result<Self> {
        let mut buffer = Self::new(size, stream, mr)?;
        buffer.memset(value, stream)?;
        Ok(buffer)
    }

    /// Allocate and copy `bytes` from the host
    pub fn from_host(bytes: &[u8], stream: &Stream, mr: &MemoryResourceRef) -> Result<Self> {
        let buffer = Self::new(bytes.len(), stream, mr)?;
        // SAFETY: the buffer was just allocated with exactly bytes.len() bytes.
        unsafe { stream.copy_host_to_device_async(buffer.ptr, bytes)? };
        Ok(buffer)
    }

    /// Allocate and copy `size` bytes from another device range
    ///
    /// # Safety
    ///
    /// `src..src + size` must be live device memory of the stream's memory
    /// kind until work issued on `stream` completes.
    pub unsafe fn from_device(
        src: DevicePtr,
        size: usize,
        stream: &Stream,
        mr: &MemoryResourceRef,
    ) -> Result<Self> {
        let buffer = Self::new(size, stream, mr)?;
        stream.copy_device_to_device_async(buffer.ptr, src, size)?;
        Ok(buffer)
    }

    /// Device address of the first byte (null when empty)
    pub fn ptr(&self) -> DevicePtr {
        self.ptr
    }

    /// Size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// True for a zero-size buffer
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Stream the buffer was allocated on and will be released on
    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Resource the buffer will be released through
    pub fn memory_resource(&self) -> &MemoryResourceRef {
        &self.mr
    }

    /// Fill the whole buffer with `value` on `stream`
    pub fn memset(&mut self, value: u8, stream: &Stream) -> Result<()> {
        // SAFETY: the range is exactly this live allocation.
        unsafe { stream.memset_async(self.ptr, value, self.size) }
    }

    /// Copy the buffer's bytes to the host
    ///
    /// Blocks until work previously issued on `stream` has completed.
    pub fn to_host(&self, stream: &Stream) -> Result<Vec<u8>> {
        let mut host = vec![0u8; self.size];
        // SAFETY: the range is exactly this live allocation.
        unsafe { stream.copy_device_to_host(&mut host, self.ptr)? };
        Ok(host)
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        if self.ptr.is_null() {
            return;
        }
        if let Err(e) = self.mr.deallocate(self.ptr, self.size, &self.stream) {
            tracing::warn!(target: "gpuscalar::memory", ptr = %self.ptr, bytes = self.size, error = %e, "failed to release device buffer");
        }
    }
}

impl fmt::Debug for DeviceBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceBuffer")
            .field("ptr", &self.ptr)
            .field("size", &self.size)
            .field("stream", &self.stream.id())
            .field("resource", &self.mr.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adaptors::StatisticsResourceAdaptor;
    use crate::device::DeviceRef;
    use crate::host::{HostDevice, HostMemoryResource};
    use std::sync::Arc;

    fn setup() -> (Stream, Arc<StatisticsResourceAdaptor>, MemoryResourceRef) {
        let device: DeviceRef = Arc::new(HostDevice::new());
        let stream = Stream::new(&device).unwrap();
        let stats = Arc::new(StatisticsResourceAdaptor::new(Arc::new(HostMemoryResource::new())));
        let mr: MemoryResourceRef = stats.clone();
        (stream, stats, mr)
    }

    #[test]
    fn test_drop_releases_through_resource() {
        let (stream, stats, mr) = setup();
        {
            let buffer = DeviceBuffer::new(32, &stream, &mr).unwrap();
            assert_eq!(buffer.size(), 32);
            assert!(!buffer.ptr().is_null());
            assert_eq!(stats.statistics().outstanding(), 1);
        }
        let s = stats.statistics();
        assert_eq!(s.allocations, 1);
        assert_eq!(s.deallocations, 1);
        assert_eq!(s.current_bytes, 0);
    }

    #[test]
    fn test_empty_buffer_skips_resource() {
        let (stream, stats, mr) = setup();
        let buffer = DeviceBuffer::new(0, &stream, &mr).unwrap();
        assert!(buffer.is_empty());
        assert!(buffer.ptr().is_null());
        drop(buffer);
        assert_eq!(stats.statistics().allocations, 0);
    }

    #[test]
    fn test_from_host_round_trip() {
        let (stream, _stats, mr) = setup();
        let buffer = DeviceBuffer::from_host(b"device bytes", &stream, &mr).unwrap();
        assert_eq!(buffer.to_host(&stream).unwrap(), b"device bytes");
    }

    #[test]
    fn test_filled_and_memset() {
        let (stream, _stats, mr) = setup();
        let mut buffer = DeviceBuffer::filled(4, 0xFF, &stream, &mr).unwrap();
        assert_eq!(buffer.to_host(&stream).unwrap(), vec![0xFF; 4]);
        buffer.memset(0, &stream).unwrap();
        assert_eq!(buffer.to_host(&stream).unwrap(), vec![0; 4]);
    }

    #[test]
    fn test_from_device_copies() {
        let (stream, _stats, mr) = setup();
        let src = DeviceBuffer::from_host(b"abc", &stream, &mr).unwrap();
        let dst = unsafe { DeviceBuffer::from_device(src.ptr(), 3, &stream, &mr) }.unwrap();
        drop(src);
        assert_eq!(dst.to_host(&stream).unwrap(), b"abc");
    }
}
