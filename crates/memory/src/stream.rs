//! Streams: explicit ordering tokens
//!
//! Every allocation and device write is issued on a `Stream`. Work issued on
//! the same stream executes in issue order; work on different streams is
//! unordered unless the caller synchronizes. A `Stream` is a cheap cloneable
//! handle; clones refer to the same underlying stream.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gpuscalar_core::{MemoryKind, Result};

use crate::device::{DeviceRef, RawStream, DEFAULT_RAW_STREAM};
use crate::ptr::DevicePtr;

static NEXT_STREAM_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique stream identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId(u64);

impl StreamId {
    fn next() -> Self {
        StreamId(NEXT_STREAM_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Numeric value for logging
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

struct StreamInner {
    id: StreamId,
    raw: RawStream,
    device: DeviceRef,
    owned: bool,
}

impl Drop for StreamInner {
    fn drop(&mut self) {
        if self.owned {
            if let Err(e) = self.device.destroy_stream(self.raw) {
                tracing::warn!(target: "gpuscalar::memory", stream = %self.id, error = %e, "failed to destroy stream");
            }
        }
    }
}

/// Ordering token for device work
#[derive(Clone)]
pub struct Stream {
    inner: Arc<StreamInner>,
}

impl Stream {
    /// Create a new stream on `device`
    ///
    /// The raw stream is destroyed when the last clone is dropped.
    pub fn new(device: &DeviceRef) -> Result<Self> {
        let raw = device.create_stream()?;
        let id = StreamId::next();
        tracing::debug!(target: "gpuscalar::memory", stream = %id, device = device.name(), "created stream");
        Ok(Self {
            inner: Arc::new(StreamInner {
                id,
                raw,
                device: Arc::clone(device),
                owned: true,
            }),
        })
    }

    /// Wrap the default stream of `device`
    ///
    /// Each call yields a token with a new identity; all of them issue onto
    /// the device's default stream. Use [`crate::default_stream`] for the
    /// process-wide shared token.
    pub fn default_for(device: &DeviceRef) -> Self {
        Self {
            inner: Arc::new(StreamInner {
                id: StreamId::next(),
                raw: DEFAULT_RAW_STREAM,
                device: Arc::clone(device),
                owned: false,
            }),
        }
    }

    /// Identity of this stream
    pub fn id(&self) -> StreamId {
        self.inner.id
    }

    /// Backend handle
    pub fn raw(&self) -> RawStream {
        self.inner.raw
    }

    /// Device this stream issues onto
    pub fn device(&self) -> &DeviceRef {
        &self.inner.device
    }

    /// Memory kind of the stream's device
    pub fn memory_kind(&self) -> MemoryKind {
        self.inner.device.memory_kind()
    }

    /// True if both handles refer to the same stream
    pub fn is_same(&self, other: &Stream) -> bool {
        self.inner.id == other.inner.id
    }

    /// Block until all work issued on this stream has completed
    pub fn synchronize(&self) -> Result<()> {
        self.inner.device.synchronize(self.inner.raw)
    }

    /// Enqueue a fill of `bytes` bytes at `dst`
    ///
    /// # Safety
    ///
    /// See [`crate::Device::memset_async`].
    pub unsafe fn memset_async(&self, dst: DevicePtr, value: u8, bytes: usize) -> Result<()> {
        self.inner.device.memset_async(dst, value, bytes, self.inner.raw)
    }

    /// Enqueue a host-to-device copy
    ///
    /// # Safety
    ///
    /// See [`crate::Device::copy_host_to_device_async`].
    pub unsafe fn copy_host_to_device_async(&self, dst: DevicePtr, src: &[u8]) -> Result<()> {
        self.inner
            .device
            .copy_host_to_device_async(dst, src, self.inner.raw)
    }

    /// Enqueue a device-to-device copy
    ///
    /// # Safety
    ///
    /// See [`crate::Device::copy_device_to_device_async`].
    pub unsafe fn copy_device_to_device_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
    ) -> Result<()> {
        self.inner
            .device
            .copy_device_to_device_async(dst, src, bytes, self.inner.raw)
    }

    /// Copy device bytes to the host after prior work on this stream
    ///
    /// # Safety
    ///
    /// See [`crate::Device::copy_device_to_host`].
    pub unsafe fn copy_device_to_host(&self, dst: &mut [u8], src: DevicePtr) -> Result<()> {
        self.inner.device.copy_device_to_host(dst, src, self.inner.raw)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("id", &self.inner.id)
            .field("raw", &self.inner.raw)
            .field("device", &self.inner.device.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::HostDevice;

    fn host() -> DeviceRef {
        Arc::new(HostDevice::new())
    }

    #[test]
    fn test_streams_have_unique_ids() {
        let device = host();
        let a = Stream::new(&device).unwrap();
        let b = Stream::new(&device).unwrap();
        assert_ne!(a.id(), b.id());
        assert!(!a.is_same(&b));
        assert_ne!(a.raw(), b.raw());
    }

    #[test]
    fn test_clone_is_same_stream() {
        let device = host();
        let a = Stream::new(&device).unwrap();
        let c = a.clone();
        assert!(a.is_same(&c));
        assert_eq!(a.raw(), c.raw());
    }

    #[test]
    fn test_default_stream_uses_raw_zero() {
        let device = host();
        let s = Stream::default_for(&device);
        assert_eq!(s.raw(), DEFAULT_RAW_STREAM);
        assert_eq!(s.memory_kind(), MemoryKind::Host);
        assert!(s.synchronize().is_ok());
    }

    #[test]
    fn test_debug_names_device() {
        let device = host();
        let s = Stream::new(&device).unwrap();
        assert!(format!("{:?}", s).contains("host"));
    }
}
