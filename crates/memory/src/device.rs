//! Device execution abstraction
//!
//! Provides a `Device` trait that abstracts stream management and memory
//! movement across the host-emulated device and CUDA. Allocation is not part
//! of this trait: it belongs to a `DeviceMemoryResource`, which is injected
//! separately so callers can swap allocation policy per call.

use std::sync::Arc;

use gpuscalar_core::{MemoryKind, Result};

use crate::ptr::DevicePtr;

/// Backend-specific stream handle
///
/// `0` is the device's default stream.
pub type RawStream = u64;

/// The default stream handle of every device
pub const DEFAULT_RAW_STREAM: RawStream = 0;

/// Trait for devices that execute stream-ordered memory operations
///
/// Operations issued on the same raw stream execute in issue order. Operations
/// on different streams have no ordering guarantee. All `*_async` functions
/// return once the work is enqueued.
///
/// Thread safety: all methods must be callable concurrently from multiple
/// threads on different streams.
pub trait Device: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Memory this device reads and writes
    fn memory_kind(&self) -> MemoryKind;

    /// Create a new stream
    fn create_stream(&self) -> Result<RawStream>;

    /// Destroy a stream created by [`Device::create_stream`]
    fn destroy_stream(&self, stream: RawStream) -> Result<()>;

    /// Fill `bytes` bytes at `dst` with `value`
    ///
    /// # Safety
    ///
    /// `dst..dst + bytes` must lie inside a live allocation of this device's
    /// memory kind and stay live until the operation completes.
    unsafe fn memset_async(
        &self,
        dst: DevicePtr,
        value: u8,
        bytes: usize,
        stream: RawStream,
    ) -> Result<()>;

    /// Copy host bytes to device memory
    ///
    /// The host slice may be reused as soon as this returns.
    ///
    /// # Safety
    ///
    /// `dst..dst + src.len()` must lie inside a live allocation of this
    /// device's memory kind.
    unsafe fn copy_host_to_device_async(
        &self,
        dst: DevicePtr,
        src: &[u8],
        stream: RawStream,
    ) -> Result<()>;

    /// Copy between two device ranges
    ///
    /// # Safety
    ///
    /// Both ranges must lie inside live allocations of this device's memory
    /// kind and stay live until the operation completes.
    unsafe fn copy_device_to_device_async(
        &self,
        dst: DevicePtr,
        src: DevicePtr,
        bytes: usize,
        stream: RawStream,
    ) -> Result<()>;

    /// Copy device memory to the host, blocking until the bytes arrive
    ///
    /// Work previously issued on `stream` completes before the copy.
    ///
    /// # Safety
    ///
    /// `src..src + dst.len()` must lie inside a live allocation of this
    /// device's memory kind.
    unsafe fn copy_device_to_host(
        &self,
        dst: &mut [u8],
        src: DevicePtr,
        stream: RawStream,
    ) -> Result<()>;

    /// Block until all work issued on `stream` has completed
    fn synchronize(&self, stream: RawStream) -> Result<()>;
}

/// Shared handle to a device
pub type DeviceRef = Arc<dyn Device>;

/// Select the best available device.
///
/// Tries CUDA first when the `cuda` feature is enabled, falls back to the
/// host-emulated device.
pub fn select_device() -> DeviceRef {
    #[cfg(feature = "cuda")]
    {
        match crate::cuda::CudaDevice::try_new() {
            Ok(device) => {
                tracing::info!(target: "gpuscalar::cuda", "Using CUDA device");
                return Arc::new(device);
            }
            Err(e) => {
                tracing::info!(target: "gpuscalar::cuda", error = %e, "CUDA not available, falling back to host device");
            }
        }
    }

    tracing::info!(target: "gpuscalar::memory", "Using host-emulated device");
    Arc::new(crate::host::HostDevice::new())
}
