//! Device memory resource abstraction
//!
//! This module defines the `DeviceMemoryResource` trait, the capability every
//! allocator injected into a factory call must provide. Implementations can be
//! swapped per call without touching the layers that consume them.

use std::sync::Arc;

use gpuscalar_core::{Error, MemoryKind, Result};

use crate::ptr::DevicePtr;
use crate::stream::Stream;

/// Stream-ordered device memory allocator
///
/// Memory returned by `allocate(bytes, stream)` is safe to use by work issued
/// on `stream` after the call. Memory passed to `deallocate(ptr, bytes,
/// stream)` may be reused once work issued on `stream` before the call has
/// completed.
///
/// Thread safety: all methods must be safe to call concurrently from
/// multiple threads and on multiple streams (requires Send + Sync).
///
/// Retry and backpressure are the resource's own policy. Callers in this
/// workspace never retry a failed allocation.
pub trait DeviceMemoryResource: Send + Sync {
    /// Allocate `bytes` bytes of device memory ordered on `stream`
    ///
    /// Zero-byte requests return [`DevicePtr::NULL`].
    ///
    /// # Errors
    ///
    /// Returns `Error::OutOfMemory` if the request cannot be satisfied.
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr>;

    /// Release memory previously returned by `allocate`
    ///
    /// `bytes` must equal the size passed to `allocate`. Releasing the null
    /// pointer is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the release.
    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()>;

    /// Memory kind this resource hands out
    fn memory_kind(&self) -> MemoryKind;

    /// Resource name for logging and errors
    fn name(&self) -> &'static str;

    /// Whether memory from `self` can be released through `other`
    ///
    /// Defaults to identity.
    fn is_equal(&self, other: &dyn DeviceMemoryResource) -> bool {
        std::ptr::eq(
            self as *const Self as *const u8,
            other as *const dyn DeviceMemoryResource as *const u8,
        )
    }
}

/// Shared handle to a memory resource
pub type MemoryResourceRef = Arc<dyn DeviceMemoryResource>;

/// Check that `stream` and `mr` target the same memory
///
/// # Errors
///
/// Returns `Error::DeviceMismatch` if they differ.
pub fn ensure_compatible(stream: &Stream, mr: &dyn DeviceMemoryResource) -> Result<()> {
    let stream_kind = stream.memory_kind();
    let resource_kind = mr.memory_kind();
    if stream_kind != resource_kind {
        return Err(Error::DeviceMismatch {
            stream: stream_kind,
            resource: resource_kind,
        });
    }
    Ok(())
}
