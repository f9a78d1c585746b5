//! Byte limit over an upstream resource

use std::sync::atomic::{AtomicUsize, Ordering};

use gpuscalar_core::{Error, MemoryKind, Result};

use crate::ptr::DevicePtr;
use crate::resource::{DeviceMemoryResource, MemoryResourceRef};
use crate::stream::Stream;

/// Fails allocations that would push outstanding bytes past a limit
///
/// The limit is checked before the upstream is asked, so a rejected request
/// never reaches it.
pub struct LimitingResourceAdaptor {
    upstream: MemoryResourceRef,
    limit: usize,
    allocated: AtomicUsize,
}

impl LimitingResourceAdaptor {
    /// Wrap `upstream` with a cap of `limit` outstanding bytes
    pub fn new(upstream: MemoryResourceRef, limit: usize) -> Self {
        Self {
            upstream,
            limit,
            allocated: AtomicUsize::new(0),
        }
    }

    /// Configured limit in bytes
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes currently outstanding
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.load(Ordering::Acquire)
    }
}

impl DeviceMemoryResource for LimitingResourceAdaptor {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr> {
        let reserved = self
            .allocated
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current.checked_add(bytes).filter(|total| *total <= self.limit)
            });
        if reserved.is_err() {
            return Err(Error::out_of_memory(
                bytes,
                self.name(),
                format!(
                    "limit of {} bytes reached ({} outstanding)",
                    self.limit,
                    self.allocated_bytes()
                ),
            ));
        }
        match self.upstream.allocate(bytes, stream) {
            Ok(ptr) => Ok(ptr),
            Err(e) => {
                self.allocated.fetch_sub(bytes, Ordering::AcqRel);
                Err(e)
            }
        }
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()> {
        self.upstream.deallocate(ptr, bytes, stream)?;
        if !ptr.is_null() {
            self.allocated.fetch_sub(bytes, Ordering::AcqRel);
        }
        Ok(())
    }

    fn memory_kind(&self) -> MemoryKind {
        self.upstream.memory_kind()
    }

    fn name(&self) -> &'static str {
        "limiting"
    }
}
