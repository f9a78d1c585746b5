//! Allocation statistics over an upstream resource

use parking_lot::Mutex;

use gpuscalar_core::{MemoryKind, Result};

use crate::ptr::DevicePtr;
use crate::resource::{DeviceMemoryResource, MemoryResourceRef};
use crate::stream::Stream;

/// Snapshot of allocation counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStatistics {
    /// Successful non-empty allocations
    pub allocations: u64,
    /// Successful non-empty deallocations
    pub deallocations: u64,
    /// Bytes currently outstanding
    pub current_bytes: usize,
    /// Highest value `current_bytes` has reached
    pub peak_bytes: usize,
    /// Bytes handed out over the adaptor's lifetime
    pub total_bytes: usize,
}

impl AllocationStatistics {
    /// Allocations not yet released
    pub fn outstanding(&self) -> u64 {
        self.allocations - self.deallocations
    }
}

/// Counts allocations and bytes flowing through an upstream resource
pub struct StatisticsResourceAdaptor {
    upstream: MemoryResourceRef,
    stats: Mutex<AllocationStatistics>,
}

impl StatisticsResourceAdaptor {
    /// Wrap `upstream`
    pub fn new(upstream: MemoryResourceRef) -> Self {
        Self {
            upstream,
            stats: Mutex::new(AllocationStatistics::default()),
        }
    }

    /// Current counters
    pub fn statistics(&self) -> AllocationStatistics {
        *self.stats.lock()
    }

    /// The wrapped resource
    pub fn upstream(&self) -> &MemoryResourceRef {
        &self.upstream
    }
}

impl DeviceMemoryResource for StatisticsResourceAdaptor {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr> {
        let ptr = self.upstream.allocate(bytes, stream)?;
        if !ptr.is_null() {
            let mut stats = self.stats.lock();
            stats.allocations += 1;
            stats.current_bytes += bytes;
            stats.total_bytes += bytes;
            stats.peak_bytes = stats.peak_bytes.max(stats.current_bytes);
        }
        Ok(ptr)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()> {
        self.upstream.deallocate(ptr, bytes, stream)?;
        if !ptr.is_null() {
            let mut stats = self.stats.lock();
            stats.deallocations += 1;
            stats.current_bytes -= bytes;
        }
        Ok(())
    }

    fn memory_kind(&self) -> MemoryKind {
        self.upstream.memory_kind()
    }

    fn name(&self) -> &'static str {
        "statistics"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceRef;
    use crate::host::{HostDevice, HostMemoryResource};
    use std::sync::Arc;

    #[test]
    fn test_counts_and_peak() {
        let device: DeviceRef = Arc::new(HostDevice::new());
        let stream = Stream::new(&device).unwrap();
        let mr = StatisticsResourceAdaptor::new(Arc::new(HostMemoryResource::new()));

        let a = mr.allocate(100, &stream).unwrap();
        let b = mr.allocate(50, &stream).unwrap();
        mr.deallocate(a, 100, &stream).unwrap();

        let stats = mr.statistics();
        assert_eq!(stats.allocations, 2);
        assert_eq!(stats.deallocations, 1);
        assert_eq!(stats.current_bytes, 50);
        assert_eq!(stats.peak_bytes, 150);
        assert_eq!(stats.total_bytes, 150);
        assert_eq!(stats.outstanding(), 1);

        mr.deallocate(b, 50, &stream).unwrap();
        assert_eq!(mr.statistics().outstanding(), 0);
    }

    #[test]
    fn test_empty_allocations_not_counted() {
        let device: DeviceRef = Arc::new(HostDevice::new());
        let stream = Stream::new(&device).unwrap();
        let mr = StatisticsResourceAdaptor::new(Arc::new(HostMemoryResource::new()));
        let p = mr.allocate(0, &stream).unwrap();
        mr.deallocate(p, 0, &stream).unwrap();
        assert_eq!(mr.statistics(), AllocationStatistics::default());
        assert_eq!(mr.memory_kind(), MemoryKind::Host);
    }
}
