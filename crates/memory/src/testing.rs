//! Test doubles for the memory resource contract
//!
//! Provides a `RecordingResource` that records every call it receives and can
//! be told to fail a chosen allocation. Used to verify that construction code
//! releases everything it acquires and issues work in stream order.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use gpuscalar_memory::testing::RecordingResource;
//! use gpuscalar_memory::{default_stream, DeviceBuffer, MemoryResourceRef};
//!
//! let recorder = Arc::new(RecordingResource::new());
//! let mr: MemoryResourceRef = recorder.clone();
//! let stream = default_stream();
//! drop(DeviceBuffer::new(16, &stream, &mr).unwrap());
//! assert!(recorder.is_balanced());
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use gpuscalar_core::{Error, MemoryKind, Result};

use crate::host::HostMemoryResource;
use crate::ptr::DevicePtr;
use crate::resource::DeviceMemoryResource;
use crate::stream::{Stream, StreamId};

/// Kind of recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceOp {
    /// Successful allocation
    Allocate,
    /// Allocation the recorder was told to fail
    FailedAllocate,
    /// Deallocation
    Deallocate,
}

/// One recorded call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResourceCall {
    /// What happened
    pub op: ResourceOp,
    /// Pointer involved (null for failed allocations)
    pub ptr: DevicePtr,
    /// Requested size in bytes
    pub bytes: usize,
    /// Stream the call was issued on
    pub stream: StreamId,
}

/// Host-backed resource that records calls and injects failures
pub struct RecordingResource {
    inner: HostMemoryResource,
    calls: Mutex<Vec<ResourceCall>>,
    allocate_attempts: AtomicUsize,
    fail_at: Mutex<Option<usize>>,
}

impl RecordingResource {
    /// Create a recorder that never fails
    pub fn new() -> Self {
        Self {
            inner: HostMemoryResource::new(),
            calls: Mutex::new(Vec::new()),
            allocate_attempts: AtomicUsize::new(0),
            fail_at: Mutex::new(None),
        }
    }

    /// Create a recorder whose `n`th allocation attempt (0-based) fails
    pub fn failing_at(n: usize) -> Self {
        let recorder = Self::new();
        *recorder.fail_at.lock() = Some(n);
        recorder
    }

    /// Make the `n`th allocation attempt from now (0-based) fail
    pub fn fail_allocation_after(&self, n: usize) {
        let attempts = self.allocate_attempts.load(Ordering::SeqCst);
        *self.fail_at.lock() = Some(attempts + n);
    }

    /// Every call recorded so far, in issue order
    pub fn calls(&self) -> Vec<ResourceCall> {
        self.calls.lock().clone()
    }

    /// Calls issued on `stream`, in issue order
    pub fn calls_on(&self, stream: StreamId) -> Vec<ResourceCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.stream == stream)
            .copied()
            .collect()
    }

    /// Number of calls of kind `op`
    pub fn count(&self, op: ResourceOp) -> usize {
        self.calls.lock().iter().filter(|c| c.op == op).count()
    }

    /// Bytes allocated and not yet released
    pub fn outstanding_bytes(&self) -> usize {
        self.inner.allocated_bytes()
    }

    /// True if every successful allocation has a matching deallocation
    pub fn is_balanced(&self) -> bool {
        let calls = self.calls.lock();
        let mut live: Vec<(DevicePtr, usize)> = Vec::new();
        for call in calls.iter() {
            match call.op {
                ResourceOp::Allocate => live.push((call.ptr, call.bytes)),
                ResourceOp::Deallocate => {
                    match live.iter().position(|entry| *entry == (call.ptr, call.bytes)) {
                        Some(i) => {
                            live.swap_remove(i);
                        }
                        None => return false,
                    }
                }
                ResourceOp::FailedAllocate => {}
            }
        }
        live.is_empty()
    }

    /// Forget recorded calls
    pub fn clear(&self) {
        self.calls.lock().clear();
    }
}

impl Default for RecordingResource {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceMemoryResource for RecordingResource {
    fn allocate(&self, bytes: usize, stream: &Stream) -> Result<DevicePtr> {
        let attempt = self.allocate_attempts.fetch_add(1, Ordering::SeqCst);
        let mut calls = self.calls.lock();
        if *self.fail_at.lock() == Some(attempt) {
            calls.push(ResourceCall {
                op: ResourceOp::FailedAllocate,
                ptr: DevicePtr::NULL,
                bytes,
                stream: stream.id(),
            });
            return Err(Error::out_of_memory(bytes, self.name(), "injected failure"));
        }
        let ptr = self.inner.allocate(bytes, stream)?;
        calls.push(ResourceCall {
            op: ResourceOp::Allocate,
            ptr,
            bytes,
            stream: stream.id(),
        });
        Ok(ptr)
    }

    fn deallocate(&self, ptr: DevicePtr, bytes: usize, stream: &Stream) -> Result<()> {
        let mut calls = self.calls.lock();
        self.inner.deallocate(ptr, bytes, stream)?;
        calls.push(ResourceCall {
            op: ResourceOp::Deallocate,
            ptr,
            bytes,
            stream: stream.id(),
        });
        Ok(())
    }

    fn memory_kind(&self) -> MemoryKind {
        MemoryKind::Host
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
