//! Device memory layer for gpuscalar
//!
//! This crate provides everything the scalar layer needs to place values in
//! device memory:
//! - DevicePtr: Address in device memory
//! - Device: Stream creation and stream-ordered fills and copies
//! - Stream: Ordering token threaded through every operation
//! - DeviceMemoryResource: Injectable stream-ordered allocator
//! - HostDevice / HostMemoryResource: Host-emulated device
//! - Adaptors: Allocation statistics and byte limits over any resource
//! - DeviceBuffer: RAII owner of one allocation
//! - Defaults: Process-wide device, stream and resource
//! - CUDA (feature `cuda`): Runtime-loaded driver backend

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adaptors;
pub mod buffer;
pub mod defaults;
pub mod device;
pub mod host;
pub mod ptr;
pub mod resource;
pub mod stream;
pub mod testing;

#[cfg(feature = "cuda")]
pub mod cuda;

pub use adaptors::{AllocationStatistics, LimitingResourceAdaptor, StatisticsResourceAdaptor};
pub use buffer::DeviceBuffer;
pub use defaults::{
    current_defaults, current_resource, default_device, default_stream, set_current_resource,
    set_default_device, set_defaults,
};
pub use device::{select_device, Device, DeviceRef, RawStream, DEFAULT_RAW_STREAM};
pub use host::{HostDevice, HostMemoryResource, DEFAULT_HOST_ALIGNMENT};
pub use ptr::DevicePtr;
pub use resource::{ensure_compatible, DeviceMemoryResource, MemoryResourceRef};
pub use stream::{Stream, StreamId};
