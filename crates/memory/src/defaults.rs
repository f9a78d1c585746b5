//! Process-wide default device, stream and memory resource
//!
//! Factories never read these implicitly: callers that have no stream or
//! resource of their own fetch the defaults here and pass them explicitly.
//! The defaults start as a host-emulated device with a `HostMemoryResource`.
//!
//! # Thread Safety
//!
//! All functions are thread-safe. Replacing a default does not affect
//! scalars already constructed: each buffer keeps the resource it was
//! allocated from.

use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::device::DeviceRef;
use crate::host::{HostDevice, HostMemoryResource};
use crate::resource::MemoryResourceRef;
use crate::stream::Stream;

struct Defaults {
    device: DeviceRef,
    stream: Stream,
    resource: MemoryResourceRef,
}

impl Defaults {
    fn host() -> Self {
        let device: DeviceRef = Arc::new(HostDevice::new());
        let stream = Stream::default_for(&device);
        Self {
            device,
            stream,
            resource: Arc::new(HostMemoryResource::new()),
        }
    }
}

static DEFAULTS: Lazy<RwLock<Defaults>> = Lazy::new(|| RwLock::new(Defaults::host()));

/// The process-wide default device
pub fn default_device() -> DeviceRef {
    Arc::clone(&DEFAULTS.read().device)
}

/// The default stream of the process-wide default device
///
/// Every call returns a clone of the same token.
pub fn default_stream() -> Stream {
    DEFAULTS.read().stream.clone()
}

/// The process-wide default memory resource
pub fn current_resource() -> MemoryResourceRef {
    Arc::clone(&DEFAULTS.read().resource)
}

/// The default stream and default resource, read together
///
/// The pair always comes from the same install, so the stream's memory kind
/// matches the resource's whenever the installed pair matched.
pub fn current_defaults() -> (Stream, MemoryResourceRef) {
    let defaults = DEFAULTS.read();
    (defaults.stream.clone(), Arc::clone(&defaults.resource))
}

/// Replace the default device and memory resource under one lock
///
/// The default stream is reset to the new device's default stream. Returns
/// the previous device and resource.
pub fn set_defaults(device: DeviceRef, resource: MemoryResourceRef) -> (DeviceRef, MemoryResourceRef) {
    let mut defaults = DEFAULTS.write();
    tracing::info!(
        target: "gpuscalar::memory",
        device = device.name(),
        resource = resource.name(),
        "Replaced default device and memory resource"
    );
    defaults.stream = Stream::default_for(&device);
    let previous_device = std::mem::replace(&mut defaults.device, device);
    let previous_resource = std::mem::replace(&mut defaults.resource, resource);
    (previous_device, previous_resource)
}

/// Replace the default memory resource, returning the previous one
pub fn set_current_resource(resource: MemoryResourceRef) -> MemoryResourceRef {
    let mut defaults = DEFAULTS.write();
    tracing::info!(target: "gpuscalar::memory", resource = resource.name(), "Replaced default memory resource");
    std::mem::replace(&mut defaults.resource, resource)
}

/// Replace the default device, resetting the default stream to its default
/// stream, and return the previous device
pub fn set_default_device(device: DeviceRef) -> DeviceRef {
    let mut defaults = DEFAULTS.write();
    tracing::info!(target: "gpuscalar::memory", device = device.name(), "Replaced default device");
    defaults.stream = Stream::default_for(&device);
    std::mem::replace(&mut defaults.device, device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuscalar_core::MemoryKind;
    use parking_lot::Mutex;

    // Serializes tests that replace the process-wide defaults
    static SWAP_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_defaults_are_host() {
        assert_eq!(default_device().memory_kind(), MemoryKind::Host);
        assert_eq!(current_resource().memory_kind(), MemoryKind::Host);
    }

    #[test]
    fn test_default_stream_is_shared() {
        let a = default_stream();
        let b = default_stream();
        assert!(a.is_same(&b));
    }

    #[test]
    fn test_set_current_resource_returns_previous() {
        let _guard = SWAP_LOCK.lock();
        let replacement: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let previous = set_current_resource(Arc::clone(&replacement));
        assert!(Arc::ptr_eq(&current_resource(), &replacement));
        let restored = set_current_resource(previous);
        assert!(Arc::ptr_eq(&restored, &replacement));
    }

    #[test]
    fn test_set_defaults_swaps_pair_together() {
        let _guard = SWAP_LOCK.lock();
        let device: DeviceRef = Arc::new(HostDevice::new());
        let resource: MemoryResourceRef = Arc::new(HostMemoryResource::new());
        let (old_device, old_resource) = set_defaults(Arc::clone(&device), Arc::clone(&resource));

        let (stream, current) = current_defaults();
        assert!(Arc::ptr_eq(stream.device(), &device));
        assert!(Arc::ptr_eq(&current, &resource));
        assert!(stream.is_same(&default_stream()));

        let (restored_device, restored_resource) = set_defaults(old_device, old_resource);
        assert!(Arc::ptr_eq(&restored_device, &device));
        assert!(Arc::ptr_eq(&restored_resource, &resource));
    }
}
