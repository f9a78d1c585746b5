//! Process-wide defaults and configuration, exercised through the facade
//!
//! Tests here replace the default device and resource, so they hold
//! `DEFAULTS_LOCK` to keep from observing each other's installs.

use std::sync::Arc;

use gpuscalar::testing::{RecordingResource, ResourceOp};
use gpuscalar::{
    current_defaults, current_resource, default_device, default_stream, ensure_compatible,
    make_numeric_scalar, make_string_scalar_from_str, set_current_resource, DataType, MaskState,
    MemoryKind, MemoryResourceRef, ScalarConfig,
};
use parking_lot::Mutex;
use proptest::prelude::*;

static DEFAULTS_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn test_default_stream_is_stable_token() {
    let _guard = DEFAULTS_LOCK.lock();
    let a = default_stream();
    let b = default_stream();
    assert!(a.is_same(&b));
    assert_eq!(a.memory_kind(), default_device().memory_kind());
}

#[test]
fn test_current_resource_used_by_factories() {
    let _guard = DEFAULTS_LOCK.lock();
    let recorder = Arc::new(RecordingResource::new());
    let previous = set_current_resource(recorder.clone());

    let stream = default_stream();
    let mr = current_resource();
    let scalar = make_numeric_scalar(DataType::Int32, MaskState::AllNull, &stream, &mr).unwrap();
    assert!(!scalar.is_valid(&stream).unwrap());
    drop(scalar);

    assert_eq!(recorder.count(ResourceOp::Allocate), 2);
    assert!(recorder.is_balanced());
    set_current_resource(previous);
}

#[test]
fn test_install_statistics_and_limit() {
    let _guard = DEFAULTS_LOCK.lock();
    let previous_device = default_device();
    let previous = current_resource();

    let config = ScalarConfig::from_toml_str(
        r#"
device = "host"
alignment = 64
memory_limit = 4096
track_statistics = true
"#,
    )
    .unwrap();
    let installed = config.install().unwrap();
    let stats = installed.statistics.clone().unwrap();

    let stream = default_stream();
    assert_eq!(stream.memory_kind(), MemoryKind::Host);
    let mr = current_resource();
    {
        let s = make_string_scalar_from_str("configured", &stream, &mr).unwrap();
        assert_eq!(s.size_in_bytes(), 10);
        assert!(s.data_ptr().is_aligned_to(64));
        assert_eq!(stats.statistics().current_bytes, 10);

        let err = make_string_scalar_from_str(&"x".repeat(5000), &stream, &mr).unwrap_err();
        assert!(err.is_out_of_memory());
    }
    let totals = stats.statistics();
    assert_eq!(totals.current_bytes, 0);
    assert_eq!(totals.allocations, totals.deallocations);

    gpuscalar::set_defaults(previous_device, previous);
}

#[test]
fn test_install_swaps_device_and_resource_together() {
    let _guard = DEFAULTS_LOCK.lock();
    let previous_device = default_device();
    let previous_resource = current_resource();

    let installed = ScalarConfig::default().install().unwrap();
    let (stream, mr) = current_defaults();
    assert!(Arc::ptr_eq(stream.device(), &installed.device));
    assert!(Arc::ptr_eq(&mr, &installed.resource));
    assert!(ensure_compatible(&stream, mr.as_ref()).is_ok());

    let (device, resource) = gpuscalar::set_defaults(previous_device, previous_resource);
    assert!(Arc::ptr_eq(&device, &installed.device));
    assert!(Arc::ptr_eq(&resource, &installed.resource));
}

#[test]
fn test_is_equal_is_identity() {
    let a: MemoryResourceRef = Arc::new(RecordingResource::new());
    let b: MemoryResourceRef = Arc::new(RecordingResource::new());
    assert!(a.is_equal(a.as_ref()));
    assert!(!a.is_equal(b.as_ref()));
}

proptest! {
    #[test]
    fn prop_alignment_validated(shift in 0u32..16, extra in 1usize..64) {
        let good = format!("alignment = {}", 1usize << shift);
        prop_assert!(ScalarConfig::from_toml_str(&good).is_ok());

        let candidate = (1usize << shift) + extra;
        let parsed = ScalarConfig::from_toml_str(&format!("alignment = {}", candidate));
        prop_assert_eq!(parsed.is_ok(), candidate.is_power_of_two());
    }
}
