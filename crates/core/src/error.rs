//! Error types for scalar construction
//!
//! This module defines every error a factory call can surface.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! Errors fall into two groups:
//! - Logic errors: the request itself is wrong (category mismatch, oversized
//!   string input, stream/resource on different devices, bad configuration).
//!   Fix the call.
//! - Resource errors: the memory resource could not satisfy the request.
//!   Free memory and retry.
//!
//! Nothing in this workspace retries internally.

use crate::types::{DataType, MemoryKind, TypeCategory};
use thiserror::Error;

/// Result type alias for scalar operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for scalar construction and device memory management
#[derive(Debug, Error)]
pub enum Error {
    /// The requested type does not belong to the factory's category
    #[error("Type mismatch: expected a {expected} type, got {actual}")]
    TypeMismatch {
        /// Category the factory accepts
        expected: TypeCategory,
        /// Type that was requested
        actual: DataType,
    },

    /// Combined string input length exceeds the representable maximum
    #[error("String input too large: total byte length exceeds {max}")]
    StringTooLarge {
        /// Maximum total byte length
        max: usize,
    },

    /// The stream and the memory resource target different memory
    #[error("Device mismatch: stream runs on {stream} memory but resource allocates {resource} memory")]
    DeviceMismatch {
        /// Memory kind of the stream's device
        stream: MemoryKind,
        /// Memory kind of the resource
        resource: MemoryKind,
    },

    /// The memory resource could not satisfy an allocation
    #[error("Out of memory: {resource} failed to allocate {requested} bytes: {reason}")]
    OutOfMemory {
        /// Requested allocation size in bytes
        requested: usize,
        /// Name of the resource that failed
        resource: &'static str,
        /// Backend-specific detail
        reason: String,
    },

    /// A device runtime call failed
    #[error("Device error: {0}")]
    Device(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create an out-of-memory error
    pub fn out_of_memory(requested: usize, resource: &'static str, reason: impl Into<String>) -> Self {
        Error::OutOfMemory {
            requested,
            resource,
            reason: reason.into(),
        }
    }

    /// Create a device runtime error
    pub fn device(msg: impl Into<String>) -> Self {
        Error::Device(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// True if the request itself was invalid
    ///
    /// Logic errors are always raised before any allocation is attempted.
    pub fn is_logic_error(&self) -> bool {
        matches!(
            self,
            Error::TypeMismatch { .. }
                | Error::StringTooLarge { .. }
                | Error::DeviceMismatch { .. }
                | Error::Config(_)
        )
    }

    /// True if the memory resource was exhausted
    pub fn is_out_of_memory(&self) -> bool {
        matches!(self, Error::OutOfMemory { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TimeUnit;

    #[test]
    fn test_error_display_type_mismatch() {
        let err = Error::TypeMismatch {
            expected: TypeCategory::Numeric,
            actual: DataType::String,
        };
        let msg = err.to_string();
        assert!(msg.contains("Type mismatch"));
        assert!(msg.contains("numeric"));
        assert!(msg.contains("string"));
    }

    #[test]
    fn test_error_display_string_too_large() {
        let err = Error::StringTooLarge { max: 2147483647 };
        let msg = err.to_string();
        assert!(msg.contains("String input too large"));
        assert!(msg.contains("2147483647"));
    }

    #[test]
    fn test_error_display_out_of_memory() {
        let err = Error::out_of_memory(4096, "host", "limit reached");
        let msg = err.to_string();
        assert!(msg.contains("Out of memory"));
        assert!(msg.contains("4096"));
        assert!(msg.contains("limit reached"));
    }

    #[test]
    fn test_error_display_device_mismatch() {
        let err = Error::DeviceMismatch {
            stream: MemoryKind::Cuda,
            resource: MemoryKind::Host,
        };
        let msg = err.to_string();
        assert!(msg.contains("cuda"));
        assert!(msg.contains("host"));
    }

    #[test]
    fn test_classification() {
        let mismatch = Error::TypeMismatch {
            expected: TypeCategory::Timestamp,
            actual: DataType::Timestamp(TimeUnit::Days),
        };
        assert!(mismatch.is_logic_error());
        assert!(!mismatch.is_out_of_memory());

        assert!(Error::StringTooLarge { max: 1 }.is_logic_error());
        assert!(Error::config("bad").is_logic_error());

        let oom = Error::out_of_memory(1, "host", "");
        assert!(oom.is_out_of_memory());
        assert!(!oom.is_logic_error());

        let device = Error::device("cuMemsetD8Async failed");
        assert!(!device.is_logic_error());
        assert!(!device.is_out_of_memory());
    }

    #[test]
    fn test_error_pattern_matching() {
        let err = Error::out_of_memory(10, "limiting", "over limit");

        match err {
            Error::OutOfMemory { requested, resource, .. } => {
                assert_eq!(requested, 10);
                assert_eq!(resource, "limiting");
            }
            _ => panic!("Wrong error variant"),
        }
    }
}
