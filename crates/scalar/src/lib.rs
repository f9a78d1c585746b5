//! Device-resident scalars for gpuscalar
//!
//! This crate builds typed, null-aware scalars in device memory:
//! - MaskState / create_null_mask: Validity representation
//! - Scalar: Owning container (fixed-width or string payload)
//! - Factories: make_numeric_scalar, make_timestamp_scalar,
//!   make_string_scalar and friends
//! - ScalarConfig: `gpuscalar.toml` runtime configuration
//!
//! # Example
//!
//! ```
//! use gpuscalar_core::DataType;
//! use gpuscalar_memory::{current_resource, default_stream};
//! use gpuscalar_scalar::{make_numeric_scalar, MaskState};
//!
//! let stream = default_stream();
//! let mr = current_resource();
//! let scalar = make_numeric_scalar(DataType::Int32, MaskState::AllNull, &stream, &mr).unwrap();
//! assert_eq!(scalar.size_in_bytes(), 4);
//! assert!(!scalar.is_valid(&stream).unwrap());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod factories;
pub mod null_mask;
pub mod scalar;

pub use config::{InstalledDefaults, ScalarConfig, CONFIG_FILE_NAME};
pub use factories::{
    make_fixed_width_scalar, make_numeric_scalar, make_string_scalar, make_string_scalar_from_str,
    make_timestamp_scalar, StringSpan,
};
pub use null_mask::{bitmask_allocation_size_bytes, create_null_mask, num_bitmask_words, MaskState};
pub use scalar::{FixedWidthScalar, Scalar, ScalarView, StringScalar};
