//! gpuscalar - Device-resident scalars with stream-ordered memory
//!
//! A scalar is a single typed, nullable value living in accelerator memory so
//! that kernels can consume it directly alongside columns. This crate builds
//! them through a small set of factories:
//!
//! - Numeric and timestamp scalars with uninitialized storage and a
//!   configurable validity mask
//! - String scalars copied from host or device bytes
//!
//! # Quick Start
//!
//! ```
//! use gpuscalar::{
//!     current_resource, default_stream, make_string_scalar_from_str, make_timestamp_scalar,
//!     DataType, MaskState, TimeUnit,
//! };
//!
//! let stream = default_stream();
//! let mr = current_resource();
//!
//! let ts = make_timestamp_scalar(
//!     DataType::Timestamp(TimeUnit::Milliseconds),
//!     MaskState::AllValid,
//!     &stream,
//!     &mr,
//! )?;
//! assert_eq!(ts.size_in_bytes(), 8);
//!
//! let s = make_string_scalar_from_str("café", &stream, &mr)?;
//! assert_eq!(s.size_in_bytes(), 5);
//! assert!(s.is_valid(&stream)?);
//! # Ok::<(), gpuscalar::Error>(())
//! ```
//!
//! # Architecture
//!
//! - `gpuscalar-core`: type descriptors, limits and the error type
//! - `gpuscalar-memory`: devices, streams, memory resources and buffers
//! - `gpuscalar-scalar`: validity masks, scalar containers, factories and
//!   configuration
//!
//! All work is issued on a caller-supplied [`Stream`] and every allocation
//! goes through a caller-supplied memory resource.

pub use gpuscalar_core::*;
pub use gpuscalar_memory::*;
pub use gpuscalar_scalar::*;
