//! Core types and errors for gpuscalar
//!
//! This crate defines the foundational types used throughout the workspace:
//! - DataType: Logical element type with its physical width and alignment
//! - TimeUnit: Timestamp resolution
//! - TypeCategory: Numeric / timestamp / string factory branches
//! - MemoryKind: Host-emulated or CUDA device memory
//! - Error: Error taxonomy (logic errors vs. resource exhaustion)
//! - Limits: SizeType and string/bitmask size constants

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod limits;
pub mod types;

pub use error::{Error, Result};
pub use limits::{SizeType, BITMASK_PADDING_BYTES, BITMASK_WORD_BITS, MAX_STRING_BYTES};
pub use types::{DataType, MemoryKind, TimeUnit, TypeCategory};
