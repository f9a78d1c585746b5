//! Logical element types and their physical layout
//!
//! This module defines the closed set of element types a scalar can hold:
//! - DataType: the logical type tag (integer widths, floating widths, bool,
//!   timestamp resolutions, string)
//! - TimeUnit: the resolution of a timestamp type
//! - TypeCategory: the factory branch a type belongs to
//! - MemoryKind: where a device allocation physically lives
//!
//! All lookups are pure and total. Callers use them to reject inapplicable
//! categories before any device memory is requested.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Resolution of a timestamp type
///
/// `Days` counts whole days since the Unix epoch in a 32-bit integer; every
/// other resolution counts ticks since the epoch in a 64-bit integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeUnit {
    /// Days since epoch (int32)
    Days,
    /// Seconds since epoch (int64)
    Seconds,
    /// Milliseconds since epoch (int64)
    Milliseconds,
    /// Microseconds since epoch (int64)
    Microseconds,
    /// Nanoseconds since epoch (int64)
    Nanoseconds,
}

impl TimeUnit {
    /// All resolutions, coarsest first
    pub const ALL: [TimeUnit; 5] = [
        TimeUnit::Days,
        TimeUnit::Seconds,
        TimeUnit::Milliseconds,
        TimeUnit::Microseconds,
        TimeUnit::Nanoseconds,
    ];

    /// Short suffix used in type names ("D", "s", "ms", "us", "ns")
    pub fn suffix(&self) -> &'static str {
        match self {
            TimeUnit::Days => "D",
            TimeUnit::Seconds => "s",
            TimeUnit::Milliseconds => "ms",
            TimeUnit::Microseconds => "us",
            TimeUnit::Nanoseconds => "ns",
        }
    }

    /// Width in bytes of the tick counter
    pub fn size_in_bytes(&self) -> usize {
        match self {
            TimeUnit::Days => 4,
            _ => 8,
        }
    }
}

/// The factory branch a type belongs to
///
/// Categories are mutually exclusive: every `DataType` belongs to exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TypeCategory {
    /// Integers, floating point and boolean
    Numeric,
    /// Timestamps of any resolution
    Timestamp,
    /// Variable-length UTF-8 strings
    String,
}

impl TypeCategory {
    /// Human-readable name for error messages
    pub fn name(&self) -> &'static str {
        match self {
            TypeCategory::Numeric => "numeric",
            TypeCategory::Timestamp => "timestamp",
            TypeCategory::String => "string",
        }
    }

    /// Whether values of this category have a fixed byte width
    pub fn is_fixed_width(&self) -> bool {
        !matches!(self, TypeCategory::String)
    }
}

impl fmt::Display for TypeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Logical element type of a scalar
///
/// The physical width of every fixed-width type is known statically;
/// `String` has no fixed width and is sized from its input at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    /// 8-bit signed integer
    Int8,
    /// 16-bit signed integer
    Int16,
    /// 32-bit signed integer
    Int32,
    /// 64-bit signed integer
    Int64,
    /// 32-bit IEEE 754 float
    Float32,
    /// 64-bit IEEE 754 float
    Float64,
    /// Boolean stored in one byte
    Bool8,
    /// Timestamp with the given resolution
    Timestamp(TimeUnit),
    /// UTF-8 string
    String,
}

impl DataType {
    /// Every numeric type
    pub const NUMERIC: [DataType; 7] = [
        DataType::Int8,
        DataType::Int16,
        DataType::Int32,
        DataType::Int64,
        DataType::Float32,
        DataType::Float64,
        DataType::Bool8,
    ];

    /// Every timestamp type
    pub const TIMESTAMPS: [DataType; 5] = [
        DataType::Timestamp(TimeUnit::Days),
        DataType::Timestamp(TimeUnit::Seconds),
        DataType::Timestamp(TimeUnit::Milliseconds),
        DataType::Timestamp(TimeUnit::Microseconds),
        DataType::Timestamp(TimeUnit::Nanoseconds),
    ];

    /// Every supported type
    pub fn all() -> impl Iterator<Item = DataType> {
        Self::NUMERIC
            .into_iter()
            .chain(Self::TIMESTAMPS)
            .chain(std::iter::once(DataType::String))
    }

    /// Category this type belongs to
    pub fn category(&self) -> TypeCategory {
        match self {
            DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::Float32
            | DataType::Float64
            | DataType::Bool8 => TypeCategory::Numeric,
            DataType::Timestamp(_) => TypeCategory::Timestamp,
            DataType::String => TypeCategory::String,
        }
    }

    /// Byte width of one element, or `None` for variable-width types
    pub fn size_in_bytes(&self) -> Option<usize> {
        match self {
            DataType::Int8 | DataType::Bool8 => Some(1),
            DataType::Int16 => Some(2),
            DataType::Int32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::Float64 => Some(8),
            DataType::Timestamp(unit) => Some(unit.size_in_bytes()),
            DataType::String => None,
        }
    }

    /// Required alignment of one element in bytes
    ///
    /// Fixed-width types are naturally aligned. Strings are byte sequences.
    pub fn alignment(&self) -> usize {
        self.size_in_bytes().unwrap_or(1)
    }

    /// True for integers, floats and `Bool8`
    pub fn is_numeric(&self) -> bool {
        self.category() == TypeCategory::Numeric
    }

    /// True for every timestamp resolution
    pub fn is_timestamp(&self) -> bool {
        self.category() == TypeCategory::Timestamp
    }

    /// True for every type except `String`
    pub fn is_fixed_width(&self) -> bool {
        self.category().is_fixed_width()
    }

    /// Canonical lowercase name
    pub fn name(&self) -> &'static str {
        match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Bool8 => "bool8",
            DataType::Timestamp(TimeUnit::Days) => "timestamp[D]",
            DataType::Timestamp(TimeUnit::Seconds) => "timestamp[s]",
            DataType::Timestamp(TimeUnit::Milliseconds) => "timestamp[ms]",
            DataType::Timestamp(TimeUnit::Microseconds) => "timestamp[us]",
            DataType::Timestamp(TimeUnit::Nanoseconds) => "timestamp[ns]",
            DataType::String => "string",
        }
    }

    /// Parse from a type name (case-insensitive)
    ///
    /// Accepts the canonical names plus a few common aliases
    /// ("i32", "f64", "bool", "str", "utf8").
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "int8" | "i8" => Some(DataType::Int8),
            "int16" | "i16" => Some(DataType::Int16),
            "int32" | "i32" => Some(DataType::Int32),
            "int64" | "i64" => Some(DataType::Int64),
            "float32" | "f32" => Some(DataType::Float32),
            "float64" | "f64" => Some(DataType::Float64),
            "bool8" | "bool" => Some(DataType::Bool8),
            "string" | "str" | "utf8" => Some(DataType::String),
            other => {
                let unit = other.strip_prefix("timestamp[")?.strip_suffix(']')?;
                TimeUnit::ALL
                    .into_iter()
                    .find(|u| u.suffix().eq_ignore_ascii_case(unit))
                    .map(DataType::Timestamp)
            }
        }
    }

    /// Stable one-byte tag
    pub fn to_byte(&self) -> u8 {
        match self {
            DataType::Int8 => 1,
            DataType::Int16 => 2,
            DataType::Int32 => 3,
            DataType::Int64 => 4,
            DataType::Float32 => 5,
            DataType::Float64 => 6,
            DataType::Bool8 => 7,
            DataType::Timestamp(TimeUnit::Days) => 8,
            DataType::Timestamp(TimeUnit::Seconds) => 9,
            DataType::Timestamp(TimeUnit::Milliseconds) => 10,
            DataType::Timestamp(TimeUnit::Microseconds) => 11,
            DataType::Timestamp(TimeUnit::Nanoseconds) => 12,
            DataType::String => 14,
        }
    }

    /// Inverse of [`DataType::to_byte`]
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(DataType::Int8),
            2 => Some(DataType::Int16),
            3 => Some(DataType::Int32),
            4 => Some(DataType::Int64),
            5 => Some(DataType::Float32),
            6 => Some(DataType::Float64),
            7 => Some(DataType::Bool8),
            8 => Some(DataType::Timestamp(TimeUnit::Days)),
            9 => Some(DataType::Timestamp(TimeUnit::Seconds)),
            10 => Some(DataType::Timestamp(TimeUnit::Milliseconds)),
            11 => Some(DataType::Timestamp(TimeUnit::Microseconds)),
            12 => Some(DataType::Timestamp(TimeUnit::Nanoseconds)),
            14 => Some(DataType::String),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a device allocation physically lives
///
/// A stream and a memory resource used in the same construction call must
/// agree on this, otherwise device pointers from one would be handed to the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MemoryKind {
    /// Host heap standing in for device memory
    Host,
    /// CUDA device memory
    Cuda,
}

impl MemoryKind {
    /// Human-readable name
    pub fn name(&self) -> &'static str {
        match self {
            MemoryKind::Host => "host",
            MemoryKind::Cuda => "cuda",
        }
    }
}

impl fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
