//! Device-resident scalar containers
//!
//! A scalar is one value of a column element type held in device memory. It
//! owns zero or more `DeviceBuffer`s, each released independently through the
//! resource that produced it when the scalar is dropped.
//!
//! Downstream code consumes a scalar through a narrow interface: its logical
//! type, its data pointer, and its validity pointer (see [`ScalarView`]).
//! Nothing here materializes a value on the host.

use gpuscalar_core::{DataType, Result};
use gpuscalar_memory::{DeviceBuffer, DevicePtr, Stream};

use crate::null_mask::bit_is_set;

/// Copyable read-only view handed to column and kernel code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScalarView {
    /// Logical element type
    pub data_type: DataType,
    /// Device address of the payload (null for null strings)
    pub data: DevicePtr,
    /// Device address of the validity mask, if one was allocated
    pub validity: Option<DevicePtr>,
    /// Payload size in bytes
    pub size: usize,
}

/// Fixed-width scalar (numeric or timestamp)
///
/// The data buffer is uninitialized at construction; whoever writes the value
/// does so before anyone reads it.
#[derive(Debug)]
pub struct FixedWidthScalar {
    data_type: DataType,
    data: DeviceBuffer,
    null_mask: Option<DeviceBuffer>,
}

impl FixedWidthScalar {
    pub(crate) fn new(data_type: DataType, data: DeviceBuffer, null_mask: Option<DeviceBuffer>) -> Self {
        debug_assert!(data_type.is_fixed_width());
        Self {
            data_type,
            data,
            null_mask,
        }
    }

    /// Logical element type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Payload buffer
    pub fn data(&self) -> &DeviceBuffer {
        &self.data
    }

    /// Mutable payload buffer, for code that writes the value
    pub fn data_mut(&mut self) -> &mut DeviceBuffer {
        &mut self.data
    }

    /// Validity buffer, if one was allocated
    pub fn null_mask(&self) -> Option<&DeviceBuffer> {
        self.null_mask.as_ref()
    }
}

/// UTF-8 string scalar
///
/// A null string has no data buffer and an all-null validity mask. A valid
/// string, even an empty one, has a non-null data pointer and no mask.
#[derive(Debug)]
pub struct StringScalar {
    data: Option<DeviceBuffer>,
    len: usize,
    null_mask: Option<DeviceBuffer>,
}

impl StringScalar {
    pub(crate) fn valid(data: DeviceBuffer, len: usize) -> Self {
        debug_assert!(!data.ptr().is_null() && data.size() >= len);
        Self {
            data: Some(data),
            len,
            null_mask: None,
        }
    }

    pub(crate) fn null(null_mask: Option<DeviceBuffer>) -> Self {
        Self {
            data: None,
            len: 0,
            null_mask,
        }
    }

    /// Length of the string in bytes (0 for null strings)
    pub fn len(&self) -> usize {
        self.len
    }

    /// True for a valid empty string or a null string
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True if the string is null
    pub fn is_null(&self) -> bool {
        self.data.is_none()
    }

    /// Device address of the bytes (null for null strings)
    pub fn data_ptr(&self) -> DevicePtr {
        self.data.as_ref().map(|d| d.ptr()).unwrap_or(DevicePtr::NULL)
    }

    /// Copy the string's bytes to the host
    ///
    /// Returns `None` for a null string. Blocks until work on `stream`
    /// completes.
    pub fn to_host(&self, stream: &Stream) -> Result<Option<Vec<u8>>> {
        match &self.data {
            None => Ok(None),
            Some(data) => {
                let mut bytes = data.to_host(stream)?;
                bytes.truncate(self.len);
                Ok(Some(bytes))
            }
        }
    }

    /// Validity buffer, if one was allocated
    pub fn null_mask(&self) -> Option<&DeviceBuffer> {
        self.null_mask.as_ref()
    }
}

/// An owning device-resident scalar
#[derive(Debug)]
pub enum Scalar {
    /// Numeric or timestamp value
    FixedWidth(FixedWidthScalar),
    /// String value
    String(StringScalar),
}

impl Scalar {
    /// Logical element type
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::FixedWidth(s) => s.data_type,
            Scalar::String(_) => DataType::String,
        }
    }

    /// Device address of the payload
    pub fn data_ptr(&self) -> DevicePtr {
        match self {
            Scalar::FixedWidth(s) => s.data.ptr(),
            Scalar::String(s) => s.data_ptr(),
        }
    }

    /// Device address of the validity mask, if one was allocated
    pub fn validity_ptr(&self) -> Option<DevicePtr> {
        self.null_mask_buffer().map(|m| m.ptr())
    }

    /// True if a validity mask was allocated
    pub fn has_null_mask(&self) -> bool {
        self.null_mask_buffer().is_some()
    }

    /// Payload size in bytes
    ///
    /// The element width for fixed-width scalars, the byte length for strings.
    pub fn size_in_bytes(&self) -> usize {
        match self {
            Scalar::FixedWidth(s) => s.data.size(),
            Scalar::String(s) => s.len,
        }
    }

    /// Whether the value is valid
    ///
    /// Waits for work issued on `stream` and reads the validity bit. A scalar
    /// without a mask is always valid.
    pub fn is_valid(&self, stream: &Stream) -> Result<bool> {
        match self.null_mask_buffer() {
            None => Ok(true),
            Some(mask) => {
                stream.synchronize()?;
                let host = mask.to_host(stream)?;
                Ok(bit_is_set(&host, 0))
            }
        }
    }

    /// Narrow read-only view for downstream consumers
    pub fn view(&self) -> ScalarView {
        ScalarView {
            data_type: self.data_type(),
            data: self.data_ptr(),
            validity: self.validity_ptr(),
            size: self.size_in_bytes(),
        }
    }

    /// The fixed-width payload, if this is a numeric or timestamp scalar
    pub fn as_fixed_width(&self) -> Option<&FixedWidthScalar> {
        match self {
            Scalar::FixedWidth(s) => Some(s),
            Scalar::String(_) => None,
        }
    }

    /// Mutable fixed-width payload
    pub fn as_fixed_width_mut(&mut self) -> Option<&mut FixedWidthScalar> {
        match self {
            Scalar::FixedWidth(s) => Some(s),
            Scalar::String(_) => None,
        }
    }

    /// The string payload, if this is a string scalar
    pub fn as_string(&self) -> Option<&StringScalar> {
        match self {
            Scalar::String(s) => Some(s),
            Scalar::FixedWidth(_) => None,
        }
    }

    fn null_mask_buffer(&self) -> Option<&DeviceBuffer> {
        match self {
            Scalar::FixedWidth(s) => s.null_mask.as_ref(),
            Scalar::String(s) => s.null_mask.as_ref(),
        }
    }
}
