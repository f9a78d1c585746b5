//! Scalar factories
//!
//! Every scalar is created here. Each entry point follows the same steps:
//! 1. Validate the type category (before any allocation)
//! 2. Compute the payload size
//! 3. Acquire storage from the memory resource on the given stream
//! 4. Resolve validity
//! 5. Return an owning `Scalar`
//!
//! All device work is issued on the caller's stream and the call returns
//! without waiting for it. Buffers acquired before a later step fails are
//! released on the way out, so a failed call leaves nothing allocated.

use gpuscalar_core::limits::checked_total_len;
use gpuscalar_core::{DataType, Error, Result, TypeCategory, MAX_STRING_BYTES};
use gpuscalar_memory::{ensure_compatible, DeviceBuffer, DevicePtr, MemoryResourceRef, Stream};

use crate::null_mask::{create_null_mask, MaskState};
use crate::scalar::{FixedWidthScalar, Scalar, StringScalar};

/// One piece of string input
///
/// Spans are concatenated into a single string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringSpan<'a> {
    /// Null pointer paired with a length; the length is ignored
    Null {
        /// Length supplied alongside the null pointer
        len: usize,
    },
    /// Bytes in host memory
    Host(&'a [u8]),
    /// Bytes already in device memory
    Device {
        /// Start of the bytes
        ptr: DevicePtr,
        /// Number of bytes
        len: usize,
    },
}

impl<'a> StringSpan<'a> {
    /// A null span
    pub fn null() -> Self {
        StringSpan::Null { len: 0 }
    }

    /// A span over host bytes
    pub fn host(bytes: &'a [u8]) -> Self {
        StringSpan::Host(bytes)
    }

    /// A span over device bytes
    ///
    /// A null `ptr` makes this a null span regardless of `len`.
    ///
    /// # Safety
    ///
    /// A non-null `ptr..ptr + len` must be live device memory of the memory
    /// kind the string will be built with, until work issued on the
    /// construction stream completes.
    pub unsafe fn device(ptr: DevicePtr, len: usize) -> Self {
        if ptr.is_null() {
            StringSpan::Null { len }
        } else {
            StringSpan::Device { ptr, len }
        }
    }

    /// Byte length if the span is non-null
    fn valid_len(&self) -> Option<usize> {
        match self {
            StringSpan::Null { .. } => None,
            StringSpan::Host(bytes) => Some(bytes.len()),
            StringSpan::Device { len, .. } => Some(*len),
        }
    }
}

fn ensure_category(data_type: DataType, expected: TypeCategory) -> Result<()> {
    if data_type.category() != expected {
        return Err(Error::TypeMismatch {
            expected,
            actual: data_type,
        });
    }
    Ok(())
}

/// Construct a numeric scalar with uninitialized storage
///
/// The validity mask is allocated and initialized per `state`; by default
/// (`MaskState::Unallocated`) there is none and the scalar is always valid.
///
/// # Errors
///
/// - `Error::TypeMismatch` if `data_type` is not numeric (no allocation is
///   attempted)
/// - `Error::DeviceMismatch` if `stream` and `mr` target different memory
/// - `Error::OutOfMemory` if the resource cannot satisfy a request
pub fn make_numeric_scalar(
    data_type: DataType,
    state: MaskState,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    ensure_category(data_type, TypeCategory::Numeric)?;
    allocate_fixed_width(data_type, state, stream, mr)
}

/// Construct a timestamp scalar with uninitialized storage
///
/// # Errors
///
/// Same as [`make_numeric_scalar`], with `Error::TypeMismatch` raised for
/// every non-timestamp type.
pub fn make_timestamp_scalar(
    data_type: DataType,
    state: MaskState,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    ensure_category(data_type, TypeCategory::Timestamp)?;
    allocate_fixed_width(data_type, state, stream, mr)
}

/// Construct a scalar of any fixed-width type
///
/// Dispatches on the type's category.
///
/// # Errors
///
/// `Error::TypeMismatch` for `DataType::String`, otherwise as the category's
/// own factory. The mismatch names `TypeCategory::Numeric` as the expected
/// category, the first of the two fixed-width categories this accepts; check
/// [`DataType::is_fixed_width`] beforehand to tell the cases apart.
pub fn make_fixed_width_scalar(
    data_type: DataType,
    state: MaskState,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    match data_type.category() {
        TypeCategory::Numeric => make_numeric_scalar(data_type, state, stream, mr),
        TypeCategory::Timestamp => make_timestamp_scalar(data_type, state, stream, mr),
        TypeCategory::String => Err(Error::TypeMismatch {
            expected: TypeCategory::Numeric,
            actual: data_type,
        }),
    }
}

fn allocate_fixed_width(
    data_type: DataType,
    state: MaskState,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    ensure_compatible(stream, mr.as_ref())?;
    let size = data_type.size_in_bytes().ok_or(Error::TypeMismatch {
        expected: data_type.category(),
        actual: data_type,
    })?;

    let data = DeviceBuffer::new(size, stream, mr)?;
    // If the mask fails, `data` is dropped here and released on `stream`.
    let null_mask = create_null_mask(1, state, stream, mr)?;

    tracing::debug!(
        target: "gpuscalar::scalar",
        data_type = %data_type,
        bytes = size,
        ?state,
        stream = %stream.id(),
        "constructed fixed-width scalar"
    );
    Ok(Scalar::FixedWidth(FixedWidthScalar::new(data_type, data, null_mask)))
}

/// Construct a string scalar from pointer/length spans
///
/// The spans are concatenated. If any span is null the scalar is null: it
/// owns an all-null validity mask and no data. Otherwise the scalar's device
/// bytes are a verbatim copy of the spans' bytes, and an empty result still
/// has a non-null data pointer.
///
/// # Errors
///
/// - `Error::StringTooLarge` if the non-null lengths sum past
///   [`MAX_STRING_BYTES`] (checked before any allocation)
/// - `Error::DeviceMismatch` if `stream` and `mr` target different memory
/// - `Error::OutOfMemory` if the resource cannot satisfy a request
pub fn make_string_scalar(
    spans: &[StringSpan<'_>],
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    ensure_compatible(stream, mr.as_ref())?;
    let total = checked_total_len(spans.iter().filter_map(StringSpan::valid_len), MAX_STRING_BYTES)
        .ok_or(Error::StringTooLarge {
            max: MAX_STRING_BYTES,
        })?;

    if spans.iter().any(|s| s.valid_len().is_none()) {
        let null_mask = create_null_mask(1, MaskState::AllNull, stream, mr)?;
        tracing::debug!(target: "gpuscalar::scalar", stream = %stream.id(), "constructed null string scalar");
        return Ok(Scalar::String(StringScalar::null(null_mask)));
    }

    // An empty string still needs a non-null data pointer.
    let data = DeviceBuffer::new(total.max(1), stream, mr)?;
    let mut offset = 0usize;
    for span in spans {
        let dst = data.ptr().offset(offset);
        offset += match *span {
            StringSpan::Host(bytes) => {
                // SAFETY: dst..dst+len lies inside `data`, sized to the total.
                unsafe { stream.copy_host_to_device_async(dst, bytes)? };
                bytes.len()
            }
            StringSpan::Device { ptr, len } => {
                // SAFETY: destination as above; the source is live per the
                // contract of `StringSpan::device`.
                unsafe { stream.copy_device_to_device_async(dst, ptr, len)? };
                len
            }
            // Null spans returned early above and contribute no bytes.
            StringSpan::Null { .. } => 0,
        };
    }

    tracing::debug!(target: "gpuscalar::scalar", bytes = total, spans = spans.len(), stream = %stream.id(), "constructed string scalar");
    Ok(Scalar::String(StringScalar::valid(data, total)))
}

/// Construct a valid string scalar from a host string
pub fn make_string_scalar_from_str(
    value: &str,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Scalar> {
    make_string_scalar(&[StringSpan::host(value.as_bytes())], stream, mr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuscalar_core::TimeUnit;
    use gpuscalar_memory::testing::{RecordingResource, ResourceOp};
    use gpuscalar_memory::default_stream;
    use std::sync::Arc;

    fn recorder() -> (Arc<RecordingResource>, MemoryResourceRef) {
        let r = Arc::new(RecordingResource::new());
        let mr: MemoryResourceRef = r.clone();
        (r, mr)
    }

    #[test]
    fn test_ensure_category() {
        assert!(ensure_category(DataType::Int8, TypeCategory::Numeric).is_ok());
        let err = ensure_category(DataType::Int8, TypeCategory::Timestamp).unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: TypeCategory::Timestamp,
                actual: DataType::Int8
            }
        ));
    }

    #[test]
    fn test_fixed_width_dispatch() {
        let (rec, mr) = recorder();
        let stream = default_stream();
        let ts = DataType::Timestamp(TimeUnit::Days);
        let s = make_fixed_width_scalar(ts, MaskState::Unallocated, &stream, &mr).unwrap();
        assert_eq!(s.data_type(), ts);
        assert_eq!(s.size_in_bytes(), 4);

        let err = make_fixed_width_scalar(DataType::String, MaskState::Unallocated, &stream, &mr)
            .unwrap_err();
        assert!(err.is_logic_error());
        assert!(matches!(
            err,
            Error::TypeMismatch {
                expected: TypeCategory::Numeric,
                actual: DataType::String
            }
        ));
        // Only the timestamp's data buffer was ever requested
        assert_eq!(rec.count(ResourceOp::Allocate), 1);
        drop(s);
        assert!(rec.is_balanced());
    }

    #[test]
    fn test_device_span_with_null_pointer_is_null() {
        let span = unsafe { StringSpan::device(DevicePtr::NULL, 12) };
        assert_eq!(span, StringSpan::Null { len: 12 });
        assert_eq!(span.valid_len(), None);
    }

    #[test]
    fn test_string_from_device_span() {
        let (_rec, mr) = recorder();
        let stream = default_stream();
        let source = DeviceBuffer::from_host(b"hello", &stream, &mr).unwrap();
        let span = unsafe { StringSpan::device(source.ptr(), source.size()) };
        let s = make_string_scalar(&[span, StringSpan::host(b" world")], &stream, &mr).unwrap();
        let bytes = s.as_string().unwrap().to_host(&stream).unwrap().unwrap();
        assert_eq!(bytes, b"hello world");
    }
}
