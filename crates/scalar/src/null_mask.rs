//! Validity (null) masks
//!
//! A validity mask holds one bit per element, set for valid elements and
//! cleared for null ones. Buffers are padded to [`BITMASK_PADDING_BYTES`] so
//! device code can read whole words without bounds checks.

use gpuscalar_core::{Result, BITMASK_PADDING_BYTES, BITMASK_WORD_BITS};
use gpuscalar_memory::{DeviceBuffer, MemoryResourceRef, Stream};
use serde::{Deserialize, Serialize};

/// Creation-time policy for a validity mask
///
/// Resolved once at construction and only decides the mask's initial device
/// contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskState {
    /// No mask: every element is valid
    #[default]
    Unallocated,
    /// Mask allocated with every bit set
    AllValid,
    /// Mask allocated with every bit cleared
    AllNull,
}

impl MaskState {
    /// Byte every mask byte is initialized to, if a mask is allocated
    pub fn fill_byte(&self) -> Option<u8> {
        match self {
            MaskState::Unallocated => None,
            MaskState::AllValid => Some(0xFF),
            MaskState::AllNull => Some(0x00),
        }
    }
}

/// Number of bitmask words needed for `number_of_bits` bits
pub fn num_bitmask_words(number_of_bits: usize) -> usize {
    number_of_bits.div_ceil(BITMASK_WORD_BITS)
}

/// Bytes to allocate for `number_of_bits` bits padded to `padding_boundary`
///
/// # Panics
///
/// Panics if `padding_boundary` is zero.
pub fn bitmask_allocation_size_bytes(number_of_bits: usize, padding_boundary: usize) -> usize {
    assert!(padding_boundary > 0, "padding boundary must be positive");
    let necessary_bytes = number_of_bits.div_ceil(8);
    necessary_bytes.div_ceil(padding_boundary) * padding_boundary
}

/// Allocate and initialize a validity mask for `size` elements
///
/// Returns `None` for [`MaskState::Unallocated`] without touching `mr`.
/// Otherwise the mask is filled on `stream` per `state`.
///
/// # Errors
///
/// Propagates the resource's allocation failure. Never degrades to "no mask".
pub fn create_null_mask(
    size: usize,
    state: MaskState,
    stream: &Stream,
    mr: &MemoryResourceRef,
) -> Result<Option<DeviceBuffer>> {
    let fill = match state.fill_byte() {
        Some(fill) => fill,
        None => return Ok(None),
    };
    let bytes = bitmask_allocation_size_bytes(size, BITMASK_PADDING_BYTES);
    let mask = DeviceBuffer::filled(bytes, fill, stream, mr)?;
    tracing::debug!(target: "gpuscalar::scalar", ?state, bytes, stream = %stream.id(), "created null mask");
    Ok(Some(mask))
}

/// Read bit `index` of a host copy of a validity mask
pub fn bit_is_set(mask: &[u8], index: usize) -> bool {
    mask.get(index / 8)
        .map(|byte| byte & (1 << (index % 8)) != 0)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gpuscalar_memory::testing::RecordingResource;
    use gpuscalar_memory::{default_stream, HostMemoryResource};
    use std::sync::Arc;

    #[test]
    fn test_allocation_size_is_padded() {
        assert_eq!(bitmask_allocation_size_bytes(0, 64), 0);
        assert_eq!(bitmask_allocation_size_bytes(1, 64), 64);
        assert_eq!(bitmask_allocation_size_bytes(512, 64), 64);
        assert_eq!(bitmask_allocation_size_bytes(513, 64), 128);
        assert_eq!(bitmask_allocation_size_bytes(9, 1), 2);
    }

    #[test]
    fn test_num_words() {
        assert_eq!(num_bitmask_words(0), 0);
        assert_eq!(num_bitmask_words(1), 1);
        assert_eq!(num_bitmask_words(32), 1);
        assert_eq!(num_bitmask_words(33), 2);
    }

    #[test]
    fn test_unallocated_does_not_touch_resource() {
        let recorder = Arc::new(RecordingResource::new());
        let mr: MemoryResourceRef = recorder.clone();
        let mask = create_null_mask(1, MaskState::Unallocated, &default_stream(), &mr).unwrap();
        assert!(mask.is_none());
        assert!(recorder.calls().is_empty());
    }

    #[test]
    fn test_all_valid_and_all_null_contents() {
        let stream = default_stream();
        let mr: MemoryResourceRef = Arc::new(HostMemoryResource::new());

        let valid = create_null_mask(1, MaskState::AllValid, &stream, &mr).unwrap().unwrap();
        let host = valid.to_host(&stream).unwrap();
        assert_eq!(host.len(), BITMASK_PADDING_BYTES);
        assert!(bit_is_set(&host, 0));

        let null = create_null_mask(1, MaskState::AllNull, &stream, &mr).unwrap().unwrap();
        let host = null.to_host(&stream).unwrap();
        assert!(!bit_is_set(&host, 0));
        assert!(host.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_allocation_failure_propagates() {
        let mr: MemoryResourceRef = Arc::new(RecordingResource::failing_at(0));
        let err = create_null_mask(1, MaskState::AllNull, &default_stream(), &mr).unwrap_err();
        assert!(err.is_out_of_memory());
    }

    #[test]
    fn test_bit_is_set_out_of_range() {
        assert!(!bit_is_set(&[], 0));
        assert!(bit_is_set(&[0b0000_0100], 2));
        assert!(!bit_is_set(&[0b0000_0100], 3));
    }
}
