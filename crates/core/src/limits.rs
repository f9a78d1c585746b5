//! Size limits shared by the scalar and column layers
//!
//! Element and byte counts are expressed in `SizeType`, a 32-bit signed
//! integer. A string scalar's total byte length must fit in it.

/// Element and byte count type of the column system
pub type SizeType = i32;

/// Maximum total byte length of a string scalar
pub const MAX_STRING_BYTES: usize = SizeType::MAX as usize;

/// Validity buffers are padded to a multiple of this many bytes
pub const BITMASK_PADDING_BYTES: usize = 64;

/// Width in bits of one validity bitmask word
pub const BITMASK_WORD_BITS: usize = 32;

/// Sum byte lengths, failing if the total exceeds `max`
///
/// Returns `None` on overflow of either `usize` arithmetic or the limit.
pub fn checked_total_len<I>(lens: I, max: usize) -> Option<usize>
where
    I: IntoIterator<Item = usize>,
{
    lens.into_iter()
        .try_fold(0usize, |acc, len| acc.checked_add(len))
        .filter(|total| *total <= max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_string_bytes_matches_size_type() {
        assert_eq!(MAX_STRING_BYTES, 2_147_483_647);
    }

    #[test]
    fn test_checked_total_len_within_limit() {
        assert_eq!(checked_total_len([1, 2, 3], 10), Some(6));
        assert_eq!(checked_total_len(std::iter::empty(), 10), Some(0));
        assert_eq!(checked_total_len([10], 10), Some(10));
    }

    #[test]
    fn test_checked_total_len_over_limit() {
        assert_eq!(checked_total_len([6, 5], 10), None);
        assert_eq!(checked_total_len([usize::MAX, 1], usize::MAX), None);
    }
}
