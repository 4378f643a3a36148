/// FITS logical record size in bytes.
pub const BLOCK_SIZE: usize = 2880;

/// FITS header card (keyword record) size in bytes.
pub const CARD_SIZE: usize = 80;

/// Number of header cards in a single block.
pub const CARDS_PER_BLOCK: usize = BLOCK_SIZE / CARD_SIZE;

/// Returns the number of blocks needed to hold `num_bytes` bytes.
///
/// Zero bytes occupy zero blocks; any partial block counts as a full one.
pub const fn blocks_needed(num_bytes: usize) -> usize {
    num_bytes.div_ceil(BLOCK_SIZE)
}

/// Returns `num_bytes` rounded up to a whole number of blocks.
///
/// This is the on-disk footprint of a header or data segment, which is how
/// far the reader has to skip to reach the next HDU.
pub const fn padded_byte_len(num_bytes: usize) -> usize {
    blocks_needed(num_bytes) * BLOCK_SIZE
}

/// Returns the 80-byte card at `card_index` within `data`, if it is complete.
pub fn card_at(data: &[u8], card_index: usize) -> Option<&[u8; CARD_SIZE]> {
    let start = card_index.checked_mul(CARD_SIZE)?;
    let end = start.checked_add(CARD_SIZE)?;
    data.get(start..end)?.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_relationships() {
        assert_eq!(BLOCK_SIZE, 2880);
        assert_eq!(CARD_SIZE, 80);
        assert_eq!(CARDS_PER_BLOCK, 36);
    }

    #[test]
    fn blocks_needed_boundaries() {
        assert_eq!(blocks_needed(0), 0);
        assert_eq!(blocks_needed(1), 1);
        assert_eq!(blocks_needed(BLOCK_SIZE), 1);
        assert_eq!(blocks_needed(BLOCK_SIZE + 1), 2);
        assert_eq!(blocks_needed(5761), 3);
    }

    #[test]
    fn padded_len_is_block_multiple() {
        assert_eq!(padded_byte_len(0), 0);
        assert_eq!(padded_byte_len(100), BLOCK_SIZE);
        assert_eq!(padded_byte_len(2 * BLOCK_SIZE), 2 * BLOCK_SIZE);
        assert_eq!(padded_byte_len(2 * BLOCK_SIZE + 1), 3 * BLOCK_SIZE);
    }

    #[test]
    fn card_at_reads_whole_cards_only() {
        let mut data = [b' '; 200];
        data[80] = b'X';
        let second = card_at(&data, 1).unwrap();
        assert_eq!(second[0], b'X');
        assert!(card_at(&data, 2).is_none());
        assert!(card_at(&data, usize::MAX).is_none());
    }
}
