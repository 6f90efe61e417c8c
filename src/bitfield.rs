//! Bit-field access for fixed-length big-endian records.
//!
//! Table-of-contents entries and hardware pointer records are bit-packed with
//! big-endian bit numbering: bit 0 of a byte is its most significant bit, and
//! bit offsets count across the whole record in that order. Field accessors
//! elsewhere wrap these two functions with the literal (offset, length) pairs
//! of the record layout.

/// Read up to 32 bits starting at an absolute bit offset.
///
/// Panics if the range does not fit in `record` or `bit_len > 32`; callers
/// pass layout constants against records of known length.
pub fn get_bits(record: &[u8], bit_offset: usize, bit_len: usize) -> u32 {
    assert!(bit_len <= 32, "bit field wider than 32 bits");
    assert!(
        bit_offset + bit_len <= record.len() * 8,
        "bit range {}..{} outside {}-byte record",
        bit_offset,
        bit_offset + bit_len,
        record.len()
    );
    let mut value: u32 = 0;
    for i in 0..bit_len {
        let bit = bit_offset + i;
        let byte = record[bit / 8];
        let b = (byte >> (7 - (bit % 8))) & 1;
        value = (value << 1) | u32::from(b);
    }
    value
}

/// Write the low `bit_len` bits of `value` starting at an absolute bit offset.
pub fn set_bits(record: &mut [u8], bit_offset: usize, bit_len: usize, value: u32) {
    assert!(bit_len <= 32, "bit field wider than 32 bits");
    assert!(
        bit_offset + bit_len <= record.len() * 8,
        "bit range {}..{} outside {}-byte record",
        bit_offset,
        bit_offset + bit_len,
        record.len()
    );
    debug_assert!(
        bit_len == 32 || value >> bit_len == 0,
        "value 0x{value:X} does not fit in {bit_len} bits"
    );
    for i in 0..bit_len {
        let bit = bit_offset + i;
        let mask = 1u8 << (7 - (bit % 8));
        if (value >> (bit_len - 1 - i)) & 1 != 0 {
            record[bit / 8] |= mask;
        } else {
            record[bit / 8] &= !mask;
        }
    }
}
