//! CRC algorithms used by the image format.
//!
//! Three computations appear in an image, each with its own coverage window:
//!
//! - the **software dword CRC** protects table headers, table entries and
//!   in-section trailers; it runs bit-serially over big-endian dwords with
//!   polynomial `0x100B`;
//! - the **hardware CRC** binds each hardware pointer to its checksum word;
//!   it is a byte-wise table CRC (polynomial `0x625D`) that complements the
//!   first two input bytes and the final register;
//! - the **boot2 CRC** is the software algorithm applied to the payload
//!   dwords of the boot2 region, with the stored value in the region's last
//!   dword.
//!
//! All three return 16-bit values. Lookup tables are built at compile time.

/// Polynomial for the software dword CRC.
pub const SW_CRC_POLY: u16 = 0x100B;

/// Polynomial for the hardware pointer CRC table.
pub const HW_CRC_POLY: u16 = 0x625D;

/// Stored-CRC sentinel meaning "never stamped".
pub const CRC_BLANK: u16 = 0xFFFF;

/// Software CRC-16 over big-endian dwords, polynomial `0x100B`.
///
/// Input bytes are grouped into big-endian dwords; a trailing partial dword
/// is zero-padded. Each dword is fed MSB first: the register shifts left,
/// takes the data bit into bit 0, and is XORed with the polynomial whenever
/// bit 15 was set before the shift. After the data, 16 zero bits run through
/// the same shift, and the result is the complement of the register.
pub fn software_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for chunk in data.chunks(4) {
        let mut dw = [0u8; 4];
        dw[..chunk.len()].copy_from_slice(chunk);
        crc = feed_dword(crc, u32::from_be_bytes(dw));
    }
    for _ in 0..16 {
        let msb_set = crc & 0x8000 != 0;
        crc <<= 1;
        if msb_set {
            crc ^= SW_CRC_POLY;
        }
    }
    crc ^ 0xFFFF
}

fn feed_dword(mut crc: u16, word: u32) -> u16 {
    for i in (0..32).rev() {
        let bit = ((word >> i) & 1) as u16;
        let msb_set = crc & 0x8000 != 0;
        crc = (crc << 1) | bit;
        if msb_set {
            crc ^= SW_CRC_POLY;
        }
    }
    crc
}

const fn build_hw_table() -> [u16; 256] {
    let mut table = [0u16; 256];
    let mut i = 0;
    while i < 256 {
        let mut r = (i as u16) << 8;
        let mut bit = 0;
        while bit < 8 {
            r = if r & 0x8000 != 0 {
                (r << 1) ^ HW_CRC_POLY
            } else {
                r << 1
            };
            bit += 1;
        }
        table[i] = r;
        i += 1;
    }
    table
}

static HW_CRC_TABLE: [u16; 256] = build_hw_table();

/// Hardware-flavoured CRC-16 used for pointer checksums.
///
/// Byte-wise over the precomputed `0x625D` table, initial register `0xFFFF`.
/// The first two input bytes are complemented before processing, and the
/// final register is complemented as well.
pub fn hardware_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for (i, &byte) in data.iter().enumerate() {
        let b = if i < 2 { !byte } else { byte };
        let idx = ((crc >> 8) ^ u16::from(b)) & 0xFF;
        crc = (crc << 8) ^ HW_CRC_TABLE[idx as usize];
    }
    !crc
}

/// Split an in-section CRC trailer: returns the covered bytes and the stored
/// 16-bit value (low half of the final dword). `None` if the slice is shorter
/// than one dword.
pub fn split_trailer(section: &[u8]) -> Option<(&[u8], u16)> {
    if section.len() < 4 {
        return None;
    }
    let (body, tail) = section.split_at(section.len() - 4);
    let stored = u16::from(tail[2]) << 8 | u16::from(tail[3]);
    Some((body, stored))
}

/// Recompute and write an in-section trailer in place: software CRC of all
/// bytes but the last 4, stored in the low half of the final dword with the
/// high half preserved.
pub fn stamp_trailer(section: &mut [u8]) {
    debug_assert!(section.len() >= 4);
    let crc = software_crc(&section[..section.len() - 4]);
    let n = section.len();
    section[n - 2] = (crc >> 8) as u8;
    section[n - 1] = (crc & 0xFF) as u8;
}

/// Boot2-style region CRC: software CRC over the `payload_dwords` dwords that
/// follow the two header dwords, checked against the low half of the region's
/// last dword. Returns `(computed, stored)`, or `None` when the region cannot
/// hold that many dwords.
pub fn region_crc(region: &[u8], payload_dwords: usize) -> Option<(u16, u16)> {
    let total = payload_dwords.checked_add(4)?.checked_mul(4)?;
    if region.len() < total || total < 16 {
        return None;
    }
    let computed = software_crc(&region[8..8 + payload_dwords * 4]);
    let tail = &region[total - 4..total];
    let stored = u16::from(tail[2]) << 8 | u16::from(tail[3]);
    Some((computed, stored))
}

/// Restamp a boot2-style region CRC in place. The caller has already resolved
/// the payload dword count from the region's size field.
pub fn stamp_region_crc(region: &mut [u8], payload_dwords: usize) {
    let total = (payload_dwords + 4) * 4;
    debug_assert!(region.len() >= total);
    let crc = software_crc(&region[8..8 + payload_dwords * 4]);
    region[total - 2] = (crc >> 8) as u8;
    region[total - 1] = (crc & 0xFF) as u8;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_software_crc_one() {
        assert_eq!(software_crc(&[0x00, 0x00, 0x00, 0x01]), 0x1002);
    }

    #[test]
    fn test_software_crc_two_dwords() {
        let data = [0x12, 0x34, 0x56, 0x78, 0xAB, 0xCD, 0xEF, 0x00];
        assert_eq!(software_crc(&data), 0x72D3);
    }

    #[test]
    fn test_software_crc_pads_partial_dword() {
        // [0x12, 0x34] is processed as the dword 0x12340000.
        assert_eq!(
            software_crc(&[0x12, 0x34]),
            software_crc(&[0x12, 0x34, 0x00, 0x00])
        );
    }

    #[test]
    fn test_hardware_table_head() {
        assert_eq!(HW_CRC_TABLE[0], 0x0000);
        assert_eq!(HW_CRC_TABLE[1], 0x625D);
        assert_eq!(HW_CRC_TABLE[2], 0xC4BA);
        assert_eq!(HW_CRC_TABLE[3], 0xA6E7);
    }

    #[test]
    fn test_hardware_crc_pointer() {
        assert_eq!(hardware_crc(&[0x01, 0x02, 0x03, 0x04]), 0x11C8);
    }

    #[test]
    fn test_hardware_crc_zero_pointer() {
        // Complementing the two leading zero bytes feeds 0xFF 0xFF, which
        // drives the all-ones register back to zero before the final
        // complement.
        assert_eq!(hardware_crc(&[0x00, 0x00, 0x00, 0x00]), 0xFFFF);
        assert_eq!(hardware_crc(&[0x00, 0x00, 0x10, 0x00]), 0xCC4A);
        assert_eq!(hardware_crc(&[0x00, 0x00, 0x50, 0x00]), 0x029E);
    }

    #[test]
    fn test_trailer_roundtrip() {
        let mut section = vec![0xAA; 0x1000];
        stamp_trailer(&mut section);
        let (body, stored) = split_trailer(&section).unwrap();
        assert_eq!(body.len(), 0xFFC);
        assert_eq!(stored, software_crc(body));
        assert_eq!(stored, 0x76AB);
        // High half of the trailer dword is untouched.
        assert_eq!(section[0xFFC], 0xAA);
        assert_eq!(section[0xFFD], 0xAA);
    }

    #[test]
    fn test_split_trailer_too_short() {
        assert!(split_trailer(&[0x01, 0x02]).is_none());
    }

    #[test]
    fn test_region_crc_roundtrip() {
        // Two header dwords, four payload dwords, two tail dwords.
        let mut region = vec![0u8; 32];
        region[0] = 0xEB; // opaque entry word
        region[7] = 0x04; // size field: 4 payload dwords
        for (i, b) in region[8..24].iter_mut().enumerate() {
            *b = i as u8;
        }
        stamp_region_crc(&mut region, 4);
        let (computed, stored) = region_crc(&region, 4).unwrap();
        assert_eq!(computed, stored);
        assert_eq!(computed, software_crc(&region[8..24]));
    }

    #[test]
    fn test_region_crc_short_region() {
        assert!(region_crc(&[0u8; 16], 4).is_none());
    }
}
