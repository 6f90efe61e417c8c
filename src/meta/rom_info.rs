//! Expansion-ROM scanner.
//!
//! ROM-code sections are opaque blobs as far as the tables are concerned,
//! but each option ROM inside them advertises itself with an ASCII marker
//! followed by three big-endian dwords of product, version and CPU info.
//! The scanner finds every marker and decodes the descriptors it can.

use byteorder::{BigEndian, ByteOrder};
use memchr::memmem;

use crate::types::{CpuArch, RomEntry, RomKind, RomVersion};

/// Marker preceding every ROM descriptor.
pub const ROM_MARKER: &[u8] = b"mlxsign:";

/// Scan a ROM-code payload for descriptors. Markers whose product id falls
/// outside the known registry are skipped, as are markers too close to the
/// end of the payload to carry a full descriptor.
pub fn scan(payload: &[u8]) -> Vec<RomEntry> {
    let mut entries = Vec::new();
    for at in memmem::find_iter(payload, ROM_MARKER) {
        let body = at + ROM_MARKER.len();
        let Some(raw) = payload.get(body..body + 12) else {
            continue;
        };
        let d0 = BigEndian::read_u32(&raw[0..4]);
        let d1 = BigEndian::read_u32(&raw[4..8]);
        let d2 = BigEndian::read_u32(&raw[8..12]);
        let Some(kind) = RomKind::from_product_id((d0 >> 16) as u16) else {
            continue;
        };
        entries.push(RomEntry {
            kind,
            version: RomVersion {
                major: (d0 & 0xFF) as u8,
                minor: ((d1 >> 16) & 0xFF) as u8,
                build: (d1 & 0xFFFF) as u16,
            },
            cpu: CpuArch::from_nibble(((d2 >> 8) & 0xF) as u8),
        });
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scan_fixture() {
        let mut buf = vec![0u8; testutil::FIX_ROM_SIZE as usize];
        testutil::write_rom(&mut buf);
        let roms = scan(&buf);
        assert_eq!(roms.len(), 2);
        assert_eq!(roms[0].kind, RomKind::Pxe);
        assert_eq!(roms[0].version.to_string(), "3.6.514");
        assert_eq!(roms[0].cpu, Some(CpuArch::Amd64));
        assert_eq!(roms[1].kind, RomKind::Uefi);
        assert_eq!(roms[1].version.to_string(), "14.0.170");
        assert_eq!(roms[1].cpu, Some(CpuArch::Aarch64));
    }

    #[test]
    fn test_unknown_product_skipped() {
        let mut buf = vec![0u8; 0x40];
        buf[0..8].copy_from_slice(ROM_MARKER);
        BigEndian::write_u32(&mut buf[8..], 0x0099_0001);
        assert!(scan(&buf).is_empty());
    }

    #[test]
    fn test_truncated_descriptor_skipped() {
        let mut buf = vec![0u8; ROM_MARKER.len() + 4];
        buf[0..8].copy_from_slice(ROM_MARKER);
        assert!(scan(&buf).is_empty());
    }

    #[test]
    fn test_empty_payload() {
        assert!(scan(&[]).is_empty());
        assert!(scan(&[0xFF; 0x100]).is_empty());
    }
}
