//! Hardware pointer table.
//!
//! Sixteen 8-byte records at a fixed delta past the magic: a 4-byte pointer
//! (absolute byte offset) and a 4-byte checksum word whose low half is the
//! hardware-flavoured CRC of the pointer bytes. Role assignments are fixed by
//! record index.

use byteorder::{BigEndian, ByteOrder};

use crate::crc;
use crate::error::{FwError, Result};
use crate::types::ParseNote;

/// Table offset relative to the magic pattern.
pub const HW_POINTER_DELTA: u64 = 0x18;

/// Number of pointer records.
pub const HW_POINTER_COUNT: usize = 16;

/// Table size in bytes.
pub const HW_POINTER_TABLE_BYTES: usize = HW_POINTER_COUNT * 8;

/// Fixed pointer roles, by record index. Indices 8..15 are reserved for
/// signatures and future use and are not interpreted here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerRole {
    /// Boot record at index 0.
    BootRecord,
    /// Second-stage boot loader.
    Boot2,
    /// Image table of contents.
    Toc,
    /// Tools area.
    ToolsArea,
    /// Image-info section.
    ImageInfo,
    /// First byte of the firmware window.
    FwWindowStart,
    /// Last byte of the firmware window.
    FwWindowEnd,
    /// Hashes table for measured boot.
    HashesTable,
}

impl PointerRole {
    /// Record index of this role.
    pub const fn index(self) -> usize {
        match self {
            PointerRole::BootRecord => 0,
            PointerRole::Boot2 => 1,
            PointerRole::Toc => 2,
            PointerRole::ToolsArea => 3,
            PointerRole::ImageInfo => 4,
            PointerRole::FwWindowStart => 5,
            PointerRole::FwWindowEnd => 6,
            PointerRole::HashesTable => 7,
        }
    }

    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            PointerRole::BootRecord => "boot record",
            PointerRole::Boot2 => "boot2",
            PointerRole::Toc => "TOC",
            PointerRole::ToolsArea => "tools area",
            PointerRole::ImageInfo => "image-info",
            PointerRole::FwWindowStart => "FW window start",
            PointerRole::FwWindowEnd => "FW window end",
            PointerRole::HashesTable => "hashes table",
        }
    }
}

/// One pointer record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwPointer {
    /// Absolute byte offset of the pointed-to region.
    pub ptr: u32,
    /// Checksum word; the hardware CRC sits in the low half.
    pub checksum: u32,
}

impl HwPointer {
    /// A pointer is unset when zero or all-ones.
    pub fn is_set(&self) -> bool {
        self.ptr != 0 && self.ptr != 0xFFFF_FFFF
    }

    /// Pointed-to byte offset, if set.
    pub fn target(&self) -> Option<u64> {
        self.is_set().then(|| u64::from(self.ptr))
    }

    /// Check the checksum word against the hardware CRC of the pointer bytes.
    pub fn verify(&self, context: &str) -> Result<()> {
        let computed = crc::hardware_crc(&self.ptr.to_be_bytes());
        let stored = (self.checksum & 0xFFFF) as u16;
        if computed == stored {
            Ok(())
        } else {
            Err(FwError::CrcMismatch {
                expected: stored,
                actual: computed,
                context: context.to_string(),
            })
        }
    }
}

/// The decoded pointer table, with its absolute offset in the image.
#[derive(Debug, Clone)]
pub struct HwPointerTable {
    /// Absolute byte offset of the table in the image.
    pub offset: u64,
    entries: [HwPointer; HW_POINTER_COUNT],
}

impl HwPointerTable {
    /// Decode 128 table bytes read at `offset`.
    pub fn parse(bytes: &[u8], offset: u64) -> Result<Self> {
        if bytes.len() < HW_POINTER_TABLE_BYTES {
            return Err(FwError::parse(format!(
                "hardware pointer table needs {HW_POINTER_TABLE_BYTES} bytes, got {}",
                bytes.len()
            )));
        }
        let mut entries = [HwPointer { ptr: 0, checksum: 0 }; HW_POINTER_COUNT];
        for (i, entry) in entries.iter_mut().enumerate() {
            entry.ptr = BigEndian::read_u32(&bytes[i * 8..]);
            entry.checksum = BigEndian::read_u32(&bytes[i * 8 + 4..]);
        }
        Ok(HwPointerTable { offset, entries })
    }

    /// Record by raw index.
    pub fn entry(&self, index: usize) -> HwPointer {
        self.entries[index]
    }

    /// Record for a named role.
    pub fn role(&self, role: PointerRole) -> HwPointer {
        self.entries[role.index()]
    }

    /// Pointed-to offset for a role, if that pointer is set.
    pub fn target(&self, role: PointerRole) -> Option<u64> {
        self.role(role).target()
    }

    /// Absolute offset of one record within the image.
    pub fn entry_offset(&self, index: usize) -> u64 {
        self.offset + (index as u64) * 8
    }

    /// Verify every set pointer's checksum; mismatches come back as warning
    /// notes so parsing can continue.
    pub fn verify(&self) -> Vec<ParseNote> {
        let mut notes = Vec::new();
        for (i, entry) in self.entries.iter().enumerate() {
            if !entry.is_set() {
                continue;
            }
            let context = match i {
                0 => "hw pointer 0 (boot record)".to_string(),
                1 => "hw pointer 1 (boot2)".to_string(),
                2 => "hw pointer 2 (TOC)".to_string(),
                3 => "hw pointer 3 (tools area)".to_string(),
                4 => "hw pointer 4 (image-info)".to_string(),
                7 => "hw pointer 7 (hashes table)".to_string(),
                n => format!("hw pointer {n}"),
            };
            if let Err(e) = entry.verify(&context) {
                notes.push(ParseNote::warning(e.to_string()));
            }
        }
        notes
    }
}

/// Rewrite one pointer record in place: big-endian pointer, then the
/// checksum word carrying the hardware CRC in its low half.
pub fn stamp_pointer(image: &mut [u8], table_offset: u64, index: usize, new_ptr: u32) {
    let at = table_offset as usize + index * 8;
    let crc = crc::hardware_crc(&new_ptr.to_be_bytes());
    BigEndian::write_u32(&mut image[at..], new_ptr);
    BigEndian::write_u32(&mut image[at + 4..], u32::from(crc));
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn table_bytes(pointers: &[(usize, u32)]) -> Vec<u8> {
        let mut bytes = vec![0u8; HW_POINTER_TABLE_BYTES];
        for &(i, ptr) in pointers {
            stamp_pointer(&mut bytes, 0, i, ptr);
        }
        bytes
    }

    #[test]
    fn test_parse_and_roles() {
        let bytes = table_bytes(&[(1, 0x1000), (2, 0x4000), (3, 0x2000)]);
        let table = HwPointerTable::parse(&bytes, 0x18).unwrap();
        assert_eq!(table.target(PointerRole::Boot2), Some(0x1000));
        assert_eq!(table.target(PointerRole::Toc), Some(0x4000));
        assert_eq!(table.target(PointerRole::ToolsArea), Some(0x2000));
        assert_eq!(table.target(PointerRole::ImageInfo), None);
        assert_eq!(table.entry_offset(2), 0x18 + 16);
    }

    #[test]
    fn test_unset_encodings() {
        let zero = HwPointer { ptr: 0, checksum: 0 };
        let ones = HwPointer {
            ptr: 0xFFFF_FFFF,
            checksum: 0xFFFF_FFFF,
        };
        assert!(!zero.is_set());
        assert!(!ones.is_set());
        assert!(zero.target().is_none());
    }

    #[test]
    fn test_verify_clean_table() {
        let bytes = table_bytes(&[(1, 0x1000), (4, 0x6000)]);
        let table = HwPointerTable::parse(&bytes, 0x18).unwrap();
        assert!(table.verify().is_empty());
    }

    #[test]
    fn test_verify_flags_bad_checksum() {
        let mut bytes = table_bytes(&[(1, 0x1000)]);
        bytes[8 + 7] ^= 0x01; // corrupt boot2 checksum
        let table = HwPointerTable::parse(&bytes, 0x18).unwrap();
        let notes = table.verify();
        assert_eq!(notes.len(), 1);
        assert!(notes[0].message.contains("boot2"));
    }

    #[test]
    fn test_stamp_matches_verify() {
        let mut image = vec![0u8; 0x100];
        stamp_pointer(&mut image, 0x18, 1, 0x0000_5000);
        let table = HwPointerTable::parse(&image[0x18..0x18 + HW_POINTER_TABLE_BYTES], 0x18).unwrap();
        assert!(table.role(PointerRole::Boot2).verify("boot2").is_ok());
        assert_eq!(table.target(PointerRole::Boot2), Some(0x5000));
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(HwPointerTable::parse(&[0u8; 64], 0).is_err());
    }
}
