//! Table-of-contents parsing: header signatures, 32-byte entry records and
//! the slot walk.
//!
//! Entry records are described in MSB-first bit positions (bit 0 is the most
//! significant bit of byte 0), matching how the format documents them; the
//! [`crate::bitfield`] helpers use the same convention.

use std::io::{Read, Seek};

use byteorder::{BigEndian, ByteOrder};

use crate::bitfield::{get_bits, set_bits};
use crate::crc;
use crate::error::{FwError, Result};
use crate::reader::ImageReader;
use crate::types::{CrcMode, FwFormat, ParseNote};

/// First header dword of an image TOC, "ITOC".
pub const TOC_SIG_ITOC: u32 = 0x4954_4F43;
/// First header dword of a device TOC, "DTOC".
pub const TOC_SIG_DTOC: u32 = 0x4454_4F43;

/// Second header dword of an older-generation image TOC.
pub const FS3_ITOC_SIG1: u32 = 0x0408_1516;
/// Third header dword of an older-generation image TOC.
pub const FS3_ITOC_SIG2: u32 = 0x2342_CAFA;
/// Fourth header dword of an older-generation image TOC.
pub const FS3_ITOC_SIG3: u32 = 0xBACA_FE00;

/// Header record size in bytes.
pub const TOC_HEADER_SIZE: usize = 32;
/// Entry record size in bytes.
pub const TOC_ENTRY_SIZE: usize = 32;

/// Entry type byte that terminates the slot walk.
pub const ENTRY_TYPE_TERMINATOR: u8 = 0xFF;

/// Upper bound on slots walked before declaring the table unterminated.
pub const MAX_TOC_ENTRIES: usize = 255;

/// Which of the two tables a header or entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocKind {
    /// Image table of contents.
    Itoc,
    /// Device table of contents.
    Dtoc,
}

impl TocKind {
    /// Display name.
    pub fn name(self) -> &'static str {
        match self {
            TocKind::Itoc => "ITOC",
            TocKind::Dtoc => "DTOC",
        }
    }

    /// Expected first header dword.
    pub fn signature(self) -> u32 {
        match self {
            TocKind::Itoc => TOC_SIG_ITOC,
            TocKind::Dtoc => TOC_SIG_DTOC,
        }
    }
}

/// Outcome of checking the header's trailing CRC word.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCrc {
    /// Stored and computed values agree.
    Ok,
    /// Stored value is the blank sentinel; tolerated with a note.
    Blank,
    /// Stored and computed values disagree.
    Mismatch {
        /// Value found in the header.
        stored: u16,
        /// Value computed over the header bytes.
        computed: u16,
    },
}

/// Decoded 32-byte table header.
#[derive(Debug, Clone)]
pub struct TocHeader {
    /// Which table this header opens.
    pub kind: TocKind,
    /// Format version dword.
    pub version: u32,
    /// Outcome of the trailing-CRC check.
    pub crc_status: HeaderCrc,
}

impl TocHeader {
    /// Decode and signature-check a header read at `offset`.
    ///
    /// A wrong signature is a hard error so callers can fall back to probing
    /// other locations; CRC problems are recorded in [`TocHeader::crc_status`]
    /// and left to the caller to report.
    pub fn parse(bytes: &[u8], kind: TocKind, format: FwFormat, offset: u64) -> Result<Self> {
        if bytes.len() < TOC_HEADER_SIZE {
            return Err(FwError::parse(format!(
                "{} header needs {TOC_HEADER_SIZE} bytes, got {}",
                kind.name(),
                bytes.len()
            )));
        }
        let sig0 = BigEndian::read_u32(&bytes[0..4]);
        if sig0 != kind.signature() {
            return Err(FwError::BadSignature {
                expected: kind.signature(),
                actual: sig0,
                offset,
            });
        }
        if format == FwFormat::Fs3 && kind == TocKind::Itoc {
            let expected = [FS3_ITOC_SIG1, FS3_ITOC_SIG2, FS3_ITOC_SIG3];
            for (i, &want) in expected.iter().enumerate() {
                let got = BigEndian::read_u32(&bytes[4 + i * 4..]);
                if got != want {
                    return Err(FwError::BadSignature {
                        expected: want,
                        actual: got,
                        offset: offset + 4 + (i as u64) * 4,
                    });
                }
            }
        }
        let version = BigEndian::read_u32(&bytes[16..20]);
        let stored = BigEndian::read_u16(&bytes[30..32]);
        let crc_status = if stored == crc::CRC_BLANK {
            HeaderCrc::Blank
        } else {
            let computed = crc::software_crc(&bytes[..28]);
            if computed == stored {
                HeaderCrc::Ok
            } else {
                HeaderCrc::Mismatch { stored, computed }
            }
        };
        Ok(TocHeader {
            kind,
            version,
            crc_status,
        })
    }
}

/// One 32-byte entry record, kept raw so field updates can be written back
/// byte-exact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    raw: [u8; TOC_ENTRY_SIZE],
    /// Slot index within the table, counting skipped empty slots.
    pub slot: usize,
}

impl TocEntry {
    /// Wrap an exactly 32-byte record.
    pub fn from_bytes(bytes: &[u8], slot: usize) -> Result<Self> {
        let raw: [u8; TOC_ENTRY_SIZE] = bytes
            .try_into()
            .map_err(|_| FwError::parse(format!("TOC entry needs {TOC_ENTRY_SIZE} bytes")))?;
        Ok(TocEntry { raw, slot })
    }

    /// The record bytes.
    pub fn raw(&self) -> &[u8; TOC_ENTRY_SIZE] {
        &self.raw
    }

    /// Raw type byte; the table kind decides how it maps to a section code.
    pub fn section_type(&self) -> u8 {
        get_bits(&self.raw, 0, 8) as u8
    }

    /// Whether this record ends the slot walk.
    pub fn is_terminator(&self) -> bool {
        self.section_type() == ENTRY_TYPE_TERMINATOR
    }

    /// Slots with zero size and zero address are unused and skipped.
    pub fn is_empty_slot(&self, format: FwFormat) -> bool {
        self.size_dwords() == 0 && self.flash_addr_dwords(format) == 0
    }

    /// Section length in dwords.
    pub fn size_dwords(&self) -> u32 {
        get_bits(&self.raw, 8, 22)
    }

    /// Section length in bytes.
    pub fn size_bytes(&self) -> u64 {
        u64::from(self.size_dwords()) * 4
    }

    /// First type-specific parameter dword.
    pub fn param0(&self) -> u32 {
        get_bits(&self.raw, 32, 32)
    }

    /// Second type-specific parameter dword.
    pub fn param1(&self) -> u32 {
        get_bits(&self.raw, 64, 32)
    }

    /// Section start as a dword address; the field moved and narrowed between
    /// generations.
    pub fn flash_addr_dwords(&self, format: FwFormat) -> u32 {
        match format {
            FwFormat::Fs3 => get_bits(&self.raw, 129, 32),
            FwFormat::Fs4 => get_bits(&self.raw, 161, 29),
        }
    }

    /// Section start as a byte offset.
    pub fn offset_bytes(&self, format: FwFormat) -> u64 {
        u64::from(self.flash_addr_dwords(format)) * 4
    }

    /// Payload carries no checksum.
    pub fn no_crc_flag(&self) -> bool {
        get_bits(&self.raw, 202, 1) != 0
    }

    /// Payload is encrypted.
    pub fn encrypted_flag(&self) -> bool {
        get_bits(&self.raw, 203, 1) != 0
    }

    /// Section belongs to the device area.
    pub fn device_data_flag(&self) -> bool {
        get_bits(&self.raw, 204, 1) != 0
    }

    /// Raw three-bit CRC-mode field.
    pub fn crc_field(&self) -> u32 {
        get_bits(&self.raw, 205, 3)
    }

    /// Expected section checksum, meaningful when the mode is in-entry.
    pub fn section_crc(&self) -> u16 {
        get_bits(&self.raw, 208, 16) as u16
    }

    /// CRC over the record's own first 28 bytes.
    pub fn entry_crc(&self) -> u16 {
        get_bits(&self.raw, 240, 16) as u16
    }

    /// How the section body is protected.
    ///
    /// Newer images encode the mode in a three-bit field; unknown encodings
    /// fall back to in-entry, which keeps verification strict. Older images
    /// only distinguish checked from unchecked via the no-CRC flag.
    pub fn crc_mode(&self, format: FwFormat) -> CrcMode {
        match format {
            FwFormat::Fs4 => match self.crc_field() {
                1 => CrcMode::None,
                7 => CrcMode::InSection,
                _ => CrcMode::InEntry,
            },
            FwFormat::Fs3 => {
                if self.no_crc_flag() {
                    CrcMode::None
                } else {
                    CrcMode::InEntry
                }
            }
        }
    }

    /// Check the entry's own CRC, computed over the first 28 bytes.
    pub fn verify_crc(&self, context: &str) -> Result<()> {
        let stored = self.entry_crc();
        let computed = crc::software_crc(&self.raw[..28]);
        if stored == computed {
            Ok(())
        } else {
            Err(FwError::CrcMismatch {
                expected: stored,
                actual: computed,
                context: context.to_string(),
            })
        }
    }

    /// Write the size field.
    pub fn set_size_dwords(&mut self, dwords: u32) {
        set_bits(&mut self.raw, 8, 22, dwords);
    }

    /// Write the start-address field.
    pub fn set_flash_addr_dwords(&mut self, format: FwFormat, dwords: u32) {
        match format {
            FwFormat::Fs3 => set_bits(&mut self.raw, 129, 32, dwords),
            FwFormat::Fs4 => set_bits(&mut self.raw, 161, 29, dwords),
        }
    }

    /// Write the expected section checksum.
    pub fn set_section_crc(&mut self, value: u16) {
        set_bits(&mut self.raw, 208, 16, u32::from(value));
    }

    /// Recompute the entry CRC after field updates.
    pub fn restamp_crc(&mut self) {
        let computed = crc::software_crc(&self.raw[..28]);
        BigEndian::write_u16(&mut self.raw[30..32], computed);
    }
}

/// A parsed table: header plus the occupied entries in slot order.
#[derive(Debug, Clone)]
pub struct TocTable {
    /// Which table this is.
    pub kind: TocKind,
    /// Absolute byte offset of the header.
    pub offset: u64,
    /// Decoded header.
    pub header: TocHeader,
    /// Occupied entries in slot order.
    pub entries: Vec<TocEntry>,
}

impl TocTable {
    /// Absolute image offset of an entry record.
    pub fn entry_offset(&self, entry: &TocEntry) -> u64 {
        self.offset + TOC_HEADER_SIZE as u64 + (entry.slot as u64) * TOC_ENTRY_SIZE as u64
    }
}

/// Read a table at `offset`: signature-checked header, then slots until the
/// terminator. Header CRC problems are appended to `notes`.
pub fn read_table<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    kind: TocKind,
    format: FwFormat,
    offset: u64,
    notes: &mut Vec<ParseNote>,
) -> Result<TocTable> {
    let header_bytes = reader.read_at(offset, TOC_HEADER_SIZE)?;
    let header = TocHeader::parse(&header_bytes, kind, format, offset)?;
    match header.crc_status {
        HeaderCrc::Ok => {}
        HeaderCrc::Blank => notes.push(ParseNote::info(format!(
            "{} header CRC at {offset:#x} is blank",
            kind.name()
        ))),
        HeaderCrc::Mismatch { stored, computed } => notes.push(ParseNote::warning(format!(
            "{} header CRC mismatch at {offset:#x}: stored {stored:#06x}, computed {computed:#06x}",
            kind.name()
        ))),
    }

    let mut entries = Vec::new();
    let mut slot = 0usize;
    loop {
        if slot >= MAX_TOC_ENTRIES {
            return Err(FwError::parse(format!(
                "{} table at {offset:#x} has no terminator within {MAX_TOC_ENTRIES} slots",
                kind.name()
            )));
        }
        let at = offset + TOC_HEADER_SIZE as u64 + (slot as u64) * TOC_ENTRY_SIZE as u64;
        let entry_bytes = reader.read_at(at, TOC_ENTRY_SIZE)?;
        let entry = TocEntry::from_bytes(&entry_bytes, slot)?;
        if entry.is_terminator() {
            break;
        }
        slot += 1;
        if entry.is_empty_slot(format) {
            continue;
        }
        entries.push(entry);
    }
    tracing::debug!(
        table = kind.name(),
        offset = format_args!("{offset:#x}"),
        entries = entries.len(),
        "parsed TOC"
    );
    Ok(TocTable {
        kind,
        offset,
        header,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{build_entry, build_toc_header, terminator_entry};
    use pretty_assertions::assert_eq;

    fn blank_entry() -> [u8; TOC_ENTRY_SIZE] {
        [0u8; TOC_ENTRY_SIZE]
    }

    #[test]
    fn test_header_parse_ok() {
        let raw = build_toc_header(TocKind::Itoc, FwFormat::Fs4);
        let header = TocHeader::parse(&raw, TocKind::Itoc, FwFormat::Fs4, 0x4000).unwrap();
        assert_eq!(header.version, 1);
        assert_eq!(header.crc_status, HeaderCrc::Ok);
    }

    #[test]
    fn test_header_blank_crc_tolerated() {
        let mut raw = build_toc_header(TocKind::Dtoc, FwFormat::Fs4);
        raw[30] = 0xFF;
        raw[31] = 0xFF;
        let header = TocHeader::parse(&raw, TocKind::Dtoc, FwFormat::Fs4, 0).unwrap();
        assert_eq!(header.crc_status, HeaderCrc::Blank);
    }

    #[test]
    fn test_header_crc_mismatch_recorded() {
        let mut raw = build_toc_header(TocKind::Itoc, FwFormat::Fs4);
        raw[20] ^= 0x55;
        let header = TocHeader::parse(&raw, TocKind::Itoc, FwFormat::Fs4, 0).unwrap();
        assert!(matches!(header.crc_status, HeaderCrc::Mismatch { .. }));
    }

    #[test]
    fn test_header_wrong_signature() {
        let raw = build_toc_header(TocKind::Dtoc, FwFormat::Fs4);
        let err = TocHeader::parse(&raw, TocKind::Itoc, FwFormat::Fs4, 0x4000).unwrap_err();
        match err {
            FwError::BadSignature {
                expected,
                actual,
                offset,
            } => {
                assert_eq!(expected, TOC_SIG_ITOC);
                assert_eq!(actual, TOC_SIG_DTOC);
                assert_eq!(offset, 0x4000);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_fs3_itoc_requires_extra_signatures() {
        let mut raw = build_toc_header(TocKind::Itoc, FwFormat::Fs3);
        let parsed = TocHeader::parse(&raw, TocKind::Itoc, FwFormat::Fs3, 0);
        assert!(parsed.is_ok());

        BigEndian::write_u32(&mut raw[8..12], 0xDEAD_BEEF);
        let err = TocHeader::parse(&raw, TocKind::Itoc, FwFormat::Fs3, 0).unwrap_err();
        assert!(matches!(err, FwError::BadSignature { expected, .. } if expected == FS3_ITOC_SIG2));
    }

    #[test]
    fn test_entry_field_roundtrip() {
        let raw = build_entry(0x10, 0x1000, 0x6000, FwFormat::Fs4, 0, 0xABCD);
        let entry = TocEntry::from_bytes(&raw, 3).unwrap();
        assert_eq!(entry.section_type(), 0x10);
        assert_eq!(entry.size_bytes(), 0x1000);
        assert_eq!(entry.offset_bytes(FwFormat::Fs4), 0x6000);
        assert_eq!(entry.section_crc(), 0xABCD);
        assert_eq!(entry.crc_mode(FwFormat::Fs4), CrcMode::InEntry);
        assert_eq!(entry.slot, 3);
        assert!(entry.verify_crc("test entry").is_ok());
    }

    #[test]
    fn test_entry_crc_mode_encodings() {
        let none = TocEntry::from_bytes(&build_entry(1, 4, 4, FwFormat::Fs4, 1, 0), 0).unwrap();
        assert_eq!(none.crc_mode(FwFormat::Fs4), CrcMode::None);

        let in_section =
            TocEntry::from_bytes(&build_entry(1, 4, 4, FwFormat::Fs4, 7, 0), 0).unwrap();
        assert_eq!(in_section.crc_mode(FwFormat::Fs4), CrcMode::InSection);

        // Unknown encodings keep verification on.
        let odd = TocEntry::from_bytes(&build_entry(1, 4, 4, FwFormat::Fs4, 5, 0), 0).unwrap();
        assert_eq!(odd.crc_mode(FwFormat::Fs4), CrcMode::InEntry);
    }

    #[test]
    fn test_fs3_no_crc_flag() {
        let mut raw = build_entry(1, 4, 4, FwFormat::Fs3, 0, 0);
        let entry = TocEntry::from_bytes(&raw, 0).unwrap();
        assert_eq!(entry.crc_mode(FwFormat::Fs3), CrcMode::InEntry);

        set_bits(&mut raw, 202, 1, 1);
        let entry = TocEntry::from_bytes(&raw, 0).unwrap();
        assert!(entry.no_crc_flag());
        assert_eq!(entry.crc_mode(FwFormat::Fs3), CrcMode::None);
    }

    #[test]
    fn test_entry_crc_detects_corruption() {
        let mut raw = build_entry(0x10, 0x1000, 0x6000, FwFormat::Fs4, 0, 0);
        raw[5] ^= 0xFF;
        let entry = TocEntry::from_bytes(&raw, 0).unwrap();
        assert!(entry.verify_crc("test entry").is_err());
    }

    #[test]
    fn test_entry_setters_and_restamp() {
        let raw = build_entry(0x10, 0x1000, 0x6000, FwFormat::Fs4, 0, 0x1111);
        let mut entry = TocEntry::from_bytes(&raw, 0).unwrap();
        entry.set_flash_addr_dwords(FwFormat::Fs4, 0x9FD250);
        entry.set_size_dwords(0x800 / 4);
        entry.set_section_crc(0x2222);
        entry.restamp_crc();
        assert_eq!(entry.offset_bytes(FwFormat::Fs4), 0x9FD250 * 4);
        assert_eq!(entry.size_bytes(), 0x800);
        assert_eq!(entry.section_crc(), 0x2222);
        assert!(entry.verify_crc("restamped").is_ok());
        // Type byte survives field updates.
        assert_eq!(entry.section_type(), 0x10);
    }

    #[test]
    fn test_walk_skips_empty_slots_and_stops_at_terminator() {
        let mut image = Vec::new();
        image.extend_from_slice(&build_toc_header(TocKind::Itoc, FwFormat::Fs4));
        image.extend_from_slice(&build_entry(0x10, 0x400, 0x6000, FwFormat::Fs4, 0, 0));
        image.extend_from_slice(&blank_entry()); // unused slot
        image.extend_from_slice(&build_entry(0x28, 0x800, 0x9000, FwFormat::Fs4, 0, 0));
        image.extend_from_slice(&terminator_entry());
        image.extend_from_slice(&build_entry(0x30, 0x100, 0xC000, FwFormat::Fs4, 0, 0));

        let mut reader = ImageReader::from_bytes(image);
        let mut notes = Vec::new();
        let table =
            read_table(&mut reader, TocKind::Itoc, FwFormat::Fs4, 0, &mut notes).unwrap();
        assert_eq!(table.entries.len(), 2);
        assert_eq!(table.entries[0].slot, 0);
        assert_eq!(table.entries[1].slot, 2);
        assert_eq!(table.entry_offset(&table.entries[1]), 32 + 2 * 32);
        assert!(notes.is_empty());
    }

    #[test]
    fn test_walk_without_terminator_fails() {
        let mut image = Vec::new();
        image.extend_from_slice(&build_toc_header(TocKind::Itoc, FwFormat::Fs4));
        for i in 0..300u64 {
            image.extend_from_slice(&build_entry(
                0x10,
                0x100,
                0x1000 + i * 0x100,
                FwFormat::Fs4,
                0,
                0,
            ));
        }
        let mut reader = ImageReader::from_bytes(image);
        let mut notes = Vec::new();
        let err = read_table(&mut reader, TocKind::Itoc, FwFormat::Fs4, 0, &mut notes).unwrap_err();
        assert!(matches!(err, FwError::ParseFailed { .. }));
    }
}
