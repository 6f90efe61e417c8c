//! The section model: a contiguous byte range described by a table entry or
//! synthesised from a hardware pointer, plus its CRC verdict.

use std::fmt;
use std::io::{Read, Seek};
use std::str::FromStr;

use crate::crc;
use crate::error::{FwError, Result};
use crate::layout::toc::{TocEntry, TocKind};
use crate::reader::ImageReader;
use crate::types::{CrcMode, SectionKind, SectionStatus};

/// Stable back-reference from a section to its originating entry. Entries
/// are owned by their table; sections store an index, never a pointer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    /// Which table owns the entry.
    pub table: TocKind,
    /// Position in the owning table's entry vector.
    pub index: usize,
}

/// One materialised section. Carries offsets into the image; payload bytes
/// are read on demand through the [`ImageReader`].
#[derive(Debug, Clone)]
pub struct Section {
    /// Registry type.
    pub kind: SectionKind,
    /// Absolute byte offset in the image.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
    /// Where the covering CRC lives, if anywhere.
    pub crc_mode: CrcMode,
    /// Entry or image marked this content encrypted.
    pub encrypted: bool,
    /// Device-area section, preserved across firmware updates.
    pub device_data: bool,
    /// Synthesised from a hardware pointer rather than a table entry.
    pub from_hw_pointer: bool,
    /// Originating table entry, `None` for pointer-derived regions.
    pub entry: Option<EntryRef>,
}

impl Section {
    /// One past the last byte.
    pub fn end(&self) -> u64 {
        self.offset + self.size
    }

    /// Read the full payload.
    pub fn read_payload<R: Read + Seek>(&self, reader: &mut ImageReader<R>) -> Result<Vec<u8>> {
        reader.read_at(self.offset, self.size as usize)
    }

    /// Check the section against its stored CRC.
    ///
    /// `entry` is the resolved originating entry, when there is one; it
    /// supplies the in-entry CRC and is itself covered by an entry CRC.
    /// Encrypted payloads are skipped, as are pointer-derived regions of an
    /// encrypted image.
    pub fn verify<R: Read + Seek>(
        &self,
        reader: &mut ImageReader<R>,
        entry: Option<&TocEntry>,
        image_encrypted: bool,
    ) -> SectionVerdict {
        if self.encrypted || (image_encrypted && self.from_hw_pointer) {
            return SectionVerdict::new(SectionStatus::Encrypted, None);
        }

        if self.crc_mode != CrcMode::None && self.size % 4 != 0 {
            return SectionVerdict::new(
                SectionStatus::SizeNotAligned,
                Some(format!("size {:#x} is not a dword multiple", self.size)),
            );
        }

        if let Some(entry) = entry {
            let context = format!("{} slot {}", self.kind, entry.slot);
            if let Err(err) = entry.verify_crc(&context) {
                return SectionVerdict::new(SectionStatus::Fail, Some(err.to_string()));
            }
        }

        match self.crc_mode {
            CrcMode::None => SectionVerdict::new(SectionStatus::CrcIgnored, None),
            CrcMode::InEntry => self.verify_in_entry(reader, entry),
            CrcMode::InSection => self.verify_in_section(reader),
        }
    }

    fn verify_in_entry<R: Read + Seek>(
        &self,
        reader: &mut ImageReader<R>,
        entry: Option<&TocEntry>,
    ) -> SectionVerdict {
        let Some(entry) = entry else {
            // In-entry mode only arises for entry-backed sections; without
            // the entry there is nothing to compare against.
            return SectionVerdict::new(
                SectionStatus::CrcIgnored,
                Some("no entry carries the CRC".to_string()),
            );
        };
        let stored = entry.section_crc();
        if stored == crc::CRC_BLANK {
            return SectionVerdict::new(
                SectionStatus::CrcIgnored,
                Some("stored CRC is blank".to_string()),
            );
        }
        let payload = match self.read_payload(reader) {
            Ok(payload) => payload,
            Err(err) => return SectionVerdict::new(SectionStatus::Fail, Some(err.to_string())),
        };
        let computed = crc::software_crc(&payload);
        if computed == stored {
            SectionVerdict::new(SectionStatus::Ok, None)
        } else {
            SectionVerdict::new(
                SectionStatus::Fail,
                Some(format!(
                    "payload CRC mismatch: stored {stored:#06x}, computed {computed:#06x}"
                )),
            )
        }
    }

    fn verify_in_section<R: Read + Seek>(&self, reader: &mut ImageReader<R>) -> SectionVerdict {
        let payload = match self.read_payload(reader) {
            Ok(payload) => payload,
            Err(err) => return SectionVerdict::new(SectionStatus::Fail, Some(err.to_string())),
        };
        // Pointer-derived boot2 and hashes-table regions keep their CRC in
        // the last dword but cover only the payload dwords after the two
        // header words; plain in-section trailers cover everything before
        // the trailer.
        let pair = if self.from_hw_pointer
            && matches!(self.kind, SectionKind::Boot2 | SectionKind::HashesTable)
        {
            let payload_dwords = (self.size / 4).saturating_sub(4) as usize;
            crc::region_crc(&payload, payload_dwords)
        } else {
            crc::split_trailer(&payload).map(|(body, stored)| (crc::software_crc(body), stored))
        };
        match pair {
            None => SectionVerdict::new(
                SectionStatus::Fail,
                Some(format!("section too small for a CRC trailer: {:#x}", self.size)),
            ),
            Some((_, stored)) if stored == crc::CRC_BLANK => SectionVerdict::new(
                SectionStatus::CrcIgnored,
                Some("stored CRC is blank".to_string()),
            ),
            Some((computed, stored)) if computed == stored => {
                SectionVerdict::new(SectionStatus::Ok, None)
            }
            Some((computed, stored)) => SectionVerdict::new(
                SectionStatus::Fail,
                Some(format!(
                    "trailer CRC mismatch: stored {stored:#06x}, computed {computed:#06x}"
                )),
            ),
        }
    }
}

/// Outcome of verifying one section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionVerdict {
    /// Report status.
    pub status: SectionStatus,
    /// Diagnostic text for non-OK statuses.
    pub detail: Option<String>,
}

impl SectionVerdict {
    /// Pair a status with its diagnostic.
    pub fn new(status: SectionStatus, detail: Option<String>) -> Self {
        SectionVerdict { status, detail }
    }
}

/// How a section is named on the command line: a registry name, a `0x`
/// hexadecimal type code, or a list index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionSelector {
    /// Select by registry type.
    Kind(SectionKind),
    /// Select by position in the listing.
    Index(usize),
}

impl SectionSelector {
    /// Whether a listed section matches this selector.
    pub fn matches(&self, index: usize, section: &Section) -> bool {
        match self {
            SectionSelector::Kind(kind) => section.kind == *kind,
            SectionSelector::Index(i) => *i == index,
        }
    }
}

impl fmt::Display for SectionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SectionSelector::Kind(kind) => write!(f, "{kind}"),
            SectionSelector::Index(i) => write!(f, "index {i}"),
        }
    }
}

impl FromStr for SectionSelector {
    type Err = FwError;

    fn from_str(s: &str) -> Result<Self> {
        if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            let code = u16::from_str_radix(hex, 16)
                .map_err(|_| FwError::parse(format!("bad section type code {s:?}")))?;
            return Ok(SectionSelector::Kind(SectionKind::from_code(code)));
        }
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            let index = s
                .parse()
                .map_err(|_| FwError::parse(format!("bad section index {s:?}")))?;
            return Ok(SectionSelector::Index(index));
        }
        SectionKind::from_name(s)
            .map(SectionSelector::Kind)
            .ok_or_else(|| FwError::parse(format!("unknown section name {s:?}")))
    }
}
