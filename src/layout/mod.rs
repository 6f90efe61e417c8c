//! Image layout discovery.
//!
//! A parse walks the image once: locate the magic, decode the hardware
//! pointer table, read both tables of contents, materialise sections, and
//! synthesise the pointer-only regions. The result carries offsets into the
//! original bytes; nothing in it owns payload storage.

pub mod hwpointers;
pub mod toc;

use std::io::{Read, Seek};

use crate::error::{FwError, Result};
use crate::reader::ImageReader;
use crate::section::{EntryRef, Section, SectionSelector};
use crate::types::{CrcMode, FwFormat, ParseNote, SectionKind, SectionStatus};

use hwpointers::{HwPointerTable, PointerRole, HW_POINTER_DELTA, HW_POINTER_TABLE_BYTES};
use toc::{TocEntry, TocKind, TocTable, TOC_HEADER_SIZE};

/// 64-bit magic anchoring the current-generation layout ("MTFW" tag dwords).
pub const MAGIC: u64 = 0x4D54_4657_ABCD_EF00;

/// Candidate magic offsets, probed in order; the earliest match wins.
pub const MAGIC_PROBE_OFFSETS: [u64; 6] =
    [0x0, 0x1_0000, 0x2_0000, 0x4_0000, 0x8_0000, 0x10_0000];

/// Older-generation 32-bit marker at offset zero ("MTFS").
pub const FS3_MAGIC: u32 = 0x4D54_4653;

/// Flash sector granularity.
pub const SECTOR_SIZE: u64 = 0x1000;

/// ITOC location relative to the magic when no pointer names one.
pub const DEFAULT_ITOC_DELTA: u64 = 0x4000;

/// Smaller of the two canonical padded image sizes.
pub const CANONICAL_SIZE_32M: u64 = 0x0200_0000;
/// Larger of the two canonical padded image sizes.
pub const CANONICAL_SIZE_64M: u64 = 0x0400_0000;

/// Device TOC offset shared by both canonical sizes.
pub const DTOC_CANONICAL_OFFSET: u64 = 0x01FF_F000;

/// Fixed tools-area region size.
pub const TOOLS_AREA_SIZE: u64 = 0x40;

/// Fixed image-info section size.
pub const IMAGE_INFO_SIZE: u64 = 0x400;

/// Canonical output size for an input of `image_len` bytes: everything up to
/// 32 MiB pads to 32 MiB, larger images pad to 64 MiB.
pub fn canonical_size(image_len: u64) -> u64 {
    if image_len <= CANONICAL_SIZE_32M {
        CANONICAL_SIZE_32M
    } else {
        CANONICAL_SIZE_64M
    }
}

/// Where the device TOC lives for an image of this length. The two canonical
/// sizes share one fixed offset; other plausible lengths put it in the last
/// sector; anything past the 64 MiB class is rejected outright.
pub fn dtoc_offset(image_len: u64) -> Result<u64> {
    if image_len > CANONICAL_SIZE_64M {
        return Err(FwError::parse(format!(
            "image length {image_len:#x} exceeds the 64 MiB size class"
        )));
    }
    if image_len < 2 * SECTOR_SIZE {
        return Err(FwError::parse(format!(
            "image length {image_len:#x} cannot hold a device TOC"
        )));
    }
    if image_len == CANONICAL_SIZE_32M || image_len == CANONICAL_SIZE_64M {
        Ok(DTOC_CANONICAL_OFFSET)
    } else {
        Ok(image_len - SECTOR_SIZE)
    }
}

/// Total byte size of a boot2-style region: two header dwords, the payload,
/// and two tail dwords with the CRC in the last. The second header dword is
/// the size field; its unit (payload bytes in the current generation, payload
/// dwords in the older one) is keyed on the detected generation, never
/// guessed from the value.
pub(crate) fn boot2_region_size<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    offset: u64,
    format: FwFormat,
) -> Result<u64> {
    let field = u64::from(reader.read_u32_be(offset + 4)?);
    let payload_dwords = match format {
        FwFormat::Fs4 => {
            if field % 4 != 0 {
                return Err(FwError::parse(format!(
                    "boot2 size field {field:#x} at {:#x} is not a whole dword count",
                    offset + 4
                )));
            }
            field / 4
        }
        FwFormat::Fs3 => field,
    };
    Ok((payload_dwords + 4) * 4)
}

/// A pointer-named region that could not be turned into a listed section.
#[derive(Debug, Clone)]
pub struct MissingRegion {
    /// Registry type the pointer promised.
    pub kind: SectionKind,
    /// Absolute byte offset the pointer named.
    pub offset: u64,
    /// Why the region is absent from the listing.
    pub status: SectionStatus,
    /// Extra diagnostic text, when the parse recorded one.
    pub detail: Option<String>,
}

/// Everything one parse learned about an image.
#[derive(Debug, Clone)]
pub struct FwLayout {
    /// Detected image generation.
    pub format: FwFormat,
    /// Where the magic pattern was found.
    pub magic_offset: u64,
    /// Total image length in bytes.
    pub image_len: u64,
    /// Image-level encryption flag from the table headers.
    pub encrypted: bool,
    /// Decoded hardware pointer table, current-generation images only.
    pub hw_pointers: Option<HwPointerTable>,
    /// Image table of contents, when one was found.
    pub itoc: Option<TocTable>,
    /// Device-data table of contents, when one was found.
    pub dtoc: Option<TocTable>,
    /// Listed sections, ordered by offset.
    pub sections: Vec<Section>,
    /// Pointer-named regions that produced no section.
    pub missing: Vec<MissingRegion>,
    /// Non-fatal findings collected during the parse.
    pub notes: Vec<ParseNote>,
}

impl FwLayout {
    /// Parse an image: probe for the current-generation magic first, then
    /// fall back to the older-generation marker at offset zero.
    pub fn parse<R: Read + Seek>(reader: &mut ImageReader<R>) -> Result<FwLayout> {
        match reader.find_first(MAGIC, &MAGIC_PROBE_OFFSETS) {
            Ok(magic_offset) => Self::parse_fs4(reader, magic_offset),
            Err(FwError::MagicNotFound) => {
                if reader.len() >= 4 && reader.read_u32_be(0)? == FS3_MAGIC {
                    Self::parse_fs3(reader)
                } else {
                    Err(FwError::MagicNotFound)
                }
            }
            Err(e) => Err(e),
        }
    }

    fn parse_fs4<R: Read + Seek>(reader: &mut ImageReader<R>, magic_offset: u64) -> Result<FwLayout> {
        let image_len = reader.len();
        let mut notes = Vec::new();

        let table_at = magic_offset + HW_POINTER_DELTA;
        let table_bytes = reader.read_at(table_at, HW_POINTER_TABLE_BYTES)?;
        let hw = HwPointerTable::parse(&table_bytes, table_at)?;
        notes.extend(hw.verify());

        let boot2_ptr = hw.target(PointerRole::Boot2);
        let itoc_addr = hw
            .target(PointerRole::Toc)
            .filter(|t| Some(*t) != boot2_ptr)
            .or_else(|| hw.target(PointerRole::ToolsArea))
            .unwrap_or(magic_offset + DEFAULT_ITOC_DELTA);

        let mut encrypted = false;
        let mut itoc = None;
        match toc::read_table(reader, TocKind::Itoc, FwFormat::Fs4, itoc_addr, &mut notes) {
            Ok(table) => itoc = Some(table),
            Err(FwError::BadSignature { .. }) => {
                encrypted = true;
                notes.push(ParseNote::info(format!(
                    "ITOC header at {itoc_addr:#x} did not validate; treating the image as encrypted"
                )));
                for fallback in [itoc_addr + SECTOR_SIZE, itoc_addr + 2 * SECTOR_SIZE] {
                    match toc::read_table(reader, TocKind::Itoc, FwFormat::Fs4, fallback, &mut notes)
                    {
                        Ok(table) => {
                            notes.push(ParseNote::info(format!(
                                "ITOC recovered at fallback offset {fallback:#x}"
                            )));
                            itoc = Some(table);
                            break;
                        }
                        Err(FwError::BadSignature { .. } | FwError::OutOfRange { .. }) => continue,
                        Err(e) => return Err(e),
                    }
                }
            }
            Err(e) => return Err(e),
        }

        let dtoc_addr = dtoc_offset(image_len)?;
        let dtoc = match toc::read_table(reader, TocKind::Dtoc, FwFormat::Fs4, dtoc_addr, &mut notes)
        {
            Ok(table) => Some(table),
            Err(err) => {
                notes.push(ParseNote::warning(format!(
                    "device TOC at {dtoc_addr:#x} not readable: {err}"
                )));
                None
            }
        };

        let mut sections = Vec::new();
        let mut missing = Vec::new();
        if let Some(table) = &itoc {
            collect_table_sections(table, FwFormat::Fs4, image_len, &mut sections, &mut missing, &mut notes);
        }
        if let Some(table) = &dtoc {
            collect_table_sections(table, FwFormat::Fs4, image_len, &mut sections, &mut missing, &mut notes);
        }

        // An unrecoverable ITOC still exposes the image-info region straight
        // from its pointer.
        if encrypted && itoc.is_none() {
            if let Some(offset) = hw.target(PointerRole::ImageInfo) {
                if offset + IMAGE_INFO_SIZE <= image_len {
                    sections.push(Section {
                        kind: SectionKind::ImageInfo,
                        offset,
                        size: IMAGE_INFO_SIZE,
                        crc_mode: CrcMode::None,
                        encrypted: true,
                        device_data: false,
                        from_hw_pointer: true,
                        entry: None,
                    });
                } else {
                    missing.push(MissingRegion {
                        kind: SectionKind::ImageInfo,
                        offset,
                        status: SectionStatus::NotFound,
                        detail: Some("image-info pointer past the image end".to_string()),
                    });
                }
            }
        }

        // Pointer-reachable regions not represented in any table.
        if let Some(offset) = boot2_ptr {
            if !covers(&sections, offset) {
                push_region_section(
                    reader,
                    SectionKind::Boot2,
                    offset,
                    FwFormat::Fs4,
                    image_len,
                    encrypted,
                    &mut sections,
                    &mut missing,
                );
            }
        }
        if let Some(offset) = hw.target(PointerRole::HashesTable) {
            if !covers(&sections, offset) {
                push_region_section(
                    reader,
                    SectionKind::HashesTable,
                    offset,
                    FwFormat::Fs4,
                    image_len,
                    encrypted,
                    &mut sections,
                    &mut missing,
                );
            }
        }
        if let Some(offset) = hw.target(PointerRole::ToolsArea) {
            if !covers(&sections, offset) {
                if offset + TOOLS_AREA_SIZE <= image_len {
                    sections.push(Section {
                        kind: SectionKind::ToolsArea,
                        offset,
                        size: TOOLS_AREA_SIZE,
                        crc_mode: CrcMode::InSection,
                        encrypted,
                        device_data: false,
                        from_hw_pointer: true,
                        entry: None,
                    });
                } else {
                    missing.push(MissingRegion {
                        kind: SectionKind::ToolsArea,
                        offset,
                        status: SectionStatus::NotFound,
                        detail: Some("tools-area pointer past the image end".to_string()),
                    });
                }
            }
        }

        // A set image-info pointer on a plain image must be backed by a
        // table entry.
        if !encrypted {
            if let Some(offset) = hw.target(PointerRole::ImageInfo) {
                if !covers(&sections, offset) {
                    missing.push(MissingRegion {
                        kind: SectionKind::ImageInfo,
                        offset,
                        status: SectionStatus::NoEntry,
                        detail: Some(
                            "image-info pointer set but no table entry describes it".to_string(),
                        ),
                    });
                }
            }
        }

        sections.sort_by_key(|s| s.offset);
        tracing::info!(
            format = %FwFormat::Fs4,
            magic = format_args!("{magic_offset:#x}"),
            sections = sections.len(),
            encrypted,
            "parsed image layout"
        );
        Ok(FwLayout {
            format: FwFormat::Fs4,
            magic_offset,
            image_len,
            encrypted,
            hw_pointers: Some(hw),
            itoc,
            dtoc,
            sections,
            missing,
            notes,
        })
    }

    fn parse_fs3<R: Read + Seek>(reader: &mut ImageReader<R>) -> Result<FwLayout> {
        let image_len = reader.len();
        let mut notes = Vec::new();

        // No pointer table in this generation; the ITOC is found by a
        // sector-aligned signature scan.
        let mut itoc = None;
        let mut at = SECTOR_SIZE;
        while at + TOC_HEADER_SIZE as u64 <= image_len {
            if reader.read_u32_be(at)? == toc::TOC_SIG_ITOC {
                match toc::read_table(reader, TocKind::Itoc, FwFormat::Fs3, at, &mut notes) {
                    Ok(table) => {
                        itoc = Some(table);
                        break;
                    }
                    // Signature dword collided but the quad did not check
                    // out; keep scanning.
                    Err(FwError::BadSignature { .. }) => {}
                    Err(e) => return Err(e),
                }
            }
            at += SECTOR_SIZE;
        }
        let Some(itoc) = itoc else {
            return Err(FwError::parse("no ITOC found by sector scan"));
        };

        // Older images normally carry no device TOC; probe quietly.
        let dtoc = match dtoc_offset(image_len) {
            Ok(addr) => {
                match toc::read_table(reader, TocKind::Dtoc, FwFormat::Fs3, addr, &mut notes) {
                    Ok(table) => Some(table),
                    Err(err) => {
                        tracing::debug!(%err, "no device TOC");
                        None
                    }
                }
            }
            Err(err) => return Err(err),
        };

        let mut sections = Vec::new();
        let mut missing = Vec::new();
        collect_table_sections(&itoc, FwFormat::Fs3, image_len, &mut sections, &mut missing, &mut notes);
        if let Some(table) = &dtoc {
            collect_table_sections(table, FwFormat::Fs3, image_len, &mut sections, &mut missing, &mut notes);
        }
        sections.sort_by_key(|s| s.offset);
        tracing::info!(
            format = %FwFormat::Fs3,
            itoc = format_args!("{:#x}", itoc.offset),
            sections = sections.len(),
            "parsed image layout"
        );
        Ok(FwLayout {
            format: FwFormat::Fs3,
            magic_offset: 0,
            image_len,
            encrypted: false,
            hw_pointers: None,
            itoc: Some(itoc),
            dtoc,
            sections,
            missing,
            notes,
        })
    }

    /// Resolve an entry back-reference into the owning table.
    pub fn entry(&self, eref: EntryRef) -> Option<&TocEntry> {
        let table = match eref.table {
            TocKind::Itoc => self.itoc.as_ref()?,
            TocKind::Dtoc => self.dtoc.as_ref()?,
        };
        table.entries.get(eref.index)
    }

    /// The originating entry of a section, when it has one.
    pub fn section_entry(&self, section: &Section) -> Option<&TocEntry> {
        section.entry.and_then(|eref| self.entry(eref))
    }

    /// First listed section matching a selector.
    pub fn find_section(&self, selector: &SectionSelector) -> Option<(usize, &Section)> {
        self.sections
            .iter()
            .enumerate()
            .find(|(i, s)| selector.matches(*i, s))
    }

    /// Verify every listed section and fold in the un-materialised regions.
    pub fn verify<R: Read + Seek>(&self, reader: &mut ImageReader<R>) -> LayoutReport {
        let mut rows = Vec::new();
        for (index, section) in self.sections.iter().enumerate() {
            let entry = self.section_entry(section);
            let verdict = section.verify(reader, entry, self.encrypted);
            rows.push(ReportRow {
                index: Some(index),
                kind: section.kind,
                offset: section.offset,
                size: section.size,
                crc_mode: Some(section.crc_mode),
                device_data: section.device_data,
                status: verdict.status,
                detail: verdict.detail,
            });
        }
        for region in &self.missing {
            rows.push(ReportRow {
                index: None,
                kind: region.kind,
                offset: region.offset,
                size: 0,
                crc_mode: None,
                device_data: region.kind.is_device_data(),
                status: region.status,
                detail: region.detail.clone(),
            });
        }
        LayoutReport {
            format: self.format,
            magic_offset: self.magic_offset,
            image_len: self.image_len,
            encrypted: self.encrypted,
            rows,
            notes: self.notes.clone(),
        }
    }
}

fn covers(sections: &[Section], offset: u64) -> bool {
    sections.iter().any(|s| s.offset == offset)
}

fn collect_table_sections(
    table: &TocTable,
    format: FwFormat,
    image_len: u64,
    sections: &mut Vec<Section>,
    missing: &mut Vec<MissingRegion>,
    notes: &mut Vec<ParseNote>,
) {
    for (index, entry) in table.entries.iter().enumerate() {
        let kind = match table.kind {
            TocKind::Itoc => SectionKind::from_itoc_type(entry.section_type()),
            TocKind::Dtoc => SectionKind::from_dtoc_type(entry.section_type()),
        };
        if matches!(kind, SectionKind::Unknown(_)) {
            notes.push(ParseNote::warning(format!(
                "{} slot {}: unknown section type {:#04x}, listed generically",
                table.kind.name(),
                entry.slot,
                entry.section_type()
            )));
        }
        let offset = entry.offset_bytes(format);
        let size = entry.size_bytes();
        if offset.checked_add(size).map_or(true, |end| end > image_len) {
            missing.push(MissingRegion {
                kind,
                offset,
                status: SectionStatus::NotFound,
                detail: Some(format!(
                    "section extends past the image end ({offset:#x} + {size:#x} > {image_len:#x})"
                )),
            });
            continue;
        }
        sections.push(Section {
            kind,
            offset,
            size,
            crc_mode: entry.crc_mode(format),
            encrypted: entry.encrypted_flag(),
            device_data: entry.device_data_flag() || kind.is_device_data(),
            from_hw_pointer: false,
            entry: Some(EntryRef {
                table: table.kind,
                index,
            }),
        });
    }
}

/// Materialise a boot2-style pointer region, or record why it could not be.
#[allow(clippy::too_many_arguments)]
fn push_region_section<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    kind: SectionKind,
    offset: u64,
    format: FwFormat,
    image_len: u64,
    encrypted: bool,
    sections: &mut Vec<Section>,
    missing: &mut Vec<MissingRegion>,
) {
    match boot2_region_size(reader, offset, format) {
        Ok(size) if offset + size <= image_len => sections.push(Section {
            kind,
            offset,
            size,
            crc_mode: CrcMode::InSection,
            encrypted,
            device_data: false,
            from_hw_pointer: true,
            entry: None,
        }),
        Ok(size) => missing.push(MissingRegion {
            kind,
            offset,
            status: SectionStatus::NotFound,
            detail: Some(format!(
                "region extends past the image end ({offset:#x} + {size:#x} > {image_len:#x})"
            )),
        }),
        Err(err) => missing.push(MissingRegion {
            kind,
            offset,
            status: SectionStatus::NotFound,
            detail: Some(err.to_string()),
        }),
    }
}

/// One row of the listing report.
#[derive(Debug, Clone)]
pub struct ReportRow {
    /// Listed section index; `None` for an un-materialised region.
    pub index: Option<usize>,
    /// Registry type.
    pub kind: SectionKind,
    /// Absolute byte offset in the image.
    pub offset: u64,
    /// Length in bytes; zero for a region that never materialised.
    pub size: u64,
    /// Where the covering CRC lives, if anywhere.
    pub crc_mode: Option<CrcMode>,
    /// Device-area row, preserved across firmware updates.
    pub device_data: bool,
    /// Verification outcome.
    pub status: SectionStatus,
    /// Diagnostic text accompanying a non-OK status.
    pub detail: Option<String>,
}

/// Result of verifying a parsed layout, ready for rendering.
#[derive(Debug, Clone)]
pub struct LayoutReport {
    /// Detected image generation.
    pub format: FwFormat,
    /// Where the magic pattern was found.
    pub magic_offset: u64,
    /// Total image length in bytes.
    pub image_len: u64,
    /// Image-level encryption flag.
    pub encrypted: bool,
    /// One row per listed section plus one per missing region.
    pub rows: Vec<ReportRow>,
    /// Non-fatal findings carried over from the parse.
    pub notes: Vec<ParseNote>,
}

impl LayoutReport {
    /// Whether any row carries a status that should fail the listing.
    pub fn has_fatal(&self) -> bool {
        self.rows.iter().any(|row| row.status.is_fatal())
    }
}
