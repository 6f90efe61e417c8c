//! Section replacement.
//!
//! A rewrite takes the original image bytes, a target section and its
//! replacement payload, and produces a new image of canonical size in which
//! every dependent structure is consistent again: downstream sections are
//! relocated when the target's length changes, table entries carry the new
//! addresses and sizes, and every checksum bound to a changed byte range is
//! recomputed. Any failure aborts the whole operation; partial output is
//! never returned.

use std::collections::BTreeMap;

use byteorder::{BigEndian, ByteOrder};

use crate::crc;
use crate::error::{FwError, Result};
use crate::layout::hwpointers::HW_POINTER_COUNT;
use crate::layout::toc::{TocTable, TOC_ENTRY_SIZE, TOC_HEADER_SIZE};
use crate::layout::{self, hwpointers, FwLayout, SECTOR_SIZE};
use crate::reader::ImageReader;
use crate::section::{EntryRef, Section, SectionSelector};
use crate::types::{CrcMode, FwFormat, SectionKind};

/// Largest section size encodable in an entry's 22-bit dword count.
const MAX_ENTRY_BYTES: u64 = 0x3F_FFFF * 4;

/// Replace one section of `image` with `replacement` and return the
/// re-stamped output, padded to the canonical size for the input's size
/// class.
pub fn replace_section(
    image: &[u8],
    selector: &SectionSelector,
    replacement: &[u8],
) -> Result<Vec<u8>> {
    let mut reader = ImageReader::from_bytes(image.to_vec());
    let layout = FwLayout::parse(&mut reader)?;
    apply(image, &layout, selector, replacement)
}

/// Rewrite against an already-parsed layout. The layout must describe
/// exactly these image bytes.
pub(crate) fn apply(
    image: &[u8],
    layout: &FwLayout,
    selector: &SectionSelector,
    replacement: &[u8],
) -> Result<Vec<u8>> {
    let (_, target) = layout
        .find_section(selector)
        .ok_or_else(|| FwError::parse(format!("no section matches {selector}")))?;
    let target = target.clone();

    if layout.encrypted || target.encrypted {
        return Err(FwError::parse(format!(
            "cannot rewrite {}: encrypted content",
            target.kind
        )));
    }

    let new_size = replacement.len() as u64;
    if new_size == 0 || new_size % 4 != 0 {
        return Err(FwError::UnalignedSection {
            name: target.kind.to_string(),
            size: new_size,
        });
    }
    if new_size > MAX_ENTRY_BYTES {
        return Err(FwError::SizeLimit {
            needed: new_size,
            limit: MAX_ENTRY_BYTES,
        });
    }

    let delta = new_size as i64 - target.size as i64;
    if target.entry.is_none() && delta != 0 {
        return Err(FwError::parse(format!(
            "{} is a pointer-derived region and cannot change size \
             (current {:#x}, replacement {:#x})",
            target.kind, target.size, new_size
        )));
    }

    // Boot-style regions carry their own size field; it has to agree with
    // the replacement before anything is written.
    let region_dwords = if target.from_hw_pointer
        && matches!(target.kind, SectionKind::Boot2 | SectionKind::HashesTable)
    {
        Some(region_payload_dwords(replacement, layout.format)?)
    } else {
        None
    };

    let limit = layout::canonical_size(image.len() as u64);
    let tables: Vec<u64> = layout
        .itoc
        .iter()
        .chain(layout.dtoc.iter())
        .map(|t| t.offset)
        .collect();

    // Relocation map over the table-backed sections: everything past the
    // target shifts by delta. Pointer-derived regions never move.
    let mut map = BTreeMap::new();
    let mut moves: Vec<(u64, u64, u64)> = Vec::new();
    if delta != 0 {
        for section in &layout.sections {
            if section.entry.is_none() || section.offset <= target.offset {
                continue;
            }
            // An entry starting inside the replaced range would shift past
            // the image start; such a table is malformed, not relocatable.
            let new_offset = section.offset.checked_add_signed(delta);
            let new_end = new_offset.and_then(|o| o.checked_add(section.size));
            let (Some(new_offset), Some(new_end)) = (new_offset, new_end) else {
                return Err(FwError::parse(format!(
                    "{} at {:#x} overlaps the replaced section and cannot be relocated",
                    section.kind, section.offset
                )));
            };
            guard_range(new_offset, new_end, limit, &tables)?;
            map.insert(section.offset, new_offset);
            moves.push((section.offset, new_offset, section.size));
        }
    }
    guard_range(target.offset, target.offset + new_size, limit, &tables)?;

    let mut out = vec![0xFFu8; limit as usize];
    out[..image.len()].copy_from_slice(image);

    // Growing: move from the top down so no source range is clobbered
    // before it is copied. Shrinking: bottom up, same argument.
    if delta > 0 {
        moves.sort_by_key(|&(old, _, _)| std::cmp::Reverse(old));
    } else {
        moves.sort_by_key(|&(old, _, _)| old);
    }
    for &(old, new, size) in &moves {
        out.copy_within(old as usize..(old + size) as usize, new as usize);
    }

    let start = target.offset as usize;
    out[start..start + replacement.len()].copy_from_slice(replacement);

    match region_dwords {
        Some(payload_dwords) => {
            crc::stamp_region_crc(&mut out[start..start + replacement.len()], payload_dwords);
        }
        None if target.crc_mode == CrcMode::InSection => {
            crc::stamp_trailer(&mut out[start..start + replacement.len()]);
        }
        None => {}
    }

    if let Some(table) = &layout.itoc {
        update_table(&mut out, table, layout.format, &map, &target, new_size);
    }
    if let Some(table) = &layout.dtoc {
        update_table(&mut out, table, layout.format, &map, &target, new_size);
    }

    if let Some(hw) = &layout.hw_pointers {
        for index in 0..HW_POINTER_COUNT {
            let Some(old) = hw.entry(index).target() else {
                continue;
            };
            if let Some(&new) = map.get(&old) {
                hwpointers::stamp_pointer(&mut out, hw.offset, index, new as u32);
            }
        }
    }

    tracing::info!(
        target = %target.kind,
        old_size = format_args!("{:#x}", target.size),
        new_size = format_args!("{new_size:#x}"),
        moved = moves.len(),
        "rewrote section"
    );
    Ok(out)
}

/// Write back one table: relocated addresses, the target's new size, the
/// section CRCs of every payload the rewrite touched, then fresh entry and
/// header CRCs.
fn update_table(
    out: &mut [u8],
    table: &TocTable,
    format: FwFormat,
    map: &BTreeMap<u64, u64>,
    target: &Section,
    new_size: u64,
) {
    let base = table.offset + TOC_HEADER_SIZE as u64;
    for (index, entry) in table.entries.iter().enumerate() {
        let mut entry = entry.clone();
        let is_target = target.entry
            == Some(EntryRef {
                table: table.kind,
                index,
            });
        let old_offset = entry.offset_bytes(format);
        let moved_to = map.get(&old_offset).copied();

        if let Some(new_offset) = moved_to {
            entry.set_flash_addr_dwords(format, (new_offset / 4) as u32);
        }
        if is_target {
            entry.set_size_dwords((new_size / 4) as u32);
        }
        // Untouched payloads keep their stored CRC, wrong or not; only
        // bytes this rewrite placed are re-covered.
        if (is_target || moved_to.is_some()) && entry.crc_mode(format) == CrcMode::InEntry {
            let offset = moved_to.unwrap_or(old_offset) as usize;
            let end = offset + entry.size_bytes() as usize;
            entry.set_section_crc(crc::software_crc(&out[offset..end]));
        }
        entry.restamp_crc();

        let at = (base + entry.slot as u64 * TOC_ENTRY_SIZE as u64) as usize;
        out[at..at + TOC_ENTRY_SIZE].copy_from_slice(entry.raw());
    }

    // Header CRC sits in the low half of the final dword over bytes 0..28.
    // Restamping normalises blank headers.
    let header_at = table.offset as usize;
    crc::stamp_trailer(&mut out[header_at..header_at + TOC_HEADER_SIZE]);
}

/// New ranges must stay inside the canonical limit and clear of the sector
/// each table of contents lives in.
fn guard_range(start: u64, end: u64, limit: u64, tables: &[u64]) -> Result<()> {
    if end > limit {
        return Err(FwError::SizeLimit { needed: end, limit });
    }
    for &table_at in tables {
        let table_end = table_at + SECTOR_SIZE;
        if start < table_end && table_at < end {
            return Err(FwError::SizeLimit {
                needed: end,
                limit: table_at,
            });
        }
    }
    Ok(())
}

/// Validate a boot-style replacement against its own size field and return
/// the payload dword count for the CRC stamp.
fn region_payload_dwords(replacement: &[u8], format: FwFormat) -> Result<usize> {
    if replacement.len() < 16 {
        return Err(FwError::parse(format!(
            "replacement too short for a boot-style region: {:#x} bytes",
            replacement.len()
        )));
    }
    let field = u64::from(BigEndian::read_u32(&replacement[4..8]));
    let payload_dwords = match format {
        FwFormat::Fs4 => {
            if field % 4 != 0 {
                return Err(FwError::parse(format!(
                    "replacement size field {field:#x} is not a whole dword count"
                )));
            }
            field / 4
        }
        FwFormat::Fs3 => field,
    };
    let implied = (payload_dwords + 4) * 4;
    if implied != replacement.len() as u64 {
        return Err(FwError::parse(format!(
            "replacement size field implies {implied:#x} bytes, got {:#x}",
            replacement.len()
        )));
    }
    Ok(payload_dwords as usize)
}
