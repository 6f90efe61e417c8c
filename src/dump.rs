//! Disassembly into a directory of blobs, and byte-exact reassembly.
//!
//! `disassemble` splits an image into one file per listed section and one
//! file per unclaimed gap, described by a `manifest.json`. Section ranges
//! and gap ranges together tile the whole image, so `assemble` rebuilds the
//! original byte-for-byte.

use std::fs;
use std::io::{Read, Seek};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FwError, Result};
use crate::layout::FwLayout;
use crate::reader::ImageReader;
use crate::types::FwFormat;

/// Name of the manifest file inside a dump directory.
pub const MANIFEST_NAME: &str = "manifest.json";

/// What a chunk file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkRole {
    /// A listed section's payload.
    Section,
    /// Bytes between two listed sections.
    Gap,
}

/// One tile of the image: a section payload or the padding between two.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkEntry {
    /// Whether this chunk is a section or a gap.
    pub role: ChunkRole,
    /// Section display name; absent for gaps.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub kind: Option<String>,
    /// Section type code; absent for gaps.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub code: Option<u16>,
    /// Absolute byte offset in the image.
    pub offset: u64,
    /// Length in bytes.
    pub size: u64,
    /// File name of the chunk inside the dump directory.
    pub file: String,
}

/// The dump directory's table of contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Manifest {
    /// Total image length in bytes.
    pub image_len: u64,
    /// Detected image generation.
    pub format: FwFormat,
    /// Where the magic pattern was found.
    pub magic_offset: u64,
    /// Every chunk in offset order; sizes must sum to `image_len`.
    pub chunks: Vec<ChunkEntry>,
}

/// Write every section and every gap of a parsed image into `dir`, plus the
/// manifest describing them.
pub fn disassemble<R: Read + Seek, P: AsRef<Path>>(
    layout: &FwLayout,
    reader: &mut ImageReader<R>,
    dir: P,
) -> Result<Manifest> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir)?;

    let mut chunks = Vec::new();
    let mut cursor = 0u64;
    for (index, section) in layout.sections.iter().enumerate() {
        if section.offset > cursor {
            chunks.push(gap_chunk(reader, dir, cursor, section.offset)?);
        }
        let payload = section.read_payload(reader)?;
        let file = format!(
            "{index:03}_{}.bin",
            section.kind.to_string().to_ascii_lowercase()
        );
        fs::write(dir.join(&file), &payload)?;
        chunks.push(ChunkEntry {
            role: ChunkRole::Section,
            kind: Some(section.kind.to_string()),
            code: Some(section.kind.code()),
            offset: section.offset,
            size: section.size,
            file,
        });
        cursor = cursor.max(section.end());
    }
    if cursor < layout.image_len {
        chunks.push(gap_chunk(reader, dir, cursor, layout.image_len)?);
    }

    let manifest = Manifest {
        image_len: layout.image_len,
        format: layout.format,
        magic_offset: layout.magic_offset,
        chunks,
    };
    let json = serde_json::to_string_pretty(&manifest)
        .map_err(|e| FwError::parse(format!("manifest serialisation: {e}")))?;
    fs::write(dir.join(MANIFEST_NAME), json)?;
    tracing::info!(
        dir = %dir.display(),
        chunks = manifest.chunks.len(),
        "disassembled image"
    );
    Ok(manifest)
}

fn gap_chunk<R: Read + Seek>(
    reader: &mut ImageReader<R>,
    dir: &Path,
    start: u64,
    end: u64,
) -> Result<ChunkEntry> {
    let bytes = reader.read_at(start, (end - start) as usize)?;
    let file = format!("gap_{start:08x}.bin");
    fs::write(dir.join(&file), &bytes)?;
    Ok(ChunkEntry {
        role: ChunkRole::Gap,
        kind: None,
        code: None,
        offset: start,
        size: end - start,
        file,
    })
}

/// Rebuild an image from a dump directory. The chunk list must tile
/// `[0, image_len)`; every chunk file must match its declared size.
pub fn assemble<P: AsRef<Path>>(dir: P) -> Result<Vec<u8>> {
    let dir = dir.as_ref();
    let json = fs::read_to_string(dir.join(MANIFEST_NAME))?;
    let manifest: Manifest =
        serde_json::from_str(&json).map_err(|e| FwError::parse(format!("manifest: {e}")))?;

    let mut spans: Vec<(u64, u64)> = manifest
        .chunks
        .iter()
        .map(|c| (c.offset, c.offset + c.size))
        .collect();
    spans.sort_unstable();
    let mut cursor = 0u64;
    for &(start, end) in &spans {
        if start > cursor {
            return Err(FwError::parse(format!(
                "chunks leave {cursor:#x}..{start:#x} uncovered"
            )));
        }
        cursor = cursor.max(end);
    }
    if cursor != manifest.image_len {
        return Err(FwError::parse(format!(
            "chunks cover {cursor:#x} of {:#x} image bytes",
            manifest.image_len
        )));
    }

    let len = usize::try_from(manifest.image_len)
        .map_err(|_| FwError::parse("image too large for this platform"))?;
    let mut image = vec![0u8; len];
    for chunk in &manifest.chunks {
        let bytes = fs::read(dir.join(&chunk.file))?;
        if bytes.len() as u64 != chunk.size {
            return Err(FwError::parse(format!(
                "{}: expected {:#x} bytes, found {:#x}",
                chunk.file,
                chunk.size,
                bytes.len()
            )));
        }
        let end = chunk.offset + chunk.size;
        if end > manifest.image_len {
            return Err(FwError::OutOfRange {
                offset: chunk.offset,
                len: chunk.size,
                image_len: manifest.image_len,
            });
        }
        image[chunk.offset as usize..end as usize].copy_from_slice(&bytes);
    }
    tracing::info!(
        dir = %dir.display(),
        len = format_args!("{:#x}", manifest.image_len),
        "assembled image"
    );
    Ok(image)
}
