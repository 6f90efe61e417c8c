//! Firmware image analysis and modification for MT-family network adapters.
//!
//! This library parses the two firmware image generations used by these
//! adapters, verifies every stored checksum, decodes the embedded metadata
//! record, replaces sections with full CRC and pointer re-stamping, and
//! disassembles images into parts that reassemble byte-exactly.
//!
//! # Capabilities
//!
//! - **Layout discovery**: 64-bit magic probe, hardware pointer table, image
//!   and device tables of contents, synthetic pointer-derived regions, and
//!   the encrypted-image fallback chain
//! - **Verification**: software, hardware-flavoured, and boot-region CRC
//!   algorithms checked against every stored value
//! - **Metadata**: firmware version, release date, PSID, GUIDs/MACs,
//!   security attributes, and expansion-ROM inventory
//! - **Rewriting**: section replacement with relocation of downstream
//!   sections and re-stamping of entry, header, and pointer checksums
//! - **Round trips**: disassemble to a manifest plus blobs, reassemble to
//!   the original bytes
//!
//! # Quick start
//!
//! ```rust,no_run
//! use mtfw_tools::FwImage;
//!
//! fn main() -> mtfw_tools::Result<()> {
//!     let mut image = FwImage::open("firmware.bin")?;
//!     let report = image.verify();
//!     for row in &report.rows {
//!         println!("{} at {:#x}: {}", row.kind, row.offset, row.status);
//!     }
//!
//!     let meta = image.metadata()?;
//!     if let Some(version) = meta.fw_version {
//!         println!("firmware version {version}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::similar_names)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]

pub mod bitfield;
pub mod crc;
pub mod dump;
pub mod error;
pub mod formatter;
pub mod layout;
pub mod meta;
pub mod reader;
pub mod rewrite;
pub mod section;
pub mod types;

#[cfg(test)]
pub(crate) mod testutil;

pub use dump::{assemble, Manifest};
pub use error::{FwError, Result};
pub use formatter::{HumanFormatter, JsonFormatter, ReportFormatter, ShortFormatter};
pub use layout::{FwLayout, LayoutReport, ReportRow};
pub use meta::FwMetadata;
pub use rewrite::replace_section;
pub use section::{Section, SectionSelector, SectionVerdict};
pub use types::{CrcMode, FwFormat, SectionKind, SectionStatus};

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use reader::ImageReader;

/// A parsed firmware image: the discovered layout plus the reader it came
/// from. Payload bytes are read on demand, so opening a large file does not
/// load its sections until asked.
pub struct FwImage<R> {
    layout: FwLayout,
    reader: ImageReader<R>,
}

impl FwImage<File> {
    /// Open an image file and parse its layout.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::parse(ImageReader::open(path)?)
    }
}

impl FwImage<Cursor<Vec<u8>>> {
    /// Parse an in-memory image.
    pub fn from_bytes(data: Vec<u8>) -> Result<Self> {
        Self::parse(ImageReader::from_bytes(data))
    }
}

impl<R: Read + Seek> FwImage<R> {
    fn parse(mut reader: ImageReader<R>) -> Result<Self> {
        let layout = FwLayout::parse(&mut reader)?;
        Ok(FwImage { layout, reader })
    }

    /// The discovered layout.
    pub fn layout(&self) -> &FwLayout {
        &self.layout
    }

    /// Listed sections, ordered by offset.
    pub fn sections(&self) -> &[Section] {
        &self.layout.sections
    }

    /// Verify every section and fold in the un-materialised regions.
    pub fn verify(&mut self) -> LayoutReport {
        self.layout.verify(&mut self.reader)
    }

    /// Decode and collate the metadata record. Strict: an image without an
    /// image-info section is an error.
    pub fn metadata(&mut self) -> Result<FwMetadata> {
        FwMetadata::collect(&self.layout, &mut self.reader)
    }

    /// Read the payload of the first section matching `selector`.
    pub fn section_payload(&mut self, selector: &SectionSelector) -> Result<Vec<u8>> {
        let (_, section) = self
            .layout
            .find_section(selector)
            .ok_or_else(|| FwError::parse(format!("no section matches {selector}")))?;
        section.read_payload(&mut self.reader)
    }

    /// Replace one section and return the re-stamped, canonically padded
    /// output image. The image on disk is not touched.
    pub fn replace_section(
        &mut self,
        selector: &SectionSelector,
        replacement: &[u8],
    ) -> Result<Vec<u8>> {
        let image = self.reader.read_all()?;
        rewrite::apply(&image, &self.layout, selector, replacement)
    }

    /// Write every section and gap of the image into `dir` with a manifest
    /// describing them; [`assemble`] rebuilds the original from it.
    pub fn disassemble<P: AsRef<Path>>(&mut self, dir: P) -> Result<Manifest> {
        dump::disassemble(&self.layout, &mut self.reader, dir)
    }
}

/// Parse and verify an image file in one call.
pub fn verify_file<P: AsRef<Path>>(path: P) -> Result<LayoutReport> {
    let mut image = FwImage::open(path)?;
    Ok(image.verify())
}

/// Parse an image file and decode its metadata record in one call.
pub fn query_file<P: AsRef<Path>>(path: P) -> Result<FwMetadata> {
    let mut image = FwImage::open(path)?;
    image.metadata()
}
