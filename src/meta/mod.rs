//! Firmware metadata: decoders for the info-bearing sections and the
//! collation that turns them into one queryable record.
//!
//! The image-info section is the primary source and must be present. The
//! device-area records fill in UIDs: device-info when it is populated,
//! manufacture-info as the fallback for blank devices. ROM versions come
//! from scanning the ROM-code sections.

pub mod device_info;
pub mod image_info;
pub mod mfg_info;
pub mod rom_info;

use std::io::{Read, Seek};

use serde::Serialize;

use crate::error::{FwError, Result};
use crate::layout::FwLayout;
use crate::reader::ImageReader;
use crate::types::{FwFormat, FwVersion, ReleaseDate, RomEntry, SecurityReport, SectionKind, UidEntry};

pub use device_info::DeviceInfo;
pub use image_info::ImageInfo;
pub use mfg_info::MfgInfo;

/// The collated metadata record.
#[derive(Debug, Clone, Serialize)]
pub struct FwMetadata {
    /// Detected image generation.
    pub format: FwFormat,
    /// Image-level encryption flag.
    pub encrypted: bool,
    /// Firmware version triple.
    pub fw_version: Option<FwVersion>,
    /// Firmware build date.
    pub release_date: Option<ReleaseDate>,
    /// Marketing version string.
    pub product_version: Option<String>,
    /// Board part number.
    pub part_number: Option<String>,
    /// Board description.
    pub description: Option<String>,
    /// Parameter-set name the image was built from.
    pub prs_name: Option<String>,
    /// Parameter-set identifier.
    pub psid: Option<String>,
    /// Original identifier before a retrofit, when it differs.
    pub orig_psid: Option<String>,
    /// Vendor-specific data from the image area.
    pub image_vsd: Option<String>,
    /// Vendor-specific data from the device area.
    pub device_vsd: Option<String>,
    /// Decoded security attributes.
    pub security: SecurityReport,
    /// Rollback-protection counter.
    pub security_version: u32,
    /// Base GUID allocation.
    pub base_guid: Option<UidEntry>,
    /// Base MAC allocation.
    pub base_mac: Option<UidEntry>,
    /// Second-port GUID allocation, when the device records one.
    pub base_guid_dual: Option<UidEntry>,
    /// Second-port MAC allocation, when the device records one.
    pub base_mac_dual: Option<UidEntry>,
    /// Expansion ROMs found in the image, in scan order.
    pub roms: Vec<RomEntry>,
}

impl FwMetadata {
    /// Decode and collate the metadata sections of a parsed image.
    ///
    /// Fails when the image carries no image-info section; every other
    /// source is optional.
    pub fn collect<R: Read + Seek>(
        layout: &FwLayout,
        reader: &mut ImageReader<R>,
    ) -> Result<FwMetadata> {
        let info = read_kind(layout, reader, SectionKind::ImageInfo)?
            .ok_or_else(|| FwError::parse("image carries no image-info section"))?;
        let info = ImageInfo::parse(&info)?;

        let device = match read_kind(layout, reader, SectionKind::DevInfo)? {
            Some(payload) => Some(DeviceInfo::parse(&payload)?),
            None => None,
        };
        let mfg = match read_kind(layout, reader, SectionKind::MfgInfo)? {
            Some(payload) => Some(MfgInfo::parse(&payload)?),
            None => None,
        };

        // Device-info wins when it holds any allocation; a blank record
        // falls back to what manufacturing burned in.
        let use_mfg_uids = device.as_ref().map_or(true, DeviceInfo::is_unset);
        if use_mfg_uids {
            tracing::debug!("device-info unset, using manufacture-info UIDs");
        }
        let (base_guid, base_mac, base_guid_dual, base_mac_dual) = if use_mfg_uids {
            let mfg = mfg.as_ref();
            (
                mfg.and_then(|m| m.base_guid),
                mfg.and_then(|m| m.base_mac),
                None,
                None,
            )
        } else {
            let device = device.as_ref();
            (
                device.and_then(|d| d.base_guid),
                device.and_then(|d| d.base_mac),
                device.and_then(|d| d.base_guid_dual),
                device.and_then(|d| d.base_mac_dual),
            )
        };

        // The original PSID is normally its own image-info field; images
        // burned over a different board also betray it through a
        // manufacture-info PSID that disagrees with the current one.
        let orig_psid = info.orig_psid.clone().or_else(|| {
            mfg.as_ref()
                .and_then(|m| m.psid.clone())
                .filter(|p| info.psid.as_deref() != Some(p.as_str()))
        });

        let mut roms = Vec::new();
        for section in layout.sections.iter().filter(|s| s.kind == SectionKind::RomCode) {
            roms.extend(rom_info::scan(&section.read_payload(reader)?));
        }

        Ok(FwMetadata {
            format: layout.format,
            encrypted: layout.encrypted,
            fw_version: Some(info.fw_version),
            release_date: info.release_date,
            product_version: info.product_version,
            part_number: info.part_number,
            description: info.description,
            prs_name: info.prs_name,
            psid: info.psid,
            orig_psid,
            image_vsd: info.image_vsd,
            device_vsd: info.device_vsd,
            security: SecurityReport::from_attributes(info.security),
            security_version: info.security_version,
            base_guid,
            base_mac,
            base_guid_dual,
            base_mac_dual,
            roms,
        })
    }
}

fn read_kind<R: Read + Seek>(
    layout: &FwLayout,
    reader: &mut ImageReader<R>,
    kind: SectionKind,
) -> Result<Option<Vec<u8>>> {
    match layout.sections.iter().find(|s| s.kind == kind) {
        Some(section) => section.read_payload(reader).map(Some),
        None => Ok(None),
    }
}

/// Fixed-width string field: NUL-padded ASCII. `None` when the field is
/// empty or holds non-printable bytes (erased flash reads back 0xFF).
pub(crate) fn ascii_field(payload: &[u8], at: usize, width: usize) -> Option<String> {
    let raw = &payload[at..at + width];
    let end = raw.iter().position(|&b| b == 0).unwrap_or(width);
    let raw = &raw[..end];
    if raw.is_empty() || !raw.iter().all(|b| b.is_ascii() && !b.is_ascii_control()) {
        return None;
    }
    let text = String::from_utf8_lossy(raw).trim().to_string();
    (!text.is_empty()).then_some(text)
}
