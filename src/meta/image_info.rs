//! Decoder for the image-info section.
//!
//! The section is a fixed layout of big-endian words and NUL-padded ASCII
//! fields. Everything here is read at its absolute offset; there is no
//! framing to walk.

use byteorder::{BigEndian, ByteOrder};

use crate::error::{FwError, Result};
use crate::meta::ascii_field;
use crate::types::{FwVersion, ReleaseDate, SecurityAttributes};

/// Bytes needed to cover every decoded field.
pub const MIN_LEN: usize = 0x370;

const WORD_CONTROL: usize = 0x000;
const WORD_VER_MAJOR: usize = 0x004;
const WORD_VER_MINOR: usize = 0x008;
const WORD_VER_SUBMINOR: usize = 0x00A;
const WORD_DATE_YEAR: usize = 0x010;
const BYTE_DATE_DAY: usize = 0x012;
const BYTE_DATE_MONTH: usize = 0x013;
const WORD_SECURITY_VER: usize = 0x014;
const STR_PSID: (usize, usize) = (0x020, 16);
const STR_PART_NUMBER: (usize, usize) = (0x030, 32);
const STR_PRODUCT_VER: (usize, usize) = (0x050, 16);
const STR_PRS_NAME: (usize, usize) = (0x060, 96);
const STR_DESCRIPTION: (usize, usize) = (0x0C0, 256);
const STR_IMAGE_VSD: (usize, usize) = (0x1C0, 208);
const STR_DEVICE_VSD: (usize, usize) = (0x290, 208);
const STR_ORIG_PSID: (usize, usize) = (0x360, 16);

/// Decoded image-info fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInfo {
    /// Security attribute bits from the control word.
    pub security: SecurityAttributes,
    /// Firmware version triple.
    pub fw_version: FwVersion,
    /// Firmware build date, `None` when the field is blank.
    pub release_date: Option<ReleaseDate>,
    /// Rollback-protection counter.
    pub security_version: u32,
    /// Parameter-set identifier.
    pub psid: Option<String>,
    /// Board part number.
    pub part_number: Option<String>,
    /// Marketing version string.
    pub product_version: Option<String>,
    /// Parameter-set name the image was built from.
    pub prs_name: Option<String>,
    /// Board description.
    pub description: Option<String>,
    /// Vendor-specific data, image area.
    pub image_vsd: Option<String>,
    /// Vendor-specific data, device area.
    pub device_vsd: Option<String>,
    /// Original identifier before a retrofit, when it differs.
    pub orig_psid: Option<String>,
}

impl ImageInfo {
    /// Decode an image-info payload.
    pub fn parse(payload: &[u8]) -> Result<ImageInfo> {
        if payload.len() < MIN_LEN {
            return Err(FwError::parse(format!(
                "image-info section too short: {:#x} bytes",
                payload.len()
            )));
        }

        let control = BigEndian::read_u32(&payload[WORD_CONTROL..WORD_CONTROL + 4]);
        let fw_version = FwVersion {
            major: BigEndian::read_u16(&payload[WORD_VER_MAJOR..WORD_VER_MAJOR + 2]),
            minor: BigEndian::read_u16(&payload[WORD_VER_MINOR..WORD_VER_MINOR + 2]),
            subminor: BigEndian::read_u16(&payload[WORD_VER_SUBMINOR..WORD_VER_SUBMINOR + 2]),
        };
        let date = ReleaseDate {
            day: payload[BYTE_DATE_DAY],
            month: payload[BYTE_DATE_MONTH],
            year: BigEndian::read_u16(&payload[WORD_DATE_YEAR..WORD_DATE_YEAR + 2]),
        };

        Ok(ImageInfo {
            security: SecurityAttributes::from_info_word(control),
            fw_version,
            release_date: date.is_valid().then_some(date),
            security_version: BigEndian::read_u32(&payload[WORD_SECURITY_VER..WORD_SECURITY_VER + 4]),
            psid: ascii_field(payload, STR_PSID.0, STR_PSID.1),
            part_number: ascii_field(payload, STR_PART_NUMBER.0, STR_PART_NUMBER.1),
            product_version: ascii_field(payload, STR_PRODUCT_VER.0, STR_PRODUCT_VER.1),
            prs_name: ascii_field(payload, STR_PRS_NAME.0, STR_PRS_NAME.1),
            description: ascii_field(payload, STR_DESCRIPTION.0, STR_DESCRIPTION.1),
            image_vsd: ascii_field(payload, STR_IMAGE_VSD.0, STR_IMAGE_VSD.1),
            device_vsd: ascii_field(payload, STR_DEVICE_VSD.0, STR_DEVICE_VSD.1),
            orig_psid: ascii_field(payload, STR_ORIG_PSID.0, STR_ORIG_PSID.1),
        })
    }
}
