//! Decoder for the manufacture-info section: the PSID and UID allocations
//! burned at manufacture, which survive reflashes. Little-endian UIDs, like
//! the other device-area records.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FwError, Result};
use crate::meta::ascii_field;
use crate::types::UidEntry;

/// Bytes needed to cover the PSID and both allocations.
pub const MIN_LEN: usize = 0x30;

const STR_PSID: (usize, usize) = (0x00, 16);
const GUID_AT: usize = 0x10;
const MAC_AT: usize = 0x20;

/// Decoded manufacture-info fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MfgInfo {
    /// Parameter-set identifier stamped at manufacture time.
    pub psid: Option<String>,
    /// Factory GUID allocation.
    pub base_guid: Option<UidEntry>,
    /// Factory MAC allocation.
    pub base_mac: Option<UidEntry>,
}

impl MfgInfo {
    /// Decode a manufacture-info payload.
    pub fn parse(payload: &[u8]) -> Result<MfgInfo> {
        if payload.len() < MIN_LEN {
            return Err(FwError::parse(format!(
                "manufacture-info section too short: {:#x} bytes",
                payload.len()
            )));
        }
        Ok(MfgInfo {
            psid: ascii_field(payload, STR_PSID.0, STR_PSID.1),
            base_guid: uid_at(payload, GUID_AT),
            base_mac: uid_at(payload, MAC_AT),
        })
    }
}

fn uid_at(payload: &[u8], at: usize) -> Option<UidEntry> {
    let uid = LittleEndian::read_u64(&payload[at..at + 8]);
    UidEntry::from_raw(uid, payload[at + 8], payload[at + 9])
}
