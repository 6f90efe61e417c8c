//! Decoder for the device-info section: the base GUID and MAC allocations
//! written at personalisation time. Unlike the image-area sections these
//! records are little-endian.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::{FwError, Result};
use crate::types::UidEntry;

/// Bytes needed to cover all four allocations.
pub const MIN_LEN: usize = 0x50;

const GUID_AT: usize = 0x10;
const MAC_AT: usize = 0x20;
const GUID_DUAL_AT: usize = 0x30;
const MAC_DUAL_AT: usize = 0x40;

/// Decoded device-info allocations. Each slot is `None` when it holds one
/// of the unset encodings (zero, all-ones).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceInfo {
    /// Base GUID allocation.
    pub base_guid: Option<UidEntry>,
    /// Base MAC allocation.
    pub base_mac: Option<UidEntry>,
    /// Second-port GUID allocation.
    pub base_guid_dual: Option<UidEntry>,
    /// Second-port MAC allocation.
    pub base_mac_dual: Option<UidEntry>,
}

impl DeviceInfo {
    /// Decode a device-info payload.
    pub fn parse(payload: &[u8]) -> Result<DeviceInfo> {
        if payload.len() < MIN_LEN {
            return Err(FwError::parse(format!(
                "device-info section too short: {:#x} bytes",
                payload.len()
            )));
        }
        Ok(DeviceInfo {
            base_guid: uid_at(payload, GUID_AT),
            base_mac: uid_at(payload, MAC_AT),
            base_guid_dual: uid_at(payload, GUID_DUAL_AT),
            base_mac_dual: uid_at(payload, MAC_DUAL_AT),
        })
    }

    /// True when no allocation is populated, which is how blank devices
    /// leave the factory.
    pub fn is_unset(&self) -> bool {
        self.base_guid.is_none()
            && self.base_mac.is_none()
            && self.base_guid_dual.is_none()
            && self.base_mac_dual.is_none()
    }
}

fn uid_at(payload: &[u8], at: usize) -> Option<UidEntry> {
    let uid = LittleEndian::read_u64(&payload[at..at + 8]);
    UidEntry::from_raw(uid, payload[at + 8], payload[at + 9])
}
